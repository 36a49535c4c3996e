use rusqlite::{params, OptionalExtension};

use super::database::{now_timestamp, patch, Database, DatabaseError};
use super::models::{Course, Program, ProgramChanges};

impl Database {
    pub async fn create_program(
        &self,
        name: String,
        description: Option<String>,
    ) -> Result<i64, DatabaseError> {
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO programs (name, description, created_at) VALUES (?1, ?2, ?3)",
                    params![name, description, now_timestamp()],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn list_programs(&self) -> Result<Vec<Program>, DatabaseError> {
        let programs = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, description, created_at FROM programs ORDER BY id",
                )?;
                let rows = stmt.query_map([], Program::from_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await?;
        Ok(programs)
    }

    pub async fn get_program(&self, id: i64) -> Result<Option<Program>, DatabaseError> {
        let program = self
            .conn
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT id, name, description, created_at FROM programs WHERE id = ?1",
                        [id],
                        Program::from_row,
                    )
                    .optional()?)
            })
            .await?;
        Ok(program)
    }

    pub async fn update_program(
        &self,
        id: i64,
        changes: ProgramChanges,
    ) -> Result<Option<Program>, DatabaseError> {
        let program = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let (set_description, description) = patch(changes.description);
                let updated = tx.execute(
                    "UPDATE programs SET
                        name = COALESCE(?2, name),
                        description = CASE WHEN ?3 THEN ?4 ELSE description END
                     WHERE id = ?1",
                    params![id, changes.name, set_description, description],
                )?;
                if updated == 0 {
                    return Ok(None);
                }
                let program = tx.query_row(
                    "SELECT id, name, description, created_at FROM programs WHERE id = ?1",
                    [id],
                    Program::from_row,
                )?;
                tx.commit()?;
                Ok(Some(program))
            })
            .await?;
        Ok(program)
    }

    pub async fn delete_program(&self, id: i64) -> Result<bool, DatabaseError> {
        let removed = self
            .conn
            .call(move |conn| Ok(conn.execute("DELETE FROM programs WHERE id = ?1", [id])?))
            .await?;
        Ok(removed > 0)
    }

    pub async fn list_courses_for_program(
        &self,
        program_id: i64,
    ) -> Result<Vec<Course>, DatabaseError> {
        self.list_courses(Some(program_id)).await
    }
}
