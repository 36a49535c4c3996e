use rusqlite::{params, OptionalExtension};

use super::database::{now_timestamp, patch, Database, DatabaseError};
use super::models::{Course, CourseChanges, CourseMembership, User};

const COURSE_COLUMNS: &str = "id, name, code, credit_hours, program_id, created_by, created_at";

impl Database {
    pub async fn create_course(
        &self,
        name: String,
        code: String,
        credit_hours: Option<i64>,
        program_id: Option<i64>,
        created_by: Option<i64>,
    ) -> Result<i64, DatabaseError> {
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO courses (name, code, credit_hours, program_id, created_by, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![name, code, credit_hours, program_id, created_by, now_timestamp()],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn list_courses(&self, program_id: Option<i64>) -> Result<Vec<Course>, DatabaseError> {
        let courses = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM courses WHERE (?1 IS NULL OR program_id = ?1) ORDER BY id",
                    COURSE_COLUMNS
                ))?;
                let rows = stmt.query_map([program_id], Course::from_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await?;
        Ok(courses)
    }

    pub async fn get_course(&self, id: i64) -> Result<Option<Course>, DatabaseError> {
        let course = self
            .conn
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!("SELECT {} FROM courses WHERE id = ?1", COURSE_COLUMNS),
                        [id],
                        Course::from_row,
                    )
                    .optional()?)
            })
            .await?;
        Ok(course)
    }

    pub async fn update_course(
        &self,
        id: i64,
        changes: CourseChanges,
    ) -> Result<Option<Course>, DatabaseError> {
        let course = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let (set_credit_hours, credit_hours) = patch(changes.credit_hours);
                let (set_program, program_id) = patch(changes.program_id);
                let (set_creator, created_by) = patch(changes.created_by);
                let updated = tx.execute(
                    "UPDATE courses SET
                        name = COALESCE(?2, name),
                        code = COALESCE(?3, code),
                        credit_hours = CASE WHEN ?4 THEN ?5 ELSE credit_hours END,
                        program_id = CASE WHEN ?6 THEN ?7 ELSE program_id END,
                        created_by = CASE WHEN ?8 THEN ?9 ELSE created_by END
                     WHERE id = ?1",
                    params![
                        id,
                        changes.name,
                        changes.code,
                        set_credit_hours,
                        credit_hours,
                        set_program,
                        program_id,
                        set_creator,
                        created_by
                    ],
                )?;
                if updated == 0 {
                    return Ok(None);
                }
                let course = tx.query_row(
                    &format!("SELECT {} FROM courses WHERE id = ?1", COURSE_COLUMNS),
                    [id],
                    Course::from_row,
                )?;
                tx.commit()?;
                Ok(Some(course))
            })
            .await?;
        Ok(course)
    }

    pub async fn delete_course(&self, id: i64) -> Result<bool, DatabaseError> {
        let removed = self
            .conn
            .call(move |conn| Ok(conn.execute("DELETE FROM courses WHERE id = ?1", [id])?))
            .await?;
        Ok(removed > 0)
    }

    pub async fn add_course_member(
        &self,
        membership: CourseMembership,
        course_id: i64,
        user_id: i64,
    ) -> Result<(), DatabaseError> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    &format!(
                        "INSERT INTO {} (course_id, user_id) VALUES (?1, ?2)",
                        membership.table()
                    ),
                    [course_id, user_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn remove_course_member(
        &self,
        membership: CourseMembership,
        course_id: i64,
        user_id: i64,
    ) -> Result<bool, DatabaseError> {
        let removed = self
            .conn
            .call(move |conn| {
                Ok(conn.execute(
                    &format!(
                        "DELETE FROM {} WHERE course_id = ?1 AND user_id = ?2",
                        membership.table()
                    ),
                    [course_id, user_id],
                )?)
            })
            .await?;
        Ok(removed > 0)
    }

    pub async fn list_course_members(
        &self,
        membership: CourseMembership,
        course_id: i64,
    ) -> Result<Vec<User>, DatabaseError> {
        let users = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT u.id, u.name, u.email, u.role, u.created_at
                     FROM users u JOIN {} m ON m.user_id = u.id
                     WHERE m.course_id = ?1
                     ORDER BY u.id",
                    membership.table()
                ))?;
                let rows = stmt.query_map([course_id], User::from_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await?;
        Ok(users)
    }

    pub async fn add_course_teacher(&self, course_id: i64, user_id: i64) -> Result<(), DatabaseError> {
        self.add_course_member(CourseMembership::Teacher, course_id, user_id)
            .await
    }

    pub async fn remove_course_teacher(&self, course_id: i64, user_id: i64) -> Result<bool, DatabaseError> {
        self.remove_course_member(CourseMembership::Teacher, course_id, user_id)
            .await
    }

    pub async fn list_course_teachers(&self, course_id: i64) -> Result<Vec<User>, DatabaseError> {
        self.list_course_members(CourseMembership::Teacher, course_id)
            .await
    }

    pub async fn add_course_student(&self, course_id: i64, user_id: i64) -> Result<(), DatabaseError> {
        self.add_course_member(CourseMembership::Student, course_id, user_id)
            .await
    }

    pub async fn remove_course_student(&self, course_id: i64, user_id: i64) -> Result<bool, DatabaseError> {
        self.remove_course_member(CourseMembership::Student, course_id, user_id)
            .await
    }

    pub async fn list_course_students(&self, course_id: i64) -> Result<Vec<User>, DatabaseError> {
        self.list_course_members(CourseMembership::Student, course_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{NewUser, UserRole};
    use crate::database::users::hash_password;

    async fn seed_user(db: &Database, email: &str, role: UserRole) -> i64 {
        db.create_user(NewUser {
            name: email.to_string(),
            email: email.to_string(),
            password_hash: hash_password("pw"),
            role,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn course_code_is_unique() {
        let db = Database::in_memory().await.unwrap();
        db.create_course("Logic".into(), "CS101".into(), Some(3), None, None)
            .await
            .unwrap();
        assert!(db
            .create_course("Logic II".into(), "CS101".into(), None, None, None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn unknown_program_violates_foreign_key() {
        let db = Database::in_memory().await.unwrap();
        assert!(db
            .create_course("Logic".into(), "CS101".into(), None, Some(42), None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn enrolment_round_trip() {
        let db = Database::in_memory().await.unwrap();
        let course = db
            .create_course("Logic".into(), "CS101".into(), None, None, None)
            .await
            .unwrap();
        let teacher = seed_user(&db, "t@example.com", UserRole::Teacher).await;
        let student = seed_user(&db, "s@example.com", UserRole::Student).await;

        db.add_course_teacher(course, teacher).await.unwrap();
        db.add_course_student(course, student).await.unwrap();
        assert!(db.add_course_student(course, student).await.is_err());

        let teachers = db.list_course_teachers(course).await.unwrap();
        assert_eq!(teachers.len(), 1);
        assert_eq!(teachers[0].id, teacher);

        assert!(db.remove_course_student(course, student).await.unwrap());
        assert!(!db.remove_course_student(course, student).await.unwrap());
        assert!(db.list_course_students(course).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_program_detaches_courses() {
        let db = Database::in_memory().await.unwrap();
        let program = db.create_program("BSc CS".into(), None).await.unwrap();
        let course = db
            .create_course("Logic".into(), "CS101".into(), None, Some(program), None)
            .await
            .unwrap();
        assert_eq!(db.list_courses_for_program(program).await.unwrap().len(), 1);

        assert!(db.delete_program(program).await.unwrap());
        let course = db.get_course(course).await.unwrap().unwrap();
        assert_eq!(course.program_id, None);
    }
}
