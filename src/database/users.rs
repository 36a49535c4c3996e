use rand::Rng;
use rusqlite::{params, OptionalExtension};
use sha2::{Digest, Sha256};

use super::database::{now_timestamp, Database, DatabaseError};
use super::models::{NewUser, User, UserFilter, UserUpdate};

const USER_COLUMNS: &str = "id, name, email, role, created_at";

/// Salted SHA-256, stored as `sha256$<salt>$<digest>`.
pub fn hash_password(password: &str) -> String {
    let salt: [u8; 16] = rand::thread_rng().gen();
    let salt = to_hex(&salt);
    let digest = Sha256::digest(format!("{}{}", salt, password).as_bytes());
    format!("sha256${}${}", salt, to_hex(&digest))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

impl Database {
    pub async fn create_user(&self, user: NewUser) -> Result<i64, DatabaseError> {
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO users (name, email, password_hash, role, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        user.name,
                        user.email,
                        user.password_hash,
                        user.role.as_str(),
                        now_timestamp()
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn list_users(&self, filter: UserFilter) -> Result<Vec<User>, DatabaseError> {
        let users = self
            .conn
            .call(move |conn| {
                let mut sql = format!("SELECT {} FROM users WHERE 1 = 1", USER_COLUMNS);
                let mut values: Vec<rusqlite::types::Value> = Vec::new();

                if let Some(role) = filter.role {
                    sql.push_str(" AND role = ?");
                    values.push(role.as_str().to_string().into());
                }
                if let Some(name) = filter.name {
                    sql.push_str(" AND name LIKE '%' || ? || '%'");
                    values.push(name.into());
                }
                sql.push_str(" ORDER BY id");

                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(rusqlite::params_from_iter(values), User::from_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await?;
        Ok(users)
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>, DatabaseError> {
        let user = self
            .conn
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                        [id],
                        User::from_row,
                    )
                    .optional()?)
            })
            .await?;
        Ok(user)
    }

    pub async fn update_user(
        &self,
        id: i64,
        changes: UserUpdate,
    ) -> Result<Option<User>, DatabaseError> {
        let user = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let updated = tx.execute(
                    "UPDATE users SET
                        name = COALESCE(?2, name),
                        email = COALESCE(?3, email),
                        password_hash = COALESCE(?4, password_hash),
                        role = COALESCE(?5, role)
                     WHERE id = ?1",
                    params![
                        id,
                        changes.name,
                        changes.email,
                        changes.password_hash,
                        changes.role.map(|r| r.as_str())
                    ],
                )?;
                if updated == 0 {
                    return Ok(None);
                }
                let user = tx.query_row(
                    &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                    [id],
                    User::from_row,
                )?;
                tx.commit()?;
                Ok(Some(user))
            })
            .await?;
        Ok(user)
    }

    pub async fn delete_user(&self, id: i64) -> Result<bool, DatabaseError> {
        let removed = self
            .conn
            .call(move |conn| Ok(conn.execute("DELETE FROM users WHERE id = ?1", [id])?))
            .await?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::UserRole;

    fn new_user(email: &str, role: UserRole) -> NewUser {
        NewUser {
            name: "Ada Lovelace".to_string(),
            email: email.to_string(),
            password_hash: hash_password("secret"),
            role,
        }
    }

    #[test]
    fn password_hash_is_salted() {
        let a = hash_password("secret");
        let b = hash_password("secret");
        assert_ne!(a, b);
        assert!(a.starts_with("sha256$"));
        assert_eq!(a.split('$').count(), 3);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let db = Database::in_memory().await.unwrap();
        db.create_user(new_user("ada@example.com", UserRole::Teacher))
            .await
            .unwrap();
        let err = db
            .create_user(new_user("ada@example.com", UserRole::Student))
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn list_filters_by_role_and_name() {
        let db = Database::in_memory().await.unwrap();
        db.create_user(new_user("t@example.com", UserRole::Teacher))
            .await
            .unwrap();
        db.create_user(NewUser {
            name: "Grace Hopper".to_string(),
            ..new_user("s@example.com", UserRole::Student)
        })
        .await
        .unwrap();

        let teachers = db
            .list_users(UserFilter {
                role: Some(UserRole::Teacher),
                name: None,
            })
            .await
            .unwrap();
        assert_eq!(teachers.len(), 1);
        assert_eq!(teachers[0].email, "t@example.com");

        let graces = db
            .list_users(UserFilter {
                role: None,
                name: Some("grace".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(graces.len(), 1);
        assert_eq!(graces[0].role, UserRole::Student);
    }

    #[tokio::test]
    async fn update_keeps_absent_fields() {
        let db = Database::in_memory().await.unwrap();
        let id = db
            .create_user(new_user("ada@example.com", UserRole::Teacher))
            .await
            .unwrap();

        let updated = db
            .update_user(
                id,
                UserUpdate {
                    name: Some("Countess Ada".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Countess Ada");
        assert_eq!(updated.email, "ada@example.com");

        assert!(db
            .update_user(999, UserUpdate::default())
            .await
            .unwrap()
            .is_none());
    }
}
