use crate::database::models::{NewUser, UserRecord};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteUserRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const USER_COLUMNS: &str = "id, username, password_hash, first_name, last_name, joined_at";

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        joined_at: row.get(5)?,
    })
}

impl<'conn> super::UserRepository for SqliteUserRepository<'conn> {
    fn create(&self, user: &NewUser) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO users (username, password_hash, first_name, last_name, joined_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                user.username,
                user.password_hash,
                user.first_name,
                user.last_name,
                user.joined_at
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get(&self, id: i64) -> Result<Option<UserRecord>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id], map_user)
            .optional()?)
    }

    fn get_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![username], map_user)
            .optional()?)
    }

    fn list(&self) -> Result<Vec<UserRecord>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY username ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], map_user)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    fn delete(&self, id: i64) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        tracing::info!(user_id = id, removed, "deleted user");
        Ok(removed)
    }
}
