use anyhow::Result;
use rusqlite::{params, Connection};

pub(super) struct SqliteFollowRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::FollowRepository for SqliteFollowRepository<'conn> {
    fn add(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let inserted = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO follows (user_id, author_id)
            VALUES (?1, ?2)
            "#,
            params![user_id, author_id],
        )?;
        Ok(inserted > 0)
    }

    fn exists(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let exists: i64 = self.conn.query_row(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM follows
                WHERE user_id = ?1 AND author_id = ?2
            )
            "#,
            params![user_id, author_id],
            |row| row.get(0),
        )?;
        Ok(exists != 0)
    }

    fn remove(&self, user_id: i64, author_id: i64) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM follows WHERE user_id = ?1 AND author_id = ?2",
            params![user_id, author_id],
        )?;
        Ok(removed)
    }

    fn count_followers(&self, author_id: i64) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT user_id) FROM follows WHERE author_id = ?1 AND user_id != author_id",
            params![author_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn count_following(&self, user_id: i64) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT author_id) FROM follows WHERE user_id = ?1 AND user_id != author_id",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
