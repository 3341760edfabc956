use crate::database::models::{CommentRecord, NewComment};
use anyhow::Result;
use rusqlite::{params, Connection};

pub(super) struct SqliteCommentRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::CommentRepository for SqliteCommentRepository<'conn> {
    fn create(&self, comment: &NewComment) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO comments (post_id, author_id, text, created)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                comment.post_id,
                comment.author_id,
                comment.text,
                comment.created
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.id, c.post_id, c.author_id, u.username, c.text, c.created
            FROM comments c
            INNER JOIN users u ON u.id = c.author_id
            WHERE c.post_id = ?1
            ORDER BY c.created DESC, c.id DESC
            "#,
        )?;
        let rows = stmt.query_map(params![post_id], |row| {
            Ok(CommentRecord {
                id: row.get(0)?,
                post_id: row.get(1)?,
                author_id: row.get(2)?,
                author_username: row.get(3)?,
                text: row.get(4)?,
                created: row.get(5)?,
            })
        })?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }
}
