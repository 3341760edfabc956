use crate::database::models::{NewPost, PostRecord, PostUpdate};
use anyhow::Result;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

pub(super) struct SqlitePostRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

/// Which slice of the post table a listing reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(i64),
    /// Posts by every author the given user follows.
    FollowedBy(i64),
}

impl PostFilter {
    fn where_clause(self) -> (&'static str, Vec<i64>) {
        match self {
            PostFilter::All => ("", Vec::new()),
            PostFilter::Group(group_id) => ("WHERE p.group_id = ?", vec![group_id]),
            PostFilter::Author(author_id) => ("WHERE p.author_id = ?", vec![author_id]),
            PostFilter::FollowedBy(user_id) => (
                "WHERE EXISTS (SELECT 1 FROM follows f WHERE f.user_id = ? AND f.author_id = p.author_id)",
                vec![user_id],
            ),
        }
    }
}

const POST_SELECT: &str = r#"
    SELECT p.id, p.text, p.pub_date, p.author_id, u.username,
           p.group_id, g.slug, g.title, p.image
    FROM posts p
    INNER JOIN users u ON u.id = p.author_id
    LEFT JOIN post_groups g ON g.id = p.group_id
"#;

fn map_post(row: &Row<'_>) -> rusqlite::Result<PostRecord> {
    Ok(PostRecord {
        id: row.get(0)?,
        text: row.get(1)?,
        pub_date: row.get(2)?,
        author_id: row.get(3)?,
        author_username: row.get(4)?,
        group_id: row.get(5)?,
        group_slug: row.get(6)?,
        group_title: row.get(7)?,
        image: row.get(8)?,
    })
}

impl<'conn> super::PostRepository for SqlitePostRepository<'conn> {
    fn create(&self, post: &NewPost) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO posts (text, pub_date, author_id, group_id, image)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                post.text,
                post.pub_date,
                post.author_id,
                post.group_id,
                post.image
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get(&self, id: i64) -> Result<Option<PostRecord>> {
        let sql = format!("{POST_SELECT} WHERE p.id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id], map_post)
            .optional()?)
    }

    fn update(&self, id: i64, update: &PostUpdate) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE posts
            SET text = ?1, group_id = ?2, image = ?3
            WHERE id = ?4
            "#,
            params![update.text, update.group_id, update.image, id],
        )?;
        Ok(())
    }

    fn count(&self, filter: PostFilter) -> Result<usize> {
        let (clause, values) = filter.where_clause();
        let sql = format!("SELECT COUNT(*) FROM posts p {clause}");
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;
        Ok(count as usize)
    }

    fn list(&self, filter: PostFilter, offset: usize, limit: usize) -> Result<Vec<PostRecord>> {
        let (clause, mut values) = filter.where_clause();
        values.push(limit as i64);
        values.push(offset as i64);
        let sql = format!(
            "{POST_SELECT} {clause} ORDER BY p.pub_date DESC, p.id DESC LIMIT ? OFFSET ?"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), map_post)?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }
}
