use crate::database::models::GroupRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteGroupRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_group(row: &Row<'_>) -> rusqlite::Result<GroupRecord> {
    Ok(GroupRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
    })
}

impl<'conn> super::GroupRepository for SqliteGroupRepository<'conn> {
    fn create(&self, title: &str, slug: &str, description: &str) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO post_groups (title, slug, description)
            VALUES (?1, ?2, ?3)
            "#,
            params![title, slug, description],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get(&self, id: i64) -> Result<Option<GroupRecord>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, title, slug, description FROM post_groups WHERE id = ?1",
                params![id],
                map_group,
            )
            .optional()?)
    }

    fn get_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, title, slug, description FROM post_groups WHERE slug = ?1",
                params![slug],
                map_group,
            )
            .optional()?)
    }

    fn list(&self) -> Result<Vec<GroupRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title, slug, description FROM post_groups ORDER BY title ASC")?;
        let rows = stmt.query_map([], map_group)?;
        let mut groups = Vec::new();
        for row in rows {
            groups.push(row?);
        }
        Ok(groups)
    }

    fn delete(&self, id: i64) -> Result<usize> {
        // posts.group_id is ON DELETE SET NULL, the posts themselves stay
        let removed = self
            .conn
            .execute("DELETE FROM post_groups WHERE id = ?1", params![id])?;
        Ok(removed)
    }
}
