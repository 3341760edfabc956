use crate::database::models::GroupRecord;
use crate::database::repositories::GroupRepository;
use crate::database::Database;
use crate::error::{FieldErrors, ServiceError, ServiceResult};
use anyhow::Context;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

fn slug_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[-a-zA-Z0-9_]{1,50}$").expect("valid slug regex"))
}

#[derive(Clone)]
pub struct GroupService {
    database: Database,
}

impl GroupService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn create_group(&self, title: &str, slug: &str, description: &str) -> ServiceResult<GroupView> {
        let title = title.trim();
        let slug = slug.trim();
        let mut errors = FieldErrors::default();
        if title.is_empty() {
            errors.add("title", "This field is required.");
        } else if title.chars().count() > 200 {
            errors.add("title", "Ensure this value has at most 200 characters.");
        }
        if !slug_pattern().is_match(slug) {
            errors.add(
                "slug",
                "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
            );
        } else if self.find_by_slug(slug)?.is_some() {
            errors.add("slug", "Group with this slug already exists.");
        }
        errors.into_result(())?;

        let record = self.database.with_repositories(|repos| {
            let groups = repos.groups();
            let id = groups.create(title, slug, description.trim())?;
            groups
                .get(id)?
                .context("group creation lost newly inserted record")
        })?;
        tracing::info!(group_id = record.id, slug = %record.slug, "created group");
        Ok(GroupView::from_record(record))
    }

    pub fn get_by_slug(&self, slug: &str) -> ServiceResult<GroupView> {
        self.find_by_slug(slug)?
            .ok_or_else(|| ServiceError::not_found(format!("group {slug}")))
    }

    fn find_by_slug(&self, slug: &str) -> ServiceResult<Option<GroupView>> {
        let record = self
            .database
            .with_repositories(|repos| repos.groups().get_by_slug(slug))?;
        Ok(record.map(GroupView::from_record))
    }

    /// Raw records, used as the choice list of the post form.
    pub fn choices(&self) -> ServiceResult<Vec<GroupRecord>> {
        Ok(self.database.with_repositories(|repos| repos.groups().list())?)
    }

    pub fn list_groups(&self) -> ServiceResult<Vec<GroupView>> {
        Ok(self
            .choices()?
            .into_iter()
            .map(GroupView::from_record)
            .collect())
    }

    /// Deletes the group. Its posts survive with the group reference cleared.
    pub fn delete_group(&self, slug: &str) -> ServiceResult<()> {
        let group = self.get_by_slug(slug)?;
        self.database
            .with_repositories(|repos| repos.groups().delete(group.id))?;
        tracing::info!(group_id = group.id, slug = %group.slug, "deleted group");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupView {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl GroupView {
    fn from_record(record: GroupRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            slug: record.slug,
            description: record.description,
        }
    }
}
