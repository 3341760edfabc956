use crate::database::models::{NewUser, UserRecord};
use crate::database::repositories::UserRepository;
use crate::database::Database;
use crate::error::{FieldErrors, ServiceError, ServiceResult};
use crate::utils::now_utc_iso;
use anyhow::Context;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// First path segments that already belong to a route and therefore cannot
/// double as a profile URL.
const RESERVED_USERNAMES: &[&str] = &[
    "about", "auth", "follow", "group", "health", "media", "new", "static",
];

fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[\w.@+-]{1,150}$").expect("valid username regex"))
}

#[derive(Clone)]
pub struct UserService {
    database: Database,
    bcrypt_cost: u32,
}

impl UserService {
    pub fn new(database: Database, bcrypt_cost: u32) -> Self {
        Self {
            database,
            bcrypt_cost,
        }
    }

    pub fn create_user(&self, username: &str, password: &str) -> ServiceResult<UserView> {
        self.register(username, password, "", "")
    }

    pub fn register(
        &self,
        username: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> ServiceResult<UserView> {
        let username = username.trim();
        self.validate_username(username)?;
        if password.is_empty() {
            return FieldErrors::single("password1", "This field is required.")
                .into_result(UserView::default());
        }
        let password_hash =
            bcrypt::hash(password, self.bcrypt_cost).context("failed to hash password")?;
        let new_user = NewUser {
            username: username.to_string(),
            password_hash,
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            joined_at: now_utc_iso(),
        };

        let record = self.database.with_repositories(|repos| {
            let users = repos.users();
            let id = users.create(&new_user)?;
            users
                .get(id)?
                .context("user creation lost newly inserted record")
        })?;
        tracing::info!(user_id = record.id, username = %record.username, "registered user");
        Ok(UserView::from_record(record))
    }

    /// Returns the user when the password matches; unknown usernames and
    /// wrong passwords are indistinguishable.
    pub fn authenticate(&self, username: &str, password: &str) -> ServiceResult<Option<UserView>> {
        let record = self
            .database
            .with_repositories(|repos| repos.users().get_by_username(username.trim()))?;
        let Some(record) = record else {
            return Ok(None);
        };
        let valid = bcrypt::verify(password, &record.password_hash).unwrap_or(false);
        Ok(valid.then(|| UserView::from_record(record)))
    }

    pub fn get_by_username(&self, username: &str) -> ServiceResult<UserView> {
        self.find_by_username(username)?
            .ok_or_else(|| ServiceError::not_found(format!("user {username}")))
    }

    pub fn find_by_username(&self, username: &str) -> ServiceResult<Option<UserView>> {
        let record = self
            .database
            .with_repositories(|repos| repos.users().get_by_username(username))?;
        Ok(record.map(UserView::from_record))
    }

    pub fn list_users(&self) -> ServiceResult<Vec<UserView>> {
        let users = self.database.with_repositories(|repos| repos.users().list())?;
        Ok(users.into_iter().map(UserView::from_record).collect())
    }

    /// Deletes the user; their posts, comments and follow edges go with them.
    pub fn delete_user(&self, username: &str) -> ServiceResult<()> {
        let user = self.get_by_username(username)?;
        self.database
            .with_repositories(|repos| repos.users().delete(user.id))?;
        Ok(())
    }

    fn validate_username(&self, username: &str) -> ServiceResult<()> {
        let mut errors = FieldErrors::default();
        if username.is_empty() {
            errors.add("username", "This field is required.");
        } else if !username_pattern().is_match(username) {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        } else if RESERVED_USERNAMES.contains(&username.to_lowercase().as_str()) {
            errors.add("username", "This username is reserved.");
        } else {
            let taken = self
                .database
                .with_repositories(|repos| repos.users().get_by_username(username))?
                .is_some();
            if taken {
                errors.add("username", "A user with that username already exists.");
            }
        }
        errors.into_result(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub joined_at: String,
}

impl UserView {
    pub(crate) fn from_record(record: UserRecord) -> Self {
        let full_name = format!("{} {}", record.first_name, record.last_name)
            .trim()
            .to_string();
        Self {
            id: record.id,
            username: record.username,
            first_name: record.first_name,
            last_name: record.last_name,
            full_name,
            joined_at: record.joined_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_service() -> UserService {
        let db = Database::open_in_memory().expect("in-memory db");
        UserService::new(db, 4)
    }

    fn username_errors(err: ServiceError) -> Vec<String> {
        match err {
            ServiceError::Validation(errors) => errors
                .get("username")
                .map(|messages| messages.to_vec())
                .unwrap_or_default(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn registered_user_can_authenticate() {
        let service = setup_service();
        let user = service
            .register("sasha", "s3cret-pass", "Alexandra", "Petrova")
            .expect("register");
        assert_eq!(user.full_name, "Alexandra Petrova");

        let found = service.authenticate("sasha", "s3cret-pass").unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
        assert!(service.authenticate("sasha", "wrong").unwrap().is_none());
        assert!(service.authenticate("nobody", "s3cret-pass").unwrap().is_none());
    }

    #[test]
    fn duplicate_and_reserved_usernames_are_rejected() {
        let service = setup_service();
        service.create_user("sasha", "password-1").unwrap();
        let dup = service.create_user("sasha", "password-2").unwrap_err();
        assert_eq!(
            username_errors(dup),
            vec!["A user with that username already exists.".to_string()]
        );
        let reserved = service.create_user("Follow", "password-3").unwrap_err();
        assert_eq!(username_errors(reserved), vec!["This username is reserved.".to_string()]);
        let malformed = service.create_user("two words", "password-4").unwrap_err();
        assert_eq!(username_errors(malformed).len(), 1);
    }

    #[test]
    fn unknown_username_is_not_found() {
        let service = setup_service();
        assert!(matches!(
            service.get_by_username("ghost"),
            Err(ServiceError::NotFound(_))
        ));
    }
}
