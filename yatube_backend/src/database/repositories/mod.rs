mod comments;
mod follows;
mod groups;
mod posts;
mod users;

use super::models::{
    CommentRecord, GroupRecord, NewComment, NewPost, NewUser, PostRecord, PostUpdate, UserRecord,
};
use anyhow::Result;
use rusqlite::Connection;

pub use posts::PostFilter;

pub trait UserRepository {
    fn create(&self, user: &NewUser) -> Result<i64>;
    fn get(&self, id: i64) -> Result<Option<UserRecord>>;
    fn get_by_username(&self, username: &str) -> Result<Option<UserRecord>>;
    fn list(&self) -> Result<Vec<UserRecord>>;
    /// Removes the user together with their posts, comments and follow edges.
    fn delete(&self, id: i64) -> Result<usize>;
}

pub trait GroupRepository {
    fn create(&self, title: &str, slug: &str, description: &str) -> Result<i64>;
    fn get(&self, id: i64) -> Result<Option<GroupRecord>>;
    fn get_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>>;
    fn list(&self) -> Result<Vec<GroupRecord>>;
    fn delete(&self, id: i64) -> Result<usize>;
}

pub trait PostRepository {
    fn create(&self, post: &NewPost) -> Result<i64>;
    fn get(&self, id: i64) -> Result<Option<PostRecord>>;
    fn update(&self, id: i64, update: &PostUpdate) -> Result<()>;
    fn count(&self, filter: PostFilter) -> Result<usize>;
    /// Newest first; ties on `pub_date` fall back to the higher id.
    fn list(&self, filter: PostFilter, offset: usize, limit: usize) -> Result<Vec<PostRecord>>;
}

pub trait CommentRepository {
    fn create(&self, comment: &NewComment) -> Result<i64>;
    fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentRecord>>;
}

pub trait FollowRepository {
    /// Returns `false` when the edge already existed.
    fn add(&self, user_id: i64, author_id: i64) -> Result<bool>;
    fn exists(&self, user_id: i64, author_id: i64) -> Result<bool>;
    /// Deletes every matching edge and reports how many went away.
    fn remove(&self, user_id: i64, author_id: i64) -> Result<usize>;
    fn count_followers(&self, author_id: i64) -> Result<usize>;
    fn count_following(&self, user_id: i64) -> Result<usize>;
}

pub struct SqliteRepositories<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRepositories<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn users(&self) -> impl UserRepository + '_ {
        users::SqliteUserRepository { conn: self.conn }
    }

    pub fn groups(&self) -> impl GroupRepository + '_ {
        groups::SqliteGroupRepository { conn: self.conn }
    }

    pub fn posts(&self) -> impl PostRepository + '_ {
        posts::SqlitePostRepository { conn: self.conn }
    }

    pub fn comments(&self) -> impl CommentRepository + '_ {
        comments::SqliteCommentRepository { conn: self.conn }
    }

    pub fn follows(&self) -> impl FollowRepository + '_ {
        follows::SqliteFollowRepository { conn: self.conn }
    }
}
