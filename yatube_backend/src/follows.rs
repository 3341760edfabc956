use crate::authz::{self, Viewer};
use crate::database::repositories::{FollowRepository, PostFilter};
use crate::database::Database;
use crate::error::ServiceResult;
use crate::pagination::{Page, PageParams};
use crate::posts::{PostService, PostView};
use crate::users::{UserService, UserView};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
    /// Following yourself is silently ignored.
    SelfFollow,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FollowCounts {
    pub followers: usize,
    pub following: usize,
}

#[derive(Clone)]
pub struct FollowService {
    database: Database,
    users: UserService,
    posts: PostService,
}

impl FollowService {
    pub fn new(database: Database, users: UserService, posts: PostService) -> Self {
        Self {
            database,
            users,
            posts,
        }
    }

    pub fn follow(&self, user: &UserView, author_username: &str) -> ServiceResult<FollowOutcome> {
        let author = self.users.get_by_username(author_username)?;
        if author.id == user.id {
            return Ok(FollowOutcome::SelfFollow);
        }
        let created = self
            .database
            .with_repositories(|repos| repos.follows().add(user.id, author.id))?;
        if !created {
            return Ok(FollowOutcome::AlreadyFollowing);
        }
        tracing::info!(follower = %user.username, author = %author.username, "follow created");
        Ok(FollowOutcome::Created)
    }

    /// Removes the edge if present. Unfollowing someone you do not follow
    /// is a no-op.
    pub fn unfollow(&self, user: &UserView, author_username: &str) -> ServiceResult<usize> {
        let author = self.users.get_by_username(author_username)?;
        let removed = self
            .database
            .with_repositories(|repos| repos.follows().remove(user.id, author.id))?;
        if removed > 0 {
            tracing::info!(follower = %user.username, author = %author.username, "follow removed");
        }
        Ok(removed)
    }

    /// Posts by the authors `user` follows, newest first.
    pub fn feed(&self, user: &UserView, params: &PageParams) -> ServiceResult<Page<PostView>> {
        self.posts.list(PostFilter::FollowedBy(user.id), params)
    }

    pub fn is_following(&self, viewer: &Viewer, author_id: i64) -> ServiceResult<bool> {
        let marked = authz::follow_mark(viewer, author_id, |user_id, author_id| {
            self.database
                .with_repositories(|repos| repos.follows().exists(user_id, author_id))
        })?;
        Ok(marked)
    }

    pub fn counts(&self, user_id: i64) -> ServiceResult<FollowCounts> {
        let counts = self.database.with_repositories(|repos| {
            let follows = repos.follows();
            Ok(FollowCounts {
                followers: follows.count_followers(user_id)?,
                following: follows.count_following(user_id)?,
            })
        })?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::YatubePaths;
    use crate::error::ServiceError;
    use crate::files::FileService;
    use crate::forms::PostForm;

    struct Fixture {
        follows: FollowService,
        posts: PostService,
        users: UserService,
    }

    fn setup() -> Fixture {
        let db = Database::open_in_memory().expect("in-memory db");
        let users = UserService::new(db.clone(), 4);
        let posts = PostService::new(db.clone(), FileService::new(YatubePaths::default()), 10);
        Fixture {
            follows: FollowService::new(db, users.clone(), posts.clone()),
            posts,
            users,
        }
    }

    async fn publish(fx: &Fixture, author: &UserView, text: &str) -> PostView {
        let form = PostForm {
            text: text.into(),
            ..Default::default()
        };
        fx.posts.create_post(author, &form).await.expect("create post")
    }

    fn feed_texts(fx: &Fixture, user: &UserView) -> Vec<String> {
        fx.follows
            .feed(user, &PageParams::default())
            .unwrap()
            .items
            .into_iter()
            .map(|post| post.text)
            .collect()
    }

    #[tokio::test]
    async fn feed_shows_only_followed_authors() {
        let fx = setup();
        let a = fx.users.create_user("anna", "password-a").unwrap();
        let b = fx.users.create_user("boris", "password-b").unwrap();
        let c = fx.users.create_user("clara", "password-c").unwrap();

        assert_eq!(fx.follows.follow(&a, "boris").unwrap(), FollowOutcome::Created);
        publish(&fx, &b, "P3").await;

        assert_eq!(feed_texts(&fx, &a), vec!["P3"]);
        assert!(feed_texts(&fx, &c).is_empty());
        assert!(fx.follows.is_following(&Viewer::User(a.clone()), b.id).unwrap());
        assert!(!fx.follows.is_following(&Viewer::User(c), b.id).unwrap());
        assert!(!fx.follows.is_following(&Viewer::Anonymous, b.id).unwrap());
    }

    #[tokio::test]
    async fn unfollow_empties_the_feed() {
        let fx = setup();
        let a = fx.users.create_user("anna", "password-a").unwrap();
        let b = fx.users.create_user("boris", "password-b").unwrap();
        fx.follows.follow(&a, "boris").unwrap();
        publish(&fx, &b, "P1").await;

        assert_eq!(fx.follows.unfollow(&a, "boris").unwrap(), 1);
        assert!(feed_texts(&fx, &a).is_empty());
        assert_eq!(fx.follows.unfollow(&a, "boris").unwrap(), 0);
    }

    #[test]
    fn repeated_and_self_follows_create_nothing() {
        let fx = setup();
        let a = fx.users.create_user("anna", "password-a").unwrap();
        let b = fx.users.create_user("boris", "password-b").unwrap();

        assert_eq!(fx.follows.follow(&a, "anna").unwrap(), FollowOutcome::SelfFollow);
        fx.follows.follow(&a, "boris").unwrap();
        assert_eq!(
            fx.follows.follow(&a, "boris").unwrap(),
            FollowOutcome::AlreadyFollowing
        );

        assert_eq!(
            fx.follows.counts(b.id).unwrap(),
            FollowCounts {
                followers: 1,
                following: 0
            }
        );
        assert_eq!(fx.follows.counts(a.id).unwrap().following, 1);
        assert!(matches!(
            fx.follows.follow(&a, "ghost"),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn feed_of_user_following_nobody_is_empty() {
        let fx = setup();
        let a = fx.users.create_user("anna", "password-a").unwrap();
        let page = fx.follows.feed(&a, &PageParams::default()).unwrap();
        assert!(page.is_empty());
        assert_eq!(page.num_pages, 1);
    }

    #[tokio::test]
    async fn feed_merges_followed_authors_newest_first() {
        let fx = setup();
        let a = fx.users.create_user("anna", "password-a").unwrap();
        let b = fx.users.create_user("boris", "password-b").unwrap();
        let c = fx.users.create_user("clara", "password-c").unwrap();
        publish(&fx, &b, "b1").await;
        publish(&fx, &c, "c1").await;
        publish(&fx, &b, "b2").await;
        publish(&fx, &a, "a1").await;

        fx.follows.follow(&a, "boris").unwrap();
        fx.follows.follow(&a, "clara").unwrap();
        assert_eq!(feed_texts(&fx, &a), vec!["b2", "c1", "b1"]);

        fx.follows.unfollow(&a, "boris").unwrap();
        assert_eq!(feed_texts(&fx, &a), vec!["c1"]);
    }
}
