use crate::authz::{self, Viewer};
use crate::cache::PageCache;
use crate::database::models::{CommentRecord, NewComment, NewPost, PostRecord, PostUpdate};
use crate::database::repositories::{
    CommentRepository, GroupRepository, PostFilter, PostRepository,
};
use crate::database::Database;
use crate::error::{ServiceError, ServiceResult};
use crate::files::{media_url, FileService};
use crate::forms::{CommentForm, ImageChange, PostForm};
use crate::groups::{GroupService, GroupView};
use crate::pagination::{Page, PageParams, Paginator};
use crate::users::UserView;
use crate::utils::now_utc_iso;
use anyhow::Context;
use serde::Serialize;

#[derive(Clone)]
pub struct PostService {
    database: Database,
    files: FileService,
    per_page: usize,
    cache: Option<PageCache>,
}

impl PostService {
    pub fn new(database: Database, files: FileService, per_page: usize) -> Self {
        Self {
            database,
            files,
            per_page,
            cache: None,
        }
    }

    /// Invalidate `cache` whenever a post is created or edited.
    pub fn with_cache(mut self, cache: PageCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn index(&self, params: &PageParams) -> ServiceResult<Page<PostView>> {
        self.list(PostFilter::All, params)
    }

    pub fn group_posts(
        &self,
        slug: &str,
        params: &PageParams,
    ) -> ServiceResult<(GroupView, Page<PostView>)> {
        let group = GroupService::new(self.database.clone()).get_by_slug(slug)?;
        let page = self.list(PostFilter::Group(group.id), params)?;
        Ok((group, page))
    }

    pub fn author_posts(&self, author: &UserView, params: &PageParams) -> ServiceResult<Page<PostView>> {
        self.list(PostFilter::Author(author.id), params)
    }

    /// Number of posts written by `author_id`.
    pub fn count_by_author(&self, author_id: i64) -> ServiceResult<usize> {
        let count = self
            .database
            .with_repositories(|repos| repos.posts().count(PostFilter::Author(author_id)))?;
        Ok(count)
    }

    pub(crate) fn list(&self, filter: PostFilter, params: &PageParams) -> ServiceResult<Page<PostView>> {
        let page = self.database.with_repositories(|repos| {
            let posts = repos.posts();
            let paginator = Paginator::new(posts.count(filter)?, self.per_page);
            paginator.page(params, |offset, limit| posts.list(filter, offset, limit))
        })?;
        Ok(page.map(PostView::from_record))
    }

    /// Newest posts regardless of author or group, for the admin console.
    pub fn recent(&self, limit: usize) -> ServiceResult<Vec<PostView>> {
        let records = self
            .database
            .with_repositories(|repos| repos.posts().list(PostFilter::All, 0, limit))?;
        Ok(records.into_iter().map(PostView::from_record).collect())
    }

    /// Resolves `/{username}/{post_id}/`: the post must exist and belong to
    /// `username`.
    pub fn get_post(&self, username: &str, post_id: i64) -> ServiceResult<PostView> {
        let record = self
            .database
            .with_repositories(|repos| repos.posts().get(post_id))?
            .filter(|post| post.author_username == username)
            .ok_or_else(|| ServiceError::not_found(format!("post {username}/{post_id}")))?;
        Ok(PostView::from_record(record))
    }

    pub fn comments(&self, post_id: i64) -> ServiceResult<Vec<CommentView>> {
        let comments = self
            .database
            .with_repositories(|repos| repos.comments().list_for_post(post_id))?;
        Ok(comments.into_iter().map(CommentView::from_record).collect())
    }

    pub async fn create_post(&self, author: &UserView, form: &PostForm) -> ServiceResult<PostView> {
        let groups = self.database.with_repositories(|repos| repos.groups().list())?;
        let clean = form.clean(&groups)?;
        let image = match &clean.image {
            ImageChange::Replace(image) => Some(self.files.save_post_image(image).await?),
            ImageChange::Keep | ImageChange::Clear => None,
        };
        let new_post = NewPost {
            text: clean.text,
            pub_date: now_utc_iso(),
            author_id: author.id,
            group_id: clean.group_id,
            image,
        };
        let inserted = self.database.with_repositories(|repos| {
            let posts = repos.posts();
            let id = posts.create(&new_post)?;
            posts
                .get(id)?
                .context("post creation lost newly inserted record")
        });
        let record = match inserted {
            Ok(record) => record,
            Err(err) => {
                if let Some(stored) = new_post.image.as_deref() {
                    self.files.remove(stored).await;
                }
                return Err(err.into());
            }
        };
        tracing::info!(post_id = record.id, author = %author.username, "created post");
        self.invalidate_cache();
        Ok(PostView::from_record(record))
    }

    /// Applies `form` to `post` when the viewer is its author. Anyone else
    /// gets [`EditOutcome::NotAuthor`] and the post is left untouched.
    pub async fn edit_post(
        &self,
        viewer: &Viewer,
        post: &PostView,
        form: &PostForm,
    ) -> ServiceResult<EditOutcome> {
        if !authz::can_edit(viewer, post) {
            tracing::debug!(post_id = post.id, viewer = ?viewer.username(), "edit refused for non-author");
            return Ok(EditOutcome::NotAuthor);
        }
        let groups = self.database.with_repositories(|repos| repos.groups().list())?;
        let clean = form.clean(&groups)?;
        let stored = match &clean.image {
            ImageChange::Replace(image) => Some(self.files.save_post_image(image).await?),
            ImageChange::Keep | ImageChange::Clear => None,
        };
        let image = match &clean.image {
            ImageChange::Keep => post.image.clone(),
            ImageChange::Replace(_) => stored.clone(),
            ImageChange::Clear => None,
        };
        let update = PostUpdate {
            text: clean.text,
            group_id: clean.group_id,
            image,
        };
        let updated = self.database.with_repositories(|repos| {
            let posts = repos.posts();
            posts.update(post.id, &update)?;
            posts.get(post.id)?.context("edited post disappeared")
        });
        let record = match updated {
            Ok(record) => record,
            Err(err) => {
                if let Some(stored) = stored.as_deref() {
                    self.files.remove(stored).await;
                }
                return Err(err.into());
            }
        };
        if let Some(old) = post.image.as_deref() {
            if record.image.as_deref() != Some(old) {
                self.files.remove(old).await;
            }
        }
        tracing::info!(post_id = record.id, "edited post");
        self.invalidate_cache();
        Ok(EditOutcome::Updated(PostView::from_record(record)))
    }

    pub fn add_comment(
        &self,
        author: &UserView,
        post: &PostView,
        form: &CommentForm,
    ) -> ServiceResult<CommentView> {
        let text = form.clean()?;
        let new_comment = NewComment {
            post_id: post.id,
            author_id: author.id,
            text,
            created: now_utc_iso(),
        };
        let record = self.database.with_repositories(|repos| {
            let comments = repos.comments();
            let id = comments.create(&new_comment)?;
            comments
                .list_for_post(post.id)?
                .into_iter()
                .find(|comment| comment.id == id)
                .context("comment creation lost newly inserted record")
        })?;
        tracing::info!(comment_id = record.id, post_id = post.id, author = %author.username, "added comment");
        Ok(CommentView::from_record(record))
    }

    fn invalidate_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Updated(PostView),
    NotAuthor,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupRef {
    pub id: i64,
    pub slug: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostView {
    pub id: i64,
    pub text: String,
    pub pub_date: String,
    pub author_id: i64,
    pub author: String,
    pub group: Option<GroupRef>,
    pub image: Option<String>,
    pub image_url: Option<String>,
}

impl PostView {
    fn from_record(record: PostRecord) -> Self {
        let group = match (record.group_id, record.group_slug, record.group_title) {
            (Some(id), Some(slug), Some(title)) => Some(GroupRef { id, slug, title }),
            _ => None,
        };
        let image_url = record.image.as_deref().map(media_url);
        Self {
            id: record.id,
            text: record.text,
            pub_date: record.pub_date,
            author_id: record.author_id,
            author: record.author_username,
            group,
            image: record.image,
            image_url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub post_id: i64,
    pub author: String,
    pub text: String,
    pub created: String,
}

impl CommentView {
    fn from_record(record: CommentRecord) -> Self {
        Self {
            id: record.id,
            post_id: record.post_id,
            author: record.author_username,
            text: record.text,
            created: record.created,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::YatubePaths;
    use crate::forms::UploadedImage;
    use crate::users::UserService;

    struct Fixture {
        posts: PostService,
        users: UserService,
        groups: GroupService,
    }

    fn setup() -> Fixture {
        let db = Database::open_in_memory().expect("in-memory db");
        let files = FileService::new(YatubePaths::default());
        Fixture {
            posts: PostService::new(db.clone(), files, 10),
            users: UserService::new(db.clone(), 4),
            groups: GroupService::new(db),
        }
    }

    fn text_form(text: &str, group: Option<i64>) -> PostForm {
        PostForm {
            text: text.into(),
            group: group.map(|id| id.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn group_listing_only_shows_its_posts() {
        let fx = setup();
        let author = fx.users.create_user("sasha", "password-1").unwrap();
        let business = fx.groups.create_group("Business", "business", "").unwrap();
        let snowball = fx.groups.create_group("Community", "snowball", "").unwrap();
        let p1 = fx
            .posts
            .create_post(&author, &text_form("P1", Some(business.id)))
            .await
            .unwrap();
        fx.posts
            .create_post(&author, &text_form("P2", Some(snowball.id)))
            .await
            .unwrap();

        let (group, page) = fx
            .posts
            .group_posts("business", &PageParams::default())
            .unwrap();
        assert_eq!(group.slug, "business");
        assert_eq!(page.items.iter().map(|p| p.id).collect::<Vec<_>>(), vec![p1.id]);
        assert!(matches!(
            fx.posts.group_posts("missing", &PageParams::default()),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn listings_are_newest_first_and_paged() {
        let fx = setup();
        let author = fx.users.create_user("sasha", "password-1").unwrap();
        for n in 0..13 {
            fx.posts
                .create_post(&author, &text_form(&format!("post {n}"), None))
                .await
                .unwrap();
        }
        let first = fx.posts.index(&PageParams::default()).unwrap();
        assert_eq!(first.len(), 10);
        assert_eq!(first.count, 13);
        assert_eq!(first.items[0].text, "post 12");

        let last = fx.posts.index(&PageParams::number(2)).unwrap();
        assert_eq!(last.len(), 3);
        assert_eq!(last.items[2].text, "post 0");

        let beyond = fx.posts.author_posts(&author, &PageParams::number(40)).unwrap();
        assert_eq!(beyond.number, 2);
        assert_eq!(beyond.len(), 3);
    }

    #[tokio::test]
    async fn non_author_edit_leaves_post_untouched() {
        let fx = setup();
        let author = fx.users.create_user("sasha", "password-1").unwrap();
        let intruder = fx.users.create_user("stas", "password-2").unwrap();
        let post = fx
            .posts
            .create_post(&author, &text_form("original", None))
            .await
            .unwrap();

        for viewer in [Viewer::Anonymous, Viewer::User(intruder)] {
            let outcome = fx
                .posts
                .edit_post(&viewer, &post, &text_form("hijacked", None))
                .await
                .unwrap();
            assert_eq!(outcome, EditOutcome::NotAuthor);
        }
        assert_eq!(fx.posts.get_post("sasha", post.id).unwrap().text, "original");
    }

    #[tokio::test]
    async fn author_edit_keeps_pub_date() {
        let fx = setup();
        let author = fx.users.create_user("sasha", "password-1").unwrap();
        let group = fx.groups.create_group("Business", "business", "").unwrap();
        let post = fx
            .posts
            .create_post(&author, &text_form("draft", None))
            .await
            .unwrap();

        let outcome = fx
            .posts
            .edit_post(&Viewer::User(author), &post, &text_form("final", Some(group.id)))
            .await
            .unwrap();
        let EditOutcome::Updated(edited) = outcome else {
            panic!("author edit refused");
        };
        assert_eq!(edited.text, "final");
        assert_eq!(edited.pub_date, post.pub_date);
        assert_eq!(edited.group.map(|g| g.slug).as_deref(), Some("business"));
    }

    #[tokio::test]
    async fn invalid_form_is_a_validation_error() {
        let fx = setup();
        let author = fx.users.create_user("sasha", "password-1").unwrap();
        let result = fx.posts.create_post(&author, &text_form("  ", None)).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert_eq!(fx.posts.index(&PageParams::default()).unwrap().count, 0);
    }

    #[tokio::test]
    async fn deleting_group_keeps_posts_without_group() {
        let fx = setup();
        let author = fx.users.create_user("sasha", "password-1").unwrap();
        let group = fx.groups.create_group("Business", "business", "").unwrap();
        let post = fx
            .posts
            .create_post(&author, &text_form("survivor", Some(group.id)))
            .await
            .unwrap();
        fx.groups.delete_group("business").unwrap();

        let reloaded = fx.posts.get_post("sasha", post.id).unwrap();
        assert_eq!(reloaded.text, "survivor");
        assert!(reloaded.group.is_none());
    }

    #[tokio::test]
    async fn deleting_author_removes_their_posts_and_comments() {
        let fx = setup();
        let author = fx.users.create_user("sasha", "password-1").unwrap();
        let reader = fx.users.create_user("stas", "password-2").unwrap();
        let post = fx
            .posts
            .create_post(&author, &text_form("short-lived", None))
            .await
            .unwrap();
        let own = fx
            .posts
            .create_post(&reader, &text_form("stays", None))
            .await
            .unwrap();
        fx.posts
            .add_comment(&reader, &post, &CommentForm { text: "nice".into() })
            .unwrap();
        fx.posts
            .add_comment(&author, &own, &CommentForm { text: "thanks".into() })
            .unwrap();

        fx.users.delete_user("sasha").unwrap();
        assert!(matches!(
            fx.posts.get_post("sasha", post.id),
            Err(ServiceError::NotFound(_))
        ));
        assert!(fx.posts.comments(post.id).unwrap().is_empty());
        assert!(fx.posts.comments(own.id).unwrap().is_empty());
        assert_eq!(fx.posts.index(&PageParams::default()).unwrap().count, 1);
    }

    #[tokio::test]
    async fn post_lookup_requires_matching_author() {
        let fx = setup();
        let author = fx.users.create_user("sasha", "password-1").unwrap();
        fx.users.create_user("stas", "password-2").unwrap();
        let post = fx
            .posts
            .create_post(&author, &text_form("mine", None))
            .await
            .unwrap();
        assert!(fx.posts.get_post("sasha", post.id).is_ok());
        assert!(matches!(
            fx.posts.get_post("stas", post.id),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn comments_are_newest_first_and_need_text() {
        let fx = setup();
        let author = fx.users.create_user("sasha", "password-1").unwrap();
        let post = fx
            .posts
            .create_post(&author, &text_form("discuss", None))
            .await
            .unwrap();
        fx.posts
            .add_comment(&author, &post, &CommentForm { text: "first".into() })
            .unwrap();
        fx.posts
            .add_comment(&author, &post, &CommentForm { text: "second".into() })
            .unwrap();
        assert!(matches!(
            fx.posts
                .add_comment(&author, &post, &CommentForm { text: " ".into() }),
            Err(ServiceError::Validation(_))
        ));

        let texts: Vec<_> = fx
            .posts
            .comments(post.id)
            .unwrap()
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn author_post_count_ignores_other_authors() {
        let fx = setup();
        let author = fx.users.create_user("sasha", "password-1").unwrap();
        let other = fx.users.create_user("stas", "password-2").unwrap();
        for text in ["one", "two"] {
            fx.posts.create_post(&author, &text_form(text, None)).await.unwrap();
        }
        fx.posts.create_post(&other, &text_form("three", None)).await.unwrap();

        assert_eq!(fx.posts.count_by_author(author.id).unwrap(), 2);
        assert_eq!(fx.posts.count_by_author(other.id).unwrap(), 1);
        assert_eq!(fx.posts.count_by_author(999).unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_writes_leave_no_stray_images() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = YatubePaths::from_base_dir(dir.path()).unwrap();
        let db = Database::open_in_memory().expect("in-memory db");
        let users = UserService::new(db.clone(), 4);
        let posts = PostService::new(db, FileService::new(paths.clone()), 10);
        let with_image = || PostForm {
            text: "picture".into(),
            image: Some(UploadedImage {
                file_name: Some("pic.png".into()),
                data: vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0],
            }),
            ..Default::default()
        };
        let stored_images = || {
            std::fs::read_dir(&paths.post_images_dir)
                .map(|entries| entries.count())
                .unwrap_or(0)
        };

        let ghost = UserView {
            id: 999,
            username: "ghost".into(),
            ..Default::default()
        };
        assert!(matches!(
            posts.create_post(&ghost, &with_image()).await,
            Err(ServiceError::Internal(_))
        ));
        assert_eq!(stored_images(), 0);

        let author = users.create_user("sasha", "password-1").unwrap();
        let post = posts.create_post(&author, &text_form("plain", None)).await.unwrap();
        users.delete_user("sasha").unwrap();
        assert!(posts
            .edit_post(&Viewer::User(author), &post, &with_image())
            .await
            .is_err());
        assert_eq!(stored_images(), 0);
    }
}
