//! Who may edit a post, and whether the viewer is shown as following an
//! author.

use crate::posts::PostView;
use crate::users::UserView;
use anyhow::Result;

/// The person behind a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Viewer {
    #[default]
    Anonymous,
    User(UserView),
}

impl Viewer {
    pub fn user(&self) -> Option<&UserView> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User(user) => Some(user),
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.user().map(|user| user.username.as_str())
    }

    /// True when the viewer is the user with `user_id`.
    pub fn is(&self, user_id: i64) -> bool {
        self.user().is_some_and(|user| user.id == user_id)
    }
}

impl From<UserView> for Viewer {
    fn from(user: UserView) -> Self {
        Viewer::User(user)
    }
}

/// Only the author may edit a post.
pub fn can_edit(viewer: &Viewer, post: &PostView) -> bool {
    viewer.is(post.author_id)
}

/// Whether the "unfollow" state is shown for `author_id`. Anonymous viewers
/// and the author themselves always get `false`; `edge_exists` is consulted
/// only for the remaining case.
pub fn follow_mark<F>(viewer: &Viewer, author_id: i64, edge_exists: F) -> Result<bool>
where
    F: FnOnce(i64, i64) -> Result<bool>,
{
    match viewer.user() {
        None => Ok(false),
        Some(user) if user.id == author_id => Ok(false),
        Some(user) => edge_exists(user.id, author_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posts::PostView;

    fn user(id: i64, name: &str) -> UserView {
        UserView {
            id,
            username: name.into(),
            ..Default::default()
        }
    }

    fn post_by(author_id: i64) -> PostView {
        PostView {
            id: 1,
            text: "text".into(),
            author_id,
            author: format!("user{author_id}"),
            ..Default::default()
        }
    }

    #[test]
    fn only_author_can_edit() {
        let post = post_by(1);
        assert!(can_edit(&Viewer::User(user(1, "author")), &post));
        assert!(!can_edit(&Viewer::User(user(2, "other")), &post));
        assert!(!can_edit(&Viewer::Anonymous, &post));
    }

    #[test]
    fn follow_mark_ignores_storage_for_anonymous_and_self() {
        let always = |_: i64, _: i64| Ok(true);
        assert!(!follow_mark(&Viewer::Anonymous, 1, always).unwrap());
        assert!(!follow_mark(&Viewer::User(user(1, "me")), 1, always).unwrap());
        assert!(follow_mark(&Viewer::User(user(2, "fan")), 1, always).unwrap());
        assert!(!follow_mark(&Viewer::User(user(2, "fan")), 1, |_, _| Ok(false)).unwrap());
    }
}
