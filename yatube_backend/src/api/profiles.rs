use super::extract::CurrentUser;
use super::{base_context, AppState, WebResult};
use crate::authz::Viewer;
use crate::follows::FollowOutcome;
use crate::pagination::PageParams;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect};

fn profile_url(username: &str) -> String {
    format!("/{username}/")
}

pub(super) async fn profile(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(username): Path<String>,
    Query(params): Query<PageParams>,
) -> WebResult {
    let author = state.users().get_by_username(&username)?;
    let page = state.posts().author_posts(&author, &params)?;
    let follows = state.follows();

    let mut context = base_context(&viewer);
    context.insert("follow_mark", &follows.is_following(&viewer, author.id)?);
    context.insert("counts", &follows.counts(author.id)?);
    context.insert("posts_count", &page.count);
    context.insert("is_self", &viewer.is(author.id));
    context.insert("author", &author);
    context.insert("page", &page);
    Ok(state.render("profile.html", &context)?.into_response())
}

pub(super) async fn follow_index(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<PageParams>,
) -> WebResult {
    let page = state.follows().feed(&user, &params)?;
    let mut context = base_context(&Viewer::from(user));
    context.insert("page", &page);
    Ok(state.render("follow.html", &context)?.into_response())
}

pub(super) async fn profile_follow(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> WebResult {
    let outcome = state.follows().follow(&user, &username)?;
    if outcome != FollowOutcome::Created {
        tracing::debug!(follower = %user.username, author = %username, ?outcome, "follow was a no-op");
    }
    Ok(Redirect::to(&profile_url(&username)).into_response())
}

pub(super) async fn profile_unfollow(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> WebResult {
    state.follows().unfollow(&user, &username)?;
    Ok(Redirect::to(&profile_url(&username)).into_response())
}
