use super::extract::{CurrentUser, PostFormInput};
use super::{base_context, AppState, WebError, WebResult};
use crate::authz::{self, Viewer};
use crate::cache::PageCache;
use crate::error::{FieldErrors, ServiceError};
use crate::forms::{CommentForm, PostForm};
use crate::pagination::PageParams;
use crate::posts::{EditOutcome, PostView};
use axum::extract::{Path, Query, State};
use axum::http::Uri;
use axum::response::{Html, IntoResponse, Redirect};
use axum::Form;

fn parse_post_id(raw: &str) -> Result<i64, WebError> {
    raw.parse::<i64>()
        .map_err(|_| WebError::NotFound(format!("post {raw}")))
}

fn post_url(post: &PostView) -> String {
    format!("/{}/{}/", post.author, post.id)
}

/// Home listing, served from the page cache while the entry is fresh.
pub(super) async fn index(
    State(state): State<AppState>,
    viewer: Viewer,
    uri: Uri,
    Query(params): Query<PageParams>,
) -> WebResult {
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let key = PageCache::key(path_and_query, &viewer);
    if let Some(body) = state.cache.get(&key) {
        tracing::trace!(%key, "page cache hit");
        return Ok(Html(body).into_response());
    }

    let page = state.posts().index(&params)?;
    let mut context = base_context(&viewer);
    context.insert("page", &page);
    let body = state.render_string("index.html", &context)?;
    state.cache.insert(key, body.clone());
    Ok(Html(body).into_response())
}

pub(super) async fn group_posts(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(slug): Path<String>,
    Query(params): Query<PageParams>,
) -> WebResult {
    let (group, page) = state.posts().group_posts(&slug, &params)?;
    let mut context = base_context(&viewer);
    context.insert("group", &group);
    context.insert("page", &page);
    Ok(state.render("group.html", &context)?.into_response())
}

fn render_post_form(
    state: &AppState,
    viewer: &Viewer,
    form: &PostForm,
    errors: &FieldErrors,
    post: Option<&PostView>,
) -> WebResult {
    let mut context = base_context(viewer);
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("groups", &state.groups().list_groups()?);
    context.insert("is_new_post", &post.is_none());
    context.insert("post", &post);
    Ok(state.render("new_post.html", &context)?.into_response())
}

pub(super) async fn new_post_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> WebResult {
    render_post_form(
        &state,
        &Viewer::from(user),
        &PostForm::default(),
        &FieldErrors::default(),
        None,
    )
}

pub(super) async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    PostFormInput(form): PostFormInput,
) -> WebResult {
    match state.posts().create_post(&user, &form).await {
        Ok(_) => Ok(Redirect::to("/").into_response()),
        Err(ServiceError::Validation(errors)) => {
            render_post_form(&state, &Viewer::from(user), &form, &errors, None)
        }
        Err(err) => Err(err.into()),
    }
}

pub(super) async fn post_view(
    State(state): State<AppState>,
    viewer: Viewer,
    Path((username, post_id)): Path<(String, String)>,
) -> WebResult {
    let post = state.posts().get_post(&username, parse_post_id(&post_id)?)?;
    let author = state.users().get_by_username(&post.author)?;
    let follows = state.follows();
    let comments = state.posts().comments(post.id)?;

    let mut context = base_context(&viewer);
    context.insert("follow_mark", &follows.is_following(&viewer, author.id)?);
    context.insert("counts", &follows.counts(author.id)?);
    context.insert("posts_count", &state.posts().count_by_author(author.id)?);
    context.insert("can_edit", &authz::can_edit(&viewer, &post));
    context.insert("author", &author);
    context.insert("post", &post);
    context.insert("comments", &comments);
    context.insert("form", &CommentForm::default());
    Ok(state.render("post.html", &context)?.into_response())
}

pub(super) async fn post_edit_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((username, post_id)): Path<(String, String)>,
) -> WebResult {
    let post = state.posts().get_post(&username, parse_post_id(&post_id)?)?;
    let viewer = Viewer::from(user);
    if !authz::can_edit(&viewer, &post) {
        return Ok(Redirect::to(&post_url(&post)).into_response());
    }
    render_post_form(
        &state,
        &viewer,
        &PostForm::for_post(&post),
        &FieldErrors::default(),
        Some(&post),
    )
}

pub(super) async fn post_edit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((username, post_id)): Path<(String, String)>,
    PostFormInput(form): PostFormInput,
) -> WebResult {
    let post = state.posts().get_post(&username, parse_post_id(&post_id)?)?;
    let viewer = Viewer::from(user);
    match state.posts().edit_post(&viewer, &post, &form).await {
        Ok(EditOutcome::Updated(updated)) => Ok(Redirect::to(&post_url(&updated)).into_response()),
        Ok(EditOutcome::NotAuthor) => Ok(Redirect::to(&post_url(&post)).into_response()),
        Err(ServiceError::Validation(errors)) => {
            render_post_form(&state, &viewer, &form, &errors, Some(&post))
        }
        Err(err) => Err(err.into()),
    }
}

/// Comments always land back on the post; an empty one is dropped.
pub(super) async fn add_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((username, post_id)): Path<(String, String)>,
    Form(form): Form<CommentForm>,
) -> WebResult {
    let posts = state.posts();
    let post = posts.get_post(&username, parse_post_id(&post_id)?)?;
    match posts.add_comment(&user, &post, &form) {
        Ok(_) => {}
        Err(ServiceError::Validation(errors)) => {
            tracing::debug!(post_id = post.id, %errors, "dropped invalid comment");
        }
        Err(err) => return Err(err.into()),
    }
    Ok(Redirect::to(&post_url(&post)).into_response())
}

pub(super) async fn comment_redirect(
    State(state): State<AppState>,
    Path((username, post_id)): Path<(String, String)>,
) -> WebResult {
    let post = state.posts().get_post(&username, parse_post_id(&post_id)?)?;
    Ok(Redirect::to(&post_url(&post)).into_response())
}
