use super::{base_context, AppState, WebResult};
use crate::authz::Viewer;
use axum::extract::State;
use axum::response::IntoResponse;

pub(super) async fn author(State(state): State<AppState>, viewer: Viewer) -> WebResult {
    Ok(state
        .render("about/author.html", &base_context(&viewer))?
        .into_response())
}

pub(super) async fn tech(State(state): State<AppState>, viewer: Viewer) -> WebResult {
    Ok(state
        .render("about/tech.html", &base_context(&viewer))?
        .into_response())
}
