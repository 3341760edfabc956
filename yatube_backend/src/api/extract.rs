use super::{AppState, WebError};
use crate::authz::Viewer;
use crate::forms::{PostForm, UploadedImage};
use crate::sessions::SESSION_COOKIE;
use crate::users::UserView;
use axum::extract::{FromRequest, FromRequestParts, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use axum_extra::extract::CookieJar;
use std::collections::HashMap;
use std::convert::Infallible;

/// Resolves the session cookie once per request and stores the resulting
/// [`Viewer`] as a request extension. Bad or stale cookies mean anonymous.
pub(super) async fn resolve_viewer(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let claims = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| state.sessions.verify(cookie.value()));
    let viewer = match claims {
        None => Viewer::Anonymous,
        Some(claims) => match state.users().find_by_username(&claims.sub) {
            Ok(Some(user)) if user.id == claims.uid => Viewer::User(user),
            Ok(_) => Viewer::Anonymous,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load session user");
                Viewer::Anonymous
            }
        },
    };
    request.extensions_mut().insert(viewer);
    next.run(request).await
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Viewer {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Viewer>().cloned().unwrap_or_default())
    }
}

/// An authenticated user. Anonymous requests are redirected to the login
/// page with the original path and query as `next`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserView);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Viewer>() {
            Some(Viewer::User(user)) => Ok(CurrentUser(user.clone())),
            _ => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/");
                Err(login_redirect(next).into_response())
            }
        }
    }
}

fn login_redirect(next: &str) -> Redirect {
    match serde_urlencoded::to_string([("next", next)]) {
        Ok(query) => Redirect::to(&format!("/auth/login/?{query}")),
        Err(_) => Redirect::to("/auth/login/"),
    }
}

/// The post form from either a multipart body (with an optional `image`
/// part) or a plain urlencoded body.
#[derive(Debug, Clone)]
pub struct PostFormInput(pub PostForm);

#[axum::async_trait]
impl<S: Send + Sync> FromRequest<S> for PostFormInput {
    type Rejection = WebError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if !is_multipart {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|err| WebError::BadRequest(err.body_text()))?;
            return Ok(PostFormInput(PostForm::from_fields(&fields, None)));
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|err| WebError::BadRequest(err.body_text()))?;
        let mut fields = HashMap::new();
        let mut image = None;
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| WebError::BadRequest(err.body_text()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == "image" {
                let file_name = field.file_name().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|err| WebError::BadRequest(err.body_text()))?;
                image = Some(UploadedImage {
                    file_name,
                    data: data.to_vec(),
                });
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|err| WebError::BadRequest(err.body_text()))?;
                fields.insert(name, value);
            }
        }
        Ok(PostFormInput(PostForm::from_fields(&fields, image)))
    }
}
