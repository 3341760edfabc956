mod about;
mod auth;
mod extract;
mod posts;
mod profiles;

pub use extract::{CurrentUser, PostFormInput};

use crate::authz::Viewer;
use crate::cache::PageCache;
use crate::config::YatubeConfig;
use crate::database::Database;
use crate::error::ServiceError;
use crate::files::FileService;
use crate::follows::FollowService;
use crate::groups::GroupService;
use crate::posts::PostService;
use crate::sessions::SessionKeys;
use crate::users::UserService;
use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tera::Tera;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: YatubeConfig,
    pub database: Database,
    pub templates: Arc<Tera>,
    pub cache: PageCache,
    pub sessions: SessionKeys,
}

impl AppState {
    pub fn new(config: YatubeConfig, database: Database, session_secret: &str) -> Result<Self> {
        let templates = Tera::new(&config.paths.templates_glob).with_context(|| {
            format!("failed to load templates from {}", config.paths.templates_glob)
        })?;
        let cache = PageCache::new(&config.cache);
        let sessions = SessionKeys::new(session_secret, config.auth.session_ttl);
        Ok(Self {
            config,
            database,
            templates: Arc::new(templates),
            cache,
            sessions,
        })
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.database.clone(), self.config.auth.bcrypt_cost)
    }

    pub fn groups(&self) -> GroupService {
        GroupService::new(self.database.clone())
    }

    pub fn posts(&self) -> PostService {
        PostService::new(
            self.database.clone(),
            FileService::new(self.config.paths.clone()),
            self.config.listing.posts_per_page,
        )
        .with_cache(self.cache.clone())
    }

    pub fn follows(&self) -> FollowService {
        FollowService::new(self.database.clone(), self.users(), self.posts())
    }

    pub(crate) fn render_string(&self, template: &str, context: &tera::Context) -> Result<String, WebError> {
        self.templates
            .render(template, context)
            .with_context(|| format!("failed to render {template}"))
            .map_err(WebError::Internal)
    }

    pub(crate) fn render(&self, template: &str, context: &tera::Context) -> Result<Html<String>, WebError> {
        self.render_string(template, context).map(Html)
    }
}

/// Context every page starts from: the signed-in user, if any, for the
/// navigation bar.
pub(crate) fn base_context(viewer: &Viewer) -> tera::Context {
    let mut context = tera::Context::new();
    context.insert("user", &viewer.user());
    context
}

pub(crate) type WebResult<T = Response> = Result<T, WebError>;

#[derive(Debug)]
pub enum WebError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

/// Marks a response whose body is replaced by an error page on the way out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorPage {
    NotFound,
    ServerError,
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self {
            WebError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            WebError::NotFound(what) => {
                tracing::debug!(%what, "not found");
                (StatusCode::NOT_FOUND, Extension(ErrorPage::NotFound)).into_response()
            }
            WebError::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Extension(ErrorPage::ServerError),
                )
                    .into_response()
            }
        }
    }
}

impl From<anyhow::Error> for WebError {
    fn from(err: anyhow::Error) -> Self {
        WebError::Internal(err)
    }
}

impl From<ServiceError> for WebError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(what) => WebError::NotFound(what),
            ServiceError::Validation(errors) => WebError::BadRequest(errors.to_string()),
            ServiceError::Internal(err) => WebError::Internal(err),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.upload.max_upload_bytes;
    Router::new()
        .route("/health", get(health_handler))
        .route("/", get(posts::index))
        .route("/group/:slug/", get(posts::group_posts))
        .route("/new/", get(posts::new_post_form).post(posts::create_post))
        .route("/follow/", get(profiles::follow_index))
        .route("/about/author/", get(about::author))
        .route("/about/tech/", get(about::tech))
        .route("/auth/signup/", get(auth::signup_form).post(auth::signup))
        .route("/auth/login/", get(auth::login_form).post(auth::login))
        .route("/auth/logout/", get(auth::logout))
        .route("/:username/", get(profiles::profile))
        .route("/:username/follow/", get(profiles::profile_follow))
        .route("/:username/unfollow/", get(profiles::profile_unfollow))
        .route("/:username/:post_id/", get(posts::post_view))
        .route(
            "/:username/:post_id/edit/",
            get(posts::post_edit_form).post(posts::post_edit),
        )
        .route(
            "/:username/:post_id/comment/",
            get(posts::comment_redirect).post(posts::add_comment),
        )
        .fallback(fallback_handler)
        .layer(middleware::from_fn_with_state(state.clone(), render_error_pages))
        .layer(middleware::from_fn_with_state(state.clone(), extract::resolve_viewer))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Tries to bind to the given port, or finds the next available port
async fn find_available_port(start_port: u16) -> Result<(TcpListener, u16)> {
    const MAX_PORT_ATTEMPTS: u16 = 100;

    for offset in 0..MAX_PORT_ATTEMPTS {
        let port = start_port.saturating_add(offset);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok((listener, port)),
            Err(e) => {
                if offset == 0 {
                    tracing::debug!(port, error = %e, "Port in use, trying next port");
                }
                continue;
            }
        }
    }

    anyhow::bail!(
        "Could not find available port in range {}-{}",
        start_port,
        start_port.saturating_add(MAX_PORT_ATTEMPTS - 1)
    )
}

pub async fn serve_http(config: YatubeConfig, database: Database, session_secret: String) -> Result<()> {
    let requested_port = config.api_port;
    let state = AppState::new(config, database, &session_secret)?;
    let router = router(state);

    let (listener, actual_port) = find_available_port(requested_port).await?;
    let addr = SocketAddr::from(([0, 0, 0, 0], actual_port));

    if actual_port != requested_port {
        tracing::warn!(
            requested_port,
            actual_port,
            "Configured port was in use, bound to next available port"
        );
    }

    tracing::info!(?addr, "HTTP server listening");
    axum::serve(listener, router.into_make_service()).await?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    api_port: u16,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        api_port: state.config.api_port,
    })
}

/// Unknown routes. A GET without the trailing slash is sent to the slashed
/// URL first, the way every page route is spelled.
async fn fallback_handler(method: Method, uri: axum::http::Uri) -> WebResult {
    let path = uri.path();
    if method == Method::GET && !path.ends_with('/') {
        let target = match uri.query() {
            Some(query) => format!("{path}/?{query}"),
            None => format!("{path}/"),
        };
        return Ok(Redirect::permanent(&target).into_response());
    }
    Err(WebError::NotFound(path.to_string()))
}

/// Swaps the empty body of a marked error response for the 404 or 500 page.
async fn render_error_pages(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let viewer = request
        .extensions()
        .get::<Viewer>()
        .cloned()
        .unwrap_or_default();
    let response = next.run(request).await;
    let Some(page) = response.extensions().get::<ErrorPage>().copied() else {
        return response;
    };

    let template = match page {
        ErrorPage::NotFound => "misc/404.html",
        ErrorPage::ServerError => "misc/500.html",
    };
    let mut context = base_context(&viewer);
    context.insert("path", &path);
    match state.templates.render(template, &context) {
        Ok(body) => (response.status(), Html(body)).into_response(),
        Err(err) => {
            tracing::error!(error = ?err, template, "failed to render error page");
            response
        }
    }
}
