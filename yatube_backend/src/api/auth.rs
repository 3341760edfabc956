use super::{base_context, AppState, WebResult};
use crate::authz::Viewer;
use crate::error::{FieldErrors, ServiceError};
use crate::forms::{safe_next, LoginForm, SignupForm};
use crate::users::UserView;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect};
use axum::Form;
use axum_extra::extract::CookieJar;
use serde::Deserialize;

const INVALID_LOGIN: &str = "Please enter a correct username and password. Note that both fields may be case-sensitive.";

#[derive(Debug, Default, Deserialize)]
pub(super) struct NextParams {
    next: Option<String>,
}

fn start_session(state: &AppState, jar: CookieJar, user: &UserView) -> WebResult<CookieJar> {
    let token = state.sessions.issue(user)?;
    Ok(jar.add(state.sessions.cookie(token)))
}

fn render_signup(state: &AppState, viewer: &Viewer, form: &SignupForm, errors: &FieldErrors) -> WebResult {
    let mut context = base_context(viewer);
    context.insert("form", form);
    context.insert("errors", errors);
    Ok(state.render("auth/signup.html", &context)?.into_response())
}

fn render_login(state: &AppState, viewer: &Viewer, form: &LoginForm, errors: &FieldErrors) -> WebResult {
    let mut context = base_context(viewer);
    context.insert("form", form);
    context.insert("errors", errors);
    Ok(state.render("auth/login.html", &context)?.into_response())
}

pub(super) async fn signup_form(State(state): State<AppState>, viewer: Viewer) -> WebResult {
    render_signup(&state, &viewer, &SignupForm::default(), &FieldErrors::default())
}

pub(super) async fn signup(
    State(state): State<AppState>,
    viewer: Viewer,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> WebResult {
    let registered = form.clean_password().and_then(|password| {
        state
            .users()
            .register(&form.username, &password, &form.first_name, &form.last_name)
    });
    match registered {
        Ok(user) => {
            let jar = start_session(&state, jar, &user)?;
            Ok((jar, Redirect::to("/")).into_response())
        }
        Err(ServiceError::Validation(errors)) => render_signup(&state, &viewer, &form, &errors),
        Err(err) => Err(err.into()),
    }
}

pub(super) async fn login_form(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(params): Query<NextParams>,
) -> WebResult {
    let form = LoginForm {
        next: params.next,
        ..Default::default()
    };
    render_login(&state, &viewer, &form, &FieldErrors::default())
}

pub(super) async fn login(
    State(state): State<AppState>,
    viewer: Viewer,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> WebResult {
    match state.users().authenticate(&form.username, &form.password)? {
        Some(user) => {
            tracing::info!(username = %user.username, "user logged in");
            let jar = start_session(&state, jar, &user)?;
            let next = safe_next(form.next.as_deref()).to_string();
            Ok((jar, Redirect::to(&next)).into_response())
        }
        None => {
            let errors = FieldErrors::single(FieldErrors::NON_FIELD, INVALID_LOGIN);
            render_login(&state, &viewer, &form, &errors)
        }
    }
}

pub(super) async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    (jar.remove(state.sessions.removal_cookie()), Redirect::to("/"))
}
