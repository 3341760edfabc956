use crate::users::UserView;
use anyhow::{Context, Result};
use axum_extra::extract::cookie::{Cookie, SameSite};
use jsonwebtoken::{decode, encode, get_current_timestamp, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const SESSION_COOKIE: &str = "yatube_session";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// user.username
    pub sub: String,
    /// user.id, so a re-registered username does not inherit the session
    pub uid: i64,
    /// Creation time as unix timestamp
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

/// HS256 signing keys for session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, user: &UserView) -> Result<String> {
        let now = get_current_timestamp();
        let claims = Claims {
            sub: user.username.clone(),
            uid: user.id,
            iat: now,
            exp: now + self.ttl.as_secs(),
        };
        encode(&Header::default(), &claims, &self.encoding).context("failed to sign session token")
    }

    /// `None` for tampered, foreign or expired tokens.
    pub fn verify(&self, token: &str) -> Option<Claims> {
        match decode::<Claims>(token, &self.decoding, &Validation::default()) {
            Ok(data) => Some(data.claims),
            Err(err) => {
                tracing::debug!(error = %err, "rejected session token");
                None
            }
        }
    }

    pub fn cookie(&self, token: String) -> Cookie<'static> {
        let max_age = time::Duration::seconds(i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX));
        let mut cookie = base_cookie(token);
        cookie.set_max_age(max_age);
        cookie
    }

    /// A cookie with the session's name and path, for `CookieJar::remove`.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        base_cookie(String::new())
    }
}

fn base_cookie(value: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .same_site(SameSite::Lax)
        .path("/")
        .http_only(true)
        .build()
}
