//! Typed request and response bodies for the auth endpoints.

use serde::{Deserialize, Serialize};

use crate::auth::{Profile, Session, TokenPair};

pub const SIGNUP_PATH: &str = "/signup";
pub const LOGIN_PATH: &str = "/login";
pub const FORGOT_PASSWORD_PATH: &str = "/forgot-password";
pub const RESET_PASSWORD_PATH: &str = "/reset-password";
pub const REFRESH_PATH: &str = "/refresh";

#[derive(Clone, Serialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

#[derive(Clone, Serialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub(crate) struct ForgotPasswordRequest<'a> {
    pub email: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResetPasswordRequest<'a> {
    pub token: &'a str,
    pub new_password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Success payload of `/login` and `/signup`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuthPayload {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub user: Option<Profile>,
}

/// Some deployments wrap the auth payload in a `data` envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum AuthResponse {
    Bare(AuthPayload),
    Enveloped { data: AuthPayload },
}

impl AuthResponse {
    pub fn into_session(self) -> Session {
        let payload = match self {
            AuthResponse::Bare(payload) => payload,
            AuthResponse::Enveloped { data } => data,
        };
        Session::authenticated(
            TokenPair::new(payload.access_token, payload.refresh_token),
            payload.user,
        )
    }
}

/// Success payload of `/refresh`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
}

impl From<RefreshResponse> for TokenPair {
    fn from(response: RefreshResponse) -> Self {
        TokenPair::new(response.access_token, response.refresh_token)
    }
}

/// Success payload of the password endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct MessageResponse {
    pub message: String,
}
