//! Gateway rejections and the JSON envelope written on every terminal branch.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::jwt::ValidationOutcome;

/// Why an access token was refused without attempting a reissue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidTokenReason {
    BadSignature,
    MalformedFormat,
    UnsupportedFormat,
    /// A refresh token was presented as the bearer credential
    WrongKind,
    Other,
}

impl InvalidTokenReason {
    fn as_str(&self) -> &'static str {
        match self {
            Self::BadSignature => "bad signature",
            Self::MalformedFormat => "malformed format",
            Self::UnsupportedFormat => "unsupported format",
            Self::WrongKind => "wrong token kind",
            Self::Other => "invalid",
        }
    }
}

impl From<&ValidationOutcome> for InvalidTokenReason {
    fn from(outcome: &ValidationOutcome) -> Self {
        match outcome {
            ValidationOutcome::BadSignature => Self::BadSignature,
            ValidationOutcome::MalformedFormat => Self::MalformedFormat,
            ValidationOutcome::UnsupportedFormat => Self::UnsupportedFormat,
            _ => Self::Other,
        }
    }
}

/// Terminal failures of the gateway state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayRejection {
    MissingOrMalformedHeader,
    InvalidToken(InvalidTokenReason),
    RoleDenied,
    RefreshRecordNotFound,
    RefreshTokenInvalid,
    StoreUnavailable,
    TokenIssueFailed,
}

impl GatewayRejection {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingOrMalformedHeader
            | Self::InvalidToken(_)
            | Self::RefreshRecordNotFound
            | Self::RefreshTokenInvalid => StatusCode::UNAUTHORIZED,
            Self::RoleDenied => StatusCode::FORBIDDEN,
            Self::StoreUnavailable | Self::TokenIssueFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message; `None` means the response has no body.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            Self::MissingOrMalformedHeader => None,
            Self::InvalidToken(_) => Some("invalid token"),
            Self::RoleDenied => Some("access denied"),
            Self::RefreshRecordNotFound => Some("invalid refresh token"),
            Self::RefreshTokenInvalid => Some("expired refresh token"),
            Self::StoreUnavailable | Self::TokenIssueFailed => Some("internal server error"),
        }
    }
}

impl std::fmt::Display for GatewayRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingOrMalformedHeader => write!(f, "missing or malformed authorization header"),
            Self::InvalidToken(reason) => write!(f, "invalid access token: {}", reason.as_str()),
            Self::RoleDenied => write!(f, "role not permitted on route"),
            Self::RefreshRecordNotFound => write!(f, "no refresh record for identity"),
            Self::RefreshTokenInvalid => write!(f, "stored refresh token failed validation"),
            Self::StoreUnavailable => write!(f, "refresh store unavailable"),
            Self::TokenIssueFailed => write!(f, "failed to mint tokens"),
        }
    }
}

impl std::error::Error for GatewayRejection {}

impl IntoResponse for GatewayRejection {
    fn into_response(self) -> Response {
        match self.message() {
            Some(message) => GatewayResponse::new(self.status_code(), message).into_response(),
            None => self.status_code().into_response(),
        }
    }
}

/// `{statusCode, message, accessToken?}` body of every response the gateway
/// writes itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub status_code: u16,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl GatewayResponse {
    pub fn new(status: StatusCode, message: &'static str) -> Self {
        Self {
            status_code: status.as_u16(),
            message,
            access_token: None,
        }
    }

    /// 200 carrying the replacement access token.
    pub fn reissued(access_token: String) -> Self {
        Self {
            access_token: Some(access_token),
            ..Self::new(StatusCode::OK, "success reissued token")
        }
    }
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}
