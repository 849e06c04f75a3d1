// SPDX-License-Identifier: MIT

use serde::Serialize;

/// Stable error taxonomy surfaced to API callers.
///
/// No HTTP layer lives in this crate, but the (out-of-scope) API layer is
/// written against this contract, so the codes, their fixed status mapping
/// and their `{"error":{"code","message"}}` envelope are modeled here rather
/// than left implicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    WorkspaceNotFound,
    TooManyRequests,
    RunningLimitExceeded,
    UpstreamUnavailable,
}

impl ErrorCode {
    /// The fixed HTTP status this code maps to, for the layer that does speak HTTP.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorCode::Unauthorized => 401,
            ErrorCode::Forbidden => 403,
            ErrorCode::WorkspaceNotFound => 404,
            ErrorCode::TooManyRequests => 429,
            ErrorCode::RunningLimitExceeded => 429,
            ErrorCode::UpstreamUnavailable => 502,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::WorkspaceNotFound => "WORKSPACE_NOT_FOUND",
            ErrorCode::TooManyRequests => "TOO_MANY_REQUESTS",
            ErrorCode::RunningLimitExceeded => "RUNNING_LIMIT_EXCEEDED",
            ErrorCode::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
        }
    }
}

/// The fixed `{"error":{"code","message"}}` response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail { code, message: message.into() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_spec() {
        assert_eq!(ErrorCode::Unauthorized.http_status(), 401);
        assert_eq!(ErrorCode::Forbidden.http_status(), 403);
        assert_eq!(ErrorCode::WorkspaceNotFound.http_status(), 404);
        assert_eq!(ErrorCode::TooManyRequests.http_status(), 429);
        assert_eq!(ErrorCode::RunningLimitExceeded.http_status(), 429);
        assert_eq!(ErrorCode::UpstreamUnavailable.http_status(), 502);
    }

    #[test]
    fn serializes_as_the_fixed_envelope() {
        let body = ErrorBody::new(ErrorCode::WorkspaceNotFound, "no such workspace");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"]["code"], "WORKSPACE_NOT_FOUND");
        assert_eq!(json["error"]["message"], "no such workspace");
    }
}
