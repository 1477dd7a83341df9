//! Response envelopes
//!
//! Success bodies are `{success: true, data, meta?}`; failures are
//! `{success: false, error: {code, message}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Success envelope, carrying the status code it is sent with
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    #[serde(skip)]
    status: StatusCode,
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "ResponseMeta::is_empty")]
    meta: ResponseMeta,
}

/// Extra facts about a response that are not part of the resource itself
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    /// Number of items in a listing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    /// Whether a cancel request changed the operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_accepted: Option<bool>,
}

impl ResponseMeta {
    fn is_empty(&self) -> bool {
        self.total.is_none() && self.cancel_accepted.is_none()
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            success: true,
            data,
            meta: ResponseMeta::default(),
        }
    }

    /// 202: the work was queued, `data` identifies it
    pub fn accepted(data: T) -> Self {
        Self {
            status: StatusCode::ACCEPTED,
            ..Self::ok(data)
        }
    }

    pub fn with_meta(mut self, meta: ResponseMeta) -> Self {
        self.meta = meta;
        self
    }
}

impl<T: Serialize> ApiResponse<Vec<T>> {
    /// A whole collection, with its size in `meta.total`
    pub fn listing(items: Vec<T>) -> Self {
        let total = items.len();
        Self::ok(items).with_meta(ResponseMeta {
            total: Some(total),
            ..ResponseMeta::default()
        })
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

/// Failure envelope
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    success: bool,
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl ErrorResponse {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code,
                message: message.into(),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_meta_omitted_when_empty() {
        let body = serde_json::to_value(ApiResponse::ok(json!({ "removed": 2 }))).unwrap();
        assert_eq!(body, json!({ "success": true, "data": { "removed": 2 } }));
    }

    #[test]
    fn test_listing_reports_total() {
        let response = ApiResponse::listing(vec!["a", "b", "c"]);
        assert_eq!(response.status, StatusCode::OK);
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["meta"], json!({ "total": 3 }));
    }

    #[test]
    fn test_accepted_status_and_cancel_meta() {
        let response = ApiResponse::accepted("OP1").with_meta(ResponseMeta {
            cancel_accepted: Some(false),
            ..ResponseMeta::default()
        });
        assert_eq!(response.status, StatusCode::ACCEPTED);
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["meta"], json!({ "cancelAccepted": false }));
    }

    #[test]
    fn test_error_envelope() {
        let body = serde_json::to_value(ErrorResponse::new("NOT_FOUND", "no such transfer")).unwrap();
        assert_eq!(
            body,
            json!({ "success": false, "error": { "code": "NOT_FOUND", "message": "no such transfer" } })
        );
    }
}
