/// Request identity for feed-assembly-service
///
/// Authentication happens upstream. The gateway forwards the identity
/// provider's stable per-call viewer identifier in `x-viewer-id`.
use actix_web::{FromRequest, HttpRequest};
use std::future::{ready, Ready};

use crate::error::AppError;

pub const VIEWER_ID_HEADER: &str = "x-viewer-id";

/// Viewer identifier taken from the request headers.
///
/// Use `Option<ViewerId>` on endpoints that also serve anonymous callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerId(pub String);

impl ViewerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn viewer_from_headers(req: &HttpRequest) -> Result<ViewerId, AppError> {
    let value = req
        .headers()
        .get(VIEWER_ID_HEADER)
        .ok_or_else(|| AppError::Authentication("Missing viewer identity".to_string()))?;

    let viewer = value
        .to_str()
        .map_err(|_| AppError::Authentication("Invalid viewer identity".to_string()))?
        .trim();

    if viewer.is_empty() {
        return Err(AppError::Authentication(
            "Missing viewer identity".to_string(),
        ));
    }

    Ok(ViewerId(viewer.to_string()))
}

impl FromRequest for ViewerId {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        ready(viewer_from_headers(req))
    }
}
