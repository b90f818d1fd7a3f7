//! services/api/src/web/upload.rs
//!
//! Reads a single named file part out of a multipart request.

use axum::extract::Multipart;
use bytes::Bytes;

use crate::error::{ApiError, ApiResult};

/// A file received from the client, not yet stored.
pub struct Upload {
    pub file_name: String,
    pub data: Bytes,
}

/// Pulls the part called `field` from the form. Other parts are skipped.
pub async fn read_file_part(multipart: &mut Multipart, field: &str) -> ApiResult<Upload> {
    while let Some(part) = multipart.next_field().await? {
        if part.name() != Some(field) {
            continue;
        }
        let file_name = part.file_name().unwrap_or(field).to_string();
        let data = part.bytes().await?;
        if data.is_empty() {
            return Err(ApiError::BadRequest(format!("The '{}' part is empty.", field)));
        }
        return Ok(Upload { file_name, data });
    }
    Err(ApiError::BadRequest(format!(
        "A multipart part named '{}' is required.",
        field
    )))
}
