//! Instagram webhook placeholder.

use crate::error::ApiError;

pub async fn instagram_webhook() -> ApiError {
    ApiError::NotImplemented("Instagram webhook not implemented")
}
