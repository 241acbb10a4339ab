// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared HTTP response classification for the reqwest-based drivers.

use mgit_error::{ErrorCode, MgitError};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

/// Classify a provider HTTP response's status and, on success, deserialize
/// its JSON body. Shared across the GitHub/Azure DevOps/Bitbucket drivers
/// so each one maps the same family of transport failures onto the same
/// `mgit-error` codes (spec.md §4.2's error column).
pub(crate) async fn classify_response<T: DeserializeOwned>(resp: Response, provider: &str) -> Result<T, MgitError> {
    let status = resp.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(MgitError::new(ErrorCode::RateLimited, format!("{provider} rate limit exceeded"))
            .with_context("status", status.as_u16()));
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(MgitError::new(ErrorCode::AuthFailed, format!("{provider} rejected credential"))
            .with_context("status", status.as_u16()));
    }
    if !status.is_success() {
        return Err(MgitError::new(ErrorCode::NetworkError, format!("{provider} returned {status}"))
            .with_context("status", status.as_u16()));
    }
    resp.json::<T>()
        .await
        .map_err(|e| MgitError::new(ErrorCode::ProviderSchemaError, format!("unexpected {provider} response shape: {e}")))
}

/// True for error codes the core (or a driver's own internal retry loop)
/// should retry per spec.md §7.
pub(crate) fn is_retryable(err: &MgitError) -> bool {
    err.code.is_retryable()
}
