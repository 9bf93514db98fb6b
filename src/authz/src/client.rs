//! HTTP client for a remote authorization server
//!
//! [`RbacClient`] implements [`RbacAuthorizer`], so an [`RbacGuard`](crate::RbacGuard)
//! can gate operations against a server running elsewhere. The caller's user
//! id and request id travel in the same headers the server reads them from.
//!
//! Non-success replies keep their meaning: a 503 from the server, or a server
//! that cannot be reached, is a store failure and never a deny.

use crate::config::{ServerConfig, DEFAULT_REQUEST_ID_HEADER, DEFAULT_USER_ID_HEADER};
use crate::context::RbacContext;
use crate::error::{AuthzError, Result};
use crate::guard::RbacAuthorizer;
use crate::types::{AuthRequest, AuthResponse};
use async_trait::async_trait;
use reqwest::header::HeaderName;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

/// Default timeout for one authorization round trip
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Error body returned by the server
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Client for `POST /v1/authorize` on a remote server
#[derive(Debug, Clone)]
pub struct RbacClient {
    http: Client,
    authorize_url: String,
    user_id_header: HeaderName,
    request_id_header: HeaderName,
}

impl RbacClient {
    /// Create a client for the server at `base_url`, using the default headers
    ///
    /// # Example
    /// ```no_run
    /// use rbac_authz::{Action, RbacClient, RbacGuard, Resource};
    /// use std::sync::Arc;
    ///
    /// # fn example() -> rbac_authz::Result<()> {
    /// let client = RbacClient::new("http://rbac.internal:8080")?;
    /// let _guard: RbacGuard = RbacGuard::new(Arc::new(client))
    ///     .require(Action::Read, Resource::hdfs("hdfs://nn/reports"));
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_headers(base_url, DEFAULT_USER_ID_HEADER, DEFAULT_REQUEST_ID_HEADER)
    }

    /// Create a client that sends the headers the given server config reads
    pub fn from_config(base_url: &str, config: &ServerConfig) -> Result<Self> {
        Self::with_headers(base_url, &config.user_id_header, &config.request_id_header)
    }

    /// Create a client with custom user id and request id headers
    pub fn with_headers(base_url: &str, user_id_header: &str, request_id_header: &str) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(AuthzError::InvalidInput("authorization server url cannot be blank".to_string()));
        }

        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| AuthzError::Internal(format!("failed to build http client: {}", e)))?;

        debug!("initializing client for authorization server {}", base_url);
        Ok(Self {
            http,
            authorize_url: format!("{}/v1/authorize", base_url),
            user_id_header: header(user_id_header)?,
            request_id_header: header(request_id_header)?,
        })
    }
}

fn header(name: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| AuthzError::InvalidInput(format!("invalid header name {:?}: {}", name, e)))
}

/// Map a non-success reply to the error the server raised
fn status_error(status: StatusCode, message: String) -> AuthzError {
    match status {
        StatusCode::BAD_REQUEST => AuthzError::InvalidInput(message),
        StatusCode::UNAUTHORIZED => AuthzError::NotAuthenticated(message),
        StatusCode::FORBIDDEN => AuthzError::Forbidden(message),
        StatusCode::NOT_FOUND => AuthzError::NotFound(message),
        StatusCode::CONFLICT => AuthzError::Conflict(message),
        StatusCode::SERVICE_UNAVAILABLE => AuthzError::DatabaseError(message),
        other => AuthzError::Internal(format!("authorization server replied {}: {}", other, message)),
    }
}

#[async_trait]
impl RbacAuthorizer for RbacClient {
    async fn authorize(&self, ctx: &RbacContext, request: AuthRequest) -> Result<AuthResponse> {
        debug!(
            request_id = %ctx.request_id(),
            "authorizing {} accesses against {}",
            request.resource_accesses.len(),
            self.authorize_url
        );

        let mut builder = self
            .http
            .post(&self.authorize_url)
            .header(self.request_id_header.clone(), ctx.request_id())
            .json(&request);
        if let Some(user_id) = ctx.user_id() {
            builder = builder.header(self.user_id_header.clone(), user_id);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_builder() {
                return AuthzError::InvalidInput(format!("invalid authorization request: {}", e));
            }
            error!(request_id = %ctx.request_id(), "authorization server unreachable: {}", e);
            AuthzError::DatabaseError(format!("authorization server unreachable: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.message)
                .unwrap_or(text);
            debug!(request_id = %ctx.request_id(), status = status.as_u16(), "authorization rejected: {}", message);
            return Err(status_error(status, message));
        }

        response
            .json::<AuthResponse>()
            .await
            .map_err(|e| AuthzError::Internal(format!("malformed authorization response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (StatusCode::BAD_REQUEST, "InvalidInput"),
            (StatusCode::UNAUTHORIZED, "NotAuthenticated"),
            (StatusCode::FORBIDDEN, "Forbidden"),
            (StatusCode::NOT_FOUND, "NotFound"),
            (StatusCode::CONFLICT, "Conflict"),
            (StatusCode::SERVICE_UNAVAILABLE, "DatabaseError"),
            (StatusCode::BAD_GATEWAY, "Internal"),
        ];
        for (status, expected) in cases {
            let err = status_error(status, "x".to_string());
            assert!(format!("{:?}", err).starts_with(expected), "{} -> {:?}", status, err);
        }
        assert!(status_error(StatusCode::SERVICE_UNAVAILABLE, String::new()).is_store_failure());
    }

    #[test]
    fn test_base_url_normalized() {
        let client = RbacClient::new("http://localhost:8080/").unwrap();
        assert_eq!(client.authorize_url, "http://localhost:8080/v1/authorize");
        assert!(RbacClient::new("  ").is_err());
        assert!(RbacClient::with_headers("http://h", "bad header", "x-request-id").is_err());
    }
}
