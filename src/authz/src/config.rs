//! Server configuration

use crate::error::{AuthzError, Result};
use serde::Deserialize;

/// Default header carrying the caller's external user id
pub const DEFAULT_USER_ID_HEADER: &str = "x-user-id";

/// Default header carrying the request id
pub const DEFAULT_REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Postgres connection string; the in-memory store is used when unset
    pub database_url: Option<String>,

    pub user_id_header: String,

    pub request_id_header: String,

    /// External user id seeded as admin into the in-memory store
    pub bootstrap_admin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: None,
            user_id_header: DEFAULT_USER_ID_HEADER.to_string(),
            request_id_header: DEFAULT_REQUEST_ID_HEADER.to_string(),
            bootstrap_admin: None,
        }
    }
}

impl ServerConfig {
    /// Load from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source; unset or blank variables keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(host) = var("HOST") {
            config.host = host;
        }
        if let Some(port) = var("PORT") {
            config.port = port
                .trim()
                .parse()
                .map_err(|e| AuthzError::InvalidInput(format!("invalid PORT {:?}: {}", port, e)))?;
        }
        config.database_url = var("DATABASE_URL");
        if let Some(header) = var("RBAC_USER_ID_HEADER") {
            config.user_id_header = header_name(&header)?;
        }
        if let Some(header) = var("RBAC_REQUEST_ID_HEADER") {
            config.request_id_header = header_name(&header)?;
        }
        config.bootstrap_admin = var("RBAC_BOOTSTRAP_ADMIN");

        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn header_name(value: &str) -> Result<String> {
    let name = value.trim().to_ascii_lowercase();
    axum::http::HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| AuthzError::InvalidInput(format!("invalid header name {:?}: {}", value, e)))?;
    Ok(name)
}
