//! Centralized error types for the IpWeather service.
//!
//! This module provides a typed error hierarchy that:
//! - Separates request outcomes (rate limiting, upstream failure) from infrastructure faults
//! - Provides client-facing messages and status codes for the HTTP boundary
//! - Preserves full error context for debugging/logging

use thiserror::Error;

/// Request-level error returned by the request pipeline.
///
/// Each variant maps to one HTTP status and one client-facing message.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("All weather providers failed")]
    UpstreamUnavailable,

    #[error("Could not determine client address")]
    InvalidClient,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl ServiceError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::RateLimitExceeded => 403,
            ServiceError::UpstreamUnavailable => 502,
            ServiceError::InvalidClient => 400,
            ServiceError::Database(_) => 500,
        }
    }

    /// Message placed in the `error` field of the response body.
    pub fn user_message(&self) -> &'static str {
        match self {
            ServiceError::RateLimitExceeded => "Rate limit exceeded",
            ServiceError::UpstreamUnavailable => "Unable to retrieve weather from both sources",
            ServiceError::InvalidClient => "Unable to determine client address",
            ServiceError::Database(_) => "Internal server error",
        }
    }
}

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Database/storage errors (SQLite).
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Data corruption detected: {0}")]
    Corruption(String),

    #[error("Stored data could not be encoded or decoded: {0}")]
    Serialization(String),

    #[error("Storage task failed: {0}")]
    TaskFailed(String),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Configuration IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_connect() {
            NetworkError::ConnectionFailed(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else if self.is_decode() || self.is_body() {
            NetworkError::InvalidResponse(self.to_string())
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}

/// Extension trait for converting rusqlite errors to our error types.
pub trait RusqliteErrorExt {
    fn into_database_error(self) -> DatabaseError;
}

impl RusqliteErrorExt for rusqlite::Error {
    fn into_database_error(self) -> DatabaseError {
        match &self {
            rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("corrupt") => {
                DatabaseError::Corruption(self.to_string())
            }
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::CannotOpen =>
            {
                DatabaseError::ConnectionFailed(self.to_string())
            }
            _ => DatabaseError::QueryFailed(self.to_string()),
        }
    }
}
