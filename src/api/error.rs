//! Failure taxonomy for requests made on behalf of the cache.

use std::fmt;
use thiserror::Error;

/// A failed request to the content API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
  /// Connection failures and timeouts
  #[error("network error: {0}")]
  Network(String),

  /// Non-success response from the API
  #[error("server error {status}: {message}")]
  Server { status: u16, message: String },

  /// The response body did not have the expected shape
  #[error("unexpected response: {0}")]
  Decode(String),
}

impl FetchError {
  pub fn status(&self) -> Option<u16> {
    match self {
      FetchError::Server { status, .. } => Some(*status),
      _ => None,
    }
  }
}

impl From<serde_json::Error> for FetchError {
  fn from(err: serde_json::Error) -> Self {
    FetchError::Decode(err.to_string())
  }
}

impl From<reqwest::Error> for FetchError {
  fn from(err: reqwest::Error) -> Self {
    if let Some(status) = err.status() {
      FetchError::Server {
        status: status.as_u16(),
        message: status
          .canonical_reason()
          .unwrap_or("request failed")
          .to_string(),
      }
    } else if err.is_decode() {
      FetchError::Decode(err.to_string())
    } else {
      FetchError::Network(err.to_string())
    }
  }
}

/// Normalized error stored on a cache entry and handed to views verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
  pub message: String,
  pub status: Option<u16>,
}

impl ErrorInfo {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      status: None,
    }
  }
}

impl From<FetchError> for ErrorInfo {
  fn from(err: FetchError) -> Self {
    let status = err.status();
    let message = match err {
      FetchError::Network(message)
      | FetchError::Server { message, .. }
      | FetchError::Decode(message) => message,
    };
    Self { message, status }
  }
}

impl fmt::Display for ErrorInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.status {
      Some(status) => write!(f, "{} ({})", self.message, status),
      None => f.write_str(&self.message),
    }
  }
}

impl std::error::Error for ErrorInfo {}

/// A mutation payload rejected before it is sent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
  #[error("{0} must not be empty")]
  Empty(&'static str),

  #[error("{field} is invalid: {reason}")]
  Invalid { field: &'static str, reason: String },

  #[error("nothing to update")]
  NoChanges,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_server_error_keeps_message_and_status() {
    let info = ErrorInfo::from(FetchError::Server {
      status: 404,
      message: "Article not found".to_string(),
    });
    assert_eq!(info.status, Some(404));
    assert_eq!(info.message, "Article not found");
    assert_eq!(info.to_string(), "Article not found (404)");
  }

  #[test]
  fn test_network_error_has_no_status() {
    let info = ErrorInfo::from(FetchError::Network("timeout of 3000ms exceeded".to_string()));
    assert_eq!(info.status, None);
    assert_eq!(info.to_string(), "timeout of 3000ms exceeded");
  }

  #[test]
  fn test_decode_error_from_serde() {
    let err: FetchError = serde_json::from_str::<u32>("\"nope\"").unwrap_err().into();
    assert!(matches!(err, FetchError::Decode(_)));
    assert!(err.to_string().starts_with("unexpected response"));
  }

  #[test]
  fn test_validation_messages() {
    assert_eq!(
      ValidationError::Empty("title").to_string(),
      "title must not be empty"
    );
    assert_eq!(ValidationError::NoChanges.to_string(), "nothing to update");
  }
}
