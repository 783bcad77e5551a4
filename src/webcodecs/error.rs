//! WebCodecs error taxonomy - spec compliant error handling
//!
//! Errors carry DOMException-style names per the WebCodecs processing model.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/DOMException
//!
//! Synchronous, caller-attributable failures are returned from API methods;
//! asynchronous backend failures are delivered through the error callback
//! before the instance transitions to `Closed`. Flush waiters reject with
//! `Abort` on reset/close and with `Encoding`/`Decoding` when a drain fails.

use thiserror::Error;

/// Error kinds raised by codec instances and the resource manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebCodecsError {
  /// Detached input, missing callback, or structurally invalid config
  #[error("TypeError: {0}")]
  Type(String),
  /// Operation on a closed instance, or encode/decode while unconfigured
  #[error("InvalidStateError: {0}")]
  InvalidState(String),
  /// Configuration declined by the backend
  #[error("NotSupportedError: {0}")]
  NotSupported(String),
  /// Malformed input (non-key first chunk, orientation mismatch)
  #[error("DataError: {0}")]
  Data(String),
  /// Fatal backend failure while encoding
  #[error("EncodingError: {0}")]
  Encoding(String),
  /// Fatal backend failure while decoding
  #[error("DecodingError: {0}")]
  Decoding(String),
  /// Operation aborted by a concurrent reset or close
  #[error("AbortError: {0}")]
  Abort(String),
  /// Instance reclaimed by the resource manager
  #[error("QuotaExceededError: {0}")]
  QuotaExceeded(String),
}

impl WebCodecsError {
  /// Stable DOMException-style name for this error kind.
  pub fn name(&self) -> &'static str {
    match self {
      WebCodecsError::Type(_) => "TypeError",
      WebCodecsError::InvalidState(_) => "InvalidStateError",
      WebCodecsError::NotSupported(_) => "NotSupportedError",
      WebCodecsError::Data(_) => "DataError",
      WebCodecsError::Encoding(_) => "EncodingError",
      WebCodecsError::Decoding(_) => "DecodingError",
      WebCodecsError::Abort(_) => "AbortError",
      WebCodecsError::QuotaExceeded(_) => "QuotaExceededError",
    }
  }

  /// Human-readable message without the name prefix.
  pub fn message(&self) -> &str {
    match self {
      WebCodecsError::Type(m)
      | WebCodecsError::InvalidState(m)
      | WebCodecsError::NotSupported(m)
      | WebCodecsError::Data(m)
      | WebCodecsError::Encoding(m)
      | WebCodecsError::Decoding(m)
      | WebCodecsError::Abort(m)
      | WebCodecsError::QuotaExceeded(m) => m,
    }
  }
}

/// Result alias used across the public API surface.
pub type WebCodecsResult<T> = Result<T, WebCodecsError>;

/// Helper for invalid argument types or structurally invalid configs.
pub fn type_error(message: &str) -> WebCodecsError {
  WebCodecsError::Type(message.to_string())
}

/// Helper for operating on a closed object or in the wrong state.
pub fn invalid_state_error(message: &str) -> WebCodecsError {
  WebCodecsError::InvalidState(message.to_string())
}

/// Helper for unsupported codecs or configurations.
pub fn not_supported_error(message: &str) -> WebCodecsError {
  WebCodecsError::NotSupported(message.to_string())
}

/// Helper for malformed input data.
pub fn data_error(message: &str) -> WebCodecsError {
  WebCodecsError::Data(message.to_string())
}

/// Helper for aborted operations.
pub fn abort_error(message: &str) -> WebCodecsError {
  WebCodecsError::Abort(message.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn names_are_stable() {
    assert_eq!(type_error("x").name(), "TypeError");
    assert_eq!(invalid_state_error("x").name(), "InvalidStateError");
    assert_eq!(not_supported_error("x").name(), "NotSupportedError");
    assert_eq!(data_error("x").name(), "DataError");
    assert_eq!(abort_error("x").name(), "AbortError");
    assert_eq!(
      WebCodecsError::QuotaExceeded("x".into()).name(),
      "QuotaExceededError"
    );
  }

  #[test]
  fn display_includes_name_prefix() {
    let err = WebCodecsError::Data("first chunk must be a key chunk".into());
    assert_eq!(
      err.to_string(),
      "DataError: first chunk must be a key chunk"
    );
    assert_eq!(err.message(), "first chunk must be a key chunk");
  }
}
