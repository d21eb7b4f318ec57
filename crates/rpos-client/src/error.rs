//! Error type for upstream API calls.
//!
//! Callers in the wizard treat most of these identically (fail closed /
//! degrade to a fallback); the variants exist so logs can say what actually
//! happened.

use std::fmt;

#[derive(Debug)]
pub enum ClientError {
    /// Network or transport failure, including timeouts.
    Transport(String),
    /// The upstream answered with a non-2xx status or an application-level
    /// "unsuccessful" body.
    Api {
        status: Option<u16>,
        message: String,
    },
    /// A response payload could not be decoded.
    Decode(String),
    /// The client could not be constructed from configuration.
    Config(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Transport(msg) => write!(f, "transport error: {msg}"),
            ClientError::Api {
                status: Some(code),
                message,
            } => write!(f, "upstream api error status={code}: {message}"),
            ClientError::Api {
                status: None,
                message,
            } => write!(f, "upstream api error: {message}"),
            ClientError::Decode(msg) => write!(f, "decode error: {msg}"),
            ClientError::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for ClientError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_api_with_status() {
        let err = ClientError::Api {
            status: Some(503),
            message: "unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "upstream api error status=503: unavailable");
    }

    #[test]
    fn display_api_without_status() {
        let err = ClientError::Api {
            status: None,
            message: "lookup unsuccessful".to_string(),
        };
        assert_eq!(err.to_string(), "upstream api error: lookup unsuccessful");
    }

    #[test]
    fn display_transport() {
        let err = ClientError::Transport("connection refused".to_string());
        assert_eq!(err.to_string(), "transport error: connection refused");
    }
}
