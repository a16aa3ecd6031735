//! Error types for the SIGA-EDU client.

use thiserror::Error;

/// Errors that can occur while talking to the portal or reading its pages.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SigaError {
    /// The portal rejected the credentials
    #[error("Login failed for user '{user}': {message}")]
    Authentication { user: String, message: String },

    /// Network/HTTP request failed (unreachable host, timeout, broken body)
    #[error("Network error: {message}")]
    Network { message: String },

    /// Session has expired - the portal sent us back to the login page
    #[error("Session expired, redirected to: {redirect_url}")]
    SessionExpired { redirect_url: String },

    /// Server returned a status we do not know how to handle
    #[error("Unexpected response: {message}")]
    UnexpectedResponse { message: String },

    /// Operation called in the wrong navigation state
    #[error("Invalid navigation state: {message}")]
    State { message: String },

    /// Page markup did not have the expected structure
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Lookup by name found nothing
    #[error("No subject named '{name}'")]
    NotFound { name: String },

    /// URL parsing/construction failed
    #[error("URL error: {message}")]
    Url { message: String },
}

impl SigaError {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        SigaError::Parse {
            message: message.into(),
        }
    }

    pub(crate) fn state(message: impl Into<String>) -> Self {
        SigaError::State {
            message: message.into(),
        }
    }

    /// Returns true if a new login is required before any further call.
    pub fn needs_reauth(&self) -> bool {
        matches!(
            self,
            SigaError::SessionExpired { .. } | SigaError::Authentication { .. }
        )
    }

    /// Returns true if the portal could not be reached at all.
    pub fn is_network(&self) -> bool {
        matches!(self, SigaError::Network { .. })
    }
}

impl From<reqwest::Error> for SigaError {
    fn from(err: reqwest::Error) -> Self {
        SigaError::Network {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for SigaError {
    fn from(err: url::ParseError) -> Self {
        SigaError::Url {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_reauth() {
        let expired = SigaError::SessionExpired {
            redirect_url: "https://siga.example/login.jsf".to_string(),
        };
        assert!(expired.needs_reauth());
        assert!(!SigaError::parse("missing table").needs_reauth());
        assert!(!SigaError::NotFound {
            name: "Física".to_string()
        }
        .needs_reauth());
    }

    #[test]
    fn test_url_error_conversion() {
        let err: SigaError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, SigaError::Url { .. }));
        assert!(!err.is_network());
    }
}
