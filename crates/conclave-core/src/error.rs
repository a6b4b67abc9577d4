use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConclaveError {
    #[error("missing required setting: {0}")]
    MissingConfig(String),

    #[error("invalid setting {key}: {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("invalid rank key '{0}': expected phase, occupancy_asc or occupancy_desc")]
    InvalidRankKey(String),

    #[error("invalid category: {0}")]
    InvalidCategory(String),

    #[error("conclave api returned {status} for {endpoint}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("conclave api sent an unreadable {status} body for {endpoint}: {body}")]
    UnexpectedBody {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("notification failed: {0}")]
    Notify(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ConclaveError {
    /// Server-side (5xx) and transport failures are worth another attempt;
    /// everything else is final.
    pub fn is_transient(&self) -> bool {
        match self {
            ConclaveError::Api { status, .. } => *status >= 500,
            ConclaveError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConclaveError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> ConclaveError {
        ConclaveError::Api {
            endpoint: "/status".to_string(),
            status,
            body: String::new(),
        }
    }

    #[test]
    fn server_errors_are_transient() {
        assert!(api(500).is_transient());
        assert!(api(503).is_transient());
    }

    #[test]
    fn client_errors_are_final() {
        assert!(!api(400).is_transient());
        assert!(!api(409).is_transient());
        assert!(!ConclaveError::MissingConfig("CONCLAVE_TOKEN".into()).is_transient());
    }

    #[test]
    fn unreadable_body_is_final() {
        let err = ConclaveError::UnexpectedBody {
            endpoint: "/list".into(),
            status: 200,
            body: "<html>".into(),
        };
        assert!(!err.is_transient());
        assert!(err.to_string().contains("/list"));
    }
}
