//! Error types for Ampere
//!
//! `AmpereError` is the typed error carried inside `anyhow::Error` by the
//! persistence and dispatch layers. Callers that need to react to a specific
//! failure class use `downcast_ref::<AmpereError>()`.

/// Application-specific error types
#[derive(thiserror::Error, Debug)]
pub enum AmpereError {
    /// A structural assumption about a tracked table does not hold.
    /// Never retried.
    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("caused: {0}")]
    IllegalArgument(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl AmpereError {
    /// Configuration and invariant errors abort the responsible call chain
    pub fn is_fatal(&self) -> bool {
        matches!(self, AmpereError::Invariant(_) | AmpereError::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ampere_error_display() {
        let err = AmpereError::Invariant("composite primary key".to_string());
        assert_eq!(format!("{}", err), "invariant violated: composite primary key");

        let err = AmpereError::IllegalArgument("invalid kind".to_string());
        assert_eq!(format!("{}", err), "caused: invalid kind");

        let err = AmpereError::Network("connection refused".to_string());
        assert_eq!(format!("{}", err), "network error: connection refused");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(AmpereError::Invariant(String::new()).is_fatal());
        assert!(AmpereError::Configuration(String::new()).is_fatal());
        assert!(!AmpereError::Network(String::new()).is_fatal());
        assert!(!AmpereError::Database(String::new()).is_fatal());
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = AmpereError::Invariant("x".to_string()).into();
        assert!(matches!(
            err.downcast_ref::<AmpereError>(),
            Some(AmpereError::Invariant(_))
        ));
    }
}
