/// Message shown when a failed update carries no usable server message.
pub const GENERIC_UPDATE_FAILURE: &str = "Unable to update approval";

/// All errors that can be returned by an `ApprovalService` implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// The service understood the request and refused it (business conflict,
    /// invalid fields, unknown role). `message` is safe to show verbatim.
    #[error("{message}")]
    Rejected { message: String },

    /// No record with the given metrics id.
    #[error("approval record not found: {metrics_id}")]
    NotFound { metrics_id: String },

    /// The request never produced a structured answer (network failure,
    /// timeout, non-2xx without an error body).
    #[error("transport error: {0}")]
    Transport(String),

    /// A backend-specific failure (data file I/O, serialization, etc.).
    #[error("service backend error: {0}")]
    Backend(String),
}

impl ServiceError {
    pub fn rejected(message: impl Into<String>) -> Self {
        ServiceError::Rejected {
            message: message.into(),
        }
    }

    /// The text a user should see: the server's own message when it sent
    /// one, otherwise [`GENERIC_UPDATE_FAILURE`].
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Rejected { message } if !message.trim().is_empty() => message.clone(),
            ServiceError::NotFound { .. } => self.to_string(),
            _ => GENERIC_UPDATE_FAILURE.to_string(),
        }
    }

    /// Whether the server answered with a refusal rather than failing.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ServiceError::Rejected { .. } | ServiceError::NotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_prefers_server_text() {
        assert_eq!(
            ServiceError::rejected("Record already approved").user_message(),
            "Record already approved"
        );
        assert_eq!(
            ServiceError::rejected("  ").user_message(),
            GENERIC_UPDATE_FAILURE
        );
        assert_eq!(
            ServiceError::Transport("connection refused".into()).user_message(),
            GENERIC_UPDATE_FAILURE
        );
        assert_eq!(
            ServiceError::Backend("disk full".into()).user_message(),
            GENERIC_UPDATE_FAILURE
        );
    }
}
