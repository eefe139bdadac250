//! Error types for the chat dispatcher and its agents.

/// Which external collaborator a call went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentRole {
    Classifier,
    Responder,
    QueryAgent,
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentRole::Classifier => write!(f, "input classifier"),
            AgentRole::Responder => write!(f, "conversation responder"),
            AgentRole::QueryAgent => write!(f, "database query agent"),
        }
    }
}

/// Failures reported by an agent.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("agent is not configured: {0}")]
    Unconfigured(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("call timed out after {0} ms")]
    Timeout(u64),
    #[error("provider rate limit exceeded")]
    RateLimited,
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed output: {0}")]
    MalformedOutput(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl AgentError {
    /// Whether a retry has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            AgentError::Transport(_) | AgentError::Timeout(_) | AgentError::RateLimited => true,
            AgentError::Status { status, .. } => *status >= 500,
            AgentError::Unconfigured(_)
            | AgentError::MalformedOutput(_)
            | AgentError::Storage(_) => false,
        }
    }
}

/// Errors from the chat dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("{agent} unavailable: {source}")]
    UpstreamUnavailable {
        agent: AgentRole,
        #[source]
        source: AgentError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_error_display() {
        assert_eq!(
            AgentError::Unconfigured("OPENAI_API_KEY is not set".to_string()).to_string(),
            "agent is not configured: OPENAI_API_KEY is not set"
        );
        assert_eq!(AgentError::Timeout(1500).to_string(), "call timed out after 1500 ms");
        assert_eq!(
            AgentError::Status {
                status: 502,
                body: "bad gateway".to_string()
            }
            .to_string(),
            "provider returned status 502: bad gateway"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(AgentError::Transport("reset".to_string()).is_transient());
        assert!(AgentError::Timeout(10).is_transient());
        assert!(AgentError::RateLimited.is_transient());
        assert!(AgentError::Status {
            status: 503,
            body: String::new()
        }
        .is_transient());

        assert!(!AgentError::Status {
            status: 401,
            body: String::new()
        }
        .is_transient());
        assert!(!AgentError::Unconfigured(String::new()).is_transient());
        assert!(!AgentError::MalformedOutput(String::new()).is_transient());
        assert!(!AgentError::Storage(String::new()).is_transient());
    }

    #[test]
    fn test_chat_error_display() {
        let err = ChatError::InvalidRequest("context must not be empty".to_string());
        assert_eq!(err.to_string(), "invalid request: context must not be empty");

        let err = ChatError::UpstreamUnavailable {
            agent: AgentRole::QueryAgent,
            source: AgentError::RateLimited,
        };
        assert_eq!(
            err.to_string(),
            "database query agent unavailable: provider rate limit exceeded"
        );
    }

    #[test]
    fn test_upstream_error_exposes_source() {
        use std::error::Error;
        let err = ChatError::UpstreamUnavailable {
            agent: AgentRole::Classifier,
            source: AgentError::Timeout(5),
        };
        assert!(err.source().is_some());
    }
}
