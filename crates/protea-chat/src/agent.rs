//! Agent traits the dispatcher talks to.
//!
//! Each trait is one external collaborator. Implementations report failures
//! as [`AgentError`] so the dispatcher can tell them apart from answers.

use async_trait::async_trait;

use crate::error::AgentError;
use crate::types::{Classification, ConversationTurn};

/// Decides whether an utterance is small talk or a data request.
#[async_trait]
pub trait InputClassifier: Send + Sync {
    async fn classify(&self, utterance: &str) -> Result<Classification, AgentError>;
}

/// Produces a natural-language reply to a conversation.
#[async_trait]
pub trait ConversationResponder: Send + Sync {
    async fn respond(&self, context: &[ConversationTurn]) -> Result<String, AgentError>;
}

/// Answers a natural-language question from the protein store.
#[async_trait]
pub trait DatabaseQueryAgent: Send + Sync {
    async fn answer(&self, question: &str) -> Result<String, AgentError>;
}

/// Stand-in for every agent role when the provider credential is missing.
///
/// Every call fails with [`AgentError::Unconfigured`].
#[derive(Debug, Clone)]
pub struct UnconfiguredAgent {
    reason: String,
}

impl UnconfiguredAgent {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl InputClassifier for UnconfiguredAgent {
    async fn classify(&self, _utterance: &str) -> Result<Classification, AgentError> {
        Err(AgentError::Unconfigured(self.reason.clone()))
    }
}

#[async_trait]
impl ConversationResponder for UnconfiguredAgent {
    async fn respond(&self, _context: &[ConversationTurn]) -> Result<String, AgentError> {
        Err(AgentError::Unconfigured(self.reason.clone()))
    }
}

#[async_trait]
impl DatabaseQueryAgent for UnconfiguredAgent {
    async fn answer(&self, _question: &str) -> Result<String, AgentError> {
        Err(AgentError::Unconfigured(self.reason.clone()))
    }
}
