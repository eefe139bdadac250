//! Chat front door for the protein store.
//!
//! Classifies each incoming utterance as conversation or data query, routes it
//! to the matching agent under a timeout-and-retry guard, and degrades agent
//! failures into a fallback answer.

pub mod agent;
pub mod dispatcher;
pub mod error;
pub mod format;
pub mod guard;
pub mod llm;
pub mod query_agent;
pub mod rules;
pub mod types;

pub use agent::{ConversationResponder, DatabaseQueryAgent, InputClassifier, UnconfiguredAgent};
pub use dispatcher::QueryDispatcher;
pub use error::{AgentError, AgentRole, ChatError};
pub use guard::CallPolicy;
pub use llm::{ChatCompletion, LlmClassifier, LlmResponder, OpenAiClient};
pub use query_agent::LlmQueryAgent;
pub use rules::RuleClassifier;
pub use types::{
    Classification, ConversationTurn, FollowupResponse, QueryRequest, QueryResponse, Role,
};
