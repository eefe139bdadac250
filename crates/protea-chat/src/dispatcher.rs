//! Query dispatcher: classifies one chat turn and routes it to an agent.

use std::sync::Arc;

use tracing::Instrument;
use uuid::Uuid;

use crate::agent::{ConversationResponder, DatabaseQueryAgent, InputClassifier};
use crate::error::{AgentRole, ChatError};
use crate::guard::{guarded_call, CallPolicy};
use crate::types::{
    Classification, ConversationTurn, FollowupResponse, QueryRequest, QueryResponse,
};

/// Answer returned when an agent call cannot be completed.
pub const DEFAULT_FALLBACK: &str = "Error in forming output";

/// Central coordinator for `/query/`.
///
/// Holds no per-request state; one instance serves all requests.
pub struct QueryDispatcher {
    classifier: Arc<dyn InputClassifier>,
    responder: Arc<dyn ConversationResponder>,
    query_agent: Arc<dyn DatabaseQueryAgent>,
    policy: CallPolicy,
    fallback: String,
}

impl QueryDispatcher {
    pub fn new(
        classifier: Arc<dyn InputClassifier>,
        responder: Arc<dyn ConversationResponder>,
        query_agent: Arc<dyn DatabaseQueryAgent>,
    ) -> Self {
        Self {
            classifier,
            responder,
            query_agent,
            policy: CallPolicy::default(),
            fallback: DEFAULT_FALLBACK.to_string(),
        }
    }

    pub fn with_policy(mut self, policy: CallPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    /// Handle one chat turn.
    ///
    /// Only an empty context is an error. Agent failures are logged and
    /// answered with the fallback text.
    pub async fn handle(&self, request: &QueryRequest) -> Result<QueryResponse, ChatError> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("dispatch", %request_id);
        self.dispatch(request).instrument(span).await
    }

    async fn dispatch(&self, request: &QueryRequest) -> Result<QueryResponse, ChatError> {
        let last = request
            .context
            .last()
            .ok_or_else(|| ChatError::InvalidRequest("context must not be empty".to_string()))?;
        let user_query = last.content.clone();

        if !request.query.is_empty() && request.query != user_query {
            tracing::debug!(
                query = %request.query,
                "Ignoring query field; using last context turn"
            );
        }

        // The last turn is appended again as a user turn, so the responder
        // sees the newest utterance twice.
        let mut updated_context = request.context.clone();
        updated_context.push(ConversationTurn::user(user_query.clone()));

        match self.route(&user_query, &updated_context).await {
            Ok(response) => Ok(QueryResponse { response }),
            Err(err) => {
                tracing::warn!(error = %err, "Dispatch failed, returning fallback");
                Ok(QueryResponse {
                    response: self.fallback.clone(),
                })
            }
        }
    }

    async fn route(
        &self,
        user_query: &str,
        context: &[ConversationTurn],
    ) -> Result<String, ChatError> {
        let classification = guarded_call(AgentRole::Classifier, &self.policy, || {
            self.classifier.classify(user_query)
        })
        .await?;
        tracing::info!(%classification, "Classified input");

        match classification {
            Classification::Conversation => {
                guarded_call(AgentRole::Responder, &self.policy, || {
                    self.responder.respond(context)
                })
                .await
            }
            Classification::Query => {
                guarded_call(AgentRole::QueryAgent, &self.policy, || {
                    self.query_agent.answer(user_query)
                })
                .await
            }
        }
    }

    /// Follow-up suggestions. Not implemented; always empty.
    pub fn followup(&self, _request: &QueryRequest) -> FollowupResponse {
        FollowupResponse::default()
    }
}
