//! Database query agent: question → SQL → rows → markdown.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use protea_core::error::ProteaError;
use protea_storage::ProteinRepository;

use crate::agent::DatabaseQueryAgent;
use crate::error::AgentError;
use crate::format::{remove_control_characters, rows_to_markdown};
use crate::llm::ChatCompletion;
use crate::types::ConversationTurn;

const SQL_PROMPT: &str = "You translate questions into a single SQLite SELECT statement \
over this table:\n\
protein_data(entry TEXT UNIQUE, length INTEGER, first_seen TEXT 'YYYY-MM-DD', \
last_seen TEXT 'YYYY-MM-DD', organism_id INTEGER, protein_names TEXT, sequence TEXT, \
pfam TEXT ';'-separated Pfam ids, smart TEXT ';'-separated SMART ids, \
amino_acid_composition TEXT JSON object residue->value, avg_hydrophobicity REAL, \
secondary_structure TEXT JSON object element->fraction)\n\
Return only the SQL, no explanation. Never modify data.";

const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```(?:sql)?\s*(.*?)```").expect("Invalid fence regex")
});

/// Pull the SQL statement out of a model reply.
///
/// Accepts a bare statement or one wrapped in a code fence; a single
/// trailing semicolon is dropped.
pub fn extract_sql(reply: &str) -> String {
    let cleaned = remove_control_characters(reply);
    let body = FENCE_RE
        .captures(&cleaned)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or(cleaned);

    body.trim().trim_end_matches(';').trim().to_string()
}

/// Reject anything but a single SELECT or WITH statement.
///
/// Whether the statement writes is decided by SQLite when it is prepared.
pub fn validate_select(sql: &str) -> Result<(), AgentError> {
    if sql.is_empty() {
        return Err(AgentError::MalformedOutput("empty SQL".to_string()));
    }

    let lower = sql.trim_start().to_lowercase();
    if !(lower.starts_with("select") || lower.starts_with("with")) {
        return Err(AgentError::MalformedOutput(format!(
            "expected a SELECT statement, got: {}",
            sql
        )));
    }
    if has_statement_separator(sql) {
        return Err(AgentError::MalformedOutput(
            "multiple statements are not allowed".to_string(),
        ));
    }
    Ok(())
}

/// Whether `sql` has a `;` outside string literals, quoted names and comments.
fn has_statement_separator(sql: &str) -> bool {
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            // Doubled quotes close and reopen the literal.
            '\'' | '"' | '`' => {
                for inner in chars.by_ref() {
                    if inner == c {
                        break;
                    }
                }
            }
            '[' => {
                for inner in chars.by_ref() {
                    if inner == ']' {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for inner in chars.by_ref() {
                    if prev == '*' && inner == '/' {
                        break;
                    }
                    prev = inner;
                }
            }
            ';' => return true,
            _ => {}
        }
    }
    false
}

/// Query agent that lets the model write SQL and runs it read-only.
pub struct LlmQueryAgent {
    llm: Arc<dyn ChatCompletion>,
    proteins: Arc<ProteinRepository>,
    max_rows: usize,
    query_timeout: Duration,
}

impl LlmQueryAgent {
    pub fn new(
        llm: Arc<dyn ChatCompletion>,
        proteins: Arc<ProteinRepository>,
        max_rows: usize,
    ) -> Self {
        Self {
            llm,
            proteins,
            max_rows: max_rows.max(1),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Abort generated statements that run longer than `timeout`.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }
}

#[async_trait]
impl DatabaseQueryAgent for LlmQueryAgent {
    async fn answer(&self, question: &str) -> Result<String, AgentError> {
        let messages = [
            ConversationTurn::system(SQL_PROMPT),
            ConversationTurn::user(question),
        ];
        let reply = self.llm.complete(&messages).await?;

        let sql = extract_sql(&reply);
        validate_select(&sql)?;
        tracing::debug!(sql = %sql, "Running generated query");

        // SQLite runs off the async workers so the caller's timeout can fire.
        let proteins = Arc::clone(&self.proteins);
        let statement = sql.clone();
        let (max_rows, timeout) = (self.max_rows, self.query_timeout);
        let rows = tokio::task::spawn_blocking(move || {
            proteins.run_read_only(&statement, max_rows, timeout)
        })
        .await
        .map_err(|e| AgentError::Storage(format!("Query task failed: {}", e)))?
        .map_err(|e| match e {
            ProteaError::Persistence(msg) => AgentError::MalformedOutput(msg),
            ProteaError::Interrupted(_) => AgentError::Timeout(timeout.as_millis() as u64),
            other => AgentError::Storage(other.to_string()),
        })?;

        Ok(rows_to_markdown(&rows, &sql))
    }
}
