//! Rule-based input classifier.
//!
//! Treats an utterance as a data query when it names a UniProt-style
//! accession or asks about a stored attribute; everything else is
//! conversation. No network, never fails.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::agent::InputClassifier;
use crate::error::AgentError;
use crate::types::Classification;

// UniProt accession formats (6 or 10 characters).
static ACCESSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[OPQ][0-9][A-Z0-9]{3}[0-9]|[A-NR-Z][0-9](?:[A-Z][A-Z0-9]{2}[0-9]){1,2})\b")
        .expect("Invalid accession regex")
});

static QUERY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Stored attributes
        r"(?i)\blength\b",
        r"(?i)\bsequences?\b",
        r"(?i)\bhydrophobicity\b",
        r"(?i)\b(?:pfam|smart)\b",
        r"(?i)\bdomains?\b",
        r"(?i)\borganisms?\b",
        r"(?i)\bamino[\s-]+acids?\b",
        r"(?i)\bcomposition\b",
        r"(?i)\bsecondary\s+structure\b",
        r"(?i)\b(?:first|last)\s+seen\b",
        r"(?i)\baccessions?\b",
        r"(?i)\bentr(?:y|ies)\b",
        // Retrieval phrasing
        r"(?i)\bhow\s+many\b",
        r"(?i)\blist\b",
        r"(?i)\bshow\s+me\b",
        r"(?i)\b(?:average|mean|median|total|count)\b",
        r"(?i)\b(?:longest|shortest|largest|smallest|highest|lowest)\b",
        r"(?i)\bproteins\s+(?:with|that|where|from|in|of|having)\b",
        r"(?i)\bwhich\s+proteins?\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid query regex"))
    .collect()
});

/// Keyword and accession classifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleClassifier;

impl RuleClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify without going through the async trait.
    pub fn classify_text(&self, utterance: &str) -> Classification {
        if ACCESSION_RE.is_match(utterance) {
            return Classification::Query;
        }
        if QUERY_PATTERNS.iter().any(|re| re.is_match(utterance)) {
            return Classification::Query;
        }
        Classification::Conversation
    }
}

#[async_trait]
impl InputClassifier for RuleClassifier {
    async fn classify(&self, utterance: &str) -> Result<Classification, AgentError> {
        Ok(self.classify_text(utterance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> Classification {
        RuleClassifier::new().classify_text(text)
    }

    // ---- Accessions ----

    #[test]
    fn test_six_char_accession() {
        assert_eq!(classify("Tell me about P12345"), Classification::Query);
        assert_eq!(classify("what is Q9H0H5"), Classification::Query);
    }

    #[test]
    fn test_ten_char_accession() {
        assert_eq!(classify("A0A023GPI8 please"), Classification::Query);
    }

    #[test]
    fn test_lowercase_accession_not_matched() {
        assert_eq!(classify("hello p12345"), Classification::Conversation);
    }

    // ---- Attribute keywords ----

    #[test]
    fn test_length_question() {
        assert_eq!(
            classify("What is the length of protein P12345?"),
            Classification::Query
        );
    }

    #[test]
    fn test_attribute_keywords() {
        for text in [
            "which one has the highest hydrophobicity",
            "proteins with a Pfam domain",
            "give me the amino-acid composition",
            "secondary structure of hemoglobin",
            "when was it first seen",
            "how many entries are there",
            "list human proteins",
            "show me the longest sequence",
            "average length by organism",
        ] {
            assert_eq!(classify(text), Classification::Query, "text: {}", text);
        }
    }

    // ---- Conversation ----

    #[test]
    fn test_greetings_are_conversation() {
        for text in ["Hi there", "hello!", "thanks, that helps", "who are you?", ""] {
            assert_eq!(classify(text), Classification::Conversation, "text: {}", text);
        }
    }

    #[test]
    fn test_general_protein_question_is_conversation() {
        assert_eq!(
            classify("What does a protein do in a cell?"),
            Classification::Conversation
        );
    }

    #[tokio::test]
    async fn test_trait_never_fails() {
        let classifier = RuleClassifier::new();
        assert_eq!(
            classifier.classify("How many proteins are stored?").await.unwrap(),
            Classification::Query
        );
        assert_eq!(
            classifier.classify("good morning").await.unwrap(),
            Classification::Conversation
        );
    }
}
