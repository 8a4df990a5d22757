//! The LLM synthesis collaborator seam used by `assistant_workflow` step 7.
//!
//! Grounded on `orchestrator_agent.py::_generate_ai_response`'s try/except fallback:
//! a synthesis failure never aborts the workflow, it substitutes apology text and
//! marks `metadata.synthesis = "fallback"` (the REDESIGN FLAG behavior).

use async_trait::async_trait;

use crate::coordination::domain_types::Citation;
use crate::error::SynthesisError;

/// Everything the synthesis collaborator needs to produce a response.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub query: String,
    pub citations: Vec<Citation>,
    pub strategy_label: String,
}

/// An LLM-backed (or any other) response synthesizer.
#[async_trait]
pub trait SynthesisClient: Send + Sync {
    /// Produces response text grounded in `request.citations`.
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<String, SynthesisError>;
}

/// Builds the fixed top-K synthesis request named in §4.5 step 7 (`K = 5`).
///
/// `strategy_label` is the raw `strategy` field from the task payload (`local`,
/// `global`, `drift`, or `hybrid`) — kept as a string here since `hybrid` has no
/// corresponding [`crate::coordination::domain_types::StrategyLabel`] variant.
#[must_use]
pub fn build_request(query: &str, citations: &[Citation], strategy_label: &str) -> SynthesisRequest {
    const TOP_K: usize = 5;
    SynthesisRequest {
        query: query.to_string(),
        citations: citations.iter().take(TOP_K).cloned().collect(),
        strategy_label: strategy_label.to_string(),
    }
}

/// The text substituted for the response when synthesis fails, carrying the
/// underlying error so the caller isn't left guessing why.
#[must_use]
pub fn fallback_text(error: &SynthesisError) -> String {
    format!("Unable to synthesize a response at this time ({error}). Please review the cited sources directly.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::domain_types::UnitScore;

    fn citation(node_id: &str) -> Citation {
        Citation {
            node_id: node_id.to_string(),
            citation_type: "statute".to_string(),
            content: String::new(),
            score: UnitScore::try_new(0.5).unwrap(),
        }
    }

    #[test]
    fn test_should_cap_synthesis_request_citations_at_five() {
        let citations: Vec<Citation> = (0..10).map(|i| citation(&i.to_string())).collect();
        let request = build_request("q", &citations, "hybrid");
        assert_eq!(request.citations.len(), 5);
    }

    #[test]
    fn test_should_include_error_text_in_fallback() {
        let error = SynthesisError::Failed {
            message: "timeout".to_string(),
        };
        assert!(fallback_text(&error).contains("timeout"));
    }
}
