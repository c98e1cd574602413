//! Retrieval-augmented answering for the scrybe personal knowledge engine
//! (C10). Composes `scrybe_core::retrieval::RetrievalEngine` with a
//! pluggable [`backend::LlmBackend`] to answer natural-language questions
//! grounded in captured history, degrading to a canned offline answer (with
//! context still attached) when the backend is unreachable.

pub mod backend;
pub mod orchestrator;
pub mod plan;
pub mod router;

pub use backend::{GenerateRequest, LlmBackend, LlmError, OllamaBackend, OpenAiCompatBackend, UnavailableBackend};
pub use orchestrator::{RagError, RagOrchestrator, RagResponse};
pub use plan::{Plan, PlanError, PlanStep, StepOutcome, ToolCall};
pub use router::{ModelRouter, ModelTier, Route};

/// Builds the configured LLM backend for a given tier's resolved route.
/// `provider` is `Config.llm.provider` (`"ollama"` or anything else, which
/// is treated as an OpenAI-compatible HTTP endpoint); falls back to
/// [`UnavailableBackend`] when the route has no base URL configured.
pub fn build_backend(provider: &str, route: &Route) -> Box<dyn LlmBackend> {
    let Some(base_url) = &route.base_url else {
        return Box::new(UnavailableBackend);
    };

    match provider {
        "ollama" => Box::new(OllamaBackend::new(base_url.clone())),
        _ => Box::new(OpenAiCompatBackend::new(base_url.clone(), route.api_key.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_route_builds_unavailable_backend() {
        let route = Route { model: "x".to_string(), base_url: None, api_key: None };
        let backend = build_backend("ollama", &route);
        assert_eq!(backend.provider_name(), "none");
    }

    #[test]
    fn ollama_provider_builds_ollama_backend() {
        let route = Route {
            model: "x".to_string(),
            base_url: Some("http://localhost:11434".to_string()),
            api_key: None,
        };
        let backend = build_backend("ollama", &route);
        assert_eq!(backend.provider_name(), "ollama");
    }
}
