//! RAG Orchestrator (C10), grounded on
//! `original_source/src/thought/rag.py`'s `RAGEngine.query` for the linear
//! path, and on `src/agents/orchestrator.py` plus DESIGN.md's dispatch note
//! for the optional multi-step planning variant.

use std::collections::HashMap;

use scrybe_core::model::{ContentRecord, EntityKind, SourceKind};
use scrybe_core::retrieval::{RetrievalEngine, RetrievalError};

use crate::backend::{GenerateRequest, LlmBackend, LlmError};
use crate::plan::{Plan, PlanError, StepOutcome, ToolCall};
use crate::router::{ModelRouter, ModelTier};

/// How many characters of a single context item survive into the prompt
/// (spec §4.10 step 2).
const CONTEXT_SNIPPET_CHARS: usize = 500;

/// How many context items are retrieved before falling back from semantic
/// to lexical search (spec §4.10 step 1).
const CONTEXT_LIMIT: usize = 5;

/// `list_files` has no natural recency bound of its own; treat it as "all
/// time" by using a horizon long enough to cover any realistic capture
/// history.
const LIST_FILES_HORIZON_DAYS: u32 = 36_500;

/// Shown when the configured LLM backend is unreachable, verbatim in
/// spirit from the original's "Local AI Offline" message (spec §8, scenario
/// 5: the answer must contain this phrase).
const OFFLINE_ANSWER: &str = "\u{26a0}\u{fe0f} **Local AI Offline**\n\n\
I found relevant content in your history (see below), but I couldn't \
generate a summary because the configured language-model backend is not \
reachable.\n\n\
Check that your LLM provider is running and reachable at the configured URL.";

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
}

pub type Result<T> = std::result::Result<T, RagError>;

/// The answer to a natural-language query, always populated even when the
/// backend failed (spec §7: "every query returns a ... result").
#[derive(Debug, Clone, serde::Serialize)]
pub struct RagResponse {
    pub answer: String,
    pub context: Vec<ContentRecord>,
    pub model_used: String,
}

/// Composes `RetrievalEngine` reads with a `LlmBackend` call. Holds no
/// state of its own beyond borrowed references, mirroring
/// `RetrievalEngine`'s own "construct per request" shape.
pub struct RagOrchestrator<'a> {
    retrieval: &'a RetrievalEngine<'a>,
    backend: &'a dyn LlmBackend,
    router: ModelRouter<'a>,
}

impl<'a> RagOrchestrator<'a> {
    pub fn new(retrieval: &'a RetrievalEngine<'a>, backend: &'a dyn LlmBackend, router: ModelRouter<'a>) -> Self {
        Self { retrieval, backend, router }
    }

    /// The linear path (spec §4.10 steps 1-5): retrieve, format, prompt,
    /// route, generate, degrade to the offline answer on failure.
    pub async fn answer(&self, query: &str) -> Result<RagResponse> {
        let context = self.retrieve_context(query)?;
        let route = self.router.route(ModelTier::Balanced);

        let context_text = format_context(&context);
        let system_prompt = system_prompt();
        let user_prompt = format!("Context:\n{context_text}\n\nQuestion: {query}");

        let request = GenerateRequest::new(&user_prompt, &route.model).with_system(&system_prompt);

        let answer = match self.backend.generate(request).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, provider = self.backend.provider_name(), "RAG generation failed, returning offline answer");
                OFFLINE_ANSWER.to_string()
            }
        };

        Ok(RagResponse { answer, context, model_used: route.model })
    }

    /// spec §4.10 step 1: semantic search first, lexical fallback if empty.
    fn retrieve_context(&self, query: &str) -> Result<Vec<ContentRecord>> {
        let hits = self.retrieval.semantic_search(query, CONTEXT_LIMIT)?;
        let hits = if hits.is_empty() {
            self.retrieval.search(query, None, CONTEXT_LIMIT)?
        } else {
            hits
        };
        Ok(hits.into_iter().map(|h| h.record).collect())
    }

    /// Multi-step planning variant (spec §4.10, optional). Asks the
    /// `powerful` tier for a JSON plan, then executes steps in dependency
    /// order. A failed step is recorded and skipped; independent steps
    /// still run. The final answer comes from the last successful `Answer`
    /// step, or a fallback summary of the highest-priority (first, per plan
    /// order) successful result if no `Answer` step ran.
    pub async fn plan_and_execute(&self, query: &str) -> Result<RagResponse> {
        let route = self.router.route(ModelTier::Powerful);
        let planning_prompt = planning_prompt(query);
        let request = GenerateRequest::new(&planning_prompt, &route.model)
            .with_system(PLANNER_SYSTEM_PROMPT)
            .json_mode();

        let plan = match self.backend.generate(request).await {
            Ok(json) => Plan::parse(&json).ok(),
            Err(e) => {
                tracing::warn!(error = %e, "planner call failed, falling back to linear RAG");
                None
            }
        };

        let Some(plan) = plan else {
            return self.answer(query).await;
        };

        self.execute_plan(plan, &route.model).await
    }

    async fn execute_plan(&self, plan: Plan, model_used: &str) -> Result<RagResponse> {
        let order = match plan.topological_order() {
            Ok(order) => order,
            Err(_) => return self.answer_fallback(model_used),
        };
        let steps: HashMap<String, ToolCall> =
            plan.steps.into_iter().map(|s| (s.id, s.tool)).collect();

        let mut outcomes: HashMap<String, StepOutcome> = HashMap::new();
        let mut last_answer: Option<String> = None;
        let mut first_success: Option<String> = None;
        let mut context: Vec<ContentRecord> = Vec::new();

        for id in &order {
            let Some(tool) = steps.get(id) else { continue };
            let outcome = self.execute_step(tool, &outcomes, &mut context).await;
            if let StepOutcome::Text(text) = &outcome {
                if first_success.is_none() {
                    first_success = Some(text.clone());
                }
                if matches!(tool, ToolCall::Answer { .. }) {
                    last_answer = Some(text.clone());
                }
            }
            outcomes.insert(id.clone(), outcome);
        }

        let answer = last_answer
            .or(first_success)
            .unwrap_or_else(|| "The plan produced no usable result.".to_string());

        Ok(RagResponse { answer, context, model_used: model_used.to_string() })
    }

    fn answer_fallback(&self, model_used: &str) -> Result<RagResponse> {
        Ok(RagResponse {
            answer: "The plan could not be executed (dependency cycle).".to_string(),
            context: Vec::new(),
            model_used: model_used.to_string(),
        })
    }

    async fn execute_step(
        &self,
        tool: &ToolCall,
        outcomes: &HashMap<String, StepOutcome>,
        context: &mut Vec<ContentRecord>,
    ) -> StepOutcome {
        match tool {
            ToolCall::Search { query, limit } => match self.retrieval.search(query, None, *limit) {
                Ok(hits) => {
                    let text = render_hits(&hits.iter().map(|h| h.record.clone()).collect::<Vec<_>>());
                    context.extend(hits.into_iter().map(|h| h.record));
                    StepOutcome::Text(text)
                }
                Err(e) => StepOutcome::Failed(e.to_string()),
            },
            ToolCall::SemanticSearch { query, limit } => match self.retrieval.semantic_search(query, *limit) {
                Ok(hits) => {
                    let text = render_hits(&hits.iter().map(|h| h.record.clone()).collect::<Vec<_>>());
                    context.extend(hits.into_iter().map(|h| h.record));
                    StepOutcome::Text(text)
                }
                Err(e) => StepOutcome::Failed(e.to_string()),
            },
            ToolCall::Summarize { step_ref } => match outcomes.get(step_ref).and_then(StepOutcome::text) {
                Some(text) => StepOutcome::Text(truncate(text, CONTEXT_SNIPPET_CHARS * 2)),
                None => StepOutcome::Failed(format!("no output from step '{step_ref}' to summarize")),
            },
            ToolCall::Answer { step_refs } => {
                let mut parts = Vec::new();
                for step_ref in step_refs {
                    if let Some(text) = outcomes.get(step_ref).and_then(StepOutcome::text) {
                        parts.push(text.to_string());
                    }
                }
                if parts.is_empty() {
                    StepOutcome::Failed("no referenced step produced output".to_string())
                } else {
                    StepOutcome::Text(parts.join("\n\n"))
                }
            }
            ToolCall::ListFiles { limit } => {
                match self.retrieval.timeline(LIST_FILES_HORIZON_DAYS, Some(SourceKind::File), *limit) {
                    Ok(records) => StepOutcome::Text(render_hits(&records)),
                    Err(e) => StepOutcome::Failed(e.to_string()),
                }
            }
            ToolCall::GetEntities { kind, limit } => {
                let kind = kind.as_deref().and_then(|k| k.parse::<EntityKind>().ok());
                match self.retrieval.entities(kind, *limit) {
                    Ok(entities) => {
                        let text = entities
                            .iter()
                            .map(|e| format!("{} ({}, {} mentions)", e.text, e.kind, e.mention_count))
                            .collect::<Vec<_>>()
                            .join("\n");
                        StepOutcome::Text(text)
                    }
                    Err(e) => StepOutcome::Failed(e.to_string()),
                }
            }
        }
    }
}

fn system_prompt() -> String {
    "You are a helpful assistant with access to the user's recorded digital \
history (screen captures, clipboard, and watched files).\n\
Use the provided CONTEXT to answer the user's question.\n\
If the answer is found in the context, cite the source type (e.g. \
'According to your screen history...').\n\
If the answer is NOT in the context, say you couldn't find it in their \
history, then give a general-knowledge answer if you can, clearly marked \
as not coming from their data."
        .to_string()
}

const PLANNER_SYSTEM_PROMPT: &str = "You plan tool invocations to answer a question over a \
personal knowledge store. Respond with JSON only: {\"steps\": [{\"id\": ..., \"tool\": ..., \
...args, \"depends_on\": [...]}]}. Valid tool values: search, semantic_search, summarize, \
answer, list_files, get_entities.";

fn planning_prompt(query: &str) -> String {
    format!("Produce a plan to answer: {query}")
}

fn format_context(records: &[ContentRecord]) -> String {
    if records.is_empty() {
        return "No relevant data found in history.".to_string();
    }
    records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let text = truncate(&r.text, CONTEXT_SNIPPET_CHARS);
            format!("{}. [{} - {}]\n   {}", i + 1, r.source, r.captured_at.to_rfc3339(), text)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_hits(records: &[ContentRecord]) -> String {
    format_context(records)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrybe_core::entities::NullExtractor;
    use scrybe_core::storage::Storage;

    struct FailingBackend;

    #[async_trait::async_trait]
    impl LlmBackend for FailingBackend {
        async fn generate(&self, _request: GenerateRequest<'_>) -> crate::backend::Result<String> {
            Err(LlmError::EmptyResponse { provider: "test" })
        }
        fn provider_name(&self) -> &'static str {
            "test"
        }
    }

    struct EchoBackend;

    #[async_trait::async_trait]
    impl LlmBackend for EchoBackend {
        async fn generate(&self, request: GenerateRequest<'_>) -> crate::backend::Result<String> {
            Ok(format!("echo: {}", request.prompt))
        }
        fn provider_name(&self) -> &'static str {
            "echo"
        }
    }

    fn test_storage() -> (Storage, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(Some(dir.path().join("test.db"))).unwrap();
        (storage, dir)
    }

    #[tokio::test]
    async fn offline_answer_is_returned_with_context_on_backend_failure() {
        let (storage, _dir) = test_storage();
        let extractor = NullExtractor;
        storage
            .add_content("quarterly notes about budget", SourceKind::Manual, None, serde_json::json!({}), &extractor)
            .unwrap();

        #[cfg(feature = "embeddings")]
        let retrieval = RetrievalEngine::new(&storage, None);
        #[cfg(not(feature = "embeddings"))]
        let retrieval = RetrievalEngine::new(&storage);

        let backend = FailingBackend;
        let config = scrybe_core::config::LlmConfig::default();
        let router = ModelRouter::new(&config);
        let orchestrator = RagOrchestrator::new(&retrieval, &backend, router);

        let response = orchestrator.answer("budget").await.unwrap();
        assert!(response.answer.contains("Local AI Offline"));
        assert_eq!(response.context.len(), 1);
        assert_eq!(response.model_used, config.balanced_model);
    }

    #[tokio::test]
    async fn successful_backend_response_is_passed_through() {
        let (storage, _dir) = test_storage();
        let extractor = NullExtractor;
        storage
            .add_content("meeting notes", SourceKind::Manual, None, serde_json::json!({}), &extractor)
            .unwrap();

        #[cfg(feature = "embeddings")]
        let retrieval = RetrievalEngine::new(&storage, None);
        #[cfg(not(feature = "embeddings"))]
        let retrieval = RetrievalEngine::new(&storage);

        let backend = EchoBackend;
        let config = scrybe_core::config::LlmConfig::default();
        let router = ModelRouter::new(&config);
        let orchestrator = RagOrchestrator::new(&retrieval, &backend, router);

        let response = orchestrator.answer("meeting").await.unwrap();
        assert!(response.answer.starts_with("echo:"));
    }

    #[test]
    fn format_context_truncates_long_records() {
        let (storage, _dir) = test_storage();
        let extractor = NullExtractor;
        let long_text = "a".repeat(1000);
        let id = storage
            .add_content(&long_text, SourceKind::Manual, None, serde_json::json!({}), &extractor)
            .unwrap();
        let record = storage.get_by_id(id).unwrap().unwrap();

        let formatted = format_context(&[record]);
        assert!(formatted.contains("..."));
        assert!(formatted.len() < long_text.len());
    }

    #[test]
    fn format_context_reports_empty_history() {
        assert_eq!(format_context(&[]), "No relevant data found in history.");
    }
}
