//! Multi-step planning variant (spec §4.10, optional).
//!
//! For complex queries the orchestrator can ask the backend to produce a
//! short JSON plan of tool invocations drawn from a fixed catalog, then
//! execute the steps in dependency order. Per DESIGN.md's dynamic-dispatch
//! note, "action name" dispatch is not a string match at execution time: the
//! planner output is parsed straight into a closed `ToolCall` enum, one
//! variant per tool, so an unrecognized action is a deserialization error
//! rather than a runtime branch that silently falls through.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// One step of a plan, as produced by the backend's JSON output.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlanStep {
    /// Unique within the plan; referenced by later steps' `depends_on`.
    pub id: String,
    #[serde(flatten)]
    pub tool: ToolCall,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// The closed set of tools the planner may invoke, tagged by `"tool"` in the
/// backend's JSON output (e.g. `{"tool": "search", "query": "...", "limit": 5}`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolCall {
    Search {
        query: String,
        #[serde(default = "default_limit")]
        limit: usize,
    },
    SemanticSearch {
        query: String,
        #[serde(default = "default_limit")]
        limit: usize,
    },
    Summarize {
        /// References another step's id whose result supplies the text to
        /// summarize; resolved against prior step outputs at execution time.
        step_ref: String,
    },
    Answer {
        /// References the step id(s) whose output should be composed into
        /// a final answer.
        step_refs: Vec<String>,
    },
    ListFiles {
        #[serde(default = "default_limit")]
        limit: usize,
    },
    GetEntities {
        #[serde(default)]
        kind: Option<String>,
        #[serde(default = "default_limit")]
        limit: usize,
    },
}

fn default_limit() -> usize {
    5
}

/// A `Plan` is the deserialized tool-call DAG plus a validity check: every
/// `depends_on` reference must name a step id that exists in the same plan.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("plan JSON did not parse: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },
    #[error("plan has a dependency cycle involving step '{0}'")]
    Cycle(String),
}

impl Plan {
    /// Parse and validate a plan emitted by the backend. An unrecognized
    /// `"tool"` value fails at `serde_json::from_str` (a parse error, per
    /// DESIGN.md's dispatch-by-variant note) rather than later as a runtime
    /// dispatch failure.
    pub fn parse(json: &str) -> Result<Self, PlanError> {
        let plan: Plan = serde_json::from_str(json)?;
        plan.validate()?;
        Ok(plan)
    }

    fn validate(&self) -> Result<(), PlanError> {
        let ids: HashSet<&str> = self.steps.iter().map(|s| s.id.as_str()).collect();
        for step in &self.steps {
            for dep in &step.depends_on {
                if !ids.contains(dep.as_str()) {
                    return Err(PlanError::UnknownDependency {
                        step: step.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
        self.topological_order().map(|_| ())
    }

    /// A dependency-respecting execution order. Independent steps may be
    /// interleaved in any order consistent with their dependencies; this
    /// implementation processes steps in a stable Kahn's-algorithm order.
    pub fn topological_order(&self) -> Result<Vec<String>, PlanError> {
        let mut remaining: HashMap<&str, &PlanStep> =
            self.steps.iter().map(|s| (s.id.as_str(), s)).collect();
        let mut done: HashSet<&str> = HashSet::new();
        let mut order = Vec::with_capacity(self.steps.len());

        while !remaining.is_empty() {
            let ready: Vec<&str> = remaining
                .values()
                .filter(|s| s.depends_on.iter().all(|d| done.contains(d.as_str())))
                .map(|s| s.id.as_str())
                .collect();

            if ready.is_empty() {
                let stuck = remaining.keys().next().copied().unwrap_or("?");
                return Err(PlanError::Cycle(stuck.to_string()));
            }

            let mut ready = ready;
            ready.sort();
            for id in ready {
                order.push(id.to_string());
                done.insert(id);
                remaining.remove(id);
            }
        }

        Ok(order)
    }
}

/// The outcome of executing one plan step.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// Free-text result (search summaries, answers, list/entity renderings).
    Text(String),
    /// Failed to execute; the plan continues with remaining independent
    /// steps per spec §4.10's step-failure policy.
    Failed(String),
}

impl StepOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            StepOutcome::Text(t) => Some(t),
            StepOutcome::Failed(_) => None,
        }
    }
}

/// Parse-time helper used by callers that want to pretty-print a tool's
/// canonical name for logging (e.g. `"search"`, `"get_entities"`).
impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::Search { .. } => "search",
            ToolCall::SemanticSearch { .. } => "semantic_search",
            ToolCall::Summarize { .. } => "summarize",
            ToolCall::Answer { .. } => "answer",
            ToolCall::ListFiles { .. } => "list_files",
            ToolCall::GetEntities { .. } => "get_entities",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_linear_plan() {
        let json = r#"{
            "steps": [
                {"id": "s1", "tool": "search", "query": "budget", "limit": 3},
                {"id": "s2", "tool": "answer", "step_refs": ["s1"], "depends_on": ["s1"]}
            ]
        }"#;
        let plan = Plan::parse(json).unwrap();
        assert_eq!(plan.steps.len(), 2);
        let order = plan.topological_order().unwrap();
        assert_eq!(order, vec!["s1".to_string(), "s2".to_string()]);
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let json = r#"{
            "steps": [
                {"id": "s1", "tool": "search", "query": "x", "depends_on": ["missing"]}
            ]
        }"#;
        let err = Plan::parse(json).unwrap_err();
        assert!(matches!(err, PlanError::UnknownDependency { .. }));
    }

    #[test]
    fn unknown_tool_name_is_a_parse_error() {
        let json = r#"{"steps": [{"id": "s1", "tool": "delete_everything"}]}"#;
        let err = Plan::parse(json).unwrap_err();
        assert!(matches!(err, PlanError::Parse(_)));
    }

    #[test]
    fn dependency_cycle_is_rejected() {
        let json = r#"{
            "steps": [
                {"id": "a", "tool": "search", "query": "x", "depends_on": ["b"]},
                {"id": "b", "tool": "search", "query": "y", "depends_on": ["a"]}
            ]
        }"#;
        let err = Plan::parse(json).unwrap_err();
        assert!(matches!(err, PlanError::Cycle(_)));
    }

    #[test]
    fn independent_steps_are_both_ready_before_their_dependent() {
        let json = r#"{
            "steps": [
                {"id": "a", "tool": "search", "query": "x"},
                {"id": "b", "tool": "get_entities"},
                {"id": "c", "tool": "answer", "step_refs": ["a", "b"], "depends_on": ["a", "b"]}
            ]
        }"#;
        let plan = Plan::parse(json).unwrap();
        let order = plan.topological_order().unwrap();
        assert_eq!(order.last().unwrap(), "c");
    }
}
