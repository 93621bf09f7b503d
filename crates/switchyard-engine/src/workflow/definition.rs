//! Workflow definitions as stored on disk.
//!
//! ```json
//! {
//!   "name": "Review pipeline",
//!   "variables": { "language": "rust" },
//!   "steps": [
//!     { "name": "analyze", "type": "prompt", "prompt": "Rate this {{language}} code", "output_var": "analysis" },
//!     { "name": "score", "type": "extract", "from_step": "analyze", "pattern": "Quality score: (\\d+)", "output_var": "score" },
//!     {
//!       "name": "route", "type": "conditional", "condition": "{{score}} >= 7",
//!       "then": { "name": "optimize", "type": "prompt", "prompt": "Optimize it" },
//!       "else": { "name": "refactor", "type": "prompt", "prompt": "Refactor it" }
//!     }
//!   ]
//! }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::vars::Variables;

/// Model id meaning "let the selector decide".
pub const AUTO_MODEL: &str = "auto";

fn auto_model() -> String {
    AUTO_MODEL.to_string()
}

fn default_version() -> String {
    "1.0".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Defaults to the file stem when loaded from disk.
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Default variable values, overridden by the caller's.
    #[serde(default)]
    pub variables: Variables,
    pub steps: Vec<Step>,
}

/// What a failing step does to the workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    #[default]
    Stop,
    Continue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    #[serde(default)]
    pub on_error: OnError,
    #[serde(flatten)]
    pub kind: StepKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    Prompt {
        #[serde(default = "auto_model")]
        model: String,
        prompt: String,
        #[serde(default)]
        output_var: Option<String>,
        #[serde(default)]
        system_prompt: Option<String>,
    },
    Template {
        template: String,
        #[serde(default)]
        variables: IndexMap<String, String>,
        #[serde(default = "auto_model")]
        model: String,
        #[serde(default)]
        output_var: Option<String>,
    },
    Conditional {
        condition: String,
        then: Box<Step>,
        #[serde(default, rename = "else")]
        otherwise: Option<Box<Step>>,
    },
    Loop {
        /// Name of the variable holding the items.
        items: String,
        loop_var: String,
        body: Box<Step>,
        #[serde(default)]
        output_var: Option<String>,
    },
    Extract {
        from_step: String,
        pattern: String,
        output_var: String,
    },
    Sleep {
        seconds: f64,
    },
}

impl StepKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            StepKind::Prompt { .. } => "prompt",
            StepKind::Template { .. } => "template",
            StepKind::Conditional { .. } => "conditional",
            StepKind::Loop { .. } => "loop",
            StepKind::Extract { .. } => "extract",
            StepKind::Sleep { .. } => "sleep",
        }
    }

    /// Leaf steps may appear as conditional branches and loop bodies.
    pub fn is_leaf(&self) -> bool {
        !matches!(self, StepKind::Conditional { .. } | StepKind::Loop { .. })
    }

    /// Variable this step writes, if any.
    pub fn output_var(&self) -> Option<&str> {
        match self {
            StepKind::Prompt { output_var, .. }
            | StepKind::Template { output_var, .. }
            | StepKind::Loop { output_var, .. } => output_var.as_deref(),
            StepKind::Extract { output_var, .. } => Some(output_var),
            StepKind::Conditional { .. } | StepKind::Sleep { .. } => None,
        }
    }
}

impl Step {
    /// This step and any nested branch or body, depth first.
    pub fn walk(&self) -> Vec<&Step> {
        let mut out = vec![self];
        match &self.kind {
            StepKind::Conditional {
                then, otherwise, ..
            } => {
                out.extend(then.walk());
                if let Some(otherwise) = otherwise {
                    out.extend(otherwise.walk());
                }
            }
            StepKind::Loop { body, .. } => out.extend(body.walk()),
            _ => {}
        }
        out
    }
}

impl WorkflowDefinition {
    /// Every step including nested ones, in declaration order.
    pub fn all_steps(&self) -> Vec<&Step> {
        self.steps.iter().flat_map(Step::walk).collect()
    }
}
