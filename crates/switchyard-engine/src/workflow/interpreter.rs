//! Workflow interpreter.
//!
//! Steps run in declaration order against one shared variable map. A step's
//! string fields go through `{{name}}` substitution right before it runs.
//! Conditional branches and loop bodies are single leaf steps, so the
//! interpreter never recurses more than one level.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lazy_static::lazy_static;
use regex::Regex;
use switchyard_ai::{Dispatch, DispatchRequest};
use switchyard_catalog::{Catalog, ErrorKind};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::condition::Condition;
use super::definition::{OnError, Step, StepKind, WorkflowDefinition, AUTO_MODEL};
use super::execution::{StepResult, WorkflowExecution, CANCELLED};
use super::validate::validate;
use super::vars::{substitute, Value, Variables};
use crate::error::EngineError;
use crate::selector::ModelSelector;
use crate::templates::{TemplateError, TemplateLibrary};

// Compiled extract patterns, shared across runs
lazy_static! {
    static ref PATTERN_CACHE: Mutex<HashMap<String, Regex>> = Mutex::new(HashMap::new());
}

fn compiled(pattern: &str) -> Result<Regex, regex::Error> {
    if let Some(re) = PATTERN_CACHE.lock().ok().and_then(|c| c.get(pattern).cloned()) {
        return Ok(re);
    }
    let re = Regex::new(pattern)?;
    if let Ok(mut cache) = PATTERN_CACHE.lock() {
        cache.insert(pattern.to_string(), re.clone());
    }
    Ok(re)
}

/// Why a single step failed.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("unknown model '{0}'")]
    UnknownModel(String),

    #[error("model '{model}' failed ({kind}): {message}")]
    Dispatch {
        model: String,
        kind: ErrorKind,
        message: String,
    },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("condition error: {0}")]
    Condition(String),

    #[error("variable '{0}' is not a list")]
    NotAList(String),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Internal(String),
}

impl StepError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StepError::UnknownModel(_) => ErrorKind::NotFound,
            StepError::Dispatch { kind, .. } => *kind,
            StepError::Template(e) => e.kind(),
            StepError::Condition(_) | StepError::NotAList(_) | StepError::Pattern(_) => {
                ErrorKind::Validation
            }
            StepError::Cancelled => ErrorKind::Cancelled,
            StepError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Called before each top-level step.
pub trait StepObserver: Send {
    fn before_step(&mut self, execution: &WorkflowExecution, step: &Step);
}

impl<F> StepObserver for F
where
    F: FnMut(&WorkflowExecution, &Step) + Send,
{
    fn before_step(&mut self, execution: &WorkflowExecution, step: &Step) {
        self(execution, step)
    }
}

/// Observer that ignores progress.
pub struct NoObserver;

impl StepObserver for NoObserver {
    fn before_step(&mut self, _execution: &WorkflowExecution, _step: &Step) {}
}

/// Executes workflow definitions.
pub struct WorkflowRunner {
    catalog: Arc<Catalog>,
    dispatcher: Arc<dyn Dispatch>,
    selector: ModelSelector,
    templates: Arc<dyn TemplateLibrary>,
    available: Vec<String>,
}

type StepOutcome = Result<Option<Value>, StepError>;

impl WorkflowRunner {
    pub fn new(
        catalog: Arc<Catalog>,
        dispatcher: Arc<dyn Dispatch>,
        selector: ModelSelector,
        templates: Arc<dyn TemplateLibrary>,
        available: Vec<String>,
    ) -> Self {
        Self {
            catalog,
            dispatcher,
            selector,
            templates,
            available,
        }
    }

    /// Run `def` to completion, failure or cancellation.
    ///
    /// An invalid definition is an error; everything that goes wrong while
    /// running is recorded on the returned execution instead.
    pub async fn execute(
        &self,
        def: &WorkflowDefinition,
        initial: Variables,
        observer: &mut dyn StepObserver,
        cancel: &CancellationToken,
    ) -> Result<WorkflowExecution, EngineError> {
        validate(def, Some(&self.catalog)).map_err(|errors| EngineError::InvalidWorkflow {
            name: def.name.clone(),
            errors,
        })?;

        let mut exec = WorkflowExecution::start(def, initial);
        info!(workflow = %def.name, steps = def.steps.len(), "starting workflow");

        for (index, step) in def.steps.iter().enumerate() {
            if cancel.is_cancelled() {
                exec.fail(CANCELLED);
                break;
            }
            exec.current_step_index = index;
            observer.before_step(&exec, step);

            let started = Instant::now();
            let outcome = self.run_top(step, &mut exec, cancel).await;
            record(&mut exec, step, &outcome, started.elapsed());

            match outcome {
                Ok(_) => {}
                Err(StepError::Cancelled) => {
                    exec.fail(CANCELLED);
                    break;
                }
                Err(e) if step.on_error == OnError::Continue => {
                    warn!(step = %step.name, "step failed, continuing: {}", e);
                }
                Err(e) => {
                    exec.fail(format!("step '{}' failed: {}", step.name, e));
                    break;
                }
            }
        }

        exec.finish();
        info!(
            workflow = %def.name,
            status = exec.status.as_str(),
            seconds = exec.duration_seconds(),
            "workflow finished"
        );
        Ok(exec)
    }

    async fn run_top(
        &self,
        step: &Step,
        exec: &mut WorkflowExecution,
        cancel: &CancellationToken,
    ) -> StepOutcome {
        match &step.kind {
            StepKind::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let truth = Condition::parse(condition)
                    .and_then(|c| c.evaluate(&exec.variables))
                    .map_err(StepError::Condition)?;
                debug!(step = %step.name, truth, "condition evaluated");

                let branch = if truth {
                    Some(then.as_ref())
                } else {
                    otherwise.as_deref()
                };
                match branch {
                    Some(branch) => self.run_nested(branch, exec, cancel).await,
                    None => Ok(None),
                }
            }
            StepKind::Loop {
                items,
                loop_var,
                body,
                ..
            } => {
                let name = items
                    .trim()
                    .trim_start_matches("{{")
                    .trim_end_matches("}}")
                    .trim();
                let list = exec
                    .variables
                    .get(name)
                    .and_then(Value::as_items)
                    .ok_or_else(|| StepError::NotAList(name.to_string()))?;

                let previous = exec.variables.get(loop_var).cloned();
                let mut outputs = Vec::with_capacity(list.len());
                let mut outcome = Ok(());
                for item in list {
                    if cancel.is_cancelled() {
                        outcome = Err(StepError::Cancelled);
                        break;
                    }
                    exec.variables.insert(loop_var.clone(), Value::Text(item));
                    match self.run_nested(body, exec, cancel).await {
                        Ok(Some(value)) => outputs.push(value.render()),
                        Ok(None) => {}
                        Err(e) => {
                            outcome = Err(e);
                            break;
                        }
                    }
                }

                match previous {
                    Some(value) => {
                        exec.variables.insert(loop_var.clone(), value);
                    }
                    None => {
                        exec.variables.shift_remove(loop_var);
                    }
                }
                outcome.map(|_| Some(Value::List(outputs)))
            }
            _ => self.run_leaf(step, exec, cancel).await,
        }
    }

    /// Run a branch or loop body, record it under its own name, and apply
    /// its own error policy.
    async fn run_nested(
        &self,
        step: &Step,
        exec: &mut WorkflowExecution,
        cancel: &CancellationToken,
    ) -> StepOutcome {
        let started = Instant::now();
        let outcome = self.run_leaf(step, exec, cancel).await;
        record(exec, step, &outcome, started.elapsed());
        match outcome {
            Err(e) if step.on_error == OnError::Continue && !matches!(e, StepError::Cancelled) => {
                warn!(step = %step.name, "step failed, continuing: {}", e);
                Ok(None)
            }
            other => other,
        }
    }

    async fn run_leaf(
        &self,
        step: &Step,
        exec: &mut WorkflowExecution,
        cancel: &CancellationToken,
    ) -> StepOutcome {
        match &step.kind {
            StepKind::Prompt {
                model,
                prompt,
                system_prompt,
                ..
            } => {
                let prompt = substitute(prompt, &exec.variables);
                let system = system_prompt
                    .as_deref()
                    .map(|s| substitute(s, &exec.variables));
                let model = substitute(model, &exec.variables);
                self.generate(&model, prompt, system).await.map(Some)
            }
            StepKind::Template {
                template,
                variables,
                model,
                ..
            } => {
                let template = self.templates.get(&substitute(template, &exec.variables))?;
                let bindings = variables
                    .iter()
                    .map(|(k, v)| (k.clone(), substitute(v, &exec.variables)))
                    .collect();
                let prompt = template.render(&bindings)?;
                let model = substitute(model, &exec.variables);
                self.generate(&model, prompt, template.system_prompt.clone())
                    .await
                    .map(Some)
            }
            StepKind::Extract {
                from_step, pattern, ..
            } => {
                let source = match exec.output_of(from_step) {
                    Some(value) => value.render(),
                    None => {
                        warn!(step = %step.name, from = %from_step, "source step has no output");
                        String::new()
                    }
                };
                let re = compiled(pattern)?;
                let extracted = re
                    .captures(&source)
                    .and_then(|caps| caps.get(1).or_else(|| caps.get(0)))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                Ok(Some(Value::Text(extracted)))
            }
            StepKind::Sleep { seconds } => {
                let pause = Duration::try_from_secs_f64(*seconds).unwrap_or(Duration::ZERO);
                tokio::select! {
                    _ = tokio::time::sleep(pause) => Ok(None),
                    _ = cancel.cancelled() => Err(StepError::Cancelled),
                }
            }
            StepKind::Conditional { .. } | StepKind::Loop { .. } => Err(StepError::Internal(
                format!("'{}' cannot be nested", step.kind.type_name()),
            )),
        }
    }

    async fn generate(
        &self,
        model: &str,
        prompt: String,
        system: Option<String>,
    ) -> Result<Value, StepError> {
        let model_id = if model.trim().is_empty() || model == AUTO_MODEL {
            self.selector.select(&prompt, &self.available).model_id
        } else {
            model.to_string()
        };
        let descriptor = self
            .catalog
            .get(&model_id)
            .ok_or_else(|| StepError::UnknownModel(model_id.clone()))?;

        let mut request = DispatchRequest::new(prompt);
        if let Some(system) = system {
            request = request.with_system(system);
        }

        let completion = self.dispatcher.dispatch(descriptor, &request).await;
        if let Some((kind, message)) = completion.error() {
            return Err(StepError::Dispatch {
                model: model_id,
                kind,
                message: message.to_string(),
            });
        }
        debug!(model = %model_id, tokens = completion.output_tokens, "step generated");
        Ok(Value::Text(completion.text))
    }
}

fn record(exec: &mut WorkflowExecution, step: &Step, outcome: &StepOutcome, elapsed: Duration) {
    let duration_ms = elapsed.as_millis() as u64;
    let result = match outcome {
        Ok(output) => {
            if let (Some(var), Some(value)) = (step.kind.output_var(), output) {
                exec.variables.insert(var.to_string(), value.clone());
            }
            StepResult {
                output: output.clone(),
                error: None,
                duration_ms,
            }
        }
        Err(e) => StepResult {
            output: None,
            error: Some(e.to_string()),
            duration_ms,
        },
    };
    // Re-running a name (loop bodies) moves it to the end.
    exec.step_results.shift_remove(&step.name);
    exec.step_results.insert(step.name.clone(), result);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::PreferenceStore;
    use crate::templates::{InMemoryTemplates, PromptTemplate};
    use crate::testing::ScriptedDispatch;
    use crate::workflow::WorkflowStatus;
    use std::path::Path;

    struct Fixture {
        runner: WorkflowRunner,
        dispatch: Arc<ScriptedDispatch>,
        _dir: tempfile::TempDir,
    }

    fn fixture(dispatch: ScriptedDispatch) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Arc::new(Catalog::builtin(Path::new("/models")));
        let dispatch = Arc::new(dispatch);
        let selector = ModelSelector::new(
            catalog.clone(),
            PreferenceStore::new(dir.path().join("preferences.json")),
        );
        let review: PromptTemplate = serde_json::from_str(
            r#"{"id": "review", "system_prompt": "Be terse.",
                "variables": [{"name": "code", "required": true}, {"name": "lang", "default": "rust"}],
                "body": "Review {{lang}}: {{code}}"}"#,
        )
        .unwrap();
        let runner = WorkflowRunner::new(
            catalog,
            dispatch.clone(),
            selector,
            Arc::new(InMemoryTemplates::new([review])),
            vec!["qwen3-coder-30b".into(), "phi4-14b".into()],
        );
        Fixture {
            runner,
            dispatch,
            _dir: dir,
        }
    }

    fn workflow(json: &str) -> WorkflowDefinition {
        serde_json::from_str(json).unwrap()
    }

    async fn run(f: &Fixture, def: &WorkflowDefinition) -> WorkflowExecution {
        f.runner
            .execute(def, Variables::new(), &mut NoObserver, &CancellationToken::new())
            .await
            .unwrap()
    }

    const REVIEW_FLOW: &str = r#"{
        "name": "review",
        "steps": [
            {"name": "A", "type": "prompt", "prompt": "Analyze this code", "output_var": "analysis"},
            {"name": "B", "type": "extract", "from_step": "A", "pattern": "Quality score: (\\d+)", "output_var": "score"},
            {"name": "C", "type": "conditional", "condition": "{{score}} >= 7",
             "then": {"name": "optimize", "type": "prompt", "prompt": "optimize", "output_var": "final"},
             "else": {"name": "refactor", "type": "prompt", "prompt": "refactor", "output_var": "final"}}
        ]
    }"#;

    #[tokio::test]
    async fn test_conditional_takes_then_branch() {
        let f = fixture(ScriptedDispatch::new().responding(|_, prompt| {
            if prompt.starts_with("Analyze") {
                "Looks fine. Quality score: 8".to_string()
            } else {
                format!("did {prompt}")
            }
        }));
        let exec = run(&f, &workflow(REVIEW_FLOW)).await;

        assert_eq!(exec.status, WorkflowStatus::Completed);
        assert_eq!(exec.variables["score"], Value::text("8"));
        assert_eq!(exec.output_of("optimize"), Some(&Value::text("did optimize")));
        assert!(exec.output_of("refactor").is_none());
        assert_eq!(exec.output_of("C"), Some(&Value::text("did optimize")));
        assert_eq!(f.dispatch.prompts(), vec!["Analyze this code", "optimize"]);
    }

    #[tokio::test]
    async fn test_conditional_else_branch_and_auto_model() {
        let f = fixture(ScriptedDispatch::new().responding(|_, prompt| {
            if prompt.starts_with("Analyze") {
                "Quality score: 3".to_string()
            } else {
                "ok".to_string()
            }
        }));
        let exec = run(&f, &workflow(REVIEW_FLOW)).await;
        assert!(exec.output_of("optimize").is_none());
        assert!(exec.output_of("refactor").is_some());
        // "code" routes the auto step to the coding model
        assert_eq!(f.dispatch.models()[0], "qwen3-coder-30b");
    }

    #[tokio::test]
    async fn test_substitution_and_initial_variables() {
        let f = fixture(ScriptedDispatch::new());
        let def = workflow(
            r#"{"name": "vars", "variables": {"topic": "rust", "tone": "dry"},
                "steps": [{"name": "p", "type": "prompt", "model": "phi4-14b",
                           "prompt": "Write about {{topic}} in a {{tone}} tone{{missing}}", "output_var": "out"}]}"#,
        );
        let initial: Variables = [("tone".to_string(), Value::text("warm"))].into_iter().collect();
        let exec = f
            .runner
            .execute(&def, initial, &mut NoObserver, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(f.dispatch.prompts(), vec!["Write about rust in a warm tone"]);
        assert_eq!(
            exec.variables["out"],
            Value::text("answer to Write about rust in a warm tone")
        );
    }

    #[tokio::test]
    async fn test_loop_binds_each_item_and_collects() {
        let f = fixture(ScriptedDispatch::new().responding(|_, p| p.to_uppercase()));
        let def = workflow(
            r#"{"name": "loop", "variables": {"topics": ["a", "b", "c"]},
                "steps": [{"name": "each", "type": "loop", "items": "topics", "loop_var": "t",
                           "output_var": "shouts",
                           "body": {"name": "shout", "type": "prompt", "model": "phi4-14b", "prompt": "say {{t}}"}}]}"#,
        );
        let exec = run(&f, &def).await;

        assert_eq!(
            exec.variables["shouts"],
            Value::List(vec!["SAY A".into(), "SAY B".into(), "SAY C".into()])
        );
        assert_eq!(exec.output_of("shout"), Some(&Value::text("SAY C")));
        assert!(!exec.variables.contains_key("t"));
    }

    #[tokio::test]
    async fn test_empty_loop_binds_empty_list() {
        let f = fixture(ScriptedDispatch::new());
        let def = workflow(
            r#"{"name": "loop", "variables": {"topics": []},
                "steps": [{"name": "each", "type": "loop", "items": "{{topics}}", "loop_var": "t",
                           "output_var": "outs",
                           "body": {"name": "b", "type": "prompt", "prompt": "{{t}}"}}]}"#,
        );
        let exec = run(&f, &def).await;
        assert_eq!(exec.status, WorkflowStatus::Completed);
        assert_eq!(exec.variables["outs"], Value::List(vec![]));
        assert_eq!(f.dispatch.calls(), 0);
    }

    #[tokio::test]
    async fn test_stop_and_continue_on_error() {
        let f = fixture(ScriptedDispatch::new().failing_at(&[0]));
        let def = workflow(
            r#"{"name": "errs", "steps": [
                {"name": "first", "type": "prompt", "model": "phi4-14b", "prompt": "x", "on_error": "continue"},
                {"name": "second", "type": "prompt", "model": "phi4-14b", "prompt": "y", "output_var": "y"}
            ]}"#,
        );
        let exec = run(&f, &def).await;
        assert_eq!(exec.status, WorkflowStatus::Completed);
        assert!(exec.step_results["first"].error.is_some());
        assert!(exec.variables.contains_key("y"));

        let f = fixture(ScriptedDispatch::new().failing_at(&[0]));
        let def = workflow(
            r#"{"name": "errs", "steps": [
                {"name": "first", "type": "prompt", "model": "phi4-14b", "prompt": "x"},
                {"name": "second", "type": "prompt", "model": "phi4-14b", "prompt": "y"}
            ]}"#,
        );
        let exec = run(&f, &def).await;
        assert_eq!(exec.status, WorkflowStatus::Failed);
        assert!(exec.error_message.as_deref().unwrap().contains("'first'"));
        assert_eq!(f.dispatch.calls(), 1);
        assert_eq!(exec.current_step_index, 0);
    }

    #[tokio::test]
    async fn test_template_step() {
        let f = fixture(ScriptedDispatch::new());
        let def = workflow(
            r#"{"name": "tpl", "variables": {"snippet": "fn f() {}"},
                "steps": [{"name": "t", "type": "template", "template": "review", "model": "phi4-14b",
                           "variables": {"code": "{{snippet}}"}, "output_var": "review"}]}"#,
        );
        let exec = run(&f, &def).await;
        assert_eq!(exec.status, WorkflowStatus::Completed);
        let requests = f.dispatch.requests();
        assert_eq!(requests[0].1.user_prompt, "Review rust: fn f() {}");
        assert_eq!(requests[0].1.system_prompt.as_deref(), Some("Be terse."));
    }

    #[tokio::test]
    async fn test_missing_template_variable_fails_step() {
        let f = fixture(ScriptedDispatch::new());
        let def = workflow(
            r#"{"name": "tpl", "steps": [{"name": "t", "type": "template", "template": "review"}]}"#,
        );
        let exec = run(&f, &def).await;
        assert_eq!(exec.status, WorkflowStatus::Failed);
        assert_eq!(f.dispatch.calls(), 0);
    }

    #[tokio::test]
    async fn test_extract_without_match_is_empty() {
        let f = fixture(ScriptedDispatch::new());
        let def = workflow(
            r#"{"name": "x", "steps": [
                {"name": "a", "type": "prompt", "model": "phi4-14b", "prompt": "hi"},
                {"name": "b", "type": "extract", "from_step": "a", "pattern": "score: (\\d+)", "output_var": "s"},
                {"name": "c", "type": "extract", "from_step": "a", "pattern": "answer", "output_var": "whole"}
            ]}"#,
        );
        let exec = run(&f, &def).await;
        assert_eq!(exec.variables["s"], Value::text(""));
        assert_eq!(exec.variables["whole"], Value::text("answer"));
    }

    #[tokio::test]
    async fn test_invalid_workflow_is_rejected_before_running() {
        let f = fixture(ScriptedDispatch::new());
        let def = workflow(
            r#"{"name": "bad", "steps": [{"name": "a", "type": "prompt", "prompt": "x", "model": "ghost"}]}"#,
        );
        let err = f
            .runner
            .execute(&def, Variables::new(), &mut NoObserver, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(f.dispatch.calls(), 0);
    }

    #[tokio::test]
    async fn test_templated_unknown_model_fails_only_its_step() {
        let f = fixture(ScriptedDispatch::new());
        let def = workflow(
            r#"{"name": "late", "variables": {"which": "ghost"}, "steps": [
                {"name": "pick", "type": "prompt", "model": "{{which}}", "prompt": "x", "on_error": "continue"},
                {"name": "next", "type": "prompt", "model": "phi4-14b", "prompt": "y", "output_var": "y"}
            ]}"#,
        );
        let exec = run(&f, &def).await;

        assert_eq!(exec.status, WorkflowStatus::Completed);
        assert!(exec.step_results["pick"].error.as_deref().unwrap().contains("ghost"));
        assert!(exec.variables.contains_key("y"));
        assert_eq!(f.dispatch.calls(), 1);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_sleep() {
        let f = fixture(ScriptedDispatch::new());
        let def = workflow(
            r#"{"name": "nap", "steps": [
                {"name": "wait", "type": "sleep", "seconds": 3600},
                {"name": "after", "type": "prompt", "model": "phi4-14b", "prompt": "x"}
            ]}"#,
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let mut observer = move |_exec: &WorkflowExecution, step: &Step| {
            if step.name == "wait" {
                trigger.cancel();
            }
        };

        let exec = f
            .runner
            .execute(&def, Variables::new(), &mut observer, &cancel)
            .await
            .unwrap();
        assert!(exec.was_cancelled());
        assert_eq!(exec.step_results["wait"].error.as_deref(), Some("cancelled"));
        assert_eq!(f.dispatch.calls(), 0);
    }

    #[tokio::test]
    async fn test_observer_sees_each_top_level_step() {
        let f = fixture(ScriptedDispatch::new().responding(|_, _| "Quality score: 9".into()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut observer = move |exec: &WorkflowExecution, step: &Step| {
            sink.lock()
                .unwrap()
                .push((exec.current_step_index, step.name.clone()));
        };
        f.runner
            .execute(
                &workflow(REVIEW_FLOW),
                Variables::new(),
                &mut observer,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(0, "A".to_string()), (1, "B".to_string()), (2, "C".to_string())]
        );
    }
}
