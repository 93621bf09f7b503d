//! The `Core` handle: every subsystem, wired once and passed explicitly.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use switchyard_ai::{Completion, Dispatch, DispatchRequest, Dispatcher, Termination};
use switchyard_catalog::{Catalog, SamplingParams};
use switchyard_local::estimate_tokens;
use switchyard_store::{Message, NewMessage, Role, SessionStore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::batch::{BatchExecutor, BatchJob, BatchObserver, BatchRun, CheckpointStore, ErrorPolicy};
use crate::config::CoreConfig;
use crate::error::{EngineError, Result};
use crate::preferences::PreferenceStore;
use crate::selector::{ModelSelector, Selection};
use crate::templates::{DirectoryTemplates, TemplateLibrary};
use crate::workflow::{
    save_result, StepObserver, Variables, WorkflowDefinition, WorkflowExecution, WorkflowLibrary,
    WorkflowRunner,
};

/// Default number of earlier messages folded into a follow-up prompt.
pub const DEFAULT_HISTORY_MESSAGES: usize = 10;

/// How `ask` picks its model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelChoice {
    /// Classify the prompt and route it.
    Auto,
    Manual(String),
}

/// Per-call knobs for [`Core::ask`].
#[derive(Debug, Clone)]
pub struct AskOptions {
    pub system_prompt: Option<String>,
    pub overrides: SamplingParams,
    pub deadline: Option<Duration>,
    /// Most recent messages to fold into the prompt when resuming.
    pub history_messages: usize,
}

impl Default for AskOptions {
    fn default() -> Self {
        Self {
            system_prompt: None,
            overrides: SamplingParams::default(),
            deadline: None,
            history_messages: DEFAULT_HISTORY_MESSAGES,
        }
    }
}

/// Result of one conversational turn.
#[derive(Debug, Clone)]
pub struct AskOutcome {
    pub session_id: String,
    pub model_id: String,
    /// Present when the model was chosen by the selector.
    pub selection: Option<Selection>,
    pub completion: Completion,
}

/// Explicit context for every core operation.
pub struct Core {
    config: CoreConfig,
    catalog: Arc<Catalog>,
    dispatcher: Arc<dyn Dispatch>,
    store: Arc<SessionStore>,
    selector: ModelSelector,
    checkpoints: CheckpointStore,
    templates: Arc<dyn TemplateLibrary>,
    workflows: WorkflowLibrary,
    available: Option<Vec<String>>,
}

impl Core {
    /// Create the state directories, load the catalog and open the database.
    pub fn open(config: CoreConfig) -> Result<Self> {
        config.ensure_dirs()?;
        let catalog = Catalog::load_or_builtin(&config.catalog_path(), &config.models_dir)?;
        let store = SessionStore::open(&config.database_path())?;
        let dispatcher = Dispatcher::new(config.dispatch.clone());
        info!(home = %config.home.display(), models = catalog.models().len(), "core ready");
        Ok(Self::with_parts(
            config,
            Arc::new(catalog),
            Arc::new(dispatcher),
            Arc::new(store),
        ))
    }

    /// Assemble a core from prebuilt parts.
    pub fn with_parts(
        config: CoreConfig,
        catalog: Arc<Catalog>,
        dispatcher: Arc<dyn Dispatch>,
        store: Arc<SessionStore>,
    ) -> Self {
        let selector = ModelSelector::new(
            catalog.clone(),
            PreferenceStore::new(config.preferences_path()),
        );
        Self {
            checkpoints: CheckpointStore::new(config.checkpoints_dir()),
            templates: Arc::new(DirectoryTemplates::new(config.templates_dir())),
            workflows: WorkflowLibrary::new(config.workflows_dir()),
            selector,
            catalog,
            dispatcher,
            store,
            config,
            available: None,
        }
    }

    /// Pin the set of models treated as available instead of probing.
    pub fn with_available(mut self, ids: Vec<String>) -> Self {
        self.available = Some(ids);
        self
    }

    pub fn with_templates(mut self, templates: Arc<dyn TemplateLibrary>) -> Self {
        self.templates = templates;
        self
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn selector(&self) -> &ModelSelector {
        &self.selector
    }

    pub fn preferences(&self) -> PreferenceStore {
        PreferenceStore::new(self.config.preferences_path())
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    pub fn templates(&self) -> &dyn TemplateLibrary {
        self.templates.as_ref()
    }

    pub fn workflows(&self) -> &WorkflowLibrary {
        &self.workflows
    }

    /// Ids of models that can be invoked right now.
    pub fn available_models(&self) -> Vec<String> {
        self.available
            .clone()
            .unwrap_or_else(|| self.catalog.available_ids())
    }

    /// One conversational turn: pick the model, open or resume the session,
    /// record the user message, dispatch, record the reply.
    ///
    /// A resumed session keeps the model it was created with.
    pub async fn ask(
        &self,
        choice: ModelChoice,
        prompt: &str,
        session: Option<&str>,
        options: AskOptions,
    ) -> Result<AskOutcome> {
        let (session_id, model_id, selection, history) = match session {
            Some(id) => {
                let existing = self.store.get_session(id)?;
                if let ModelChoice::Manual(requested) = &choice {
                    if *requested != existing.model_id {
                        warn!(
                            session = id,
                            requested = %requested,
                            model = %existing.model_id,
                            "session keeps its original model"
                        );
                    }
                }
                let history = self.store.get_messages(id)?;
                (existing.id, existing.model_id, None, history)
            }
            None => {
                let (model_id, selection) = match choice {
                    ModelChoice::Auto => {
                        let selection = self.selector.select(prompt, &self.available_models());
                        (selection.model_id.clone(), Some(selection))
                    }
                    ModelChoice::Manual(id) => (id, None),
                };
                let descriptor = self
                    .catalog
                    .get(&model_id)
                    .ok_or_else(|| EngineError::UnknownModel(model_id.clone()))?;
                let id = self
                    .store
                    .create_session(&model_id, &descriptor.display_name, None)?;
                (id, model_id, selection, Vec::new())
            }
        };

        let descriptor = self
            .catalog
            .get(&model_id)
            .ok_or_else(|| EngineError::UnknownModel(model_id.clone()))?;

        self.store.add_message(
            &session_id,
            NewMessage::user(prompt).with_token_count(estimate_tokens(prompt)),
        )?;

        let budget = u64::from(descriptor.capabilities.context_window_tokens) / 2;
        let folded = fold_history(&history, prompt, options.history_messages, budget);
        let mut request = DispatchRequest::new(folded).with_overrides(options.overrides);
        if let Some(system) = options.system_prompt {
            request = request.with_system(system);
        }
        if let Some(deadline) = options.deadline {
            request = request.with_deadline(deadline);
        }

        debug!(session = %session_id, model = %model_id, history = history.len(), "dispatching turn");
        let completion = self.dispatcher.dispatch(descriptor, &request).await;
        if let Some((kind, message)) = completion.error() {
            return Err(EngineError::Dispatch {
                model: model_id,
                kind,
                message: message.to_string(),
            });
        }

        let mut reply = NewMessage::assistant(completion.text.clone())
            .with_token_count(completion.output_tokens)
            .with_usage(
                completion.input_tokens,
                completion.output_tokens,
                completion.duration_ms,
            )
            .with_metadata("termination", json!(termination_label(&completion.termination)));
        if let Some(selection) = &selection {
            reply = reply
                .with_metadata("category", json!(selection.category.as_str()))
                .with_metadata("confidence", json!(selection.confidence))
                .with_metadata("source", json!(selection.source.as_str()));
        }
        self.store.add_message(&session_id, reply)?;

        Ok(AskOutcome {
            session_id,
            model_id,
            selection,
            completion,
        })
    }

    fn batch_executor(&self) -> BatchExecutor {
        BatchExecutor::new(
            self.catalog.clone(),
            self.dispatcher.clone(),
            self.checkpoints.clone(),
        )
    }

    pub async fn run_batch(
        &self,
        job: BatchJob,
        policy: ErrorPolicy,
        observer: &mut dyn BatchObserver,
        cancel: &CancellationToken,
    ) -> Result<BatchRun> {
        self.batch_executor()
            .run(job, policy, observer, cancel)
            .await
    }

    pub async fn resume_batch(
        &self,
        job_id: &str,
        policy: ErrorPolicy,
        observer: &mut dyn BatchObserver,
        cancel: &CancellationToken,
    ) -> Result<BatchRun> {
        self.batch_executor()
            .resume(job_id, policy, observer, cancel)
            .await
    }

    pub async fn run_workflow(
        &self,
        def: &WorkflowDefinition,
        initial: Variables,
        observer: &mut dyn StepObserver,
        cancel: &CancellationToken,
    ) -> Result<WorkflowExecution> {
        let runner = WorkflowRunner::new(
            self.catalog.clone(),
            self.dispatcher.clone(),
            self.selector.clone(),
            self.templates.clone(),
            self.available_models(),
        );
        runner.execute(def, initial, observer, cancel).await
    }

    /// Persist a finished execution under the workflow results directory.
    pub fn save_workflow_result(&self, execution: &WorkflowExecution) -> Result<std::path::PathBuf> {
        save_result(execution, &self.config.workflow_results_dir())
    }
}

fn termination_label(termination: &Termination) -> &'static str {
    match termination {
        Termination::Normal => "normal",
        Termination::MaxTokens => "max_tokens",
        Termination::Error { .. } => "error",
    }
}

/// Prefix `prompt` with the tail of the conversation that fits in `budget`
/// estimated tokens, at most `max_messages` messages.
fn fold_history(history: &[Message], prompt: &str, max_messages: usize, budget: u64) -> String {
    let mut used = estimate_tokens(prompt);
    let mut kept: Vec<&Message> = Vec::new();
    for message in history.iter().rev().take(max_messages) {
        if message.role == Role::System {
            continue;
        }
        let cost = estimate_tokens(&message.content);
        if used + cost > budget {
            break;
        }
        used += cost;
        kept.push(message);
    }

    if kept.is_empty() {
        return prompt.to_string();
    }

    let mut folded = String::from("Previous conversation:\n");
    for message in kept.iter().rev() {
        let speaker = match message.role {
            Role::User => "User",
            _ => "Assistant",
        };
        folded.push_str(&format!("\n{speaker}: {}\n", message.content));
    }
    folded.push_str(&format!("\nUser: {prompt}"));
    folded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedDispatch;
    use std::path::Path;
    use switchyard_catalog::{ErrorKind, IntentCategory};

    struct Fixture {
        core: Core,
        dispatch: Arc<ScriptedDispatch>,
        _home: tempfile::TempDir,
    }

    fn fixture(dispatch: ScriptedDispatch) -> Fixture {
        let home = tempfile::tempdir().unwrap();
        let config = CoreConfig::builder().home(home.path()).build();
        config.ensure_dirs().unwrap();
        let dispatch = Arc::new(dispatch);
        let core = Core::with_parts(
            config,
            Arc::new(Catalog::builtin(Path::new("/models"))),
            dispatch.clone(),
            Arc::new(SessionStore::open_in_memory().unwrap()),
        )
        .with_available(vec![
            "qwen3-coder-30b".into(),
            "qwen25-coder-14b".into(),
            "phi4-14b".into(),
        ]);
        Fixture {
            core,
            dispatch,
            _home: home,
        }
    }

    #[tokio::test]
    async fn test_ask_auto_records_both_messages() {
        let f = fixture(ScriptedDispatch::new());
        let outcome = f
            .core
            .ask(
                ModelChoice::Auto,
                "Write a Python function to implement binary search",
                None,
                AskOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.model_id, "qwen3-coder-30b");
        let selection = outcome.selection.unwrap();
        assert_eq!(selection.category, IntentCategory::Coding);

        let session = f.core.store().get_session(&outcome.session_id).unwrap();
        assert_eq!(session.message_count, 2);
        assert_eq!(session.title, "Write a Python function to implement binary search");
        assert_eq!(session.total_output_tokens, outcome.completion.output_tokens);

        let messages = f.core.store().get_messages(&outcome.session_id).unwrap();
        assert_eq!(messages[1].metadata["category"], "coding");
        assert_eq!(messages[1].metadata["termination"], "normal");
    }

    #[tokio::test]
    async fn test_follow_up_folds_history_and_keeps_model() {
        let f = fixture(ScriptedDispatch::new());
        let first = f
            .core
            .ask(
                ModelChoice::Manual("phi4-14b".into()),
                "Explain entropy",
                None,
                AskOptions::default(),
            )
            .await
            .unwrap();
        let second = f
            .core
            .ask(
                ModelChoice::Manual("qwen3-coder-30b".into()),
                "Shorter please",
                Some(&first.session_id),
                AskOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(second.session_id, first.session_id);
        assert_eq!(second.model_id, "phi4-14b");
        assert!(second.selection.is_none());

        let prompts = f.dispatch.prompts();
        assert_eq!(prompts[0], "Explain entropy");
        assert!(prompts[1].starts_with("Previous conversation:"));
        assert!(prompts[1].contains("User: Explain entropy"));
        assert!(prompts[1].contains("Assistant: answer to Explain entropy"));
        assert!(prompts[1].ends_with("User: Shorter please"));
        assert_eq!(f.core.store().get_session(&first.session_id).unwrap().message_count, 4);
    }

    #[tokio::test]
    async fn test_failed_dispatch_is_an_error() {
        let f = fixture(ScriptedDispatch::new().failing_at(&[0]));
        let err = f
            .core
            .ask(ModelChoice::Manual("phi4-14b".into()), "hi", None, AskOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
    }

    #[tokio::test]
    async fn test_unknown_model_and_session() {
        let f = fixture(ScriptedDispatch::new());
        let err = f
            .core
            .ask(ModelChoice::Manual("ghost".into()), "hi", None, AskOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = f
            .core
            .ask(ModelChoice::Auto, "hi", Some("missing"), AskOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(f.dispatch.calls(), 0);
    }

    #[test]
    fn test_fold_history_respects_budget() {
        let now = chrono::Utc::now();
        let message = |seq: u64, role: Role, content: &str| Message {
            id: seq as i64,
            session_id: "s".into(),
            sequence_number: seq,
            role,
            content: content.into(),
            created_at: now,
            token_count: None,
            input_tokens: None,
            output_tokens: None,
            duration_ms: None,
            metadata: Default::default(),
        };
        let history = vec![
            message(1, Role::User, &"old ".repeat(200)),
            message(2, Role::Assistant, "recent answer"),
        ];

        let folded = fold_history(&history, "next", 10, 50);
        assert!(folded.contains("Assistant: recent answer"));
        assert!(!folded.contains("old old"));

        assert_eq!(fold_history(&history, "next", 0, 50), "next");
    }
}
