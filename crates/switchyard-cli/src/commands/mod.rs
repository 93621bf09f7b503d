//! CLI commands.

pub mod ask;
pub mod batch;
pub mod models;
pub mod prefs;
pub mod sessions;
pub mod stats;
pub mod workflow;

use switchyard_engine::{Core, EngineError};
use tokio_util::sync::CancellationToken;

use crate::error::{CliError, CliResult};
use crate::ui;

/// Shared state for every command.
pub struct App {
    pub core: Core,
    /// `--yes` for this run.
    yes: bool,
}

impl App {
    pub fn new(core: Core, yes: bool) -> Self {
        Self { core, yes }
    }

    /// Whether confirmations are skipped, by flag or saved preference.
    pub fn bypass(&self) -> bool {
        self.yes || self.core.preferences().load_or_default().bypass_confirmations
    }

    /// Ask before a destructive action.
    pub fn confirm(&self, question: &str) -> CliResult<bool> {
        if self.bypass() {
            return Ok(true);
        }
        ui::confirm(question)
    }

    /// Convert an engine error with catalog-aware hints.
    pub fn fail(&self, err: EngineError) -> CliError {
        CliError::from_engine(err, self.core.catalog())
    }
}

/// A token cancelled by the first Ctrl-C.
pub(crate) fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling after the current call finishes...");
            trigger.cancel();
        }
    });
    token
}
