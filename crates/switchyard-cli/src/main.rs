//! Switchyard CLI - route prompts to the right model, keep the conversation.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use switchyard_engine::{Core, CoreConfig};

mod commands;
mod error;
mod ui;

use error::{CliError, CliResult};

/// Switchyard - pick a model for every prompt
#[derive(Parser)]
#[command(name = "switchyard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Skip confirmation prompts for this run
    #[arg(short, long, global = true)]
    yes: bool,

    /// Start the interactive menu when omitted
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one prompt, auto-selecting the model unless --model is given
    Ask {
        /// Prompt text
        #[arg(required = true)]
        prompt: Vec<String>,
        /// Model id (default: auto)
        #[arg(short, long)]
        model: Option<String>,
        /// Continue an existing session
        #[arg(short, long)]
        session: Option<String>,
        /// System prompt
        #[arg(long)]
        system: Option<String>,
        #[arg(long)]
        temperature: Option<f32>,
        #[arg(long)]
        max_tokens: Option<u32>,
        /// Abort the call after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Only show the detected intent and ranked models
        #[arg(long)]
        recommend: bool,
    },

    /// List catalog models and their availability
    Models {
        /// Only models that can run now
        #[arg(long)]
        available: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage stored sessions
    #[command(subcommand)]
    Sessions(SessionCommand),

    /// Run prompt batches
    #[command(subcommand)]
    Batch(BatchCommand),

    /// Run multi-step workflows
    #[command(subcommand)]
    Workflow(WorkflowCommand),

    /// Show usage analytics
    Stats {
        /// Window in days
        #[arg(long, default_value_t = 30)]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or change model preferences
    #[command(subcommand)]
    Prefs(PrefsCommand),
}

#[derive(Subcommand)]
enum SessionCommand {
    /// List sessions, most recent first
    List {
        #[arg(long, default_value_t = 20)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        /// Only sessions for this model
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Print a session's messages
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Full-text search over messages and titles
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Export a session as JSON or Markdown
    Export {
        id: String,
        #[arg(short, long, default_value = "markdown")]
        format: String,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import a session from a JSON export
    Import { file: PathBuf },
    /// Delete a session and everything attached to it
    Delete { id: String },
    /// Delete sessions inactive for more than N days
    Prune {
        #[arg(long)]
        days: u32,
    },
    /// Add or remove a tag
    Tag {
        id: String,
        tag: String,
        #[arg(long)]
        remove: bool,
    },
    /// List tags with counts, or the sessions carrying one tag
    Tags { tag: Option<String> },
    /// Bookmark a session, or list bookmarks when no id is given
    Bookmark {
        id: Option<String>,
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        remove: bool,
    },
}

#[derive(Subcommand)]
enum BatchCommand {
    /// Run every prompt in a file against one model
    Run {
        /// Prompt file (text lines, JSON array, or {"prompts": [...]})
        file: PathBuf,
        #[arg(short, long)]
        model: String,
        #[arg(long)]
        system: Option<String>,
        /// stop | continue | threshold:N
        #[arg(long, default_value = "continue")]
        on_error: String,
        /// Write results here when done
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Continue a checkpointed job
    Resume {
        job_id: String,
        #[arg(long, default_value = "continue")]
        on_error: String,
    },
    /// List checkpoints
    List,
    /// Write a checkpoint's results as JSON or CSV
    Export {
        job_id: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Delete a checkpoint
    Purge { job_id: String },
}

#[derive(Subcommand)]
enum WorkflowCommand {
    /// List workflow definitions
    List,
    /// Check a workflow without running it
    Validate {
        /// Workflow file, id or name
        workflow: String,
    },
    /// Run a workflow
    Run {
        /// Workflow file, id or name
        workflow: String,
        /// Initial variable, repeatable (name=value)
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,
        /// Do not write a result file
        #[arg(long)]
        no_save: bool,
    },
}

#[derive(Subcommand)]
enum PrefsCommand {
    /// Show preferences
    Show,
    /// Prefer a model for a category
    Set { category: String, model: String },
    /// Forget the preference for a category
    Clear { category: String },
    /// Turn bypass-confirmations on or off
    Bypass {
        #[arg(value_parser = ["on", "off"])]
        state: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::internal(format!("cannot start runtime: {e}")))?;
    let core = Core::open(CoreConfig::from_env())?;
    let app = commands::App::new(core, cli.yes);

    runtime.block_on(async {
        let Some(command) = cli.command else {
            return ui::menu::run(&app).await;
        };
        match command {
            Commands::Ask {
                prompt,
                model,
                session,
                system,
                temperature,
                max_tokens,
                timeout,
                recommend,
            } => {
                let prompt = prompt.join(" ");
                if recommend {
                    return commands::ask::recommend(&app, &prompt);
                }
                let args = commands::ask::AskArgs {
                    model,
                    session,
                    system,
                    temperature,
                    max_tokens,
                    timeout,
                };
                commands::ask::run(&app, &prompt, args).await.map(|_| ())
            }
            Commands::Models { available, json } => commands::models::list(&app, available, json),
            Commands::Sessions(cmd) => match cmd {
                SessionCommand::List {
                    limit,
                    offset,
                    model,
                    json,
                } => commands::sessions::list(&app, limit, offset, model.as_deref(), json),
                SessionCommand::Show { id, json } => commands::sessions::show(&app, &id, json),
                SessionCommand::Search { query, limit } => {
                    commands::sessions::search(&app, &query, limit)
                }
                SessionCommand::Export { id, format, output } => {
                    commands::sessions::export(&app, &id, &format, output.as_deref())
                }
                SessionCommand::Import { file } => commands::sessions::import(&app, &file),
                SessionCommand::Delete { id } => commands::sessions::delete(&app, &id),
                SessionCommand::Prune { days } => commands::sessions::prune(&app, days),
                SessionCommand::Tag { id, tag, remove } => {
                    commands::sessions::tag(&app, &id, &tag, remove)
                }
                SessionCommand::Tags { tag } => commands::sessions::tags(&app, tag.as_deref()),
                SessionCommand::Bookmark { id, note, remove } => {
                    commands::sessions::bookmark(&app, id.as_deref(), note.as_deref(), remove)
                }
            },
            Commands::Batch(cmd) => match cmd {
                BatchCommand::Run {
                    file,
                    model,
                    system,
                    on_error,
                    export,
                } => {
                    commands::batch::run(
                        &app,
                        &file,
                        &model,
                        system,
                        &on_error,
                        export.as_deref(),
                    )
                    .await
                }
                BatchCommand::Resume { job_id, on_error } => {
                    commands::batch::resume(&app, &job_id, &on_error).await
                }
                BatchCommand::List => commands::batch::list(&app),
                BatchCommand::Export { job_id, output } => {
                    commands::batch::export(&app, &job_id, &output)
                }
                BatchCommand::Purge { job_id } => commands::batch::purge(&app, &job_id),
            },
            Commands::Workflow(cmd) => match cmd {
                WorkflowCommand::List => commands::workflow::list(&app),
                WorkflowCommand::Validate { workflow } => {
                    commands::workflow::validate(&app, &workflow)
                }
                WorkflowCommand::Run {
                    workflow,
                    vars,
                    no_save,
                } => commands::workflow::run(&app, &workflow, &vars, !no_save).await,
            },
            Commands::Stats { days, json } => commands::stats::show(&app, days, json),
            Commands::Prefs(cmd) => match cmd {
                PrefsCommand::Show => commands::prefs::show(&app),
                PrefsCommand::Set { category, model } => {
                    commands::prefs::set(&app, &category, &model)
                }
                PrefsCommand::Clear { category } => commands::prefs::clear(&app, &category),
                PrefsCommand::Bypass { state } => commands::prefs::bypass(&app, state == "on"),
            },
        }
    })
}
