//! Interactive menu, the default entry point.

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::commands::{self, ask::AskArgs, App};
use crate::error::CliResult;

const MENU: &[(&str, &str)] = &[
    ("1", "Ask (auto-select model)"),
    ("2", "Ask a specific model"),
    ("3", "Sessions"),
    ("4", "Batch processing"),
    ("5", "Workflows"),
    ("6", "Analytics"),
    ("7", "Preferences"),
    ("0", "Exit"),
];

struct Menu<'a> {
    app: &'a App,
    editor: DefaultEditor,
}

pub async fn run(app: &App) -> CliResult<()> {
    let mut menu = Menu {
        app,
        editor: DefaultEditor::new()?,
    };
    menu.banner();

    loop {
        println!();
        for (key, label) in MENU {
            println!("  {} {}", key.cyan().bold(), label);
        }
        let Some(choice) = menu.read("\nchoice> ")? else {
            break;
        };

        let result = match choice.as_str() {
            "1" => menu.chat(None, None).await,
            "2" => menu.pick_and_chat().await,
            "3" => menu.sessions().await,
            "4" => menu.batch().await,
            "5" => menu.workflows().await,
            "6" => commands::stats::show(app, 30, false),
            "7" => menu.preferences(),
            "0" | "q" | "quit" | "exit" => break,
            "" => Ok(()),
            other => {
                println!("Unknown option '{other}'.");
                Ok(())
            }
        };
        if let Err(err) = result {
            eprintln!("{:?}", miette::Report::new(err));
        }
    }

    println!("Bye.");
    Ok(())
}

impl Menu<'_> {
    fn banner(&self) {
        let available = self.app.core.available_models();
        println!("{}", "Switchyard".bold());
        println!(
            "{} of {} models ready. Home: {}",
            available.len(),
            self.app.core.catalog().models().len(),
            self.app.core.config().home.display()
        );
        if self.app.bypass() {
            println!("{}", "Bypass mode: confirmations are skipped.".yellow());
        }
    }

    /// One trimmed line, `None` on Ctrl-C or Ctrl-D.
    fn read(&mut self, prompt: &str) -> CliResult<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                let line = line.trim().to_string();
                if !line.is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// A non-empty answer, or `None` to go back.
    fn ask_for(&mut self, label: &str) -> CliResult<Option<String>> {
        Ok(self
            .read(&format!("{label}: "))?
            .filter(|answer| !answer.is_empty()))
    }

    /// Converse until an empty line.
    async fn chat(&mut self, model: Option<String>, mut session: Option<String>) -> CliResult<()> {
        println!("{}", "Empty line returns to the menu.".dimmed());
        loop {
            let Some(prompt) = self.ask_for(&"you".green().bold().to_string())? else {
                return Ok(());
            };
            let args = AskArgs {
                model: model.clone(),
                session: session.clone(),
                ..AskArgs::default()
            };
            match commands::ask::run(self.app, &prompt, args).await {
                Ok(outcome) => session = Some(outcome.session_id),
                Err(err) => eprintln!("{:?}", miette::Report::new(err)),
            }
        }
    }

    async fn pick_and_chat(&mut self) -> CliResult<()> {
        let available = self.app.core.available_models();
        if available.is_empty() {
            println!("No models are available. Run `switchyard models` for details.");
            return Ok(());
        }
        for (i, id) in available.iter().enumerate() {
            let name = self
                .app
                .core
                .catalog()
                .get(id)
                .map(|m| m.display_name.clone())
                .unwrap_or_default();
            println!("  {:>2}. {:<24} {}", i + 1, id, name.dimmed());
        }
        let Some(answer) = self.ask_for("model (number or id)")? else {
            return Ok(());
        };
        let model = match answer.parse::<usize>() {
            Ok(n) if (1..=available.len()).contains(&n) => available[n - 1].clone(),
            _ => answer,
        };
        self.chat(Some(model), None).await
    }

    async fn sessions(&mut self) -> CliResult<()> {
        let app = self.app;
        println!("  [l]ist  [r]esume  [s]how  [f]ind  [e]xport  [t]ag  [d]elete");
        let Some(action) = self.ask_for("sessions")? else {
            return Ok(());
        };
        match action.as_str() {
            "l" | "list" => commands::sessions::list(app, 10, 0, None, false),
            "r" | "resume" => match self.ask_for("session id")? {
                Some(id) => {
                    app.core.store().get_session(&id)?;
                    self.chat(None, Some(id)).await
                }
                None => Ok(()),
            },
            "s" | "show" => match self.ask_for("session id")? {
                Some(id) => commands::sessions::show(app, &id, false),
                None => Ok(()),
            },
            "f" | "find" | "search" => match self.ask_for("search")? {
                Some(query) => commands::sessions::search(app, &query, 10),
                None => Ok(()),
            },
            "e" | "export" => {
                let Some(id) = self.ask_for("session id")? else {
                    return Ok(());
                };
                let format = self
                    .ask_for("format [markdown/json]")?
                    .unwrap_or_else(|| "markdown".to_string());
                let path = app
                    .core
                    .config()
                    .exports_dir()
                    .join(format!("{id}.{}", if format == "json" { "json" } else { "md" }));
                commands::sessions::export(app, &id, &format, Some(&path))
            }
            "t" | "tag" => {
                let Some(id) = self.ask_for("session id")? else {
                    return Ok(());
                };
                match self.ask_for("tag")? {
                    Some(tag) => commands::sessions::tag(app, &id, &tag, false),
                    None => Ok(()),
                }
            }
            "d" | "delete" => match self.ask_for("session id")? {
                Some(id) => commands::sessions::delete(app, &id),
                None => Ok(()),
            },
            other => {
                println!("Unknown action '{other}'.");
                Ok(())
            }
        }
    }

    async fn batch(&mut self) -> CliResult<()> {
        let app = self.app;
        println!("  [n]ew from file  [r]esume  [l]ist");
        let Some(action) = self.ask_for("batch")? else {
            return Ok(());
        };
        match action.as_str() {
            "n" | "new" => {
                let Some(file) = self.ask_for("prompt file")? else {
                    return Ok(());
                };
                let model = self
                    .ask_for("model id (blank for the general model)")?
                    .unwrap_or_else(|| app.core.catalog().general_model().to_string());
                let policy = self
                    .ask_for("on error [continue/stop/threshold:N]")?
                    .unwrap_or_else(|| "continue".to_string());
                commands::batch::run(app, file.as_ref(), &model, None, &policy, None).await
            }
            "r" | "resume" => match self.ask_for("job id")? {
                Some(job_id) => commands::batch::resume(app, &job_id, "continue").await,
                None => Ok(()),
            },
            "l" | "list" => commands::batch::list(app),
            other => {
                println!("Unknown action '{other}'.");
                Ok(())
            }
        }
    }

    async fn workflows(&mut self) -> CliResult<()> {
        let app = self.app;
        println!("  [l]ist  [v]alidate  [r]un");
        let Some(action) = self.ask_for("workflows")? else {
            return Ok(());
        };
        match action.as_str() {
            "l" | "list" => commands::workflow::list(app),
            "v" | "validate" => match self.ask_for("workflow (file, id or name)")? {
                Some(workflow) => commands::workflow::validate(app, &workflow),
                None => Ok(()),
            },
            "r" | "run" => {
                let Some(workflow) = self.ask_for("workflow (file, id or name)")? else {
                    return Ok(());
                };
                let mut vars = Vec::new();
                println!("{}", "Variables as name=value, empty line to start.".dimmed());
                while let Some(pair) = self.ask_for("var")? {
                    vars.push(pair);
                }
                commands::workflow::run(app, &workflow, &vars, true).await
            }
            other => {
                println!("Unknown action '{other}'.");
                Ok(())
            }
        }
    }

    fn preferences(&mut self) -> CliResult<()> {
        let app = self.app;
        commands::prefs::show(app)?;
        println!();
        println!("  [s]et preference  [c]lear preference  [b]ypass toggle");
        let Some(action) = self.ask_for("preferences")? else {
            return Ok(());
        };
        match action.as_str() {
            "s" | "set" => {
                let (Some(category), Some(model)) =
                    (self.ask_for("category")?, self.ask_for("model id")?)
                else {
                    return Ok(());
                };
                commands::prefs::set(app, &category, &model)
            }
            "c" | "clear" => match self.ask_for("category")? {
                Some(category) => commands::prefs::clear(app, &category),
                None => Ok(()),
            },
            "b" | "bypass" => {
                let current = app.core.preferences().load()?.bypass_confirmations;
                commands::prefs::bypass(app, !current)
            }
            other => {
                println!("Unknown action '{other}'.");
                Ok(())
            }
        }
    }
}
