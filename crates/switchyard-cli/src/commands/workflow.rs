//! Workflow commands.

use std::path::Path;

use colored::Colorize;
use switchyard_catalog::ErrorKind;
use switchyard_engine::workflow::{
    validate as validate_definition, Step, Value, Variables, WorkflowDefinition, WorkflowExecution,
    WorkflowLibrary, WorkflowStatus,
};

use super::{ctrl_c_token, App};
use crate::error::{CliError, CliResult};
use crate::ui::truncate;

/// A path to a definition file, else an id or name in the library.
fn resolve(app: &App, workflow: &str) -> CliResult<WorkflowDefinition> {
    let path = Path::new(workflow);
    let def = if path.is_file() {
        WorkflowLibrary::load_file(path)
    } else {
        app.core.workflows().find(workflow)
    };
    def.map_err(|e| app.fail(e))
}

/// Parse repeated `name=value` flags. A value holding a JSON array becomes a
/// list.
fn parse_vars(pairs: &[String]) -> CliResult<Variables> {
    let mut vars = Variables::new();
    for pair in pairs {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| CliError::validation(format!("expected NAME=VALUE, got '{pair}'")))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(CliError::validation(format!("empty variable name in '{pair}'")));
        }
        let value = match serde_json::from_str::<Vec<String>>(value.trim()) {
            Ok(items) if value.trim_start().starts_with('[') => Value::List(items),
            _ => Value::text(value),
        };
        vars.insert(name.to_string(), value);
    }
    Ok(vars)
}

pub(crate) fn list(app: &App) -> CliResult<()> {
    let library = app.core.workflows();
    let defs = library.list().map_err(|e| app.fail(e))?;
    if defs.is_empty() {
        println!("No workflows in {}", library.dir().display());
        return Ok(());
    }
    for def in defs {
        println!(
            "{:<20} {:<28} v{:<6} {} steps  {}",
            def.id.cyan(),
            truncate(&def.name, 28),
            def.version,
            def.steps.len(),
            truncate(&def.description, 40).dimmed()
        );
    }
    Ok(())
}

pub(crate) fn validate(app: &App, workflow: &str) -> CliResult<()> {
    let def = resolve(app, workflow)?;
    match validate_definition(&def, Some(app.core.catalog())) {
        Ok(()) => {
            println!(
                "{} {} ({} steps)",
                "valid:".green(),
                def.name,
                def.all_steps().len()
            );
            Ok(())
        }
        Err(errors) => {
            for error in &errors {
                println!("  {} {}", "-".red(), error);
            }
            Err(CliError::validation(format!(
                "workflow '{}' has {} problem(s)",
                def.name,
                errors.len()
            )))
        }
    }
}

pub(crate) async fn run(app: &App, workflow: &str, vars: &[String], save: bool) -> CliResult<()> {
    let def = resolve(app, workflow)?;
    let initial = parse_vars(vars)?;
    let total = def.steps.len();
    println!("Running {} ({} steps)", def.name.bold(), total);

    let mut observer = move |exec: &WorkflowExecution, step: &Step| {
        println!(
            "{} [{}/{}] {} ({})",
            "▶".green(),
            exec.current_step_index + 1,
            total,
            step.name,
            step.kind.type_name()
        );
    };
    let cancel = ctrl_c_token();
    let exec = app
        .core
        .run_workflow(&def, initial, &mut observer, &cancel)
        .await
        .map_err(|e| app.fail(e))?;

    print_execution(&exec);
    if save {
        let path = app
            .core
            .save_workflow_result(&exec)
            .map_err(|e| app.fail(e))?;
        println!("{}", format!("result saved to {}", path.display()).dimmed());
    }

    match exec.status {
        WorkflowStatus::Completed => Ok(()),
        _ if exec.was_cancelled() => Err(CliError::new(ErrorKind::Cancelled, "workflow cancelled")),
        _ => Err(CliError::new(
            ErrorKind::Backend,
            exec.error_message
                .unwrap_or_else(|| "workflow failed".to_string()),
        )),
    }
}

fn print_execution(exec: &WorkflowExecution) {
    println!();
    for (name, result) in &exec.step_results {
        match (&result.output, &result.error) {
            (_, Some(error)) => println!("  {} {}: {}", "x".red(), name, error),
            (Some(output), None) => {
                println!("  {} {}: {}", "ok".green(), name, truncate(&output.render(), 70))
            }
            (None, None) => println!("  {} {}", "ok".green(), name),
        }
    }
    println!();
    println!(
        "{} in {:.1}s",
        exec.status.as_str().bold(),
        exec.duration_seconds()
    );
}
