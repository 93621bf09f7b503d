//! Batch commands.

use std::path::Path;

use colored::Colorize;
use switchyard_catalog::ErrorKind;
use switchyard_engine::batch::{
    export_results, load_prompts, BatchJob, BatchRun, BatchStatus, ErrorPolicy, ResultFormat,
};

use super::{ctrl_c_token, App};
use crate::error::{CliError, CliResult};
use crate::ui::progress::BatchProgress;
use crate::ui::truncate;

fn parse_policy(text: &str) -> CliResult<ErrorPolicy> {
    text.parse().map_err(CliError::validation)
}

/// Result format implied by a file extension; JSON unless `.csv`.
fn format_for(path: &Path) -> ResultFormat {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(|e| e.parse().ok())
        .unwrap_or(ResultFormat::Json)
}

pub(crate) async fn run(
    app: &App,
    file: &Path,
    model: &str,
    system: Option<String>,
    on_error: &str,
    export: Option<&Path>,
) -> CliResult<()> {
    let policy = parse_policy(on_error)?;
    if !app.core.catalog().contains(model) {
        return Err(CliError::new(
            ErrorKind::NotFound,
            format!("unknown model '{model}'"),
        ));
    }
    let prompts = load_prompts(file).map_err(|e| app.fail(e))?;

    let mut job = BatchJob::new(model, prompts);
    if let Some(system) = system {
        job = job.with_system_prompt(system);
    }
    println!(
        "Batch {} : {} prompts on {}",
        job.job_id.cyan(),
        job.total(),
        model.bold()
    );

    let mut progress = BatchProgress::new(&job);
    let cancel = ctrl_c_token();
    let outcome = app
        .core
        .run_batch(job, policy, &mut progress, &cancel)
        .await;
    progress.finish();
    let run = outcome.map_err(|e| app.fail(e))?;

    finish(app, &run, export)
}

pub(crate) async fn resume(app: &App, job_id: &str, on_error: &str) -> CliResult<()> {
    let policy = parse_policy(on_error)?;
    let (job, _) = app.core.checkpoints().load(job_id)?;
    if job.status == BatchStatus::Completed {
        println!("Batch {job_id} already completed.");
        return Ok(());
    }
    println!(
        "Resuming {} at prompt {} of {}",
        job_id.cyan(),
        job.processed() + 1,
        job.total()
    );

    let mut progress = BatchProgress::new(&job);
    let cancel = ctrl_c_token();
    let outcome = app
        .core
        .resume_batch(job_id, policy, &mut progress, &cancel)
        .await;
    progress.finish();
    let run = outcome.map_err(|e| app.fail(e))?;

    finish(app, &run, None)
}

fn finish(app: &App, run: &BatchRun, export: Option<&Path>) -> CliResult<()> {
    let job = &run.job;
    let status = match job.status {
        BatchStatus::Completed => job.status.as_str().green(),
        _ => job.status.as_str().red(),
    };
    println!(
        "{}: {} succeeded, {} failed, {} of {} processed",
        status,
        job.completed_count,
        job.failed_count,
        job.processed(),
        job.total()
    );
    if let Some(message) = &job.error_message {
        println!("  {}", message.dimmed());
    }
    if job.status != BatchStatus::Completed {
        println!(
            "  resume with: switchyard batch resume {}",
            job.job_id
        );
    }

    if let Some(path) = export {
        export_results(job, &run.results, path, format_for(path)).map_err(|e| app.fail(e))?;
        println!("Results written to {}", path.display());
    }

    if job.was_cancelled() {
        return Err(CliError::new(ErrorKind::Cancelled, "batch cancelled"));
    }
    Ok(())
}

pub(crate) fn list(app: &App) -> CliResult<()> {
    let checkpoints = app.core.checkpoints().list()?;
    if checkpoints.is_empty() {
        println!("No checkpoints.");
        return Ok(());
    }
    println!(
        "{:<10} {:<22} {:<10} {:>9}  {}",
        "JOB", "MODEL", "STATUS", "DONE", "SAVED"
    );
    for c in checkpoints {
        println!(
            "{:<10} {:<22} {:<10} {:>9}  {}",
            c.job_id,
            truncate(&c.model_id, 22),
            c.status.as_str(),
            format!("{}/{}", c.completed_count + c.failed_count, c.total_prompts),
            c.last_checkpoint.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

pub(crate) fn export(app: &App, job_id: &str, output: &Path) -> CliResult<()> {
    let (job, results) = app.core.checkpoints().load(job_id)?;
    export_results(&job, &results, output, format_for(output)).map_err(|e| app.fail(e))?;
    println!("Wrote {} result(s) to {}", results.len(), output.display());
    Ok(())
}

pub(crate) fn purge(app: &App, job_id: &str) -> CliResult<()> {
    if !app.confirm(&format!("Delete checkpoint {job_id}?"))? {
        println!("Kept.");
        return Ok(());
    }
    if app.core.checkpoints().purge(job_id)? {
        println!("Deleted checkpoint {job_id}.");
        Ok(())
    } else {
        Err(CliError::new(
            ErrorKind::NotFound,
            format!("no checkpoint for job '{job_id}'"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(format_for(Path::new("out.csv")), ResultFormat::Csv);
        assert_eq!(format_for(Path::new("out.CSV")), ResultFormat::Csv);
        assert_eq!(format_for(Path::new("out.json")), ResultFormat::Json);
        assert_eq!(format_for(Path::new("out")), ResultFormat::Json);
    }

    #[test]
    fn test_policy_errors_are_validation() {
        assert_eq!(parse_policy("threshold:3").unwrap(), ErrorPolicy::Threshold(3));
        assert_eq!(parse_policy("sometimes").unwrap_err().kind, ErrorKind::Validation);
    }
}
