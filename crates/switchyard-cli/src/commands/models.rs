//! Catalog listing.

use colored::Colorize;
use serde_json::json;

use super::App;
use crate::error::{CliError, CliResult};

pub(crate) fn list(app: &App, only_available: bool, as_json: bool) -> CliResult<()> {
    let catalog = app.core.catalog();
    let available = app.core.available_models();
    let is_available = |id: &str| available.iter().any(|a| a == id);

    let models: Vec<_> = catalog
        .models()
        .iter()
        .filter(|m| !only_available || is_available(&m.id))
        .collect();

    if as_json {
        let rows: Vec<_> = models
            .iter()
            .map(|m| json!({ "model": m, "available": is_available(&m.id) }))
            .collect();
        let text = serde_json::to_string_pretty(&rows)
            .map_err(|e| CliError::internal(e.to_string()))?;
        println!("{text}");
        return Ok(());
    }

    if models.is_empty() {
        println!("No models are available.");
        println!();
        println!("Local models are looked up under: {}", app.core.config().models_dir.display());
        println!("Remote models need their API key environment variable set.");
        return Ok(());
    }

    println!("{:<24} {:<28} {:<11} {:<10} {}", "ID", "NAME", "BACKEND", "CATEGORY", "READY");
    for m in models {
        let ready = if is_available(&m.id) {
            "yes".green()
        } else {
            "no".red()
        };
        println!(
            "{:<24} {:<28} {:<11} {:<10} {}",
            m.id,
            m.display_name,
            m.backend.as_str(),
            m.primary_category().as_str(),
            ready
        );
    }
    println!();
    println!("General fallback: {}", catalog.general_model());
    Ok(())
}
