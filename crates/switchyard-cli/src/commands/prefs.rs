//! Preference commands.

use colored::Colorize;
use switchyard_catalog::IntentCategory;

use super::App;
use crate::error::{CliError, CliResult};

fn parse_category(text: &str) -> CliResult<IntentCategory> {
    text.parse()
        .map_err(|e: switchyard_catalog::UnknownCategory| CliError::validation(e.to_string()))
}

pub(crate) fn show(app: &App) -> CliResult<()> {
    let store = app.core.preferences();
    let prefs = store.load()?;
    let available = app.core.available_models();

    println!("Preferences ({})", store.path().display());
    println!();
    for category in IntentCategory::ALL {
        let (model, source) = app.core.selector().route(category, &available);
        let pinned = prefs.preferred_model(category);
        let note = match pinned {
            Some(id) if id != model => format!("(prefers {id}, unavailable)"),
            Some(_) => "(preference)".to_string(),
            None => format!("({})", source.as_str()),
        };
        println!("  {:<10} {:<24} {}", category.as_str(), model, note.dimmed());
    }
    println!();
    println!(
        "Bypass confirmations: {}",
        if prefs.bypass_confirmations {
            "on".yellow()
        } else {
            "off".normal()
        }
    );
    Ok(())
}

pub(crate) fn set(app: &App, category: &str, model: &str) -> CliResult<()> {
    let category = parse_category(category)?;
    app.core
        .selector()
        .record_preference(category, model)
        .map_err(|e| app.fail(e))?;
    println!("{category} prompts will prefer {model}.");
    Ok(())
}

pub(crate) fn clear(app: &App, category: &str) -> CliResult<()> {
    let category = parse_category(category)?;
    if app.core.preferences().clear_preference(category)? {
        println!("Cleared the {category} preference.");
    } else {
        println!("No preference was set for {category}.");
    }
    Ok(())
}

pub(crate) fn bypass(app: &App, enabled: bool) -> CliResult<()> {
    app.core.preferences().set_bypass_confirmations(enabled)?;
    println!(
        "Bypass confirmations {}.",
        if enabled { "on" } else { "off" }
    );
    Ok(())
}
