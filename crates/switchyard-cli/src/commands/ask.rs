//! Single-prompt commands.

use std::time::Duration;

use colored::Colorize;
use switchyard_catalog::SamplingParams;
use switchyard_engine::{explain, AskOptions, AskOutcome, ModelChoice};

use super::App;
use crate::error::CliResult;

#[derive(Debug, Default)]
pub struct AskArgs {
    pub model: Option<String>,
    pub session: Option<String>,
    pub system: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout: Option<u64>,
}

impl AskArgs {
    fn choice(&self) -> ModelChoice {
        match self.model.as_deref() {
            None | Some("auto") => ModelChoice::Auto,
            Some(id) => ModelChoice::Manual(id.to_string()),
        }
    }

    fn options(&self) -> AskOptions {
        AskOptions {
            system_prompt: self.system.clone(),
            overrides: SamplingParams {
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                ..SamplingParams::default()
            },
            deadline: self.timeout.map(Duration::from_secs),
            ..AskOptions::default()
        }
    }
}

/// Send one prompt and print the reply.
pub(crate) async fn run(app: &App, prompt: &str, args: AskArgs) -> CliResult<AskOutcome> {
    let outcome = app
        .core
        .ask(args.choice(), prompt, args.session.as_deref(), args.options())
        .await
        .map_err(|e| app.fail(e))?;
    print_outcome(app, prompt, &outcome);
    Ok(outcome)
}

pub(crate) fn print_outcome(app: &App, prompt: &str, outcome: &AskOutcome) {
    let name = app
        .core
        .catalog()
        .get(&outcome.model_id)
        .map(|m| m.display_name.as_str())
        .unwrap_or(&outcome.model_id);

    println!();
    println!("{} {}", "▶".green(), name.bold());
    if let Some(selection) = &outcome.selection {
        println!(
            "  {} (via {})",
            explain(selection.category, selection.confidence, prompt).dimmed(),
            selection.source.as_str()
        );
    }
    println!();
    println!("{}", outcome.completion.text.trim_end());
    println!();

    let c = &outcome.completion;
    let mut footer = format!(
        "session {} | {} in / {} out tokens | {:.1}s",
        outcome.session_id,
        c.input_tokens,
        c.output_tokens,
        c.duration_ms as f64 / 1000.0
    );
    if c.termination == switchyard_engine::Termination::MaxTokens {
        footer.push_str(" | stopped at max tokens");
    }
    println!("{}", footer.dimmed());
}

/// Show the detected intent and the ranked models without dispatching.
pub(crate) fn recommend(app: &App, prompt: &str) -> CliResult<()> {
    let selector = app.core.selector();
    let available = app.core.available_models();
    let classification = selector.classify(prompt);

    println!(
        "{}",
        explain(classification.category, classification.confidence, prompt)
    );
    let selection = selector.select(prompt, &available);
    println!(
        "Would use: {} ({})",
        selection.model_id.bold(),
        selection.source.as_str()
    );

    let ranked = selector.recommendations(prompt, 5, &available);
    if ranked.is_empty() {
        println!("No models are available. Run `switchyard models` for details.");
        return Ok(());
    }
    println!();
    for (i, rec) in ranked.iter().enumerate() {
        println!(
            "  {}. {:<24} {:<10} {:>4.0}%",
            i + 1,
            rec.display_name,
            rec.category.as_str(),
            rec.confidence * 100.0
        );
    }
    Ok(())
}
