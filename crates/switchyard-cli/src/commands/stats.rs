//! Analytics display.

use colored::Colorize;
use serde_json::json;

use super::App;
use crate::error::{CliError, CliResult};
use crate::ui::{heading, truncate};

pub(crate) fn show(app: &App, days: u32, as_json: bool) -> CliResult<()> {
    let store = app.core.store();
    let stats = store.statistics(days)?;
    let usage = store.model_usage(days)?;
    let activity = store.daily_activity(days)?;
    let performance = store.model_performance()?;
    let daily = store.daily_statistics(days)?;
    let recent = store.session_summaries(5)?;

    if as_json {
        let body = json!({
            "statistics": stats,
            "model_usage": usage,
            "daily_activity": activity,
            "model_performance": performance,
            "daily_statistics": daily,
            "recent_sessions": recent,
        });
        let text =
            serde_json::to_string_pretty(&body).map_err(|e| CliError::internal(e.to_string()))?;
        println!("{text}");
        return Ok(());
    }

    heading(&format!("Last {days} days"));
    println!("Sessions:            {}", stats.sessions);
    println!(
        "Messages:            {} ({} user, {} assistant)",
        stats.messages, stats.user_messages, stats.assistant_messages
    );
    println!("Tokens:              {}", stats.total_tokens);
    println!("Avg tokens/message:  {:.1}", stats.avg_tokens_per_message);

    if !usage.is_empty() {
        println!();
        println!("{}", "Models by sessions".bold());
        for row in &usage {
            println!("  {:<24} {}", row.model_id, row.session_count);
        }
    }

    if !performance.is_empty() {
        println!();
        println!("{}", "Model performance (all time)".bold());
        for row in &performance {
            let speed = row
                .tokens_per_second
                .map(|t| format!("{t:.1} tok/s"))
                .unwrap_or_else(|| "-".to_string());
            let latency = row
                .avg_duration_ms
                .map(|d| format!("{:.1}s", d / 1000.0))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {:<24} {:>5} replies  {:>8}  {:>12}",
                row.model_id, row.response_count, latency, speed
            );
        }
    }

    if !daily.is_empty() {
        println!();
        println!("{}", "Daily messages".bold());
        let peak = daily.iter().map(|d| d.message_count).max().unwrap_or(1).max(1);
        for day in &daily {
            let width = (day.message_count * 30 / peak) as usize;
            println!(
                "  {}  {:<30} {:>4} msgs, {} sessions",
                day.day,
                "#".repeat(width),
                day.message_count,
                day.active_sessions
            );
        }
    }

    if !recent.is_empty() {
        println!();
        println!("{}", "Recent sessions".bold());
        for row in &recent {
            let mark = if row.bookmarked { "*" } else { " " };
            println!(
                "  {}{:<24} {:<20} {:>4} msgs  {}",
                mark,
                row.session_id,
                truncate(&row.model_id, 20),
                row.message_count,
                truncate(&row.title, 40)
            );
        }
    }
    Ok(())
}
