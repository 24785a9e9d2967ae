//! Terminal rendering of the lead table and feedback prompts.

use std::fmt::Write as _;

use async_trait::async_trait;
use client_core::{Confirmer, LeadListView, MasterCheckbox, NoticeLevel, Notifier};
use shared::domain::{Lead, SystemStatus};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::debug;

/// Writes notifications to stderr so table output stays pipeable.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        let tag = match level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        eprintln!("[{tag}] {message}");
    }
}

/// Asks on stderr and reads a y/N answer from stdin.
pub struct StdinConfirmer;

#[async_trait]
impl Confirmer for StdinConfirmer {
    async fn confirm(&self, title: &str, message: &str) -> bool {
        eprint!("{title}: {message} [y/N] ");
        let mut line = String::new();
        let mut stdin = BufReader::new(io::stdin());
        match stdin.read_line(&mut line).await {
            Ok(_) => is_yes(&line),
            Err(err) => {
                debug!(error = %err, "confirm: failed to read answer");
                false
            }
        }
    }
}

pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes" | "s" | "si")
}

fn cell(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("-")
}

fn row(lead: &Lead) -> String {
    let last_call = lead
        .last_call_time
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".into());
    format!(
        "[{}] {:>6}  {:<24} {:<14} {:<14} {:<18} {:<18} {:<18} {:<11} {:>3} {:>3}  {}",
        if lead.selected_for_calling { 'x' } else { ' ' },
        lead.id.0,
        lead.full_name(),
        lead.display_phone(),
        lead.display_city(),
        cell(lead.status_level_1.as_deref()),
        cell(lead.status_level_2.as_deref()),
        lead.display_clinic(),
        lead.call_status.as_str(),
        lead.call_priority,
        lead.call_attempts_count,
        last_call,
    )
}

pub fn render_view(view: &LeadListView) -> String {
    let master = match view.master {
        MasterCheckbox::Unchecked => ' ',
        MasterCheckbox::Indeterminate => '-',
        MasterCheckbox::Checked => 'x',
    };
    let mut out = String::new();
    let _ = writeln!(
        out,
        "[{master}] {:>6}  {:<24} {:<14} {:<14} {:<18} {:<18} {:<18} {:<11} {:>3} {:>3}  {}",
        "id", "name", "phone", "city", "estado1", "estado2", "clinic", "status", "pri", "att", "last call"
    );

    if view.rows.is_empty() {
        out.push_str("(no leads match the current filters)\n");
    }
    for lead in &view.rows {
        out.push_str(&row(lead));
        out.push('\n');
    }

    let (first, last) = view.pagination.display_range();
    let _ = writeln!(
        out,
        "page {}/{} of {} filtered | server rows {first}-{last} of {} (page {}/{}) | {} selected",
        view.page,
        view.page_count.max(1),
        view.filtered_total,
        view.pagination.total,
        view.pagination.current_page(),
        view.pagination.total_pages().max(1),
        view.selected_count,
    );
    out
}

pub fn render_status(status: &SystemStatus) -> String {
    let stats = status.stats;
    format!(
        "calling system {} | total {} | completed {} | errors {} | in progress {} | {:.0}% done",
        if status.is_running { "RUNNING" } else { "stopped" },
        stats.total,
        stats.completed,
        stats.error,
        stats.in_progress,
        stats.progress_percent(),
    )
}

#[cfg(test)]
#[path = "tests/console_tests.rs"]
mod tests;
