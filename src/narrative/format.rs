//! Markdown fragments appended to session logs and the canonical digest.
//!
//! Pure string builders; all I/O lives in [`super::writer`] and
//! [`super::digest`].

use std::fmt::Write as _;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// First eight characters of a session id, used in checkpoint tokens.
#[must_use]
pub fn short_id(id: &str) -> &str {
    id.char_indices().nth(8).map_or(id, |(idx, _)| &id[..idx])
}

/// ISO-8601 UTC timestamp with millisecond precision.
#[must_use]
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Deterministic log file name for a session.
#[must_use]
pub fn log_file_name(date: NaiveDate, session_id: &str) -> String {
    format!("Session_{}_{session_id}.md", date.format("%Y-%m-%d"))
}

/// First `max_chars` characters of `text`, with `...` when cut.
#[must_use]
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_owned(),
    }
}

/// Fields rendered into a new session log.
#[derive(Debug, Clone, Copy)]
pub struct Header<'a> {
    /// Session identifier.
    pub session_id: &'a str,
    /// Session start.
    pub started_at: DateTime<Utc>,
    /// Project attribution.
    pub project_id: Option<&'a str>,
    /// User attribution.
    pub user_id: Option<&'a str>,
    /// Already-truncated project state text.
    pub project_state_preview: Option<&'a str>,
}

/// Title, metadata block, and init checklist for a new log.
#[must_use]
pub fn session_header(header: &Header<'_>) -> String {
    let mut out = format!("# Session Log: {}\n", header.session_id);
    let _ = writeln!(out, "**Date**: {}", timestamp(header.started_at));
    let _ = writeln!(out, "**Project**: {}", header.project_id.unwrap_or("N/A"));
    let _ = writeln!(out, "**User**: {}", header.user_id.unwrap_or("N/A"));
    out.push_str("\n## Init\n");
    out.push_str("- [x] Core Identity Loaded\n");
    out.push_str("- [x] Session Started\n");
    out.push_str("- [x] Project State Injected\n\n");
    if let Some(snapshot) = header.project_state_preview {
        let _ = write!(out, "### Project State Snapshot\n{snapshot}\n\n");
    }
    out
}

/// Entry appended when an existing session is resumed.
#[must_use]
pub fn resumed_entry(at: DateTime<Utc>) -> String {
    format!("\n## Session Resumed\n**Resumed At**: {}\n", timestamp(at))
}

/// Quicksave section with optional bullets and a warning callout.
#[must_use]
pub fn quicksave_entry(
    at: DateTime<Utc>,
    summary: &str,
    bullets: &[String],
    warnings: &[String],
) -> String {
    let mut out = format!("\n### Quicksave ({})\n{summary}\n", at.format("%H:%M:%S"));
    for bullet in bullets {
        let _ = writeln!(out, "- {bullet}");
    }
    if !warnings.is_empty() {
        out.push_str("\n> [!CAUTION]\n");
        for warning in warnings {
            let _ = writeln!(out, "> {warning}");
        }
    }
    out
}

/// Closing summary plus the machine-parsed checkpoint token.
#[must_use]
pub fn closing_block(session_id: &str, summary: &str, at: DateTime<Utc>) -> String {
    format!(
        "\n## Summary\n{summary}\n\n[[ S.{} | {} | STATUS: CLOSED ]]\n",
        short_id(session_id),
        timestamp(at)
    )
}

/// Heading introducing decision lines.
pub const DECISIONS_HEADING: &str = "\n### Decisions\n";

/// Heading introducing next-step lines.
pub const NEXT_STEPS_HEADING: &str = "\n### Next Steps\n";

/// `- <text> (ID: <id>)`
#[must_use]
pub fn decision_line(text: &str, id: &str) -> String {
    format!("- {text} (ID: {id})\n")
}

/// `- [ ] <text> (ID: <id>)`
#[must_use]
pub fn task_line(text: &str, id: &str) -> String {
    format!("- [ ] {text} (ID: {id})\n")
}

/// Harvest record; `pushed` is reported only for a committed harvest.
#[must_use]
pub fn harvest_line(pushed: bool) -> String {
    if pushed {
        "\n**Git Harvest**: Committed changes. Pushed to remote.\n".to_owned()
    } else {
        "\n**Git Harvest**: Committed changes.\n".to_owned()
    }
}

/// Final line of every closed log.
#[must_use]
pub fn closed_line(at: DateTime<Utc>) -> String {
    format!("\n**Session Closed**: {}\n", timestamp(at))
}

/// Canonical digest entry for a completed session.
#[must_use]
pub fn digest_entry(session_id: &str, date: NaiveDate, summary: &str) -> String {
    format!(
        "\n### Session {} ({})\n{summary}\n\n---\n",
        short_id(session_id),
        date.format("%Y-%m-%d")
    )
}
