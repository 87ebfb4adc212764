//! Reminder message rendering
//!
//! Bodies are rendered from current entity data at delivery time, so
//! edits made after scheduling show up in the delivered content.

use chrono::{DateTime, Utc};

use crate::constants::REFERENCE_ZONE;

/// A rendered reminder ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReminder {
    pub subject: String,
    pub html: String,
}

fn format_deadline(deadline: Option<DateTime<Utc>>) -> String {
    deadline.map_or_else(
        || "no deadline".to_string(),
        |d| {
            d.with_timezone(&REFERENCE_ZONE)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        },
    )
}

fn offset_phrase(offset_days: i64) -> String {
    match offset_days {
        0 => "today".to_string(),
        1 => "in 1 day".to_string(),
        n => format!("in {n} days"),
    }
}

/// Renders a reminder for a deadline-bound entity.
#[must_use]
pub fn render_reminder(
    kind_label: &str,
    recipient_name: &str,
    title: &str,
    description: Option<&str>,
    deadline: Option<DateTime<Utc>>,
    offset_days: i64,
) -> RenderedReminder {
    let due = offset_phrase(offset_days);
    let deadline_text = format_deadline(deadline);

    let subject = format!("Reminder: \"{title}\" is due {due}");

    let description_html = description
        .filter(|d| !d.is_empty())
        .map(|d| format!("<p>{d}</p>"))
        .unwrap_or_default();

    let html = format!(
        "<p>Hi {recipient_name},</p>\
         <p>The {kind_label} <strong>{title}</strong> is due {due}, on {deadline_text}.</p>\
         {description_html}\
         <p>This is an automated reminder.</p>"
    );

    RenderedReminder { subject, html }
}
