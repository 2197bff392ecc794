use once_cell::sync::Lazy;
use regex::Regex;

use crate::memory::{MemoryDocument, Reminder};

static REMIND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bremind me to\s+(.+?)\s+in\s+(\d+)\s*(minutes?|mins?|hours?|hrs?)\b")
        .unwrap()
});

/// A parsed reminder phrase, before it is attached to a document.
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderRequest {
    pub text: String,
    pub amount: i64,
    pub unit_label: String,
    pub delay_seconds: i64,
}

/// Recognizes `"remind me to <text> in <N> <minutes|hours>"`. The unit token
/// is matched by prefix, case-insensitive. Anything else (including a zero
/// offset) is not a reminder; the interpreter asks for clarification.
pub fn parse(text: &str) -> Option<ReminderRequest> {
    let caps = REMIND_RE.captures(text)?;
    let reminder_text = caps.get(1)?.as_str().trim().to_string();
    let amount: i64 = caps.get(2)?.as_str().parse().ok()?;
    let unit_label = caps.get(3)?.as_str().to_string();
    let multiplier = if unit_label.to_lowercase().starts_with('h') {
        3600
    } else {
        60
    };
    if amount <= 0 || reminder_text.is_empty() {
        return None;
    }
    Some(ReminderRequest {
        text: reminder_text,
        amount,
        delay_seconds: amount.saturating_mul(multiplier),
        unit_label,
    })
}

/// Appends the reminder to the document with `due_time = now + offset`.
pub fn create(document: &mut MemoryDocument, request: &ReminderRequest, now: i64) -> Reminder {
    let reminder = Reminder {
        text: request.text.clone(),
        due_time: now.saturating_add(request.delay_seconds),
        notified: false,
    };
    document.reminders.push(reminder.clone());
    reminder
}

/// Flips every unnotified reminder whose time has passed and returns the
/// flipped set. The flip is one-shot: a reminder appears in the due list at
/// most once, ever. Callers only need to persist when the result is
/// non-empty.
pub fn poll_due(document: &mut MemoryDocument, now: i64) -> Vec<Reminder> {
    let mut due = Vec::new();
    for reminder in document.reminders.iter_mut() {
        if !reminder.notified && reminder.due_time <= now {
            reminder.notified = true;
            due.push(reminder.clone());
        }
    }
    due
}
