use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use time::macros::format_description;
use time::OffsetDateTime;

use crate::error::{Result, ValetBotError};
use crate::interfaces::providers::{KnowledgeProvider, LookupOutcome};
use crate::memory::{MemoryDocument, MemoryStore, Reminder};
use crate::reminders;
use crate::services::routing::{self, Intent, Site, SystemCommand};

// Payload extraction happens on the trimmed raw text with (?i) so echoes
// keep the caller's casing; rule matching uses the lowercased text.
static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bmy name is\s+(.+)$").unwrap());
static FACT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bremember\s+(.+)$").unwrap());
static PLAY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bplay\b\s*(.*)$").unwrap());
static WIKI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)wikipedia").unwrap());

/// Client-side effect requested by a reply. The tag is echoed back to the
/// caller and has no server-side behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTag {
    OpenUrl,
    PlayMedia,
    Screenshot,
    SystemControl,
    WebSearch,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandReply {
    pub response_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl CommandReply {
    fn text(response_text: impl Into<String>) -> Self {
        Self {
            response_text: response_text.into(),
            action: None,
            params: None,
        }
    }

    fn with_action(response_text: impl Into<String>, action: ActionTag, params: Value) -> Self {
        Self {
            response_text: response_text.into(),
            action: Some(action),
            params: Some(params),
        }
    }
}

/// The command interpreter. Stateless between calls: everything it knows
/// lives in the caller's memory document, and every call is one
/// read-modify-write-persist cycle under that user's lock.
pub struct QueryService {
    memory: Arc<MemoryStore>,
    knowledge: Arc<dyn KnowledgeProvider>,
}

impl QueryService {
    pub fn new(memory: Arc<MemoryStore>, knowledge: Arc<dyn KnowledgeProvider>) -> Self {
        Self { memory, knowledge }
    }

    pub async fn interpret(&self, username: &str, raw_text: &str) -> Result<CommandReply> {
        let trimmed = raw_text.trim();
        let normalized = trimmed.to_lowercase();

        let _guard = self.memory.lock_user(username).await;
        let mut doc = self.memory.load(username).await?;
        doc.record_query(&normalized, now_ts());

        let reply = match routing::classify(&normalized) {
            Intent::CreateReminder => reminder_reply(&mut doc, trimmed),
            Intent::CaptureName => capture_name_reply(&mut doc, trimmed),
            Intent::RecallName => recall_name_reply(&doc),
            Intent::StoreFact => store_fact_reply(&mut doc, trimmed),
            Intent::RecallFacts => recall_facts_reply(&doc),
            Intent::OpenSite(site) => open_site_reply(site),
            Intent::Lookup => self.lookup_reply(trimmed).await,
            Intent::Play => play_reply(trimmed),
            Intent::Screenshot => CommandReply::with_action(
                "Taking a screenshot.",
                ActionTag::Screenshot,
                json!({}),
            ),
            Intent::SystemControl(command) => system_control_reply(command),
            Intent::TellTime => time_reply()?,
            Intent::WebSearch => CommandReply::with_action(
                "I'm not sure about that yet, let me search the web for it.",
                ActionTag::WebSearch,
                json!({ "query": trimmed }),
            ),
        };

        self.memory.save(username, &doc).await?;
        Ok(reply)
    }

    /// Pull-based reminder delivery: reports reminders that have become due
    /// since the last poll and marks them notified. There is no push path.
    pub async fn due_reminders(&self, username: &str) -> Result<Vec<Reminder>> {
        let _guard = self.memory.lock_user(username).await;
        let mut doc = self.memory.load(username).await?;
        let due = reminders::poll_due(&mut doc, now_ts());
        if !due.is_empty() {
            self.memory.save(username, &doc).await?;
        }
        Ok(due)
    }

    async fn lookup_reply(&self, raw: &str) -> CommandReply {
        let topic = WIKI_RE.replace_all(raw, "").trim().to_string();
        if topic.is_empty() {
            return CommandReply::text("What topic should I look up?");
        }
        match self.knowledge.summarize(&topic).await {
            Ok(LookupOutcome::Summary(summary)) => {
                CommandReply::text(format!("According to Wikipedia, {summary}"))
            }
            Ok(LookupOutcome::Ambiguous) => {
                CommandReply::text("There are multiple results. Please be more specific.")
            }
            Ok(LookupOutcome::NotFound) => {
                CommandReply::text("I could not find any results for that topic.")
            }
            Err(err) => {
                tracing::warn!(error = %err, "knowledge lookup failed");
                CommandReply::text("I could not find any results for that topic.")
            }
        }
    }
}

fn reminder_reply(doc: &mut MemoryDocument, raw: &str) -> CommandReply {
    match reminders::parse(raw) {
        Some(request) => {
            let reminder = reminders::create(doc, &request, now_ts());
            CommandReply::text(format!(
                "Reminder set: {} in {} {}.",
                reminder.text, request.amount, request.unit_label
            ))
        }
        None => CommandReply::text(
            "I couldn't work out when to remind you. \
             Try something like \"remind me to call mom in 10 minutes\".",
        ),
    }
}

fn capture_name_reply(doc: &mut MemoryDocument, raw: &str) -> CommandReply {
    let name = NAME_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty());
    match name {
        Some(name) => {
            let reply = format!("Nice to meet you, {name}. I will remember your name.");
            doc.name = Some(name);
            CommandReply::text(reply)
        }
        None => CommandReply::text("What should I call you?"),
    }
}

fn recall_name_reply(doc: &MemoryDocument) -> CommandReply {
    match &doc.name {
        Some(name) => CommandReply::text(format!("Your name is {name}.")),
        None => CommandReply::text("I don't know your name yet."),
    }
}

fn store_fact_reply(doc: &mut MemoryDocument, raw: &str) -> CommandReply {
    let fact = FACT_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|fact| !fact.is_empty());
    match fact {
        Some(fact) => {
            let key = doc.remember_fact(&fact);
            CommandReply::text(format!("Got it, I will remember \"{fact}\" as {key}."))
        }
        None => CommandReply::text("What should I remember?"),
    }
}

fn recall_facts_reply(doc: &MemoryDocument) -> CommandReply {
    match doc.recall_facts() {
        Some(joined) => CommandReply::text(format!("Here's what you've told me: {joined}.")),
        None => CommandReply::text("You haven't told me anything to remember yet."),
    }
}

fn open_site_reply(site: &Site) -> CommandReply {
    CommandReply::with_action(
        format!("Opening {}.", site.label),
        ActionTag::OpenUrl,
        json!({ "url": site.url }),
    )
}

fn play_reply(raw: &str) -> CommandReply {
    let song = PLAY_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|song| !song.is_empty());
    match song {
        Some(song) => CommandReply::with_action(
            format!("Playing {song} on YouTube."),
            ActionTag::PlayMedia,
            json!({ "query": song }),
        ),
        None => CommandReply::text("What should I play?"),
    }
}

fn system_control_reply(command: SystemCommand) -> CommandReply {
    let text = match command {
        SystemCommand::Shutdown => "Shutting down the system.",
        SystemCommand::Restart => "Restarting the system.",
        SystemCommand::Lock => "Locking the system.",
    };
    CommandReply::with_action(
        text,
        ActionTag::SystemControl,
        json!({ "command": command.as_str() }),
    )
}

fn time_reply() -> Result<CommandReply> {
    let clock_format = format_description!("[hour repr:12 padding:none]:[minute] [period]");
    let now = local_now();
    let clock = now
        .format(&clock_format)
        .map_err(|e| ValetBotError::Runtime(e.to_string()))?;
    Ok(CommandReply::text(format!("The current time is {clock}.")))
}

pub fn greeting_for_hour(hour: u8, bot_name: &str) -> String {
    let part = if hour < 12 {
        "Good Morning!"
    } else if hour < 18 {
        "Good Afternoon!"
    } else {
        "Good Evening!"
    };
    format!("{part} {bot_name} at your service. How can I help you?")
}

pub fn wish(bot_name: &str) -> String {
    greeting_for_hour(local_now().hour(), bot_name)
}

fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
