use once_cell::sync::Lazy;
use regex::Regex;

static PLAY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bplay\b").unwrap());

/// A site the client can be told to open. The action tag carries the URL;
/// nothing is fetched server-side.
#[derive(Debug, PartialEq, Eq)]
pub struct Site {
    pub phrase: &'static str,
    pub label: &'static str,
    pub url: &'static str,
}

pub static SITES: &[Site] = &[
    Site {
        phrase: "open youtube",
        label: "YouTube",
        url: "https://youtube.com",
    },
    Site {
        phrase: "open google",
        label: "Google",
        url: "https://google.com",
    },
    Site {
        phrase: "open helper",
        label: "Blackbox",
        url: "https://blackbox.ai",
    },
    Site {
        phrase: "open amazon",
        label: "Amazon",
        url: "https://amazon.com",
    },
    Site {
        phrase: "open flipkart",
        label: "Flipkart",
        url: "https://flipkart.com",
    },
    Site {
        phrase: "open compiler",
        label: "Programiz",
        url: "https://programiz.com",
    },
    Site {
        phrase: "open spotify",
        label: "Spotify",
        url: "https://spotify.com",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemCommand {
    Shutdown,
    Restart,
    Lock,
}

impl SystemCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemCommand::Shutdown => "shutdown",
            SystemCommand::Restart => "restart",
            SystemCommand::Lock => "lock",
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum Intent {
    CreateReminder,
    CaptureName,
    RecallName,
    StoreFact,
    RecallFacts,
    OpenSite(&'static Site),
    Lookup,
    Play,
    Screenshot,
    SystemControl(SystemCommand),
    TellTime,
    WebSearch,
}

type RuleFn = fn(&str) -> Option<Intent>;

/// Ordered dispatch table over the normalized (lowercased, trimmed)
/// utterance. The first matching rule wins and no later rule is consulted.
/// Order is load-bearing: "remind me to stretch in 10 minutes" must reach
/// the reminder rule even though the generic time rule would also match a
/// phrase mentioning time.
static RULES: &[(&str, RuleFn)] = &[
    ("create_reminder", |query| {
        query.contains("remind me").then_some(Intent::CreateReminder)
    }),
    ("capture_name", |query| {
        query.contains("my name is").then_some(Intent::CaptureName)
    }),
    ("recall_name", |query| {
        (query.contains("what is my name") || query.contains("what's my name"))
            .then_some(Intent::RecallName)
    }),
    ("store_fact", |query| {
        query.contains("remember").then_some(Intent::StoreFact)
    }),
    ("recall_facts", |query| {
        (query.contains("what do i like") || query.contains("what did i tell you"))
            .then_some(Intent::RecallFacts)
    }),
    ("open_site", |query| {
        SITES
            .iter()
            .find(|site| query.contains(site.phrase))
            .map(Intent::OpenSite)
    }),
    ("lookup", |query| {
        query.contains("wikipedia").then_some(Intent::Lookup)
    }),
    ("play", |query| {
        PLAY_RE.is_match(query).then_some(Intent::Play)
    }),
    ("screenshot", |query| {
        query.contains("screenshot").then_some(Intent::Screenshot)
    }),
    ("system_control", |query| {
        if query.contains("shutdown") {
            Some(Intent::SystemControl(SystemCommand::Shutdown))
        } else if query.contains("restart") {
            Some(Intent::SystemControl(SystemCommand::Restart))
        } else if query.contains("lock") {
            Some(Intent::SystemControl(SystemCommand::Lock))
        } else {
            None
        }
    }),
    ("tell_time", |query| {
        query.contains("time").then_some(Intent::TellTime)
    }),
];

pub fn classify(normalized: &str) -> Intent {
    for (_name, rule) in RULES {
        if let Some(intent) = rule(normalized) {
            return intent;
        }
    }
    Intent::WebSearch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reminder_wins_over_time() {
        assert_eq!(
            classify("remind me to check the time in 5 minutes"),
            Intent::CreateReminder
        );
        assert_eq!(classify("what time is it"), Intent::TellTime);
    }

    #[test]
    fn name_rules() {
        assert_eq!(classify("my name is alice"), Intent::CaptureName);
        assert_eq!(classify("what is my name"), Intent::RecallName);
        assert_eq!(classify("what's my name"), Intent::RecallName);
    }

    #[test]
    fn fact_rules() {
        assert_eq!(classify("remember i like tea"), Intent::StoreFact);
        assert_eq!(classify("what do i like"), Intent::RecallFacts);
        assert_eq!(classify("what did i tell you"), Intent::RecallFacts);
    }

    #[test]
    fn site_rules_pick_the_right_site() {
        match classify("open youtube for me") {
            Intent::OpenSite(site) => assert_eq!(site.label, "YouTube"),
            other => panic!("unexpected intent: {other:?}"),
        }
        match classify("please open spotify") {
            Intent::OpenSite(site) => assert_eq!(site.label, "Spotify"),
            other => panic!("unexpected intent: {other:?}"),
        }
    }

    #[test]
    fn lookup_play_and_client_actions() {
        assert_eq!(classify("wikipedia alan turing"), Intent::Lookup);
        assert_eq!(classify("play some jazz"), Intent::Play);
        assert_eq!(classify("take a screenshot"), Intent::Screenshot);
        assert_eq!(
            classify("shutdown the machine"),
            Intent::SystemControl(SystemCommand::Shutdown)
        );
        assert_eq!(
            classify("restart please"),
            Intent::SystemControl(SystemCommand::Restart)
        );
        assert_eq!(
            classify("lock the screen"),
            Intent::SystemControl(SystemCommand::Lock)
        );
    }

    #[test]
    fn play_needs_a_word_boundary() {
        assert_eq!(classify("i want a display upgrade"), Intent::WebSearch);
    }

    #[test]
    fn unmatched_text_falls_back_to_search() {
        assert_eq!(classify("how tall is the eiffel tower"), Intent::WebSearch);
    }
}
