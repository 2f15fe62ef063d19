//! Deterministic pattern-based entity extraction
//!
//! Regex and vocabulary rules per field, tried in a fixed priority order;
//! the first match wins and fields are independent of each other.

use super::EntityMap;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        // on January 1st
        r"(?i)(?:on|for|at|by)\s+([A-Za-z]+\s+\d{1,2}(?:st|nd|rd|th)?)\b",
        // on 1st January
        r"(?i)(?:on|for|at|by)\s+(\d{1,2}(?:st|nd|rd|th)?\s+[A-Za-z]+)\b",
        // MM/DD/YYYY or DD/MM/YYYY
        r"\b(\d{1,2}/\d{1,2}/\d{2,4})\b",
        // MM-DD-YYYY or DD-MM-YYYY
        r"\b(\d{1,2}-\d{1,2}-\d{2,4})\b",
    ])
});

static TIME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        // 3:30 PM
        r"\b(\d{1,2}:\d{2}\s*(?:AM|PM|am|pm)?)\b",
        // 3 PM
        r"\b(\d{1,2}\s*(?:AM|PM|am|pm))\b",
        // from 3 PM to 5 PM
        r"(?i)(from\s+\d{1,2}(?::\d{2})?\s*(?:AM|PM)?\s*to\s+\d{1,2}(?::\d{2})?\s*(?:AM|PM)?)",
        // 3 PM - 5 PM
        r"(?i)(\d{1,2}(?::\d{2})?\s*(?:AM|PM)?\s*[-–—]\s*\d{1,2}(?::\d{2})?\s*(?:AM|PM)?)",
    ])
});

static LOCATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)(?:at|in|location:?)\s+([A-Za-z\s]+(?:Center|Hall|Room|Building|Park|Plaza|Hotel|House|Garden|Theater|Theatre|Stadium|Arena))",
        // at the Place
        r"(?i)((?:in|at)\s+the\s+[A-Za-z\s]+)",
        // venue: Place Name
        r"(?i)(?:venue|location|place)[:\s]+([A-Za-z0-9\s]+)",
    ])
});

static MONEY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        // budget: $1000
        r"(?i)(?:budget|cost|price)[:\s]+(\$\d+(?:,\d+)?(?:\.\d+)?)",
        // budget: 1000 dollars
        r"(?i)(?:budget|cost|price)[:\s]+(\d+(?:,\d+)?(?:\.\d+)?\s*(?:dollars|USD))",
    ])
});

static ATTENDEE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)(?:for|with)\s+(\d+)\s+(?:people|attendees|guests|participants)",
        r"(?i)(?:people|attendees|guests|participants)[:\s]+(\d+)",
    ])
});

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,})\b").expect("Invalid email regex")
});

static PHONE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\+?1?\s*\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4})\b")
        .expect("Invalid phone regex")
});

const EVENT_TYPES: [&str; 17] = [
    "birthday",
    "wedding",
    "conference",
    "meeting",
    "party",
    "celebration",
    "ceremony",
    "reception",
    "dinner",
    "lunch",
    "breakfast",
    "brunch",
    "festival",
    "concert",
    "seminar",
    "workshop",
    "gala",
];

const THEMES: [&str; 12] = [
    "star wars",
    "halloween",
    "christmas",
    "superhero",
    "disney",
    "harry potter",
    "beach",
    "garden",
    "formal",
    "casual",
    "black tie",
    "masquerade",
];

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("Invalid entity regex"))
        .collect()
}

fn first_match(patterns: &[Regex], text: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|p| p.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Rule-based extraction strategy; no external service involved
#[derive(Default)]
pub struct PatternStrategy;

impl PatternStrategy {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, text: &str) -> EntityMap {
        let mut entities = EntityMap::new();
        let lowered = text.to_lowercase();

        if let Some(date) = first_match(&DATE_PATTERNS, text) {
            entities.insert("date".to_string(), Value::String(date));
        }

        if let Some(time) = first_match(&TIME_PATTERNS, text) {
            entities.insert("time".to_string(), Value::String(time));
        }

        if let Some(location) = first_match(&LOCATION_PATTERNS, text) {
            entities.insert("location".to_string(), Value::String(location));
        }

        // The word "budget" anywhere in the text selects the budget key
        if let Some(amount) = first_match(&MONEY_PATTERNS, text) {
            let key = if lowered.contains("budget") {
                "budget"
            } else {
                "cost"
            };
            entities.insert(key.to_string(), Value::String(amount));
        }

        if let Some(caps) = EMAIL_PATTERN.captures(text) {
            entities.insert(
                "email".to_string(),
                Value::String(caps[1].to_string()),
            );
        }

        if let Some(caps) = PHONE_PATTERN.captures(text) {
            entities.insert(
                "phone".to_string(),
                Value::String(caps[1].to_string()),
            );
        }

        if let Some(event_type) = EVENT_TYPES.iter().find(|t| lowered.contains(*t)) {
            entities.insert(
                "event_type".to_string(),
                Value::String((*event_type).to_string()),
            );
        }

        if let Some(theme) = THEMES.iter().find(|t| lowered.contains(*t)) {
            entities.insert("theme".to_string(), Value::String((*theme).to_string()));
        }

        if let Some(attendees) = first_match(&ATTENDEE_PATTERNS, text) {
            entities.insert("attendees".to_string(), Value::String(attendees));
        }

        entities
    }
}
