//! Crisis-resource directory and the fixed crisis message rendered from it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const FALLBACK_LOCALE: &str = "en-US";

const CRISIS_OPENING: &str = "I'm really concerned about what you're sharing, and I'm glad you reached out. \
You don't have to face this alone. Please contact one of these resources right now:";

const CRISIS_CLOSING: &str = "Professional help is available 24/7.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrisisResource {
    pub name: String,
    pub contact: String,
}

impl CrisisResource {
    pub fn new(name: &str, contact: &str) -> Self {
        Self {
            name: name.to_string(),
            contact: contact.to_string(),
        }
    }
}

/// Locale → ordered resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrisisDirectory {
    entries: BTreeMap<String, Vec<CrisisResource>>,
}

impl Default for CrisisDirectory {
    fn default() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            FALLBACK_LOCALE.to_string(),
            vec![
                CrisisResource::new("Emergency services", "Call 911 or your local emergency number"),
                CrisisResource::new(
                    "988 Suicide & Crisis Lifeline",
                    "Call or text 988 (or 1-800-273-8255)",
                ),
                CrisisResource::new("Crisis Text Line", "Text HOME to 741741"),
                CrisisResource::new(
                    "International Association for Suicide Prevention",
                    "https://www.iasp.info/resources/Crisis_Centres/",
                ),
            ],
        );
        entries.insert(
            "en-GB".to_string(),
            vec![
                CrisisResource::new("Emergency services", "Call 999 or 112"),
                CrisisResource::new("Samaritans", "Call 116 123"),
                CrisisResource::new("Shout", "Text SHOUT to 85258"),
            ],
        );
        Self { entries }
    }
}

impl CrisisDirectory {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn with_locale(mut self, locale: &str, resources: Vec<CrisisResource>) -> Self {
        self.entries.insert(locale.to_string(), resources);
        self
    }

    /// Resources for `locale`, else en-US, else nothing.
    pub fn resources_for(&self, locale: &str) -> &[CrisisResource] {
        self.entries
            .get(locale)
            .filter(|r| !r.is_empty())
            .or_else(|| self.entries.get(FALLBACK_LOCALE))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Fixed crisis response. Same locale, same bytes.
    pub fn render(&self, locale: &str) -> String {
        let mut out = String::from(CRISIS_OPENING);
        out.push('\n');
        for r in self.resources_for(locale) {
            out.push_str(&format!("\n- {}: {}", r.name, r.contact));
        }
        out.push_str("\n\n");
        out.push_str(CRISIS_CLOSING);
        out
    }
}
