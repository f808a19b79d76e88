use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(MaterialId);
id_newtype!(CourseId);

/// Rounds a byte count to whole kilobytes (1 KB = 1000 bytes) for display.
pub fn kilobytes(bytes: u64) -> u64 {
    bytes / 1000 + u64::from(bytes % 1000 >= 500)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub id: MaterialId,
    pub title: String,
    pub content_length: u64,
    pub created_at: NaiveDateTime,
}

impl Material {
    pub fn size_kb(&self) -> u64 {
        kilobytes(self.content_length)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestQuestion {
    pub question: String,
    pub options: Vec<String>,
}

impl TestQuestion {
    /// Option label as shown to the student: `A`, `B`, ... then `[26]`, `[27]` past `Z`.
    pub fn option_label(index: usize) -> String {
        match u8::try_from(index) {
            Ok(i) if i < 26 => char::from(b'A' + i).to_string(),
            _ => format!("[{index}]"),
        }
    }

    /// Parses a label (`b`, `B`) or a zero-based index (`1`) back to an option index.
    pub fn parse_option(&self, raw: &str) -> Option<usize> {
        let raw = raw.trim();
        let index = if let Ok(index) = raw.parse::<usize>() {
            index
        } else {
            let mut chars = raw.chars();
            let c = chars.next()?.to_ascii_uppercase();
            if chars.next().is_some() || !c.is_ascii_uppercase() {
                return None;
            }
            usize::from(c as u8 - b'A')
        };
        (index < self.options.len()).then_some(index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub question_index: usize,
    pub answer: usize,
    pub is_correct: bool,
    pub feedback: String,
}

/// Dashboard counters. A field the backend omits decodes as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsSnapshot {
    pub total_materials: u64,
    pub chat_history_count: u64,
    pub tests_count: u64,
    pub total_content_length: u64,
}

impl AnalyticsSnapshot {
    pub fn content_kb(&self) -> u64 {
        kilobytes(self.total_content_length)
    }
}
