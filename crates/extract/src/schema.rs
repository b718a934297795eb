use serde::{Deserialize, Serialize};
use std::fmt;

/// Lettered options offered for the instrument question.
pub const INSTRUMENT_LABELS: [(char, &str); 7] = [
    ('A', "Stapler"),
    ('B', "Monopolar Curved Scissors"),
    ('C', "Needle Driver"),
    ('D', "Forceps"),
    ('E', "Permanent Cautery Hook"),
    ('F', "Clip Applier"),
    ('G', "Grasper"),
];

/// Lettered options offered for the action question.
pub const ACTION_LABELS: [(char, &str); 7] = [
    ('A', "Retraction"),
    ('B', "Suturing"),
    ('C', "Cauterization"),
    ('D', "Grasping"),
    ('E', "Cutting"),
    ('F', "Tool Manipulation"),
    ('G', "Applying Clip"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Instrument,
    Action,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Instrument => "instrument",
            EntityKind::Action => "action",
        }
    }

    pub fn labels(&self) -> &'static [(char, &'static str)] {
        match self {
            EntityKind::Instrument => &INSTRUMENT_LABELS,
            EntityKind::Action => &ACTION_LABELS,
        }
    }

    /// Name for an option letter, case-insensitive.
    pub fn label_for(&self, letter: char) -> Option<&'static str> {
        let letter = letter.to_ascii_uppercase();
        self.labels()
            .iter()
            .find(|(l, _)| *l == letter)
            .map(|(_, name)| *name)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instrument or action name recovered from a free-form agent answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ParsedEntity {
    Known(String),
    Unknown,
}

impl ParsedEntity {
    pub const UNKNOWN: &'static str = "unknown";

    /// Interpret a completion reply. Empty replies and "unknown" map to `Unknown`.
    pub fn from_reply(reply: &str) -> Self {
        let trimmed = reply.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(Self::UNKNOWN) {
            ParsedEntity::Unknown
        } else {
            ParsedEntity::Known(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ParsedEntity::Known(name) => name,
            ParsedEntity::Unknown => Self::UNKNOWN,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, ParsedEntity::Known(_))
    }
}

impl From<String> for ParsedEntity {
    fn from(value: String) -> Self {
        ParsedEntity::from_reply(&value)
    }
}

impl From<ParsedEntity> for String {
    fn from(value: ParsedEntity) -> Self {
        match value {
            ParsedEntity::Known(name) => name,
            ParsedEntity::Unknown => ParsedEntity::UNKNOWN.to_string(),
        }
    }
}

impl fmt::Display for ParsedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
