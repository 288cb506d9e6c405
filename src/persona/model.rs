//! Respondent persona data models.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::SynthesisError;

/// Fields every synthesized profile must carry, in schema order.
pub const REQUIRED_FIELDS: [&str; 6] = [
    "name",
    "age",
    "profession",
    "pain_points",
    "communication_style",
    "traps",
];

pub const MIN_AGE: u32 = 18;
pub const MAX_AGE: u32 = 80;

/// Expected size range for `pain_points` and `traps`.
const LIST_MIN: usize = 2;
const LIST_MAX: usize = 5;
/// Minimum word count expected in `communication_style`.
const STYLE_MIN_WORDS: usize = 5;

/// Temperament of the synthesized respondent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RespondentTrait {
    Skeptic,
    Chatty,
}

impl RespondentTrait {
    pub const ALL: [RespondentTrait; 2] = [Self::Skeptic, Self::Chatty];

    /// Identifier stored with the persona.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skeptic => "skeptic",
            Self::Chatty => "chatty",
        }
    }

    /// Button payload selecting this trait.
    pub fn callback_data(self) -> &'static str {
        match self {
            Self::Skeptic => "trait_skeptic",
            Self::Chatty => "trait_chatty",
        }
    }

    pub fn from_callback_data(data: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.callback_data() == data)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Skeptic => "🤨 Skeptic",
            Self::Chatty => "💬 Chatty",
        }
    }

    /// Character description fed into the synthesis prompt.
    pub fn prompt_description(self) -> &'static str {
        match self {
            Self::Skeptic => {
                "skeptical: doubts new products, asks for proof, gives short guarded answers"
            }
            Self::Chatty => {
                "chatty: talks a lot, drifts into stories and side topics, hard to keep on track"
            }
        }
    }
}

impl std::fmt::Display for RespondentTrait {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RespondentTrait {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skeptic" => Ok(Self::Skeptic),
            "chatty" => Ok(Self::Chatty),
            other => Err(format!("unknown respondent trait '{other}'")),
        }
    }
}

/// A synthesized respondent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaProfile {
    pub name: String,
    #[serde(deserialize_with = "lenient_age")]
    pub age: u32,
    pub profession: String,
    #[serde(deserialize_with = "lenient_list")]
    pub pain_points: Vec<String>,
    pub communication_style: String,
    #[serde(deserialize_with = "lenient_list")]
    pub traps: Vec<String>,
}

/// Accepts `35`, `35.0` and `"35"`.
fn lenient_age<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    use serde::de::Error;

    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| D::Error::custom(format!("age is not a whole number: {value}")))
}

/// Accepts a list of strings or a single string.
fn lenient_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    match OneOrMany::deserialize(deserializer) {
        Ok(OneOrMany::One(s)) => Ok(vec![s]),
        Ok(OneOrMany::Many(v)) => Ok(v),
        Err(_) => Err(D::Error::custom("expected a string or a list of strings")),
    }
}

/// An out-of-expectation value. Logged, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileWarning {
    AgeOutOfRange(u32),
    PainPointCount(usize),
    TrapCount(usize),
    ShortCommunicationStyle(usize),
}

impl std::fmt::Display for ProfileWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AgeOutOfRange(age) => {
                write!(f, "age {age} outside {MIN_AGE}-{MAX_AGE}")
            }
            Self::PainPointCount(n) => {
                write!(f, "{n} pain points, expected {LIST_MIN}-{LIST_MAX}")
            }
            Self::TrapCount(n) => write!(f, "{n} traps, expected {LIST_MIN}-{LIST_MAX}"),
            Self::ShortCommunicationStyle(words) => write!(
                f,
                "communication style has {words} words, expected at least {STYLE_MIN_WORDS}"
            ),
        }
    }
}

impl PersonaProfile {
    /// Build a profile from a parsed JSON object.
    ///
    /// Absent (or null) required fields are reported together, in schema
    /// order. A field of the wrong type is malformed output.
    pub fn from_json_map(map: Map<String, Value>) -> Result<Self, SynthesisError> {
        let missing: Vec<String> = REQUIRED_FIELDS
            .iter()
            .filter(|field| map.get(**field).is_none_or(Value::is_null))
            .map(|field| field.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(SynthesisError::IncompleteProfile(missing));
        }

        let value = Value::Object(map);
        serde_json::from_value(value.clone()).map_err(|e| SynthesisError::MalformedOutput {
            raw: value.to_string(),
            reason: e.to_string(),
        })
    }

    /// Soft validation against the expected ranges.
    pub fn warnings(&self) -> Vec<ProfileWarning> {
        let mut warnings = Vec::new();
        if !(MIN_AGE..=MAX_AGE).contains(&self.age) {
            warnings.push(ProfileWarning::AgeOutOfRange(self.age));
        }
        if !(LIST_MIN..=LIST_MAX).contains(&self.pain_points.len()) {
            warnings.push(ProfileWarning::PainPointCount(self.pain_points.len()));
        }
        if !(LIST_MIN..=LIST_MAX).contains(&self.traps.len()) {
            warnings.push(ProfileWarning::TrapCount(self.traps.len()));
        }
        let words = self.communication_style.split_whitespace().count();
        if words < STYLE_MIN_WORDS {
            warnings.push(ProfileWarning::ShortCommunicationStyle(words));
        }
        warnings
    }

    /// Chat message announcing a freshly created respondent.
    pub fn summary_message(&self) -> String {
        let bullets = |items: &[String]| {
            items
                .iter()
                .map(|item| format!("• {item}"))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            "✅ Respondent created!\n\n\
             👤 {name}\n\
             📊 Age: {age}\n\
             💼 Profession: {profession}\n\n\
             🎭 Communication style:\n{style}\n\n\
             ❗️ Key pain points:\n{pains}\n\n\
             ⚠️ Possible conversation traps:\n{traps}\n\n\
             You can start the interview now. Type your question:",
            name = self.name,
            age = self.age,
            profession = self.profession,
            style = self.communication_style,
            pains = bullets(&self.pain_points),
            traps = bullets(&self.traps),
        )
    }

    /// Render the profile as a prompt section for in-character answering.
    pub fn to_prompt_section(&self) -> String {
        let list = |items: &[String]| {
            items
                .iter()
                .map(|item| format!("- {item}"))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            "Name: {}\nAge: {}\nProfession: {}\nCommunication style: {}\n\n\
             Your pain points:\n{}\n\n\
             Your patterns for dodging direct answers:\n{}",
            self.name,
            self.age,
            self.profession,
            self.communication_style,
            list(&self.pain_points),
            list(&self.traps),
        )
    }
}
