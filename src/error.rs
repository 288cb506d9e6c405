//! Error types for Custos.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("No channel registered under {0}")]
    UnknownChannel(String),
}

/// Coarse classification of an LLM exchange failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    Transport,
    Http,
    MalformedEnvelope,
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Transport => "transport_error",
            Self::Http => "http_error",
            Self::MalformedEnvelope => "malformed_envelope",
        };
        write!(f, "{s}")
    }
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} unreachable: {reason}")]
    Transport { provider: String, reason: String },

    #[error("Provider {provider} returned HTTP {status}: {body}")]
    Http {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Malformed response envelope from {provider}: {reason}")]
    MalformedEnvelope { provider: String, reason: String },
}

impl LlmError {
    pub fn kind(&self) -> LlmErrorKind {
        match self {
            Self::Transport { .. } => LlmErrorKind::Transport,
            Self::Http { .. } => LlmErrorKind::Http,
            Self::MalformedEnvelope { .. } => LlmErrorKind::MalformedEnvelope,
        }
    }

    /// Whether repeating the same request could plausibly succeed.
    ///
    /// Connection failures, timeouts, rate limits and 5xx responses are
    /// transient. A well-formed reply without usable text is not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::MalformedEnvelope { .. } => false,
        }
    }
}

/// Failures of persona synthesis.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("LLM request failed: {0}")]
    UpstreamFailure(#[from] LlmError),

    /// Text came back but no usable profile could be recovered from it.
    /// `raw` keeps the model output for logs; it is never shown to users.
    #[error("Model output is not a valid profile: {reason}")]
    MalformedOutput { raw: String, reason: String },

    #[error("Profile is missing required fields: {}", .0.join(", "))]
    IncompleteProfile(Vec<String>),
}

impl SynthesisError {
    /// Plain-language message safe to display in the chat.
    pub fn user_message(&self) -> String {
        match self {
            Self::UpstreamFailure(_) => {
                "❌ The language model is not responding right now. Please try again in a moment."
                    .to_string()
            }
            Self::MalformedOutput { .. } => {
                "❌ The model returned an unreadable profile. Please try creating the respondent again."
                    .to_string()
            }
            Self::IncompleteProfile(missing) => format!(
                "❌ The generated profile was incomplete (missing: {}). Please try again.",
                missing.join(", ")
            ),
        }
    }
}

/// Failures of interview answering.
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    #[error("LLM request failed: {0}")]
    UpstreamFailure(#[from] LlmError),
}

/// Rejected user input. Recovered by re-prompting in the same state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("'{0}' is not a whole number")]
    NotANumber(String),

    #[error("Age {age} is outside {min}..={max}")]
    AgeOutOfRange { age: i64, min: u32, max: u32 },

    #[error("Input is empty")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> LlmError {
        LlmError::Http {
            provider: "openrouter".into(),
            status,
            body: String::new(),
        }
    }

    #[test]
    fn transient_classification() {
        assert!(
            LlmError::Transport {
                provider: "openrouter".into(),
                reason: "timed out".into()
            }
            .is_transient()
        );
        assert!(http(429).is_transient());
        assert!(http(502).is_transient());
        assert!(!http(401).is_transient());
        assert!(!http(400).is_transient());
        assert!(
            !LlmError::MalformedEnvelope {
                provider: "openrouter".into(),
                reason: "no choices".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn kind_display_names() {
        assert_eq!(http(500).kind().to_string(), "http_error");
        assert_eq!(LlmErrorKind::Transport.to_string(), "transport_error");
        assert_eq!(
            LlmErrorKind::MalformedEnvelope.to_string(),
            "malformed_envelope"
        );
    }

    #[test]
    fn user_message_never_contains_raw_output() {
        let err = SynthesisError::MalformedOutput {
            raw: "SECRET RAW MODEL TEXT".into(),
            reason: "expected value".into(),
        };
        assert!(!err.user_message().contains("SECRET"));
        assert!(!err.to_string().contains("SECRET"));
    }

    #[test]
    fn incomplete_profile_lists_fields() {
        let err = SynthesisError::IncompleteProfile(vec!["traps".into(), "age".into()]);
        assert_eq!(
            err.to_string(),
            "Profile is missing required fields: traps, age"
        );
        assert!(err.user_message().contains("traps, age"));
    }
}
