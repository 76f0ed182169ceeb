use sqlogic::Name;
use strum::EnumIs;
use thiserror::Error;

#[derive(Debug, Error, EnumIs)]
pub enum ProofError {
    #[error(transparent)]
    Logic(#[from] sqlogic::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed rule file, settings file or proof script.
    #[error("{file}: {item}: {message}")]
    ProofInput {
        file: String,
        item: String,
        message: String,
    },

    #[error("Failed to parse settings file '{file}': {source}")]
    SettingsParse {
        source: toml::de::Error,
        file: String,
    },

    #[error("Failed to serialize '{what}': {source}")]
    Serialize {
        source: toml::ser::Error,
        what: String,
    },

    /// A rule application that cannot be carried out on its goal.
    #[error("Illegal application of '{rule}': {message}")]
    IllegalApplication { rule: Name, message: String },

    /// An internal consistency check failed; the proof must not continue.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Unknown strategy '{0}'")]
    UnknownStrategy(String),
}

impl ProofError {
    pub fn input(file: impl Into<String>, item: impl Into<String>, message: impl ToString) -> Self {
        ProofError::ProofInput {
            file: file.into(),
            item: item.into(),
            message: message.to_string(),
        }
    }

    pub fn illegal(rule: &Name, message: impl ToString) -> Self {
        ProofError::IllegalApplication {
            rule: rule.clone(),
            message: message.to_string(),
        }
    }

    /// Whether the error is fatal for the proof rather than for one application.
    pub fn is_fatal(&self) -> bool {
        match self {
            ProofError::InvariantViolation(_) => true,
            ProofError::Logic(e) => e.is_ambiguous_generic_sort(),
            _ => false,
        }
    }
}

pub type ProofResult<T> = Result<T, ProofError>;
