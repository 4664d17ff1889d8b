//! Persona selection
//!
//! A persona picks the system prompt sent to the chat provider and the
//! voice used for speech synthesis. The set is closed: anything outside
//! it is rejected rather than silently mapped to a default.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::{Error, Result};

/// System prompt for Roy
pub const ROY_PROMPT: &str = "You are Roy, a calm and warm companion who listens closely. \
Reply in one to three short spoken sentences. Reflect back what the user said, \
ask at most one gentle follow-up question, and never use lists or markdown.";

/// System prompt for Randy
pub const RANDY_PROMPT: &str = "You are Randy, a quick-witted and upbeat sidekick with a dry sense of humor. \
Reply in one to three short spoken sentences. Keep it playful but never mean, \
and never use lists or markdown.";

/// Known chatbot personas
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    #[default]
    Roy,
    Randy,
}

impl Persona {
    /// All personas in display order
    pub const ALL: [Self; 2] = [Self::Roy, Self::Randy];

    /// Resolve an optional wire value
    ///
    /// An absent or blank value selects the default persona (Roy).
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPersona` if the value names no known persona
    pub fn resolve(value: Option<&str>) -> Result<Self> {
        match value.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(v) => v.parse(),
        }
    }

    /// Stable identifier used on the wire
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Roy => "roy",
            Self::Randy => "randy",
        }
    }

    /// Display name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Roy => "Roy",
            Self::Randy => "Randy",
        }
    }

    /// System instruction for the chat provider
    #[must_use]
    pub const fn system_prompt(self) -> &'static str {
        match self {
            Self::Roy => ROY_PROMPT,
            Self::Randy => RANDY_PROMPT,
        }
    }

    /// TTS voice identifier
    #[must_use]
    pub const fn voice(self) -> &'static str {
        match self {
            Self::Roy => "onyx",
            Self::Randy => "fable",
        }
    }

    /// TTS speed multiplier
    #[must_use]
    pub const fn speed(self) -> f32 {
        match self {
            Self::Roy => 1.0,
            Self::Randy => 1.1,
        }
    }
}

impl FromStr for Persona {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "roy" => Ok(Self::Roy),
            "randy" => Ok(Self::Randy),
            _ => Err(Error::InvalidPersona(s.to_string())),
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
