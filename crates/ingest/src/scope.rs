use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::IngestError;

/// Granularity at which a document is split for validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Full,
    Section,
    Paragraph,
    Sentence,
}

impl Scope {
    pub const ALL: [Scope; 4] = [Scope::Full, Scope::Section, Scope::Paragraph, Scope::Sentence];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Full => "full",
            Scope::Section => "section",
            Scope::Paragraph => "paragraph",
            Scope::Sentence => "sentence",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scope::ALL
            .into_iter()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| IngestError::InvalidScope(s.to_string()))
    }
}
