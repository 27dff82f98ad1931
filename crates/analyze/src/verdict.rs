use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    Valid,
    MinorIssues,
    MajorIssues,
    /// No grounding context, or the model reported a status outside the schema.
    Unknown,
    /// The chunk could not be analyzed (service failure, timeout, unparseable reply).
    Error,
}

impl VerdictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictStatus::Valid => "valid",
            VerdictStatus::MinorIssues => "minor_issues",
            VerdictStatus::MajorIssues => "major_issues",
            VerdictStatus::Unknown => "unknown",
            VerdictStatus::Error => "error",
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, VerdictStatus::Valid)
    }

    /// Map a status string as written by the model.
    ///
    /// The two-level `issues_found` vocabulary is accepted as `major_issues`.
    pub fn from_model(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "valid" => VerdictStatus::Valid,
            "minor_issues" => VerdictStatus::MinorIssues,
            "major_issues" | "issues_found" => VerdictStatus::MajorIssues,
            "error" => VerdictStatus::Error,
            _ => VerdictStatus::Unknown,
        }
    }
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Inaccuracy,
    Missing,
    Outdated,
    Inconsistency,
    Supporting,
    #[default]
    #[serde(other)]
    Other,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::Inaccuracy => "inaccuracy",
            IssueKind::Missing => "missing",
            IssueKind::Outdated => "outdated",
            IssueKind::Inconsistency => "inconsistency",
            IssueKind::Supporting => "supporting",
            IssueKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub text: String,
    pub issue_type: IssueKind,
}

/// Outcome of analyzing one chunk. Always well-formed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub message: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub references: Vec<Reference>,
}

impl Verdict {
    pub fn new(status: VerdictStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            suggestions: Vec::new(),
            references: Vec::new(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(VerdictStatus::Unknown, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(VerdictStatus::Error, message)
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn is_valid(&self) -> bool {
        self.status.is_valid()
    }

    /// Verdict for a reply that could not be decoded.
    pub fn malformed(err: &MalformedOutput) -> Self {
        Self::error(format!("Automated parsing of the analysis failed: {}", err.reason))
            .with_suggestions(vec!["Re-run validation with a different scope".to_string()])
    }
}

#[derive(Debug, Error)]
#[error("malformed model output: {reason}")]
pub struct MalformedOutput {
    pub reason: String,
}

#[derive(Deserialize)]
struct RawVerdict {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    references: Option<Vec<Option<RawReference>>>,
    #[serde(default)]
    suggestions: Option<RawSuggestions>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawReference {
    Structured {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        issue_type: Option<IssueKind>,
    },
    Plain(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSuggestions {
    Many(Vec<Option<String>>),
    One(String),
}

impl From<RawReference> for Reference {
    fn from(raw: RawReference) -> Self {
        match raw {
            RawReference::Structured { text, issue_type } => Reference {
                text: text.unwrap_or_default(),
                issue_type: issue_type.unwrap_or_default(),
            },
            RawReference::Plain(text) => Reference {
                text,
                issue_type: IssueKind::Other,
            },
        }
    }
}

/// Outermost `{...}` of a reply, which may be wrapped in a code fence or prose.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Decode a model reply against the verdict schema.
///
/// Omitted fields are backfilled: empty message, no references, no
/// suggestions, and `unknown` when the status itself is missing. Null list
/// entries are dropped.
pub fn decode_verdict(raw: &str) -> Result<Verdict, MalformedOutput> {
    let json = extract_json_object(raw).ok_or_else(|| MalformedOutput {
        reason: "no JSON object in reply".to_string(),
    })?;

    let parsed: RawVerdict = serde_json::from_str(json).map_err(|e| MalformedOutput {
        reason: e.to_string(),
    })?;

    let suggestions = match parsed.suggestions {
        Some(RawSuggestions::Many(list)) => list.into_iter().flatten().collect(),
        Some(RawSuggestions::One(single)) if !single.trim().is_empty() => vec![single],
        _ => Vec::new(),
    };

    Ok(Verdict {
        status: parsed
            .status
            .as_deref()
            .map(VerdictStatus::from_model)
            .unwrap_or(VerdictStatus::Unknown),
        message: parsed.message.unwrap_or_default(),
        suggestions,
        references: parsed
            .references
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .map(Reference::from)
            .collect(),
    })
}
