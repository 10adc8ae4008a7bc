//! Result types handed back to callers.
//!
//! [`AnalysisResult`] is what the caller persists alongside the meeting. It
//! serialises with camelCase keys (`actionItems`, `dueDate`) so it can be
//! stored or returned to a front-end verbatim.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Summary shown when the completion service could not be reached at all.
pub const UNAVAILABLE_SUMMARY: &str = "AI analysis unavailable";

/// Prefix of the summary carried by a parse fallback.
pub const FALLBACK_SUMMARY_PREFIX: &str = "Unable to parse AI analysis";

/// Structured analysis of one set of meeting notes.
///
/// `action_items` is always present; an empty vector means the model found
/// nothing to do, never that the field was missing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Two-to-three sentence overview, or a diagnostic for degraded results.
    pub summary: String,
    /// Extracted action items, in the order the model listed them.
    pub action_items: Vec<ActionItem>,
}

impl AnalysisResult {
    /// Degraded result for a response that could not be parsed.
    ///
    /// `reason` is a short diagnostic such as `"invalid structure"`.
    pub fn fallback(reason: &str) -> Self {
        Self {
            summary: format!("{FALLBACK_SUMMARY_PREFIX}: {reason}"),
            action_items: Vec::new(),
        }
    }

    /// Degraded result for a completion call that failed outright.
    pub fn unavailable() -> Self {
        Self {
            summary: UNAVAILABLE_SUMMARY.to_string(),
            action_items: Vec::new(),
        }
    }

    /// `true` when this result stands in for a failed analysis.
    pub fn is_degraded(&self) -> bool {
        self.action_items.is_empty()
            && (self.summary == UNAVAILABLE_SUMMARY
                || self.summary.starts_with(FALLBACK_SUMMARY_PREFIX))
    }
}

/// One thing someone agreed to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionItem {
    /// Attendee responsible, spelled as in the roster when it could be matched.
    pub assignee: String,
    /// What they need to do.
    pub task: String,
    /// Deadline, when the notes mention one.
    pub due_date: Option<NaiveDate>,
    /// Urgency inferred by the model.
    #[serde(default)]
    pub priority: Priority,
}

/// Urgency of an action item. Defaults to [`Priority::Medium`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Case-insensitive lookup; anything unrecognised is `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" | "urgent" => Some(Priority::High),
            "medium" | "normal" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
