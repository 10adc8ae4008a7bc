//! Attendee roster parsing and best-effort assignee alignment.
//!
//! The model is told to pick assignees from the roster, and usually does,
//! but it also writes "sarah johnson", "Sarah" or "Sarah  Johnson". Aligning
//! those to the roster spelling keeps stored assignees consistent. Names that
//! match nobody are left untouched; the roster is a hint, not a filter.

use crate::output::AnalysisResult;
use tracing::debug;

/// The attendee list of one meeting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    names: Vec<String>,
}

impl Roster {
    /// Split a free-form attendee string on commas, semicolons and newlines.
    pub fn parse(attendees: &str) -> Self {
        let names = attendees
            .split([',', ';', '\n'])
            .map(collapse_whitespace)
            .filter(|n| !n.is_empty())
            .collect();
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Roster spelling for `candidate`, if it can be identified.
    ///
    /// Full names match case- and whitespace-insensitively; a bare first name
    /// matches only when exactly one attendee has it.
    pub fn canonical(&self, candidate: &str) -> Option<&str> {
        let wanted = collapse_whitespace(candidate).to_lowercase();
        if wanted.is_empty() {
            return None;
        }

        if let Some(exact) = self.names.iter().find(|n| n.to_lowercase() == wanted) {
            return Some(exact);
        }

        let mut by_first = self.names.iter().filter(|n| {
            n.split(' ')
                .next()
                .is_some_and(|first| first.to_lowercase() == wanted)
        });
        match (by_first.next(), by_first.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    }

    /// Rewrite assignees in `result` to their roster spelling where possible.
    pub fn align(&self, result: &mut AnalysisResult) {
        for item in &mut result.action_items {
            match self.canonical(&item.assignee) {
                Some(name) if name != item.assignee => {
                    debug!("Aligned assignee {:?} → {:?}", item.assignee, name);
                    item.assignee = name.to_string();
                }
                Some(_) => {}
                None => debug!("Assignee {:?} not found in roster", item.assignee),
            }
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{ActionItem, Priority};

    fn roster() -> Roster {
        Roster::parse("John Smith, Sarah Johnson;  Mike   Chen\n")
    }

    fn item(assignee: &str) -> ActionItem {
        ActionItem {
            assignee: assignee.into(),
            task: "t".into(),
            due_date: None,
            priority: Priority::Medium,
        }
    }

    #[test]
    fn parses_mixed_separators() {
        assert_eq!(roster().names(), ["John Smith", "Sarah Johnson", "Mike Chen"]);
        assert!(Roster::parse(" , ;").is_empty());
    }

    #[test]
    fn canonical_full_name() {
        assert_eq!(roster().canonical("sarah  JOHNSON"), Some("Sarah Johnson"));
    }

    #[test]
    fn canonical_unique_first_name() {
        assert_eq!(roster().canonical("Mike"), Some("Mike Chen"));
    }

    #[test]
    fn ambiguous_first_name_is_left_alone() {
        let r = Roster::parse("Sam Lee, Sam Park");
        assert_eq!(r.canonical("Sam"), None);
    }

    #[test]
    fn align_rewrites_and_keeps_unknown() {
        let mut result = AnalysisResult {
            summary: String::new(),
            action_items: vec![item("sarah johnson"), item("Priya"), item("John Smith")],
        };
        roster().align(&mut result);
        let names: Vec<_> = result.action_items.iter().map(|i| i.assignee.as_str()).collect();
        assert_eq!(names, ["Sarah Johnson", "Priya", "John Smith"]);
    }
}
