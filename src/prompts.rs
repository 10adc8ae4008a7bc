//! Prompt text for meeting-note analysis.
//!
//! Keeping the prompt here means the schema the model is asked for and the
//! schema [`crate::pipeline::parse`] accepts can be reviewed side by side,
//! and tests can inspect the prompt without calling a model.
//!
//! The priority and date rules are instructions to the model, not logic this
//! crate executes; the model performs the inference.

use chrono::NaiveDate;

/// Output schema shown to the model, with placeholder values describing each field.
pub const OUTPUT_SCHEMA: &str = r#"{
    "summary": "2-3 sentence overview of what was discussed and decided",
    "actionItems": [
        {
            "assignee": "person's name from attendees",
            "task": "specific action they need to take",
            "dueDate": "YYYY-MM-DD format if mentioned, otherwise null",
            "priority": "High or Medium or Low based on urgency"
        }
    ]
}"#;

/// Extraction rules, including worked examples for priority and date inference.
pub const EXTRACTION_RULES: &str = r#"Rules:
- Only extract action items where someone needs to DO something
- assignee must be a name from the attendees list, spelled exactly as listed
- If no deadline is mentioned, set dueDate to null
- Resolve relative deadlines against TODAY (e.g. "by Friday" is the next Friday after TODAY,
  "end of next week" is the Friday of the week after TODAY's week)
- Priority High = urgent words like "ASAP", "by Friday", "urgent", "blocking", "today"
- Priority Medium = "next week", "soon", or no urgency indicated
- Priority Low = "eventually", "when you can", "nice to have"
- If no clear action items, return an empty array

Examples:
- "Sarah needs to create the requirement template by end of next week"
  -> assignee "Sarah Johnson", priority "Medium", dueDate = Friday of next week
- "Mike must fix the login outage ASAP"
  -> assignee "Mike Chen", priority "High", dueDate = null
- "John could eventually tidy up the wiki"
  -> assignee "John Smith", priority "Low", dueDate = null"#;

/// Build the instruction prompt for one set of meeting notes.
///
/// Deterministic for a given `(notes, attendees, today)`; `today` anchors
/// relative deadlines.
pub fn build_analysis_prompt(notes: &str, attendees: &str, today: NaiveDate) -> String {
    format!(
        "Analyze these meeting notes and extract structured information.\n\
         \n\
         TODAY: {today} ({weekday})\n\
         \n\
         MEETING NOTES:\n\
         {notes}\n\
         \n\
         ATTENDEES: {attendees}\n\
         \n\
         Extract the following and return ONLY valid JSON (no markdown, no explanation):\n\
         \n\
         {OUTPUT_SCHEMA}\n\
         \n\
         {EXTRACTION_RULES}\n",
        today = today.format("%Y-%m-%d"),
        weekday = today.format("%A"),
        notes = notes.trim(),
        attendees = attendees.trim(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[test]
    fn prompt_embeds_inputs() {
        let p = build_analysis_prompt(
            "Sarah Johnson needs to create requirement template",
            "John Smith, Sarah Johnson, Mike Chen",
            day(),
        );
        assert!(p.contains("MEETING NOTES:\nSarah Johnson needs to create requirement template"));
        assert!(p.contains("ATTENDEES: John Smith, Sarah Johnson, Mike Chen"));
        assert!(p.contains("TODAY: 2026-10-16 (Friday)"));
    }

    #[test]
    fn prompt_describes_schema() {
        let p = build_analysis_prompt("n", "a", day());
        assert!(p.contains("\"actionItems\""));
        assert!(p.contains("\"dueDate\""));
        assert!(p.contains("Priority High"));
        assert!(p.contains("return ONLY valid JSON"));
    }

    #[test]
    fn prompt_is_deterministic() {
        let a = build_analysis_prompt("notes", "A, B", day());
        let b = build_analysis_prompt("notes", "A, B", day());
        assert_eq!(a, b);
    }
}
