//! Prompt building blocks shared by the analyzer and generator.

use crate::db::PatientRef;
use crate::models::{Role, Turn};

/// Exchanges (user + assistant pairs) included in prompts.
pub const HISTORY_EXCHANGES: usize = 10;

/// Fixed schema description embedded in every generation prompt.
pub const SCHEMA: &str = "\
- patients (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, age INTEGER, gender TEXT, address TEXT, phone TEXT, notes TEXT)
- visits (id INTEGER PRIMARY KEY AUTOINCREMENT, patient_id INTEGER, date TEXT, diagnosis TEXT, doctor TEXT)
- prescriptions (id INTEGER PRIMARY KEY AUTOINCREMENT, visit_id INTEGER, medication TEXT, dosage TEXT)
- billing (id INTEGER PRIMARY KEY AUTOINCREMENT, patient_id INTEGER, amount REAL, status TEXT, date TEXT)
  - status values: 'Pending', 'Paid', 'Overdue'";

pub const RELATIONSHIPS: &str = "\
- visits.patient_id references patients.id
- prescriptions.visit_id references visits.id
- billing.patient_id references patients.id
- Use JOINs to connect related tables
- Use subqueries with IN or EXISTS for filtering by related table conditions";

/// Render the most recent exchanges as `User: ...` / `Assistant: ...` lines.
pub fn format_history(history: &[Turn], max_exchanges: usize) -> String {
    if history.is_empty() {
        return "No previous conversation.".to_string();
    }
    let start = history.len().saturating_sub(max_exchanges * 2);
    history[start..]
        .iter()
        .map(|turn| {
            let speaker = match turn.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            format!("{speaker}: {}", turn.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `{"patients": [{"id": .., "name": ..}]}`, pretty-printed.
pub fn entity_snapshot_json(patients: &[PatientRef]) -> String {
    serde_json::to_string_pretty(&serde_json::json!({ "patients": patients }))
        .unwrap_or_else(|_| "{}".to_string())
}

/// Body of a leading fenced block (```json ... ```), or the trimmed text.
pub fn fenced_body(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split("```").next().unwrap_or(rest);
    let body = body
        .strip_prefix("json")
        .or_else(|| body.strip_prefix("JSON"))
        .unwrap_or(body);
    body.trim()
}

/// Remove every fence marker (```sql, ```).
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```sql", "")
        .replace("```SQL", "")
        .replace("```", "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_placeholder() {
        assert_eq!(format_history(&[], 10), "No previous conversation.");
    }

    #[test]
    fn history_window_keeps_latest_exchanges() {
        let history: Vec<Turn> = (0..6)
            .flat_map(|i| [Turn::user(format!("q{i}")), Turn::assistant(format!("a{i}"))])
            .collect();
        let rendered = format_history(&history, 2);
        assert_eq!(rendered, "User: q4\nAssistant: a4\nUser: q5\nAssistant: a5");
    }

    #[test]
    fn fenced_json_body_extracted() {
        assert_eq!(fenced_body("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(fenced_body("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn sql_fences_removed() {
        assert_eq!(
            strip_code_fences("```sql\nSELECT * FROM visits\n```"),
            "SELECT * FROM visits"
        );
    }

    #[test]
    fn snapshot_lists_patient_refs() {
        let json = entity_snapshot_json(&[PatientRef {
            id: 1,
            name: "John Doe".into(),
        }]);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["patients"][0]["name"], "John Doe");
    }
}
