//! Statement generation prompts and post-processing of model output.

use super::planner::{Analysis, PlanningContext};
use super::prompt_templates::{
    entity_snapshot_json, format_history, strip_code_fences, HISTORY_EXCHANGES, RELATIONSHIPS,
    SCHEMA,
};

const ALLOWED_KEYWORDS: [&str; 4] = ["SELECT", "INSERT", "UPDATE", "DELETE"];

fn starts_with_allowed_keyword(line: &str) -> bool {
    let upper = line.trim_start().to_uppercase();
    ALLOWED_KEYWORDS.iter().any(|kw| upper.starts_with(kw))
}

pub fn statement_prompt(ctx: &PlanningContext<'_>, analysis: &Analysis) -> String {
    let resolved = serde_json::to_string(&analysis.resolved_context).unwrap_or_default();
    format!(
        r#"You are an expert SQL generator for a medical SQLite database. Use the conversation history to understand context.

DATABASE SCHEMA:
{SCHEMA}

RELATIONSHIP NOTES:
{RELATIONSHIPS}

CONVERSATION HISTORY (contains the SQL already executed and the ids it touched):
{history}

RESOLVED CONTEXT:
{resolved}

CURRENT DATA CONTEXT:
{entities}

USER REQUEST: "{message}"

CONTEXT RULES:
1. Assistant turns end with "[SQL: ...]" showing the statement that ran; reuse its ids
2. "it", "that one", "the one you just updated" = the id from the most recent statement
3. "the rest", "all others" = exclude those ids with !=

EXAMPLES:
- "show pending bills" -> SELECT * FROM billing WHERE status = 'Pending'
- "mark as paid" (after showing bill id=2) -> UPDATE billing SET status = 'Paid' WHERE id = 2
- "add new patient John" -> INSERT INTO patients (name) VALUES ('John')
- "show visits with patient names" -> SELECT v.*, p.name FROM visits v JOIN patients p ON v.patient_id = p.id
- "patients with more than one visit" -> SELECT p.* FROM patients p WHERE p.id IN (SELECT patient_id FROM visits GROUP BY patient_id HAVING COUNT(*) > 1)

SQL RULES:
1. Return ONLY ONE SQL statement: no markdown, no explanation
2. One of SELECT, INSERT, UPDATE or DELETE
3. For INSERT never include the 'id' column
4. For UPDATE and DELETE always use a WHERE clause
5. Never use semicolons to chain statements

Generate the SQL query:"#,
        history = format_history(ctx.history, HISTORY_EXCHANGES),
        entities = entity_snapshot_json(ctx.patients),
        message = ctx.message,
    )
}

pub fn bulk_prompt(ctx: &PlanningContext<'_>) -> String {
    format!(
        r#"You are a data generator for a medical database. Generate realistic INSERT statements for the user's request.

DATABASE SCHEMA:
{SCHEMA}

CURRENT DATA (use existing patient ids for visits and billing):
{entities}

USER REQUEST: "{message}"

RULES:
1. Realistic, varied data (names, ages, diagnoses, medications, dosages)
2. Never include 'id' columns
3. Dates as 'YYYY-MM-DD'
4. Return ONLY the SQL statements, one complete INSERT per line
5. Reference valid patient_id / visit_id values
6. For "dummy data" or "sample data" fill every table with consistent relationships

Generate the INSERT statements:"#,
        entities = entity_snapshot_json(ctx.patients),
        message = ctx.message,
    )
}

pub fn chat_prompt(message: &str) -> String {
    format!(
        r#"You are a friendly medical database assistant. Respond naturally to this message:
"{message}"

Keep the response brief and helpful. Mention that you can help with:
- Viewing patient records, visits, prescriptions, and billing
- Adding new patients or records
- Updating existing information
- Searching for specific data

Respond conversationally:"#
    )
}

/// Reduce raw model output to a single statement: strip fences, keep the
/// first line led by an allowed keyword when the output spans lines, then
/// cut at the first `;`.
pub fn extract_statement(raw: &str) -> String {
    let mut sql = strip_code_fences(raw);

    if sql.contains('\n') {
        if let Some(line) = sql.lines().map(str::trim).find(|l| starts_with_allowed_keyword(l)) {
            sql = line.to_string();
        }
    }

    match sql.split_once(';') {
        Some((head, _)) => head.trim().to_string(),
        None => sql.trim().to_string(),
    }
}

/// Split bulk output into INSERT statements, one per line, without trailing `;`.
pub fn extract_bulk_statements(raw: &str) -> Vec<String> {
    strip_code_fences(raw)
        .lines()
        .map(str::trim)
        .filter(|line| line.to_uppercase().starts_with("INSERT"))
        .map(|line| line.trim_end_matches(';').trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Intent, Turn};

    #[test]
    fn fenced_statement_cleaned() {
        assert_eq!(
            extract_statement("```sql\nSELECT * FROM billing WHERE status = 'Pending';\n```"),
            "SELECT * FROM billing WHERE status = 'Pending'"
        );
    }

    #[test]
    fn explanation_lines_skipped() {
        let raw = "Here is the query you asked for:\nUPDATE billing SET status = 'Paid' WHERE id = 2\nThis marks the bill paid.";
        assert_eq!(
            extract_statement(raw),
            "UPDATE billing SET status = 'Paid' WHERE id = 2"
        );
    }

    #[test]
    fn chained_statements_truncated() {
        assert_eq!(
            extract_statement("DELETE FROM visits WHERE id = 1; DROP TABLE visits"),
            "DELETE FROM visits WHERE id = 1"
        );
    }

    #[test]
    fn empty_output_stays_empty() {
        assert_eq!(extract_statement("```\n```"), "");
    }

    #[test]
    fn bulk_keeps_only_inserts() {
        let raw = "```sql\nINSERT INTO patients (name, age) VALUES ('A', 30);\n-- comment\nDELETE FROM patients WHERE id = 1\n  insert into billing (patient_id, amount, status, date) VALUES (1, 20.0, 'Pending', '2025-01-01');\n```";
        let statements = extract_bulk_statements(raw);
        assert_eq!(
            statements,
            vec![
                "INSERT INTO patients (name, age) VALUES ('A', 30)".to_string(),
                "insert into billing (patient_id, amount, status, date) VALUES (1, 20.0, 'Pending', '2025-01-01')".to_string(),
            ]
        );
    }

    #[test]
    fn statement_prompt_carries_schema_and_history() {
        let history = [
            Turn::user("show bill id 2"),
            Turn::assistant("{} [SQL: SELECT * FROM billing WHERE id = 2]"),
        ];
        let ctx = PlanningContext {
            message: "mark it paid",
            history: &history,
            patients: &[],
        };
        let prompt = statement_prompt(&ctx, &Analysis::new(Intent::Update));
        assert!(prompt.contains("status values: 'Pending', 'Paid', 'Overdue'"));
        assert!(prompt.contains("[SQL: SELECT * FROM billing WHERE id = 2]"));
    }
}
