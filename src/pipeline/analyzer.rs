//! Intent analysis: prompt construction and tolerant response parsing.

use serde::Deserialize;

use super::planner::{Analysis, PlanningContext, ResolvedContext};
use super::prompt_templates::{entity_snapshot_json, fenced_body, format_history, HISTORY_EXCHANGES};
use crate::models::Intent;

/// Verbs that mark a lookup when the model's answer cannot be parsed.
const LOOKUP_WORDS: &[&str] = &["show", "list", "get", "find", "search"];

pub fn classification_prompt(ctx: &PlanningContext<'_>) -> String {
    format!(
        r#"You are an intelligent medical database assistant. Analyze the user's request carefully.

PREVIOUS CONVERSATION:
{history}

CURRENT DATABASE STATE:
{entities}

USER REQUEST: "{message}"

Analyze and respond with a JSON object containing:
{{
    "intent": "UPDATE" | "QUERY" | "CHAT" | "BULK_INSERT",
    "confidence": 0.0 to 1.0,
    "resolved_context": {{
        "table": "patients|visits|prescriptions|billing",
        "action": "select|insert|update|delete|bulk_insert",
        "inferred_from_history": "what you inferred from conversation history"
    }},
    "reasoning": "brief explanation"
}}

INTENT CLASSIFICATION:
- "QUERY": any read (show, list, find, get, search, display, how many, count)
- "UPDATE": a single INSERT, UPDATE or DELETE
- "BULK_INSERT": several records at once ("add 5 patients", "create dummy data", "populate with sample records")
- "CHAT": greetings, help requests, questions not about the data

RULES:
1. Use the conversation history to resolve references ("it", "that one", "the same")
2. Infer intent decisively; do not ask unnecessary questions
3. Requests for multiple, dummy or sample records are BULK_INSERT
4. Simple lookups are QUERY

Return ONLY the JSON object, no other text."#,
        history = format_history(ctx.history, HISTORY_EXCHANGES),
        entities = entity_snapshot_json(ctx.patients),
        message = ctx.message,
    )
}

#[derive(Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    resolved_context: Option<ResolvedContext>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Keyword classification used when the model's answer is unusable.
pub fn keyword_fallback(message: &str) -> Intent {
    let lower = message.to_lowercase();
    if LOOKUP_WORDS.iter().any(|w| lower.contains(w)) {
        Intent::Query
    } else {
        Intent::Update
    }
}

/// Parse the model's classification. Never fails: malformed JSON, a missing
/// intent or an unknown intent falls back to [`keyword_fallback`].
pub fn parse_analysis(raw: &str, message: &str) -> Analysis {
    let body = fenced_body(raw);
    match serde_json::from_str::<RawAnalysis>(body) {
        Ok(parsed) => {
            match parsed.intent.as_deref().and_then(Intent::parse_loose) {
                Some(intent) => Analysis {
                    intent,
                    confidence: parsed.confidence,
                    resolved_context: parsed.resolved_context.unwrap_or_default(),
                    reasoning: parsed.reasoning,
                    needs_clarification: false,
                    clarification_question: None,
                },
                None => {
                    tracing::debug!("Missing or unknown intent in classification, using keyword fallback");
                    Analysis::new(keyword_fallback(message))
                }
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, "Unparseable classification, using keyword fallback");
            Analysis::new(keyword_fallback(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::PatientRef;
    use crate::models::Turn;

    #[test]
    fn strict_json_parsed() {
        let raw = r#"{"intent":"QUERY","confidence":0.92,"resolved_context":{"table":"billing","action":"select"},"reasoning":"lookup"}"#;
        let analysis = parse_analysis(raw, "show pending bills");
        assert_eq!(analysis.intent, Intent::Query);
        assert_eq!(analysis.confidence, Some(0.92));
        assert_eq!(analysis.resolved_context.table.as_deref(), Some("billing"));
        assert!(!analysis.needs_clarification);
    }

    #[test]
    fn fenced_json_parsed() {
        let raw = "```json\n{\"intent\": \"BULK_INSERT\"}\n```";
        assert_eq!(parse_analysis(raw, "add 5 patients").intent, Intent::BulkInsert);
    }

    #[test]
    fn garbage_falls_back_to_keywords() {
        assert_eq!(parse_analysis("I think it's a query", "list visits").intent, Intent::Query);
        assert_eq!(parse_analysis("???", "mark it paid").intent, Intent::Update);
    }

    #[test]
    fn unknown_intent_falls_back() {
        let analysis = parse_analysis(r#"{"intent":"DESTROY"}"#, "find John");
        assert_eq!(analysis.intent, Intent::Query);
    }

    #[test]
    fn missing_intent_falls_back_to_keywords() {
        let raw = r#"{"confidence": 0.5, "resolved_context": {}}"#;
        assert_eq!(parse_analysis(raw, "mark it paid").intent, Intent::Update);
        assert_eq!(parse_analysis(raw, "show patients").intent, Intent::Query);
    }

    #[test]
    fn prompt_embeds_history_entities_and_message() {
        let history = [Turn::user("show bill id 2")];
        let patients = [PatientRef { id: 2, name: "Sarah Ali".into() }];
        let ctx = PlanningContext {
            message: "mark it paid",
            history: &history,
            patients: &patients,
        };
        let prompt = classification_prompt(&ctx);
        assert!(prompt.contains("User: show bill id 2"));
        assert!(prompt.contains("Sarah Ali"));
        assert!(prompt.contains("USER REQUEST: \"mark it paid\""));
    }
}
