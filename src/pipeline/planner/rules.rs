//! Keyword planner that works without a completion endpoint.
//!
//! Resolves the target table and record from the message first, then from
//! the most recent `[SQL: ...]` tag in the history, so follow-ups such as
//! "mark it paid" land on the record the previous turn showed.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use super::{Analysis, PlanningContext, ResolvedContext, StatementPlanner};
use crate::db::PatientRef;
use crate::models::{BillingStatus, EntityTable, Intent, Role, Turn};
use crate::pipeline::completion::CompletionError;

static PATIENT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bpatient(?:\s+id)?\s*(?:#|=|:)?\s*(\d+)\b").unwrap());
static VISIT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bvisit(?:\s+id)?\s*(?:#|=|:)?\s*(\d+)\b").unwrap());
static RECORD_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:\bid\s*(?:=|:|#|is)?\s*|#)(\d+)\b").unwrap());
static ENTITY_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:bill|invoice|prescription|record)(?:\s+id)?\s*(?:#|=|:)?\s*(\d+)\b").unwrap()
});
static SQL_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bid\s*=\s*(\d+)").unwrap());
static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d+)\b").unwrap());
static AGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bage(?:d)?\s*(?:to|=|of|is|:)?\s*(\d{1,3})\b|\b(\d{1,3})\s*(?:years?\s+old|yo|y/o)\b")
        .unwrap()
});
static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bphone(?:\s+number)?\s*(?:to|=|is|:)?\s*(\d[\d\- ]{2,}\d)").unwrap()
});
static AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$\s?(\d+(?:\.\d{1,2})?)|\b(\d+(?:\.\d{1,2})?)\s*(?:dollars|usd)\b|\bamount\s*(?:of|to|=|:)?\s*(\d+(?:\.\d{1,2})?)")
        .unwrap()
});
static NAMED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[Nn]amed|[Cc]alled|[Pp]atient)\s+([A-Z][A-Za-z'\-]*(?:\s+[A-Z][A-Za-z'\-]*)*)")
        .unwrap()
});
static DIAGNOSIS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bfor\s+(.+?)(?:\s+with\s+dr\b.*|\s+on\s+\d{4}-\d{2}-\d{2}.*)?$").unwrap()
});
static DOCTOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(dr\.?\s+[A-Za-z]+)").unwrap());
static MEDICATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:prescribe|prescription\s+(?:of|for)|medication)\s+([A-Za-z][A-Za-z0-9\-]*)")
        .unwrap()
});
static DOSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+\s*(?:mg|ml|mcg|g)\b(?:\s+(?:once|twice|three times|daily|weekly|nightly|every\s+\w+)(?:\s+\w+)?)?)")
        .unwrap()
});

const GREETINGS: &[&str] = &[
    "hi", "hello", "hey", "thanks", "thank", "help", "morning", "afternoon", "evening", "bye",
];
const LOOKUP_VERBS: &[&str] = &[
    "show", "list", "get", "find", "search", "display", "view", "count", "how", "which", "who",
    "lookup",
];
const BULK_MARKERS: &[&str] = &["dummy", "sample", "populate", "bulk", "seed", "fake"];
const CREATE_VERBS: &[&str] = &["add", "create", "new", "register", "insert", "record"];
const DELETE_VERBS: &[&str] = &["delete", "remove", "cancel", "erase"];
const REFERENCES: &[&str] = &["it", "that", "this", "same", "them", "those", "one"];
const NUMBER_WORDS: &[(&str, usize)] = &[
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("few", 3),
    ("several", 3),
    ("multiple", 3),
    ("some", 3),
];

/// Upper bound on rows a single bulk request may create.
const MAX_BULK_ROWS: usize = 50;

const SAMPLE_PATIENTS: &[(&str, u32, &str, &str, &str, &str)] = &[
    ("Maria Lopez", 52, "Female", "14 Cedar Ave", "555-0111", "Type 2 diabetes"),
    ("James Carter", 38, "Male", "88 Birch Rd", "555-0112", "Seasonal allergies"),
    ("Aisha Khan", 27, "Female", "5 Elm Ct", "555-0113", "Asthma"),
    ("Tom Nguyen", 64, "Male", "301 Willow Way", "555-0114", "Hypertension"),
    ("Elena Rossi", 45, "Female", "9 Spruce Ln", "555-0115", "Migraine history"),
    ("David Okafor", 71, "Male", "42 Aspen Dr", "555-0116", "Atrial fibrillation"),
    ("Grace Kim", 33, "Female", "17 Poplar St", "555-0117", "No known conditions"),
    ("Samuel Reed", 58, "Male", "260 Hickory Blvd", "555-0118", "High cholesterol"),
];
const SAMPLE_DIAGNOSES: &[(&str, &str)] = &[
    ("Annual Physical", "Dr. House"),
    ("Sinus Infection", "Dr. Wilson"),
    ("Sprained Ankle", "Dr. Cuddy"),
    ("Diabetes Follow-up", "Dr. House"),
];
const SAMPLE_MEDICATIONS: &[(&str, &str)] = &[
    ("Amoxicillin", "500mg three times daily"),
    ("Metformin", "850mg twice daily"),
    ("Ibuprofen", "400mg as needed"),
    ("Atorvastatin", "20mg nightly"),
];

pub const CHAT_REPLY: &str = "Hello! I can help you view patient records, visits, prescriptions and billing, \
add new patients or records, update existing information and search for specific data. \
What would you like to do?";

/// Deterministic planner driven by keywords and the conversation history.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedPlanner;

impl RuleBasedPlanner {
    pub fn new() -> Self {
        Self
    }
}

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

fn has_any(words: &[String], set: &[&str]) -> bool {
    words.iter().any(|w| set.contains(&w.as_str()))
}

fn table_for_word(word: &str) -> Option<EntityTable> {
    match word {
        "patient" | "patients" => Some(EntityTable::Patients),
        "visit" | "visits" | "appointment" | "appointments" => Some(EntityTable::Visits),
        "prescription" | "prescriptions" | "medication" | "medications" | "meds" => {
            Some(EntityTable::Prescriptions)
        }
        "bill" | "bills" | "billing" | "invoice" | "invoices" | "payment" | "payments" => {
            Some(EntityTable::Billing)
        }
        _ => None,
    }
}

fn table_in_words(words: &[String]) -> Option<EntityTable> {
    words.iter().find_map(|w| table_for_word(w))
}

/// Statement recorded at the end of an assistant turn.
fn sql_tag(turn: &Turn) -> Option<&str> {
    if turn.role != Role::Assistant {
        return None;
    }
    let start = turn.content.rfind("[SQL: ")?;
    let tagged = &turn.content[start + "[SQL: ".len()..];
    Some(tagged.strip_suffix(']').unwrap_or(tagged).trim())
}

/// Table named in the latest history turn that names one.
fn history_table(history: &[Turn]) -> Option<EntityTable> {
    history.iter().rev().find_map(|turn| match sql_tag(turn) {
        Some(sql) => EntityTable::detect_in(sql),
        None if turn.role == Role::User => table_in_words(&words(&turn.content)),
        None => None,
    })
}

/// Record id targeted by the latest tagged statement in the history.
fn id_from_history(history: &[Turn]) -> Option<i64> {
    history
        .iter()
        .rev()
        .filter_map(sql_tag)
        .find_map(|sql| SQL_ID.captures(sql))
        .and_then(|caps| caps[1].parse().ok())
}

fn capture_i64(re: &Regex, text: &str) -> Option<i64> {
    re.captures(text).and_then(|c| c[1].parse().ok())
}

fn quote(value: &str) -> String {
    format!("'{}'", value.trim().replace('\'', "''"))
}

fn statuses_in(words: &[String]) -> Vec<BillingStatus> {
    words
        .iter()
        .filter_map(|w| {
            BillingStatus::ALL
                .into_iter()
                .find(|s| s.as_str().eq_ignore_ascii_case(w))
        })
        .collect()
}

fn patient_by_name<'a>(message_words: &[String], patients: &'a [PatientRef]) -> Option<&'a PatientRef> {
    patients.iter().find(|p| {
        let name_words = words(&p.name);
        let full_match = !name_words.is_empty()
            && message_words
                .windows(name_words.len())
                .any(|window| window == name_words.as_slice());
        let first_match = name_words
            .first()
            .is_some_and(|first| message_words.contains(first));
        full_match || first_match
    })
}

fn requested_count(message: &str, words: &[String]) -> usize {
    let numeric = NUMBER
        .captures(message)
        .and_then(|c| c[1].parse::<usize>().ok());
    let worded = || {
        words
            .iter()
            .find_map(|w| {
                NUMBER_WORDS
                    .iter()
                    .find(|(k, _)| *k == w.as_str())
                    .map(|(_, n)| *n)
            })
    };
    numeric.or_else(worded).unwrap_or(3).clamp(1, MAX_BULK_ROWS)
}

/// Facts extracted once per request.
struct Resolution<'a> {
    message: &'a str,
    words: Vec<String>,
    table: EntityTable,
    table_from_history: bool,
    record_id: Option<i64>,
    patient_id: Option<i64>,
    visit_id: Option<i64>,
}

impl<'a> Resolution<'a> {
    fn resolve(ctx: &PlanningContext<'a>) -> Self {
        let message = ctx.message;
        let words = words(message);

        let (table, table_from_history) = match table_in_words(&words) {
            Some(t) => (t, false),
            None => match history_table(ctx.history) {
                Some(t) => (t, true),
                None => (EntityTable::Patients, false),
            },
        };

        let patient_id = capture_i64(&PATIENT_ID, message)
            .or_else(|| patient_by_name(&words, ctx.patients).map(|p| p.id));
        let visit_id = capture_i64(&VISIT_ID, message);

        let remainder = PATIENT_ID.replace_all(message, " ");
        let remainder = VISIT_ID.replace_all(&remainder, " ");
        let record_id = capture_i64(&RECORD_ID, &remainder)
            .or_else(|| capture_i64(&ENTITY_ID, &remainder))
            .or(match table {
                EntityTable::Visits => visit_id,
                _ => None,
            })
            .or_else(|| {
                has_any(&words, REFERENCES)
                    .then(|| id_from_history(ctx.history))
                    .flatten()
            });

        Self {
            message,
            words,
            table,
            table_from_history,
            record_id,
            patient_id,
            visit_id,
        }
    }

    fn has(&self, set: &[&str]) -> bool {
        has_any(&self.words, set)
    }

    fn conditions(&self, status: Option<BillingStatus>) -> Vec<String> {
        let mut conds = Vec::new();
        if let Some(id) = self.record_id {
            conds.push(format!("id = {id}"));
        }
        if let Some(pid) = self.patient_id {
            let cond = match self.table {
                EntityTable::Patients => format!("id = {pid}"),
                EntityTable::Visits | EntityTable::Billing => format!("patient_id = {pid}"),
                EntityTable::Prescriptions => {
                    format!("visit_id IN (SELECT id FROM visits WHERE patient_id = {pid})")
                }
            };
            conds.push(cond);
        }
        if let (Some(vid), EntityTable::Prescriptions) = (self.visit_id, self.table) {
            conds.push(format!("visit_id = {vid}"));
        }
        if let (Some(status), EntityTable::Billing) = (status, self.table) {
            conds.push(format!("status = '{status}'"));
        }
        conds.dedup();
        conds
    }

    fn with_where(base: String, conds: &[String]) -> String {
        if conds.is_empty() {
            base
        } else {
            format!("{base} WHERE {}", conds.join(" AND "))
        }
    }

    fn select(&self) -> String {
        let status = statuses_in(&self.words).into_iter().next();
        Self::with_where(format!("SELECT * FROM {}", self.table), &self.conditions(status))
    }

    fn delete(&self) -> String {
        let status = statuses_in(&self.words).into_iter().next();
        Self::with_where(format!("DELETE FROM {}", self.table), &self.conditions(status))
    }

    /// SET clause from the message. With two statuses the first filters
    /// and the last is assigned ("mark pending bills paid").
    fn update(&self) -> String {
        let statuses = statuses_in(&self.words);
        let mut assignments = Vec::new();

        if self.table == EntityTable::Billing {
            if let Some(target) = statuses.last() {
                assignments.push(format!("status = '{target}'"));
            }
            if let Some(amount) = self.amount() {
                assignments.push(format!("amount = {amount}"));
            }
        }
        if self.table == EntityTable::Patients {
            if let Some(age) = self.age() {
                assignments.push(format!("age = {age}"));
            }
            if let Some(phone) = PHONE.captures(self.message) {
                assignments.push(format!("phone = {}", quote(&phone[1])));
            }
        }
        if assignments.is_empty() {
            return String::new();
        }

        let filter = (statuses.len() > 1).then(|| statuses[0]);
        Self::with_where(
            format!("UPDATE {} SET {}", self.table, assignments.join(", ")),
            &self.conditions(filter),
        )
    }

    fn age(&self) -> Option<u32> {
        AGE.captures(self.message).and_then(|c| {
            c.get(1)
                .or_else(|| c.get(2))
                .and_then(|m| m.as_str().parse().ok())
        })
    }

    fn amount(&self) -> Option<f64> {
        AMOUNT.captures(self.message).and_then(|c| {
            c.get(1)
                .or_else(|| c.get(2))
                .or_else(|| c.get(3))
                .and_then(|m| m.as_str().parse().ok())
        })
    }

    fn insert(&self) -> String {
        match self.table {
            EntityTable::Patients => {
                let Some(name) = NAMED.captures(self.message).map(|c| c[1].to_string()) else {
                    return String::new();
                };
                let mut columns = vec!["name"];
                let mut values = vec![quote(&name)];
                if let Some(age) = self.age() {
                    columns.push("age");
                    values.push(age.to_string());
                }
                if self.words.iter().any(|w| w == "male" || w == "female") {
                    let gender = if self.words.iter().any(|w| w == "female") {
                        "Female"
                    } else {
                        "Male"
                    };
                    columns.push("gender");
                    values.push(quote(gender));
                }
                if let Some(phone) = PHONE.captures(self.message) {
                    columns.push("phone");
                    values.push(quote(&phone[1]));
                }
                format!(
                    "INSERT INTO patients ({}) VALUES ({})",
                    columns.join(", "),
                    values.join(", ")
                )
            }
            EntityTable::Billing => {
                let (Some(pid), Some(amount)) = (self.patient_id, self.amount()) else {
                    return String::new();
                };
                let status = statuses_in(&self.words)
                    .into_iter()
                    .next()
                    .unwrap_or(BillingStatus::Pending);
                format!(
                    "INSERT INTO billing (patient_id, amount, status, date) VALUES ({pid}, {amount}, '{status}', date('now'))"
                )
            }
            EntityTable::Visits => {
                let Some(pid) = self.patient_id else {
                    return String::new();
                };
                let diagnosis = DIAGNOSIS
                    .captures(self.message)
                    .map(|c| quote(&c[1]))
                    .unwrap_or_else(|| "NULL".to_string());
                let doctor = DOCTOR
                    .captures(self.message)
                    .map(|c| quote(&c[1]))
                    .unwrap_or_else(|| "NULL".to_string());
                format!(
                    "INSERT INTO visits (patient_id, date, diagnosis, doctor) VALUES ({pid}, date('now'), {diagnosis}, {doctor})"
                )
            }
            EntityTable::Prescriptions => {
                let (Some(vid), Some(med)) = (
                    self.visit_id,
                    MEDICATION.captures(self.message).map(|c| c[1].to_string()),
                ) else {
                    return String::new();
                };
                let dosage = DOSAGE
                    .captures(self.message)
                    .map(|c| quote(&c[1]))
                    .unwrap_or_else(|| "NULL".to_string());
                format!(
                    "INSERT INTO prescriptions (visit_id, medication, dosage) VALUES ({vid}, {}, {dosage})",
                    quote(&med)
                )
            }
        }
    }
}

fn classify_message(ctx: &PlanningContext<'_>) -> Analysis {
    let resolution = Resolution::resolve(ctx);
    let named_table = table_in_words(&resolution.words).is_some();

    let intent = if !named_table && resolution.has(GREETINGS) {
        Intent::Chat
    } else if resolution.has(BULK_MARKERS)
        || (resolution.has(CREATE_VERBS) && requested_count(ctx.message, &resolution.words) > 1
            && resolution.words.iter().any(|w| w.ends_with('s') && table_for_word(w).is_some()))
    {
        Intent::BulkInsert
    } else if resolution.has(LOOKUP_VERBS) {
        Intent::Query
    } else {
        Intent::Update
    };

    let action = match intent {
        Intent::Chat => None,
        Intent::Query => Some("select"),
        Intent::BulkInsert => Some("bulk_insert"),
        Intent::Update if resolution.has(DELETE_VERBS) => Some("delete"),
        Intent::Update if resolution.has(CREATE_VERBS) => Some("insert"),
        Intent::Update => Some("update"),
    };

    Analysis {
        intent,
        confidence: Some(1.0),
        resolved_context: ResolvedContext {
            table: (intent != Intent::Chat).then(|| resolution.table.to_string()),
            action: action.map(String::from),
            inferred_from_history: resolution
                .table_from_history
                .then(|| format!("table {} from earlier turns", resolution.table)),
        },
        reasoning: Some("keyword rules".to_string()),
        needs_clarification: false,
        clarification_question: None,
    }
}

fn plan_statement(ctx: &PlanningContext<'_>, analysis: &Analysis) -> String {
    let resolution = Resolution::resolve(ctx);

    if resolution.has(&["drop"]) {
        return format!("DROP TABLE {}", resolution.table);
    }
    if resolution.has(&["truncate"]) {
        return format!("TRUNCATE TABLE {}", resolution.table);
    }

    match analysis.intent {
        Intent::Chat => String::new(),
        Intent::Query => resolution.select(),
        Intent::Update | Intent::BulkInsert => {
            if resolution.has(DELETE_VERBS) {
                resolution.delete()
            } else if resolution.has(CREATE_VERBS) {
                resolution.insert()
            } else {
                resolution.update()
            }
        }
    }
}

fn plan_bulk(ctx: &PlanningContext<'_>) -> Vec<String> {
    let resolution = Resolution::resolve(ctx);
    let count = requested_count(ctx.message, &resolution.words);
    let table = table_in_words(&resolution.words).unwrap_or(EntityTable::Patients);
    let patient_ids: Vec<i64> = ctx.patients.iter().map(|p| p.id).collect();
    let patient_for = |i: usize| -> String {
        if patient_ids.is_empty() {
            "(SELECT MAX(id) FROM patients)".to_string()
        } else {
            patient_ids[i % patient_ids.len()].to_string()
        }
    };

    (0..count)
        .map(|i| match table {
            EntityTable::Patients => {
                let (name, age, gender, address, phone, notes) =
                    SAMPLE_PATIENTS[i % SAMPLE_PATIENTS.len()];
                format!(
                    "INSERT INTO patients (name, age, gender, address, phone, notes) VALUES ({}, {age}, {}, {}, {}, {})",
                    quote(name),
                    quote(gender),
                    quote(address),
                    quote(phone),
                    quote(notes)
                )
            }
            EntityTable::Visits => {
                let (diagnosis, doctor) = SAMPLE_DIAGNOSES[i % SAMPLE_DIAGNOSES.len()];
                format!(
                    "INSERT INTO visits (patient_id, date, diagnosis, doctor) VALUES ({}, date('now'), {}, {})",
                    patient_for(i),
                    quote(diagnosis),
                    quote(doctor)
                )
            }
            EntityTable::Prescriptions => {
                let (medication, dosage) = SAMPLE_MEDICATIONS[i % SAMPLE_MEDICATIONS.len()];
                format!(
                    "INSERT INTO prescriptions (visit_id, medication, dosage) VALUES ((SELECT MAX(id) FROM visits), {}, {})",
                    quote(medication),
                    quote(dosage)
                )
            }
            EntityTable::Billing => {
                let status = BillingStatus::ALL[i % BillingStatus::ALL.len()];
                let amount = 75.0 + 25.0 * (i % 6) as f64;
                format!(
                    "INSERT INTO billing (patient_id, amount, status, date) VALUES ({}, {amount:.2}, '{status}', date('now'))",
                    patient_for(i)
                )
            }
        })
        .collect()
}

#[async_trait]
impl StatementPlanner for RuleBasedPlanner {
    async fn classify(
        &self,
        ctx: PlanningContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<Analysis, CompletionError> {
        if cancel.is_cancelled() {
            return Err(CompletionError::Cancelled);
        }
        Ok(classify_message(&ctx))
    }

    async fn generate(
        &self,
        ctx: PlanningContext<'_>,
        analysis: &Analysis,
        cancel: &CancellationToken,
    ) -> Result<String, CompletionError> {
        if cancel.is_cancelled() {
            return Err(CompletionError::Cancelled);
        }
        Ok(plan_statement(&ctx, analysis))
    }

    async fn generate_bulk(
        &self,
        ctx: PlanningContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, CompletionError> {
        if cancel.is_cancelled() {
            return Err(CompletionError::Cancelled);
        }
        Ok(plan_bulk(&ctx))
    }

    async fn chat_reply(
        &self,
        _ctx: PlanningContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<String, CompletionError> {
        if cancel.is_cancelled() {
            return Err(CompletionError::Cancelled);
        }
        Ok(CHAT_REPLY.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patients() -> Vec<PatientRef> {
        vec![
            PatientRef { id: 1, name: "John Doe".into() },
            PatientRef { id: 2, name: "Sarah Ali".into() },
            PatientRef { id: 3, name: "Bob Smith".into() },
        ]
    }

    fn plan(message: &str, history: &[Turn]) -> (Intent, String) {
        let patients = patients();
        let ctx = PlanningContext {
            message,
            history,
            patients: &patients,
        };
        let analysis = classify_message(&ctx);
        let sql = plan_statement(&ctx, &analysis);
        (analysis.intent, sql)
    }

    #[test]
    fn pending_bills_query() {
        assert_eq!(
            plan("show pending bills", &[]),
            (
                Intent::Query,
                "SELECT * FROM billing WHERE status = 'Pending'".to_string()
            )
        );
    }

    #[test]
    fn drop_request_produces_drop() {
        let (intent, sql) = plan("drop the patients table", &[]);
        assert_eq!(intent, Intent::Update);
        assert_eq!(sql, "DROP TABLE patients");
    }

    #[test]
    fn unqualified_status_update() {
        let (intent, sql) = plan("update billing set status paid", &[]);
        assert_eq!(intent, Intent::Update);
        assert_eq!(sql, "UPDATE billing SET status = 'Paid'");
    }

    #[test]
    fn follow_up_resolves_id_from_history() {
        let (intent, sql) = plan("show bill id 2", &[]);
        assert_eq!(intent, Intent::Query);
        assert_eq!(sql, "SELECT * FROM billing WHERE id = 2");

        let history = vec![
            Turn::user("show bill id 2"),
            Turn::assistant_reply(r#"{"type":"table-result"}"#, Some(&sql)),
        ];
        let (intent, sql) = plan("mark it paid", &history);
        assert_eq!(intent, Intent::Update);
        assert_eq!(sql, "UPDATE billing SET status = 'Paid' WHERE id = 2");
    }

    #[test]
    fn greeting_is_chat() {
        assert_eq!(plan("hello there", &[]).0, Intent::Chat);
        assert_eq!(plan("hi, show patients", &[]).0, Intent::Query);
    }

    #[test]
    fn bulk_markers_detected() {
        assert_eq!(plan("add 5 patients", &[]).0, Intent::BulkInsert);
        assert_eq!(plan("create dummy data", &[]).0, Intent::BulkInsert);
        assert_eq!(plan("add new patient named Ada Park", &[]).0, Intent::Update);
    }

    #[test]
    fn patient_insert_from_name_and_age() {
        let (_, sql) = plan("add new patient named Ada Park, 29 years old", &[]);
        assert_eq!(sql, "INSERT INTO patients (name, age) VALUES ('Ada Park', 29)");
    }

    #[test]
    fn patient_name_filters_related_tables() {
        let (_, sql) = plan("show visits for John", &[]);
        assert_eq!(sql, "SELECT * FROM visits WHERE patient_id = 1");
    }

    #[test]
    fn patient_id_not_mistaken_for_record_id() {
        let (_, sql) = plan("list bills for patient id 2", &[]);
        assert_eq!(sql, "SELECT * FROM billing WHERE patient_id = 2");
    }

    #[test]
    fn delete_with_id() {
        let (intent, sql) = plan("delete visit 3", &[]);
        assert_eq!(intent, Intent::Update);
        assert_eq!(sql, "DELETE FROM visits WHERE id = 3");
    }

    #[test]
    fn unresolvable_update_is_empty() {
        assert_eq!(plan("do the thing", &[]).1, "");
    }

    #[test]
    fn billing_insert_needs_amount() {
        let (_, sql) = plan("add a bill of $80 for Sarah", &[]);
        assert_eq!(
            sql,
            "INSERT INTO billing (patient_id, amount, status, date) VALUES (2, 80, 'Pending', date('now'))"
        );
    }

    #[test]
    fn bulk_statement_count_follows_request() {
        let patients = patients();
        let ctx = PlanningContext {
            message: "add 4 billing records",
            history: &[],
            patients: &patients,
        };
        let statements = plan_bulk(&ctx);
        assert_eq!(statements.len(), 4);
        assert!(statements.iter().all(|s| s.starts_with("INSERT INTO billing")));
    }

    #[test]
    fn bulk_count_is_capped() {
        let ctx = PlanningContext {
            message: "populate 1000 patients",
            history: &[],
            patients: &[],
        };
        assert_eq!(plan_bulk(&ctx).len(), MAX_BULK_ROWS);
    }
}
