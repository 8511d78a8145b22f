use serde::{Deserialize, Serialize};

use super::enums::Role;

/// One entry of a session's conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Assistant turn carrying the serialized reply, tagged with the
    /// statement that produced it so later requests can resolve "it".
    pub fn assistant_reply(payload_json: &str, statement: Option<&str>) -> Self {
        match statement {
            Some(sql) if !sql.trim().is_empty() => {
                Self::assistant(format!("{payload_json} [SQL: {sql}]"))
            }
            _ => Self::assistant(payload_json),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_reply_appends_statement_tag() {
        let turn = Turn::assistant_reply(
            r#"{"type":"write-success"}"#,
            Some("UPDATE billing SET status = 'Paid' WHERE id = 2"),
        );
        assert_eq!(turn.role, Role::Assistant);
        assert!(turn
            .content
            .ends_with("[SQL: UPDATE billing SET status = 'Paid' WHERE id = 2]"));
    }

    #[test]
    fn assistant_reply_without_statement_is_plain_payload() {
        let turn = Turn::assistant_reply(r#"{"type":"chat-text"}"#, None);
        assert_eq!(turn.content, r#"{"type":"chat-text"}"#);
        let blank = Turn::assistant_reply("{}", Some("  "));
        assert_eq!(blank.content, "{}");
    }
}
