/// Operation label written for every committed mutating statement.
pub const SQL_EXECUTION_OPERATION: &str = "SQL Execution";

/// Actor recorded for statements issued through the chat workflow.
pub const CHATBOT_ACTOR: &str = "chatbot";
