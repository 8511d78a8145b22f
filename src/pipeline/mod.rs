pub mod analyzer;
pub mod bulk;
pub mod completion;
pub mod executor;
pub mod formatter;
pub mod generator;
pub mod notifier;
pub mod orchestrator;
pub mod planner;
pub mod prompt_templates;
pub mod state;
pub mod validator;

pub use formatter::ReplyPayload;
pub use notifier::{ChangeEvent, ChangeNotifier};
pub use orchestrator::{Orchestrator, WorkflowResult};
pub use state::WorkflowError;
