use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Carechat";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Turns kept per session (10 user/assistant exchanges).
pub const DEFAULT_HISTORY_TURNS: usize = 20;

/// Default OpenAI-compatible completion endpoint (Groq).
pub const DEFAULT_COMPLETION_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_COMPLETION_MODEL: &str = "compound-beta";

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "carechat_lib=info,tower_http=warn"
}

/// Get the application data directory (~/Carechat/).
/// Falls back to the working directory when no home is known.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Default location of the clinic database.
pub fn default_database_path() -> PathBuf {
    app_data_dir().join("medical.db")
}

/// Which session history backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBackend {
    Memory,
    Sqlite,
}

/// Which statement planner drives the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerKind {
    /// Completion-service backed planner.
    Llm,
    /// Deterministic keyword planner (no remote calls).
    Rules,
}

/// Settings for the remote completion service.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles per attempt.
    pub initial_backoff: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_COMPLETION_URL.to_string(),
            model: DEFAULT_COMPLETION_MODEL.to_string(),
            api_key: None,
            temperature: 0.1,
            timeout: Duration::from_secs(30),
            max_retries: 2,
            initial_backoff: Duration::from_millis(250),
        }
    }
}

/// Full runtime configuration, assembled from `CARECHAT_*` environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    /// Seed demo rows into an empty database on startup.
    pub seed_demo_data: bool,
    pub history_turns: usize,
    /// Hard deadline for one chat workflow; cancels the pass when exceeded.
    pub request_deadline: Duration,
    pub session_backend: SessionBackend,
    pub planner: PlannerKind,
    pub completion: CompletionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            database_path: default_database_path(),
            seed_demo_data: true,
            history_turns: DEFAULT_HISTORY_TURNS,
            request_deadline: Duration::from_secs(120),
            session_backend: SessionBackend::Memory,
            planner: PlannerKind::Llm,
            completion: CompletionConfig::default(),
        }
    }
}

impl AppConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Unparseable values fall back to the default and are logged.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("CARECHAT_COMPLETION_API_KEY").or_else(|| get("GROQ_API_KEY"));

        // Without credentials the remote planner cannot work; use the rule planner.
        let planner = match get("CARECHAT_PLANNER").as_deref() {
            Some("rules") => PlannerKind::Rules,
            Some("llm") => PlannerKind::Llm,
            _ if api_key.is_none() => PlannerKind::Rules,
            _ => PlannerKind::Llm,
        };

        let session_backend = match get("CARECHAT_SESSION_BACKEND").as_deref() {
            Some("sqlite") => SessionBackend::Sqlite,
            _ => SessionBackend::Memory,
        };

        let completion = CompletionConfig {
            base_url: get("CARECHAT_COMPLETION_URL")
                .unwrap_or(defaults.completion.base_url)
                .trim_end_matches('/')
                .to_string(),
            model: get("CARECHAT_COMPLETION_MODEL").unwrap_or(defaults.completion.model),
            api_key,
            temperature: parse_or(
                "CARECHAT_COMPLETION_TEMPERATURE",
                get("CARECHAT_COMPLETION_TEMPERATURE"),
                defaults.completion.temperature,
            ),
            timeout: Duration::from_secs(parse_or(
                "CARECHAT_COMPLETION_TIMEOUT_SECS",
                get("CARECHAT_COMPLETION_TIMEOUT_SECS"),
                defaults.completion.timeout.as_secs(),
            )),
            max_retries: parse_or(
                "CARECHAT_COMPLETION_RETRIES",
                get("CARECHAT_COMPLETION_RETRIES"),
                defaults.completion.max_retries,
            ),
            initial_backoff: Duration::from_millis(parse_or(
                "CARECHAT_COMPLETION_BACKOFF_MS",
                get("CARECHAT_COMPLETION_BACKOFF_MS"),
                defaults.completion.initial_backoff.as_millis() as u64,
            )),
        };

        Self {
            bind_addr: parse_or("CARECHAT_BIND", get("CARECHAT_BIND"), defaults.bind_addr),
            database_path: get("CARECHAT_DATABASE")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            seed_demo_data: parse_or("CARECHAT_SEED", get("CARECHAT_SEED"), defaults.seed_demo_data),
            history_turns: parse_or(
                "CARECHAT_HISTORY_TURNS",
                get("CARECHAT_HISTORY_TURNS"),
                defaults.history_turns,
            )
            .max(2),
            request_deadline: Duration::from_secs(parse_or(
                "CARECHAT_REQUEST_DEADLINE_SECS",
                get("CARECHAT_REQUEST_DEADLINE_SECS"),
                defaults.request_deadline.as_secs(),
            )),
            session_backend,
            planner,
            completion,
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %value, "Ignoring unparseable config value");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn app_data_dir_ends_with_app_name() {
        let dir = app_data_dir();
        assert!(dir.ends_with("Carechat") || dir == PathBuf::from("."));
    }

    #[test]
    fn defaults_without_environment() {
        let config = config_from(&[]);
        assert_eq!(config.history_turns, 20);
        assert_eq!(config.bind_addr.port(), 8000);
        assert!(config.seed_demo_data);
        assert_eq!(config.session_backend, SessionBackend::Memory);
        assert_eq!(config.completion.max_retries, 2);
    }

    #[test]
    fn missing_api_key_selects_rule_planner() {
        let config = config_from(&[]);
        assert_eq!(config.planner, PlannerKind::Rules);
    }

    #[test]
    fn groq_key_enables_llm_planner() {
        let config = config_from(&[("GROQ_API_KEY", "gsk_test")]);
        assert_eq!(config.planner, PlannerKind::Llm);
        assert_eq!(config.completion.api_key.as_deref(), Some("gsk_test"));
    }

    #[test]
    fn explicit_planner_wins_over_key_detection() {
        let config = config_from(&[("GROQ_API_KEY", "gsk_test"), ("CARECHAT_PLANNER", "rules")]);
        assert_eq!(config.planner, PlannerKind::Rules);
    }

    #[test]
    fn completion_settings_parsed() {
        let config = config_from(&[
            ("CARECHAT_COMPLETION_URL", "http://localhost:9000/v1/"),
            ("CARECHAT_COMPLETION_TIMEOUT_SECS", "5"),
            ("CARECHAT_COMPLETION_RETRIES", "4"),
            ("CARECHAT_COMPLETION_BACKOFF_MS", "10"),
        ]);
        assert_eq!(config.completion.base_url, "http://localhost:9000/v1");
        assert_eq!(config.completion.timeout, Duration::from_secs(5));
        assert_eq!(config.completion.max_retries, 4);
        assert_eq!(config.completion.initial_backoff, Duration::from_millis(10));
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = config_from(&[
            ("CARECHAT_BIND", "not-an-address"),
            ("CARECHAT_HISTORY_TURNS", "many"),
        ]);
        assert_eq!(config.bind_addr.port(), 8000);
        assert_eq!(config.history_turns, DEFAULT_HISTORY_TURNS);
    }

    #[test]
    fn sqlite_session_backend_selectable() {
        let config = config_from(&[("CARECHAT_SESSION_BACKEND", "sqlite")]);
        assert_eq!(config.session_backend, SessionBackend::Sqlite);
    }

    #[test]
    fn app_name_is_carechat() {
        assert_eq!(APP_NAME, "Carechat");
    }
}
