use std::net::SocketAddr;
use std::time::Duration;

/// Immutable process-wide configuration, read from the environment once at
/// startup and shared by reference. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// OpenAI API key (`OPENAI_API_KEY`).
    pub openai_api_key: String,
    /// Base URL of the Responses API (`OPENAI_BASE_URL`).
    pub openai_base_url: String,
    /// Model identifier sent with every phase call (`OPENAI_MODEL`).
    pub model: String,
    /// Hard bound on each upstream phase call (`AGENT_PHASE_TIMEOUT_SECS`).
    pub phase_timeout: Duration,
    /// Hard wall-clock bound on sandboxed execution (`AGENT_RUN_TIMEOUT_SECS`).
    pub run_timeout: Duration,
    /// Interpreter used to launch the execution harness (`AGENT_PYTHON_BIN`).
    pub python_bin: String,
    /// Server bind address (`AGENT_BIND_ADDR`).
    pub bind_addr: SocketAddr,
}

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-5-nano-2025-08-07";
const DEFAULT_PHASE_TIMEOUT_SECS: u64 = 120;
const DEFAULT_RUN_TIMEOUT_SECS: u64 = 60;
const DEFAULT_PYTHON_BIN: &str = "python3";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";

fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => default.to_string(),
    }
}

fn env_secs(key: &str, default: u64) -> Duration {
    let secs = std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default);
    Duration::from_secs(secs)
}

impl AppConfig {
    /// Load configuration from the environment. `dotenvy::dotenv()` should
    /// have run before this so a local `.env` is honored.
    pub fn from_env() -> Self {
        let bind_addr = env_or("AGENT_BIND_ADDR", DEFAULT_BIND_ADDR)
            .parse()
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.parse().unwrap());

        Self {
            openai_api_key: env_or("OPENAI_API_KEY", ""),
            openai_base_url: env_or("OPENAI_BASE_URL", DEFAULT_BASE_URL),
            model: env_or("OPENAI_MODEL", DEFAULT_MODEL),
            phase_timeout: env_secs("AGENT_PHASE_TIMEOUT_SECS", DEFAULT_PHASE_TIMEOUT_SECS),
            run_timeout: env_secs("AGENT_RUN_TIMEOUT_SECS", DEFAULT_RUN_TIMEOUT_SECS),
            python_bin: env_or("AGENT_PYTHON_BIN", DEFAULT_PYTHON_BIN),
            bind_addr,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            phase_timeout: Duration::from_secs(DEFAULT_PHASE_TIMEOUT_SECS),
            run_timeout: Duration::from_secs(DEFAULT_RUN_TIMEOUT_SECS),
            python_bin: DEFAULT_PYTHON_BIN.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.parse().unwrap(),
        }
    }
}
