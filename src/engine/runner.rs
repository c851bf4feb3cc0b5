//! Sandboxed execution of generated agent code.
//!
//! The candidate is treated as an opaque black box behind a process
//! boundary: validation covers only the minimal textual contract needed to
//! construct the harness call, and everything else is enforced inside the
//! isolated child process. The runner never raises — every outcome folds
//! into a `RunResponse`.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use uuid::Uuid;

use super::types::{RunRequest, RunResponse};

/// Upper bound on candidate source size, in characters.
pub const MAX_AGENT_CODE_CHARS: usize = 120_000;

/// Candidate source filename inside the scratch directory.
const AGENT_FILENAME: &str = "agent.py";

/// Harness filename inside the scratch directory.
const HARNESS_FILENAME: &str = "runner.py";

/// Exit code reported when the wall-clock timeout fires, mirroring the
/// conventional `timeout(1)` exit status.
const TIMEOUT_EXIT_CODE: i32 = 124;

/// Fixed harness. Reads `{prompt, tools}` from stdin, constructs the
/// candidate's `Agent`, and writes the string-coerced result to stdout.
/// Immutable and never derived from caller input, so the harness itself
/// cannot become an injection vector.
const HARNESS_SOURCE: &str = r#"import json
import sys
from agent import Agent

def main():
    payload = json.loads(sys.stdin.read() or "{}")
    prompt = payload.get("prompt", "")
    tools = payload.get("tools") or ["search", "codegen", "diagram"]
    agent = Agent(tools)
    out = agent.run(prompt)
    if out is None:
        out = ""
    sys.stdout.write(str(out))

if __name__ == "__main__":
    main()
"#;

/// Per-call runner settings. The 60 second default is the product bound;
/// tests shrink it to exercise the timeout path quickly.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub python_bin: String,
    pub timeout: Duration,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            python_bin: "python3".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

fn class_agent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"class\s+Agent\b").unwrap())
}

fn run_method_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"def\s+run\s*\(\s*self\s*,\s*task\s*:\s*str\s*\)\s*->\s*str\s*:").unwrap()
    })
}

fn validation_failure(message: &str) -> RunResponse {
    RunResponse {
        ok: false,
        stdout: String::new(),
        stderr: message.to_string(),
        exit_code: 1,
    }
}

/// Minimal structural contract the harness needs. First failure wins.
fn validate(agent_code: &str) -> Option<RunResponse> {
    if agent_code.chars().count() > MAX_AGENT_CODE_CHARS {
        return Some(validation_failure(
            "Agent code too large. Limit is 120k characters.",
        ));
    }
    if !class_agent_re().is_match(agent_code) {
        return Some(validation_failure(
            "Agent code must define class Agent for the runner.",
        ));
    }
    if !run_method_re().is_match(agent_code) {
        return Some(validation_failure(
            "Agent code must define run(self, task: str) -> str for the runner.",
        ));
    }
    None
}

/// Execute candidate agent code against a task prompt under a hard
/// wall-clock bound. The scratch directory is exclusive to this call and
/// removed on every exit path.
pub async fn run_agent_code(request: &RunRequest, options: &RunnerOptions) -> RunResponse {
    if let Some(failure) = validate(&request.agent_code) {
        return failure;
    }

    let run_id = Uuid::new_v4();
    let scratch = match tempfile::Builder::new()
        .prefix("agent-run-")
        .tempdir()
    {
        Ok(dir) => dir,
        Err(e) => {
            return RunResponse {
                ok: false,
                stdout: String::new(),
                stderr: format!("Failed to create scratch directory: {e}"),
                exit_code: 1,
            }
        }
    };

    let agent_path = scratch.path().join(AGENT_FILENAME);
    let harness_path = scratch.path().join(HARNESS_FILENAME);
    if let Err(e) = tokio::fs::write(&agent_path, &request.agent_code).await {
        return RunResponse {
            ok: false,
            stdout: String::new(),
            stderr: format!("Failed to write agent code: {e}"),
            exit_code: 1,
        };
    }
    if let Err(e) = tokio::fs::write(&harness_path, HARNESS_SOURCE).await {
        return RunResponse {
            ok: false,
            stdout: String::new(),
            stderr: format!("Failed to write harness: {e}"),
            exit_code: 1,
        };
    }

    let payload = serde_json::json!({
        "prompt": request.prompt,
        "tools": request.tools.clone().unwrap_or_default(),
    })
    .to_string();

    tracing::debug!(%run_id, scratch = %scratch.path().display(), "launching agent run");

    let mut child = match Command::new(&options.python_bin)
        .arg(&harness_path)
        .current_dir(scratch.path())
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(c) => c,
        Err(e) => {
            let stderr = if e.kind() == std::io::ErrorKind::NotFound {
                format!(
                    "{} not found. Install a Python interpreter or set AGENT_PYTHON_BIN.",
                    options.python_bin
                )
            } else {
                format!("Runner failed: {e}")
            };
            return RunResponse {
                ok: false,
                stdout: String::new(),
                stderr,
                exit_code: 1,
            };
        }
    };

    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(payload.as_bytes()).await;
        let _ = stdin.shutdown().await;
    }

    // Capture output in the background so partial stdout survives a kill.
    let stdout_pipe = child.stdout.take().expect("stdout was piped");
    let stderr_pipe = child.stderr.take().expect("stderr was piped");
    let stdout_handle = tokio::spawn(read_to_end(stdout_pipe));
    let stderr_handle = tokio::spawn(read_to_end(stderr_pipe));

    match tokio::time::timeout(options.timeout, child.wait()).await {
        Ok(Ok(status)) => {
            let stdout = stdout_handle.await.unwrap_or_default();
            let stderr = stderr_handle.await.unwrap_or_default();
            RunResponse {
                ok: status.success(),
                stdout,
                stderr,
                exit_code: status.code().unwrap_or(1),
            }
        }
        Ok(Err(e)) => {
            let stdout = stdout_handle.await.unwrap_or_default();
            RunResponse {
                ok: false,
                stdout,
                stderr: format!("Runner failed: {e}"),
                exit_code: 1,
            }
        }
        Err(_) => {
            tracing::warn!(%run_id, "agent run timed out, killing process");
            let _ = child.kill().await;
            let _ = child.wait().await;
            // Pipes close once the process dies, so the readers finish.
            let stdout = stdout_handle.await.unwrap_or_default();
            let _ = stderr_handle.await;
            RunResponse {
                ok: false,
                stdout,
                stderr: format!(
                    "Execution timed out after {} seconds.",
                    options.timeout.as_secs()
                ),
                exit_code: TIMEOUT_EXIT_CODE,
            }
        }
    }
    // `scratch` drops here, removing the directory on every path.
}

/// Drain a child pipe to a lossily-decoded string. Undecodable bytes are
/// replaced rather than failing the capture.
async fn read_to_end(mut pipe: impl tokio::io::AsyncRead + Unpin) -> String {
    use tokio::io::AsyncReadExt;
    let mut buf = Vec::new();
    let _ = pipe.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFORMING_AGENT: &str = r#"class Agent:
    def __init__(self, tools):
        self.tools = tools

    def run(self, task: str) -> str:
        return "done"
"#;

    fn request(agent_code: &str, prompt: &str) -> RunRequest {
        RunRequest {
            agent_code: agent_code.to_string(),
            prompt: prompt.to_string(),
            tools: None,
        }
    }

    /// Python-dependent tests bail out quietly on hosts without python3.
    fn python_available(options: &RunnerOptions) -> bool {
        std::process::Command::new(&options.python_bin)
            .arg("--version")
            .output()
            .is_ok()
    }

    #[test]
    fn test_size_boundary() {
        let padding = "# ".to_string();
        let base = format!("{CONFORMING_AGENT}{padding}");
        let fill = MAX_AGENT_CODE_CHARS - base.chars().count();

        let at_limit = format!("{base}{}", "x".repeat(fill));
        assert_eq!(at_limit.chars().count(), MAX_AGENT_CODE_CHARS);
        assert!(validate(&at_limit).is_none());

        let over_limit = format!("{base}{}", "x".repeat(fill + 1));
        let failure = validate(&over_limit).expect("over-limit code rejected");
        assert!(!failure.ok);
        assert_eq!(failure.exit_code, 1);
        assert_eq!(
            failure.stderr,
            "Agent code too large. Limit is 120k characters."
        );
    }

    #[tokio::test]
    async fn test_missing_agent_class() {
        let response = run_agent_code(
            &request("def run(self, task: str) -> str:\n    return ''", "hello"),
            &RunnerOptions::default(),
        )
        .await;

        assert!(!response.ok);
        assert_eq!(response.exit_code, 1);
        assert_eq!(response.stdout, "");
        assert_eq!(
            response.stderr,
            "Agent code must define class Agent for the runner."
        );
    }

    #[tokio::test]
    async fn test_missing_run_method() {
        let response = run_agent_code(
            &request("class Agent:\n    pass", "hello"),
            &RunnerOptions::default(),
        )
        .await;

        assert!(!response.ok);
        assert_eq!(
            response.stderr,
            "Agent code must define run(self, task: str) -> str for the runner."
        );
    }

    #[tokio::test]
    async fn test_conforming_agent_runs() {
        let options = RunnerOptions::default();
        if !python_available(&options) {
            eprintln!("python3 not available, skipping");
            return;
        }

        let response = run_agent_code(&request(CONFORMING_AGENT, "hello"), &options).await;

        assert_eq!(
            response,
            RunResponse {
                ok: true,
                stdout: "done".into(),
                stderr: String::new(),
                exit_code: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_idempotent_runs() {
        let options = RunnerOptions::default();
        if !python_available(&options) {
            eprintln!("python3 not available, skipping");
            return;
        }

        let req = request(CONFORMING_AGENT, "hello");
        let first = run_agent_code(&req, &options).await;
        let second = run_agent_code(&req, &options).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_prompt_and_tools_reach_the_agent() {
        let options = RunnerOptions::default();
        if !python_available(&options) {
            eprintln!("python3 not available, skipping");
            return;
        }

        let agent = r#"class Agent:
    def __init__(self, tools):
        self.tools = tools

    def run(self, task: str) -> str:
        return task + "|" + ",".join(self.tools)
"#;
        let req = RunRequest {
            agent_code: agent.to_string(),
            prompt: "summarize".to_string(),
            tools: Some(vec!["search".to_string(), "codegen".to_string()]),
        };

        let response = run_agent_code(&req, &options).await;
        assert!(response.ok, "stderr: {}", response.stderr);
        assert_eq!(response.stdout, "summarize|search,codegen");
    }

    #[tokio::test]
    async fn test_default_tools_when_absent() {
        let options = RunnerOptions::default();
        if !python_available(&options) {
            eprintln!("python3 not available, skipping");
            return;
        }

        let agent = r#"class Agent:
    def __init__(self, tools):
        self.tools = tools

    def run(self, task: str) -> str:
        return ",".join(self.tools)
"#;
        let response = run_agent_code(&request(agent, "x"), &options).await;
        assert!(response.ok, "stderr: {}", response.stderr);
        assert_eq!(response.stdout, "search,codegen,diagram");
    }

    #[tokio::test]
    async fn test_crashing_agent_reports_failure() {
        let options = RunnerOptions::default();
        if !python_available(&options) {
            eprintln!("python3 not available, skipping");
            return;
        }

        let agent = r#"class Agent:
    def __init__(self, tools):
        raise RuntimeError("boom")

    def run(self, task: str) -> str:
        return ""
"#;
        let response = run_agent_code(&request(agent, "x"), &options).await;
        assert!(!response.ok);
        assert_ne!(response.exit_code, 0);
        assert!(response.stderr.contains("boom"));
    }

    #[tokio::test]
    async fn test_timeout_kills_and_keeps_partial_stdout() {
        let options = RunnerOptions {
            timeout: Duration::from_secs(2),
            ..RunnerOptions::default()
        };
        if !python_available(&options) {
            eprintln!("python3 not available, skipping");
            return;
        }

        let agent = r#"import sys
import time

class Agent:
    def __init__(self, tools):
        self.tools = tools

    def run(self, task: str) -> str:
        sys.stdout.write("partial")
        sys.stdout.flush()
        time.sleep(600)
        return "never"
"#;
        let response = run_agent_code(&request(agent, "x"), &options).await;

        assert!(!response.ok);
        assert_eq!(response.exit_code, 124);
        assert_eq!(response.stderr, "Execution timed out after 2 seconds.");
        assert_eq!(response.stdout, "partial");
    }

    #[tokio::test]
    async fn test_interpreter_missing_is_a_launch_failure() {
        let options = RunnerOptions {
            python_bin: "definitely-not-a-python-interpreter".to_string(),
            ..RunnerOptions::default()
        };

        let response = run_agent_code(&request(CONFORMING_AGENT, "x"), &options).await;

        assert!(!response.ok);
        assert_eq!(response.exit_code, 1);
        assert!(response.stderr.contains("not found"));
    }
}
