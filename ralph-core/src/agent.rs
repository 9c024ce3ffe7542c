//! Subprocess AI agent invocation: spawn, stream output, extract a JSON
//! payload, and retry across a fallback chain with a saturating index and
//! an auth-failure circuit breaker.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::Sender;

use crate::display::ProgressEvent;
use crate::error::{EngineError, Result};
use crate::validator;
use ralph_kernel::component::AgentRef;
use ralph_kernel::schema_catalog::SchemaCatalog;

/// Corrective re-prompts issued on a schema mismatch before giving up on an
/// agent and falling through to the next retry/fallback (spec §4.4 step 4,
/// §7 `SchemaMismatch` strategy (d)).
const MAX_CORRECTIVE_REPROMPTS: u32 = 2;

#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub prompt: String,
    pub cwd: PathBuf,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub payload: Value,
    pub raw_stdout: String,
    pub duration_ms: u128,
}

/// One configured agent binary, invoked as `{command} {prompt-on-stdin}`.
#[derive(Debug, Clone)]
pub struct AgentBinary {
    pub id: String,
    pub command: Vec<String>,
}

/// Opens after `threshold` consecutive auth failures from the same agent
/// id and makes every further invocation fail fast until reset.
#[derive(Clone)]
pub struct AuthCircuitBreaker {
    threshold: u32,
    counts: Arc<Mutex<HashMap<String, u32>>>,
}

impl AuthCircuitBreaker {
    pub fn new(threshold: u32) -> Self {
        AuthCircuitBreaker {
            threshold,
            counts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn is_open(&self, agent_id: &str) -> bool {
        self.counts.lock().get(agent_id).copied().unwrap_or(0) >= self.threshold
    }

    pub fn record_failure(&self, agent_id: &str) {
        *self.counts.lock().entry(agent_id.to_string()).or_insert(0) += 1;
    }

    pub fn record_success(&self, agent_id: &str) {
        self.counts.lock().remove(agent_id);
    }
}

pub struct AgentPool {
    binaries: HashMap<String, AgentBinary>,
    breaker: AuthCircuitBreaker,
}

impl AgentPool {
    pub fn new(binaries: Vec<AgentBinary>) -> Self {
        AgentPool {
            binaries: binaries.into_iter().map(|b| (b.id.clone(), b)).collect(),
            // One auth failure disables the agent for the rest of the run
            // (spec §4.4/§7) — no wait-and-see, straight to fallback.
            breaker: AuthCircuitBreaker::new(1),
        }
    }

    /// Runs `task_ref` against `request`, retrying up to `retries` times
    /// per agent and walking the fallback chain on exhaustion. The chain
    /// index saturates at the last entry rather than erroring once
    /// `attempt_index` exceeds the chain length. Each attempt validates its
    /// payload against `schema_key` and, on a mismatch, re-prompts the same
    /// agent with the validation error appended (up to
    /// [`MAX_CORRECTIVE_REPROMPTS`] times) before moving on to the next
    /// retry or fallback agent.
    pub async fn invoke(
        &self,
        task_ref: &AgentRef,
        request: AgentRequest,
        retries: u32,
        catalog: &SchemaCatalog,
        schema_key: &str,
        progress: Option<Sender<ProgressEvent>>,
    ) -> Result<AgentResponse> {
        let mut last_err = None;

        for attempt in 0..=retries {
            let agent_id = task_ref.for_attempt(attempt as usize);
            if self.breaker.is_open(agent_id) {
                last_err = Some(EngineError::AgentAuthFailure {
                    agent_id: agent_id.to_string(),
                });
                continue;
            }

            let binary = self.binaries.get(agent_id).ok_or_else(|| EngineError::AgentInvocation {
                agent_id: agent_id.to_string(),
                detail: "no binary configured for this agent id".into(),
            })?;

            match invoke_with_corrective_reprompts(binary, &request, catalog, schema_key, progress.clone()).await {
                Ok(response) => {
                    self.breaker.record_success(agent_id);
                    return Ok(response);
                }
                Err(err) => {
                    if is_auth_failure(&err) {
                        self.breaker.record_failure(agent_id);
                    }
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or(EngineError::AgentInvocation {
            agent_id: "unknown".into(),
            detail: "exhausted retries with no recorded error".into(),
        }))
    }
}

/// Invokes `binary` once, and on a schema mismatch re-prompts the same
/// binary with the validation error folded into the prompt, up to
/// [`MAX_CORRECTIVE_REPROMPTS`] additional attempts. Non-schema failures
/// (spawn, timeout, auth) are not retried here — they bubble straight back
/// to the caller's fallback/retry loop.
async fn invoke_with_corrective_reprompts(
    binary: &AgentBinary,
    request: &AgentRequest,
    catalog: &SchemaCatalog,
    schema_key: &str,
    progress: Option<Sender<ProgressEvent>>,
) -> Result<AgentResponse> {
    let mut current_request = request.clone();
    let mut last_err = None;

    for correction in 0..=MAX_CORRECTIVE_REPROMPTS {
        let response = run_once(binary, &current_request, progress.clone()).await?;
        match validator::validate(catalog, schema_key, &response.payload) {
            Ok(()) => return Ok(response),
            Err(err) => {
                if correction < MAX_CORRECTIVE_REPROMPTS {
                    current_request.prompt = format!(
                        "{}\n\nYour previous response did not match the `{schema_key}` schema: {err}\n\nRespond again with the schema in strict form, valid JSON only.",
                        request.prompt
                    );
                }
                last_err = Some(err);
            }
        }
    }

    Err(last_err.unwrap_or(EngineError::AgentInvocation {
        agent_id: binary.id.clone(),
        detail: "exhausted corrective re-prompts with no recorded error".into(),
    }))
}

fn is_auth_failure(err: &EngineError) -> bool {
    matches!(err, EngineError::AgentAuthFailure { .. })
        || matches!(err, EngineError::AgentInvocation { detail, .. }
            if detail.to_ascii_lowercase().contains("unauthorized")
                || detail.to_ascii_lowercase().contains("authentication"))
}

async fn run_once(
    binary: &AgentBinary,
    request: &AgentRequest,
    progress: Option<Sender<ProgressEvent>>,
) -> Result<AgentResponse> {
    let started = std::time::Instant::now();
    let (program, args) = binary
        .command
        .split_first()
        .ok_or_else(|| EngineError::AgentInvocation {
            agent_id: binary.id.clone(),
            detail: "empty command".into(),
        })?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(&request.cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child: Child = cmd.spawn().map_err(|e| EngineError::AgentInvocation {
        agent_id: binary.id.clone(),
        detail: format!("spawn failed: {e}"),
    })?;

    {
        use tokio::io::AsyncWriteExt;
        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(request.prompt.as_bytes()).await;
        }
    }

    let stdout = child.stdout.take().expect("piped stdout");
    let stderr = child.stderr.take().expect("piped stderr");
    let agent_id = binary.id.clone();

    let stdout_task = tokio::spawn(collect_lines(stdout, agent_id.clone(), progress.clone()));
    let stderr_task = tokio::spawn(collect_lines(stderr, agent_id.clone(), progress));

    let wait = child.wait();
    let status = match request.timeout {
        Some(timeout) => match tokio::time::timeout(timeout, wait).await {
            Ok(status) => status,
            Err(_) => {
                terminate_gracefully(&mut child).await;
                return Err(EngineError::AgentInvocation {
                    agent_id: binary.id.clone(),
                    detail: format!("timed out after {}s", timeout.as_secs()),
                });
            }
        },
        None => wait.await,
    }
    .map_err(|e| EngineError::AgentInvocation {
        agent_id: binary.id.clone(),
        detail: format!("wait failed: {e}"),
    })?;

    let stdout_lines = stdout_task.await.unwrap_or_default();
    let stderr_lines = stderr_task.await.unwrap_or_default();
    let raw_stdout = stdout_lines.join("\n");

    if !status.success() {
        let detail = stderr_lines.join("; ");
        if detail.to_ascii_lowercase().contains("unauthorized")
            || detail.to_ascii_lowercase().contains("please login")
        {
            return Err(EngineError::AgentAuthFailure {
                agent_id: binary.id.clone(),
            });
        }
        return Err(EngineError::AgentInvocation {
            agent_id: binary.id.clone(),
            detail: format!("exited with {:?}: {}", status.code(), detail),
        });
    }

    let payload = extract_json(&raw_stdout).ok_or_else(|| EngineError::NoJsonExtracted {
        agent_id: binary.id.clone(),
    })?;

    Ok(AgentResponse {
        payload,
        raw_stdout,
        duration_ms: started.elapsed().as_millis(),
    })
}

async fn collect_lines(
    reader: impl tokio::io::AsyncRead + Unpin,
    source: String,
    progress: Option<Sender<ProgressEvent>>,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut stream = BufReader::new(reader).lines();
    while let Ok(Some(line)) = stream.next_line().await {
        if let Some(tx) = &progress {
            let _ = tx
                .send(ProgressEvent::AgentOutput {
                    source: source.clone(),
                    line: line.clone(),
                })
                .await;
        }
        lines.push(line);
    }
    lines
}

async fn terminate_gracefully(child: &mut Child) {
    if let Some(pid) = child.id() {
        #[cfg(unix)]
        unsafe {
            libc_kill(pid as i32, 15);
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
    let _ = child.start_kill();
    let _ = child.wait().await;
}

#[cfg(unix)]
unsafe fn libc_kill(pid: i32, sig: i32) {
    unsafe extern "C" {
        fn kill(pid: i32, sig: i32) -> i32;
    }
    unsafe {
        kill(pid, sig);
    }
}

/// Ordered JSON-extraction strategies: a fenced ```json block,
/// then the last top-level `{...}` object, then the whole trimmed output.
fn extract_json(raw: &str) -> Option<Value> {
    if let Some(fenced) = extract_fenced_json(raw)
        && let Ok(value) = serde_json::from_str(&fenced)
    {
        return Some(value);
    }
    if let Some(braced) = extract_last_braced_object(raw)
        && let Ok(value) = serde_json::from_str(&braced)
    {
        return Some(value);
    }
    serde_json::from_str(raw.trim()).ok()
}

fn extract_fenced_json(raw: &str) -> Option<String> {
    let start_marker = "```json";
    let start = raw.find(start_marker)? + start_marker.len();
    let rest = &raw[start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim().to_string())
}

fn extract_last_braced_object(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let mut depth = 0i32;
    let mut start = None;
    let mut best: Option<(usize, usize)> = None;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            b'}' => {
                depth -= 1;
                if depth == 0 && let Some(s) = start {
                    best = Some((s, i + 1));
                }
            }
            _ => {}
        }
    }
    best.map(|(s, e)| raw[s..e].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_json_block_first() {
        let raw = "here's the result\n```json\n{\"ok\": true}\n```\ntrailing text";
        assert_eq!(extract_json(raw), Some(serde_json::json!({"ok": true})));
    }

    #[test]
    fn falls_back_to_last_braced_object() {
        let raw = "garbage {not json} more talk {\"ok\": true}";
        assert_eq!(extract_json(raw), Some(serde_json::json!({"ok": true})));
    }

    #[test]
    fn circuit_breaker_opens_after_threshold() {
        let breaker = AuthCircuitBreaker::new(2);
        assert!(!breaker.is_open("a1"));
        breaker.record_failure("a1");
        assert!(!breaker.is_open("a1"));
        breaker.record_failure("a1");
        assert!(breaker.is_open("a1"));
        breaker.record_success("a1");
        assert!(!breaker.is_open("a1"));
    }
}
