// Python worker process management
// Keeps one geo worker process alive, writes one JSON request per line to its
// stdin and reads line-delimited JSON messages back from stdout

use crate::error::GatewayError;
use crate::models::AnalysisSettings;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

const GEO_WORKER_SCRIPT: &str = "geo_ops.py";

/// Stderr lines kept for error reports when the worker dies
const STDERR_TAIL_LINES: usize = 20;

/// How long a dead worker gets to exit and flush stderr
const EXIT_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    Result {
        data: serde_json::Value,
    },
    Error {
        message: String,
    },
    Log {
        level: String,
        message: String,
    },
}

pub fn get_python_path() -> String {
    #[cfg(target_os = "windows")]
    let paths = ["python", "python3", "py"];

    #[cfg(not(target_os = "windows"))]
    let paths = ["python3", "python"];

    for path in paths {
        let mut cmd = std::process::Command::new(path);
        cmd.arg("--version");

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        if cmd.output().is_ok() {
            return path.to_string();
        }
    }

    "python".to_string()
}

/// Get the path to the python_workers directory
pub fn get_workers_dir() -> PathBuf {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let workers_dir = exe_dir.join("python_workers");
            if workers_dir.exists() {
                return workers_dir;
            }

            let mut current = exe_dir;
            for _ in 0..3 {
                if let Some(parent) = current.parent() {
                    let dev_workers_dir = parent.join("python_workers");
                    if dev_workers_dir.exists() {
                        debug!("Found python_workers at: {:?}", dev_workers_dir);
                        return dev_workers_dir;
                    }
                    current = parent;
                }
            }
        }
    }

    let cwd_workers = std::env::current_dir()
        .unwrap_or_default()
        .join("python_workers");

    debug!("Fallback to current dir python_workers: {:?}", cwd_workers);
    cwd_workers
}

/// Appends a stderr line, dropping the oldest once the tail is full
fn push_tail(tail: &mut VecDeque<String>, line: String) {
    if tail.len() == STDERR_TAIL_LINES {
        tail.pop_front();
    }
    tail.push_back(line);
}

/// Error text for a worker that stopped without answering
fn exit_message(stderr_tail: &[String], exit_code: i32) -> String {
    let tail: Vec<&str> = stderr_tail
        .iter()
        .map(|line| line.trim_end())
        .filter(|line| !line.is_empty())
        .collect();

    if tail.is_empty() {
        format!("worker exited with code: {}", exit_code)
    } else {
        format!("worker exited with code {}: {}", exit_code, tail.join("\n"))
    }
}

fn drain_stderr(stderr: ChildStderr) -> JoinHandle<Vec<String>> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("[geo worker stderr] {}", line);
            push_tail(&mut tail, line);
        }
        tail.into()
    })
}

enum Reply {
    Result(serde_json::Value),
    Error(String),
    Closed,
}

/// A running worker process and its pipes
struct WorkerSession {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    stderr: JoinHandle<Vec<String>>,
    /// Set while a request is unanswered. A session left in flight by a
    /// cancelled call is out of step with its stdout and gets replaced.
    in_flight: bool,
}

impl WorkerSession {
    async fn exchange(&mut self, request: &str) -> std::io::Result<Reply> {
        self.in_flight = true;
        self.stdin.write_all(request.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;

        while let Some(line) = self.stdout.next_line().await? {
            match serde_json::from_str::<WorkerMessage>(&line) {
                Ok(WorkerMessage::Result { data }) => {
                    self.in_flight = false;
                    return Ok(Reply::Result(data));
                }
                Ok(WorkerMessage::Error { message }) => {
                    self.in_flight = false;
                    return Ok(Reply::Error(message));
                }
                Ok(WorkerMessage::Log { level, message }) => {
                    debug!("[geo worker {}] {}", level, message);
                }
                Err(_) => debug!("[geo worker] {}", line),
            }
        }
        Ok(Reply::Closed)
    }

    /// Closes stdin, reaps the process and returns why it stopped
    async fn finish(self) -> String {
        let WorkerSession {
            mut child,
            stdin,
            stderr,
            ..
        } = self;
        drop(stdin);

        let exit_code = match timeout(EXIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => status.code().unwrap_or(-1),
            Ok(Err(e)) => {
                warn!("Failed to wait for geo worker: {}", e);
                -1
            }
            Err(_) => {
                warn!("Geo worker did not exit, killing it");
                if let Err(e) = child.start_kill() {
                    warn!("Failed to kill geo worker: {}", e);
                }
                -1
            }
        };

        let tail = match timeout(EXIT_GRACE, stderr).await {
            Ok(Ok(tail)) => tail,
            _ => Vec::new(),
        };
        exit_message(&tail, exit_code)
    }
}

/// Handle to the geo worker. Clones share one process; requests are
/// answered one at a time in the order they take the lock.
#[derive(Clone)]
pub struct PythonWorker {
    python_path: String,
    script_path: PathBuf,
    session: Arc<Mutex<Option<WorkerSession>>>,
}

impl fmt::Debug for PythonWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PythonWorker")
            .field("python_path", &self.python_path)
            .field("script_path", &self.script_path)
            .finish()
    }
}

impl PythonWorker {
    pub fn new(python_path: impl Into<String>, script_path: impl Into<PathBuf>) -> Self {
        Self {
            python_path: python_path.into(),
            script_path: script_path.into(),
            session: Arc::new(Mutex::new(None)),
        }
    }

    /// Resolves the interpreter and geo worker script from settings, probing
    /// the usual locations for whatever is not configured.
    pub fn from_settings(settings: &AnalysisSettings) -> Self {
        let python_path = settings.python_path.clone().unwrap_or_else(get_python_path);
        let workers_dir = settings.workers_dir.clone().unwrap_or_else(get_workers_dir);
        Self::new(python_path, workers_dir.join(GEO_WORKER_SCRIPT))
    }

    fn spawn(&self) -> Result<WorkerSession, GatewayError> {
        let mut cmd = Command::new(&self.python_path);
        cmd.arg(&self.script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let mut child = cmd.spawn().map_err(|source| GatewayError::Spawn {
            program: self.python_path.clone(),
            source,
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| GatewayError::Protocol("Failed to capture stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GatewayError::Protocol("Failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| GatewayError::Protocol("Failed to capture stderr".to_string()))?;

        info!("Started geo worker {:?} (pid {:?})", self.script_path, child.id());

        Ok(WorkerSession {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            stderr: drain_stderr(stderr),
            in_flight: false,
        })
    }

    /// Sends one operation to the worker and returns its `result` payload.
    /// The process is started on first use and again after it dies.
    pub async fn call(&self, op: &str, input: serde_json::Value) -> Result<serde_json::Value, GatewayError> {
        if !self.script_path.exists() {
            return Err(GatewayError::WorkerMissing(self.script_path.clone()));
        }

        let request = serde_json::to_string(&serde_json::json!({ "op": op, "args": input }))
            .map_err(|e| GatewayError::Protocol(format!("Failed to serialize input: {}", e)))?;

        let mut guard = self.session.lock().await;
        if guard.as_ref().is_some_and(|session| session.in_flight) {
            warn!("Discarding geo worker left mid-request");
            *guard = None;
        }
        if guard.is_none() {
            *guard = Some(self.spawn()?);
        }
        let Some(session) = guard.as_mut() else {
            return Err(GatewayError::Protocol("Geo worker session unavailable".to_string()));
        };

        debug!("Python worker op {}", op);

        let reply = match session.exchange(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                debug!("Geo worker pipe failed during {}: {}", op, e);
                Reply::Closed
            }
        };

        match reply {
            Reply::Result(data) => Ok(data),
            Reply::Error(message) => Err(GatewayError::tool(op, message)),
            Reply::Closed => {
                let message = match guard.take() {
                    Some(session) => session.finish().await,
                    None => "worker exited".to_string(),
                };
                warn!("Geo worker stopped during {}: {}", op, message);
                Err(GatewayError::tool(op, message))
            }
        }
    }
}
