use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How long to wait for pipe readers once the child has exited or been killed.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// A fully specified external tool run. Arguments are passed as discrete
/// tokens; nothing goes through a shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub target: String,
    #[serde(rename = "timeout_secs", serialize_with = "as_secs")]
    pub timeout: Duration,
}

fn as_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl ScanInvocation {
    pub fn new<I, A>(program: &str, args: I, target: &str, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            target: target.to_string(),
            timeout,
        }
    }

    /// Display form for logs only; never executed.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitClass {
    Success,
    NonZeroExit,
    NotFound,
    TimedOut,
    Cancelled,
    Unexpected,
}

impl ExitClass {
    /// Whether the captured output is worth parsing.
    pub fn has_output(self) -> bool {
        matches!(self, ExitClass::Success | ExitClass::NonZeroExit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanOutcome {
    pub class: ExitClass,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Launch or wait failure text for `Unexpected`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub pid: Option<u32>,
    pub elapsed_ms: u64,
}

impl ScanOutcome {
    fn without_output(class: ExitClass, error: Option<String>, started: Instant) -> Self {
        Self {
            class,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            error,
            pid: None,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }
}

/// Runs one invocation to completion, timeout, or cancellation.
pub async fn invoke(invocation: &ScanInvocation) -> ScanOutcome {
    invoke_until(invocation, &CancellationToken::new()).await
}

/// Like [`invoke`], but also stops the child when `cancel` fires.
pub async fn invoke_until(invocation: &ScanInvocation, cancel: &CancellationToken) -> ScanOutcome {
    let started = Instant::now();
    debug!(command = %invocation.command_line(), "spawning scanner");

    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // own process group, so a timeout can take down everything the tool started
    #[cfg(unix)]
    command.process_group(0);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(program = %invocation.program, "scanner executable not found");
            return ScanOutcome::without_output(ExitClass::NotFound, None, started);
        }
        Err(e) => {
            warn!(program = %invocation.program, error = %e, "scanner failed to start");
            return ScanOutcome::without_output(ExitClass::Unexpected, Some(e.to_string()), started);
        }
    };

    let pid = child.id();
    let stdout = child.stdout.take().map(spawn_drain);
    let stderr = child.stderr.take().map(spawn_drain);

    // None means cancelled
    let waited = tokio::select! {
        w = tokio::time::timeout(invocation.timeout, child.wait()) => Some(w),
        _ = cancel.cancelled() => None,
    };

    let (class, exit_code, error) = match waited {
        Some(Ok(Ok(status))) if status.success() => (ExitClass::Success, status.code(), None),
        Some(Ok(Ok(status))) => (ExitClass::NonZeroExit, status.code(), None),
        Some(Ok(Err(e))) => {
            terminate(&mut child, pid).await;
            (ExitClass::Unexpected, None, Some(e.to_string()))
        }
        Some(Err(_)) => {
            warn!(command = %invocation.command_line(), "scanner timed out, killing");
            terminate(&mut child, pid).await;
            (ExitClass::TimedOut, None, None)
        }
        None => {
            debug!(command = %invocation.command_line(), "scanner cancelled, killing");
            terminate(&mut child, pid).await;
            (ExitClass::Cancelled, None, None)
        }
    };

    let stdout = collect(stdout).await;
    let stderr = collect(stderr).await;
    if !stderr.trim().is_empty() {
        debug!(program = %invocation.program, stderr = %stderr.trim(), "scanner stderr");
    }

    ScanOutcome {
        class,
        exit_code,
        stdout,
        stderr,
        error,
        pid,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}

async fn terminate(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pgid) = pid {
        kill_group(pgid).await;
    }
    #[cfg(not(unix))]
    let _ = pid;

    // kill() also reaps the direct child
    if let Err(e) = child.kill().await {
        warn!(error = %e, "failed to kill scanner process");
    }
}

/// SIGKILL to every process in the group led by `pgid`.
#[cfg(unix)]
async fn kill_group(pgid: u32) {
    let group = format!("-{}", pgid);
    let status = Command::new("kill")
        .args(["-KILL", "--", group.as_str()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match status {
        Ok(s) if s.success() => debug!(pgid, "killed scanner process group"),
        Ok(s) => debug!(pgid, code = ?s.code(), "process group already gone"),
        Err(e) => warn!(pgid, error = %e, "could not signal scanner process group"),
    }
}

/// Bytes read from one pipe so far, plus the task still reading it.
struct Drain {
    buf: Arc<Mutex<Vec<u8>>>,
    handle: JoinHandle<()>,
}

fn spawn_drain<R>(mut pipe: R) -> Drain
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let buf = Arc::new(Mutex::new(Vec::new()));
    let sink = buf.clone();
    let handle = tokio::spawn(async move {
        let mut chunk = [0u8; 4096];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => sink.lock().extend_from_slice(&chunk[..n]),
                // a read error keeps whatever arrived before it
                Err(_) => break,
            }
        }
    });
    Drain { buf, handle }
}

async fn collect(drain: Option<Drain>) -> String {
    let Some(mut drain) = drain else {
        return String::new();
    };
    if tokio::time::timeout(DRAIN_GRACE, &mut drain.handle).await.is_err() {
        // something outside the group still holds the pipe open
        drain.handle.abort();
    }
    let bytes = std::mem::take(&mut *drain.buf.lock());
    String::from_utf8_lossy(&bytes).into_owned()
}
