//! Lifecycle of the ZAP engine process for one run.
//!
//! The engine is either spawned from its launcher script or reached on an
//! instance that is already running. A spawned engine's stdout and stderr
//! are drained by background tasks for as long as the process lives, since
//! a child blocked on a full pipe stops answering the control API.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

use crate::engine::ZapApi;
use crate::errors::ScanError;
use crate::services::naming;

/// How the engine is brought up, resolved once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchMode {
    /// Start the engine from its launcher executable.
    Spawn { program: PathBuf },
    /// Use an engine that is already listening, optionally on a fresh session.
    Attach { new_session: bool },
}

/// A running engine child process.
#[derive(Debug)]
pub struct EngineProcess {
    child: Child,
    program: PathBuf,
}

impl EngineProcess {
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Wait for the engine to exit.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Drop the handle once cleanup is done. The process is not killed; it
    /// exits on its own after a shutdown request, or keeps running for a
    /// later run when shutdown is disabled.
    pub fn release(self) {
        tracing::debug!(
            pid = ?self.child.id(),
            program = %self.program.display(),
            "Releasing ZAP process handle"
        );
    }
}

/// Engine acquired for one run. Holds the child process when we spawned it.
#[derive(Debug)]
pub struct EngineSession {
    pub process: Option<EngineProcess>,
    /// Session file opened on an attached engine.
    pub session_path: Option<PathBuf>,
}

impl EngineSession {
    pub fn release(self) {
        if let Some(process) = self.process {
            process.release();
        }
    }
}

/// Spawn the engine with its parent directory as working directory.
///
/// Output draining starts immediately; must be called inside a tokio runtime.
pub fn launch(program: &Path) -> Result<EngineProcess, ScanError> {
    let working_dir = match program.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tracing::info!(program = %program.display(), "Start ZAProxy");
    tracing::info!(working_dir = %working_dir.display(), "Using working directory");

    let mut child = Command::new(program)
        .current_dir(&working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ScanError::Launch {
            program: program.to_path_buf(),
            source,
        })?;

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(drain_output("stdout", stdout));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(drain_output("stderr", stderr));
    }

    tracing::info!(pid = ?child.id(), "ZAProxy started");
    Ok(EngineProcess {
        child,
        program: program.to_path_buf(),
    })
}

/// Open a new session on an engine that is already running.
///
/// Returns the temporary path the engine stores the session under.
pub async fn attach<C>(client: &C) -> Result<PathBuf, ScanError>
where
    C: ZapApi + ?Sized,
{
    let path = std::env::temp_dir().join(naming::generate_artifact_stem(Some("ZAP"), None));
    tracing::info!(path = %path.display(), "Create Session with temporary file");
    client.new_session(&path.to_string_lossy()).await?;
    Ok(path)
}

/// Bring the engine up according to `mode` and wait for it to settle.
pub async fn start_engine<C>(
    mode: &LaunchMode,
    client: &C,
    settle: std::time::Duration,
) -> Result<EngineSession, ScanError>
where
    C: ZapApi + ?Sized,
{
    let session = match mode {
        LaunchMode::Spawn { program } => EngineSession {
            process: Some(launch(program)?),
            session_path: None,
        },
        LaunchMode::Attach { new_session: true } => EngineSession {
            process: None,
            session_path: Some(attach(client).await?),
        },
        LaunchMode::Attach { new_session: false } => {
            tracing::info!("Using running ZAProxy instance");
            return Ok(EngineSession {
                process: None,
                session_path: None,
            });
        }
    };

    if !settle.is_zero() {
        tracing::debug!(settle_ms = settle.as_millis() as u64, "Waiting for ZAProxy to settle");
        tokio::time::sleep(settle).await;
    }
    Ok(session)
}

/// Forward every line of an engine output stream to the log until it closes.
///
/// Lines are decoded lossily. The stream is read to its end even after a
/// read error, so the engine never writes into a closed pipe.
async fn drain_output<R>(stream: &'static str, reader: R) -> usize
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut count = 0usize;
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                count += 1;
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(|c| c == '\n' || c == '\r');
                tracing::info!(target: "zapgate::engine_output", stream, "{line}");
            }
            Err(e) => {
                tracing::warn!(stream, error = %e, "Failed to read ZAP output, discarding the rest");
                if let Err(e) = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await {
                    tracing::warn!(stream, error = %e, "Stopped reading ZAP output");
                }
                break;
            }
        }
    }
    tracing::debug!(stream, lines = count, "ZAP output stream closed");
    count
}
