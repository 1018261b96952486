//! Supervision of the external converter process.
//!
//! [`ConverterSupervisor`] spawns the configured converter against a staged
//! input, captures its output channels into bounded buffers, enforces a
//! wall-clock deadline with graceful-then-forceful kill escalation, and
//! classifies the exit into an [`Outcome`].

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::error::ConvertError;
use super::job::Outcome;
use super::staging::StagedPaths;

/// Default grace period between the graceful and the forceful kill.
const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// Cap on captured bytes per output channel. Diagnostics only; a converter
/// that floods its pipes must not balloon memory.
const MAX_CAPTURE: usize = 64 * 1024;

/// Upper bound on waiting for capture tasks after the process exited.
/// Grandchildren can inherit the pipes and keep them open past the kill;
/// diagnostics are not worth waiting on.
const CAPTURE_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Converter invocation settings.
#[derive(Debug, Clone)]
pub struct ConverterSettings {
    /// Converter executable.
    pub program: PathBuf,
    /// Argument template; `{input}` and `{outdir}` are substituted per job.
    pub args: Vec<String>,
    /// File extension the converter is expected to produce.
    pub output_extension: String,
    /// Grace period between the graceful and the forceful kill.
    pub kill_grace: Duration,
}

impl Default for ConverterSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from("soffice"),
            args: vec![
                "--headless".to_string(),
                "--convert-to".to_string(),
                "pdf".to_string(),
                "--outdir".to_string(),
                "{outdir}".to_string(),
                "{input}".to_string(),
            ],
            output_extension: "pdf".to_string(),
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }
}

/// Kill escalation state for one supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KillState {
    Running,
    SoftKillSent,
    HardKillSent,
}

/// Runs one converter process per [`supervise`](Self::supervise) call.
pub struct ConverterSupervisor {
    settings: ConverterSettings,
}

impl ConverterSupervisor {
    pub fn new(settings: ConverterSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ConverterSettings {
        &self.settings
    }

    /// Run the converter against staged paths, enforcing `deadline`.
    ///
    /// Never returns an error: every failure mode is folded into the
    /// returned [`Outcome`]. The spawned process lives at most
    /// `deadline + kill_grace` plus kill latency.
    pub async fn supervise(&self, paths: &StagedPaths, deadline: Duration) -> Outcome {
        let started = Instant::now();
        match self.run(paths, deadline, started).await {
            Ok(outcome) => outcome,
            Err(error) => Outcome::failed(error, started.elapsed()),
        }
    }

    async fn run(
        &self,
        paths: &StagedPaths,
        deadline: Duration,
        started: Instant,
    ) -> Result<Outcome, ConvertError> {
        // The converter expects its output directory to exist.
        tokio::fs::create_dir_all(&paths.output_dir)
            .await
            .map_err(|e| {
                ConvertError::internal(format!(
                    "failed to create output directory {}: {e}",
                    paths.output_dir.display()
                ))
            })?;

        let args = self.build_args(paths);
        debug!(program = %self.settings.program.display(), ?args, "Spawning converter");

        // Arguments are passed as a vector; nothing is shell-interpreted,
        // so attacker-controlled paths or URLs cannot inject commands.
        let mut child = Command::new(&self.settings.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ConvertError::spawn(format!("{}: {e}", self.settings.program.display()))
            })?;

        let stdout_task = capture_stream(child.stdout.take());
        let stderr_task = capture_stream(child.stderr.take());

        let deadline_at = started + deadline;
        let mut kill_state = KillState::Running;

        // Natural exit and the deadline race inside select!; the losing
        // branch is dropped, so each timer fires at most once.
        let exit = loop {
            match kill_state {
                KillState::Running => {
                    tokio::select! {
                        status = child.wait() => break status,
                        _ = tokio::time::sleep_until(deadline_at) => {
                            warn!(
                                elapsed = ?started.elapsed(),
                                "Converter deadline expired, requesting graceful termination"
                            );
                            soft_kill(&child);
                            kill_state = KillState::SoftKillSent;
                        }
                    }
                }
                KillState::SoftKillSent => {
                    tokio::select! {
                        status = child.wait() => break status,
                        _ = tokio::time::sleep(self.settings.kill_grace) => {
                            warn!("Converter ignored graceful termination, sending kill");
                            if let Err(e) = child.start_kill() {
                                warn!(error = %e, "Forceful kill failed");
                            }
                            kill_state = KillState::HardKillSent;
                        }
                    }
                }
                // After the forceful kill the only remaining event is the
                // exit itself.
                KillState::HardKillSent => break child.wait().await,
            }
        };

        let status = exit
            .map_err(|e| ConvertError::internal(format!("failed waiting for converter: {e}")))?;
        let elapsed = started.elapsed();

        let stdout = drain_capture(stdout_task).await;
        let stderr = drain_capture(stderr_task).await;
        if !stdout.is_empty() {
            debug!(%stdout, "Converter stdout");
        }

        if kill_state != KillState::Running {
            return Ok(Outcome::failed(
                ConvertError::Timeout { elapsed, stderr },
                elapsed,
            ));
        }

        if !status.success() {
            return Ok(Outcome::failed(
                ConvertError::ProcessExit {
                    code: status.code(),
                    signal: exit_signal(&status),
                    stderr,
                },
                elapsed,
            ));
        }

        match self.find_artifact(&paths.output_dir).await? {
            Some(artifact_path) => {
                let artifact = tokio::fs::read(&artifact_path).await.map_err(|e| {
                    ConvertError::internal(format!(
                        "failed to read artifact {}: {e}",
                        artifact_path.display()
                    ))
                })?;
                debug!(
                    artifact = %artifact_path.display(),
                    size = artifact.len(),
                    elapsed = ?elapsed,
                    "Conversion completed"
                );
                Ok(Outcome::completed(artifact))
            }
            None => Ok(Outcome::failed(
                ConvertError::OutputMissing {
                    dir: paths.output_dir.display().to_string(),
                },
                elapsed,
            )),
        }
    }

    fn build_args(&self, paths: &StagedPaths) -> Vec<String> {
        let input = paths.input.to_string_lossy();
        let outdir = paths.output_dir.to_string_lossy();
        self.settings
            .args
            .iter()
            .map(|arg| arg.replace("{input}", &input).replace("{outdir}", &outdir))
            .collect()
    }

    /// Scan the output directory for a file with the expected extension.
    ///
    /// Multiple matches are a converter anomaly, not an error: the
    /// lexicographically smallest file name wins, so the choice never
    /// depends on filesystem enumeration order.
    async fn find_artifact(&self, dir: &Path) -> Result<Option<PathBuf>, ConvertError> {
        let mut read_dir = match tokio::fs::read_dir(dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ConvertError::internal(format!(
                    "failed to scan output directory {}: {e}",
                    dir.display()
                )))
            }
        };

        let mut matches: Vec<PathBuf> = Vec::new();
        loop {
            let entry = read_dir.next_entry().await.map_err(|e| {
                ConvertError::internal(format!(
                    "failed to scan output directory {}: {e}",
                    dir.display()
                ))
            })?;
            let Some(entry) = entry else { break };
            let path = entry.path();
            let is_match = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case(&self.settings.output_extension))
                .unwrap_or(false);
            if is_match {
                matches.push(path);
            }
        }

        matches.sort();
        if matches.len() > 1 {
            warn!(
                dir = %dir.display(),
                count = matches.len(),
                "Converter produced multiple output files, picking the first"
            );
        }
        Ok(matches.into_iter().next())
    }
}

/// Spawn a reader draining `stream` into a bounded buffer.
fn capture_stream<R>(stream: Option<R>) -> Option<JoinHandle<String>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let mut stream = stream?;
    Some(tokio::spawn(async move {
        let mut captured = BytesMut::with_capacity(4096);
        let mut buf = BytesMut::with_capacity(4096);
        loop {
            match stream.read_buf(&mut buf).await {
                Ok(n) if n > 0 => {
                    let room = MAX_CAPTURE.saturating_sub(captured.len());
                    let take = room.min(buf.len());
                    captured.extend_from_slice(&buf[..take]);
                    // Keep draining past the cap so the child never blocks
                    // on a full pipe.
                    buf.clear();
                }
                _ => break,
            }
        }
        String::from_utf8_lossy(&captured).into_owned()
    }))
}

async fn drain_capture(task: Option<JoinHandle<String>>) -> String {
    let Some(mut handle) = task else {
        return String::new();
    };
    match tokio::time::timeout(CAPTURE_DRAIN_TIMEOUT, &mut handle).await {
        Ok(result) => result.unwrap_or_default(),
        Err(_) => {
            handle.abort();
            String::new()
        }
    }
}

#[cfg(unix)]
fn soft_kill(child: &Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            warn!(error = %e, "Graceful termination signal failed");
        }
    }
}

#[cfg(not(unix))]
fn soft_kill(_child: &Child) {
    // No portable graceful signal; the grace timer escalates to the
    // forceful kill.
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}
