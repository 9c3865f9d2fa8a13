//! Subprocess execution with a deadline.

use super::{RunResult, Runner};
use crate::{Error, Result};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, mpsc};
use std::thread;
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

/// How long to wait for the pipe readers once the child is gone.
///
/// A grandchild that inherited the pipes can keep them open after the child
/// exits or is killed; whatever was read by then is returned.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Runs the real `rp-cli` binary.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    /// Name used in messages (e.g. "rp-cli")
    name: String,
    /// Resolved executable path
    path: PathBuf,
}

impl ProcessRunner {
    /// Resolve `binary` on PATH (or accept an existing file path).
    ///
    /// # Errors
    /// Returns `Error::BinaryNotFound` if the binary cannot be resolved.
    pub fn locate(binary: &str) -> Result<Self> {
        let candidate = Path::new(binary);
        let path = if candidate.components().count() > 1 && candidate.is_file() {
            candidate.to_path_buf()
        } else {
            which::which(binary).map_err(|_| Error::BinaryNotFound {
                binary: binary.to_string(),
            })?
        };

        let name = candidate
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| binary.to_string());

        tracing::debug!(binary, path = %path.display(), "resolved rp-cli");
        Ok(Self { name, path })
    }

    /// Path of the resolved executable.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Runner for ProcessRunner {
    fn run(&self, args: &[String], timeout: Duration) -> Result<RunResult> {
        tracing::debug!(?args, timeout_secs = timeout.as_secs(), "running {}", self.name);
        let start = Instant::now();

        let mut child = Command::new(&self.path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                binary: self.name.clone(),
                source,
            })?;

        let stdout = child.stdout.take().map(PipeCapture::spawn);
        let stderr = child.stderr.take().map(PipeCapture::spawn);

        let status = match wait_or_kill(&mut child, |c| c.wait_timeout(timeout)) {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!("waiting for {} failed: {}", self.name, e);
                return Err(e.into());
            }
        };

        let stdout = stdout.map(|c| c.finish(DRAIN_GRACE)).unwrap_or_default();
        let stderr = stderr.map(|c| c.finish(DRAIN_GRACE)).unwrap_or_default();

        let result = match status {
            Some(status) => RunResult {
                code: exit_code(&status),
                stdout,
                stderr,
                timed_out: false,
                signal: exit_signal(&status),
                elapsed: start.elapsed(),
                already_on_workspace: false,
            },
            None => {
                tracing::debug!(
                    timeout_secs = timeout.as_secs(),
                    "{} timed out",
                    self.name
                );
                let mut res = RunResult::timed_out(&self.name, stdout, stderr, timeout);
                res.elapsed = start.elapsed();
                res
            }
        };

        tracing::debug!(
            code = result.code,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "{} finished",
            self.name
        );
        Ok(result)
    }

    fn binary_name(&self) -> &str {
        &self.name
    }
}

/// Drains one pipe on a helper thread into a shared buffer.
struct PipeCapture {
    buf: Arc<Mutex<Vec<u8>>>,
    done: mpsc::Receiver<()>,
}

impl PipeCapture {
    fn spawn<R: Read + Send + 'static>(mut reader: R) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let (tx, done) = mpsc::channel();

        thread::spawn(move || {
            let mut chunk = [0u8; 8192];
            loop {
                match reader.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => lock(&sink).extend_from_slice(&chunk[..n]),
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
            let _ = tx.send(());
        });

        Self { buf, done }
    }

    /// Wait up to `grace` for EOF, then return everything read so far.
    fn finish(self, grace: Duration) -> String {
        let _ = self.done.recv_timeout(grace);
        let bytes = lock(&self.buf).clone();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Wait for `child` with `wait`. Unless the child exited, it is killed and
/// reaped before returning, so a deadline or a failed wait never leaves it
/// running.
fn wait_or_kill<F>(child: &mut Child, wait: F) -> io::Result<Option<ExitStatus>>
where
    F: FnOnce(&mut Child) -> io::Result<Option<ExitStatus>>,
{
    let waited = wait(child);
    if !matches!(waited, Ok(Some(_))) {
        let _ = child.kill();
        let _ = child.wait();
    }
    waited
}

fn lock(buf: &Mutex<Vec<u8>>) -> MutexGuard<'_, Vec<u8>> {
    buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn exit_code(status: &ExitStatus) -> i32 {
    match status.code() {
        Some(code) => code,
        None => 128 + exit_signal(status).unwrap_or(0),
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}
