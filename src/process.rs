//! Bounded execution of external tools (downloader, extractor).
//!
//! Every invocation has a wall-clock limit and a cap on captured output. A
//! child that exceeds either is killed and reported as a `ToolError`.

use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::ToolError;

/// Limits applied to a single tool invocation
#[derive(Debug, Clone, Copy)]
pub struct ToolLimits {
    pub timeout: Duration,
    /// Combined cap for captured stdout and stderr, in bytes
    pub max_output: usize,
}

/// Captured result of a successful run
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub elapsed: Duration,
}

impl ToolOutput {
    /// stdout and stderr merged, the way the tools print diagnostics
    pub fn diagnostics(&self) -> String {
        merge_output(&self.stdout, &self.stderr)
    }
}

enum ReadFailure {
    Io(std::io::Error),
    Overflow,
}

/// Read a stream to the end, failing once `cap` bytes would be exceeded.
async fn read_capped<R: AsyncRead + Unpin>(mut reader: R, cap: usize) -> Result<Vec<u8>, ReadFailure> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).await.map_err(ReadFailure::Io)?;
        if n == 0 {
            return Ok(buf);
        }
        if buf.len() + n > cap {
            return Err(ReadFailure::Overflow);
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn merge_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(stdout).into_owned();
    if !stderr.is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&String::from_utf8_lossy(stderr));
    }
    text.trim().to_string()
}

/// Keep the tail of a diagnostic: tools print the real error last.
pub fn tail(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    let start = text.char_indices().nth(skip).map(|(i, _)| i).unwrap_or(0);
    &text[start..]
}

/// Run `program` with `args` under `limits`.
///
/// Returns `ToolError::Failed` for a non-zero exit, with the tail of the
/// tool's diagnostics attached for later classification.
pub async fn run_tool<I, S>(program: &str, args: I, limits: ToolLimits) -> Result<ToolOutput, ToolError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("Executing command: {:?}", cmd);

    let start_time = Instant::now();
    let mut child = cmd.spawn().map_err(|source| ToolError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let io_error = |source: std::io::Error| ToolError::Io {
        program: program.to_string(),
        source,
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io_error(std::io::Error::other("stdout not captured")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io_error(std::io::Error::other("stderr not captured")))?;

    // Each stream gets the full cap; the merged diagnostics are trimmed later.
    let cap = limits.max_output;
    let outcome = tokio::time::timeout(limits.timeout, async {
        let (stdout, stderr) = tokio::try_join!(read_capped(stdout, cap), read_capped(stderr, cap))?;
        let status = child.wait().await.map_err(ReadFailure::Io)?;
        Ok::<_, ReadFailure>((status, stdout, stderr))
    })
    .await;

    let (status, stdout, stderr) = match outcome {
        Ok(Ok(captured)) => captured,
        Ok(Err(ReadFailure::Overflow)) => {
            warn!("{} exceeded output limit of {} bytes, killing", program, cap);
            let _ = child.kill().await;
            return Err(ToolError::OutputLimit {
                program: program.to_string(),
                limit: cap,
            });
        }
        Ok(Err(ReadFailure::Io(source))) => {
            let _ = child.kill().await;
            return Err(io_error(source));
        }
        Err(_) => {
            warn!(
                "⏰ {} timed out after {:.1}s (limit: {}s)",
                program,
                start_time.elapsed().as_secs_f64(),
                limits.timeout.as_secs()
            );
            let _ = child.kill().await;
            return Err(ToolError::TimedOut {
                program: program.to_string(),
                limit: limits.timeout,
            });
        }
    };

    let output = ToolOutput {
        status,
        stdout,
        stderr,
        elapsed: start_time.elapsed(),
    };

    if !output.status.success() {
        return Err(ToolError::Failed {
            program: program.to_string(),
            status: output.status,
            diagnostics: tail(&output.diagnostics(), 2000).to_string(),
        });
    }

    debug!("{} finished in {:.1}s", program, output.elapsed.as_secs_f64());
    Ok(output)
}

/// Whether `program` can be spawned and answers a version query.
pub async fn is_installed(program: &str, version_flag: &str) -> bool {
    let limits = ToolLimits {
        timeout: Duration::from_secs(10),
        max_output: 64 * 1024,
    };
    run_tool(program, [version_flag], limits).await.is_ok()
}
