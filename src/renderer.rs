//! External geometry renderer invocation
//!
//! The renderer compiles a [`GeometryProgram`] into an STL file. It runs as
//! a blocking child process under a wall-clock timeout; a nonzero exit or a
//! timeout is a [`Error::RendererInvocation`]. Whether the output file is
//! usable is decided later by the ingestor.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::geometry::GeometryProgram;

/// Default renderer executable
pub const DEFAULT_PROGRAM: &str = "openscad";

/// Default wall-clock limit for one render
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Interval between exit-status polls
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Captured stderr kept in error messages
const STDERR_LIMIT: u64 = 4096;

/// Compiles geometry programs into meshes
pub trait Renderer {
    /// Render `program` into an STL file at `output`
    ///
    /// # Errors
    ///
    /// [`Error::RendererInvocation`] if the renderer cannot be started,
    /// exits nonzero or exceeds its time limit.
    fn render(&self, program: &GeometryProgram, output: &Path) -> Result<()>;
}

/// Runs an external program as `<program> <args..> -o <output> <input>`
///
/// The program text is written next to `output` with the `.scad`
/// extension before the process starts.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRenderer {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ProcessRenderer {
    /// Renderer running `program` with the default time limit
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Extra arguments placed before the output and input paths
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Wall-clock limit for one render
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The executable
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// The time limit
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for ProcessRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl Renderer for ProcessRenderer {
    fn render(&self, program: &GeometryProgram, output: &Path) -> Result<()> {
        let input = output.with_extension("scad");
        program.write_to(&input)?;

        // a file instead of a pipe: a chatty renderer cannot block on a full pipe
        let mut stderr_log = tempfile::tempfile()?;

        debug!(
            program = %self.program.display(),
            kind = program.kind().as_str(),
            input = %input.display(),
            "Starting renderer"
        );
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg("-o")
            .arg(output)
            .arg(&input)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_log.try_clone()?))
            .spawn()
            .map_err(|e| {
                Error::RendererInvocation(format!(
                    "Cannot start '{}': {}",
                    self.program.display(),
                    e
                ))
            })?;

        let started = Instant::now();
        let status = loop {
            let polled = child.try_wait().map_err(|e| {
                format!(
                    "Cannot poll '{}' rendering {}: {}",
                    self.program.display(),
                    program.kind().as_str(),
                    e
                )
            });
            let failure = match polled {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= self.timeout => {
                    warn!(
                        program = %self.program.display(),
                        timeout_secs = self.timeout.as_secs_f64(),
                        "Renderer timed out; killing it"
                    );
                    format!(
                        "'{}' timed out after {:.1}s rendering {}",
                        self.program.display(),
                        self.timeout.as_secs_f64(),
                        program.kind().as_str()
                    )
                }
                Ok(None) => {
                    thread::sleep(POLL_INTERVAL);
                    continue;
                }
                Err(message) => {
                    warn!(program = %self.program.display(), "{}; killing renderer", message);
                    message
                }
            };
            stop(&mut child);
            return Err(Error::RendererInvocation(failure));
        };

        debug!(
            status = %status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Renderer finished"
        );
        if !status.success() {
            let stderr = read_captured(&mut stderr_log);
            return Err(Error::RendererInvocation(format!(
                "'{}' exited with {} rendering {}{}",
                self.program.display(),
                status,
                program.kind().as_str(),
                if stderr.is_empty() {
                    String::new()
                } else {
                    format!(": {}", stderr)
                }
            )));
        }
        Ok(())
    }
}

/// Kill and reap a renderer that is not allowed to finish
fn stop(child: &mut Child) {
    // the child may exit between the last poll and the kill
    let _ = child.kill();
    let _ = child.wait();
}

fn read_captured(file: &mut File) -> String {
    let mut captured = String::new();
    if file.seek(SeekFrom::Start(0)).is_ok() {
        let mut bytes = Vec::new();
        let _ = file.by_ref().take(STDERR_LIMIT).read_to_end(&mut bytes);
        captured = String::from_utf8_lossy(&bytes).trim().to_string();
    }
    captured
}
