//! Clang subprocess integration
//!
//! Runs `clang` for each [`CompileJob`]. Artifacts go to the job's `-o`
//! path; stderr is captured and returned as diagnostics.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use super::{CompileJob, Compiler};
use crate::FrontendError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Clang compiler wrapper
pub struct ClangCompiler {
    /// Path to clang executable
    clang_path: PathBuf,
    /// Per-invocation limit
    timeout: Option<Duration>,
}

impl ClangCompiler {
    /// Create a new compiler, auto-detecting clang location
    pub fn new() -> Result<Self, FrontendError> {
        let clang_path = Self::find_clang()?;
        debug!("Found clang at: {:?}", clang_path);
        Ok(Self::with_path(clang_path))
    }

    /// Create a compiler with a specific clang path
    pub fn with_path(clang_path: PathBuf) -> Self {
        Self {
            clang_path,
            timeout: None,
        }
    }

    /// Kill any invocation running longer than `seconds` (0 disables)
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = (seconds > 0).then(|| Duration::from_secs(seconds));
        self
    }

    pub fn clang_path(&self) -> &PathBuf {
        &self.clang_path
    }

    /// Find clang executable
    fn find_clang() -> Result<PathBuf, FrontendError> {
        let candidates = [
            "clang",
            "/usr/bin/clang",
            "/usr/local/bin/clang",
            "/opt/homebrew/bin/clang", // macOS ARM
            "/opt/homebrew/opt/llvm/bin/clang",
            "/usr/local/opt/llvm/bin/clang",
        ];

        for candidate in candidates {
            if let Ok(output) = Command::new(candidate).arg("--version").output() {
                if output.status.success() {
                    return Ok(PathBuf::from(candidate));
                }
            }
        }

        Err(FrontendError::ClangNotFound)
    }

    /// Get clang version
    pub fn version(&self) -> Option<String> {
        Command::new(&self.clang_path)
            .arg("--version")
            .output()
            .ok()
            .and_then(|o| {
                String::from_utf8(o.stdout)
                    .ok()
                    .and_then(|s| s.lines().next().map(|l| l.to_string()))
            })
    }

    fn spawn(&self, job: &CompileJob<'_>) -> Result<Child, FrontendError> {
        let args = job.to_args();
        debug!("Running {:?} with args: {:?}", self.clang_path, args);

        let stdin = if job.stdin().is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        };

        Command::new(&self.clang_path)
            .args(&args)
            .stdin(stdin)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => FrontendError::ClangNotFound,
                _ => FrontendError::Io(e),
            })
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus, FrontendError> {
        let limit = match self.timeout {
            Some(limit) => limit,
            None => return Ok(child.wait()?),
        };

        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if started.elapsed() >= limit {
                if let Err(e) = child.kill() {
                    warn!("Failed to kill clang: {}", e);
                }
                let _ = child.wait();
                return Err(FrontendError::Timeout {
                    seconds: limit.as_secs(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Compiler for ClangCompiler {
    fn compile(&self, job: &CompileJob<'_>) -> Result<String, FrontendError> {
        let mut child = self.spawn(job)?;

        // Drain stderr while the child runs
        let stderr = child.stderr.take();
        let reader = thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_end(&mut buf);
            }
            buf
        });

        if let Some(source) = job.stdin() {
            if let Some(mut stdin) = child.stdin.take() {
                // clang may exit before reading everything; its status decides
                if let Err(e) = stdin.write_all(source.as_bytes()) {
                    trace!("Short write to clang stdin: {}", e);
                }
            }
        }

        let status = self.wait(&mut child)?;
        let diagnostics = String::from_utf8_lossy(&reader.join().unwrap_or_default()).into_owned();

        if !status.success() {
            trace!("clang exited with {}", status);
            return Err(FrontendError::CompilationFailed { diagnostics });
        }

        Ok(diagnostics)
    }

    fn name(&self) -> &str {
        "clang"
    }

    fn is_available(&self) -> bool {
        Command::new(&self.clang_path)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

impl Default for ClangCompiler {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| {
            warn!("Clang not found, using placeholder path");
            Self::with_path(PathBuf::from("clang"))
        })
    }
}
