use std::{
    ffi::OsString,
    fmt::Display,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
    thread::JoinHandle,
    time::{Duration, Instant},
};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::dot::GraphText;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Errors that can occur while running the external converter.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The converter could not be found, nothing was spawned.
    #[error("{program} is not installed or not found in PATH.")]
    ToolNotFound {
        /// the program that was looked up
        program: String,
    },
    /// The converter ran but had a non-zero exit status.
    #[error("{program} command failed with {status}: {stderr}")]
    ToolExecutionFailed {
        /// the program that was run
        program: String,
        /// how the process exited
        status: ExitStatus,
        /// whatever the process wrote to stderr
        stderr: String,
    },
    /// The converter did not exit in time and was killed.
    #[error("{program} did not finish within {}s and was killed.", .after.as_secs_f32())]
    Timeout {
        /// the program that was run
        program: String,
        /// the configured timeout
        after: Duration,
    },
    /// Spawning or communicating with the converter failed.
    #[error("an unexpected error occurred: {0}")]
    UnexpectedFailure(#[from] io::Error),
}

/// The output of the converter, i.e. the typeset representation of a [`GraphText`].
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize)]
#[serde(transparent)]
pub struct RenderedText(String);

impl RenderedText {
    /// The output as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes `self` and returns the underlying string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for RenderedText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An external program that reads a graphviz document on stdin and writes its converted form
/// to stdout. By default this is `dot2tex --autosize`, which produces TikZ.
///
/// Each call to [`Converter::render`] spawns a fresh process and blocks until it exits. There
/// is no timeout unless one is set through [`Converter::with_timeout`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Converter {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
    search_path: Option<OsString>,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new("dot2tex").with_args(["--autosize"])
    }
}

impl Converter {
    /// Creates a converter that runs `program` without any arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec![],
            timeout: None,
            search_path: None,
        }
    }

    /// Replaces the arguments that are passed to the program.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Kills the program if it has not exited after `timeout`, `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.timeout = timeout.into();
        self
    }

    /// Looks up the program in the given list of directories (formatted like `PATH`) instead
    /// of the `PATH` of the current process.
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    /// The name of the program.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The arguments that are passed to the program.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The configured timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Resolves the program to an executable file. A program name that contains a path
    /// separator is taken as is, otherwise the directories of the search path are tried in
    /// order.
    pub fn locate(&self) -> Option<PathBuf> {
        let program = Path::new(&self.program);
        if program.components().count() > 1 {
            return is_executable(program).then(|| program.to_path_buf());
        }

        let search_path = self
            .search_path
            .clone()
            .or_else(|| std::env::var_os("PATH"))?;
        let names = executable_names(&self.program);
        std::env::split_paths(&search_path)
            .flat_map(|dir| names.iter().map(move |name| dir.join(name)))
            .find(|candidate| is_executable(candidate))
    }

    /// Feeds `dot` to the program and returns what it wrote to stdout. If the program cannot be
    /// found, this fails with [`RenderError::ToolNotFound`] without spawning anything.
    pub fn render(&self, dot: &GraphText) -> Result<RenderedText, RenderError> {
        let Some(executable) = self.locate() else {
            warn!("could not find {} in search path", self.program);
            return Err(RenderError::ToolNotFound {
                program: self.program.clone(),
            });
        };

        debug!("spawning {} {:?}", executable.display(), self.args);
        let mut child = Command::new(&executable)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // stdin is written and both outputs are drained concurrently, otherwise a
        // converter that fills its stdout pipe before consuming all input deadlocks
        let writer = child.stdin.take().map(|mut stdin| {
            let input = dot.as_str().to_owned();
            std::thread::spawn(move || stdin.write_all(input.as_bytes()))
        });
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        // on timeout the pipe threads are left detached, grandchildren of the killed
        // converter may still hold the pipes open
        let status = self.wait(&mut child)?;

        let written = join(writer);
        let stdout = join(stdout)?;
        let stderr = join(stderr)?;

        trace!("{} exited with {}", self.program, status);
        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr).trim().to_string();
            return Err(RenderError::ToolExecutionFailed {
                program: self.program.clone(),
                status,
                stderr,
            });
        }

        match written {
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                debug!("{} did not consume all of its input", self.program)
            }
            other => other?,
        }

        String::from_utf8(stdout)
            .map(RenderedText)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus, RenderError> {
        let Some(limit) = self.timeout else {
            return Ok(child.wait()?);
        };

        let start = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if start.elapsed() >= limit {
                warn!("{} exceeded timeout of {:?}, killing it", self.program, limit);
                child.kill()?;
                child.wait()?;
                return Err(RenderError::Timeout {
                    program: self.program.clone(),
                    after: limit,
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut source: R) -> JoinHandle<io::Result<Vec<u8>>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        source.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn join<T: Default>(handle: Option<JoinHandle<io::Result<T>>>) -> io::Result<T> {
    match handle {
        None => Ok(T::default()),
        Some(handle) => handle
            .join()
            .map_err(|_| io::Error::other("pipe handling thread panicked"))?,
    }
}

/// File names under which a bare program name is looked up. Where executables carry a suffix
/// (`.exe` on windows), the suffixed name is tried first.
fn executable_names(program: &str) -> Vec<String> {
    let suffix = std::env::consts::EXE_SUFFIX;
    if suffix.is_empty() || Path::new(program).extension().is_some() {
        vec![program.to_string()]
    } else {
        vec![format!("{program}{suffix}"), program.to_string()]
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
