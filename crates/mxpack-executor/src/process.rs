//! Engine process spawning and two-stream output capture.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use mxpack_core::engine::{BuildOutcome, LogLine, LogStream};
use mxpack_core::{Error, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Engines probed when nothing else is configured, in order.
pub const DEFAULT_ENGINES: &[&str] = &["podman", "docker"];

/// A located engine executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineBinary {
    pub name: String,
    pub path: PathBuf,
}

/// Runs engine commands and streams their output.
///
/// Both pipes are read concurrently so a process that floods one stream
/// while staying silent on the other cannot stall. Every line is logged as
/// it arrives and forwarded to the observer, if any.
#[derive(Debug, Clone)]
pub struct ProcessStreamer {
    preferences: Vec<String>,
    search_path: Option<OsString>,
    pinned: Option<EngineBinary>,
    observer: Option<mpsc::UnboundedSender<LogLine>>,
}

impl Default for ProcessStreamer {
    fn default() -> Self {
        Self::new(DEFAULT_ENGINES.iter().map(|s| s.to_string()).collect())
    }
}

impl ProcessStreamer {
    /// Create a streamer that probes `preferences` in order on `PATH`.
    pub fn new(preferences: Vec<String>) -> Self {
        Self {
            preferences,
            search_path: None,
            pinned: None,
            observer: None,
        }
    }

    /// Use an explicit executable instead of probing.
    pub fn with_executable(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.pinned = Some(EngineBinary {
            name: name.into(),
            path: path.into(),
        });
        self
    }

    /// Probe this search path instead of the `PATH` environment variable.
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<LogLine>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Find the first preferred engine that is installed.
    pub fn locate(&self) -> Result<EngineBinary> {
        if let Some(pinned) = &self.pinned {
            return Ok(pinned.clone());
        }

        let search_path = self
            .search_path
            .clone()
            .or_else(|| std::env::var_os("PATH"))
            .unwrap_or_default();

        for name in &self.preferences {
            for dir in std::env::split_paths(&search_path) {
                let candidate = dir.join(name);
                if is_executable(&candidate) {
                    debug!(engine = %name, path = %candidate.display(), "Found container engine");
                    return Ok(EngineBinary {
                        name: name.clone(),
                        path: candidate,
                    });
                }
            }
        }

        Err(Error::EngineNotFound(self.preferences.join(", ")))
    }

    /// Run the engine with `args` and wait for it to exit.
    ///
    /// A non-zero exit is not an error here; see [`ProcessStreamer::call`].
    pub async fn run(&self, args: &[String], cancel: &CancellationToken) -> Result<BuildOutcome> {
        let engine = self.locate()?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        debug!(engine = %engine.name, ?args, "Running engine command");
        let mut child = Command::new(&engine.path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Engine("stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Engine("stderr was not captured".to_string()))?;

        // Engine output is not guaranteed to be UTF-8.
        let mut stdout_lines = BufReader::new(stdout).split(b'\n');
        let mut stderr_lines = BufReader::new(stderr).split(b'\n');
        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut outcome = BuildOutcome::default();

        while stdout_open || stderr_open {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(terminate(&mut child, &engine).await);
                }
                line = stdout_lines.next_segment(), if stdout_open => match line {
                    Ok(Some(line)) => {
                        outcome.last_stdout = Some(self.emit(&engine, LogStream::Stdout, line));
                    }
                    Ok(None) => stdout_open = false,
                    Err(e) => {
                        warn!(engine = %engine.name, error = %e, "Error reading stdout");
                        stdout_open = false;
                    }
                },
                line = stderr_lines.next_segment(), if stderr_open => match line {
                    Ok(Some(line)) => {
                        outcome.last_stderr = Some(self.emit(&engine, LogStream::Stderr, line));
                    }
                    Ok(None) => stderr_open = false,
                    Err(e) => {
                        warn!(engine = %engine.name, error = %e, "Error reading stderr");
                        stderr_open = false;
                    }
                },
            }
        }

        let status: ExitStatus = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(terminate(&mut child, &engine).await);
            }
            status = child.wait() => status?,
        };

        outcome.exit_code = status.code();
        debug!(engine = %engine.name, exit_code = ?outcome.exit_code, "Engine command finished");
        Ok(outcome)
    }

    /// Run the engine and fail on a non-zero exit.
    ///
    /// Returns the last line written to stdout.
    pub async fn call(&self, args: &[String], cancel: &CancellationToken) -> Result<Option<String>> {
        self.run(args, cancel).await?.into_result()
    }

    fn emit(&self, engine: &EngineBinary, stream: LogStream, line: Vec<u8>) -> String {
        let content = String::from_utf8_lossy(&line).trim_end().to_string();
        info!(engine = %engine.name, stream = %stream, "{}", content);
        if let Some(observer) = &self.observer {
            let _ = observer.send(LogLine {
                stream,
                content: content.clone(),
            });
        }
        content
    }
}

/// Kill and reap the child. Pipes held open by grandchildren are abandoned.
async fn terminate(child: &mut Child, engine: &EngineBinary) -> Error {
    warn!(engine = %engine.name, "Cancelling engine process");
    if let Err(e) = child.start_kill() {
        debug!(error = %e, "Engine process already exited");
    }
    if let Err(e) = child.wait().await {
        warn!(engine = %engine.name, error = %e, "Failed to reap engine process");
    }
    Error::Cancelled
}

fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;
    use tracing_test::traced_test;

    fn shell() -> ProcessStreamer {
        ProcessStreamer::default().with_executable("sh", "/bin/sh")
    }

    fn script(body: &str) -> Vec<String> {
        vec!["-c".to_string(), body.to_string()]
    }

    #[cfg(unix)]
    fn write_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        fs::write(path, "#!/bin/sh\n").unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[tokio::test]
    async fn test_interleaved_streams_keep_last_lines() {
        let outcome = shell()
            .run(
                &script("echo out-1; echo err-1 >&2; echo out-2; echo err-2 >&2"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(outcome.success());
        assert_eq!(outcome.last_stdout.as_deref(), Some("out-2"));
        assert_eq!(outcome.last_stderr.as_deref(), Some("err-2"));
    }

    #[tokio::test]
    async fn test_stderr_flood_with_silent_stdout_completes() {
        let outcome = tokio::time::timeout(
            Duration::from_secs(60),
            shell().run(&script("seq 1 50000 >&2; echo done"), &CancellationToken::new()),
        )
        .await
        .expect("streamer stalled")
        .unwrap();

        assert_eq!(outcome.last_stderr.as_deref(), Some("50000"));
        assert_eq!(outcome.last_stdout.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn test_invalid_utf8_does_not_stop_draining() {
        let outcome = tokio::time::timeout(
            Duration::from_secs(60),
            shell().run(
                &script("printf 'caf\\351\\n'; seq 1 40000; echo bye >&2"),
                &CancellationToken::new(),
            ),
        )
        .await
        .expect("streamer stalled")
        .unwrap();

        assert!(outcome.success());
        assert_eq!(outcome.last_stdout.as_deref(), Some("40000"));
        assert_eq!(outcome.last_stderr.as_deref(), Some("bye"));
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_decoded_lossily() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let outcome = shell()
            .with_observer(tx)
            .run(&script("printf 'caf\\351\\n'; echo after"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.last_stdout.as_deref(), Some("after"));
        let first = rx.try_recv().unwrap();
        assert_eq!(first.content, "caf\u{FFFD}");
    }

    #[tokio::test]
    async fn test_observer_receives_every_line() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        shell()
            .with_observer(tx)
            .run(&script("echo a; echo b >&2"), &CancellationToken::new())
            .await
            .unwrap();

        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        assert_eq!(lines.len(), 2);
        assert!(lines.contains(&LogLine {
            stream: LogStream::Stdout,
            content: "a".to_string()
        }));
        assert!(lines.contains(&LogLine {
            stream: LogStream::Stderr,
            content: "b".to_string()
        }));
    }

    #[tokio::test]
    async fn test_call_failure_reports_last_stderr_line() {
        let err = shell()
            .call(
                &script("echo starting >&2; echo 'project has errors' >&2; exit 3"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        match err {
            Error::BuildFailed { code, last_stderr } => {
                assert_eq!(code, Some(3));
                assert_eq!(last_stderr.as_deref(), Some("project has errors"));
            }
            other => panic!("Expected BuildFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_call_returns_last_stdout_line() {
        let id = shell()
            .call(&script("echo pulling >&2; echo 4f2a9c"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(id.as_deref(), Some("4f2a9c"));
    }

    #[tokio::test]
    async fn test_cancellation_kills_child() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = shell().run(&script("exec sleep 30"), &cancel).await.unwrap_err();

        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_cancellation_does_not_wait_for_grandchildren() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = shell()
            .run(&script("sleep 30; echo never"), &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_already_cancelled_token_spawns_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = shell().run(&script("echo hi"), &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_locate_reports_all_preferences_when_missing() {
        let empty = TempDir::new().unwrap();
        let streamer = ProcessStreamer::default().with_search_path(empty.path().as_os_str());

        match streamer.locate() {
            Err(Error::EngineNotFound(tried)) => assert_eq!(tried, "podman, docker"),
            other => panic!("Expected EngineNotFound, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_locate_honours_preference_order() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_executable(&first.path().join("docker"));
        write_executable(&second.path().join("podman"));

        let search_path =
            std::env::join_paths([first.path(), second.path()]).unwrap();
        let found = ProcessStreamer::default()
            .with_search_path(search_path)
            .locate()
            .unwrap();

        assert_eq!(found.name, "podman");
        assert_eq!(found.path, second.path().join("podman"));
    }

    #[cfg(unix)]
    #[test]
    fn test_locate_skips_non_executable_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("podman"), "").unwrap();
        write_executable(&dir.path().join("docker"));

        let found = ProcessStreamer::default()
            .with_search_path(dir.path().as_os_str())
            .locate()
            .unwrap();
        assert_eq!(found.name, "docker");
    }

    #[tokio::test]
    async fn test_missing_engine_fails_run() {
        let empty = TempDir::new().unwrap();
        let err = ProcessStreamer::default()
            .with_search_path(empty.path().as_os_str())
            .run(&["version".to_string()], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EngineNotFound(_)));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_lines_are_logged_with_stream() {
        shell()
            .run(&script("echo compiling-model >&2"), &CancellationToken::new())
            .await
            .unwrap();

        assert!(logs_contain("compiling-model"));
        assert!(logs_contain("stream=stderr"));
    }
}
