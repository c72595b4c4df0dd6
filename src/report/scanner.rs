use crate::error::{Result, TrendError};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Produces a JSON report tree for a source directory.
pub trait ReportGenerator {
    /// Writes the report for `source` to `output`. Any failure is fatal to a backfill run.
    fn generate(&self, source: &Path, output: &Path) -> Result<()>;
}

/// External scanner invoked as `<program> <args…> <source> -o <output>`.
#[derive(Debug, Clone)]
pub struct ScannerCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

const POLL_INTERVAL: Duration = Duration::from_millis(100);

impl ScannerCommand {
    /// Fails with a configuration error when the working directory is missing
    /// or an entry-point argument that looks like a file does not exist there.
    pub fn check(&self) -> Result<()> {
        if let Some(dir) = &self.working_dir {
            if !dir.is_dir() {
                return Err(TrendError::Configuration(format!(
                    "scanner working directory not found: {}",
                    dir.display()
                )));
            }
            if let Some(entry) = self.args.first().filter(|a| a.ends_with(".py")) {
                if !dir.join(entry).exists() {
                    return Err(TrendError::Configuration(format!(
                        "{entry} not found in {}",
                        dir.display()
                    )));
                }
            }
        }
        Ok(())
    }

    fn command(&self, source: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(source).arg("-o").arg(output);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        // The scanner leads its own process group so a timeout reaches its children too.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd
    }
}

impl ReportGenerator for ScannerCommand {
    fn generate(&self, source: &Path, output: &Path) -> Result<()> {
        debug!(program = %self.program, source = %source.display(), "running scanner");
        let mut child = self
            .command(source, output)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TrendError::tool("scanner", format!("cannot start {}: {e}", self.program)))?;

        // Drain both pipes on threads so a chatty scanner never blocks on a full pipe.
        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());

        let Some(status) = wait_with_timeout(&mut child, self.timeout)? else {
            // Readers are left detached: a process that escaped the group may still hold the pipes.
            return Err(TrendError::tool(
                "scanner",
                format!("timed out after {:?}", self.timeout.unwrap_or_default()),
            ));
        };
        let _ = stdout_reader.join();
        let stderr = stderr_reader.join().unwrap_or_default();

        if !status.success() {
            return Err(TrendError::tool(
                "scanner",
                format!("exited with {status}: {}", stderr.trim()),
            ));
        }

        if !output.exists() {
            return Err(TrendError::tool(
                "scanner",
                format!("succeeded but wrote no report to {}", output.display()),
            ));
        }
        Ok(())
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut text = String::new();
        if let Some(pipe) = pipe {
            let _ = BufReader::new(pipe).read_to_string(&mut text);
        }
        text
    })
}

/// Waits for `child`; returns `None` (after killing it) once `timeout` elapses.
fn wait_with_timeout(
    child: &mut Child,
    timeout: Option<Duration>,
) -> Result<Option<std::process::ExitStatus>> {
    let wait_err = |e: std::io::Error| TrendError::tool("scanner", format!("wait failed: {e}"));
    let Some(timeout) = timeout else {
        return child.wait().map(Some).map_err(wait_err);
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().map_err(wait_err)? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            kill_group(child);
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(unix)]
fn kill_group(child: &mut Child) {
    // Negative pid addresses the group the scanner leads.
    let group = -(child.id() as libc::pid_t);
    // SAFETY: kill(2) takes plain integers and touches no memory of ours.
    if unsafe { libc::kill(group, libc::SIGKILL) } != 0 {
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    let _ = child.kill();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Option<Duration>) -> ScannerCommand {
        // `sh -c <script> <source> -o <output>` puts the output path in $2.
        ScannerCommand {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
            working_dir: None,
            timeout,
        }
    }

    #[test]
    fn test_successful_scan_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("result.json");
        sh(r#"echo '{"name":"x","nodetype":"directory"}' > "$2""#, None)
            .generate(dir.path(), &out)
            .unwrap();
        assert!(out.exists());
    }

    #[test]
    fn test_nonzero_exit_is_tool_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = sh("echo boom >&2; exit 3", None)
            .generate(dir.path(), &dir.path().join("r.json"))
            .unwrap_err();
        match err {
            TrendError::ExternalTool { tool, message } => {
                assert_eq!(tool, "scanner");
                assert!(message.contains("boom"), "stderr should be surfaced: {message}");
            }
            other => panic!("expected ExternalTool, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_output_is_tool_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = sh("exit 0", None)
            .generate(dir.path(), &dir.path().join("r.json"))
            .unwrap_err();
        assert!(matches!(err, TrendError::ExternalTool { .. }));
    }

    #[test]
    fn test_timeout_kills_scanner() {
        let dir = tempfile::tempdir().unwrap();
        let started = Instant::now();
        let err = sh("exec sleep 5", Some(Duration::from_millis(200)))
            .generate(dir.path(), &dir.path().join("r.json"))
            .unwrap_err();
        assert!(err.to_string().contains("timed out after 200ms"), "got: {err}");
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_timeout_kills_processes_the_scanner_spawned() {
        let dir = tempfile::tempdir().unwrap();
        let started = Instant::now();
        // Without exec, sh forks sleep as a child that inherits the output pipes.
        let err = sh("sleep 5; true", Some(Duration::from_millis(200)))
            .generate(dir.path(), &dir.path().join("r.json"))
            .unwrap_err();
        assert!(err.to_string().contains("timed out"), "got: {err}");
        assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
    }

    #[test]
    fn test_check_rejects_missing_entry_point() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = ScannerCommand {
            program: "python3".into(),
            args: vec!["main.py".into()],
            working_dir: Some(dir.path().to_path_buf()),
            timeout: None,
        };
        assert!(matches!(cmd.check(), Err(TrendError::Configuration(_))));
        std::fs::write(dir.path().join("main.py"), "").unwrap();
        assert!(cmd.check().is_ok());
    }
}
