//! Running external tools as child processes with a timeout and bounded output.

use std::ffi::OsString;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, error, info, instrument, warn};
use wait_timeout::ChildExt;

/// Lines of stderr quoted in a failure message.
const STDERR_TAIL_LINES: usize = 20;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    fn truncated_notice(label: &str, stream: &str, bytes: usize) -> String {
        if bytes > 0 {
            format!("\n[{label} {stream} truncated {bytes} bytes]\n")
        } else {
            String::new()
        }
    }

    /// Render both streams as a log file body.
    pub fn render_log(&self, label: &str) -> String {
        let mut buf = String::new();
        buf.push_str("=== stdout ===\n");
        buf.push_str(&String::from_utf8_lossy(&self.stdout));
        buf.push_str(&Self::truncated_notice(label, "stdout", self.stdout_truncated));
        buf.push_str("\n=== stderr ===\n");
        buf.push_str(&String::from_utf8_lossy(&self.stderr));
        buf.push_str(&Self::truncated_notice(label, "stderr", self.stderr_truncated));
        if self.timed_out {
            buf.push_str(&format!("\n[{label} timed out]\n"));
        }
        buf
    }

    /// Last few stderr lines, for error messages.
    pub fn stderr_tail(&self) -> String {
        let stderr = String::from_utf8_lossy(&self.stderr);
        let lines: Vec<&str> = stderr.lines().collect();
        let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
        lines[start..].join("\n")
    }
}

/// One invocation of an external tool.
#[derive(Debug, Clone)]
pub struct ToolRun {
    /// Short name used in logs and errors (`mesh`, `fibers`).
    pub label: String,
    /// Program followed by its fixed leading arguments.
    pub command: Vec<String>,
    /// Arguments appended after `command`.
    pub args: Vec<OsString>,
    pub stdin: Option<Vec<u8>>,
    pub workdir: Option<PathBuf>,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
    /// Where stdout/stderr are written once the tool exits.
    pub log_path: PathBuf,
}

/// Run a tool to completion, write its log, and fail unless it exited successfully.
#[instrument(skip_all, fields(label = %run.label, program = run.command.first().map(String::as_str)))]
pub fn run_tool(run: &ToolRun) -> Result<CommandOutput> {
    let (program, leading) = run
        .command
        .split_first()
        .ok_or_else(|| anyhow!("{} command is empty", run.label))?;
    let mut cmd = Command::new(program);
    cmd.args(leading).args(&run.args);
    if let Some(workdir) = &run.workdir {
        cmd.current_dir(workdir);
    }
    info!(args = run.args.len(), "starting {}", run.label);

    let output = run_command_with_timeout(
        cmd,
        run.stdin.as_deref(),
        run.timeout,
        run.output_limit_bytes,
    )
    .with_context(|| format!("run {program}"))?;
    write_log(&run.log_path, &output.render_log(&run.label))?;

    if output.timed_out {
        warn!(timeout_secs = run.timeout.as_secs(), "{} timed out", run.label);
        bail!(
            "{program} timed out after {}s (log: {})",
            run.timeout.as_secs(),
            run.log_path.display()
        );
    }
    if !output.status.success() {
        warn!(exit_code = ?output.status.code(), "{} failed", run.label);
        let tail = output.stderr_tail();
        if tail.is_empty() {
            bail!(
                "{program} exited with status {:?} (log: {})",
                output.status.code(),
                run.log_path.display()
            );
        }
        bail!(
            "{program} exited with status {:?} (log: {}):\n{tail}",
            output.status.code(),
            run.log_path.display()
        );
    }
    debug!("{} completed", run.label);
    Ok(output)
}

fn write_log(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log dir {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write log {}", path.display()))
}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes` bounds the amount of
/// stdout/stderr stored in memory (bytes beyond this are discarded while still draining the pipe).
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    if let Some(input) = stdin {
        let mut child_stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        // A tool may exit without reading its input; that surfaces through its exit status.
        if let Err(err) = child_stdin.write_all(input) {
            warn!(err = %err, "failed to write stdin");
        }
    }

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, log_path: PathBuf) -> ToolRun {
        ToolRun {
            label: "test".to_string(),
            command: vec!["sh".to_string(), "-c".to_string()],
            args: vec![script.into()],
            stdin: None,
            workdir: None,
            timeout: Duration::from_secs(10),
            output_limit_bytes: 1000,
            log_path,
        }
    }

    #[test]
    fn successful_tool_writes_log() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = temp.path().join("logs").join("test.log");
        run_tool(&sh("echo hello; echo oops >&2", log.clone())).expect("run");
        let contents = fs::read_to_string(&log).expect("log");
        assert!(contents.contains("=== stdout ===\nhello"));
        assert!(contents.contains("oops"));
    }

    #[test]
    fn failing_tool_reports_status_and_stderr() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = run_tool(&sh("echo broken mesh >&2; exit 3", temp.path().join("t.log")))
            .expect_err("non-zero exit");
        let message = format!("{err:#}");
        assert!(message.contains("status Some(3)"));
        assert!(message.contains("broken mesh"));
    }

    #[test]
    fn stdin_is_delivered() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut run = sh("cat", temp.path().join("t.log"));
        run.stdin = Some(b"{\"mesh\": 1}".to_vec());
        let output = run_tool(&run).expect("run");
        assert_eq!(output.stdout, b"{\"mesh\": 1}");
    }

    #[test]
    fn slow_tool_times_out() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut run = sh("sleep 5", temp.path().join("t.log"));
        run.timeout = Duration::from_millis(200);
        let err = run_tool(&run).expect_err("timeout");
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn output_beyond_limit_is_truncated() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut run = sh("printf '0123456789'", temp.path().join("t.log"));
        run.output_limit_bytes = 4;
        let output = run_tool(&run).expect("run");
        assert_eq!(output.stdout, b"0123");
        assert_eq!(output.stdout_truncated, 6);
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut run = sh("", temp.path().join("t.log"));
        run.command = vec!["definitely-not-a-biv-tool".to_string()];
        let err = run_tool(&run).expect_err("spawn failure");
        assert!(format!("{err:#}").contains("spawn command"));
    }
}
