//! Child process execution with line-by-line log streaming.
//!
//! stdout and stderr are each drained by their own reader thread into one
//! channel, so a child filling one pipe can never stall while the parent is
//! blocked on the other. Lines reach the sink in arrival order.

use crate::RuntimeError;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

pub trait CommandRunner: Send + Sync {
    /// Run `args`, streaming output into the log tagged with `tag`, and
    /// return the exit code.
    fn run(&self, args: &[String], cwd: Option<&Path>, tag: &str) -> Result<i32, RuntimeError>;

    /// Run `args` attached to the operator's terminal.
    fn run_attached(&self, args: &[String], cwd: Option<&Path>) -> Result<i32, RuntimeError>;

    /// Run `args` to completion and collect its output.
    fn capture(&self, args: &[String], cwd: Option<&Path>) -> Result<CapturedOutput, RuntimeError>;
}

/// Spawns real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run `args` and hand every output line to `sink` as it arrives.
    pub fn run_with_sink(
        &self,
        args: &[String],
        cwd: Option<&Path>,
        mut sink: impl FnMut(StreamKind, &str),
    ) -> Result<i32, RuntimeError> {
        let mut cmd = command(args, cwd)?;
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = cmd.spawn().map_err(|source| RuntimeError::Spawn {
            program: args[0].clone(),
            source,
        })?;

        let (tx, rx) = mpsc::channel::<(StreamKind, String)>();
        let mut readers = Vec::with_capacity(2);
        if let Some(out) = child.stdout.take() {
            readers.push(spawn_reader(out, StreamKind::Stdout, tx.clone()));
        }
        if let Some(err) = child.stderr.take() {
            readers.push(spawn_reader(err, StreamKind::Stderr, tx.clone()));
        }
        drop(tx);

        for (kind, line) in rx {
            sink(kind, &line);
        }
        for reader in readers {
            let _ = reader.join();
        }

        let status = child.wait()?;
        Ok(exit_code(status))
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, args: &[String], cwd: Option<&Path>, tag: &str) -> Result<i32, RuntimeError> {
        debug!("({tag}) running: {}", args.join(" "));
        let code = self.run_with_sink(args, cwd, |kind, line| match kind {
            StreamKind::Stdout => debug!("({tag}) {line}"),
            StreamKind::Stderr => error!("({tag}) {line}"),
        })?;
        debug!("({tag}) exited with code {code}");
        Ok(code)
    }

    fn run_attached(&self, args: &[String], cwd: Option<&Path>) -> Result<i32, RuntimeError> {
        debug!("running attached: {}", args.join(" "));
        let mut cmd = command(args, cwd)?;
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        let status = cmd.status().map_err(|source| RuntimeError::Spawn {
            program: args[0].clone(),
            source,
        })?;
        Ok(exit_code(status))
    }

    fn capture(&self, args: &[String], cwd: Option<&Path>) -> Result<CapturedOutput, RuntimeError> {
        debug!("capturing: {}", args.join(" "));
        let mut cmd = command(args, cwd)?;
        cmd.stdin(Stdio::null());
        let output = cmd.output().map_err(|source| RuntimeError::Spawn {
            program: args[0].clone(),
            source,
        })?;
        Ok(CapturedOutput {
            code: exit_code(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn command(args: &[String], cwd: Option<&Path>) -> Result<Command, RuntimeError> {
    let (program, rest) = args.split_first().ok_or(RuntimeError::EmptyCommand)?;
    let mut cmd = Command::new(program);
    cmd.args(rest);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    Ok(cmd)
}

fn spawn_reader(
    pipe: impl Read + Send + 'static,
    kind: StreamKind,
    tx: mpsc::Sender<(StreamKind, String)>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']).to_owned();
                    if tx.send((kind, line)).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

/// Exit code of a finished child; death by signal `n` maps to `128 + n`.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// Convert string slices into an owned argument vector.
pub fn argv<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    args.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        argv(["sh", "-c", script])
    }

    #[test]
    fn returns_exit_code() {
        let runner = ProcessRunner::new();
        assert_eq!(runner.run(&sh("exit 0"), None, "test").unwrap(), 0);
        assert_eq!(runner.run(&sh("exit 3"), None, "test").unwrap(), 3);
    }

    #[test]
    fn streams_both_pipes_in_full() {
        let runner = ProcessRunner::new();
        let mut out = 0usize;
        let mut err = 0usize;
        let script = "i=0; while [ $i -lt 5000 ]; do echo out$i; echo err$i >&2; i=$((i+1)); done";
        let code = runner
            .run_with_sink(&sh(script), None, |kind, _| match kind {
                StreamKind::Stdout => out += 1,
                StreamKind::Stderr => err += 1,
            })
            .unwrap();
        assert_eq!(code, 0);
        assert_eq!(out, 5000);
        assert_eq!(err, 5000);
    }

    #[test]
    fn stderr_flood_does_not_deadlock() {
        let runner = ProcessRunner::new();
        let mut lines = Vec::new();
        let script = "head -c 300000 /dev/zero | tr '\\0' 'x' | fold -w 100 >&2; echo done";
        let code = runner
            .run_with_sink(&sh(script), None, |kind, line| lines.push((kind, line.len())))
            .unwrap();
        assert_eq!(code, 0);
        assert_eq!(
            lines.iter().filter(|(k, _)| *k == StreamKind::Stderr).count(),
            3000
        );
        assert!(lines.contains(&(StreamKind::Stdout, 4)));
    }

    #[test]
    fn last_line_without_newline_is_kept() {
        let runner = ProcessRunner::new();
        let mut lines = Vec::new();
        runner
            .run_with_sink(&sh("printf 'a\\nb'"), None, |_, line| lines.push(line.to_owned()))
            .unwrap();
        assert_eq!(lines, vec!["a", "b"]);
    }

    #[test]
    fn honours_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new();
        let out = runner.capture(&sh("pwd"), Some(dir.path())).unwrap();
        let expected = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(out.stdout.trim(), expected.to_string_lossy());
    }

    #[test]
    fn capture_collects_output() {
        let runner = ProcessRunner::new();
        let out = runner.capture(&sh("echo hi; echo oops >&2; exit 2"), None).unwrap();
        assert_eq!(out.code, 2);
        assert!(!out.success());
        assert_eq!(out.stdout, "hi\n");
        assert_eq!(out.stderr, "oops\n");
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let runner = ProcessRunner::new();
        let err = runner
            .run(&argv(["definitely-not-a-real-binary-xyz"]), None, "test")
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Spawn { .. }));
    }

    #[test]
    fn empty_command_is_rejected() {
        let runner = ProcessRunner::new();
        assert!(matches!(
            runner.run(&[], None, "test"),
            Err(RuntimeError::EmptyCommand)
        ));
    }
}
