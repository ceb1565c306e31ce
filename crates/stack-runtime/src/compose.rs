//! The compose CLI (`docker-compose` or `docker compose`), run from the
//! stack root so it picks up the stack's compose manifest.

use crate::process::CommandRunner;
use crate::RuntimeError;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct Compose {
    program: Vec<String>,
    root: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl Compose {
    pub fn new(program: Vec<String>, root: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            program,
            root: root.into(),
            runner,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn command<I, S>(&self, rest: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = self.program.clone();
        args.extend(rest.into_iter().map(Into::into));
        args
    }

    /// Run a compose subcommand with output streamed into the log.
    pub fn run<I, S>(&self, rest: I, tag: &str) -> Result<i32, RuntimeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.runner.run(&self.command(rest), Some(&self.root), tag)
    }

    /// Run a compose subcommand attached to the terminal.
    pub fn run_attached<I, S>(&self, rest: I) -> Result<i32, RuntimeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.runner.run_attached(&self.command(rest), Some(&self.root))
    }

    pub fn build_no_cache(&self, service: &str) -> Result<i32, RuntimeError> {
        self.run(["build", "--no-cache", service], service)
    }

    pub fn up(&self, flags: &[String]) -> Result<i32, RuntimeError> {
        let mut rest = vec!["up".to_owned()];
        rest.extend(flags.iter().cloned());
        self.run(rest, "compose")
    }

    pub fn down(&self, flags: &[String]) -> Result<i32, RuntimeError> {
        let mut rest = vec!["down".to_owned()];
        rest.extend(flags.iter().cloned());
        self.run(rest, "compose")
    }

    /// Kill, then remove the service's containers with their anonymous volumes.
    pub fn stop_and_remove(&self, service: &str) -> Result<i32, RuntimeError> {
        let killed = self.run(["kill", service], service)?;
        let removed = self.run(["rm", "-f", "-v", service], service)?;
        Ok(if killed == 0 { removed } else { killed })
    }

    /// Create the service's container without starting it.
    pub fn create(&self, service: &str, flags: &[String]) -> Result<i32, RuntimeError> {
        let mut rest = vec!["up".to_owned(), "--no-start".to_owned()];
        rest.extend(flags.iter().cloned());
        rest.push(service.to_owned());
        self.run(rest, service)
    }

    pub fn start(&self, service: &str) -> Result<i32, RuntimeError> {
        self.run(["start", service], service)
    }

    /// Run a command inside the service's container without a TTY.
    pub fn exec(&self, service: &str, command: &[String]) -> Result<i32, RuntimeError> {
        let mut rest = vec!["exec".to_owned(), "-T".to_owned(), service.to_owned()];
        rest.extend(command.iter().cloned());
        self.run(rest, service)
    }

    /// Open an interactive program inside the service's container.
    pub fn exec_attached(&self, service: &str, command: &[String]) -> Result<i32, RuntimeError> {
        let mut rest = vec!["exec".to_owned(), service.to_owned()];
        rest.extend(command.iter().cloned());
        self.run_attached(rest)
    }

    pub fn logs(&self, service: &str, tail: Option<u32>, follow: bool) -> Result<i32, RuntimeError> {
        let mut rest = vec!["logs".to_owned(), "-t".to_owned()];
        if let Some(lines) = tail {
            rest.push("--tail".to_owned());
            rest.push(lines.to_string());
        }
        if follow {
            rest.push("-f".to_owned());
        }
        rest.push(service.to_owned());
        self.run_attached(rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingRunner;

    fn compose(runner: &Arc<RecordingRunner>) -> Compose {
        Compose::new(
            vec!["docker".to_owned(), "compose".to_owned()],
            "/srv/stack",
            runner.clone(),
        )
    }

    #[test]
    fn create_appends_flags_before_service() {
        let runner = Arc::new(RecordingRunner::new());
        compose(&runner)
            .create("web", &["--no-deps".to_owned()])
            .unwrap();
        assert_eq!(
            runner.calls()[0],
            ["docker", "compose", "up", "--no-start", "--no-deps", "web"]
        );
        assert_eq!(runner.cwds()[0].as_deref(), Some(Path::new("/srv/stack")));
    }

    #[test]
    fn stop_and_remove_runs_both_even_when_kill_fails() {
        let runner = Arc::new(RecordingRunner::new());
        runner.fail_with("docker compose kill", 1);
        let code = compose(&runner).stop_and_remove("web").unwrap();
        assert_eq!(code, 1);
        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], ["docker", "compose", "rm", "-f", "-v", "web"]);
    }

    #[test]
    fn logs_builds_tail_and_follow() {
        let runner = Arc::new(RecordingRunner::new());
        compose(&runner).logs("api", Some(50), true).unwrap();
        assert_eq!(
            runner.calls()[0],
            ["docker", "compose", "logs", "-t", "--tail", "50", "-f", "api"]
        );
    }
}
