//! Optional lifecycle hook scripts.
//!
//! A hook for step `pre-up` lives at `<hooks-dir>/pre-up.py`,
//! `<hooks-dir>/pre-up.sh`, or `<hooks-dir>/pre-up` (executed directly).
//! Hooks are advisory: a missing script or a failing one never fails the
//! lifecycle step that triggered it.

use crate::process::CommandRunner;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Name passed to hooks that are not about a single service.
pub const STACK_SCOPE: &str = "stack";

const INTERPRETERS: &[(&str, Option<&str>)] =
    &[(".py", Some("python3")), (".sh", Some("sh")), ("", None)];

pub struct HookRunner {
    dir: PathBuf,
    cwd: Option<PathBuf>,
    runner: Arc<dyn CommandRunner>,
}

impl HookRunner {
    pub fn new(dir: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            dir: dir.into(),
            cwd: None,
            runner,
        }
    }

    /// Run hooks from `cwd` instead of the caller's current directory.
    #[must_use]
    pub fn with_working_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Locate the script for `step` and build the command that runs it.
    pub fn resolve(&self, step: &str) -> Option<Vec<String>> {
        INTERPRETERS.iter().find_map(|(ext, interpreter)| {
            let path = self.dir.join(format!("{step}{ext}"));
            if !path.is_file() {
                return None;
            }
            let script = path.to_string_lossy().into_owned();
            Some(match interpreter {
                Some(program) => vec![(*program).to_owned(), script],
                None => vec![script],
            })
        })
    }

    /// Run the hook for `step`, if one exists. Returns its exit code, or
    /// `None` when no hook is installed or it could not be started.
    pub fn run(&self, step: &str, service: Option<&str>, args: &[String]) -> Option<i32> {
        let scope = service.unwrap_or(STACK_SCOPE);
        debug!("({scope}) looking for hook '{step}' in {}", self.dir.display());
        let Some(mut command) = self.resolve(step) else {
            debug!("({scope}) no script exists for hook '{step}'");
            return None;
        };

        command.push(scope.to_owned());
        command.extend(args.iter().cloned());

        let tag = format!("{scope}:{step}");
        match self.runner.run(&command, self.cwd.as_deref(), &tag) {
            Ok(0) => Some(0),
            Ok(code) => {
                warn!("({scope}) hook '{step}' exited with code {code}");
                Some(code)
            }
            Err(e) => {
                warn!("({scope}) hook '{step}' could not be run: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingRunner;
    use crate::process::ProcessRunner;

    #[test]
    fn missing_hook_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingRunner::new());
        let hooks = HookRunner::new(dir.path(), runner.clone());
        assert_eq!(hooks.run("pre-build", Some("web"), &[]), None);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn resolves_by_extension_priority() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("post-up.sh"), "true").unwrap();
        std::fs::write(dir.path().join("post-up.py"), "pass").unwrap();
        let hooks = HookRunner::new(dir.path(), Arc::new(RecordingRunner::new()));
        let cmd = hooks.resolve("post-up").unwrap();
        assert_eq!(cmd[0], "python3");
        assert!(cmd[1].ends_with("post-up.py"));
    }

    #[test]
    fn passes_service_and_arguments() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pre-clone.sh"), "true").unwrap();
        let runner = Arc::new(RecordingRunner::new());
        let hooks = HookRunner::new(dir.path(), runner.clone());

        assert_eq!(
            hooks.run("pre-clone", Some("widget"), &["/tmp/apps/widget".to_owned()]),
            Some(0)
        );
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0], "sh");
        assert_eq!(&calls[0][2..], ["widget", "/tmp/apps/widget"]);
    }

    #[test]
    fn stack_wide_hooks_use_stack_scope() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pre-up.sh"), "true").unwrap();
        let runner = Arc::new(RecordingRunner::new());
        let hooks = HookRunner::new(dir.path(), runner.clone());
        hooks.run("pre-up", None, &[]);
        assert_eq!(runner.calls()[0].last().map(String::as_str), Some(STACK_SCOPE));
    }

    #[test]
    fn hooks_run_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pre-up.sh"), "true").unwrap();
        let runner = Arc::new(RecordingRunner::new());
        let hooks = HookRunner::new(dir.path(), runner.clone()).with_working_dir("/srv/stack");
        hooks.run("pre-up", None, &[]);
        assert_eq!(runner.cwds(), vec![Some(PathBuf::from("/srv/stack"))]);
    }

    #[test]
    fn failing_hook_reports_code_without_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("post-build.sh"), "echo nope >&2; exit 4\n").unwrap();
        let hooks = HookRunner::new(dir.path(), Arc::new(ProcessRunner::new()));
        assert_eq!(hooks.run("post-build", Some("web"), &[]), Some(4));
    }

    #[test]
    fn hook_receives_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        std::fs::write(
            dir.path().join("post-clone.sh"),
            format!("echo \"$@\" > '{}'\n", marker.display()),
        )
        .unwrap();
        let hooks = HookRunner::new(dir.path(), Arc::new(ProcessRunner::new()));
        hooks.run("post-clone", Some("widget"), &["/srv/apps/widget".to_owned()]);
        let written = std::fs::read_to_string(marker).unwrap();
        assert_eq!(written.trim(), "widget /srv/apps/widget");
    }
}
