use crate::process::{argv, CommandRunner};
use crate::RuntimeError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Version control of the stack checkout that embeds app subtrees.
///
/// `prefix` arguments are paths relative to the repository root. Mutating
/// operations return the tool's exit code so callers can decide whether a
/// failure is fatal for them.
pub trait Vcs: Send + Sync {
    fn add_subtree(&self, prefix: &str, repository: &str, branch: &str, squash: bool)
        -> Result<i32, RuntimeError>;

    fn pull_subtree(&self, prefix: &str, repository: &str, branch: &str, squash: bool)
        -> Result<i32, RuntimeError>;

    /// Split the history of `prefix` out onto a new local `branch`.
    fn split_subtree(&self, prefix: &str, branch: &str) -> Result<i32, RuntimeError>;

    /// Remove `prefix` from the index and working tree.
    fn remove_path(&self, prefix: &str) -> Result<i32, RuntimeError>;

    fn commit(&self, message: &str) -> Result<i32, RuntimeError>;

    /// True when tracked files differ from `HEAD`.
    fn has_local_changes(&self) -> Result<bool, RuntimeError>;
}

/// `git` CLI backend; every command runs from the stack root.
pub struct GitCli {
    root: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl GitCli {
    pub fn new(root: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            root: root.into(),
            runner,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn git(&self, args: Vec<String>, tag: &str) -> Result<i32, RuntimeError> {
        self.runner.run(&args, Some(&self.root), tag)
    }

    fn subtree(
        &self,
        action: &str,
        prefix: &str,
        repository: &str,
        branch: &str,
        squash: bool,
    ) -> Result<i32, RuntimeError> {
        let mut args = argv(["git", "subtree", action]);
        args.push(format!("--prefix={prefix}"));
        args.push(repository.to_owned());
        args.push(branch.to_owned());
        if squash {
            args.push("--squash".to_owned());
        }
        self.git(args, prefix)
    }
}

impl Vcs for GitCli {
    fn add_subtree(
        &self,
        prefix: &str,
        repository: &str,
        branch: &str,
        squash: bool,
    ) -> Result<i32, RuntimeError> {
        self.subtree("add", prefix, repository, branch, squash)
    }

    fn pull_subtree(
        &self,
        prefix: &str,
        repository: &str,
        branch: &str,
        squash: bool,
    ) -> Result<i32, RuntimeError> {
        self.subtree("pull", prefix, repository, branch, squash)
    }

    fn split_subtree(&self, prefix: &str, branch: &str) -> Result<i32, RuntimeError> {
        let args = argv([
            "git".to_owned(),
            "subtree".to_owned(),
            "split".to_owned(),
            format!("--prefix={prefix}"),
            "--branch".to_owned(),
            branch.to_owned(),
        ]);
        self.git(args, prefix)
    }

    fn remove_path(&self, prefix: &str) -> Result<i32, RuntimeError> {
        self.git(argv(["git", "rm", "-r", "-f", "-q", prefix]), prefix)
    }

    fn commit(&self, message: &str) -> Result<i32, RuntimeError> {
        self.git(argv(["git", "commit", "-m", message]), "git")
    }

    fn has_local_changes(&self) -> Result<bool, RuntimeError> {
        let out = self
            .runner
            .capture(&argv(["git", "diff-index", "--quiet", "HEAD", "--"]), Some(&self.root))?;
        debug!("git diff-index exited with {}", out.code);
        match out.code {
            0 => Ok(false),
            1 => Ok(true),
            code => Err(RuntimeError::CommandFailed {
                command: "git diff-index --quiet HEAD --".to_owned(),
                code,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingRunner;

    #[test]
    fn subtree_add_squashes_into_prefix() {
        let runner = Arc::new(RecordingRunner::new());
        let git = GitCli::new("/srv/stack", runner.clone());
        git.add_subtree("apps/widget", "git@host/widget.git", "main", true)
            .unwrap();
        assert_eq!(
            runner.calls()[0],
            [
                "git",
                "subtree",
                "add",
                "--prefix=apps/widget",
                "git@host/widget.git",
                "main",
                "--squash"
            ]
        );
    }

    #[test]
    fn dirty_tree_detection() {
        let runner = Arc::new(RecordingRunner::new());
        let git = GitCli::new("/srv/stack", runner.clone());
        runner.respond("git diff-index", 0, "");
        assert!(!git.has_local_changes().unwrap());

        let runner = Arc::new(RecordingRunner::new());
        let git = GitCli::new("/srv/stack", runner.clone());
        runner.respond("git diff-index", 1, "");
        assert!(git.has_local_changes().unwrap());

        let runner = Arc::new(RecordingRunner::new());
        let git = GitCli::new("/srv/stack", runner.clone());
        runner.respond("git diff-index", 128, "");
        assert!(git.has_local_changes().is_err());
    }

    #[test]
    fn split_names_the_new_branch() {
        let runner = Arc::new(RecordingRunner::new());
        let git = GitCli::new("/srv/stack", runner.clone());
        git.split_subtree("apps/widget", "feature-x").unwrap();
        assert_eq!(
            runner.calls()[0][3..],
            ["--prefix=apps/widget", "--branch", "feature-x"]
        );
    }
}
