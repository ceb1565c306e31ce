//! In-memory stand-ins for every external capability, used by the tests of
//! this crate and of the orchestrator.

use crate::database::{ConnectParams, DatabaseAdmin, DatabaseSession};
use crate::engine::{ContainerEngine, ContainerInfo, ImageInfo};
use crate::process::{CapturedOutput, CommandRunner};
use crate::secrets::{SecretStore, SecretValue};
use crate::vcs::Vcs;
use crate::{RuntimeError, SecretError};
use stack_schema::SecretsSpec;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use crate::confirm::FixedAnswer;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Records every command instead of running it.
///
/// Responses are matched against the space-joined command line by prefix;
/// the most recently registered match wins. Unmatched `run` calls exit 0,
/// unmatched `capture` calls exit 1 with no output.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<(Vec<String>, Option<PathBuf>)>>,
    responses: Mutex<Vec<(String, CapturedOutput)>>,
    exit_codes: Mutex<Vec<(String, i32)>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, prefix: &str, code: i32, stdout: &str) {
        self.respond_output(
            prefix,
            CapturedOutput {
                code,
                stdout: stdout.to_owned(),
                stderr: String::new(),
            },
        );
    }

    pub fn respond_output(&self, prefix: &str, output: CapturedOutput) {
        lock(&self.responses).push((prefix.to_owned(), output));
    }

    /// Make streamed runs of matching commands exit with `code`.
    pub fn fail_with(&self, prefix: &str, code: i32) {
        lock(&self.exit_codes).push((prefix.to_owned(), code));
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        lock(&self.calls).iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn cwds(&self) -> Vec<Option<PathBuf>> {
        lock(&self.calls).iter().map(|(_, d)| d.clone()).collect()
    }

    /// Calls whose command line starts with `prefix`.
    pub fn calls_matching(&self, prefix: &str) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|c| c.join(" ").starts_with(prefix))
            .collect()
    }

    fn record(&self, args: &[String], cwd: Option<&Path>) -> Result<String, RuntimeError> {
        if args.is_empty() {
            return Err(RuntimeError::EmptyCommand);
        }
        lock(&self.calls).push((args.to_vec(), cwd.map(Path::to_path_buf)));
        Ok(args.join(" "))
    }

    fn response(&self, line: &str) -> Option<CapturedOutput> {
        lock(&self.responses)
            .iter()
            .rev()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, out)| out.clone())
    }

    fn exit_code(&self, line: &str) -> i32 {
        let forced = lock(&self.exit_codes)
            .iter()
            .rev()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, code)| *code);
        forced
            .or_else(|| self.response(line).map(|o| o.code))
            .unwrap_or(0)
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, args: &[String], cwd: Option<&Path>, _tag: &str) -> Result<i32, RuntimeError> {
        let line = self.record(args, cwd)?;
        Ok(self.exit_code(&line))
    }

    fn run_attached(&self, args: &[String], cwd: Option<&Path>) -> Result<i32, RuntimeError> {
        let line = self.record(args, cwd)?;
        Ok(self.exit_code(&line))
    }

    fn capture(&self, args: &[String], cwd: Option<&Path>) -> Result<CapturedOutput, RuntimeError> {
        let line = self.record(args, cwd)?;
        Ok(self.response(&line).unwrap_or(CapturedOutput {
            code: 1,
            ..CapturedOutput::default()
        }))
    }
}

/// A container engine with a fixed set of images and containers.
#[derive(Default)]
pub struct MockEngine {
    local: Mutex<BTreeSet<String>>,
    registry: BTreeSet<String>,
    containers: BTreeMap<String, String>,
    removed: Mutex<Vec<String>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_local_image(self, image: &str) -> Self {
        lock(&self.local).insert(image.to_owned());
        self
    }

    #[must_use]
    pub fn with_registry_image(mut self, image: &str) -> Self {
        self.registry.insert(image.to_owned());
        self
    }

    #[must_use]
    pub fn with_container(mut self, name: &str, status: &str) -> Self {
        self.containers.insert(name.to_owned(), status.to_owned());
        self
    }

    pub fn has_local_image(&self, image: &str) -> bool {
        lock(&self.local).contains(image)
    }

    pub fn removed(&self) -> Vec<String> {
        lock(&self.removed).clone()
    }
}

impl ContainerEngine for MockEngine {
    fn get_image(&self, image: &str) -> Result<Option<ImageInfo>, RuntimeError> {
        Ok(lock(&self.local).contains(image).then(|| ImageInfo {
            name: image.to_owned(),
            id: format!("sha256:mock-{image}"),
        }))
    }

    fn search_registry(&self, image: &str) -> Result<Vec<String>, RuntimeError> {
        let term = crate::engine::strip_tag(image);
        Ok(self
            .registry
            .iter()
            .filter(|name| name.contains(term))
            .cloned()
            .collect())
    }

    fn remove_image(&self, image: &str) -> Result<(), RuntimeError> {
        if !lock(&self.local).remove(image) {
            return Err(RuntimeError::CommandFailed {
                command: format!("docker image rm --force {image}"),
                code: 1,
            });
        }
        lock(&self.removed).push(image.to_owned());
        Ok(())
    }

    fn get_container(&self, name: &str) -> Result<Option<ContainerInfo>, RuntimeError> {
        Ok(self.containers.get(name).map(|status| ContainerInfo {
            name: name.to_owned(),
            status: status.clone(),
        }))
    }
}

/// Subtree operations against a plain directory, with an operation log.
pub struct MockVcs {
    root: PathBuf,
    dirty: AtomicBool,
    fail_add: AtomicBool,
    fail_prefixes: Mutex<BTreeSet<String>>,
    ops: Mutex<Vec<String>>,
}

impl MockVcs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dirty: AtomicBool::new(false),
            fail_add: AtomicBool::new(false),
            fail_prefixes: Mutex::new(BTreeSet::new()),
            ops: Mutex::new(Vec::new()),
        }
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.dirty.store(dirty, Ordering::SeqCst);
    }

    pub fn set_fail_add(&self, fail: bool) {
        self.fail_add.store(fail, Ordering::SeqCst);
    }

    /// Make `subtree add` fail for one prefix only.
    pub fn fail_add_for(&self, prefix: &str) {
        lock(&self.fail_prefixes).insert(prefix.to_owned());
    }

    pub fn ops(&self) -> Vec<String> {
        lock(&self.ops).clone()
    }

    /// Operations other than the read-only dirty check.
    pub fn mutations(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter(|op| op != "diff-index")
            .collect()
    }

    fn log(&self, op: String) {
        lock(&self.ops).push(op);
    }
}

impl Vcs for MockVcs {
    fn add_subtree(
        &self,
        prefix: &str,
        repository: &str,
        branch: &str,
        squash: bool,
    ) -> Result<i32, RuntimeError> {
        let squash_flag = if squash { " --squash" } else { "" };
        self.log(format!("add {prefix} {repository} {branch}{squash_flag}"));
        let target = self.root.join(prefix);
        if self.fail_add.load(Ordering::SeqCst)
            || lock(&self.fail_prefixes).contains(prefix)
            || target.exists()
        {
            return Ok(1);
        }
        std::fs::create_dir_all(&target)?;
        std::fs::write(target.join("BRANCH"), branch)?;
        Ok(0)
    }

    fn pull_subtree(
        &self,
        prefix: &str,
        repository: &str,
        branch: &str,
        squash: bool,
    ) -> Result<i32, RuntimeError> {
        let squash_flag = if squash { " --squash" } else { "" };
        self.log(format!("pull {prefix} {repository} {branch}{squash_flag}"));
        Ok(if self.root.join(prefix).is_dir() { 0 } else { 1 })
    }

    fn split_subtree(&self, prefix: &str, branch: &str) -> Result<i32, RuntimeError> {
        self.log(format!("split {prefix} {branch}"));
        Ok(0)
    }

    fn remove_path(&self, prefix: &str) -> Result<i32, RuntimeError> {
        self.log(format!("rm {prefix}"));
        let target = self.root.join(prefix);
        if target.exists() {
            std::fs::remove_dir_all(target)?;
        }
        Ok(0)
    }

    fn commit(&self, message: &str) -> Result<i32, RuntimeError> {
        self.log(format!("commit {message}"));
        Ok(0)
    }

    fn has_local_changes(&self) -> Result<bool, RuntimeError> {
        self.log("diff-index".to_owned());
        Ok(self.dirty.load(Ordering::SeqCst))
    }
}

enum SecretBehavior {
    Value(SecretValue),
    NotFound,
    Fail(String),
}

/// A secret store that always answers the same way.
pub struct MockSecrets {
    behavior: SecretBehavior,
    fetches: AtomicUsize,
}

impl MockSecrets {
    pub fn value(value: SecretValue) -> Self {
        Self::with(SecretBehavior::Value(value))
    }

    pub fn not_found() -> Self {
        Self::with(SecretBehavior::NotFound)
    }

    pub fn failing(message: &str) -> Self {
        Self::with(SecretBehavior::Fail(message.to_owned()))
    }

    fn with(behavior: SecretBehavior) -> Self {
        Self {
            behavior,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl SecretStore for MockSecrets {
    fn fetch(&self, spec: &SecretsSpec) -> Result<SecretValue, SecretError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            SecretBehavior::Value(v) => Ok(v.clone()),
            SecretBehavior::NotFound => Err(SecretError::NotFound(spec.name.clone())),
            SecretBehavior::Fail(m) => Err(SecretError::InternalService(m.clone())),
        }
    }
}

/// A database server that records statements instead of executing them.
#[derive(Default)]
pub struct MockDatabase {
    fail_connect: bool,
    connections: Mutex<Vec<ConnectParams>>,
    statements: Arc<Mutex<Vec<String>>>,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        Self {
            fail_connect: true,
            ..Self::default()
        }
    }

    pub fn connections(&self) -> Vec<ConnectParams> {
        lock(&self.connections).clone()
    }

    pub fn statements(&self) -> Vec<String> {
        lock(&self.statements).clone()
    }
}

struct MockSession {
    statements: Arc<Mutex<Vec<String>>>,
}

impl DatabaseAdmin for MockDatabase {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn DatabaseSession>, RuntimeError> {
        lock(&self.connections).push(params.clone());
        if self.fail_connect {
            return Err(RuntimeError::Database(format!(
                "can't connect to server on '{}:{}'",
                params.host, params.port
            )));
        }
        Ok(Box::new(MockSession {
            statements: Arc::clone(&self.statements),
        }))
    }
}

impl DatabaseSession for MockSession {
    fn execute(&mut self, statement: &str) -> Result<(), RuntimeError> {
        lock(&self.statements).push(statement.to_owned());
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), RuntimeError> {
        Ok(())
    }
}
