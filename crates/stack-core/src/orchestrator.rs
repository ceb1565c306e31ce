use crate::check::PreconditionChecker;
use crate::concurrency::shutdown_requested;
use crate::envfile::{write_env_file, ENV_FILE_NAME};
use crate::flags::{down_flags, recreate_flags, up_flags};
use crate::resolver::ServiceResolver;
use crate::CoreError;
use stack_runtime::process::argv;
use stack_runtime::{
    quote_identifier, AwsSecretsManager, CommandRunner, Compose, Confirm, ConnectParams,
    ContainerEngine, DatabaseAdmin, DockerCli, GitCli, HookRunner, MysqlCli, ProcessRunner,
    SecretStore, Vcs,
};
use stack_schema::{ConfigStore, DatabaseSpec, IndexSpec, PackageSpec, ServiceName};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The external capabilities an orchestrator drives.
pub struct Backends {
    pub runner: Arc<dyn CommandRunner>,
    pub engine: Arc<dyn ContainerEngine>,
    pub vcs: Arc<dyn Vcs>,
    pub secrets: Arc<dyn SecretStore>,
    pub database: Arc<dyn DatabaseAdmin>,
    pub confirm: Arc<dyn Confirm>,
}

impl Backends {
    /// `docker`, `git`, `aws` and `mysql` from `PATH`.
    pub fn system(root: &Path, confirm: Arc<dyn Confirm>) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::new());
        Self {
            engine: Arc::new(DockerCli::new(Arc::clone(&runner))),
            vcs: Arc::new(GitCli::new(root, Arc::clone(&runner))),
            secrets: Arc::new(AwsSecretsManager::new(Arc::clone(&runner))),
            database: Arc::new(MysqlCli::new()),
            confirm,
            runner,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpOptions {
    pub detached: bool,
    pub clean: bool,
    pub flags: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DownOptions {
    pub clean: bool,
    pub flags: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReupOptions {
    pub clean: bool,
    pub purge: bool,
    /// Let compose recreate dependent services too.
    pub recreate: bool,
    pub flags: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CheckoutOptions {
    /// Split the existing subtree onto a new branch instead of replacing it.
    pub new_branch: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogOptions {
    pub minutes: Option<u32>,
    pub lines: Option<u32>,
    pub follow: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretsOutcome {
    Written(PathBuf),
    /// `.env` exists and overwriting was not forced; nothing was fetched.
    Exists(PathBuf),
    /// The secret store has no secret under this name.
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    pub service: ServiceName,
    /// `None` when the service has no container name to look up.
    pub container: Option<String>,
    /// `None` when no such container exists.
    pub status: Option<String>,
}

/// Runs lifecycle operations against one stack.
///
/// Every operation resolves and validates before its first externally
/// visible action, brackets its mutations with hooks, and maps non-zero
/// tool exits to errors only where a later step would build on a failed one.
pub struct Orchestrator {
    config: ConfigStore,
    backends: Backends,
    compose: Compose,
    hooks: HookRunner,
}

impl Orchestrator {
    pub fn new(config: ConfigStore, backends: Backends) -> Result<Self, CoreError> {
        let (program, hooks_dir) = {
            let stack = config.stack()?;
            (
                stack.compose_command(),
                config.root().join(stack.hooks_directory()),
            )
        };
        let compose = Compose::new(program, config.root(), Arc::clone(&backends.runner));
        let hooks = HookRunner::new(hooks_dir, Arc::clone(&backends.runner))
            .with_working_dir(config.root());
        Ok(Self {
            config,
            backends,
            compose,
            hooks,
        })
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn root(&self) -> &Path {
        self.config.root()
    }

    pub fn hooks(&self) -> &HookRunner {
        &self.hooks
    }

    pub fn resolver(&self) -> ServiceResolver<'_> {
        ServiceResolver::new(&self.config)
    }

    pub fn checker(&self) -> PreconditionChecker<'_> {
        PreconditionChecker::new(self.resolver(), self.backends.engine.as_ref())
    }

    pub fn check(&self, service: Option<&str>) -> bool {
        self.checker().check(service)
    }

    /// Apply `f` to every service, logging failures and carrying on.
    fn for_each(
        &self,
        operation: &'static str,
        services: &[ServiceName],
        mut f: impl FnMut(&str) -> Result<(), CoreError>,
    ) -> Result<(), CoreError> {
        let mut failed = 0;
        for service in services {
            if shutdown_requested() {
                warn!("interrupted before {operation} of {service}");
                return Err(CoreError::Interrupted);
            }
            if let Err(e) = f(service) {
                error!("{e}");
                failed += 1;
            }
        }
        if failed == 0 {
            Ok(())
        } else {
            Err(CoreError::Partial {
                operation,
                failed,
                total: services.len(),
            })
        }
    }

    // ---- images ----

    pub fn build(&self, service: Option<&str>) -> Result<(), CoreError> {
        match service {
            Some(service) => self.build_service(service),
            None => {
                let services = self.resolver().list_built_services()?;
                self.for_each("build", &services, |s| self.build_service(s))
            }
        }
    }

    fn build_service(&self, service: &str) -> Result<(), CoreError> {
        let resolver = self.resolver();
        resolver.require(service)?;
        if !resolver.is_built(service)? {
            info!("({service}) not a built service, nothing to build");
            return Ok(());
        }
        if !self.checker().check_build_context(service) {
            return Err(CoreError::InvalidBuildContext {
                service: service.to_owned(),
            });
        }

        self.hooks.run("pre-build", Some(service), &[]);
        info!("({service}) building");
        let code = self.compose.build_no_cache(service)?;
        if code != 0 {
            return Err(CoreError::BuildFailed {
                service: service.to_owned(),
                code,
            });
        }
        self.hooks.run("post-build", Some(service), &[]);
        info!("({service}) built");
        Ok(())
    }

    /// Remove the local images of built services. Returns how many were
    /// removed; services without a local image are skipped.
    pub fn clean(&self, service: Option<&str>) -> Result<usize, CoreError> {
        let resolver = self.resolver();
        let services = match service {
            Some(service) => vec![resolver.require(service)?],
            None => resolver.list_services()?,
        };
        let mut removed = 0;
        for service in &services {
            if shutdown_requested() {
                return Err(CoreError::Interrupted);
            }
            if self.clean_service(service)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn clean_service(&self, service: &str) -> Result<bool, CoreError> {
        let resolver = self.resolver();
        if !resolver.is_built(service)? {
            debug!("({service}) not a built service, no need to clean images");
            return Ok(false);
        }
        let Some(image) = resolver.get_image_name(service)? else {
            debug!("({service}) no image name configured, nothing to clean");
            return Ok(false);
        };
        if self.backends.engine.get_image(&image)?.is_none() {
            debug!("({service}) image '{image}' not present locally");
            return Ok(false);
        }

        self.hooks.run("pre-clean", Some(service), &[]);
        self.backends.engine.remove_image(&image)?;
        info!("({service}) removed image '{image}'");
        self.hooks.run("post-clean", Some(service), &[]);
        Ok(true)
    }

    // ---- whole stack ----

    pub fn up(&self, options: &UpOptions) -> Result<(), CoreError> {
        if !self.check(None) {
            return Err(CoreError::InvalidStack);
        }
        if options.clean {
            self.clean(None)?;
        }

        let resolver = self.resolver();
        let mut stale = Vec::new();
        for service in resolver.list_built_services()? {
            let present = match resolver.get_image_name(&service)? {
                Some(image) => self.backends.engine.get_image(&image)?.is_some(),
                None => false,
            };
            if !present {
                stale.push(service);
            }
        }
        self.for_each("build", &stale, |s| self.build_service(s))?;

        self.hooks.run("pre-up", None, &[]);
        info!("bringing the stack up");
        let code = self
            .compose
            .up(&up_flags(options.detached, options.flags.as_deref()))?;
        if code != 0 {
            return Err(CoreError::ProcessFailed {
                service: "stack".to_owned(),
                operation: "up".to_owned(),
                code,
            });
        }
        self.hooks.run("post-up", None, &[]);
        Ok(())
    }

    pub fn down(&self, options: &DownOptions) -> Result<(), CoreError> {
        info!("bringing the stack down");
        let code = self
            .compose
            .down(&down_flags(options.clean, options.flags.as_deref()))?;
        if code != 0 {
            return Err(CoreError::ProcessFailed {
                service: "stack".to_owned(),
                operation: "down".to_owned(),
                code,
            });
        }
        Ok(())
    }

    // ---- one service ----

    /// Recreate one service: optionally rebuild it, stop and remove its
    /// containers, optionally reset its database, then create and start it.
    pub fn reup(&self, service: &str, options: &ReupOptions) -> Result<(), CoreError> {
        self.resolver().require(service)?;

        if options.clean {
            self.clean_service(service)?;
            self.build_service(service)?;
        }

        let code = self.compose.stop_and_remove(service)?;
        if code != 0 {
            warn!("({service}) stop and remove exited with code {code}");
        }

        self.hooks.run("pre-up", Some(service), &[]);

        if options.purge {
            if self
                .backends
                .confirm
                .confirm("This will remove all app data, continue?", true)
            {
                warn!("({service}) database will be purged");
                self.purge(service)?;
            } else {
                info!("({service}) purge declined");
            }
        } else {
            debug!("({service}) database will not be purged");
        }

        let flags = recreate_flags(options.recreate, options.flags.as_deref());
        let code = self.compose.create(service, &flags)?;
        if code != 0 {
            warn!("({service}) create exited with code {code}");
        }
        let code = self.compose.start(service)?;
        if code != 0 {
            warn!("({service}) start exited with code {code}");
        }

        self.hooks.run("post-up", Some(service), &[]);
        Ok(())
    }

    /// Drop and recreate the service's database. Returns `false` when no
    /// database service could be identified and nothing was done.
    pub fn purge(&self, service: &str) -> Result<bool, CoreError> {
        let spec = self.config.stack()?.database.clone().unwrap_or_default();
        let Some(db) = self.find_database_service(&spec)? else {
            return Ok(false);
        };
        let resolver = self.resolver();

        let password = resolver
            .get_environment(&db)?
            .remove(&spec.password_variable)
            .unwrap_or_else(|| {
                warn!("({db}) no {} in its environment", spec.password_variable);
                String::new()
            });
        let port = resolver
            .get_external_port(&db, &spec.port)?
            .ok_or_else(|| CoreError::PurgeFailed {
                service: service.to_owned(),
                reason: format!("{db} does not publish port {}", spec.port),
            })?;

        let params = ConnectParams {
            host: "127.0.0.1".to_owned(),
            port,
            user: spec.user.clone(),
            password,
        };
        let mut session =
            self.backends
                .database
                .connect(&params)
                .map_err(|e| CoreError::PurgeFailed {
                    service: service.to_owned(),
                    reason: e.to_string(),
                })?;

        let name = quote_identifier(&ServiceName::from(service).database_name());
        session.execute(&format!("DROP DATABASE IF EXISTS {name}"))?;
        session.execute(&format!("CREATE DATABASE {name}"))?;
        session.close()?;
        info!("({service}) database {name} on {db} purged");
        Ok(true)
    }

    fn find_database_service(&self, spec: &DatabaseSpec) -> Result<Option<ServiceName>, CoreError> {
        let resolver = self.resolver();
        if let Some(service) = &spec.service {
            return Ok(Some(resolver.require(service)?));
        }

        let mut found = Vec::new();
        for service in resolver.list_services()? {
            if resolver
                .get_image_name(&service)?
                .is_some_and(|image| image.contains(spec.marker.as_str()))
            {
                found.push(service);
            }
        }
        match found.len() {
            0 => {
                warn!(
                    "no database service found (no image contains '{}'), skipping purge",
                    spec.marker
                );
                Ok(None)
            }
            1 => Ok(found.pop()),
            _ => {
                let names: Vec<&str> = found.iter().map(ServiceName::as_str).collect();
                warn!(
                    "several database services found ({}), set database.service; skipping purge",
                    names.join(", ")
                );
                Ok(None)
            }
        }
    }

    pub fn status(&self, service: Option<&str>) -> Result<Vec<ServiceStatus>, CoreError> {
        let resolver = self.resolver();
        let services = match service {
            Some(service) => vec![resolver.require(service)?],
            None => resolver.list_services()?,
        };
        let mut statuses = Vec::with_capacity(services.len());
        for service in services {
            let container = resolver.get_container_name(&service)?;
            let status = match &container {
                Some(name) => self.backends.engine.container_status(name)?,
                None => None,
            };
            match (&container, &status) {
                (None, _) => debug!("({service}) no container name, skipping status check"),
                (Some(_), Some(status)) => debug!("({service}) status: {status}"),
                (Some(name), None) => warn!("({service}) container '{name}' not found"),
            }
            statuses.push(ServiceStatus {
                service,
                container,
                status,
            });
        }
        Ok(statuses)
    }

    /// A service counts as running when its container is, or when it has no
    /// container name to check.
    fn is_running(&self, service: &str) -> Result<bool, CoreError> {
        let Some(name) = self.resolver().get_container_name(service)? else {
            return Ok(true);
        };
        Ok(self
            .backends
            .engine
            .get_container(&name)?
            .is_some_and(|c| c.is_running()))
    }

    pub fn logs(&self, service: &str, options: &LogOptions) -> Result<i32, CoreError> {
        let resolver = self.resolver();
        resolver.require(service)?;
        if let Some(minutes) = options.minutes {
            let container =
                resolver
                    .get_container_name(service)?
                    .ok_or_else(|| CoreError::PropertyNotFound {
                        service: service.to_owned(),
                        property: "container_name".to_owned(),
                    })?;
            let mut args = argv(["docker", "logs", "-t", "--since"]);
            args.push(format!("{minutes}m"));
            if options.follow {
                args.push("-f".to_owned());
            }
            args.push(container);
            return Ok(self.backends.runner.run_attached(&args, Some(self.root()))?);
        }
        Ok(self.compose.logs(service, options.lines, options.follow)?)
    }

    pub fn shell(&self, service: &str, use_sh: bool) -> Result<i32, CoreError> {
        self.resolver().require(service)?;
        if !self.is_running(service)? {
            return Err(CoreError::NotRunning(service.to_owned()));
        }
        let shell = if use_sh { "/bin/sh" } else { "/bin/bash" };
        Ok(self.compose.exec_attached(service, &[shell.to_owned()])?)
    }

    // ---- app subtrees ----

    fn ensure_clean_tree(&self) -> Result<(), CoreError> {
        if self.backends.vcs.has_local_changes()? {
            error!("current working copy has changes, cannot update app subtrees");
            return Err(CoreError::DirtyWorkingTree);
        }
        Ok(())
    }

    fn repository(&self, service: &str) -> Result<String, CoreError> {
        self.resolver()
            .get_repo_url(service)?
            .ok_or_else(|| CoreError::PropertyNotFound {
                service: service.to_owned(),
                property: "repository".to_owned(),
            })
    }

    fn branch(&self, service: &str) -> Result<String, CoreError> {
        self.resolver()
            .get_repo_branch(service)?
            .ok_or_else(|| CoreError::PropertyNotFound {
                service: service.to_owned(),
                property: "branch".to_owned(),
            })
    }

    /// Add the service's repository at `branch` as a squashed subtree,
    /// replacing an existing one when `replace` is set. `step` names the
    /// hooks that bracket the operation.
    fn place_subtree(
        &self,
        service: &str,
        branch: &str,
        step: &str,
        replace: bool,
    ) -> Result<(), CoreError> {
        let resolver = self.resolver();
        resolver.require(service)?;
        let repository = self.repository(service)?;
        let prefix = resolver.subtree_prefix(service)?;
        let path = resolver.subtree_path(service)?;
        if path.exists() && !replace {
            return Err(CoreError::SubtreeExists {
                service: service.to_owned(),
                path: prefix,
            });
        }

        let hook_args = [path.display().to_string()];
        self.hooks.run(&format!("pre-{step}"), Some(service), &hook_args);

        if path.exists() {
            self.remove_subtree(service, &prefix, &path, branch)?;
        }

        info!("({service}) adding {repository} ({branch}) at {prefix}");
        let code = self
            .backends
            .vcs
            .add_subtree(&prefix, &repository, branch, true)?;
        if code != 0 {
            error!("({service}) subtree add exited with code {code}");
            return Err(CoreError::ProcessFailed {
                service: service.to_owned(),
                operation: "subtree add".to_owned(),
                code,
            });
        }

        self.hooks.run(&format!("post-{step}"), Some(service), &hook_args);
        Ok(())
    }

    fn remove_subtree(
        &self,
        service: &str,
        prefix: &str,
        path: &Path,
        branch: &str,
    ) -> Result<(), CoreError> {
        info!("({service}) removing subtree {prefix}");
        let code = self.backends.vcs.remove_path(prefix)?;
        if code != 0 {
            warn!("({service}) removing {prefix} from the index exited with code {code}");
        }
        if path.exists() {
            std::fs::remove_dir_all(path)?;
        }
        let message = format!("Stack op: Removing subtree {service} for cloning branch {branch}");
        let code = self.backends.vcs.commit(&message)?;
        if code != 0 {
            warn!("({service}) commit of subtree removal exited with code {code}");
        }
        Ok(())
    }

    /// Fetch a service's repository into a new subtree. Refuses when the
    /// subtree already exists.
    pub fn clone_service(&self, service: &str, branch: &str) -> Result<(), CoreError> {
        self.place_subtree(service, branch, "clone", false)
    }

    /// (Re)create the subtree of one service, or of every built service
    /// that has a repository and branch configured.
    pub fn init(&self, service: Option<&str>) -> Result<(), CoreError> {
        let resolver = self.resolver();
        let candidates = match service {
            Some(service) => {
                resolver.require(service)?;
                self.repository(service)?;
                self.branch(service)?;
                vec![ServiceName::from(service)]
            }
            None => {
                let mut candidates = Vec::new();
                for service in resolver.list_built_services()? {
                    if resolver.get_repo_url(&service)?.is_some()
                        && resolver.get_repo_branch(&service)?.is_some()
                    {
                        candidates.push(service);
                    }
                }
                candidates
            }
        };
        if candidates.is_empty() {
            info!("no services with a repository and branch to initialize");
            return Ok(());
        }

        self.ensure_clean_tree()?;
        self.for_each("initialize", &candidates, |service| {
            let branch = self.branch(service)?;
            self.place_subtree(service, &branch, "clone", true)
        })
    }

    pub fn checkout(
        &self,
        service: &str,
        branch: &str,
        options: CheckoutOptions,
    ) -> Result<(), CoreError> {
        if !options.new_branch {
            self.ensure_clean_tree()?;
            return self.place_subtree(service, branch, "checkout", true);
        }

        let resolver = self.resolver();
        resolver.require(service)?;
        let prefix = resolver.subtree_prefix(service)?;
        let path = resolver.subtree_path(service)?;
        if !path.exists() {
            return Err(CoreError::SubtreeMissing {
                service: service.to_owned(),
                path: prefix,
            });
        }

        let hook_args = [path.display().to_string()];
        self.hooks.run("pre-checkout", Some(service), &hook_args);
        info!("({service}) splitting {prefix} onto new branch {branch}");
        let code = self.backends.vcs.split_subtree(&prefix, branch)?;
        if code != 0 {
            return Err(CoreError::ProcessFailed {
                service: service.to_owned(),
                operation: "subtree split".to_owned(),
                code,
            });
        }
        self.hooks.run("post-checkout", Some(service), &hook_args);
        Ok(())
    }

    /// Replace the subtree of one service, or of every service with a
    /// branch configured, with a fresh copy of its branch.
    pub fn update(&self, service: Option<&str>) -> Result<(), CoreError> {
        let resolver = self.resolver();
        let services = match service {
            Some(service) => vec![resolver.require(service)?],
            None => resolver.list_services()?,
        };
        let mut candidates = Vec::new();
        for service in services {
            if resolver.get_repo_branch(&service)?.is_some() {
                candidates.push(service);
            } else {
                debug!("({service}) no branch configured, not updating");
            }
        }

        self.ensure_clean_tree()?;

        let names: Vec<&str> = candidates.iter().map(ServiceName::as_str).collect();
        info!("will update {}", names.join(", "));
        self.for_each("update", &candidates, |service| {
            let branch = self.branch(service)?;
            self.place_subtree(service, &branch, "checkout", true)
        })
    }

    pub fn pull(&self, service: &str, branch: &str, squash: bool) -> Result<(), CoreError> {
        let resolver = self.resolver();
        resolver.require(service)?;
        let repository = self.repository(service)?;
        let prefix = resolver.subtree_prefix(service)?;
        if !resolver.subtree_path(service)?.exists() {
            return Err(CoreError::SubtreeMissing {
                service: service.to_owned(),
                path: prefix,
            });
        }

        info!("({service}) pulling {repository} ({branch}) into {prefix}");
        let code = self
            .backends
            .vcs
            .pull_subtree(&prefix, &repository, branch, squash)?;
        if code != 0 {
            return Err(CoreError::ProcessFailed {
                service: service.to_owned(),
                operation: "subtree pull".to_owned(),
                code,
            });
        }
        Ok(())
    }

    // ---- packages ----

    /// Build and upload stack packages to the package index, then reinstall
    /// them in the running apps that depend on them.
    pub fn packages(&self, package: Option<&str>) -> Result<(), CoreError> {
        let stack = self.config.stack()?;
        let index = stack
            .index
            .clone()
            .ok_or_else(|| CoreError::StackPropertyNotFound("index".to_owned()))?;
        let packages: Vec<PackageSpec> = match package {
            Some(name) => vec![stack
                .package(name)
                .cloned()
                .ok_or_else(|| CoreError::StackPropertyNotFound(format!("packages.{name}")))?],
            None => stack.packages.clone(),
        };

        for package in &packages {
            if shutdown_requested() {
                return Err(CoreError::Interrupted);
            }
            self.publish_package(&index, package)?;
            info!("package '{}' was updated", package.name);
            self.reinstall_package(&package.name)?;
        }
        Ok(())
    }

    fn publish_package(&self, index: &IndexSpec, package: &PackageSpec) -> Result<(), CoreError> {
        let resolver = self.resolver();
        let failed = |reason: String| CoreError::PackageFailed {
            package: package.name.clone(),
            reason,
        };

        let port = resolver
            .get_external_port(&index.service, &index.port)?
            .ok_or_else(|| {
                failed(format!(
                    "index service {} does not publish port {}",
                    index.service, index.port
                ))
            })?;
        let url = format!("http://localhost:{port}{}", index.path);
        let password = resolver
            .get_environment(&index.service)?
            .remove(&index.password_variable)
            .unwrap_or_default();

        let source = self.root().join(&package.path);
        let code = self
            .backends
            .runner
            .run(&package.build.to_args(), Some(&source), &package.name)?;
        if code != 0 {
            return Err(failed(format!("build exited with code {code}")));
        }

        let dist = source.join("dist");
        let mut files: Vec<String> = std::fs::read_dir(&dist)
            .map_err(|e| failed(format!("cannot read {}: {e}", dist.display())))?
            .filter_map(Result::ok)
            .map(|entry| entry.path().display().to_string())
            .collect();
        if files.is_empty() {
            return Err(failed(format!("nothing to upload in {}", dist.display())));
        }
        files.sort();

        let mut upload = argv(["twine", "upload"]);
        upload.extend(files);
        upload.extend(argv(["--repository-url", url.as_str(), "--skip-existing"]));
        upload.extend(argv(["-u", index.user.as_str(), "-p", password.as_str()]));
        let code = self.backends.runner.run(&upload, Some(&source), &package.name)?;
        if code != 0 {
            return Err(failed(format!("upload exited with code {code}")));
        }
        Ok(())
    }

    fn reinstall_package(&self, package: &str) -> Result<(), CoreError> {
        let resolver = self.resolver();
        for service in resolver.list_services()? {
            if !resolver.get_packages(&service)?.iter().any(|p| p == package) {
                continue;
            }
            let app = service.as_str();
            if !self.is_running(app)? {
                error!("({app}) not running, cannot reinstall '{package}'");
                continue;
            }
            info!("({app}) depends on '{package}', reinstalling");
            let code = self
                .compose
                .exec(app, &argv(["pip", "uninstall", "-y", package]))?;
            if code != 0 {
                error!("({app}) uninstall of '{package}' exited with code {code}");
                continue;
            }
            let code = self.compose.exec(app, &argv(["pip", "install", package]))?;
            if code == 0 {
                info!("({app}) reinstalled '{package}'");
            } else {
                error!("({app}) install of '{package}' exited with code {code}");
            }
        }
        Ok(())
    }

    // ---- secrets ----

    /// Fetch the stack's secret into `.env`. An existing file is left alone
    /// unless `force` is set, before the secret store is contacted.
    pub fn secrets(&self, force: bool) -> Result<SecretsOutcome, CoreError> {
        let spec = self
            .config
            .stack()?
            .secrets
            .clone()
            .ok_or_else(|| CoreError::StackPropertyNotFound("secrets".to_owned()))?;

        let path = self.root().join(ENV_FILE_NAME);
        if path.exists() && !force {
            warn!(
                "(secrets) {} already exists, run with --force to overwrite",
                path.display()
            );
            return Ok(SecretsOutcome::Exists(path));
        }

        let secret = match self.backends.secrets.fetch(&spec) {
            Ok(secret) => secret,
            Err(e) if e.is_recoverable() => {
                error!("(secrets) {e}");
                return Ok(SecretsOutcome::NotFound(spec.name));
            }
            Err(e) => return Err(e.into()),
        };

        write_env_file(&path, &secret)?;
        info!("(secrets) fetched and saved secrets to {}", path.display());
        self.hooks.run("post-secrets", None, &[]);
        Ok(SecretsOutcome::Written(path))
    }
}
