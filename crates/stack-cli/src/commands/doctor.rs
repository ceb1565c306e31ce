use super::{json_pretty, EXIT_FAILURE, EXIT_SUCCESS};
use stack_core::{ServiceResolver, StackLock, ENV_FILE_NAME};
use stack_schema::{ConfigStore, DEFAULT_COMPOSE_COMMAND};
use std::path::Path;

pub fn run(root: &Path, json_output: bool) -> Result<u8, String> {
    let mut checks: Vec<Check> = Vec::new();
    let mut all_pass = true;
    let config = ConfigStore::new(root);

    check_tools(&config, &mut checks, &mut all_pass);
    let manifests_ok = check_manifests(&config, &mut checks, &mut all_pass);
    if manifests_ok {
        check_layout(&config, &mut checks);
    }
    check_lock(config.root(), &mut checks);

    print_results(&checks, all_pass, json_output)
}

fn check_tools(config: &ConfigStore, checks: &mut Vec<Check>, all_pass: &mut bool) {
    let compose = config
        .stack()
        .ok()
        .and_then(|s| s.compose_command().into_iter().next())
        .unwrap_or_else(|| DEFAULT_COMPOSE_COMMAND.to_owned());
    let missing = stack_runtime::check_tool_prereqs(&compose);
    if missing.is_empty() {
        checks.push(Check::pass("tools", "All external tools found"));
        return;
    }

    let (required, optional): (Vec<_>, Vec<_>) = missing.into_iter().partition(|m| m.required);
    if !required.is_empty() {
        *all_pass = false;
        checks.push(Check::fail(
            "tools",
            &stack_runtime::format_missing(&required),
        ));
    }
    for m in optional {
        checks.push(Check::warn(
            "optional_tools",
            &format!("{} not found: needed for {}", m.name, m.purpose),
        ));
    }
}

fn check_manifests(config: &ConfigStore, checks: &mut Vec<Check>, all_pass: &mut bool) -> bool {
    let mut ok = true;

    match config.compose_file() {
        Some(path) => match config.load_services() {
            Ok(manifest) => checks.push(Check::pass(
                "compose_manifest",
                &format!(
                    "{} defines {} services",
                    path.display(),
                    manifest.services.len()
                ),
            )),
            Err(e) => {
                ok = false;
                checks.push(Check::fail("compose_manifest", &e.to_string()));
            }
        },
        None => {
            ok = false;
            checks.push(Check::fail(
                "compose_manifest",
                &format!("No docker-compose.yml in {}", config.root().display()),
            ));
        }
    }

    match config.stack_file() {
        Some(path) => match config.load_stack() {
            Ok(_) => checks.push(Check::pass(
                "stack_manifest",
                &format!("{} parses", path.display()),
            )),
            Err(e) => {
                ok = false;
                checks.push(Check::fail("stack_manifest", &e.to_string()));
            }
        },
        None => {
            ok = false;
            checks.push(Check::fail(
                "stack_manifest",
                &format!("No stack.yml in {}", config.root().display()),
            ));
        }
    }

    if !ok {
        *all_pass = false;
    }
    ok
}

fn check_layout(config: &ConfigStore, checks: &mut Vec<Check>) {
    let Ok(stack) = config.stack() else {
        return;
    };

    let resolver = ServiceResolver::new(config);
    if let Ok(built) = resolver.list_built_services() {
        checks.push(Check::info(
            "built_apps",
            &format!("{} apps are built from source", built.len()),
        ));
    }

    let apps = config.root().join(stack.apps_directory());
    if apps.is_dir() {
        checks.push(Check::pass("apps_directory", &format!("{} exists", apps.display())));
    } else {
        checks.push(Check::info(
            "apps_directory",
            &format!("{} does not exist yet (run init or clone)", apps.display()),
        ));
    }

    let hooks = config.root().join(stack.hooks_directory());
    if hooks.is_dir() {
        checks.push(Check::pass("hooks_directory", &format!("{} exists", hooks.display())));
    } else {
        checks.push(Check::info(
            "hooks_directory",
            &format!("No hooks directory at {}", hooks.display()),
        ));
    }

    if config.root().join(ENV_FILE_NAME).is_file() {
        checks.push(Check::pass("env_file", "Secrets file .env present"));
    } else if stack.secrets.is_some() {
        checks.push(Check::warn(
            "env_file",
            "No .env yet; run `stack secrets` to fetch it",
        ));
    }
}

fn check_lock(root: &Path, checks: &mut Vec<Check>) {
    if !StackLock::path_for(root).exists() {
        return;
    }
    match StackLock::try_acquire(root) {
        Ok(Some(_)) => checks.push(Check::pass("stack_lock", "Stack lock is free")),
        Ok(None) => checks.push(Check::warn(
            "stack_lock",
            "Stack lock is held by another stack command",
        )),
        Err(e) => checks.push(Check::warn(
            "stack_lock",
            &format!("Cannot check stack lock: {e}"),
        )),
    }
}

fn print_results(checks: &[Check], all_pass: bool, json_output: bool) -> Result<u8, String> {
    if json_output {
        let json = serde_json::json!({
            "healthy": all_pass,
            "checks": checks.iter().map(|c| serde_json::json!({
                "name": c.name,
                "status": c.status,
                "message": c.message,
            })).collect::<Vec<_>>(),
        });
        println!("{}", json_pretty(&json)?);
    } else {
        println!("Stack Doctor\n");
        for check in checks {
            let icon = match check.status {
                "pass" => "✓",
                "fail" => "✗",
                "warn" => "⚠",
                _ => "ℹ",
            };
            println!("  {icon} {}", check.message);
        }
        println!();
        if all_pass {
            println!("All checks passed.");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }
    Ok(if all_pass { EXIT_SUCCESS } else { EXIT_FAILURE })
}

struct Check {
    name: &'static str,
    status: &'static str,
    message: String,
}

impl Check {
    fn new(name: &'static str, status: &'static str, message: &str) -> Self {
        Self {
            name,
            status,
            message: message.to_owned(),
        }
    }

    fn pass(name: &'static str, message: &str) -> Self {
        Self::new(name, "pass", message)
    }

    fn fail(name: &'static str, message: &str) -> Self {
        Self::new(name, "fail", message)
    }

    fn warn(name: &'static str, message: &str) -> Self {
        Self::new(name, "warn", message)
    }

    fn info(name: &'static str, message: &str) -> Self {
        Self::new(name, "info", message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_directory_fails_manifest_checks() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigStore::new(dir.path());
        let mut checks = Vec::new();
        let mut all_pass = true;
        assert!(!check_manifests(&config, &mut checks, &mut all_pass));
        assert!(!all_pass);
        assert!(checks.iter().all(|c| c.status == "fail"));
    }

    #[test]
    fn valid_stack_reports_layout() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("docker-compose.yml"),
            "services:\n  web:\n    build: ./apps/web\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("stack.yml"), "stack:\n  secrets:\n    name: dev\n").unwrap();
        std::fs::create_dir(dir.path().join("hooks")).unwrap();

        let config = ConfigStore::new(dir.path());
        let mut checks = Vec::new();
        let mut all_pass = true;
        assert!(check_manifests(&config, &mut checks, &mut all_pass));
        assert!(all_pass);

        check_layout(&config, &mut checks);
        let status_of = |name: &str| checks.iter().find(|c| c.name == name).map(|c| c.status);
        assert_eq!(status_of("built_apps"), Some("info"));
        assert_eq!(status_of("apps_directory"), Some("info"));
        assert_eq!(status_of("hooks_directory"), Some("pass"));
        assert_eq!(status_of("env_file"), Some("warn"));
    }
}
