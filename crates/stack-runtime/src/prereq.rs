use std::fmt;
use std::process::Command;

/// A missing external tool with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: String,
    pub purpose: &'static str,
    pub install_hint: &'static str,
    /// Whether every lifecycle command needs it, or only some.
    pub required: bool,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {}){}",
            self.name,
            self.purpose,
            self.install_hint,
            if self.required { "" } else { " [optional]" }
        )
    }
}

fn command_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Check the tools the stack commands shell out to. `compose_program` is the
/// first word of the configured compose command.
pub fn check_tool_prereqs(compose_program: &str) -> Vec<MissingPrereq> {
    let tools: [(&str, &'static str, &'static str, bool); 5] = [
        (
            "docker",
            "container engine for images and containers",
            "https://docs.docker.com/engine/install/",
            true,
        ),
        (
            compose_program,
            "bringing the stack up and down",
            "https://docs.docker.com/compose/install/",
            true,
        ),
        (
            "git",
            "cloning and updating app subtrees",
            "apt install git | dnf install git | pacman -S git",
            true,
        ),
        (
            "aws",
            "fetching secrets into .env",
            "pip install awscli",
            false,
        ),
        (
            "mysql",
            "purging app databases on reup",
            "apt install mysql-client | dnf install mysql",
            false,
        ),
    ];

    let mut checked: Vec<&str> = Vec::new();
    let mut missing = Vec::new();
    for (name, purpose, install_hint, required) in tools {
        // `docker compose` shares its program with the engine.
        if checked.contains(&name) {
            continue;
        }
        checked.push(name);
        if !command_exists(name) {
            missing.push(MissingPrereq {
                name: name.to_owned(),
                purpose,
                install_hint,
                required,
            });
        }
    }
    missing
}

/// Format a list of missing prerequisites into a user-friendly message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nstack drives these tools to build and run the services.");
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_prereq_display() {
        let m = MissingPrereq {
            name: "aws".to_owned(),
            purpose: "fetching secrets",
            install_hint: "pip install awscli",
            required: false,
        };
        let s = format!("{m}");
        assert!(s.contains("aws"));
        assert!(s.contains("fetching secrets"));
        assert!(s.contains("pip install awscli"));
        assert!(s.ends_with("[optional]"));
    }

    #[test]
    fn format_missing_produces_readable_output() {
        let items = vec![
            MissingPrereq {
                name: "docker".to_owned(),
                purpose: "engine",
                install_hint: "get docker",
                required: true,
            },
            MissingPrereq {
                name: "git".to_owned(),
                purpose: "subtrees",
                install_hint: "apt install git",
                required: true,
            },
        ];
        let output = format_missing(&items);
        assert!(output.contains("missing prerequisites:"));
        assert!(output.contains("docker"));
        assert!(output.contains("git"));
    }

    #[test]
    fn unknown_compose_program_is_reported() {
        let missing = check_tool_prereqs("definitely-not-a-compose-binary");
        assert!(missing
            .iter()
            .any(|m| m.name == "definitely-not-a-compose-binary" && m.required));
    }
}
