use super::EXIT_SUCCESS;
use stack_core::{Orchestrator, SecretsOutcome};

/// Both refusals are reported but exit 0: an existing `.env` is kept on
/// purpose, and a secret that does not exist yet is not a failure.
pub fn run(orch: &Orchestrator, force: bool) -> Result<u8, String> {
    match orch.secrets(force).map_err(|e| e.to_string())? {
        SecretsOutcome::Written(path) => println!("secrets written to {}", path.display()),
        SecretsOutcome::Exists(path) => {
            println!("{} already exists, use --force to overwrite it", path.display());
        }
        SecretsOutcome::NotFound(name) => println!("no secret named '{name}', nothing written"),
    }
    Ok(EXIT_SUCCESS)
}
