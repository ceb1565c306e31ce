use super::EXIT_SUCCESS;
use stack_core::Orchestrator;

pub fn run(orch: &Orchestrator, app: &str, branch: &str, squash: bool) -> Result<u8, String> {
    orch.pull(app, branch, squash).map_err(|e| e.to_string())?;
    println!("pulled {branch} into {app}");
    Ok(EXIT_SUCCESS)
}
