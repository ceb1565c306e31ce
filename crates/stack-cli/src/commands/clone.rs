use super::EXIT_SUCCESS;
use stack_core::Orchestrator;

pub fn run(orch: &Orchestrator, app: &str, branch: &str) -> Result<u8, String> {
    orch.clone_service(app, branch).map_err(|e| e.to_string())?;
    let path = orch
        .resolver()
        .subtree_prefix(app)
        .map_err(|e| e.to_string())?;
    println!("cloned {app} ({branch}) into {path}");
    Ok(EXIT_SUCCESS)
}
