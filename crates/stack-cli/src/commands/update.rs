use super::EXIT_SUCCESS;
use stack_core::Orchestrator;

pub fn run(orch: &Orchestrator, app: Option<&str>) -> Result<u8, String> {
    orch.update(app).map_err(|e| e.to_string())?;
    Ok(EXIT_SUCCESS)
}
