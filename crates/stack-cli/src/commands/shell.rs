use super::exit_status;
use stack_core::Orchestrator;

pub fn run(orch: &Orchestrator, app: &str, sh: bool) -> Result<u8, String> {
    let code = orch.shell(app, sh).map_err(|e| e.to_string())?;
    Ok(exit_status(code))
}
