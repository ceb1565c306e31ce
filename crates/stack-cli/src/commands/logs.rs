use super::exit_status;
use stack_core::{LogOptions, Orchestrator};

pub fn run(orch: &Orchestrator, app: &str, options: &LogOptions) -> Result<u8, String> {
    let code = orch.logs(app, options).map_err(|e| e.to_string())?;
    Ok(exit_status(code))
}
