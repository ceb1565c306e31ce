use super::EXIT_SUCCESS;
use stack_core::{Orchestrator, UpOptions};

pub fn run(orch: &Orchestrator, options: &UpOptions) -> Result<u8, String> {
    orch.up(options).map_err(|e| e.to_string())?;
    Ok(EXIT_SUCCESS)
}
