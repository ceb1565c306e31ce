use super::EXIT_SUCCESS;
use stack_core::{DownOptions, Orchestrator};

pub fn run(orch: &Orchestrator, options: &DownOptions) -> Result<u8, String> {
    orch.down(options).map_err(|e| e.to_string())?;
    Ok(EXIT_SUCCESS)
}
