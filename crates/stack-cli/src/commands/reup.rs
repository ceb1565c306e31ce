use super::EXIT_SUCCESS;
use stack_core::{Orchestrator, ReupOptions};

pub fn run(orch: &Orchestrator, app: &str, options: &ReupOptions) -> Result<u8, String> {
    orch.reup(app, options).map_err(|e| e.to_string())?;
    println!("{app} recreated");
    Ok(EXIT_SUCCESS)
}
