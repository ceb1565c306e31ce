use super::EXIT_SUCCESS;
use stack_core::Orchestrator;

pub fn run(orch: &Orchestrator, app: Option<&str>) -> Result<u8, String> {
    let removed = orch.clean(app).map_err(|e| e.to_string())?;
    println!("removed {removed} image(s)");
    Ok(EXIT_SUCCESS)
}
