use super::{spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use stack_core::Orchestrator;

pub fn run(orch: &Orchestrator, app: Option<&str>, clean: bool) -> Result<u8, String> {
    if clean {
        let removed = orch.clean(app).map_err(|e| e.to_string())?;
        println!("removed {removed} image(s)");
    }

    let what = app.unwrap_or("built apps");
    let pb = spinner(&format!("building {what}..."));
    match orch.build(app) {
        Ok(()) => {
            spin_ok(&pb, &format!("built {what}"));
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            spin_fail(&pb, "build failed");
            Err(e.to_string())
        }
    }
}
