use super::{spin_fail, spin_ok, spinner, EXIT_FAILURE, EXIT_SUCCESS};
use stack_core::Orchestrator;

pub fn run(orch: &Orchestrator, app: Option<&str>) -> Result<u8, String> {
    let pb = spinner("checking stack...");
    if orch.check(app) {
        spin_ok(&pb, "stack is valid");
        Ok(EXIT_SUCCESS)
    } else {
        spin_fail(&pb, "stack is invalid, see above for details");
        Ok(EXIT_FAILURE)
    }
}
