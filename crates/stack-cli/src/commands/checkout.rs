use super::EXIT_SUCCESS;
use stack_core::{CheckoutOptions, Orchestrator};

pub fn run(
    orch: &Orchestrator,
    app: &str,
    branch: &str,
    options: CheckoutOptions,
) -> Result<u8, String> {
    orch.checkout(app, branch, options)
        .map_err(|e| e.to_string())?;
    if options.new_branch {
        println!("split {app} onto new branch {branch}");
    } else {
        println!("checked out {app} at {branch}");
    }
    Ok(EXIT_SUCCESS)
}
