use super::{colorize_status, json_pretty, EXIT_SUCCESS};
use stack_core::Orchestrator;

pub fn run(orch: &Orchestrator, app: Option<&str>, json: bool) -> Result<u8, String> {
    let statuses = orch.status(app).map_err(|e| e.to_string())?;

    if json {
        let payload: Vec<_> = statuses
            .iter()
            .map(|s| {
                serde_json::json!({
                    "service": s.service.as_str(),
                    "container": s.container,
                    "status": s.status,
                })
            })
            .collect();
        println!("{}", json_pretty(&payload)?);
        return Ok(EXIT_SUCCESS);
    }

    let width = statuses
        .iter()
        .map(|s| s.service.len())
        .max()
        .unwrap_or(0);
    for s in &statuses {
        let status = match (&s.container, &s.status) {
            (None, _) => "no container name".to_owned(),
            (Some(_), Some(status)) => colorize_status(status),
            (Some(_), None) => colorize_status("not found"),
        };
        println!("{:<width$}  {status}", s.service.as_str());
    }
    Ok(EXIT_SUCCESS)
}
