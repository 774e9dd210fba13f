use super::{spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use labrig_core::Engine;

pub fn run(engine: &mut Engine, json: bool) -> Result<u8, String> {
    if json {
        engine.start().map_err(|e| e.to_string())?;
        println!("{}", super::json_pretty(&engine.status().map_err(|e| e.to_string())?)?);
        return Ok(EXIT_SUCCESS);
    }

    let pb = spinner(&format!("deploying lab {}", engine.name()));
    match engine.start() {
        Ok(()) => {
            spin_ok(&pb, &format!("lab {} deployed", engine.name()));
            Ok(EXIT_SUCCESS)
        }
        Err(err) => {
            spin_fail(&pb, &format!("deploy of {} failed", engine.name()));
            Err(err.to_string())
        }
    }
}
