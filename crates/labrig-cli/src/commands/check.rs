use super::{EXIT_STALE, EXIT_SUCCESS};
use labrig_core::Engine;

pub fn run(engine: &Engine) -> Result<u8, String> {
    if engine.check().map_err(|e| e.to_string())? {
        println!("lab {} requires reconfiguration", engine.name());
        Ok(EXIT_STALE)
    } else {
        println!("lab {} is up to date", engine.name());
        Ok(EXIT_SUCCESS)
    }
}
