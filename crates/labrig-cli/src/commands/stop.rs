use super::EXIT_SUCCESS;
use labrig_core::Engine;

pub fn run(engine: &mut Engine) -> Result<u8, String> {
    engine.stop().map_err(|e| e.to_string())?;
    println!("stopped lab {}", engine.name());
    Ok(EXIT_SUCCESS)
}
