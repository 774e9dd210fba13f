use super::EXIT_SUCCESS;
use labrig_core::Engine;

pub fn run(engine: &Engine) -> Result<u8, String> {
    println!("{}", engine.render_topology().map_err(|e| e.to_string())?);
    Ok(EXIT_SUCCESS)
}
