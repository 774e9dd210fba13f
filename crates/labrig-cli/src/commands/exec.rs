use labrig_core::Engine;

pub fn run(engine: &Engine, node: &str, command: &[String]) -> Result<u8, String> {
    let cmd = command.join(" ");
    let output = engine.exec(node, &cmd).map_err(|e| e.to_string())?;
    if !output.stdout.is_empty() {
        print!("{}", output.stdout);
    }
    if !output.stderr.is_empty() {
        eprint!("{}", output.stderr);
    }
    Ok(u8::try_from(output.return_code).unwrap_or(1))
}
