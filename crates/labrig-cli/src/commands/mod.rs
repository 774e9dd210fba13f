pub mod check;
pub mod completions;
pub mod destroy;
pub mod exec;
pub mod start;
pub mod status;
pub mod stop;
pub mod topology;

use indicatif::{ProgressBar, ProgressStyle};
use labrig_core::Engine;
use labrig_runtime::select_backend;
use labrig_schema::load_lab_file;
use std::path::Path;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_DEFINITION_ERROR: u8 = 2;
pub const EXIT_RUNTIME_ERROR: u8 = 3;
pub const EXIT_STALE: u8 = 4;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

/// Load a lab definition and wire it to the named backend.
pub fn make_engine(lab: &Path, base_dir: &Path, backend_name: &str) -> Result<Engine, String> {
    let definition =
        load_lab_file(lab).map_err(|e| format!("definition error: {e}"))?;
    let backend = select_backend(backend_name, base_dir)
        .map_err(|e| format!("runtime error: {e}"))?;
    Engine::new(&definition, base_dir, backend).map_err(|e| format!("definition error: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_node(name: &str, running: bool) -> String {
    use console::Style;
    if running {
        format!("{} {name}", Style::new().green().apply_to("up"))
    } else {
        format!("{} {name}", Style::new().red().apply_to("down"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn json_pretty_serializes() {
        let val = serde_json::json!({"key": "value"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"key\""));
    }

    #[test]
    fn exit_codes_are_distinct() {
        assert_ne!(EXIT_SUCCESS, EXIT_FAILURE);
        assert_ne!(EXIT_FAILURE, EXIT_DEFINITION_ERROR);
        assert_ne!(EXIT_DEFINITION_ERROR, EXIT_RUNTIME_ERROR);
        assert_ne!(EXIT_RUNTIME_ERROR, EXIT_STALE);
    }

    #[test]
    fn make_engine_reports_definition_errors() {
        let dir = tempfile::tempdir().unwrap();
        let lab = dir.path().join("lab.toml");
        fs::write(&lab, "not valid toml [").unwrap();
        let err = make_engine(&lab, dir.path(), "mock").unwrap_err();
        assert!(err.starts_with("definition error:"));
    }

    #[test]
    fn make_engine_rejects_unknown_backend() {
        let dir = tempfile::tempdir().unwrap();
        let lab = dir.path().join("lab.toml");
        fs::write(&lab, "[lab]\nname = \"demo\"\n").unwrap();
        let err = make_engine(&lab, dir.path(), "podlab").unwrap_err();
        assert!(err.starts_with("runtime error:"));
    }

    #[test]
    fn spinner_helpers_do_not_panic() {
        let pb = spinner("working...");
        spin_ok(&pb, "done");
        let pb = spinner("working...");
        spin_fail(&pb, "failed");
    }

    #[test]
    fn colorize_node_mentions_the_name() {
        assert!(colorize_node("db", true).contains("db"));
        assert!(colorize_node("db", false).contains("down"));
    }
}
