//! Containerlab-backed orchestrator.
//!
//! Containerlab needs root for its network plumbing, so every
//! invocation goes through `sudo -E` with `CLAB_LABDIR_BASE` pointed at
//! the labrig state directory; that keeps containerlab's own working
//! files inside the same tree as everything else labrig writes.

use crate::backend::{ExecOutput, InspectReport, Orchestrator};
use crate::runner::{CommandOutput, CommandRunner, HostRunner};
use crate::RuntimeError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub struct ContainerlabBackend {
    binary: PathBuf,
    base_dir: PathBuf,
    runner: Box<dyn CommandRunner>,
}

impl ContainerlabBackend {
    /// Locate the containerlab binary on PATH and bind it to a state
    /// directory.
    pub fn discover(base_dir: &Path) -> Result<Self, RuntimeError> {
        let binary =
            which::which("containerlab").map_err(|_| RuntimeError::OrchestratorNotFound {
                name: "containerlab".to_owned(),
            })?;
        Ok(Self::new(binary, base_dir, Box::new(HostRunner)))
    }

    pub fn new(binary: PathBuf, base_dir: &Path, runner: Box<dyn CommandRunner>) -> Self {
        Self {
            binary,
            base_dir: base_dir.to_path_buf(),
            runner,
        }
    }

    fn clab_argv(&self, args: &[&str]) -> Vec<String> {
        let mut argv = vec![
            "sudo".to_owned(),
            "-E".to_owned(),
            self.binary.display().to_string(),
        ];
        argv.extend(args.iter().map(|arg| (*arg).to_owned()));
        argv
    }

    fn env(&self) -> Vec<(String, String)> {
        vec![(
            "CLAB_LABDIR_BASE".to_owned(),
            self.base_dir.display().to_string(),
        )]
    }

    fn run_checked(&self, argv: Vec<String>) -> Result<CommandOutput, RuntimeError> {
        let output = self.runner.run(&argv, &self.env())?;
        if output.success() {
            Ok(output)
        } else {
            Err(RuntimeError::CommandFailed {
                command: argv.join(" "),
                status: output.status,
                stderr: output.stderr.trim().to_owned(),
            })
        }
    }
}

impl Orchestrator for ContainerlabBackend {
    fn deploy(&self, topology_file: &Path, reconfigure: bool) -> Result<(), RuntimeError> {
        let file = topology_file.display().to_string();
        let mut args = vec!["deploy", "-t", file.as_str()];
        if reconfigure {
            args.push("--reconfigure");
        }
        tracing::info!(topology = %file, reconfigure, "deploying");
        let _output = self.run_checked(self.clab_argv(&args))?;
        Ok(())
    }

    fn destroy(&self, topology_file: &Path) -> Result<(), RuntimeError> {
        let file = topology_file.display().to_string();
        tracing::info!(topology = %file, "destroying");
        let _output = self.run_checked(self.clab_argv(&["destroy", "-t", file.as_str()]))?;
        Ok(())
    }

    fn inspect(&self, lab_name: &str) -> Result<InspectReport, RuntimeError> {
        let argv = self.clab_argv(&["inspect", "--name", lab_name, "--format", "json"]);
        let output = self.runner.run(&argv, &self.env())?;
        // An absent lab is not an error; containerlab reports it on
        // stderr with a nonzero status.
        if !output.success() {
            if output.stderr.contains("no containers found") {
                return Ok(InspectReport::default());
            }
            return Err(RuntimeError::CommandFailed {
                command: argv.join(" "),
                status: output.status,
                stderr: output.stderr.trim().to_owned(),
            });
        }
        if output.stdout.trim().is_empty() {
            return Ok(InspectReport::default());
        }
        Ok(serde_json::from_str(&output.stdout)?)
    }

    /// Run a command inside one node. Containerlab's own exit status only
    /// says whether it reached the container; the in-node result comes
    /// from its JSON report, keyed by container name.
    fn exec(&self, topology_file: &Path, node: &str, cmd: &str) -> Result<ExecOutput, RuntimeError> {
        let file = topology_file.display().to_string();
        let label = format!("clab-node-name={node}");
        let argv = self.clab_argv(&[
            "exec",
            "-t",
            file.as_str(),
            "--label",
            label.as_str(),
            "--format",
            "json",
            "--cmd",
            cmd,
        ]);
        let output = self.run_checked(argv)?;
        let report: BTreeMap<String, Vec<ExecOutput>> = serde_json::from_str(&output.stdout)?;
        report
            .into_values()
            .next()
            .and_then(|mut results| results.pop())
            .ok_or_else(|| RuntimeError::EmptyExecReport(node.to_owned()))
    }

    fn build_image(
        &self,
        tag: &str,
        containerfile: &Path,
        context: &Path,
    ) -> Result<(), RuntimeError> {
        let docker = which::which("docker").map_err(|_| RuntimeError::OrchestratorNotFound {
            name: "docker".to_owned(),
        })?;
        let argv = vec![
            docker.display().to_string(),
            "build".to_owned(),
            "-t".to_owned(),
            tag.to_owned(),
            "-f".to_owned(),
            containerfile.display().to_string(),
            context.display().to_string(),
        ];
        tracing::info!(%tag, "building image");
        let _output = self.run_checked(argv)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Call = (Vec<String>, Vec<(String, String)>);

    /// Runner that records every invocation and replays canned outputs.
    /// Clones share state, so tests keep a handle after boxing one into
    /// the backend.
    #[derive(Clone, Default)]
    struct FakeRunner {
        calls: Arc<Mutex<Vec<Call>>>,
        outputs: Arc<Mutex<Vec<CommandOutput>>>,
    }

    impl FakeRunner {
        fn replaying(outputs: Vec<CommandOutput>) -> Self {
            Self {
                calls: Arc::default(),
                outputs: Arc::new(Mutex::new(outputs)),
            }
        }

        fn recorded(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn ok() -> CommandOutput {
            CommandOutput {
                status: 0,
                stdout: String::new(),
                stderr: String::new(),
            }
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(
            &self,
            argv: &[String],
            env: &[(String, String)],
        ) -> Result<CommandOutput, RuntimeError> {
            self.calls
                .lock()
                .unwrap()
                .push((argv.to_vec(), env.to_vec()));
            let mut outputs = self.outputs.lock().unwrap();
            Ok(if outputs.is_empty() {
                Self::ok()
            } else {
                outputs.remove(0)
            })
        }
    }

    fn backend(outputs: Vec<CommandOutput>) -> (ContainerlabBackend, FakeRunner) {
        let runner = FakeRunner::replaying(outputs);
        let backend = ContainerlabBackend::new(
            PathBuf::from("/usr/bin/containerlab"),
            Path::new("/var/lib/labrig"),
            Box::new(runner.clone()),
        );
        (backend, runner)
    }

    #[test]
    fn deploy_wraps_in_sudo_and_sets_labdir_base() {
        let (backend, runner) = backend(vec![]);
        backend.deploy(Path::new("/labs/demo.json"), false).unwrap();

        let calls = runner.recorded();
        assert_eq!(
            calls[0].0,
            vec![
                "sudo",
                "-E",
                "/usr/bin/containerlab",
                "deploy",
                "-t",
                "/labs/demo.json"
            ]
        );
        assert_eq!(
            calls[0].1,
            vec![("CLAB_LABDIR_BASE".to_owned(), "/var/lib/labrig".to_owned())]
        );
    }

    #[test]
    fn reconfigure_adds_the_flag() {
        let (backend, runner) = backend(vec![]);
        backend.deploy(Path::new("/labs/demo.json"), true).unwrap();
        assert_eq!(runner.recorded()[0].0.last().unwrap(), "--reconfigure");
    }

    #[test]
    fn failed_command_surfaces_stderr() {
        let (backend, _) = backend(vec![CommandOutput {
            status: 1,
            stdout: String::new(),
            stderr: "boom\n".to_owned(),
        }]);
        let err = backend.deploy(Path::new("/labs/demo.json"), false).unwrap_err();
        match err {
            RuntimeError::CommandFailed { status, stderr, .. } => {
                assert_eq!(status, 1);
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn inspect_parses_containers() {
        let (backend, _) = backend(vec![CommandOutput {
            status: 0,
            stdout: r#"{"containers": [{"name": "clab-demo-db"}]}"#.to_owned(),
            stderr: String::new(),
        }]);
        let report = backend.inspect("demo").unwrap();
        assert_eq!(report.node_names("demo"), vec!["db"]);
    }

    #[test]
    fn inspect_of_absent_lab_is_empty() {
        let (backend, _) = backend(vec![CommandOutput {
            status: 1,
            stdout: String::new(),
            stderr: "Error: no containers found".to_owned(),
        }]);
        let report = backend.inspect("demo").unwrap();
        assert!(report.containers.is_empty());
    }

    #[test]
    fn exec_targets_the_node_by_label() {
        let (backend, runner) = backend(vec![CommandOutput {
            status: 0,
            stdout: r#"{"clab-demo-db": [
                {"cmd": ["pg_isready"], "return-code": 0, "stdout": "accepting connections\n", "stderr": ""}
            ]}"#
            .to_owned(),
            stderr: String::new(),
        }]);
        let result = backend
            .exec(Path::new("/labs/demo.json"), "db", "pg_isready")
            .unwrap();
        assert_eq!(result.return_code, 0);
        assert_eq!(result.stdout, "accepting connections\n");

        let argv = &runner.recorded()[0].0;
        assert!(argv.contains(&"--label".to_owned()));
        assert!(argv.contains(&"clab-node-name=db".to_owned()));
        assert!(argv.contains(&"--format".to_owned()));
        assert!(argv.contains(&"json".to_owned()));
        assert!(argv.contains(&"pg_isready".to_owned()));
    }

    #[test]
    fn exec_reports_the_in_node_status_not_the_orchestrators() {
        // containerlab exits 0 even when the command inside fails
        let (backend, _) = backend(vec![CommandOutput {
            status: 0,
            stdout: r#"{"clab-demo-db": [
                {"cmd": ["false"], "return-code": 1, "stdout": "", "stderr": "nope\n"}
            ]}"#
            .to_owned(),
            stderr: "INFO executed command\n".to_owned(),
        }]);
        let result = backend
            .exec(Path::new("/labs/demo.json"), "db", "false")
            .unwrap();
        assert_eq!(result.return_code, 1);
        assert_eq!(result.stderr, "nope\n");
    }

    #[test]
    fn exec_with_no_matching_container_is_an_error() {
        let (backend, _) = backend(vec![CommandOutput {
            status: 0,
            stdout: "{}".to_owned(),
            stderr: String::new(),
        }]);
        let err = backend
            .exec(Path::new("/labs/demo.json"), "ghost", "true")
            .unwrap_err();
        assert!(matches!(err, RuntimeError::EmptyExecReport(node) if node == "ghost"));
    }
}
