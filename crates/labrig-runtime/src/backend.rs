//! The orchestrator seam between the core engine and the outside world.

use crate::clab::ContainerlabBackend;
use crate::mock::MockBackend;
use crate::RuntimeError;
use serde::Deserialize;
use std::path::Path;

/// One container as reported by the orchestrator's inspect output.
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerRecord {
    pub name: String,
    #[serde(default)]
    pub lab_name: Option<String>,
    #[serde(default, rename = "labPath")]
    pub lab_path: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InspectReport {
    #[serde(default)]
    pub containers: Vec<ContainerRecord>,
}

impl InspectReport {
    /// Node names of the report's containers, with the orchestrator's
    /// `clab-<lab>-` prefix stripped.
    pub fn node_names(&self, lab_name: &str) -> Vec<String> {
        self.containers
            .iter()
            .map(|c| strip_container_prefix(lab_name, &c.name).to_owned())
            .collect()
    }
}

/// Result of running a command inside a node. Field names mirror the
/// orchestrator's exec JSON so its records deserialize directly.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecOutput {
    #[serde(rename = "return-code")]
    pub return_code: i32,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

/// Everything the engine needs from an external orchestrator. Deploy and
/// destroy operate on a persisted topology file; inspect and exec operate
/// on the live lab.
pub trait Orchestrator: Send + Sync {
    fn deploy(&self, topology_file: &Path, reconfigure: bool) -> Result<(), RuntimeError>;
    fn destroy(&self, topology_file: &Path) -> Result<(), RuntimeError>;
    fn inspect(&self, lab_name: &str) -> Result<InspectReport, RuntimeError>;
    fn exec(&self, topology_file: &Path, node: &str, cmd: &str) -> Result<ExecOutput, RuntimeError>;
    fn build_image(
        &self,
        tag: &str,
        containerfile: &Path,
        context: &Path,
    ) -> Result<(), RuntimeError>;
}

impl std::fmt::Debug for dyn Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Orchestrator")
    }
}

/// Shared handles delegate, so callers can keep a reference to a
/// backend they hand off boxed.
impl<T: Orchestrator + ?Sized> Orchestrator for std::sync::Arc<T> {
    fn deploy(&self, topology_file: &Path, reconfigure: bool) -> Result<(), RuntimeError> {
        (**self).deploy(topology_file, reconfigure)
    }

    fn destroy(&self, topology_file: &Path) -> Result<(), RuntimeError> {
        (**self).destroy(topology_file)
    }

    fn inspect(&self, lab_name: &str) -> Result<InspectReport, RuntimeError> {
        (**self).inspect(lab_name)
    }

    fn exec(&self, topology_file: &Path, node: &str, cmd: &str) -> Result<ExecOutput, RuntimeError> {
        (**self).exec(topology_file, node, cmd)
    }

    fn build_image(
        &self,
        tag: &str,
        containerfile: &Path,
        context: &Path,
    ) -> Result<(), RuntimeError> {
        (**self).build_image(tag, containerfile, context)
    }
}

/// Strip the orchestrator's `clab-<lab>-` container name prefix, leaving
/// names that are not in that form untouched.
pub fn strip_container_prefix<'a>(lab_name: &str, container: &'a str) -> &'a str {
    let prefix = format!("clab-{lab_name}-");
    container.strip_prefix(prefix.as_str()).unwrap_or(container)
}

/// Construct the orchestrator named by configuration.
pub fn select_backend(
    name: &str,
    base_dir: &Path,
) -> Result<Box<dyn Orchestrator>, RuntimeError> {
    match name {
        "clab" => Ok(Box::new(ContainerlabBackend::discover(base_dir)?)),
        "mock" => Ok(Box::new(MockBackend::default())),
        other => Err(RuntimeError::UnknownBackend(other.to_owned())),
    }
}
