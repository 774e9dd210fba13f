//! Lifecycle driver tying the layer tree to an orchestrator backend.

use crate::compile::compile_topology;
use crate::layer::{Lab, Signal};
use crate::reconfigure::needs_reconfigure;
use crate::CoreError;
use labrig_runtime::{ExecOutput, Orchestrator};
use labrig_schema::LabDefinition;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub struct Engine {
    lab: Lab,
    backend: Box<dyn Orchestrator>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").field("lab", &self.lab).finish_non_exhaustive()
    }
}

/// Snapshot of a lab's deployment state.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub name: String,
    pub expected: Vec<String>,
    pub running: Vec<String>,
    pub deployed_at: Option<String>,
    pub stale: bool,
}

impl Engine {
    pub fn new(
        definition: &LabDefinition,
        base_dir: &Path,
        backend: Box<dyn Orchestrator>,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            lab: Lab::new(definition, base_dir)?,
            backend,
        })
    }

    pub fn name(&self) -> &str {
        &self.lab.name
    }

    /// Where the compiled topology document is persisted.
    pub fn topology_path(&self) -> PathBuf {
        self.lab
            .state_dir()
            .join(format!("{}.json", self.lab.name.to_lowercase()))
    }

    /// Bring the lab up: materialize state directories and images,
    /// compile the topology, persist it when it changed, and deploy,
    /// passing `--reconfigure` when the running deployment is stale.
    pub fn start(&mut self) -> Result<(), CoreError> {
        self.lab.apply(Signal::Created, self.backend.as_ref())?;

        let rendered = compile_topology(&self.lab)?.render()?;
        let path = self.topology_path();
        let persisted = read_optional(&path)?;
        let running = self.running_nodes()?;
        let expected = self.lab.node_names();
        let reconfigure =
            needs_reconfigure(persisted.as_deref(), &rendered, &expected, &running);

        if persisted.as_deref() != Some(rendered.as_str()) {
            fs::write(&path, &rendered)?;
        }
        tracing::info!(lab = %self.lab.name, reconfigure, "starting");
        self.backend.deploy(&path, reconfigure)?;
        self.lab.apply(Signal::Started, self.backend.as_ref())
    }

    /// Tear the deployment down but keep all lab state on disk. Destroy
    /// is only issued when inspect reports containers, against the
    /// topology file the orchestrator says is active; a failing destroy
    /// is logged and ignored so state signals still run.
    pub fn stop(&mut self) -> Result<(), CoreError> {
        let report = self.backend.inspect(&self.lab.name)?;
        if !report.containers.is_empty() {
            let path = report
                .containers
                .iter()
                .find_map(|container| container.lab_path.as_deref().map(PathBuf::from))
                .unwrap_or_else(|| self.topology_path());
            if let Err(err) = self.backend.destroy(&path) {
                tracing::warn!(lab = %self.lab.name, %err, "destroy failed, continuing");
            }
        }
        self.lab.apply(Signal::Stopped, self.backend.as_ref())
    }

    /// Stop the lab and remove its state tree.
    pub fn destroy(&mut self) -> Result<(), CoreError> {
        self.stop()?;
        self.lab.apply(Signal::Destroyed, self.backend.as_ref())
    }

    /// Would a `start` right now pass `--reconfigure`?
    pub fn check(&self) -> Result<bool, CoreError> {
        let rendered = compile_topology(&self.lab)?.render()?;
        let persisted = read_optional(&self.topology_path())?;
        let running = self.running_nodes()?;
        Ok(needs_reconfigure(
            persisted.as_deref(),
            &rendered,
            &self.lab.node_names(),
            &running,
        ))
    }

    pub fn status(&self) -> Result<StatusReport, CoreError> {
        Ok(StatusReport {
            name: self.lab.name.clone(),
            expected: self.lab.node_names(),
            running: self.running_nodes()?,
            deployed_at: read_optional(&self.lab.state_dir().join("deployed_at"))?,
            stale: self.check()?,
        })
    }

    /// The freshly compiled topology document, without persisting it.
    pub fn render_topology(&self) -> Result<String, CoreError> {
        Ok(compile_topology(&self.lab)?.render()?)
    }

    /// Run a command inside a node of the running lab.
    pub fn exec(&self, node: &str, cmd: &str) -> Result<ExecOutput, CoreError> {
        Ok(self.backend.exec(&self.topology_path(), node, cmd)?)
    }

    fn running_nodes(&self) -> Result<Vec<String>, CoreError> {
        Ok(self
            .backend
            .inspect(&self.lab.name)?
            .node_names(&self.lab.name))
    }
}

fn read_optional(path: &Path) -> std::io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}
