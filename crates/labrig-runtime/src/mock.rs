//! Recording orchestrator for tests and dry runs.
//!
//! Deploy learns the lab and node names from the topology file it is
//! handed; inspect then fabricates containers under the same naming
//! convention containerlab uses, so the engine's name handling is
//! exercised end to end without touching a container runtime.

use crate::backend::{ContainerRecord, ExecOutput, InspectReport, Orchestrator};
use crate::RuntimeError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<String>,
    labs: BTreeMap<String, DeployedLab>,
}

#[derive(Debug, Clone)]
struct DeployedLab {
    topology_path: String,
    nodes: Vec<String>,
}

/// The slice of the topology document the mock needs.
#[derive(Debug, Deserialize)]
struct TopologyFile {
    name: String,
    topology: TopologyNodes,
}

#[derive(Debug, Deserialize)]
struct TopologyNodes {
    #[serde(default)]
    nodes: BTreeMap<String, serde_json::Value>,
}

impl MockBackend {
    fn state(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Every orchestrator call so far, in order, as one-line summaries.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Node names the mock currently considers deployed for a lab.
    pub fn running_nodes(&self, lab_name: &str) -> Vec<String> {
        self.state()
            .labs
            .get(lab_name)
            .map(|lab| lab.nodes.clone())
            .unwrap_or_default()
    }

    fn read_topology(path: &Path) -> Result<TopologyFile, RuntimeError> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}

impl Orchestrator for MockBackend {
    fn deploy(&self, topology_file: &Path, reconfigure: bool) -> Result<(), RuntimeError> {
        let doc = Self::read_topology(topology_file)?;
        let mut state = self.state();
        state
            .calls
            .push(format!("deploy {} reconfigure={reconfigure}", doc.name));
        let _prev = state.labs.insert(
            doc.name,
            DeployedLab {
                topology_path: topology_file.display().to_string(),
                nodes: doc.topology.nodes.into_keys().collect(),
            },
        );
        Ok(())
    }

    fn destroy(&self, topology_file: &Path) -> Result<(), RuntimeError> {
        let doc = Self::read_topology(topology_file)?;
        let mut state = self.state();
        state.calls.push(format!("destroy {}", doc.name));
        let _prev = state.labs.remove(&doc.name);
        Ok(())
    }

    fn inspect(&self, lab_name: &str) -> Result<InspectReport, RuntimeError> {
        let mut state = self.state();
        state.calls.push(format!("inspect {lab_name}"));
        let containers = state
            .labs
            .get(lab_name)
            .map(|lab| {
                lab.nodes
                    .iter()
                    .map(|node| ContainerRecord {
                        name: format!("clab-{lab_name}-{node}"),
                        lab_name: Some(lab_name.to_owned()),
                        lab_path: Some(lab.topology_path.clone()),
                        state: Some("running".to_owned()),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(InspectReport { containers })
    }

    fn exec(&self, _topology_file: &Path, node: &str, cmd: &str) -> Result<ExecOutput, RuntimeError> {
        self.state().calls.push(format!("exec {node} {cmd}"));
        Ok(ExecOutput {
            return_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        })
    }

    fn build_image(
        &self,
        tag: &str,
        containerfile: &Path,
        _context: &Path,
    ) -> Result<(), RuntimeError> {
        self.state()
            .calls
            .push(format!("build-image {tag} {}", containerfile.display()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "name": "demo",
        "topology": {"nodes": {"app": {}, "db": {}}, "links": []}
    }"#;

    fn write_doc(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("demo.json");
        fs::write(&path, DOC).unwrap();
        path
    }

    #[test]
    fn deploy_then_inspect_fabricates_prefixed_containers() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(dir.path());
        let mock = MockBackend::default();

        mock.deploy(&path, false).unwrap();
        let report = mock.inspect("demo").unwrap();
        let names: Vec<_> = report.containers.iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["clab-demo-app", "clab-demo-db"]);
        assert_eq!(report.node_names("demo"), vec!["app", "db"]);
        assert_eq!(
            report.containers[0].lab_path.as_deref(),
            Some(path.display().to_string().as_str())
        );
    }

    #[test]
    fn destroy_forgets_the_lab() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(dir.path());
        let mock = MockBackend::default();

        mock.deploy(&path, true).unwrap();
        mock.destroy(&path).unwrap();
        assert!(mock.inspect("demo").unwrap().containers.is_empty());
        assert_eq!(
            mock.calls(),
            vec!["deploy demo reconfigure=true", "destroy demo", "inspect demo"]
        );
    }

    #[test]
    fn inspect_of_unknown_lab_is_empty() {
        let mock = MockBackend::default();
        assert!(mock.inspect("ghost").unwrap().containers.is_empty());
    }
}
