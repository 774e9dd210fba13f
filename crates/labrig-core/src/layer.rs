//! The instantiated layer tree: lab, services, nodes.
//!
//! Construction resolves every attribute chain up front, so a broken
//! definition fails before anything touches the filesystem or the
//! orchestrator. Lifecycle signals then walk the tree explicitly:
//! creation runs parent-first, destruction child-first.

use crate::CoreError;
use labrig_runtime::Orchestrator;
use labrig_schema::{
    resolve_binds, AttrValue, BindError, HealthCheck, LabDefinition, ResolvedBind, ServiceDecl,
    StagedDependency,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Lifecycle signal applied to the layer tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Created,
    Started,
    Stopped,
    Destroyed,
}

// ---------------------------------------------------------------------
// Node

/// Fully resolved configuration of one node, independent of every other
/// node in the tree.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub name: String,
    pub type_name: String,
    pub kind: Option<String>,
    pub image: Option<String>,
    pub containerfile: Option<String>,
    pub network_mode: String,
    pub entrypoint: Option<String>,
    pub command: Option<String>,
    pub environment: BTreeMap<String, Value>,
    pub binds: Vec<String>,
    pub ports: Vec<String>,
    pub dependencies: Vec<StagedDependency>,
    pub links: BTreeMap<String, String>,
    pub health_check: Option<HealthCheck>,
}

#[derive(Debug)]
pub struct Node {
    pub config: NodeConfig,
    /// Directory of the file that declared the node's type; anchors
    /// `./`-relative binds.
    pub definition_dir: PathBuf,
    pub state_dir: PathBuf,
    service_definition_dir: PathBuf,
    service_state_dir: PathBuf,
    /// Bind specs distributed from the service level; these resolve
    /// against the service's directories, not the node's.
    extra_binds: Vec<String>,
}

impl Node {
    /// The image the emitted descriptor should reference: the built tag
    /// for containerfile types, the declared image otherwise.
    pub fn image_reference(&self) -> Option<String> {
        if self.config.containerfile.is_some() {
            Some(self.image_tag())
        } else {
            self.config.image.clone()
        }
    }

    fn image_tag(&self) -> String {
        format!("labrig/{}:latest", self.config.type_name)
    }

    /// All binds of this node in emission order: type-level binds, then
    /// service-distributed binds, then the node's own state directory.
    pub fn resolved_binds(&self) -> Result<Vec<ResolvedBind>, BindError> {
        let mut binds = resolve_binds(&self.definition_dir, &self.state_dir, &self.config.binds)?;
        binds.extend(resolve_binds(
            &self.service_definition_dir,
            &self.service_state_dir,
            &self.extra_binds,
        )?);
        binds.push(ResolvedBind {
            local: self.state_dir.clone(),
            remote: "/labrig_data".to_owned(),
            read_only: false,
        });
        Ok(binds)
    }

    fn apply(&mut self, signal: Signal, orchestrator: &dyn Orchestrator) -> Result<(), CoreError> {
        match signal {
            Signal::Created => {
                fs::create_dir_all(&self.state_dir)?;
                if let Some(containerfile) = &self.config.containerfile {
                    orchestrator.build_image(
                        &self.image_tag(),
                        &self.definition_dir.join(containerfile),
                        &self.definition_dir,
                    )?;
                }
            }
            Signal::Started => {
                // Named and state-dir-rooted binds point at directories
                // that exist only once something mounts them; make them
                // before the orchestrator hands the paths to the
                // container runtime.
                for bind in self.resolved_binds()? {
                    if bind.local.starts_with(&self.service_state_dir) {
                        fs::create_dir_all(&bind.local)?;
                    }
                }
            }
            Signal::Destroyed => remove_dir_tolerant(&self.state_dir)?,
            Signal::Stopped => {}
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Service

/// Resolved service-level configuration: the node roster, the shared
/// environment, and per-node slices of the distributable fields.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub name: String,
    pub type_name: String,
    pub nodes: BTreeMap<String, String>,
    pub shared_environment: BTreeMap<String, Value>,
    dependencies: BTreeMap<String, Value>,
    binds: BTreeMap<String, Value>,
    ports: BTreeMap<String, Value>,
    environment: BTreeMap<String, Value>,
    links: BTreeMap<String, Value>,
}

#[derive(Debug)]
pub struct Service {
    pub config: ServiceConfig,
    pub state_dir: PathBuf,
    pub nodes: Vec<Node>,
}

impl Service {
    fn new(
        definition: &LabDefinition,
        name: &str,
        decl: &ServiceDecl,
        lab_state_dir: &Path,
    ) -> Result<Self, CoreError> {
        let config = ServiceConfig::resolve(definition, name, decl)?;
        let state_dir = lab_state_dir.join(name);
        let service_definition_dir = definition
            .service_definition_dir(&decl.type_name)
            .to_path_buf();

        let mut nodes = Vec::new();
        for (node_name, node_type) in &config.nodes {
            let chain = definition.node_chain(node_type)?;
            let mut overrides = BTreeMap::new();
            for (field, slice) in [
                ("dependencies", &config.dependencies),
                ("ports", &config.ports),
                ("environment", &config.environment),
                ("links", &config.links),
            ] {
                if let Some(value) = slice.get(node_name) {
                    let _prev =
                        overrides.insert(field.to_owned(), AttrValue::from_json(value.clone()));
                }
            }
            let fields = labrig_schema::resolve_fields(&chain, &overrides)?;
            let node_config = NodeConfig::from_fields(node_name, node_type, fields)?;

            let extra_binds = match config.binds.get(node_name) {
                Some(value) => value_string_list(node_name, "binds", value)?,
                None => Vec::new(),
            };

            nodes.push(Node {
                config: node_config,
                definition_dir: definition.node_definition_dir(node_type).to_path_buf(),
                state_dir: state_dir.join(node_name),
                service_definition_dir: service_definition_dir.clone(),
                service_state_dir: state_dir.clone(),
                extra_binds,
            });
        }

        Ok(Self {
            config,
            state_dir,
            nodes,
        })
    }

    fn apply(&mut self, signal: Signal, orchestrator: &dyn Orchestrator) -> Result<(), CoreError> {
        match signal {
            Signal::Created => {
                fs::create_dir_all(&self.state_dir)?;
                for node in &mut self.nodes {
                    node.apply(signal, orchestrator)?;
                }
            }
            Signal::Destroyed => {
                for node in &mut self.nodes {
                    node.apply(signal, orchestrator)?;
                }
                remove_dir_tolerant(&self.state_dir)?;
            }
            Signal::Started | Signal::Stopped => {
                for node in &mut self.nodes {
                    node.apply(signal, orchestrator)?;
                }
            }
        }
        Ok(())
    }
}

impl ServiceConfig {
    fn resolve(
        definition: &LabDefinition,
        name: &str,
        decl: &ServiceDecl,
    ) -> Result<Self, CoreError> {
        let chain = definition.service_chain(&decl.type_name)?;
        let mut resolved = labrig_schema::resolve::resolve_chain(&chain)?;
        resolved.apply(&decl.overrides)?;

        // Lab-level distributables are the most specific layer of all.
        let mut lab_overrides = BTreeMap::new();
        for (field, source) in [
            ("dependencies", &definition.dependencies),
            ("binds", &definition.binds),
            ("ports", &definition.ports),
            ("environment", &definition.environment),
            ("links", &definition.links),
        ] {
            if let Some(slice) = source.get(name) {
                let _prev = lab_overrides.insert(field.to_owned(), slice.clone());
            }
        }
        resolved.apply(&lab_overrides)?;
        let mut fields = resolved.into_values();

        let nodes = take_mapping(&mut fields, "nodes");
        let mut roster = BTreeMap::new();
        for (node_name, type_value) in nodes {
            let Value::String(type_name) = type_value else {
                return Err(CoreError::MalformedField {
                    node: node_name,
                    field: "nodes".to_owned(),
                    detail: "expected a node type name".to_owned(),
                });
            };
            let _prev = roster.insert(node_name, type_name);
        }

        Ok(Self {
            name: name.to_owned(),
            type_name: decl.type_name.clone(),
            nodes: roster,
            shared_environment: take_mapping(&mut fields, "shared_environment"),
            dependencies: take_mapping(&mut fields, "dependencies"),
            binds: take_mapping(&mut fields, "binds"),
            ports: take_mapping(&mut fields, "ports"),
            environment: take_mapping(&mut fields, "environment"),
            links: take_mapping(&mut fields, "links"),
        })
    }
}

// ---------------------------------------------------------------------
// Lab

#[derive(Debug)]
pub struct Lab {
    pub name: String,
    state_dir: PathBuf,
    services: Vec<Service>,
}

impl Lab {
    /// Instantiate the whole layer tree from a loaded definition. Every
    /// attribute chain resolves here; nothing is touched on disk yet.
    pub fn new(definition: &LabDefinition, base_dir: &Path) -> Result<Self, CoreError> {
        let state_dir = base_dir.join(&definition.name);
        let mut services = Vec::new();
        for (name, decl) in &definition.services {
            services.push(Service::new(definition, name, decl, &state_dir)?);
        }

        let mut seen = std::collections::BTreeSet::new();
        for service in &services {
            for node in &service.nodes {
                if !seen.insert(node.config.name.clone()) {
                    return Err(CoreError::DuplicateNode(node.config.name.clone()));
                }
            }
        }

        Ok(Self {
            name: definition.name.clone(),
            state_dir,
            services,
        })
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// Names of every node across services, in service then node order.
    pub fn node_names(&self) -> Vec<String> {
        self.services
            .iter()
            .flat_map(|service| service.nodes.iter().map(|node| node.config.name.clone()))
            .collect()
    }

    /// Walk the tree with a lifecycle signal. Creation runs this layer
    /// before its children; destruction runs children first.
    pub fn apply(
        &mut self,
        signal: Signal,
        orchestrator: &dyn Orchestrator,
    ) -> Result<(), CoreError> {
        tracing::debug!(lab = %self.name, ?signal, "applying signal");
        match signal {
            Signal::Created => {
                fs::create_dir_all(&self.state_dir)?;
                for service in &mut self.services {
                    service.apply(signal, orchestrator)?;
                }
            }
            Signal::Started => {
                for service in &mut self.services {
                    service.apply(signal, orchestrator)?;
                }
                fs::write(
                    self.state_dir.join("deployed_at"),
                    chrono::Utc::now().to_rfc3339(),
                )?;
            }
            Signal::Stopped => {
                for service in &mut self.services {
                    service.apply(signal, orchestrator)?;
                }
            }
            Signal::Destroyed => {
                for service in &mut self.services {
                    service.apply(signal, orchestrator)?;
                }
                remove_dir_tolerant(&self.state_dir)?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Field extraction

impl NodeConfig {
    fn from_fields(
        name: &str,
        type_name: &str,
        mut fields: BTreeMap<String, AttrValue>,
    ) -> Result<Self, CoreError> {
        let image = take_string(&mut fields, "image");
        let containerfile = take_string(&mut fields, "containerfile");
        match (&image, &containerfile) {
            (Some(_), Some(_)) => {
                return Err(CoreError::MutuallyExclusiveConfig {
                    node: name.to_owned(),
                    detail: "'image' and 'containerfile' are mutually exclusive".to_owned(),
                })
            }
            (None, None) => {
                return Err(CoreError::MutuallyExclusiveConfig {
                    node: name.to_owned(),
                    detail: "one of 'image' or 'containerfile' is required".to_owned(),
                })
            }
            _ => {}
        }

        let dependencies = take_sequence(&mut fields, "dependencies")
            .into_iter()
            .map(|item| {
                serde_json::from_value::<StagedDependency>(item).map_err(|err| {
                    CoreError::MalformedField {
                        node: name.to_owned(),
                        field: "dependencies".to_owned(),
                        detail: err.to_string(),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let links = take_mapping(&mut fields, "links")
            .into_iter()
            .map(|(iface, peer)| match peer {
                Value::String(peer) => Ok((iface, peer)),
                other => Err(CoreError::MalformedField {
                    node: name.to_owned(),
                    field: "links".to_owned(),
                    detail: format!("expected 'node:interface' string, got {other}"),
                }),
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        let health = take_mapping(&mut fields, "health_check");
        let health_check = if health.is_empty() {
            None
        } else {
            let value = Value::Object(health.into_iter().collect());
            Some(
                serde_json::from_value::<HealthCheck>(value).map_err(|err| {
                    CoreError::MalformedField {
                        node: name.to_owned(),
                        field: "health_check".to_owned(),
                        detail: err.to_string(),
                    }
                })?,
            )
        };

        Ok(Self {
            name: name.to_owned(),
            type_name: type_name.to_owned(),
            kind: take_string(&mut fields, "kind"),
            image,
            containerfile,
            network_mode: take_string(&mut fields, "network_mode")
                .unwrap_or_else(|| "bridge".to_owned()),
            entrypoint: take_string(&mut fields, "entrypoint"),
            command: take_string(&mut fields, "command"),
            environment: take_mapping(&mut fields, "environment"),
            binds: attr_string_list(name, "binds", take_sequence(&mut fields, "binds"))?,
            ports: attr_string_list(name, "ports", take_sequence(&mut fields, "ports"))?,
            dependencies,
            links,
            health_check,
        })
    }
}

fn take_string(fields: &mut BTreeMap<String, AttrValue>, key: &str) -> Option<String> {
    fields
        .remove(key)
        .and_then(|value| value.as_str().map(str::to_owned))
}

fn take_sequence(fields: &mut BTreeMap<String, AttrValue>, key: &str) -> Vec<Value> {
    match fields.remove(key) {
        Some(AttrValue::Sequence(items)) => items,
        _ => Vec::new(),
    }
}

fn take_mapping(fields: &mut BTreeMap<String, AttrValue>, key: &str) -> BTreeMap<String, Value> {
    match fields.remove(key) {
        Some(AttrValue::Mapping(map)) => map,
        _ => BTreeMap::new(),
    }
}

fn attr_string_list(node: &str, field: &str, items: Vec<Value>) -> Result<Vec<String>, CoreError> {
    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            other => Err(CoreError::MalformedField {
                node: node.to_owned(),
                field: field.to_owned(),
                detail: format!("expected a string, got {other}"),
            }),
        })
        .collect()
}

fn value_string_list(node: &str, field: &str, value: &Value) -> Result<Vec<String>, CoreError> {
    let Value::Array(items) = value else {
        return Err(CoreError::MalformedField {
            node: node.to_owned(),
            field: field.to_owned(),
            detail: "expected a list of bind specs".to_owned(),
        });
    };
    attr_string_list(node, field, items.clone())
}

fn remove_dir_tolerant(path: &Path) -> std::io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}
