//! Compilation of a layer tree into the orchestrator's topology
//! document.
//!
//! Environment handling happens here: every node's emitted `env` is the
//! service's shared environment updated with the node's own variables,
//! and `{KEY}` placeholders are substituted in a single pass against the
//! merged map before substitution, so a substituted value is never
//! re-expanded.

use crate::layer::{Lab, Node, Service};
use crate::CoreError;
use labrig_schema::value::scalar_to_string;
use labrig_schema::{
    CreateStage, LinkEntry, NodeDescriptor, Stages, TopologyDoc, TopologySection,
};
use std::collections::BTreeMap;

/// Compile the full topology document for a lab.
pub fn compile_topology(lab: &Lab) -> Result<TopologyDoc, CoreError> {
    let mut nodes = BTreeMap::new();
    let mut links = Vec::new();

    for service in lab.services() {
        for node in &service.nodes {
            let descriptor = compile_node(service, node)?;
            // Duplicates are rejected at tree construction; keep the
            // compiler safe against being handed a foreign tree anyway.
            if nodes.insert(node.config.name.clone(), descriptor).is_some() {
                return Err(CoreError::DuplicateNode(node.config.name.clone()));
            }
            for (iface, peer) in &node.config.links {
                links.push(LinkEntry {
                    endpoints: [format!("{}:{iface}", node.config.name), peer.clone()],
                });
            }
        }
    }

    Ok(TopologyDoc {
        name: lab.name.clone(),
        topology: TopologySection { nodes, links },
    })
}

fn compile_node(service: &Service, node: &Node) -> Result<NodeDescriptor, CoreError> {
    let config = &node.config;

    let binds = node
        .resolved_binds()?
        .iter()
        .map(labrig_schema::ResolvedBind::render)
        .collect();

    let stages = if config.dependencies.is_empty() {
        None
    } else {
        Some(Stages {
            create: CreateStage {
                wait_for: config.dependencies.clone(),
            },
        })
    };

    Ok(NodeDescriptor {
        kind: config.kind.clone(),
        image: node.image_reference(),
        entrypoint: config.entrypoint.clone(),
        healthcheck: config.health_check.clone(),
        network_mode: if config.network_mode == "bridge" {
            None
        } else {
            Some(config.network_mode.clone())
        },
        stages,
        cmd: config.command.clone(),
        binds,
        ports: config.ports.clone(),
        env: compile_env(service, node)?,
    })
}

/// Shared environment updated with node variables, then placeholder
/// substitution against the merged raw map.
fn compile_env(service: &Service, node: &Node) -> Result<BTreeMap<String, String>, CoreError> {
    let mut merged: BTreeMap<String, String> = service
        .config
        .shared_environment
        .iter()
        .map(|(key, value)| (key.clone(), scalar_to_string(value)))
        .collect();
    for (key, value) in &node.config.environment {
        let _prev = merged.insert(key.clone(), scalar_to_string(value));
    }

    merged
        .iter()
        .map(|(key, value)| Ok((key.clone(), substitute(&node.config.name, value, &merged)?)))
        .collect()
}

fn substitute(
    node: &str,
    raw: &str,
    env: &BTreeMap<String, String>,
) -> Result<String, CoreError> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            // unterminated brace passes through literally
            out.push('{');
            rest = after;
            continue;
        };
        let key = &after[..end];
        match env.get(key) {
            Some(value) => out.push_str(value),
            None => {
                return Err(CoreError::UnknownPlaceholder {
                    node: node.to_owned(),
                    key: key.to_owned(),
                })
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn substitutes_known_placeholders() {
        let mut env = BTreeMap::new();
        let _ = env.insert("HOST".to_owned(), "db".to_owned());
        let _ = env.insert("PORT".to_owned(), "5432".to_owned());
        assert_eq!(
            substitute("n", "postgres://{HOST}:{PORT}/app", &env).unwrap(),
            "postgres://db:5432/app"
        );
    }

    #[test]
    fn substitution_is_single_pass() {
        let mut env = BTreeMap::new();
        let _ = env.insert("A".to_owned(), "{B}".to_owned());
        let _ = env.insert("B".to_owned(), "deep".to_owned());
        // the raw value of A is inserted verbatim, not expanded again
        assert_eq!(substitute("n", "x{A}y", &env).unwrap(), "x{B}y");
    }

    #[test]
    fn unknown_placeholder_is_an_error() {
        let env = BTreeMap::new();
        let err = substitute("n", "{MISSING}", &env).unwrap_err();
        assert!(
            matches!(err, CoreError::UnknownPlaceholder { node, key } if node == "n" && key == "MISSING")
        );
    }

    #[test]
    fn unterminated_brace_passes_through() {
        let env = BTreeMap::new();
        assert_eq!(substitute("n", "a{b", &env).unwrap(), "a{b");
    }

    #[test]
    fn non_string_scalars_render_via_json() {
        assert_eq!(scalar_to_string(&json!(8080)), "8080");
        assert_eq!(scalar_to_string(&json!(false)), "false");
    }
}
