//! `lab.toml` parsing and type-chain construction.
//!
//! A lab definition directory holds one `lab.toml` describing the lab,
//! its services, and reusable node/service types. Types carry `extends`
//! chains; `includes` pulls type tables in from other files so common
//! types can be shared between labs. Every type remembers the directory
//! of the file that declared it, which anchors relative bind resolution
//! for the layers built from the type.

use crate::resolve::{FieldDecl, ResolveError, TypeSchema};
use crate::value::{AttrValue, FieldKind};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read lab definition: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse lab definition: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("unknown {category} type '{name}'")]
    UnknownType { category: TypeCategory, name: String },
    #[error("inheritance cycle through {category} type '{name}'")]
    ExtendsCycle { category: TypeCategory, name: String },
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Node,
    Service,
}

impl fmt::Display for TypeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Node => "node",
            Self::Service => "service",
        })
    }
}

/// A named type as authored: its ancestor, declared field values, and
/// the directory of the file that declared it.
#[derive(Debug, Clone)]
pub struct TypeEntry {
    pub name: String,
    pub extends: Option<String>,
    pub fields: BTreeMap<String, AttrValue>,
    pub definition_dir: PathBuf,
}

/// A service instance declaration inside a lab.
#[derive(Debug, Clone)]
pub struct ServiceDecl {
    pub type_name: String,
    pub overrides: BTreeMap<String, AttrValue>,
}

/// A fully loaded lab definition, ready to be instantiated as a layer
/// tree.
#[derive(Debug, Clone)]
pub struct LabDefinition {
    pub name: String,
    pub description: String,
    pub definition_dir: PathBuf,
    node_types: BTreeMap<String, TypeEntry>,
    service_types: BTreeMap<String, TypeEntry>,
    pub services: BTreeMap<String, ServiceDecl>,
    /// Lab-level distributable fields, keyed by service name.
    pub dependencies: BTreeMap<String, AttrValue>,
    pub binds: BTreeMap<String, AttrValue>,
    pub ports: BTreeMap<String, AttrValue>,
    pub environment: BTreeMap<String, AttrValue>,
    pub links: BTreeMap<String, AttrValue>,
}

// ---------------------------------------------------------------------
// Raw file shapes

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LabFile {
    #[serde(default)]
    includes: Vec<String>,
    lab: LabSection,
    #[serde(default)]
    node_types: BTreeMap<String, RawTypeDef>,
    #[serde(default)]
    service_types: BTreeMap<String, RawTypeDef>,
    #[serde(default)]
    services: BTreeMap<String, RawServiceDecl>,
}

/// Included files contribute types only.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct IncludeFile {
    #[serde(default)]
    node_types: BTreeMap<String, RawTypeDef>,
    #[serde(default)]
    service_types: BTreeMap<String, RawTypeDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LabSection {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    dependencies: BTreeMap<String, toml::Value>,
    #[serde(default)]
    binds: BTreeMap<String, toml::Value>,
    #[serde(default)]
    ports: BTreeMap<String, toml::Value>,
    #[serde(default)]
    environment: BTreeMap<String, toml::Value>,
    #[serde(default)]
    links: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Deserialize)]
struct RawTypeDef {
    #[serde(default)]
    extends: Option<String>,
    #[serde(flatten)]
    fields: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Deserialize)]
struct RawServiceDecl {
    #[serde(rename = "type", default)]
    service_type: Option<String>,
    #[serde(flatten)]
    overrides: BTreeMap<String, toml::Value>,
}

// ---------------------------------------------------------------------
// Built-in root schemas

pub const BASE_NODE_TYPE: &str = "node";
pub const BASE_SERVICE_TYPE: &str = "service";

/// Root field schema every node type descends from.
pub fn base_node_schema() -> TypeSchema {
    TypeSchema::new(BASE_NODE_TYPE)
        .field("kind", FieldDecl::new(FieldKind::Scalar))
        .field("image", FieldDecl::new(FieldKind::Scalar))
        .field("containerfile", FieldDecl::new(FieldKind::Scalar))
        .field(
            "network_mode",
            FieldDecl::with_default(AttrValue::Scalar(json!("bridge"))),
        )
        .field("entrypoint", FieldDecl::new(FieldKind::Scalar))
        .field("command", FieldDecl::new(FieldKind::Scalar))
        .field("environment", FieldDecl::new(FieldKind::Mapping))
        .field("binds", FieldDecl::new(FieldKind::Sequence))
        .field("ports", FieldDecl::new(FieldKind::Sequence))
        .field("dependencies", FieldDecl::new(FieldKind::Sequence))
        .field("links", FieldDecl::new(FieldKind::Mapping))
        .field("health_check", FieldDecl::new(FieldKind::Mapping))
}

/// Root field schema every service type descends from. All
/// distributable fields at this depth are keyed by node name.
pub fn base_service_schema() -> TypeSchema {
    TypeSchema::new(BASE_SERVICE_TYPE)
        .field("nodes", FieldDecl::new(FieldKind::Mapping))
        .field("dependencies", FieldDecl::new(FieldKind::Mapping))
        .field("binds", FieldDecl::new(FieldKind::Mapping))
        .field("ports", FieldDecl::new(FieldKind::Mapping))
        .field("environment", FieldDecl::new(FieldKind::Mapping))
        .field("shared_environment", FieldDecl::new(FieldKind::Mapping))
        .field("links", FieldDecl::new(FieldKind::Mapping))
}

// ---------------------------------------------------------------------
// Loading

/// Load a lab definition from a `lab.toml` path.
pub fn load_lab_file(path: impl AsRef<Path>) -> Result<LabDefinition, ManifestError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let dir = path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .canonicalize()?;
    let file: LabFile = toml::from_str(&content)?;

    let mut node_types = builtin_node_types(&dir);
    let mut service_types = BTreeMap::new();

    for include in &file.includes {
        let include_path = dir.join(include);
        let include_dir = include_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .canonicalize()?;
        let included: IncludeFile = toml::from_str(&fs::read_to_string(&include_path)?)?;
        insert_types(&mut node_types, included.node_types, &include_dir);
        insert_types(&mut service_types, included.service_types, &include_dir);
    }

    // Local declarations shadow included ones of the same name.
    insert_types(&mut node_types, file.node_types, &dir);
    insert_types(&mut service_types, file.service_types, &dir);

    let services = file
        .services
        .into_iter()
        .map(|(name, raw)| {
            let decl = ServiceDecl {
                type_name: raw
                    .service_type
                    .unwrap_or_else(|| BASE_SERVICE_TYPE.to_owned()),
                overrides: to_attr_map(raw.overrides),
            };
            (name, decl)
        })
        .collect();

    let definition = LabDefinition {
        name: file.lab.name,
        description: file.lab.description,
        definition_dir: dir,
        node_types,
        service_types,
        services,
        dependencies: to_attr_map(file.lab.dependencies),
        binds: to_attr_map(file.lab.binds),
        ports: to_attr_map(file.lab.ports),
        environment: to_attr_map(file.lab.environment),
        links: to_attr_map(file.lab.links),
    };

    // Fail on dangling type references before anything materializes.
    for decl in definition.services.values() {
        let _ = definition.service_chain(&decl.type_name)?;
    }

    Ok(definition)
}

fn builtin_node_types(lab_dir: &Path) -> BTreeMap<String, TypeEntry> {
    let mut fields = BTreeMap::new();
    let _prev = fields.insert("kind".to_owned(), AttrValue::Scalar(json!("linux")));
    let mut types = BTreeMap::new();
    let _prev = types.insert(
        "linux".to_owned(),
        TypeEntry {
            name: "linux".to_owned(),
            extends: None,
            fields,
            definition_dir: lab_dir.to_path_buf(),
        },
    );
    types
}

fn insert_types(
    into: &mut BTreeMap<String, TypeEntry>,
    raw: BTreeMap<String, RawTypeDef>,
    dir: &Path,
) {
    for (name, def) in raw {
        let entry = TypeEntry {
            name: name.clone(),
            extends: def.extends,
            fields: to_attr_map(def.fields),
            definition_dir: dir.to_path_buf(),
        };
        let _prev = into.insert(name, entry);
    }
}

fn to_attr_map(raw: BTreeMap<String, toml::Value>) -> BTreeMap<String, AttrValue> {
    raw.into_iter()
        .map(|(name, value)| (name, AttrValue::from_toml(value)))
        .collect()
}

// ---------------------------------------------------------------------
// Chain construction

impl LabDefinition {
    pub fn node_type(&self, name: &str) -> Option<&TypeEntry> {
        self.node_types.get(name)
    }

    pub fn service_type(&self, name: &str) -> Option<&TypeEntry> {
        self.service_types.get(name)
    }

    /// Ancestor chain for a node type: the built-in root schema first,
    /// then every ancestor from most general to the named type.
    pub fn node_chain(&self, type_name: &str) -> Result<Vec<TypeSchema>, ManifestError> {
        build_chain(
            TypeCategory::Node,
            type_name,
            BASE_NODE_TYPE,
            &base_node_schema(),
            &self.node_types,
        )
    }

    pub fn service_chain(&self, type_name: &str) -> Result<Vec<TypeSchema>, ManifestError> {
        build_chain(
            TypeCategory::Service,
            type_name,
            BASE_SERVICE_TYPE,
            &base_service_schema(),
            &self.service_types,
        )
    }

    /// The directory anchoring relative binds for layers of the given
    /// node type: where the type was declared.
    pub fn node_definition_dir(&self, type_name: &str) -> &Path {
        self.node_types
            .get(type_name)
            .map_or(self.definition_dir.as_path(), |entry| {
                entry.definition_dir.as_path()
            })
    }

    pub fn service_definition_dir(&self, type_name: &str) -> &Path {
        self.service_types
            .get(type_name)
            .map_or(self.definition_dir.as_path(), |entry| {
                entry.definition_dir.as_path()
            })
    }
}

fn build_chain(
    category: TypeCategory,
    type_name: &str,
    base_name: &str,
    base: &TypeSchema,
    types: &BTreeMap<String, TypeEntry>,
) -> Result<Vec<TypeSchema>, ManifestError> {
    let mut lineage = Vec::new();
    let mut visited = Vec::new();
    let mut current = type_name;

    while current != base_name {
        if visited.contains(&current) {
            return Err(ManifestError::ExtendsCycle {
                category,
                name: current.to_owned(),
            });
        }
        visited.push(current);

        let Some(entry) = types.get(current) else {
            return Err(ManifestError::UnknownType {
                category,
                name: current.to_owned(),
            });
        };
        lineage.push(entry);
        current = entry.extends.as_deref().unwrap_or(base_name);
    }

    let mut chain = Vec::with_capacity(lineage.len() + 1);
    chain.push(base.clone());
    for entry in lineage.into_iter().rev() {
        chain.push(schema_from_entry(entry, base)?);
    }
    Ok(chain)
}

/// Turn an authored type into a schema level, validating every declared
/// field against the root schema's name and kind.
fn schema_from_entry(entry: &TypeEntry, base: &TypeSchema) -> Result<TypeSchema, ResolveError> {
    let mut schema = TypeSchema::new(entry.name.clone());
    for (name, value) in &entry.fields {
        let Some(decl) = base.fields.get(name) else {
            return Err(ResolveError::UnknownField {
                field: name.clone(),
                type_name: entry.name.clone(),
            });
        };
        if value.kind() != decl.kind {
            return Err(ResolveError::TypeMismatch {
                field: name.clone(),
                declared: decl.kind,
                found: value.kind(),
            });
        }
        schema = schema.field(name.clone(), FieldDecl::with_default(value.clone()));
    }
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolve_fields;

    fn write_lab(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("lab.toml");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn loads_minimal_lab() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lab(
            dir.path(),
            r#"
[lab]
name = "Basic Lab"
description = "A simple lab with nothing in it."
"#,
        );
        let definition = load_lab_file(path).unwrap();
        assert_eq!(definition.name, "Basic Lab");
        assert!(definition.services.is_empty());
        assert!(definition.node_type("linux").is_some());
    }

    #[test]
    fn node_chain_resolves_inherited_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lab(
            dir.path(),
            r#"
[lab]
name = "Lab"

[node_types.base-app]
extends = "linux"
image = "app:1"
binds = ["data:/data"]

[node_types.worker]
extends = "base-app"
binds = ["scratch:/scratch"]
command = "run-worker"
"#,
        );
        let definition = load_lab_file(path).unwrap();
        let chain = definition.node_chain("worker").unwrap();
        let resolved = resolve_fields(&chain, &BTreeMap::new()).unwrap();

        assert_eq!(resolved["kind"].as_str(), Some("linux"));
        assert_eq!(resolved["image"].as_str(), Some("app:1"));
        assert_eq!(resolved["command"].as_str(), Some("run-worker"));
        assert_eq!(
            resolved["binds"],
            AttrValue::from_json(serde_json::json!(["data:/data", "scratch:/scratch"]))
        );
        // untouched default from the root schema
        assert_eq!(resolved["network_mode"].as_str(), Some("bridge"));
    }

    #[test]
    fn unknown_extends_target_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lab(
            dir.path(),
            r#"
[lab]
name = "Lab"

[node_types.broken]
extends = "missing"
"#,
        );
        let definition = load_lab_file(path).unwrap();
        let err = definition.node_chain("broken").unwrap_err();
        assert!(matches!(err, ManifestError::UnknownType { .. }));
    }

    #[test]
    fn extends_cycle_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lab(
            dir.path(),
            r#"
[lab]
name = "Lab"

[node_types.a]
extends = "b"

[node_types.b]
extends = "a"
"#,
        );
        let definition = load_lab_file(path).unwrap();
        let err = definition.node_chain("a").unwrap_err();
        assert!(matches!(err, ManifestError::ExtendsCycle { .. }));
    }

    #[test]
    fn type_with_undeclared_field_fails_at_chain_build() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lab(
            dir.path(),
            r#"
[lab]
name = "Lab"

[node_types.typo]
extends = "linux"
imgae = "oops:1"
"#,
        );
        let definition = load_lab_file(path).unwrap();
        let err = definition.node_chain("typo").unwrap_err();
        assert!(matches!(
            err,
            ManifestError::Resolve(ResolveError::UnknownField { .. })
        ));
    }

    #[test]
    fn includes_contribute_types_with_their_own_directory() {
        let dir = tempfile::tempdir().unwrap();
        let common = dir.path().join("common");
        fs::create_dir(&common).unwrap();
        fs::write(
            common.join("types.toml"),
            r#"
[node_types.db]
extends = "linux"
image = "postgres:13"
"#,
        )
        .unwrap();

        let lab_dir = dir.path().join("mylab");
        fs::create_dir(&lab_dir).unwrap();
        let path = write_lab(
            &lab_dir,
            r#"
includes = ["../common/types.toml"]

[lab]
name = "Lab"

[node_types.fast-db]
extends = "db"
"#,
        );

        let definition = load_lab_file(path).unwrap();
        let chain = definition.node_chain("fast-db").unwrap();
        let resolved = resolve_fields(&chain, &BTreeMap::new()).unwrap();
        assert_eq!(resolved["image"].as_str(), Some("postgres:13"));

        assert_eq!(
            definition.node_definition_dir("db"),
            common.canonicalize().unwrap()
        );
        assert_eq!(
            definition.node_definition_dir("fast-db"),
            lab_dir.canonicalize().unwrap()
        );
    }

    #[test]
    fn local_types_shadow_included_ones() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("types.toml"),
            r#"
[node_types.db]
extends = "linux"
image = "postgres:13"
"#,
        )
        .unwrap();
        let path = write_lab(
            dir.path(),
            r#"
includes = ["types.toml"]

[lab]
name = "Lab"

[node_types.db]
extends = "linux"
image = "postgres:16"
"#,
        );
        let definition = load_lab_file(path).unwrap();
        let chain = definition.node_chain("db").unwrap();
        let resolved = resolve_fields(&chain, &BTreeMap::new()).unwrap();
        assert_eq!(resolved["image"].as_str(), Some("postgres:16"));
    }

    #[test]
    fn dangling_service_type_fails_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lab(
            dir.path(),
            r#"
[lab]
name = "Lab"

[services.web]
type = "missing"
"#,
        );
        let err = load_lab_file(path).unwrap_err();
        assert!(matches!(err, ManifestError::UnknownType { .. }));
    }

    #[test]
    fn unknown_top_level_section_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_lab(
            dir.path(),
            r#"
[lab]
name = "Lab"

[surprise]
value = 1
"#,
        );
        assert!(matches!(
            load_lab_file(path),
            Err(ManifestError::ParseToml(_))
        ));
    }
}
