//! Lab definition model for labrig.
//!
//! This crate owns the declarative side of the system: the generic
//! attribute value model and ancestor-chain resolver, the bind mount
//! classifier and path rewriter, the staged-dependency and health-check
//! wire types, the topology document handed to the orchestrator, and the
//! `lab.toml` manifest loader that turns authored definitions into
//! explicit type chains.

pub mod bind;
pub mod dependency;
pub mod health;
pub mod manifest;
pub mod resolve;
pub mod topology;
pub mod value;

pub use bind::{resolve_binds, BindError, BindSource, BindSpec, ResolvedBind};
pub use dependency::{DependencyState, StagedDependency};
pub use health::HealthCheck;
pub use manifest::{
    load_lab_file, LabDefinition, ManifestError, ServiceDecl, TypeCategory, TypeEntry,
};
pub use resolve::{resolve_fields, FieldDecl, ResolveError, ResolvedFields, TypeSchema};
pub use topology::{CreateStage, LinkEntry, NodeDescriptor, Stages, TopologyDoc, TopologySection};
pub use value::{AttrValue, FieldKind};
