//! Ancestor-chain attribute resolution.
//!
//! Each level of a definition's inheritance chain is an explicit
//! [`TypeSchema`]; resolution walks the chain from the most general
//! ancestor to the most specific type, merging redeclared fields by
//! container kind, then applies instance overrides with the same rules.
//! No level ever mutates another level's values: the result is an
//! independent copy per instance.

use crate::value::{AttrValue, FieldKind};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("unknown field '{field}' for type '{type_name}'")]
    UnknownField { field: String, type_name: String },
    #[error("type mismatch for field '{field}': declared {declared}, got {found}")]
    TypeMismatch {
        field: String,
        declared: FieldKind,
        found: FieldKind,
    },
}

/// One field declaration at one chain level: the container kind plus an
/// optional default contributed by that level.
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub kind: FieldKind,
    pub default: Option<AttrValue>,
}

impl FieldDecl {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            default: None,
        }
    }

    pub fn with_default(default: AttrValue) -> Self {
        Self {
            kind: default.kind(),
            default: Some(default),
        }
    }
}

/// The field declarations of a single type in an inheritance chain.
#[derive(Debug, Clone)]
pub struct TypeSchema {
    pub name: String,
    pub fields: BTreeMap<String, FieldDecl>,
}

impl TypeSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, decl: FieldDecl) -> Self {
        let _prev = self.fields.insert(name.into(), decl);
        self
    }
}

/// Fields resolved from a chain, retaining the declared kind of each so
/// later override passes can keep enforcing it.
#[derive(Debug, Clone)]
pub struct ResolvedFields {
    type_name: String,
    fields: BTreeMap<String, (FieldKind, AttrValue)>,
}

impl ResolvedFields {
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.fields.get(name).map(|(_, value)| value)
    }

    /// Apply one override map, treating the overrides as most specific.
    pub fn apply(
        &mut self,
        overrides: &BTreeMap<String, AttrValue>,
    ) -> Result<(), ResolveError> {
        for (name, value) in overrides {
            let Some((kind, current)) = self.fields.get_mut(name) else {
                return Err(ResolveError::UnknownField {
                    field: name.clone(),
                    type_name: self.type_name.clone(),
                });
            };
            if value.kind() != *kind {
                return Err(ResolveError::TypeMismatch {
                    field: name.clone(),
                    declared: *kind,
                    found: value.kind(),
                });
            }
            merge_value(current, value.clone());
        }
        Ok(())
    }

    pub fn into_values(self) -> BTreeMap<String, AttrValue> {
        self.fields
            .into_iter()
            .map(|(name, (_, value))| (name, value))
            .collect()
    }
}

/// Resolve a chain of type schemas, most general first.
pub fn resolve_chain(chain: &[TypeSchema]) -> Result<ResolvedFields, ResolveError> {
    let type_name = chain
        .last()
        .map_or_else(|| "<empty>".to_owned(), |schema| schema.name.clone());
    let mut fields: BTreeMap<String, (FieldKind, AttrValue)> = BTreeMap::new();

    for schema in chain {
        for (name, decl) in &schema.fields {
            if let Some(default) = &decl.default {
                if default.kind() != decl.kind {
                    return Err(ResolveError::TypeMismatch {
                        field: name.clone(),
                        declared: decl.kind,
                        found: default.kind(),
                    });
                }
            }
            match fields.get_mut(name) {
                None => {
                    let seed = decl
                        .default
                        .clone()
                        .unwrap_or_else(|| AttrValue::empty(decl.kind));
                    let _prev = fields.insert(name.clone(), (decl.kind, seed));
                }
                Some((kind, current)) => {
                    if decl.kind != *kind {
                        return Err(ResolveError::TypeMismatch {
                            field: name.clone(),
                            declared: *kind,
                            found: decl.kind,
                        });
                    }
                    if let Some(default) = &decl.default {
                        merge_value(current, default.clone());
                    }
                }
            }
        }
    }

    Ok(ResolvedFields { type_name, fields })
}

/// Resolve a chain and apply instance overrides in one step.
pub fn resolve_fields(
    chain: &[TypeSchema],
    overrides: &BTreeMap<String, AttrValue>,
) -> Result<BTreeMap<String, AttrValue>, ResolveError> {
    let mut resolved = resolve_chain(chain)?;
    resolved.apply(overrides)?;
    Ok(resolved.into_values())
}

/// Merge a more specific value into the current one. Kinds are already
/// known to agree.
fn merge_value(current: &mut AttrValue, incoming: AttrValue) {
    match (current, incoming) {
        (AttrValue::Sequence(items), AttrValue::Sequence(more)) => items.extend(more),
        (AttrValue::Mapping(map), AttrValue::Mapping(updates)) => {
            for (key, value) in updates {
                let _prev = map.insert(key, value);
            }
        }
        (AttrValue::Scalar(slot), AttrValue::Scalar(value)) => *slot = value,
        _ => unreachable!("merge_value called with mismatched kinds"),
    }
}
