//! Bind mount classification and path resolution.
//!
//! Raw bind specs take the form `local:remote[:ro]`. The local part is
//! classified before any path work happens: absolute paths are used
//! as-is, `./`-relative paths resolve against the layer's static
//! definition directory, and bare names resolve against the layer's
//! ephemeral state directory. Absolute and relative paths are expanded
//! as glob patterns; named paths are not, since their directory does not
//! exist until first use.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BindError {
    #[error("invalid bind spec '{0}': expected '<local>:<remote>[:ro]'")]
    InvalidSpec(String),
    #[error("invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },
    #[error("failed to read glob match for '{pattern}': {source}")]
    Glob {
        pattern: String,
        source: glob::GlobError,
    },
}

/// Classification of the local half of a bind spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindSource {
    Absolute(PathBuf),
    /// A `./`-prefixed path, stored without the prefix.
    Relative(String),
    /// A bare name, to be placed under the state directory.
    Named(String),
}

/// A parsed, still unresolved bind spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindSpec {
    pub source: BindSource,
    pub remote: String,
    pub read_only: bool,
}

impl BindSpec {
    pub fn parse(raw: &str) -> Result<Self, BindError> {
        let (body, read_only) = match raw.strip_suffix(":ro") {
            Some(stripped) => (stripped, true),
            None => (raw, false),
        };
        let Some((local, remote)) = body.split_once(':') else {
            return Err(BindError::InvalidSpec(raw.to_owned()));
        };
        if local.is_empty() || remote.is_empty() {
            return Err(BindError::InvalidSpec(raw.to_owned()));
        }

        let source = if Path::new(local).is_absolute() {
            BindSource::Absolute(PathBuf::from(local))
        } else if let Some(rel) = local.strip_prefix("./") {
            BindSource::Relative(rel.to_owned())
        } else {
            BindSource::Named(local.to_owned())
        };

        Ok(Self {
            source,
            remote: remote.to_owned(),
            read_only,
        })
    }
}

/// A fully resolved bind: absolute local path, container path, and an
/// explicit read-only marker. No relative or named form survives here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedBind {
    pub local: PathBuf,
    pub remote: String,
    pub read_only: bool,
}

impl ResolvedBind {
    /// Render in the orchestrator's `local:remote[:ro]` form.
    pub fn render(&self) -> String {
        let suffix = if self.read_only { ":ro" } else { "" };
        format!("{}:{}{}", self.local.display(), self.remote, suffix)
    }
}

/// Resolve a list of raw bind specs against one layer's directories.
pub fn resolve_binds(
    definition_dir: &Path,
    state_dir: &Path,
    specs: &[String],
) -> Result<Vec<ResolvedBind>, BindError> {
    let mut resolved = Vec::new();
    for raw in specs {
        let spec = BindSpec::parse(raw)?;
        match spec.source {
            BindSource::Named(name) => {
                // The state directory entry does not exist yet; emit the
                // single path and let first use create it. Named binds
                // are always writable.
                resolved.push(ResolvedBind {
                    local: state_dir.join(name),
                    remote: spec.remote,
                    read_only: false,
                });
            }
            BindSource::Relative(rel) => {
                // Definition directory content is static lab source.
                let local = definition_dir.join(rel);
                expand_glob(&local, &spec.remote, true, &mut resolved)?;
            }
            BindSource::Absolute(local) => {
                let read_only = spec.read_only || !local.starts_with(state_dir);
                expand_glob(&local, &spec.remote, read_only, &mut resolved)?;
            }
        }
    }
    Ok(resolved)
}

fn expand_glob(
    local: &Path,
    remote: &str,
    read_only: bool,
    out: &mut Vec<ResolvedBind>,
) -> Result<(), BindError> {
    let pattern = local.to_string_lossy();
    let matches = glob::glob(&pattern)
        .map_err(|source| BindError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| BindError::Glob {
            pattern: pattern.to_string(),
            source,
        })?;

    if matches.len() == 1 && matches[0] == local {
        out.push(ResolvedBind {
            local: local.to_path_buf(),
            remote: remote.to_owned(),
            read_only,
        });
        return Ok(());
    }

    // A pattern that fans out mounts each match under the original
    // remote as a directory. Zero matches drop the bind entirely.
    for matched in matches {
        let base = matched
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        out.push(ResolvedBind {
            local: matched,
            remote: format!("{}/{}", remote.trim_end_matches('/'), base),
            read_only,
        });
    }
    Ok(())
}
