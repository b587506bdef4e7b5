//! Opaque-type policy tables
//!
//! A parameter type is "opaque" when the default serialization derivation
//! cannot handle it and a hand-written encode/decode pair exists for it.
//! Such types must be named on an allow-list, and the `[Opaque]` marker on a
//! parameter is valid only for allow-listed types. The table ships with a
//! builtin default and can be extended or replaced by an `msgc.toml` file:
//!
//! ```toml
//! [opaque]
//! types = ["GPUProcess::TextureHandle"]
//! replace = false   # extend the builtin list; true replaces it
//! ```
//!
//! The policy is always passed explicitly into validation so tests can
//! substitute fixtures without touching process-wide state.

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

/// Policy errors.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse policy file: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type PolicyResult<T> = Result<T, PolicyError>;

/// Types with hand-written encode/decode support in the IPC runtime.
const BUILTIN_OPAQUE_TYPES: &[&str] = &[
    "IPC::ConnectionHandle",
    "IPC::Signal",
    "MachSendRight",
    "SharedMemory::Handle",
    "WebCore::SharedBuffer",
];

/// Immutable policy tables consulted during semantic validation.
#[derive(Debug, Clone)]
pub struct Policy {
    opaque_types: BTreeSet<String>,
}

impl Policy {
    /// The builtin table compiled into the tool.
    pub fn builtin() -> &'static Policy {
        static BUILTIN: Lazy<Policy> = Lazy::new(|| Policy {
            opaque_types: BUILTIN_OPAQUE_TYPES
                .iter()
                .map(|ty| ty.to_string())
                .collect(),
        });
        &BUILTIN
    }

    /// A policy with exactly the given opaque types, for tests and fixtures.
    pub fn with_opaque_types<I, S>(types: I) -> Policy
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Policy {
            opaque_types: types.into_iter().map(Into::into).collect(),
        }
    }

    /// Load a policy from an `msgc.toml` file, layered over the builtin
    /// table unless the file asks to replace it.
    pub fn load(path: &Path) -> PolicyResult<Policy> {
        let content = std::fs::read_to_string(path)?;
        let file: PolicyFile = toml::from_str(&content)?;

        let mut opaque_types = if file.opaque.replace {
            BTreeSet::new()
        } else {
            Policy::builtin().opaque_types.clone()
        };
        opaque_types.extend(file.opaque.types);
        Ok(Policy { opaque_types })
    }

    /// Whether a parameter type requires the `[Opaque]` marker.
    pub fn is_opaque(&self, ty: &str) -> bool {
        self.opaque_types.contains(ty.trim())
    }

    /// The allow-listed opaque types, in sorted order.
    pub fn opaque_types(&self) -> impl Iterator<Item = &str> {
        self.opaque_types.iter().map(String::as_str)
    }
}

#[derive(Debug, Deserialize, Default)]
struct PolicyFile {
    #[serde(default)]
    opaque: OpaqueSection,
}

#[derive(Debug, Deserialize, Default)]
struct OpaqueSection {
    #[serde(default)]
    types: Vec<String>,

    #[serde(default)]
    replace: bool,
}
