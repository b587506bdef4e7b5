//! Artifact generators for the message-contract compiler
//!
//! Independent backends consume the read-only [`GlobalModel`] and emit
//! text artifacts. Each backend implements the [`ArtifactGenerator`] trait;
//! backends never communicate with each other, only through the shared
//! model, and the same model always produces byte-identical output.
//!
//! # Backends
//!
//! - **dispatcher**: per-receiver `{R}MessageReceiver.cpp` decode-and-invoke
//!   routines (plus `{R}MessageReceiver.swift` for `SwiftReceiver` opt-ins)
//! - **declarations**: per-receiver `{R}Messages.h` argument structs
//! - **registry**: global `MessageNames.h`/`MessageNames.cpp` ordinal enum
//!   with both lookup directions
//! - **reflection**: global `MessageArgumentDescriptions.cpp` argument
//!   name/type table
//! - **manifest**: `module.private.modulemap` listing the generated headers
//!
//! Receivers marked `Builtin` are skipped by the per-receiver backends and
//! the manifest; the registry and reflection table still cover their
//! messages.

pub mod common;
pub mod declarations;
pub mod dispatcher;
pub mod manifest;
pub mod reflection;
pub mod registry;
pub mod swift;

pub use common::IndentWriter;
pub use declarations::DeclarationsGenerator;
pub use dispatcher::DispatcherGenerator;
pub use manifest::ManifestGenerator;
pub use reflection::ReflectionGenerator;
pub use registry::RegistryGenerator;
pub use swift::SwiftDispatcherGenerator;

use crate::model::GlobalModel;
use thiserror::Error;

/// Errors that can occur during artifact generation.
#[derive(Debug, Error)]
pub enum CodeGenError {
    #[error("artifact generation failed: {0}")]
    GenerationFailed(String),
}

pub type CodeGenResult<T> = Result<T, CodeGenError>;

/// One generated output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub contents: String,
}

impl Artifact {
    pub fn new(file_name: impl Into<String>, contents: String) -> Self {
        Self {
            file_name: file_name.into(),
            contents,
        }
    }
}

/// A backend turning the global model into zero or more artifacts.
///
/// Implementations must be deterministic: the same model yields byte
/// identical artifacts in the same order.
pub trait ArtifactGenerator {
    /// Backend name, for diagnostics.
    fn name(&self) -> &'static str;

    /// Generate this backend's artifacts from the model.
    fn generate(&self, model: &GlobalModel) -> CodeGenResult<Vec<Artifact>>;
}

/// Run every backend over the model, in fixed order.
pub fn generate_all(model: &GlobalModel) -> CodeGenResult<Vec<Artifact>> {
    let generators: [&dyn ArtifactGenerator; 6] = [
        &DispatcherGenerator,
        &SwiftDispatcherGenerator,
        &DeclarationsGenerator,
        &RegistryGenerator,
        &ReflectionGenerator,
        &ManifestGenerator,
    ];

    let mut artifacts = Vec::new();
    for generator in generators {
        artifacts.extend(generator.generate(model)?);
    }
    Ok(artifacts)
}

/// Header line stamped on every generated artifact.
pub(crate) const GENERATED_BANNER: &str = "Generated by msgc. Do not edit.";
