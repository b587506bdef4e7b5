//! Compilation pipeline
//!
//! Orchestrates the three stages over a batch of inputs: parse each
//! `.messages.in` unit, build and validate its receiver model, link the
//! full set into the global model, then run every artifact backend.
//!
//! Per-input failures do not stop the batch: every input is processed and
//! all collected errors are reported together. Cross-receiver checks run
//! only once every input has parsed and validated. Any error at any stage
//! is fatal to the invocation; no artifact is written on failure.

use crate::codegen::{generate_all, Artifact, CodeGenError};
use crate::model::{build_receiver, link, LinkError, ModelError, Receiver};
use crate::parser::{parse, ParseError};
use crate::policy::{Policy, PolicyError};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File suffix for receiver contracts.
pub const CONTRACT_SUFFIX: &str = ".messages.in";

/// An error from any stage of the pipeline, tagged with enough context to
/// locate the offending input.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{path}: {source}", path = .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{input}{CONTRACT_SUFFIX}: {source}")]
    Parse {
        input: String,
        #[source]
        source: ParseError,
    },

    #[error("{input}{CONTRACT_SUFFIX}: {source}")]
    Model {
        input: String,
        #[source]
        source: ModelError,
    },

    #[error(
        "receiver '{declared}' is declared in '{path}' but the file stem is '{stem}'; \
         the receiver name must match its filename",
        path = .path.display()
    )]
    FilenameMismatch {
        declared: String,
        stem: String,
        path: PathBuf,
    },

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    CodeGen(#[from] CodeGenError),
}

pub type CompileResult<T> = Result<T, Vec<CompileError>>;

/// The batch compiler: parse all, model all, link once, generate all.
pub struct Compiler {
    policy: Policy,
}

impl Compiler {
    pub fn new(policy: Policy) -> Self {
        Self { policy }
    }

    /// Compile a set of receivers located on disk. Each entry names a
    /// receiver (optionally with a path prefix) whose contract lives at
    /// `{name}.messages.in`, looked up in the current directory first and
    /// the base directory second.
    pub fn compile_files(&self, base_dir: &Path, receivers: &[String]) -> CompileResult<Vec<Artifact>> {
        let mut errors = Vec::new();
        let mut units = Vec::new();

        for receiver in receivers {
            let stem = receiver
                .rsplit('/')
                .next()
                .unwrap_or(receiver.as_str())
                .to_string();
            let relative = PathBuf::from(format!("{receiver}{CONTRACT_SUFFIX}"));
            let path = if relative.exists() {
                relative
            } else {
                base_dir.join(format!("{receiver}{CONTRACT_SUFFIX}"))
            };
            match fs::read_to_string(&path) {
                Ok(text) => units.push(SourceUnit { stem, path, text }),
                Err(source) => errors.push(CompileError::Io { path, source }),
            }
        }

        self.compile_units(units, errors)
    }

    /// Compile in-memory sources, each tagged with the filename stem it
    /// would have been read from. Used by tests and embedders.
    pub fn compile_sources(&self, sources: &[(&str, &str)]) -> CompileResult<Vec<Artifact>> {
        let units = sources
            .iter()
            .map(|(stem, text)| SourceUnit {
                stem: stem.to_string(),
                path: PathBuf::from(format!("{stem}{CONTRACT_SUFFIX}")),
                text: text.to_string(),
            })
            .collect();
        self.compile_units(units, Vec::new())
    }

    fn compile_units(
        &self,
        units: Vec<SourceUnit>,
        mut errors: Vec<CompileError>,
    ) -> CompileResult<Vec<Artifact>> {
        let mut receivers: Vec<Receiver> = Vec::new();

        for unit in &units {
            let ast = match parse(&unit.text) {
                Ok(ast) => ast,
                Err(source) => {
                    errors.push(CompileError::Parse {
                        input: unit.stem.clone(),
                        source,
                    });
                    continue;
                }
            };

            if ast.name != unit.stem {
                errors.push(CompileError::FilenameMismatch {
                    declared: ast.name.clone(),
                    stem: unit.stem.clone(),
                    path: unit.path.clone(),
                });
            }

            match build_receiver(&ast, &self.policy) {
                Ok(receiver) => receivers.push(receiver),
                Err(model_errors) => {
                    errors.extend(model_errors.into_iter().map(|source| CompileError::Model {
                        input: unit.stem.clone(),
                        source,
                    }));
                }
            }
        }

        // Cross-receiver validation needs every input in hand; it only
        // runs on a clean per-input batch.
        if !errors.is_empty() {
            return Err(errors);
        }

        let model = link(receivers)
            .map_err(|link_errors| link_errors.into_iter().map(CompileError::from).collect::<Vec<_>>())?;

        generate_all(&model).map_err(|error| vec![CompileError::from(error)])
    }
}

struct SourceUnit {
    stem: String,
    path: PathBuf,
    text: String,
}

/// Write artifacts into the output directory, creating it if absent.
/// Whole-file truncate-and-rewrite with an explicit flush, so a failed run
/// never leaves a partial file looking like a valid artifact.
pub fn write_artifacts(artifacts: &[Artifact], output_dir: &Path) -> Result<(), CompileError> {
    fs::create_dir_all(output_dir).map_err(|source| CompileError::Io {
        path: output_dir.to_path_buf(),
        source,
    })?;

    for artifact in artifacts {
        let path = output_dir.join(&artifact.file_name);
        let io_error = |source| CompileError::Io {
            path: path.clone(),
            source,
        };
        let mut file = fs::File::create(&path).map_err(io_error)?;
        file.write_all(artifact.contents.as_bytes()).map_err(io_error)?;
        file.flush().map_err(io_error)?;
    }
    Ok(())
}
