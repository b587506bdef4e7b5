//! msgc: a compiler for inter-process message contracts.
//!
//! Receiver endpoints declare their message surface in `.messages.in`
//! files. This crate parses those contracts, validates them against a
//! closed attribute vocabulary and an opaque-type policy, links the full
//! receiver set into a globally ordered message space, and emits the
//! dispatch, declaration, registry, reflection, and manifest sources the
//! IPC layer builds against.
//!
//! The pipeline is three stages behind one entry point:
//!
//! ```text
//! .messages.in --parse--> ReceiverAst --build--> Receiver --link--> GlobalModel --generate--> artifacts
//! ```
//!
//! ```
//! use msgc::{Compiler, Policy};
//!
//! let source = "messages -> Logger {\n    Log(String text)\n}\n";
//! let compiler = Compiler::new(Policy::builtin().clone());
//! let artifacts = compiler.compile_sources(&[("Logger", source)]).unwrap();
//! assert!(artifacts.iter().any(|a| a.file_name == "LoggerMessages.h"));
//! ```

pub mod codegen;
pub mod compile;
pub mod model;
pub mod parser;
pub mod policy;

pub use codegen::{generate_all, Artifact};
pub use compile::{write_artifacts, CompileError, Compiler};
pub use model::{GlobalModel, Receiver};
pub use policy::Policy;
