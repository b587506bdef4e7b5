//! Module-export manifest backend
//!
//! Emits `module.private.modulemap` listing the declarations headers
//! produced for all non-builtin receivers, for downstream module wiring.
//! The list follows the model's canonical receiver order, so it is stable
//! across invocations.

use crate::codegen::common::{close_guard, open_guard, IndentWriter};
use crate::codegen::{Artifact, ArtifactGenerator, CodeGenResult, GENERATED_BANNER};
use crate::model::GlobalModel;

pub struct ManifestGenerator;

impl ArtifactGenerator for ManifestGenerator {
    fn name(&self) -> &'static str {
        "manifest"
    }

    fn generate(&self, model: &GlobalModel) -> CodeGenResult<Vec<Artifact>> {
        let mut w = IndentWriter::new();
        w.raw_line(&format!("// {GENERATED_BANNER}"));
        w.blank();
        w.raw_line("module Messages [system] {");
        w.indent();
        for linked in model.receivers() {
            let receiver = &linked.receiver;
            if receiver.is_builtin() {
                continue;
            }
            open_guard(&mut w, receiver.condition.as_deref());
            w.line(&format!("explicit module {} {{", receiver.name));
            w.indent();
            w.line(&format!("header \"{}Messages.h\"", receiver.name));
            w.line("export *");
            w.dedent();
            w.line("}");
            close_guard(&mut w, receiver.condition.as_deref());
        }
        w.dedent();
        w.raw_line("}");
        Ok(vec![Artifact::new("module.private.modulemap", w.into_output())])
    }
}
