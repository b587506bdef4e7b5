//! Argument-reflection backend
//!
//! Emits `MessageArgumentDescriptions.cpp`: for every message, the ordered
//! list of parameter names and type-name strings used by runtime
//! introspection and message logging. Ordering is declaration order, the
//! same ordering the declarations backend emits, so the two can never
//! disagree about which argument is which.

use crate::codegen::common::{close_guard, combined_condition, open_guard, IndentWriter};
use crate::codegen::{Artifact, ArtifactGenerator, CodeGenResult, GENERATED_BANNER};
use crate::model::{GlobalModel, Parameter};

pub struct ReflectionGenerator;

impl ArtifactGenerator for ReflectionGenerator {
    fn name(&self) -> &'static str {
        "reflection"
    }

    fn generate(&self, model: &GlobalModel) -> CodeGenResult<Vec<Artifact>> {
        Ok(vec![Artifact::new(
            "MessageArgumentDescriptions.cpp",
            generate_implementation(model),
        )])
    }
}

fn generate_implementation(model: &GlobalModel) -> String {
    let mut w = IndentWriter::new();
    w.raw_line(&format!("// {GENERATED_BANNER}"));
    w.blank();
    w.raw_line("#include \"MessageNames.h\"");
    w.blank();
    w.raw_line("#include <optional>");
    w.raw_line("#include <vector>");
    w.blank();
    w.raw_line("namespace IPC {");
    w.blank();
    w.line("struct ArgumentDescription {");
    w.indent();
    w.line("const char* name;");
    w.line("const char* type;");
    w.dedent();
    w.line("};");
    w.blank();

    emit_lookup(&mut w, model, "messageArgumentDescriptions", |message| {
        Some(&message.parameters)
    });
    w.blank();
    emit_lookup(&mut w, model, "messageReplyArgumentDescriptions", |message| {
        message.reply_parameters.as_ref()
    });
    w.blank();
    w.raw_line("} // namespace IPC");
    w.into_output()
}

fn emit_lookup<'a, F>(w: &mut IndentWriter, model: &'a GlobalModel, function: &str, select: F)
where
    F: Fn(&'a crate::model::Message) -> Option<&'a Vec<Parameter>>,
{
    w.line(&format!(
        "std::optional<std::vector<ArgumentDescription>> {function}(MessageName name)"
    ));
    w.line("{");
    w.indent();
    w.line("switch (name) {");
    for entry in model.entries() {
        let Some(parameters) = select(entry.message) else {
            continue;
        };
        let condition = combined_condition(entry.receiver, entry.message);
        open_guard(w, condition.as_deref());
        w.line(&format!("case MessageName::{}:", entry.qualified_name()));
        w.indent();
        let descriptions = parameters
            .iter()
            .map(|p| format!("{{ \"{}\", \"{}\" }}", p.name, p.ty))
            .collect::<Vec<_>>()
            .join(", ");
        if descriptions.is_empty() {
            w.line("return std::vector<ArgumentDescription> { };");
        } else {
            w.line(&format!(
                "return std::vector<ArgumentDescription> {{ {descriptions} }};"
            ));
        }
        w.dedent();
        close_guard(w, condition.as_deref());
    }
    w.line("default:");
    w.indent();
    w.line("return std::nullopt;");
    w.dedent();
    w.line("}");
    w.dedent();
    w.line("}");
}
