//! Global name registry backend
//!
//! Emits `MessageNames.h` and `MessageNames.cpp`: the ordered enumeration
//! of every `(receiver, message)` pair with its assigned ordinal, plus
//! lookups in both directions for the debug/trace subsystem. Every message
//! in the model appears here, builtin receivers included.
//!
//! Guard conditions wrap entries in the description tables but not the enum
//! itself: ordinals are wire-stable identifiers, so the numeric space must
//! not shift between platform configurations.

use crate::codegen::common::{close_guard, combined_condition, open_guard, IndentWriter};
use crate::codegen::{Artifact, ArtifactGenerator, CodeGenResult, GENERATED_BANNER};
use crate::model::GlobalModel;

pub struct RegistryGenerator;

impl ArtifactGenerator for RegistryGenerator {
    fn name(&self) -> &'static str {
        "registry"
    }

    fn generate(&self, model: &GlobalModel) -> CodeGenResult<Vec<Artifact>> {
        Ok(vec![
            Artifact::new("MessageNames.h", generate_header(model)),
            Artifact::new("MessageNames.cpp", generate_implementation(model)),
        ])
    }
}

fn generate_header(model: &GlobalModel) -> String {
    let mut w = IndentWriter::new();
    w.raw_line(&format!("// {GENERATED_BANNER}"));
    w.blank();
    w.raw_line("#pragma once");
    w.blank();
    w.raw_line("#include <cstdint>");
    w.blank();
    w.raw_line("namespace IPC {");
    w.blank();
    w.line("enum class MessageName : uint16_t {");
    w.indent();
    for entry in model.entries() {
        w.line(&format!("{} = {},", entry.qualified_name(), entry.ordinal));
    }
    w.line(&format!("Invalid = {},", model.message_count()));
    w.dedent();
    w.line("};");
    w.blank();
    w.line(&format!(
        "constexpr uint16_t messageNameCount = {};",
        model.message_count()
    ));
    w.blank();
    w.line("const char* description(MessageName);");
    w.line("MessageName messageNameFromDescription(const char*);");
    w.line("bool isValidMessageName(MessageName);");
    w.blank();
    w.raw_line("} // namespace IPC");
    w.into_output()
}

fn generate_implementation(model: &GlobalModel) -> String {
    let mut w = IndentWriter::new();
    w.raw_line(&format!("// {GENERATED_BANNER}"));
    w.blank();
    w.raw_line("#include \"MessageNames.h\"");
    w.blank();
    w.raw_line("#include <cstring>");
    w.blank();
    w.raw_line("namespace IPC {");
    w.blank();

    w.line("const char* description(MessageName name)");
    w.line("{");
    w.indent();
    w.line("switch (name) {");
    for entry in model.entries() {
        let condition = combined_condition(entry.receiver, entry.message);
        let qualified = entry.qualified_name();
        open_guard(&mut w, condition.as_deref());
        w.line(&format!("case MessageName::{qualified}:"));
        w.indent();
        w.line(&format!("return \"{qualified}\";"));
        w.dedent();
        close_guard(&mut w, condition.as_deref());
    }
    w.line("default:");
    w.indent();
    w.line("return \"<invalid message name>\";");
    w.dedent();
    w.line("}");
    w.dedent();
    w.line("}");
    w.blank();

    w.line("MessageName messageNameFromDescription(const char* description)");
    w.line("{");
    w.indent();
    for entry in model.entries() {
        let condition = combined_condition(entry.receiver, entry.message);
        let qualified = entry.qualified_name();
        open_guard(&mut w, condition.as_deref());
        w.line(&format!("if (!strcmp(description, \"{qualified}\"))"));
        w.indent();
        w.line(&format!("return MessageName::{qualified};"));
        w.dedent();
        close_guard(&mut w, condition.as_deref());
    }
    w.line("return MessageName::Invalid;");
    w.dedent();
    w.line("}");
    w.blank();

    w.line("bool isValidMessageName(MessageName name)");
    w.line("{");
    w.indent();
    w.line("return static_cast<uint16_t>(name) < messageNameCount;");
    w.dedent();
    w.line("}");
    w.blank();
    w.raw_line("} // namespace IPC");
    w.into_output()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::tests::model_from_sources;

    fn registry_for(sources: &[&str]) -> (String, String) {
        let model = model_from_sources(sources);
        let artifacts = RegistryGenerator.generate(&model).unwrap();
        (artifacts[0].contents.clone(), artifacts[1].contents.clone())
    }

    #[test]
    fn test_enum_entries_in_ordinal_order() {
        let (header, _) = registry_for(&[
            "messages -> Beta {\n    Log(String text)\n}\n",
            "[WantsConnection]\nmessages -> Alpha {\n    Ping(int32_t value)\n    Add(int32_t a, int32_t b) -> (int32_t sum) [Synchronous]\n}\n",
        ]);
        assert!(header.contains("Alpha_Ping = 0,"));
        assert!(header.contains("Alpha_Add = 1,"));
        assert!(header.contains("Beta_Log = 2,"));
        assert!(header.contains("Invalid = 3,"));
        assert!(header.contains("constexpr uint16_t messageNameCount = 3;"));
    }

    #[test]
    fn test_description_lookup_both_directions() {
        let (_, implementation) = registry_for(&["messages -> Beta {\n    Log(String text)\n}\n"]);
        assert!(implementation.contains("case MessageName::Beta_Log:"));
        assert!(implementation.contains("return \"Beta_Log\";"));
        assert!(implementation.contains("if (!strcmp(description, \"Beta_Log\"))"));
        assert!(implementation.contains("return MessageName::Beta_Log;"));
        assert!(implementation.contains("return MessageName::Invalid;"));
    }

    #[test]
    fn test_enum_not_guarded_but_descriptions_are() {
        let (header, implementation) = registry_for(&[
            "#if PLATFORM(MAC)\nmessages -> Mac {\n    Probe(int32_t x)\n}\n#endif\n",
        ]);
        assert!(!header.contains("#if PLATFORM(MAC)"));
        assert!(implementation.contains("#if PLATFORM(MAC)"));
    }

    #[test]
    fn test_builtin_messages_included() {
        let (header, _) = registry_for(&["[Builtin]\nmessages -> Core {\n    Boot(uint64_t stamp)\n}\n"]);
        assert!(header.contains("Core_Boot = 0,"));
    }
}
