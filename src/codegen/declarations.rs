//! Declarations backend
//!
//! Emits one `{R}Messages.h` per non-builtin receiver: the per-message
//! argument structs that both the generated dispatcher and hand-written
//! sender code depend on. Parameter ordering here is the reference
//! ordering; the reflection table must stay in lockstep with it.

use crate::codegen::common::{
    close_guard, open_guard, parameter_list, qualified_name, type_tuple, IndentWriter,
};
use crate::codegen::{Artifact, ArtifactGenerator, CodeGenResult, GENERATED_BANNER};
use crate::model::{DispatchKind, GlobalModel, Message, Receiver};

pub struct DeclarationsGenerator;

impl ArtifactGenerator for DeclarationsGenerator {
    fn name(&self) -> &'static str {
        "declarations"
    }

    fn generate(&self, model: &GlobalModel) -> CodeGenResult<Vec<Artifact>> {
        let mut artifacts = Vec::new();
        for linked in model.receivers() {
            let receiver = &linked.receiver;
            if receiver.is_builtin() {
                continue;
            }
            artifacts.push(Artifact::new(
                format!("{}Messages.h", receiver.name),
                generate_header(receiver),
            ));
        }
        Ok(artifacts)
    }
}

fn generate_header(receiver: &Receiver) -> String {
    let mut w = IndentWriter::new();
    let name = &receiver.name;

    w.raw_line(&format!("// {GENERATED_BANNER}"));
    w.blank();
    w.raw_line("#pragma once");
    w.blank();
    w.raw_line("#include \"ArgumentCoders.h\"");
    w.raw_line("#include \"MessageNames.h\"");
    w.raw_line("#include <tuple>");
    w.blank();
    open_guard(&mut w, receiver.condition.as_deref());
    w.raw_line("namespace Messages {");
    w.raw_line(&format!("namespace {name} {{"));
    w.blank();

    for message in &receiver.messages {
        emit_message_struct(&mut w, receiver, message);
        w.blank();
    }

    w.raw_line(&format!("}} // namespace {name}"));
    w.raw_line("} // namespace Messages");
    close_guard(&mut w, receiver.condition.as_deref());
    w.into_output()
}

fn emit_message_struct(w: &mut IndentWriter, receiver: &Receiver, message: &Message) {
    let qualified = qualified_name(receiver, message);
    open_guard(w, message.condition.as_deref());
    w.line(&format!("class {} {{", message.name));
    w.line("public:");
    w.indent();
    w.line(&format!(
        "using Arguments = std::tuple<{}>;",
        type_tuple(&message.parameters)
    ));
    if let Some(reply) = &message.reply_parameters {
        w.line(&format!(
            "using ReplyArguments = std::tuple<{}>;",
            type_tuple(reply)
        ));
    }
    w.blank();
    w.line(&format!(
        "static constexpr IPC::MessageName name = IPC::MessageName::{qualified};"
    ));
    w.line(&format!(
        "static constexpr bool isSync = {};",
        message.dispatch_kind() == DispatchKind::SyncReply
    ));
    w.blank();

    if message.parameters.is_empty() {
        w.line(&format!("{}() = default;", message.name));
    } else {
        let initializers = message
            .parameters
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        w.line(&format!(
            "explicit {}({})",
            message.name,
            parameter_list(&message.parameters)
        ));
        w.indent();
        w.line(&format!(": m_arguments({initializers})"));
        w.dedent();
        w.line("{");
        w.line("}");
    }
    w.blank();
    w.line("const Arguments& arguments() const { return m_arguments; }");
    w.dedent();
    w.blank();
    w.line("private:");
    w.indent();
    w.line("Arguments m_arguments;");
    w.dedent();
    w.line("};");
    close_guard(w, message.condition.as_deref());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::tests::model_from_sources;

    fn header_for(sources: &[&str], file: &str) -> String {
        let model = model_from_sources(sources);
        DeclarationsGenerator
            .generate(&model)
            .unwrap()
            .into_iter()
            .find(|a| a.file_name == file)
            .unwrap_or_else(|| panic!("missing artifact {file}"))
            .contents
    }

    #[test]
    fn test_message_struct() {
        let code = header_for(
            &["messages -> Logger {\n    Log(String text)\n}\n"],
            "LoggerMessages.h",
        );
        assert!(code.contains("namespace Messages {"));
        assert!(code.contains("namespace Logger {"));
        assert!(code.contains("class Log {"));
        assert!(code.contains("using Arguments = std::tuple<String>;"));
        assert!(code.contains("IPC::MessageName::Logger_Log"));
        assert!(code.contains("static constexpr bool isSync = false;"));
        assert!(code.contains("explicit Log(String text)"));
    }

    #[test]
    fn test_sync_reply_struct() {
        let code = header_for(
            &["[WantsConnection]\nmessages -> Calc {\n    Add(int32_t a, int32_t b) -> (int32_t sum) [Synchronous]\n}\n"],
            "CalcMessages.h",
        );
        assert!(code.contains("using Arguments = std::tuple<int32_t, int32_t>;"));
        assert!(code.contains("using ReplyArguments = std::tuple<int32_t>;"));
        assert!(code.contains("static constexpr bool isSync = true;"));
    }

    #[test]
    fn test_async_reply_is_not_sync() {
        let code = header_for(
            &["messages -> Fetcher {\n    Fetch(String url) -> (String body)\n}\n"],
            "FetcherMessages.h",
        );
        assert!(code.contains("ReplyArguments"));
        assert!(code.contains("static constexpr bool isSync = false;"));
    }

    #[test]
    fn test_empty_parameter_list_default_constructor() {
        let code = header_for(
            &["messages -> Beacon {\n    Flush()\n}\n"],
            "BeaconMessages.h",
        );
        assert!(code.contains("Flush() = default;"));
        assert!(code.contains("using Arguments = std::tuple<>;"));
    }

    #[test]
    fn test_guard_wraps_message() {
        let code = header_for(
            &["messages -> Mac {\n#if HAVE(FOO)\n    Probe(int32_t x)\n#endif\n}\n"],
            "MacMessages.h",
        );
        assert!(code.contains("#if HAVE(FOO)"));
        assert!(code.contains("#endif"));
    }
}
