//! Dispatcher backend
//!
//! Emits one `{R}MessageReceiver.cpp` per non-builtin receiver: the routine
//! that takes an incoming decoder, decodes the message's parameters in
//! declaration order, invokes the matching handler, and rejects anything it
//! does not recognize. Reply handling follows the message's dispatch kind:
//!
//! - one-way: decode, invoke, done
//! - synchronous reply: decode, invoke, encode the reply into the sync
//!   reply encoder before returning (the sender is blocked until then)
//! - async reply: decode, invoke with a completion handler that encodes and
//!   sends the reply after the dispatcher has returned

use crate::codegen::common::{
    close_guard, handler_name, open_guard, qualified_name, type_tuple, IndentWriter,
};
use crate::codegen::{
    Artifact, ArtifactGenerator, CodeGenResult, GENERATED_BANNER,
};
use crate::model::{DispatchKind, GlobalModel, Message, Parameter, Receiver};

pub struct DispatcherGenerator;

impl ArtifactGenerator for DispatcherGenerator {
    fn name(&self) -> &'static str {
        "dispatcher"
    }

    fn generate(&self, model: &GlobalModel) -> CodeGenResult<Vec<Artifact>> {
        let mut artifacts = Vec::new();
        for linked in model.receivers() {
            let receiver = &linked.receiver;
            if receiver.is_builtin() {
                continue;
            }
            artifacts.push(Artifact::new(
                format!("{}MessageReceiver.cpp", receiver.name),
                generate_dispatcher(receiver),
            ));
        }
        Ok(artifacts)
    }
}

fn generate_dispatcher(receiver: &Receiver) -> String {
    let mut w = IndentWriter::new();
    let name = &receiver.name;

    w.raw_line(&format!("// {GENERATED_BANNER}"));
    w.blank();
    w.raw_line(&format!("#include \"{name}Messages.h\""));
    w.blank();
    w.raw_line("#include \"ArgumentCoders.h\"");
    w.raw_line("#include \"Connection.h\"");
    w.raw_line("#include \"Decoder.h\"");
    w.blank();
    open_guard(&mut w, receiver.condition.as_deref());

    let namespace = receiver.namespace().unwrap_or("WebKit");
    w.raw_line(&format!("namespace {namespace} {{"));
    w.blank();

    emit_async_entry_point(&mut w, receiver);
    if receiver.has_sync_messages() {
        w.blank();
        emit_sync_entry_point(&mut w, receiver);
    }

    w.blank();
    w.raw_line(&format!("}} // namespace {namespace}"));
    close_guard(&mut w, receiver.condition.as_deref());
    w.into_output()
}

/// The non-blocking entry point: one-way and async-reply messages.
fn emit_async_entry_point(w: &mut IndentWriter, receiver: &Receiver) {
    let name = &receiver.name;
    w.line(&format!(
        "void {name}::didReceive{name}Message(IPC::Connection& connection, IPC::Decoder& decoder)"
    ));
    w.line("{");
    w.indent();
    emit_feature_gate(w, receiver.enabled_by(), "return");
    w.line("switch (decoder.messageName()) {");
    for message in &receiver.messages {
        if message.dispatch_kind() == DispatchKind::SyncReply {
            continue;
        }
        emit_async_case(w, receiver, message);
    }
    w.line("default:");
    w.indent();
    w.line("break;");
    w.dedent();
    w.line("}");
    w.line("didReceiveInvalidMessage(connection, decoder.messageName());");
    w.dedent();
    w.line("}");
}

/// The blocking entry point: synchronous-reply messages only. Returns
/// whether the reply encoder was filled.
fn emit_sync_entry_point(w: &mut IndentWriter, receiver: &Receiver) {
    let name = &receiver.name;
    w.line(&format!(
        "bool {name}::didReceiveSync{name}Message(IPC::Connection& connection, IPC::Decoder& decoder, IPC::Encoder& replyEncoder)"
    ));
    w.line("{");
    w.indent();
    emit_feature_gate(w, receiver.enabled_by(), "return false");
    w.line("switch (decoder.messageName()) {");
    for message in &receiver.messages {
        if message.dispatch_kind() != DispatchKind::SyncReply {
            continue;
        }
        emit_sync_case(w, receiver, message);
    }
    w.line("default:");
    w.indent();
    w.line("break;");
    w.dedent();
    w.line("}");
    w.line("didReceiveInvalidMessage(connection, decoder.messageName());");
    w.line("return false;");
    w.dedent();
    w.line("}");
}

fn emit_feature_gate(w: &mut IndentWriter, flag: Option<&str>, bail: &str) {
    if let Some(flag) = flag {
        w.line(&format!("if (!connection.isFeatureEnabled(\"{flag}\"_s))"));
        w.indent();
        w.line(&format!("{bail};"));
        w.dedent();
    }
}

fn emit_async_case(w: &mut IndentWriter, receiver: &Receiver, message: &Message) {
    let qualified = qualified_name(receiver, message);
    open_guard(w, message.condition.as_deref());
    w.line(&format!("case IPC::MessageName::{qualified}: {{"));
    w.indent();
    emit_feature_gate(w, message.enabled_by(), "return");
    emit_parameter_decodes(w, &qualified, message, "return");

    let handler = handler_name(message);
    let arguments = handler_arguments(receiver, message);
    match message.dispatch_kind() {
        DispatchKind::OneWay => {
            if message.on_background_queue() {
                emit_background_invoke(w, &handler, receiver, message);
            } else {
                w.line(&format!("{handler}({arguments});"));
            }
            w.line("return;");
        }
        DispatchKind::AsyncReply => {
            let reply = message.reply_parameters.as_deref().unwrap_or(&[]);
            if message.on_background_queue() {
                let mut captures = vec![
                    "this".to_string(),
                    "connection = Ref { connection }".to_string(),
                    "replyID = decoder.replyID()".to_string(),
                ];
                for parameter in &message.parameters {
                    captures.push(format!("{0} = WTFMove(*{0})", parameter.name));
                }
                w.line(&format!(
                    "backgroundQueue().dispatch([{}]() mutable {{",
                    captures.join(", ")
                ));
                w.indent();
                emit_async_reply_invoke(
                    w,
                    &handler,
                    &invoke_arguments(receiver, message, false),
                    &qualified,
                    reply,
                    "connection, replyID",
                );
                w.dedent();
                w.line("});");
            } else {
                emit_async_reply_invoke(
                    w,
                    &handler,
                    &arguments,
                    &qualified,
                    reply,
                    "connection = Ref { connection }, replyID = decoder.replyID()",
                );
            }
            w.line("return;");
        }
        DispatchKind::SyncReply => unreachable!("sync messages are emitted separately"),
    }

    w.dedent();
    w.line("}");
    close_guard(w, message.condition.as_deref());
}

fn emit_sync_case(w: &mut IndentWriter, receiver: &Receiver, message: &Message) {
    let qualified = qualified_name(receiver, message);
    open_guard(w, message.condition.as_deref());
    w.line(&format!("case IPC::MessageName::{qualified}: {{"));
    w.indent();
    emit_feature_gate(w, message.enabled_by(), "return false");
    emit_parameter_decodes(w, &qualified, message, "return false");

    let handler = handler_name(message);
    let arguments = handler_arguments(receiver, message);
    let reply = message.reply_parameters.as_deref().unwrap_or(&[]);
    if reply.is_empty() {
        w.line(&format!("{handler}({arguments});"));
    } else {
        let bindings = reply
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        w.line(&format!("auto [{bindings}] = {handler}({arguments});"));
        for parameter in reply {
            w.line(&format!("replyEncoder << {};", parameter.name));
        }
    }
    // The reply is complete before we return: the sender's blocking wait
    // ends when this function hands the encoder back.
    w.line("return true;");
    w.dedent();
    w.line("}");
    close_guard(w, message.condition.as_deref());
}

/// Decode every parameter in declaration order, bailing out through the
/// invalid-message path if any decode fails.
fn emit_parameter_decodes(
    w: &mut IndentWriter,
    qualified: &str,
    message: &Message,
    bail: &str,
) {
    for parameter in &message.parameters {
        w.line(&format!(
            "auto {} = decoder.decode<{}>();",
            parameter.name, parameter.ty
        ));
    }
    if message.parameters.is_empty() {
        return;
    }
    let checks = message
        .parameters
        .iter()
        .map(|p| format!("!{}", p.name))
        .collect::<Vec<_>>()
        .join(" || ");
    w.line(&format!("if ({checks}) {{"));
    w.indent();
    w.line(&format!(
        "didReceiveInvalidMessage(connection, IPC::MessageName::{qualified});"
    ));
    w.line(&format!("{bail};"));
    w.dedent();
    w.line("}");
}

/// The completion handler owns the reply path; the dispatcher returns
/// before the reply is produced. `captures` is the completion handler's
/// capture list, which differs between the inline and background paths.
fn emit_async_reply_invoke(
    w: &mut IndentWriter,
    handler: &str,
    arguments: &str,
    qualified: &str,
    reply: &[Parameter],
    captures: &str,
) {
    let completion_types = type_tuple(reply);
    let completion_args = reply
        .iter()
        .map(|p| format!("{}&& {}", p.ty, p.name))
        .collect::<Vec<_>>()
        .join(", ");
    let trailing = if arguments.is_empty() {
        String::new()
    } else {
        format!("{arguments}, ")
    };
    w.line(&format!(
        "{handler}({trailing}CompletionHandler<void({completion_types})>([{captures}] ({completion_args}) {{"
    ));
    w.indent();
    w.line(&format!(
        "auto replyEncoder = IPC::makeAsyncReplyEncoder(IPC::MessageName::{qualified}, replyID);"
    ));
    for parameter in reply {
        w.line(&format!("*replyEncoder << {};", parameter.name));
    }
    w.line("connection->sendAsyncReply(WTFMove(replyEncoder));");
    w.dedent();
    w.line("}));");
}

fn emit_background_invoke(
    w: &mut IndentWriter,
    handler: &str,
    receiver: &Receiver,
    message: &Message,
) {
    let captures = message
        .parameters
        .iter()
        .map(|p| format!("{0} = WTFMove(*{0})", p.name))
        .collect::<Vec<_>>()
        .join(", ");
    let moves = invoke_arguments(receiver, message, false);
    let capture_list = if captures.is_empty() {
        "this".to_string()
    } else {
        format!("this, {captures}")
    };
    w.line(&format!(
        "backgroundQueue().dispatch([{capture_list}]() mutable {{"
    ));
    w.indent();
    w.line(&format!("{handler}({moves});"));
    w.dedent();
    w.line("});");
}

/// Arguments passed to the handler: the connection first when the receiver
/// opted in, then the decoded parameters in declaration order.
fn handler_arguments(receiver: &Receiver, message: &Message) -> String {
    invoke_arguments(receiver, message, true)
}

fn invoke_arguments(receiver: &Receiver, message: &Message, deref: bool) -> String {
    let mut arguments = Vec::new();
    if receiver.wants_connection() {
        arguments.push("connection".to_string());
    }
    for parameter in &message.parameters {
        if deref {
            arguments.push(format!("WTFMove(*{})", parameter.name));
        } else {
            arguments.push(format!("WTFMove({})", parameter.name));
        }
    }
    arguments.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::tests::model_from_sources;

    fn dispatcher_for(sources: &[&str], file: &str) -> String {
        let model = model_from_sources(sources);
        let artifacts = DispatcherGenerator.generate(&model).unwrap();
        artifacts
            .into_iter()
            .find(|a| a.file_name == file)
            .unwrap_or_else(|| panic!("missing artifact {file}"))
            .contents
    }

    #[test]
    fn test_one_way_dispatch() {
        let code = dispatcher_for(
            &["messages -> Logger {\n    Log(String text)\n}\n"],
            "LoggerMessageReceiver.cpp",
        );
        assert!(code.contains("case IPC::MessageName::Logger_Log:"));
        assert!(code.contains("auto text = decoder.decode<String>();"));
        assert!(code.contains("log(WTFMove(*text));"));
        assert!(code.contains("didReceiveInvalidMessage(connection, decoder.messageName());"));
        assert!(!code.contains("didReceiveSync"));
    }

    #[test]
    fn test_sync_dispatch_encodes_reply_before_returning() {
        let code = dispatcher_for(
            &["[WantsConnection]\nmessages -> Calc {\n    Add(int32_t a, int32_t b) -> (int32_t sum) [Synchronous]\n}\n"],
            "CalcMessageReceiver.cpp",
        );
        assert!(code.contains("bool Calc::didReceiveSyncCalcMessage"));
        assert!(code.contains("auto a = decoder.decode<int32_t>();"));
        assert!(code.contains("auto b = decoder.decode<int32_t>();"));
        assert!(code.contains("auto [sum] = add(connection, WTFMove(*a), WTFMove(*b));"));
        assert!(code.contains("replyEncoder << sum;"));
        assert!(code.contains("return true;"));
    }

    #[test]
    fn test_async_reply_uses_completion_handler() {
        let code = dispatcher_for(
            &["messages -> Fetcher {\n    Fetch(String url) -> (String body)\n}\n"],
            "FetcherMessageReceiver.cpp",
        );
        assert!(code.contains("CompletionHandler<void(String)>"));
        assert!(code.contains("makeAsyncReplyEncoder(IPC::MessageName::Fetcher_Fetch"));
        assert!(code.contains("sendAsyncReply"));
        // The async entry point handles it, not the sync one.
        assert!(!code.contains("didReceiveSyncFetcherMessage"));
    }

    #[test]
    fn test_connection_passed_when_opted_in() {
        let code = dispatcher_for(
            &["[WantsConnection]\nmessages -> Gate {\n    Open(uint64_t id)\n}\n"],
            "GateMessageReceiver.cpp",
        );
        assert!(code.contains("open(connection, WTFMove(*id));"));
    }

    #[test]
    fn test_background_queue_dispatch() {
        let code = dispatcher_for(
            &["messages -> Worker {\n    Tick(uint64_t stamp) [BackgroundQueue]\n}\n"],
            "WorkerMessageReceiver.cpp",
        );
        assert!(code.contains("backgroundQueue().dispatch"));
        assert!(code.contains("stamp = WTFMove(*stamp)"));
    }

    #[test]
    fn test_background_queue_async_reply_dispatched_off_main() {
        let code = dispatcher_for(
            &["messages -> Fetcher {\n    Fetch(String url) -> (String body) [BackgroundQueue]\n}\n"],
            "FetcherMessageReceiver.cpp",
        );
        assert!(code.contains(
            "backgroundQueue().dispatch([this, connection = Ref { connection }, replyID = decoder.replyID(), url = WTFMove(*url)]() mutable {"
        ));
        assert!(code.contains("fetch(WTFMove(url), CompletionHandler<void(String)>([connection, replyID] (String&& body) {"));
        assert!(code.contains("makeAsyncReplyEncoder(IPC::MessageName::Fetcher_Fetch, replyID)"));
        assert!(code.contains("connection->sendAsyncReply(WTFMove(replyEncoder));"));
    }

    #[test]
    fn test_guards_emitted_verbatim() {
        let code = dispatcher_for(
            &["#if PLATFORM(MAC)\nmessages -> Mac {\n#if HAVE(FOO)\n    Probe(int32_t x)\n#endif\n}\n#endif\n"],
            "MacMessageReceiver.cpp",
        );
        assert!(code.contains("#if PLATFORM(MAC)"));
        assert!(code.contains("#if HAVE(FOO)"));
        assert_eq!(code.matches("#endif").count(), 2);
    }

    #[test]
    fn test_feature_gate() {
        let code = dispatcher_for(
            &["messages -> Lab {\n    Try(int32_t x) [EnabledBy=ExperimentalLab]\n}\n"],
            "LabMessageReceiver.cpp",
        );
        assert!(code.contains("isFeatureEnabled(\"ExperimentalLab\"_s)"));
    }

    #[test]
    fn test_namespace_attribute() {
        let code = dispatcher_for(
            &["[Namespace=Testing]\nmessages -> Probe {\n    Hit(int32_t x)\n}\n"],
            "ProbeMessageReceiver.cpp",
        );
        assert!(code.contains("namespace Testing {"));
    }
}
