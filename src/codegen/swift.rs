//! Alternate-binding dispatcher backend
//!
//! Receivers opting in with `[SwiftReceiver]` get a second dispatcher in
//! the alternate binding language alongside the C++ one. Dispatch
//! semantics are identical: same case set, same decode order, same
//! reply-path classification, same guard and feature-gate placement.

use crate::codegen::common::{close_guard, handler_name, open_guard, qualified_name};
use crate::codegen::{Artifact, ArtifactGenerator, CodeGenResult, GENERATED_BANNER, IndentWriter};
use crate::model::{DispatchKind, GlobalModel, Message, Receiver};

pub struct SwiftDispatcherGenerator;

impl ArtifactGenerator for SwiftDispatcherGenerator {
    fn name(&self) -> &'static str {
        "swift-dispatcher"
    }

    fn generate(&self, model: &GlobalModel) -> CodeGenResult<Vec<Artifact>> {
        let mut artifacts = Vec::new();
        for linked in model.receivers() {
            let receiver = &linked.receiver;
            if receiver.is_builtin() || !receiver.has_swift_receiver() {
                continue;
            }
            artifacts.push(Artifact::new(
                format!("{}MessageReceiver.swift", receiver.name),
                generate_swift_dispatcher(receiver),
            ));
        }
        Ok(artifacts)
    }
}

fn generate_swift_dispatcher(receiver: &Receiver) -> String {
    let mut w = IndentWriter::new();
    let name = &receiver.name;

    w.raw_line(&format!("// {GENERATED_BANNER}"));
    w.blank();
    w.raw_line("import IPC");
    w.blank();
    open_guard(&mut w, receiver.condition.as_deref());
    w.raw_line(&format!("extension {name} {{"));
    w.indent();
    w.line("func didReceiveMessage(connection: Connection, decoder: Decoder) {");
    w.indent();
    emit_feature_gate(&mut w, receiver.enabled_by());
    w.line("switch decoder.messageName {");
    for message in &receiver.messages {
        emit_case(&mut w, receiver, message);
    }
    w.line("default:");
    w.indent();
    w.line("didReceiveInvalidMessage(connection, decoder.messageName)");
    w.dedent();
    w.line("}");
    w.dedent();
    w.line("}");
    w.dedent();
    w.raw_line("}");
    close_guard(&mut w, receiver.condition.as_deref());
    w.into_output()
}

fn emit_feature_gate(w: &mut IndentWriter, flag: Option<&str>) {
    if let Some(flag) = flag {
        w.line(&format!("guard connection.isFeatureEnabled(\"{flag}\") else {{"));
        w.indent();
        w.line("return");
        w.dedent();
        w.line("}");
    }
}

fn emit_case(w: &mut IndentWriter, receiver: &Receiver, message: &Message) {
    let qualified = qualified_name(receiver, message);
    open_guard(w, message.condition.as_deref());
    w.line(&format!("case .{qualified}:"));
    w.indent();
    emit_feature_gate(w, message.enabled_by());

    for parameter in &message.parameters {
        w.line(&format!(
            "guard let {0} = decoder.decode({1}.self) else {{",
            parameter.name, parameter.ty
        ));
        w.indent();
        w.line(&format!("didReceiveInvalidMessage(connection, .{qualified})"));
        w.line("return");
        w.dedent();
        w.line("}");
    }

    let handler = handler_name(message);
    let mut arguments: Vec<String> = Vec::new();
    if receiver.wants_connection() {
        arguments.push("connection: connection".to_string());
    }
    for parameter in &message.parameters {
        arguments.push(format!("{0}: {0}", parameter.name));
    }
    let arguments = arguments.join(", ");

    match message.dispatch_kind() {
        DispatchKind::OneWay => {
            w.line(&format!("{handler}({arguments})"));
        }
        DispatchKind::SyncReply => {
            w.line(&format!("let reply = {handler}({arguments})"));
            w.line("connection.sendSyncReply(reply, for: decoder)");
        }
        DispatchKind::AsyncReply => {
            let trailing = if arguments.is_empty() {
                String::new()
            } else {
                format!("{arguments}, ")
            };
            w.line(&format!("{handler}({trailing}completion: {{ reply in"));
            w.indent();
            w.line(&format!(
                "connection.sendAsyncReply(reply, name: .{qualified}, replyID: decoder.replyID)"
            ));
            w.dedent();
            w.line("})");
        }
    }
    w.dedent();
    close_guard(w, message.condition.as_deref());
}
