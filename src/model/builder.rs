//! Per-receiver semantic validation
//!
//! Converts one parsed receiver into a validated [`Receiver`], enforcing
//! the attribute compatibility table and the opaque-type usage policy. All
//! violations for one receiver are collected and reported together; any one
//! of them is fatal to the invocation.

use crate::model::{
    AttributeScope, Message, MessageAttribute, Parameter, ParameterAttribute, Receiver,
    ReceiverAttribute,
};
use crate::parser::{MessageAst, ParameterAst, RawAttribute, ReceiverAst};
use crate::policy::Policy;
use std::collections::BTreeSet;
use thiserror::Error;

/// A constraint violation found while building the semantic model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown {scope} attribute '{key}' in {context}")]
    UnknownAttribute {
        scope: AttributeScope,
        key: String,
        context: String,
    },

    #[error("attribute '{key}' in {context} requires a value ('{key}=...')")]
    MissingAttributeValue { key: String, context: String },

    #[error("attribute '{key}' in {context} does not take a value")]
    UnexpectedAttributeValue { key: String, context: String },

    #[error(
        "receiver '{receiver}' is marked Builtin (no dispatcher is generated) but \
         message '{message}' carries the dispatch attribute '{attribute}'"
    )]
    BuiltinDispatchConflict {
        receiver: String,
        message: String,
        attribute: String,
    },

    #[error(
        "message '{message}' in receiver '{receiver}' is Synchronous but the receiver \
         does not declare WantsConnection, which the synchronous reply path requires"
    )]
    SynchronousRequiresConnection { receiver: String, message: String },

    #[error(
        "message '{message}' in receiver '{receiver}' is Synchronous but declares no \
         reply parameter list"
    )]
    SynchronousWithoutReply { receiver: String, message: String },

    #[error(
        "message '{message}' in receiver '{receiver}' is both Synchronous and \
         BackgroundQueue; a synchronous reply must be encoded before the dispatcher \
         returns, which the queue hop cannot guarantee"
    )]
    SynchronousBackgroundQueue { receiver: String, message: String },

    #[error("duplicate message '{message}' in receiver '{receiver}'")]
    DuplicateMessage { receiver: String, message: String },

    #[error(
        "duplicate parameter '{parameter}' in message '{message}' of receiver '{receiver}'"
    )]
    DuplicateParameter {
        receiver: String,
        message: String,
        parameter: String,
    },

    #[error(
        "parameter '{parameter}' of message '{message}' in receiver '{receiver}' has \
         opaque type '{ty}' but is not marked [Opaque]"
    )]
    MissingOpaqueMarker {
        receiver: String,
        message: String,
        parameter: String,
        ty: String,
    },

    #[error(
        "parameter '{parameter}' of message '{message}' in receiver '{receiver}' is \
         marked [Opaque] but type '{ty}' is not on the opaque allow-list"
    )]
    SuperfluousOpaqueMarker {
        receiver: String,
        message: String,
        parameter: String,
        ty: String,
    },
}

/// Build and validate one receiver. Collects every violation rather than
/// stopping at the first.
pub fn build_receiver(ast: &ReceiverAst, policy: &Policy) -> Result<Receiver, Vec<ModelError>> {
    let mut errors = Vec::new();

    let attributes = convert_receiver_attributes(ast, &mut errors);
    let receiver = Receiver {
        name: ast.name.clone(),
        superclass: ast.superclass.clone(),
        condition: ast.condition.clone(),
        attributes,
        messages: ast
            .messages
            .iter()
            .map(|message| convert_message(&ast.name, message, &mut errors))
            .collect(),
    };

    check_message_names(&receiver, &mut errors);
    check_attribute_constraints(&receiver, &mut errors);
    check_opaque_usage(&receiver, policy, &mut errors);

    if errors.is_empty() {
        Ok(receiver)
    } else {
        Err(errors)
    }
}

fn convert_receiver_attributes(
    ast: &ReceiverAst,
    errors: &mut Vec<ModelError>,
) -> Vec<ReceiverAttribute> {
    let context = format!("receiver '{}'", ast.name);
    let mut attributes = Vec::new();
    for raw in &ast.attributes {
        match raw.key.as_str() {
            "Builtin" => {
                if flag_attribute(raw, &context, errors) {
                    attributes.push(ReceiverAttribute::Builtin);
                }
            }
            "WantsConnection" => {
                if flag_attribute(raw, &context, errors) {
                    attributes.push(ReceiverAttribute::WantsConnection);
                }
            }
            "SwiftReceiver" => {
                if flag_attribute(raw, &context, errors) {
                    attributes.push(ReceiverAttribute::SwiftReceiver);
                }
            }
            "Namespace" => {
                if let Some(value) = valued_attribute(raw, &context, errors) {
                    attributes.push(ReceiverAttribute::Namespace(value));
                }
            }
            "EnabledBy" => {
                if let Some(value) = valued_attribute(raw, &context, errors) {
                    attributes.push(ReceiverAttribute::EnabledBy(value));
                }
            }
            _ => errors.push(ModelError::UnknownAttribute {
                scope: AttributeScope::Receiver,
                key: raw.key.clone(),
                context: context.clone(),
            }),
        }
    }
    attributes
}

fn convert_message(
    receiver_name: &str,
    ast: &MessageAst,
    errors: &mut Vec<ModelError>,
) -> Message {
    let context = format!("message '{}' of receiver '{receiver_name}'", ast.name);
    let mut attributes = Vec::new();
    for raw in &ast.attributes {
        match raw.key.as_str() {
            "Synchronous" => {
                if flag_attribute(raw, &context, errors) {
                    attributes.push(MessageAttribute::Synchronous);
                }
            }
            "BackgroundQueue" => {
                if flag_attribute(raw, &context, errors) {
                    attributes.push(MessageAttribute::BackgroundQueue);
                }
            }
            "LegacyTransport" => {
                if flag_attribute(raw, &context, errors) {
                    attributes.push(MessageAttribute::LegacyTransport);
                }
            }
            "EnabledBy" => {
                if let Some(value) = valued_attribute(raw, &context, errors) {
                    attributes.push(MessageAttribute::EnabledBy(value));
                }
            }
            _ => errors.push(ModelError::UnknownAttribute {
                scope: AttributeScope::Message,
                key: raw.key.clone(),
                context: context.clone(),
            }),
        }
    }

    Message {
        name: ast.name.clone(),
        parameters: convert_parameters(receiver_name, &ast.name, &ast.parameters, errors),
        reply_parameters: ast
            .reply_parameters
            .as_ref()
            .map(|reply| convert_parameters(receiver_name, &ast.name, reply, errors)),
        condition: ast.condition.clone(),
        attributes,
    }
}

fn convert_parameters(
    receiver_name: &str,
    message_name: &str,
    parameters: &[ParameterAst],
    errors: &mut Vec<ModelError>,
) -> Vec<Parameter> {
    let mut seen = BTreeSet::new();
    let mut converted = Vec::new();
    for parameter in parameters {
        if !seen.insert(parameter.name.clone()) {
            errors.push(ModelError::DuplicateParameter {
                receiver: receiver_name.to_string(),
                message: message_name.to_string(),
                parameter: parameter.name.clone(),
            });
        }

        let context = format!(
            "parameter '{}' of message '{message_name}' in receiver '{receiver_name}'",
            parameter.name
        );
        let mut attributes = Vec::new();
        for raw in &parameter.attributes {
            match raw.key.as_str() {
                "Opaque" => {
                    if flag_attribute(raw, &context, errors) {
                        attributes.push(ParameterAttribute::Opaque);
                    }
                }
                _ => errors.push(ModelError::UnknownAttribute {
                    scope: AttributeScope::Parameter,
                    key: raw.key.clone(),
                    context: context.clone(),
                }),
            }
        }

        converted.push(Parameter {
            ty: parameter.ty.clone(),
            name: parameter.name.clone(),
            attributes,
        });
    }
    converted
}

/// An attribute that must not carry a value. Returns whether it is usable.
fn flag_attribute(raw: &RawAttribute, context: &str, errors: &mut Vec<ModelError>) -> bool {
    if raw.value.is_some() {
        errors.push(ModelError::UnexpectedAttributeValue {
            key: raw.key.clone(),
            context: context.to_string(),
        });
        false
    } else {
        true
    }
}

/// An attribute that must carry a value.
fn valued_attribute(
    raw: &RawAttribute,
    context: &str,
    errors: &mut Vec<ModelError>,
) -> Option<String> {
    match &raw.value {
        Some(value) if !value.is_empty() => Some(value.clone()),
        _ => {
            errors.push(ModelError::MissingAttributeValue {
                key: raw.key.clone(),
                context: context.to_string(),
            });
            None
        }
    }
}

fn check_message_names(receiver: &Receiver, errors: &mut Vec<ModelError>) {
    let mut seen = BTreeSet::new();
    for message in &receiver.messages {
        if !seen.insert(message.name.as_str()) {
            errors.push(ModelError::DuplicateMessage {
                receiver: receiver.name.clone(),
                message: message.name.clone(),
            });
        }
    }
}

/// The attribute compatibility table. Every combination present in the
/// input is checked.
fn check_attribute_constraints(receiver: &Receiver, errors: &mut Vec<ModelError>) {
    for message in &receiver.messages {
        if receiver.is_builtin() {
            for attribute in &message.attributes {
                let name = match attribute {
                    MessageAttribute::Synchronous => Some("Synchronous"),
                    MessageAttribute::BackgroundQueue => Some("BackgroundQueue"),
                    MessageAttribute::EnabledBy(_) | MessageAttribute::LegacyTransport => None,
                };
                if let Some(name) = name {
                    errors.push(ModelError::BuiltinDispatchConflict {
                        receiver: receiver.name.clone(),
                        message: message.name.clone(),
                        attribute: name.to_string(),
                    });
                }
            }
        }

        if message.is_synchronous() {
            if message.reply_parameters.is_none() {
                errors.push(ModelError::SynchronousWithoutReply {
                    receiver: receiver.name.clone(),
                    message: message.name.clone(),
                });
            }
            if !receiver.wants_connection() {
                errors.push(ModelError::SynchronousRequiresConnection {
                    receiver: receiver.name.clone(),
                    message: message.name.clone(),
                });
            }
            if message.on_background_queue() {
                errors.push(ModelError::SynchronousBackgroundQueue {
                    receiver: receiver.name.clone(),
                    message: message.name.clone(),
                });
            }
        }
    }
}

/// Two-directional opaque policy: an allow-listed type must carry the
/// marker, and the marker is only valid on allow-listed types.
fn check_opaque_usage(receiver: &Receiver, policy: &Policy, errors: &mut Vec<ModelError>) {
    for message in &receiver.messages {
        let reply = message.reply_parameters.as_deref().unwrap_or(&[]);
        for parameter in message.parameters.iter().chain(reply) {
            let type_is_opaque = policy.is_opaque(&parameter.ty);
            if type_is_opaque && !parameter.is_opaque() {
                errors.push(ModelError::MissingOpaqueMarker {
                    receiver: receiver.name.clone(),
                    message: message.name.clone(),
                    parameter: parameter.name.clone(),
                    ty: parameter.ty.clone(),
                });
            }
            if !type_is_opaque && parameter.is_opaque() {
                errors.push(ModelError::SuperfluousOpaqueMarker {
                    receiver: receiver.name.clone(),
                    message: message.name.clone(),
                    parameter: parameter.name.clone(),
                    ty: parameter.ty.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn build(source: &str) -> Result<Receiver, Vec<ModelError>> {
        let ast = parse(source).expect("fixture should parse");
        build_receiver(&ast, Policy::builtin())
    }

    #[test]
    fn test_valid_receiver() {
        let receiver = build(
            "[WantsConnection]\nmessages -> Calc {\n    Add(int32_t a, int32_t b) -> (int32_t sum) [Synchronous]\n    Ping(int32_t value)\n}\n",
        )
        .unwrap();
        assert!(receiver.wants_connection());
        assert_eq!(receiver.messages.len(), 2);
    }

    #[test]
    fn test_unknown_receiver_attribute() {
        let errors = build("[WantsConection]\nmessages -> Calc {\n}\n").unwrap_err();
        assert!(matches!(
            &errors[0],
            ModelError::UnknownAttribute { scope: AttributeScope::Receiver, key, .. } if key == "WantsConection"
        ));
    }

    #[test]
    fn test_unknown_message_attribute() {
        let errors = build("messages -> Calc {\n    Ping(int x) [Synchronus]\n}\n").unwrap_err();
        assert!(matches!(
            &errors[0],
            ModelError::UnknownAttribute { scope: AttributeScope::Message, key, .. } if key == "Synchronus"
        ));
    }

    #[test]
    fn test_unknown_parameter_attribute() {
        let errors = build("messages -> Calc {\n    Ping([Opaqe] int x)\n}\n").unwrap_err();
        assert!(matches!(
            &errors[0],
            ModelError::UnknownAttribute { scope: AttributeScope::Parameter, .. }
        ));
    }

    #[test]
    fn test_synchronous_requires_connection() {
        let errors =
            build("messages -> Calc {\n    Add(int a) -> (int sum) [Synchronous]\n}\n").unwrap_err();
        assert!(matches!(
            &errors[0],
            ModelError::SynchronousRequiresConnection { receiver, message }
                if receiver == "Calc" && message == "Add"
        ));
    }

    #[test]
    fn test_synchronous_without_reply() {
        let errors =
            build("[WantsConnection]\nmessages -> Calc {\n    Nudge(int a) [Synchronous]\n}\n")
                .unwrap_err();
        assert!(matches!(&errors[0], ModelError::SynchronousWithoutReply { .. }));
    }

    #[test]
    fn test_synchronous_background_queue_rejected() {
        let errors = build(
            "[WantsConnection]\nmessages -> Calc {\n    Add(int32_t a, int32_t b) -> (int32_t sum) [Synchronous, BackgroundQueue]\n}\n",
        )
        .unwrap_err();
        assert!(matches!(
            &errors[0],
            ModelError::SynchronousBackgroundQueue { receiver, message }
                if receiver == "Calc" && message == "Add"
        ));
    }

    #[test]
    fn test_builtin_rejects_dispatch_attributes() {
        let errors = build(
            "[Builtin, WantsConnection]\nmessages -> Core {\n    Poke(int a) -> (int b) [Synchronous]\n}\n",
        )
        .unwrap_err();
        assert!(errors.iter().any(|error| matches!(
            error,
            ModelError::BuiltinDispatchConflict { attribute, .. } if attribute == "Synchronous"
        )));
    }

    #[test]
    fn test_duplicate_message_name() {
        let errors =
            build("messages -> Calc {\n    Ping(int a)\n    Ping(int b)\n}\n").unwrap_err();
        assert!(matches!(&errors[0], ModelError::DuplicateMessage { message, .. } if message == "Ping"));
    }

    #[test]
    fn test_duplicate_parameter_name() {
        let errors = build("messages -> Calc {\n    Ping(int a, long a)\n}\n").unwrap_err();
        assert!(matches!(
            &errors[0],
            ModelError::DuplicateParameter { parameter, .. } if parameter == "a"
        ));
    }

    #[test]
    fn test_opaque_type_requires_marker() {
        let errors =
            build("messages -> Port {\n    Send(MachSendRight right)\n}\n").unwrap_err();
        assert!(matches!(
            &errors[0],
            ModelError::MissingOpaqueMarker { ty, parameter, .. }
                if ty == "MachSendRight" && parameter == "right"
        ));
    }

    #[test]
    fn test_marker_requires_opaque_type() {
        let errors = build("messages -> Port {\n    Send([Opaque] String right)\n}\n").unwrap_err();
        assert!(matches!(
            &errors[0],
            ModelError::SuperfluousOpaqueMarker { ty, .. } if ty == "String"
        ));
    }

    #[test]
    fn test_correct_opaque_pairing() {
        let receiver =
            build("messages -> Port {\n    Send([Opaque] MachSendRight right)\n}\n").unwrap();
        assert!(receiver.messages[0].parameters[0].is_opaque());
    }

    #[test]
    fn test_opaque_checked_in_reply_list() {
        let errors = build(
            "[WantsConnection]\nmessages -> Port {\n    Take(int which) -> (MachSendRight right) [Synchronous]\n}\n",
        )
        .unwrap_err();
        assert!(matches!(&errors[0], ModelError::MissingOpaqueMarker { .. }));
    }

    #[test]
    fn test_flag_attribute_rejects_value() {
        let errors = build("[Builtin=yes]\nmessages -> Core {\n}\n").unwrap_err();
        assert!(matches!(&errors[0], ModelError::UnexpectedAttributeValue { key, .. } if key == "Builtin"));
    }

    #[test]
    fn test_valued_attribute_requires_value() {
        let errors = build("[Namespace]\nmessages -> Core {\n}\n").unwrap_err();
        assert!(matches!(&errors[0], ModelError::MissingAttributeValue { key, .. } if key == "Namespace"));
    }

    #[test]
    fn test_errors_are_collected_not_first_only() {
        let errors = build(
            "messages -> Calc {\n    Add(int a) -> (int sum) [Synchronous]\n    Send(MachSendRight right)\n}\n",
        )
        .unwrap_err();
        assert!(errors.len() >= 2);
    }
}
