//! Common utilities for the artifact generators
//!
//! Indentation management plus the small naming and guard helpers every
//! backend shares. Guard conditions are opaque text: they are emitted
//! verbatim between `#if`/`#endif` and never inspected.

use crate::model::{Message, Parameter, Receiver};

/// Helper for building indented generated source.
#[derive(Debug, Default)]
pub struct IndentWriter {
    output: String,
    indent_level: usize,
}

impl IndentWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of the output.
    pub fn into_output(self) -> String {
        self.output
    }

    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    pub fn dedent(&mut self) {
        if self.indent_level > 0 {
            self.indent_level -= 1;
        }
    }

    /// Write one line at the current indentation.
    pub fn line(&mut self, s: &str) {
        if !s.is_empty() {
            for _ in 0..self.indent_level {
                self.output.push_str("    ");
            }
            self.output.push_str(s);
        }
        self.output.push('\n');
    }

    /// Write a line ignoring indentation (preprocessor directives).
    pub fn raw_line(&mut self, s: &str) {
        self.output.push_str(s);
        self.output.push('\n');
    }

    pub fn blank(&mut self) {
        self.output.push('\n');
    }
}

/// Open a `#if` guard if a condition is present.
pub fn open_guard(writer: &mut IndentWriter, condition: Option<&str>) {
    if let Some(condition) = condition {
        writer.raw_line(&format!("#if {condition}"));
    }
}

/// Close a guard opened by [`open_guard`].
pub fn close_guard(writer: &mut IndentWriter, condition: Option<&str>) {
    if condition.is_some() {
        writer.raw_line("#endif");
    }
}

/// The guard applying to a message in a global artifact: the receiver's
/// guard and the message's own guard, both preserved verbatim.
pub fn combined_condition(receiver: &Receiver, message: &Message) -> Option<String> {
    match (&receiver.condition, &message.condition) {
        (None, None) => None,
        (Some(receiver_condition), None) => Some(receiver_condition.clone()),
        (None, Some(message_condition)) => Some(message_condition.clone()),
        (Some(receiver_condition), Some(message_condition)) => {
            Some(format!("{receiver_condition} && {message_condition}"))
        }
    }
}

/// `Receiver_Message`, the identifier used by the registry enum and every
/// dispatcher case. A single definition keeps the backends in lockstep.
pub fn qualified_name(receiver: &Receiver, message: &Message) -> String {
    format!("{}_{}", receiver.name, message.name)
}

/// Handler method name: the message name with a lowered first character.
pub fn handler_name(message: &Message) -> String {
    let mut chars = message.name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `type name` pairs joined for a comma-separated list.
pub fn parameter_list(parameters: &[Parameter]) -> String {
    parameters
        .iter()
        .map(|parameter| format!("{} {}", parameter.ty, parameter.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The tuple of parameter types, for `std::tuple<...>` typedefs.
pub fn type_tuple(parameters: &[Parameter]) -> String {
    parameters
        .iter()
        .map(|parameter| parameter.ty.clone())
        .collect::<Vec<_>>()
        .join(", ")
}
