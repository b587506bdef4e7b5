//! Syntax tree for one parsed `.messages.in` unit.
//!
//! The AST is deliberately untyped: attributes are raw key/value strings and
//! platform guard conditions are verbatim text. The semantic stage owns the
//! closed attribute vocabulary and rejects anything it does not recognize;
//! the parser only guarantees the shape is well formed.

/// One `[Key]` or `[Key=Value]` entry from an attribute list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute {
    pub key: String,
    pub value: Option<String>,
}

impl RawAttribute {
    pub fn new(key: impl Into<String>, value: Option<String>) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// A parsed parameter: `[attrs] Type name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterAst {
    pub ty: String,
    pub name: String,
    pub attributes: Vec<RawAttribute>,
}

/// A parsed message entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAst {
    pub name: String,
    pub parameters: Vec<ParameterAst>,
    /// `Some` when the entry carried a `-> (...)` reply list. An empty vec
    /// means the reply list was present but empty (`-> ()`), which is
    /// distinct from no reply at all.
    pub reply_parameters: Option<Vec<ParameterAst>>,
    /// Opaque platform guard text active at this entry, nested guards
    /// joined with `&&`. Never evaluated.
    pub condition: Option<String>,
    pub attributes: Vec<RawAttribute>,
    /// 1-based line the entry started on, for diagnostics.
    pub line: usize,
}

/// A parsed receiver declaration: the single top-level construct of a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverAst {
    pub name: String,
    pub superclass: Option<String>,
    /// Guard wrapped around the whole receiver block, if any.
    pub condition: Option<String>,
    pub attributes: Vec<RawAttribute>,
    pub messages: Vec<MessageAst>,
    pub line: usize,
}
