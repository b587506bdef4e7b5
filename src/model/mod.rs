//! Semantic model for message-contract receivers
//!
//! The model stage turns a parsed [`ReceiverAst`](crate::parser::ReceiverAst)
//! into a validated [`Receiver`] with a closed, exhaustively matched
//! attribute vocabulary, then links the full set of receivers compiled in
//! one invocation into an immutable [`GlobalModel`] with deterministic
//! per-message ordinals. Generators consume only the global model.

pub mod builder;
pub mod link;

pub use builder::{build_receiver, ModelError};
pub use link::{link, GlobalEntry, GlobalModel, LinkError, LinkedReceiver};

/// Scope an attribute appeared in, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeScope {
    Receiver,
    Message,
    Parameter,
}

impl std::fmt::Display for AttributeScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeScope::Receiver => write!(f, "receiver"),
            AttributeScope::Message => write!(f, "message"),
            AttributeScope::Parameter => write!(f, "parameter"),
        }
    }
}

/// Receiver-level flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverAttribute {
    /// The receiver is provided by the runtime itself: no dispatcher or
    /// declaration artifacts are generated, but its messages still occupy
    /// registry and reflection entries.
    Builtin,
    /// Handlers receive the connection object; required for synchronous
    /// dispatch because the reply path needs it.
    WantsConnection,
    /// Also emit the alternate-binding (Swift) dispatcher.
    SwiftReceiver,
    /// C++ namespace wrapped around the generated declarations.
    Namespace(String),
    /// The whole receiver is gated behind a runtime feature flag.
    EnabledBy(String),
}

/// Message-level flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageAttribute {
    /// The sender blocks until the reply is produced.
    Synchronous,
    /// Dispatched on the receiver's background queue instead of the main
    /// thread.
    BackgroundQueue,
    /// The message is gated behind a runtime feature flag.
    EnabledBy(String),
    /// Encoded through the legacy transport rather than the default one.
    LegacyTransport,
}

/// Parameter-level flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterAttribute {
    /// The type requires a hand-written encode/decode pair and must be on
    /// the opaque allow-list.
    Opaque,
}

/// How a message is delivered and replied to. Derived, never stored: every
/// consumer classifies through this one function so dispatch semantics can
/// never drift between generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchKind {
    /// No reply; fire-and-forget.
    OneWay,
    /// Reply produced before the dispatcher returns; the sender blocks.
    SyncReply,
    /// Reply delivered out of band after the dispatcher returns.
    AsyncReply,
}

/// One value carried by a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub ty: String,
    pub name: String,
    pub attributes: Vec<ParameterAttribute>,
}

impl Parameter {
    pub fn is_opaque(&self) -> bool {
        self.attributes.contains(&ParameterAttribute::Opaque)
    }
}

/// One operation a receiver accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub reply_parameters: Option<Vec<Parameter>>,
    pub condition: Option<String>,
    pub attributes: Vec<MessageAttribute>,
}

impl Message {
    pub fn is_synchronous(&self) -> bool {
        self.attributes.contains(&MessageAttribute::Synchronous)
    }

    pub fn on_background_queue(&self) -> bool {
        self.attributes.contains(&MessageAttribute::BackgroundQueue)
    }

    pub fn enabled_by(&self) -> Option<&str> {
        self.attributes.iter().find_map(|attribute| match attribute {
            MessageAttribute::EnabledBy(flag) => Some(flag.as_str()),
            _ => None,
        })
    }

    /// Classify the dispatch path for this message.
    pub fn dispatch_kind(&self) -> DispatchKind {
        match (&self.reply_parameters, self.is_synchronous()) {
            (None, _) => DispatchKind::OneWay,
            (Some(_), true) => DispatchKind::SyncReply,
            (Some(_), false) => DispatchKind::AsyncReply,
        }
    }
}

/// A named endpoint accepting a fixed set of messages, validated but not
/// yet globally ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receiver {
    pub name: String,
    pub superclass: Option<String>,
    pub condition: Option<String>,
    pub attributes: Vec<ReceiverAttribute>,
    pub messages: Vec<Message>,
}

impl Receiver {
    pub fn is_builtin(&self) -> bool {
        self.attributes.contains(&ReceiverAttribute::Builtin)
    }

    pub fn wants_connection(&self) -> bool {
        self.attributes.contains(&ReceiverAttribute::WantsConnection)
    }

    pub fn has_swift_receiver(&self) -> bool {
        self.attributes.contains(&ReceiverAttribute::SwiftReceiver)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.attributes.iter().find_map(|attribute| match attribute {
            ReceiverAttribute::Namespace(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn enabled_by(&self) -> Option<&str> {
        self.attributes.iter().find_map(|attribute| match attribute {
            ReceiverAttribute::EnabledBy(flag) => Some(flag.as_str()),
            _ => None,
        })
    }

    /// Whether any synchronous-reply message is declared.
    pub fn has_sync_messages(&self) -> bool {
        self.messages
            .iter()
            .any(|message| message.dispatch_kind() == DispatchKind::SyncReply)
    }
}
