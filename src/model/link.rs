//! Global model linker
//!
//! Cross-validates the complete set of per-receiver models compiled in one
//! invocation and assigns every message a stable global ordinal. Ordinals
//! are a wire-level identifier, so assignment must be a pure function of
//! the input contracts: receivers are canonically sorted by name (byte-wise,
//! case-sensitive) and messages keep their declaration order, which makes
//! the ordinal space independent of command-line argument order.

use crate::model::{Message, Receiver};
use thiserror::Error;

/// A cross-receiver contract violation.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("receiver '{name}' is declared more than once in the compiled set")]
    DuplicateReceiver { name: String },

    #[error("message '{receiver}.{message}' collides with an identically named message")]
    DuplicateGlobalMessage { receiver: String, message: String },
}

/// A receiver with its position in the global ordinal space.
#[derive(Debug, Clone)]
pub struct LinkedReceiver {
    pub receiver: Receiver,
    /// Ordinal of the receiver's first message.
    pub ordinal_base: u32,
}

/// One `(receiver, message, ordinal)` registry entry.
#[derive(Debug, Clone, Copy)]
pub struct GlobalEntry<'a> {
    pub receiver: &'a Receiver,
    pub message: &'a Message,
    pub ordinal: u32,
}

impl GlobalEntry<'_> {
    /// The registry identifier, `Receiver_Message`.
    pub fn qualified_name(&self) -> String {
        format!("{}_{}", self.receiver.name, self.message.name)
    }
}

/// The linked whole-invocation model. Immutable once built; generators only
/// read it.
#[derive(Debug)]
pub struct GlobalModel {
    receivers: Vec<LinkedReceiver>,
    message_count: u32,
}

impl GlobalModel {
    /// Receivers in canonical (name-sorted) order.
    pub fn receivers(&self) -> &[LinkedReceiver] {
        &self.receivers
    }

    /// Every message across every receiver with its assigned ordinal, in
    /// ordinal order with no gaps.
    pub fn entries(&self) -> impl Iterator<Item = GlobalEntry<'_>> {
        self.receivers.iter().flat_map(|linked| {
            linked
                .receiver
                .messages
                .iter()
                .enumerate()
                .map(move |(index, message)| GlobalEntry {
                    receiver: &linked.receiver,
                    message,
                    ordinal: linked.ordinal_base + index as u32,
                })
        })
    }

    pub fn message_count(&self) -> u32 {
        self.message_count
    }
}

/// Link the complete set of validated receivers into a [`GlobalModel`].
pub fn link(mut receivers: Vec<Receiver>) -> Result<GlobalModel, Vec<LinkError>> {
    // Canonical ordering: sorting here, not relying on argument order, is
    // what keeps ordinals stable when the build system reorders inputs.
    receivers.sort_by(|a, b| a.name.cmp(&b.name));

    let mut errors = Vec::new();
    for window in receivers.windows(2) {
        if window[0].name == window[1].name {
            errors.push(LinkError::DuplicateReceiver {
                name: window[0].name.clone(),
            });
        }
    }

    // Receiver names are unique past this point and message names are
    // unique per receiver, so qualified names cannot collide unless the
    // separator is abused ('A_B.C' vs 'A.B_C'); guard it anyway since the
    // registry identifier joins with '_'.
    let mut qualified = std::collections::BTreeSet::new();
    for receiver in &receivers {
        for message in &receiver.messages {
            let name = format!("{}_{}", receiver.name, message.name);
            if !qualified.insert(name) {
                errors.push(LinkError::DuplicateGlobalMessage {
                    receiver: receiver.name.clone(),
                    message: message.name.clone(),
                });
            }
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let mut next_ordinal = 0u32;
    let receivers = receivers
        .into_iter()
        .map(|receiver| {
            let ordinal_base = next_ordinal;
            next_ordinal += receiver.messages.len() as u32;
            LinkedReceiver {
                receiver,
                ordinal_base,
            }
        })
        .collect();

    Ok(GlobalModel {
        receivers,
        message_count: next_ordinal,
    })
}
