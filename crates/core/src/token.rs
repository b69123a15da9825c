// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tokens and the handles that reference held ones
//!
//! A token is one message in the resource queue and stands for one permit.
//! Tokens carry no identity; a consumed token is known only by the delivery
//! tag the broker assigned to it within the consuming session.

use crate::id::SessionId;

/// Payload of every published token
pub const TOKEN_PAYLOAD: &[u8] = b"1";

/// Broker-assigned tag of one delivery, unique within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeliveryTag(pub u64);

impl std::fmt::Display for DeliveryTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A consumed, not yet acknowledged token
///
/// Holding a handle means holding one permit. It is only meaningful to the
/// session that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handle {
    session: SessionId,
    tag: DeliveryTag,
}

impl Handle {
    pub fn new(session: SessionId, tag: DeliveryTag) -> Self {
        Self { session, tag }
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn tag(&self) -> DeliveryTag {
        self.tag
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.session, self.tag)
    }
}
