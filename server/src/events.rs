//! Outbound event collection.
//!
//! The simulation never touches a socket. Every handler and tick writes the
//! events it produces into an [`Outbox`] together with who should receive
//! them; the network layer performs the actual fan-out afterwards.

use shared::ServerEvent;

/// Connection id assigned by the client manager.
pub type ConnectionId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Connection(ConnectionId),
    Broadcast { exclude: Option<ConnectionId> },
}

impl Recipient {
    pub fn includes(&self, connection: ConnectionId) -> bool {
        match self {
            Recipient::Connection(id) => *id == connection,
            Recipient::Broadcast { exclude } => *exclude != Some(connection),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub recipient: Recipient,
    pub event: ServerEvent,
}

#[derive(Debug, Default)]
pub struct Outbox {
    messages: Vec<Outbound>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unicast(&mut self, connection: ConnectionId, event: ServerEvent) {
        self.messages.push(Outbound {
            recipient: Recipient::Connection(connection),
            event,
        });
    }

    pub fn broadcast(&mut self, event: ServerEvent) {
        self.messages.push(Outbound {
            recipient: Recipient::Broadcast { exclude: None },
            event,
        });
    }

    pub fn broadcast_except(&mut self, connection: ConnectionId, event: ServerEvent) {
        self.messages.push(Outbound {
            recipient: Recipient::Broadcast {
                exclude: Some(connection),
            },
            event,
        });
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Outbound> {
        self.messages.iter()
    }

    pub fn into_messages(self) -> Vec<Outbound> {
        self.messages
    }

    /// Events the given connection would observe, in emission order.
    pub fn delivered_to(&self, connection: ConnectionId) -> Vec<&ServerEvent> {
        self.messages
            .iter()
            .filter(|message| message.recipient.includes(connection))
            .map(|message| &message.event)
            .collect()
    }
}
