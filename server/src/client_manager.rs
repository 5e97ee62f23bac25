//! Connection bookkeeping for the combat server
//!
//! This module tracks who is talking to the server over UDP:
//! - Connection lifecycle (connect, heartbeat, disconnect, timeout)
//! - Capacity enforcement
//! - The address each connection answers on, for event fan-out
//! - Which character a connection joined as
//!
//! A connection id is handed out on `Connect` and stays stable until the
//! connection is dropped. Gameplay never sees addresses; it only sees ids.

use crate::events::ConnectionId;
use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected client
#[derive(Debug)]
pub struct Client {
    /// Unique connection identifier assigned by the server
    pub id: ConnectionId,
    /// Network address for sending events
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// Character bound by a successful join
    pub character_id: Option<u32>,
}

impl Client {
    pub fn new(id: ConnectionId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            character_id: None,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Returns true if nothing arrived from this client within `timeout`.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients
///
/// Enforces the capacity limit and hands out connection ids. Ids start at 1
/// and are never reused while the server runs.
pub struct ClientManager {
    clients: HashMap<ConnectionId, Client>,
    next_client_id: ConnectionId,
    max_clients: usize,
    timeout: Duration,
}

impl ClientManager {
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            timeout,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns `None` when the server is full.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<ConnectionId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));
        Some(client_id)
    }

    /// Removes a client and returns it, if it was still connected.
    pub fn remove_client(&mut self, client_id: ConnectionId) -> Option<Client> {
        let removed = self.clients.remove(&client_id);
        match &removed {
            Some(Client {
                id,
                character_id: Some(character_id),
                ..
            }) => info!("Client {} disconnected as character {}", id, character_id),
            Some(client) => info!("Client {} disconnected", client.id),
            None => {}
        }
        removed
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<ConnectionId> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Records activity from a client. Returns false for unknown ids.
    pub fn touch(&mut self, client_id: ConnectionId) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.touch();
                true
            }
            None => false,
        }
    }

    pub fn bind_character(&mut self, client_id: ConnectionId, character_id: u32) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.character_id = Some(character_id);
                true
            }
            None => false,
        }
    }

    pub fn character_of(&self, client_id: ConnectionId) -> Option<u32> {
        self.clients.get(&client_id).and_then(|client| client.character_id)
    }

    pub fn addr_of(&self, client_id: ConnectionId) -> Option<SocketAddr> {
        self.clients.get(&client_id).map(|client| client.addr)
    }

    /// Removes every client that has been silent for longer than the
    /// configured timeout and returns their ids.
    pub fn check_timeouts(&mut self) -> Vec<ConnectionId> {
        let timeout = self.timeout;
        let timed_out: Vec<ConnectionId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(*client_id);
        }

        timed_out
    }

    /// All connection ids with their addresses, for broadcasting.
    pub fn get_client_addrs(&self) -> Vec<(ConnectionId, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
