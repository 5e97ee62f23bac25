//! Server network layer handling UDP communications and tick coordination

use crate::cache::PositionCache;
use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::events::{ConnectionId, Outbox, Recipient};
use crate::persistence::{spawn_persistence_writer, PersistHandle, PersistenceStore};
use crate::spawns::{default_spawn_points, default_templates};
use crate::world::World;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{ClientIntent, Packet, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: ConnectionId,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from the main loop to the sender task
#[derive(Debug)]
pub enum GameMessage {
    /// Reply to an address that may not have a connection id yet.
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    SendToClient {
        packet: Packet,
        client_id: ConnectionId,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<ConnectionId>,
    },
}

impl GameMessage {
    /// Wraps one simulation event for the sender task.
    pub fn from_outbound(recipient: Recipient, packet: Packet) -> Self {
        match recipient {
            Recipient::Connection(client_id) => GameMessage::SendToClient { packet, client_id },
            Recipient::Broadcast { exclude } => GameMessage::BroadcastPacket { packet, exclude },
        }
    }
}

/// Main server coordinating networking and the simulation core
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    world: World,
    combat_tick: Duration,
    ai_tick: Duration,
    started: Instant,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        config: &ServerConfig,
        cache: Arc<dyn PositionCache>,
        store: Arc<dyn PersistenceStore>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let addr = config.address();
        let socket = Arc::new(UdpSocket::bind(&addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        let (persist, persist_rx) = PersistHandle::new();
        spawn_persistence_writer(Arc::clone(&store), persist_rx);

        let simulation = config.simulation();
        let (combat_tick, ai_tick) = (simulation.combat_tick, simulation.ai_tick);
        let mut world = World::new(simulation, cache, store, persist);
        world.populate(default_templates(), &default_spawn_points(), 0);

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(
                config.max_clients,
                Duration::from_secs(config.client_timeout_secs),
            ))),
            world,
            combat_tick,
            ai_tick,
            started: Instant::now(),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Milliseconds since the server started; the simulation clock.
    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis().min(u64::MAX as u128) as u64
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            let message = ServerMessage::PacketReceived { packet, addr };
                            if let Err(e) = server_tx.send(message) {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::SendToClient { packet, client_id } => {
                        let addr = clients.read().await.addr_of(client_id);
                        match addr {
                            Some(addr) => {
                                let sent = Self::send_packet_impl(&socket, &packet, addr).await;
                                if let Err(e) = sent {
                                    error!("Failed to send to client {}: {}", client_id, e);
                                }
                            }
                            None => debug!("Client {} gone, dropping event", client_id),
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if Some(client_id) == exclude {
                                continue;
                            }

                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    async fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn queue(&self, message: GameMessage) {
        if let Err(e) = self.game_tx.send(message) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Hands every event of an outbox to the sender task, in order.
    fn dispatch(&self, outbox: Outbox) {
        for outbound in outbox.into_messages() {
            let packet = Packet::Event(outbound.event);
            self.queue(GameMessage::from_outbound(outbound.recipient, packet));
        }
    }

    /// Processes incoming packets
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => {
                info!("Client connecting from {} (version: {})", addr, client_version);

                if client_version != PROTOCOL_VERSION {
                    self.queue(GameMessage::SendPacket {
                        packet: Packet::Disconnected {
                            reason: "Protocol version mismatch".to_string(),
                        },
                        addr,
                    });
                    return;
                }

                // Remove existing connection if present
                let existing_client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };
                if let Some(existing_id) = existing_client_id {
                    info!("Removing existing client {} from {}", existing_id, addr);
                    self.clients.write().await.remove_client(existing_id);
                    let outbox = self.world.disconnect(existing_id);
                    self.dispatch(outbox);
                }

                let client_id = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr)
                };
                let response = match client_id {
                    Some(client_id) => Packet::Connected { client_id },
                    None => Packet::Disconnected {
                        reason: "Server full".to_string(),
                    },
                };
                self.queue(GameMessage::SendPacket { packet: response, addr });
            }

            Packet::Heartbeat => {
                let mut clients = self.clients.write().await;
                if let Some(client_id) = clients.find_client_by_addr(addr) {
                    clients.touch(client_id);
                }
            }

            Packet::Intent(intent) => {
                let client_id = {
                    let mut clients = self.clients.write().await;
                    let client_id = clients.find_client_by_addr(addr);
                    if let Some(client_id) = client_id {
                        clients.touch(client_id);
                    }
                    client_id
                };
                let Some(client_id) = client_id else {
                    warn!("Intent from unconnected address {}", addr);
                    return;
                };

                let joining = match &intent {
                    ClientIntent::Join { character_id, .. } => Some(*character_id),
                    _ => None,
                };
                let now = self.now_ms();
                let outbox = self.world.handle_intent(client_id, intent, now);
                self.dispatch(outbox);

                if let Some(character_id) = joining {
                    if self.world.registry().connection_of(character_id) == Some(client_id) {
                        let mut clients = self.clients.write().await;
                        if let Some(previous) = clients.character_of(client_id) {
                            if previous != character_id {
                                info!(
                                    "Client {} rebound from character {} to {}",
                                    client_id, previous, character_id
                                );
                            }
                        }
                        clients.bind_character(client_id, character_id);
                    }
                }
            }

            Packet::Disconnect => {
                let client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };

                if let Some(client_id) = client_id {
                    self.clients.write().await.remove_client(client_id);
                    let outbox = self.world.disconnect(client_id);
                    self.dispatch(outbox);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Main server loop: inbound packets, the combat tick and the AI tick
    /// all run here, one at a time.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        let mut combat_interval = interval(self.combat_tick);
        combat_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ai_interval = interval(self.ai_tick);
        ai_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ai_ticks: u64 = 0;

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            info!("Client {} timed out", client_id);
                            let outbox = self.world.disconnect(client_id);
                            self.dispatch(outbox);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = combat_interval.tick() => {
                    let now = self.now_ms();
                    let outbox = self.world.combat_tick(now);
                    self.dispatch(outbox);
                },

                _ = ai_interval.tick() => {
                    let now = self.now_ms();
                    let outbox = self.world.ai_tick(now);
                    self.dispatch(outbox);

                    ai_ticks += 1;
                    if ai_ticks % 120 == 0 {
                        let client_count = self.clients.read().await.len();
                        if client_count > 0 {
                            debug!(
                                "AI tick {}: {} clients, {} players, {} active attacks",
                                ai_ticks,
                                client_count,
                                self.world.registry().player_count(),
                                self.world.attacks().len()
                            );
                        }
                    }
                },
            }
        }

        Ok(())
    }
}
