use crate::game::ClientGameState;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{
    ChangeRequest, Packet, RequestQueue, RequestTransport, DEFAULT_TICK_RATE, MAX_PACKET_SIZE,
    PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep, MissedTickBehavior};

/// Idle interval after which a heartbeat keeps the connection alive
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// Behaviour switches for a headless client
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub name: String,
    pub fake_ping_ms: u64,
    /// Request readiness as soon as the server knows us
    pub auto_ready: bool,
    /// Drive toward the next checkpoint while racing
    pub autopilot: bool,
}

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    connected: bool,
    options: ClientOptions,

    game_state: ClientGameState,
    outgoing: RequestQueue,

    last_sent: Instant,
    ready_requested: Option<Instant>,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        options: ClientOptions,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            connected: false,
            options,
            game_state: ClientGameState::new(),
            outgoing: RequestQueue::new(false),
            last_sent: Instant::now(),
            ready_requested: None,
        })
    }

    pub fn game_state(&self) -> &ClientGameState {
        &self.game_state
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server as {}...", self.options.name);

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            name: self.options.name.clone(),
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&mut self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        if self.options.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.options.fake_ping_ms / 2)).await;
        }

        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        self.last_sent = Instant::now();
        Ok(())
    }

    /// Applies a server packet, returning false once the server has dropped us
    fn handle_packet(&mut self, packet: Packet) -> bool {
        match packet {
            Packet::Connected { participant_id } => {
                info!("Connected! Participant ID: {}", participant_id);
                self.connected = true;
                self.outgoing.set_connected(true);
                self.game_state.apply_packet(Packet::Connected { participant_id });
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.outgoing.set_connected(false);
                return false;
            }

            packet => self.game_state.apply_packet(packet),
        }
        true
    }

    /// One fixed client tick: observer, automation, then request flush
    async fn tick(&mut self, dt: f32) -> Result<(), Box<dyn std::error::Error>> {
        if let Some((from, to)) = self.game_state.tick(dt) {
            info!("{:?} -> {:?}", from, to);
        }

        if self.options.auto_ready {
            let ready = self
                .game_state
                .local_participant()
                .map(|p| p.is_ready());
            let waiting = self
                .ready_requested
                .is_some_and(|at| at.elapsed() < HEARTBEAT_INTERVAL);
            if ready == Some(false)
                && !waiting
                && self.game_state.request_ready(true, &mut self.outgoing)
            {
                self.ready_requested = Some(Instant::now());
            }
        }

        if self.options.autopilot && self.outgoing.is_connected() {
            if let Some(input) = self.game_state.autopilot() {
                self.outgoing.submit(ChangeRequest::Drive(input));
            }
        }

        for request in self.outgoing.drain() {
            self.send_packet(&Packet::Request(request)).await?;
        }

        if self.connected && self.last_sent.elapsed() >= HEARTBEAT_INTERVAL {
            debug!("Sending heartbeat");
            self.send_packet(&Packet::Heartbeat).await?;
        }

        Ok(())
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let tick_duration = Duration::from_secs_f64(1.0 / DEFAULT_TICK_RATE as f64);
        let dt = tick_duration.as_secs_f32();
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut buffer = [0u8; MAX_PACKET_SIZE];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if self.options.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.options.fake_ping_ms / 2)).await;
                            }

                            match deserialize::<Packet>(&buffer[0..len]) {
                                Ok(packet) => {
                                    if !self.handle_packet(packet) {
                                        break;
                                    }
                                }
                                Err(e) => warn!("Failed to deserialize packet: {}", e),
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = tick_interval.tick() => {
                    if let Err(e) = self.tick(dt).await {
                        error!("Error sending to server: {}", e);
                    }
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down");
                    break;
                }
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ClientOptions {
        ClientOptions {
            name: "Ada".to_string(),
            auto_ready: true,
            ..ClientOptions::default()
        }
    }

    #[tokio::test]
    async fn test_invalid_server_address() {
        assert!(Client::new("not-an-address", options()).await.is_err());
    }

    #[tokio::test]
    async fn test_connected_opens_transport() {
        let mut client = Client::new("127.0.0.1:9", options()).await.unwrap();
        assert!(!client.is_connected());
        assert!(!client.outgoing.is_connected());

        assert!(client.handle_packet(Packet::Connected { participant_id: 4 }));
        assert!(client.is_connected());
        assert!(client.outgoing.is_connected());
        assert_eq!(client.game_state().local_id(), Some(4));
    }

    #[tokio::test]
    async fn test_disconnected_stops_client() {
        let mut client = Client::new("127.0.0.1:9", options()).await.unwrap();
        client.handle_packet(Packet::Connected { participant_id: 1 });

        let keep_going = client.handle_packet(Packet::Disconnected {
            reason: "Server full".to_string(),
        });
        assert!(!keep_going);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_auto_ready_sends_request() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap().to_string();

        let mut client = Client::new(&server_addr, options()).await.unwrap();
        client.handle_packet(Packet::Connected { participant_id: 1 });
        client.handle_packet(Packet::Snapshot {
            participants: vec![shared::Participant::new(
                1,
                "Ada",
                false,
                shared::Role::Racer,
                100,
                shared::Authority::Server,
            )
            .snapshot()],
            session: shared::SessionView::default(),
            track: None,
        });

        client.tick(1.0 / 60.0).await.unwrap();

        let mut buffer = [0u8; MAX_PACKET_SIZE];
        let (len, _) = server.recv_from(&mut buffer).await.unwrap();
        match deserialize::<Packet>(&buffer[..len]).unwrap() {
            Packet::Request(ChangeRequest::SetReady(true)) => {}
            other => panic!("Unexpected packet {:?}", other),
        }
    }
}
