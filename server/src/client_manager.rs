//! Connection bookkeeping for remote observers
//!
//! This module tracks which socket address belongs to which participant and
//! when each client was last heard from. It also hands out participant ids,
//! including ids for AI agents, so humans and agents share one id space.
//!
//! The client manager knows nothing about races. It only answers "who sent
//! this packet" and "who has gone quiet".

use log::info;
use shared::{ParticipantId, CONNECTION_TIMEOUT_SECS};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected remote observer
#[derive(Debug)]
pub struct Client {
    /// Participant id assigned by the server
    pub id: ParticipantId,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl Client {
    pub fn new(id: ParticipantId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
        }
    }

    /// Checks if the client has exceeded the connection timeout
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients and participant id allocation
///
/// Capacity limits apply to remote clients only; AI agents are allocated ids
/// without counting against it.
pub struct ClientManager {
    /// Connected clients indexed by their participant id
    clients: HashMap<ParticipantId, Client>,
    /// Next id handed to a client or agent
    next_id: ParticipantId,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
    timeout: Duration,
}

impl ClientManager {
    /// Creates a new client manager with the specified capacity limit
    ///
    /// Ids start from 1 and increment for each client or agent.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_id: 1,
            max_clients,
            timeout: Duration::from_secs(CONNECTION_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reserves a fresh participant id without a connection
    pub fn allocate_id(&mut self) -> ParticipantId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Attempts to add a new client connection
    ///
    /// Returns Some(id) if successful, None if the server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<ParticipantId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let id = self.allocate_id();
        info!("Client {} connected from {}", id, addr);
        self.clients.insert(id, Client::new(id, addr));

        Some(id)
    }

    /// Removes a client, returning true if it was connected
    pub fn remove_client(&mut self, id: &ParticipantId) -> bool {
        if let Some(client) = self.clients.remove(id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    /// Finds a client id by its network address
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<ParticipantId> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Records activity from `addr`, returning the sender's id if known
    pub fn touch(&mut self, addr: SocketAddr) -> Option<ParticipantId> {
        let client = self.clients.values_mut().find(|c| c.addr == addr)?;
        client.last_seen = Instant::now();
        Some(client.id)
    }

    /// Checks for and removes timed-out clients
    ///
    /// Returns the removed ids so the session can treat them as departures.
    pub fn check_timeouts(&mut self) -> Vec<ParticipantId> {
        let timeout = self.timeout;
        let timed_out: Vec<ParticipantId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for id in &timed_out {
            info!("Client {} timed out", id);
            self.remove_client(id);
        }

        timed_out
    }

    /// Gets all client ids and their network addresses for broadcasting
    pub fn get_client_addrs(&self) -> Vec<(ParticipantId, SocketAddr)> {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_client_timeout() {
        let mut client = Client::new(1, test_addr());
        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = ClientManager::new(5);
        assert_eq!(manager.max_clients, 5);
        assert_eq!(manager.timeout, Duration::from_secs(CONNECTION_TIMEOUT_SECS));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = ClientManager::new(3);
        assert_eq!(manager.add_client(test_addr()), Some(1));
        assert_eq!(manager.add_client(test_addr2()), Some(2));
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);
        assert!(manager.add_client(test_addr()).is_some());
        assert!(manager.add_client(test_addr2()).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_agents_share_id_space() {
        let mut manager = ClientManager::new(0);
        let agent = manager.allocate_id();
        assert_eq!(agent, 1);
        assert!(manager.is_empty());

        let mut manager = ClientManager::new(2);
        manager.allocate_id();
        assert_eq!(manager.add_client(test_addr()), Some(2));
    }

    #[test]
    fn test_remove_client() {
        let mut manager = ClientManager::new(2);
        let id = manager.add_client(test_addr()).unwrap();

        assert!(manager.remove_client(&id));
        assert!(!manager.remove_client(&id));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_find_and_touch() {
        let mut manager = ClientManager::new(2);
        let id1 = manager.add_client(test_addr()).unwrap();
        manager.add_client(test_addr2()).unwrap();

        assert_eq!(manager.find_client_by_addr(test_addr()), Some(id1));
        assert_eq!(manager.touch(test_addr()), Some(id1));

        let unknown: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_client_by_addr(unknown), None);
        assert_eq!(manager.touch(unknown), None);
    }

    #[test]
    fn test_check_timeouts() {
        let mut manager = ClientManager::new(2).with_timeout(Duration::from_millis(50));
        let stale = manager.add_client(test_addr()).unwrap();
        let fresh = manager.add_client(test_addr2()).unwrap();

        manager.clients.get_mut(&stale).unwrap().last_seen =
            Instant::now() - Duration::from_secs(1);

        assert_eq!(manager.check_timeouts(), vec![stale]);
        assert_eq!(manager.get_client_addrs(), vec![(fresh, test_addr2())]);
    }
}
