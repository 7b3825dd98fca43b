//! Authority-written values with request round-trips for observers
//!
//! A [`Replicated`] value can only be written by the side that owns it. Every
//! other side sees the value through broadcasts and asks for changes by
//! submitting a [`ChangeRequest`] to the authority. The authority validates the
//! request and performs its own write, which is what eventually reaches every
//! observer. Observers never apply their own requests optimistically.

use crate::body::DriveInput;
use crate::error::RaceError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the connection a value lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Authority {
    /// The session process, the only side allowed to write
    Server,
    /// A client or AI agent holding a read-only projection
    Observer,
}

/// Change requests an observer may send to the authority
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChangeRequest {
    SetReady(bool),
    SetName(String),
    Drive(DriveInput),
}

/// Delivery channel for change requests
///
/// Implemented over UDP by the client and over an in-process queue by the
/// AI driver. Submission is fire-and-forget.
pub trait RequestTransport {
    fn is_connected(&self) -> bool;
    fn submit(&mut self, request: ChangeRequest);
}

/// Buffered outgoing requests, flushed once per tick by the owner
#[derive(Debug, Default)]
pub struct RequestQueue {
    pending: Vec<ChangeRequest>,
    connected: bool,
}

impl RequestQueue {
    pub fn new(connected: bool) -> Self {
        Self {
            pending: Vec::new(),
            connected,
        }
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
        if !connected {
            self.pending.clear();
        }
    }

    pub fn drain(&mut self) -> Vec<ChangeRequest> {
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl RequestTransport for RequestQueue {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn submit(&mut self, request: ChangeRequest) {
        self.pending.push(request);
    }
}

type ChangeHook<T> = Box<dyn FnMut(&T) + Send + Sync>;

/// A single replicated value
pub struct Replicated<T> {
    value: T,
    authority: Authority,
    dirty: bool,
    hook: Option<ChangeHook<T>>,
}

impl<T: fmt::Debug> fmt::Debug for Replicated<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replicated")
            .field("value", &self.value)
            .field("authority", &self.authority)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl<T: Clone + PartialEq> Replicated<T> {
    pub fn new(value: T, authority: Authority) -> Self {
        Self {
            value,
            authority,
            dirty: false,
            hook: None,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn authority(&self) -> Authority {
        self.authority
    }

    pub fn is_authority(&self) -> bool {
        self.authority == Authority::Server
    }

    /// Registers the callback run after every write or applied broadcast
    pub fn on_change<F>(&mut self, hook: F)
    where
        F: FnMut(&T) + Send + Sync + 'static,
    {
        self.hook = Some(Box::new(hook));
    }

    /// Writes a new value on the authoritative side
    ///
    /// The value is scheduled for broadcast only if it actually changed, but
    /// the change hook runs on every successful write.
    pub fn write(&mut self, value: T) -> Result<(), RaceError> {
        if !self.is_authority() {
            return Err(RaceError::PermissionDenied { operation: "write" });
        }

        if self.value != value {
            self.value = value;
            self.dirty = true;
        }
        self.notify();
        Ok(())
    }

    /// Applies `f` to a copy of the value and writes the result
    pub fn modify<F>(&mut self, f: F) -> Result<(), RaceError>
    where
        F: FnOnce(&mut T),
    {
        let mut next = self.value.clone();
        f(&mut next);
        self.write(next)
    }

    /// Asks the authority to change the value
    ///
    /// Returns whether the request was handed to the transport. Requests made
    /// while disconnected are dropped without retry.
    pub fn request<R, W>(&self, value: T, transport: &mut R, wrap: W) -> bool
    where
        R: RequestTransport + ?Sized,
        W: FnOnce(T) -> ChangeRequest,
    {
        if self.is_authority() {
            warn!("Request issued on the authoritative side, use write instead");
            return false;
        }
        if !transport.is_connected() {
            debug!("Dropping change request while disconnected");
            return false;
        }
        transport.submit(wrap(value));
        true
    }

    /// Installs a value broadcast by the authority
    pub fn apply_remote(&mut self, value: T) {
        if self.is_authority() {
            warn!("Ignoring remote value on the authoritative side");
            return;
        }
        self.value = value;
        self.notify();
    }

    /// Returns whether the value changed since the last call and clears the flag
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    fn notify(&mut self) {
        if let Some(hook) = self.hook.as_mut() {
            hook(&self.value);
        }
    }
}
