//! Connection lifecycle: unregistered arrivals become indexed peers.

use std::sync::{Arc, RwLock};

use tracing::{debug, instrument};

use crate::error::NetError;

/// Anything the registry can index.
pub trait Peer {
    /// Returns the current index; 0 until registered.
    fn index(&self) -> u8;

    /// Sets the index assigned at registration.
    fn assign_index(&mut self, index: u8);
}

#[derive(Debug)]
struct Slots<P> {
    unregistered: Vec<P>,
    registered: Vec<Arc<P>>,
}

/// Holds pending and registered peers.
///
/// Registration moves pending peers, in arrival order, into the registered
/// collection and numbers them contiguously from 1. Lookups by index only
/// see registered peers.
///
/// # Examples
/// ```
/// use kromo_net::{ConnectionRegistry, Peer};
///
/// struct Named(&'static str, u8);
///
/// impl Peer for Named {
///     fn index(&self) -> u8 { self.1 }
///     fn assign_index(&mut self, index: u8) { self.1 = index; }
/// }
///
/// let registry = ConnectionRegistry::new();
/// for name in ["p0", "p1", "p2"] {
///     registry.add_unregistered(Named(name, 0)).expect("registry is healthy");
/// }
/// assert_eq!(registry.register().expect("fits in a byte"), 3);
/// let second = registry.get(2).expect("registry is healthy").expect("index 2 exists");
/// assert_eq!(second.0, "p1");
/// ```
#[derive(Debug)]
pub struct ConnectionRegistry<P> {
    slots: RwLock<Slots<P>>,
}

impl<P> Default for ConnectionRegistry<P> {
    fn default() -> Self {
        Self {
            slots: RwLock::new(Slots {
                unregistered: Vec::new(),
                registered: Vec::new(),
            }),
        }
    }
}

fn poisoned() -> NetError {
    NetError::LockPoisoned {
        resource: "connection registry",
    }
}

impl<P: Peer> ConnectionRegistry<P> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `peer` to the pending collection.
    ///
    /// # Errors
    /// Returns [`NetError::LockPoisoned`] if a writer panicked.
    pub fn add_unregistered(&self, peer: P) -> Result<(), NetError> {
        self.slots.write().map_err(|_| poisoned())?.unregistered.push(peer);
        Ok(())
    }

    /// Registers every pending peer in arrival order and returns the number
    /// of registered peers.
    ///
    /// Calling it again without new arrivals changes nothing, and peers that
    /// already carry their intended index keep it.
    ///
    /// # Errors
    /// Returns [`NetError::TooManyPeers`] when the total would exceed 255;
    /// nothing is registered in that case.
    #[instrument(name = "net.registry.register", skip(self), err)]
    pub fn register(&self) -> Result<usize, NetError> {
        let mut slots = self.slots.write().map_err(|_| poisoned())?;
        let total = slots.registered.len() + slots.unregistered.len();
        if total > usize::from(u8::MAX) {
            return Err(NetError::TooManyPeers { got: total });
        }
        let pending = std::mem::take(&mut slots.unregistered);
        for mut peer in pending {
            let next = u8::try_from(slots.registered.len() + 1)
                .map_err(|_| NetError::TooManyPeers { got: total })?;
            if peer.index() != next {
                peer.assign_index(next);
            }
            slots.registered.push(Arc::new(peer));
        }
        debug!(registered = slots.registered.len(), "peers registered");
        Ok(slots.registered.len())
    }

    /// Returns the registered peer with `index`.
    ///
    /// # Errors
    /// Returns [`NetError::LockPoisoned`] if a writer panicked.
    pub fn get(&self, index: u8) -> Result<Option<Arc<P>>, NetError> {
        let slots = self.slots.read().map_err(|_| poisoned())?;
        Ok(usize::from(index)
            .checked_sub(1)
            .and_then(|slot| slots.registered.get(slot))
            .cloned())
    }

    /// Returns every registered peer in index order.
    ///
    /// # Errors
    /// Returns [`NetError::LockPoisoned`] if a writer panicked.
    pub fn registered(&self) -> Result<Vec<Arc<P>>, NetError> {
        Ok(self.slots.read().map_err(|_| poisoned())?.registered.clone())
    }

    /// Returns the number of peers awaiting registration.
    ///
    /// # Errors
    /// Returns [`NetError::LockPoisoned`] if a writer panicked.
    pub fn pending(&self) -> Result<usize, NetError> {
        Ok(self.slots.read().map_err(|_| poisoned())?.unregistered.len())
    }

    /// Drops every pending and registered peer held by the registry.
    ///
    /// # Errors
    /// Returns [`NetError::LockPoisoned`] if a writer panicked.
    pub fn shutdown(&self) -> Result<(), NetError> {
        let mut slots = self.slots.write().map_err(|_| poisoned())?;
        slots.unregistered.clear();
        slots.registered.clear();
        Ok(())
    }
}
