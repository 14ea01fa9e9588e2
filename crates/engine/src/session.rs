//! Session identity, roles and connectivity mode, as supplied by the host.
//!
//! The engine only reads from a [`SessionProvider`]; it never writes back.

use std::sync::atomic::{AtomicBool, Ordering};

use registrar_core::Actor;

pub trait SessionProvider: Send + Sync + 'static {
    fn actor(&self) -> Actor;

    /// Degraded connectivity: every mutation is refused locally.
    fn read_only(&self) -> bool;
}

/// A session fixed at construction. Only the read-only flag may change, as
/// the host's connectivity does.
#[derive(Debug)]
pub struct StaticSession {
    actor: Actor,
    read_only: AtomicBool,
}

impl StaticSession {
    pub fn new(actor: Actor, read_only: bool) -> Self {
        StaticSession {
            actor,
            read_only: AtomicBool::new(read_only),
        }
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }
}

impl SessionProvider for StaticSession {
    fn actor(&self) -> Actor {
        self.actor.clone()
    }

    fn read_only(&self) -> bool {
        self.read_only.load(Ordering::SeqCst)
    }
}
