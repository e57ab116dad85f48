//! The single authority on whether remote operations are permitted.
//!
//! Every component that touches the network asks this gate first; no other
//! component performs its own flag check, so the answer cannot drift. The
//! verdict is computed fresh on every call from the flag source, the
//! configured adapter's capability, and an optional connectivity signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Source of the remote-sync enablement flag.
///
/// Read once per gate evaluation, never cached, so runtime toggles take
/// effect on the next check.
pub trait FlagSource: Send + Sync {
    fn remote_sync_enabled(&self) -> bool;
}

/// Whether a configured adapter is actually able to serve remote calls.
pub trait Capability: Send + Sync {
    fn available(&self) -> bool;
}

/// Flag read from an environment variable on every evaluation.
pub struct EnvFlag {
    var: String,
}

impl EnvFlag {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvFlag {
    fn default() -> Self {
        Self::new("TETHER_REMOTE_ENABLED")
    }
}

impl FlagSource for EnvFlag {
    fn remote_sync_enabled(&self) -> bool {
        match std::env::var(&self.var) {
            Ok(value) => matches!(
                value.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            ),
            Err(_) => false,
        }
    }
}

/// Flag toggled at runtime by the embedding application.
#[derive(Debug, Default)]
pub struct RuntimeFlag(AtomicBool);

impl RuntimeFlag {
    pub fn shared(enabled: bool) -> Arc<Self> {
        Arc::new(Self(AtomicBool::new(enabled)))
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::SeqCst);
    }
}

impl FlagSource for RuntimeFlag {
    fn remote_sync_enabled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Connectivity signal fed by the embedding platform.
///
/// Optional: when the platform offers no reachability tracking, the gate
/// assumes the remote is reachable and lets failure classification handle
/// unreachability.
#[derive(Debug)]
pub struct Connectivity(AtomicBool);

impl Connectivity {
    /// Create a signal that starts online.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self(AtomicBool::new(true)))
    }

    pub fn set_online(&self, online: bool) {
        self.0.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Process-wide authority answering "is remote operation permitted".
pub struct FeatureGate {
    flags: Arc<dyn FlagSource>,
    capability: Arc<dyn Capability>,
    connectivity: Option<Arc<Connectivity>>,
}

impl FeatureGate {
    pub fn new(
        flags: Arc<dyn FlagSource>,
        capability: Arc<dyn Capability>,
        connectivity: Option<Arc<Connectivity>>,
    ) -> Self {
        Self {
            flags,
            capability,
            connectivity,
        }
    }

    /// Whether a remote operation may be started right now.
    pub fn remote_allowed(&self) -> bool {
        if !self.flags.remote_sync_enabled() {
            return false;
        }
        if !self.capability.available() {
            return false;
        }
        match &self.connectivity {
            Some(signal) => signal.is_online(),
            None => true,
        }
    }
}
