// ABOUTME: The shared frame slot and client registry that connect the producer to every worker
// ABOUTME: Single-transition ready-flag model: the producer only ever flips a flag 0 -> 1 on publish

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// Identifies one connected client session for the lifetime of its worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

/// Per-client EWMA interval, shared between a session (which updates it)
/// and the registry's pacing snapshot (which only reads it). Lives
/// outside the frame-slot mutex since it is not part of the publication
/// protocol, just diagnostic/pacing state private to one client.
#[derive(Debug, Default)]
pub struct ClientStats {
    interval_bits: AtomicU64,
}

impl ClientStats {
    fn new() -> Self {
        Self {
            interval_bits: AtomicU64::new(0u64),
        }
    }

    pub fn set_interval(&self, seconds: f64) {
        self.interval_bits.store(seconds.to_bits(), Ordering::Relaxed);
    }

    pub fn interval(&self) -> f64 {
        f64::from_bits(self.interval_bits.load(Ordering::Relaxed))
    }
}

struct SlotState {
    frame: Vec<u8>,
    ready: HashMap<ClientId, bool>,
}

/// The explicit, shared-ownership replacement for what would otherwise be
/// module-level globals: the frame slot, the client registry, and the
/// `running` flag all live here, reached through an `Arc<FrameHub>` held
/// by the producer and every worker thread.
pub struct FrameHub {
    registry: Mutex<Vec<(ClientId, Arc<ClientStats>)>>,
    slot: Mutex<SlotState>,
    condvar: Condvar,
    next_id: AtomicU64,
    running: AtomicBool,
}

impl FrameHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            registry: Mutex::new(Vec::new()),
            slot: Mutex::new(SlotState {
                frame: Vec::new(),
                ready: HashMap::new(),
            }),
            condvar: Condvar::new(),
            next_id: AtomicU64::new(1),
            running: AtomicBool::new(true),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Registers a new client, returning its id and the stats handle its
    /// session should update after every delivered frame. Lock order:
    /// registry, then frame-slot, matching the order used by `publish`.
    pub fn register(&self) -> (ClientId, Arc<ClientStats>) {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let stats = Arc::new(ClientStats::new());

        let registry = self.registry.lock().unwrap();
        let mut slot = self.slot.lock().unwrap();
        slot.ready.insert(id, false);
        drop(slot);
        drop(registry);

        self.registry.lock().unwrap().push((id, stats.clone()));
        (id, stats)
    }

    /// Removes a client from both the registry and the frame slot's
    /// ready map. Safe to call exactly once, when a session's worker is
    /// about to exit.
    pub fn unregister(&self, id: ClientId) {
        self.registry.lock().unwrap().retain(|(i, _)| *i != id);
        self.slot.lock().unwrap().ready.remove(&id);
    }

    pub fn num_clients(&self) -> usize {
        self.registry.lock().unwrap().len()
    }

    /// The minimum EWMA interval across all connected clients, used by
    /// the producer to decide whether to pace itself down. `None` with
    /// no clients connected. A freshly-registered client contributes its
    /// unset `0.0` interval like any other value, matching the original
    /// producer's `frame_int` scan — this is what lets a new connection
    /// suppress pacing for the tick it joins on.
    pub fn snapshot_min_interval(&self) -> Option<f64> {
        self.registry
            .lock()
            .unwrap()
            .iter()
            .map(|(_, stats)| stats.interval())
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.min(v))))
    }

    /// Publishes a complete frame: overwrite the frame bytes, flip every
    /// registered client's `ready` flag to 1, broadcast. This is the
    /// single-transition model — the producer never clears a flag back
    /// to 0 itself; only a draining worker does, and only under this
    /// same lock.
    pub fn publish(&self, frame: &[u8]) {
        let registry = self.registry.lock().unwrap();
        let mut slot = self.slot.lock().unwrap();
        slot.frame.clear();
        slot.frame.extend_from_slice(frame);
        for (id, _) in registry.iter() {
            slot.ready.insert(*id, true);
        }
        drop(slot);
        self.condvar.notify_all();
        drop(registry);
    }

    /// Blocks until `id`'s frame is ready or shutdown is signaled. On
    /// success, copies the current frame into `scratch` (growing it if
    /// needed) and clears `id`'s ready flag before returning. Returns
    /// `false` if the hub was shut down without a frame for this client
    /// to take — the caller should end its session in that case.
    pub fn wait_for_frame(&self, id: ClientId, scratch: &mut Vec<u8>) -> bool {
        let mut slot = self.slot.lock().unwrap();
        loop {
            if !self.is_running() {
                return false;
            }
            if *slot.ready.get(&id).unwrap_or(&false) {
                break;
            }
            slot = self.condvar.wait(slot).unwrap();
        }

        scratch.clear();
        scratch.extend_from_slice(&slot.frame);
        slot.ready.insert(id, false);
        true
    }

    /// Flips `running` off, marks every client ready (so workers blocked
    /// in `wait_for_frame` wake up and observe the shutdown rather than
    /// waiting out their condvar forever), and broadcasts. Idempotent:
    /// a second call is a harmless no-op.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        let mut slot = self.slot.lock().unwrap();
        for ready in slot.ready.values_mut() {
            *ready = true;
        }
        drop(slot);
        self.condvar.notify_all();
    }
}
