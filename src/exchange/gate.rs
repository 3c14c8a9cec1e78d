use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Allows at most one text or voice exchange in flight per conversation
#[derive(Debug, Default)]
pub struct ExchangeGate {
    busy: AtomicBool,
}

impl ExchangeGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Take the token, or `None` if another exchange holds it. Never waits.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ExchangeToken> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| ExchangeToken {
                gate: Arc::clone(self),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }
}

/// Held for the duration of one exchange; the gate reopens when it drops
#[derive(Debug)]
pub struct ExchangeToken {
    gate: Arc<ExchangeGate>,
}

impl Drop for ExchangeToken {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::SeqCst);
    }
}
