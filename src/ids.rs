use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Source of request ids. Each call must return an id never handed out before.
pub trait IdGenerator: Send + Sync + std::fmt::Debug {
    fn next_id(&self) -> Uuid;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UuidV4Generator;

impl IdGenerator for UuidV4Generator {
    fn next_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Deterministic ids `00000000-0000-0000-0000-000000000001`, `...0002`, and so on.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> Uuid {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        Uuid::from_u128(n as u128)
    }
}
