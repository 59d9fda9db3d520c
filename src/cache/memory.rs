use sysinfo::System;

/// Reports how much memory the process can still claim.
pub trait MemoryProbe: Send + Sync {
    /// Available bytes, or `None` when unknown.
    fn available_bytes(&self) -> Option<u64>;
}

/// Asks the operating system for its currently available memory.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemMemory;

impl MemoryProbe for SystemMemory {
    fn available_bytes(&self) -> Option<u64> {
        // Only memory totals are needed, not process enumeration.
        let mut sys = System::new();
        sys.refresh_memory();
        nonzero(sys.available_memory())
    }
}

/// A fixed answer, for tests and callers that know their budget.
#[derive(Clone, Copy, Debug)]
pub struct FixedMemory(pub Option<u64>);

impl MemoryProbe for FixedMemory {
    fn available_bytes(&self) -> Option<u64> {
        self.0
    }
}

// Platforms sysinfo cannot query report zero.
fn nonzero(bytes: u64) -> Option<u64> {
    (bytes > 0).then_some(bytes)
}
