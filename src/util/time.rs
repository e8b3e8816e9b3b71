//! Time utilities for the local simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Client start time for uptime tracking
static CLIENT_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize client start time (call once at startup)
pub fn init_client_time() {
    CLIENT_START.get_or_init(Instant::now);
}

/// Get client uptime in seconds
pub fn uptime_secs() -> u64 {
    CLIENT_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Tick rate configuration
pub const SIMULATION_TPS: u32 = 60; // 60 ticks per second
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / SIMULATION_TPS as u64;

/// Fixed tick period for the simulation scheduler
pub fn tick_duration() -> Duration {
    Duration::from_micros(TICK_DURATION_MICROS)
}

/// Calculate delta time for physics (in seconds)
pub fn tick_delta() -> f32 {
    1.0 / SIMULATION_TPS as f32
}
