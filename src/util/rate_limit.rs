//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Direct (unkeyed) limiter shared by one gate
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Build a limiter allowing `per_second` cells; zero is treated as one
pub fn create_limiter(per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Discrete confirmation calls per second for fighting movement
pub const MOVEMENT_CONFIRM_RATE_LIMIT: u32 = 10;

/// Renderer bridge input messages per second
pub const RENDER_INPUT_RATE_LIMIT: u32 = 120;
