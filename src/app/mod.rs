//! Session ownership and shared application state

pub mod event;
pub mod session;
pub mod state;

pub use session::SessionError;
pub use state::AppState;
