//! Discrete request/response calls to the remote game service

pub mod client;
pub mod personality;

pub use client::{ActionRequest, ApiClient, GameApi};
