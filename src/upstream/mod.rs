//! Southbound client for the cloudcode-pa `v1internal` endpoint.

mod backend;
mod client;

pub use backend::{FrameStream, GenerateBackend};
pub use client::{CloudCodeClient, UPSTREAM_USER_AGENT};
