//! Owlbridge status API.
//!
//! A single `GET /status` endpoint reporting whether the message loop is
//! running and connected to the broker.

pub mod handlers;
pub mod server;
pub mod shutdown;

pub use server::{create_router, run};
pub use shutdown::shutdown_signal;
