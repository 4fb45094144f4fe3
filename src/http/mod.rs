//! The inter-server HTTP surface: outbound client (§10.3) and inbound
//! router (§6), plus the JWT middleware shared by both.

mod auth;
mod client;
mod server;

pub use auth::require_cluster_jwt;
pub use client::PeerClient;
pub use server::build_router;
