//! Peer messaging gateway.
//!
//! This crate turns the logical [`Request`](corelib::Request) /
//! [`Response`](corelib::Response) pairs into transport calls:
//! - Length-delimited bincode frames
//! - A TCP server dispatching frames to a [`RequestHandler`](corelib::RequestHandler)
//! - A TCP client implementing [`PeerClient`](corelib::PeerClient)
//! - An in-process network for multi-node tests and simulations

pub mod client;
pub mod codec;
pub mod memory;
pub mod server;

pub use client::TcpClient;
pub use memory::MemoryNetwork;
pub use server::TcpServer;
