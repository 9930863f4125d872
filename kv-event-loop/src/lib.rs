//! Concurrency core of a small line-protocol key-value server.
//!
//! Every state change goes through one event loop. Connections never share
//! memory with it; they only send it messages:
//!
//! - [`acceptor`] owns the listening socket and turns each connection into a
//!   [`peer::Peer`], registering it with the coordinator before starting its
//!   read loop on a separate task.
//! - [`peer`] reads newline-delimited lines from one connection and forwards
//!   them, in order, to the coordinator.
//! - [`coordinator`] owns the [`registry::PeerRegistry`], parses raw lines
//!   and dispatches commands to a [`coordinator::CommandHandler`].
//! - [`command`] is the line protocol: `SET <key> <value>`.
//! - [`server`] wires the pieces together and handles shutdown.
//!
//! Nothing is ever written back to clients; responses belong to the command
//! handler.

pub mod acceptor;
pub mod cli;
pub mod command;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod peer;
pub mod registry;
pub mod server;
