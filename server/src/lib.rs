//! # Yahtzee Server Library
//!
//! This library provides the authoritative server for a turn-based, text-only
//! multiplayer Yahtzee game for three to five players. Players connect over
//! TCP with any line-oriented client, pick a name, and take turns rolling,
//! rerolling and scoring while the server keeps every scorecard.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Scoring
//! All dice rolls, scoring rules, bonuses and winner election happen here.
//! Clients only ever see rendered text and send back single lines.
//!
//! ### Lobby Management
//! Handles the life of a connection before the game starts:
//! - Admission into one of five fixed slots
//! - Host election and the host's choice of player count
//! - Freezing the participant set once enough players are connected
//!
//! ### Fair Turn Scheduling
//! A round-robin scheduler grants one turn at a time with a fixed time
//! quantum. A turn that is not finished in time forfeits exactly one box;
//! a player who disconnects forfeits every box still open.
//!
//! ## Architecture Design
//!
//! ### One Shared Store
//! All game data lives in a single [`store::GameSession`] behind an async
//! mutex. Every mutation is a short, atomic method call; the lock is never
//! held across network I/O. A revision watch wakes lobby waiters and the
//! scheduler instead of polling.
//!
//! ### Task per Player
//! Each connection runs in its own tokio task. The scheduler talks to those
//! tasks through a pair of one-slot channels per player: a start signal
//! carrying a turn ticket and deadline, and a done signal echoing the ticket.
//! Tickets make the player's write path and the scheduler's forfeit path
//! mutually exclusive.
//!
//! ## Module Organization
//!
//! ### Store Module (`store`)
//! Session and player records with every rule-enforcing mutation.
//!
//! ### Endgame Module (`endgame`)
//! Completion detection and the tie-aware winner election.
//!
//! ### Lobby Module (`lobby`)
//! Admission, host setup and starting the scheduler.
//!
//! ### Scheduler Module (`scheduler`)
//! Round-robin turn grants with quantum preemption.
//!
//! ### Turn Module (`turn`)
//! The per-turn state machine a player walks through, plus dice rollers.
//!
//! ### Session Module (`session`)
//! One connection's path from name prompt to final report.
//!
//! ### Channel, Text and Network Modules (`channel`, `text`, `network`)
//! Line I/O abstraction, message rendering and the TCP transport.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Bind to 127.0.0.1:7878 with a 60 second turn quantum
//!     let config = ServerConfig::default().with_quantum(Duration::from_secs(60));
//!     let server = Server::new(config).await?;
//!
//!     // Accept players forever; each connection gets its own task
//!     server.run().await;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod endgame;
pub mod lobby;
pub mod network;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod text;
pub mod turn;
