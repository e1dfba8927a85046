//! # Yahtzee Client Library
//!
//! A thin terminal front end for the Yahtzee server. The server renders
//! every prompt, dice line and scorecard as plain text, so the client has no
//! game state of its own: it relays what the player types and prints what
//! the server sends.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! TCP connection handling:
//! - Connecting to the server address
//! - Forwarding input lines to the server
//! - Copying server output to the terminal until the server hangs up

pub mod network;
