//! Domain services used by the websocket routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own registry, account, and persistence concerns so
//! the route layer can stay focused on protocol translation and
//! connection plumbing.

pub mod accounts;
pub mod persistence;
pub mod rooms;
