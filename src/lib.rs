//! ERP Calls - one-to-one audio/video calling between ERP users
//!
//! The client side ([`calls`]) places and answers calls over a shared
//! signaling socket, drives an injected WebRTC peer session and records the
//! outcome through the call history API. The server side ([`server`]) relays
//! signaling between users and stores the call history.

pub mod api;
pub mod calls;
pub mod config;
pub mod media;
pub mod models;
pub mod peer;
pub mod server;
pub mod signaling;
pub mod state;
pub mod tones;
pub mod ui;
