pub mod client;
pub mod calls;

pub use client::*;
