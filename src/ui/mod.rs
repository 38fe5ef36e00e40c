//! Presentation models for the call modal and the history list. Rendering is
//! left to the host shell; these types decide what it shows.

pub mod call_screen;
pub mod history;

pub use call_screen::*;
pub use history::*;
