pub mod call;
pub mod signaling;

pub use call::*;
pub use signaling::*;
