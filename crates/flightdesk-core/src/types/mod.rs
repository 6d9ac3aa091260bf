pub mod ids;
pub mod message;

pub use ids::*;
pub use message::*;
