//! Repository layer, split by table family.

mod audit;
mod chat_turns;
mod tables;

pub use audit::*;
pub use chat_turns::*;
pub use tables::*;
