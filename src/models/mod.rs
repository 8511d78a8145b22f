pub mod audit;
pub mod enums;
pub mod turn;

pub use audit::*;
pub use enums::*;
pub use turn::*;
