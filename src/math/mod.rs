pub mod conversion;
pub mod numbers;
pub mod pnl;
pub mod position;
pub mod rounding;

pub use numbers::*;
pub use rounding::mul_div;
