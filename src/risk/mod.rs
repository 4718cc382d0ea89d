pub mod liquidation;
pub mod next_position;
pub mod validation;

pub use validation::TradeError;
