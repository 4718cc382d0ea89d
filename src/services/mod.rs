pub mod borrowing;
pub mod fees;
pub mod funding;
pub mod liquidity;
pub mod open_interest;
pub mod price_impact;
pub mod pricing;
