pub mod decrease;
pub mod increase;
pub mod pool;
pub mod routing;
pub mod swap;
