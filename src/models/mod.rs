pub mod allocation;
pub mod binance;
pub mod order;
pub mod portfolio;
pub mod response;

pub use allocation::*;
pub use binance::*;
pub use order::*;
pub use portfolio::*;
pub use response::*;
