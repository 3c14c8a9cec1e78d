mod controller;
mod gate;

pub use controller::MessageExchange;
pub use gate::{ExchangeGate, ExchangeToken};
