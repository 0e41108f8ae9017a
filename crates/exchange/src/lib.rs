pub mod factory;
pub mod remote;
pub mod traits;
pub mod types;

pub use factory::build_exchange;
pub use traits::Exchange;
pub use types::{
    AccountBalance, ClosedPosition, CurrencyBalance, ExchangeError, OrderFill, SubmitAck,
};
