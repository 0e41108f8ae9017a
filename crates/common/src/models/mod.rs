pub mod order;
pub mod settlement;
pub mod signal;

pub use order::{
    ExecutionRequest, InstrumentType, MarginMode, OrderRecord, OrderType, PositionMode,
    PositionSide, Side,
};
pub use settlement::{SettlementState, SettlementSummary};
pub use signal::{RawSignal, TradeAction, TradeIntent};
