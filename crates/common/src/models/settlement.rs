use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementState {
    PartialClose,
    FullClose,
}

impl SettlementState {
    /// Position-history `type` code: "1" is a partial close, everything else closes the position.
    pub fn from_type_code(code: &str) -> Self {
        if code.trim() == "1" {
            Self::PartialClose
        } else {
            Self::FullClose
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::PartialClose => "partial close",
            Self::FullClose => "full close",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettlementSummary {
    pub state: SettlementState,
    pub realized_pnl: Decimal,
    pub fee: Decimal,
    pub close_pnl: Decimal,
}
