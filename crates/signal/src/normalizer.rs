use std::collections::HashSet;

use common::models::{PositionSide, Side, TradeAction};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionMapping {
    pub action: TradeAction,
    pub side: Side,
    pub position_side: PositionSide,
}

impl ActionMapping {
    const fn new(action: TradeAction, side: Side, position_side: PositionSide) -> Self {
        Self {
            action,
            side,
            position_side,
        }
    }
}

pub static ACTION_TABLE: [ActionMapping; 4] = [
    ActionMapping::new(TradeAction::OpenLong, Side::Buy, PositionSide::Long),
    ActionMapping::new(TradeAction::OpenShort, Side::Sell, PositionSide::Short),
    ActionMapping::new(TradeAction::CloseLong, Side::Sell, PositionSide::Long),
    ActionMapping::new(TradeAction::CloseShort, Side::Buy, PositionSide::Short),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("exchange returned unrecognized side/posSide pair ({side}, {position_side})")]
    UnrecognizedPair { side: String, position_side: String },
    #[error("action table must have exactly {expected} entries, found {found}")]
    TableSize { expected: usize, found: usize },
    #[error("action table maps ({0}, {1}) more than once")]
    DuplicatePair(Side, PositionSide),
    #[error("action table has no entry for {0:?}")]
    MissingAction(TradeAction),
}

/// Translates between trade actions and exchange (side, posSide) pairs.
#[derive(Debug, Clone, Copy)]
pub struct IntentNormalizer {
    table: &'static [ActionMapping],
}

impl IntentNormalizer {
    pub fn new() -> Result<Self, NormalizationError> {
        Self::with_table(&ACTION_TABLE)
    }

    pub fn with_table(table: &'static [ActionMapping]) -> Result<Self, NormalizationError> {
        validate_table(table)?;
        Ok(Self { table })
    }

    pub fn forward(&self, action: TradeAction) -> Result<(Side, PositionSide), NormalizationError> {
        self.table
            .iter()
            .find(|m| m.action == action)
            .map(|m| (m.side, m.position_side))
            .ok_or(NormalizationError::MissingAction(action))
    }

    pub fn reverse(
        &self,
        side: Side,
        position_side: PositionSide,
    ) -> Result<TradeAction, NormalizationError> {
        self.table
            .iter()
            .find(|m| m.side == side && m.position_side == position_side)
            .map(|m| m.action)
            .ok_or_else(|| NormalizationError::UnrecognizedPair {
                side: side.to_string(),
                position_side: position_side.to_string(),
            })
    }

    /// Reverse lookup on the exchange's raw strings, e.g. `("sell", "long")`.
    pub fn reverse_wire(
        &self,
        side: &str,
        position_side: &str,
    ) -> Result<ActionMapping, NormalizationError> {
        let unrecognized = || NormalizationError::UnrecognizedPair {
            side: side.to_string(),
            position_side: position_side.to_string(),
        };

        let side = side.parse::<Side>().map_err(|_| unrecognized())?;
        let position_side = position_side
            .parse::<PositionSide>()
            .map_err(|_| unrecognized())?;

        self.table
            .iter()
            .find(|m| m.side == side && m.position_side == position_side)
            .copied()
            .ok_or_else(unrecognized)
    }
}

/// Exactly one entry per action and no pair used twice.
pub fn validate_table(table: &[ActionMapping]) -> Result<(), NormalizationError> {
    let expected = TradeAction::ALL.len();
    if table.len() != expected {
        return Err(NormalizationError::TableSize {
            expected,
            found: table.len(),
        });
    }

    let mut pairs = HashSet::new();
    for mapping in table {
        if !pairs.insert((mapping.side, mapping.position_side)) {
            return Err(NormalizationError::DuplicatePair(
                mapping.side,
                mapping.position_side,
            ));
        }
    }

    for action in TradeAction::ALL {
        if !table.iter().any(|m| m.action == action) {
            return Err(NormalizationError::MissingAction(action));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_for_every_action() {
        let normalizer = IntentNormalizer::new().unwrap();

        for action in TradeAction::ALL {
            let (side, position_side) = normalizer.forward(action).unwrap();
            assert_eq!(normalizer.reverse(side, position_side).unwrap(), action);
        }
    }

    #[test]
    fn test_forward_pairs() {
        let normalizer = IntentNormalizer::new().unwrap();

        assert_eq!(
            normalizer.forward(TradeAction::OpenLong).unwrap(),
            (Side::Buy, PositionSide::Long)
        );
        assert_eq!(
            normalizer.forward(TradeAction::OpenShort).unwrap(),
            (Side::Sell, PositionSide::Short)
        );
        assert_eq!(
            normalizer.forward(TradeAction::CloseLong).unwrap(),
            (Side::Sell, PositionSide::Long)
        );
        assert_eq!(
            normalizer.forward(TradeAction::CloseShort).unwrap(),
            (Side::Buy, PositionSide::Short)
        );
    }

    #[test]
    fn test_reverse_wire() {
        let normalizer = IntentNormalizer::new().unwrap();

        let mapping = normalizer.reverse_wire("sell", "long").unwrap();
        assert_eq!(mapping.action, TradeAction::CloseLong);

        assert_eq!(
            normalizer.reverse_wire("buy", "net").unwrap_err(),
            NormalizationError::UnrecognizedPair {
                side: "buy".to_string(),
                position_side: "net".to_string(),
            }
        );
    }

    static DUPLICATED: [ActionMapping; 4] = [
        ActionMapping::new(TradeAction::OpenLong, Side::Buy, PositionSide::Long),
        ActionMapping::new(TradeAction::OpenShort, Side::Sell, PositionSide::Short),
        ActionMapping::new(TradeAction::CloseLong, Side::Buy, PositionSide::Long),
        ActionMapping::new(TradeAction::CloseShort, Side::Buy, PositionSide::Short),
    ];

    static MISSING_CLOSE_SHORT: [ActionMapping; 4] = [
        ActionMapping::new(TradeAction::OpenLong, Side::Buy, PositionSide::Long),
        ActionMapping::new(TradeAction::OpenShort, Side::Sell, PositionSide::Short),
        ActionMapping::new(TradeAction::CloseLong, Side::Sell, PositionSide::Long),
        ActionMapping::new(TradeAction::CloseLong, Side::Buy, PositionSide::Short),
    ];

    #[test]
    fn test_table_validation() {
        assert!(validate_table(&ACTION_TABLE).is_ok());

        assert_eq!(
            IntentNormalizer::with_table(&DUPLICATED).unwrap_err(),
            NormalizationError::DuplicatePair(Side::Buy, PositionSide::Long)
        );
        assert_eq!(
            IntentNormalizer::with_table(&MISSING_CLOSE_SHORT).unwrap_err(),
            NormalizationError::MissingAction(TradeAction::CloseShort)
        );
        assert_eq!(
            validate_table(&ACTION_TABLE[..3]).unwrap_err(),
            NormalizationError::TableSize {
                expected: 4,
                found: 3
            }
        );
    }
}
