pub mod normalizer;
pub mod parser;

pub use normalizer::{ACTION_TABLE, ActionMapping, IntentNormalizer, NormalizationError};
pub use parser::{ParseError, ParsedSignal, parse_signal, parse_signal_at};
