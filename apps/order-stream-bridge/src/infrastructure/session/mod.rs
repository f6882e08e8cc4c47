//! Trading session adapters.

mod paper;

pub use paper::PaperTradingSession;
