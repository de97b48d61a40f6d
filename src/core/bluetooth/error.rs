//! Structured failure reasons for the bluetooth module.

use thiserror::Error;

/// Failure reasons carried inside radio events.
///
/// These never cross the public API as `Err` values. The controller logs
/// them and reflects the outcome in the published snapshot; callers observe
/// state, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RadioError {
    /// The requested peripheral is not in the discovered set.
    #[error("peripheral {0} is not in the discovered set")]
    UnknownPeripheral(String),

    /// The platform radio stack reported a link-level failure.
    #[error("link error: {0}")]
    Link(String),
}
