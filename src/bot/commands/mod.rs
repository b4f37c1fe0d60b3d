//! Discord command implementations organized by category.

#![allow(clippy::too_long_first_doc_paragraph)]

/// Contract and installment commands
pub mod contract;

/// General utility commands
pub mod general;

/// Notification feed commands
pub mod notifications;

// Export commands
pub use contract::*;
pub use general::*;
pub use notifications::*;
