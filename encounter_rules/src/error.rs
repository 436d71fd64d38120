//! Errors raised by the rules layer.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulesError {
    /// A fact key was empty after trimming.
    #[error("fact key is blank")]
    BlankKey,
}
