use thiserror::Error;

/// Failure taxonomy for the transaction engine. Validation and quota
/// variants are user-facing; lookup failures are swallowed per-token by
/// the grant flow; storage failures are logged and surfaced generically.
#[derive(Debug, Error)]
pub enum KudosError {
    #[error("sender is among the recipients")]
    SelfGrant,

    #[error("{recipients} recipients and {emojis} emojis don't match")]
    ShapeMismatch { recipients: usize, emojis: usize },

    #[error("requested {requested} with {remaining} of {quota} left today")]
    QuotaExceeded {
        quota: u32,
        remaining: u32,
        requested: u32,
    },

    #[error("cannot resolve handle {0}")]
    Lookup(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
