//! Domain failures. Each variant's message is shown to the user as-is.

use circle_types::models::DonationStatus;
use thiserror::Error;

/// A transition that the controller refused to apply.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("cannot move a {from} donation to {to}")]
    InvalidState {
        from: DonationStatus,
        to: DonationStatus,
    },

    #[error("not allowed: {0}")]
    Forbidden(&'static str),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("message cannot be empty")]
    EmptyMessage,

    #[error("message is longer than {0} characters")]
    MessageTooLong(usize),

    #[error("only the donor and the assigned volunteer can use this chat")]
    NotParticipant,

    #[error("chat opens once a volunteer has claimed the donation")]
    NotOpen,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
