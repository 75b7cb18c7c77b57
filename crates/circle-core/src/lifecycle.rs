//! Donation status state machine.
//!
//! ```text
//! AVAILABLE --claim (volunteer, not donor)--> PICKED_UP --deliver (assigned volunteer)--> DELIVERED
//!     |
//!     +--cancel (donor)--> CANCELLED
//! ```
//!
//! Guards are checked before any write. A rejected transition leaves the
//! record untouched; nothing here coerces a record into a different state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use circle_types::models::{Donation, DonationStatus, Role, Viewer};

use crate::channel;
use crate::error::LifecycleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Claim,
    Deliver,
    Cancel,
}

impl Transition {
    pub const ALL: [Transition; 3] = [Self::Claim, Self::Deliver, Self::Cancel];

    /// The only status this transition may start from.
    pub fn source(self) -> DonationStatus {
        match self {
            Self::Claim | Self::Cancel => DonationStatus::Available,
            Self::Deliver => DonationStatus::PickedUp,
        }
    }

    pub fn target(self) -> DonationStatus {
        match self {
            Self::Claim => DonationStatus::PickedUp,
            Self::Deliver => DonationStatus::Delivered,
            Self::Cancel => DonationStatus::Cancelled,
        }
    }
}

/// A permitted write. `volunteer_id` is only set for a claim and must be
/// stored in the same statement as the status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub donation_id: Uuid,
    pub from: DonationStatus,
    pub to: DonationStatus,
    pub volunteer_id: Option<Uuid>,
}

/// Check `transition` against the record's current status and the actor.
pub fn authorize(
    donation: &Donation,
    actor: &Viewer,
    transition: Transition,
) -> Result<Applied, LifecycleError> {
    if donation.status != transition.source() {
        return Err(LifecycleError::InvalidState {
            from: donation.status,
            to: transition.target(),
        });
    }

    let volunteer_id = match transition {
        Transition::Claim => {
            if actor.role != Role::Volunteer {
                return Err(LifecycleError::Forbidden("only volunteers can claim donations"));
            }
            if actor.id == donation.donor_id {
                return Err(LifecycleError::Forbidden("you cannot claim your own donation"));
            }
            Some(actor.id)
        }
        Transition::Deliver => {
            if donation.volunteer_id != Some(actor.id) {
                return Err(LifecycleError::Forbidden(
                    "only the assigned volunteer can mark this delivered",
                ));
            }
            None
        }
        Transition::Cancel => {
            if actor.id != donation.donor_id {
                return Err(LifecycleError::Forbidden("only the donor can cancel this donation"));
            }
            None
        }
    };

    Ok(Applied {
        donation_id: donation.id,
        from: donation.status,
        to: transition.target(),
        volunteer_id,
    })
}

/// The record as it reads after `applied` has been stored.
pub fn apply(mut donation: Donation, applied: &Applied) -> Donation {
    donation.status = applied.to;
    if let Some(volunteer_id) = applied.volunteer_id {
        donation.volunteer_id = Some(volunteer_id);
    }
    donation
}

/// Affordances shown on the detail page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Claim,
    MarkDelivered,
    Cancel,
    OpenChat,
}

impl From<Transition> for Action {
    fn from(t: Transition) -> Self {
        match t {
            Transition::Claim => Self::Claim,
            Transition::Deliver => Self::MarkDelivered,
            Transition::Cancel => Self::Cancel,
        }
    }
}

/// Everything `viewer` may do with `donation` right now. Derived from the
/// same guards `authorize` enforces, so the UI never offers a rejected action.
pub fn available_actions(donation: &Donation, viewer: &Viewer) -> Vec<Action> {
    let mut actions: Vec<Action> = Transition::ALL
        .into_iter()
        .filter(|t| authorize(donation, viewer, *t).is_ok())
        .map(Action::from)
        .collect();

    if channel::ensure_open(donation, viewer.id).is_ok() {
        actions.push(Action::OpenChat);
    }

    actions
}
