use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Donation, DonationStatus, Message, User};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user: User },

    /// A donation was created or changed state. `previous_status` is `None`
    /// for a fresh record.
    DonationUpsert {
        donation: Donation,
        previous_status: Option<DonationStatus>,
    },

    /// A message was appended to a donation's coordination channel
    MessageCreate {
        message: Message,
        donor_id: Uuid,
        volunteer_id: Option<Uuid>,
    },

    /// The session behind this connection was logged out
    SessionEnded,
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Replace the set of donations whose chat this client is showing.
    Watch { donation_ids: Vec<Uuid> },
}
