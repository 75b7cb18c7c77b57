//! Coordination channel rules: who may post and what a message may contain.

use uuid::Uuid;

use circle_types::models::{Donation, DonationStatus, Message};

use crate::error::ChannelError;

pub const MAX_MESSAGE_LEN: usize = 2000;

pub fn is_participant(donation: &Donation, user_id: Uuid) -> bool {
    donation.donor_id == user_id || donation.volunteer_id == Some(user_id)
}

/// The channel exists once a volunteer is bound, and only for the two parties.
pub fn ensure_open(donation: &Donation, user_id: Uuid) -> Result<(), ChannelError> {
    if donation.status == DonationStatus::Available || donation.volunteer_id.is_none() {
        return Err(ChannelError::NotOpen);
    }
    if !is_participant(donation, user_id) {
        return Err(ChannelError::NotParticipant);
    }
    Ok(())
}

/// Trim and bound a message body.
pub fn validate_text(text: &str) -> Result<String, ChannelError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ChannelError::EmptyMessage);
    }
    if text.chars().count() > MAX_MESSAGE_LEN {
        return Err(ChannelError::MessageTooLong(MAX_MESSAGE_LEN));
    }
    Ok(text.to_string())
}

/// Build the message `sender_id` is appending at `now` (epoch millis).
pub fn compose(
    donation: &Donation,
    sender_id: Uuid,
    text: &str,
    now: i64,
) -> Result<Message, ChannelError> {
    ensure_open(donation, sender_id)?;
    let text = validate_text(text)?;

    Ok(Message {
        id: Uuid::new_v4(),
        donation_id: donation.id,
        sender_id,
        text,
        timestamp: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::tests::donation;

    fn claimed() -> (Donation, Uuid) {
        let volunteer = Uuid::new_v4();
        let mut d = donation(Uuid::new_v4());
        d.status = DonationStatus::PickedUp;
        d.volunteer_id = Some(volunteer);
        (d, volunteer)
    }

    #[test]
    fn whitespace_only_is_rejected() {
        assert_eq!(validate_text("   \n\t"), Err(ChannelError::EmptyMessage));
        assert_eq!(validate_text(""), Err(ChannelError::EmptyMessage));
        assert_eq!(validate_text("  see you at 5 ").unwrap(), "see you at 5");
    }

    #[test]
    fn long_message_is_rejected() {
        let text = "x".repeat(MAX_MESSAGE_LEN + 1);
        assert_eq!(validate_text(&text), Err(ChannelError::MessageTooLong(MAX_MESSAGE_LEN)));
    }

    #[test]
    fn closed_while_available() {
        let d = donation(Uuid::new_v4());
        assert_eq!(compose(&d, d.donor_id, "hi", 1), Err(ChannelError::NotOpen));
    }

    #[test]
    fn both_parties_can_post_and_nobody_else() {
        let (d, volunteer) = claimed();
        assert!(compose(&d, d.donor_id, "ready at the door", 5).is_ok());
        let msg = compose(&d, volunteer, "on my way", 6).unwrap();
        assert_eq!(msg.donation_id, d.id);
        assert_eq!(msg.timestamp, 6);

        assert_eq!(
            compose(&d, Uuid::new_v4(), "hello", 7),
            Err(ChannelError::NotParticipant)
        );
    }
}
