//! Prompt text for the suggestion collaborator.

use circle_types::models::{Donation, DonationType, Message};

/// How much of a thread goes into a reply prompt.
const REPLY_CONTEXT_MESSAGES: usize = 10;

fn kind_label(kind: DonationType) -> &'static str {
    match kind {
        DonationType::Food => "food",
        DonationType::Clothes => "clothes",
    }
}

pub fn description_prompt(title: &str, kind: DonationType) -> String {
    format!(
        "Write a warm, concise, and helpful description for a donation item.\n\
         Title: {}\n\
         Type: {}\n\
         Keep it under 60 words and emphasize the positive impact.",
        title.trim(),
        kind_label(kind),
    )
}

/// Ask for a draft reply on behalf of `author_is_donor`'s side of the thread.
/// `messages` must already be in timestamp order.
pub fn reply_prompt(donation: &Donation, messages: &[Message], author_is_donor: bool) -> String {
    let me = if author_is_donor { "the donor" } else { "the volunteer" };
    let start = messages.len().saturating_sub(REPLY_CONTEXT_MESSAGES);

    let mut prompt = format!(
        "You help a donor and a volunteer arrange the pickup and delivery of a donated item.\n\
         Item: {} ({})\n\
         Pickup location: {}\n\
         Suggest one short, friendly message that {} could send next. Reply with the message text only.\n\
         Conversation so far:\n",
        donation.title,
        kind_label(donation.kind),
        donation.location,
        me,
    );

    if messages.is_empty() {
        prompt.push_str("(no messages yet)\n");
    }
    for m in &messages[start..] {
        let who = if m.sender_id == donation.donor_id { "Donor" } else { "Volunteer" };
        prompt.push_str(&format!("{}: {}\n", who, m.text));
    }

    prompt
}
