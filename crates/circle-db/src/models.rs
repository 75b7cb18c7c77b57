//! Database row types. These map directly to SQLite rows.
//! Conversion into circle-types models happens here so a corrupt row fails
//! loudly at the storage boundary.

use anyhow::{Context, Result};
use uuid::Uuid;

use circle_types::models::{Donation, Message, Preferences, User};

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub avatar_url: String,
}

impl UserRow {
    pub fn into_user(self) -> Result<User> {
        Ok(User {
            id: parse_id(&self.id, "user id")?,
            role: self.role.parse()?,
            name: self.name,
            email: self.email,
            avatar_url: self.avatar_url,
        })
    }
}

pub struct DonationRow {
    pub id: String,
    pub donor_id: String,
    pub donor_name: String,
    pub volunteer_id: Option<String>,
    pub title: String,
    pub description: String,
    pub kind: String,
    pub status: String,
    pub location: String,
    pub image_url: String,
    pub created_at: i64,
}

impl DonationRow {
    pub fn into_donation(self) -> Result<Donation> {
        let volunteer_id = self
            .volunteer_id
            .as_deref()
            .map(|v| parse_id(v, "volunteer id"))
            .transpose()?;

        Ok(Donation {
            id: parse_id(&self.id, "donation id")?,
            donor_id: parse_id(&self.donor_id, "donor id")?,
            donor_name: self.donor_name,
            volunteer_id,
            title: self.title,
            description: self.description,
            kind: self.kind.parse()?,
            status: self.status.parse()?,
            location: self.location,
            image_url: self.image_url,
            created_at: self.created_at,
        })
    }
}

pub struct MessageRow {
    pub id: String,
    pub donation_id: String,
    pub sender_id: String,
    pub text: String,
    pub timestamp: i64,
}

impl MessageRow {
    pub fn into_message(self) -> Result<Message> {
        Ok(Message {
            id: parse_id(&self.id, "message id")?,
            donation_id: parse_id(&self.donation_id, "donation id")?,
            sender_id: parse_id(&self.sender_id, "sender id")?,
            text: self.text,
            timestamp: self.timestamp,
        })
    }
}

pub struct PreferencesRow {
    pub theme: String,
    pub initial_view: String,
}

impl PreferencesRow {
    pub fn into_preferences(self) -> Result<Preferences> {
        Ok(Preferences {
            theme: self.theme.parse()?,
            initial_view: self.initial_view.parse()?,
        })
    }
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    raw.parse().with_context(|| format!("corrupt {} '{}'", what, raw))
}
