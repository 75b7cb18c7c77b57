use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Returned when a stored or submitted enum value is not one we know about.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Wire and storage names for simple enums. Both use the same spelling so a
/// value read back from SQLite parses exactly like one from JSON.
macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant { kind: $kind, value: other.to_string() }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Donor,
    Volunteer,
}

string_enum!(Role, "role", { Donor => "DONOR", Volunteer => "VOLUNTEER" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DonationType {
    Food,
    Clothes,
}

string_enum!(DonationType, "donation type", { Food => "FOOD", Clothes => "CLOTHES" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DonationStatus {
    Available,
    PickedUp,
    Delivered,
    Cancelled,
}

string_enum!(DonationStatus, "donation status", {
    Available => "AVAILABLE",
    PickedUp => "PICKED_UP",
    Delivered => "DELIVERED",
    Cancelled => "CANCELLED",
});

impl DonationStatus {
    pub const ALL: [DonationStatus; 4] = [
        Self::Available,
        Self::PickedUp,
        Self::Delivered,
        Self::Cancelled,
    ];
}

/// Dashboard status filter: everything, or exactly one status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusFilter {
    #[default]
    All,
    Available,
    PickedUp,
    Delivered,
    Cancelled,
}

impl StatusFilter {
    pub fn matches(self, status: DonationStatus) -> bool {
        match self {
            Self::All => true,
            Self::Available => status == DonationStatus::Available,
            Self::PickedUp => status == DonationStatus::PickedUp,
            Self::Delivered => status == DonationStatus::Delivered,
            Self::Cancelled => status == DonationStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub avatar_url: String,
}

impl User {
    pub fn viewer(&self) -> Viewer {
        Viewer {
            id: self.id,
            role: self.role,
        }
    }
}

/// Who is looking at a projection or issuing a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewer {
    pub id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    pub id: Uuid,
    pub donor_id: Uuid,
    pub donor_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volunteer_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: DonationType,
    pub status: DonationStatus,
    pub location: String,
    pub image_url: String,
    /// Epoch milliseconds.
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub donation_id: Uuid,
    pub sender_id: Uuid,
    pub text: String,
    /// Epoch milliseconds, taken from the server clock on append.
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

string_enum!(Theme, "theme", { Light => "light", Dark => "dark" });

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitialView {
    #[default]
    Grid,
    Map,
}

string_enum!(InitialView, "view", { Grid => "grid", Map => "map" });

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub theme: Theme,
    pub initial_view: InitialView,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names_match_wire_format() {
        for status in DonationStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<DonationStatus>().unwrap(), status);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = "ADMIN".parse::<Role>().unwrap_err();
        assert_eq!(err.to_string(), "unknown role 'ADMIN'");
    }

    #[test]
    fn status_filter_all_matches_everything() {
        assert!(DonationStatus::ALL.iter().all(|s| StatusFilter::All.matches(*s)));
        assert!(StatusFilter::PickedUp.matches(DonationStatus::PickedUp));
        assert!(!StatusFilter::PickedUp.matches(DonationStatus::Delivered));
    }

    #[test]
    fn donation_uses_type_key_and_omits_missing_volunteer() {
        let donation = Donation {
            id: Uuid::nil(),
            donor_id: Uuid::nil(),
            donor_name: "Ada".into(),
            volunteer_id: None,
            title: "Bread".into(),
            description: String::new(),
            kind: DonationType::Food,
            status: DonationStatus::Available,
            location: "Town hall".into(),
            image_url: String::new(),
            created_at: 1,
        };
        let value = serde_json::to_value(&donation).unwrap();
        assert_eq!(value["type"], "FOOD");
        assert_eq!(value["donorName"], "Ada");
        assert!(value.get("volunteerId").is_none());
    }
}
