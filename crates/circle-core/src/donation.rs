use uuid::Uuid;

use circle_types::api::CreateDonationRequest;
use circle_types::models::{Donation, DonationStatus, User};

use crate::error::ValidationError;

pub const MAX_TITLE_LEN: usize = 120;
pub const MAX_DESCRIPTION_LEN: usize = 2000;
/// Images travel inline as data URLs, so this is generous.
pub const MAX_IMAGE_URL_LEN: usize = 2 * 1024 * 1024;

/// Build a fresh AVAILABLE record listed by `donor` at `now` (epoch millis).
/// The donor's name is copied from the account, never from the request.
pub fn new_donation(
    req: CreateDonationRequest,
    donor: &User,
    now: i64,
) -> Result<Donation, ValidationError> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(ValidationError::new("title is required"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ValidationError::new(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }

    let description = req.description.trim();
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::new(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }

    let location = req.location.trim();
    if location.is_empty() {
        return Err(ValidationError::new("location is required"));
    }

    let image_url = req.image_url.unwrap_or_default();
    if image_url.len() > MAX_IMAGE_URL_LEN {
        return Err(ValidationError::new("image is too large"));
    }

    Ok(Donation {
        id: Uuid::new_v4(),
        donor_id: donor.id,
        donor_name: donor.name.clone(),
        volunteer_id: None,
        title: title.to_string(),
        description: description.to_string(),
        kind: req.kind,
        status: DonationStatus::Available,
        location: location.to_string(),
        image_url,
        created_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use circle_types::models::{DonationType, Role};

    fn donor() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Priya".into(),
            email: "priya@example.com".into(),
            role: Role::Donor,
            avatar_url: String::new(),
        }
    }

    fn request(title: &str, location: &str) -> CreateDonationRequest {
        CreateDonationRequest {
            title: title.into(),
            description: "  two loaves  ".into(),
            kind: DonationType::Food,
            location: location.into(),
            image_url: None,
        }
    }

    #[test]
    fn new_record_is_available_and_unclaimed() {
        let donor = donor();
        let d = new_donation(request(" Bread ", "Depot"), &donor, 42).unwrap();
        assert_eq!(d.status, DonationStatus::Available);
        assert_eq!(d.volunteer_id, None);
        assert_eq!(d.donor_id, donor.id);
        assert_eq!(d.donor_name, "Priya");
        assert_eq!(d.title, "Bread");
        assert_eq!(d.description, "two loaves");
        assert_eq!(d.created_at, 42);
    }

    #[test]
    fn blank_fields_are_rejected() {
        let donor = donor();
        assert_eq!(
            new_donation(request("   ", "Depot"), &donor, 0).unwrap_err().to_string(),
            "title is required"
        );
        assert_eq!(
            new_donation(request("Bread", ""), &donor, 0).unwrap_err().to_string(),
            "location is required"
        );
    }

    #[test]
    fn overlong_title_is_rejected() {
        let title = "a".repeat(MAX_TITLE_LEN + 1);
        assert!(new_donation(request(&title, "Depot"), &donor(), 0).is_err());
    }
}
