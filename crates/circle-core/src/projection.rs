//! Read-side projections. Each one is a pure function of the current record
//! set and the viewer, recomputed whenever a snapshot changes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use circle_types::api::DonationQuery;
use circle_types::models::{Donation, DonationStatus, DonationType, Role, StatusFilter, Viewer};

use crate::lifecycle::{self, Action};
use crate::location::{self, Coordinate, DEFAULT_COORDINATE};

fn visible(status: DonationStatus, donor_id: Uuid, volunteer_id: Option<Uuid>, viewer: &Viewer) -> bool {
    match viewer.role {
        Role::Donor => donor_id == viewer.id,
        Role::Volunteer => status == DonationStatus::Available || volunteer_id == Some(viewer.id),
    }
}

/// Donors see their own listings; volunteers see open listings and the ones they claimed.
pub fn visible_to(donation: &Donation, viewer: &Viewer) -> bool {
    visible(donation.status, donation.donor_id, donation.volunteer_id, viewer)
}

/// Whether a change moving `donation` out of `previous_status` must reach
/// `viewer`: true if the record is visible now or was visible before, so that
/// records leaving a dashboard are pushed too.
pub fn affects_viewer(
    donation: &Donation,
    previous_status: Option<DonationStatus>,
    viewer: &Viewer,
) -> bool {
    if visible_to(donation, viewer) {
        return true;
    }
    previous_status.is_some_and(|prev| {
        // The volunteer is bound by the claim, so it was unset while available.
        let prev_volunteer = match prev {
            DonationStatus::Available => None,
            _ => donation.volunteer_id,
        };
        visible(prev, donation.donor_id, prev_volunteer, viewer)
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardFilter {
    pub status: StatusFilter,
    /// Lower-cased needle; empty matches everything.
    search: String,
}

impl DashboardFilter {
    pub fn new(status: StatusFilter, search: &str) -> Self {
        Self {
            status,
            search: search.trim().to_lowercase(),
        }
    }

    pub fn matches(&self, donation: &Donation) -> bool {
        self.status.matches(donation.status)
            && (self.search.is_empty()
                || donation.title.to_lowercase().contains(&self.search)
                || donation.location.to_lowercase().contains(&self.search))
    }
}

impl From<&DonationQuery> for DashboardFilter {
    fn from(q: &DonationQuery) -> Self {
        Self::new(q.status, q.search.as_deref().unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub available: usize,
    pub picked_up: usize,
    pub delivered: usize,
    pub cancelled: usize,
}

impl StatusCounts {
    fn add(&mut self, status: DonationStatus) {
        match status {
            DonationStatus::Available => self.available += 1,
            DonationStatus::PickedUp => self.picked_up += 1,
            DonationStatus::Delivered => self.delivered += 1,
            DonationStatus::Cancelled => self.cancelled += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    /// Newest first.
    pub donations: Vec<Donation>,
    /// Counts over everything the viewer can see, before filtering.
    pub counts: StatusCounts,
}

/// The dashboard list for `viewer`.
pub fn project<I>(records: I, filter: &DashboardFilter, viewer: &Viewer) -> DashboardView
where
    I: IntoIterator<Item = Donation>,
{
    let mut counts = StatusCounts::default();
    let mut donations: Vec<Donation> = records
        .into_iter()
        .filter(|d| visible_to(d, viewer))
        .inspect(|d| counts.add(d.status))
        .filter(|d| filter.matches(d))
        .collect();

    donations.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

    DashboardView { donations, counts }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapPin {
    pub donation_id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: DonationType,
    pub status: DonationStatus,
    pub coordinate: Coordinate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub center: Coordinate,
    pub pins: Vec<MapPin>,
}

/// One pin per listed record, in list order. Records without parseable
/// coordinates are pinned at the default rather than dropped.
pub fn map_view(donations: &[Donation]) -> MapView {
    let pins: Vec<MapPin> = donations
        .iter()
        .map(|d| MapPin {
            donation_id: d.id,
            title: d.title.clone(),
            kind: d.kind,
            status: d.status,
            coordinate: location::coordinate_or_default(&d.location),
        })
        .collect();

    let center = pins.first().map_or(DEFAULT_COORDINATE, |p| p.coordinate);
    MapView { center, pins }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailView {
    pub donation: Donation,
    pub actions: Vec<Action>,
    pub coordinate: Coordinate,
}

pub fn detail(donation: Donation, viewer: &Viewer) -> DetailView {
    let actions = lifecycle::available_actions(&donation, viewer);
    let coordinate = location::coordinate_or_default(&donation.location);
    DetailView {
        donation,
        actions,
        coordinate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::tests::donation;
    use crate::lifecycle::{Transition, apply, authorize};

    fn viewer(role: Role) -> Viewer {
        Viewer { id: Uuid::new_v4(), role }
    }

    fn listed(donor: Uuid, title: &str, location: &str, created_at: i64) -> Donation {
        let mut d = donation(donor);
        d.title = title.into();
        d.location = location.into();
        d.created_at = created_at;
        d
    }

    fn step(d: Donation, actor: &Viewer, t: Transition) -> Donation {
        let applied = authorize(&d, actor, t).unwrap();
        apply(d, &applied)
    }

    #[test]
    fn donor_sees_only_own_records() {
        let me = viewer(Role::Donor);
        let other = viewer(Role::Donor);
        let records = vec![
            listed(me.id, "Rice", "Depot", 1),
            listed(other.id, "Beans", "Depot", 2),
        ];

        let view = project(records, &DashboardFilter::default(), &me);
        assert_eq!(view.donations.len(), 1);
        assert_eq!(view.donations[0].title, "Rice");
    }

    #[test]
    fn volunteer_sees_available_and_own_claims() {
        let donor = viewer(Role::Donor);
        let me = viewer(Role::Volunteer);
        let rival = viewer(Role::Volunteer);

        let open = listed(donor.id, "Open", "A", 1);
        let mine = step(listed(donor.id, "Mine", "B", 2), &me, Transition::Claim);
        let theirs = step(listed(donor.id, "Theirs", "C", 3), &rival, Transition::Claim);
        let cancelled = step(listed(donor.id, "Gone", "D", 4), &donor, Transition::Cancel);

        let view = project(vec![open, mine, theirs, cancelled], &DashboardFilter::default(), &me);
        let titles: Vec<&str> = view.donations.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["Mine", "Open"]);
        assert_eq!(view.counts.available, 1);
        assert_eq!(view.counts.picked_up, 1);
        assert_eq!(view.counts.cancelled, 0);
    }

    #[test]
    fn volunteer_never_sees_cancelled() {
        let donor = viewer(Role::Donor);
        let volunteers = [viewer(Role::Volunteer), viewer(Role::Volunteer)];

        // Every record reachable through the controller, with every volunteer as claimer.
        let mut records = Vec::new();
        for (i, v) in volunteers.iter().enumerate() {
            let base = i as i64 * 10;
            records.push(listed(donor.id, "a", "x", base));
            records.push(step(listed(donor.id, "b", "x", base + 1), &donor, Transition::Cancel));
            let claimed = step(listed(donor.id, "c", "x", base + 2), v, Transition::Claim);
            records.push(claimed.clone());
            records.push(step(claimed, v, Transition::Deliver));
        }

        for v in &volunteers {
            let all = project(records.clone(), &DashboardFilter::default(), v);
            assert!(all.donations.iter().all(|d| d.status != DonationStatus::Cancelled));

            let only_cancelled = DashboardFilter::new(StatusFilter::Cancelled, "");
            assert!(project(records.clone(), &only_cancelled, v).donations.is_empty());
        }
    }

    #[test]
    fn ordered_newest_first() {
        let me = viewer(Role::Donor);
        let records = vec![
            listed(me.id, "old", "x", 100),
            listed(me.id, "new", "x", 300),
            listed(me.id, "mid", "x", 200),
        ];
        let view = project(records, &DashboardFilter::default(), &me);
        let stamps: Vec<i64> = view.donations.iter().map(|d| d.created_at).collect();
        assert_eq!(stamps, vec![300, 200, 100]);
    }

    #[test]
    fn search_matches_title_or_location_case_insensitively() {
        let me = viewer(Role::Donor);
        let records = vec![
            listed(me.id, "Fresh Bread", "Baker St", 1),
            listed(me.id, "Coats", "BREAD FACTORY", 2),
            listed(me.id, "Shoes", "Market", 3),
        ];

        let view = project(records, &DashboardFilter::new(StatusFilter::All, "  bread "), &me);
        let titles: Vec<&str> = view.donations.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["Coats", "Fresh Bread"]);
        assert_eq!(view.counts.available, 3);
    }

    #[test]
    fn status_and_search_are_conjunctive() {
        let donor = viewer(Role::Donor);
        let vol = viewer(Role::Volunteer);
        let picked = step(listed(donor.id, "Soup", "Hall", 1), &vol, Transition::Claim);
        let records = vec![picked, listed(donor.id, "Soup cans", "Hall", 2)];

        let filter = DashboardFilter::new(StatusFilter::PickedUp, "soup");
        let view = project(records, &filter, &donor);
        assert_eq!(view.donations.len(), 1);
        assert_eq!(view.donations[0].status, DonationStatus::PickedUp);
    }

    #[test]
    fn claim_is_pushed_to_other_volunteers() {
        let donor = viewer(Role::Donor);
        let claimer = viewer(Role::Volunteer);
        let rival = viewer(Role::Volunteer);
        let claimed = step(listed(donor.id, "t", "l", 1), &claimer, Transition::Claim);

        assert!(!visible_to(&claimed, &rival));
        assert!(affects_viewer(&claimed, Some(DonationStatus::Available), &rival));
        assert!(!affects_viewer(&claimed, Some(DonationStatus::PickedUp), &rival));
        assert!(affects_viewer(&claimed, None, &claimer));
        assert!(!affects_viewer(&claimed, None, &viewer(Role::Donor)));
    }

    #[test]
    fn map_centers_on_first_listed_record() {
        let me = viewer(Role::Donor);
        let records = vec![
            listed(me.id, "older", "40.712800, -74.006000", 1),
            listed(me.id, "newer", "123 Main St", 2),
        ];
        let view = project(records, &DashboardFilter::default(), &me);
        let map = map_view(&view.donations);

        assert_eq!(map.pins.len(), 2);
        assert_eq!(map.center, DEFAULT_COORDINATE);
        assert_eq!(map.pins[1].coordinate, Coordinate { latitude: 40.7128, longitude: -74.006 });

        let filtered = project(
            view.donations.clone(),
            &DashboardFilter::new(StatusFilter::All, "older"),
            &me,
        );
        assert_eq!(map_view(&filtered.donations).center.latitude, 40.7128);
    }

    #[test]
    fn empty_map_uses_default_center() {
        assert_eq!(map_view(&[]).center, DEFAULT_COORDINATE);
    }

    #[test]
    fn detail_carries_actions() {
        let donor = viewer(Role::Donor);
        let view = detail(listed(donor.id, "t", "1.5, 2.5", 1), &donor);
        assert_eq!(view.actions, vec![Action::Cancel]);
        assert_eq!(view.coordinate, Coordinate { latitude: 1.5, longitude: 2.5 });
    }
}
