use serde::Serialize;

use crate::gtfs_rt::FeedEntity;

/// Per-cycle counts, updated one entity at a time as the feed streams past.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeedTally {
    pub entities: usize,
    pub deleted: usize,

    // vehicle fields
    pub vehicles: usize,
    pub with_trip: usize,
    pub with_route: usize,
    pub with_position: usize,

    pub matched: usize,
}

impl FeedTally {
    /// Records the shape of one entity. Matching is counted separately via
    /// [`FeedTally::record_match`].
    pub fn record(&mut self, entity: &FeedEntity) {
        self.entities += 1;

        if entity.is_deleted == Some(true) {
            self.deleted += 1;
        }

        if let Some(v) = &entity.vehicle {
            self.vehicles += 1;

            if let Some(trip) = &v.trip {
                self.with_trip += 1;

                if trip.route_id.is_some() {
                    self.with_route += 1;
                }
            }

            if v.position.is_some() {
                self.with_position += 1;
            }
        }
    }

    pub fn record_match(&mut self) {
        self.matched += 1;
    }
}
