//! Per-entity route matching.

use serde::Serialize;

use crate::gtfs_rt::FeedEntity;
use crate::stats::FeedTally;

/// Consumes decoded entities one at a time.
///
/// The decoder hands each entity over by value and never keeps it, so an
/// implementation that wants to retain data must copy out what it needs.
pub trait EntityVisitor {
    fn visit(&mut self, entity: FeedEntity);
}

impl<F: FnMut(FeedEntity)> EntityVisitor for F {
    fn visit(&mut self, entity: FeedEntity) {
        self(entity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub latitude: f32,
    pub longitude: f32,
}

/// Display fields of a vehicle found on the target route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleMatch {
    pub entity_id: String,
    pub vehicle_id: Option<String>,
    pub position: Option<Coordinates>,
}

/// Counts vehicle positions whose trip runs on one route.
///
/// The filter owns its counter; build a new one per decode so every cycle
/// starts from zero.
pub struct RouteFilter<'a, F> {
    route_id: &'a str,
    tally: FeedTally,
    on_match: F,
}

impl<'a, F: FnMut(VehicleMatch)> RouteFilter<'a, F> {
    pub fn new(route_id: &'a str, on_match: F) -> Self {
        Self {
            route_id,
            tally: FeedTally::default(),
            on_match,
        }
    }

    /// Entities seen so far whose route equals the target.
    pub fn matched(&self) -> usize {
        self.tally.matched
    }

    pub fn tally(&self) -> &FeedTally {
        &self.tally
    }

    /// Matches `entity` against the target route, returning display fields
    /// on a match.
    pub fn check(&self, entity: &FeedEntity) -> Option<VehicleMatch> {
        let vehicle = entity.vehicle.as_ref()?;
        let route_id = vehicle.trip.as_ref()?.route_id.as_deref()?;
        if route_id.as_bytes() != self.route_id.as_bytes() {
            return None;
        }

        Some(VehicleMatch {
            entity_id: entity.id.clone(),
            vehicle_id: vehicle.vehicle.as_ref().and_then(|d| d.id.clone()),
            position: vehicle.position.as_ref().map(|p| Coordinates {
                latitude: p.latitude,
                longitude: p.longitude,
            }),
        })
    }
}

impl<F: FnMut(VehicleMatch)> EntityVisitor for RouteFilter<'_, F> {
    fn visit(&mut self, entity: FeedEntity) {
        self.tally.record(&entity);

        if let Some(found) = self.check(&entity) {
            self.tally.record_match();
            (self.on_match)(found);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs_rt::{Position, TripDescriptor, VehicleDescriptor, VehiclePosition};

    fn vehicle_entity(id: &str, route_id: Option<&str>) -> FeedEntity {
        FeedEntity {
            id: id.to_string(),
            vehicle: Some(VehiclePosition {
                trip: Some(TripDescriptor {
                    route_id: route_id.map(str::to_string),
                    ..Default::default()
                }),
                vehicle: Some(VehicleDescriptor {
                    id: Some(format!("bus-{id}")),
                    ..Default::default()
                }),
                position: Some(Position {
                    latitude: 49.25,
                    longitude: -123.1,
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_matching_route_emits_record() {
        let mut found = Vec::new();
        let mut filter = RouteFilter::new("25", |m| found.push(m));
        filter.visit(vehicle_entity("1", Some("25")));
        let matched = filter.matched();

        assert_eq!(matched, 1);
        assert_eq!(
            found,
            vec![VehicleMatch {
                entity_id: "1".to_string(),
                vehicle_id: Some("bus-1".to_string()),
                position: Some(Coordinates {
                    latitude: 49.25,
                    longitude: -123.1,
                }),
            }]
        );
    }

    #[test]
    fn test_other_route_is_ignored() {
        let mut found = Vec::new();
        let mut filter = RouteFilter::new("25", |m| found.push(m));
        filter.visit(vehicle_entity("1", Some("99")));
        filter.visit(vehicle_entity("2", Some("250")));
        filter.visit(vehicle_entity("3", Some("2")));

        assert_eq!(filter.matched(), 0);
        assert_eq!(filter.tally().vehicles, 3);
        assert!(found.is_empty());
    }

    #[test]
    fn test_missing_route_or_vehicle_is_ignored() {
        let mut filter = RouteFilter::new("25", |_| panic!("unexpected match"));
        filter.visit(vehicle_entity("1", None));
        filter.visit(FeedEntity {
            id: "2".to_string(),
            vehicle: Some(VehiclePosition::default()),
            ..Default::default()
        });
        filter.visit(FeedEntity {
            id: "3".to_string(),
            ..Default::default()
        });

        assert_eq!(filter.matched(), 0);
        assert_eq!(filter.tally().entities, 3);
    }

    #[test]
    fn test_match_is_exact_and_case_sensitive() {
        let filter = RouteFilter::new("R1", |_| {});
        assert!(filter.check(&vehicle_entity("1", Some("R1"))).is_some());
        assert!(filter.check(&vehicle_entity("2", Some("r1"))).is_none());
        assert!(filter.check(&vehicle_entity("3", Some("R1 "))).is_none());
    }

    #[test]
    fn test_match_without_descriptor_or_position() {
        let filter = RouteFilter::new("25", |_| {});
        let entity = FeedEntity {
            id: "e".to_string(),
            vehicle: Some(VehiclePosition {
                trip: Some(TripDescriptor {
                    route_id: Some("25".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        let found = filter.check(&entity).unwrap();
        assert_eq!(found.vehicle_id, None);
        assert_eq!(found.position, None);
    }

    #[test]
    fn test_closure_visitor() {
        let mut ids = Vec::new();
        let mut visitor = |e: FeedEntity| ids.push(e.id);
        visitor.visit(vehicle_entity("a", None));
        visitor.visit(vehicle_entity("b", None));

        assert_eq!(ids, vec!["a", "b"]);
    }
}
