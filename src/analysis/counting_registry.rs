// src/analysis/counting_registry.rs
//
// At-most-once counting. An id is counted on its first confirmed sighting,
// globally per class and in the lane it occupied at that moment. Later
// lane changes never move or repeat the count.

use crate::types::{LaneId, TrackId, VehicleClass};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SightingOutcome {
    /// The id was added to its class count.
    pub counted_globally: bool,
    /// The id was added to a (lane, class) count.
    pub counted_in_lane: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CountingRegistry {
    seen_ids: HashSet<TrackId>,
    counted_by_class: HashMap<VehicleClass, HashSet<TrackId>>,
    counted_by_lane_class: HashMap<(LaneId, VehicleClass), HashSet<TrackId>>,
}

impl CountingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent per id: an id already seen returns both flags false.
    pub fn register_first_sighting(
        &mut self,
        id: &TrackId,
        class: VehicleClass,
        lane: Option<LaneId>,
    ) -> SightingOutcome {
        if !self.seen_ids.insert(id.clone()) {
            return SightingOutcome::default();
        }

        let counted_globally = self
            .counted_by_class
            .entry(class)
            .or_default()
            .insert(id.clone());

        let counted_in_lane = match lane {
            Some(lane) => self
                .counted_by_lane_class
                .entry((lane, class))
                .or_default()
                .insert(id.clone()),
            None => false,
        };

        SightingOutcome {
            counted_globally,
            counted_in_lane,
        }
    }

    pub fn unique_vehicles(&self) -> usize {
        self.seen_ids.len()
    }

    pub fn class_count(&self, class: VehicleClass) -> usize {
        self.counted_by_class.get(&class).map_or(0, HashSet::len)
    }

    pub fn lane_count(&self, lane: LaneId, class: VehicleClass) -> usize {
        self.counted_by_lane_class
            .get(&(lane, class))
            .map_or(0, HashSet::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sighting_counts_once() {
        let mut registry = CountingRegistry::new();
        let id = TrackId::from(5);

        let first = registry.register_first_sighting(&id, VehicleClass::Car, Some(LaneId(2)));
        assert_eq!(
            first,
            SightingOutcome {
                counted_globally: true,
                counted_in_lane: true
            }
        );

        let again = registry.register_first_sighting(&id, VehicleClass::Car, Some(LaneId(3)));
        assert_eq!(again, SightingOutcome::default());

        assert_eq!(registry.class_count(VehicleClass::Car), 1);
        assert_eq!(registry.lane_count(LaneId(2), VehicleClass::Car), 1);
        assert_eq!(registry.lane_count(LaneId(3), VehicleClass::Car), 0);
    }

    #[test]
    fn test_laneless_sighting_counts_globally_only() {
        let mut registry = CountingRegistry::new();
        let id = TrackId::from(9);

        let outcome = registry.register_first_sighting(&id, VehicleClass::Truck, None);
        assert!(outcome.counted_globally);
        assert!(!outcome.counted_in_lane);
        assert_eq!(registry.unique_vehicles(), 1);

        // A later sighting with a lane does not back-fill the lane count.
        let later = registry.register_first_sighting(&id, VehicleClass::Truck, Some(LaneId(1)));
        assert_eq!(later, SightingOutcome::default());
        assert_eq!(registry.lane_count(LaneId(1), VehicleClass::Truck), 0);
    }

    #[test]
    fn test_distinct_ids_are_counted_separately() {
        let mut registry = CountingRegistry::new();
        for id in 1..=3u32 {
            registry.register_first_sighting(&TrackId::from(id), VehicleClass::Bus, Some(LaneId(1)));
        }
        registry.register_first_sighting(&TrackId::from(4), VehicleClass::Car, Some(LaneId(1)));

        assert_eq!(registry.unique_vehicles(), 4);
        assert_eq!(registry.class_count(VehicleClass::Bus), 3);
        assert_eq!(registry.class_count(VehicleClass::Car), 1);
        assert_eq!(registry.lane_count(LaneId(1), VehicleClass::Bus), 3);
    }
}
