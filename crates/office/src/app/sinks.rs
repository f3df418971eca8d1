use office_engine::{BubbleRemoval, TickReport, Zone, ZoneTransition};
use tracing::info;

use super::records::{DistrictAttributes, OfficeWorld};

pub(crate) type ZoneEventSink =
    Box<dyn FnMut(&ZoneTransition, Option<&Zone<DistrictAttributes>>)>;
pub(crate) type OverlayEventSink = Box<dyn FnMut(&BubbleRemoval)>;

/// Fans tick notifications out to registered subscribers. Zone subscribers
/// also receive the district the avatar entered, if any.
#[derive(Default)]
pub(crate) struct EventRouter {
    zone_sinks: Vec<ZoneEventSink>,
    overlay_sinks: Vec<OverlayEventSink>,
}

impl EventRouter {
    pub(crate) fn with_logging() -> Self {
        let mut router = Self::default();
        router.on_zone_transition(Box::new(
            |transition: &ZoneTransition, district: Option<&Zone<DistrictAttributes>>| match district {
                Some(zone) => info!(
                    avatar = %transition.avatar,
                    district = %zone.name,
                    code = %zone.code,
                    kind = %zone.attributes.kind,
                    price_multiplier = zone.attributes.price_multiplier,
                    tax_multiplier = zone.attributes.tax_multiplier,
                    "district_entered"
                ),
                None => info!(avatar = %transition.avatar, "district_left"),
            },
        ));
        router.on_overlay_expired(Box::new(|removal: &BubbleRemoval| {
            info!(owner = %removal.item.owner, "bubble_expired");
        }));
        router
    }

    pub(crate) fn on_zone_transition(&mut self, sink: ZoneEventSink) {
        self.zone_sinks.push(sink);
    }

    pub(crate) fn on_overlay_expired(&mut self, sink: OverlayEventSink) {
        self.overlay_sinks.push(sink);
    }

    pub(crate) fn dispatch(&mut self, report: &TickReport, world: &OfficeWorld) {
        for transition in &report.zone_transitions {
            let district = transition
                .current
                .as_ref()
                .and_then(|id| world.zones().get(id));
            for sink in &mut self.zone_sinks {
                sink(transition, district);
            }
        }
        for removal in &report.expired_overlays {
            for sink in &mut self.overlay_sinks {
                sink(removal);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use office_engine::{AvatarId, CellCoord, GridModel, WorldConfig, ZoneBounds, ZoneId};

    use super::*;

    fn district_world() -> OfficeWorld {
        let grid = GridModel::new(10, 4, 8.0).expect("grid");
        let mut world = OfficeWorld::new(WorldConfig::default(), grid).expect("world");
        world.load_zones([Zone {
            id: ZoneId::new("market"),
            name: "Market".into(),
            code: "MK".into(),
            bounds: ZoneBounds::new(0.0, 0.0, 5.0, 4.0),
            attributes: DistrictAttributes {
                kind: "commercial".into(),
                color: None,
                price_multiplier: 1.2,
                tax_multiplier: 0.9,
            },
        }]);
        world
    }

    #[test]
    fn subscribers_receive_transitions_with_district() {
        let mut world = district_world();
        let ada = AvatarId::new("ada");
        world.add_avatar_at_cell(ada.clone(), CellCoord::new(1, 1), None);
        world.track_zones(&ada);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut router = EventRouter::with_logging();
        let sink_seen = Rc::clone(&seen);
        router.on_zone_transition(Box::new(
            move |transition: &ZoneTransition, district: Option<&Zone<DistrictAttributes>>| {
                sink_seen.borrow_mut().push((
                    transition.current.clone(),
                    district.map(|zone| zone.attributes.kind.clone()),
                ));
            },
        ));

        let report = world.tick(0.1);
        router.dispatch(&report, &world);
        assert_eq!(
            *seen.borrow(),
            vec![(Some(ZoneId::new("market")), Some("commercial".to_string()))]
        );
    }

    #[test]
    fn subscribers_receive_overlay_expiry() {
        let mut world = district_world();
        let ada = AvatarId::new("ada");
        world.add_avatar_at_cell(ada.clone(), CellCoord::new(1, 1), None);
        world.show_bubble_for(&ada, "lunch?", 0.1);

        let expired = Rc::new(RefCell::new(Vec::new()));
        let mut router = EventRouter::default();
        let sink_expired = Rc::clone(&expired);
        router.on_overlay_expired(Box::new(move |removal: &BubbleRemoval| {
            sink_expired.borrow_mut().push(removal.item.owner.clone());
        }));

        let report = world.tick(0.2);
        router.dispatch(&report, &world);
        assert_eq!(*expired.borrow(), vec![ada]);
    }
}
