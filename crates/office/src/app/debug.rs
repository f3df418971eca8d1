use office_engine::{AvatarId, DebugFacade};
use tracing::info;

use super::records::{DistrictAttributes, OfficeWorld};

/// Debug hooks for the office: per-district occupancy and parcel totals.
#[derive(Debug, Clone, Default)]
pub(crate) struct OfficeDebug {
    parcel_count: usize,
}

impl OfficeDebug {
    pub(crate) fn new(parcel_count: usize) -> Self {
        Self { parcel_count }
    }
}

impl DebugFacade<DistrictAttributes> for OfficeDebug {
    fn force_visible(&mut self, world: &mut OfficeWorld, avatar: &AvatarId, on: bool) -> bool {
        let applied = world.set_force_visible(avatar, on);
        info!(avatar = %avatar, on, applied, "force_visible");
        applied
    }

    fn extra_lines(&self, world: &OfficeWorld) -> Option<Vec<String>> {
        let mut lines: Vec<String> = world
            .zones()
            .zones()
            .iter()
            .map(|zone| {
                let occupants = world
                    .movement()
                    .avatars()
                    .filter(|avatar| {
                        world
                            .avatar_zone(avatar.id())
                            .is_some_and(|current| current.id == zone.id)
                    })
                    .count();
                format!("{} [{}]: {occupants}", zone.name, zone.code)
            })
            .collect();
        lines.push(format!("parcels: {}", self.parcel_count));
        Some(lines)
    }
}

#[cfg(test)]
mod tests {
    use office_engine::{CellCoord, GridModel, WorldConfig, Zone, ZoneBounds, ZoneId};

    use super::*;

    fn district(id: &str, x1: f32, x2: f32) -> Zone<DistrictAttributes> {
        Zone {
            id: ZoneId::new(id),
            name: id.to_uppercase(),
            code: id[..1].to_uppercase(),
            bounds: ZoneBounds::new(x1, 0.0, x2, 4.0),
            attributes: DistrictAttributes {
                kind: "general".into(),
                color: None,
                price_multiplier: 1.0,
                tax_multiplier: 1.0,
            },
        }
    }

    #[test]
    fn extra_lines_count_occupants_per_district() {
        let grid = GridModel::new(8, 4, 16.0).expect("grid");
        let mut world = OfficeWorld::new(WorldConfig::default(), grid).expect("world");
        world.load_zones([district("west", 0.0, 4.0), district("east", 4.0, 8.0)]);
        world.add_avatar_at_cell(AvatarId::new("ada"), CellCoord::new(1, 1), None);
        world.add_avatar_at_cell(AvatarId::new("bo"), CellCoord::new(2, 2), None);
        world.add_avatar_at_cell(AvatarId::new("cy"), CellCoord::new(6, 0), None);

        let debug = OfficeDebug::new(12);
        let info = debug.debug_info(&world);
        assert_eq!(info.avatar_count, 3);
        assert_eq!(
            info.extra_debug_lines,
            Some(vec![
                "WEST [W]: 2".to_string(),
                "EAST [E]: 1".to_string(),
                "parcels: 12".to_string(),
            ])
        );
    }

    #[test]
    fn force_visible_rejects_unknown_avatar() {
        let grid = GridModel::new(2, 2, 16.0).expect("grid");
        let mut world = OfficeWorld::new(WorldConfig::default(), grid).expect("world");
        let mut debug = OfficeDebug::default();
        assert!(!debug.force_visible(&mut world, &AvatarId::new("ghost"), true));
    }
}
