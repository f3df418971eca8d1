use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use super::tracking::{ZoneTracker, ZoneTransition};
use crate::ids::{AvatarId, ZoneId};

/// Rectangle in grid coordinates, `x1 <= x < x2` and `y1 <= y < y2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneBounds {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl ZoneBounds {
    pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        self.x1 <= x && x < self.x2 && self.y1 <= y && y < self.y2
    }

    pub fn validate(&self) -> Result<(), ZoneRejection> {
        let corners = [self.x1, self.y1, self.x2, self.y2];
        if corners.iter().any(|value| !value.is_finite()) {
            return Err(ZoneRejection::NonFinite);
        }
        if corners.iter().any(|value| *value < 0.0) {
            return Err(ZoneRejection::Negative);
        }
        if self.x1 >= self.x2 || self.y1 >= self.y2 {
            return Err(ZoneRejection::Inverted);
        }
        Ok(())
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

/// A named district. `attributes` belongs to whoever supplied the zone and
/// is carried through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone<A = ()> {
    pub id: ZoneId,
    pub name: String,
    pub code: String,
    pub bounds: ZoneBounds,
    pub attributes: A,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ZoneRejection {
    #[error("bounds contain a non-finite corner")]
    NonFinite,
    #[error("bounds contain a negative corner")]
    Negative,
    #[error("bounds require x1 < x2 and y1 < y2")]
    Inverted,
    #[error("zone id already loaded")]
    DuplicateId,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneLoadReport {
    pub loaded: usize,
    pub rejected: Vec<(ZoneId, ZoneRejection)>,
}

/// Active zone set plus per-avatar tracking. The set is shared as
/// `Arc<[Zone]>` and replaced wholesale on load, so a snapshot taken before a
/// load keeps seeing the old set.
#[derive(Debug, Clone)]
pub struct ZoneIndex<A = ()> {
    zones: Arc<[Zone<A>]>,
    tracker: ZoneTracker,
}

impl<A> Default for ZoneIndex<A> {
    fn default() -> Self {
        Self {
            zones: Arc::from(Vec::new()),
            tracker: ZoneTracker::default(),
        }
    }
}

impl<A> ZoneIndex<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, zones: impl IntoIterator<Item = Zone<A>>) -> ZoneLoadReport {
        let mut seen = BTreeSet::new();
        let mut accepted = Vec::new();
        let mut report = ZoneLoadReport::default();

        for zone in zones {
            let verdict = zone.bounds.validate().and_then(|()| {
                if seen.contains(&zone.id) {
                    Err(ZoneRejection::DuplicateId)
                } else {
                    Ok(())
                }
            });
            match verdict {
                Ok(()) => {
                    seen.insert(zone.id.clone());
                    accepted.push(zone);
                }
                Err(reason) => {
                    warn!(zone = %zone.id, reason = %reason, "zone_rejected");
                    report.rejected.push((zone.id, reason));
                }
            }
        }

        report.loaded = accepted.len();
        self.zones = Arc::from(accepted);
        info!(
            loaded = report.loaded,
            rejected = report.rejected.len(),
            "zones_loaded"
        );
        report
    }

    pub fn zones(&self) -> &[Zone<A>] {
        &self.zones
    }

    pub fn snapshot(&self) -> Arc<[Zone<A>]> {
        Arc::clone(&self.zones)
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn get(&self, id: &ZoneId) -> Option<&Zone<A>> {
        self.zones.iter().find(|zone| &zone.id == id)
    }

    /// First zone in load order containing the point.
    pub fn zone_at(&self, x: f32, y: f32) -> Option<&Zone<A>> {
        self.zones.iter().find(|zone| zone.bounds.contains(x, y))
    }

    pub fn start_tracking(&mut self, avatar: AvatarId) -> bool {
        self.tracker.start(avatar)
    }

    pub fn stop_tracking(&mut self, avatar: &AvatarId) -> bool {
        self.tracker.stop(avatar)
    }

    pub fn is_tracking(&self, avatar: &AvatarId) -> bool {
        self.tracker.is_tracking(avatar)
    }

    pub fn tracker(&self) -> &ZoneTracker {
        &self.tracker
    }

    /// Re-evaluates a tracked avatar at grid position `(x, y)`.
    pub fn evaluate(&mut self, avatar: &AvatarId, x: f32, y: f32) -> Option<ZoneTransition> {
        if !self.tracker.is_tracking(avatar) {
            return None;
        }
        let current = self.zone_at(x, y).map(|zone| zone.id.clone());
        self.tracker.record(avatar, current)
    }
}
