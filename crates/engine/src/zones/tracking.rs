use std::collections::BTreeMap;

use crate::ids::{AvatarId, ZoneId};

/// Change of containing zone for one tracked avatar. `None` on either side
/// means outside every zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneTransition {
    pub avatar: AvatarId,
    pub previous: Option<ZoneId>,
    pub current: Option<ZoneId>,
}

/// Last known zone per tracked avatar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneTracker {
    last_known: BTreeMap<AvatarId, Option<ZoneId>>,
}

impl ZoneTracker {
    /// Starts tracking with no recorded zone. Returns `false` if the avatar
    /// was already tracked, in which case its state is kept.
    pub fn start(&mut self, avatar: AvatarId) -> bool {
        if self.last_known.contains_key(&avatar) {
            return false;
        }
        self.last_known.insert(avatar, None);
        true
    }

    pub fn stop(&mut self, avatar: &AvatarId) -> bool {
        self.last_known.remove(avatar).is_some()
    }

    pub fn is_tracking(&self, avatar: &AvatarId) -> bool {
        self.last_known.contains_key(avatar)
    }

    pub fn last_known(&self, avatar: &AvatarId) -> Option<Option<&ZoneId>> {
        self.last_known.get(avatar).map(Option::as_ref)
    }

    pub fn tracked(&self) -> impl Iterator<Item = &AvatarId> {
        self.last_known.keys()
    }

    pub fn len(&self) -> usize {
        self.last_known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_known.is_empty()
    }

    /// Records `current` for a tracked avatar and reports a transition when
    /// it differs from the previous record. Untracked avatars are ignored.
    pub fn record(&mut self, avatar: &AvatarId, current: Option<ZoneId>) -> Option<ZoneTransition> {
        let slot = self.last_known.get_mut(avatar)?;
        if *slot == current {
            return None;
        }
        let previous = std::mem::replace(slot, current.clone());
        Some(ZoneTransition {
            avatar: avatar.clone(),
            previous,
            current,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_record_inside_zone_is_a_transition_from_none() {
        let mut tracker = ZoneTracker::default();
        let ada = AvatarId::new("ada");
        assert!(tracker.start(ada.clone()));
        assert_eq!(
            tracker.record(&ada, Some(ZoneId::new("z"))),
            Some(ZoneTransition {
                avatar: ada.clone(),
                previous: None,
                current: Some(ZoneId::new("z")),
            })
        );
        assert_eq!(tracker.record(&ada, Some(ZoneId::new("z"))), None);
    }

    #[test]
    fn untracked_avatar_never_transitions() {
        let mut tracker = ZoneTracker::default();
        assert_eq!(
            tracker.record(&AvatarId::new("ghost"), Some(ZoneId::new("z"))),
            None
        );
    }

    #[test]
    fn stop_clears_state_silently() {
        let mut tracker = ZoneTracker::default();
        let ada = AvatarId::new("ada");
        tracker.start(ada.clone());
        tracker.record(&ada, Some(ZoneId::new("z")));
        assert!(tracker.stop(&ada));
        assert!(!tracker.is_tracking(&ada));
        assert!(!tracker.stop(&ada));

        tracker.start(ada.clone());
        assert_eq!(tracker.last_known(&ada), Some(None));
    }
}
