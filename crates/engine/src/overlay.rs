use std::collections::BTreeMap;

/// A time-boxed item owned by `owner`, such as a chat bubble.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayItem<K, P> {
    pub owner: K,
    pub payload: P,
    pub created_at: f64,
    pub duration_seconds: f32,
}

impl<K, P> OverlayItem<K, P> {
    pub fn expires_at(&self) -> f64 {
        self.created_at + f64::from(self.duration_seconds)
    }

    pub fn remaining_seconds(&self, now: f64) -> f64 {
        (self.expires_at() - now).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    Expired,
    Replaced,
    Cleared,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayRemoval<K, P> {
    pub item: OverlayItem<K, P>,
    pub reason: RemovalReason,
}

/// At most one item per owner. Every item leaves exactly once, through
/// expiry, replacement or an explicit clear.
#[derive(Debug, Clone)]
pub struct EphemeralOverlays<K, P> {
    items: BTreeMap<K, OverlayItem<K, P>>,
}

impl<K, P> Default for EphemeralOverlays<K, P> {
    fn default() -> Self {
        Self {
            items: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone, P> EphemeralOverlays<K, P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shows `payload` for `owner` until `now + duration_seconds`. Negative or
    /// non-finite durations expire on the next tick.
    pub fn show(
        &mut self,
        owner: K,
        payload: P,
        duration_seconds: f32,
        now: f64,
    ) -> Option<OverlayRemoval<K, P>> {
        let duration_seconds = if duration_seconds.is_finite() {
            duration_seconds.max(0.0)
        } else {
            0.0
        };
        let item = OverlayItem {
            owner: owner.clone(),
            payload,
            created_at: now,
            duration_seconds,
        };
        self.items
            .insert(owner, item)
            .map(|item| OverlayRemoval {
                item,
                reason: RemovalReason::Replaced,
            })
    }

    /// Removes every item with `expires_at <= now`, earliest first and by
    /// owner within the same instant.
    pub fn tick(&mut self, now: f64) -> Vec<OverlayRemoval<K, P>> {
        let expired_owners: Vec<K> = self
            .items
            .values()
            .filter(|item| item.expires_at() <= now)
            .map(|item| item.owner.clone())
            .collect();
        let mut removed: Vec<_> = expired_owners
            .into_iter()
            .filter_map(|owner| self.items.remove(&owner))
            .map(|item| OverlayRemoval {
                item,
                reason: RemovalReason::Expired,
            })
            .collect();
        removed.sort_by(|a, b| a.item.expires_at().total_cmp(&b.item.expires_at()));
        removed
    }

    pub fn clear(&mut self, owner: &K) -> Option<OverlayRemoval<K, P>> {
        self.items.remove(owner).map(|item| OverlayRemoval {
            item,
            reason: RemovalReason::Cleared,
        })
    }

    pub fn clear_all(&mut self) -> Vec<OverlayRemoval<K, P>> {
        std::mem::take(&mut self.items)
            .into_values()
            .map(|item| OverlayRemoval {
                item,
                reason: RemovalReason::Cleared,
            })
            .collect()
    }

    pub fn get(&self, owner: &K) -> Option<&OverlayItem<K, P>> {
        self.items.get(owner)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OverlayItem<K, P>> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
