mod index;
mod tracking;

pub use index::{Zone, ZoneBounds, ZoneIndex, ZoneLoadReport, ZoneRejection};
pub use tracking::{ZoneTracker, ZoneTransition};
