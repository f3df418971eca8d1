use office_engine::{AvatarId, DebugFacade, StepDirection, Vec2};
use serde::Deserialize;
use tracing::{info, warn};

use super::records::{tile_for_glyph, CellRecord, DistrictAttributes, OfficeWorld};

/// A scripted intent fired once the world clock reaches `at` seconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct ScriptEntry {
    pub(crate) at: f64,
    #[serde(flatten)]
    pub(crate) intent: Intent,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub(crate) enum Intent {
    MoveTo {
        avatar: String,
        cell: CellRecord,
    },
    Step {
        avatar: String,
        direction: StepDirection,
    },
    #[serde(rename_all = "camelCase")]
    Say {
        avatar: String,
        text: String,
        #[serde(default)]
        duration_seconds: Option<f32>,
    },
    Remove {
        avatar: String,
    },
    SetTile {
        x: i32,
        y: i32,
        glyph: char,
    },
    Zoom {
        #[serde(default)]
        zoom: Option<f32>,
        #[serde(default)]
        steps: Option<i32>,
    },
    PanTo {
        x: f32,
        y: f32,
        #[serde(default)]
        immediate: bool,
    },
    Follow {
        #[serde(default)]
        avatar: Option<String>,
    },
    ForceVisible {
        avatar: String,
        on: bool,
    },
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptPlayer {
    entries: Vec<ScriptEntry>,
    cursor: usize,
}

impl ScriptPlayer {
    pub(crate) fn new(mut entries: Vec<ScriptEntry>) -> Self {
        entries.sort_by(|a, b| a.at.total_cmp(&b.at));
        Self { entries, cursor: 0 }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.cursor >= self.entries.len()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.entries.len().saturating_sub(self.cursor)
    }

    /// Entries due at `clock_seconds`, in file order for equal times.
    pub(crate) fn take_due(&mut self, clock_seconds: f64) -> &[ScriptEntry] {
        let start = self.cursor;
        while self
            .entries
            .get(self.cursor)
            .is_some_and(|entry| entry.at <= clock_seconds)
        {
            self.cursor += 1;
        }
        &self.entries[start..self.cursor]
    }
}

/// Applies one intent. Rejections are logged and never stop the run.
pub(crate) fn apply_intent(
    world: &mut OfficeWorld,
    debug: &mut dyn DebugFacade<DistrictAttributes>,
    intent: &Intent,
) -> bool {
    match intent {
        Intent::MoveTo { avatar, cell } => {
            let id = AvatarId::new(avatar.clone());
            log_rejection(&id, "move_to", world.request_move(&id, (*cell).into()))
        }
        Intent::Step { avatar, direction } => {
            let id = AvatarId::new(avatar.clone());
            log_rejection(&id, "step", world.request_step(&id, *direction))
        }
        Intent::Say {
            avatar,
            text,
            duration_seconds,
        } => {
            let id = AvatarId::new(avatar.clone());
            if world.movement().avatar(&id).is_none() {
                warn!(avatar = %id, "say_unknown_avatar");
                return false;
            }
            let duration = duration_seconds.unwrap_or(world.config().bubble_duration_seconds);
            if world.show_bubble_for(&id, text.clone(), duration).is_some() {
                info!(avatar = %id, "bubble_replaced");
            }
            true
        }
        Intent::Remove { avatar } => {
            let id = AvatarId::new(avatar.clone());
            world.remove_avatar(&id).is_some()
        }
        Intent::SetTile { x, y, glyph } => match tile_for_glyph(*glyph) {
            Some(tile) => world.set_tile(*x, *y, tile),
            None => {
                warn!(x, y, glyph = %glyph, "unknown_tile_glyph");
                false
            }
        },
        Intent::Zoom { zoom, steps } => {
            if let Some(zoom) = zoom {
                world.set_zoom(*zoom);
            }
            if let Some(steps) = steps {
                world.apply_zoom_steps(*steps);
            }
            zoom.is_some() || steps.is_some()
        }
        Intent::PanTo { x, y, immediate } => world.move_camera(Vec2::new(*x, *y), *immediate),
        Intent::Follow { avatar } => world.follow_avatar(avatar.clone().map(AvatarId::new)),
        Intent::ForceVisible { avatar, on } => {
            debug.force_visible(world, &AvatarId::new(avatar.clone()), *on)
        }
    }
}

fn log_rejection<E: std::fmt::Display>(
    avatar: &AvatarId,
    action: &str,
    result: Result<(), E>,
) -> bool {
    match result {
        Ok(()) => true,
        Err(error) => {
            warn!(avatar = %avatar, action, error = %error, "intent_rejected");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use office_engine::{GridModel, StandardDebug, WorldConfig};

    use super::*;

    fn world() -> OfficeWorld {
        let grid = GridModel::new(6, 6, 10.0).expect("grid");
        let mut world = OfficeWorld::new(WorldConfig::default(), grid).expect("world");
        world.add_avatar_at_cell(AvatarId::new("ada"), office_engine::CellCoord::new(0, 0), None);
        world
    }

    #[test]
    fn entries_parse_with_action_tag() {
        let raw = r#"[
            { "at": 1.5, "action": "moveTo", "avatar": "ada", "cell": { "x": 3, "y": 4 } },
            { "at": 0.0, "action": "say", "avatar": "ada", "text": "hi", "durationSeconds": 2.0 },
            { "at": 2.0, "action": "step", "avatar": "ada", "direction": "east" },
            { "at": 3.0, "action": "follow" }
        ]"#;
        let entries: Vec<ScriptEntry> = serde_json::from_str(raw).expect("parse");
        assert_eq!(
            entries[0].intent,
            Intent::MoveTo {
                avatar: "ada".into(),
                cell: CellRecord { x: 3, y: 4 },
            }
        );
        assert_eq!(
            entries[1].intent,
            Intent::Say {
                avatar: "ada".into(),
                text: "hi".into(),
                duration_seconds: Some(2.0),
            }
        );
        assert_eq!(entries[3].intent, Intent::Follow { avatar: None });
    }

    #[test]
    fn player_releases_entries_in_time_order() {
        let entry = |at: f64, avatar: &str| ScriptEntry {
            at,
            intent: Intent::Remove {
                avatar: avatar.into(),
            },
        };
        let mut player = ScriptPlayer::new(vec![entry(2.0, "c"), entry(0.0, "a"), entry(1.0, "b")]);
        assert_eq!(player.take_due(0.5).len(), 1);
        assert!(player.take_due(0.9).is_empty());
        let due = player.take_due(5.0);
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].at, 1.0);
        assert!(player.is_finished());
    }

    #[test]
    fn rejected_intents_are_reported_not_fatal() {
        let mut world = world();
        let mut debug = StandardDebug;
        world.set_tile(1, 0, office_engine::TileData::WALL);

        let blocked = Intent::Step {
            avatar: "ada".into(),
            direction: StepDirection::East,
        };
        assert!(!apply_intent(&mut world, &mut debug, &blocked));
        let unknown = Intent::MoveTo {
            avatar: "ghost".into(),
            cell: CellRecord { x: 1, y: 1 },
        };
        assert!(!apply_intent(&mut world, &mut debug, &unknown));
        let bad_glyph = Intent::SetTile {
            x: 0,
            y: 1,
            glyph: 'x',
        };
        assert!(!apply_intent(&mut world, &mut debug, &bad_glyph));
    }

    #[test]
    fn intents_reach_world_components() {
        let mut world = world();
        let mut debug = StandardDebug;
        let ada = AvatarId::new("ada");
        let intents = [
            Intent::Say {
                avatar: "ada".into(),
                text: "standup in 5".into(),
                duration_seconds: None,
            },
            Intent::Zoom {
                zoom: Some(9.0),
                steps: None,
            },
            Intent::Follow {
                avatar: Some("ada".into()),
            },
            Intent::ForceVisible {
                avatar: "ada".into(),
                on: true,
            },
            Intent::MoveTo {
                avatar: "ada".into(),
                cell: CellRecord { x: 4, y: 4 },
            },
        ];
        for intent in &intents {
            assert!(apply_intent(&mut world, &mut debug, intent), "{intent:?}");
        }
        assert!(world.overlays().get(&ada).is_some());
        assert_eq!(world.camera().zoom(), 2.0);
        assert_eq!(world.followed(), Some(&ada));
        assert_eq!(world.debug_info_snapshot().forced_visible, vec![ada.clone()]);
        assert!(world.movement().avatar(&ada).expect("avatar").is_moving());
    }
}
