/// Origin Engine: Event Sink
///
/// Triggers emitted by the container. Sinks use interior mutability so a
/// single sink can be shared by every container of a world.

use parking_lot::Mutex;

use crate::domain::PlayerProfile;
use crate::identifier::{OriginKey, PowerKey};

/// Receiver of choice triggers.
pub trait OriginEvents {
    /// A player's origin changed on the authoritative side.
    fn origin_chosen(&self, player: &PlayerProfile, origin: &OriginKey);

    /// Callback for a power granted by a freshly chosen origin.
    fn power_chosen(&self, _player: &PlayerProfile, _power: &PowerKey, _is_orb: bool) {}
}

/// Sink that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEvents;

impl OriginEvents for NoopEvents {
    fn origin_chosen(&self, _player: &PlayerProfile, _origin: &OriginKey) {}
}

/// A recorded trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginEvent {
    OriginChosen {
        entity_id: i32,
        origin: OriginKey,
    },
    PowerChosen {
        entity_id: i32,
        power: PowerKey,
        is_orb: bool,
    },
}

/// Sink that keeps every trigger in arrival order.
#[derive(Debug, Default)]
pub struct RecordedEvents {
    events: Mutex<Vec<OriginEvent>>,
}

impl RecordedEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<OriginEvent> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<OriginEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl OriginEvents for RecordedEvents {
    fn origin_chosen(&self, player: &PlayerProfile, origin: &OriginKey) {
        self.events.lock().push(OriginEvent::OriginChosen {
            entity_id: player.entity_id,
            origin: origin.clone(),
        });
    }

    fn power_chosen(&self, player: &PlayerProfile, power: &PowerKey, is_orb: bool) {
        self.events.lock().push(OriginEvent::PowerChosen {
            entity_id: player.entity_id,
            power: power.clone(),
            is_orb,
        });
    }
}
