use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;

use crate::entities::outfit::{Outfit, PlayerUuid};
use crate::host::Viewer;

/// Appearance state of one real player, able to pick the outfit a given
/// viewer is shown.
///
/// `choose_outfit` runs concurrently on every network thread that sends a
/// packet mentioning the owner, so it must be a pure function of the look and
/// the viewer.
pub trait Look: Send + Sync + Debug {
    fn owner(&self) -> PlayerUuid;

    fn choose_outfit(&self, viewer: &Viewer) -> Outfit;
}

/// Shows the same outfit to everyone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedLook {
    owner: PlayerUuid,
    outfit: Outfit,
}

impl FixedLook {
    pub fn new(owner: PlayerUuid, outfit: Outfit) -> Self {
        Self { owner, outfit }
    }

    /// The look of a player who is shown as themselves.
    pub fn original(outfit: Outfit) -> Self {
        Self {
            owner: outfit.id,
            outfit,
        }
    }

    pub fn outfit(&self) -> &Outfit {
        &self.outfit
    }
}

impl Look for FixedLook {
    fn owner(&self) -> PlayerUuid {
        self.owner
    }

    fn choose_outfit(&self, _viewer: &Viewer) -> Outfit {
        self.outfit.clone()
    }
}

/// Shows a disguise to other players. The owner and exempt viewers keep
/// seeing the original.
#[derive(Debug, Clone)]
pub struct DisguiseLook {
    original: Outfit,
    disguise: Outfit,
    exempt: Arc<HashSet<PlayerUuid>>,
}

impl DisguiseLook {
    pub fn new(original: Outfit, disguise: Outfit, exempt: Arc<HashSet<PlayerUuid>>) -> Self {
        Self {
            original,
            disguise,
            exempt,
        }
    }

    pub fn original(&self) -> &Outfit {
        &self.original
    }

    pub fn disguise(&self) -> &Outfit {
        &self.disguise
    }

    fn sees_original(&self, viewer: &Viewer) -> bool {
        match viewer.player {
            Some(player) => player == self.original.id || self.exempt.contains(&player),
            None => false,
        }
    }
}

impl Look for DisguiseLook {
    fn owner(&self) -> PlayerUuid {
        self.original.id
    }

    fn choose_outfit(&self, viewer: &Viewer) -> Outfit {
        if self.sees_original(viewer) {
            self.original.clone()
        } else {
            self.disguise.clone()
        }
    }
}
