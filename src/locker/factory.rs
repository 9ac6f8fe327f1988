use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::entities::look::{DisguiseLook, FixedLook, Look};
use crate::entities::outfit::{Outfit, PlayerUuid};

/// Builds the look a player wears from their server-truth outfit.
pub trait LookFactory: Send + Sync {
    fn create(&self, original: &Outfit) -> Arc<dyn Look>;
}

impl<F> LookFactory for F
where
    F: Fn(&Outfit) -> Arc<dyn Look> + Send + Sync,
{
    fn create(&self, original: &Outfit) -> Arc<dyn Look> {
        self(original)
    }
}

/// Disguises players by name; everyone else keeps their original outfit.
#[derive(Debug, Clone, Default)]
pub struct DisguiseFactory {
    disguises: HashMap<String, Outfit>,
    exempt: Arc<HashSet<PlayerUuid>>,
}

impl DisguiseFactory {
    pub fn new(exempt: HashSet<PlayerUuid>) -> Self {
        Self {
            disguises: HashMap::new(),
            exempt: Arc::new(exempt),
        }
    }

    /// Registers a disguise for the player named `player`. Names match
    /// case-insensitively; a later disguise for the same name replaces the
    /// earlier one.
    pub fn with_disguise(mut self, player: &str, disguise: Outfit) -> Self {
        self.disguises.insert(normalize_name(player), disguise);
        self
    }

    pub fn disguise_for(&self, player: &str) -> Option<&Outfit> {
        self.disguises.get(&normalize_name(player))
    }

    pub fn len(&self) -> usize {
        self.disguises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.disguises.is_empty()
    }
}

impl LookFactory for DisguiseFactory {
    fn create(&self, original: &Outfit) -> Arc<dyn Look> {
        match self.disguise_for(&original.name) {
            Some(disguise) => Arc::new(DisguiseLook::new(
                original.clone(),
                disguise.clone(),
                Arc::clone(&self.exempt),
            )),
            None => Arc::new(FixedLook::original(original.clone())),
        }
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ConnectionId, Viewer};

    #[test]
    fn disguised_players_get_disguise_look() {
        let factory = DisguiseFactory::new(HashSet::from([PlayerUuid(3)]))
            .with_disguise("bob", Outfit::disguise("Shadow", None));
        let bob = Outfit::new(PlayerUuid(2), "Bob", None);
        let look = factory.create(&bob);

        let stranger = Viewer::new(ConnectionId(1), Some(PlayerUuid(1)));
        let staff = Viewer::new(ConnectionId(3), Some(PlayerUuid(3)));
        assert_eq!(look.owner(), PlayerUuid(2));
        assert_eq!(look.choose_outfit(&stranger).name, "Shadow");
        assert_eq!(look.choose_outfit(&staff), bob);
    }

    #[test]
    fn other_players_keep_original() {
        let factory = DisguiseFactory::new(HashSet::new())
            .with_disguise("Bob", Outfit::disguise("Shadow", None));
        let alice = Outfit::new(PlayerUuid(1), "Alice", None);
        let look = factory.create(&alice);
        let viewer = Viewer::new(ConnectionId(2), Some(PlayerUuid(2)));
        assert_eq!(look.choose_outfit(&viewer), alice);
        assert_eq!(factory.len(), 1);
    }
}
