use std::collections::HashMap;
use std::sync::{
    Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use crate::entities::look::Look;
use crate::entities::outfit::{Outfit, PlayerUuid};
use crate::host::{ConnectionId, Host, Tablist};
use crate::locker::factory::LookFactory;
use crate::telemetry::logging;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockerError {
    AlreadyConfigured,
    FactoryMissing,
}

impl std::fmt::Display for LockerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockerError::AlreadyConfigured => write!(f, "look factory has already been registered"),
            LockerError::FactoryMissing => {
                write!(f, "can not create look without registered factory")
            }
        }
    }
}

impl std::error::Error for LockerError {}

/// Authority over which look every tracked player currently wears.
///
/// Mutations (`update`, `refresh`, `remove`) are serialized on one mutex so a
/// hide, swap, show sequence never interleaves with another. The look map
/// itself is only locked for the lookup or the swap, never across host calls,
/// so host callbacks may re-enter the packet interceptor.
///
/// A packet rewrite that starts just before a swap and finishes just after
/// may present either the old or the new look. The show pass that follows
/// the swap re-sends the new look to every connection, so such a packet is
/// corrected by the next broadcast.
pub struct Locker {
    host: Arc<dyn Host>,
    tablist: Arc<dyn Tablist>,
    factory: OnceLock<Box<dyn LookFactory>>,
    looks: RwLock<HashMap<PlayerUuid, Arc<dyn Look>>>,
    mutation: Mutex<()>,
}

impl Locker {
    pub fn new(host: Arc<dyn Host>, tablist: Arc<dyn Tablist>) -> Self {
        Self {
            host,
            tablist,
            factory: OnceLock::new(),
            looks: RwLock::new(HashMap::new()),
            mutation: Mutex::new(()),
        }
    }

    pub fn register_factory(&self, factory: Box<dyn LookFactory>) -> Result<(), LockerError> {
        self.factory
            .set(factory)
            .map_err(|_| LockerError::AlreadyConfigured)
    }

    fn factory(&self) -> Result<&dyn LookFactory, LockerError> {
        self.factory
            .get()
            .map(|factory| factory.as_ref())
            .ok_or(LockerError::FactoryMissing)
    }

    pub fn find_by_id(&self, id: PlayerUuid) -> Option<Arc<dyn Look>> {
        self.read_looks().get(&id).cloned()
    }

    /// Returns the tracked look for `original.id`, materializing it through
    /// the factory on first request. The factory runs under the map's write
    /// guard and must not call back into the registry.
    pub fn find_or_create_by_original(
        &self,
        original: &Outfit,
    ) -> Result<Arc<dyn Look>, LockerError> {
        if let Some(look) = self.find_by_id(original.id) {
            return Ok(look);
        }
        let factory = self.factory()?;
        let look = {
            let mut looks = self.write_looks();
            if let Some(look) = looks.get(&original.id) {
                return Ok(Arc::clone(look));
            }
            let look = factory.create(original);
            looks.insert(original.id, Arc::clone(&look));
            look
        };
        logging::log_looks(&format!(
            "look created for {} ({})",
            original.name, original.id
        ));
        Ok(look)
    }

    /// Swaps the look of a tracked player. Untracked players are ignored.
    pub fn update(&self, id: PlayerUuid, new_look: Arc<dyn Look>) {
        let _guard = self.mutation_guard();
        let Some(old_look) = self.find_by_id(id) else {
            return;
        };
        let target = self.host.connection_of(id);
        self.hide_target(target, old_look.as_ref());
        self.write_looks().insert(id, Arc::clone(&new_look));
        self.show_target(target, new_look.as_ref());
        logging::log_looks(&format!("look updated for {id}"));
    }

    /// Rebuilds the look of a tracked player from their current server-truth
    /// outfit.
    pub fn refresh(&self, id: PlayerUuid) -> Result<(), LockerError> {
        if self.find_by_id(id).is_none() {
            return Ok(());
        }
        let Some(original) = self.host.original_outfit(id) else {
            return Ok(());
        };
        let look = self.factory()?.create(&original);
        self.update(id, look);
        Ok(())
    }

    pub fn remove(&self, id: PlayerUuid) -> Option<Arc<dyn Look>> {
        let _guard = self.mutation_guard();
        let removed = self.write_looks().remove(&id);
        if removed.is_some() {
            logging::log_looks(&format!("look removed for {id}"));
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.read_looks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_looks().is_empty()
    }

    pub fn tracked_ids(&self) -> Vec<PlayerUuid> {
        let mut ids: Vec<PlayerUuid> = self.read_looks().keys().copied().collect();
        ids.sort();
        ids
    }

    fn hide_target(&self, target: Option<ConnectionId>, old_look: &dyn Look) {
        if let Some(target) = target {
            for viewer in self.host.online_connections() {
                if viewer != target {
                    self.host.hide_entity(viewer, target);
                }
            }
        }
        self.tablist.send_destroying(old_look);
    }

    fn show_target(&self, target: Option<ConnectionId>, new_look: &dyn Look) {
        if let Some(target) = target {
            for viewer in self.host.online_connections() {
                if viewer != target {
                    self.host.show_entity(viewer, target);
                }
            }
        }
        self.tablist.send_creating(new_look);
    }

    // The map only ever holds whole looks, so a poisoned guard carries no
    // half-written state.
    fn read_looks(&self) -> RwLockReadGuard<'_, HashMap<PlayerUuid, Arc<dyn Look>>> {
        self.looks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_looks(&self) -> RwLockWriteGuard<'_, HashMap<PlayerUuid, Arc<dyn Look>>> {
        self.looks.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn mutation_guard(&self) -> MutexGuard<'_, ()> {
        self.mutation.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::look::{DisguiseLook, FixedLook};
    use crate::host::local::{HostEvent, LocalHost};
    use std::collections::HashSet;

    fn original_factory() -> Box<dyn LookFactory> {
        Box::new(|original: &Outfit| -> Arc<dyn Look> {
            Arc::new(FixedLook::original(original.clone()))
        })
    }

    fn setup() -> (Arc<LocalHost>, Locker) {
        let host = Arc::new(LocalHost::new());
        let locker = Locker::new(host.clone(), host.clone());
        (host, locker)
    }

    fn outfit(id: u128, name: &str) -> Outfit {
        Outfit::new(PlayerUuid(id), name, None)
    }

    #[test]
    fn unknown_ids_are_not_tracked() {
        let (_host, locker) = setup();
        locker.register_factory(original_factory()).expect("factory");
        locker
            .find_or_create_by_original(&outfit(1, "Alice"))
            .expect("look");
        assert!(locker.find_by_id(PlayerUuid(2)).is_none());
        assert_eq!(locker.len(), 1);
    }

    #[test]
    fn materialization_is_idempotent() {
        let (_host, locker) = setup();
        locker.register_factory(original_factory()).expect("factory");
        let first = locker
            .find_or_create_by_original(&outfit(1, "Alice"))
            .expect("look");
        let second = locker
            .find_or_create_by_original(&outfit(1, "Alice renamed"))
            .expect("look");
        assert!(Arc::ptr_eq(&first, &second));
        let found = locker.find_by_id(PlayerUuid(1)).expect("tracked");
        assert!(Arc::ptr_eq(&first, &found));
    }

    #[test]
    fn factory_can_only_be_registered_once() {
        let (_host, locker) = setup();
        assert_eq!(locker.register_factory(original_factory()), Ok(()));
        let disguising = Box::new(|original: &Outfit| -> Arc<dyn Look> {
            Arc::new(DisguiseLook::new(
                original.clone(),
                Outfit::disguise("Shadow", None),
                Arc::new(HashSet::new()),
            ))
        });
        assert_eq!(
            locker.register_factory(disguising),
            Err(LockerError::AlreadyConfigured)
        );

        let look = locker
            .find_or_create_by_original(&outfit(1, "Alice"))
            .expect("look");
        let stranger = crate::host::Viewer::new(ConnectionId(9), Some(PlayerUuid(9)));
        assert_eq!(look.choose_outfit(&stranger), outfit(1, "Alice"));
    }

    #[test]
    fn creation_without_factory_fails() {
        let (_host, locker) = setup();
        assert_eq!(
            locker
                .find_or_create_by_original(&outfit(1, "Alice"))
                .map(|_| ()),
            Err(LockerError::FactoryMissing)
        );
        assert!(locker.is_empty());
    }

    #[test]
    fn update_of_untracked_player_is_ignored() {
        let (host, locker) = setup();
        host.join(outfit(1, "Alice"));
        host.join(outfit(2, "Bob"));
        locker.update(
            PlayerUuid(1),
            Arc::new(FixedLook::original(outfit(1, "Alice"))),
        );
        assert!(locker.find_by_id(PlayerUuid(1)).is_none());
        assert!(host.events().is_empty());
    }

    #[test]
    fn update_hides_swaps_and_shows() {
        let (host, locker) = setup();
        locker.register_factory(original_factory()).expect("factory");
        let alice = host.join(outfit(1, "Alice"));
        let bob = host.join(outfit(2, "Bob"));
        locker
            .find_or_create_by_original(&outfit(1, "Alice"))
            .expect("look");

        let disguise: Arc<dyn Look> = Arc::new(DisguiseLook::new(
            outfit(1, "Alice"),
            Outfit::disguise("Shadow", None),
            Arc::new(HashSet::new()),
        ));
        locker.update(PlayerUuid(1), Arc::clone(&disguise));

        assert_eq!(
            host.take_events(),
            vec![
                HostEvent::Hide {
                    viewer: bob,
                    target: alice
                },
                HostEvent::TablistDestroy {
                    owner: PlayerUuid(1)
                },
                HostEvent::Show {
                    viewer: bob,
                    target: alice
                },
                HostEvent::TablistCreate {
                    owner: PlayerUuid(1)
                },
            ]
        );
        assert!(host.events().is_empty());
        let current = locker.find_by_id(PlayerUuid(1)).expect("tracked");
        assert!(Arc::ptr_eq(&current, &disguise));
    }

    #[test]
    fn update_of_offline_owner_still_broadcasts() {
        let (host, locker) = setup();
        locker.register_factory(original_factory()).expect("factory");
        host.join(outfit(2, "Bob"));
        locker
            .find_or_create_by_original(&outfit(1, "Alice"))
            .expect("look");
        locker.update(
            PlayerUuid(1),
            Arc::new(FixedLook::original(outfit(1, "Alice"))),
        );
        assert_eq!(
            host.events(),
            vec![
                HostEvent::TablistDestroy {
                    owner: PlayerUuid(1)
                },
                HostEvent::TablistCreate {
                    owner: PlayerUuid(1)
                },
            ]
        );
    }

    #[test]
    fn refresh_rebuilds_from_server_truth() {
        let (host, locker) = setup();
        locker.register_factory(original_factory()).expect("factory");
        host.join(outfit(1, "Alice"));
        locker
            .find_or_create_by_original(&outfit(1, "Alice"))
            .expect("look");
        host.set_original(outfit(1, "Alicia"));

        locker.refresh(PlayerUuid(1)).expect("refresh");

        let look = locker.find_by_id(PlayerUuid(1)).expect("tracked");
        let viewer = crate::host::Viewer::new(ConnectionId(99), None);
        assert_eq!(look.choose_outfit(&viewer).name, "Alicia");
        assert_eq!(host.events().len(), 2);
    }

    #[test]
    fn refresh_of_untracked_player_is_ignored() {
        let (host, locker) = setup();
        host.join(outfit(1, "Alice"));
        assert_eq!(locker.refresh(PlayerUuid(1)), Ok(()));
        assert!(locker.is_empty());
        assert!(host.events().is_empty());
    }

    #[test]
    fn remove_evicts_without_side_effects() {
        let (host, locker) = setup();
        locker.register_factory(original_factory()).expect("factory");
        host.join(outfit(1, "Alice"));
        locker
            .find_or_create_by_original(&outfit(1, "Alice"))
            .expect("look");
        assert!(locker.remove(PlayerUuid(1)).is_some());
        assert!(locker.remove(PlayerUuid(1)).is_none());
        assert!(locker.find_by_id(PlayerUuid(1)).is_none());
        assert!(host.events().is_empty());
    }

    #[test]
    fn concurrent_materialization_yields_one_look() {
        let (_host, locker) = setup();
        locker.register_factory(original_factory()).expect("factory");
        let locker = Arc::new(locker);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locker = Arc::clone(&locker);
                std::thread::spawn(move || {
                    locker
                        .find_or_create_by_original(&outfit(1, "Alice"))
                        .expect("look")
                })
            })
            .collect();
        let looks: Vec<Arc<dyn Look>> = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread"))
            .collect();
        assert!(looks.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
        assert_eq!(locker.tracked_ids(), vec![PlayerUuid(1)]);
    }
}
