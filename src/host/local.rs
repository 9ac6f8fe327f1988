use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::entities::look::Look;
use crate::entities::outfit::{Outfit, PlayerUuid};
use crate::host::{ConnectionId, Host, Tablist};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Hide {
        viewer: ConnectionId,
        target: ConnectionId,
    },
    Show {
        viewer: ConnectionId,
        target: ConnectionId,
    },
    TablistDestroy {
        owner: PlayerUuid,
    },
    TablistCreate {
        owner: PlayerUuid,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnlinePlayer {
    pub connection: ConnectionId,
    pub outfit: Outfit,
}

/// In-process host backed by a player table. Visibility and tablist calls
/// are recorded instead of being sent anywhere.
#[derive(Debug)]
pub struct LocalHost {
    players: Mutex<Vec<OnlinePlayer>>,
    events: Mutex<Vec<HostEvent>>,
    next_connection: AtomicU32,
}

impl LocalHost {
    pub fn new() -> Self {
        Self {
            players: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            next_connection: AtomicU32::new(1),
        }
    }

    pub fn join(&self, outfit: Outfit) -> ConnectionId {
        let connection = ConnectionId(self.next_connection.fetch_add(1, Ordering::SeqCst));
        if let Ok(mut players) = self.players.lock() {
            players.retain(|player| player.outfit.id != outfit.id);
            players.push(OnlinePlayer { connection, outfit });
        }
        connection
    }

    pub fn leave(&self, connection: ConnectionId) -> Option<OnlinePlayer> {
        let mut players = self.players.lock().ok()?;
        let index = players
            .iter()
            .position(|player| player.connection == connection)?;
        Some(players.remove(index))
    }

    /// Replaces the server-truth outfit of an online player, e.g. after a
    /// skin change. Returns false if the player is not online.
    pub fn set_original(&self, outfit: Outfit) -> bool {
        let Ok(mut players) = self.players.lock() else {
            return false;
        };
        match players.iter_mut().find(|player| player.outfit.id == outfit.id) {
            Some(player) => {
                player.outfit = outfit;
                true
            }
            None => false,
        }
    }

    pub fn players(&self) -> Vec<OnlinePlayer> {
        self.players
            .lock()
            .map(|players| players.clone())
            .unwrap_or_default()
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn take_events(&self) -> Vec<HostEvent> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }

    fn record(&self, event: HostEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    fn find<T>(&self, select: impl Fn(&OnlinePlayer) -> Option<T>) -> Option<T> {
        let players = self.players.lock().ok()?;
        players.iter().find_map(select)
    }
}

impl Default for LocalHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for LocalHost {
    fn player_of(&self, connection: ConnectionId) -> Option<PlayerUuid> {
        self.find(|player| (player.connection == connection).then_some(player.outfit.id))
    }

    fn connection_of(&self, id: PlayerUuid) -> Option<ConnectionId> {
        self.find(|player| (player.outfit.id == id).then_some(player.connection))
    }

    fn player_by_name(&self, name: &str) -> Option<PlayerUuid> {
        let name = name.trim();
        self.find(|player| {
            player
                .outfit
                .name
                .eq_ignore_ascii_case(name)
                .then_some(player.outfit.id)
        })
    }

    fn online_connections(&self) -> Vec<ConnectionId> {
        self.players()
            .into_iter()
            .map(|player| player.connection)
            .collect()
    }

    fn hide_entity(&self, viewer: ConnectionId, target: ConnectionId) {
        self.record(HostEvent::Hide { viewer, target });
    }

    fn show_entity(&self, viewer: ConnectionId, target: ConnectionId) {
        self.record(HostEvent::Show { viewer, target });
    }

    fn original_outfit(&self, id: PlayerUuid) -> Option<Outfit> {
        self.find(|player| (player.outfit.id == id).then(|| player.outfit.clone()))
    }
}

impl Tablist for LocalHost {
    fn send_creating(&self, look: &dyn Look) {
        self.record(HostEvent::TablistCreate {
            owner: look.owner(),
        });
    }

    fn send_destroying(&self, look: &dyn Look) {
        self.record(HostEvent::TablistDestroy {
            owner: look.owner(),
        });
    }
}
