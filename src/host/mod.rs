//! Services the look registry and the packet rewriters consume from the game
//! server they are embedded in.

pub mod local;

use crate::entities::look::Look;
use crate::entities::outfit::{Outfit, PlayerUuid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u32);

/// The receiving side of an outbound packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub connection: ConnectionId,
    /// Player logged in on the connection, if it has finished logging in.
    pub player: Option<PlayerUuid>,
}

impl Viewer {
    pub fn new(connection: ConnectionId, player: Option<PlayerUuid>) -> Self {
        Self { connection, player }
    }
}

/// Connection lookup and entity visibility of the host runtime. All calls are
/// synchronous and must not block on network I/O.
pub trait Host: Send + Sync {
    fn player_of(&self, connection: ConnectionId) -> Option<PlayerUuid>;

    fn connection_of(&self, player: PlayerUuid) -> Option<ConnectionId>;

    /// Case-insensitive lookup of an online player.
    fn player_by_name(&self, name: &str) -> Option<PlayerUuid>;

    fn online_connections(&self) -> Vec<ConnectionId>;

    fn hide_entity(&self, viewer: ConnectionId, target: ConnectionId);

    fn show_entity(&self, viewer: ConnectionId, target: ConnectionId);

    /// Server-truth outfit of an online player, before any look is applied.
    fn original_outfit(&self, player: PlayerUuid) -> Option<Outfit>;
}

/// Announces tablist entries for a look to every available receiver.
pub trait Tablist: Send + Sync {
    fn send_creating(&self, look: &dyn Look);

    fn send_destroying(&self, look: &dyn Look);
}
