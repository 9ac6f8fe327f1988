use std::sync::Arc;

use crate::entities::outfit::{Outfit, PlayerUuid};
use crate::host::{ConnectionId, Host, Viewer};
use crate::locker::{Locker, LockerError};
use crate::net::protocol::{
    PacketError, RosterEntry, RosterPacket, SpawnPlayerPacket, TeamPacket, OPCODE_ROSTER,
    OPCODE_SPAWN_PLAYER, OPCODE_TEAM,
};
use crate::telemetry::logging;

/// Outbound packet shapes that embed a player's visual identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Roster,
    SpawnPlayer,
    Team,
}

impl PacketKind {
    /// Opcodes to register with the host's outbound packet hook.
    pub const LISTENED: [u8; 3] = [OPCODE_ROSTER, OPCODE_SPAWN_PLAYER, OPCODE_TEAM];

    pub fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode {
            OPCODE_ROSTER => Some(PacketKind::Roster),
            OPCODE_SPAWN_PLAYER => Some(PacketKind::SpawnPlayer),
            OPCODE_TEAM => Some(PacketKind::Team),
            _ => None,
        }
    }

    pub fn classify(raw: &[u8]) -> Option<Self> {
        raw.first().copied().and_then(Self::from_opcode)
    }

    pub fn opcode(self) -> u8 {
        match self {
            PacketKind::Roster => OPCODE_ROSTER,
            PacketKind::SpawnPlayer => OPCODE_SPAWN_PLAYER,
            PacketKind::Team => OPCODE_TEAM,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteError {
    Malformed(PacketError),
    Locker(LockerError),
    LookMissing(PlayerUuid),
}

impl std::fmt::Display for RewriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RewriteError::Malformed(err) => write!(f, "malformed packet: {err}"),
            RewriteError::Locker(err) => write!(f, "{err}"),
            RewriteError::LookMissing(id) => write!(f, "no look tracked for {id}"),
        }
    }
}

impl std::error::Error for RewriteError {}

impl From<PacketError> for RewriteError {
    fn from(err: PacketError) -> Self {
        RewriteError::Malformed(err)
    }
}

impl From<LockerError> for RewriteError {
    fn from(err: LockerError) -> Self {
        RewriteError::Locker(err)
    }
}

/// Rewrites outbound packets so each receiver sees the outfit the sender's
/// look picks for them.
pub struct LookInterceptor {
    locker: Arc<Locker>,
    host: Arc<dyn Host>,
}

impl LookInterceptor {
    pub fn new(locker: Arc<Locker>, host: Arc<dyn Host>) -> Self {
        Self { locker, host }
    }

    pub fn locker(&self) -> &Arc<Locker> {
        &self.locker
    }

    /// Classifies `raw` and rewrites it if it is one of the listened shapes.
    /// Everything else is returned unchanged.
    pub fn intercept(&self, raw: &[u8], receiver: ConnectionId) -> Vec<u8> {
        match PacketKind::classify(raw) {
            Some(kind) => self.on_packet_sending(kind, raw, receiver),
            None => raw.to_vec(),
        }
    }

    /// Produces the packet to send to `receiver` in place of `raw`. Never
    /// fails: a packet that can not be rewritten goes out as it came in.
    pub fn on_packet_sending(
        &self,
        kind: PacketKind,
        raw: &[u8],
        receiver: ConnectionId,
    ) -> Vec<u8> {
        let viewer = Viewer::new(receiver, self.host.player_of(receiver));
        let rewritten = match kind {
            PacketKind::Roster => RosterPacket::decode(raw)
                .map_err(RewriteError::from)
                .and_then(|packet| self.apply_look(&packet, &viewer))
                .map(|packet| packet.encode()),
            PacketKind::SpawnPlayer => SpawnPlayerPacket::decode(raw)
                .map_err(RewriteError::from)
                .and_then(|packet| self.revise_spawn(&packet, &viewer))
                .map(|packet| packet.encode()),
            PacketKind::Team => TeamPacket::decode(raw)
                .map_err(RewriteError::from)
                .map(|packet| self.adjust_team(&packet, &viewer).encode()),
        };
        match rewritten {
            Ok(bytes) => bytes,
            Err(err) => {
                logging::log_packets(&format!(
                    "{kind:?} packet to connection {} passed through: {err}",
                    receiver.0
                ));
                raw.to_vec()
            }
        }
    }

    /// Replaces the profile of every roster entry with the outfit chosen for
    /// `viewer`. Game mode, latency and display name stay as they are.
    pub fn apply_look(
        &self,
        packet: &RosterPacket,
        viewer: &Viewer,
    ) -> Result<RosterPacket, RewriteError> {
        // Every profile must parse before any look is materialized, so a
        // packet that passes through leaves the registry as it was.
        let originals = packet
            .entries
            .iter()
            .map(|entry| Outfit::from_profile(&entry.profile))
            .collect::<Result<Vec<_>, _>>()?;
        let entries = packet
            .entries
            .iter()
            .zip(&originals)
            .map(|(entry, original)| self.create_entry(entry, original, viewer))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RosterPacket {
            action: packet.action,
            entries,
        })
    }

    fn create_entry(
        &self,
        original: &RosterEntry,
        outfit: &Outfit,
        viewer: &Viewer,
    ) -> Result<RosterEntry, RewriteError> {
        let look = self.locker.find_or_create_by_original(outfit)?;
        let outfit = look.choose_outfit(viewer);
        Ok(RosterEntry {
            profile: outfit.to_profile(),
            game_mode: original.game_mode,
            latency: original.latency,
            display_name: original.display_name.clone(),
        })
    }

    /// Points the spawned entity at the identifier the viewer knows the
    /// player by. The look is expected to exist already, materialized by the
    /// roster packet that precedes every spawn.
    pub fn revise_spawn(
        &self,
        packet: &SpawnPlayerPacket,
        viewer: &Viewer,
    ) -> Result<SpawnPlayerPacket, RewriteError> {
        let look = self
            .locker
            .find_by_id(packet.uuid)
            .ok_or(RewriteError::LookMissing(packet.uuid))?;
        Ok(SpawnPlayerPacket {
            uuid: look.choose_outfit(viewer).id,
            ..packet.clone()
        })
    }

    /// Renames team members to the names the viewer sees them under. Only
    /// modes that carry a member list are touched.
    pub fn adjust_team(&self, packet: &TeamPacket, viewer: &Viewer) -> TeamPacket {
        if !packet.mode.carries_members() {
            return packet.clone();
        }
        TeamPacket {
            members: packet
                .members
                .iter()
                .map(|name| self.revise_member(name, viewer))
                .collect(),
            ..packet.clone()
        }
    }

    fn revise_member(&self, name: &str, viewer: &Viewer) -> String {
        self.host
            .player_by_name(name)
            .and_then(|id| self.locker.find_by_id(id))
            .map(|look| look.choose_outfit(viewer).name)
            .unwrap_or_else(|| name.to_string())
    }
}
