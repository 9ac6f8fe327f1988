use std::sync::Arc;

use crate::config::LockerConfig;
use crate::host::local::LocalHost;
use crate::host::ConnectionId;
use crate::locker::Locker;
use crate::net::interceptor::LookInterceptor;
use crate::net::protocol::{
    RosterAction, RosterEntry, RosterPacket, SpawnPlayerPacket, TeamInfo, TeamMode, TeamPacket,
};
use crate::telemetry::logging;

const PREVIEW_TEAM: &str = "preview";

/// What one connected player is shown after rewriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerReport {
    pub viewer: String,
    pub connection: ConnectionId,
    /// Tablist names, in roster order.
    pub roster: Vec<String>,
    /// Team member names, in roster order.
    pub team: Vec<String>,
    /// Players whose spawn carries an identifier other than their own.
    pub respawned_as: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewReport {
    pub players: usize,
    pub disguises: usize,
    pub exempt: usize,
    pub viewers: Vec<ViewerReport>,
}

/// Joins every configured player to an in-process host and sends each of
/// them the same roster, team and spawn packets through the interceptor.
pub fn build_preview(config: &LockerConfig) -> Result<PreviewReport, String> {
    let outfits = config.player_outfits()?;
    let factory = config.disguise_factory()?;
    let disguises = factory.len();

    let host = Arc::new(LocalHost::new());
    let connections: Vec<ConnectionId> = outfits
        .iter()
        .map(|outfit| host.join(outfit.clone()))
        .collect();
    let locker = Arc::new(Locker::new(host.clone(), host.clone()));
    locker
        .register_factory(Box::new(factory))
        .map_err(|err| format!("register factory failed: {}", err))?;
    let interceptor = LookInterceptor::new(Arc::clone(&locker), host.clone());

    let roster = RosterPacket {
        action: RosterAction::AddPlayer,
        entries: outfits
            .iter()
            .map(|outfit| RosterEntry {
                profile: outfit.to_profile(),
                game_mode: 0,
                latency: 0,
                display_name: None,
            })
            .collect(),
    }
    .encode();
    let team = TeamPacket {
        name: PREVIEW_TEAM.to_string(),
        mode: TeamMode::Created,
        info: Some(TeamInfo::default()),
        members: outfits.iter().map(|outfit| outfit.name.clone()).collect(),
    }
    .encode();

    let mut viewers = Vec::with_capacity(outfits.len());
    for (viewer, connection) in outfits.iter().zip(connections.iter().copied()) {
        let seen_roster = RosterPacket::decode(&interceptor.intercept(&roster, connection))
            .map_err(|err| format!("preview roster for {}: {}", viewer.name, err))?;
        let seen_team = TeamPacket::decode(&interceptor.intercept(&team, connection))
            .map_err(|err| format!("preview team for {}: {}", viewer.name, err))?;

        let mut respawned_as = Vec::new();
        for (entity_id, (target, seen)) in outfits.iter().zip(&seen_roster.entries).enumerate() {
            if target.id == viewer.id {
                continue;
            }
            let spawn = SpawnPlayerPacket {
                entity_id: entity_id as u32 + 1,
                uuid: target.id,
                x: 0.0,
                y: 64.0,
                z: 0.0,
                yaw: 0,
                pitch: 0,
            };
            let seen_spawn =
                SpawnPlayerPacket::decode(&interceptor.intercept(&spawn.encode(), connection))
                    .map_err(|err| format!("preview spawn for {}: {}", viewer.name, err))?;
            if seen_spawn.uuid != target.id {
                respawned_as.push((target.name.clone(), seen.profile.name.clone()));
            }
        }

        viewers.push(ViewerReport {
            viewer: viewer.name.clone(),
            connection,
            roster: seen_roster
                .entries
                .into_iter()
                .map(|entry| entry.profile.name)
                .collect(),
            team: seen_team.members,
            respawned_as,
        });
    }

    logging::log_looks(&format!(
        "preview: players={}, disguises={}, tracked looks={}",
        outfits.len(),
        disguises,
        locker.len()
    ));
    Ok(PreviewReport {
        players: outfits.len(),
        disguises,
        exempt: config.exempt.len(),
        viewers,
    })
}
