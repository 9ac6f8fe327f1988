pub mod config;
pub mod entities;
pub mod host;
pub mod locker;
pub mod net;
pub mod preview;
pub mod telemetry;

pub use entities::look::{DisguiseLook, FixedLook, Look};
pub use entities::outfit::{Outfit, PlayerUuid, Skin};
pub use host::local::{HostEvent, LocalHost};
pub use host::{ConnectionId, Host, Tablist, Viewer};
pub use locker::{DisguiseFactory, Locker, LockerError, LookFactory};
pub use net::interceptor::{LookInterceptor, PacketKind, RewriteError};
pub use net::packet::{PacketReader, PacketWriter};
pub use net::protocol::{
    PacketError, Profile, Property, RosterAction, RosterEntry, RosterPacket, SpawnPlayerPacket,
    TeamInfo, TeamMode, TeamPacket,
};

pub fn run(args: &[String]) -> Result<(), String> {
    let config = config::AppConfig::from_args(args)?;
    let locker_config = config::LockerConfig::load(&config.config_path)?;
    telemetry::logging::init(&config.log_dir)?;

    let report = match preview::build_preview(&locker_config) {
        Ok(report) => report,
        Err(err) => {
            telemetry::logging::log_error(&err);
            return Err(err);
        }
    };

    println!("locker: preview");
    println!("- config: {}", config.config_path.display());
    println!("- log dir: {}", config.log_dir.display());
    println!("- players: {}", report.players);
    println!("- disguises: {}", report.disguises);
    println!("- exempt viewers: {}", report.exempt);
    for viewer in &report.viewers {
        println!(
            "- {} (connection {}) sees roster: {}",
            viewer.viewer,
            viewer.connection.0,
            viewer.roster.join(", ")
        );
        println!("  team: {}", viewer.team.join(", "));
        for (player, shown) in &viewer.respawned_as {
            println!("  spawn: {} appears as {}", player, shown);
        }
    }
    Ok(())
}
