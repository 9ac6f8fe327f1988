use crate::entities::outfit::PlayerUuid;
use crate::net::packet::{PacketReader, PacketWriter};

pub const OPCODE_SPAWN_PLAYER: u8 = 0x04;
pub const OPCODE_ROSTER: u8 = 0x36;
pub const OPCODE_TEAM: u8 = 0x55;

/// Longest profile name a client accepts.
pub const MAX_NAME_LEN: usize = 16;
const MAX_TEXT_LEN: usize = 32_767;
const MAX_PROPERTY_LEN: usize = 0x7fff;
const MAX_PROPERTIES: u8 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    Truncated(&'static str),
    UnexpectedOpcode { expected: u8, found: u8 },
    InvalidString(&'static str),
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
    TooManyProperties(u8),
    UnknownRosterAction(u8),
    UnknownTeamMode(u8),
    InvalidSkin(String),
    TrailingBytes(usize),
}

impl std::fmt::Display for PacketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacketError::Truncated(field) => write!(f, "packet truncated at {field}"),
            PacketError::UnexpectedOpcode { expected, found } => {
                write!(f, "expected opcode 0x{expected:02x}, found 0x{found:02x}")
            }
            PacketError::InvalidString(field) => write!(f, "invalid string in {field}"),
            PacketError::TooLong { field, len, max } => {
                write!(f, "{field} is {len} bytes, limit is {max}")
            }
            PacketError::TooManyProperties(count) => {
                write!(f, "profile carries {count} properties")
            }
            PacketError::UnknownRosterAction(action) => {
                write!(f, "unknown roster action {action}")
            }
            PacketError::UnknownTeamMode(mode) => write!(f, "unknown team mode {mode}"),
            PacketError::InvalidSkin(msg) => write!(f, "invalid skin payload: {msg}"),
            PacketError::TrailingBytes(count) => write!(f, "{count} trailing bytes"),
        }
    }
}

impl std::error::Error for PacketError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub value: String,
    pub signature: Option<String>,
}

/// Account profile as it is embedded in roster entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: PlayerUuid,
    pub name: String,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterAction {
    AddPlayer,
    UpdateGameMode,
    UpdateLatency,
    UpdateDisplayName,
    RemovePlayer,
}

impl RosterAction {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(RosterAction::AddPlayer),
            1 => Some(RosterAction::UpdateGameMode),
            2 => Some(RosterAction::UpdateLatency),
            3 => Some(RosterAction::UpdateDisplayName),
            4 => Some(RosterAction::RemovePlayer),
            _ => None,
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            RosterAction::AddPlayer => 0,
            RosterAction::UpdateGameMode => 1,
            RosterAction::UpdateLatency => 2,
            RosterAction::UpdateDisplayName => 3,
            RosterAction::RemovePlayer => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub profile: Profile,
    pub game_mode: u8,
    pub latency: i32,
    pub display_name: Option<String>,
}

/// Player list (tablist) update sent to one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterPacket {
    pub action: RosterAction,
    pub entries: Vec<RosterEntry>,
}

impl RosterPacket {
    pub fn decode(data: &[u8]) -> Result<Self, PacketError> {
        let mut reader = PacketReader::new(data);
        expect_opcode(&mut reader, OPCODE_ROSTER)?;
        let raw_action = read_u8(&mut reader, "roster action")?;
        let action =
            RosterAction::from_u8(raw_action).ok_or(PacketError::UnknownRosterAction(raw_action))?;
        let count = reader
            .read_u16_le()
            .ok_or(PacketError::Truncated("roster count"))?;
        let mut entries = Vec::with_capacity(usize::from(count).min(reader.remaining()));
        for _ in 0..count {
            let profile = read_profile(&mut reader)?;
            let game_mode = read_u8(&mut reader, "game mode")?;
            let latency = reader
                .read_i32_le()
                .ok_or(PacketError::Truncated("latency"))?;
            let display_name = if read_flag(&mut reader, "display name flag")? {
                Some(read_string(&mut reader, MAX_TEXT_LEN, "display name")?)
            } else {
                None
            };
            entries.push(RosterEntry {
                profile,
                game_mode,
                latency,
                display_name,
            });
        }
        expect_end(&reader)?;
        Ok(Self { action, entries })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = PacketWriter::with_capacity(4 + self.entries.len() * 64);
        writer.write_u8(OPCODE_ROSTER);
        writer.write_u8(self.action.to_u8());
        writer.write_u16_le(self.entries.len() as u16);
        for entry in &self.entries {
            write_profile(&mut writer, &entry.profile);
            writer.write_u8(entry.game_mode);
            writer.write_i32_le(entry.latency);
            writer.write_bool(entry.display_name.is_some());
            if let Some(display_name) = entry.display_name.as_deref() {
                writer.write_string_str(display_name);
            }
        }
        writer.into_vec()
    }
}

/// Introduces another player's entity to a connection. The player is
/// referenced by identifier only.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnPlayerPacket {
    pub entity_id: u32,
    pub uuid: PlayerUuid,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: u8,
    pub pitch: u8,
}

impl SpawnPlayerPacket {
    pub fn decode(data: &[u8]) -> Result<Self, PacketError> {
        let mut reader = PacketReader::new(data);
        expect_opcode(&mut reader, OPCODE_SPAWN_PLAYER)?;
        let entity_id = reader
            .read_u32_le()
            .ok_or(PacketError::Truncated("entity id"))?;
        let uuid = read_uuid(&mut reader)?;
        let x = read_coordinate(&mut reader)?;
        let y = read_coordinate(&mut reader)?;
        let z = read_coordinate(&mut reader)?;
        let yaw = read_u8(&mut reader, "yaw")?;
        let pitch = read_u8(&mut reader, "pitch")?;
        expect_end(&reader)?;
        Ok(Self {
            entity_id,
            uuid,
            x,
            y,
            z,
            yaw,
            pitch,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = PacketWriter::with_capacity(47);
        writer.write_u8(OPCODE_SPAWN_PLAYER);
        writer.write_u32_le(self.entity_id);
        writer.write_u128_be(self.uuid.0);
        writer.write_f64_le(self.x);
        writer.write_f64_le(self.y);
        writer.write_f64_le(self.z);
        writer.write_u8(self.yaw);
        writer.write_u8(self.pitch);
        writer.into_vec()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamMode {
    Created,
    Removed,
    InfoUpdated,
    PlayersAdded,
    PlayersRemoved,
}

impl TeamMode {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(TeamMode::Created),
            1 => Some(TeamMode::Removed),
            2 => Some(TeamMode::InfoUpdated),
            3 => Some(TeamMode::PlayersAdded),
            4 => Some(TeamMode::PlayersRemoved),
            _ => None,
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            TeamMode::Created => 0,
            TeamMode::Removed => 1,
            TeamMode::InfoUpdated => 2,
            TeamMode::PlayersAdded => 3,
            TeamMode::PlayersRemoved => 4,
        }
    }

    pub fn carries_info(self) -> bool {
        matches!(self, TeamMode::Created | TeamMode::InfoUpdated)
    }

    /// Modes whose packets carry a member list.
    pub fn carries_members(self) -> bool {
        matches!(
            self,
            TeamMode::Created | TeamMode::PlayersAdded | TeamMode::PlayersRemoved
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamInfo {
    pub display_name: String,
    pub prefix: String,
    pub suffix: String,
    pub flags: u8,
    pub color: u8,
}

/// Named group and its member names. `info` is present exactly for modes
/// that carry it, `members` is empty for modes that do not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamPacket {
    pub name: String,
    pub mode: TeamMode,
    pub info: Option<TeamInfo>,
    pub members: Vec<String>,
}

impl TeamPacket {
    pub fn decode(data: &[u8]) -> Result<Self, PacketError> {
        let mut reader = PacketReader::new(data);
        expect_opcode(&mut reader, OPCODE_TEAM)?;
        let name = read_string(&mut reader, MAX_TEXT_LEN, "team name")?;
        let raw_mode = read_u8(&mut reader, "team mode")?;
        let mode = TeamMode::from_u8(raw_mode).ok_or(PacketError::UnknownTeamMode(raw_mode))?;
        let info = if mode.carries_info() {
            Some(TeamInfo {
                display_name: read_string(&mut reader, MAX_TEXT_LEN, "team display name")?,
                prefix: read_string(&mut reader, MAX_TEXT_LEN, "team prefix")?,
                suffix: read_string(&mut reader, MAX_TEXT_LEN, "team suffix")?,
                flags: read_u8(&mut reader, "team flags")?,
                color: read_u8(&mut reader, "team color")?,
            })
        } else {
            None
        };
        let mut members = Vec::new();
        if mode.carries_members() {
            let count = reader
                .read_u16_le()
                .ok_or(PacketError::Truncated("member count"))?;
            for _ in 0..count {
                members.push(read_string(&mut reader, MAX_TEXT_LEN, "member")?);
            }
        }
        expect_end(&reader)?;
        Ok(Self {
            name,
            mode,
            info,
            members,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = PacketWriter::new();
        writer.write_u8(OPCODE_TEAM);
        writer.write_string_str(&self.name);
        writer.write_u8(self.mode.to_u8());
        if self.mode.carries_info() {
            let info = self.info.clone().unwrap_or_default();
            writer.write_string_str(&info.display_name);
            writer.write_string_str(&info.prefix);
            writer.write_string_str(&info.suffix);
            writer.write_u8(info.flags);
            writer.write_u8(info.color);
        }
        if self.mode.carries_members() {
            writer.write_u16_le(self.members.len() as u16);
            for member in &self.members {
                writer.write_string_str(member);
            }
        }
        writer.into_vec()
    }
}

fn expect_opcode(reader: &mut PacketReader<'_>, expected: u8) -> Result<(), PacketError> {
    let found = read_u8(reader, "opcode")?;
    if found != expected {
        return Err(PacketError::UnexpectedOpcode { expected, found });
    }
    Ok(())
}

fn expect_end(reader: &PacketReader<'_>) -> Result<(), PacketError> {
    match reader.remaining() {
        0 => Ok(()),
        count => Err(PacketError::TrailingBytes(count)),
    }
}

fn read_u8(reader: &mut PacketReader<'_>, field: &'static str) -> Result<u8, PacketError> {
    reader.read_u8().ok_or(PacketError::Truncated(field))
}

fn read_flag(reader: &mut PacketReader<'_>, field: &'static str) -> Result<bool, PacketError> {
    reader.read_bool().ok_or(PacketError::Truncated(field))
}

fn read_uuid(reader: &mut PacketReader<'_>) -> Result<PlayerUuid, PacketError> {
    reader
        .read_u128_be()
        .map(PlayerUuid)
        .ok_or(PacketError::Truncated("uuid"))
}

fn read_coordinate(reader: &mut PacketReader<'_>) -> Result<f64, PacketError> {
    reader
        .read_f64_le()
        .ok_or(PacketError::Truncated("position"))
}

fn read_string(
    reader: &mut PacketReader<'_>,
    max_len: usize,
    field: &'static str,
) -> Result<String, PacketError> {
    let len = reader
        .read_len_prefixed()
        .ok_or(PacketError::Truncated(field))?;
    if len > max_len {
        return Err(PacketError::TooLong {
            field,
            len,
            max: max_len,
        });
    }
    let bytes = reader.read_bytes(len).ok_or(PacketError::Truncated(field))?;
    String::from_utf8(bytes.to_vec()).map_err(|_| PacketError::InvalidString(field))
}

fn read_profile(reader: &mut PacketReader<'_>) -> Result<Profile, PacketError> {
    let id = read_uuid(reader)?;
    let name = read_string(reader, MAX_NAME_LEN, "profile name")?;
    let count = read_u8(reader, "property count")?;
    if count > MAX_PROPERTIES {
        return Err(PacketError::TooManyProperties(count));
    }
    let mut properties = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let name = read_string(reader, MAX_PROPERTY_LEN, "property name")?;
        let value = read_string(reader, MAX_PROPERTY_LEN, "property value")?;
        let signature = if read_flag(reader, "signature flag")? {
            Some(read_string(reader, MAX_PROPERTY_LEN, "property signature")?)
        } else {
            None
        };
        properties.push(Property {
            name,
            value,
            signature,
        });
    }
    Ok(Profile {
        id,
        name,
        properties,
    })
}

fn write_profile(writer: &mut PacketWriter, profile: &Profile) {
    writer.write_u128_be(profile.id.0);
    writer.write_string_str(&profile.name);
    writer.write_u8(profile.properties.len().min(usize::from(MAX_PROPERTIES)) as u8);
    for property in profile.properties.iter().take(usize::from(MAX_PROPERTIES)) {
        writer.write_string_str(&property.name);
        writer.write_string_str(&property.value);
        writer.write_bool(property.signature.is_some());
        if let Some(signature) = property.signature.as_deref() {
            writer.write_string_str(signature);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_profile() -> Profile {
        Profile {
            id: PlayerUuid(0xaa),
            name: "Alice".to_string(),
            properties: vec![Property {
                name: "textures".to_string(),
                value: "dGV4dHVyZQ==".to_string(),
                signature: Some("c2ln".to_string()),
            }],
        }
    }

    #[test]
    fn spawn_player_layout() {
        let packet = SpawnPlayerPacket {
            entity_id: 0x0102_0304,
            uuid: PlayerUuid(0x11),
            x: 0.0,
            y: 0.0,
            z: 0.0,
            yaw: 0x7f,
            pitch: 0x01,
        };
        let bytes = packet.encode();
        assert_eq!(bytes.len(), 47);
        assert_eq!(&bytes[..5], &[OPCODE_SPAWN_PLAYER, 0x04, 0x03, 0x02, 0x01]);
        assert_eq!(bytes[20], 0x11);
        assert_eq!(&bytes[45..], &[0x7f, 0x01]);
        assert_eq!(SpawnPlayerPacket::decode(&bytes), Ok(packet));
    }

    #[test]
    fn roster_keeps_optional_display_name() {
        let packet = RosterPacket {
            action: RosterAction::AddPlayer,
            entries: vec![
                RosterEntry {
                    profile: sample_profile(),
                    game_mode: 1,
                    latency: 42,
                    display_name: Some("[VIP] Alice".to_string()),
                },
                RosterEntry {
                    profile: Profile {
                        id: PlayerUuid(0xbb),
                        name: "Bob".to_string(),
                        properties: Vec::new(),
                    },
                    game_mode: 0,
                    latency: -1,
                    display_name: None,
                },
            ],
        };
        assert_eq!(RosterPacket::decode(&packet.encode()), Ok(packet));
    }

    #[test]
    fn roster_rejects_truncation_and_trailing_bytes() {
        let packet = RosterPacket {
            action: RosterAction::UpdateLatency,
            entries: vec![RosterEntry {
                profile: sample_profile(),
                game_mode: 0,
                latency: 5,
                display_name: None,
            }],
        };
        let bytes = packet.encode();
        assert!(matches!(
            RosterPacket::decode(&bytes[..bytes.len() - 1]),
            Err(PacketError::Truncated(_))
        ));
        let mut padded = bytes.clone();
        padded.push(0);
        assert_eq!(
            RosterPacket::decode(&padded),
            Err(PacketError::TrailingBytes(1))
        );
    }

    #[test]
    fn roster_rejects_unknown_action() {
        let bytes = [OPCODE_ROSTER, 9, 0, 0];
        assert_eq!(
            RosterPacket::decode(&bytes),
            Err(PacketError::UnknownRosterAction(9))
        );
    }

    #[test]
    fn decode_checks_opcode() {
        let bytes = [OPCODE_TEAM, 0, 0, 1];
        assert_eq!(
            RosterPacket::decode(&bytes),
            Err(PacketError::UnexpectedOpcode {
                expected: OPCODE_ROSTER,
                found: OPCODE_TEAM
            })
        );
    }

    #[test]
    fn team_sections_follow_mode() {
        let removed = TeamPacket {
            name: "red".to_string(),
            mode: TeamMode::Removed,
            info: None,
            members: Vec::new(),
        };
        let bytes = removed.encode();
        assert_eq!(bytes, vec![OPCODE_TEAM, 3, 0, b'r', b'e', b'd', 1]);
        assert_eq!(TeamPacket::decode(&bytes), Ok(removed));

        let created = TeamPacket {
            name: "red".to_string(),
            mode: TeamMode::Created,
            info: Some(TeamInfo {
                display_name: "Red".to_string(),
                prefix: "[R] ".to_string(),
                suffix: String::new(),
                flags: 0x03,
                color: 12,
            }),
            members: vec!["Alice".to_string(), "Bob".to_string()],
        };
        assert_eq!(TeamPacket::decode(&created.encode()), Ok(created));
    }

    #[test]
    fn profile_name_limit_is_enforced() {
        let packet = RosterPacket {
            action: RosterAction::AddPlayer,
            entries: vec![RosterEntry {
                profile: Profile {
                    id: PlayerUuid(1),
                    name: "a-name-that-is-far-too-long".to_string(),
                    properties: Vec::new(),
                },
                game_mode: 0,
                latency: 0,
                display_name: None,
            }],
        };
        assert_eq!(
            RosterPacket::decode(&packet.encode()),
            Err(PacketError::TooLong {
                field: "profile name",
                len: 27,
                max: MAX_NAME_LEN,
            })
        );
    }

    #[test]
    fn short_string_body_is_truncation() {
        let mut bytes = RosterPacket {
            action: RosterAction::AddPlayer,
            entries: vec![RosterEntry {
                profile: sample_profile(),
                game_mode: 0,
                latency: 0,
                display_name: None,
            }],
        }
        .encode();
        // opcode, action, count, uuid, then the name's length prefix
        bytes.truncate(1 + 1 + 2 + 16 + 2 + 3);
        assert_eq!(
            RosterPacket::decode(&bytes),
            Err(PacketError::Truncated("profile name"))
        );
    }
}
