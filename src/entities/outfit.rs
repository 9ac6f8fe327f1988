use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64_ENGINE;
use base64::Engine as _;
use sha1::{Digest, Sha1};

use crate::net::protocol::{PacketError, Profile, Property};

/// Profile property that carries the skin texture payload.
pub const TEXTURES_PROPERTY: &str = "textures";

const OFFLINE_NAMESPACE: &str = "OfflinePlayer:";
const DISGUISE_NAMESPACE: &str = "Disguise:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerUuid(pub u128);

impl PlayerUuid {
    /// Identifier for a player without an authenticated account.
    pub fn offline(name: &str) -> Self {
        Self::name_based(OFFLINE_NAMESPACE, name)
    }

    /// Identifier for a synthesized disguise. Lives in its own namespace so a
    /// disguise named after a real player never collides with that player.
    pub fn disguise(name: &str) -> Self {
        Self::name_based(DISGUISE_NAMESPACE, name)
    }

    fn name_based(namespace: &str, name: &str) -> Self {
        let mut sha1 = Sha1::new();
        sha1.update(namespace.as_bytes());
        sha1.update(name.as_bytes());
        let digest = sha1.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        // version 5, RFC 4122 variant
        bytes[6] = (bytes[6] & 0x0f) | 0x50;
        bytes[8] = (bytes[8] & 0x3f) | 0x80;
        Self(u128::from_be_bytes(bytes))
    }

    /// Accepts both the hyphenated and the plain 32-digit form.
    pub fn parse(text: &str) -> Option<Self> {
        let digits: String = text.trim().chars().filter(|ch| *ch != '-').collect();
        if digits.len() != 32 {
            return None;
        }
        u128::from_str_radix(&digits, 16).ok().map(Self)
    }
}

impl fmt::Display for PlayerUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.0;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            (value >> 96) as u32,
            (value >> 80) as u16,
            (value >> 64) as u16,
            (value >> 48) as u16,
            value & 0xffff_ffff_ffff
        )
    }
}

/// Signed skin texture payload. `value` is base64 text as the client expects
/// it on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skin {
    pub value: String,
    pub signature: Option<String>,
}

impl Skin {
    pub fn new(value: impl Into<String>, signature: Option<String>) -> Result<Self, String> {
        let skin = Self {
            value: value.into(),
            signature,
        };
        skin.decode()
            .map_err(|err| format!("skin value is not valid base64: {err}"))?;
        Ok(skin)
    }

    pub fn from_texture_bytes(bytes: &[u8], signature: Option<String>) -> Self {
        Self {
            value: BASE64_ENGINE.encode(bytes),
            signature,
        }
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64_ENGINE.decode(self.value.trim())
    }
}

/// A visual identity: the (id, name, skin) triple a client renders for a
/// player. Two outfits are the same look iff their ids match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outfit {
    pub id: PlayerUuid,
    pub name: String,
    pub skin: Option<Skin>,
}

impl Outfit {
    pub fn new(id: PlayerUuid, name: impl Into<String>, skin: Option<Skin>) -> Self {
        Self {
            id,
            name: name.into(),
            skin,
        }
    }

    pub fn disguise(name: impl Into<String>, skin: Option<Skin>) -> Self {
        let name = name.into();
        Self {
            id: PlayerUuid::disguise(&name),
            name,
            skin,
        }
    }

    pub fn same_look(&self, other: &Outfit) -> bool {
        self.id == other.id
    }

    /// Extracts the outfit carried by a wire profile. Properties other than
    /// the textures are not part of the look and are dropped.
    pub fn from_profile(profile: &Profile) -> Result<Self, PacketError> {
        let skin = match profile
            .properties
            .iter()
            .find(|property| property.name == TEXTURES_PROPERTY)
        {
            Some(property) => {
                let skin = Skin {
                    value: property.value.clone(),
                    signature: property.signature.clone(),
                };
                if let Err(err) = skin.decode() {
                    return Err(PacketError::InvalidSkin(format!(
                        "{} ({}): {err}",
                        profile.name, profile.id
                    )));
                }
                Some(skin)
            }
            None => None,
        };
        Ok(Self {
            id: profile.id,
            name: profile.name.clone(),
            skin,
        })
    }

    pub fn to_profile(&self) -> Profile {
        let properties = self
            .skin
            .iter()
            .map(|skin| Property {
                name: TEXTURES_PROPERTY.to_string(),
                value: skin.value.clone(),
                signature: skin.signature.clone(),
            })
            .collect();
        Profile {
            id: self.id,
            name: self.name.clone(),
            properties,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_display_and_parse_agree() {
        let id = PlayerUuid(0x0123_4567_89ab_cdef_0011_2233_4455_6677);
        let text = id.to_string();
        assert_eq!(text, "01234567-89ab-cdef-0011-223344556677");
        assert_eq!(PlayerUuid::parse(&text), Some(id));
        assert_eq!(
            PlayerUuid::parse("0123456789abcdef0011223344556677"),
            Some(id)
        );
        assert_eq!(PlayerUuid::parse("not-a-uuid"), None);
    }

    #[test]
    fn name_based_ids_are_stable_and_namespaced() {
        let offline = PlayerUuid::offline("Shadow");
        assert_eq!(offline, PlayerUuid::offline("Shadow"));
        assert_ne!(offline, PlayerUuid::disguise("Shadow"));
        let text = PlayerUuid::disguise("Shadow").to_string();
        assert_eq!(&text[14..15], "5");
    }

    #[test]
    fn skin_rejects_non_base64() {
        assert!(Skin::new("dGV4dHVyZQ==", None).is_ok());
        assert!(Skin::new("not base64 !!", None).is_err());
    }

    #[test]
    fn profile_conversion_keeps_textures_only() {
        let profile = Profile {
            id: PlayerUuid(7),
            name: "Alice".to_string(),
            properties: vec![
                Property {
                    name: "cape".to_string(),
                    value: "eA==".to_string(),
                    signature: None,
                },
                Property {
                    name: TEXTURES_PROPERTY.to_string(),
                    value: "dGV4dHVyZQ==".to_string(),
                    signature: Some("sig".to_string()),
                },
            ],
        };
        let outfit = Outfit::from_profile(&profile).expect("outfit");
        assert_eq!(outfit.name, "Alice");
        assert_eq!(
            outfit.skin.as_ref().and_then(|skin| skin.signature.as_deref()),
            Some("sig")
        );
        let renamed = Outfit::new(PlayerUuid(7), "Alicia", None);
        assert!(outfit.same_look(&renamed));
        assert!(!outfit.same_look(&Outfit::disguise("Alice", None)));
        let back = outfit.to_profile();
        assert_eq!(back.properties.len(), 1);
        assert_eq!(back.properties[0].name, TEXTURES_PROPERTY);
    }

    #[test]
    fn profile_with_broken_textures_is_rejected() {
        let profile = Profile {
            id: PlayerUuid(7),
            name: "Alice".to_string(),
            properties: vec![Property {
                name: TEXTURES_PROPERTY.to_string(),
                value: "%%%".to_string(),
                signature: None,
            }],
        };
        assert!(matches!(
            Outfit::from_profile(&profile),
            Err(PacketError::InvalidSkin(_))
        ));
    }
}
