use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::entities::outfit::{Outfit, PlayerUuid, Skin};
use crate::locker::DisguiseFactory;
use crate::net::protocol::MAX_NAME_LEN;

#[derive(Debug)]
pub struct AppConfig {
    pub config_path: PathBuf,
    pub log_dir: PathBuf,
}

impl AppConfig {
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        if args.len() < 2 {
            return Err("usage: locker <config.yaml> [log_dir]".to_string());
        }

        let config_path = Path::new(&args[1]).to_path_buf();
        let log_dir = if args.len() > 2 {
            PathBuf::from(&args[2])
        } else {
            std::env::var("LOCKER_LOG_DIR")
                .ok()
                .and_then(|value| {
                    let trimmed = value.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        Some(PathBuf::from(trimmed))
                    }
                })
                .unwrap_or_else(|| default_log_dir(&config_path))
        };
        Ok(Self {
            config_path,
            log_dir,
        })
    }
}

fn default_log_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join("log"),
        _ => PathBuf::from("log"),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkinEntry {
    pub value: String,
    #[serde(default)]
    pub signature: Option<String>,
}

impl SkinEntry {
    fn to_skin(&self) -> Result<Skin, String> {
        Skin::new(self.value.trim(), self.signature.clone())
    }
}

/// A player known to the preview roster.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlayerEntry {
    pub name: String,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub skin: Option<SkinEntry>,
}

impl PlayerEntry {
    pub fn id(&self) -> Result<PlayerUuid, String> {
        match self.uuid.as_deref() {
            Some(text) => PlayerUuid::parse(text)
                .ok_or_else(|| format!("player {}: invalid uuid {:?}", self.name, text)),
            None => Ok(PlayerUuid::offline(&self.name)),
        }
    }

    pub fn outfit(&self) -> Result<Outfit, String> {
        let skin = self
            .skin
            .as_ref()
            .map(SkinEntry::to_skin)
            .transpose()
            .map_err(|err| format!("player {}: {}", self.name, err))?;
        Ok(Outfit::new(self.id()?, self.name.clone(), skin))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DisguiseEntry {
    pub player: String,
    pub name: String,
    #[serde(default)]
    pub skin: Option<SkinEntry>,
}

impl DisguiseEntry {
    pub fn outfit(&self) -> Result<Outfit, String> {
        let skin = self
            .skin
            .as_ref()
            .map(SkinEntry::to_skin)
            .transpose()
            .map_err(|err| format!("disguise for {}: {}", self.player, err))?;
        Ok(Outfit::disguise(self.name.clone(), skin))
    }
}

/// Disguise configuration loaded from YAML.
///
/// ```yaml
/// players:
///   - name: Alice
///   - name: Bob
///     uuid: 0d0c4ca5-a1b2-4c3d-8e9f-00112233aabb
/// disguises:
///   - player: Alice
///     name: Shadow
///     skin:
///       value: eyJ0ZXh0dXJlcyI6e319
/// exempt:
///   - Bob
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockerConfig {
    #[serde(default)]
    pub players: Vec<PlayerEntry>,
    #[serde(default)]
    pub disguises: Vec<DisguiseEntry>,
    #[serde(default)]
    pub exempt: Vec<String>,
}

impl LockerConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| format!("read config {} failed: {}", path.display(), err))?;
        Self::from_yaml(&text).map_err(|err| format!("config {}: {}", path.display(), err))
    }

    pub fn from_yaml(text: &str) -> Result<Self, String> {
        let config: LockerConfig =
            serde_yaml::from_str(text).map_err(|err| format!("parse failed: {}", err))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        for player in &self.players {
            check_name("player", &player.name)?;
            if !names.insert(player.name.to_ascii_lowercase()) {
                return Err(format!("duplicate player {}", player.name));
            }
            if !ids.insert(player.outfit()?.id) {
                return Err(format!("player {}: uuid already in use", player.name));
            }
        }

        let mut disguised = HashSet::new();
        for disguise in &self.disguises {
            check_name("disguised player", &disguise.player)?;
            check_name("disguise", &disguise.name)?;
            if !disguised.insert(disguise.player.to_ascii_lowercase()) {
                return Err(format!(
                    "player {} has more than one disguise",
                    disguise.player
                ));
            }
            disguise.outfit()?;
        }

        for name in &self.exempt {
            check_name("exempt viewer", name)?;
        }
        Ok(())
    }

    pub fn player_outfits(&self) -> Result<Vec<Outfit>, String> {
        self.players.iter().map(PlayerEntry::outfit).collect()
    }

    /// Exempt viewers resolve through the configured players first, so a
    /// player with an explicit uuid is exempt under that uuid.
    pub fn exempt_ids(&self) -> Result<HashSet<PlayerUuid>, String> {
        let mut ids = HashSet::with_capacity(self.exempt.len());
        for name in &self.exempt {
            let id = match self
                .players
                .iter()
                .find(|player| player.name.eq_ignore_ascii_case(name))
            {
                Some(player) => player.id()?,
                None => PlayerUuid::offline(name),
            };
            ids.insert(id);
        }
        Ok(ids)
    }

    pub fn disguise_factory(&self) -> Result<DisguiseFactory, String> {
        let mut factory = DisguiseFactory::new(self.exempt_ids()?);
        for disguise in &self.disguises {
            factory = factory.with_disguise(&disguise.player, disguise.outfit()?);
        }
        Ok(factory)
    }
}

fn check_name(what: &str, name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(format!("{} name is empty", what));
    }
    if trimmed.len() != name.len() {
        return Err(format!("{} name {:?} has surrounding whitespace", what, name));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(format!(
            "{} name {} is longer than {} bytes",
            what, name, MAX_NAME_LEN
        ));
    }
    Ok(())
}
