//! Configuration loading and typed config structures for the ingest.
//!
//! Settings are layered with the `config` crate:
//!
//! 1. `config/base.yaml`
//! 2. `config/<profile>.yaml` (optional)
//! 3. environment variables prefixed `PLAYGROUND__`, sections separated by
//!    `__` (`PLAYGROUND__SERVER__PORT=9000`)
//!
//! Every section has defaults, so an empty file yields a runnable
//! configuration. Secrets never live in these files; see [`Secrets`].

use std::collections::BTreeMap;
use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use playground_types::{Element, Hallway};
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A source could not be read or the merged result did not deserialize.
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    /// A required secret is not set in the environment.
    #[error("missing secret: {0}")]
    MissingSecret(&'static str),
}

/// Top-level ingest configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Settings {
    /// HTTP listener.
    #[serde(default)]
    pub server: ServerConfig,

    /// Shared store connection.
    #[serde(default)]
    pub store: StoreConfig,

    /// Log level.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Leader ticker cadence.
    #[serde(default)]
    pub ticker: TickerConfig,

    /// Hub channel capacities.
    #[serde(default)]
    pub hub: HubConfig,

    /// Jukebox limits.
    #[serde(default)]
    pub jukebox: JukeboxConfig,

    /// Achievement thresholds.
    #[serde(default)]
    pub achievements: AchievementsConfig,

    /// Single sign-on provider.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Login code mail delivery.
    #[serde(default)]
    pub mail: MailConfig,

    /// Queue notification texts.
    #[serde(default)]
    pub sms: SmsConfig,

    /// Video metadata lookups.
    #[serde(default)]
    pub video: VideoConfig,

    /// The idle non-player character.
    #[serde(default)]
    pub npc: NpcConfig,

    /// Room templates and seeding.
    #[serde(default)]
    pub rooms: RoomsConfig,

    /// Sponsors seeded on reset.
    #[serde(default)]
    pub sponsors: Vec<SponsorSeed>,
}

impl Settings {
    /// Load `base.yaml` and `<profile>.yaml` from `config_dir`, then apply
    /// `PLAYGROUND__*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if `base.yaml` is missing, a file is
    /// not valid YAML, or the merged values do not fit [`Settings`].
    pub fn load(config_dir: &Path, profile: &str) -> Result<Self, ConfigError> {
        let base = config_dir.join("base");
        let overlay = config_dir.join(profile);

        let settings = Config::builder()
            .add_source(File::with_name(&base.to_string_lossy()))
            .add_source(File::with_name(&overlay.to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix("PLAYGROUND")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Parse settings from a YAML string, without file or environment
    /// layers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if the string is not valid YAML or
    /// does not fit [`Settings`].
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Shared store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Redis-scheme URL of the `Dragonfly` instance.
    #[serde(default = "default_store_url")]
    pub url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Leader ticker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TickerConfig {
    /// Milliseconds between ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub interval_ms: u64,

    /// Whether the leader drives the idle NPC.
    #[serde(default)]
    pub npc_enabled: bool,

    /// Ticks between NPC moves.
    #[serde(default = "default_npc_interval_ticks")]
    pub npc_interval_ticks: u64,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_tick_interval_ms(),
            npc_enabled: false,
            npc_interval_ticks: default_npc_interval_ticks(),
        }
    }
}

/// Hub channel capacities.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HubConfig {
    /// Frames buffered per connection before it is dropped.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,

    /// Frames buffered from all readers before they wait.
    #[serde(default = "default_inbound_queue")]
    pub inbound_queue: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_queue: default_outbound_queue(),
            inbound_queue: default_inbound_queue(),
        }
    }
}

/// Jukebox limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JukeboxConfig {
    /// Minutes between songs from one non-organizer.
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: i64,

    /// Songs this long or longer are refused.
    #[serde(default = "default_max_song_seconds")]
    pub max_song_seconds: u32,
}

impl Default for JukeboxConfig {
    fn default() -> Self {
        Self {
            cooldown_minutes: default_cooldown_minutes(),
            max_song_seconds: default_max_song_seconds(),
        }
    }
}

/// Counts at which achievements are granted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AchievementsConfig {
    /// Sponsor rooms visited for `companyTour`.
    #[serde(default = "default_num_sponsors")]
    pub num_sponsors: i64,

    /// Friends made for `hangouts`.
    #[serde(default = "default_num_friends")]
    pub num_friends: u64,
}

impl Default for AchievementsConfig {
    fn default() -> Self {
        Self {
            num_sponsors: default_num_sponsors(),
            num_friends: default_num_friends(),
        }
    }
}

/// Single sign-on configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthConfig {
    /// Base URL of the SSO provider.
    #[serde(default = "default_sso_url")]
    pub sso_url: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            sso_url: default_sso_url(),
        }
    }
}

/// Login code mail configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MailConfig {
    /// HTTP endpoint accepting JSON mail requests. Empty disables mail.
    #[serde(default)]
    pub endpoint: String,

    /// Sender address.
    #[serde(default)]
    pub from: String,

    /// Subject line.
    #[serde(default = "default_mail_subject")]
    pub subject: String,
}

/// Queue notification text configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SmsConfig {
    /// Sending phone number. Empty disables texts.
    #[serde(default)]
    pub from: String,

    /// Base URL of the messaging API.
    #[serde(default = "default_sms_api_base")]
    pub api_base: String,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            from: String::new(),
            api_base: default_sms_api_base(),
        }
    }
}

/// Video metadata configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VideoConfig {
    /// Base URL of the video data API.
    #[serde(default = "default_video_api_base")]
    pub api_base: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            api_base: default_video_api_base(),
        }
    }
}

/// The idle non-player character.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NpcConfig {
    /// Character id.
    #[serde(default = "default_npc_id")]
    pub id: String,

    /// Display name.
    #[serde(default = "default_npc_name")]
    pub name: String,

    /// Profile text.
    #[serde(default)]
    pub bio: String,

    /// Room the NPC lives in.
    #[serde(default = "default_spawn_room")]
    pub room: String,
}

impl Default for NpcConfig {
    fn default() -> Self {
        Self {
            id: default_npc_id(),
            name: default_npc_name(),
            bio: String::new(),
            room: default_spawn_room(),
        }
    }
}

/// Room templates and the rooms created from them on reset.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoomsConfig {
    /// Room new characters start in.
    #[serde(default = "default_spawn_room")]
    pub spawn: String,

    /// Template for lazily created personal rooms.
    #[serde(default = "default_personal_template")]
    pub personal_template: String,

    /// Rooms created on reset.
    #[serde(default)]
    pub seed: Vec<RoomSeed>,

    /// Templates by name.
    #[serde(default)]
    pub templates: BTreeMap<String, RoomTemplate>,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            spawn: default_spawn_room(),
            personal_template: default_personal_template(),
            seed: Vec::new(),
            templates: BTreeMap::new(),
        }
    }
}

/// A room to create on reset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoomSeed {
    /// Room id.
    pub id: String,

    /// Template name.
    pub template: String,
}

/// Layout shared by every room built from it.
///
/// `<id>` in the background or an element path is replaced by the id the
/// room is created for (sponsor rooms use it for their logo).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RoomTemplate {
    /// Background image.
    #[serde(default)]
    pub background: String,

    /// Whether rooms from this template belong to a sponsor.
    #[serde(default)]
    pub sponsor: bool,

    /// Interactive objects.
    #[serde(default)]
    pub elements: Vec<ElementSeed>,

    /// Portals.
    #[serde(default)]
    pub hallways: Vec<HallwaySeed>,
}

/// Template element.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ElementSeed {
    /// Horizontal position.
    #[serde(default)]
    pub x: f64,
    /// Vertical position.
    #[serde(default)]
    pub y: f64,
    /// Width as a fraction of the room.
    #[serde(default)]
    pub width: f64,
    /// Comma-separated image paths.
    #[serde(default)]
    pub path: String,
    /// Client action code.
    #[serde(default)]
    pub action: i32,
}

impl ElementSeed {
    /// Build the element for a room created with id `room_id`.
    pub fn instantiate(&self, id: String, room_id: &str) -> Element {
        Element {
            id,
            x: self.x,
            y: self.y,
            width: self.width,
            path: self.path.replace("<id>", room_id),
            state: 0,
            action: self.action,
        }
    }
}

/// Template hallway.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HallwaySeed {
    /// Center, horizontal.
    #[serde(default)]
    pub x: f64,
    /// Center, vertical.
    #[serde(default)]
    pub y: f64,
    /// Radius.
    #[serde(default)]
    pub radius: f64,
    /// Destination room.
    #[serde(default)]
    pub to: String,
    /// Arrival position, horizontal.
    #[serde(default = "default_half")]
    pub to_x: f64,
    /// Arrival position, vertical.
    #[serde(default = "default_half")]
    pub to_y: f64,
}

impl HallwaySeed {
    /// Build the hallway with the given id.
    pub fn instantiate(&self, id: String) -> Hallway {
        Hallway {
            id,
            x: self.x,
            y: self.y,
            radius: self.radius,
            to: self.to.clone(),
            to_x: self.to_x,
            to_y: self.to_y,
        }
    }
}

/// A sponsor created on reset, along with its room `sponsor:<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SponsorSeed {
    /// Sponsor id.
    pub id: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Blurb shown in the sponsor panel.
    #[serde(default)]
    pub description: String,

    /// Website.
    #[serde(default)]
    pub url: String,

    /// Challenge descriptions.
    #[serde(default)]
    pub challenges: String,

    /// Room template for the sponsor's room.
    #[serde(default = "default_sponsor_template")]
    pub template: String,
}

/// Credentials read from the environment.
///
/// Only `JWT_SECRET` is required; a missing API key disables the matching
/// collaborator.
#[derive(Clone, Default)]
pub struct Secrets {
    /// HMAC key for bearer tokens.
    pub jwt_secret: String,
    /// Video data API key.
    pub youtube_api_key: Option<String>,
    /// Messaging account id.
    pub twilio_account_sid: Option<String>,
    /// Messaging auth token.
    pub twilio_auth_token: Option<String>,
    /// Mail API key.
    pub mail_api_key: Option<String>,
}

impl Secrets {
    /// Secrets with only a token key, for tests and tools.
    pub fn with_jwt_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            ..Self::default()
        }
    }

    /// Read secrets from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSecret`] if `JWT_SECRET` is unset or
    /// empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = env_secret("JWT_SECRET").ok_or(ConfigError::MissingSecret("JWT_SECRET"))?;
        Ok(Self {
            jwt_secret,
            youtube_api_key: env_secret("YOUTUBE_API_KEY"),
            twilio_account_sid: env_secret("TWILIO_ACCOUNT_SID"),
            twilio_auth_token: env_secret("TWILIO_AUTH_TOKEN"),
            mail_api_key: env_secret("MAIL_API_KEY"),
        })
    }
}

impl core::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Secrets")
            .field("jwt_secret", &"<redacted>")
            .field("youtube_api_key", &self.youtube_api_key.as_ref().map(|_| "<redacted>"))
            .field("twilio_account_sid", &self.twilio_account_sid.as_ref().map(|_| "<redacted>"))
            .field("twilio_auth_token", &self.twilio_auth_token.as_ref().map(|_| "<redacted>"))
            .field("mail_api_key", &self.mail_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn env_secret(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8080
}

fn default_store_url() -> String {
    "redis://localhost:6379".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_tick_interval_ms() -> u64 {
    1000
}

const fn default_npc_interval_ticks() -> u64 {
    30
}

const fn default_outbound_queue() -> usize {
    256
}

const fn default_inbound_queue() -> usize {
    1024
}

const fn default_cooldown_minutes() -> i64 {
    15
}

const fn default_max_song_seconds() -> u32 {
    360
}

const fn default_num_sponsors() -> i64 {
    5
}

const fn default_num_friends() -> u64 {
    5
}

fn default_sso_url() -> String {
    "https://my.hackmit.org".to_owned()
}

fn default_mail_subject() -> String {
    "Your Playground login code".to_owned()
}

fn default_sms_api_base() -> String {
    "https://api.twilio.com/2010-04-01".to_owned()
}

fn default_video_api_base() -> String {
    "https://www.googleapis.com/youtube/v3".to_owned()
}

fn default_npc_id() -> String {
    "tim".to_owned()
}

fn default_npc_name() -> String {
    "TIM the Beaver".to_owned()
}

fn default_spawn_room() -> String {
    playground_types::models::DEFAULT_ROOM.to_owned()
}

fn default_personal_template() -> String {
    "personal".to_owned()
}

fn default_sponsor_template() -> String {
    "sponsor".to_owned()
}

const fn default_half() -> f64 {
    0.5
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_runnable() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.ticker.interval_ms, 1000);
        assert_eq!(settings.jukebox.cooldown_minutes, 15);
        assert_eq!(settings.jukebox.max_song_seconds, 360);
        assert_eq!(settings.rooms.spawn, "home");
        assert_eq!(settings.npc.id, "tim");
    }

    #[test]
    fn empty_yaml_uses_defaults() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn parses_templates_and_sponsors() {
        let yaml = r"
server:
  port: 9000
rooms:
  seed:
    - id: home
      template: home
  templates:
    home:
      background: town_square.svg
      elements:
        - x: 0.2
          y: 0.2
          width: 0.1
          path: street_lamp.svg,street_lamp_off.svg
      hallways:
        - x: 0.6
          y: 0.6
          radius: 0.1
          to: plaza
          to_x: 0.1
sponsors:
  - id: acme
    name: Acme
";
        let settings = Settings::parse(yaml).unwrap();
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.host, "0.0.0.0");

        let home = &settings.rooms.templates["home"];
        assert_eq!(home.elements.len(), 1);
        let hallway = home.hallways[0].instantiate("h".to_owned());
        assert_eq!(hallway.to, "plaza");
        assert!((hallway.to_x - 0.1).abs() < f64::EPSILON);
        assert!((hallway.to_y - 0.5).abs() < f64::EPSILON);

        assert_eq!(settings.sponsors[0].template, "sponsor");
    }

    #[test]
    fn element_paths_substitute_the_room_id() {
        let seed = ElementSeed {
            path: "logos/<id>.svg".to_owned(),
            ..ElementSeed::default()
        };
        assert_eq!(seed.instantiate("e".to_owned(), "acme").path, "logos/acme.svg");
    }

    #[test]
    fn load_project_config_files() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("config");
        let settings = Settings::load(&dir, "dev").unwrap();
        assert!(settings.rooms.templates.contains_key("personal"));
        assert!(settings.rooms.seed.iter().any(|room| room.id == "home"));
    }

    #[test]
    fn secrets_debug_is_redacted() {
        let secrets = Secrets::with_jwt_secret("hunter2");
        assert!(!format!("{secrets:?}").contains("hunter2"));
    }
}
