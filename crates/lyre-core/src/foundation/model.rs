//! Data records describing the entities a host exposes to scripts.
//!
//! These are plain snapshots: they carry what the host knew at the time the
//! record was produced and no behaviour. The framework pairs them with the
//! host to build actionable handles (`Client`, `Channel`, ...).

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Enumerations
// =============================================================================

/// The chat backend an instance is connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// TeamSpeak 3.
    #[default]
    Ts3,
    /// Discord.
    Discord,
}

impl BackendKind {
    /// Returns the wire name (`"ts3"` / `"discord"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ts3 => "ts3",
            Self::Discord => "discord",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a chat message reached the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum MessageMode {
    /// Direct message.
    #[default]
    Private = 1,
    /// Channel chat.
    Channel = 2,
    /// Server-wide chat.
    Server = 3,
}

impl From<MessageMode> for u8 {
    fn from(mode: MessageMode) -> Self {
        mode as u8
    }
}

impl TryFrom<u8> for MessageMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Private),
            2 => Ok(Self::Channel),
            3 => Ok(Self::Server),
            other => Err(format!("unknown message mode {other}")),
        }
    }
}

/// Client connection type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ClientType {
    /// Server query client.
    Query = 0,
    /// Regular voice client.
    #[default]
    Normal = 1,
}

impl From<ClientType> for u8 {
    fn from(kind: ClientType) -> Self {
        kind as u8
    }
}

impl TryFrom<u8> for ClientType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Query),
            1 => Ok(Self::Normal),
            other => Err(format!("unknown client type {other}")),
        }
    }
}

/// Channel kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ChannelType {
    /// Voice channel.
    #[default]
    Voice = 0,
    /// Text channel (Discord).
    Text = 1,
}

impl From<ChannelType> for u8 {
    fn from(kind: ChannelType) -> Self {
        kind as u8
    }
}

impl TryFrom<u8> for ChannelType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Voice),
            1 => Ok(Self::Text),
            other => Err(format!("unknown channel type {other}")),
        }
    }
}

/// Flags for [`AudioHost::set_audio_return_channel`](crate::AudioHost::set_audio_return_channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioReturnFlags(pub u8);

impl AudioReturnFlags {
    /// No return channel.
    pub const NONE: Self = Self(0x00);
    /// Mono return channel.
    pub const MONO: Self = Self(0x01);
    /// Return channel feeding speech recognition.
    pub const SPEECH: Self = Self(0x02);

    /// Returns `true` if all bits of `other` are set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for AudioReturnFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// =============================================================================
// Entity Records
// =============================================================================

/// Snapshot of a connected client.
///
/// Fields the host cannot see (e.g. for invisible clients) stay at their
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientInfo {
    /// Temporary per-connection id.
    pub id: String,
    /// Persistent unique id.
    pub uid: String,
    /// Server database id.
    pub database_id: String,
    /// Nickname.
    pub name: String,
    pub phonetic_name: String,
    pub description: String,
    pub country: String,
    pub platform: String,
    pub version: String,
    #[serde(rename = "type")]
    pub client_type: ClientType,
    /// Whether this is the bot's own client.
    pub is_self: bool,
    pub is_recording: bool,
    pub is_muted: bool,
    pub is_deaf: bool,
    pub is_away: bool,
    pub away_message: String,
    /// Round-trip time in milliseconds.
    pub ping: u64,
    pub ip_address: String,
    /// Milliseconds since the client connected.
    pub online_time: u64,
    /// Milliseconds since the client was last active.
    pub idle_time: u64,
    /// Packet loss as a fraction between 0 and 1.
    pub packet_loss: f64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub total_connections: u64,
    /// Unix timestamp in milliseconds of the first connection.
    pub creation_time: u64,
    /// Ids of the server groups the client is in.
    pub server_groups: Vec<String>,
    /// Id of the client's channel group.
    pub channel_group: Option<String>,
    /// Ids of the channels the client is in (several on Discord).
    pub channels: Vec<String>,
    /// Id of the voice channel the client is in.
    pub audio_channel: Option<String>,
}

impl ClientInfo {
    /// Creates a record with only id, uid and nickname set.
    pub fn new(id: impl Into<String>, uid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uid: uid.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Returns the client URL understood by TS3 chat markup.
    pub fn url(&self) -> String {
        format!("client://0/{}~{}", self.uid, self.name)
    }
}

/// Snapshot of a channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    /// Parent channel id; `None` for top-level channels.
    pub parent: Option<String>,
    /// Order relative to siblings.
    pub position: i64,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub topic: String,
    pub description: String,
    pub codec: u32,
    pub codec_quality: u32,
    /// Maximum clients; `-1` means unlimited.
    pub max_clients: i64,
    /// Maximum clients including sub-channels; `-1` means unlimited.
    pub max_family_clients: i64,
    pub permanent: bool,
    pub semi_permanent: bool,
    pub default: bool,
    pub passworded: bool,
    pub encrypted: bool,
    /// Ids of the clients currently in the channel.
    pub clients: Vec<String>,
}

impl ChannelInfo {
    /// Creates a record with only id and name set.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            max_clients: -1,
            max_family_clients: -1,
            ..Default::default()
        }
    }
}

/// Channel properties for create and bulk update requests.
///
/// Unset fields are left untouched by an update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelParams {
    pub name: Option<String>,
    /// Parent channel id; required when creating on TS3.
    pub parent: Option<String>,
    pub description: Option<String>,
    pub topic: Option<String>,
    pub password: Option<String>,
    pub codec: Option<u32>,
    pub codec_quality: Option<u32>,
    pub encrypted: Option<bool>,
    pub permanent: Option<bool>,
    pub semi_permanent: Option<bool>,
    pub position: Option<i64>,
    pub max_clients: Option<i64>,
    pub max_family_clients: Option<i64>,
    pub default: Option<bool>,
    pub needed_talk_power: Option<i64>,
    /// Seconds before an empty temporary channel is removed.
    pub delete_delay: Option<u64>,
    pub icon: Option<String>,
}

impl ChannelParams {
    /// Starts a parameter set for a channel with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Sets the parent channel.
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Applies every set field to `channel`.
    pub fn apply_to(&self, channel: &mut ChannelInfo) {
        macro_rules! copy {
            ($($field:ident),*) => {
                $(if let Some(value) = &self.$field {
                    channel.$field = value.clone();
                })*
            };
        }
        copy!(
            name,
            description,
            topic,
            codec,
            codec_quality,
            encrypted,
            permanent,
            semi_permanent,
            position,
            max_clients,
            max_family_clients,
            default
        );
        if self.parent.is_some() {
            channel.parent.clone_from(&self.parent);
        }
        if let Some(password) = &self.password {
            channel.passworded = !password.is_empty();
        }
    }
}

/// A server group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerGroupInfo {
    pub id: String,
    pub name: String,
    /// Icon id, empty when the group has none.
    pub icon: String,
}

/// A channel group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelGroupInfo {
    pub id: String,
    pub name: String,
    pub icon: String,
}

/// A permission entry on a group or channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionInfo {
    /// Numeric id or symbolic name such as `i_channel_needed_join_power`.
    pub id: String,
    pub name: String,
    pub value: i64,
    pub skip: bool,
    pub negated: bool,
}

/// What a permission is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum PermissionTarget {
    ServerGroup(String),
    ChannelGroup(String),
    Channel(String),
}

/// A web interface user of the bot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    /// Privilege bitmask.
    pub privileges: u32,
    /// Unique id of the bound TeamSpeak client.
    pub ts_uid: String,
    /// Server group whose members share this user's privileges.
    pub ts_group_id: String,
}

impl UserInfo {
    /// Privilege bit granting full administrative access.
    pub const ADMIN: u32 = 1 << 0;

    /// Returns `true` if the user holds the admin privilege.
    pub fn is_admin(&self) -> bool {
        self.privileges & Self::ADMIN != 0
    }
}

/// A track in the bot's library.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackInfo {
    pub id: String,
    pub url: String,
    #[serde(rename = "type")]
    pub track_type: String,
    pub title: String,
    pub artist: String,
    /// Title reported by a stream, if any.
    pub temp_title: String,
    /// Artist reported by a stream, if any.
    pub temp_artist: String,
    pub album: String,
    pub genre: String,
    /// Duration in milliseconds.
    pub duration: u64,
    pub track_number: u32,
    /// Thumbnail file name, empty when unset.
    pub thumbnail: String,
    pub filename: String,
}

/// A playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistInfo {
    pub id: String,
    pub name: String,
}

/// An entry of a playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistTrackInfo {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_url() {
        let client = ClientInfo::new("7", "abc=", "Alice");
        assert_eq!(client.url(), "client://0/abc=~Alice");
    }

    #[test]
    fn test_message_mode_wire_format() {
        assert_eq!(serde_json::to_value(MessageMode::Channel).unwrap(), 2);
        let mode: MessageMode = serde_json::from_value(serde_json::json!(3)).unwrap();
        assert_eq!(mode, MessageMode::Server);
        assert!(serde_json::from_value::<MessageMode>(serde_json::json!(9)).is_err());
    }

    #[test]
    fn test_channel_params_apply() {
        let mut channel = ChannelInfo::new("1", "Lobby");
        ChannelParams {
            topic: Some("music".into()),
            max_clients: Some(10),
            password: Some("secret".into()),
            ..Default::default()
        }
        .apply_to(&mut channel);

        assert_eq!(channel.name, "Lobby");
        assert_eq!(channel.topic, "music");
        assert_eq!(channel.max_clients, 10);
        assert!(channel.passworded);
    }

    #[test]
    fn test_audio_flags() {
        let flags = AudioReturnFlags::MONO | AudioReturnFlags::SPEECH;
        assert!(flags.contains(AudioReturnFlags::SPEECH));
        assert!(!AudioReturnFlags::MONO.contains(AudioReturnFlags::SPEECH));
    }
}
