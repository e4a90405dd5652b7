//! The event model.
//!
//! Every event a host can raise is a variant of the closed [`Event`] enum,
//! each with its own payload type. Script-defined events travel as
//! [`Event::Custom`] with an arbitrary JSON payload. Handlers are keyed by the
//! event's wire name (see [`Event::name`]), so a script may also emit a
//! built-in name itself.
//!
//! | Wire name | Variant | Payload |
//! |-----------|---------|---------|
//! | `chat`, `poke` | [`Event::Chat`], [`Event::Poke`] | [`Message`] |
//! | `typing` | [`Event::Typing`] | [`ClientInfo`] |
//! | `track`, `trackInfo` | [`Event::Track`], [`Event::TrackInfo`] | [`TrackInfo`] |
//! | `trackEnd` | [`Event::TrackEnd`] | [`TrackEnd`] |
//! | `ytdl.success`, `ytdl.error` | [`Event::YtdlSuccess`], [`Event::YtdlError`] | [`YtdlJob`] |
//! | `connect`, `disconnect` | unit | |
//! | `connectionFailed` | [`Event::ConnectionFailed`] | reason |
//! | `clientMove`, `clientVisible`, ... | [`Event::ClientMove`], ... | [`MoveInfo`] |
//! | `clientNick` | [`Event::ClientNick`] | [`NickChange`] |
//! | `clientAway`, `clientMute`, ... | [`Event::ClientAway`], ... | [`ClientInfo`] |
//! | `serverGroupAdded`, `serverGroupRemoved` | | [`ServerGroupEvent`] |
//! | `channelCreate`, `channelUpdate`, `channelDelete` | | [`ChannelChange`] |
//! | `speech` | [`Event::Speech`] | [`SpeechEvent`] |
//! | `talkerCount` | [`Event::TalkerCount`] | number |
//! | `load`, `unload` | unit | |
//! | `api:<name>` | [`Event::Api`] | [`ApiEvent`] |
//! | `discord:<NAME>` | [`Event::Discord`] | raw JSON |
//! | `ws.connect`, `ws.close` | | connection id |
//! | `ws.error` | [`Event::WsError`] | [`WsFailure`] |
//! | `ws.data` | [`Event::WsData`] | [`WsMessage`] |

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::bytes::Bytes;
use super::model::{
    ChannelInfo, ClientInfo, MessageMode, ServerGroupInfo, TrackInfo, UserInfo,
};

/// Prefix of web API events.
pub const API_PREFIX: &str = "api:";

/// Prefix of forwarded Discord gateway events.
pub const DISCORD_PREFIX: &str = "discord:";

// =============================================================================
// Payloads
// =============================================================================

/// A chat message or poke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub text: String,
    /// Channel the message was sent in, if any.
    #[serde(default)]
    pub channel: Option<ChannelInfo>,
    /// Sender. Messages from the bot itself are delivered too.
    pub client: ClientInfo,
    #[serde(default)]
    pub mode: MessageMode,
}

/// A client changing channel or visibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveInfo {
    /// `None` when the client just came online or became visible.
    #[serde(default)]
    pub from_channel: Option<ChannelInfo>,
    /// `None` when the client went offline or became invisible.
    #[serde(default)]
    pub to_channel: Option<ChannelInfo>,
    pub client: ClientInfo,
    #[serde(default)]
    pub invoker: Option<ClientInfo>,
}

/// A nickname change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NickChange {
    pub client: ClientInfo,
    pub old_nick: String,
}

/// End of playback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackEnd {
    pub track: TrackInfo,
    /// What caused playback to end.
    #[serde(default)]
    pub callback: String,
}

/// A download job started via `ytdl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YtdlJob {
    pub url: String,
    pub job_id: String,
    /// Id of the resulting track, present on success.
    #[serde(default)]
    pub track_id: Option<String>,
}

/// A client being added to or removed from a server group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerGroupEvent {
    pub client: ClientInfo,
    #[serde(default)]
    pub invoker: Option<ClientInfo>,
    pub server_group: ServerGroupInfo,
}

/// A channel being created, updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelChange {
    pub channel: ChannelInfo,
    #[serde(default)]
    pub invoker: Option<ClientInfo>,
}

/// A recognised voice command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechEvent {
    pub client: ClientInfo,
    pub text: String,
}

/// A call made through the bot's web API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvent {
    /// Name after the `api:` prefix.
    pub name: String,
    #[serde(default)]
    pub data: Value,
    /// Authenticated web user, if any.
    #[serde(default)]
    pub user: Option<UserInfo>,
    #[serde(default)]
    pub remote_addr: String,
}

/// A frame received on a script websocket connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsMessage {
    pub id: String,
    /// 1 for text frames, 2 for binary frames.
    pub message_type: u8,
    pub data: Bytes,
}

/// An error on a script websocket connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsFailure {
    pub id: String,
    pub error: String,
}

// =============================================================================
// Event
// =============================================================================

/// An event delivered to script handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Chat(Message),
    Poke(Message),
    Typing(ClientInfo),
    Track(TrackInfo),
    TrackInfo(TrackInfo),
    TrackEnd(TrackEnd),
    YtdlSuccess(YtdlJob),
    YtdlError(YtdlJob),
    Connect,
    ConnectionFailed(String),
    Disconnect,
    ClientMove(MoveInfo),
    ClientNick(NickChange),
    ClientVisible(MoveInfo),
    ClientInvisible(MoveInfo),
    ClientKicked(MoveInfo),
    ClientKickedFromChannel(MoveInfo),
    ClientIpAddress(ClientInfo),
    ClientAway(ClientInfo),
    ClientBack(ClientInfo),
    ClientRecord(ClientInfo),
    ClientRecordStop(ClientInfo),
    ClientMute(ClientInfo),
    ClientUnmute(ClientInfo),
    ClientDeaf(ClientInfo),
    ClientUndeaf(ClientInfo),
    ServerGroupAdded(ServerGroupEvent),
    ServerGroupRemoved(ServerGroupEvent),
    ChannelCreate(ChannelChange),
    ChannelUpdate(ChannelChange),
    ChannelDelete(ChannelChange),
    Speech(SpeechEvent),
    TalkerCount(u32),
    Unload,
    Load,
    Api(ApiEvent),
    /// A Discord gateway event; `name` is upper case with underscores.
    Discord {
        name: String,
        data: Value,
    },
    WsConnect(String),
    WsClose(String),
    WsError(WsFailure),
    WsData(WsMessage),
    /// Any event not in the built-in catalog.
    Custom {
        name: String,
        data: Value,
    },
    /// A catalog event emitted by a script together with the exact payload
    /// the script passed, which the decoded form does not reproduce.
    Emitted {
        event: Box<Event>,
        data: Value,
    },
}

impl Event {
    /// Creates a script-defined event.
    pub fn custom(name: impl Into<String>, data: Value) -> Self {
        Self::Custom {
            name: name.into(),
            data,
        }
    }

    /// Creates a Discord event, normalising the name to `UPPER_SNAKE` form.
    pub fn discord(name: &str, data: Value) -> Self {
        Self::Discord {
            name: normalize_discord_name(name),
            data,
        }
    }

    /// Returns the wire name handlers are registered under.
    pub fn name(&self) -> Cow<'_, str> {
        let fixed = match self {
            Self::Chat(_) => "chat",
            Self::Poke(_) => "poke",
            Self::Typing(_) => "typing",
            Self::Track(_) => "track",
            Self::TrackInfo(_) => "trackInfo",
            Self::TrackEnd(_) => "trackEnd",
            Self::YtdlSuccess(_) => "ytdl.success",
            Self::YtdlError(_) => "ytdl.error",
            Self::Connect => "connect",
            Self::ConnectionFailed(_) => "connectionFailed",
            Self::Disconnect => "disconnect",
            Self::ClientMove(_) => "clientMove",
            Self::ClientNick(_) => "clientNick",
            Self::ClientVisible(_) => "clientVisible",
            Self::ClientInvisible(_) => "clientInvisible",
            Self::ClientKicked(_) => "clientKicked",
            Self::ClientKickedFromChannel(_) => "clientKickedFromChannel",
            Self::ClientIpAddress(_) => "clientIPAddress",
            Self::ClientAway(_) => "clientAway",
            Self::ClientBack(_) => "clientBack",
            Self::ClientRecord(_) => "clientRecord",
            Self::ClientRecordStop(_) => "clientRecordStop",
            Self::ClientMute(_) => "clientMute",
            Self::ClientUnmute(_) => "clientUnmute",
            Self::ClientDeaf(_) => "clientDeaf",
            Self::ClientUndeaf(_) => "clientUndeaf",
            Self::ServerGroupAdded(_) => "serverGroupAdded",
            Self::ServerGroupRemoved(_) => "serverGroupRemoved",
            Self::ChannelCreate(_) => "channelCreate",
            Self::ChannelUpdate(_) => "channelUpdate",
            Self::ChannelDelete(_) => "channelDelete",
            Self::Speech(_) => "speech",
            Self::TalkerCount(_) => "talkerCount",
            Self::Unload => "unload",
            Self::Load => "load",
            Self::WsConnect(_) => "ws.connect",
            Self::WsClose(_) => "ws.close",
            Self::WsError(_) => "ws.error",
            Self::WsData(_) => "ws.data",
            Self::Api(api) => return Cow::Owned(format!("{API_PREFIX}{}", api.name)),
            Self::Discord { name, .. } => return Cow::Owned(format!("{DISCORD_PREFIX}{name}")),
            Self::Custom { name, .. } => return Cow::Borrowed(name),
            Self::Emitted { event, .. } => return event.name(),
        };
        Cow::Borrowed(fixed)
    }

    /// Returns `true` for events from the built-in catalog.
    pub fn is_builtin(&self) -> bool {
        match self {
            Self::Custom { .. } => false,
            Self::Emitted { event, .. } => event.is_builtin(),
            _ => true,
        }
    }

    /// Returns the payload as JSON.
    ///
    /// Unit events yield `null`.
    pub fn to_value(&self) -> Value {
        fn json<T: Serialize>(payload: &T) -> Value {
            serde_json::to_value(payload).unwrap_or(Value::Null)
        }

        match self {
            Self::Chat(m) | Self::Poke(m) => json(m),
            Self::Typing(c)
            | Self::ClientIpAddress(c)
            | Self::ClientAway(c)
            | Self::ClientBack(c)
            | Self::ClientRecord(c)
            | Self::ClientRecordStop(c)
            | Self::ClientMute(c)
            | Self::ClientUnmute(c)
            | Self::ClientDeaf(c)
            | Self::ClientUndeaf(c) => json(c),
            Self::Track(t) | Self::TrackInfo(t) => json(t),
            Self::TrackEnd(t) => json(t),
            Self::YtdlSuccess(j) | Self::YtdlError(j) => json(j),
            Self::Connect | Self::Disconnect | Self::Unload | Self::Load => Value::Null,
            Self::ConnectionFailed(reason) => Value::String(reason.clone()),
            Self::ClientMove(m)
            | Self::ClientVisible(m)
            | Self::ClientInvisible(m)
            | Self::ClientKicked(m)
            | Self::ClientKickedFromChannel(m) => json(m),
            Self::ClientNick(n) => json(n),
            Self::ServerGroupAdded(g) | Self::ServerGroupRemoved(g) => json(g),
            Self::ChannelCreate(c) | Self::ChannelUpdate(c) | Self::ChannelDelete(c) => json(c),
            Self::Speech(s) => json(s),
            Self::TalkerCount(n) => Value::from(*n),
            Self::Api(api) => json(api),
            Self::WsConnect(id) | Self::WsClose(id) => Value::String(id.clone()),
            Self::WsError(f) => json(f),
            Self::WsData(m) => json(m),
            Self::Discord { data, .. } | Self::Custom { data, .. } | Self::Emitted { data, .. } => {
                data.clone()
            }
        }
    }

    /// Parses a host-supplied payload into the variant matching `name`.
    ///
    /// Names outside the catalog become [`Event::Custom`]. A catalog name whose
    /// payload does not match its schema is an error.
    pub fn decode(name: &str, data: Value) -> Result<Self, serde_json::Error> {
        use serde_json::from_value as parse;

        if let Some(rest) = name.strip_prefix(API_PREFIX) {
            let wrapped = matches!(
                &data,
                Value::Object(map) if map.contains_key("data") || map.contains_key("user")
            );
            let mut api: ApiEvent = if wrapped {
                parse(data)?
            } else {
                ApiEvent {
                    name: String::new(),
                    data,
                    user: None,
                    remote_addr: String::new(),
                }
            };
            api.name = rest.to_string();
            return Ok(Self::Api(api));
        }
        if let Some(rest) = name.strip_prefix(DISCORD_PREFIX) {
            return Ok(Self::discord(rest, data));
        }

        let event = match name {
            "chat" => Self::Chat(parse(data)?),
            "poke" => Self::Poke(parse(data)?),
            "typing" => Self::Typing(parse(data)?),
            "track" => Self::Track(parse(data)?),
            "trackInfo" => Self::TrackInfo(parse(data)?),
            "trackEnd" => Self::TrackEnd(parse(data)?),
            "ytdl.success" => Self::YtdlSuccess(parse(data)?),
            "ytdl.error" => Self::YtdlError(parse(data)?),
            "connect" => Self::Connect,
            "connectionFailed" => Self::ConnectionFailed(parse(data)?),
            "disconnect" => Self::Disconnect,
            "clientMove" => Self::ClientMove(parse(data)?),
            "clientNick" => Self::ClientNick(parse(data)?),
            "clientVisible" => Self::ClientVisible(parse(data)?),
            "clientInvisible" => Self::ClientInvisible(parse(data)?),
            "clientKicked" => Self::ClientKicked(parse(data)?),
            "clientKickedFromChannel" => Self::ClientKickedFromChannel(parse(data)?),
            "clientIPAddress" => Self::ClientIpAddress(parse(data)?),
            "clientAway" => Self::ClientAway(parse(data)?),
            "clientBack" => Self::ClientBack(parse(data)?),
            "clientRecord" => Self::ClientRecord(parse(data)?),
            "clientRecordStop" => Self::ClientRecordStop(parse(data)?),
            "clientMute" => Self::ClientMute(parse(data)?),
            "clientUnmute" => Self::ClientUnmute(parse(data)?),
            "clientDeaf" => Self::ClientDeaf(parse(data)?),
            "clientUndeaf" => Self::ClientUndeaf(parse(data)?),
            "serverGroupAdded" => Self::ServerGroupAdded(parse(data)?),
            "serverGroupRemoved" => Self::ServerGroupRemoved(parse(data)?),
            "channelCreate" => Self::ChannelCreate(parse(data)?),
            "channelUpdate" => Self::ChannelUpdate(parse(data)?),
            "channelDelete" => Self::ChannelDelete(parse(data)?),
            "speech" => Self::Speech(parse(data)?),
            "talkerCount" => Self::TalkerCount(parse(data)?),
            "unload" => Self::Unload,
            "load" => Self::Load,
            "ws.connect" => Self::WsConnect(parse(data)?),
            "ws.close" => Self::WsClose(parse(data)?),
            "ws.error" => Self::WsError(parse(data)?),
            "ws.data" => Self::WsData(parse(data)?),
            _ => Self::custom(name, data),
        };
        Ok(event)
    }

    /// Builds the event a script emits under `name`.
    ///
    /// Handlers always see `data` unchanged through [`to_value`](Self::to_value)
    /// and [`data`](Self::data). A catalog name whose payload fits its schema
    /// also gets the typed accessors; when decoding would add, drop or
    /// discard fields the decoded event is wrapped in [`Event::Emitted`]. A
    /// payload that does not fit is kept as [`Event::Custom`].
    pub fn from_parts(name: &str, data: Value) -> Self {
        match Self::decode(name, data.clone()) {
            Ok(Self::Custom { name, data }) => Self::Custom { name, data },
            Ok(event) if event.to_value() == data => event,
            Ok(event) => Self::Emitted {
                event: Box::new(event),
                data,
            },
            Err(_) => Self::custom(name, data),
        }
    }

    /// Returns the chat message for `chat` and `poke` events.
    pub fn message(&self) -> Option<&Message> {
        match self {
            Self::Chat(msg) | Self::Poke(msg) => Some(msg),
            Self::Emitted { event, .. } => event.message(),
            _ => None,
        }
    }

    /// Returns the primary client the event is about, if any.
    pub fn client(&self) -> Option<&ClientInfo> {
        match self {
            Self::Chat(m) | Self::Poke(m) => Some(&m.client),
            Self::Typing(c)
            | Self::ClientIpAddress(c)
            | Self::ClientAway(c)
            | Self::ClientBack(c)
            | Self::ClientRecord(c)
            | Self::ClientRecordStop(c)
            | Self::ClientMute(c)
            | Self::ClientUnmute(c)
            | Self::ClientDeaf(c)
            | Self::ClientUndeaf(c) => Some(c),
            Self::ClientMove(m)
            | Self::ClientVisible(m)
            | Self::ClientInvisible(m)
            | Self::ClientKicked(m)
            | Self::ClientKickedFromChannel(m) => Some(&m.client),
            Self::ClientNick(n) => Some(&n.client),
            Self::ServerGroupAdded(g) | Self::ServerGroupRemoved(g) => Some(&g.client),
            Self::Speech(s) => Some(&s.client),
            Self::Emitted { event, .. } => event.client(),
            _ => None,
        }
    }

    /// Returns the JSON payload of custom, Discord and script-emitted events.
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Custom { data, .. } | Self::Discord { data, .. } | Self::Emitted { data, .. } => {
                Some(data)
            }
            Self::Api(api) => Some(&api.data),
            _ => None,
        }
    }
}

/// Upper-cases a Discord event name and replaces spaces with underscores.
pub fn normalize_discord_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c == ' ' { '_' } else { c.to_ascii_uppercase() })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_names() {
        assert_eq!(Event::Connect.name(), "connect");
        assert_eq!(Event::TalkerCount(2).name(), "talkerCount");
        assert_eq!(Event::WsConnect("c1".into()).name(), "ws.connect");
        assert_eq!(
            Event::ClientIpAddress(ClientInfo::default()).name(),
            "clientIPAddress"
        );
    }

    #[test]
    fn test_prefixed_names() {
        let event = Event::discord("guild create", json!({"id": "1"}));
        assert_eq!(event.name(), "discord:GUILD_CREATE");

        let event = Event::decode("api:status", json!({"data": {"x": 1}})).unwrap();
        assert_eq!(event.name(), "api:status");
        assert_eq!(event.data(), Some(&json!({"x": 1})));
    }

    #[test]
    fn test_decode_chat() {
        let event = Event::decode(
            "chat",
            json!({
                "text": "!play",
                "client": {"id": "3", "uid": "u3", "name": "Bob"},
                "mode": 2
            }),
        )
        .unwrap();

        let msg = event.message().unwrap();
        assert_eq!(msg.text, "!play");
        assert_eq!(msg.mode, MessageMode::Channel);
        assert_eq!(event.client().unwrap().name, "Bob");
    }

    #[test]
    fn test_decode_unknown_is_custom() {
        let event = Event::decode("scoreChanged", json!({"score": 3})).unwrap();
        assert!(!event.is_builtin());
        assert_eq!(event.name(), "scoreChanged");
        assert_eq!(event.to_value(), json!({"score": 3}));
    }

    #[test]
    fn test_decode_rejects_malformed_builtin() {
        assert!(Event::decode("chat", json!("not a message")).is_err());
    }

    #[test]
    fn test_from_parts_keeps_malformed_payload() {
        let event = Event::from_parts("chat", json!("hello"));
        assert_eq!(event.name(), "chat");
        assert_eq!(event.to_value(), json!("hello"));
    }

    #[test]
    fn test_from_parts_keeps_payload_of_unit_events() {
        let event = Event::from_parts("connect", json!({"x": 1}));
        assert_eq!(event.name(), "connect");
        assert!(event.is_builtin());
        assert_eq!(event.to_value(), json!({"x": 1}));
        assert_eq!(event.data(), Some(&json!({"x": 1})));

        assert_eq!(Event::from_parts("connect", Value::Null), Event::Connect);
    }

    #[test]
    fn test_from_parts_keeps_extra_fields() {
        let payload = json!({"text": "hi", "client": {"id": "1"}, "extra": 42});
        let event = Event::from_parts("chat", payload.clone());

        assert_eq!(event.to_value(), payload);
        assert_eq!(event.message().map(|m| m.text.as_str()), Some("hi"));
        assert_eq!(event.client().map(|c| c.id.as_str()), Some("1"));
    }

    #[test]
    fn test_unit_payload_is_null() {
        assert_eq!(Event::Load.to_value(), Value::Null);
        assert_eq!(Event::TalkerCount(4).to_value(), json!(4));
    }
}
