//! Foundation layer - the data that flows through Lyre.
//!
//! - [`event`]: the closed event catalog plus script-defined events
//! - [`model`]: snapshots of clients, channels, tracks and other host entities
//! - [`bytes`]: binary payloads with a lossy string view

pub mod bytes;
pub mod event;
pub mod model;

pub use bytes::Bytes;
pub use event::{
    API_PREFIX, ApiEvent, ChannelChange, DISCORD_PREFIX, Event, Message, MoveInfo, NickChange,
    ServerGroupEvent, SpeechEvent, TrackEnd, WsFailure, WsMessage, YtdlJob,
    normalize_discord_name,
};
pub use model::{
    AudioReturnFlags, BackendKind, ChannelGroupInfo, ChannelInfo, ChannelParams, ChannelType,
    ClientInfo, ClientType, MessageMode, PermissionInfo, PermissionTarget, PlaylistInfo,
    PlaylistTrackInfo, ServerGroupInfo, TrackInfo, UserInfo,
};
