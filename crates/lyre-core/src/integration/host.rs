//! Traits implemented by the host application.
//!
//! The host owns the chat connection, the audio pipeline and the media
//! library. Lyre never talks to those directly; every script-facing operation
//! that touches them goes through one of these traits. Calls are synchronous
//! and made from the instance scheduler, so implementations must return
//! promptly and push long-running work onto their own tasks.
//!
//! Failures are reported as [`HostError`](crate::HostError). The framework
//! facades turn them into `false` / `None` for scripts.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{HostError, HostResult};
use crate::foundation::model::{
    AudioReturnFlags, ChannelGroupInfo, ChannelInfo, ChannelParams, ClientInfo, PermissionInfo,
    PermissionTarget, PlaylistInfo, PlaylistTrackInfo, ServerGroupInfo, TrackInfo, UserInfo,
};

/// Where a kick removes a client from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KickScope {
    Server,
    Channel,
}

// =============================================================================
// Engine
// =============================================================================

/// Bot-wide controls: identity, logging, avatar and web users.
pub trait EngineHost: Send + Sync + 'static {
    /// Unique id of the bot process.
    fn bot_id(&self) -> String;

    fn instance_log_level(&self) -> u8;
    fn set_instance_log_level(&self, level: u8) -> HostResult<()>;
    fn bot_log_level(&self) -> u8;
    fn set_bot_log_level(&self, level: u8) -> HostResult<()>;

    /// Asks the host to reload every script on every instance.
    fn reload_scripts(&self) -> HostResult<()>;

    fn nick(&self) -> String;
    fn set_nick(&self, nick: &str) -> HostResult<()>;
    fn set_default_channel_id(&self, channel_id: &str) -> HostResult<()>;
    fn is_running(&self) -> bool;

    /// Shows a notification in the host's user interface.
    fn notify(&self, message: &str) -> HostResult<()> {
        let _ = message;
        Err(HostError::Unsupported("notify"))
    }

    /// Persists the instance configuration.
    fn save_config(&self) -> HostResult<()>;

    fn remove_avatar(&self) -> HostResult<()> {
        Err(HostError::Unsupported("removeAvatar"))
    }

    fn set_avatar_from_track(&self, track: &TrackInfo) -> HostResult<()> {
        let _ = track;
        Err(HostError::Unsupported("setAvatarFromTrack"))
    }

    fn set_avatar_from_banner(&self, banner: &str) -> HostResult<()> {
        let _ = banner;
        Err(HostError::Unsupported("setAvatarFromBanner"))
    }

    fn set_avatar_from_url(&self, url: &str) -> HostResult<()> {
        let _ = url;
        Err(HostError::Unsupported("setAvatarFromURL"))
    }

    fn set_default_avatar(&self) -> HostResult<()> {
        Err(HostError::Unsupported("setDefaultAvatar"))
    }

    /// Web interface users.
    fn users(&self) -> Vec<UserInfo>;

    fn set_user_password(&self, user_id: &str, password: &str) -> HostResult<()>;
    fn set_user_ts_uid(&self, user_id: &str, ts_uid: &str) -> HostResult<()>;
    fn set_user_privileges(&self, user_id: &str, privileges: u32) -> HostResult<()>;
    fn delete_user(&self, user_id: &str) -> HostResult<()>;

    fn command_prefix(&self) -> String;
    fn set_command_prefix(&self, prefix: &str) -> HostResult<()>;
}

// =============================================================================
// Backend
// =============================================================================

/// Access to the chat server the instance is connected to.
///
/// Lookups by name or unique id are derived by the framework from
/// [`clients`](Self::clients) and [`channels`](Self::channels).
pub trait BackendHost: Send + Sync + 'static {
    fn connect(&self) -> HostResult<()>;
    fn disconnect(&self) -> HostResult<()>;
    fn is_connected(&self) -> bool;

    /// The bot's own client, once connected.
    fn bot_client(&self) -> Option<ClientInfo>;
    fn nick(&self) -> String;

    fn channels(&self) -> Vec<ChannelInfo>;
    fn current_channel(&self) -> Option<ChannelInfo>;
    fn clients(&self) -> Vec<ClientInfo>;
    fn server_groups(&self) -> Vec<ServerGroupInfo>;
    fn channel_groups(&self) -> Vec<ChannelGroupInfo>;

    /// Sends a server-wide chat message.
    fn chat(&self, text: &str) -> HostResult<()>;
    fn create_channel(&self, params: &ChannelParams) -> HostResult<ChannelInfo>;

    // ---- clients -------------------------------------------------------------

    fn client_chat(&self, client_id: &str, text: &str) -> HostResult<()>;
    fn client_poke(&self, client_id: &str, text: &str) -> HostResult<()>;
    fn client_ban(&self, client_id: &str, duration: Duration, reason: &str) -> HostResult<()>;
    fn client_kick(&self, client_id: &str, scope: KickScope, reason: &str) -> HostResult<()>;
    fn client_move(&self, client_id: &str, channel_id: &str, password: Option<&str>)
    -> HostResult<()>;
    fn client_add_server_group(&self, client_id: &str, group_id: &str) -> HostResult<()>;
    fn client_remove_server_group(&self, client_id: &str, group_id: &str) -> HostResult<()>;
    fn client_set_subscription(&self, client_id: &str, subscribed: bool) -> HostResult<()>;
    fn client_set_description(&self, client_id: &str, description: &str) -> HostResult<()>;

    // ---- channels ------------------------------------------------------------

    fn channel_update(&self, channel_id: &str, params: &ChannelParams) -> HostResult<()>;
    fn channel_delete(&self, channel_id: &str) -> HostResult<()>;
    fn channel_move(&self, channel_id: &str, parent_id: &str, order: i64) -> HostResult<()>;
    fn channel_chat(&self, channel_id: &str, text: &str) -> HostResult<()>;
    fn channel_set_subscription(&self, channel_id: &str, subscribed: bool) -> HostResult<()>;
    fn channel_set_group(
        &self,
        channel_id: &str,
        client_id: &str,
        group_id: &str,
    ) -> HostResult<()>;

    // ---- groups and permissions ----------------------------------------------

    fn server_group_add_client(&self, group_id: &str, database_id: &str) -> HostResult<()>;

    fn permissions(&self, target: &PermissionTarget) -> HostResult<Vec<PermissionInfo>>;

    /// Adds a permission by id or name and returns its initial state.
    fn add_permission(&self, target: &PermissionTarget, id: &str) -> HostResult<PermissionInfo>;
    fn save_permission(&self, target: &PermissionTarget, permission: &PermissionInfo)
    -> HostResult<()>;
    fn delete_permission(&self, target: &PermissionTarget, id: &str) -> HostResult<()>;
}

// =============================================================================
// Media
// =============================================================================

/// The media library and play queue.
pub trait MediaHost: Send + Sync + 'static {
    /// Plays an internal url such as `track://<id>`.
    fn play_url(&self, url: &str) -> HostResult<()>;
    fn current_track(&self) -> Option<TrackInfo>;
    fn track_by_id(&self, id: &str) -> Option<TrackInfo>;
    fn search(&self, query: &str) -> Vec<TrackInfo>;

    fn enqueue(&self, url: &str) -> HostResult<()>;
    fn play_as_next(&self, url: &str) -> HostResult<()>;
    fn play_next(&self) -> HostResult<()>;
    fn play_previous(&self) -> HostResult<()>;

    /// Stops one track, or all playback when `track_id` is `None`.
    fn stop(&self, track_id: Option<&str>) -> HostResult<()>;

    fn queue(&self) -> Vec<TrackInfo>;
    fn remove_from_queue(&self, index: usize) -> HostResult<()>;
    fn clear_queue(&self) -> HostResult<()>;

    fn playlists(&self) -> Vec<PlaylistInfo>;
    fn active_playlist(&self) -> Option<PlaylistInfo>;
    fn playlist_tracks(&self, playlist_id: &str) -> HostResult<Vec<PlaylistTrackInfo>>;
    fn set_active_playlist(&self, playlist_id: &str) -> HostResult<()>;
    fn clear_playlist(&self) -> HostResult<()>;

    /// Streams a url through the downloader without storing it.
    fn yt(&self, url: &str) -> HostResult<()>;
    /// Downloads a url into the library, optionally playing it afterwards.
    fn ytdl(&self, url: &str, play: bool) -> HostResult<()>;
    fn enqueue_yt(&self, url: &str) -> HostResult<()>;
    fn enqueue_ytdl(&self, url: &str) -> HostResult<()>;

    fn set_thumbnail_from_url(&self, track_id: &str, url: &str) -> HostResult<()>;
    fn remove_thumbnail(&self, track_id: &str) -> HostResult<()>;
}

// =============================================================================
// Audio
// =============================================================================

/// The instance's audio pipeline.
pub trait AudioHost: Send + Sync + 'static {
    /// Applies an ffmpeg filter expression.
    fn set_audio_filter(&self, filter: &str) -> HostResult<()>;
    fn set_audio_return_channel(&self, flags: AudioReturnFlags) -> HostResult<()>;
    fn start_recording(&self) -> HostResult<()>;
    fn stop_recording(&self) -> HostResult<()>;
    fn stream_to_server(&self, url: &str, username: &str, password: &str) -> HostResult<()>;
    fn stop_stream(&self) -> HostResult<()>;

    fn is_repeat(&self) -> bool;
    fn set_repeat(&self, repeat: bool);
    fn is_shuffle(&self) -> bool;
    fn set_shuffle(&self, shuffle: bool);

    /// Volume between 0 and 100.
    fn volume(&self) -> u8;
    fn set_volume(&self, volume: u8) -> HostResult<()>;

    fn track_position(&self) -> Duration;
    fn seek(&self, position: Duration) -> HostResult<()>;

    fn is_mute(&self) -> bool;
    fn set_mute(&self, mute: bool) -> HostResult<()>;
    fn is_playing(&self) -> bool;

    /// Speaks `text` with text-to-speech.
    fn say(&self, text: &str, locale: Option<&str>) -> HostResult<()>;

    /// Number of clients in the bot's audio channel.
    fn client_count(&self) -> usize;
    fn set_stream_volume(&self, stream_id: &str, volume: u8) -> HostResult<()>;
}

// =============================================================================
// Bundle
// =============================================================================

/// The four host traits of one instance.
#[derive(Clone)]
pub struct HostBundle {
    pub engine: Arc<dyn EngineHost>,
    pub backend: Arc<dyn BackendHost>,
    pub media: Arc<dyn MediaHost>,
    pub audio: Arc<dyn AudioHost>,
}

impl HostBundle {
    /// Uses one value implementing every host trait.
    pub fn from_shared<H>(host: Arc<H>) -> Self
    where
        H: EngineHost + BackendHost + MediaHost + AudioHost,
    {
        Self {
            engine: host.clone(),
            backend: host.clone(),
            media: host.clone(),
            audio: host,
        }
    }
}

impl fmt::Debug for HostBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostBundle")
            .field("bot_id", &self.engine.bot_id())
            .field("connected", &self.backend.is_connected())
            .finish_non_exhaustive()
    }
}
