//! An in-memory host for demos and tests.
//!
//! [`OfflineHost`] implements every host trait against plain collections.
//! Mutating calls are applied to that state and recorded, so a test can
//! check what a script asked the host to do:
//!
//! ```rust
//! use std::sync::Arc;
//! use lyre_core::{BackendHost, ClientInfo};
//! use lyre_framework::offline::OfflineHost;
//!
//! let host = Arc::new(OfflineHost::new().with_client(ClientInfo::new("7", "uid-7", "alice")));
//! host.client_poke("7", "wake up").unwrap();
//! assert_eq!(host.actions(), vec!["poke 7: wake up"]);
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use lyre_core::{
    AudioHost, AudioReturnFlags, BackendHost, BackendKind, BroadcastHub, CapabilityContext,
    ChannelGroupInfo, ChannelInfo, ChannelParams, ClientInfo, EngineHost, EventBus, HostBundle,
    HostError, HostResult, HttpClientOptions, KickScope, MediaHost, MemoryStore, PermissionInfo,
    PermissionTarget, PlaylistInfo, PlaylistTrackInfo, Scheduler, ServerGroupInfo, TrackInfo,
    UserInfo,
};
use parking_lot::Mutex;

use crate::context::InstanceServices;
use crate::exports::ExportRegistry;

#[derive(Debug, Default)]
struct State {
    nick: String,
    connected: bool,
    instance_log_level: u8,
    bot_log_level: u8,
    command_prefix: String,
    default_channel: Option<String>,
    bot_client: Option<String>,
    clients: Vec<ClientInfo>,
    channels: Vec<ChannelInfo>,
    server_groups: Vec<ServerGroupInfo>,
    channel_groups: Vec<ChannelGroupInfo>,
    permissions: HashMap<PermissionTarget, Vec<PermissionInfo>>,
    users: Vec<UserInfo>,
    tracks: Vec<TrackInfo>,
    current: Option<TrackInfo>,
    queue: Vec<TrackInfo>,
    playlists: Vec<(PlaylistInfo, Vec<PlaylistTrackInfo>)>,
    active_playlist: Option<String>,
    volume: u8,
    position: Duration,
    repeat: bool,
    shuffle: bool,
    mute: bool,
    return_channel: AudioReturnFlags,
    next_channel_id: u64,
    actions: Vec<String>,
}

/// A self-contained host with no chat server or audio pipeline behind it.
#[derive(Debug)]
pub struct OfflineHost {
    bot_id: String,
    state: Mutex<State>,
}

impl Default for OfflineHost {
    fn default() -> Self {
        Self::new()
    }
}

impl OfflineHost {
    /// A connected host named `lyre` with volume 50 and prefix `!`.
    pub fn new() -> Self {
        Self {
            bot_id: "offline".to_string(),
            state: Mutex::new(State {
                nick: "lyre".to_string(),
                connected: true,
                instance_log_level: 3,
                bot_log_level: 3,
                command_prefix: "!".to_string(),
                volume: 50,
                next_channel_id: 1000,
                ..State::default()
            }),
        }
    }

    pub fn with_client(self, client: ClientInfo) -> Self {
        self.state.lock().clients.push(client);
        self
    }

    /// Adds the bot's own client.
    pub fn with_bot_client(self, mut client: ClientInfo) -> Self {
        client.is_self = true;
        {
            let mut state = self.state.lock();
            state.bot_client = Some(client.id.clone());
            state.clients.push(client);
        }
        self
    }

    pub fn with_channel(self, channel: ChannelInfo) -> Self {
        self.state.lock().channels.push(channel);
        self
    }

    pub fn with_server_group(self, group: ServerGroupInfo) -> Self {
        self.state.lock().server_groups.push(group);
        self
    }

    pub fn with_channel_group(self, group: ChannelGroupInfo) -> Self {
        self.state.lock().channel_groups.push(group);
        self
    }

    pub fn with_user(self, user: UserInfo) -> Self {
        self.state.lock().users.push(user);
        self
    }

    pub fn with_track(self, track: TrackInfo) -> Self {
        self.state.lock().tracks.push(track);
        self
    }

    pub fn with_playlist(self, playlist: PlaylistInfo, tracks: Vec<PlaylistTrackInfo>) -> Self {
        self.state.lock().playlists.push((playlist, tracks));
        self
    }

    /// Builds the services of one instance on top of this host.
    ///
    /// Storage is in memory, no transports are compiled in and the hub is
    /// private to the instance. Jobs only run while the returned scheduler
    /// does.
    pub fn services(
        self: &Arc<Self>,
        instance: &str,
        backend_kind: BackendKind,
    ) -> (InstanceServices, Scheduler) {
        let scheduler = Scheduler::new(instance);
        let services = InstanceServices {
            instance_id: Arc::from(instance),
            backend_kind,
            host: HostBundle::from_shared(Arc::clone(self)),
            bus: Arc::new(EventBus::new(instance)),
            scheduler: scheduler.handle(),
            hub: BroadcastHub::default(),
            store: Arc::new(MemoryStore::new()),
            capabilities: CapabilityContext::new(),
            http_options: HttpClientOptions::default(),
            exports: Arc::new(ExportRegistry::new()),
            ws: None,
        };
        (services, scheduler)
    }

    /// Operations performed so far, oldest first.
    pub fn actions(&self) -> Vec<String> {
        self.state.lock().actions.clone()
    }

    pub fn clear_actions(&self) {
        self.state.lock().actions.clear();
    }

    /// Simulates losing the connection.
    pub fn set_connected(&self, connected: bool) {
        self.state.lock().connected = connected;
    }

    fn record(&self, action: String) -> HostResult<()> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(HostError::NotConnected);
        }
        state.actions.push(action);
        Ok(())
    }

    fn with_client_mut(
        &self,
        id: &str,
        f: impl FnOnce(&mut ClientInfo),
        action: String,
    ) -> HostResult<()> {
        {
            let mut state = self.state.lock();
            let client = state
                .clients
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| HostError::not_found("client", id))?;
            f(client);
        }
        self.record(action)
    }

    fn with_channel_mut(
        &self,
        id: &str,
        f: impl FnOnce(&mut ChannelInfo),
        action: String,
    ) -> HostResult<()> {
        {
            let mut state = self.state.lock();
            let channel = state
                .channels
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| HostError::not_found("channel", id))?;
            f(channel);
        }
        self.record(action)
    }

    fn with_user_mut(&self, id: &str, f: impl FnOnce(&mut UserInfo), action: String) -> HostResult<()> {
        {
            let mut state = self.state.lock();
            let user = state
                .users
                .iter_mut()
                .find(|u| u.id == id)
                .ok_or_else(|| HostError::not_found("user", id))?;
            f(user);
        }
        self.record(action)
    }

    fn resolve_track(&self, url: &str) -> TrackInfo {
        let state = self.state.lock();
        let by_id = url.strip_prefix("track://");
        state
            .tracks
            .iter()
            .find(|t| by_id.map_or(t.url == url, |id| t.id == id))
            .cloned()
            .unwrap_or_else(|| TrackInfo {
                id: by_id.unwrap_or_default().to_string(),
                url: url.to_string(),
                ..TrackInfo::default()
            })
    }
}

impl EngineHost for OfflineHost {
    fn bot_id(&self) -> String {
        self.bot_id.clone()
    }

    fn instance_log_level(&self) -> u8 {
        self.state.lock().instance_log_level
    }

    fn set_instance_log_level(&self, level: u8) -> HostResult<()> {
        self.state.lock().instance_log_level = level;
        Ok(())
    }

    fn bot_log_level(&self) -> u8 {
        self.state.lock().bot_log_level
    }

    fn set_bot_log_level(&self, level: u8) -> HostResult<()> {
        self.state.lock().bot_log_level = level;
        Ok(())
    }

    fn reload_scripts(&self) -> HostResult<()> {
        self.record("reload scripts".to_string())
    }

    fn nick(&self) -> String {
        self.state.lock().nick.clone()
    }

    fn set_nick(&self, nick: &str) -> HostResult<()> {
        self.state.lock().nick = nick.to_string();
        self.record(format!("nick {nick}"))
    }

    fn set_default_channel_id(&self, channel_id: &str) -> HostResult<()> {
        self.state.lock().default_channel = Some(channel_id.to_string());
        Ok(())
    }

    fn is_running(&self) -> bool {
        true
    }

    fn notify(&self, message: &str) -> HostResult<()> {
        self.record(format!("notify {message}"))
    }

    fn save_config(&self) -> HostResult<()> {
        self.record("save config".to_string())
    }

    fn users(&self) -> Vec<UserInfo> {
        self.state.lock().users.clone()
    }

    fn set_user_password(&self, user_id: &str, _password: &str) -> HostResult<()> {
        self.with_user_mut(user_id, |_| {}, format!("password {user_id}"))
    }

    fn set_user_ts_uid(&self, user_id: &str, ts_uid: &str) -> HostResult<()> {
        self.with_user_mut(
            user_id,
            |u| u.ts_uid = ts_uid.to_string(),
            format!("ts uid {user_id}: {ts_uid}"),
        )
    }

    fn set_user_privileges(&self, user_id: &str, privileges: u32) -> HostResult<()> {
        self.with_user_mut(
            user_id,
            |u| u.privileges = privileges,
            format!("privileges {user_id}: {privileges}"),
        )
    }

    fn delete_user(&self, user_id: &str) -> HostResult<()> {
        let mut state = self.state.lock();
        let before = state.users.len();
        state.users.retain(|u| u.id != user_id);
        if state.users.len() == before {
            return Err(HostError::not_found("user", user_id));
        }
        state.actions.push(format!("delete user {user_id}"));
        Ok(())
    }

    fn command_prefix(&self) -> String {
        self.state.lock().command_prefix.clone()
    }

    fn set_command_prefix(&self, prefix: &str) -> HostResult<()> {
        if prefix.is_empty() {
            return Err(HostError::Rejected("empty command prefix".to_string()));
        }
        self.state.lock().command_prefix = prefix.to_string();
        Ok(())
    }
}

impl BackendHost for OfflineHost {
    fn connect(&self) -> HostResult<()> {
        self.state.lock().connected = true;
        Ok(())
    }

    fn disconnect(&self) -> HostResult<()> {
        self.state.lock().connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    fn bot_client(&self) -> Option<ClientInfo> {
        let state = self.state.lock();
        let id = state.bot_client.as_ref()?;
        state.clients.iter().find(|c| &c.id == id).cloned()
    }

    fn nick(&self) -> String {
        self.state.lock().nick.clone()
    }

    fn channels(&self) -> Vec<ChannelInfo> {
        self.state.lock().channels.clone()
    }

    fn current_channel(&self) -> Option<ChannelInfo> {
        let bot = self.bot_client()?;
        let id = bot.audio_channel.or_else(|| bot.channels.first().cloned())?;
        self.state
            .lock()
            .channels
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    fn clients(&self) -> Vec<ClientInfo> {
        self.state.lock().clients.clone()
    }

    fn server_groups(&self) -> Vec<ServerGroupInfo> {
        self.state.lock().server_groups.clone()
    }

    fn channel_groups(&self) -> Vec<ChannelGroupInfo> {
        self.state.lock().channel_groups.clone()
    }

    fn chat(&self, text: &str) -> HostResult<()> {
        self.record(format!("chat: {text}"))
    }

    fn create_channel(&self, params: &ChannelParams) -> HostResult<ChannelInfo> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(HostError::NotConnected);
        }
        state.next_channel_id += 1;
        let mut channel = ChannelInfo::new(state.next_channel_id.to_string(), "");
        params.apply_to(&mut channel);
        state.actions.push(format!("create channel {}", channel.name));
        state.channels.push(channel.clone());
        Ok(channel)
    }

    fn client_chat(&self, client_id: &str, text: &str) -> HostResult<()> {
        self.with_client_mut(client_id, |_| {}, format!("chat {client_id}: {text}"))
    }

    fn client_poke(&self, client_id: &str, text: &str) -> HostResult<()> {
        self.with_client_mut(client_id, |_| {}, format!("poke {client_id}: {text}"))
    }

    fn client_ban(&self, client_id: &str, duration: Duration, reason: &str) -> HostResult<()> {
        self.with_client_mut(
            client_id,
            |_| {},
            format!("ban {client_id} for {}s: {reason}", duration.as_secs()),
        )?;
        self.state.lock().clients.retain(|c| c.id != client_id);
        Ok(())
    }

    fn client_kick(&self, client_id: &str, scope: KickScope, reason: &str) -> HostResult<()> {
        let target = match scope {
            KickScope::Server => "server",
            KickScope::Channel => "channel",
        };
        self.with_client_mut(
            client_id,
            |c| {
                if scope == KickScope::Channel {
                    c.channels.clear();
                    c.audio_channel = None;
                }
            },
            format!("kick {client_id} from {target}: {reason}"),
        )?;
        if scope == KickScope::Server {
            self.state.lock().clients.retain(|c| c.id != client_id);
        }
        Ok(())
    }

    fn client_move(
        &self,
        client_id: &str,
        channel_id: &str,
        _password: Option<&str>,
    ) -> HostResult<()> {
        if !self.state.lock().channels.iter().any(|c| c.id == channel_id) {
            return Err(HostError::not_found("channel", channel_id));
        }
        self.with_client_mut(
            client_id,
            |c| {
                c.channels = vec![channel_id.to_string()];
                c.audio_channel = Some(channel_id.to_string());
            },
            format!("move {client_id} to {channel_id}"),
        )
    }

    fn client_add_server_group(&self, client_id: &str, group_id: &str) -> HostResult<()> {
        self.with_client_mut(
            client_id,
            |c| {
                if !c.server_groups.iter().any(|g| g == group_id) {
                    c.server_groups.push(group_id.to_string());
                }
            },
            format!("add {client_id} to group {group_id}"),
        )
    }

    fn client_remove_server_group(&self, client_id: &str, group_id: &str) -> HostResult<()> {
        self.with_client_mut(
            client_id,
            |c| c.server_groups.retain(|g| g != group_id),
            format!("remove {client_id} from group {group_id}"),
        )
    }

    fn client_set_subscription(&self, client_id: &str, subscribed: bool) -> HostResult<()> {
        self.with_client_mut(
            client_id,
            |_| {},
            format!("subscribe {client_id}: {subscribed}"),
        )
    }

    fn client_set_description(&self, client_id: &str, description: &str) -> HostResult<()> {
        self.with_client_mut(
            client_id,
            |c| c.description = description.to_string(),
            format!("describe {client_id}: {description}"),
        )
    }

    fn channel_update(&self, channel_id: &str, params: &ChannelParams) -> HostResult<()> {
        self.with_channel_mut(
            channel_id,
            |c| params.apply_to(c),
            format!("update channel {channel_id}"),
        )
    }

    fn channel_delete(&self, channel_id: &str) -> HostResult<()> {
        self.with_channel_mut(channel_id, |_| {}, format!("delete channel {channel_id}"))?;
        self.state.lock().channels.retain(|c| c.id != channel_id);
        Ok(())
    }

    fn channel_move(&self, channel_id: &str, parent_id: &str, order: i64) -> HostResult<()> {
        self.with_channel_mut(
            channel_id,
            |c| {
                c.parent = Some(parent_id.to_string());
                c.position = order;
            },
            format!("move channel {channel_id} under {parent_id}"),
        )
    }

    fn channel_chat(&self, channel_id: &str, text: &str) -> HostResult<()> {
        self.with_channel_mut(channel_id, |_| {}, format!("chat #{channel_id}: {text}"))
    }

    fn channel_set_subscription(&self, channel_id: &str, subscribed: bool) -> HostResult<()> {
        self.with_channel_mut(
            channel_id,
            |_| {},
            format!("subscribe #{channel_id}: {subscribed}"),
        )
    }

    fn channel_set_group(
        &self,
        channel_id: &str,
        client_id: &str,
        group_id: &str,
    ) -> HostResult<()> {
        if !self.state.lock().channels.iter().any(|c| c.id == channel_id) {
            return Err(HostError::not_found("channel", channel_id));
        }
        self.with_client_mut(
            client_id,
            |c| c.channel_group = Some(group_id.to_string()),
            format!("channel group {client_id} in #{channel_id}: {group_id}"),
        )
    }

    fn server_group_add_client(&self, group_id: &str, database_id: &str) -> HostResult<()> {
        let client_id = self
            .state
            .lock()
            .clients
            .iter()
            .find(|c| c.database_id == database_id)
            .map(|c| c.id.clone())
            .ok_or_else(|| HostError::not_found("client", database_id))?;
        self.client_add_server_group(&client_id, group_id)
    }

    fn permissions(&self, target: &PermissionTarget) -> HostResult<Vec<PermissionInfo>> {
        Ok(self
            .state
            .lock()
            .permissions
            .get(target)
            .cloned()
            .unwrap_or_default())
    }

    fn add_permission(&self, target: &PermissionTarget, id: &str) -> HostResult<PermissionInfo> {
        let permission = PermissionInfo {
            id: id.to_string(),
            name: id.to_string(),
            ..PermissionInfo::default()
        };
        let mut state = self.state.lock();
        let list = state.permissions.entry(target.clone()).or_default();
        if list.iter().any(|p| p.id == id) {
            return Err(HostError::Rejected(format!("permission '{id}' already set")));
        }
        list.push(permission.clone());
        Ok(permission)
    }

    fn save_permission(
        &self,
        target: &PermissionTarget,
        permission: &PermissionInfo,
    ) -> HostResult<()> {
        let mut state = self.state.lock();
        let slot = state
            .permissions
            .get_mut(target)
            .and_then(|list| list.iter_mut().find(|p| p.id == permission.id))
            .ok_or_else(|| HostError::not_found("permission", permission.id.as_str()))?;
        *slot = permission.clone();
        Ok(())
    }

    fn delete_permission(&self, target: &PermissionTarget, id: &str) -> HostResult<()> {
        let mut state = self.state.lock();
        let list = state
            .permissions
            .get_mut(target)
            .ok_or_else(|| HostError::not_found("permission", id))?;
        let before = list.len();
        list.retain(|p| p.id != id);
        if list.len() == before {
            return Err(HostError::not_found("permission", id));
        }
        Ok(())
    }
}

impl MediaHost for OfflineHost {
    fn play_url(&self, url: &str) -> HostResult<()> {
        let track = self.resolve_track(url);
        self.state.lock().current = Some(track);
        self.record(format!("play {url}"))
    }

    fn current_track(&self) -> Option<TrackInfo> {
        self.state.lock().current.clone()
    }

    fn track_by_id(&self, id: &str) -> Option<TrackInfo> {
        self.state.lock().tracks.iter().find(|t| t.id == id).cloned()
    }

    fn search(&self, query: &str) -> Vec<TrackInfo> {
        let needle = query.to_lowercase();
        self.state
            .lock()
            .tracks
            .iter()
            .filter(|t| {
                t.title.to_lowercase().contains(&needle)
                    || t.artist.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }

    fn enqueue(&self, url: &str) -> HostResult<()> {
        let track = self.resolve_track(url);
        self.state.lock().queue.push(track);
        self.record(format!("enqueue {url}"))
    }

    fn play_as_next(&self, url: &str) -> HostResult<()> {
        let track = self.resolve_track(url);
        self.state.lock().queue.insert(0, track);
        self.record(format!("play next {url}"))
    }

    fn play_next(&self) -> HostResult<()> {
        let mut state = self.state.lock();
        if state.queue.is_empty() {
            return Err(HostError::Rejected("queue is empty".to_string()));
        }
        let next = state.queue.remove(0);
        state.current = Some(next);
        Ok(())
    }

    fn play_previous(&self) -> HostResult<()> {
        Err(HostError::Unsupported("playPrevious"))
    }

    fn stop(&self, track_id: Option<&str>) -> HostResult<()> {
        let mut state = self.state.lock();
        let matches = match (track_id, &state.current) {
            (None, _) => true,
            (Some(id), Some(current)) => current.id == id,
            (Some(_), None) => false,
        };
        if matches {
            state.current = None;
            state.position = Duration::ZERO;
        }
        Ok(())
    }

    fn queue(&self) -> Vec<TrackInfo> {
        self.state.lock().queue.clone()
    }

    fn remove_from_queue(&self, index: usize) -> HostResult<()> {
        let mut state = self.state.lock();
        if index >= state.queue.len() {
            return Err(HostError::not_found("queue entry", index.to_string()));
        }
        state.queue.remove(index);
        Ok(())
    }

    fn clear_queue(&self) -> HostResult<()> {
        self.state.lock().queue.clear();
        Ok(())
    }

    fn playlists(&self) -> Vec<PlaylistInfo> {
        self.state
            .lock()
            .playlists
            .iter()
            .map(|(p, _)| p.clone())
            .collect()
    }

    fn active_playlist(&self) -> Option<PlaylistInfo> {
        let state = self.state.lock();
        let id = state.active_playlist.as_ref()?;
        state
            .playlists
            .iter()
            .find(|(p, _)| &p.id == id)
            .map(|(p, _)| p.clone())
    }

    fn playlist_tracks(&self, playlist_id: &str) -> HostResult<Vec<PlaylistTrackInfo>> {
        self.state
            .lock()
            .playlists
            .iter()
            .find(|(p, _)| p.id == playlist_id)
            .map(|(_, tracks)| tracks.clone())
            .ok_or_else(|| HostError::not_found("playlist", playlist_id))
    }

    fn set_active_playlist(&self, playlist_id: &str) -> HostResult<()> {
        let mut state = self.state.lock();
        if !state.playlists.iter().any(|(p, _)| p.id == playlist_id) {
            return Err(HostError::not_found("playlist", playlist_id));
        }
        state.active_playlist = Some(playlist_id.to_string());
        Ok(())
    }

    fn clear_playlist(&self) -> HostResult<()> {
        self.state.lock().active_playlist = None;
        Ok(())
    }

    fn yt(&self, url: &str) -> HostResult<()> {
        self.play_url(url)
    }

    fn ytdl(&self, url: &str, play: bool) -> HostResult<()> {
        self.record(format!("ytdl {url} play={play}"))
    }

    fn enqueue_yt(&self, url: &str) -> HostResult<()> {
        self.enqueue(url)
    }

    fn enqueue_ytdl(&self, url: &str) -> HostResult<()> {
        self.record(format!("ytdl {url} enqueue"))
    }

    fn set_thumbnail_from_url(&self, track_id: &str, url: &str) -> HostResult<()> {
        let mut state = self.state.lock();
        let track = state
            .tracks
            .iter_mut()
            .find(|t| t.id == track_id)
            .ok_or_else(|| HostError::not_found("track", track_id))?;
        track.thumbnail = url.rsplit('/').next().unwrap_or(url).to_string();
        Ok(())
    }

    fn remove_thumbnail(&self, track_id: &str) -> HostResult<()> {
        let mut state = self.state.lock();
        let track = state
            .tracks
            .iter_mut()
            .find(|t| t.id == track_id)
            .ok_or_else(|| HostError::not_found("track", track_id))?;
        track.thumbnail.clear();
        Ok(())
    }
}

impl AudioHost for OfflineHost {
    fn set_audio_filter(&self, filter: &str) -> HostResult<()> {
        self.record(format!("filter {filter}"))
    }

    fn set_audio_return_channel(&self, flags: AudioReturnFlags) -> HostResult<()> {
        self.state.lock().return_channel = flags;
        Ok(())
    }

    fn start_recording(&self) -> HostResult<()> {
        if !self
            .state
            .lock()
            .return_channel
            .contains(AudioReturnFlags::MONO)
        {
            return Err(HostError::Rejected("return channel is not enabled".to_string()));
        }
        self.record("start recording".to_string())
    }

    fn stop_recording(&self) -> HostResult<()> {
        self.record("stop recording".to_string())
    }

    fn stream_to_server(&self, url: &str, username: &str, _password: &str) -> HostResult<()> {
        self.record(format!("stream to {url} as {username}"))
    }

    fn stop_stream(&self) -> HostResult<()> {
        self.record("stop stream".to_string())
    }

    fn is_repeat(&self) -> bool {
        self.state.lock().repeat
    }

    fn set_repeat(&self, repeat: bool) {
        self.state.lock().repeat = repeat;
    }

    fn is_shuffle(&self) -> bool {
        self.state.lock().shuffle
    }

    fn set_shuffle(&self, shuffle: bool) {
        self.state.lock().shuffle = shuffle;
    }

    fn volume(&self) -> u8 {
        self.state.lock().volume
    }

    fn set_volume(&self, volume: u8) -> HostResult<()> {
        self.state.lock().volume = volume;
        Ok(())
    }

    fn track_position(&self) -> Duration {
        self.state.lock().position
    }

    fn seek(&self, position: Duration) -> HostResult<()> {
        let mut state = self.state.lock();
        let Some(current) = &state.current else {
            return Err(HostError::Rejected("nothing is playing".to_string()));
        };
        if current.duration > 0 && position > Duration::from_millis(current.duration) {
            return Err(HostError::Rejected("position past end of track".to_string()));
        }
        state.position = position;
        Ok(())
    }

    fn is_mute(&self) -> bool {
        self.state.lock().mute
    }

    fn set_mute(&self, mute: bool) -> HostResult<()> {
        self.state.lock().mute = mute;
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.state.lock().current.is_some()
    }

    fn say(&self, text: &str, locale: Option<&str>) -> HostResult<()> {
        self.record(format!("say [{}] {text}", locale.unwrap_or("en")))
    }

    fn client_count(&self) -> usize {
        let state = self.state.lock();
        let Some(bot) = state.bot_client.as_ref() else {
            return 0;
        };
        let channel = state
            .clients
            .iter()
            .find(|c| &c.id == bot)
            .and_then(|c| c.audio_channel.clone());
        state
            .clients
            .iter()
            .filter(|c| &c.id != bot && channel.is_some() && c.audio_channel == channel)
            .count()
    }

    fn set_stream_volume(&self, stream_id: &str, volume: u8) -> HostResult<()> {
        self.record(format!("stream volume {stream_id}: {volume}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> OfflineHost {
        let mut bot = ClientInfo::new("1", "uid-bot", "lyre");
        bot.audio_channel = Some("10".to_string());
        let mut alice = ClientInfo::new("2", "uid-alice", "alice");
        alice.audio_channel = Some("10".to_string());
        alice.database_id = "42".to_string();
        OfflineHost::new()
            .with_bot_client(bot)
            .with_client(alice)
            .with_channel(ChannelInfo::new("10", "Lobby"))
            .with_channel(ChannelInfo::new("11", "Music"))
    }

    #[test]
    fn test_disconnected_host_rejects_actions() {
        let host = host();
        host.set_connected(false);
        assert_eq!(host.chat("hi"), Err(HostError::NotConnected));
        assert!(host.actions().is_empty());
    }

    #[test]
    fn test_move_and_current_channel() {
        let host = host();
        assert_eq!(host.current_channel().map(|c| c.name), Some("Lobby".into()));
        assert_eq!(host.client_count(), 1);

        host.client_move("2", "11", None).unwrap();
        assert_eq!(host.client_count(), 0);
        assert!(matches!(
            host.client_move("2", "99", None),
            Err(HostError::NotFound { kind: "channel", .. })
        ));
    }

    #[test]
    fn test_server_group_by_database_id() {
        let host = host();
        host.server_group_add_client("6", "42").unwrap();
        let alice = host.clients().into_iter().find(|c| c.id == "2").unwrap();
        assert_eq!(alice.server_groups, vec!["6".to_string()]);
    }

    #[test]
    fn test_permission_lifecycle() {
        let host = host();
        let target = PermissionTarget::Channel("10".into());
        let mut perm = host.add_permission(&target, "i_channel_needed_join_power").unwrap();
        assert!(host.add_permission(&target, "i_channel_needed_join_power").is_err());

        perm.value = 50;
        host.save_permission(&target, &perm).unwrap();
        assert_eq!(host.permissions(&target).unwrap()[0].value, 50);

        host.delete_permission(&target, &perm.id).unwrap();
        assert!(host.permissions(&target).unwrap().is_empty());
    }

    #[test]
    fn test_queue_and_seek() {
        let host = OfflineHost::new().with_track(TrackInfo {
            id: "t1".into(),
            url: "https://example.com/a.mp3".into(),
            duration: 60_000,
            ..TrackInfo::default()
        });
        host.enqueue("track://t1").unwrap();
        assert_eq!(host.queue()[0].url, "https://example.com/a.mp3");

        assert!(host.seek(Duration::from_secs(1)).is_err());
        host.play_next().unwrap();
        assert!(host.is_playing());
        host.seek(Duration::from_secs(30)).unwrap();
        assert!(host.seek(Duration::from_secs(61)).is_err());
    }
}
