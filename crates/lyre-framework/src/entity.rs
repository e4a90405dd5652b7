//! Actionable handles around host entity records.
//!
//! A handle pairs a snapshot ([`ClientInfo`], [`ChannelInfo`], ...) with the
//! host so scripts can write `client.chat("hi")`. Handles dereference to their
//! record for read access. Actions follow the boolean idiom: `true` when the
//! host accepted the request.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use lyre_core::{
    BackendHost, ChannelGroupInfo, ChannelInfo, ChannelParams, ClientInfo, EngineHost, HostResult,
    KickScope, MediaHost, PermissionInfo, PermissionTarget, PlaylistInfo, PlaylistTrackInfo,
    ServerGroupInfo, TrackInfo, UserInfo,
};
use tracing::debug;

/// Collapses a host result into the boolean script idiom.
pub(crate) fn accepted(op: &'static str, result: HostResult<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            debug!(op, error = %e, "Host rejected request");
            false
        }
    }
}

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident($info:ty, $host:ident: $host_ty:ty)) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            info: $info,
            $host: Arc<$host_ty>,
        }

        impl $name {
            pub fn new(info: $info, $host: Arc<$host_ty>) -> Self {
                Self { info, $host }
            }

            /// The underlying record.
            pub fn info(&self) -> &$info {
                &self.info
            }

            pub fn into_info(self) -> $info {
                self.info
            }
        }

        impl Deref for $name {
            type Target = $info;

            fn deref(&self) -> &$info {
                &self.info
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(&self.info, f)
            }
        }
    };
}

// =============================================================================
// Client
// =============================================================================

handle!(
    /// A client on the chat server.
    Client(ClientInfo, backend: dyn BackendHost)
);

impl Client {
    pub fn nick(&self) -> &str {
        &self.info.name
    }

    pub fn unique_id(&self) -> &str {
        &self.info.uid
    }

    /// `client://0/<uid>~<nick>`, usable in chat markup.
    pub fn url(&self) -> String {
        self.info.url()
    }

    /// Compares client ids.
    pub fn equals(&self, other: &Client) -> bool {
        self.info.id == other.info.id
    }

    pub fn server_groups(&self) -> Vec<ServerGroup> {
        self.backend
            .server_groups()
            .into_iter()
            .filter(|g| self.info.server_groups.contains(&g.id))
            .map(|g| ServerGroup::new(g, Arc::clone(&self.backend)))
            .collect()
    }

    pub fn channel_group(&self) -> Option<ChannelGroup> {
        let id = self.info.channel_group.as_ref()?;
        self.backend
            .channel_groups()
            .into_iter()
            .find(|g| &g.id == id)
            .map(|g| ChannelGroup::new(g, Arc::clone(&self.backend)))
    }

    /// Channels the client is in.
    pub fn channels(&self) -> Vec<Channel> {
        self.backend
            .channels()
            .into_iter()
            .filter(|c| self.info.channels.contains(&c.id))
            .map(|c| Channel::new(c, Arc::clone(&self.backend)))
            .collect()
    }

    pub fn audio_channel(&self) -> Option<Channel> {
        let id = self.info.audio_channel.as_ref()?;
        self.backend
            .channels()
            .into_iter()
            .find(|c| &c.id == id)
            .map(|c| Channel::new(c, Arc::clone(&self.backend)))
    }

    /// Sends a direct message.
    pub fn chat(&self, text: &str) -> bool {
        accepted("client.chat", self.backend.client_chat(&self.info.id, text))
    }

    pub fn poke(&self, text: &str) -> bool {
        accepted("client.poke", self.backend.client_poke(&self.info.id, text))
    }

    pub fn ban(&self, duration: Duration, reason: &str) -> bool {
        accepted(
            "client.ban",
            self.backend.client_ban(&self.info.id, duration, reason),
        )
    }

    /// Kicks the client from the server.
    pub fn kick(&self, reason: &str) -> bool {
        self.kick_from_server(reason)
    }

    pub fn kick_from_server(&self, reason: &str) -> bool {
        accepted(
            "client.kickFromServer",
            self.backend
                .client_kick(&self.info.id, KickScope::Server, reason),
        )
    }

    pub fn kick_from_channel(&self, reason: &str) -> bool {
        accepted(
            "client.kickFromChannel",
            self.backend
                .client_kick(&self.info.id, KickScope::Channel, reason),
        )
    }

    pub fn add_to_server_group(&self, group_id: &str) -> bool {
        accepted(
            "client.addToServerGroup",
            self.backend.client_add_server_group(&self.info.id, group_id),
        )
    }

    pub fn remove_from_server_group(&self, group_id: &str) -> bool {
        accepted(
            "client.removeFromServerGroup",
            self.backend
                .client_remove_server_group(&self.info.id, group_id),
        )
    }

    pub fn move_to(&self, channel: &Channel, password: Option<&str>) -> bool {
        accepted(
            "client.moveTo",
            self.backend.client_move(&self.info.id, &channel.id, password),
        )
    }

    pub fn set_subscription(&self, subscribed: bool) -> bool {
        accepted(
            "client.setSubscription",
            self.backend
                .client_set_subscription(&self.info.id, subscribed),
        )
    }

    pub fn set_description(&self, description: &str) -> bool {
        accepted(
            "client.setDescription",
            self.backend
                .client_set_description(&self.info.id, description),
        )
    }
}

// =============================================================================
// Channel
// =============================================================================

handle!(
    /// A channel on the chat server.
    Channel(ChannelInfo, backend: dyn BackendHost)
);

impl Channel {
    /// Compares channel ids.
    pub fn equals(&self, other: &Channel) -> bool {
        self.info.id == other.info.id
    }

    pub fn parent(&self) -> Option<Channel> {
        let id = self.info.parent.as_ref()?;
        self.backend
            .channels()
            .into_iter()
            .find(|c| &c.id == id)
            .map(|c| Channel::new(c, Arc::clone(&self.backend)))
    }

    /// Clients currently in the channel.
    pub fn clients(&self) -> Vec<Client> {
        self.backend
            .clients()
            .into_iter()
            .filter(|c| c.channels.contains(&self.info.id) || self.info.clients.contains(&c.id))
            .map(|c| Client::new(c, Arc::clone(&self.backend)))
            .collect()
    }

    pub fn client_count(&self) -> usize {
        self.clients().len()
    }

    pub fn chat(&self, text: &str) -> bool {
        accepted("channel.chat", self.backend.channel_chat(&self.info.id, text))
    }

    /// Applies `params` and refreshes the local snapshot on success.
    pub fn update(&mut self, params: &ChannelParams) -> bool {
        let ok = accepted(
            "channel.update",
            self.backend.channel_update(&self.info.id, params),
        );
        if ok {
            params.apply_to(&mut self.info);
        }
        ok
    }

    pub fn set_name(&mut self, name: &str) -> bool {
        self.update(&ChannelParams::named(name))
    }

    pub fn set_topic(&mut self, topic: &str) -> bool {
        self.update(&ChannelParams {
            topic: Some(topic.to_string()),
            ..Default::default()
        })
    }

    pub fn set_description(&mut self, description: &str) -> bool {
        self.update(&ChannelParams {
            description: Some(description.to_string()),
            ..Default::default()
        })
    }

    pub fn set_max_clients(&mut self, max_clients: i64) -> bool {
        self.update(&ChannelParams {
            max_clients: Some(max_clients),
            ..Default::default()
        })
    }

    /// Maximum clients including sub-channels; `-1` lifts the limit.
    pub fn set_max_family_clients(&mut self, max_family_clients: i64) -> bool {
        self.update(&ChannelParams {
            max_family_clients: Some(max_family_clients),
            ..Default::default()
        })
    }

    pub fn set_codec(&mut self, codec: u32) -> bool {
        self.update(&ChannelParams {
            codec: Some(codec),
            ..Default::default()
        })
    }

    pub fn set_codec_quality(&mut self, quality: u32) -> bool {
        self.update(&ChannelParams {
            codec_quality: Some(quality),
            ..Default::default()
        })
    }

    pub fn set_permanent(&mut self, permanent: bool) -> bool {
        self.update(&ChannelParams {
            permanent: Some(permanent),
            ..Default::default()
        })
    }

    pub fn set_semi_permanent(&mut self, semi_permanent: bool) -> bool {
        self.update(&ChannelParams {
            semi_permanent: Some(semi_permanent),
            ..Default::default()
        })
    }

    pub fn set_encrypted(&mut self, encrypted: bool) -> bool {
        self.update(&ChannelParams {
            encrypted: Some(encrypted),
            ..Default::default()
        })
    }

    pub fn delete(&self) -> bool {
        accepted("channel.delete", self.backend.channel_delete(&self.info.id))
    }

    pub fn move_to(&self, parent_id: &str, order: i64) -> bool {
        accepted(
            "channel.moveTo",
            self.backend.channel_move(&self.info.id, parent_id, order),
        )
    }

    pub fn set_subscription(&self, subscribed: bool) -> bool {
        accepted(
            "channel.setSubscription",
            self.backend
                .channel_set_subscription(&self.info.id, subscribed),
        )
    }

    pub fn set_channel_group(&self, client: &Client, group: &ChannelGroup) -> bool {
        accepted(
            "channel.setChannelGroup",
            self.backend
                .channel_set_group(&self.info.id, &client.id, &group.id),
        )
    }

    pub fn permissions(&self) -> Vec<Permission> {
        permissions(&self.backend, PermissionTarget::Channel(self.info.id.clone()))
    }

    pub fn add_permission(&self, id: &str) -> Option<Permission> {
        add_permission(
            &self.backend,
            PermissionTarget::Channel(self.info.id.clone()),
            id,
        )
    }
}

// =============================================================================
// Groups
// =============================================================================

handle!(
    /// A server group.
    ServerGroup(ServerGroupInfo, backend: dyn BackendHost)
);

impl ServerGroup {
    pub fn add_client_by_database_id(&self, database_id: &str) -> bool {
        accepted(
            "serverGroup.addClientByDatabaseId",
            self.backend
                .server_group_add_client(&self.info.id, database_id),
        )
    }

    pub fn permissions(&self) -> Vec<Permission> {
        permissions(
            &self.backend,
            PermissionTarget::ServerGroup(self.info.id.clone()),
        )
    }

    pub fn add_permission(&self, id: &str) -> Option<Permission> {
        add_permission(
            &self.backend,
            PermissionTarget::ServerGroup(self.info.id.clone()),
            id,
        )
    }
}

handle!(
    /// A channel group.
    ChannelGroup(ChannelGroupInfo, backend: dyn BackendHost)
);

impl ChannelGroup {
    pub fn permissions(&self) -> Vec<Permission> {
        permissions(
            &self.backend,
            PermissionTarget::ChannelGroup(self.info.id.clone()),
        )
    }

    pub fn add_permission(&self, id: &str) -> Option<Permission> {
        add_permission(
            &self.backend,
            PermissionTarget::ChannelGroup(self.info.id.clone()),
            id,
        )
    }
}

fn permissions(backend: &Arc<dyn BackendHost>, target: PermissionTarget) -> Vec<Permission> {
    match backend.permissions(&target) {
        Ok(list) => list
            .into_iter()
            .map(|info| Permission::new(info, target.clone(), Arc::clone(backend)))
            .collect(),
        Err(e) => {
            debug!(?target, error = %e, "Permission listing failed");
            Vec::new()
        }
    }
}

fn add_permission(
    backend: &Arc<dyn BackendHost>,
    target: PermissionTarget,
    id: &str,
) -> Option<Permission> {
    match backend.add_permission(&target, id) {
        Ok(info) => Some(Permission::new(info, target, Arc::clone(backend))),
        Err(e) => {
            debug!(?target, id, error = %e, "Adding permission failed");
            None
        }
    }
}

// =============================================================================
// Permission
// =============================================================================

/// A permission on a group or channel.
///
/// Setters only stage changes; [`save`](Self::save) sends them to the host.
#[derive(Clone)]
pub struct Permission {
    info: PermissionInfo,
    target: PermissionTarget,
    backend: Arc<dyn BackendHost>,
}

impl Permission {
    pub fn new(info: PermissionInfo, target: PermissionTarget, backend: Arc<dyn BackendHost>) -> Self {
        Self {
            info,
            target,
            backend,
        }
    }

    pub fn target(&self) -> &PermissionTarget {
        &self.target
    }

    pub fn set_value(&mut self, value: i64) -> &mut Self {
        self.info.value = value;
        self
    }

    pub fn set_skip(&mut self, skip: bool) -> &mut Self {
        self.info.skip = skip;
        self
    }

    pub fn set_negated(&mut self, negated: bool) -> &mut Self {
        self.info.negated = negated;
        self
    }

    /// Applies the staged changes.
    pub fn save(&self) -> bool {
        accepted(
            "permission.save",
            self.backend.save_permission(&self.target, &self.info),
        )
    }

    pub fn delete(&self) -> bool {
        accepted(
            "permission.delete",
            self.backend.delete_permission(&self.target, &self.info.id),
        )
    }
}

impl Deref for Permission {
    type Target = PermissionInfo;

    fn deref(&self) -> &PermissionInfo {
        &self.info
    }
}

impl fmt::Debug for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permission")
            .field("info", &self.info)
            .field("target", &self.target)
            .finish()
    }
}

// =============================================================================
// User
// =============================================================================

handle!(
    /// A user of the bot's web interface.
    User(UserInfo, engine: dyn EngineHost)
);

impl User {
    pub fn set_password(&self, password: &str) -> bool {
        accepted(
            "user.setPassword",
            self.engine.set_user_password(&self.info.id, password),
        )
    }

    pub fn set_ts_uid(&mut self, ts_uid: &str) -> bool {
        let ok = accepted(
            "user.setTSUid",
            self.engine.set_user_ts_uid(&self.info.id, ts_uid),
        );
        if ok {
            self.info.ts_uid = ts_uid.to_string();
        }
        ok
    }

    pub fn set_privileges(&mut self, privileges: u32) -> bool {
        let ok = accepted(
            "user.setPrivileges",
            self.engine.set_user_privileges(&self.info.id, privileges),
        );
        if ok {
            self.info.privileges = privileges;
        }
        ok
    }

    pub fn add_privilege(&mut self, privilege: u32) -> bool {
        self.set_privileges(self.info.privileges | privilege)
    }

    pub fn remove_privilege(&mut self, privilege: u32) -> bool {
        self.set_privileges(self.info.privileges & !privilege)
    }

    pub fn delete(&self) -> bool {
        accepted("user.delete", self.engine.delete_user(&self.info.id))
    }
}

// =============================================================================
// Media
// =============================================================================

handle!(
    /// A track in the media library.
    Track(TrackInfo, media: dyn MediaHost)
);

impl Track {
    fn play_url(&self) -> String {
        if self.info.url.is_empty() {
            format!("track://{}", self.info.id)
        } else {
            self.info.url.clone()
        }
    }

    pub fn play(&self) -> bool {
        accepted("track.play", self.media.play_url(&self.play_url()))
    }

    pub fn enqueue(&self) -> bool {
        accepted("track.enqueue", self.media.enqueue(&self.play_url()))
    }

    pub fn set_thumbnail_from_url(&self, url: &str) -> bool {
        accepted(
            "track.setThumbnailFromURL",
            self.media.set_thumbnail_from_url(&self.info.id, url),
        )
    }

    pub fn remove_thumbnail(&self) -> bool {
        accepted(
            "track.removeThumbnail",
            self.media.remove_thumbnail(&self.info.id),
        )
    }
}

handle!(
    /// A playlist.
    Playlist(PlaylistInfo, media: dyn MediaHost)
);

impl Playlist {
    pub fn tracks(&self) -> Vec<PlaylistTrack> {
        match self.media.playlist_tracks(&self.info.id) {
            Ok(tracks) => tracks
                .into_iter()
                .map(|t| PlaylistTrack::new(t, Arc::clone(&self.media)))
                .collect(),
            Err(e) => {
                debug!(playlist = %self.info.id, error = %e, "Playlist listing failed");
                Vec::new()
            }
        }
    }

    pub fn set_active(&self) -> bool {
        accepted(
            "playlist.setActive",
            self.media.set_active_playlist(&self.info.id),
        )
    }
}

handle!(
    /// An entry of a playlist.
    PlaylistTrack(PlaylistTrackInfo, media: dyn MediaHost)
);

impl PlaylistTrack {
    pub fn play(&self) -> bool {
        accepted("playlistTrack.play", self.media.play_url(&self.info.url))
    }
}
