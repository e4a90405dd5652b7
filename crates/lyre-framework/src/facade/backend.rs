use std::sync::Arc;

use lyre_core::{BackendHost, BackendKind, ChannelParams};
use tracing::debug;

use crate::context::InstanceServices;
use crate::entity::{Channel, ChannelGroup, Client, ServerGroup, accepted};

/// The chat server the instance is connected to.
#[derive(Clone)]
pub struct Backend {
    host: Arc<dyn BackendHost>,
    kind: BackendKind,
}

impl Backend {
    pub(crate) fn new(services: &InstanceServices) -> Self {
        Self {
            host: Arc::clone(&services.host.backend),
            kind: services.backend_kind,
        }
    }

    fn client(&self, info: lyre_core::ClientInfo) -> Client {
        Client::new(info, Arc::clone(&self.host))
    }

    fn channel(&self, info: lyre_core::ChannelInfo) -> Channel {
        Channel::new(info, Arc::clone(&self.host))
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn connect(&self) -> bool {
        accepted("backend.connect", self.host.connect())
    }

    pub fn disconnect(&self) -> bool {
        accepted("backend.disconnect", self.host.disconnect())
    }

    pub fn is_connected(&self) -> bool {
        self.host.is_connected()
    }

    pub fn bot_client_id(&self) -> Option<String> {
        self.host.bot_client().map(|c| c.id)
    }

    pub fn bot_client(&self) -> Option<Client> {
        self.host.bot_client().map(|c| self.client(c))
    }

    pub fn nick(&self) -> String {
        self.host.nick()
    }

    // ---- channels ------------------------------------------------------------

    pub fn channels(&self) -> Vec<Channel> {
        self.host
            .channels()
            .into_iter()
            .map(|c| self.channel(c))
            .collect()
    }

    pub fn channel_count(&self) -> usize {
        self.host.channels().len()
    }

    pub fn channel_by_id(&self, id: &str) -> Option<Channel> {
        self.host
            .channels()
            .into_iter()
            .find(|c| c.id == id)
            .map(|c| self.channel(c))
    }

    /// First channel named `name`, preferring an exact match over a
    /// case-insensitive one.
    pub fn channel_by_name(&self, name: &str) -> Option<Channel> {
        let channels = self.host.channels();
        let exact = channels.iter().position(|c| c.name == name);
        let index = exact.or_else(|| {
            channels
                .iter()
                .position(|c| c.name.eq_ignore_ascii_case(name))
        })?;
        channels.into_iter().nth(index).map(|c| self.channel(c))
    }

    /// Every channel whose name contains `name`, ignoring case.
    pub fn channels_by_name(&self, name: &str) -> Vec<Channel> {
        let needle = name.to_lowercase();
        self.host
            .channels()
            .into_iter()
            .filter(|c| c.name.to_lowercase().contains(&needle))
            .map(|c| self.channel(c))
            .collect()
    }

    pub fn current_channel(&self) -> Option<Channel> {
        self.host.current_channel().map(|c| self.channel(c))
    }

    /// Creates a channel. TeamSpeak requires a name and a parent.
    pub fn create_channel(&self, params: &ChannelParams) -> Option<Channel> {
        let named = params.name.as_deref().is_some_and(|n| !n.trim().is_empty());
        if !named || (self.kind == BackendKind::Ts3 && params.parent.is_none()) {
            debug!(?params, "Refusing to create channel without name or parent");
            return None;
        }
        match self.host.create_channel(params) {
            Ok(info) => Some(self.channel(info)),
            Err(e) => {
                debug!(error = %e, "Channel creation failed");
                None
            }
        }
    }

    // ---- clients -------------------------------------------------------------

    pub fn clients(&self) -> Vec<Client> {
        self.host
            .clients()
            .into_iter()
            .map(|c| self.client(c))
            .collect()
    }

    fn find_client(&self, pred: impl Fn(&lyre_core::ClientInfo) -> bool) -> Option<Client> {
        self.host
            .clients()
            .into_iter()
            .find(|c| pred(c))
            .map(|c| self.client(c))
    }

    pub fn client_by_id(&self, id: &str) -> Option<Client> {
        self.find_client(|c| c.id == id)
    }

    pub fn client_by_name(&self, name: &str) -> Option<Client> {
        self.find_client(|c| c.name == name)
    }

    pub fn client_by_nick(&self, nick: &str) -> Option<Client> {
        self.client_by_name(nick)
    }

    pub fn client_by_unique_id(&self, uid: &str) -> Option<Client> {
        self.find_client(|c| c.uid == uid)
    }

    pub fn client_by_uid(&self, uid: &str) -> Option<Client> {
        self.client_by_unique_id(uid)
    }

    /// Sends a server-wide chat message.
    pub fn chat(&self, text: &str) -> bool {
        accepted("backend.chat", self.host.chat(text))
    }

    // ---- groups --------------------------------------------------------------

    pub fn server_groups(&self) -> Vec<ServerGroup> {
        self.host
            .server_groups()
            .into_iter()
            .map(|g| ServerGroup::new(g, Arc::clone(&self.host)))
            .collect()
    }

    pub fn channel_groups(&self) -> Vec<ChannelGroup> {
        self.host
            .channel_groups()
            .into_iter()
            .map(|g| ChannelGroup::new(g, Arc::clone(&self.host)))
            .collect()
    }

    pub fn server_group_by_id(&self, id: &str) -> Option<ServerGroup> {
        self.server_groups().into_iter().find(|g| g.id == id)
    }

    pub fn channel_group_by_id(&self, id: &str) -> Option<ChannelGroup> {
        self.channel_groups().into_iter().find(|g| g.id == id)
    }
}
