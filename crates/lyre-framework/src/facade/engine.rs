use std::any::Any;
use std::fmt::Display;
use std::sync::Arc;

use lyre_core::{BackendKind, EngineHost};
use tracing::info;

use crate::context::ScriptContext;
use crate::entity::{Track, User, accepted};

/// Highest accepted log level.
pub const MAX_LOG_LEVEL: u8 = 11;

/// Bot-wide controls.
#[derive(Clone)]
pub struct Engine {
    ctx: ScriptContext,
    host: Arc<dyn EngineHost>,
}

impl Engine {
    pub(crate) fn new(ctx: ScriptContext) -> Self {
        let host = Arc::clone(&ctx.services().host.engine);
        Self { ctx, host }
    }

    pub fn instance_id(&self) -> &str {
        self.ctx.instance_id()
    }

    pub fn bot_id(&self) -> String {
        self.host.bot_id()
    }

    pub fn backend(&self) -> BackendKind {
        self.ctx.services().backend_kind
    }

    /// Sets the instance log level (0 to 11).
    pub fn set_instance_log_level(&self, level: u8) -> bool {
        level <= MAX_LOG_LEVEL
            && accepted(
                "engine.setInstanceLogLevel",
                self.host.set_instance_log_level(level),
            )
    }

    pub fn instance_log_level(&self) -> u8 {
        self.host.instance_log_level()
    }

    /// Sets the bot log level (0 to 11).
    pub fn set_bot_log_level(&self, level: u8) -> bool {
        level <= MAX_LOG_LEVEL
            && accepted("engine.setBotLogLevel", self.host.set_bot_log_level(level))
    }

    pub fn bot_log_level(&self) -> u8 {
        self.host.bot_log_level()
    }

    pub fn reload_scripts(&self) -> bool {
        accepted("engine.reloadScripts", self.host.reload_scripts())
    }

    pub fn nick(&self) -> String {
        self.host.nick()
    }

    pub fn set_nick(&self, nick: &str) -> bool {
        !nick.trim().is_empty() && accepted("engine.setNick", self.host.set_nick(nick))
    }

    pub fn set_default_channel_id(&self, channel_id: &str) -> bool {
        accepted(
            "engine.setDefaultChannelID",
            self.host.set_default_channel_id(channel_id),
        )
    }

    pub fn is_running(&self) -> bool {
        self.host.is_running()
    }

    pub fn notify(&self, message: &str) {
        accepted("engine.notify", self.host.notify(message));
    }

    pub fn save_config(&self) -> bool {
        accepted("engine.saveConfig", self.host.save_config())
    }

    /// Writes to the instance log.
    pub fn log(&self, message: impl Display) {
        info!(
            target: "lyre::script",
            instance = %self.ctx.instance_id(),
            script = %self.ctx.name(),
            "{message}"
        );
    }

    /// Publishes `value` for other scripts on this instance.
    ///
    /// See [`ScriptContext::import`].
    pub fn export<T: Any + Send + Sync>(&self, value: T) {
        self.ctx
            .services()
            .exports
            .export(self.ctx.name(), value);
    }

    pub fn remove_avatar(&self) -> bool {
        accepted("engine.removeAvatar", self.host.remove_avatar())
    }

    pub fn set_avatar_from_track(&self, track: &Track) -> bool {
        accepted(
            "engine.setAvatarFromTrack",
            self.host.set_avatar_from_track(track.info()),
        )
    }

    pub fn set_avatar_from_banner(&self, banner: &str) -> bool {
        accepted(
            "engine.setAvatarFromBanner",
            self.host.set_avatar_from_banner(banner),
        )
    }

    pub fn set_avatar_from_url(&self, url: &str) -> bool {
        accepted("engine.setAvatarFromURL", self.host.set_avatar_from_url(url))
    }

    pub fn set_default_avatar(&self) -> bool {
        accepted("engine.setDefaultAvatar", self.host.set_default_avatar())
    }

    pub fn users(&self) -> Vec<User> {
        self.host
            .users()
            .into_iter()
            .map(|u| User::new(u, Arc::clone(&self.host)))
            .collect()
    }

    pub fn user_by_id(&self, id: &str) -> Option<User> {
        self.users().into_iter().find(|u| u.id == id)
    }

    pub fn user_by_name(&self, name: &str) -> Option<User> {
        self.users().into_iter().find(|u| u.name == name)
    }

    pub fn set_command_prefix(&self, prefix: &str) -> bool {
        accepted("engine.setCommandPrefix", self.host.set_command_prefix(prefix))
    }

    pub fn command_prefix(&self) -> String {
        self.host.command_prefix()
    }
}
