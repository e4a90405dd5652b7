use std::sync::Arc;

use lyre_core::MediaHost;

use crate::context::InstanceServices;
use crate::entity::{Playlist, Track, accepted};

/// The media library and play queue.
#[derive(Clone)]
pub struct Media {
    host: Arc<dyn MediaHost>,
}

impl Media {
    pub(crate) fn new(services: &InstanceServices) -> Self {
        Self {
            host: Arc::clone(&services.host.media),
        }
    }

    fn track(&self, info: lyre_core::TrackInfo) -> Track {
        Track::new(info, Arc::clone(&self.host))
    }

    fn tracks(&self, infos: Vec<lyre_core::TrackInfo>) -> Vec<Track> {
        infos.into_iter().map(|t| self.track(t)).collect()
    }

    /// Plays an internal url such as `track://<id>`.
    pub fn play_url(&self, url: &str) -> bool {
        accepted("media.playURL", self.host.play_url(url))
    }

    pub fn current_track(&self) -> Option<Track> {
        self.host.current_track().map(|t| self.track(t))
    }

    pub fn track_by_id(&self, id: &str) -> Option<Track> {
        self.host.track_by_id(id).map(|t| self.track(t))
    }

    pub fn search(&self, query: &str) -> Vec<Track> {
        self.tracks(self.host.search(query))
    }

    pub fn enqueue(&self, url: &str) -> bool {
        accepted("media.enqueue", self.host.enqueue(url))
    }

    pub fn play_as_next(&self, url: &str) -> bool {
        accepted("media.playAsNext", self.host.play_as_next(url))
    }

    pub fn play_next(&self) -> bool {
        accepted("media.playNext", self.host.play_next())
    }

    pub fn play_previous(&self) -> bool {
        accepted("media.playPrevious", self.host.play_previous())
    }

    /// Stops `track_id`, or everything when `None`.
    pub fn stop(&self, track_id: Option<&str>) -> bool {
        accepted("media.stop", self.host.stop(track_id))
    }

    pub fn queue(&self) -> Vec<Track> {
        self.tracks(self.host.queue())
    }

    /// Removes the queue entry at `index` (0 is the next track).
    pub fn remove_from_queue(&self, index: usize) -> bool {
        index < self.host.queue().len()
            && accepted("media.removeFromQueue", self.host.remove_from_queue(index))
    }

    pub fn clear_queue(&self) -> bool {
        accepted("media.clearQueue", self.host.clear_queue())
    }

    pub fn playlists(&self) -> Vec<Playlist> {
        self.host
            .playlists()
            .into_iter()
            .map(|p| Playlist::new(p, Arc::clone(&self.host)))
            .collect()
    }

    pub fn playlist_by_id(&self, id: &str) -> Option<Playlist> {
        self.playlists().into_iter().find(|p| p.id == id)
    }

    pub fn active_playlist(&self) -> Option<Playlist> {
        self.host
            .active_playlist()
            .map(|p| Playlist::new(p, Arc::clone(&self.host)))
    }

    pub fn clear_playlist(&self) -> bool {
        accepted("media.clearPlaylist", self.host.clear_playlist())
    }

    pub fn yt(&self, url: &str) -> bool {
        accepted("media.yt", self.host.yt(url))
    }

    /// Downloads `url`; progress arrives as `ytdl.success` / `ytdl.error`.
    pub fn ytdl(&self, url: &str, play: bool) -> bool {
        accepted("media.ytdl", self.host.ytdl(url, play))
    }

    pub fn enqueue_yt(&self, url: &str) -> bool {
        accepted("media.enqueueYt", self.host.enqueue_yt(url))
    }

    pub fn enqueue_ytdl(&self, url: &str) -> bool {
        accepted("media.enqueueYtdl", self.host.enqueue_ytdl(url))
    }
}
