use std::sync::Arc;
use std::time::Duration;

use lyre_core::{AudioHost, AudioReturnFlags};

use crate::context::InstanceServices;
use crate::entity::accepted;

/// The instance's audio pipeline.
#[derive(Clone)]
pub struct Audio {
    host: Arc<dyn AudioHost>,
}

impl Audio {
    pub(crate) fn new(services: &InstanceServices) -> Self {
        Self {
            host: Arc::clone(&services.host.audio),
        }
    }

    /// Applies an ffmpeg-compatible filter expression.
    pub fn set_audio_filter(&self, filter: &str) -> bool {
        accepted("audio.setAudioFilter", self.host.set_audio_filter(filter))
    }

    /// Sets the return channel: `0x01` for recording, `0x02` for speech
    /// recognition, `0x03` for both.
    pub fn set_audio_return_channel(&self, flags: u8) -> bool {
        flags <= (AudioReturnFlags::MONO | AudioReturnFlags::SPEECH).0
            && accepted(
                "audio.setAudioReturnChannel",
                self.host.set_audio_return_channel(AudioReturnFlags(flags)),
            )
    }

    pub fn start_recording(&self) -> bool {
        accepted("audio.startRecording", self.host.start_recording())
    }

    pub fn stop_recording(&self) -> bool {
        accepted("audio.stopRecording", self.host.stop_recording())
    }

    pub fn stream_to_server(&self, url: &str, username: &str, password: &str) -> bool {
        accepted(
            "audio.streamToServer",
            self.host.stream_to_server(url, username, password),
        )
    }

    pub fn stop_stream(&self) -> bool {
        accepted("audio.stopStream", self.host.stop_stream())
    }

    pub fn is_repeat(&self) -> bool {
        self.host.is_repeat()
    }

    pub fn set_repeat(&self, repeat: bool) {
        self.host.set_repeat(repeat);
    }

    pub fn is_shuffle(&self) -> bool {
        self.host.is_shuffle()
    }

    pub fn set_shuffle(&self, shuffle: bool) {
        self.host.set_shuffle(shuffle);
    }

    pub fn volume(&self) -> u8 {
        self.host.volume()
    }

    /// Sets the volume; values outside 0..=100 are rejected.
    pub fn set_volume(&self, volume: i64) -> bool {
        match u8::try_from(volume) {
            Ok(v) if v <= 100 => accepted("audio.setVolume", self.host.set_volume(v)),
            _ => false,
        }
    }

    pub fn track_position(&self) -> Duration {
        self.host.track_position()
    }

    pub fn seek(&self, position: Duration) -> bool {
        accepted("audio.seek", self.host.seek(position))
    }

    pub fn is_mute(&self) -> bool {
        self.host.is_mute()
    }

    pub fn set_mute(&self, mute: bool) -> bool {
        accepted("audio.setMute", self.host.set_mute(mute))
    }

    pub fn is_playing(&self) -> bool {
        self.host.is_playing()
    }

    /// Text-to-speech.
    pub fn say(&self, text: &str, locale: Option<&str>) -> bool {
        accepted("audio.say", self.host.say(text, locale))
    }

    pub fn client_count(&self) -> usize {
        self.host.client_count()
    }

    pub fn set_stream_volume(&self, stream_id: &str, volume: i64) -> bool {
        match u8::try_from(volume) {
            Ok(v) if v <= 100 => accepted(
                "audio.setStreamVolume",
                self.host.set_stream_volume(stream_id, v),
            ),
            _ => false,
        }
    }
}
