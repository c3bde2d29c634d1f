// ==========================================
// AUDIO PLAYBACK ENGINE
// ==========================================
// The playback sink for local files, built on rodio.
// It handles:
// - Connecting to the default audio output device
// - Playing, pausing, resuming, stopping a file
// - Volume control
// - Elapsed time (rodio doesn't expose a position, so we clock it)
// - Reporting PlaybackEvents for the queue manager to consume
//
// Key Concept: rodio's Sink is a queue of decoded sources. We only ever
// keep one source in it; "sink is empty" after real playback means the
// track ended.

use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::{Duration, Instant};

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tracing::{debug, info, warn};

use crate::error::ResolveError;
use crate::player::queue::PlaybackEvent;

// An empty sink this soon after play() is a loading blip, not a real end.
const END_GUARD: Duration = Duration::from_secs(1);

// ==========================================
// PLAYER STATE ENUM
// ==========================================
// What the device is doing right now. Not the same thing as the queue
// manager's PlaybackState: this one knows nothing about track indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Stopped,
    Playing,
    Paused,
}

// ==========================================
// AUDIO PLAYER STRUCT
// ==========================================
// Fields explained:
//
// output: Option<(OutputStream, OutputStreamHandle)>
//   - The OutputStream must stay alive for the sink to make sound
//   - None when no audio device was found; the player then refuses to play
//
// events: VecDeque<PlaybackEvent>
//   - Pending reports for the queue manager, drained by poll_event()
//
// start_time / pause_time / total_paused
//   - Wall-clock bookkeeping behind time_pos()
pub struct AudioPlayer {
    output: Option<(OutputStream, OutputStreamHandle)>,
    sink: Option<Sink>,
    state: PlayerState,
    volume: u32,
    duration: Option<Duration>,
    start_time: Option<Instant>,
    pause_time: Option<Instant>,
    total_paused: Duration,
    events: VecDeque<PlaybackEvent>,
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        if let Some(sink) = &self.sink {
            sink.stop();
        }
    }
}

impl AudioPlayer {
    // ==========================================
    // CONSTRUCTOR: new()
    // ==========================================
    // Opens the default output device. A machine without one still gets a
    // player; play() will then report NoOutputDevice.
    pub fn new(volume: u32) -> Self {
        let (output, sink) = match OutputStream::try_default() {
            Ok((stream, handle)) => match Sink::try_new(&handle) {
                Ok(sink) => (Some((stream, handle)), Some(sink)),
                Err(e) => {
                    warn!(error = %e, "could not create audio sink");
                    (None, None)
                }
            },
            Err(e) => {
                warn!(error = %e, "no audio output device");
                (None, None)
            }
        };

        let mut player = AudioPlayer {
            output,
            sink,
            state: PlayerState::Stopped,
            volume: 100,
            duration: None,
            start_time: None,
            pause_time: None,
            total_paused: Duration::ZERO,
            events: VecDeque::new(),
        };
        player.set_volume(volume);
        player
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    // ==========================================
    // PLAYBACK CONTROL: play()
    // ==========================================
    // Replaces whatever is playing with the file at `path`.
    // The file is decoded first, so errors leave the current playback
    // untouched and emit no event.
    pub fn play(&mut self, path: &Path) -> Result<(), ResolveError> {
        if self.sink.is_none() {
            return Err(ResolveError::NoOutputDevice);
        }
        let decoder = Self::decode_file(path)?;

        if let Some(sink) = &self.sink {
            sink.stop();
        }
        self.reset_clock();
        self.duration = decoder.total_duration();
        if let Some(sink) = &self.sink {
            sink.append(decoder);
            sink.play();
        }

        self.state = PlayerState::Playing;
        self.start_time = Some(Instant::now());
        self.events.push_back(PlaybackEvent::Started);
        info!(file = %path.display(), "playing");
        Ok(())
    }

    fn decode_file(path: &Path) -> Result<Decoder<BufReader<File>>, ResolveError> {
        if !path.is_file() {
            return Err(ResolveError::MissingFile(path.to_path_buf()));
        }
        let file = File::open(path).map_err(|e| ResolveError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Decoder::new(BufReader::new(file)).map_err(|e| ResolveError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    // ==========================================
    // PLAYBACK CONTROL: pause() / resume() / toggle_pause()
    // ==========================================
    pub fn pause(&mut self) {
        if self.state != PlayerState::Playing {
            return;
        }
        if let Some(sink) = &self.sink {
            sink.pause();
        }
        self.pause_time = Some(Instant::now());
        self.state = PlayerState::Paused;
        self.events.push_back(PlaybackEvent::Paused);
    }

    pub fn resume(&mut self) {
        if self.state != PlayerState::Paused {
            return;
        }
        if let Some(sink) = &self.sink {
            sink.play();
        }
        if let Some(pause_time) = self.pause_time.take() {
            self.total_paused += pause_time.elapsed();
        }
        self.state = PlayerState::Playing;
        self.events.push_back(PlaybackEvent::Started);
    }

    pub fn toggle_pause(&mut self) {
        match self.state {
            PlayerState::Playing => self.pause(),
            PlayerState::Paused => self.resume(),
            PlayerState::Stopped => {}
        }
    }

    // ==========================================
    // PLAYBACK CONTROL: stop()
    // ==========================================
    // Always reports Stopped, even if nothing was loaded.
    pub fn stop(&mut self) {
        if let Some(sink) = &self.sink {
            sink.stop();
        }
        self.reset_clock();
        self.state = PlayerState::Stopped;
        self.events.push_back(PlaybackEvent::Stopped);
        debug!("playback stopped");
    }

    fn reset_clock(&mut self) {
        self.start_time = None;
        self.pause_time = None;
        self.total_paused = Duration::ZERO;
        self.duration = None;
    }

    // ==========================================
    // VOLUME
    // ==========================================
    // 0 (mute) to 100 (full); rodio wants 0.0..=1.0.
    pub fn volume(&self) -> u32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: u32) {
        self.volume = volume.min(100);
        if let Some(sink) = &self.sink {
            sink.set_volume(self.volume as f32 / 100.0);
        }
    }

    // ==========================================
    // PLAYBACK INFO
    // ==========================================
    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Elapsed playback time, excluding pauses.
    pub fn time_pos(&self) -> Duration {
        let Some(start) = self.start_time else {
            return Duration::ZERO;
        };
        let until = self.pause_time.unwrap_or_else(Instant::now);
        until
            .saturating_duration_since(start)
            .saturating_sub(self.total_paused)
    }

    // ==========================================
    // EVENTS: poll_event()
    // ==========================================
    // Returns the next pending event. Also notices when the sink has
    // drained after real playback and reports Ended exactly once for it.
    pub fn poll_event(&mut self) -> Option<PlaybackEvent> {
        if let Some(event) = self.events.pop_front() {
            return Some(event);
        }

        if self.is_finished() {
            self.reset_clock();
            self.state = PlayerState::Stopped;
            return Some(PlaybackEvent::Ended);
        }
        None
    }

    #[cfg(test)]
    pub fn push_event(&mut self, event: PlaybackEvent) {
        self.events.push_back(event);
    }

    fn is_finished(&self) -> bool {
        let drained = self.sink.as_ref().map_or(true, Sink::empty);
        self.state == PlayerState::Playing && drained && self.time_pos() >= END_GUARD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A player without a device; state is poked directly.
    fn silent_player() -> AudioPlayer {
        AudioPlayer {
            output: None,
            sink: None,
            state: PlayerState::Stopped,
            volume: 50,
            duration: None,
            start_time: None,
            pause_time: None,
            total_paused: Duration::ZERO,
            events: VecDeque::new(),
        }
    }

    fn playing_since(ago: Duration) -> AudioPlayer {
        let mut player = silent_player();
        player.state = PlayerState::Playing;
        player.start_time = Instant::now().checked_sub(ago);
        player
    }

    #[test]
    fn play_without_device_is_refused() {
        let mut player = silent_player();
        assert!(matches!(
            player.play(Path::new("/nowhere/song.mp3")),
            Err(ResolveError::NoOutputDevice)
        ));
        assert_eq!(player.state(), PlayerState::Stopped);
        assert_eq!(player.poll_event(), None);
    }

    #[test]
    fn drained_sink_reports_ended_once() {
        let mut player = playing_since(Duration::from_secs(5));

        assert_eq!(player.poll_event(), Some(PlaybackEvent::Ended));
        assert_eq!(player.poll_event(), None);
        assert_eq!(player.state(), PlayerState::Stopped);
        assert_eq!(player.time_pos(), Duration::ZERO);
    }

    #[test]
    fn empty_sink_right_after_play_is_not_an_end() {
        let mut player = playing_since(Duration::from_millis(100));
        assert_eq!(player.poll_event(), None);
        assert_eq!(player.state(), PlayerState::Playing);
    }

    #[test]
    fn paused_player_never_ends() {
        let mut player = playing_since(Duration::from_secs(5));
        player.pause();

        assert_eq!(player.poll_event(), Some(PlaybackEvent::Paused));
        assert_eq!(player.poll_event(), None);
    }

    #[test]
    fn queued_events_come_out_in_order() {
        let mut player = playing_since(Duration::from_secs(5));
        player.pause();
        player.resume();
        player.stop();

        assert_eq!(player.poll_event(), Some(PlaybackEvent::Paused));
        assert_eq!(player.poll_event(), Some(PlaybackEvent::Started));
        assert_eq!(player.poll_event(), Some(PlaybackEvent::Stopped));
        // stopped, so the empty sink is not an end
        assert_eq!(player.poll_event(), None);
    }

    #[test]
    fn elapsed_time_excludes_pauses() {
        let mut player = playing_since(Duration::from_secs(10));
        player.total_paused = Duration::from_secs(4);

        let elapsed = player.time_pos();

        assert!(elapsed >= Duration::from_secs(6));
        assert!(elapsed < Duration::from_secs(7));
    }

    #[test]
    fn volume_is_capped() {
        let mut player = silent_player();
        player.set_volume(150);
        assert_eq!(player.volume(), 100);
    }
}
