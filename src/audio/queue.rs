use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Previous tracks kept behind the cursor.
pub const DEFAULT_HISTORY: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueEntry {
    pub track_name: String,
    pub artist_name: String,
}

impl QueueEntry {
    pub fn new(track_name: impl Into<String>, artist_name: impl Into<String>) -> Self {
        Self {
            track_name: track_name.into(),
            artist_name: artist_name.into(),
        }
    }
}

/// Side effect the audio component must carry out after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEffect {
    /// Fetch the stream for this entry and start it.
    FetchAndPlay(QueueEntry),
    /// Seek the current track back to zero, reusing the loaded audio.
    RestartCurrent,
    /// Nothing left to play.
    Stopped,
}

/// Ordered tracks with a cursor on the one playing.
///
/// Only `history_limit` tracks are retained before the cursor; older ones
/// are dropped whenever the cursor moves forward past the limit.
#[derive(Debug, Clone)]
pub struct PlaybackQueue {
    entries: Vec<QueueEntry>,
    cursor: usize,
    looping: bool,
    history_limit: usize,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::with_history(DEFAULT_HISTORY)
    }

    pub fn with_history(history_limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            looping: false,
            history_limit,
        }
    }

    /// Plays a track next, keeping what came before as history.
    ///
    /// Selecting the current track restarts it; selecting the track that is
    /// already next just moves onto it. Neither inserts a duplicate.
    pub fn play_song(&mut self, track_name: &str, artist_name: &str) -> PlaybackEffect {
        let entry = QueueEntry::new(track_name, artist_name);

        if self.entries.is_empty() {
            info!("➕ Queue started with {} - {}", artist_name, track_name);
            self.entries.push(entry.clone());
            self.cursor = 0;
            return PlaybackEffect::FetchAndPlay(entry);
        }

        if self.entries[self.cursor] == entry {
            debug!("🔂 {} already playing, restarting", track_name);
            return PlaybackEffect::RestartCurrent;
        }

        let next = self.cursor + 1;
        if self.entries.get(next) != Some(&entry) {
            self.entries.insert(next, entry.clone());
            info!("➕ Playing next: {} - {}", artist_name, track_name);
        }
        self.cursor = next;
        self.trim_history();
        PlaybackEffect::FetchAndPlay(entry)
    }

    /// Replaces everything and starts from the first entry.
    pub fn replace_queue(&mut self, songs: Vec<QueueEntry>) -> Option<PlaybackEffect> {
        self.entries = songs;
        self.cursor = 0;
        info!("📋 Queue replaced ({} tracks)", self.entries.len());
        self.entries.first().cloned().map(PlaybackEffect::FetchAndPlay)
    }

    /// Moves to the next entry, or empties the queue if there is none.
    pub fn advance(&mut self) -> PlaybackEffect {
        if self.cursor + 1 < self.entries.len() {
            self.cursor += 1;
            self.trim_history();
            let entry = self.entries[self.cursor].clone();
            info!("➡️ Next: {} - {}", entry.artist_name, entry.track_name);
            PlaybackEffect::FetchAndPlay(entry)
        } else {
            info!("📭 End of queue");
            self.clear();
            PlaybackEffect::Stopped
        }
    }

    /// Steps back into the retained history. `None` when there is none.
    pub fn retreat(&mut self) -> Option<PlaybackEffect> {
        if self.entries.is_empty() || self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        let entry = self.entries[self.cursor].clone();
        info!("⬅️ Previous: {} - {}", entry.artist_name, entry.track_name);
        Some(PlaybackEffect::FetchAndPlay(entry))
    }

    /// Natural end of the current track.
    pub fn track_ended(&mut self) -> PlaybackEffect {
        if self.looping && !self.entries.is_empty() {
            debug!("🔂 Looping current track");
            PlaybackEffect::RestartCurrent
        } else {
            self.advance()
        }
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.set_loop(!self.looping);
        self.looping
    }

    pub fn set_loop(&mut self, enabled: bool) {
        self.looping = enabled;
        if enabled {
            info!("🔂 Loop enabled");
        } else {
            info!("➡️ Loop disabled");
        }
    }

    pub fn is_loop(&self) -> bool {
        self.looping
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }

    pub fn current(&self) -> Option<&QueueEntry> {
        self.entries.get(self.cursor)
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn history(&self) -> &[QueueEntry] {
        &self.entries[..self.cursor.min(self.entries.len())]
    }

    pub fn upcoming(&self) -> &[QueueEntry] {
        let start = (self.cursor + 1).min(self.entries.len());
        &self.entries[start..]
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            current: self.current().cloned(),
            entries: self.entries.clone(),
            cursor: self.cursor,
            looping: self.looping,
        }
    }

    fn trim_history(&mut self) {
        if self.cursor > self.history_limit {
            let drop = self.cursor - self.history_limit;
            self.entries.drain(..drop);
            self.cursor = self.history_limit;
            debug!("🧹 Trimmed {} old tracks from history", drop);
        }
    }
}

impl Default for PlaybackQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the queue for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub current: Option<QueueEntry>,
    pub entries: Vec<QueueEntry>,
    pub cursor: usize,
    pub looping: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(name: &str, artist: &str) -> QueueEntry {
        QueueEntry::new(name, artist)
    }

    fn numbered(n: usize) -> Vec<QueueEntry> {
        (0..n).map(|i| entry(&format!("T{}", i), "X")).collect()
    }

    #[test]
    fn first_song_starts_the_queue() {
        let mut queue = PlaybackQueue::new();
        assert_eq!(
            queue.play_song("A", "X"),
            PlaybackEffect::FetchAndPlay(entry("A", "X"))
        );
        assert_eq!(queue.entries(), &[entry("A", "X")]);
        assert_eq!(queue.cursor(), 0);
    }

    #[test]
    fn replaying_current_song_does_not_duplicate_it() {
        let mut queue = PlaybackQueue::new();
        queue.play_song("A", "X");
        assert_eq!(queue.play_song("A", "X"), PlaybackEffect::RestartCurrent);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.cursor(), 0);
    }

    #[test]
    fn play_song_inserts_after_cursor_and_moves_onto_it() {
        let mut queue = PlaybackQueue::new();
        queue.replace_queue(vec![entry("A", "X"), entry("B", "Y")]);
        queue.play_song("C", "Z");

        assert_eq!(queue.entries(), &[entry("A", "X"), entry("C", "Z"), entry("B", "Y")]);
        assert_eq!(queue.cursor(), 1);
        assert_eq!(queue.current(), Some(&entry("C", "Z")));
        assert_eq!(queue.upcoming(), &[entry("B", "Y")]);
    }

    #[test]
    fn play_song_for_next_track_only_moves_cursor() {
        let mut queue = PlaybackQueue::new();
        queue.replace_queue(vec![entry("A", "X"), entry("B", "Y")]);

        assert_eq!(
            queue.play_song("B", "Y"),
            PlaybackEffect::FetchAndPlay(entry("B", "Y"))
        );
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.cursor(), 1);
    }

    #[test]
    fn history_is_bounded_while_advancing() {
        let mut queue = PlaybackQueue::new();
        let songs = numbered(10);
        queue.replace_queue(songs.clone());

        for _ in 0..5 {
            queue.advance();
            assert!(queue.cursor() <= DEFAULT_HISTORY);
        }
        assert_eq!(queue.len(), 8);
        assert_eq!(queue.cursor(), 3);
        assert_eq!(queue.current(), Some(&songs[5]));
        assert_eq!(queue.history(), &songs[2..5]);

        for _ in 0..4 {
            queue.advance();
        }
        assert_eq!(queue.current(), Some(&songs[9]));
        assert_eq!(queue.cursor(), 3);

        assert_eq!(queue.advance(), PlaybackEffect::Stopped);
        assert!(queue.len() <= 8);
        assert!(queue.is_empty());
    }

    #[test]
    fn play_song_trims_history_too() {
        let mut queue = PlaybackQueue::new();
        queue.replace_queue(numbered(1));
        for i in 0..6 {
            queue.play_song(&format!("N{}", i), "Y");
        }
        assert_eq!(queue.cursor(), 3);
        assert_eq!(queue.len(), 4);
        assert_eq!(queue.current(), Some(&entry("N5", "Y")));
    }

    #[test]
    fn forward_and_back_scenario() {
        let mut queue = PlaybackQueue::new();
        let effect = queue.replace_queue(vec![entry("A", "X"), entry("B", "Y"), entry("C", "Z")]);
        assert_eq!(effect, Some(PlaybackEffect::FetchAndPlay(entry("A", "X"))));

        assert_eq!(queue.advance(), PlaybackEffect::FetchAndPlay(entry("B", "Y")));
        assert_eq!(queue.cursor(), 1);

        assert_eq!(queue.retreat(), Some(PlaybackEffect::FetchAndPlay(entry("A", "X"))));
        assert_eq!(queue.cursor(), 0);

        assert_eq!(queue.retreat(), None);
        assert_eq!(queue.cursor(), 0);
    }

    #[test]
    fn retreat_cannot_go_past_trimmed_history() {
        let mut queue = PlaybackQueue::new();
        queue.replace_queue(numbered(8));
        for _ in 0..6 {
            queue.advance();
        }
        let mut steps = 0;
        while queue.retreat().is_some() {
            steps += 1;
        }
        assert_eq!(steps, DEFAULT_HISTORY);
        assert_eq!(queue.cursor(), 0);
    }

    #[test]
    fn loop_restarts_instead_of_advancing() {
        let mut queue = PlaybackQueue::new();
        queue.replace_queue(vec![entry("A", "X"), entry("B", "Y")]);
        assert!(queue.toggle_loop());

        assert_eq!(queue.track_ended(), PlaybackEffect::RestartCurrent);
        assert_eq!(queue.cursor(), 0);

        assert!(!queue.toggle_loop());
        assert_eq!(queue.track_ended(), PlaybackEffect::FetchAndPlay(entry("B", "Y")));
    }

    #[test]
    fn empty_queue_replacement_has_no_effect() {
        let mut queue = PlaybackQueue::new();
        assert_eq!(queue.replace_queue(Vec::new()), None);
        assert_eq!(queue.retreat(), None);
        assert_eq!(queue.advance(), PlaybackEffect::Stopped);
    }
}
