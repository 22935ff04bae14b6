//! # Audio Module
//!
//! Playback queue and the command plumbing around it.
//!
//! The queue never touches audio. Each transition yields a
//! [`PlaybackEffect`] that the audio component carries out: fetch and play
//! a track, restart the current one, or stop.
//!
//! ### [`queue`] - Queue state machine
//! - Ordered entries with a cursor on the playing track
//! - "Play next" insertion without duplicates
//! - History bounded to a few tracks behind the cursor
//! - Single-track loop
//!
//! ### [`player`] - Command handling
//! - Applies [`PlayerCommand`]s and forwards effects to a [`PlaybackSink`]
//! - [`StreamSink`] resolves stream URLs for the audio element
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use muse_client::audio::{PlaybackEffect, PlaybackQueue, QueueEntry};
//!
//! let mut queue = PlaybackQueue::new();
//! queue.replace_queue(vec![QueueEntry::new("A", "X"), QueueEntry::new("B", "Y")]);
//! assert_eq!(queue.advance(), PlaybackEffect::FetchAndPlay(QueueEntry::new("B", "Y")));
//! ```

pub mod player;
pub mod queue;

pub use player::{spawn_command_loop, AudioCommand, PlaybackController, PlaybackSink, PlayerCommand, StreamSink};
pub use queue::{PlaybackEffect, PlaybackQueue, QueueEntry, QueueSnapshot, DEFAULT_HISTORY};
