use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info};

use crate::{
    audio::queue::{PlaybackEffect, PlaybackQueue, QueueEntry, QueueSnapshot},
    sources::MuseApi,
};

/// Inbound playback commands, as issued by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCommand {
    PlaySong { name: String, artist: String },
    Queue(Vec<QueueEntry>),
    Next,
    Previous,
    TrackEnded,
    ToggleLoop,
}

/// Receives the effects of queue transitions. Implemented by the audio
/// component, which owns fetching and playing the stream.
#[async_trait]
pub trait PlaybackSink: Send + Sync {
    async fn apply(&self, effect: PlaybackEffect);
}

/// Applies commands to the queue and forwards the resulting effects.
pub struct PlaybackController {
    queue: Mutex<PlaybackQueue>,
    sink: Arc<dyn PlaybackSink>,
}

impl PlaybackController {
    pub fn new(queue: PlaybackQueue, sink: Arc<dyn PlaybackSink>) -> Self {
        Self {
            queue: Mutex::new(queue),
            sink,
        }
    }

    pub async fn handle(&self, command: PlayerCommand) -> Option<PlaybackEffect> {
        debug!("🎛️ {:?}", command);
        let effect = {
            let mut queue = self.queue.lock();
            match command {
                PlayerCommand::PlaySong { name, artist } => Some(queue.play_song(&name, &artist)),
                PlayerCommand::Queue(songs) => queue.replace_queue(songs),
                PlayerCommand::Next => Some(queue.advance()),
                PlayerCommand::Previous => queue.retreat(),
                PlayerCommand::TrackEnded => Some(queue.track_ended()),
                PlayerCommand::ToggleLoop => {
                    queue.toggle_loop();
                    None
                }
            }
        };

        if let Some(effect) = &effect {
            self.sink.apply(effect.clone()).await;
        }
        effect
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.queue.lock().snapshot()
    }
}

/// Drives `controller` from a command channel until every sender is gone.
pub fn spawn_command_loop(
    controller: Arc<PlaybackController>,
    mut commands: mpsc::Receiver<PlayerCommand>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("🎵 Player command loop started");
        while let Some(command) = commands.recv().await {
            controller.handle(command).await;
        }
        info!("🎵 Player command loop stopped");
    })
}

/// Instruction for the audio element, with the stream already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioCommand {
    Load { entry: QueueEntry, stream_url: String },
    Restart,
    Stop,
}

/// Sink that turns effects into [`AudioCommand`]s on a channel.
pub struct StreamSink {
    api: MuseApi,
    format: String,
    audio: mpsc::UnboundedSender<AudioCommand>,
}

impl StreamSink {
    pub fn new(api: MuseApi, format: impl Into<String>, audio: mpsc::UnboundedSender<AudioCommand>) -> Self {
        Self {
            api,
            format: format.into(),
            audio,
        }
    }

    fn to_command(&self, effect: PlaybackEffect) -> Option<AudioCommand> {
        match effect {
            PlaybackEffect::FetchAndPlay(entry) => {
                match self
                    .api
                    .stream_url(&entry.track_name, &entry.artist_name, &self.format)
                {
                    Ok(stream_url) => Some(AudioCommand::Load { entry, stream_url }),
                    Err(e) => {
                        error!("❌ Cannot build stream URL for {}: {}", entry.track_name, e);
                        None
                    }
                }
            }
            PlaybackEffect::RestartCurrent => Some(AudioCommand::Restart),
            PlaybackEffect::Stopped => Some(AudioCommand::Stop),
        }
    }
}

#[async_trait]
impl PlaybackSink for StreamSink {
    async fn apply(&self, effect: PlaybackEffect) {
        if let Some(command) = self.to_command(effect) {
            if self.audio.send(command).is_err() {
                debug!("Audio component gone, dropping command");
            }
        }
    }
}
