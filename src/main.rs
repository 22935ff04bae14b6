use anyhow::Result;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use muse_client::{
    audio::{spawn_command_loop, PlaybackController, PlaybackQueue, PlayerCommand, QueueEntry, StreamSink},
    cache::{BlobRegistry, EntityKind, ImageCacheWorker, ImageRequestClient, MetadataCache},
    library::{Cover, Library},
    runtime::{OnlineFlag, SystemClock},
    sources::MuseApi,
    storage::{JsonFileStore, MemoryStore, Namespace, SharedStore},
    Config,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("muse_client=debug".parse()?)
                .add_directive("reqwest=info".parse()?),
        )
        .init();

    info!("🎵 Starting Muse client v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("{}", config.summary());

    let api = MuseApi::new(&config.api_url, config.auth_token.clone())?;

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&api).await;
    }

    let clock = Arc::new(SystemClock);
    let online = Arc::new(OnlineFlag::default());

    let meta_store = open_store(config.metadata_dir(), "meta-cache", &Namespace::METADATA).await;
    let image_store = open_store(config.image_dir(), "image-cache", &[Namespace::Images]).await;

    let metadata = Arc::new(MetadataCache::new(
        meta_store,
        clock.clone(),
        online.clone(),
        config.metadata_ttl,
    ));
    let worker = ImageCacheWorker::new(
        image_store,
        Arc::new(api.clone()),
        clock.clone(),
        config.image_ttl,
    );
    let images = Arc::new(ImageRequestClient::start(
        worker,
        BlobRegistry::new(),
        config.image_worker_queue,
    ));
    let library = Library::new(api.clone(), metadata.clone(), images.clone(), config.page_size);

    // Reproductor: los efectos se resuelven a URLs de stream
    let (audio_tx, mut audio_rx) = mpsc::unbounded_channel();
    let sink = Arc::new(StreamSink::new(api.clone(), config.stream_format.clone(), audio_tx));
    let controller = Arc::new(PlaybackController::new(
        PlaybackQueue::with_history(config.history_limit),
        sink,
    ));
    let (commands, command_rx) = mpsc::channel(32);
    let player = spawn_command_loop(controller.clone(), command_rx);

    // Precalentar cachés con la primera página
    let (start, end) = library.page_span(0);
    match library.total(EntityKind::Songs).await {
        Ok(total) => info!("📀 {} songs on the server", total),
        Err(e) => error!("❌ Could not load song total: {}", e),
    }
    match library.total(EntityKind::Artists).await {
        Ok(total) => info!("🎤 {} artists on the server", total),
        Err(e) => error!("❌ Could not load artist total: {}", e),
    }
    if let Err(e) = library.artists_page(start, end).await {
        error!("❌ Could not load artists: {}", e);
    }

    match library.songs_page(start, end).await {
        Ok(songs) => {
            let covers = library.preload_covers(&songs).await;
            let found = covers
                .iter()
                .filter(|c| matches!(c, Cover::Image(_)))
                .count();
            info!("🖼️ {} of {} covers available", found, covers.len());
            for cover in &covers {
                library.release_cover(cover);
            }

            let queue: Vec<QueueEntry> = songs
                .into_iter()
                .map(|song| QueueEntry::new(song.name, song.artist_name))
                .collect();
            if commands.send(PlayerCommand::Queue(queue)).await.is_err() {
                warn!("Player loop is gone");
            }
        }
        Err(e) => error!("❌ Could not load songs: {}", e),
    }

    drop(commands);
    player.await?;
    while let Ok(command) = audio_rx.try_recv() {
        info!("🔊 {:?}", command);
    }

    let metrics = metadata.metrics();
    info!(
        "📊 Metadata cache: {} hits, {} stale, {} misses ({:.0}% hit rate)",
        metrics.hits,
        metrics.stale_hits,
        metrics.misses,
        metrics.hit_rate() * 100.0
    );

    drop(library);
    match Arc::try_unwrap(images) {
        Ok(images) => images.shutdown().await,
        Err(_) => warn!("Image client still shared at shutdown"),
    }

    Ok(())
}

/// Opens the disk store, degrading to memory when the disk is unusable.
async fn open_store(dir: PathBuf, name: &str, namespaces: &[Namespace]) -> SharedStore {
    match JsonFileStore::open(&dir, name, namespaces).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!("⚠️ {} unavailable at {} ({}), caching in memory only", name, dir.display(), e);
            Arc::new(MemoryStore::new())
        }
    }
}

async fn health_check(api: &MuseApi) -> Result<()> {
    match api.total(EntityKind::Songs).await {
        Ok(_) => {
            println!("OK");
            Ok(())
        }
        Err(e) => anyhow::bail!("Muse API unreachable: {}", e),
    }
}
