use std::sync::Arc;
use std::thread;

use anyhow::Result;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use duskcatalog::{DirectoryCatalog, StaticCatalog, VideoCatalog};
use duskconfig::get_config;
use duskcore::{CoordinatorEvent, SessionCoordinator, SharingPolicy, SurfaceSpec};
use duskengine::{EngineProfile, VideoLocator, VirtualEngine};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = get_config();

    // ========== Engine + catalog ==========

    let engine = VirtualEngine::with_profile(EngineProfile {
        item_duration: Some(config.item_duration()),
    });

    let catalog: Arc<dyn VideoCatalog> = if config.videos.sources.is_empty() {
        let entries: Vec<VideoLocator> = config
            .videos
            .entries
            .iter()
            .map(|entry| match &entry.title {
                Some(title) => VideoLocator::with_title(entry.uri.as_str(), title.as_str()),
                None => VideoLocator::new(entry.uri.as_str()),
            })
            .collect();
        info!(count = entries.len(), "serving the configured video entries");
        Arc::new(StaticCatalog::new(entries))
    } else {
        info!(
            sources = config.videos.sources.len(),
            "scanning video folders"
        );
        DirectoryCatalog::scan(
            config.videos.sources.clone(),
            config.videos.extensions.clone(),
        )?
    };

    // ========== Coordination ==========

    let policy = if config.sharing_enabled() {
        SharingPolicy::shared()
    } else {
        SharingPolicy::independent()
    };
    info!(sharing = policy.sharing_enabled, "sharing policy");

    let mut coordinator = SessionCoordinator::new(engine, catalog, policy);
    if !config.quotes.lines.is_empty() {
        coordinator =
            coordinator.with_quote_rotation(config.quotes.lines.clone(), config.quote_interval());
    }

    let events = coordinator.subscribe();
    thread::spawn(move || {
        while let Ok(event) = events.recv() {
            match event {
                CoordinatorEvent::ItemAdvanced { session, locator } => {
                    info!(%session, video = locator.label(), "now playing")
                }
                CoordinatorEvent::AdvanceMissed { session } => {
                    warn!(%session, "no video available for this cycle")
                }
                other => debug!(?other, "coordination event"),
            }
        }
    });

    // ========== Simulated host: one preview pane + N displays ==========

    if config.simulation.attach_preview {
        if let Err(err) = coordinator.attach_surface(SurfaceSpec::preview("preview")) {
            warn!(error = %err, "preview pane left dark");
        }
    }
    for index in 0..config.simulation.displays {
        let name = format!("display-{index}");
        if let Err(err) = coordinator.attach_surface(SurfaceSpec::display(name.clone())) {
            warn!(surface = name.as_str(), error = %err, "display left dark");
        }
    }

    info!(
        surfaces = coordinator.surfaces().len(),
        sessions = coordinator.session_count(),
        "Duskfall running, Ctrl-C to quit"
    );

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    coordinator.shutdown();
    Ok(())
}
