//! Snapwall Display — headless display client.
//!
//! Joins an activity as a display, runs the slideshow scheduler and the
//! danmaku overlay, and logs what a screen would show. A graphical surface
//! would read `current_photo()` and `overlay_snapshot()` on every frame.

mod config;

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{info, warn};
use snapwall_core::{EventStatus, SessionStore};
use snapwall_live::{DisplaySession, EventApi, HttpPrefetcher};
use snapwall_text::CosmicMeasure;
use tokio::io::{AsyncBufReadExt, BufReader};

use config::Cli;

fn log_status(session: &DisplaySession) {
    let (total, priority, regular) = session.queue_lengths();
    let photo = session
        .current_photo()
        .map(|p| p.id)
        .unwrap_or_else(|| "-".to_string());
    let frame = session.last_frame_stats();
    info!(
        "{:?} | photo {photo} {:?} via {:?} | queues {total}/{priority}/{regular} | danmaku {} active, {} waiting",
        session.connection_state(),
        session.position(),
        session.authority(),
        frame.active,
        frame.pending,
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();
    let config = cli.display_config();

    info!("Starting Snapwall display for {}", config.activity_id);

    let mut sessions = SessionStore::in_memory();
    let session_id = sessions.get_or_create(&config.activity_id);
    sessions.remember_activity(&config.activity_id);

    let client = reqwest::Client::new();
    let api = EventApi::with_client(client.clone(), &config.api_base);
    let seed = match api.get_event(&config.activity_id).await {
        Ok(snapshot) => {
            if snapshot.event.status == EventStatus::Ended {
                warn!("Activity {} has already ended", snapshot.event.id);
                return Ok(());
            }
            snapshot.photos
        }
        Err(e) => {
            warn!("Could not load event snapshot, waiting for the live feed: {e}");
            Vec::new()
        }
    };

    let measure = CosmicMeasure::new();
    info!("Loaded {} font faces", measure.face_count());
    let prefetch = Arc::new(HttpPrefetcher::new(client));

    let session = DisplaySession::start(config, session_id, Box::new(measure), prefetch);
    session.seed_photos(seed);

    let mut stdin = cli
        .echo_stdin
        .then(|| BufReader::new(tokio::io::stdin()).lines());
    let mut status = tokio::time::interval(Duration::from_secs(cli.status_every.max(1)));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = status.tick() => {
                if cli.status_every > 0 {
                    log_status(&session);
                }
                if let Some(reason) = session.ended_reason() {
                    info!("Activity ended ({reason}); exiting");
                    break;
                }
            }
            line = async {
                match stdin.as_mut() {
                    Some(lines) => lines.next_line().await,
                    None => std::future::pending().await,
                }
            } => match line {
                Ok(Some(text)) => match session.send_danmaku(&text) {
                    Ok(true) => {}
                    Ok(false) => warn!("Not connected; danmaku dropped"),
                    Err(e) => warn!("{e}"),
                },
                Ok(None) => stdin = None,
                Err(e) => {
                    warn!("stdin: {e}");
                    stdin = None;
                }
            },
        }
    }

    session.shutdown();
    Ok(())
}
