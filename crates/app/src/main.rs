use anyhow::Context;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use storyvox_app::config::Settings;
use storyvox_app::runtime::{self, AppHandle};
use storyvox_session::{Session, SessionCommand, SessionMode, SessionNotice, StoryContext};

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all("logs")?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "storyvox.log");
    let (non_blocking_file, _guard) = tracing_appender::non_blocking(file_appender);
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout.and(non_blocking_file))
        .with_env_filter(log_level)
        .init();
    std::mem::forget(_guard);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging().map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;
    info!("Starting StoryVox");

    let settings = Settings::load().context("Failed to load settings")?;

    let session_id =
        std::env::var("STORYVOX_SESSION_ID").unwrap_or_else(|_| "local-session".to_string());
    let story_id = std::env::var("STORYVOX_STORY_ID").unwrap_or_else(|_| "demo-story".to_string());
    let token = std::env::var("STORYVOX_TOKEN").unwrap_or_default();

    let context = StoryContext {
        story_id: story_id.clone(),
        story_title: std::env::var("STORYVOX_STORY_TITLE")
            .unwrap_or_else(|_| "Untitled Story".to_string()),
        ..Default::default()
    };

    let mut handle: AppHandle = runtime::start(
        settings,
        Session::new(session_id, story_id),
        token,
        context,
    )
    .await?;

    handle
        .commands
        .send(SessionCommand::SwitchMode(SessionMode::Interactive))
        .await
        .context("State machine is not running")?;

    loop {
        tokio::select! {
            _ = AppHandle::wait_for_shutdown_signal() => break,
            error = handle.session_errors.recv() => match error {
                Some(error) => warn!("Session error: {error}"),
                None => break,
            },
            notice = handle.session_notices.recv() => match notice {
                Some(SessionNotice::PlaybackCompleted { story_id }) => {
                    // A fuller UI would prompt the child here
                    info!(%story_id, "Narration finished; interactive session available");
                }
                None => break,
            },
            chunk = handle.ai_audio.recv() => match chunk {
                // Playback of synthesized audio is an external collaborator;
                // here we only account for the bytes.
                Some(chunk) => tracing::debug!(bytes = chunk.len(), "AI audio chunk received"),
                None => break,
            },
            changed = handle.link_status.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = *handle.link_status.borrow_and_update();
                info!(?status, "Transport status changed");
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}
