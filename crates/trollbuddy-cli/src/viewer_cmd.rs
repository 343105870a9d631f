//! Viewer subcommands: resolve a share link and run the capture loop.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use tracing::info;

use trollbuddy_core::ShareLink;
use trollbuddy_core::youtube;
use trollbuddy_session::capture::{AcquisitionSource, DeviceSource, SyntheticSource};
use trollbuddy_session::moderation::{ImageModerator, VisionModerator};
use trollbuddy_session::{
    CaptureScheduler, CaptureState, Resolution, SessionMetadata, SessionViewer,
};

use crate::app::AppContext;

/// Attempts made while the organizer's write may still be in flight.
const RESOLVE_ATTEMPTS: u32 = 5;
const RESOLVE_DELAY: Duration = Duration::from_secs(1);

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Share link handed out by the organizer
    pub link: String,
}

#[derive(Args, Debug)]
pub struct CaptureArgs {
    /// Share link handed out by the organizer
    pub link: String,

    /// Use a synthetic camera instead of the configured device
    #[arg(long)]
    pub synthetic: bool,
}

fn parse_link(raw: &str) -> anyhow::Result<ShareLink> {
    ShareLink::parse(raw).with_context(|| format!("Not a share link: {raw}"))
}

async fn resolve(ctx: &AppContext, link: &ShareLink) -> anyhow::Result<SessionMetadata> {
    let viewer = SessionViewer::new(ctx.store.clone(), ctx.notifier.clone(), &ctx.config.session);
    match viewer
        .resolve_with_retry(&link.user_id, &link.session_id, RESOLVE_ATTEMPTS, RESOLVE_DELAY)
        .await
    {
        Resolution::Found(meta) => Ok(meta),
        Resolution::NotFound => anyhow::bail!("Session {} not found", link.session_id),
        Resolution::Unavailable => anyhow::bail!("Store unavailable"),
    }
}

fn print_metadata(out: &mut impl Write, meta: &SessionMetadata) -> io::Result<()> {
    writeln!(out, "Hi {}!", meta.participant_name)?;
    writeln!(out, "Session: {}", meta.session_id)?;
    let kind = if youtube::is_video_id(&meta.youtube_video_id) {
        "video"
    } else {
        "video (unrecognised id)"
    };
    writeln!(out, "Watch the {kind}: {}", meta.embed_url())
}

/// Resolve a share link and show what the participant will see.
pub async fn view(ctx: &AppContext, args: LinkArgs) -> anyhow::Result<()> {
    let link = parse_link(&args.link)?;
    let meta = resolve(ctx, &link).await?;
    print_metadata(&mut io::stdout(), &meta)?;
    Ok(())
}

/// Resolve a share link, then capture images until the window is full or
/// Ctrl+C.
pub async fn capture(ctx: &AppContext, args: CaptureArgs) -> anyhow::Result<()> {
    let link = parse_link(&args.link)?;
    let meta = resolve(ctx, &link).await?;
    let mut out = io::stdout();
    print_metadata(&mut out, &meta)?;

    let source: Arc<dyn AcquisitionSource> = if args.synthetic {
        Arc::new(SyntheticSource::new())
    } else {
        Arc::new(DeviceSource::from_config(&ctx.config.capture))
    };

    let mut scheduler = CaptureScheduler::new(
        meta.session_id.clone(),
        ctx.store.clone(),
        source,
        ctx.notifier.clone(),
        Duration::from_millis(ctx.config.capture.interval_ms),
    );
    let moderator = VisionModerator::new(&ctx.config.moderation);
    if moderator.is_enabled() {
        let moderator: Arc<dyn ImageModerator> = Arc::new(moderator);
        scheduler = scheduler.with_moderator(moderator);
    }

    let mut handle = scheduler.start().await;
    if handle.state() == CaptureState::Degraded {
        writeln!(out, "Camera unavailable; nothing will be captured.")?;
        return Ok(());
    }

    let finished = tokio::select! {
        _ = tokio::signal::ctrl_c() => None,
        state = handle.wait() => Some(state),
    };
    let state = if let Some(state) = finished {
        state
    } else {
        info!("Interrupted, stopping capture");
        handle.stop().await
    };

    writeln!(
        out,
        "Capture {state:?}: {} image(s) kept.",
        handle.images().len()
    )?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rejects_foreign_links() {
        assert!(parse_link("https://example.com/other/u/s").is_err());
        let link = parse_link("http://localhost:4200/troll-buddy/u-1/s-1").unwrap();
        assert_eq!(link.session_id, "s-1");
    }

    #[test]
    fn metadata_output() {
        let meta = SessionMetadata {
            store_key: "k".into(),
            session_id: "s-1".into(),
            user_id: "u-1".into(),
            participant_name: "Ann".into(),
            youtube_video_id: "p3s19nI1NAI".into(),
        };
        let mut out = Vec::new();
        print_metadata(&mut out, &meta).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Hi Ann!"));
        assert!(text.contains("https://www.youtube.com/embed/p3s19nI1NAI"));
    }
}
