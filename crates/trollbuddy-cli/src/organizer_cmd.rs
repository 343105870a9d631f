//! Organizer subcommands: start, resume, end and list images.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::{self, Write};
use std::time::Duration;

use clap::Args;
use tracing::info;

use trollbuddy_session::{ActiveSession, CapturedImage, SessionForm, SessionManager, StartOutcome};

use crate::app::AppContext;

/// Participant details for a new session.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Participant name
    #[arg(long)]
    pub name: String,

    /// Participant age
    #[arg(long)]
    pub age: String,

    /// `YouTube` link shown to the participant (defaults to the configured video)
    #[arg(long)]
    pub youtube: Option<String>,

    /// Stay attached and list new images until Ctrl+C, then end the session
    #[arg(long)]
    pub hold: bool,
}

fn manager(ctx: &AppContext, user: Option<String>) -> SessionManager {
    SessionManager::new(
        ctx.store.clone(),
        ctx.notifier.clone(),
        ctx.config.session.clone(),
        user,
    )
}

fn print_session(out: &mut impl Write, active: &ActiveSession) -> io::Result<()> {
    let record = &active.session.record;
    writeln!(out, "Session:     {}", record.session_id)?;
    writeln!(out, "Participant: {} ({})", record.name, record.age)?;
    if let Some(video) = &record.youtube_video_id {
        writeln!(out, "Video:       {video}")?;
    }
    writeln!(out, "Share link:  {}", active.share_link)
}

fn print_images(out: &mut impl Write, images: &[CapturedImage]) -> io::Result<()> {
    if images.is_empty() {
        return writeln!(out, "No images captured yet.");
    }
    writeln!(out, "{:<15}  {:>8}", "CAPTURED_AT", "BYTES")?;
    for image in images {
        writeln!(
            out,
            "{:<15}  {:>8}",
            image.captured_at,
            image.base64_payload().len() / 4 * 3
        )?;
    }
    Ok(())
}

/// Create a session, or resume the organizer's existing one.
pub async fn start(ctx: &AppContext, user: Option<String>, args: StartArgs) -> anyhow::Result<()> {
    let mgr = manager(ctx, user);
    let form = SessionForm::new(&args.name, &args.age, args.youtube.as_deref());
    let mut out = io::stdout();

    let active = match mgr.start_or_resume(&form).await {
        StartOutcome::Created(active) => active,
        StartOutcome::Resumed(active) => {
            writeln!(out, "Resuming your existing session.")?;
            active
        }
        StartOutcome::Invalid(errors) => anyhow::bail!("Invalid session details: {errors}"),
        StartOutcome::Failed => anyhow::bail!("Could not create the session"),
    };
    print_session(&mut out, &active)?;

    if args.hold {
        hold(&mgr, Duration::from_millis(ctx.config.capture.interval_ms)).await?;
    }
    Ok(())
}

/// Poll the gallery until Ctrl+C, then end the session.
async fn hold(mgr: &SessionManager, poll: Duration) -> anyhow::Result<()> {
    let mut out = io::stdout();
    writeln!(out, "Waiting for images. Press Ctrl+C to end the session.")?;

    let mut seen: Option<i64> = None;
    let mut timer = tokio::time::interval(poll);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = timer.tick() => {
                let images = mgr.captured_images().await;
                let latest = images.first().map(|i| i.captured_at);
                if latest != seen {
                    seen = latest;
                    writeln!(
                        out,
                        "{} image(s), latest at {}",
                        images.len(),
                        latest.unwrap_or_default()
                    )?;
                }
            }
        }
    }

    info!("Ending session on shutdown");
    if !mgr.end_session().await {
        anyhow::bail!("Could not delete the session");
    }
    Ok(())
}

/// Show the organizer's existing session, if any.
pub async fn resume(ctx: &AppContext, user: Option<String>) -> anyhow::Result<()> {
    let mgr = manager(ctx, user);
    let mut out = io::stdout();
    match mgr.resume_existing().await {
        Some(active) => print_session(&mut out, &active)?,
        None => writeln!(out, "No session found for {}.", mgr.user_id())?,
    }
    Ok(())
}

/// End the organizer's session and delete its images.
pub async fn end(ctx: &AppContext, user: Option<String>) -> anyhow::Result<()> {
    let mgr = manager(ctx, user);
    let mut out = io::stdout();
    let Some(active) = mgr.resume_existing().await else {
        writeln!(out, "No session found for {}.", mgr.user_id())?;
        return Ok(());
    };
    if !mgr.end_session().await {
        anyhow::bail!("Could not delete session {}", active.session.session_id());
    }
    writeln!(out, "Session {} ended.", active.session.session_id())?;
    Ok(())
}

/// List the latest images of the organizer's session.
pub async fn images(ctx: &AppContext, user: Option<String>) -> anyhow::Result<()> {
    let mgr = manager(ctx, user);
    let mut out = io::stdout();
    if mgr.resume_existing().await.is_none() {
        writeln!(out, "No session found for {}.", mgr.user_id())?;
        return Ok(());
    }
    print_images(&mut out, &mgr.captured_images().await)?;
    Ok(())
}
