
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::SiteQaError;
use crate::config::CaptureConfig;
use crate::embeddings::gemini::GeminiClient;
use crate::qa::QaEngine;

/// Exact reply the vision model is told to give when no game is on screen.
const NO_GAME_SENTINEL: &str = "no game visible";

const VISION_INSTRUCTION: &str = "This is a screenshot of a player's screen. \
    If it does not show a game in progress, reply exactly: \"no game visible\". \
    Otherwise describe the player's current situation in two or three short \
    sentences: what is on screen, what resources or units are visible, and \
    what decision the player appears to face.";

/// Periodic screenshot loop: capture the screen with the configured external
/// command, describe it with the vision model, and cross-reference the
/// situation against the indexed site when a knowledge base is available.
///
/// Runs until Ctrl-C. Capture and transient provider failures skip the tick;
/// only credential failures stop the loop.
#[inline]
pub async fn run(
    capture: &CaptureConfig,
    client: &GeminiClient,
    engine: Option<&QaEngine>,
) -> Result<()> {
    if capture.command.is_empty() {
        return Err(SiteQaError::Config(
            "no screen capture command configured; set [capture] command in siteqa.toml"
                .to_string(),
        )
        .into());
    }

    let interval = Duration::from_secs(capture.interval_secs.max(1));
    info!(
        "Starting advice loop: capturing every {}s with {:?}",
        interval.as_secs(),
        capture.command[0]
    );
    println!("Watching the screen every {}s. Press Ctrl+C to stop.", interval.as_secs());

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match advise_once(capture, client, engine).await {
                    Ok(Some(advice)) => {
                        println!();
                        println!("{}", advice.trim());
                    }
                    Ok(None) => debug!("No game visible, skipping tick"),
                    Err(e) if e.is_fatal_for_session() => {
                        return Err(e).context("Provider rejected the session");
                    }
                    Err(e) => warn!("Advice tick failed: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nStopping advice loop.");
                return Ok(());
            }
        }
    }
}

/// One tick: capture, describe, and (if possible) ground the advice in the
/// knowledge base. Returns `None` when no game is on screen.
async fn advise_once(
    capture: &CaptureConfig,
    client: &GeminiClient,
    engine: Option<&QaEngine>,
) -> crate::Result<Option<String>> {
    let png = capture_screen(&capture.command).await?;
    let description = client.describe_image(VISION_INSTRUCTION, &png)?;

    if is_no_game(&description) {
        return Ok(None);
    }

    match engine {
        Some(engine) => {
            let question = format!(
                "The player is in this situation: {}\nWhat should the player do next?",
                description.trim()
            );
            let result = engine.answer_question(&question).await?;
            let mut advice = result.answer;
            if !result.sources.is_empty() {
                advice.push_str(&format!("\n(sources: {})", result.sources.join(", ")));
            }
            Ok(Some(advice))
        }
        None => Ok(Some(description)),
    }
}

/// Run the external capture command and read back the PNG it wrote.
async fn capture_screen(command: &[String]) -> crate::Result<Vec<u8>> {
    let output_path = std::env::temp_dir().join(format!(
        "siteqa-capture-{}.png",
        uuid::Uuid::new_v4()
    ));
    let argv = render_command(command, &output_path);

    let result = run_capture_command(&argv, &output_path).await;
    let _ = std::fs::remove_file(&output_path);
    result
}

async fn run_capture_command(argv: &[String], output_path: &Path) -> crate::Result<Vec<u8>> {
    let status = tokio::process::Command::new(&argv[0])
        .args(&argv[1..])
        .status()
        .await
        .map_err(|e| {
            SiteQaError::Config(format!("failed to run capture command {:?}: {e}", argv[0]))
        })?;

    if !status.success() {
        return Err(SiteQaError::Config(format!(
            "capture command {:?} exited with {status}",
            argv[0]
        )));
    }

    let png = std::fs::read(output_path).map_err(|e| {
        SiteQaError::Config(format!(
            "capture command produced no readable file at {}: {e}",
            output_path.display()
        ))
    })?;
    debug!("Captured {} bytes", png.len());
    Ok(png)
}

/// Substitute `{output}` in each argument with the capture file path.
fn render_command(command: &[String], output_path: &Path) -> Vec<String> {
    let output = output_path.to_string_lossy();
    command
        .iter()
        .map(|arg| arg.replace("{output}", &output))
        .collect()
}

fn is_no_game(description: &str) -> bool {
    description.trim().to_lowercase().contains(NO_GAME_SENTINEL)
}
