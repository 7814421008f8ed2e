// src/session.rs - Scripted diagnostic runs against the firmware
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::correction::{Corrector, Jog};
use crate::envelope::parse_replies;
use crate::error::{PathError, TransportError};
use crate::gcode;
use crate::pacing::{self, Pacer, Phase};
use crate::path::{Point, circle_path};
use crate::transport::FirmwareClient;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Tally of one run.
#[derive(Debug, Clone, Default)]
pub struct SessionReport {
    pub commands_sent: usize,
    pub replies: usize,
    pub transport_failures: usize,
    pub firmware_errors: usize,
    pub loop_time: Duration,
}

impl SessionReport {
    /// Account for the outcome of one send. Failures never stop the run.
    fn record(&mut self, command: &str, outcome: Result<Option<String>, TransportError>) -> Option<String> {
        self.commands_sent += 1;
        match outcome {
            Ok(Some(text)) => {
                self.replies += 1;
                for reply in parse_replies(&text) {
                    if let Some(error) = reply.error {
                        self.firmware_errors += 1;
                        tracing::warn!("Firmware rejected '{}': {}", command, error.message);
                    }
                }
                Some(text)
            }
            Ok(None) => None,
            Err(e) => {
                self.transport_failures += 1;
                tracing::warn!("Send error for '{}': {}", command, e);
                None
            }
        }
    }
}

/// Send one command, then let the pacer decide how long to hold off.
async fn send_paced(
    client: &mut FirmwareClient,
    pacer: &mut dyn Pacer,
    report: &mut SessionReport,
    phase: Phase,
    command: &str,
) {
    let outcome = client.send(command).await;
    report.record(command, outcome);
    if let Err(e) = pacer.pace(client, phase, command).await {
        report.transport_failures += 1;
        tracing::warn!("Pacing after '{}' failed: {}", command, e);
    }
}

/// Home, trace a circle one `G1` per point, and return to the center.
///
/// Only a failed connect or invalid geometry ends the run early.
pub async fn run_circle(config: &Config) -> Result<SessionReport, SessionError> {
    let circle = &config.circle;
    let center = Point::new(circle.center_x, circle.center_y);
    let path = circle_path(center, circle.radius, circle.points)?;

    let mut client = FirmwareClient::new(config.connection.clone());
    client.connect().await?;
    let mut pacer = pacing::from_config(&config.pacing);
    let mut report = SessionReport::default();

    tracing::info!("--- Start circle test ---");
    for command in &circle.setup {
        tracing::info!("Sending: {}", command);
        send_paced(&mut client, pacer.as_mut(), &mut report, Phase::Setup, command).await;
    }

    tracing::info!(
        "Executing circle motion: {} points, r={} around ({}, {})",
        circle.points,
        circle.radius,
        center.x,
        center.y
    );
    let started = Instant::now();
    for point in path {
        let command = gcode::linear_move(point);
        send_paced(&mut client, pacer.as_mut(), &mut report, Phase::Motion, &command).await;
    }

    let command = gcode::linear_move_at(center, circle.return_feedrate);
    send_paced(&mut client, pacer.as_mut(), &mut report, Phase::Return, &command).await;
    report.loop_time = started.elapsed();

    tracing::info!("Finished. Loop time: {:.4}s", report.loop_time.as_secs_f64());
    tracing::info!(
        "Sent {} commands, {} replies, {} transport failures, {} firmware errors",
        report.commands_sent,
        report.replies,
        report.transport_failures,
        report.firmware_errors
    );
    client.close().await;
    Ok(report)
}

/// Send each command in order and hand back the raw replies.
pub async fn run_send(config: &Config, commands: &[String]) -> Result<Vec<Option<String>>, SessionError> {
    let mut client = FirmwareClient::new(config.connection.clone());
    client.connect().await?;
    let mut report = SessionReport::default();
    let mut replies = Vec::with_capacity(commands.len());
    for command in commands {
        tracing::info!("Sending: {}", command);
        let outcome = client.send(command).await;
        replies.push(report.record(command, outcome));
    }
    client.close().await;
    Ok(replies)
}

/// Issue one relative correction for a target offset given in pixels.
///
/// Returns the move that was sent, or `None` inside the deadzone.
pub async fn run_nudge(config: &Config, error_x: f64, error_y: f64) -> Result<Option<Jog>, SessionError> {
    let mut corrector = Corrector::new(&config.correction);
    let Some(jog) = corrector.correct(error_x, error_y) else {
        tracing::info!("Offset ({}, {}) inside deadzone, nothing to do", error_x, error_y);
        return Ok(None);
    };

    let mut client = FirmwareClient::new(config.connection.clone());
    client.connect().await?;
    let mut report = SessionReport::default();
    let command = gcode::relative_move(jog.dx, jog.dy, config.correction.feedrate);
    tracing::info!("Offset ({}, {}) -> {}", error_x, error_y, command);
    for step in [gcode::RELATIVE, command.as_str(), gcode::ABSOLUTE] {
        let outcome = client.send(step).await;
        report.record(step, outcome);
    }
    client.close().await;
    Ok(Some(jog))
}
