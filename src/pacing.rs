//! Pacing between commands.
//!
//! The firmware queues motion ahead of execution, so a reply only means a
//! command was accepted. Streaming with no pause fills the queue and the
//! table ends up moving "in the future"; waiting for every move to finish
//! gives stop-and-go motion. Each [`Pacer`] picks a point between the two.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, sleep};

use crate::config::{PacingConfig, PacingStrategy};
use crate::envelope::{Envelope, parse_replies};
use crate::error::TransportError;
use crate::gcode;
use crate::transport::FirmwareClient;

/// Where in a run a command was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    Motion,
    Return,
}

#[async_trait]
pub trait Pacer: Send {
    /// Called after `command` has been sent and its reply (if any) read.
    async fn pace(
        &mut self,
        client: &mut FirmwareClient,
        phase: Phase,
        command: &str,
    ) -> Result<(), TransportError>;
}

pub fn from_config(config: &PacingConfig) -> Box<dyn Pacer> {
    match config.strategy {
        PacingStrategy::FixedDelay => Box::new(FixedDelay {
            home: Duration::from_millis(config.home_delay_ms),
            setup: Duration::from_millis(config.setup_delay_ms),
            motion: Duration::from_millis(config.move_delay_ms),
        }),
        PacingStrategy::WaitForAck => Box::new(WaitForAck {
            ack_timeout: Duration::from_millis(config.ack_timeout_ms),
        }),
        PacingStrategy::BufferQuery => Box::new(BufferQuery {
            max_buffered: Duration::from_millis(config.max_buffered_ms),
            poll: Duration::from_millis(config.poll_ms),
            max_wait: Duration::from_millis(config.max_wait_ms),
        }),
    }
}

/// Sleep a fixed time after each command, longer after homing.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    pub home: Duration,
    pub setup: Duration,
    pub motion: Duration,
}

impl FixedDelay {
    pub fn delay_for(&self, phase: Phase, command: &str) -> Duration {
        match phase {
            Phase::Setup if gcode::is_home(command) => self.home,
            Phase::Setup => self.setup,
            Phase::Motion => self.motion,
            Phase::Return => Duration::ZERO,
        }
    }
}

#[async_trait]
impl Pacer for FixedDelay {
    async fn pace(
        &mut self,
        _client: &mut FirmwareClient,
        phase: Phase,
        command: &str,
    ) -> Result<(), TransportError> {
        let delay = self.delay_for(phase, command);
        if !delay.is_zero() {
            sleep(delay).await;
        }
        Ok(())
    }
}

/// Follow every command with `M400`, whose reply arrives once the queue drains.
#[derive(Debug, Clone)]
pub struct WaitForAck {
    pub ack_timeout: Duration,
}

#[async_trait]
impl Pacer for WaitForAck {
    async fn pace(
        &mut self,
        client: &mut FirmwareClient,
        _phase: Phase,
        command: &str,
    ) -> Result<(), TransportError> {
        if !client.is_connected() {
            return Ok(());
        }
        if client.send_within(gcode::WAIT_FOR_MOVES, self.ack_timeout).await?.is_none() {
            tracing::warn!("No acknowledgment for '{}' within {:?}", command, self.ack_timeout);
        }
        Ok(())
    }
}

/// Hold off while more than `max_buffered` of motion is queued.
#[derive(Debug, Clone)]
pub struct BufferQuery {
    pub max_buffered: Duration,
    pub poll: Duration,
    pub max_wait: Duration,
}

#[async_trait]
impl Pacer for BufferQuery {
    async fn pace(
        &mut self,
        client: &mut FirmwareClient,
        _phase: Phase,
        command: &str,
    ) -> Result<(), TransportError> {
        if !client.is_connected() {
            return Ok(());
        }
        let started = Instant::now();
        loop {
            let query = Envelope::query_objects("toolhead", &["print_time", "estimated_print_time"]);
            let reply = client.request(&query).await?;
            let Some(buffered) = reply.as_deref().and_then(buffered_motion) else {
                tracing::debug!("Toolhead query gave no usable reply, pausing {:?}", self.poll);
                sleep(self.poll).await;
                return Ok(());
            };
            if buffered <= self.max_buffered {
                tracing::trace!("Buffered motion {:?} after '{}'", buffered, command);
                return Ok(());
            }
            if started.elapsed() >= self.max_wait {
                tracing::warn!(
                    "Motion queue still {:?} deep after waiting {:?}",
                    buffered,
                    self.max_wait
                );
                return Ok(());
            }
            sleep(self.poll).await;
        }
    }
}

/// Queued motion time from a toolhead `objects/query` reply.
pub fn buffered_motion(text: &str) -> Option<Duration> {
    parse_replies(text).into_iter().find_map(|reply| {
        let toolhead = reply.result?.get("status")?.get("toolhead")?.clone();
        let print_time = toolhead.get("print_time")?.as_f64()?;
        let estimated = toolhead.get("estimated_print_time")?.as_f64()?;
        Some(Duration::from_secs_f64((print_time - estimated).max(0.0)))
    })
}
