//! Send loop.
//!
//! Native mode drains the outbound queue in batches; pass-through mode
//! ignores the queue and drives periodic maintenance ticks instead.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::event::{LoopRole, absorb};
use crate::core::{SessionRegistry, TransportResult};
use crate::transport::{DatagramSender, Mode, OutboundDrain, OutboundMessage};

/// State owned by the send loop.
pub(crate) struct Sender<R: SessionRegistry> {
    pub(crate) socket: DatagramSender,
    pub(crate) registry: Arc<R>,
    pub(crate) mode: Mode,
    pub(crate) tick_interval: Duration,
    pub(crate) queue: OutboundDrain<R::Session>,
    pub(crate) cancel: CancellationToken,
}

impl<R: SessionRegistry> Sender<R> {
    /// Run until cancelled or until an unexpected error.
    ///
    /// Anything still queued when the loop ends is discarded.
    pub(crate) async fn run(mut self) -> TransportResult<()> {
        let result = match self.mode {
            Mode::Native => self.run_native().await,
            Mode::PassThrough => self.run_pass_through().await,
        };
        self.queue.close();
        trace!("send loop stopped");
        result
    }

    async fn run_native(&mut self) -> TransportResult<()> {
        loop {
            let first = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(()),
                next = self.queue.recv() => match next {
                    Some(message) => message,
                    None => return Ok(()),
                },
            };

            for message in self.queue.batch(first) {
                if self.cancel.is_cancelled() {
                    return Ok(());
                }
                absorb(LoopRole::Send, self.write(&message).await)?;
            }
        }
    }

    async fn run_pass_through(&mut self) -> TransportResult<()> {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(()),
                _ = ticker.tick() => {}
            }
            self.tick(Instant::now()).await?;
        }
    }

    /// Write one queued message to its session's bound endpoint.
    pub(crate) async fn write(&self, message: &OutboundMessage<R::Session>) -> TransportResult<()> {
        let target = message.destination()?;
        self.socket.send_to(message.payload(), target).await?;
        trace!(peer = %target, len = message.len(), "sent");
        Ok(())
    }

    /// One pass-through maintenance tick.
    pub(crate) async fn tick(&self, now: Instant) -> TransportResult<()> {
        let datagrams = match self.registry.tick_pass_through(now) {
            Ok(datagrams) => datagrams,
            Err(e) => return absorb(LoopRole::Send, Err(e)),
        };

        for datagram in datagrams {
            let sent = self
                .socket
                .send_to(&datagram.payload, datagram.target)
                .await
                .map(|_| ())
                .map_err(Into::into);
            absorb(LoopRole::Send, sent)?;
        }
        Ok(())
    }
}
