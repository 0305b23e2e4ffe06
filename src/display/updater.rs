//! Periodic display refresh.

use super::{DisplayDriver, Frame};
use crate::config::{DisplayConfig, DisplayKind};
use crate::error::Result;
use crate::net;
use crate::reading::ReadingStore;
use crate::tasks::run_periodic;
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Owns a display driver and runs its cleanup exactly once, either when
/// [`DisplayGuard::cleanup`] is called or when the guard is dropped.
///
/// Dropping covers the task being aborted mid-refresh.
pub struct DisplayGuard {
    kind: DisplayKind,
    driver: Option<Box<dyn DisplayDriver>>,
}

impl DisplayGuard {
    pub fn new(driver: Box<dyn DisplayDriver>) -> Self {
        Self {
            kind: driver.kind(),
            driver: Some(driver),
        }
    }

    /// Draw `frame`. Fails quietly once the display has been cleaned up.
    pub fn render(&mut self, frame: &Frame) -> Result<()> {
        match self.driver.as_mut() {
            Some(driver) => driver.render(frame),
            None => Ok(()),
        }
    }

    /// Blank and release the display. Later calls do nothing.
    pub fn cleanup(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            match driver.cleanup() {
                Ok(()) => debug!("{} display cleaned up", self.kind),
                Err(e) => error!("Failed to clean up {} display: {}", self.kind, e),
            }
        }
    }
}

impl Drop for DisplayGuard {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Redraws one display from the store at a fixed interval.
pub struct DisplayUpdater {
    guard: DisplayGuard,
    store: Arc<ReadingStore>,
    interval: Duration,
    stale_after: Duration,
    ip_iface: String,
}

impl DisplayUpdater {
    /// Drive `driver` as configured by `config`. `ip_iface` names the
    /// interface whose address the LCD shows; empty disables the lookup.
    pub fn new(
        driver: Box<dyn DisplayDriver>,
        store: Arc<ReadingStore>,
        config: &DisplayConfig,
        ip_iface: impl Into<String>,
    ) -> Self {
        Self {
            guard: DisplayGuard::new(driver),
            store,
            interval: config.refresh_interval,
            stale_after: config.stale_after,
            ip_iface: ip_iface.into(),
        }
    }

    /// The frame the next refresh would draw.
    pub fn frame(&self) -> Frame {
        let ip = match self.guard.kind {
            DisplayKind::Lcd => net::display_ip(&self.ip_iface),
            DisplayKind::Oled => None,
        };
        Frame::new(self.store.get(), Local::now(), ip, self.stale_after)
    }

    fn tick(&mut self) {
        let frame = self.frame();
        if let Err(e) = self.guard.render(&frame) {
            warn!("Failed to refresh {} display: {}", self.guard.kind, e);
        }
    }

    /// Refresh until `token` is cancelled, then clean up the display.
    pub async fn run(mut self, token: CancellationToken) {
        info!("Refreshing {} display every {:?}", self.guard.kind, self.interval);
        let interval = self.interval;
        run_periodic(&token, interval, || {
            self.tick();
            std::future::ready(())
        })
        .await;
        self.guard.cleanup();
    }
}
