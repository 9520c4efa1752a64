// src/workers/available.rs

//! Poll a URL until it answers, then optionally open a browser on it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Future returned by [`HttpProbe::get_status`].
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = Result<u16>> + Send + 'a>>;

/// Issues a single GET and reports the status code.
pub trait HttpProbe: Send + Sync {
    fn get_status<'a>(&'a self, url: &'a str) -> ProbeFuture<'a>;
}

/// Opens a URL for the user. Fire-and-forget.
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> Result<()>;
}

/// `reqwest`-backed probe with a per-request timeout.
#[derive(Debug, Clone)]
pub struct ReqwestProbe {
    client: reqwest::Client,
}

impl ReqwestProbe {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self { client })
    }
}

impl HttpProbe for ReqwestProbe {
    fn get_status<'a>(&'a self, url: &'a str) -> ProbeFuture<'a> {
        Box::pin(async move {
            let response = self.client.get(url).send().await?;
            Ok(response.status().as_u16())
        })
    }
}

/// Opens URLs with the platform's default handler.
#[derive(Debug, Clone, Default)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> Result<()> {
        open::that_detached(url).with_context(|| format!("opening browser at {url}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Delay between attempts.
    pub interval: Duration,
    /// Give up after this many requests. `None` polls until stopped.
    pub max_attempts: Option<u32>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: None,
        }
    }
}

/// How a poll loop ended. `attempts` counts GET requests issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Available { attempts: u32 },
    Stopped { attempts: u32 },
    GaveUp { attempts: u32 },
}

/// Polls a URL until it answers `200 OK`.
///
/// Request errors (refused connections, timeouts, DNS failures) count as
/// "not available yet". [`stop`](Self::stop) ends the loop early without a
/// success notification.
pub struct AvailabilityPoller {
    url: String,
    open_browser: bool,
    options: PollOptions,
    probe: Arc<dyn HttpProbe>,
    browser: Arc<dyn BrowserLauncher>,
    shutdown: CancellationToken,
}

impl AvailabilityPoller {
    /// Poller using a real HTTP client and the system browser.
    pub fn new(
        url: impl Into<String>,
        open_browser: bool,
        request_timeout: Duration,
    ) -> Result<Self> {
        let probe = ReqwestProbe::new(request_timeout)?;
        Ok(Self::with_probe(
            url,
            open_browser,
            Arc::new(probe),
            Arc::new(SystemBrowser),
        ))
    }

    pub fn with_probe(
        url: impl Into<String>,
        open_browser: bool,
        probe: Arc<dyn HttpProbe>,
        browser: Arc<dyn BrowserLauncher>,
    ) -> Self {
        Self {
            url: url.into(),
            open_browser,
            options: PollOptions::default(),
            probe,
            browser,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_options(mut self, options: PollOptions) -> Self {
        self.options = options;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Token that stops this poller when cancelled.
    pub fn stopper(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub fn is_terminated(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub async fn run(&self) -> PollOutcome {
        let mut attempts = 0u32;

        loop {
            if self.shutdown.is_cancelled() {
                return self.stopped(attempts);
            }

            attempts += 1;
            let status = tokio::select! {
                _ = self.shutdown.cancelled() => return self.stopped(attempts),
                status = self.probe.get_status(&self.url) => status,
            };

            match status {
                Ok(200) => {
                    info!(url = %self.url, attempts, "available at {}", self.url);
                    if self.open_browser {
                        if let Err(e) = self.browser.open(&self.url) {
                            warn!(url = %self.url, error = %e, "failed to open browser");
                        }
                    }
                    self.shutdown.cancel();
                    return PollOutcome::Available { attempts };
                }
                Ok(code) => debug!(url = %self.url, status = code, attempts, "not available yet"),
                Err(e) => debug!(url = %self.url, error = %e, attempts, "not reachable yet"),
            }

            if let Some(max) = self.options.max_attempts {
                if attempts >= max {
                    warn!(url = %self.url, attempts, "giving up waiting for availability");
                    return PollOutcome::GaveUp { attempts };
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => return self.stopped(attempts),
                _ = tokio::time::sleep(self.options.interval) => {}
            }
        }
    }

    /// Run on its own Tokio task.
    pub fn spawn(self) -> AvailabilityHandle {
        let shutdown = self.stopper();
        let handle = tokio::spawn(async move { self.run().await });
        AvailabilityHandle { shutdown, handle }
    }

    fn stopped(&self, attempts: u32) -> PollOutcome {
        debug!(url = %self.url, attempts, "availability poller stopped");
        PollOutcome::Stopped { attempts }
    }
}

/// Handle on a spawned [`AvailabilityPoller`].
#[derive(Debug)]
pub struct AvailabilityHandle {
    shutdown: CancellationToken,
    handle: JoinHandle<PollOutcome>,
}

impl AvailabilityHandle {
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn join(self) -> Result<PollOutcome, tokio::task::JoinError> {
        self.handle.await
    }
}
