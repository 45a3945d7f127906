//! Shared headless-browser rendering.
//!
//! One browser process serves the whole fetcher lifetime; launching and
//! tearing one down per request is far too expensive. The per-request
//! resource is a page, checked out from the browser and released through
//! [`PageGuard`] on every path, navigation failures included — leaked pages
//! accumulate inside the browser process under sustained failures.

use std::collections::HashMap;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::FetchError;
use crate::types::{FetchResult, FetchStrategy};

pub(super) struct Renderer {
    browser: Mutex<Browser>,
    handler_task: JoinHandle<()>,
}

impl Renderer {
    pub(super) async fn launch() -> Result<Self, FetchError> {
        let config = BrowserConfig::builder()
            .args(vec![
                "--no-sandbox",
                "--disable-dev-shm-usage",
                "--disable-gpu",
                "--no-first-run",
            ])
            .build()
            .map_err(FetchError::BrowserConfig)?;

        let (browser, mut handler) = Browser::launch(config).await?;

        // The CDP event loop only makes progress while this stream is polled.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(browser),
            handler_task,
        })
    }

    pub(super) async fn render(
        &self,
        url: &str,
        settle: Duration,
        nav_timeout: Duration,
    ) -> Result<FetchResult, FetchError> {
        let page = {
            let browser = self.browser.lock().await;
            browser.new_page("about:blank").await?
        };
        let guard = PageGuard::new(page, url.to_owned());

        match tokio::time::timeout(nav_timeout, guard.page().goto(url)).await {
            Err(_) => {
                // Guard drop schedules the page close.
                return Err(FetchError::NavigationTimeout {
                    url: url.to_owned(),
                    secs: nav_timeout.as_secs(),
                });
            }
            Ok(Err(e)) => return Err(e.into()),
            Ok(Ok(_)) => {}
        }

        // Bounded settle period for late-loading storefront markup.
        tokio::time::sleep(settle).await;

        let body = guard.page().content().await?;
        let final_url = guard
            .page()
            .url()
            .await?
            .unwrap_or_else(|| url.to_owned());
        guard.close().await;

        Ok(FetchResult {
            url: url.to_owned(),
            final_url,
            // The CDP content path does not surface the navigation status;
            // a completed render is recorded as 200.
            status_code: 200,
            body,
            headers: HashMap::new(),
            strategy_used: FetchStrategy::Browser,
            success: true,
            error: None,
        })
    }

    pub(super) async fn shutdown(&self) {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            tracing::debug!(error = %e, "browser close failed");
        }
        self.handler_task.abort();
    }
}

/// RAII checkout of one browser page.
///
/// `Page` has no `Drop`; it must be closed through CDP or it leaks inside
/// the browser process. The preferred path is the explicit async
/// [`PageGuard::close`]; error paths fall back to a close task spawned from
/// `Drop` on the runtime handle captured at construction.
struct PageGuard {
    page: Option<Page>,
    url: String,
    runtime: tokio::runtime::Handle,
}

impl PageGuard {
    fn new(page: Page, url: String) -> Self {
        Self {
            page: Some(page),
            url,
            runtime: tokio::runtime::Handle::current(),
        }
    }

    fn page(&self) -> &Page {
        self.page.as_ref().expect("page already released")
    }

    async fn close(mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                tracing::debug!(url = %self.url, error = %e, "page close failed");
            }
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            let url = std::mem::take(&mut self.url);
            self.runtime.spawn(async move {
                if let Err(e) = page.close().await {
                    tracing::debug!(url, error = %e, "page close failed in drop path");
                }
            });
        }
    }
}
