use anyhow::{Context, Result};
use async_trait::async_trait;

#[async_trait]
pub trait BrowserOpener: Send + Sync {
    async fn open(&self, url: &str) -> Result<()>;
}

/// Opens URLs with the desktop's default browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

#[async_trait]
impl BrowserOpener for SystemBrowser {
    async fn open(&self, url: &str) -> Result<()> {
        let target = url.to_string();
        tokio::task::spawn_blocking(move || open::that(target))
            .await
            .context("browser launcher task panicked")?
            .with_context(|| format!("failed to open browser at {url}"))
    }
}
