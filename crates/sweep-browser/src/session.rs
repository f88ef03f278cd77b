//! Session lifecycle: open, recycle, close.
//!
//! A [`SessionManager`] owns at most one live [`Session`] at a time. The
//! orchestrator is its only user; extractors only ever see a page.

use crate::actions::PageActions;
use crate::error::{BrowserError, Result};
use std::time::Duration;
use tracing::{debug, info, warn};

/// One browser instance with one reusable page.
#[async_trait::async_trait]
pub trait Session: Send + Sync + Sized + 'static {
    type Page: PageActions + 'static;

    /// The page handed to extractors in sequential mode
    fn page(&self) -> &Self::Page;

    /// An additional page in the same browser
    async fn open_page(&self) -> Result<Self::Page>;

    /// Dispose of a page from [`Session::open_page`]
    async fn close_page(&self, page: Self::Page);

    /// False once the browser process or its connection is gone
    fn is_alive(&self) -> bool;

    /// Tear down the whole browser, not just the page
    async fn close(self) -> Result<()>;
}

/// Launches sessions.
#[async_trait::async_trait]
pub trait SessionProvider: Send + Sync {
    type Session: Session;

    /// Start a browser and open its first page
    async fn launch(&self) -> Result<Self::Session>;

    /// Make a browser available after a failed launch (download, package install)
    async fn install(&self) -> Result<()> {
        Ok(())
    }
}

/// Owns the live session for one run.
pub struct SessionManager<'a, P: SessionProvider> {
    provider: &'a P,
    init_url: Option<String>,
    init_timeout: Duration,
    current: Option<P::Session>,
    recycles: u32,
}

impl<'a, P: SessionProvider> SessionManager<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self {
            provider,
            init_url: None,
            init_timeout: Duration::from_secs(60),
            current: None,
            recycles: 0,
        }
    }

    /// Navigate every fresh session here before handing it out.
    #[must_use]
    pub fn with_init_url(mut self, url: Option<String>, timeout: Duration) -> Self {
        self.init_url = url;
        self.init_timeout = timeout;
        self
    }

    /// Launch the first session. No-op if one is already open.
    ///
    /// # Errors
    /// `BrowserError::Launch` when the launch fails, the install step runs,
    /// and the second launch fails too.
    pub async fn open(&mut self) -> Result<&P::Session> {
        if self.current.is_none() {
            let session = self.launch_ready().await?;
            self.current = Some(session);
        }
        self.session()
    }

    /// Close the current session completely, then launch a new one.
    pub async fn recycle(&mut self) -> Result<&P::Session> {
        self.close().await;
        self.recycles += 1;
        info!("Recycling browser session (#{})", self.recycles);
        let session = self.launch_ready().await?;
        self.current = Some(session);
        self.session()
    }

    /// Close the current session, if any. Safe to call repeatedly.
    pub async fn close(&mut self) {
        if let Some(session) = self.current.take() {
            if let Err(e) = session.close().await {
                warn!("Browser session did not close cleanly: {}", e);
            } else {
                debug!("Browser session closed");
            }
        }
    }

    /// The live session.
    pub fn session(&self) -> Result<&P::Session> {
        self.current
            .as_ref()
            .ok_or_else(|| BrowserError::SessionClosed("no open session".to_string()))
    }

    /// Whether a session is open and its browser still answers.
    pub fn is_alive(&self) -> bool {
        self.current.as_ref().is_some_and(|session| session.is_alive())
    }

    /// Number of completed recycles so far.
    pub fn recycles(&self) -> u32 {
        self.recycles
    }

    async fn launch_ready(&self) -> Result<P::Session> {
        let session = self.launch_with_fallback().await?;

        if let Some(url) = &self.init_url {
            if let Err(e) = session.page().navigate(url, self.init_timeout).await {
                warn!("Initial navigation to {} failed: {}", url, e);
            }
        }

        Ok(session)
    }

    async fn launch_with_fallback(&self) -> Result<P::Session> {
        match self.provider.launch().await {
            Ok(session) => Ok(session),
            Err(first) => {
                warn!("Browser launch failed ({}), running install step", first);
                if let Err(e) = self.provider.install().await {
                    warn!("Install step failed: {}", e);
                }

                self.provider.launch().await.map_err(|second| {
                    BrowserError::Launch(format!(
                        "{second} (after install retry; first attempt: {first})"
                    ))
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Log {
        launches: AtomicU32,
        installs: AtomicU32,
        closes: AtomicU32,
        navigations: Mutex<Vec<String>>,
    }

    struct FakePage(Arc<Log>);

    #[async_trait::async_trait]
    impl PageActions for FakePage {
        async fn navigate(&self, url: &str, _timeout: Duration) -> Result<()> {
            self.0.navigations.lock().unwrap().push(url.to_string());
            Ok(())
        }
        async fn current_url(&self) -> Result<Option<String>> {
            Ok(None)
        }
        async fn content(&self) -> Result<String> {
            Ok(String::new())
        }
        async fn inner_text(&self) -> Result<String> {
            Ok(String::new())
        }
        async fn evaluate(&self, _script: &str) -> Result<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
        async fn type_text(&self, _: &str, _: &str, _: Duration) -> Result<()> {
            Ok(())
        }
        async fn press_key(&self, _: &str, _: &str) -> Result<()> {
            Ok(())
        }
        async fn click(&self, _: &str) -> Result<()> {
            Ok(())
        }
        async fn fill_field(&self, _: &str, _: &str) -> Result<()> {
            Ok(())
        }
    }

    struct FakeSession {
        page: FakePage,
        log: Arc<Log>,
    }

    #[async_trait::async_trait]
    impl Session for FakeSession {
        type Page = FakePage;

        fn page(&self) -> &FakePage {
            &self.page
        }
        async fn open_page(&self) -> Result<FakePage> {
            Ok(FakePage(self.log.clone()))
        }
        async fn close_page(&self, _page: FakePage) {}
        fn is_alive(&self) -> bool {
            true
        }
        async fn close(self) -> Result<()> {
            self.log.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Fails the first `failures` launches.
    struct FakeProvider {
        log: Arc<Log>,
        failures: u32,
    }

    #[async_trait::async_trait]
    impl SessionProvider for FakeProvider {
        type Session = FakeSession;

        async fn launch(&self) -> Result<FakeSession> {
            let n = self.log.launches.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(BrowserError::ChromiumError("binary missing".to_string()));
            }
            Ok(FakeSession {
                page: FakePage(self.log.clone()),
                log: self.log.clone(),
            })
        }

        async fn install(&self) -> Result<()> {
            self.log.installs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn provider(failures: u32) -> FakeProvider {
        FakeProvider {
            log: Arc::new(Log::default()),
            failures,
        }
    }

    #[tokio::test]
    async fn test_open_navigates_to_init_url() {
        let provider = provider(0);
        let mut manager = SessionManager::new(&provider)
            .with_init_url(Some("https://example.com/".to_string()), Duration::ZERO);

        manager.open().await.expect("open");
        assert!(manager.is_alive());
        assert_eq!(
            *provider.log.navigations.lock().unwrap(),
            vec!["https://example.com/".to_string()]
        );
        manager.close().await;
    }

    #[tokio::test]
    async fn test_launch_failure_installs_once_then_retries() {
        let provider = provider(1);
        let mut manager = SessionManager::new(&provider);

        manager.open().await.expect("second launch succeeds");
        assert_eq!(provider.log.launches.load(Ordering::SeqCst), 2);
        assert_eq!(provider.log.installs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_launch_failure_is_fatal() {
        let provider = provider(2);
        let mut manager = SessionManager::new(&provider);

        let err = manager.open().await.err().expect("launch must fail");
        assert!(matches!(err, BrowserError::Launch(_)));
        assert_eq!(provider.log.launches.load(Ordering::SeqCst), 2);
        assert_eq!(provider.log.installs.load(Ordering::SeqCst), 1);
        assert!(!manager.is_alive());
    }

    #[tokio::test]
    async fn test_recycle_closes_before_launching() {
        let provider = provider(0);
        let mut manager = SessionManager::new(&provider);

        manager.open().await.expect("open");
        manager.recycle().await.expect("recycle");
        manager.recycle().await.expect("recycle");

        assert_eq!(manager.recycles(), 2);
        assert_eq!(provider.log.launches.load(Ordering::SeqCst), 3);
        assert_eq!(provider.log.closes.load(Ordering::SeqCst), 2);

        manager.close().await;
        manager.close().await;
        assert_eq!(provider.log.closes.load(Ordering::SeqCst), 3);
        assert!(manager.session().is_err());
    }
}
