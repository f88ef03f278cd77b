use crate::actions::PageActions;
use crate::error::{BrowserError, Result};
use crate::session::{Session, SessionProvider};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::stream::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sweep_core::config::BrowserConfig as LaunchSettings;
use tokio::task::JoinHandle;

/// Map a CDP failure to a browser fault. Anything that means the
/// connection to the browser is gone becomes `SessionClosed`.
fn classify(err: CdpError, context: &str, alive: &AtomicBool) -> BrowserError {
    if !alive.load(Ordering::SeqCst) {
        return BrowserError::SessionClosed(format!("{context}: {err}"));
    }
    match err {
        CdpError::Timeout => BrowserError::Timeout(context.to_string()),
        CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
            BrowserError::SessionClosed(format!("{context}: {err}"))
        }
        other => BrowserError::ChromiumError(format!("{context}: {other}")),
    }
}

/// Launches headless Chromium sessions from [`LaunchSettings`].
#[derive(Debug, Clone)]
pub struct ChromiumProvider {
    settings: LaunchSettings,
}

impl ChromiumProvider {
    pub fn new(settings: LaunchSettings) -> Self {
        Self { settings }
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let s = &self.settings;
        let mut builder = BrowserConfig::builder()
            .window_size(s.window_width, s.window_height)
            .launch_timeout(Duration::from_secs(s.launch_timeout_secs));

        if s.no_sandbox {
            builder = builder.no_sandbox();
        }
        if !s.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &s.executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(BrowserError::Launch)
    }
}

#[async_trait::async_trait]
impl SessionProvider for ChromiumProvider {
    type Session = ChromiumSession;

    async fn launch(&self) -> Result<ChromiumSession> {
        let config = self.browser_config()?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        // Handler drives the CDP connection; when it ends the browser is gone
        let alive = Arc::new(AtomicBool::new(true));
        let handler_alive = alive.clone();
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("chromium handler event error: {}", e);
                }
            }
            handler_alive.store(false, Ordering::SeqCst);
            tracing::warn!("chromium handler exited");
        });

        let user_agent = self.settings.user_agent.clone();
        let page = match new_page(&browser, &user_agent, &alive).await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(e);
            }
        };

        tracing::debug!("Chromium session launched");
        Ok(ChromiumSession {
            browser: Some(browser),
            page,
            handler_task,
            alive,
            user_agent,
        })
    }

    async fn install(&self) -> Result<()> {
        let Some((program, args)) = self.settings.install_command.split_first() else {
            tracing::debug!("No install command configured");
            return Ok(());
        };

        tracing::info!("Running browser install command: {}", program);
        let status = tokio::process::Command::new(program)
            .args(args)
            .status()
            .await
            .map_err(|e| BrowserError::Launch(format!("install command failed to start: {e}")))?;

        if status.success() {
            Ok(())
        } else {
            Err(BrowserError::Launch(format!(
                "install command exited with {status}"
            )))
        }
    }
}

/// Open a page carrying the session's fixed user agent.
async fn new_page(
    browser: &Browser,
    user_agent: &str,
    alive: &Arc<AtomicBool>,
) -> Result<ChromiumPage> {
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| classify(e, "new page", alive))?;

    page.set_user_agent(SetUserAgentOverrideParams::new(user_agent.to_string()))
        .await
        .map_err(|e| classify(e, "set user agent", alive))?;

    Ok(ChromiumPage {
        page,
        alive: alive.clone(),
    })
}

/// A launched Chromium browser with one working page.
pub struct ChromiumSession {
    browser: Option<Browser>,
    page: ChromiumPage,
    handler_task: JoinHandle<()>,
    alive: Arc<AtomicBool>,
    user_agent: String,
}

#[async_trait::async_trait]
impl Session for ChromiumSession {
    type Page = ChromiumPage;

    fn page(&self) -> &ChromiumPage {
        &self.page
    }

    async fn open_page(&self) -> Result<ChromiumPage> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| BrowserError::SessionClosed("browser already closed".to_string()))?;

        new_page(browser, &self.user_agent, &self.alive).await
    }

    async fn close_page(&self, page: ChromiumPage) {
        if let Err(e) = page.page.close().await {
            tracing::debug!("page close failed: {}", e);
        }
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && !self.handler_task.is_finished()
    }

    async fn close(mut self) -> Result<()> {
        let result = match self.browser.take() {
            Some(mut browser) => {
                let closed = browser
                    .close()
                    .await
                    .map(|_| ())
                    .map_err(|e| BrowserError::ChromiumError(format!("close: {e}")));
                if let Err(e) = browser.wait().await {
                    tracing::debug!("waiting for browser exit failed: {}", e);
                }
                closed
            }
            None => Ok(()),
        };
        self.handler_task.abort();
        result
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        // Dropping `Browser` kills the child process; the handler task would
        // otherwise outlive it.
        self.handler_task.abort();
    }
}

/// One Chromium tab.
pub struct ChromiumPage {
    page: Page,
    alive: Arc<AtomicBool>,
}

impl ChromiumPage {
    fn ensure_alive(&self) -> Result<()> {
        if self.alive.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BrowserError::SessionClosed(
                "browser connection lost".to_string(),
            ))
        }
    }

    async fn element(&self, selector: &str) -> Result<chromiumoxide::Element> {
        self.page
            .find_element(selector)
            .await
            .map_err(|e| match classify(e, selector, &self.alive) {
                BrowserError::ChromiumError(_) => {
                    BrowserError::SelectorNotFound(selector.to_string())
                }
                other => other,
            })
    }
}

#[async_trait::async_trait]
impl PageActions for ChromiumPage {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        self.ensure_alive()?;
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(match classify(e, url, &self.alive) {
                BrowserError::ChromiumError(msg) => BrowserError::NavigationError(msg),
                other => other,
            }),
            Err(_) => Err(BrowserError::Timeout(format!("navigation to {url}"))),
        }
    }

    async fn current_url(&self) -> Result<Option<String>> {
        self.ensure_alive()?;
        self.page
            .url()
            .await
            .map_err(|e| classify(e, "current url", &self.alive))
    }

    async fn content(&self) -> Result<String> {
        self.ensure_alive()?;
        self.page
            .content()
            .await
            .map_err(|e| classify(e, "page content", &self.alive))
    }

    async fn inner_text(&self) -> Result<String> {
        let value = self
            .evaluate("document.body ? document.body.innerText : ''")
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        self.ensure_alive()?;
        let result = self.page.evaluate(script).await.map_err(|e| {
            match classify(e, "evaluate", &self.alive) {
                BrowserError::ChromiumError(msg) => BrowserError::Evaluation(msg),
                other => other,
            }
        })?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        per_key_delay: Duration,
    ) -> Result<()> {
        self.ensure_alive()?;
        let element = self.element(selector).await?;
        element
            .click()
            .await
            .map_err(|e| classify(e, selector, &self.alive))?;

        for ch in text.chars() {
            element
                .type_str(ch.to_string())
                .await
                .map_err(|e| classify(e, selector, &self.alive))?;
            if !per_key_delay.is_zero() {
                tokio::time::sleep(per_key_delay).await;
            }
        }
        Ok(())
    }

    async fn press_key(&self, selector: &str, key: &str) -> Result<()> {
        self.ensure_alive()?;
        self.element(selector)
            .await?
            .press_key(key)
            .await
            .map_err(|e| classify(e, selector, &self.alive))?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.ensure_alive()?;
        self.element(selector)
            .await?
            .click()
            .await
            .map_err(|e| classify(e, selector, &self.alive))?;
        Ok(())
    }

    async fn fill_field(&self, selector: &str, value: &str) -> Result<()> {
        let selector_js = serde_json::to_string(selector)
            .map_err(|e| BrowserError::Evaluation(e.to_string()))?;
        let value_js =
            serde_json::to_string(value).map_err(|e| BrowserError::Evaluation(e.to_string()))?;

        let found = self
            .evaluate(&format!(
                "(() => {{ const el = document.querySelector({selector_js}); \
                 if (!el) return false; el.value = {value_js}; \
                 el.dispatchEvent(new Event('input', {{ bubbles: true }})); return true; }})()"
            ))
            .await?;

        if found.as_bool() == Some(true) {
            Ok(())
        } else {
            Err(BrowserError::SelectorNotFound(selector.to_string()))
        }
    }
}
