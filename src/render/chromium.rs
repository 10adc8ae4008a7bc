//! Chrome/Chromium engine over the DevTools protocol (`chromiumoxide`).
//!
//! - One [`Browser`] per engine; its CDP [`Handler`] is driven by a spawned
//!   task for as long as the engine lives.
//! - Each context is a CDP browser context (separate cookies, storage and
//!   cache) holding a single page. Closing the context closes the page and
//!   disposes the browser context.

use crate::config::LaunchOptions;
use crate::error::EngineError;
use crate::render::engine::{EngineLauncher, RenderContext, RenderEngine};
use crate::render::{PdfLayout, Viewport};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::{BrowserContextId, CloseParams};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, NavigateParams, PrintToPdfParams, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::Handler;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, trace};

/// Switches that let Chromium run in containers without the setuid sandbox
/// helper or a large `/dev/shm`.
const CONTAINER_ARGS: [&str; 2] = ["--disable-setuid-sandbox", "--disable-dev-shm-usage"];

const LIFECYCLE_NETWORK_IDLE: &str = "networkIdle";

const CONTENT_HEIGHT_JS: &str = "Math.max(\
    document.documentElement ? document.documentElement.scrollHeight : 0, \
    document.body ? document.body.scrollHeight : 0)";

fn protocol(e: CdpError) -> EngineError {
    EngineError::Protocol(e.to_string())
}

// ── Launcher ─────────────────────────────────────────────────────────────

/// Launches a local Chrome/Chromium process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromiumLauncher;

#[async_trait]
impl EngineLauncher for ChromiumLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Arc<dyn RenderEngine>, EngineError> {
        let config = browser_config(options)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| EngineError::LaunchFailed(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    trace!("CDP handler event error: {}", e);
                }
            }
            debug!("CDP handler finished");
        });

        Ok(Arc::new(ChromiumEngine {
            browser: Arc::new(browser),
            handler_task,
        }))
    }
}

/// Build the `chromiumoxide` launch config for `options`.
pub fn browser_config(options: &LaunchOptions) -> Result<BrowserConfig, EngineError> {
    let mut builder = BrowserConfig::builder()
        .no_sandbox()
        .launch_timeout(Duration::from_secs(options.launch_timeout_secs));
    for arg in CONTAINER_ARGS {
        builder = builder.arg(arg);
    }
    for arg in &options.extra_args {
        builder = builder.arg(arg.as_str());
    }
    if !options.headless {
        builder = builder.with_head();
    }
    if let Some(ref path) = options.chrome_executable {
        builder = builder.chrome_executable(path);
    }
    builder.build().map_err(EngineError::LaunchFailed)
}

// ── Engine ───────────────────────────────────────────────────────────────

/// A running browser plus the task pumping its CDP connection.
pub struct ChromiumEngine {
    browser: Arc<Browser>,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl RenderEngine for ChromiumEngine {
    async fn new_context(&self, viewport: Viewport) -> Result<Box<dyn RenderContext>, EngineError> {
        let context_id = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(protocol)?
            .result
            .browser_context_id;

        // Disposes the browser context if this future is dropped before the
        // context is handed over.
        let pending = PendingContext::new(Arc::clone(&self.browser), context_id.clone());

        let mut target = CreateTargetParams::new("about:blank");
        target.browser_context_id = Some(context_id.clone());
        let page = match self.browser.new_page(target).await {
            Ok(page) => page,
            Err(e) => {
                pending.dispose().await;
                return Err(protocol(e));
            }
        };

        let context = ChromiumContext {
            browser: Arc::clone(&self.browser),
            context_id,
            page,
        };
        if let Err(e) = context.prepare(viewport).await {
            pending.disarm();
            Box::new(context).close().await.ok();
            return Err(e);
        }
        pending.disarm();
        Ok(Box::new(context))
    }

    async fn close(&self) -> Result<(), EngineError> {
        debug!("Closing browser");
        let result = self
            .browser
            .execute(CloseParams::default())
            .await
            .map(|_| ())
            .map_err(protocol);
        self.handler_task.abort();
        result
    }
}

impl Drop for ChromiumEngine {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

async fn dispose_context(browser: &Browser, context_id: BrowserContextId) {
    if let Err(e) = browser
        .execute(DisposeBrowserContextParams::new(context_id))
        .await
    {
        debug!("Failed to dispose browser context: {}", e);
    }
}

/// A browser context created but not yet owned by a [`ChromiumContext`].
struct PendingContext {
    browser: Arc<Browser>,
    context_id: Option<BrowserContextId>,
}

impl PendingContext {
    fn new(browser: Arc<Browser>, context_id: BrowserContextId) -> Self {
        Self {
            browser,
            context_id: Some(context_id),
        }
    }

    fn disarm(mut self) {
        self.context_id = None;
    }

    async fn dispose(mut self) {
        if let Some(id) = self.context_id.take() {
            dispose_context(&self.browser, id).await;
        }
    }
}

impl Drop for PendingContext {
    fn drop(&mut self) {
        let Some(id) = self.context_id.take() else {
            return;
        };
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let browser = Arc::clone(&self.browser);
            handle.spawn(async move { dispose_context(&browser, id).await });
        }
    }
}

// ── Context ──────────────────────────────────────────────────────────────

/// One browser context with its single page.
pub struct ChromiumContext {
    browser: Arc<Browser>,
    context_id: BrowserContextId,
    page: Page,
}

impl ChromiumContext {
    async fn prepare(&self, viewport: Viewport) -> Result<(), EngineError> {
        self.page
            .execute(SetDeviceMetricsOverrideParams::new(
                i64::from(viewport.width),
                i64::from(viewport.height),
                1.0,
                false,
            ))
            .await
            .map_err(protocol)?;
        self.page
            .execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .map_err(protocol)?;
        Ok(())
    }
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&self, url: &str) -> Result<(), EngineError> {
        // Subscribe first so a fast idle event cannot slip past.
        let mut events = self
            .page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(protocol)?;

        let nav = self
            .page
            .execute(NavigateParams::new(url))
            .await
            .map_err(protocol)?
            .result;
        if let Some(text) = nav.error_text {
            return Err(EngineError::Protocol(format!("navigation failed: {text}")));
        }

        while let Some(event) = events.next().await {
            let same_load = nav
                .loader_id
                .as_ref()
                .map_or(true, |id| *id == event.loader_id);
            if same_load && event.name == LIFECYCLE_NETWORK_IDLE {
                return Ok(());
            }
        }
        Err(EngineError::Protocol(
            "page closed before network became idle".into(),
        ))
    }

    async fn matches(&self, selector: &str) -> Result<bool, EngineError> {
        let literal = serde_json::to_string(selector)
            .map_err(|e| EngineError::Protocol(e.to_string()))?;
        self.page
            .evaluate(format!("document.querySelector({literal}) !== null"))
            .await
            .map_err(protocol)?
            .into_value::<bool>()
            .map_err(|e| EngineError::Protocol(e.to_string()))
    }

    async fn content_height(&self) -> Result<u32, EngineError> {
        let height = self
            .page
            .evaluate(CONTENT_HEIGHT_JS)
            .await
            .map_err(protocol)?
            .into_value::<f64>()
            .map_err(|e| EngineError::Protocol(e.to_string()))?;
        Ok(height.max(0.0).ceil().min(f64::from(u32::MAX)) as u32)
    }

    async fn print_pdf(&self, layout: PdfLayout) -> Result<Vec<u8>, EngineError> {
        let margin = layout.margin_in();
        let params = PrintToPdfParams {
            print_background: Some(layout.print_background),
            paper_width: Some(layout.width_in()),
            paper_height: Some(layout.paper_height_in()),
            margin_top: Some(margin),
            margin_bottom: Some(margin),
            margin_left: Some(margin),
            margin_right: Some(margin),
            prefer_css_page_size: Some(false),
            ..Default::default()
        };
        self.page.pdf(params).await.map_err(protocol)
    }

    async fn close(self: Box<Self>) -> Result<(), EngineError> {
        let ChromiumContext {
            browser,
            context_id,
            page,
        } = *self;
        let closed = page.close().await.map_err(protocol);
        dispose_context(&browser, context_id).await;
        closed
    }
}
