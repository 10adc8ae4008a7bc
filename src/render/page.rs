//! One URL → one continuous-page PDF.
//!
//! ## Per-request flow
//!
//! ```text
//! validate → acquire engine → open context ─┐
//!                                           ▼
//!        navigate (≤ navigation timeout, network idle)
//!        poll readiness selector (≤ readiness timeout)
//!        settle delay
//!        measure scrollHeight
//!        print: requested width × measured height
//!                                           │
//!        close context  ◀───────────────────┘  (every exit path)
//! ```
//!
//! The context is closed explicitly on every path out of [`PageRenderer::render_with_cancel`].
//! [`ContextGuard`] covers the one path that cannot run async cleanup: the
//! render future itself being dropped mid-flight.

use crate::config::RenderConfig;
use crate::error::{EngineError, RenderError};
use crate::render::engine::RenderContext;
use crate::render::pool::RenderResourcePool;
use crate::render::{resolve_target, PdfLayout, RenderRequest, Viewport};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Renders pages through a shared [`RenderResourcePool`].
///
/// Cheap to clone; every clone shares the pool.
#[derive(Debug, Clone)]
pub struct PageRenderer {
    pool: Arc<RenderResourcePool>,
    config: RenderConfig,
}

impl PageRenderer {
    pub fn new(pool: Arc<RenderResourcePool>, config: RenderConfig) -> Self {
        Self { pool, config }
    }

    /// Renderer over a local Chrome/Chromium launched from `config.launch`.
    pub fn chromium(config: RenderConfig) -> Self {
        let pool = Arc::new(RenderResourcePool::chromium(config.launch.clone()));
        Self::new(pool, config)
    }

    pub fn pool(&self) -> &Arc<RenderResourcePool> {
        &self.pool
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Render `request` to PDF bytes.
    pub async fn render(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderError> {
        self.render_with_cancel(request, &CancellationToken::new()).await
    }

    /// Render `request` and write the PDF to `output_path`.
    ///
    /// The file is written to a temporary sibling first and renamed into
    /// place, so a failed write never leaves a partial PDF behind.
    pub async fn render_to_file(
        &self,
        request: &RenderRequest,
        output_path: impl AsRef<Path>,
    ) -> Result<usize, RenderError> {
        self.render_to_file_with_cancel(request, output_path, &CancellationToken::new())
            .await
    }

    /// [`render_to_file`](Self::render_to_file) with an external cancellation signal.
    pub async fn render_to_file_with_cancel(
        &self,
        request: &RenderRequest,
        output_path: impl AsRef<Path>,
        cancel: &CancellationToken,
    ) -> Result<usize, RenderError> {
        let pdf = self.render_with_cancel(request, cancel).await?;
        let path = output_path.as_ref().to_path_buf();
        let len = pdf.len();

        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&target, &pdf))
            .await
            .map_err(|e| RenderError::OutputWriteFailed {
                path: path.clone(),
                source: std::io::Error::other(e),
            })?
            .map_err(|source| RenderError::OutputWriteFailed {
                path: path.clone(),
                source,
            })?;

        debug!("Wrote {} bytes to {}", len, path.display());
        Ok(len)
    }

    /// [`render`](Self::render) with an external cancellation signal.
    ///
    /// # Errors
    /// - [`RenderError::InvalidInput`] for an empty or unresolvable URL or a
    ///   zero-sized viewport.
    /// - [`RenderError::NavigationTimeout`] / [`RenderError::ReadinessTimeout`]
    ///   when the page does not load or signal readiness in time.
    /// - [`RenderError::EngineFault`] for any engine failure, including launch.
    /// - [`RenderError::Cancelled`] when `cancel` fires first.
    ///
    /// The per-request context is closed before this returns in every case.
    pub async fn render_with_cancel(
        &self,
        request: &RenderRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, RenderError> {
        let url = resolve_target(&request.target_url, self.config.base_url.as_deref())?;
        let viewport = request.effective_viewport(&self.config)?;
        let start = Instant::now();
        info!("Rendering {} at {}x{}", url, viewport.width, viewport.height);

        let engine = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RenderError::Cancelled { url }),
            r = self.pool.acquire() => r.map_err(|e| engine_fault(&url, e))?,
        };

        // Not raced against cancellation: a dropped open leaks its context.
        let context = engine
            .new_context(viewport)
            .await
            .map_err(|e| engine_fault(&url, e))?;
        let guard = ContextGuard::new(context);

        let outcome = if cancel.is_cancelled() {
            Err(RenderError::Cancelled { url: url.clone() })
        } else {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(RenderError::Cancelled { url: url.clone() }),
                r = self.capture(guard.context(), &url, viewport) => r,
            }
        };

        guard.close().await;

        match &outcome {
            Ok(pdf) => info!(
                "Rendered {} ({} bytes) in {:?}",
                url,
                pdf.len(),
                start.elapsed()
            ),
            Err(e) => warn!("Render failed after {:?}: {}", start.elapsed(), e),
        }
        outcome
    }

    async fn capture(
        &self,
        ctx: &dyn RenderContext,
        url: &str,
        viewport: Viewport,
    ) -> Result<Vec<u8>, RenderError> {
        let nav_secs = self.config.navigation_timeout_secs;
        match timeout(Duration::from_secs(nav_secs), ctx.navigate(url)).await {
            Ok(r) => r.map_err(|e| engine_fault(url, e))?,
            Err(_) => {
                return Err(RenderError::NavigationTimeout {
                    url: url.to_string(),
                    secs: nav_secs,
                })
            }
        }
        debug!("Navigation to {} reached network idle", url);

        let ready_secs = self.config.readiness_timeout_secs;
        match timeout(Duration::from_secs(ready_secs), self.wait_ready(ctx)).await {
            Ok(r) => r.map_err(|e| engine_fault(url, e))?,
            Err(_) => {
                return Err(RenderError::ReadinessTimeout {
                    url: url.to_string(),
                    secs: ready_secs,
                })
            }
        }
        debug!("Readiness marker present on {}", url);

        sleep(Duration::from_millis(self.config.settle_delay_ms)).await;

        let measured = ctx
            .content_height()
            .await
            .map_err(|e| engine_fault(url, e))?;
        let height_px = if measured == 0 {
            warn!(
                "Measured content height of {} is 0, using viewport height {}",
                url, viewport.height
            );
            viewport.height
        } else {
            measured
        };
        debug!("Content of {} is {}px tall", url, height_px);

        let layout = PdfLayout {
            width_px: viewport.width,
            height_px,
            margin_cm: self.config.margin_cm,
            print_background: true,
        };
        ctx.print_pdf(layout)
            .await
            .map_err(|e| engine_fault(url, e))
    }

    async fn wait_ready(&self, ctx: &dyn RenderContext) -> Result<(), EngineError> {
        let selector = self.config.readiness_selector.as_str();
        let poll = Duration::from_millis(self.config.readiness_poll_ms);
        loop {
            if ctx.matches(selector).await? {
                return Ok(());
            }
            sleep(poll).await;
        }
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn engine_fault(url: &str, e: EngineError) -> RenderError {
    RenderError::EngineFault {
        url: url.to_string(),
        detail: e.to_string(),
    }
}

// ── Context guard ────────────────────────────────────────────────────────

/// Owns a [`RenderContext`] for the duration of one render.
///
/// [`close`](Self::close) is the normal path. If the guard is dropped while
/// still holding a context (the render future was dropped), closing is
/// spawned onto the current runtime instead.
pub struct ContextGuard {
    context: Option<Box<dyn RenderContext>>,
}

impl ContextGuard {
    pub fn new(context: Box<dyn RenderContext>) -> Self {
        Self {
            context: Some(context),
        }
    }

    pub fn context(&self) -> &dyn RenderContext {
        match self.context.as_deref() {
            Some(context) => context,
            None => unreachable!("context is only taken by close() or drop"),
        }
    }

    /// Close the context now. Errors are logged, never returned: the render
    /// outcome is already decided.
    pub async fn close(mut self) {
        if let Some(context) = self.context.take() {
            if let Err(e) = context.close().await {
                warn!("Failed to close rendering context: {}", e);
            }
        }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let Some(context) = self.context.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = context.close().await {
                        warn!("Failed to close rendering context on drop: {}", e);
                    }
                });
            }
            Err(_) => warn!("No runtime available; rendering context leaked until engine shutdown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LaunchOptions;
    use crate::render::engine::{EngineLauncher, RenderEngine};
    use crate::render::SharedEngineHandle;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct StaticContext {
        closed: Arc<AtomicBool>,
        checks: Arc<AtomicUsize>,
        ready_after: usize,
    }

    #[async_trait]
    impl RenderContext for StaticContext {
        async fn navigate(&self, _url: &str) -> Result<(), EngineError> {
            Ok(())
        }

        async fn matches(&self, _selector: &str) -> Result<bool, EngineError> {
            let n = self.checks.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(n >= self.ready_after)
        }

        async fn content_height(&self) -> Result<u32, EngineError> {
            Ok(0)
        }

        async fn print_pdf(&self, layout: PdfLayout) -> Result<Vec<u8>, EngineError> {
            Ok(format!("%PDF {}x{}", layout.width_px, layout.height_px).into_bytes())
        }

        async fn close(self: Box<Self>) -> Result<(), EngineError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct StaticEngine {
        closed: Arc<AtomicBool>,
        checks: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RenderEngine for StaticEngine {
        async fn new_context(
            &self,
            _viewport: Viewport,
        ) -> Result<Box<dyn RenderContext>, EngineError> {
            Ok(Box::new(StaticContext {
                closed: Arc::clone(&self.closed),
                checks: Arc::clone(&self.checks),
                ready_after: 3,
            }))
        }

        async fn close(&self) -> Result<(), EngineError> {
            Ok(())
        }
    }

    struct StaticLauncher {
        closed: Arc<AtomicBool>,
        checks: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EngineLauncher for StaticLauncher {
        async fn launch(&self, _: &LaunchOptions) -> Result<SharedEngineHandle, EngineError> {
            Ok(Arc::new(StaticEngine {
                closed: Arc::clone(&self.closed),
                checks: Arc::clone(&self.checks),
            }))
        }
    }

    fn renderer() -> (PageRenderer, Arc<AtomicBool>, Arc<AtomicUsize>) {
        let closed = Arc::new(AtomicBool::new(false));
        let checks = Arc::new(AtomicUsize::new(0));
        let launcher = Arc::new(StaticLauncher {
            closed: Arc::clone(&closed),
            checks: Arc::clone(&checks),
        });
        let pool = Arc::new(RenderResourcePool::new(launcher, LaunchOptions::default()));
        let config = RenderConfig::builder()
            .base_url("http://localhost:5173")
            .build()
            .unwrap();
        (PageRenderer::new(pool, config), closed, checks)
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_ready_and_falls_back_to_viewport_height() {
        let (r, closed, checks) = renderer();
        let pdf = r
            .render(&RenderRequest::new("/meetings/7/print").viewport(800, 600))
            .await
            .unwrap();
        assert_eq!(pdf, b"%PDF 800x600");
        assert_eq!(checks.load(Ordering::SeqCst), 3);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn render_to_file_writes_into_new_directory() {
        let (r, _, _) = renderer();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("meeting.pdf");
        let written = r
            .render_to_file(&RenderRequest::new("/m/1").viewport(640, 480), &out)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"%PDF 640x480");
        assert_eq!(written, 12);
    }

    #[tokio::test]
    async fn empty_url_never_touches_the_pool() {
        let (r, _, _) = renderer();
        let err = r.render(&RenderRequest::new("")).await.unwrap_err();
        assert!(matches!(err, RenderError::InvalidInput { .. }));
        assert!(!r.pool().is_initialized());
    }

    #[tokio::test]
    async fn zero_width_is_invalid() {
        let (r, _, _) = renderer();
        let err = r
            .render(&RenderRequest::new("/x").width(0))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn disposed_pool_is_an_engine_fault() {
        let (r, _, _) = renderer();
        r.pool().dispose().await;
        let err = r.render(&RenderRequest::new("/x")).await.unwrap_err();
        match err {
            RenderError::EngineFault { url, detail } => {
                assert_eq!(url, "http://localhost:5173/x");
                assert!(detail.contains("disposed"), "got: {detail}");
            }
            other => panic!("expected EngineFault, got {other:?}"),
        }
    }
}
