//! Lazily-launched, process-wide browser engine.
//!
//! ## Lifecycle
//!
//! ```text
//! Empty ──acquire (one launch in flight)──▶ Ready ──dispose──▶ Disposed
//!   ▲                 │
//!   └── launch failed ┘   (every waiter gets the error; nothing is cached)
//! ```
//!
//! ## Init gate
//!
//! Check, lock, check: the published engine lives in a `OnceLock`, so once
//! it is set `acquire` is a single atomic read. Before that, callers take a
//! short synchronous lock only to find or start the in-flight launch. The
//! launch runs as its own task and publishes the engine itself, so it
//! finishes even when every caller waiting on it has gone away; callers
//! await a `Shared` handle to its outcome. The lock is never held across an
//! `.await`.

use crate::config::LaunchOptions;
use crate::error::EngineError;
use crate::render::chromium::ChromiumLauncher;
use crate::render::engine::{EngineLauncher, RenderEngine};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// The engine every renderer shares. Renderers open contexts on it; only
/// the pool closes it.
pub type SharedEngineHandle = Arc<dyn RenderEngine>;

type LaunchFuture = Shared<BoxFuture<'static, Result<SharedEngineHandle, EngineError>>>;

/// State shared between the pool and its launch task.
struct PoolState {
    engine: OnceLock<SharedEngineHandle>,
    inflight: Mutex<Option<LaunchFuture>>,
    disposed: AtomicBool,
    engine_closed: AtomicBool,
}

impl PoolState {
    /// Publish a launched engine. If the pool was disposed meanwhile, the
    /// engine is closed instead of being handed out.
    async fn publish(&self, engine: &SharedEngineHandle) {
        {
            let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = self.engine.set(Arc::clone(engine));
            *inflight = None;
        }
        if self.disposed.load(Ordering::SeqCst) {
            debug!("Browser engine launched after dispose; closing it");
            self.close_engine_once(engine).await;
        }
    }

    fn clear_inflight(&self) {
        *self.inflight.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    async fn close_engine_once(&self, engine: &SharedEngineHandle) {
        if self.engine_closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = engine.close().await {
            warn!("Error while closing browser engine: {}", e);
        }
    }
}

/// Owns the single shared engine.
pub struct RenderResourcePool {
    launcher: Arc<dyn EngineLauncher>,
    options: LaunchOptions,
    state: Arc<PoolState>,
    launch_attempts: AtomicUsize,
}

impl RenderResourcePool {
    pub fn new(launcher: Arc<dyn EngineLauncher>, options: LaunchOptions) -> Self {
        Self {
            launcher,
            options,
            state: Arc::new(PoolState {
                engine: OnceLock::new(),
                inflight: Mutex::new(None),
                disposed: AtomicBool::new(false),
                engine_closed: AtomicBool::new(false),
            }),
            launch_attempts: AtomicUsize::new(0),
        }
    }

    /// Pool over a local Chrome/Chromium.
    pub fn chromium(options: LaunchOptions) -> Self {
        Self::new(Arc::new(ChromiumLauncher), options)
    }

    /// Return the shared engine, launching it on first use.
    ///
    /// Must be called from within a tokio runtime: the launch runs as a
    /// spawned task, so dropping this future does not abandon it.
    ///
    /// # Errors
    /// - [`EngineError::Disposed`] after [`dispose`](Self::dispose).
    /// - [`EngineError::LaunchTimeout`] / [`EngineError::LaunchFailed`] when
    ///   the launch this call waited on failed. Every caller waiting on that
    ///   launch receives the same error; the next call starts a new one.
    pub async fn acquire(&self) -> Result<SharedEngineHandle, EngineError> {
        if self.state.disposed.load(Ordering::SeqCst) {
            return Err(EngineError::Disposed);
        }

        let engine = match self.state.engine.get() {
            Some(engine) => Arc::clone(engine),
            None => self.wait_for_launch().await?,
        };

        // Lost a race with dispose(): the engine may have been published
        // after dispose looked for it.
        if self.state.disposed.load(Ordering::SeqCst) {
            self.state.close_engine_once(&engine).await;
            return Err(EngineError::Disposed);
        }

        Ok(engine)
    }

    /// Close the engine. Safe to call more than once.
    ///
    /// A launch still in flight keeps running; its engine is closed as soon
    /// as it is published.
    pub async fn dispose(&self) {
        if self.state.disposed.swap(true, Ordering::SeqCst) {
            debug!("Browser pool already disposed");
            return;
        }
        match self.state.engine.get() {
            Some(engine) => {
                info!("Disposing browser pool");
                self.state.close_engine_once(engine).await;
            }
            None => debug!("Browser pool disposed with no engine running"),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state.engine.get().is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.state.disposed.load(Ordering::SeqCst)
    }

    /// Number of launch sequences started so far (successful or not).
    pub fn launch_attempts(&self) -> usize {
        self.launch_attempts.load(Ordering::SeqCst)
    }

    pub fn options(&self) -> &LaunchOptions {
        &self.options
    }

    async fn wait_for_launch(&self) -> Result<SharedEngineHandle, EngineError> {
        let launch = {
            let mut inflight = self
                .state
                .inflight
                .lock()
                .map_err(|_| EngineError::LaunchFailed("pool lock poisoned".into()))?;
            if let Some(engine) = self.state.engine.get() {
                return Ok(Arc::clone(engine));
            }
            match inflight.as_ref() {
                Some(launch) => {
                    debug!("Waiting for in-flight browser launch");
                    launch.clone()
                }
                None => {
                    let launch = self.start_launch();
                    *inflight = Some(launch.clone());
                    launch
                }
            }
        };
        launch.await
    }

    /// Spawn a launch task. Called with the in-flight lock held; the task
    /// takes the same lock to publish, so it cannot clear the slot before
    /// the caller has filled it.
    fn start_launch(&self) -> LaunchFuture {
        let attempt = self.launch_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let launcher = Arc::clone(&self.launcher);
        let options = self.options.clone();
        let state = Arc::clone(&self.state);

        let task = tokio::spawn(async move {
            let secs = options.launch_timeout_secs;
            let start = Instant::now();
            info!("Launching browser engine (attempt {})", attempt);

            let outcome = match timeout(Duration::from_secs(secs), launcher.launch(&options)).await
            {
                Ok(Ok(engine)) => {
                    info!("Browser engine ready in {:?}", start.elapsed());
                    Ok(engine)
                }
                Ok(Err(e)) => {
                    warn!("Browser engine launch failed: {}", e);
                    Err(e)
                }
                Err(_) => {
                    warn!("Browser engine launch timed out after {}s", secs);
                    Err(EngineError::LaunchTimeout { secs })
                }
            };

            match outcome {
                Ok(ref engine) => state.publish(engine).await,
                Err(_) => state.clear_inflight(),
            }
            outcome
        });

        async move {
            task.await.unwrap_or_else(|e| {
                Err(EngineError::LaunchFailed(format!("launch task failed: {e}")))
            })
        }
        .boxed()
        .shared()
    }
}

impl std::fmt::Debug for RenderResourcePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderResourcePool")
            .field("options", &self.options)
            .field("initialized", &self.is_initialized())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Drop for RenderResourcePool {
    fn drop(&mut self) {
        // A launch still running sees this and closes what it starts.
        self.state.disposed.store(true, Ordering::SeqCst);
        let Some(engine) = self.state.engine.get().cloned() else {
            return;
        };
        if self.state.engine_closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Best effort on the ambient runtime; the chromium handle also kills
        // its child process when the last reference drops.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = engine.close().await {
                    warn!("Error while closing browser engine on drop: {}", e);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::engine::RenderContext;
    use crate::render::Viewport;
    use async_trait::async_trait;

    struct NullEngine {
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RenderEngine for NullEngine {
        async fn new_context(
            &self,
            _viewport: Viewport,
        ) -> Result<Box<dyn RenderContext>, EngineError> {
            Err(EngineError::Protocol("no contexts".into()))
        }

        async fn close(&self) -> Result<(), EngineError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct NullLauncher {
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EngineLauncher for NullLauncher {
        async fn launch(&self, _: &LaunchOptions) -> Result<SharedEngineHandle, EngineError> {
            Ok(Arc::new(NullEngine {
                closes: Arc::clone(&self.closes),
            }))
        }
    }

    struct HangingLauncher;

    #[async_trait]
    impl EngineLauncher for HangingLauncher {
        async fn launch(&self, _: &LaunchOptions) -> Result<SharedEngineHandle, EngineError> {
            std::future::pending().await
        }
    }

    /// Starts up in two steps, like a real browser: spawn, then connect.
    struct SteppedLauncher {
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EngineLauncher for SteppedLauncher {
        async fn launch(&self, _: &LaunchOptions) -> Result<SharedEngineHandle, EngineError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(Arc::new(NullEngine {
                closes: Arc::clone(&self.closes),
            }))
        }
    }

    fn null_pool() -> (RenderResourcePool, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let launcher = Arc::new(NullLauncher {
            closes: Arc::clone(&closes),
        });
        (RenderResourcePool::new(launcher, LaunchOptions::default()), closes)
    }

    #[tokio::test]
    async fn acquire_is_lazy_and_reuses() {
        let (pool, _) = null_pool();
        assert!(!pool.is_initialized());
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(pool.launch_attempts(), 1);
    }

    #[tokio::test]
    async fn dispose_is_idempotent() {
        let (pool, closes) = null_pool();
        pool.acquire().await.unwrap();
        pool.dispose().await;
        pool.dispose().await;
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(matches!(pool.acquire().await, Err(EngineError::Disposed)));
    }

    #[tokio::test]
    async fn dispose_without_launch_closes_nothing() {
        let (pool, closes) = null_pool();
        pool.dispose().await;
        assert_eq!(closes.load(Ordering::SeqCst), 0);
        assert_eq!(pool.launch_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn launch_is_bounded() {
        let options = LaunchOptions {
            launch_timeout_secs: 5,
            ..Default::default()
        };
        let pool = RenderResourcePool::new(Arc::new(HangingLauncher), options);
        let err = pool.acquire().await.err().expect("acquire should fail");
        assert!(matches!(err, EngineError::LaunchTimeout { secs: 5 }));
        assert!(!pool.is_initialized());
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_launch_still_completes() {
        let closes = Arc::new(AtomicUsize::new(0));
        let launcher = Arc::new(SteppedLauncher {
            closes: Arc::clone(&closes),
        });
        let options = LaunchOptions {
            launch_timeout_secs: 30,
            ..Default::default()
        };
        let pool = RenderResourcePool::new(launcher, options);

        // The only waiter gives up shortly after starting the launch.
        let gave_up = timeout(Duration::from_millis(100), pool.acquire()).await;
        assert!(gave_up.is_err());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(pool.is_initialized());

        assert!(pool.acquire().await.is_ok());
        assert_eq!(pool.launch_attempts(), 1);
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }
}
