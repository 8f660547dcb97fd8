//! Session manager: owns the session registry and drives each session from
//! start to its aggregated result.
//!
//! # Architecture
//!
//! ```text
//! create_and_start
//!     │  validate, register session, open bus channel
//!     └─► supervisor task (one per session)
//!             ├─► site task ─► SiteWorker stream ─► progress slot + bus
//!             ├─► site task ─► ...
//!             └─► all joined ─► ResultAggregator ─► status + `complete`
//! ```
//!
//! Each site's progress slot has exactly one writer, its site task. The
//! supervisor only touches a slot after that task has ended abnormally.
//! Session status is changed under the session's state lock and only
//! through [`SessionStatus::can_transition_to`].

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::aggregator::ResultAggregator;
use crate::bus::{ProgressBus, ProgressSubscription};
use crate::error::{ConfigError, EngineError, Result};
use crate::extractors::ExtractorRegistry;
use crate::types::{
    config::{EngineConfig, SiteConfig},
    message::StreamMessage,
    progress::{ProgressRecord, ProgressStatus},
    result::{ScrapeResult, SessionResult, SessionStatus},
    site::{SiteId, SiteInfo},
};
use crate::worker::{SiteWorker, WorkerEvent};

/// Point-in-time view of a session, as returned by [`SessionManager::status`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub configs: Vec<SiteConfig>,
    /// One record per configured site, in configuration order
    pub progress: Vec<ProgressRecord>,
    /// Present once the session is terminal
    pub result: Option<Arc<SessionResult>>,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub stop_requested: bool,
}

/// Registry listing entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub site_count: usize,
    pub total_items: Option<usize>,
}

#[derive(Debug)]
struct SessionState {
    status: SessionStatus,
    stop_requested: bool,
    ended_at: Option<DateTime<Utc>>,
    ended_instant: Option<Instant>,
}

struct Session {
    id: Uuid,
    configs: Vec<SiteConfig>,
    created_at: DateTime<Utc>,
    cancel: CancellationToken,
    /// Written only by the site's own task
    progress: Vec<watch::Sender<ProgressRecord>>,
    state: Mutex<SessionState>,
    result: OnceLock<Arc<SessionResult>>,
    finished: watch::Sender<bool>,
}

impl Session {
    fn new(id: Uuid, configs: Vec<SiteConfig>) -> Self {
        let progress = configs
            .iter()
            .map(|c| watch::Sender::new(ProgressRecord::pending(id, c.site, c.max_pages)))
            .collect();

        Self {
            id,
            configs,
            created_at: Utc::now(),
            cancel: CancellationToken::new(),
            progress,
            state: Mutex::new(SessionState {
                status: SessionStatus::Running,
                stop_requested: false,
                ended_at: None,
                ended_instant: None,
            }),
            result: OnceLock::new(),
            finished: watch::Sender::new(false),
        }
    }

    /// Whether any site ended because of cancellation rather than running
    /// to completion or failing.
    fn any_site_cancelled(&self) -> bool {
        self.progress
            .iter()
            .any(|slot| slot.borrow().status == ProgressStatus::Cancelled)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> SessionSnapshot {
        let state = self.state();
        SessionSnapshot {
            session_id: self.id,
            status: state.status,
            configs: self.configs.clone(),
            progress: self.progress.iter().map(|slot| slot.borrow().clone()).collect(),
            result: self.result.get().cloned(),
            created_at: self.created_at,
            ended_at: state.ended_at,
            stop_requested: state.stop_requested,
        }
    }

    fn summary(&self) -> SessionSummary {
        let state = self.state();
        SessionSummary {
            session_id: self.id,
            status: state.status,
            created_at: self.created_at,
            ended_at: state.ended_at,
            site_count: self.configs.len(),
            total_items: self.result.get().map(|r| r.total_items),
        }
    }
}

struct ManagerInner {
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
    extractors: ExtractorRegistry,
    bus: ProgressBus,
    aggregator: ResultAggregator,
    config: EngineConfig,
}

/// Owns sessions and their workers. Cheap to clone; clones share state.
///
/// Operations never wait on worker progress. Starting a session must happen
/// inside a Tokio runtime because the workers are spawned onto it.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<ManagerInner>,
}

impl SessionManager {
    /// Create a manager with default engine settings.
    pub fn new(extractors: ExtractorRegistry) -> Self {
        Self::with_config(extractors, EngineConfig::default())
    }

    pub fn with_config(extractors: ExtractorRegistry, config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                sessions: RwLock::new(HashMap::new()),
                bus: ProgressBus::with_capacity(config.bus_capacity),
                extractors,
                aggregator: ResultAggregator::new(),
                config,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn bus(&self) -> &ProgressBus {
        &self.inner.bus
    }

    /// Site catalogue with availability flags.
    pub fn sites(&self) -> Vec<SiteInfo> {
        self.inner.extractors.sites()
    }

    /// Validate `configs`, register a running session and spawn one worker
    /// per site.
    ///
    /// Validation failures are returned before anything is registered or
    /// spawned.
    pub fn create_and_start(&self, configs: Vec<SiteConfig>) -> Result<Uuid> {
        self.validate(&configs)?;

        let id = Uuid::new_v4();
        let session = Arc::new(Session::new(id, configs));

        let mut workers = Vec::with_capacity(session.configs.len());
        for config in &session.configs {
            let extractor = self
                .inner
                .extractors
                .get(config.site)
                .ok_or(ConfigError::ExtractorMissing(config.site))?;
            workers.push(
                SiteWorker::new(id, config.clone(), extractor, session.cancel.child_token())
                    .with_engine_config(&self.inner.config),
            );
        }

        self.inner.bus.open(id);
        if let Err(err) = self.register(session.clone()) {
            self.inner.bus.close(id);
            return Err(err.into());
        }

        info!(
            session_id = %id,
            sites = %session
                .configs
                .iter()
                .map(|c| c.site.as_str())
                .collect::<Vec<_>>()
                .join(","),
            "session started"
        );

        tokio::spawn(supervise(self.inner.clone(), session, workers));
        Ok(id)
    }

    /// Request cancellation of every worker in the session.
    ///
    /// Idempotent; a no-op for a session that already finished.
    pub fn stop(&self, session_id: Uuid) -> Result<()> {
        let session = self.get(session_id)?;
        let mut state = session.state();

        if state.status.is_terminal() {
            debug!(session_id = %session_id, status = ?state.status, "stop ignored, session finished");
            return Ok(());
        }
        if !state.stop_requested {
            state.stop_requested = true;
            session.cancel.cancel();
            info!(session_id = %session_id, "session stop requested");
        }
        Ok(())
    }

    /// Latest progress for every site, plus the result once terminal.
    pub fn status(&self, session_id: Uuid) -> Result<SessionSnapshot> {
        Ok(self.get(session_id)?.snapshot())
    }

    /// The aggregated result, or `None` while the session is running.
    pub fn result(&self, session_id: Uuid) -> Result<Option<Arc<SessionResult>>> {
        Ok(self.get(session_id)?.result.get().cloned())
    }

    /// Subscribe to live progress. Late joiners should call
    /// [`status`](Self::status) for a snapshot; nothing is replayed.
    pub fn subscribe(&self, session_id: Uuid) -> Result<ProgressSubscription> {
        self.get(session_id)?;
        Ok(self.inner.bus.subscribe(session_id))
    }

    /// Wait until the session has been aggregated.
    pub async fn wait(&self, session_id: Uuid) -> Result<Arc<SessionResult>> {
        let session = self.get(session_id)?;
        let mut finished = session.finished.subscribe();
        // The sender lives in `session`, so this only errs if it was dropped
        let _ = finished.wait_for(|done| *done).await;
        session
            .result
            .get()
            .cloned()
            .ok_or(EngineError::SessionNotFound { id: session_id })
    }

    /// Drop a session from the registry, stopping it first if still running.
    pub fn remove(&self, session_id: Uuid) -> Result<()> {
        let session = self
            .inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session_id)
            .ok_or(EngineError::SessionNotFound { id: session_id })?;

        session.cancel.cancel();
        self.inner.bus.close(session_id);
        info!(session_id = %session_id, "session removed");
        Ok(())
    }

    /// Evict terminal sessions that ended more than `session_ttl` ago.
    /// Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let mut sessions = self
            .inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        evict_from(&mut sessions, self.inner.config.session_ttl)
    }

    /// Summaries of all registered sessions, oldest first.
    pub fn sessions(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|s| s.summary())
            .collect();
        summaries.sort_by_key(|s| s.created_at);
        summaries
    }

    fn get(&self, session_id: Uuid) -> Result<Arc<Session>> {
        self.inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&session_id)
            .cloned()
            .ok_or(EngineError::SessionNotFound { id: session_id })
    }

    fn validate(&self, configs: &[SiteConfig]) -> std::result::Result<(), ConfigError> {
        if configs.is_empty() {
            return Err(ConfigError::EmptyRequest);
        }

        let mut seen = HashSet::new();
        for config in configs {
            config.validate()?;
            if !seen.insert(config.site) {
                return Err(ConfigError::DuplicateSite(config.site));
            }
            if !self.inner.extractors.contains(config.site) {
                return Err(ConfigError::ExtractorMissing(config.site));
            }
        }
        Ok(())
    }

    /// Insert a new session, enforcing `max_sessions` under the same write
    /// guard as the insert.
    fn register(&self, session: Arc<Session>) -> std::result::Result<(), ConfigError> {
        let limit = self.inner.config.max_sessions;
        let mut sessions = self
            .inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if limit > 0 && sessions.len() >= limit {
            evict_from(&mut sessions, self.inner.config.session_ttl);
            if sessions.len() >= limit {
                return Err(ConfigError::TooManySessions { limit });
            }
        }
        sessions.insert(session.id, session);
        Ok(())
    }

    fn len(&self) -> usize {
        self.inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.len())
            .field("extractors", &self.inner.extractors)
            .finish()
    }
}

fn evict_from(sessions: &mut HashMap<Uuid, Arc<Session>>, ttl: std::time::Duration) -> usize {
    let before = sessions.len();
    sessions.retain(|id, session| {
        let expired = session
            .state()
            .ended_instant
            .is_some_and(|ended| ended.elapsed() >= ttl);
        if expired {
            debug!(session_id = %id, "evicting expired session");
        }
        !expired
    });
    before - sessions.len()
}

/// Run every site task of a session and aggregate once all have ended.
async fn supervise(inner: Arc<ManagerInner>, session: Arc<Session>, workers: Vec<SiteWorker>) {
    let site_count = workers.len();
    let mut tasks = JoinSet::new();

    for (index, worker) in workers.into_iter().enumerate() {
        tasks.spawn(drive_worker(
            session.clone(),
            index,
            worker,
            inner.bus.clone(),
        ));
    }

    let mut results: Vec<Option<ScrapeResult>> = vec![None; site_count];
    let mut terminal = 0usize;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => results[index] = Some(result),
            Err(err) => {
                error!(session_id = %session.id, error = %err, "site task aborted");
            }
        }
        terminal += 1;
        debug!(session_id = %session.id, terminal, site_count, "site task finished");
    }

    // Slots still empty belong to tasks that panicked; their writer is gone
    let results: Vec<ScrapeResult> = results
        .into_iter()
        .enumerate()
        .map(|(index, slot)| slot.unwrap_or_else(|| abandoned_site(&inner, &session, index)))
        .collect();

    finalize(&inner, &session, results);
}

/// Forward one worker's events into its progress slot and the bus.
async fn drive_worker(
    session: Arc<Session>,
    index: usize,
    worker: SiteWorker,
    bus: ProgressBus,
) -> (usize, ScrapeResult) {
    let site = worker.config().site;
    let events = worker.run();
    futures::pin_mut!(events);

    while let Some(event) = events.next().await {
        match event {
            WorkerEvent::Progress(record) => {
                session.progress[index].send_replace(record.clone());
                bus.publish(session.id, record);
            }
            WorkerEvent::Finished(result) => return (index, result),
        }
    }

    warn!(session_id = %session.id, site = %site, "worker stream ended without a result");
    (index, failed_result(site, "worker ended without a result"))
}

fn abandoned_site(inner: &ManagerInner, session: &Session, index: usize) -> ScrapeResult {
    let site = session.configs[index].site;
    let text = "site worker terminated unexpectedly";

    let mut record = session.progress[index].borrow().clone();
    record.status = ProgressStatus::Error;
    record.error = Some(text.to_string());
    session.progress[index].send_replace(record.clone());

    inner.bus.publish(session.id, record);
    inner
        .bus
        .publish_message(session.id, StreamMessage::error(format!("{}: {}", site, text)));

    failed_result(site, text)
}

fn failed_result(site: SiteId, error: &str) -> ScrapeResult {
    ScrapeResult {
        site,
        jobs: Vec::new(),
        total_items: 0,
        duration: std::time::Duration::ZERO,
        timestamp: Utc::now(),
        success: false,
        error: Some(error.to_string()),
        attempts: 0,
        retries: 0,
    }
}

fn finalize(inner: &ManagerInner, session: &Session, results: Vec<ScrapeResult>) {
    {
        let mut state = session.state();
        // A stop that lands after every site already finished changes nothing
        let cancelled = session.any_site_cancelled();
        let aggregated = inner.aggregator.aggregate(session.id, results, cancelled);
        let next = aggregated.status;

        if !state.status.can_transition_to(next) {
            warn!(session_id = %session.id, from = ?state.status, to = ?next, "rejected status transition");
            return;
        }
        if session.result.set(Arc::new(aggregated)).is_err() {
            warn!(session_id = %session.id, "session result already computed");
            return;
        }

        state.status = next;
        state.ended_at = Some(Utc::now());
        state.ended_instant = Some(Instant::now());
    }

    inner.bus.complete(session.id);
    session.finished.send_replace(true);
    info!(session_id = %session.id, "session finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockExtractor;
    use std::time::Duration;

    fn manager_with(site: SiteId, extractor: MockExtractor) -> SessionManager {
        SessionManager::new(ExtractorRegistry::new().with_extractor(site, extractor))
    }

    #[tokio::test]
    async fn test_rejects_invalid_configs_before_spawning() {
        let extractor = MockExtractor::new().with_pages(&[1]);
        let handle = extractor.clone();
        let manager = manager_with(SiteId::Indeed, extractor);

        let cases = vec![
            (vec![], ConfigError::EmptyRequest),
            (
                vec![SiteConfig::new(SiteId::Indeed, "", "Tokyo", 1)],
                ConfigError::EmptyKeyword { site: SiteId::Indeed },
            ),
            (
                vec![SiteConfig::new(SiteId::Yahoo, "dev", "Tokyo", 1)],
                ConfigError::ExtractorMissing(SiteId::Yahoo),
            ),
            (
                vec![
                    SiteConfig::new(SiteId::Indeed, "dev", "Tokyo", 1),
                    SiteConfig::new(SiteId::Indeed, "ops", "Tokyo", 1),
                ],
                ConfigError::DuplicateSite(SiteId::Indeed),
            ),
        ];

        for (configs, expected) in cases {
            match manager.create_and_start(configs) {
                Err(EngineError::Config(err)) => assert_eq!(err, expected),
                other => panic!("expected config error, got {:?}", other),
            }
        }

        assert!(manager.sessions().is_empty());
        assert_eq!(handle.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let manager = SessionManager::new(ExtractorRegistry::new());
        let id = Uuid::new_v4();
        assert!(matches!(manager.stop(id), Err(EngineError::SessionNotFound { .. })));
        assert!(matches!(manager.status(id), Err(EngineError::SessionNotFound { .. })));
        assert!(matches!(manager.subscribe(id), Err(EngineError::SessionNotFound { .. })));
    }

    #[tokio::test]
    async fn test_status_has_one_record_per_site_immediately() {
        let slow = MockExtractor::new()
            .with_pages(&[1])
            .with_delay(Duration::from_millis(200));
        let registry = ExtractorRegistry::new()
            .with_extractor(SiteId::Indeed, slow.clone())
            .with_extractor(SiteId::Yahoo, slow);
        let manager = SessionManager::new(registry);

        let id = manager
            .create_and_start(vec![
                SiteConfig::new(SiteId::Indeed, "dev", "", 1),
                SiteConfig::new(SiteId::Yahoo, "dev", "", 1),
            ])
            .unwrap();

        let snapshot = manager.status(id).unwrap();
        assert_eq!(snapshot.status, SessionStatus::Running);
        assert_eq!(snapshot.progress.len(), 2);
        assert_eq!(snapshot.progress[0].site, SiteId::Indeed);
        assert_eq!(snapshot.progress[1].site, SiteId::Yahoo);
        assert!(snapshot.result.is_none());

        manager.wait(id).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_after_completion_is_noop() {
        let manager = manager_with(SiteId::Indeed, MockExtractor::new().with_pages(&[2]));
        let id = manager
            .create_and_start(vec![SiteConfig::new(SiteId::Indeed, "dev", "", 1)])
            .unwrap();

        manager.wait(id).await.unwrap();
        manager.stop(id).unwrap();
        manager.stop(id).unwrap();

        let snapshot = manager.status(id).unwrap();
        assert_eq!(snapshot.status, SessionStatus::Completed);
        assert!(!snapshot.stop_requested);
    }

    #[tokio::test]
    async fn test_evict_expired_and_remove() {
        let config = EngineConfig::default().with_session_ttl(Duration::ZERO);
        let registry = ExtractorRegistry::new()
            .with_extractor(SiteId::Indeed, MockExtractor::new().with_pages(&[1]));
        let manager = SessionManager::with_config(registry, config);

        let done = manager
            .create_and_start(vec![SiteConfig::new(SiteId::Indeed, "dev", "", 1)])
            .unwrap();
        manager.wait(done).await.unwrap();

        assert_eq!(manager.evict_expired(), 1);
        assert!(matches!(manager.status(done), Err(EngineError::SessionNotFound { .. })));
        assert!(matches!(manager.remove(done), Err(EngineError::SessionNotFound { .. })));
    }

    fn finished_site(site: SiteId) -> ScrapeResult {
        ScrapeResult {
            success: true,
            error: None,
            ..failed_result(site, "")
        }
    }

    #[tokio::test]
    async fn test_late_stop_after_all_sites_finished_is_completed() {
        let manager = SessionManager::new(ExtractorRegistry::new());
        let session = Session::new(
            Uuid::new_v4(),
            vec![SiteConfig::new(SiteId::Indeed, "dev", "", 1)],
        );
        session.progress[0].send_modify(|r| r.status = ProgressStatus::Completed);
        session.state().stop_requested = true;

        finalize(&manager.inner, &session, vec![finished_site(SiteId::Indeed)]);

        assert_eq!(session.state().status, SessionStatus::Completed);
        assert!(session.result.get().unwrap().success);
    }

    #[tokio::test]
    async fn test_cancelled_site_makes_session_cancelled() {
        let manager = SessionManager::new(ExtractorRegistry::new());
        let session = Session::new(
            Uuid::new_v4(),
            vec![
                SiteConfig::new(SiteId::Indeed, "dev", "", 1),
                SiteConfig::new(SiteId::Yahoo, "dev", "", 1),
            ],
        );
        session.progress[0].send_modify(|r| r.status = ProgressStatus::Completed);
        session.progress[1].send_modify(|r| r.status = ProgressStatus::Cancelled);

        finalize(
            &manager.inner,
            &session,
            vec![finished_site(SiteId::Indeed), failed_result(SiteId::Yahoo, "cancelled")],
        );

        assert_eq!(session.state().status, SessionStatus::Cancelled);
        assert!(!session.result.get().unwrap().success);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_starts_respect_max_sessions() {
        let slow = MockExtractor::new()
            .with_pages(&[1])
            .with_delay(Duration::from_secs(30));
        let registry = ExtractorRegistry::new().with_extractor(SiteId::Indeed, slow);
        let manager =
            SessionManager::with_config(registry, EngineConfig::default().with_max_sessions(2));

        let attempts: Vec<_> = (0..16)
            .map(|_| {
                let manager = manager.clone();
                tokio::task::spawn_blocking(move || {
                    manager.create_and_start(vec![SiteConfig::new(SiteId::Indeed, "dev", "", 1)])
                })
            })
            .collect();

        let mut started = 0;
        for attempt in attempts {
            if attempt.await.unwrap().is_ok() {
                started += 1;
            }
        }

        assert_eq!(started, 2);
        assert_eq!(manager.sessions().len(), 2);
    }

    #[tokio::test]
    async fn test_max_sessions_limit() {
        let slow = MockExtractor::new()
            .with_pages(&[1])
            .with_delay(Duration::from_millis(300));
        let registry = ExtractorRegistry::new().with_extractor(SiteId::Indeed, slow);
        let manager =
            SessionManager::with_config(registry, EngineConfig::default().with_max_sessions(1));

        let first = manager
            .create_and_start(vec![SiteConfig::new(SiteId::Indeed, "dev", "", 1)])
            .unwrap();
        let second = manager.create_and_start(vec![SiteConfig::new(SiteId::Indeed, "dev", "", 1)]);
        assert!(matches!(
            second,
            Err(EngineError::Config(ConfigError::TooManySessions { limit: 1 }))
        ));

        manager.remove(first).unwrap();
        assert!(manager
            .create_and_start(vec![SiteConfig::new(SiteId::Indeed, "dev", "", 1)])
            .is_ok());
    }
}
