use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use gasoline_core_types::TabId;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::QueriesCfg;
use crate::errors::{QueryError, QueryResult};
use crate::model::{
    normalize_status, CommandStatus, NewQuery, PendingQuery, QuerySnapshot, QueryState, Transition,
};

struct Entry {
    query: PendingQuery,
    state: QueryState,
    result: Option<Value>,
    error: Option<String>,
    taken_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    done: watch::Sender<bool>,
}

impl Entry {
    fn snapshot(&self, queue_position: Option<usize>) -> QuerySnapshot {
        QuerySnapshot {
            query: self.query.clone(),
            state: self.state,
            result: self.result.clone(),
            error: self.error.clone(),
            taken_at: self.taken_at,
            finished_at: self.finished_at,
            queue_position,
        }
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    /// Queued ids in creation order.
    queue: VecDeque<String>,
    /// Terminal ids in finishing order; may hold ids already purged.
    terminal: VecDeque<String>,
    failed: VecDeque<QuerySnapshot>,
}

impl Inner {
    fn queue_position(&self, id: &str) -> Option<usize> {
        self.queue.iter().position(|q| q == id)
    }

    fn snapshot(&self, id: &str) -> Option<QuerySnapshot> {
        let entry = self.entries.get(id)?;
        let position = (entry.state == QueryState::Queued)
            .then(|| self.queue_position(id))
            .flatten();
        Some(entry.snapshot(position))
    }

    fn finish(
        &mut self,
        id: &str,
        state: QueryState,
        result: Option<Value>,
        error: Option<String>,
        failed_cap: usize,
    ) -> QueryResult<Transition> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| QueryError::NotFound(id.to_string()))?;
        if entry.state.is_terminal() {
            return Ok(Transition::AlreadyTerminal(entry.state));
        }
        let was_queued = entry.state == QueryState::Queued;
        entry.state = state;
        entry.result = result;
        entry.error = error;
        entry.finished_at = Some(Utc::now());
        entry.done.send_replace(true);
        let failed_snapshot = (state != QueryState::Completed).then(|| entry.snapshot(None));

        if was_queued {
            self.queue.retain(|q| q != id);
        }
        self.terminal.push_back(id.to_string());
        if let Some(snapshot) = failed_snapshot {
            if self.failed.len() >= failed_cap.max(1) {
                self.failed.pop_front();
            }
            self.failed.push_back(snapshot);
        }
        Ok(Transition::Applied(state))
    }

    /// Drops the oldest terminal entry still present. Returns whether one was removed.
    fn evict_oldest_terminal(&mut self) -> bool {
        while let Some(id) = self.terminal.pop_front() {
            if self.entries.remove(&id).is_some() {
                return true;
            }
        }
        false
    }

    fn in_flight_for(&self, client_id: &str) -> usize {
        self.entries
            .values()
            .filter(|e| !e.state.is_terminal() && e.query.client_id == client_id)
            .count()
    }
}

/// Correlates commands handed to the extension with the results it posts back.
pub struct QueryRegistry {
    cfg: QueriesCfg,
    next_id: AtomicU64,
    inner: Mutex<Inner>,
    queued: Notify,
}

impl QueryRegistry {
    pub fn new(cfg: QueriesCfg) -> Self {
        Self {
            cfg,
            next_id: AtomicU64::new(1),
            inner: Mutex::new(Inner::default()),
            queued: Notify::new(),
        }
    }

    pub fn config(&self) -> &QueriesCfg {
        &self.cfg
    }

    pub fn create(
        &self,
        new: NewQuery,
        timeout: Option<Duration>,
        client_id: &str,
    ) -> QueryResult<PendingQuery> {
        let timeout = self.cfg.effective_timeout(timeout);
        let created_at = Utc::now();
        let deadline = created_at
            + chrono::Duration::from_std(timeout).unwrap_or_else(|_| chrono::Duration::seconds(30));
        let correlation_id = match new.correlation_id.filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => format!("q-{}", self.next_id.fetch_add(1, Ordering::Relaxed)),
        };
        let query = PendingQuery {
            correlation_id: correlation_id.clone(),
            kind: new.kind,
            params: new.params,
            tab_id: new.tab_id,
            client_id: client_id.to_string(),
            created_at,
            deadline,
        };

        {
            let mut inner = self.inner.lock();
            if inner.entries.contains_key(&correlation_id) {
                return Err(QueryError::DuplicateId(correlation_id));
            }
            if inner.in_flight_for(client_id) >= self.cfg.per_client_limit {
                return Err(QueryError::QueueFull(format!(
                    "client '{client_id}' already has {} queries in flight",
                    self.cfg.per_client_limit
                )));
            }
            while inner.entries.len() >= self.cfg.max_entries {
                if !inner.evict_oldest_terminal() {
                    return Err(QueryError::QueueFull(format!(
                        "registry holds {} unfinished queries",
                        inner.entries.len()
                    )));
                }
            }
            let (done, _) = watch::channel(false);
            inner.entries.insert(
                correlation_id.clone(),
                Entry {
                    query: query.clone(),
                    state: QueryState::Queued,
                    result: None,
                    error: None,
                    taken_at: None,
                    finished_at: None,
                    done,
                },
            );
            inner.queue.push_back(correlation_id);
        }
        self.queued.notify_waiters();
        debug!(id = %query.correlation_id, kind = %query.kind, client = %query.client_id, "query queued");
        Ok(query)
    }

    /// Oldest queued query of `kind` for `tab_id`, marking it taken.
    pub fn take(&self, kind: &str, tab_id: TabId) -> Option<PendingQuery> {
        let now = Utc::now();
        let mut inner = self.inner.lock();
        let overdue: Vec<String> = inner
            .queue
            .iter()
            .filter(|id| inner.entries.get(*id).map_or(false, |e| e.query.deadline <= now))
            .cloned()
            .collect();
        for id in &overdue {
            let _ = inner.finish(id, QueryState::Expired, None, Some("timeout".into()), self.cfg.failed_history);
        }
        let idx = inner.queue.iter().position(|id| {
            inner
                .entries
                .get(id)
                .map_or(false, |e| e.query.kind == kind && e.query.matches_tab(tab_id))
        })?;
        let id = inner.queue.remove(idx)?;
        let entry = inner.entries.get_mut(&id)?;
        entry.state = QueryState::Taken;
        entry.taken_at = Some(now);
        Some(entry.query.clone())
    }

    /// Like [`take`](Self::take) but waits up to `timeout` for a matching query to appear.
    pub async fn wait_for_pending(&self, kind: &str, tab_id: TabId, timeout: Duration) -> Option<PendingQuery> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.queued.notified();
            if let Some(query) = self.take(kind, tab_id) {
                return Some(query);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || tokio::time::timeout(remaining, notified).await.is_err() {
                return self.take(kind, tab_id);
            }
        }
    }

    pub fn set_result(&self, id: &str, result: Value) -> QueryResult<Transition> {
        let transition = self.inner.lock().finish(
            id,
            QueryState::Completed,
            Some(result),
            None,
            self.cfg.failed_history,
        )?;
        debug!(id, ?transition, "query result recorded");
        Ok(transition)
    }

    pub fn fail(&self, id: &str, message: impl Into<String>) -> QueryResult<Transition> {
        let message = message.into();
        let transition = self.inner.lock().finish(
            id,
            QueryState::Failed,
            None,
            Some(message),
            self.cfg.failed_history,
        )?;
        debug!(id, ?transition, "query failed");
        Ok(transition)
    }

    /// Applies an extension-reported status, normalising its spelling first.
    pub fn apply_status(
        &self,
        id: &str,
        status: &str,
        result: Option<Value>,
        error: Option<String>,
    ) -> QueryResult<Transition> {
        match normalize_status(status) {
            CommandStatus::Complete => match error.filter(|e| !e.is_empty()) {
                Some(err) => self.fail(id, err),
                None => self.set_result(id, result.unwrap_or(Value::Null)),
            },
            CommandStatus::Pending => {
                let inner = self.inner.lock();
                let entry = inner
                    .entries
                    .get(id)
                    .ok_or_else(|| QueryError::NotFound(id.to_string()))?;
                Ok(if entry.state.is_terminal() {
                    Transition::AlreadyTerminal(entry.state)
                } else {
                    Transition::StillPending
                })
            }
            CommandStatus::Failed(status) => {
                let message = error.filter(|e| !e.is_empty()).unwrap_or(status);
                self.fail(id, message)
            }
        }
    }

    /// Other clients' queries are reported as not found. An overdue query is expired on read.
    pub fn status(&self, id: &str, client_id: &str) -> QueryResult<QuerySnapshot> {
        let mut inner = self.inner.lock();
        let overdue = match inner.entries.get(id) {
            Some(entry) if entry.query.client_id == client_id => {
                !entry.state.is_terminal() && entry.query.deadline <= Utc::now()
            }
            _ => return Err(QueryError::NotFound(id.to_string())),
        };
        if overdue {
            self.expire_locked(&mut inner, id);
        }
        inner.snapshot(id).ok_or_else(|| QueryError::NotFound(id.to_string()))
    }

    /// Blocks until the query is terminal, its deadline passes or `timeout` elapses,
    /// then returns its snapshot.
    pub async fn wait(&self, id: &str, client_id: &str, timeout: Duration) -> QueryResult<QuerySnapshot> {
        let (mut done, until_deadline) = {
            let mut inner = self.inner.lock();
            let entry = inner
                .entries
                .get(id)
                .filter(|e| e.query.client_id == client_id)
                .ok_or_else(|| QueryError::NotFound(id.to_string()))?;
            if entry.state.is_terminal() {
                return inner.snapshot(id).ok_or_else(|| QueryError::NotFound(id.to_string()));
            }
            let done = entry.done.subscribe();
            let until_deadline = (entry.query.deadline - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO);
            if until_deadline.is_zero() {
                self.expire_locked(&mut inner, id);
                return inner.snapshot(id).ok_or_else(|| QueryError::NotFound(id.to_string()));
            }
            (done, until_deadline)
        };
        let finished = tokio::time::timeout(
            timeout.min(until_deadline),
            done.wait_for(|finished| *finished),
        )
        .await
        .is_ok();
        if !finished && until_deadline <= timeout {
            self.expire_locked(&mut self.inner.lock(), id);
        }
        self.status(id, client_id)
    }

    fn expire_locked(&self, inner: &mut Inner, id: &str) {
        if let Ok(Transition::Applied(_)) =
            inner.finish(id, QueryState::Expired, None, Some("timeout".into()), self.cfg.failed_history)
        {
            debug!(id, "query expired past its deadline");
        }
    }

    /// Expires queries past their deadline and purges terminal entries past retention.
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        let retention = chrono::Duration::seconds(self.cfg.result_retention_secs as i64);
        let mut inner = self.inner.lock();
        let overdue: Vec<String> = inner
            .entries
            .values()
            .filter(|e| !e.state.is_terminal() && e.query.deadline <= now)
            .map(|e| e.query.correlation_id.clone())
            .collect();
        for id in &overdue {
            let _ = inner.finish(id, QueryState::Expired, None, Some("timeout".into()), self.cfg.failed_history);
        }
        while let Some(id) = inner.terminal.front().cloned() {
            let stale = match inner.entries.get(&id) {
                Some(entry) => entry.finished_at.map_or(true, |at| at + retention <= now),
                None => true,
            };
            if !stale {
                break;
            }
            inner.terminal.pop_front();
            inner.entries.remove(&id);
        }
        if !overdue.is_empty() {
            debug!(expired = overdue.len(), "pending queries expired");
        }
        overdue.len()
    }

    /// Expires every unfinished query with `reason`. Returns how many were expired.
    pub fn expire_all(&self, reason: &str) -> usize {
        let mut inner = self.inner.lock();
        let open: Vec<String> = inner
            .entries
            .values()
            .filter(|e| !e.state.is_terminal())
            .map(|e| e.query.correlation_id.clone())
            .collect();
        for id in &open {
            let _ = inner.finish(id, QueryState::Expired, None, Some(reason.to_string()), self.cfg.failed_history);
        }
        if !open.is_empty() {
            info!(count = open.len(), reason, "expired all pending queries");
        }
        open.len()
    }

    /// Unfinished queries oldest first, optionally for one client.
    pub fn pending(&self, client_id: Option<&str>) -> Vec<QuerySnapshot> {
        let inner = self.inner.lock();
        let mut out: Vec<QuerySnapshot> = inner
            .entries
            .values()
            .filter(|e| !e.state.is_terminal())
            .filter(|e| client_id.map_or(true, |c| e.query.client_id == c))
            .filter_map(|e| inner.snapshot(&e.query.correlation_id))
            .collect();
        out.sort_by(|a, b| a.query.created_at.cmp(&b.query.created_at));
        out
    }

    /// Completed queries still retained, oldest first.
    pub fn completed(&self) -> Vec<QuerySnapshot> {
        let inner = self.inner.lock();
        inner
            .terminal
            .iter()
            .filter_map(|id| inner.entries.get(id))
            .filter(|e| e.state == QueryState::Completed)
            .map(|e| e.snapshot(None))
            .collect()
    }

    /// Recent failed and expired queries, oldest first.
    pub fn failed(&self) -> Vec<QuerySnapshot> {
        self.inner.lock().failed.iter().cloned().collect()
    }

    pub fn queue_depth(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expires open queries with reason `cleared`, then forgets everything.
    pub fn clear(&self) -> usize {
        self.expire_all("cleared");
        let mut inner = self.inner.lock();
        let removed = inner.entries.len();
        inner.entries.clear();
        inner.queue.clear();
        inner.terminal.clear();
        inner.failed.clear();
        removed
    }

    pub fn spawn_sweeper(self: &Arc<Self>) -> SweeperHandle {
        let registry = Arc::clone(self);
        let cancel = CancellationToken::new();
        let loop_token = cancel.clone();
        let every = Duration::from_millis(self.cfg.sweep_interval_ms.max(1));
        let task = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = ticker.tick() => {
                        registry.sweep();
                    }
                }
            }
        });
        SweeperHandle {
            cancel,
            task: Some(task),
        }
    }
}

impl Default for QueryRegistry {
    fn default() -> Self {
        Self::new(QueriesCfg::default())
    }
}

/// Handle returned by [`QueryRegistry::spawn_sweeper`].
pub struct SweeperHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    pub async fn shutdown(mut self) -> Result<(), tokio::task::JoinError> {
        self.cancel.cancel();
        match self.task.take() {
            Some(task) => match task.await {
                Ok(()) => Ok(()),
                Err(err) if err.is_cancelled() => Ok(()),
                Err(err) => Err(err),
            },
            None => Ok(()),
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
