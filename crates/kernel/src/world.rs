//! Shared, transactional access to a world model.
//!
//! A [`World`] publishes immutable snapshots. Writers open a transaction with
//! [`World::modify_world`]; mutations made through the world while it is open
//! go to a private working copy owned by the writing thread. Readers on other
//! threads keep seeing the last committed snapshot until the outermost
//! transaction commits.

use crate::body::Body;
use crate::config::{LockPolicy, WorldConfig};
use crate::connection::Connection;
use crate::dof::DofLimits;
use crate::error::{WorldError, WorldResult};
use crate::event::WorldEvent;
use crate::expression::TransformExpression;
use crate::model::{WorldId, WorldModel};
use crate::state::{DofState, WorldState};
use crate::view::View;
use glam::DMat4;
use kinetree_common::PrefixedName;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, mpsc};
use std::thread::{self, ThreadId};

/// Sent to subscribers after every commit that changed something.
#[derive(Debug, Clone)]
pub struct CommitNotice {
    pub world: WorldId,
    pub version: u64,
    pub model: Arc<WorldModel>,
    pub events: Arc<[WorldEvent]>,
}

struct Published {
    version: u64,
    model: Arc<WorldModel>,
}

/// Working copy of the open transaction.
struct Staging {
    owner: ThreadId,
    depth: usize,
    model: WorldModel,
    failure: Option<String>,
}

struct Shared {
    id: WorldId,
    config: WorldConfig,
    published: RwLock<Published>,
    writer: Mutex<Option<Staging>>,
    released: Condvar,
    subscribers: Mutex<Vec<mpsc::Sender<CommitNotice>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Commit,
    Rollback,
}

/// Cloneable handle to a shared world.
#[derive(Clone)]
pub struct World {
    shared: Arc<Shared>,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("id", &self.shared.id)
            .field("version", &self.version())
            .finish()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl World {
    /// An empty world at version 0.
    pub fn new(config: WorldConfig) -> Self {
        Self::publish_initial(WorldModel::new(), config)
    }

    /// Share a model built detached. The model must be a valid tree.
    pub fn from_model(mut model: WorldModel, config: WorldConfig) -> WorldResult<Self> {
        model.validate()?;
        let history = model.drain_events();
        tracing::debug!(
            world = %model.id(),
            bodies = model.body_count(),
            events = history.len(),
            "world built from model"
        );
        Ok(Self::publish_initial(model, config))
    }

    fn publish_initial(model: WorldModel, config: WorldConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: model.id(),
                config,
                published: RwLock::new(Published {
                    version: 0,
                    model: Arc::new(model),
                }),
                writer: Mutex::new(None),
                released: Condvar::new(),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> WorldId {
        self.shared.id
    }

    pub fn config(&self) -> &WorldConfig {
        &self.shared.config
    }

    /// Number of commits published so far.
    pub fn version(&self) -> u64 {
        self.shared
            .published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .version
    }

    /// The last committed model. Never shows uncommitted changes.
    pub fn snapshot(&self) -> Arc<WorldModel> {
        Arc::clone(
            &self
                .shared
                .published
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .model,
        )
    }

    /// The last committed model together with its version, read atomically.
    pub fn versioned_snapshot(&self) -> (u64, Arc<WorldModel>) {
        let published = self
            .shared
            .published
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        (published.version, Arc::clone(&published.model))
    }

    /// Whether the calling thread has a transaction open.
    pub fn in_transaction(&self) -> bool {
        let me = thread::current().id();
        self.lock_writer().as_ref().is_some_and(|s| s.owner == me)
    }

    /// Run `f` against the model this thread should see: its own working copy
    /// inside a transaction, the last commit otherwise.
    ///
    /// `f` must not call back into this world; the writer lock is held while
    /// it runs on the working copy.
    pub fn read<R>(&self, f: impl FnOnce(&WorldModel) -> R) -> R {
        let me = thread::current().id();
        {
            let writer = self.lock_writer();
            if let Some(staging) = writer.as_ref().filter(|s| s.owner == me) {
                return f(&staging.model);
            }
        }
        f(&self.snapshot())
    }

    pub fn global_transform(&self, body: &PrefixedName) -> WorldResult<DMat4> {
        self.read(|m| m.global_transform(body))
    }

    pub fn state(&self) -> WorldState {
        self.read(|m| m.state().clone())
    }

    /// Receive a notice for every future commit.
    pub fn subscribe(&self) -> mpsc::Receiver<CommitNotice> {
        let (tx, rx) = mpsc::channel();
        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Open a transaction, or a nested level if this thread already has one.
    ///
    /// When another thread is writing, blocks or fails with
    /// [`WorldError::TransactionBusy`] depending on [`LockPolicy`].
    pub fn modify_world(&self) -> WorldResult<Transaction<'_>> {
        let me = thread::current().id();
        let mut writer = self.lock_writer();
        let depth = loop {
            match writer.as_mut() {
                Some(staging) if staging.owner == me => {
                    staging.depth += 1;
                    break staging.depth;
                }
                Some(_) => {}
                None => {
                    let model = (*self.snapshot()).clone();
                    *writer = Some(Staging {
                        owner: me,
                        depth: 1,
                        model,
                        failure: None,
                    });
                    break 1;
                }
            }
            match self.shared.config.lock_policy {
                LockPolicy::FailFast => return Err(WorldError::TransactionBusy),
                LockPolicy::Block => {
                    writer = self
                        .shared
                        .released
                        .wait(writer)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        };
        drop(writer);
        let span = tracing::debug_span!("transaction", world = %self.shared.id, depth).entered();
        tracing::trace!("transaction opened");
        Ok(Transaction {
            world: self,
            finished: false,
            _span: span,
        })
    }

    /// Run `f` in a transaction: commit on `Ok`, roll back on `Err`.
    pub fn modify<R>(&self, f: impl FnOnce(&Transaction<'_>) -> WorldResult<R>) -> WorldResult<R> {
        let tx = self.modify_world()?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                tx.rollback();
                Err(err)
            }
        }
    }

    // --- Mutations; only valid inside a transaction on this thread ---

    pub fn add_body(&self, body: Body) -> WorldResult<()> {
        self.stage(|m, _| m.add_body(body))
    }

    pub fn add_connection(&self, connection: Connection) -> WorldResult<()> {
        self.stage(|m, _| m.add_connection(connection))
    }

    pub fn remove_connection(&self, name: &PrefixedName) -> WorldResult<Connection> {
        self.stage(|m, _| m.remove_connection(name))
    }

    pub fn remove_body(&self, name: &PrefixedName) -> WorldResult<Body> {
        self.stage(|m, _| m.remove_body(name))
    }

    /// Write a DoF state under the world's bounds policy.
    pub fn set_state(&self, dof: &PrefixedName, value: DofState) -> WorldResult<DofState> {
        self.stage(|m, cfg| m.set_state(dof, value, cfg.bounds_policy))
    }

    pub fn set_position(&self, dof: &PrefixedName, position: f64) -> WorldResult<DofState> {
        self.stage(|m, cfg| m.set_position(dof, position, cfg.bounds_policy))
    }

    pub fn set_velocity(&self, dof: &PrefixedName, velocity: f64) -> WorldResult<DofState> {
        self.stage(|m, cfg| m.set_velocity(dof, velocity, cfg.bounds_policy))
    }

    pub fn set_origin_expression(
        &self,
        connection: &PrefixedName,
        expression: TransformExpression,
    ) -> WorldResult<TransformExpression> {
        self.stage(|m, _| m.set_origin_expression(connection, expression))
    }

    pub fn set_dof_limits(&self, dof: &PrefixedName, limits: DofLimits) -> WorldResult<()> {
        self.stage(|m, cfg| m.set_dof_limits(dof, limits, cfg.bounds_policy))
    }

    pub fn merge_world(&self, other: &WorldModel, connection: Option<Connection>) -> WorldResult<()> {
        self.stage(|m, _| m.merge_world(other, connection))
    }

    pub fn add_view(&self, view: View, exists_ok: bool) -> WorldResult<()> {
        self.stage(|m, _| m.add_view(view, exists_ok))
    }

    pub fn remove_view(&self, name: &PrefixedName) -> WorldResult<View> {
        self.stage(|m, _| m.remove_view(name))
    }

    fn lock_writer(&self) -> MutexGuard<'_, Option<Staging>> {
        self.shared
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `op` to this thread's working copy. The first failure marks the
    /// transaction so it can only roll back.
    fn stage<R>(
        &self,
        op: impl FnOnce(&mut WorldModel, &WorldConfig) -> WorldResult<R>,
    ) -> WorldResult<R> {
        let me = thread::current().id();
        let mut writer = self.lock_writer();
        let staging = match writer.as_mut() {
            Some(staging) if staging.owner == me => staging,
            _ => return Err(WorldError::NoActiveTransaction),
        };
        if let Some(failure) = &staging.failure {
            return Err(WorldError::TransactionFailed(failure.clone()));
        }
        let result = op(&mut staging.model, &self.shared.config);
        if let Err(err) = &result {
            tracing::debug!(error = %err, "operation failed, transaction will roll back");
            staging.failure = Some(err.to_string());
        }
        result
    }

    /// Close one transaction level. Returns the published version when the
    /// outermost level commits.
    fn release(&self, outcome: Outcome) -> WorldResult<Option<u64>> {
        let me = thread::current().id();
        let mut writer = self.lock_writer();
        let staging = match writer.as_mut() {
            Some(staging) if staging.owner == me => staging,
            _ => return Err(WorldError::NoActiveTransaction),
        };
        if staging.depth > 1 {
            staging.depth -= 1;
            if outcome == Outcome::Rollback && staging.failure.is_none() {
                staging.failure = Some("nested transaction rolled back".to_string());
            }
            return Ok(None);
        }
        let Some(staging) = writer.take() else {
            return Err(WorldError::NoActiveTransaction);
        };
        let result = match self.finish(staging, outcome) {
            Ok(Some(notice)) => {
                let version = notice.version;
                // Still under the writer lock, so subscribers see versions in order.
                self.notify(notice);
                Ok(Some(version))
            }
            Ok(None) if outcome == Outcome::Commit => Ok(Some(self.version())),
            Ok(None) => Ok(None),
            Err(err) => Err(err),
        };
        drop(writer);
        self.shared.released.notify_all();
        result
    }

    /// Publish or discard the working copy. Called with the writer lock held
    /// so commits are published and announced in order.
    fn finish(&self, staging: Staging, outcome: Outcome) -> WorldResult<Option<CommitNotice>> {
        let Staging {
            mut model, failure, ..
        } = staging;
        if outcome == Outcome::Rollback {
            tracing::warn!(reason = "explicit rollback", "transaction rolled back");
            return Ok(None);
        }
        if let Some(failure) = failure {
            tracing::warn!(reason = %failure, "transaction rolled back");
            return Err(WorldError::TransactionFailed(failure));
        }
        if self.shared.config.validate_on_commit {
            if let Err(err) = model.validate() {
                tracing::warn!(error = %err, "commit rejected, tree invalid");
                return Err(err);
            }
        }
        let events: Arc<[WorldEvent]> = model.drain_events().into();
        if events.is_empty() {
            tracing::trace!("empty transaction, nothing published");
            return Ok(None);
        }
        let model = Arc::new(model);
        let mut published = self
            .shared
            .published
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        published.version += 1;
        published.model = Arc::clone(&model);
        tracing::debug!(version = published.version, events = events.len(), "committed");
        Ok(Some(CommitNotice {
            world: self.shared.id,
            version: published.version,
            model,
            events,
        }))
    }

    fn notify(&self, notice: CommitNotice) {
        let mut subscribers = self
            .shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(notice.clone()).is_ok());
    }
}

/// Guard for one transaction level.
///
/// Dropping the guard commits, unless an operation failed or the thread is
/// panicking, in which case everything since the outermost level opened is
/// discarded.
pub struct Transaction<'w> {
    world: &'w World,
    finished: bool,
    _span: tracing::span::EnteredSpan,
}

impl<'w> Transaction<'w> {
    /// Commit this level. `Some(version)` when it was the outermost one.
    pub fn commit(mut self) -> WorldResult<Option<u64>> {
        self.finished = true;
        self.world.release(Outcome::Commit)
    }

    /// Discard the whole transaction, including enclosing levels.
    pub fn rollback(mut self) {
        self.finished = true;
        if let Err(err) = self.world.release(Outcome::Rollback) {
            tracing::warn!(error = %err, "rollback outside transaction");
        }
    }
}

impl Deref for Transaction<'_> {
    type Target = World;

    fn deref(&self) -> &World {
        self.world
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let outcome = if thread::panicking() {
            Outcome::Rollback
        } else {
            Outcome::Commit
        };
        if let Err(err) = self.world.release(outcome) {
            tracing::warn!(error = %err, "transaction dropped without commit");
        }
    }
}
