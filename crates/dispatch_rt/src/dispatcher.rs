// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use dispatch_time::runtime::InactiveClock;
use dispatch_time::{Clock, Stopwatch};

use crate::error::{Error, Result};
use crate::options::{OptionKey, OptionValue, Options};
use crate::promise::{Deferred, Promise};
use crate::reactor::{Reactor, TimerHandle};
use crate::registry::{CallTask, Handler, Registry, SharedRegistry};
use crate::task::{BoxedTask, Outcome, Task, TaskId, Value};
use crate::waker::ReactorWaker;
use crate::worker::{self, SpawnConfig, StartTask, WorkerEvent, WorkerId, WorkerState};

/// How often the idle sweep re-arms itself. Not user-configurable (see `IDLE_WORKER_TIMEOUT` for
/// the threshold that is).
const IDLE_SWEEP_CADENCE: Duration = Duration::from_secs(1);

struct QueueEntry {
    task_id: TaskId,
    task: BoxedTask,
    submitted_at: Stopwatch,
    timeout: Option<Duration>,
    deferred: Deferred,
}

struct PendingEntry {
    worker_id: WorkerId,
    timer: Option<TimerHandle>,
    deferred: Deferred,
}

struct State {
    options: Options,
    workers: HashMap<WorkerId, worker::WorkerHandle>,
    /// Idle worker ids, most-recently-idled at the front. `pop_front` gives MRU assignment;
    /// `back`/`pop_back` gives LRU retirement, both idle-sweep and pool-shrink.
    idle_order: VecDeque<WorkerId>,
    queue: VecDeque<QueueEntry>,
    pending: HashMap<TaskId, PendingEntry>,
    start_tasks: Vec<Arc<dyn StartTask>>,
    next_task_id: TaskId,
    next_worker_id: WorkerId,
    stopped: bool,
    idle_sweep_timer: Option<TimerHandle>,
}

struct Inner<R> {
    reactor: R,
    clock: Clock,
    waker: ReactorWaker,
    result_tx: async_channel::Sender<WorkerEvent>,
    result_rx: async_channel::Receiver<WorkerEvent>,
    registry: SharedRegistry,
    state: RefCell<State>,
}

/// The worker-pool dispatcher: accepts tasks, assigns them to worker threads, and settles each
/// one's [`Promise`] back on whichever thread drives [`run_once`](Self::run_once).
///
/// All of `Dispatcher`'s own bookkeeping - the queue, the pending-task table, the worker table -
/// lives behind a plain `RefCell`, not a `Mutex`: it is only ever touched from the single thread
/// that calls `run_once`, `call`, `execute`, and friends. `Dispatcher` is cheap to clone (an `Rc`
/// bump) so that the reactor-timer callbacks it schedules for itself (timeouts, the idle sweep)
/// can each hold their own handle back into it without a self-referential cycle.
pub struct Dispatcher<R>(Rc<Inner<R>>);

impl<R> Clone for Dispatcher<R> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<R> fmt::Debug for Dispatcher<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

impl<R: Reactor + 'static> Dispatcher<R> {
    /// Creates a dispatcher with documented-default [`Options`], driven by `reactor`.
    ///
    /// Spawns up to `POOL_SIZE_MIN` workers immediately and arms the idle sweep.
    #[must_use]
    pub fn new(reactor: R) -> Self {
        Self::with_options(reactor, Options::default())
    }

    /// Creates a dispatcher with the given `options`, driven by `reactor`.
    #[must_use]
    pub fn with_options(reactor: R, options: Options) -> Self {
        let (clock, _driver) = InactiveClock::default().activate();
        Self::with_clock(reactor, clock, options)
    }

    /// Creates a dispatcher reading wall-clock time from `clock` rather than the system clock -
    /// the seam tests use to supply a [`ClockControl`](dispatch_time::ClockControl)-backed clock.
    #[must_use]
    pub fn with_clock(reactor: R, clock: Clock, options: Options) -> Self {
        let (result_tx, result_rx) = async_channel::unbounded();
        let inner = Rc::new(Inner {
            reactor,
            clock,
            waker: ReactorWaker::new(),
            result_tx,
            result_rx,
            registry: Arc::new(RwLock::new(Registry::new())),
            state: RefCell::new(State {
                options,
                workers: HashMap::new(),
                idle_order: VecDeque::new(),
                queue: VecDeque::new(),
                pending: HashMap::new(),
                start_tasks: Vec::new(),
                next_task_id: 0,
                next_worker_id: 0,
                stopped: false,
                idle_sweep_timer: None,
            }),
        });

        let dispatcher = Self(inner);
        dispatcher.top_up_pool();
        dispatcher.arm_idle_sweep();
        dispatcher
    }

    /// Submits a call to the callable registered under `name`.
    ///
    /// Rejected synchronously (the returned promise settles immediately with
    /// [`Error::Submission`]) if `name` has no registered handler, or the dispatcher has already
    /// been stopped.
    pub fn call(&self, name: impl Into<String>, args: Vec<Value>) -> Promise {
        let name = name.into();

        if self.0.state.borrow().stopped {
            return Self::rejected(Error::Submission(
                "dispatcher has been stopped".to_owned(),
            ));
        }
        if !self.registry_contains(&name) {
            return Self::rejected(Error::Submission(format!(
                "no handler registered for callable {name:?}"
            )));
        }

        let task: BoxedTask = Box::new(CallTask {
            registry: Arc::clone(&self.0.registry),
            name,
            args,
        });
        self.submit(task)
    }

    /// Submits a user-supplied [`Task`] directly.
    ///
    /// Rejected synchronously (the returned promise settles immediately with
    /// [`Error::Submission`]) if the dispatcher has already been stopped.
    pub fn execute(&self, task: Box<dyn Task>) -> Promise {
        if self.0.state.borrow().stopped {
            return Self::rejected(Error::Submission(
                "dispatcher has been stopped".to_owned(),
            ));
        }
        self.submit(task)
    }

    /// Sets tunable `key` to `value`, returning its prior value.
    ///
    /// Does not retroactively alter already-running tasks or already-spawned workers; a lowered
    /// `PoolSizeMax` lets excess workers drain instead of killing them outright, and a raised
    /// `PoolSizeMin` spawns workers immediately to reach the new floor.
    pub fn set_option(&self, key: OptionKey, value: OptionValue) -> Result<OptionValue> {
        let prior = self.0.state.borrow_mut().options.set(key, value)?;
        tracing::debug!(?key, ?value, "option changed");

        match key {
            OptionKey::PoolSizeMin => self.top_up_pool(),
            OptionKey::PoolSizeMax => self.enforce_pool_bounds(),
            _ => {}
        }

        Ok(prior)
    }

    /// Adds `start_task` to the start-task set, unless an identical (by `Arc` identity) start
    /// task is already a member.
    pub fn add_start_task(&self, start_task: Arc<dyn StartTask>) {
        let mut state = self.0.state.borrow_mut();
        let already_present = state
            .start_tasks
            .iter()
            .any(|existing| Arc::ptr_eq(existing, &start_task));
        if !already_present {
            state.start_tasks.push(start_task);
        }
    }

    /// Removes every start task identical (by `Arc` identity) to `start_task` from the start-task
    /// set. A no-op if no such member exists.
    pub fn remove_start_task(&self, start_task: &Arc<dyn StartTask>) {
        self.0
            .state
            .borrow_mut()
            .start_tasks
            .retain(|existing| !Arc::ptr_eq(existing, start_task));
    }

    /// Registers `handler` under `name` in the callable registry, replacing any handler
    /// previously registered under that name.
    pub fn register(&self, name: impl Into<String>, handler: Handler) {
        self.0
            .registry
            .write()
            .expect("registry lock poisoned")
            .register(name, handler);
    }

    /// Requests graceful shutdown: queued-but-unassigned tasks are cancelled immediately with
    /// [`Error::Shutdown`]; in-flight tasks are left to settle naturally, at which point their
    /// worker is retired rather than reused. Idempotent.
    pub fn stop(&self) {
        self.begin_stop(false);
    }

    /// Requests forceful shutdown: queued-but-unassigned tasks are cancelled with
    /// [`Error::Shutdown`] and in-flight tasks are abandoned with [`Error::WorkerLost`] rather
    /// than awaited. Idempotent.
    pub fn stop_force(&self) {
        self.begin_stop(true);
    }

    /// Drives the dispatcher for one iteration of the embedding reactor's loop: blocks up to
    /// `poll_timeout` for a worker to signal new results, then reaps any crashed workers and
    /// drains every outcome currently on the result channel before returning.
    ///
    /// Returns whether anything was actually drained - a hint for embedders that want to avoid an
    /// extra idle spin, not a correctness signal (timers firing between calls still make
    /// progress independently of this return value).
    pub fn run_once(&self, poll_timeout: Duration) -> bool {
        self.0.waker.wait(poll_timeout);
        self.reap_crashed_workers();

        let mut drained_any = false;
        while let Ok(event) = self.0.result_rx.try_recv() {
            drained_any = true;
            match event {
                WorkerEvent::Spawned { worker_id } => self.handle_spawned(worker_id),
                WorkerEvent::StartTaskFailed { worker_id, message } => {
                    self.handle_start_task_failed(worker_id, message);
                }
                WorkerEvent::Completed {
                    worker_id,
                    task_id,
                    outcome,
                } => self.handle_completed(worker_id, task_id, outcome),
            }
        }
        drained_any
    }

    /// Returns a reference to the reactor this dispatcher was constructed with.
    ///
    /// Mainly useful for embedders (and examples) that need to drive the reactor's own timer
    /// bookkeeping alongside [`run_once`](Self::run_once), since the dispatcher never does so
    /// itself.
    pub fn reactor(&self) -> &R {
        &self.0.reactor
    }

    /// Returns whether the dispatcher currently has no queued or in-flight work.
    ///
    /// Live (Idle) workers may still exist; this only reflects the absence of outstanding tasks,
    /// not the pool's size.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        let state = self.0.state.borrow();
        state.queue.is_empty() && state.pending.is_empty()
    }

    fn registry_contains(&self, name: &str) -> bool {
        self.0
            .registry
            .read()
            .expect("registry lock poisoned")
            .contains(name)
    }

    fn rejected(error: Error) -> Promise {
        let (promise, deferred) = Promise::new_pair();
        deferred.settle(Err(error));
        promise
    }

    fn submit(&self, task: BoxedTask) -> Promise {
        let (promise, deferred) = Promise::new_pair();
        let submitted_at = Stopwatch::with_clock(&self.0.clock);

        let task_id = {
            let mut state = self.0.state.borrow_mut();
            let task_id = state.next_task_id;
            state.next_task_id += 1;
            let timeout = state.options.task_timeout();
            state.queue.push_back(QueueEntry {
                task_id,
                task,
                submitted_at,
                timeout,
                deferred,
            });
            task_id
        };
        tracing::trace!(task_id, "task submitted");

        self.pump();
        promise
    }

    /// Assigns queued entries to idle workers, spawning new workers (up to `PoolSizeMax`) when
    /// demand outstrips idle capacity. Entries that can neither be assigned nor trigger a spawn
    /// are left queued for a later pump.
    ///
    /// At most one spawn is triggered per queued entry that isn't already covered by an idle or
    /// already-spawning worker - a worker counts as covering a queued entry as soon as
    /// `spawn_worker` inserts it, well before it actually reports in as idle, so a burst of
    /// submissions against an empty pool spawns one worker per task rather than racing to
    /// `PoolSizeMax`.
    fn pump(&self) {
        loop {
            let idle_or_room = {
                let state = self.0.state.borrow();
                if state.queue.is_empty() {
                    break;
                }
                if state.idle_order.front().is_some() {
                    Some(true)
                } else {
                    let spawning = state
                        .workers
                        .values()
                        .filter(|worker| worker.state == WorkerState::Spawning)
                        .count();
                    let room_to_spawn = state.workers.len() < state.options.pool_size_max()
                        && state.queue.len() > spawning;
                    room_to_spawn.then_some(false)
                }
            };

            match idle_or_room {
                Some(true) => {
                    let (worker_id, entry) = {
                        let mut state = self.0.state.borrow_mut();
                        let worker_id = state
                            .idle_order
                            .pop_front()
                            .expect("idle_order checked non-empty");
                        let entry = state.queue.pop_front().expect("queue checked non-empty");
                        (worker_id, entry)
                    };
                    self.assign_entry(worker_id, entry);
                }
                Some(false) => self.spawn_worker(),
                None => break,
            }
        }
    }

    fn assign_entry(&self, worker_id: WorkerId, entry: QueueEntry) {
        let QueueEntry {
            task_id,
            task,
            submitted_at,
            timeout,
            deferred,
        } = entry;

        let timer = timeout.map(|timeout| {
            let remaining = timeout.saturating_sub(submitted_at.elapsed());
            let dispatcher = self.clone();
            self.0
                .reactor
                .schedule_once(remaining, Box::new(move || dispatcher.on_timeout(task_id)))
        });

        let mut state = self.0.state.borrow_mut();
        state.pending.insert(
            task_id,
            PendingEntry {
                worker_id,
                timer,
                deferred,
            },
        );
        if let Some(worker) = state.workers.get_mut(&worker_id) {
            worker.assign(task_id, task);
        }
        drop(state);
        tracing::trace!(task_id, worker_id, "task assigned to worker");
    }

    fn spawn_worker(&self) {
        let mut state = self.0.state.borrow_mut();
        let worker_id = state.next_worker_id;
        state.next_worker_id += 1;
        let start_tasks = state.start_tasks.clone();
        let thread_flags = state.options.thread_flags();

        let handle = worker::spawn(SpawnConfig {
            worker_id,
            start_tasks,
            outcome_tx: self.0.result_tx.clone(),
            waker: self.0.waker.clone(),
            thread_flags,
        });
        state.workers.insert(worker_id, handle);
        drop(state);

        tracing::debug!(worker_id, "worker spawn requested");
    }

    fn handle_spawned(&self, worker_id: WorkerId) {
        {
            let mut state = self.0.state.borrow_mut();
            if let Some(worker) = state.workers.get_mut(&worker_id) {
                worker.state = WorkerState::Idle;
                worker.idle_since = Some(worker::idle_stopwatch(&self.0.clock));
            } else {
                return;
            }
            state.idle_order.push_front(worker_id);
        }
        tracing::debug!(worker_id, "worker spawned and idle");
        self.pump();
    }

    fn handle_start_task_failed(&self, worker_id: WorkerId, message: String) {
        self.0.state.borrow_mut().workers.remove(&worker_id);
        tracing::warn!(
            worker_id,
            message = message.as_str(),
            "worker start task failed, context discarded"
        );
        self.top_up_pool();
        self.pump();
    }

    fn handle_completed(&self, worker_id: WorkerId, task_id: TaskId, outcome: Outcome) {
        let pending = self.0.state.borrow_mut().pending.remove(&task_id);

        let Some(pending) = pending else {
            tracing::trace!(
                task_id,
                worker_id,
                "result for unknown or already-settled task discarded"
            );
            self.finish_worker_turn(worker_id);
            return;
        };

        if let Some(timer) = pending.timer {
            self.0.reactor.cancel(timer);
        }
        let result = match outcome {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(message) => Err(Error::Task(message)),
        };
        pending.deferred.settle(result);
        tracing::trace!(task_id, worker_id, "task settled");

        self.finish_worker_turn(worker_id);
    }

    /// Transitions `worker_id` out of `Busy` once its current task has settled: back to `Idle`
    /// and eligible for reassignment, or retired if it is marked for retirement, has hit
    /// `ExecLimit`, or the dispatcher has been stopped in the meantime.
    fn finish_worker_turn(&self, worker_id: WorkerId) {
        enum Next {
            Retire(&'static str),
            Idle,
        }

        let next = {
            let mut state = self.0.state.borrow_mut();
            let exec_limit = state.options.exec_limit();
            let stopped = state.stopped;
            match state.workers.get_mut(&worker_id) {
                None => return,
                Some(worker) => {
                    worker.current_task = None;
                    worker.exec_count += 1;

                    if stopped {
                        Next::Retire("dispatcher stopped")
                    } else if worker.retiring {
                        Next::Retire("pool size max lowered")
                    } else if exec_limit.is_some_and(|limit| worker.exec_count >= limit) {
                        Next::Retire("exec limit reached")
                    } else {
                        worker.state = WorkerState::Idle;
                        worker.idle_since = Some(worker::idle_stopwatch(&self.0.clock));
                        state.idle_order.push_front(worker_id);
                        Next::Idle
                    }
                }
            }
        };

        match next {
            Next::Retire(reason) => {
                let mut state = self.0.state.borrow_mut();
                if let Some(mut worker) = state.workers.remove(&worker_id) {
                    worker.stop();
                }
                drop(state);
                tracing::debug!(worker_id, reason, "worker retired");
                self.top_up_pool();
            }
            Next::Idle => {}
        }
        self.pump();
    }

    fn on_timeout(&self, task_id: TaskId) {
        let pending = self.0.state.borrow_mut().pending.remove(&task_id);
        let Some(pending) = pending else {
            return;
        };

        tracing::warn!(
            task_id,
            worker_id = pending.worker_id,
            "task timed out, replacing worker"
        );
        pending.deferred.settle(Err(Error::Timeout));
        self.retire_lost_worker(pending.worker_id);
        self.top_up_pool();
        self.pump();
    }

    /// Polls every live worker for a crashed execution context and settles/replaces as needed.
    /// Crash detection is inherently a poll (a crashed worker cannot itself post a final event),
    /// so this runs once per [`run_once`](Self::run_once).
    fn reap_crashed_workers(&self) {
        let crashed: Vec<WorkerId> = {
            let mut state = self.0.state.borrow_mut();
            state
                .workers
                .iter_mut()
                .filter(|(_, worker)| worker.has_crashed())
                .map(|(&worker_id, _)| worker_id)
                .collect()
        };

        for worker_id in crashed {
            self.handle_worker_crash(worker_id);
        }
    }

    fn handle_worker_crash(&self, worker_id: WorkerId) {
        let current_task = {
            let mut state = self.0.state.borrow_mut();
            let current_task = state
                .workers
                .get(&worker_id)
                .and_then(|worker| worker.current_task);
            state.workers.remove(&worker_id);
            state.idle_order.retain(|&id| id != worker_id);
            current_task
        };

        tracing::warn!(worker_id, "worker context lost");

        if let Some(task_id) = current_task {
            let pending = self.0.state.borrow_mut().pending.remove(&task_id);
            if let Some(pending) = pending {
                if let Some(timer) = pending.timer {
                    self.0.reactor.cancel(timer);
                }
                pending.deferred.settle(Err(Error::WorkerLost));
            }
        }

        self.top_up_pool();
        self.pump();
    }

    /// Removes a worker whose context is known lost (timed out or crashed) regardless of its
    /// current state, so it is never reassigned further work.
    fn retire_lost_worker(&self, worker_id: WorkerId) {
        let mut state = self.0.state.borrow_mut();
        state.workers.remove(&worker_id);
        state.idle_order.retain(|&id| id != worker_id);
    }

    /// Spawns workers until the live count reaches `PoolSizeMin`, unless the dispatcher has been
    /// stopped.
    fn top_up_pool(&self) {
        loop {
            let should_spawn = {
                let state = self.0.state.borrow();
                !state.stopped && state.workers.len() < state.options.pool_size_min()
            };
            if !should_spawn {
                break;
            }
            self.spawn_worker();
        }
    }

    /// Applies a newly lowered `PoolSizeMax`: retires idle workers immediately (LRU first), then
    /// marks any still-excess busy workers so they retire on their next idle transition instead
    /// of being reassigned.
    fn enforce_pool_bounds(&self) {
        let mut state = self.0.state.borrow_mut();
        let max = state.options.pool_size_max();
        let mut excess = state.workers.len().saturating_sub(max);

        while excess > 0 {
            let Some(worker_id) = state.idle_order.pop_back() else {
                break;
            };
            if let Some(mut worker) = state.workers.remove(&worker_id) {
                worker.stop();
            }
            excess -= 1;
            tracing::debug!(worker_id, "worker retired: pool size max lowered");
        }

        if excess > 0 {
            let candidates: Vec<WorkerId> = state
                .workers
                .iter()
                .filter(|(_, worker)| !worker.retiring && worker.state == WorkerState::Busy)
                .map(|(&worker_id, _)| worker_id)
                .take(excess)
                .collect();
            for worker_id in candidates {
                if let Some(worker) = state.workers.get_mut(&worker_id) {
                    worker.retiring = true;
                }
                tracing::debug!(worker_id, "worker marked for retirement: pool size max lowered");
            }
        }
    }

    fn arm_idle_sweep(&self) {
        let dispatcher = self.clone();
        let timer = self.0.reactor.schedule_once(
            IDLE_SWEEP_CADENCE,
            Box::new(move || dispatcher.on_idle_sweep()),
        );
        self.0.state.borrow_mut().idle_sweep_timer = Some(timer);
    }

    fn on_idle_sweep(&self) {
        if self.0.state.borrow().stopped {
            return;
        }
        self.run_idle_sweep();
        self.arm_idle_sweep();
    }

    fn run_idle_sweep(&self) {
        let mut state = self.0.state.borrow_mut();
        let min = state.options.pool_size_min();
        let idle_timeout = state.options.idle_worker_timeout();

        while state.workers.len() > min {
            let Some(&worker_id) = state.idle_order.back() else {
                break;
            };
            let Some(worker) = state.workers.get(&worker_id) else {
                state.idle_order.pop_back();
                continue;
            };
            let idle_elapsed = worker
                .idle_since
                .as_ref()
                .map(Stopwatch::elapsed)
                .unwrap_or_default();
            // idle_order is ordered oldest-idle-first from the back, so once the oldest entry
            // hasn't crossed the threshold, nothing in front of it has either.
            if idle_elapsed < idle_timeout {
                break;
            }

            state.idle_order.pop_back();
            if let Some(mut worker) = state.workers.remove(&worker_id) {
                worker.stop();
            }
            tracing::debug!(worker_id, "worker retired: idle timeout");
        }
    }

    fn begin_stop(&self, force: bool) {
        let (drained, to_retire) = {
            let mut state = self.0.state.borrow_mut();
            if state.stopped {
                return;
            }
            state.stopped = true;
            if let Some(timer) = state.idle_sweep_timer.take() {
                self.0.reactor.cancel(timer);
            }

            let drained: Vec<QueueEntry> = state.queue.drain(..).collect();
            let to_retire = force.then(|| {
                let pending: Vec<PendingEntry> =
                    state.pending.drain().map(|(_, entry)| entry).collect();
                let worker_ids: Vec<WorkerId> = state.workers.keys().copied().collect();
                (pending, worker_ids)
            });
            (drained, to_retire)
        };

        for entry in drained {
            entry.deferred.settle(Err(Error::Shutdown));
        }

        if let Some((pending, worker_ids)) = to_retire {
            for entry in pending {
                if let Some(timer) = entry.timer {
                    self.0.reactor.cancel(timer);
                }
                entry.deferred.settle(Err(Error::WorkerLost));
            }
            let mut state = self.0.state.borrow_mut();
            for worker_id in worker_ids {
                if let Some(mut worker) = state.workers.remove(&worker_id) {
                    worker.stop();
                }
            }
        }

        tracing::debug!(force, "dispatcher stop requested");
    }
}
