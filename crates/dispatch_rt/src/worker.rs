// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use dispatch_time::{Clock, Stopwatch};

use crate::task::{BoxedTask, Outcome, Resolver, TaskId};

/// Identifies a single spawned worker context for the lifetime of that context.
///
/// Assigned by the dispatcher at spawn time and never reused, even after the worker it named
/// has been retired.
pub type WorkerId = u64;

/// A factory for a task to be delivered to every newly spawned worker, before it is considered
/// idle and eligible for assignment.
///
/// Because a [`Task`](crate::Task) is single-use (`execute` consumes `Box<Self>`), a start task
/// cannot be stored and re-delivered directly - the dispatcher instead stores a `StartTask`
/// factory and asks it for a fresh [`Task`](crate::Task) instance on every spawn. Two
/// `Arc<dyn StartTask>` clones of the same allocation are the same start task for the purposes of
/// [`Dispatcher::remove_start_task`](crate::Dispatcher::remove_start_task); two separately
/// constructed factories are distinct even if their `create` bodies are identical.
pub trait StartTask: Send + Sync {
    /// Produces a fresh task instance to run on a worker that has just spawned.
    fn create(&self) -> BoxedTask;
}

impl<F> StartTask for F
where
    F: Fn() -> BoxedTask + Send + Sync,
{
    fn create(&self) -> BoxedTask {
        self()
    }
}

/// A payload a task can panic with to simulate the loss of its entire worker context, rather
/// than an ordinary task failure.
///
/// An ordinary panic inside [`Task::execute`](crate::Task::execute) is caught and turned into an
/// `Outcome::Failure` - the worker survives and goes on to serve other tasks. Panicking with a
/// `WorkerCrash` instead tells the worker to let the panic actually unwind the thread: the
/// dispatcher observes this as a lost worker, settles the in-flight task's promise with
/// [`Error::WorkerLost`](crate::Error::WorkerLost), and spawns a replacement.
#[derive(Debug)]
pub struct WorkerCrash(String);

impl WorkerCrash {
    /// Creates a crash payload carrying `message` for diagnostic purposes.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl std::fmt::Display for WorkerCrash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "worker crash: {}", self.0)
    }
}

pub(crate) enum Command {
    Run { task_id: TaskId, task: BoxedTask },
    Stop,
}

pub(crate) enum WorkerEvent {
    Spawned {
        worker_id: WorkerId,
    },
    StartTaskFailed {
        worker_id: WorkerId,
        message: String,
    },
    Completed {
        worker_id: WorkerId,
        task_id: TaskId,
        outcome: Outcome,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerState {
    Spawning,
    Idle,
    Busy,
}

/// Dispatcher-side bookkeeping for one live worker context.
pub(crate) struct WorkerHandle {
    pub(crate) state: WorkerState,
    pub(crate) current_task: Option<TaskId>,
    pub(crate) exec_count: u64,
    pub(crate) idle_since: Option<Stopwatch>,
    /// Set when `OPT_POOL_SIZE_MAX` was lowered below the current live count while this worker
    /// was busy; it is retired the next time it returns to idle rather than being reassigned.
    pub(crate) retiring: bool,
    command_tx: mpsc::Sender<Command>,
    health_rx: oneshot::Receiver<()>,
    _join_handle: thread::JoinHandle<()>,
}

impl WorkerHandle {
    /// Delivers `task` to this worker. The caller is responsible for only doing so while the
    /// worker is idle.
    pub(crate) fn assign(&mut self, task_id: TaskId, task: BoxedTask) {
        self.state = WorkerState::Busy;
        self.current_task = Some(task_id);
        self.idle_since = None;
        // The worker thread is always blocked in `recv` between tasks, so a closed channel here
        // can only mean the thread already died; silently dropping the command in that case is
        // fine, the crash is picked up by `poll_health` on the next sweep.
        let _ = self.command_tx.send(Command::Run { task_id, task });
    }

    /// Requests a graceful teardown: the worker finishes any task already assigned, then exits
    /// its command loop instead of waiting for another `Command::Run`.
    ///
    /// Safe to call on a worker that is `Idle` as well as one that is `Busy` - the command is
    /// simply queued behind whichever `Run` is already in flight, if any.
    pub(crate) fn stop(&mut self) {
        // Same reasoning as `assign`: a closed channel here just means the thread already died,
        // which is indistinguishable from a successful stop as far as this handle is concerned.
        let _ = self.command_tx.send(Command::Stop);
    }

    /// Returns whether the worker's underlying thread has exited without signalling a graceful
    /// shutdown - i.e. it crashed.
    pub(crate) fn has_crashed(&mut self) -> bool {
        matches!(
            self.health_rx.try_recv(),
            Err(oneshot::TryRecvError::Disconnected)
        )
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        // Dropping `command_tx` makes the worker thread's next `recv` fail, ending its loop; we
        // never block the reactor thread waiting for the underlying OS thread to join.
    }
}

pub(crate) struct SpawnConfig {
    pub(crate) worker_id: WorkerId,
    pub(crate) start_tasks: Vec<Arc<dyn StartTask>>,
    pub(crate) outcome_tx: async_channel::Sender<WorkerEvent>,
    pub(crate) waker: crate::waker::ReactorWaker,
    pub(crate) thread_flags: u32,
}

/// Spawns a new worker thread and returns the dispatcher-side handle for it.
pub(crate) fn spawn(config: SpawnConfig) -> WorkerHandle {
    let SpawnConfig {
        worker_id,
        start_tasks,
        outcome_tx,
        waker,
        thread_flags,
    } = config;

    let (command_tx, command_rx) = mpsc::channel::<Command>();
    let (health_tx, health_rx) = oneshot::channel::<()>();

    let join_handle = thread::Builder::new()
        .name(format!("dispatch-worker-{worker_id}"))
        .spawn(move || {
            let _wake_on_exit = scopeguard::guard(waker.clone(), |w| w.notify());
            tracing::debug!(worker_id, thread_flags, "worker thread starting");

            for start_task in &start_tasks {
                match run_task(start_task.create()) {
                    Outcome::Success(_) => {}
                    Outcome::Failure(message) => {
                        tracing::warn!(
                            worker_id,
                            message = message.as_str(),
                            "start task failed, worker will not serve any tasks"
                        );
                        let _ = outcome_tx.try_send(WorkerEvent::StartTaskFailed {
                            worker_id,
                            message,
                        });
                        let _ = health_tx.send(());
                        return;
                    }
                }
            }

            let _ = outcome_tx.try_send(WorkerEvent::Spawned { worker_id });
            waker.notify();

            while let Ok(command) = command_rx.recv() {
                match command {
                    Command::Run { task_id, task } => {
                        let outcome = run_task(task);
                        let _ = outcome_tx.try_send(WorkerEvent::Completed {
                            worker_id,
                            task_id,
                            outcome,
                        });
                        waker.notify();
                    }
                    Command::Stop => break,
                }
            }

            let _ = health_tx.send(());
            tracing::debug!(worker_id, "worker thread exiting");
        })
        .expect("failed to spawn dispatch worker thread");

    WorkerHandle {
        state: WorkerState::Spawning,
        current_task: None,
        exec_count: 0,
        idle_since: None,
        retiring: false,
        command_tx,
        health_rx,
        _join_handle: join_handle,
    }
}

/// Creates a stopwatch measuring idle time from `clock`, for use once a worker is marked idle.
pub(crate) fn idle_stopwatch(clock: &Clock) -> Stopwatch {
    Stopwatch::with_clock(clock)
}

/// Runs `task` to completion, catching an ordinary panic and converting it to
/// `Outcome::Failure`. A panic carrying [`WorkerCrash`] is re-raised instead, so it actually
/// unwinds the worker thread.
fn run_task(task: BoxedTask) -> Outcome {
    let resolver = Resolver::default();

    match catch_unwind(AssertUnwindSafe(|| task.execute(&resolver))) {
        Ok(()) => resolver.into_outcome().unwrap_or_else(|| {
            Outcome::Failure("task returned without resolving its resolver".to_owned())
        }),
        Err(payload) => {
            if payload.is::<WorkerCrash>() {
                resume_unwind(payload);
            }
            Outcome::Failure(panic_payload_message(&payload))
        }
    }
}

fn panic_payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked with a non-string payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Task, Value};

    struct Answer;

    impl Task for Answer {
        fn execute(self: Box<Self>, resolver: &Resolver) {
            resolver.succeed(Value::Int(42));
        }
    }

    struct PanicsWithString;

    impl Task for PanicsWithString {
        fn execute(self: Box<Self>, _resolver: &Resolver) {
            panic!("kaboom");
        }
    }

    struct NeverResolves;

    impl Task for NeverResolves {
        fn execute(self: Box<Self>, _resolver: &Resolver) {}
    }

    struct Crashes;

    impl Task for Crashes {
        fn execute(self: Box<Self>, _resolver: &Resolver) {
            std::panic::panic_any(WorkerCrash::new("simulated context loss"));
        }
    }

    #[test]
    fn run_task_delivers_success() {
        match run_task(Box::new(Answer)) {
            Outcome::Success(Value::Int(42)) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn run_task_catches_ordinary_panics() {
        match run_task(Box::new(PanicsWithString)) {
            Outcome::Failure(message) => assert_eq!(message, "kaboom"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn run_task_fails_when_resolver_untouched() {
        match run_task(Box::new(NeverResolves)) {
            Outcome::Failure(message) => assert!(message.contains("did not resolve") || message.contains("without resolving")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    #[should_panic(expected = "simulated context loss")]
    fn run_task_reraises_worker_crash() {
        let _ = run_task(Box::new(Crashes));
    }

    #[test]
    fn stop_ends_the_command_loop_without_crashing() {
        let (outcome_tx, outcome_rx) = async_channel::unbounded();
        let mut handle = spawn(SpawnConfig {
            worker_id: 1,
            start_tasks: Vec::new(),
            outcome_tx,
            waker: crate::waker::ReactorWaker::new(),
            thread_flags: 0,
        });

        let spawned = loop {
            if let Ok(event) = outcome_rx.try_recv() {
                break event;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        };
        assert!(matches!(spawned, WorkerEvent::Spawned { worker_id: 1 }));

        handle.stop();

        // The worker thread's loop exits via the `Command::Stop` arm, so it still sends the
        // health signal on its way out - this is not a crash.
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(!handle.has_crashed());
    }
}
