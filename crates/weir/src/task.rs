//! Cooperative local task scheduling.
//!
//! One thread-local `LocalPool` carries every spawned task: render loops
//! and anything else the driver starts. [`Task::start_droppable`] hands back
//! a [`TaskHandle`] whose drop cancels the task; [`run_until_stalled`] pumps
//! the pool until no task can make progress. Hosts embed the pump into
//! their event loop; tests call it after every simulated input.

use std::cell::RefCell;
use std::future::Future;

use futures::executor::{LocalPool, LocalSpawner};
use futures::future::{FutureExt, RemoteHandle};
use futures::task::LocalSpawnExt;

thread_local! {
    static EXECUTOR: Executor = Executor::new();
}

struct Executor {
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
}

impl Executor {
    fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            pool: RefCell::new(pool),
            spawner,
        }
    }
}

/// Keeps a spawned task alive; dropping it cancels the task.
#[must_use = "dropping the handle cancels the task"]
pub struct TaskHandle {
    _handle: RemoteHandle<()>,
}

/// Entry point for spawning cooperative tasks.
pub struct Task;

impl Task {
    /// Spawn a task that runs until completion or until its handle is
    /// dropped, whichever comes first.
    pub fn start_droppable(future: impl Future<Output = ()> + 'static) -> TaskHandle {
        let (remote, handle) = future.remote_handle();
        EXECUTOR.with(|executor| {
            executor
                .spawner
                .spawn_local(remote)
                .expect("local executor is gone");
        });
        TaskHandle { _handle: handle }
    }
}

/// Run every spawned task until none can make further progress.
///
/// Must not be called from inside a task: the pool is already borrowed
/// while tasks run.
pub fn run_until_stalled() {
    EXECUTOR.with(|executor| {
        executor.pool.borrow_mut().run_until_stalled();
    });
}
