//! A single sequential execution context.
//!
//! A [Sequence] owns a value on one tokio task and runs posted work against it strictly in order.
//! Engines hold a [TaskRunner] to post callbacks back to the same queue, so callbacks never run re-entrantly.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use crate::{Error, Result};

tokio::task_local! {
	static CURRENT: SequenceId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SequenceId(u64);

impl SequenceId {
	fn next() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(0);
		Self(NEXT.fetch_add(1, Ordering::Relaxed))
	}
}

/// A unit of work that does not need the owned value.
pub type Task = Box<dyn FnOnce() + Send>;

enum Work<T> {
	Owned(Box<dyn FnOnce(&mut T) + Send>),
	Plain(Task),
}

/// Posts plain tasks to a sequence without knowing what it owns.
#[derive(Clone)]
pub struct TaskRunner {
	id: SequenceId,
	post: Arc<dyn Fn(Task) -> bool + Send + Sync>,
}

impl TaskRunner {
	/// Queue `task` to run after everything already posted.
	///
	/// Returns false, dropping the task, once the sequence has shut down.
	pub fn post_task(&self, task: impl FnOnce() + Send + 'static) -> bool {
		(self.post)(Box::new(task))
	}

	pub fn runs_tasks_in_current_sequence(&self) -> bool {
		CURRENT.try_with(|id| *id == self.id).unwrap_or(false)
	}
}

impl std::fmt::Debug for TaskRunner {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TaskRunner").field("id", &self.id.0).finish()
	}
}

/// Owns a value on a dedicated task.
///
/// The task exits, dropping the value, once every [Sequence] handle is dropped and the queue is empty.
pub struct Sequence<T> {
	tx: mpsc::UnboundedSender<Work<T>>,
	runner: TaskRunner,
}

impl<T: Send + 'static> Sequence<T> {
	/// Spawn on the current tokio runtime.
	///
	/// # Panics
	/// Panics when called outside of a tokio runtime.
	pub fn spawn<F>(init: F) -> Self
	where
		F: FnOnce(TaskRunner) -> T + Send + 'static,
	{
		Self::spawn_on(&Handle::current(), init)
	}

	pub fn spawn_on<F>(handle: &Handle, init: F) -> Self
	where
		F: FnOnce(TaskRunner) -> T + Send + 'static,
	{
		let (tx, mut rx) = mpsc::unbounded_channel::<Work<T>>();
		let id = SequenceId::next();

		let weak = tx.downgrade();
		let runner = TaskRunner {
			id,
			post: Arc::new(move |task| match weak.upgrade() {
				Some(tx) => tx.send(Work::Plain(task)).is_ok(),
				None => false,
			}),
		};

		let owner = runner.clone();
		handle.spawn(CURRENT.scope(id, async move {
			let mut value = init(owner);

			while let Some(work) = rx.recv().await {
				match work {
					Work::Owned(f) => f(&mut value),
					Work::Plain(f) => f(),
				}
			}

			tracing::trace!(id = id.0, "sequence closed");
		}));

		Self { tx, runner }
	}

	/// Queue `f` to run against the owned value.
	pub fn post<F>(&self, f: F) -> bool
	where
		F: FnOnce(&mut T) + Send + 'static,
	{
		self.tx.send(Work::Owned(Box::new(f))).is_ok()
	}

	/// Run `f` against the owned value and wait for its result.
	pub async fn call<F, R>(&self, f: F) -> Result<R>
	where
		F: FnOnce(&mut T) -> R + Send + 'static,
		R: Send + 'static,
	{
		let (tx, rx) = oneshot::channel();
		if !self.post(move |value| {
			let _ = tx.send(f(value));
		}) {
			return Err(Error::Closed);
		}
		rx.await.map_err(|_| Error::Closed)
	}

	pub fn runner(&self) -> TaskRunner {
		self.runner.clone()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Mutex;

	use futures::FutureExt;

	use super::*;

	#[tokio::test]
	async fn test_post_never_runs_inline() {
		let seq = Sequence::spawn(|_| 0);
		let (tx, rx) = oneshot::channel();

		seq.post(move |value: &mut i32| {
			*value += 1;
			let _ = tx.send(*value);
		});

		// The current thread runtime hasn't had a chance to run the sequence yet.
		let mut rx = rx;
		assert!((&mut rx).now_or_never().is_none());
		assert_eq!(rx.await.unwrap(), 1);
	}

	#[tokio::test]
	async fn test_fifo_order() {
		let seq = Sequence::spawn(|_| Vec::new());
		let runner = seq.runner();

		let order = Arc::new(Mutex::new(Vec::new()));
		for i in 0..5 {
			let order = order.clone();
			runner.post_task(move || order.lock().unwrap().push(i));
			seq.post(move |value: &mut Vec<i32>| value.push(i));
		}

		let owned = seq.call(|value| value.clone()).await.unwrap();
		assert_eq!(owned, vec![0, 1, 2, 3, 4]);
		assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
	}

	#[tokio::test]
	async fn test_runs_tasks_in_current_sequence() {
		let seq = Sequence::spawn(|runner| runner);
		let other = Sequence::spawn(|_| ());

		assert!(!seq.runner().runs_tasks_in_current_sequence());
		assert!(seq.call(|runner| runner.runs_tasks_in_current_sequence()).await.unwrap());

		let runner = seq.runner();
		assert!(!other.call(move |_| runner.runs_tasks_in_current_sequence()).await.unwrap());
	}

	#[tokio::test]
	async fn test_post_after_close_is_dropped() {
		let seq = Sequence::spawn(|_| ());
		let runner = seq.runner();
		drop(seq);

		assert!(!runner.post_task(|| unreachable!()));
	}

	#[tokio::test]
	async fn test_posting_from_inside() {
		let seq = Sequence::spawn(|runner| (runner, 0));
		let (tx, rx) = oneshot::channel();

		seq.post(move |(runner, count): &mut (TaskRunner, i32)| {
			*count += 1;
			let runner2 = runner.clone();
			runner.post_task(move || {
				let _ = tx.send(runner2.runs_tasks_in_current_sequence());
			});
		});

		assert!(rx.await.unwrap());
	}
}
