//! Background file operations.
//!
//! Background variants run on worker threads with their own progress
//! handle.  They never prompt: pre-validation is stricter than in the
//! interactive paths and any conflict fails fast.  The worker only
//! mutates the progress fields behind the lock; the main loop reads
//! them between redraw ticks.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use parking_lot::Mutex;
use skiff_ops::{perform_operation, Op, OpData};
use tracing::debug;

/// Progress of one background task.
#[derive(Debug, Clone, Default)]
pub struct BgProgress {
	pub done: usize,
	pub total: usize,
	/// Bytes or items handled, depending on the task.
	pub last_progress: u64,
	/// What the task is currently working on.
	pub last_stage: String,
	/// Items per second.
	pub rate: f64,
}

/// A running background task and its shared progress handle.
pub struct BgTask {
	progress: Arc<Mutex<BgProgress>>,
	handle: JoinHandle<()>,
}

impl std::fmt::Debug for BgTask {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BgTask")
			.field("progress", &self.progress)
			.field("finished", &self.handle.is_finished())
			.finish()
	}
}

impl BgTask {
	/// Snapshot of the progress fields.
	pub fn progress(&self) -> BgProgress {
		self.progress.lock().clone()
	}

	pub fn is_finished(&self) -> bool {
		self.handle.is_finished()
	}

	/// Waits for the worker to finish and returns the final progress.
	pub fn join(self) -> BgProgress {
		let _ = self.handle.join();
		let progress = self.progress.lock().clone();
		progress
	}
}

fn spawn<F>(descr: &str, total: usize, work: F) -> BgTask
where
	F: FnOnce(&Mutex<BgProgress>) + Send + 'static,
{
	let progress = Arc::new(Mutex::new(BgProgress {
		total,
		last_stage: descr.to_string(),
		..BgProgress::default()
	}));
	let shared = Arc::clone(&progress);

	let handle = thread::spawn(move || {
		work(&shared);
	});

	BgTask { progress, handle }
}

fn advance(progress: &Mutex<BgProgress>, stage: &Path, started: Instant) {
	let mut p = progress.lock();
	p.done += 1;
	p.last_stage = stage.display().to_string();
	let secs = started.elapsed().as_secs_f64();
	if secs > 0.0 {
		p.rate = p.done as f64 / secs;
	}
}

/// Copies or moves `(src, dst)` pairs in the background.
///
/// Conflicts were rejected up front, but the filesystem may have
/// changed since: equal paths, vanished sources and newly appeared
/// destinations are skipped silently.
pub fn cpmv_bg(pairs: Vec<(PathBuf, PathBuf)>, mv: bool) -> BgTask {
	let descr = if mv { "Moving" } else { "Copying" };
	spawn(descr, pairs.len(), move |progress| {
		let started = Instant::now();
		for (src, dst) in pairs {
			if src == dst
				|| fs::symlink_metadata(&src).is_err()
				|| fs::symlink_metadata(&dst).is_ok()
			{
				advance(progress, &src, started);
				continue;
			}

			let op = if mv { Op::Move } else { Op::Copy };
			let result = perform_operation(op, &OpData::None, Some(&src), Some(&dst));
			debug!(?src, ?dst, ?result, "background transfer step");
			advance(progress, &src, started);
		}
	})
}

/// Removes paths in the background.
pub fn delete_bg(paths: Vec<PathBuf>) -> BgTask {
	spawn("Deleting", paths.len(), move |progress| {
		let started = Instant::now();
		for path in paths {
			let _ = perform_operation(Op::Remove, &OpData::None, Some(&path), None);
			advance(progress, &path, started);
		}
	})
}

/// Computes the recursive size of a tree, reporting it through
/// `last_progress`.
pub fn size_bg(path: PathBuf) -> BgTask {
	spawn("Estimating size", 1, move |progress| {
		fn walk(path: &Path, progress: &Mutex<BgProgress>) -> u64 {
			let Ok(meta) = fs::symlink_metadata(path) else {
				return 0;
			};
			if !meta.is_dir() {
				let mut p = progress.lock();
				p.last_progress += meta.len();
				return meta.len();
			}
			let mut total = 0;
			if let Ok(dir) = fs::read_dir(path) {
				for entry in dir.flatten() {
					total += walk(&entry.path(), progress);
				}
			}
			total
		}

		let started = Instant::now();
		walk(&path, progress);
		advance(progress, &path, started);
	})
}
