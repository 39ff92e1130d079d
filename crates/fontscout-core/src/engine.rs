use crate::config::{AppConfig, DEFAULT_BATCH_SIZE};
use crate::error::Error;
use crate::matcher::{resolve_system_fonts, FontMatcher, ResolutionSummary};
use crate::progress::{ProgressReporter, ProgressThrottle, SilentReporter};
use crate::scanner::{self, FileKind, WalkOptions};
use crate::storage::{FontOccurrence, IndexStore};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Parameters for one scan.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub root: PathBuf,
    pub concurrency_limit: usize,
    pub skip_hidden: bool,
}

impl ScanRequest {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let defaults = AppConfig::default();
        Self {
            root: root.into(),
            concurrency_limit: defaults.concurrency_limit,
            skip_hidden: defaults.skip_hidden,
        }
    }

    pub fn from_config(root: impl Into<PathBuf>, config: &AppConfig) -> Self {
        Self {
            root: root.into(),
            concurrency_limit: config.concurrency_limit,
            skip_hidden: config.skip_hidden,
        }
    }

    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn with_skip_hidden(mut self, skip: bool) -> Self {
        self.skip_hidden = skip;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Structured status for an outer layer to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    #[default]
    Idle,
    Discovering,
    Extracting,
    /// Completed without finding any template file.
    NoTargetFiles,
    /// Completed; template files were found but none had a font tag.
    NoFontTags,
    Finished,
    Cancelled,
    InvalidRoot,
    DirectoryAccess,
    StoreFailure,
    /// The engine itself failed: a worker panicked or the pool could not
    /// be built.
    Internal,
}

/// Live view of the current (or last) scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanSnapshot {
    pub phase: ScanPhase,
    pub status: ScanStatus,
    pub error: Option<String>,
    pub files_total: usize,
    pub files_processed: usize,
    pub files_failed: usize,
    pub occurrences: usize,
    pub write_failures: usize,
    pub file_type_counts: BTreeMap<FileKind, usize>,
    pub font_counts: BTreeMap<String, usize>,
    /// File type a font was first attributed to during this run.
    pub font_file_types: BTreeMap<String, FileKind>,
    pub resolving: bool,
    pub resolution: Option<ResolutionSummary>,
}

impl ScanSnapshot {
    pub fn is_running(&self) -> bool {
        self.phase == ScanPhase::Running
    }

    fn running() -> Self {
        Self {
            phase: ScanPhase::Running,
            status: ScanStatus::Discovering,
            ..Self::default()
        }
    }
}

#[derive(Default)]
struct RunState {
    snapshot: ScanSnapshot,
    buffer: Vec<FontOccurrence>,
}

#[derive(Default)]
struct Shared {
    /// The single aggregation lock: every counter and the batch buffer.
    /// Never held while calling the reporter.
    state: Mutex<RunState>,
    /// Signalled whenever `snapshot.resolving` drops back to false.
    resolution_done: Condvar,
    /// Last extraction progress handed to the reporter. Serializes progress
    /// calls so observers see `processed` strictly increasing.
    last_progress: Mutex<Option<usize>>,
    cancel: Mutex<Arc<AtomicBool>>,
    resolver: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn end_resolution(&self) {
        self.state().snapshot.resolving = false;
        self.resolution_done.notify_all();
    }

    fn current_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn cancel(&self) {
        self.current_token().store(true, Ordering::Relaxed);
    }

    fn take_resolver(&self) -> Option<JoinHandle<()>> {
        self.resolver.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

/// Clears `resolving` when the resolution thread exits, panics included.
struct ResolvingGuard(Arc<Shared>);

impl Drop for ResolvingGuard {
    fn drop(&mut self) {
        self.0.end_resolution();
    }
}

/// Cancels whichever scan is current when [`CancelHandle::cancel`] is
/// called, including scans started after the handle was taken.
#[derive(Clone)]
pub struct CancelHandle {
    shared: Arc<Shared>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.shared.cancel();
    }
}

#[derive(Clone)]
struct Pipeline {
    store: Arc<IndexStore>,
    matcher: Arc<FontMatcher>,
    reporter: Arc<dyn ProgressReporter>,
    batch_size: usize,
    resolve_after_scan: bool,
    shared: Arc<Shared>,
}

/// Owns the scan lifecycle: discovery, bounded parallel extraction,
/// batched indexing and the follow-up resolution pass.
///
/// One scan runs at a time. Starting a new one cancels and joins the
/// previous scan and its resolution pass before the store is cleared.
pub struct ScanEngine {
    pipeline: Pipeline,
    scan_thread: Mutex<Option<JoinHandle<()>>>,
}

impl ScanEngine {
    pub fn new(store: Arc<IndexStore>, matcher: Arc<FontMatcher>) -> Self {
        Self {
            pipeline: Pipeline {
                store,
                matcher,
                reporter: Arc::new(SilentReporter),
                batch_size: DEFAULT_BATCH_SIZE,
                resolve_after_scan: true,
                shared: Arc::new(Shared::default()),
            },
            scan_thread: Mutex::new(None),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.pipeline.reporter = reporter;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.pipeline.batch_size = batch_size.max(1);
        self
    }

    pub fn with_resolution(mut self, enabled: bool) -> Self {
        self.pipeline.resolve_after_scan = enabled;
        self
    }

    pub fn with_config(self, config: &AppConfig) -> Self {
        self.with_batch_size(config.batch_size)
            .with_resolution(config.resolve_after_scan)
    }

    pub fn store(&self) -> &Arc<IndexStore> {
        &self.pipeline.store
    }

    pub fn matcher(&self) -> &Arc<FontMatcher> {
        &self.pipeline.matcher
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            shared: Arc::clone(&self.pipeline.shared),
        }
    }

    pub fn cancel(&self) {
        self.pipeline.shared.cancel();
    }

    pub fn snapshot(&self) -> ScanSnapshot {
        self.pipeline.shared.state().snapshot.clone()
    }

    /// Begin a scan in the background.
    ///
    /// An unusable root fails immediately with [`Error::InvalidRoot`] and no
    /// worker is spawned. Otherwise the index is cleared and the scan runs
    /// until [`ScanEngine::wait`] observes a terminal phase.
    pub fn start(&self, request: ScanRequest) -> Result<(), Error> {
        self.teardown();

        let shared = &self.pipeline.shared;
        let token = Arc::new(AtomicBool::new(false));
        *shared.cancel.lock().unwrap_or_else(|e| e.into_inner()) = Arc::clone(&token);
        *shared.state() = RunState {
            snapshot: ScanSnapshot::running(),
            buffer: Vec::new(),
        };
        *shared.last_progress.lock().unwrap_or_else(|e| e.into_inner()) = None;

        if let Err(reason) = validate_root(&request.root) {
            warn!("Rejecting scan root {}: {}", request.root.display(), reason);
            self.pipeline
                .finish(ScanPhase::Failed, ScanStatus::InvalidRoot, Some(reason.clone()));
            return Err(Error::InvalidRoot {
                path: request.root,
                reason,
            });
        }

        if let Err(err) = self.pipeline.store.clear() {
            error!("Could not clear index store: {}", err);
            self.pipeline
                .finish(ScanPhase::Failed, ScanStatus::StoreFailure, Some(err.to_string()));
            return Err(err.into());
        }

        info!(
            "Starting scan of {} ({} workers, skip hidden: {})",
            request.root.display(),
            request.concurrency_limit.max(1),
            request.skip_hidden
        );

        let pipeline = self.pipeline.clone();
        let handle = thread::Builder::new()
            .name("fontscout-scan".to_string())
            .spawn(move || pipeline.run(request, token))?;
        *self.scan_thread.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        Ok(())
    }

    /// Block until the current scan reaches a terminal phase. The
    /// resolution pass is not awaited.
    pub fn wait(&self) -> ScanSnapshot {
        let handle = self
            .scan_thread
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Scan thread panicked");
                self.pipeline.finish(
                    ScanPhase::Failed,
                    ScanStatus::Internal,
                    Some("scan thread panicked".to_string()),
                );
            }
        }
        self.snapshot()
    }

    /// `start` followed by `wait`.
    pub fn scan(&self, request: ScanRequest) -> Result<ScanSnapshot, Error> {
        self.start(request)?;
        Ok(self.wait())
    }

    /// Block until no resolution pass is running and return the snapshot.
    /// Returns at once when the last scan did not start one.
    pub fn wait_for_resolution(&self) -> ScanSnapshot {
        let shared = &self.pipeline.shared;
        if let Some(handle) = shared.take_resolver() {
            if handle.join().is_err() {
                error!("Resolution thread panicked");
            }
        }
        let mut state = shared.state();
        while state.snapshot.resolving {
            state = shared
                .resolution_done
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
        state.snapshot.clone()
    }

    fn teardown(&self) {
        self.cancel();
        self.wait();
        self.wait_for_resolution();
    }
}

impl Drop for ScanEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl Pipeline {
    fn run(&self, request: ScanRequest, cancel: Arc<AtomicBool>) {
        self.reporter.on_discovery_start();
        let walk_start = Instant::now();
        let options = WalkOptions {
            skip_hidden: request.skip_hidden,
        };

        let discovery = match scanner::discover_template_files(&request.root, &options, &cancel) {
            Ok(discovery) => discovery,
            Err(err) => {
                error!("{}", err);
                self.finish(
                    ScanPhase::Failed,
                    ScanStatus::DirectoryAccess,
                    Some(err.to_string()),
                );
                return;
            }
        };
        let walk_duration = walk_start.elapsed();

        if cancel.load(Ordering::Relaxed) {
            self.finish_cancelled();
            return;
        }

        let total = discovery.files.len();
        self.reporter
            .on_discovery_complete(total, walk_duration.as_secs_f64());
        debug!(
            "Discovery completed in {:.2}s: {} files",
            walk_duration.as_secs_f64(),
            total
        );

        {
            let mut state = self.shared.state();
            state.snapshot.files_total = total;
            state.snapshot.status = ScanStatus::Extracting;
            if let Some(first) = discovery.issues.first() {
                state.snapshot.error = Some(format!(
                    "{} directories could not be read (first: {}: {})",
                    discovery.issues.len(),
                    first.path.display(),
                    first.message
                ));
            }
        }

        self.report_progress(0, total);

        if discovery.is_empty() {
            info!("No template files under {}", request.root.display());
            self.reporter.on_extract_complete(0, 0.0);
            self.finish(ScanPhase::Completed, ScanStatus::NoTargetFiles, None);
            return;
        }

        let extract_start = Instant::now();
        let pool = match ThreadPoolBuilder::new()
            .num_threads(request.concurrency_limit.max(1))
            .thread_name(|i| format!("fontscout-extract-{}", i))
            .build()
        {
            Ok(pool) => pool,
            Err(err) => {
                error!("Could not build extraction pool: {}", err);
                self.finish(ScanPhase::Failed, ScanStatus::Internal, Some(err.to_string()));
                return;
            }
        };

        let throttle = ProgressThrottle::new(total);
        pool.install(|| {
            discovery.files.par_iter().for_each(|path| {
                if cancel.load(Ordering::Relaxed) {
                    return;
                }
                let result = scanner::extract_fonts(path, &cancel);
                let (processed, batch) = self.accumulate(path, result);
                if throttle.should_report(processed) {
                    self.report_progress(processed, total);
                }
                if let Some(batch) = batch {
                    self.flush(batch);
                }
            });
        });

        let remainder = mem::take(&mut self.shared.state().buffer);
        self.flush(remainder);

        let extract_duration = extract_start.elapsed();
        debug!(
            "Extraction completed in {:.2}s",
            extract_duration.as_secs_f64()
        );

        if cancel.load(Ordering::Relaxed) {
            self.finish_cancelled();
            return;
        }

        let occurrences = match self.publish_from_store() {
            Ok(occurrences) => occurrences,
            Err(err) => {
                error!("Could not read final aggregates: {}", err);
                self.finish(
                    ScanPhase::Failed,
                    ScanStatus::StoreFailure,
                    Some(err.to_string()),
                );
                return;
            }
        };
        self.reporter
            .on_extract_complete(occurrences, extract_duration.as_secs_f64());

        if occurrences == 0 {
            let write_failures = self.shared.state().snapshot.write_failures;
            if write_failures > 0 {
                error!("{} template files scanned, every batch failed to store", total);
                self.finish(ScanPhase::Completed, ScanStatus::StoreFailure, None);
            } else {
                info!("{} template files scanned, no font tags found", total);
                self.finish(ScanPhase::Completed, ScanStatus::NoFontTags, None);
            }
            return;
        }

        info!(
            "Scan finished: {} occurrences in {} files",
            occurrences, total
        );

        // Completed and resolving are published together so an observer
        // never sees a finished scan whose resolution pass has not begun.
        {
            let mut state = self.shared.state();
            state.snapshot.phase = ScanPhase::Completed;
            state.snapshot.status = ScanStatus::Finished;
            state.snapshot.resolving = self.resolve_after_scan;
        }

        if self.resolve_after_scan {
            self.spawn_resolution(cancel);
        }
    }

    /// Fold one file's result into the run aggregates. Returns the new
    /// processed count and, once the buffer reaches the threshold, a batch
    /// to write.
    fn accumulate(
        &self,
        path: &Path,
        result: Result<Vec<FontOccurrence>, Error>,
    ) -> (usize, Option<Vec<FontOccurrence>>) {
        let mut state = self.shared.state();
        let RunState { snapshot, buffer } = &mut *state;

        match result {
            Ok(found) => {
                for occurrence in &found {
                    *snapshot
                        .font_counts
                        .entry(occurrence.font_name.clone())
                        .or_insert(0) += 1;
                    snapshot
                        .font_file_types
                        .entry(occurrence.font_name.clone())
                        .or_insert(occurrence.file_type);
                    *snapshot
                        .file_type_counts
                        .entry(occurrence.file_type)
                        .or_insert(0) += 1;
                }
                snapshot.occurrences += found.len();
                buffer.extend(found);
            }
            Err(err) => {
                warn!("Skipping {}: {}", path.display(), err);
                snapshot.files_failed += 1;
            }
        }

        snapshot.files_processed += 1;

        let batch = if buffer.len() >= self.batch_size {
            Some(mem::take(buffer))
        } else {
            None
        };
        (snapshot.files_processed, batch)
    }

    /// Forward progress outside the aggregation lock, so a reporter may read
    /// [`ScanEngine::snapshot`]. Events that lost the race to a later count
    /// are dropped.
    fn report_progress(&self, processed: usize, total: usize) {
        let mut last = self
            .shared
            .last_progress
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if last.map_or(true, |reported| processed > reported) {
            *last = Some(processed);
            self.reporter.on_extract_progress(processed, total);
        }
    }

    fn flush(&self, batch: Vec<FontOccurrence>) {
        if batch.is_empty() {
            return;
        }
        match self.store.insert_batch(&batch) {
            Ok(rows) => self.reporter.on_batch_flushed(rows),
            Err(err) => {
                error!("Dropping batch of {} occurrences: {}", batch.len(), err);
                let mut state = self.shared.state();
                state.snapshot.write_failures += 1;
                state.snapshot.error = Some(format!(
                    "{} occurrences could not be stored: {}",
                    batch.len(),
                    err
                ));
            }
        }
    }

    /// Replace the in-memory aggregates with the ones the store holds.
    fn publish_from_store(&self) -> Result<usize, Error> {
        let total = self.store.total_count()? as usize;
        let file_type_counts = self
            .store
            .file_type_counts()?
            .into_iter()
            .map(|(kind, count)| (kind, count as usize))
            .collect();
        let font_counts = self
            .store
            .font_name_counts()?
            .into_iter()
            .map(|(name, count)| (name, count as usize))
            .collect();
        let font_file_types = self.store.font_file_types()?;

        let mut state = self.shared.state();
        state.snapshot.occurrences = total;
        state.snapshot.file_type_counts = file_type_counts;
        state.snapshot.font_counts = font_counts;
        state.snapshot.font_file_types = font_file_types;
        Ok(total)
    }

    /// Run the resolution pass on its own thread. The caller has already
    /// set `snapshot.resolving`.
    fn spawn_resolution(&self, cancel: Arc<AtomicBool>) {
        let pipeline = self.clone();

        let spawned = thread::Builder::new()
            .name("fontscout-resolve".to_string())
            .spawn(move || {
                let _resolving = ResolvingGuard(Arc::clone(&pipeline.shared));
                let fonts = pipeline.shared.state().snapshot.font_counts.len();
                pipeline.reporter.on_resolution_start(fonts);

                match resolve_system_fonts(&pipeline.store, &pipeline.matcher, &cancel) {
                    Ok(summary) => {
                        pipeline.shared.state().snapshot.resolution = Some(summary);
                        pipeline
                            .reporter
                            .on_resolution_complete(summary.installed, summary.resolved);
                    }
                    Err(Error::Cancelled) => debug!("Resolution pass cancelled"),
                    Err(err) => error!("Resolution pass failed: {}", err),
                }
            });

        match spawned {
            Ok(handle) => {
                *self.shared.resolver.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
            }
            Err(err) => {
                error!("Could not start resolution pass: {}", err);
                self.shared.end_resolution();
            }
        }
    }

    fn finish_cancelled(&self) {
        info!("Scan cancelled");
        self.finish(ScanPhase::Cancelled, ScanStatus::Cancelled, None);
    }

    /// Move to a terminal phase. `error` replaces the message only when set,
    /// so a directory or write failure recorded mid-run survives completion.
    fn finish(&self, phase: ScanPhase, status: ScanStatus, error: Option<String>) {
        let mut state = self.shared.state();
        state.snapshot.phase = phase;
        state.snapshot.status = status;
        if error.is_some() {
            state.snapshot.error = error;
        }
    }
}

fn validate_root(root: &Path) -> Result<(), String> {
    if root.as_os_str().is_empty() {
        return Err("no root path given".to_string());
    }
    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err("not a directory".to_string()),
        Err(err) => Err(err.to_string()),
    }
}
