//! Cook pass driver: change detection, backend resolution, staged output.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use kiln_path::ProjectPath;
use kiln_spec::{DataSpec, DataSpecEntry, Job, ProgressSink, ToolMode, WorkerPool};
use tracing::{debug, warn};

use crate::error::{ProjectError, Result};
use crate::fingerprint::file_fingerprint;
use crate::interrupt::{interrupt_requested, reset_interrupt};
use crate::project::Project;

/// Options for one cook invocation.
#[derive(Debug, Clone)]
pub struct CookOptions {
    /// Descend into subdirectories of the requested path.
    pub recursive: bool,
    /// Cook even when the source fingerprint is unchanged.
    pub force: bool,
    /// Faster draft cooking for backends that support it.
    pub fast: bool,
    /// Abort the whole run on the first per-object failure.
    pub fail_fast: bool,
    /// Cook with this backend only, regardless of the enable set.
    pub spec: Option<String>,
    /// Cook pass index in `[0, num_cook_passes)`; negative means "always
    /// cook", ignoring pass gating.
    pub pass: i32,
}

impl Default for CookOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            force: false,
            fast: false,
            fail_fast: false,
            spec: None,
            pass: -1,
        }
    }
}

/// Object counts for a cook run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CookStats {
    pub cooked: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl CookStats {
    fn merge(&mut self, other: CookStats) {
        self.cooked += other.cooked;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// How a cook run ended. Cancellation is a distinct outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookOutcome {
    Completed(CookStats),
    Interrupted(CookStats),
}

struct CookJob {
    path: ProjectPath,
    entry: Arc<DataSpecEntry>,
    spec: Arc<dyn DataSpec>,
    cooked: PathBuf,
    /// Fingerprint to record on success; `None` when the path is untracked
    /// or this is not the final pass.
    fingerprint: Option<String>,
}

impl Project {
    /// Cook the working resources under `path` for one pass.
    ///
    /// Objects are visited in deterministic working-tree traversal order.
    /// For each path the claiming backend is resolved via `can_cook` in
    /// registration order, then given a chance to redirect via
    /// `override_data_spec`. Objects whose fingerprint is unchanged since
    /// the last successful cook are skipped unless `force` is set. Cooked
    /// bytes are staged to a temporary file and only renamed into place on
    /// success, so outputs are always complete or absent.
    ///
    /// Callers drive multi-pass backends by invoking this once per pass
    /// index, or use [`Project::cook_all_passes`].
    pub fn cook_path(
        &self,
        path: &ProjectPath,
        progress: &dyn ProgressSink,
        options: &CookOptions,
        workers: Option<&dyn WorkerPool>,
    ) -> Result<CookOutcome> {
        if options.pass <= 0 {
            // Reference resolution starts over with each invocation.
            self.bridge_cache.clear();
        }
        let mut stats = CookStats::default();
        if interrupt_requested() {
            return Ok(CookOutcome::Interrupted(stats));
        }

        let actives = self.active_specs(options.spec.as_deref())?;
        let files = self.collect_files(path, options.recursive)?;
        let tracked = self.tracked_paths()?;

        let mut instances: HashMap<String, Arc<dyn DataSpec>> = HashMap::new();
        let mut jobs: Vec<CookJob> = Vec::new();

        for file in files {
            let Some((entry, spec)) =
                self.resolve_claim(&file, &actives, options.pass, &mut instances)
            else {
                continue;
            };
            let cooked = self.cooked_output_for(&entry, &file);
            let abs = self.root.resolve(&file);

            let current = match file_fingerprint(&abs) {
                Ok(fingerprint) => fingerprint,
                Err(err) => {
                    warn!(path = %file, error = %err, "failed to fingerprint source");
                    stats.failed += 1;
                    if options.fail_fast {
                        return Err(ProjectError::io("hash", &abs, err));
                    }
                    continue;
                }
            };

            let unchanged = tracked.get(&file) == Some(&current);
            if !options.force && unchanged && cooked.is_file() {
                debug!(path = %file, "fingerprint unchanged, skipping");
                stats.skipped += 1;
                continue;
            }

            let final_pass =
                options.pass < 0 || (options.pass as u32) + 1 >= entry.num_cook_passes();
            let fingerprint = (final_pass && tracked.contains_key(&file)).then_some(current);

            jobs.push(CookJob {
                path: file,
                entry,
                spec,
                cooked,
                fingerprint,
            });
        }

        let outcome = self.run_jobs(jobs, &mut stats, progress, options, workers)?;
        Ok(outcome)
    }

    /// Cook `path` once per pass declared by the resolved backend(s),
    /// resetting the cancellation flag first.
    ///
    /// Multi-pass backends resolve forward references this way: an object
    /// that references a not-yet-cooked object records a placeholder through
    /// the bridge cache and is revisited on the next pass, once its
    /// dependency has a stable id.
    pub fn cook_all_passes(
        &self,
        path: &ProjectPath,
        progress: &dyn ProgressSink,
        options: &CookOptions,
        workers: Option<&dyn WorkerPool>,
    ) -> Result<CookOutcome> {
        reset_interrupt();
        let passes = self.resolve_pass_count(options.spec.as_deref())?;
        let mut total = CookStats::default();

        for pass in 0..passes {
            let mut pass_options = options.clone();
            pass_options.pass = pass as i32;
            match self.cook_path(path, progress, &pass_options, workers)? {
                CookOutcome::Completed(stats) => total.merge(stats),
                CookOutcome::Interrupted(stats) => {
                    total.merge(stats);
                    return Ok(CookOutcome::Interrupted(total));
                }
            }
        }
        Ok(CookOutcome::Completed(total))
    }

    /// Activation records participating in a cook: the manually selected
    /// backend, or every enabled one.
    fn active_specs(&self, selected: Option<&str>) -> Result<Vec<Arc<DataSpecEntry>>> {
        match selected {
            Some(name) => {
                let entry = self
                    .registry
                    .find(name)
                    .ok_or_else(|| ProjectError::UnknownSpec {
                        name: name.to_string(),
                    })?;
                Ok(vec![entry])
            }
            None => {
                let enabled: Vec<Arc<DataSpecEntry>> = self
                    .compiled_specs
                    .iter()
                    .filter(|pds| pds.enabled)
                    .map(|pds| Arc::clone(&pds.entry))
                    .collect();
                if enabled.is_empty() {
                    return Err(ProjectError::NoActiveSpec);
                }
                Ok(enabled)
            }
        }
    }

    fn resolve_pass_count(&self, selected: Option<&str>) -> Result<u32> {
        let actives = self.active_specs(selected)?;
        Ok(actives
            .iter()
            .map(|entry| entry.num_cook_passes())
            .max()
            .unwrap_or(1))
    }

    /// First backend in registration order claiming `file` for this pass,
    /// after any content-based redirect.
    fn resolve_claim(
        &self,
        file: &ProjectPath,
        actives: &[Arc<DataSpecEntry>],
        pass: i32,
        instances: &mut HashMap<String, Arc<dyn DataSpec>>,
    ) -> Option<(Arc<DataSpecEntry>, Arc<dyn DataSpec>)> {
        for entry in actives {
            let spec = self.cook_instance(instances, entry);
            if !spec.can_cook(file, &self.bridge, pass) {
                continue;
            }
            let resolved = spec.override_data_spec(file, entry, &self.bridge);
            if resolved.name() == entry.name() {
                return Some((resolved, spec));
            }
            debug!(path = %file, from = entry.name(), to = resolved.name(), "backend override");
            let redirected = self.cook_instance(instances, &resolved);
            return Some((resolved, redirected));
        }
        None
    }

    /// Cook-mode backend instance for `entry`, constructed once per run.
    fn cook_instance(
        &self,
        instances: &mut HashMap<String, Arc<dyn DataSpec>>,
        entry: &Arc<DataSpecEntry>,
    ) -> Arc<dyn DataSpec> {
        Arc::clone(
            instances
                .entry(entry.name().to_string())
                .or_insert_with(|| {
                    Arc::from(entry.instantiate(&self.spec_context(entry), ToolMode::Cook))
                }),
        )
    }

    /// Mirrored cooked-output location for `file` under `entry`'s subtree.
    fn cooked_output_for(&self, entry: &Arc<DataSpecEntry>, file: &ProjectPath) -> PathBuf {
        Self::cooked_mirror(&self.spec_context(entry).cooked_root, file)
    }

    fn run_jobs(
        &self,
        jobs: Vec<CookJob>,
        stats: &mut CookStats,
        progress: &dyn ProgressSink,
        options: &CookOptions,
        workers: Option<&dyn WorkerPool>,
    ) -> Result<CookOutcome> {
        let total = jobs.len().max(1);
        let mut updates: Vec<(ProjectPath, String)> = Vec::new();

        match workers {
            None => {
                for (index, job) in jobs.into_iter().enumerate() {
                    if interrupt_requested() {
                        self.record_fingerprints(&updates)?;
                        return Ok(CookOutcome::Interrupted(*stats));
                    }
                    match self.run_one(&job, options) {
                        Ok(()) => {
                            stats.cooked += 1;
                            if let Some(fingerprint) = job.fingerprint {
                                updates.push((job.path.clone(), fingerprint));
                            }
                        }
                        Err(err) => {
                            warn!(path = %job.path, backend = job.entry.name(), error = %err, "cook failed");
                            stats.failed += 1;
                            if options.fail_fast {
                                self.record_fingerprints(&updates)?;
                                return Err(ProjectError::SpecFailed {
                                    name: job.entry.name().to_string(),
                                    source: err.into(),
                                });
                            }
                        }
                    }
                    progress.report(job.path.as_str(), (index + 1) as f32 / total as f32);
                }
            }
            Some(pool) => {
                let done = AtomicUsize::new(0);
                let shared: Mutex<(CookStats, Vec<(ProjectPath, String)>, Option<ProjectError>)> =
                    Mutex::new((*stats, Vec::new(), None));

                let boxed: Vec<Job<'_>> = jobs
                    .iter()
                    .map(|job| {
                        let shared = &shared;
                        let done = &done;
                        Box::new(move || {
                            if interrupt_requested() {
                                return;
                            }
                            let result = self.run_one(job, options);
                            let fraction =
                                (done.fetch_add(1, Ordering::SeqCst) + 1) as f32 / total as f32;
                            progress.report(job.path.as_str(), fraction);
                            if let Ok(mut shared) = shared.lock() {
                                match result {
                                    Ok(()) => {
                                        shared.0.cooked += 1;
                                        if let Some(fingerprint) = &job.fingerprint {
                                            shared.1.push((job.path.clone(), fingerprint.clone()));
                                        }
                                    }
                                    Err(err) => {
                                        warn!(path = %job.path, error = %err, "cook failed");
                                        shared.0.failed += 1;
                                        if shared.2.is_none() {
                                            shared.2 = Some(ProjectError::SpecFailed {
                                                name: job.entry.name().to_string(),
                                                source: err.into(),
                                            });
                                        }
                                    }
                                }
                            }
                        }) as Job<'_>
                    })
                    .collect();
                pool.run_all(boxed);

                let (pool_stats, pool_updates, first_error) = match shared.into_inner() {
                    Ok(inner) => inner,
                    Err(poisoned) => poisoned.into_inner(),
                };
                *stats = pool_stats;
                updates = pool_updates;
                if options.fail_fast
                    && let Some(err) = first_error
                {
                    self.record_fingerprints(&updates)?;
                    return Err(err);
                }
            }
        }

        self.record_fingerprints(&updates)?;
        if interrupt_requested() {
            return Ok(CookOutcome::Interrupted(*stats));
        }
        Ok(CookOutcome::Completed(*stats))
    }

    /// Cook one object through its backend, staging the output so it is
    /// published atomically on success.
    fn run_one(&self, job: &CookJob, options: &CookOptions) -> anyhow::Result<()> {
        if let Some(parent) = job.cooked.parent() {
            fs::create_dir_all(parent)?;
        }
        let staging = staging_path(&job.cooked);
        let result = job.spec.do_cook(
            &job.path,
            &staging,
            options.fast,
            &self.bridge_cache,
            &self.bridge,
            &|label| debug!(backend = job.entry.name(), label, "cooking"),
        );
        match result {
            Ok(()) => {
                fs::rename(&staging, &job.cooked)?;
                Ok(())
            }
            Err(err) => {
                if staging.exists() {
                    let _ = fs::remove_file(&staging);
                }
                Err(err)
            }
        }
    }
}

fn staging_path(cooked: &std::path::Path) -> PathBuf {
    let mut name = cooked
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".cooktmp");
    cooked.with_file_name(name)
}
