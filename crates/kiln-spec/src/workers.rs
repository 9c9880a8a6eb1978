//! Optional worker pool for offloading per-object work.

/// One unit of work dispatched to a pool.
pub type Job<'a> = Box<dyn FnOnce() + Send + 'a>;

/// External pool the pipeline may offload per-object cooks and package
/// writes to.
///
/// Fire-and-join: `run_all` must not return until every job has finished,
/// so callers can rely on completion without tracking the pool's internals.
pub trait WorkerPool: Sync {
    fn run_all(&self, jobs: Vec<Job<'_>>);
}

/// Pool running jobs on a fixed number of scoped threads.
#[derive(Debug, Clone, Copy)]
pub struct ScopedPool {
    threads: usize,
}

impl ScopedPool {
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }
}

impl WorkerPool for ScopedPool {
    fn run_all(&self, jobs: Vec<Job<'_>>) {
        if jobs.is_empty() {
            return;
        }
        let queue = std::sync::Mutex::new(jobs.into_iter());
        std::thread::scope(|scope| {
            for _ in 0..self.threads {
                scope.spawn(|| {
                    loop {
                        let job = {
                            let mut queue = match queue.lock() {
                                Ok(queue) => queue,
                                Err(_) => return,
                            };
                            queue.next()
                        };
                        match job {
                            Some(job) => job(),
                            None => return,
                        }
                    }
                });
            }
        });
    }
}
