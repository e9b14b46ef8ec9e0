//! Project-size evaluator (§4.8): decides single-process vs. worker
//! pool from file count, total bytes, package count, largest package
//! size, and average files per package.

#[derive(Debug, Clone, Default)]
pub struct ProjectMetrics {
    pub total_files: usize,
    pub total_bytes: u64,
    pub package_count: usize,
    pub largest_package_files: usize,
    pub avg_files_per_package: f64,
}

impl ProjectMetrics {
    /// 0.5 MB/file linear memory estimate, per §4.8/§5.
    pub fn estimated_memory_bytes(&self) -> u64 {
        (self.total_files as u64) * 512 * 1024
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    SingleProcess,
    WorkerPool,
}

const SINGLE_PROCESS_MAX_FILES: usize = 1000;
const SINGLE_PROCESS_MAX_BYTES: u64 = 100 * 1024 * 1024;
const SINGLE_PROCESS_MAX_PACKAGES: usize = 20;
const SINGLE_PROCESS_MAX_FILES_PER_PACKAGE: usize = 200;
const SINGLE_PROCESS_MAX_MEMORY: u64 = 512 * 1024 * 1024;

/// Very large projects (more than 10x the single-process package
/// threshold) use a finer worker-count divisor so no single worker gets
/// an outsized batch.
const VERY_LARGE_PACKAGE_COUNT: usize = 200;

pub fn choose_strategy(metrics: &ProjectMetrics) -> Strategy {
    let under_threshold = metrics.total_files < SINGLE_PROCESS_MAX_FILES
        && metrics.total_bytes < SINGLE_PROCESS_MAX_BYTES
        && metrics.package_count < SINGLE_PROCESS_MAX_PACKAGES
        && metrics.largest_package_files < SINGLE_PROCESS_MAX_FILES_PER_PACKAGE
        && metrics.estimated_memory_bytes() < SINGLE_PROCESS_MAX_MEMORY;

    if under_threshold {
        Strategy::SingleProcess
    } else {
        Strategy::WorkerPool
    }
}

pub fn worker_count(metrics: &ProjectMetrics, cpu_count: usize, override_count: Option<usize>) -> usize {
    if let Some(n) = override_count {
        return n.max(1);
    }
    let divisor = if metrics.package_count > VERY_LARGE_PACKAGE_COUNT { 10 } else { 20 };
    let by_packages = (metrics.package_count + divisor - 1) / divisor;
    cpu_count.min(8).min(by_packages.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_project_runs_single_process() {
        let metrics = ProjectMetrics {
            total_files: 50,
            total_bytes: 1_000_000,
            package_count: 5,
            largest_package_files: 20,
            avg_files_per_package: 10.0,
        };
        assert_eq!(choose_strategy(&metrics), Strategy::SingleProcess);
    }

    #[test]
    fn large_project_uses_worker_pool() {
        let metrics = ProjectMetrics {
            total_files: 5000,
            total_bytes: 200_000_000,
            package_count: 100,
            largest_package_files: 50,
            avg_files_per_package: 50.0,
        };
        assert_eq!(choose_strategy(&metrics), Strategy::WorkerPool);
    }

    #[test]
    fn worker_count_is_capped_at_eight() {
        let metrics = ProjectMetrics {
            total_files: 10_000,
            total_bytes: 500_000_000,
            package_count: 400,
            largest_package_files: 50,
            avg_files_per_package: 25.0,
        };
        assert_eq!(worker_count(&metrics, 64, None), 8);
    }

    #[test]
    fn override_count_wins() {
        let metrics = ProjectMetrics::default();
        assert_eq!(worker_count(&metrics, 64, Some(3)), 3);
    }
}
