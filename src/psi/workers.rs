//! Adaptive worker sizing.
//!
//! The detection engine holds per-worker scratch and the full gadget-
//! expanded witness set in RAM, so the worker count is the knob that keeps
//! total memory under 85% of budget while saturating the cores the cache
//! can feed. The formula is part of the operating contract: it defines the
//! envelope the reference deployment was tuned on.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Resource model for worker sizing. Defaults describe the reference
/// platform (dual-socket 48-core, 117 GB free); deployments override.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// RAM available to the PSI process, in GB.
    pub available_ram_gb: f64,
    /// Physical core budget.
    pub hardware_cores: usize,
    /// Estimated RAM per record in GB: 12 MB gadget-expanded witnesses,
    /// ~13 MB worker scratch, ~10 MB overhead.
    pub mem_per_record_gb: f64,
    /// Multiplier applied to the per-record estimate.
    pub safety_margin: f64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            available_ram_gb: 117.0,
            hardware_cores: 48,
            mem_per_record_gb: 0.035,
            safety_margin: 1.15,
        }
    }
}

impl WorkerConfig {
    /// Config with the core count detected from the current machine,
    /// keeping the reference memory model.
    pub fn detected() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(8);
        Self {
            hardware_cores: cores,
            ..Self::default()
        }
    }
}

/// Practical minimum worker count; below this, dispatch overhead dominates
/// on multi-socket machines.
const PRACTICAL_MINIMUM: usize = 8;

/// Dataset size above which the cache constraint engages.
const CACHE_FREE_LIMIT: usize = 100;

/// Worker count for a dataset of `size` records.
///
/// ```text
/// est         = size · mem_per_record · safety_margin
/// mem_limit   = cores                          if est ≤ 0.6·ram
///             = (ram·0.85)/est · cores         otherwise
/// cache_limit = cores                          if size ≤ 100
///             = clamp(1.5·√size, 16, cores)    otherwise
/// workers     = clamp(min(mem_limit, cache_limit, cores), 8, cores)
/// ```
pub fn workers(size: usize, cfg: &WorkerConfig) -> usize {
    let cores = cfg.hardware_cores;

    let estimated = size as f64 * cfg.mem_per_record_gb * cfg.safety_margin;
    let mut memory_limit = cores;
    if estimated > cfg.available_ram_gb * 0.6 {
        memory_limit = ((cfg.available_ram_gb * 0.85) / estimated * cores as f64) as usize;
    }

    let mut cache_limit = cores;
    if size > CACHE_FREE_LIMIT {
        cache_limit = (1.5 * (size as f64).sqrt()) as usize;
        if cache_limit > cores {
            cache_limit = cores;
        }
        if cache_limit < 16 {
            cache_limit = 16;
        }
    }

    // The practical minimum is applied last: on sub-8-core overrides the
    // engine oversubscribes rather than starve the dispatch loop.
    let mut optimal = memory_limit.min(cache_limit).min(cores);
    if optimal < PRACTICAL_MINIMUM {
        optimal = PRACTICAL_MINIMUM;
    }

    debug!(
        size,
        workers = optimal,
        estimated_ram_gb = size as f64 * cfg.mem_per_record_gb,
        memory_limit,
        cache_limit,
        "adaptive worker sizing"
    );
    optimal
}
