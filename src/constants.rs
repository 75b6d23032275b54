//! Mission core constants
//!
//! Every tunable default lives here so the config layer and the
//! subsystems agree on the same numbers.

/// Registry defaults
pub mod registry {
    /// Name lookups are the hottest path, so they get a short-lived cache
    pub const NAME_CACHE_TTL_SECS: f64 = 1.0;
    /// Interval between opportunistic cleanup passes
    pub const CLEANUP_INTERVAL_SECS: f64 = 30.0;
    /// Exited records idle longer than this are purged
    pub const EXITED_IDLE_SECS: f64 = 300.0;
    /// Upper bound on cached name lookups
    pub const NAME_CACHE_MAX_SIZE: usize = 512;
}

/// Query cache defaults
pub mod cache {
    pub const DEFAULT_TTL_SECS: f64 = 5.0;
    pub const MAX_SIZE: usize = 1000;
    /// Fraction of entries evicted when the cache is full
    pub const EVICTION_FRACTION: f64 = 0.10;
    /// Fraction of entries considered hot/cold during adaptive tuning
    pub const TUNING_FRACTION: f64 = 0.10;
    pub const MIN_TTL_SECS: f64 = 0.05;
    pub const MAX_TTL_SECS: f64 = 60.0;
}

/// Error handler defaults
pub mod errors {
    pub const HISTORY_SIZE: usize = 1000;
    pub const SUPPRESSION_WINDOW_SECS: f64 = 1.0;
    /// Rolling window used for the errors-per-minute rate
    pub const RATE_WINDOW_SECS: f64 = 300.0;
    pub const TIMEOUT_MAX_ATTEMPTS: u32 = 3;
    pub const TIMEOUT_BASE_MS: u64 = 100;
    pub const RESOURCE_WAIT_MS: u64 = 250;
    /// Attempts older than this no longer count towards a retry budget
    pub const RETRY_WINDOW_SECS: f64 = 10.0;
}

/// Performance monitor defaults
pub mod monitor {
    pub const SAMPLE_RING_SIZE: usize = 100;
    pub const TUNING_INTERVAL_SECS: f64 = 30.0;
    pub const BATCH_MAX_SIZE: usize = 50;
    /// One frame at 60 fps
    pub const BATCH_BUDGET_MS: f64 = 16.0;
    pub const DEFAULT_THRESHOLD_MS: f64 = 1.0;

    /// Per-operation slow thresholds in milliseconds
    pub const OPERATION_THRESHOLDS_MS: [(&str, f64); 8] = [
        ("hull", 0.5),
        ("shield", 0.5),
        ("position", 0.2),
        ("velocity", 0.2),
        ("distance", 0.2),
        ("subsystem", 0.5),
        ("find_by_name", 1.0),
        ("register", 1.0),
    ];
}

/// Entity interface defaults
pub mod entity {
    /// Status results are cached for roughly one frame
    pub const STATUS_CACHE_TTL_MS: f64 = 16.0;
}

/// Scripting numeric contract
pub mod script {
    /// Object is not resolvable right now but may be later
    pub const UNKNOWN_TRANSIENT: i64 = -2_147_483_647;
    /// Object has exited and will never resolve again
    pub const UNKNOWN_PERMANENT: i64 = -2_147_483_646;
}
