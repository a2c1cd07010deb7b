//! Default configuration values
//!
//! Used by the `Default` impls behind the `#[serde(default)]` sections of
//! [`crate::RuntimeConfig`] so a partial TOML file fills in the rest.

/// Scheduler defaults
pub mod scheduler {
    /// Capacity of each worker's fixed ring buffer before spilling to the
    /// shared overflow queue
    pub const QUEUE_CAPACITY: usize = 1024;

    /// NUMA domains the workers are partitioned into
    pub const NUMA_DOMAINS: usize = 1;

    /// Upper bound on how long an idle worker parks before re-checking queues
    pub const IDLE_PARK_MICROS: u64 = 500;

    /// Prefix for worker thread names
    pub const THREAD_NAME_PREFIX: &str = "worker";

    /// Worker count when the machine's parallelism cannot be determined
    pub const FALLBACK_WORKER_THREADS: usize = 4;
}

/// Parcel defaults
pub mod parcel {
    /// Largest accepted argument payload (16 MiB)
    pub const MAX_PAYLOAD_BYTES: usize = 16 * 1024 * 1024;

    /// Verify CRC32 on every inbound parcel
    pub const VERIFY_CHECKSUM: bool = true;
}

/// Locality defaults
pub mod locality {
    /// Locality id of a single-process deployment
    pub const ID: u32 = 0;

    /// Address of a single-process deployment
    pub const ADDRESS: &str = "127.0.0.1:7910";
}

/// Logging defaults
pub mod logging {
    pub const LEVEL: &str = "info";
}

/// Environment variable prefix for overrides (`PARCEL_SCHEDULER__WORKER_THREADS=8`)
pub const ENV_PREFIX: &str = "PARCEL";

/// Separator between nested keys in environment overrides
pub const ENV_SEPARATOR: &str = "__";
