//! Runtime Configuration Module
//!
//! Loads the locality table, scheduler sizing, parcel limits and logging level
//! for one runtime process. Sources are layered: TOML file first, then
//! `PARCEL_`-prefixed environment variables.

use crate::defaults;
use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Complete configuration of one runtime process
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// This process
    pub locality: LocalityEntry,

    /// Every locality of the deployment, as resolved by node discovery
    pub localities: Vec<LocalityEntry>,

    pub scheduler: SchedulerSettings,
    pub parcel: ParcelSettings,
    pub logging: LoggingSettings,
}

/// One participating locality
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LocalityEntry {
    pub id: u32,
    pub address: String,
}

/// Worker pool sizing and placement
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub worker_threads: usize,
    pub queue_capacity: usize,
    pub numa_domains: usize,
    pub idle_park_micros: u64,
    pub thread_name_prefix: String,
}

/// Which worker runs a task decoded from an inbound parcel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParcelPlacement {
    /// The worker that decoded the parcel (or the shared queue off-worker)
    #[default]
    DecodingWorker,
    /// Spread across workers in turn
    RoundRobin,
}

/// Parcel limits and inbound placement
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ParcelSettings {
    pub max_payload_bytes: usize,
    pub verify_checksum: bool,
    pub placement: ParcelPlacement,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LocalityEntry {
    fn default() -> Self {
        Self {
            id: defaults::locality::ID,
            address: defaults::locality::ADDRESS.to_string(),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        let worker_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(defaults::scheduler::FALLBACK_WORKER_THREADS);

        Self {
            worker_threads,
            queue_capacity: defaults::scheduler::QUEUE_CAPACITY,
            numa_domains: defaults::scheduler::NUMA_DOMAINS,
            idle_park_micros: defaults::scheduler::IDLE_PARK_MICROS,
            thread_name_prefix: defaults::scheduler::THREAD_NAME_PREFIX.to_string(),
        }
    }
}

impl Default for ParcelSettings {
    fn default() -> Self {
        Self {
            max_payload_bytes: defaults::parcel::MAX_PAYLOAD_BYTES,
            verify_checksum: defaults::parcel::VERIFY_CHECKSUM,
            placement: ParcelPlacement::default(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: defaults::logging::LEVEL.to_string(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let locality = LocalityEntry::default();
        Self {
            localities: vec![locality.clone()],
            locality,
            scheduler: SchedulerSettings::default(),
            parcel: ParcelSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load from a TOML file with environment overrides, then validate
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading runtime config: {:?}", path);

        let config = Config::builder()
            .add_source(File::from(path).required(true))
            .add_source(
                Environment::with_prefix(defaults::ENV_PREFIX)
                    .prefix_separator("_")
                    .separator(defaults::ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let mut runtime: RuntimeConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        runtime.expand_env_vars()?;
        runtime.validate()?;
        Ok(runtime)
    }

    /// Parse from an in-memory TOML document (no environment layer), then validate
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .context("Failed to parse configuration")?;

        let mut runtime: RuntimeConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        runtime.expand_env_vars()?;
        runtime.validate()?;
        Ok(runtime)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration")
    }

    /// Expand `$VAR` / `${VAR}` in locality addresses
    pub fn expand_env_vars(&mut self) -> Result<()> {
        let expand = |address: &mut String| -> Result<()> {
            let expanded = shellexpand::env(address.as_str())
                .with_context(|| format!("Failed to expand locality address {:?}", address))?;
            *address = expanded.into_owned();
            Ok(())
        };

        expand(&mut self.locality.address)?;
        for entry in &mut self.localities {
            expand(&mut entry.address)?;
        }
        Ok(())
    }

    /// Reject configurations the runtime cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.worker_threads == 0 {
            bail!("scheduler.worker_threads must be at least 1");
        }
        if self.scheduler.queue_capacity == 0 {
            bail!("scheduler.queue_capacity must be at least 1");
        }
        if self.scheduler.numa_domains == 0 {
            bail!("scheduler.numa_domains must be at least 1");
        }
        if self.parcel.max_payload_bytes == 0 {
            bail!("parcel.max_payload_bytes must be at least 1");
        }

        let mut seen = HashSet::new();
        for entry in &self.localities {
            if !seen.insert(entry.id) {
                bail!("locality id {} appears more than once", entry.id);
            }
        }

        match self.localities.iter().find(|e| e.id == self.locality.id) {
            None => bail!(
                "this process' locality {} is missing from the locality table",
                self.locality.id
            ),
            Some(entry) if entry.address != self.locality.address => bail!(
                "locality {} address mismatch: {} vs {}",
                self.locality.id,
                self.locality.address,
                entry.address
            ),
            Some(_) => {}
        }

        debug!(
            localities = self.localities.len(),
            workers = self.scheduler.worker_threads,
            "runtime config validated"
        );
        Ok(())
    }

    /// Addresses of every locality except this one
    pub fn peers(&self) -> impl Iterator<Item = &LocalityEntry> {
        let own = self.locality.id;
        self.localities.iter().filter(move |e| e.id != own)
    }
}
