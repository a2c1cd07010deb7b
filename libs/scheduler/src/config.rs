//! Scheduler sizing

use crate::error::SchedulerError;
use runtime_config::{defaults, SchedulerSettings};
use std::time::Duration;

/// Worker pool configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Number of OS worker threads
    pub worker_threads: usize,
    /// Capacity of each worker's ring buffer; overflow spills to the shared queue
    pub queue_capacity: usize,
    /// Workers are split into this many contiguous domains for steal ordering
    pub numa_domains: usize,
    /// Longest an idle worker sleeps before re-checking the queues
    pub idle_park: Duration,
    pub thread_name_prefix: String,
}

impl SchedulerConfig {
    /// Config with `workers` threads and default everything else
    pub fn with_workers(workers: usize) -> Self {
        Self {
            worker_threads: workers,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.worker_threads == 0 {
            return Err(SchedulerError::InvalidConfig(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(SchedulerError::InvalidConfig(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.numa_domains == 0 {
            return Err(SchedulerError::InvalidConfig(
                "numa_domains must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// NUMA domain of a worker; workers are assigned in contiguous blocks
    pub fn domain_of(&self, worker: usize) -> usize {
        let domains = self.numa_domains.min(self.worker_threads).max(1);
        worker * domains / self.worker_threads.max(1)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&SchedulerSettings::default())
    }
}

impl From<&SchedulerSettings> for SchedulerConfig {
    fn from(settings: &SchedulerSettings) -> Self {
        let prefix = if settings.thread_name_prefix.is_empty() {
            defaults::scheduler::THREAD_NAME_PREFIX.to_string()
        } else {
            settings.thread_name_prefix.clone()
        };

        Self {
            worker_threads: settings.worker_threads,
            queue_capacity: settings.queue_capacity,
            numa_domains: settings.numa_domains,
            idle_park: Duration::from_micros(settings.idle_park_micros),
            thread_name_prefix: prefix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_blocks() {
        let config = SchedulerConfig {
            worker_threads: 4,
            numa_domains: 2,
            ..SchedulerConfig::default()
        };
        let domains: Vec<_> = (0..4).map(|w| config.domain_of(w)).collect();
        assert_eq!(domains, vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_more_domains_than_workers() {
        let config = SchedulerConfig {
            worker_threads: 2,
            numa_domains: 8,
            ..SchedulerConfig::default()
        };
        assert_eq!(config.domain_of(0), 0);
        assert_eq!(config.domain_of(1), 1);
    }

    #[test]
    fn test_validate() {
        assert!(SchedulerConfig::with_workers(1).validate().is_ok());
        assert!(matches!(
            SchedulerConfig::with_workers(0).validate(),
            Err(SchedulerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_from_settings() {
        let settings = SchedulerSettings {
            worker_threads: 3,
            queue_capacity: 8,
            numa_domains: 1,
            idle_park_micros: 250,
            thread_name_prefix: String::new(),
        };
        let config = SchedulerConfig::from(&settings);
        assert_eq!(config.idle_park, Duration::from_micros(250));
        assert_eq!(config.thread_name_prefix, "worker");
    }
}
