//! Process and system resource sampling.
//!
//! Used for the environment snapshot attached to every error record and for
//! the pre-flight resource ceiling check of the operation wrapper.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use sysinfo::{ProcessesToUpdate, System};

static PROCESS_START: Lazy<Instant> = Lazy::new(Instant::now);

/// Seconds since this library was first used in the process
pub fn process_uptime_secs() -> u64 {
    PROCESS_START.elapsed().as_secs()
}

/// Memory usage sample
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ResourceUsage {
    pub process_memory_bytes: u64,
    pub system_used_memory_bytes: u64,
    pub system_total_memory_bytes: u64,
}

impl ResourceUsage {
    /// Fraction of system memory in use (0.0 - 1.0)
    pub fn memory_ratio(&self) -> f64 {
        if self.system_total_memory_bytes == 0 {
            return 0.0;
        }
        self.system_used_memory_bytes as f64 / self.system_total_memory_bytes as f64
    }
}

/// Source of resource usage samples
pub trait ResourceProbe: Send + Sync {
    fn sample(&self) -> ResourceUsage;
}

/// Resource probe backed by `sysinfo`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResourceProbe;

impl ResourceProbe for SystemResourceProbe {
    fn sample(&self) -> ResourceUsage {
        let mut system = System::new();
        system.refresh_memory();

        let process_memory_bytes = match sysinfo::get_current_pid() {
            Ok(pid) => {
                system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                system.process(pid).map(|p| p.memory()).unwrap_or(0)
            }
            Err(_) => 0,
        };

        ResourceUsage {
            process_memory_bytes,
            system_used_memory_bytes: system.used_memory(),
            system_total_memory_bytes: system.total_memory(),
        }
    }
}

/// Environment attached to error records
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EnvironmentSnapshot {
    pub memory: ResourceUsage,
    pub uptime_secs: u64,
    pub pid: u32,
}

impl EnvironmentSnapshot {
    pub fn capture() -> Self {
        Self::capture_with(&SystemResourceProbe)
    }

    pub fn capture_with(probe: &dyn ResourceProbe) -> Self {
        Self {
            memory: probe.sample(),
            uptime_secs: process_uptime_secs(),
            pid: std::process::id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe(ResourceUsage);

    impl ResourceProbe for FixedProbe {
        fn sample(&self) -> ResourceUsage {
            self.0
        }
    }

    #[test]
    fn test_memory_ratio() {
        let usage = ResourceUsage {
            process_memory_bytes: 10,
            system_used_memory_bytes: 750,
            system_total_memory_bytes: 1000,
        };
        assert!((usage.memory_ratio() - 0.75).abs() < f64::EPSILON);
        assert_eq!(ResourceUsage::default().memory_ratio(), 0.0);
    }

    #[test]
    fn test_snapshot_uses_probe() {
        let usage = ResourceUsage {
            process_memory_bytes: 42,
            system_used_memory_bytes: 1,
            system_total_memory_bytes: 2,
        };
        let snapshot = EnvironmentSnapshot::capture_with(&FixedProbe(usage));
        assert_eq!(snapshot.memory.process_memory_bytes, 42);
        assert_eq!(snapshot.pid, std::process::id());
    }

    #[test]
    fn test_system_probe_reports_total_memory() {
        let usage = SystemResourceProbe.sample();
        assert!(usage.system_total_memory_bytes > 0);
    }
}
