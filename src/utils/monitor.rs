#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessesToUpdate, System};

#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct CycleStats {
    pub cpu_usage: f32,
    pub memory_usage_mb: u64,
    pub peak_memory_mb: u64,
    pub uptime: Duration,
    pub cycles: u64,
}

/// 記錄每次刷新週期的資源使用量 (`--monitor`)
#[cfg(feature = "cli")]
pub struct CycleMonitor {
    system: Mutex<System>,
    pid: Option<Pid>,
    started_at: Instant,
    peak_memory_mb: Mutex<u64>,
    cycles: Mutex<u64>,
    enabled: bool,
}

#[cfg(feature = "cli")]
impl CycleMonitor {
    pub fn new(enabled: bool) -> Self {
        let pid = sysinfo::get_current_pid().ok();
        if enabled && pid.is_none() {
            tracing::warn!("Could not resolve current PID, cycle stats will be skipped");
        }

        Self {
            system: Mutex::new(System::new()),
            pid,
            started_at: Instant::now(),
            peak_memory_mb: Mutex::new(0),
            cycles: Mutex::new(0),
            enabled,
        }
    }

    fn sample(&self) -> Option<CycleStats> {
        if !self.enabled {
            return None;
        }
        let pid = self.pid?;

        let mut system = self.system.lock().ok()?;
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        let process = system.process(pid)?;
        let memory_mb = process.memory() / 1024 / 1024;

        let mut peak = self.peak_memory_mb.lock().ok()?;
        *peak = (*peak).max(memory_mb);

        Some(CycleStats {
            cpu_usage: process.cpu_usage(),
            memory_usage_mb: memory_mb,
            peak_memory_mb: *peak,
            uptime: self.started_at.elapsed(),
            cycles: *self.cycles.lock().ok()?,
        })
    }

    pub fn record_cycle(&self, outcome: &str, elapsed: Duration) {
        if !self.enabled {
            return;
        }
        if let Ok(mut cycles) = self.cycles.lock() {
            *cycles += 1;
        }
        if let Some(stats) = self.sample() {
            tracing::info!(
                "📊 Refresh #{} ({}) took {:?} - CPU: {:.1}%, Memory: {}MB, Peak: {}MB",
                stats.cycles,
                outcome,
                elapsed,
                stats.cpu_usage,
                stats.memory_usage_mb,
                stats.peak_memory_mb
            );
        }
    }

    pub fn log_final_stats(&self) {
        if let Some(stats) = self.sample() {
            tracing::info!(
                "📊 Final Stats - Uptime: {:?}, Refresh cycles: {}, Peak Memory: {}MB",
                stats.uptime,
                stats.cycles,
                stats.peak_memory_mb
            );
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(feature = "cli")]
impl Default for CycleMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

// 為非CLI環境提供空實現
#[cfg(not(feature = "cli"))]
pub struct CycleMonitor;

#[cfg(not(feature = "cli"))]
impl CycleMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn record_cycle(&self, _outcome: &str, _elapsed: std::time::Duration) {}

    pub fn log_final_stats(&self) {}

    pub fn is_enabled(&self) -> bool {
        false
    }
}
