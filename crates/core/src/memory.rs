//! Resident memory sampling.
//!
//! [`MemoryProbe`] is the single sampling primitive shared by admission
//! checks, in-flight peak tracking and the periodic watchdog. The production
//! probe reads `VmRSS` from `/proc/self/status`; tests substitute scripted
//! probes.

const KIB_PER_MB: u64 = 1024;

/// Point read of the process's resident memory.
pub trait MemoryProbe: Send + Sync {
    /// Current resident set size in whole MiB.
    fn current_mb(&self) -> u64;
}

/// Reads the resident set size of the current process.
///
/// On platforms without `/proc` the probe reports 0 MiB, which disables the
/// memory policies instead of rejecting every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessMemory;

impl MemoryProbe for ProcessMemory {
    fn current_mb(&self) -> u64 {
        read_process_rss_kib()
            .map(|kib| (kib + KIB_PER_MB / 2) / KIB_PER_MB)
            .unwrap_or(0)
    }
}

fn read_process_rss_kib() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let contents = std::fs::read_to_string("/proc/self/status").ok()?;
        parse_vm_rss_kib(&contents)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Extract the `VmRSS:` value (in KiB) from `/proc/<pid>/status` contents.
pub fn parse_vm_rss_kib(status: &str) -> Option<u64> {
    status.lines().find_map(|line| {
        let rest = line.strip_prefix("VmRSS:")?;
        rest.trim().strip_suffix("kB")?.trim().parse().ok()
    })
}
