//! Real-time scheduling helpers (Linux SCHED_FIFO / affinity / mlockall; macOS mlockall).
//!
//! Every step is best-effort: a failure is logged and the turret runs with
//! normal scheduling.

use crate::cli::{RtArgs, RtLock};
use std::sync::OnceLock;

static RT_ONCE: OnceLock<()> = OnceLock::new();

/// Apply real-time settings once per process.
pub fn setup_rt_once(args: RtArgs) {
    if !args.enabled {
        return;
    }
    RT_ONCE.get_or_init(|| {
        let lock = args.lock.unwrap_or_else(RtLock::os_default);
        match apply_mem_lock(lock) {
            Ok(()) => tracing::info!(?lock, "RT: memory lock applied"),
            Err(err) => tracing::warn!(error = %err, "RT: mlockall failed"),
        }
        #[cfg(target_os = "linux")]
        {
            match linux::apply_fifo_priority(args.prio) {
                Ok(prio) => tracing::info!(prio, "RT: SCHED_FIFO applied"),
                Err(err) => tracing::warn!(error = %err, "RT: sched_setscheduler failed"),
            }
            let cpu = args.cpu.unwrap_or(0);
            match linux::apply_affinity(cpu) {
                Ok(()) => tracing::info!(cpu, "RT: pinned to CPU"),
                Err(err) => tracing::warn!(error = %err, "RT: affinity not applied"),
            }
        }
        #[cfg(not(target_os = "linux"))]
        {
            let _ = (args.prio, args.cpu);
            tracing::warn!("RT: SCHED_FIFO and affinity are Linux only; only mlockall applied");
        }
    });
}

#[cfg(unix)]
fn apply_mem_lock(lock: RtLock) -> eyre::Result<()> {
    use libc::{MCL_CURRENT, MCL_FUTURE, mlockall};

    fn lock_with(flags: libc::c_int) -> std::io::Result<()> {
        // SAFETY: mlockall has no memory-safety preconditions.
        let rc = unsafe { mlockall(flags) };
        if rc != 0 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    fn is_retryable(err: &std::io::Error) -> bool {
        matches!(err.raw_os_error(), Some(code) if code == libc::EPERM || code == libc::ENOMEM)
    }

    let result = match lock {
        RtLock::None => return Ok(()),
        RtLock::Current => lock_with(MCL_CURRENT),
        RtLock::All => lock_with(MCL_CURRENT | MCL_FUTURE),
    };
    let Err(err) = result else {
        return Ok(());
    };
    // all -> current when the limit only covers resident pages
    if lock == RtLock::All && is_retryable(&err) && lock_with(MCL_CURRENT).is_ok() {
        tracing::warn!(error = %err, "RT: mlockall(current|future) failed; locked current pages only");
        return Ok(());
    }
    let mut msg = format!("mlockall({lock:?}) failed: {err}");
    if is_retryable(&err) {
        msg.push_str("; hint: needs CAP_IPC_LOCK (or root) and sufficient 'ulimit -l'");
    }
    Err(eyre::eyre!(msg))
}

#[cfg(not(unix))]
fn apply_mem_lock(_lock: RtLock) -> eyre::Result<()> {
    eyre::bail!("memory locking is not supported on this OS")
}

#[cfg(target_os = "linux")]
mod linux {
    use libc::{
        CPU_ISSET, CPU_SET, CPU_ZERO, SCHED_FIFO, sched_get_priority_max, sched_get_priority_min,
        sched_param, sched_setscheduler,
    };

    /// Capacity of cpu_set_t in CPU indices (bits).
    const MAX_CPUSET_BITS: usize = std::mem::size_of::<libc::cpu_set_t>() * 8;

    /// Apply SCHED_FIFO, clamped to the system range; returns the priority used.
    pub fn apply_fifo_priority(prio: Option<i32>) -> eyre::Result<i32> {
        // SAFETY: plain syscalls without pointer arguments.
        let (min, max) = unsafe {
            (
                sched_get_priority_min(SCHED_FIFO),
                sched_get_priority_max(SCHED_FIFO),
            )
        };
        let (min, max) = if min < 0 || max < 0 { (1, 99) } else { (min, max) };
        let prio = prio.unwrap_or(max).clamp(min, max);
        let param = sched_param {
            sched_priority: prio,
        };
        // SAFETY: `param` outlives the call.
        let rc = unsafe { sched_setscheduler(0, SCHED_FIFO, &param) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EPERM) {
                eyre::bail!(
                    "{err}; hint: run as root or grant CAP_SYS_NICE: 'sudo setcap cap_sys_nice=ep /path/to/turret'"
                );
            }
            return Err(eyre::eyre!(err));
        }
        Ok(prio)
    }

    /// Pin the process to `cpu` if permitted by the current affinity mask.
    pub fn apply_affinity(cpu: usize) -> eyre::Result<()> {
        if cpu >= MAX_CPUSET_BITS {
            eyre::bail!("requested CPU {cpu} exceeds cpu_set_t capacity {MAX_CPUSET_BITS}");
        }
        // SAFETY: cpu_set_t is plain data; zeroed is a valid empty set.
        let mut allowed: libc::cpu_set_t = unsafe { std::mem::zeroed() };
        // SAFETY: `allowed` is a valid, correctly sized cpu_set_t.
        let rc = unsafe {
            CPU_ZERO(&mut allowed);
            libc::sched_getaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &mut allowed)
        };
        if rc != 0 {
            return Err(eyre::eyre!(std::io::Error::last_os_error()));
        }
        // SAFETY: index checked against MAX_CPUSET_BITS above.
        if !unsafe { CPU_ISSET(cpu, &allowed) } {
            eyre::bail!("CPU {cpu} not permitted by current affinity mask");
        }
        // SAFETY: as above.
        let mut desired: libc::cpu_set_t = unsafe { std::mem::zeroed() };
        let rc = unsafe {
            CPU_ZERO(&mut desired);
            CPU_SET(cpu, &mut desired);
            libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &desired)
        };
        if rc != 0 {
            return Err(eyre::eyre!(std::io::Error::last_os_error()));
        }
        Ok(())
    }
}
