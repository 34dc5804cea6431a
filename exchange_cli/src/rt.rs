//! Real-time scheduling for the line process (Linux SCHED_FIFO, affinity, mlockall).
//!
//! Every step is best effort: failures are logged and the line keeps running
//! with normal scheduling.

use crate::cli::RtLock;

#[derive(Debug, Clone, Copy)]
pub struct RtOptions {
    pub enabled: bool,
    pub prio: Option<i32>,
    pub lock: RtLock,
    pub cpu: Option<usize>,
}

#[cfg(target_os = "linux")]
const MAX_CPUSET_BITS: usize = std::mem::size_of::<libc::cpu_set_t>() * 8;

#[cfg(target_os = "linux")]
fn is_retryable_memlock_error(err: &std::io::Error) -> bool {
    matches!(err.raw_os_error(), Some(code) if code == libc::EPERM || code == libc::ENOMEM)
}

#[cfg(target_os = "linux")]
fn memlock_limit_hint() -> Option<String> {
    let mut rlim = std::mem::MaybeUninit::<libc::rlimit>::uninit();
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_MEMLOCK, rlim.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    let r = unsafe { rlim.assume_init() };
    if r.rlim_cur == libc::RLIM_INFINITY {
        Some("memlock limit: unlimited".to_string())
    } else {
        Some(format!("memlock limit: {} KiB", r.rlim_cur / 1024))
    }
}

#[cfg(target_os = "linux")]
fn mlockall(flags: libc::c_int) -> std::io::Result<()> {
    if unsafe { libc::mlockall(flags) } != 0 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Lock memory per `lock`. `All` falls back to `Current` on EPERM/ENOMEM.
#[cfg(target_os = "linux")]
fn apply_mem_lock(lock: RtLock) -> eyre::Result<()> {
    let err = match lock {
        RtLock::None => return Ok(()),
        RtLock::Current => match mlockall(libc::MCL_CURRENT) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        },
        RtLock::All => match mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) {
            Ok(()) => return Ok(()),
            Err(e) if is_retryable_memlock_error(&e) => match mlockall(libc::MCL_CURRENT) {
                Ok(()) => {
                    tracing::warn!(error = %e, "mlockall(current|future) refused, locked current pages only");
                    return Ok(());
                }
                Err(_) => e,
            },
            Err(e) => e,
        },
    };
    let mut msg = format!("mlockall failed: {err}");
    if is_retryable_memlock_error(&err) {
        if let Some(h) = memlock_limit_hint() {
            msg.push_str(&format!("; {h}"));
        }
        msg.push_str("; hint: needs CAP_IPC_LOCK (or root) and sufficient 'ulimit -l'");
    }
    Err(eyre::eyre!(msg))
}

/// True when the effective capability set carries CAP_SYS_NICE.
#[cfg(target_os = "linux")]
fn has_sys_nice() -> bool {
    let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
        return false;
    };
    status.lines().any(|line| {
        if let Some(hex) = line.strip_prefix("CapEff:")
            && let Ok(caps) = u64::from_str_radix(hex.trim(), 16)
        {
            return caps & 0x80_0000 != 0;
        }
        false
    })
}

#[cfg(target_os = "linux")]
fn apply_fifo_priority(prio: Option<i32>) -> eyre::Result<i32> {
    let euid = unsafe { libc::geteuid() };
    if euid != 0 && !has_sys_nice() {
        eyre::bail!(
            "SCHED_FIFO needs CAP_SYS_NICE or root (euid {euid}); \
             hint: 'sudo setcap cap_sys_nice=ep /path/to/exchange'"
        );
    }
    let (min, max) = unsafe {
        let min = libc::sched_get_priority_min(libc::SCHED_FIFO);
        let max = libc::sched_get_priority_max(libc::SCHED_FIFO);
        if min < 0 || max < 0 { (1, 99) } else { (min, max) }
    };
    let prio_val = prio.unwrap_or(max).clamp(min, max);
    let param = libc::sched_param {
        sched_priority: prio_val,
    };
    if unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) } != 0 {
        return Err(eyre::eyre!(std::io::Error::last_os_error()));
    }
    Ok(prio_val)
}

/// Pin the process to `cpu` if the current affinity mask permits it.
#[cfg(target_os = "linux")]
fn apply_affinity(cpu: usize) -> eyre::Result<()> {
    let online = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if online < 1 {
        eyre::bail!("_SC_NPROCESSORS_ONLN < 1");
    }
    if cpu as libc::c_long >= online {
        eyre::bail!("requested CPU {cpu} >= online {online}");
    }
    if cpu >= MAX_CPUSET_BITS {
        eyre::bail!("requested CPU {cpu} exceeds cpu_set_t capacity {MAX_CPUSET_BITS}");
    }
    let mut allowed: libc::cpu_set_t = unsafe { std::mem::zeroed() };
    let rc = unsafe {
        libc::CPU_ZERO(&mut allowed);
        libc::sched_getaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &mut allowed)
    };
    if rc != 0 {
        return Err(eyre::eyre!(std::io::Error::last_os_error()));
    }
    if !unsafe { libc::CPU_ISSET(cpu, &allowed) } {
        eyre::bail!("CPU {cpu} not permitted by current affinity mask");
    }
    let mut desired: libc::cpu_set_t = unsafe { std::mem::zeroed() };
    let rc = unsafe {
        libc::CPU_ZERO(&mut desired);
        libc::CPU_SET(cpu, &mut desired);
        libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &desired)
    };
    if rc != 0 {
        return Err(eyre::eyre!(std::io::Error::last_os_error()));
    }
    Ok(())
}

/// Apply the real-time settings once per process.
#[cfg(target_os = "linux")]
pub fn setup_rt_once(opts: RtOptions) {
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();

    if !opts.enabled {
        return;
    }
    RT_ONCE.get_or_init(|| {
        match apply_mem_lock(opts.lock) {
            Ok(()) => tracing::info!(mode = ?opts.lock, "rt: memory lock applied"),
            Err(err) => tracing::warn!(error = %err, "rt: memory lock not applied"),
        }
        match apply_fifo_priority(opts.prio) {
            Ok(prio) => tracing::info!(prio, "rt: SCHED_FIFO enabled"),
            Err(err) => tracing::warn!(error = %err, "rt: SCHED_FIFO not applied"),
        }
        let cpu = opts.cpu.unwrap_or(0);
        match apply_affinity(cpu) {
            Ok(()) => tracing::info!(cpu, "rt: pinned to CPU"),
            Err(err) => tracing::warn!(error = %err, "rt: affinity not applied"),
        }
    });
}

#[cfg(not(target_os = "linux"))]
pub fn setup_rt_once(opts: RtOptions) {
    if opts.enabled {
        tracing::warn!("rt: real-time mode is only supported on Linux; ignoring --rt");
    }
}
