//! Best-effort CPU pinning and scheduling-priority hints for worker
//! threads (spec.md §5). Failures are logged, never fatal — a worker
//! that can't get a realtime priority still has to run.

use tickbus_core::WorkerAffinity;

#[cfg(target_os = "linux")]
pub fn apply(affinity: WorkerAffinity) {
    if let Some(core) = affinity.pin_core {
        pin_to_core(core);
    }
    if let Some(priority) = affinity.realtime_priority {
        set_realtime_priority(priority);
    }
}

#[cfg(not(target_os = "linux"))]
pub fn apply(_affinity: WorkerAffinity) {
    tracing::debug!(target: "tickbus::affinity", "cpu/priority pinning is a no-op on this platform");
}

#[cfg(target_os = "linux")]
fn pin_to_core(core: usize) {
    // SAFETY: `cpu_set_t` is a plain-old-data struct; we only ever pass
    // valid pointers to it into libc, and check every return code.
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(core, &mut set);
        let rc = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set);
        if rc != 0 {
            tracing::warn!(target: "tickbus::affinity", core, "sched_setaffinity failed");
        }
    }
}

#[cfg(target_os = "linux")]
fn set_realtime_priority(priority: i32) {
    // SAFETY: `sched_param` is plain-old-data; `sched_setscheduler` return
    // is checked below.
    unsafe {
        let param = libc::sched_param {
            sched_priority: priority,
        };
        let rc = libc::sched_setscheduler(0, libc::SCHED_FIFO, &param);
        if rc != 0 {
            tracing::warn!(
                target: "tickbus::affinity",
                priority,
                "sched_setscheduler(SCHED_FIFO) failed; is CAP_SYS_NICE set?"
            );
        }
    }
}
