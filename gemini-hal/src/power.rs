//! # CPU idle handling
//!
//! The hardware idle state of this SoC family is broken, waking up from it is
//! unreliable. Interrupt controller bring-up therefore forces the idle path
//! into polling, and [idle] honors that flag.

use core::sync::atomic::{AtomicBool, Ordering};

static IDLE_POLL: AtomicBool = AtomicBool::new(false);

/// Force the idle path into polling instead of the hardware idle state.
#[inline]
pub fn set_idle_poll(enable: bool) {
    IDLE_POLL.store(enable, Ordering::Relaxed);
}

/// Whether the idle path is currently forced into polling.
#[inline]
pub fn idle_poll() -> bool {
    IDLE_POLL.load(Ordering::Relaxed)
}

/// Idle until the next interrupt.
///
/// Polls when [set_idle_poll] forced polling, otherwise enters the wait for
/// interrupt state of the core.
#[inline]
pub fn idle() {
    if idle_poll() {
        core::hint::spin_loop();
    } else {
        wait_for_interrupt();
    }
}

/// Enter the wait for interrupt state of the FA526 core.
#[cfg(target_arch = "arm")]
#[inline]
pub fn wait_for_interrupt() {
    unsafe {
        core::arch::asm!(
            "mcr p15, 0, {tmp}, c7, c0, 4",
            tmp = in(reg) 0u32,
            options(nomem, nostack, preserves_flags)
        );
    }
}

#[cfg(not(target_arch = "arm"))]
#[inline]
pub fn wait_for_interrupt() {
    core::hint::spin_loop();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_poll_flag_round_trip() {
        assert!(!idle_poll());
        set_idle_poll(true);
        assert!(idle_poll());
        set_idle_poll(false);
        assert!(!idle_poll());
    }
}
