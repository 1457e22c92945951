//! # PAC for the Cortina Gemini family of SoCs
//!
//! Low level peripheral access API for the Gemini (SL3512/SL3516) SoCs built
//! around the Faraday FA526 ARMv4 core. The register blocks are modeled with
//! [derive_mmio] and accessed through the generated MMIO handles.
//!
//! The [Peripherals] structure is the ownership root for all peripheral
//! handles and can be taken exactly once.
#![no_std]

pub mod intc;
pub mod syscon;
pub mod uart;

use core::sync::atomic::{AtomicBool, Ordering};

static PERIPHERALS_TAKEN: AtomicBool = AtomicBool::new(false);

/// All SoC peripherals covered by this crate.
pub struct Peripherals {
    pub intc: intc::MmioIntc<'static>,
    pub uart: uart::MmioUart<'static>,
    pub syscon: syscon::MmioSyscon<'static>,
}

impl Peripherals {
    /// Take the peripherals once.
    ///
    /// Returns [None] on every call after the first one.
    pub fn take() -> Option<Self> {
        if PERIPHERALS_TAKEN.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(unsafe { Self::steal() })
    }

    /// Unsafely create a new instance of all peripherals.
    ///
    /// # Safety
    ///
    /// This circumvents the ownership rules enforced by [Self::take]. The
    /// user must ensure that no accesses through an already existing instance
    /// are interfered with.
    pub unsafe fn steal() -> Self {
        Self {
            intc: unsafe { intc::Intc::new_mmio_fixed() },
            uart: unsafe { uart::Uart::new_mmio_fixed() },
            syscon: unsafe { syscon::Syscon::new_mmio_fixed() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peripherals_can_only_be_taken_once() {
        // Only creates the handles, no register is ever accessed.
        let first = Peripherals::take();
        assert!(first.is_some());
        assert!(Peripherals::take().is_none());
    }
}
