//! # HAL for the Cortina Gemini SoC family
//!
//! This crate contains the **H**ardware **A**bstraction **L**ayer (HAL) for the Gemini
//! (SL3512/SL3516) SoCs, an additional hardware abstraction on top of the raw peripheral access
//! crate.
//!
//! It encodes a type-safe layer over the raw PAC and implements traits specified by the
//! [embedded-hal](https://github.com/rust-embedded/embedded-hal) project, making it compatible
//! with various drivers in the embedded rust ecosystem.
#![no_std]

pub mod intc;
pub mod log;
pub mod power;
pub mod prelude;
pub mod time;
pub mod uart;
pub mod usb;

pub use gemini as pac;

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("peripheral singleton was already taken")]
    PeripheralsAlreadyTaken,
    #[error("interrupt controller setup failed: {0}")]
    Intc(#[from] intc::NumberSpaceExhausted),
}

#[derive(Debug)]
pub struct Config {
    /// Install the interrupt controller driver backing [intc::dispatch_pending].
    pub install_intc: bool,
}

/// Utility function to perform common initialization steps.
pub fn init(config: Config) -> Result<gemini::Peripherals, InitError> {
    let periphs = gemini::Peripherals::take().ok_or(InitError::PeripheralsAlreadyTaken)?;
    if config.install_intc {
        let mut space = intc::LinearAllocator::new(0, intc::NUM_LINES as u32);
        let controller = intc::InterruptController::new_with_init(periphs.intc, &mut space)?;
        intc::install(controller);
    }

    Ok(unsafe { gemini::Peripherals::steal() })
}

/// Read the chip identification register from the fixed system controller block.
#[inline]
pub fn read_chip_id() -> u32 {
    // Safety: Only read a read-only register here.
    unsafe { gemini::syscon::Syscon::new_mmio_fixed() }.read_chip_id()
}
