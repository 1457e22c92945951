//! Interrupt controller register module.
//!
//! The controller exposes 32 interrupt lines through two identical register
//! banks, one driving the normal interrupt output of the CPU and one driving
//! the fast interrupt output. Bit N of every register belongs to line N.

pub const INTC_BASE_ADDR: usize = 0x4800_0000;

/// Number of interrupt lines per bank.
pub const NUM_LINES: usize = 32;

/// One register bank of the interrupt controller.
#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct Bank {
    /// Raw source state of all lines, before masking.
    source: u32,
    /// Mask register. A set bit allows the line to assert the CPU signal,
    /// a cleared bit masks it.
    mask: u32,
    /// Clear register. Writing a set bit acknowledges the latched line.
    clear: u32,
    /// Trigger mode register. A set bit selects edge triggering for the
    /// line, a cleared bit level triggering.
    trigger_mode: u32,
    /// Trigger polarity register. Set together with the mode bit for rising
    /// edge triggering, cleared together with it for high level triggering.
    trigger_level: u32,
    /// Pending lines after masking. The lowest set bit is the highest
    /// priority line.
    status: u32,
}

/// Interrupt controller register block.
///
/// The IRQ bank drives the normal interrupt signal, the FIQ bank the fast
/// interrupt signal. Both banks share the line numbering.
#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct Intc {
    #[mmio(Inner)]
    irq: Bank,
    _reserved: [u32; 2],
    #[mmio(Inner)]
    fiq: Bank,
}

static_assertions::const_assert_eq!(core::mem::size_of::<Bank>(), 0x18);
static_assertions::const_assert_eq!(core::mem::size_of::<Intc>(), 0x38);

impl Intc {
    /// Create a new interrupt controller MMIO instance at the fixed base
    /// address 0x4800_0000.
    ///
    /// # Safety
    ///
    /// This API can be used to potentially create a driver to the same peripheral structure
    /// from multiple threads. The user must ensure that concurrent accesses are safe and do not
    /// interfere with each other.
    pub const unsafe fn new_mmio_fixed() -> MmioIntc<'static> {
        unsafe { Self::new_mmio_at(INTC_BASE_ADDR) }
    }
}
