//! Global system controller (syscon) register module.

pub const SYSCON_BASE_ADDR: usize = 0x4000_0000;

/// Miscellaneous control register.
///
/// Carries the PHY strapping for the two dual role USB blocks.
#[bitbybit::bitfield(u32, debug)]
pub struct MiscControl {
    /// USB1 is wired to a mini-B connector instead of a host connector.
    #[bit(30, rw)]
    usb1_mini_b: bool,
    /// USB0 is wired to a mini-B connector instead of a host connector.
    #[bit(29, rw)]
    usb0_mini_b: bool,
    #[bit(23, rw)]
    usb1_vbus_on: bool,
    #[bit(22, rw)]
    usb0_vbus_on: bool,
    /// USB1 activity may wake up the system.
    #[bit(15, rw)]
    usb1_wakeup: bool,
    /// USB0 activity may wake up the system.
    #[bit(14, rw)]
    usb0_wakeup: bool,
}

#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct Syscon {
    /// Chip identification word.
    #[mmio(PureRead)]
    chip_id: u32,
    _reserved: [u32; 11],
    /// Miscellaneous control register at offset 0x30.
    misc_ctrl: MiscControl,
}

static_assertions::const_assert_eq!(core::mem::size_of::<Syscon>(), 0x34);

impl Syscon {
    /// Create a new syscon MMIO instance at the fixed base address
    /// 0x4000_0000.
    ///
    /// # Safety
    ///
    /// This API can be used to potentially create a driver to the same peripheral structure
    /// from multiple threads. The user must ensure that concurrent accesses are safe and do not
    /// interfere with each other.
    pub const unsafe fn new_mmio_fixed() -> MmioSyscon<'static> {
        unsafe { Self::new_mmio_at(SYSCON_BASE_ADDR) }
    }
}
