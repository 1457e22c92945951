//! UART register module.
//!
//! 16550A compatible UART with the byte wide registers laid out on a 32-bit
//! stride.

pub const UART_BASE_ADDR: usize = 0x4200_0000;

#[bitbybit::bitenum(u2, exhaustive = true)]
#[derive(Default, Debug, PartialEq, Eq)]
pub enum CharLen {
    FiveBits = 0b00,
    SixBits = 0b01,
    SevenBits = 0b10,
    #[default]
    EightBits = 0b11,
}

#[bitbybit::bitenum(u2, exhaustive = true)]
#[derive(Default, Debug, PartialEq, Eq)]
pub enum RxFifoTrigger {
    #[default]
    One = 0b00,
    Four = 0b01,
    Eight = 0b10,
    Fourteen = 0b11,
}

#[bitbybit::bitfield(u32, default = 0x0, debug)]
pub struct LineControl {
    /// Divisor latch access bit. While set, the data and interrupt enable
    /// offsets address the divisor latch bytes instead.
    #[bit(7, rw)]
    dlab: bool,
    /// Force the TX line into the break state.
    #[bit(6, rw)]
    set_break: bool,
    #[bit(5, rw)]
    stick_parity: bool,
    /// Even parity when set, odd parity when cleared.
    #[bit(4, rw)]
    even_parity: bool,
    #[bit(3, rw)]
    parity_enable: bool,
    /// Two stop bits when set (1.5 for five bit characters), one otherwise.
    #[bit(2, rw)]
    two_stop_bits: bool,
    #[bits(0..=1, rw)]
    char_len: CharLen,
}

#[bitbybit::bitfield(u32, debug)]
pub struct LineStatus {
    /// At least one error flag is latched inside the RX FIFO.
    #[bit(7, r)]
    fifo_error: bool,
    /// Transmitter completely idle, holding and shift register empty.
    #[bit(6, r)]
    tx_empty: bool,
    /// Transmitter holding register (FIFO) accepts data.
    #[bit(5, r)]
    thr_empty: bool,
    #[bit(4, r)]
    break_indicator: bool,
    #[bit(3, r)]
    framing_error: bool,
    #[bit(2, r)]
    parity_error: bool,
    #[bit(1, r)]
    overrun_error: bool,
    /// At least one received character is available.
    #[bit(0, r)]
    data_ready: bool,
}

#[bitbybit::bitfield(u32, default = 0x0)]
pub struct FifoControl {
    /// RX FIFO fill level which raises the received data interrupt.
    #[bits(6..=7, w)]
    rx_trigger: RxFifoTrigger,
    /// Clear the TX FIFO and reset its counter.
    #[bit(2, w)]
    tx_reset: bool,
    /// Clear the RX FIFO and reset its counter.
    #[bit(1, w)]
    rx_reset: bool,
    #[bit(0, w)]
    fifo_enable: bool,
}

#[derive(derive_mmio::Mmio)]
#[repr(C)]
pub struct Uart {
    /// RX buffer on read, TX holding register on write. Divisor latch LSB
    /// while the DLAB bit is set.
    #[mmio(Read, Write)]
    data: u32,
    /// Interrupt enable register. Divisor latch MSB while the DLAB bit is
    /// set.
    ier: u32,
    /// Interrupt identification register on read, FIFO control register on
    /// write.
    #[mmio(Read, Write)]
    iir_fcr: u32,
    /// Line control register.
    lcr: LineControl,
    /// Modem control register.
    mcr: u32,
    /// Line status register.
    #[mmio(PureRead)]
    lsr: LineStatus,
    /// Modem status register.
    #[mmio(PureRead)]
    msr: u32,
    /// Scratch register.
    scr: u32,
}

static_assertions::const_assert_eq!(core::mem::size_of::<Uart>(), 0x20);

impl Uart {
    /// Create a new UART MMIO instance at the fixed base address 0x4200_0000.
    ///
    /// # Safety
    ///
    /// This API can be used to potentially create a driver to the same peripheral structure
    /// from multiple threads. The user must ensure that concurrent accesses are safe and do not
    /// interfere with each other.
    pub const unsafe fn new_mmio_fixed() -> MmioUart<'static> {
        unsafe { Self::new_mmio_at(UART_BASE_ADDR) }
    }
}
