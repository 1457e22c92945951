//! # UART driver
//!
//! Driver for the 16550A compatible console UART. The peripheral is clocked
//! with a fixed 48 MHz reference, the baud rate is derived from it through
//! the 16-bit divisor latch.

use core::convert::Infallible;

use gemini::uart::{CharLen, FifoControl, LineControl, MmioUart, RxFifoTrigger};

use crate::time::Hertz;

/// Fixed reference clock feeding the UART baud generator.
pub const UART_CLOCK: Hertz = Hertz::from_raw(48_000_000);

#[derive(Debug, thiserror::Error)]
#[error("uart clock divisor is zero")]
pub struct DivisorZero;

#[derive(Debug, thiserror::Error)]
pub enum ClockConfigError {
    #[error("divisor is zero or the baud rate is not reachable")]
    DivisorZero(#[from] DivisorZero),
    #[error("calculated divisor {0} outside the 16-bit latch range")]
    DivisorOutOfRange(u32),
}

/// Baud generator configuration.
#[derive(Debug, Clone, Copy)]
pub struct ClockConfig {
    divisor: u16,
}

impl ClockConfig {
    pub const fn new(divisor: u16) -> Result<Self, DivisorZero> {
        if divisor == 0 {
            return Err(DivisorZero);
        }
        Ok(Self { divisor })
    }

    /// Auto-calculates the divisor for the target baudrate.
    ///
    /// The returned tuple also contains the relative baud error in percent.
    /// It is recommended to keep this error below 2-3 %.
    pub fn new_autocalc_with_error(
        clock: Hertz,
        target_baud: u32,
    ) -> Result<(Self, f64), ClockConfigError> {
        if target_baud == 0 {
            return Err(DivisorZero.into());
        }
        let divisor = libm::round(clock.raw() as f64 / (16.0 * target_baud as f64));
        if divisor < 1.0 {
            return Err(DivisorZero.into());
        }
        if divisor > u16::MAX as f64 {
            return Err(ClockConfigError::DivisorOutOfRange(divisor as u32));
        }
        let config = Self {
            divisor: divisor as u16,
        };
        let baud = config.actual_baud(clock);
        let error = libm::fabs(baud - target_baud as f64) / target_baud as f64 * 100.0;
        Ok((config, error))
    }

    #[inline]
    pub const fn divisor(&self) -> u16 {
        self.divisor
    }

    /// Baud rate actually generated with this divisor.
    pub fn actual_baud(&self, clock: Hertz) -> f64 {
        clock.raw() as f64 / (16.0 * self.divisor as f64)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub enum Parity {
    Even,
    Odd,
    #[default]
    None,
}

#[derive(Debug, Default, Clone, Copy)]
pub enum Stopbits {
    #[default]
    One,
    /// 1.5 stop bits for five bit characters.
    Two,
}

#[derive(Debug)]
pub struct UartConfig {
    clk_config: ClockConfig,
    parity: Parity,
    stopbits: Stopbits,
    chrl: CharLen,
}

impl UartConfig {
    pub fn new_with_clk_config(clk_config: ClockConfig) -> Self {
        Self::new(
            clk_config,
            Parity::default(),
            Stopbits::default(),
            CharLen::default(),
        )
    }

    #[inline]
    pub const fn new(
        clk_config: ClockConfig,
        parity: Parity,
        stopbits: Stopbits,
        chrl: CharLen,
    ) -> Self {
        UartConfig {
            clk_config,
            parity,
            stopbits,
            chrl,
        }
    }

    #[inline]
    pub const fn clk_config(&self) -> ClockConfig {
        self.clk_config
    }

    #[inline]
    pub const fn parity(&self) -> Parity {
        self.parity
    }

    #[inline]
    pub const fn stopbits(&self) -> Stopbits {
        self.stopbits
    }

    #[inline]
    pub const fn chrl(&self) -> CharLen {
        self.chrl
    }
}

pub struct Uart {
    regs: MmioUart<'static>,
}

unsafe impl Send for Uart {}

impl Uart {
    /// Create the driver and bring the peripheral into a known state.
    ///
    /// Disables all UART interrupts, programs the divisor latch and the
    /// character format and enables the FIFOs with both of them cleared.
    pub fn new_with_init(mut regs: MmioUart<'static>, config: UartConfig) -> Self {
        regs.write_ier(0);
        let lcr = LineControl::builder()
            .with_dlab(false)
            .with_set_break(false)
            .with_stick_parity(false)
            .with_even_parity(matches!(config.parity, Parity::Even))
            .with_parity_enable(!matches!(config.parity, Parity::None))
            .with_two_stop_bits(matches!(config.stopbits, Stopbits::Two))
            .with_char_len(config.chrl)
            .build();
        // The divisor latch bytes are only reachable with the DLAB bit set.
        let mut dlab_lcr = lcr;
        dlab_lcr.set_dlab(true);
        regs.write_lcr(dlab_lcr);
        regs.write_data((config.clk_config.divisor() & 0xff) as u32);
        regs.write_ier((config.clk_config.divisor() >> 8) as u32);
        regs.write_lcr(lcr);
        regs.write_iir_fcr(
            FifoControl::builder()
                .with_rx_trigger(RxFifoTrigger::One)
                .with_tx_reset(true)
                .with_rx_reset(true)
                .with_fifo_enable(true)
                .build()
                .raw_value(),
        );
        Self { regs }
    }

    #[inline]
    pub const fn regs(&mut self) -> &mut MmioUart<'static> {
        &mut self.regs
    }

    #[inline]
    pub fn read_byte(&mut self) -> nb::Result<u8, Infallible> {
        if !self.regs.read_lsr().data_ready() {
            return Err(nb::Error::WouldBlock);
        }
        Ok(self.regs.read_data() as u8)
    }

    #[inline]
    pub fn write_byte(&mut self, byte: u8) -> nb::Result<(), Infallible> {
        if !self.regs.read_lsr().thr_empty() {
            return Err(nb::Error::WouldBlock);
        }
        self.regs.write_data(byte as u32);
        Ok(())
    }

    #[inline]
    pub fn read_byte_blocking(&mut self) -> u8 {
        loop {
            if self.regs.read_lsr().data_ready() {
                break;
            }
        }
        self.regs.read_data() as u8
    }

    #[inline]
    pub fn write_byte_blocking(&mut self, byte: u8) {
        loop {
            if self.regs.read_lsr().thr_empty() {
                break;
            }
        }
        self.regs.write_data(byte as u32);
    }

    /// Block until the transmitter is completely idle.
    pub fn flush(&mut self) {
        while !self.regs.read_lsr().tx_empty() {}
    }
}

impl embedded_hal_nb::serial::ErrorType for Uart {
    type Error = Infallible;
}

impl embedded_hal_nb::serial::Write for Uart {
    #[inline]
    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        self.write_byte(word)
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        if self.regs.read_lsr().tx_empty() {
            return Ok(());
        }
        Err(nb::Error::WouldBlock)
    }
}

impl embedded_hal_nb::serial::Read for Uart {
    #[inline]
    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        self.read_byte()
    }
}

impl embedded_io::ErrorType for Uart {
    type Error = Infallible;
}

impl embedded_io::Write for Uart {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut written = 0;
        loop {
            if self.regs.read_lsr().thr_empty() {
                break;
            }
        }
        for byte in buf.iter() {
            match self.write_byte(*byte) {
                Ok(_) => written += 1,
                Err(nb::Error::WouldBlock) => return Ok(written),
            }
        }

        Ok(written)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.flush();
        Ok(())
    }
}

impl embedded_io::Read for Uart {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut read = 0;
        loop {
            if self.regs.read_lsr().data_ready() {
                break;
            }
        }
        for byte in buf.iter_mut() {
            match self.read_byte() {
                Ok(w) => {
                    *byte = w;
                    read += 1;
                }
                Err(nb::Error::WouldBlock) => break,
            }
        }

        Ok(read)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use approx::abs_diff_eq;
    use std::boxed::Box;

    use super::*;

    #[test]
    fn divisor_calc_115200() {
        let (cfg, error) = ClockConfig::new_autocalc_with_error(UART_CLOCK, 115200).unwrap();
        assert_eq!(cfg.divisor(), 26);
        assert!(abs_diff_eq!(
            cfg.actual_baud(UART_CLOCK),
            115384.615,
            epsilon = 0.01
        ));
        assert!(abs_diff_eq!(error, 0.16, epsilon = 0.01));
    }

    #[test]
    fn divisor_calc_9600() {
        let (cfg, error) = ClockConfig::new_autocalc_with_error(UART_CLOCK, 9600).unwrap();
        assert_eq!(cfg.divisor(), 313);
        assert!(abs_diff_eq!(
            cfg.actual_baud(UART_CLOCK),
            9584.664,
            epsilon = 0.01
        ));
        assert!(abs_diff_eq!(error, 0.16, epsilon = 0.01));
    }

    #[test]
    fn invalid_clock_configs_are_rejected() {
        assert!(ClockConfig::new(0).is_err());
        assert!(matches!(
            ClockConfig::new_autocalc_with_error(UART_CLOCK, 0),
            Err(ClockConfigError::DivisorZero(_))
        ));
        // Faster than the reference clock can generate.
        assert!(matches!(
            ClockConfig::new_autocalc_with_error(UART_CLOCK, 7_000_000),
            Err(ClockConfigError::DivisorZero(_))
        ));
        // Slower than the 16-bit latch can divide down to.
        assert!(matches!(
            ClockConfig::new_autocalc_with_error(UART_CLOCK, 45),
            Err(ClockConfigError::DivisorOutOfRange(_))
        ));
    }

    #[test]
    fn init_programs_divisor_and_format() {
        let block: &'static mut gemini::uart::Uart =
            Box::leak(Box::new(unsafe { core::mem::zeroed() }));
        let base = block as *mut gemini::uart::Uart as usize;
        let regs = unsafe { gemini::uart::Uart::new_mmio_at(base) };
        let clk = ClockConfig::new_autocalc_with_error(UART_CLOCK, 115200)
            .unwrap()
            .0;
        let _uart = Uart::new_with_init(regs, UartConfig::new_with_clk_config(clk));

        let mut probe = unsafe { gemini::uart::Uart::new_mmio_at(base) };
        // 8N1 with the divisor latch closed again.
        assert_eq!(probe.read_lcr().raw_value(), 0x03);
        assert!(!probe.read_lcr().dlab());
        // Divisor bytes left in the latch, interrupts stay disabled.
        assert_eq!(probe.read_data(), 26);
        assert_eq!(probe.read_ier(), 0);
        // FIFOs enabled and cleared.
        assert_eq!(probe.read_iir_fcr(), 0x07);
    }

    #[test]
    fn fifo_flags_gate_the_nonblocking_api() {
        let block: &'static mut gemini::uart::Uart =
            Box::leak(Box::new(unsafe { core::mem::zeroed() }));
        let base = block as *mut gemini::uart::Uart as usize;
        let regs = unsafe { gemini::uart::Uart::new_mmio_at(base) };
        let clk = ClockConfig::new(26).unwrap();
        let mut uart = Uart::new_with_init(regs, UartConfig::new_with_clk_config(clk));

        // The zeroed line status register reports neither a writable holding
        // register nor received data.
        assert!(matches!(uart.write_byte(b'x'), Err(nb::Error::WouldBlock)));
        assert!(matches!(uart.read_byte(), Err(nb::Error::WouldBlock)));
    }
}
