//! # Interrupt controller (INTC) driver
//!
//! The controller exposes 32 flat interrupt lines. Each line is latched into
//! the status register, translated into a logical interrupt number and
//! delivered to the handler bound to it. The lowest pending line number always
//! wins, and the status register is re-read after every delivery, so all lines
//! asserted during one activation are drained before the dispatch loop
//! returns.
//!
//! Two trigger configurations are supported per line and determine the
//! acknowledge ordering of the delivery flow:
//!
//!  - Rising edge: the latched bit is acknowledged before the handler runs, so
//!    an edge arriving while the handler is still busy is latched again
//!    instead of being lost.
//!  - High level: the handler has to resolve the asserting condition first,
//!    the flow acknowledges afterwards. A still asserted condition simply
//!    latches the line again, which is expected and not an error.
//!
//! Locking contract: the mask register and the trigger register pair are
//! shared between the dispatch context and arbitrary thread context. Every
//! read-modify-write of them runs inside a [critical_section::with] guard
//! scoped to just that modification. No guard is ever held across a handler
//! invocation by the driver itself; [dispatch_pending] as a whole runs inside
//! the interrupt context where delivery of this controller is already held
//! off.
//!
//! The driver is constructed as a plain value from the PAC handle, which
//! keeps it testable, and is then handed to [install] to back the
//! argument-less [dispatch_pending] entry point called from the IRQ vector.

use core::cell::RefCell;

use critical_section::Mutex;
use gemini::intc::MmioIntc;

pub use gemini::intc::NUM_LINES;

/// Index of a hardware interrupt line, guaranteed to be in `[0, 31]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HwLine(u8);

impl HwLine {
    /// Create a line index.
    ///
    /// # Panics
    ///
    /// Panics if `line` is not in `[0, 31]`. Addressing a line outside the
    /// controller is a programming error, not a recoverable condition.
    pub const fn new(line: u8) -> Self {
        assert!((line as usize) < NUM_LINES, "interrupt line out of range");
        Self(line)
    }

    #[inline]
    pub const fn value(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Bit of this line inside the 32-bit controller registers.
    #[inline]
    pub const fn bit(self) -> u32 {
        1 << self.0
    }
}

impl core::fmt::Display for HwLine {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical interrupt number a hardware line maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LogicalIrq(u32);

impl LogicalIrq {
    #[inline]
    pub const fn number(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for LogicalIrq {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trigger request encoding used by hardware descriptions.
///
/// Only the two kinds the controller supports are representable, any other
/// raw value fails the conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::TryFromPrimitive)]
#[repr(u32)]
pub enum TriggerKind {
    EdgeRising = 0x1,
    LevelHigh = 0x4,
}

/// Trigger configuration state of a line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    /// Initial state. The line can not be unmasked.
    #[default]
    Unconfigured,
    /// Active high level trigger, acknowledged after the handler ran.
    LevelHigh,
    /// Rising edge trigger, acknowledged before the handler runs.
    EdgeRising,
    /// An unsupported trigger was requested. The line is never serviced,
    /// even if it is unmasked later.
    Invalid,
}

/// Handler bound to an interrupt line.
pub trait LineHandler: Sync {
    /// Called by the dispatch loop for every delivery of the line.
    fn on_interrupt(&self, irq: LogicalIrq);
}

#[derive(Debug, thiserror::Error)]
#[error("logical interrupt number space exhausted")]
pub struct NumberSpaceExhausted;

/// Unsupported trigger request for a line.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("no supported trigger {trigger:#x} requested for line {line}")]
pub struct UnsupportedTrigger {
    pub line: HwLine,
    pub trigger: u32,
}

/// The line has no resolved trigger configuration and can not be unmasked.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("line {0} has no resolved trigger configuration")]
pub struct LineNotConfigured(pub HwLine);

/// Errors when constructing the driver from a raw hardware description.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("register region at {0:#010x} can not be bound")]
    InvalidRegion(usize),
    #[error("hardware description declares {0} lines, this controller family has 32")]
    InvalidLineCount(usize),
    #[error("number space allocation failed: {0}")]
    NumberSpace(#[from] NumberSpaceExhausted),
}

/// Parent numbering space handing out logical interrupt numbers.
pub trait IrqAllocator {
    /// Allocate `count` consecutive logical numbers and return the first one.
    fn allocate_block(&mut self, count: u32) -> Result<u32, NumberSpaceExhausted>;
}

/// Bump allocator over a fixed range of logical interrupt numbers.
#[derive(Debug)]
pub struct LinearAllocator {
    next: u32,
    end: u32,
}

impl LinearAllocator {
    pub const fn new(first: u32, capacity: u32) -> Self {
        Self {
            next: first,
            end: first.saturating_add(capacity),
        }
    }
}

impl IrqAllocator for LinearAllocator {
    fn allocate_block(&mut self, count: u32) -> Result<u32, NumberSpaceExhausted> {
        if count > self.end - self.next {
            return Err(NumberSpaceExhausted);
        }
        let first = self.next;
        self.next += count;
        Ok(first)
    }
}

/// Contiguous block of logical interrupt numbers covering all hardware lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqDomain {
    first: u32,
}

impl IrqDomain {
    pub const fn new(first: u32) -> Self {
        Self { first }
    }

    /// Allocate a block of [NUM_LINES] consecutive numbers from the parent
    /// numbering space.
    pub fn allocate(space: &mut impl IrqAllocator) -> Result<Self, NumberSpaceExhausted> {
        Ok(Self {
            first: space.allocate_block(NUM_LINES as u32)?,
        })
    }

    #[inline]
    pub const fn first(&self) -> LogicalIrq {
        LogicalIrq(self.first)
    }

    /// Logical interrupt number of a hardware line.
    #[inline]
    pub const fn translate(&self, line: HwLine) -> LogicalIrq {
        LogicalIrq(self.first + line.value() as u32)
    }

    /// Hardware line of a logical interrupt number, [None] if the number is
    /// outside this domain.
    pub const fn resolve(&self, irq: LogicalIrq) -> Option<HwLine> {
        if irq.0 >= self.first && irq.0 < self.first + NUM_LINES as u32 {
            Some(HwLine::new((irq.0 - self.first) as u8))
        } else {
            None
        }
    }
}

/// Hardware description record for one controller instance.
#[derive(Debug, Clone, Copy)]
pub struct HwDescription {
    pub base_addr: usize,
    pub lines: usize,
}

#[derive(Default, Clone, Copy)]
struct LineState {
    trigger: TriggerMode,
    handler: Option<&'static dyn LineHandler>,
    /// Rejection for this line was reported already.
    warned: bool,
}

/// Driver for the interrupt controller.
///
/// Owns the register block, the per-line state table and the logical number
/// domain. See the module documentation for the delivery flows and the
/// locking contract.
pub struct InterruptController {
    regs: MmioIntc<'static>,
    lines: [LineState; NUM_LINES],
    domain: IrqDomain,
}

unsafe impl Send for InterruptController {}

impl core::fmt::Debug for InterruptController {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("InterruptController")
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

impl InterruptController {
    /// Create the driver from the PAC handle and bring the hardware into its
    /// initial state.
    ///
    /// Masks all lines on both the IRQ and the FIQ bank and allocates the
    /// logical number block from `space`. All lines start out unconfigured
    /// and unbound, which routes them to the rejection path should they fire
    /// anyway.
    pub fn new_with_init(
        mut regs: MmioIntc<'static>,
        space: &mut impl IrqAllocator,
    ) -> Result<Self, NumberSpaceExhausted> {
        let domain = IrqDomain::allocate(space)?;
        regs.irq().write_mask(0);
        regs.fiq().write_mask(0);
        Ok(Self {
            regs,
            lines: [LineState::default(); NUM_LINES],
            domain,
        })
    }

    /// Create the driver from a raw hardware description record.
    ///
    /// Fails if the described register region can not be bound or the line
    /// count does not match this controller family. A failure here is fatal
    /// to bring-up of the controller, there is no partially initialized
    /// state.
    ///
    /// # Safety
    ///
    /// `desc.base_addr` must be the physical base address of the controller
    /// register block, and no other instance may access it concurrently.
    pub unsafe fn new_from_description(
        desc: HwDescription,
        space: &mut impl IrqAllocator,
    ) -> Result<Self, InitError> {
        if desc.base_addr == 0 || desc.base_addr % core::mem::align_of::<gemini::intc::Intc>() != 0 {
            return Err(InitError::InvalidRegion(desc.base_addr));
        }
        if desc.lines != NUM_LINES {
            return Err(InitError::InvalidLineCount(desc.lines));
        }
        let regs = unsafe { gemini::intc::Intc::new_mmio_at(desc.base_addr) };
        Ok(Self::new_with_init(regs, space)?)
    }

    #[inline]
    pub const fn domain(&self) -> IrqDomain {
        self.domain
    }

    /// Logical interrupt number of a hardware line.
    #[inline]
    pub const fn logical_irq(&self, line: HwLine) -> LogicalIrq {
        self.domain.translate(line)
    }

    /// Current trigger configuration of a line.
    #[inline]
    pub fn trigger_mode(&self, line: HwLine) -> TriggerMode {
        self.lines[line.index()].trigger
    }

    /// Whether the line is currently masked.
    ///
    /// Always read from the live mask register, the driver caches no mask
    /// state.
    #[inline]
    pub fn is_masked(&mut self, line: HwLine) -> bool {
        self.regs.irq().read_mask() & line.bit() == 0
    }

    /// Acknowledge a line by clearing its latched pending bit.
    ///
    /// Distinct from masking: the line stays able to assert again. Acking an
    /// already clear line has no effect. A single register write, no guard
    /// needed.
    #[inline]
    pub fn ack(&mut self, line: HwLine) {
        self.regs.irq().write_clear(line.bit());
    }

    /// Mask a line, preventing it from asserting the CPU interrupt signal.
    ///
    /// Idempotent. Safe to call from any context, the read-modify-write runs
    /// under a critical section.
    pub fn mask(&mut self, line: HwLine) {
        critical_section::with(|_| {
            self.regs.irq().modify_mask(|mask| mask & !line.bit());
        });
    }

    /// Unmask a line.
    ///
    /// Fails unless the trigger configuration of the line was resolved
    /// before, an unconfigured or invalid line must never be able to assert.
    /// Idempotent on success. Safe to call from any context, the
    /// read-modify-write runs under a critical section.
    pub fn unmask(&mut self, line: HwLine) -> Result<(), LineNotConfigured> {
        match self.lines[line.index()].trigger {
            TriggerMode::LevelHigh | TriggerMode::EdgeRising => {
                critical_section::with(|_| {
                    self.regs.irq().modify_mask(|mask| mask | line.bit());
                });
                Ok(())
            }
            TriggerMode::Unconfigured | TriggerMode::Invalid => Err(LineNotConfigured(line)),
        }
    }

    /// Configure the trigger of a line from the raw hardware description
    /// encoding.
    ///
    /// High level triggering clears the line's bit in both the mode and the
    /// polarity register, rising edge triggering sets both. The matching
    /// delivery flow is selected along with it. Any other requested kind
    /// marks the line [TriggerMode::Invalid] and fails without touching the
    /// registers, the line is then permanently routed to the rejection path.
    pub fn set_trigger_type(&mut self, line: HwLine, trigger: u32) -> Result<(), UnsupportedTrigger> {
        let kind = match TriggerKind::try_from(trigger) {
            Ok(kind) => kind,
            Err(_) => {
                self.lines[line.index()].trigger = TriggerMode::Invalid;
                log::warn!("no supported trigger selected for line {}", line);
                return Err(UnsupportedTrigger { line, trigger });
            }
        };
        critical_section::with(|_| {
            let mut bank = self.regs.irq();
            let mut mode = bank.read_trigger_mode();
            let mut polarity = bank.read_trigger_level();
            match kind {
                TriggerKind::LevelHigh => {
                    mode &= !line.bit();
                    polarity &= !line.bit();
                }
                TriggerKind::EdgeRising => {
                    mode |= line.bit();
                    polarity |= line.bit();
                }
            }
            bank.write_trigger_mode(mode);
            bank.write_trigger_level(polarity);
        });
        self.lines[line.index()].trigger = match kind {
            TriggerKind::LevelHigh => TriggerMode::LevelHigh,
            TriggerKind::EdgeRising => TriggerMode::EdgeRising,
        };
        Ok(())
    }

    /// Bind a handler to a line, returning the previously bound one.
    pub fn bind_handler(
        &mut self,
        line: HwLine,
        handler: &'static dyn LineHandler,
    ) -> Option<&'static dyn LineHandler> {
        self.lines[line.index()].handler.replace(handler)
    }

    /// Remove the handler of a line, routing deliveries to the rejection
    /// path again.
    pub fn unbind_handler(&mut self, line: HwLine) -> Option<&'static dyn LineHandler> {
        self.lines[line.index()].handler.take()
    }

    /// Drain all pending lines of one activation.
    ///
    /// Lines are serviced lowest number first and the status register is
    /// re-read after every single delivery, so lines asserted while another
    /// handler runs are picked up within the same activation. Returns once
    /// the status register reads zero.
    ///
    /// A pending line without a resolved trigger or without a bound handler
    /// takes the rejection path: it is reported once, masked and excluded
    /// from the rest of this activation, so one misconfigured line can not
    /// starve the configured ones. It is never acknowledged.
    pub fn dispatch(&mut self) {
        let mut rejected = 0;
        loop {
            let pending = self.regs.irq().read_status() & !rejected;
            if pending == 0 {
                return;
            }
            let line = HwLine::new(pending.trailing_zeros() as u8);
            let state = self.lines[line.index()];
            match (state.trigger, state.handler) {
                (TriggerMode::EdgeRising, Some(handler)) => {
                    // Ack first: an edge arriving while the handler runs is
                    // latched again instead of being lost.
                    self.ack(line);
                    handler.on_interrupt(self.domain.translate(line));
                }
                (TriggerMode::LevelHigh, Some(handler)) => {
                    // The handler has to resolve the level condition before
                    // the latched bit can be cleared for good.
                    handler.on_interrupt(self.domain.translate(line));
                    self.ack(line);
                }
                _ => {
                    self.reject(line);
                    rejected |= line.bit();
                }
            }
        }
    }

    /// Terminal path for a pending line that can not be serviced: report
    /// once, mask, no ack.
    fn reject(&mut self, line: HwLine) {
        let state = &mut self.lines[line.index()];
        if !state.warned {
            state.warned = true;
            log::warn!("unserviceable interrupt pending on line {}, masking it", line);
        }
        self.mask(line);
    }
}

static CONTROLLER: Mutex<RefCell<Option<InterruptController>>> = Mutex::new(RefCell::new(None));

/// Install the controller backing the [dispatch_pending] entry point.
///
/// Must be called once during bring-up, before interrupt delivery is enabled
/// globally. Also forces the CPU idle path into polling, the hardware idle
/// state of this SoC family does not wake up reliably.
pub fn install(controller: InterruptController) {
    crate::power::set_idle_poll(true);
    critical_section::with(|cs| {
        CONTROLLER.borrow(cs).replace(Some(controller));
    });
}

/// Argument-less dispatch entry point, to be called from the IRQ vector.
///
/// Drains all pending lines of the installed controller, see
/// [InterruptController::dispatch]. Does nothing if no controller was
/// installed. Not re-entrant: it is meant to run in the interrupt context,
/// where delivery of this controller's signal is already held off.
pub fn dispatch_pending() {
    critical_section::with(|cs| {
        if let Some(controller) = CONTROLLER.borrow(cs).borrow_mut().as_mut() {
            controller.dispatch();
        }
    });
}

/// Run `f` on the installed controller from thread context.
///
/// Returns [None] if no controller was installed. Must not be called from an
/// interrupt handler, the entry point holds the controller for the whole
/// activation.
pub fn with_controller<R>(f: impl FnOnce(&mut InterruptController) -> R) -> Option<R> {
    critical_section::with(|cs| CONTROLLER.borrow(cs).borrow_mut().as_mut().map(f))
}
