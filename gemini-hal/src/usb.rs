//! # USB PHY glue
//!
//! The two FOTG210 dual role USB blocks need SoC side glue before they are
//! usable: the PHY related flags in the global misc control register of the
//! system controller have to be set up for the port. This module only covers
//! that glue, not the controller itself.

use gemini::syscon::MmioSyscon;

pub const USB0_BASE_ADDR: usize = 0x6800_0000;
pub const USB1_BASE_ADDR: usize = 0x6900_0000;

/// Dual role mode of a port.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DrMode {
    #[default]
    Host,
    Peripheral,
}

impl DrMode {
    /// Parse the dual role mode property of a hardware description.
    ///
    /// A missing or unknown value falls back to host mode with a warning,
    /// this keeps a board with a malformed description bootable.
    pub fn from_property(prop: Option<&str>) -> Self {
        match prop {
            Some("host") => DrMode::Host,
            Some("peripheral") => DrMode::Peripheral,
            _ => {
                log::warn!("invalid dual role mode property, fallback to host mode");
                DrMode::Host
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsbPort {
    Usb0,
    Usb1,
}

impl UsbPort {
    /// Identify the port by the physical base address of its register block.
    #[inline]
    pub const fn from_base_addr(base_addr: usize) -> Self {
        if base_addr == USB1_BASE_ADDR {
            UsbPort::Usb1
        } else {
            UsbPort::Usb0
        }
    }
}

impl core::fmt::Display for UsbPort {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            UsbPort::Usb0 => write!(f, "USB0"),
            UsbPort::Usb1 => write!(f, "USB1"),
        }
    }
}

/// Hardware description record for one dual role USB block.
#[derive(Debug, Clone, Copy)]
pub struct UsbDescription<'a> {
    pub base_addr: usize,
    pub dr_mode: Option<&'a str>,
    /// Use the mini-B connector instead of the regular one.
    pub mini_b: bool,
    /// The port acts as a wakeup source.
    pub wakeup: bool,
}

/// PHY glue state of one FOTG210 port.
pub struct Fotg210 {
    port: UsbPort,
    mode: DrMode,
}

impl Fotg210 {
    /// Set up the PHY glue for one port.
    ///
    /// Turns VBUS on unconditionally and sets or clears the mini-B and
    /// wakeup flags of the port according to the description, leaving the
    /// other port alone. The read-modify-write of the shared misc control
    /// register runs under a critical section.
    pub fn new_with_init(syscon: &mut MmioSyscon<'static>, desc: UsbDescription) -> Self {
        let port = UsbPort::from_base_addr(desc.base_addr);
        let mode = DrMode::from_property(desc.dr_mode);
        critical_section::with(|_| {
            syscon.modify_misc_ctrl(|mut ctrl| {
                match port {
                    UsbPort::Usb0 => {
                        ctrl.set_usb0_vbus_on(true);
                        ctrl.set_usb0_mini_b(desc.mini_b);
                        ctrl.set_usb0_wakeup(desc.wakeup);
                    }
                    UsbPort::Usb1 => {
                        ctrl.set_usb1_vbus_on(true);
                        ctrl.set_usb1_mini_b(desc.mini_b);
                        ctrl.set_usb1_wakeup(desc.wakeup);
                    }
                }
                ctrl
            });
        });
        log::info!("initialized {} PHY", port);
        Self { port, mode }
    }

    #[inline]
    pub const fn port(&self) -> UsbPort {
        self.port
    }

    #[inline]
    pub const fn mode(&self) -> DrMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::boxed::Box;

    use super::*;

    fn fake_syscon() -> gemini::syscon::MmioSyscon<'static> {
        let block: &'static mut gemini::syscon::Syscon =
            Box::leak(Box::new(unsafe { core::mem::zeroed() }));
        let base = block as *mut gemini::syscon::Syscon as usize;
        unsafe { gemini::syscon::Syscon::new_mmio_at(base) }
    }

    #[test]
    fn usb1_setup_programs_the_misc_register() {
        let mut syscon = fake_syscon();
        let phy = Fotg210::new_with_init(
            &mut syscon,
            UsbDescription {
                base_addr: USB1_BASE_ADDR,
                dr_mode: Some("host"),
                mini_b: true,
                wakeup: false,
            },
        );
        assert_eq!(phy.port(), UsbPort::Usb1);
        assert_eq!(phy.mode(), DrMode::Host);
        let ctrl = syscon.read_misc_ctrl();
        assert!(ctrl.usb1_vbus_on());
        assert!(ctrl.usb1_mini_b());
        assert!(!ctrl.usb1_wakeup());
        assert!(!ctrl.usb0_vbus_on());
    }

    #[test]
    fn usb0_setup_clears_stale_flags() {
        let mut syscon = fake_syscon();
        // Firmware left mini-B and wakeup set.
        syscon.modify_misc_ctrl(|mut ctrl| {
            ctrl.set_usb0_mini_b(true);
            ctrl.set_usb0_wakeup(true);
            ctrl
        });
        let phy = Fotg210::new_with_init(
            &mut syscon,
            UsbDescription {
                base_addr: USB0_BASE_ADDR,
                dr_mode: Some("peripheral"),
                mini_b: false,
                wakeup: false,
            },
        );
        assert_eq!(phy.port(), UsbPort::Usb0);
        assert_eq!(phy.mode(), DrMode::Peripheral);
        let ctrl = syscon.read_misc_ctrl();
        assert!(ctrl.usb0_vbus_on());
        assert!(!ctrl.usb0_mini_b());
        assert!(!ctrl.usb0_wakeup());
    }

    #[test]
    fn unknown_dr_mode_falls_back_to_host() {
        assert_eq!(DrMode::from_property(Some("otg")), DrMode::Host);
        assert_eq!(DrMode::from_property(None), DrMode::Host);
        assert_eq!(DrMode::from_property(Some("peripheral")), DrMode::Peripheral);
    }

    #[test]
    fn port_is_identified_by_base_address() {
        assert_eq!(UsbPort::from_base_addr(USB1_BASE_ADDR), UsbPort::Usb1);
        assert_eq!(UsbPort::from_base_addr(USB0_BASE_ADDR), UsbPort::Usb0);
    }
}
