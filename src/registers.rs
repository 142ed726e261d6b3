// The physical register file: 37 slots with a routing table per mode, as
// opposed to copying banks around on every mode switch. R0..R7 are shared,
// R8..R12 have a FIQ shadow, R13/R14 are banked per privileged mode, and
// the PC is global. The flat slot order is part of the host protocol; in
// particular the CPSR sits at index 31.

use crate::fields::Mode;

pub const REGISTER_COUNT: usize = 37;
pub const CPSR_INDEX: usize = 31;

/// The Current Program Status Register as a thin wrapper with named bit
/// accessors. N/Z/C/V live in bits 31..28, I/F/T in bits 7..5 and the mode
/// in bits 4..0.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Cpsr(pub u32);

impl Cpsr {
    pub fn n(self) -> bool {
        self.0 >> 31 & 1 != 0
    }
    pub fn z(self) -> bool {
        self.0 >> 30 & 1 != 0
    }
    pub fn c(self) -> bool {
        self.0 >> 29 & 1 != 0
    }
    pub fn v(self) -> bool {
        self.0 >> 28 & 1 != 0
    }
    pub fn irq_disabled(self) -> bool {
        self.0 >> 7 & 1 != 0
    }
    pub fn fiq_disabled(self) -> bool {
        self.0 >> 6 & 1 != 0
    }
    pub fn mode_bits(self) -> u32 {
        self.0 & 0x1f
    }
    /// The running mode. A cleared CPSR (all zeroes, as after a hard reset)
    /// carries no recognized mode pattern and reads as user mode.
    pub fn mode(self) -> Mode {
        Mode::from_bits(self.mode_bits()).unwrap_or(Mode::User)
    }
    /// Replaces only the four condition flags, bits 31..28.
    pub fn with_flag_bits(self, value: u32) -> Cpsr {
        Cpsr((self.0 & 0x0fff_ffff) | (value & 0xf000_0000))
    }
}

/// A set of pending flag updates, applied in one go; flags left as `None`
/// keep their value. Instructions fill in exactly the flags their class
/// defines and stay silent about the rest.
#[derive(Debug, Default)]
pub struct CpsrFlags {
    pub n: Option<bool>,
    pub z: Option<bool>,
    pub c: Option<bool>,
    pub v: Option<bool>,
}

impl CpsrFlags {
    pub fn new() -> CpsrFlags {
        CpsrFlags::default()
    }
    /// N and Z from a result, the common case of every flag-setting class.
    pub fn nz(result: u32) -> CpsrFlags {
        CpsrFlags { n: Some(result >> 31 != 0), z: Some(result == 0), c: None, v: None }
    }
    pub fn apply(&self, cpsr: &mut Cpsr) {
        let mut bits = cpsr.0;
        for (bit, flag) in [(31, self.n), (30, self.z), (29, self.c), (28, self.v)].iter() {
            if let Some(value) = flag {
                if *value {
                    bits |= 1 << bit;
                } else {
                    bits &= !(1 << bit);
                }
            }
        }
        cpsr.0 = bits;
    }
}

pub struct RegisterFile {
    slots: [u32; REGISTER_COUNT],
}

/// Physical slot for logical register `r` in `mode`.
///
/// 0..=15 shared bank (user view), 16..=22 FIQ R8..R14, 23..=24 IRQ R13/R14,
/// 25..=26 SVC, 27..=28 ABT, 29..=30 UND, 31 CPSR, 32..=36 the five SPSRs.
fn slot_index(r: usize, mode: Mode) -> usize {
    match (r, mode) {
        (0..=7, _) | (15, _) => r,
        (8..=12, Mode::Fiq) => r + 8,
        (8..=12, _) => r,
        (13..=14, Mode::User) | (13..=14, Mode::Sys) => r,
        (13..=14, Mode::Fiq) => r + 8,
        (13..=14, Mode::Irq) => r + 10,
        (13..=14, Mode::Svc) => r + 12,
        (13..=14, Mode::Abt) => r + 14,
        (13..=14, Mode::Und) => r + 16,
        _ => panic!("register index out of range: r{}", r),
    }
}

fn spsr_index(mode: Mode) -> Option<usize> {
    match mode {
        Mode::Fiq => Some(32),
        Mode::Irq => Some(33),
        Mode::Svc => Some(34),
        Mode::Abt => Some(35),
        Mode::Und => Some(36),
        Mode::User | Mode::Sys => None,
    }
}

impl RegisterFile {
    pub fn new() -> Self {
        RegisterFile { slots: [0; REGISTER_COUNT] }
    }

    pub fn clear(&mut self) {
        self.slots = [0; REGISTER_COUNT];
    }

    pub fn get(&self, r: usize, mode: Mode) -> u32 {
        self.slots[slot_index(r, mode)]
    }

    pub fn set(&mut self, r: usize, mode: Mode, value: u32) {
        self.slots[slot_index(r, mode)] = value;
    }

    pub fn pc(&self) -> u32 {
        self.slots[15]
    }

    pub fn set_pc(&mut self, value: u32) {
        self.slots[15] = value;
    }

    pub fn cpsr(&self) -> Cpsr {
        Cpsr(self.slots[CPSR_INDEX])
    }

    pub fn set_cpsr(&mut self, cpsr: Cpsr) {
        self.slots[CPSR_INDEX] = cpsr.0;
    }

    pub fn mode(&self) -> Mode {
        self.cpsr().mode()
    }

    /// The saved status register of `mode`; user and system have none.
    pub fn spsr(&self, mode: Mode) -> Option<u32> {
        spsr_index(mode).map(|i| self.slots[i])
    }

    pub fn set_spsr(&mut self, mode: Mode, value: u32) {
        if let Some(i) = spsr_index(mode) {
            self.slots[i] = value;
        }
    }

    /// The flat 37-slot view handed to the host: slots 0..=15 are the
    /// current-mode R0..R15, the rest is the physical bank layout.
    pub fn snapshot(&self) -> [u32; REGISTER_COUNT] {
        let mode = self.mode();
        let mut out = self.slots;
        for (r, slot) in out.iter_mut().enumerate().take(16) {
            *slot = self.get(r, mode);
        }
        out
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_registers_are_shared() {
        let mut regs = RegisterFile::new();
        regs.set(3, Mode::User, 42);
        for mode in [Mode::Fiq, Mode::Irq, Mode::Svc, Mode::Abt, Mode::Und, Mode::Sys].iter() {
            assert_eq!(regs.get(3, *mode), 42);
        }
    }

    #[test]
    fn fiq_shadows_r8_to_r14() {
        let mut regs = RegisterFile::new();
        regs.set(8, Mode::User, 1);
        regs.set(8, Mode::Fiq, 2);
        assert_eq!(regs.get(8, Mode::User), 1);
        assert_eq!(regs.get(8, Mode::Sys), 1);
        assert_eq!(regs.get(8, Mode::Fiq), 2);
        regs.set(13, Mode::Fiq, 3);
        assert_eq!(regs.get(13, Mode::User), 0);
    }

    #[test]
    fn sp_and_lr_are_banked_per_mode() {
        let mut regs = RegisterFile::new();
        for (i, mode) in [Mode::User, Mode::Fiq, Mode::Irq, Mode::Svc, Mode::Abt, Mode::Und]
            .iter()
            .enumerate()
        {
            regs.set(13, *mode, i as u32 + 100);
        }
        assert_eq!(regs.get(13, Mode::User), 100);
        assert_eq!(regs.get(13, Mode::Sys), 100);
        assert_eq!(regs.get(13, Mode::Irq), 102);
        assert_eq!(regs.get(13, Mode::Und), 105);
    }

    #[test]
    fn snapshot_routes_current_mode_and_pins_cpsr() {
        let mut regs = RegisterFile::new();
        regs.set_cpsr(Cpsr(Mode::Fiq.bits()));
        regs.set(10, Mode::Fiq, 0xf1f1);
        regs.set(10, Mode::User, 0x0a0a);
        let snap = regs.snapshot();
        assert_eq!(snap[10], 0xf1f1);
        assert_eq!(snap[18], 0xf1f1);
        assert_eq!(snap[CPSR_INDEX], Mode::Fiq.bits());
    }

    #[test]
    fn spsr_slots() {
        let mut regs = RegisterFile::new();
        regs.set_spsr(Mode::Svc, 0x1f);
        assert_eq!(regs.spsr(Mode::Svc), Some(0x1f));
        assert_eq!(regs.spsr(Mode::User), None);
        // a user-mode write goes nowhere
        regs.set_spsr(Mode::User, 0xff);
        assert_eq!(regs.snapshot()[32..].iter().filter(|&&v| v == 0xff).count(), 0);
    }

    #[test]
    fn flag_batch_application() {
        let mut cpsr = Cpsr(0);
        let mut flags = CpsrFlags::nz(0);
        flags.c = Some(true);
        flags.apply(&mut cpsr);
        assert!(!cpsr.n() && cpsr.z() && cpsr.c() && !cpsr.v());
        // untouched flags survive the next application
        CpsrFlags::nz(0x8000_0000).apply(&mut cpsr);
        assert!(cpsr.n() && !cpsr.z() && cpsr.c());
    }
}
