//! Translation of virtual addresses to physical addresses.
//!
//! Programs address a 16K-word virtual memory (14-bit addresses)
//! made up of eight 2K-word pages.  How a page is located in physical
//! memory depends on the processor mode:
//!
//! ## Normal mode
//!
//! The SDS 930 compatible scheme.  Virtual addresses below 0o20000
//! refer directly to physical memory.  The 4K block at 0o20000 is
//! taken from the block of physical memory selected by extension
//! register EM2, and the block at 0o30000 from the one selected by
//! EM3.  Nothing is protected.
//!
//! ## Monitor mode
//!
//! Pages 0-3 are physical frames 0-3.  Pages 4 and 5 are the pair of
//! frames selected by EM2.  Pages 6 and 7 come from the low twelve
//! bits of relabeling register RL4.  A page 4-7 entry which is zero
//! means that the page is inaccessible.
//!
//! ## User mode
//!
//! Each of the eight pages has a 6-bit entry; pages 0-3 come from
//! RL1 and pages 4-7 from RL2 (page 0 in the most significant bits).
//!
//! In a 6-bit page entry bit 5 is write protection and bits 4-0 are
//! the physical frame.  An entry which is protected but names frame
//! 0 (that is, 0o40) denies all access.
use std::error;
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use base::prelude::*;

use crate::types::ProcessorMode;

/// The kind of memory access being translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// An address translation failure; these lead to traps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    NoAccess(Address),
    WriteProtect(Address),
}

impl Display for Fault {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Fault::NoAccess(va) => write!(f, "virtual address {va} is not accessible"),
            Fault::WriteProtect(va) => write!(f, "virtual address {va} is write-protected"),
        }
    }
}

impl error::Error for Fault {}

/// One entry of the monitor or user map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageEntry(Unsigned6Bit);

impl PageEntry {
    pub const NO_ACCESS: PageEntry = PageEntry(Unsigned6Bit::new::<0o40>());

    #[must_use]
    pub const fn new(bits: Unsigned6Bit) -> PageEntry {
        PageEntry(bits)
    }

    #[must_use]
    pub const fn protected(&self) -> bool {
        self.0.bit(5)
    }

    #[must_use]
    pub fn frame(&self) -> Unsigned5Bit {
        Unsigned5Bit::from_low_bits(u64::from(self.0.bits()))
    }
}

/// Extract the 6-bit entry whose least significant bit is `shift`.
fn entry_at(w: Unsigned24Bit, shift: u32) -> PageEntry {
    PageEntry(Unsigned6Bit::from_low_bits(u64::from(w.bits() >> shift)))
}

/// The registers from which the maps are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MapRegisters {
    pub em2: Unsigned3Bit,
    pub em3: Unsigned3Bit,
    pub rl1: Unsigned24Bit,
    pub rl2: Unsigned24Bit,
    pub rl4: Unsigned24Bit,
}

impl Default for MapRegisters {
    /// The extension registers select the blocks which make Normal
    /// mode an identity mapping of the low 16K words.
    fn default() -> MapRegisters {
        MapRegisters {
            em2: u3!(2),
            em3: u3!(3),
            rl1: Unsigned24Bit::ZERO,
            rl2: Unsigned24Bit::ZERO,
            rl4: Unsigned24Bit::ZERO,
        }
    }
}

/// Converts virtual addresses to physical ones.  The monitor and
/// user maps are recomputed whenever one of the registers they
/// depend on changes.
#[derive(Debug)]
pub struct AddressTranslator {
    regs: MapRegisters,
    monitor_map: [PageEntry; 8],
    user_map: [PageEntry; 8],
}

impl Default for AddressTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressTranslator {
    #[must_use]
    pub fn new() -> AddressTranslator {
        let mut result = AddressTranslator {
            regs: MapRegisters::default(),
            monitor_map: [PageEntry::NO_ACCESS; 8],
            user_map: [PageEntry::NO_ACCESS; 8],
        };
        result.rebuild_maps();
        result
    }

    pub fn reset(&mut self) {
        self.regs = MapRegisters::default();
        self.rebuild_maps();
    }

    #[must_use]
    pub fn registers(&self) -> &MapRegisters {
        &self.regs
    }

    pub fn set_em2(&mut self, value: Unsigned3Bit) {
        self.regs.em2 = value;
        self.rebuild_maps();
    }

    pub fn set_em3(&mut self, value: Unsigned3Bit) {
        self.regs.em3 = value;
        self.rebuild_maps();
    }

    pub fn set_rl1(&mut self, value: Unsigned24Bit) {
        self.regs.rl1 = value;
        self.rebuild_maps();
    }

    pub fn set_rl2(&mut self, value: Unsigned24Bit) {
        self.regs.rl2 = value;
        self.rebuild_maps();
    }

    pub fn set_rl4(&mut self, value: Unsigned24Bit) {
        self.regs.rl4 = value;
        self.rebuild_maps();
    }

    fn rebuild_maps(&mut self) {
        let em2 = u8::from(self.regs.em2);
        let mut monitor_map: [PageEntry; 8] = [
            PageEntry(u6!(0)),
            PageEntry(u6!(1)),
            PageEntry(u6!(2)),
            PageEntry(u6!(3)),
            PageEntry(Unsigned6Bit::from_low_bits(u64::from(em2 << 1))),
            PageEntry(Unsigned6Bit::from_low_bits(u64::from((em2 << 1) | 1))),
            entry_at(self.regs.rl4, 6),
            entry_at(self.regs.rl4, 0),
        ];
        for entry in monitor_map.iter_mut().skip(4) {
            if entry.0.is_zero() {
                *entry = PageEntry::NO_ACCESS;
            }
        }
        self.monitor_map = monitor_map;

        for page in 0..4 {
            let shift = 18 - 6 * page;
            self.user_map[page as usize] = entry_at(self.regs.rl1, shift);
            self.user_map[page as usize + 4] = entry_at(self.regs.rl2, shift);
        }
    }

    /// The page entry which applies to `va` in the given mode.  In
    /// Normal mode there is no page map, so `None` is returned.
    #[must_use]
    pub fn page_entry(&self, mode: ProcessorMode, va: Address) -> Option<PageEntry> {
        let page = usize::from(va.page());
        match mode {
            ProcessorMode::Normal => None,
            ProcessorMode::Monitor => Some(self.monitor_map[page]),
            ProcessorMode::User => Some(self.user_map[page]),
        }
    }

    /// Translate a virtual address.  The caller chooses the map: a
    /// Monitor-mode reference to a user-flagged address should pass
    /// `ProcessorMode::User`.
    ///
    /// # Errors
    ///
    /// `Fault::NoAccess` when the page is inaccessible, and
    /// `Fault::WriteProtect` when writing to a protected page.
    pub fn translate(
        &self,
        mode: ProcessorMode,
        va: Address,
        access: Access,
    ) -> Result<PhysicalAddress, Fault> {
        let bits = u32::from(va);
        match self.page_entry(mode, va) {
            None => {
                let pa = match bits >> 12 {
                    0 | 1 => bits,
                    2 => (u32::from(self.regs.em2) << 12) | (bits & 0o7777),
                    _ => (u32::from(self.regs.em3) << 12) | (bits & 0o7777),
                };
                Ok(PhysicalAddress::from_low_bits(pa))
            }
            Some(entry) if entry == PageEntry::NO_ACCESS => Err(Fault::NoAccess(va)),
            Some(entry) if entry.protected() && access == Access::Write => {
                Err(Fault::WriteProtect(va))
            }
            Some(entry) => Ok(PhysicalAddress::from_frame(entry.frame(), va.page_offset())),
        }
    }
}
