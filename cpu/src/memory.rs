//! This module emulates the SDS 940's core memory.
//!
//! Memory holds up to 64K 24-bit words, in 32 frames of 2048 words.
//! Programs never address it directly: the processor translates
//! virtual addresses (see memorymap.rs) and the I/O channels use
//! physical addresses.  Installations had 16K, 32K or 64K words;
//! references beyond the installed size read as zero and writes to
//! them are discarded, as on the real machine.
use std::error;
use std::fmt::{self, Display, Formatter};

use serde::Serialize;
use tracing::{event, Level};

use base::prelude::*;

/// The amount of core memory installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MemorySize {
    Words16K,
    Words32K,
    Words64K,
}

impl MemorySize {
    #[must_use]
    pub fn words(&self) -> usize {
        match self {
            MemorySize::Words16K => 16 * 1024,
            MemorySize::Words32K => 32 * 1024,
            MemorySize::Words64K => 64 * 1024,
        }
    }

    /// Convert a size given in units of 1024 words.
    ///
    /// # Errors
    ///
    /// Only 16, 32 and 64 are supported.
    pub fn from_kilowords(k: u32) -> Result<MemorySize, UnsupportedMemorySize> {
        match k {
            16 => Ok(MemorySize::Words16K),
            32 => Ok(MemorySize::Words32K),
            64 => Ok(MemorySize::Words64K),
            _ => Err(UnsupportedMemorySize(k)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedMemorySize(pub u32);

impl Display for UnsupportedMemorySize {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(
            f,
            "memory size {}K is not supported; the choices are 16K, 32K and 64K",
            self.0
        )
    }
}

impl error::Error for UnsupportedMemorySize {}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryConfiguration {
    pub size: MemorySize,
}

impl Default for MemoryConfiguration {
    fn default() -> MemoryConfiguration {
        MemoryConfiguration {
            size: MemorySize::Words64K,
        }
    }
}

#[derive(Debug)]
pub struct MemoryUnit {
    words: Vec<Unsigned24Bit>,
    size: MemorySize,
}

impl MemoryUnit {
    #[must_use]
    pub fn new(config: &MemoryConfiguration) -> MemoryUnit {
        MemoryUnit {
            words: vec![Unsigned24Bit::ZERO; config.size.words()],
            size: config.size,
        }
    }

    #[must_use]
    pub fn size(&self) -> MemorySize {
        self.size
    }

    /// Read a word of physical memory.  Locations beyond the
    /// installed memory read as zero.
    #[must_use]
    pub fn fetch(&self, addr: PhysicalAddress) -> Unsigned24Bit {
        match self.words.get(addr.index()) {
            Some(w) => *w,
            None => {
                event!(Level::TRACE, "read from non-existent memory at {addr}");
                Unsigned24Bit::ZERO
            }
        }
    }

    /// Write a word of physical memory.  Writes beyond the installed
    /// memory are discarded.
    pub fn store(&mut self, addr: PhysicalAddress, value: Unsigned24Bit) {
        match self.words.get_mut(addr.index()) {
            Some(w) => {
                *w = value;
            }
            None => {
                event!(
                    Level::TRACE,
                    "discarding write of {value:08o} to non-existent memory at {addr}"
                );
            }
        }
    }

    /// Set all of memory to zero.
    pub fn clear(&mut self) {
        self.words.fill(Unsigned24Bit::ZERO);
    }
}
