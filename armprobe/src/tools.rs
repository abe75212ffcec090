//! Host side helpers built on top of a [`MemoryAp`].

use std::fmt;
use std::io::Write;

use crate::architecture::arm::{ArmError, DataSize, MemoryAp};
use crate::config::MemoryMapConfig;
use crate::probe::{SwdAck, SwdTransport};
use crate::{Error, MemoryInterface};

/// TAR auto-increment is only guaranteed inside a block of this size.
const AUTO_INCREMENT_BLOCK: u32 = 0x400;

/// Which pages of an address range answered a word read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMap {
    pub start: u32,
    pub step: u32,
    pub pages_per_line: usize,
    /// One entry per probed page, `true` if the read succeeded.
    pub pages: Vec<bool>,
}

impl MemoryMap {
    /// Number of accessible pages.
    pub fn accessible(&self) -> usize {
        self.pages.iter().filter(|page| **page).count()
    }

    /// Whether the page containing `address` was probed and is accessible.
    pub fn is_accessible(&self, address: u32) -> bool {
        address
            .checked_sub(self.start)
            .map(|offset| (offset / self.step) as usize)
            .and_then(|index| self.pages.get(index).copied())
            .unwrap_or(false)
    }
}

impl fmt::Display for MemoryMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line_span = u64::from(self.step) * self.pages_per_line.max(1) as u64;

        for (line, pages) in self.pages.chunks(self.pages_per_line.max(1)).enumerate() {
            let address = u64::from(self.start) + line as u64 * line_span;
            write!(f, "{address:08X} ")?;

            for page in pages {
                f.write_str(if *page { "+" } else { "." })?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

/// Whether `error` means nothing answered at the probed address.
fn is_bus_fault(error: &ArmError) -> bool {
    matches!(error, ArmError::ReadNotValid) || error.ack() == Some(SwdAck::Fault)
}

/// Probes one word per page of the configured range.
///
/// Pages whose read ends in a bus fault are marked inaccessible, and the sticky error
/// is cleared before the scan goes on. Any other error ends the scan.
#[tracing::instrument(skip_all)]
pub fn build_memory_map<P: SwdTransport>(
    ap: &mut MemoryAp<'_, P>,
    config: &MemoryMapConfig,
) -> Result<MemoryMap, Error> {
    config.validate()?;

    tracing::info!(
        "Scanning {:#010x}..{:#010x} in steps of {:#x}",
        config.start,
        config.end,
        config.step
    );

    let mut pages = Vec::new();
    let mut address = u64::from(config.start);
    while address < u64::from(config.end) {
        let page = address as u32;

        match ap.read_single(page, DataSize::U32) {
            Ok(_) => pages.push(true),
            Err(error) if is_bus_fault(&error) => {
                tracing::debug!("No memory at {:#010x}: {}", page, error);
                ap.debug_port().clear_sticky_errors()?;
                pages.push(false);
            }
            Err(error) => return Err(error.into()),
        }

        address += u64::from(config.step);
    }

    let map = MemoryMap {
        start: config.start,
        step: config.step,
        pages_per_line: config.pages_per_line,
        pages,
    };

    tracing::info!(
        "{} of {} pages are accessible",
        map.accessible(),
        map.pages.len()
    );

    Ok(map)
}

/// Copies `length / 4` words starting at `base` to `writer`, little endian.
///
/// Block reads are split at 1 KiB boundaries, where TAR auto-increment stops.
pub fn dump_memory<M, W>(
    memory: &mut M,
    base: u32,
    length: usize,
    writer: &mut W,
) -> Result<(), Error>
where
    M: MemoryInterface + ?Sized,
    W: Write + ?Sized,
{
    let mut remaining = length / 4;
    let mut address = base;

    tracing::info!("Dumping {} words from {:#010x}", remaining, base);

    while remaining > 0 {
        let block_left = (AUTO_INCREMENT_BLOCK - (address % AUTO_INCREMENT_BLOCK)) / 4;
        let count = remaining.min(block_left.max(1) as usize);

        let words = memory.read_words(address, count)?;
        for word in &words {
            writer.write_all(&word.to_le_bytes())?;
        }

        tracing::trace!("Dumped {} words at {:#010x}", count, address);

        remaining -= count;
        address = address.wrapping_add(4 * count as u32);
    }

    writer.flush()?;

    Ok(())
}
