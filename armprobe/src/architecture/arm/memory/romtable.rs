//! CoreSight ROM table discovery.

use bitfield::bitfield;
use jep106::JEP106Code;

use crate::architecture::arm::ArmError;
use crate::memory::MemoryInterface;

/// Offset of the Component ID registers CIDR0..CIDR3 in a component.
const CID_OFFSET: u32 = 0xFF0;

/// Offset of the Peripheral ID registers PIDR4..PIDR7, followed by PIDR0..PIDR3.
const PID_OFFSET: u32 = 0xFD0;

/// Entries are only scanned below this offset, the registers above are not entries.
const ROM_TABLE_SIZE: u32 = 0xFCC;

/// The component class, bits \[15:12\] of the Component ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentClass {
    GenericVerificationComponent,
    RomTable,
    CoreSightComponent,
    PeripheralTestBlock,
    GenericIPComponent,
    CoreLinkOrPrimeCellOrSystemComponent,
    Unknown(u8),
}

impl From<u8> for ComponentClass {
    fn from(value: u8) -> Self {
        match value {
            0x0 => ComponentClass::GenericVerificationComponent,
            0x1 => ComponentClass::RomTable,
            0x9 => ComponentClass::CoreSightComponent,
            0xB => ComponentClass::PeripheralTestBlock,
            0xE => ComponentClass::GenericIPComponent,
            0xF => ComponentClass::CoreLinkOrPrimeCellOrSystemComponent,
            other => ComponentClass::Unknown(other),
        }
    }
}

/// The 32 bit Component ID, assembled from CIDR0..CIDR3.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ComponentId(pub u32);

impl ComponentId {
    /// Mask of the fixed preamble bits.
    const PREAMBLE_MASK: u32 = 0xFFFF_0FFF;

    /// Value of the preamble bits of every CoreSight component.
    const PREAMBLE: u32 = 0xB105_000D;

    /// Checks the fixed preamble around the component class.
    pub fn is_valid(&self) -> bool {
        self.0 & Self::PREAMBLE_MASK == Self::PREAMBLE
    }

    pub fn class(&self) -> ComponentClass {
        (((self.0 >> 12) & 0xF) as u8).into()
    }
}

impl std::fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ComponentId({:#010x}, {:?})", self.0, self.class())
    }
}

bitfield! {
    /// The 64 bit Peripheral ID, assembled from PIDR0..PIDR7.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct PeripheralId(u64);
    impl Debug;
    pub u16, part, _: 11, 0;
    u8, jep106_id, _: 18, 12;
    /// Set if the designer is identified by a JEP106 code.
    pub jedec, _: 19;
    pub u8, revision, _: 23, 20;
    /// Customer modification.
    pub u8, cmod, _: 27, 24;
    /// Manufacturer revision.
    pub u8, revand, _: 31, 28;
    u8, jep106_cc, _: 35, 32;
    /// Log2 of the number of 4 KiB blocks the component occupies.
    pub u8, size, _: 39, 36;
}

impl PeripheralId {
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// The designer, if the legacy ASCII identity is not used.
    pub fn designer(&self) -> Option<JEP106Code> {
        self.jedec()
            .then(|| JEP106Code::new(self.jep106_cc(), self.jep106_id()))
    }

    /// The number of 4 KiB blocks the component occupies.
    pub fn block_count(&self) -> u32 {
        1 << self.size()
    }
}

bitfield! {
    /// A raw ROM table entry.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct RomTableEntryRaw(u32);
    impl Debug;
    /// Signed offset of the component from the table, in 4 KiB pages.
    pub u32, address_offset, _: 31, 12;
    pub u8, power_domain_id, _: 7, 4;
    pub power_domain_id_valid, _: 2;
    /// Set for the 32 bit format.
    pub format, _: 1;
    pub entry_present, _: 0;
}

impl RomTableEntryRaw {
    /// The absolute address of the component, for a table at `table_address`.
    pub fn component_address(&self, table_address: u32) -> u32 {
        table_address.wrapping_add(self.address_offset() << 12)
    }
}

/// A component listed in a ROM table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RomTableEntry {
    pub raw: RomTableEntryRaw,
    pub address: u32,
    pub component_id: ComponentId,
    pub peripheral_id: PeripheralId,
}

/// A ROM table and the components it lists.
///
/// Nested ROM tables are listed as entries but not descended into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomTable {
    pub address: u32,
    pub component_id: ComponentId,
    pub peripheral_id: PeripheralId,
    pub entries: Vec<RomTableEntry>,
}

/// Reads the Component ID of the component at `base`.
pub fn read_component_id<M>(memory: &mut M, base: u32) -> Result<ComponentId, ArmError>
where
    M: MemoryInterface + ?Sized,
{
    let words = memory.read_words(base.wrapping_add(CID_OFFSET), 4)?;

    let cid = words
        .iter()
        .enumerate()
        .fold(0, |cid, (i, word)| cid | ((word & 0xFF) << (8 * i)));

    Ok(ComponentId(cid))
}

/// Reads the Peripheral ID of the component at `base`.
pub fn read_peripheral_id<M>(memory: &mut M, base: u32) -> Result<PeripheralId, ArmError>
where
    M: MemoryInterface + ?Sized,
{
    let words = memory.read_words(base.wrapping_add(PID_OFFSET), 8)?;

    // PIDR4..PIDR7 come first in memory, but hold the upper half of the ID.
    let (upper, lower) = words.split_at(4);
    let pid = lower
        .iter()
        .chain(upper)
        .enumerate()
        .fold(0, |pid, (i, word)| pid | (u64::from(word & 0xFF) << (8 * i)));

    Ok(PeripheralId(pid))
}

impl RomTable {
    /// Reads the ROM table at `base` and identifies every component it lists.
    ///
    /// `base` must be the table address, e.g. BASE with the flag bits masked off.
    /// Scanning stops at the first empty entry.
    #[tracing::instrument(skip(memory))]
    pub fn parse<M>(memory: &mut M, base: u32) -> Result<RomTable, ArmError>
    where
        M: MemoryInterface + ?Sized,
    {
        let component_id = read_component_id(memory, base)?;
        let peripheral_id = read_peripheral_id(memory, base)?;

        tracing::info!("ROM table CID: {:?}", component_id);
        tracing::info!("ROM table PID: {:x?}", peripheral_id);

        if !component_id.is_valid() {
            tracing::warn!("Component at {:#010x} has an invalid preamble", base);
        }

        let mut entries = Vec::new();
        for offset in (0..ROM_TABLE_SIZE).step_by(4) {
            let raw = RomTableEntryRaw(memory.read_word(base.wrapping_add(offset))?);

            if raw.0 == 0 {
                tracing::info!("Entry {:#05x} is empty, end of table.", offset);
                break;
            }

            let address = raw.component_address(base);

            tracing::info!(
                "Entry {:#05x}: {:?}, component at {:#010x}",
                offset,
                raw,
                address
            );

            if !raw.entry_present() {
                tracing::debug!("Entry {:#05x} is marked as not present", offset);
            }

            let entry = RomTableEntry {
                raw,
                address,
                component_id: read_component_id(memory, address)?,
                peripheral_id: read_peripheral_id(memory, address)?,
            };

            tracing::info!(
                "Component at {:#010x}: {:?}, part {:#05x}",
                address,
                entry.component_id,
                entry.peripheral_id.part()
            );

            entries.push(entry);
        }

        Ok(RomTable {
            address: base,
            component_id,
            peripheral_id,
            entries,
        })
    }
}
