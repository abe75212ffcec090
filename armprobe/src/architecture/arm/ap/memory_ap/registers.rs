//! MEM-AP registers, ADIv5.2 chapter C2.6.

use crate::architecture::arm::ap::ApRegister;
use crate::architecture::arm::ConfigurationError;

/// Byte address of TAR.
pub(crate) const TAR_ADDRESS: u8 = 0x04;

/// Byte address of DRW.
pub(crate) const DRW_ADDRESS: u8 = 0x0C;

/// The width of a single bus access, as encoded in CSW.SIZE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataSize {
    U8 = 0b000,
    U16 = 0b001,
    #[default]
    U32 = 0b010,
    U64 = 0b011,
    U128 = 0b100,
    U256 = 0b101,
}

impl DataSize {
    pub fn bits(self) -> u32 {
        8 << (self as u32)
    }

    pub fn bytes(self) -> usize {
        1 << (self as usize)
    }
}

impl TryFrom<u8> for DataSize {
    type Error = ConfigurationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0b000 => Ok(DataSize::U8),
            0b001 => Ok(DataSize::U16),
            0b010 => Ok(DataSize::U32),
            0b011 => Ok(DataSize::U64),
            0b100 => Ok(DataSize::U128),
            0b101 => Ok(DataSize::U256),
            other => Err(ConfigurationError::InvalidDataSize(other)),
        }
    }
}

/// The TAR auto-increment mode, as encoded in CSW.AddrInc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressIncrement {
    #[default]
    Off = 0b00,
    Single = 0b01,
    Packed = 0b10,
}

define_register! {
    /// CSW, Control/Status Word register.
    Csw {
        /// Size of the access, see [`DataSize`].
        SIZE: u8 = 0, 3;
        /// TAR auto-increment mode, see [`AddressIncrement`].
        ADDR_INC: u8 = 4, 2;
        /// Set if transactions can be issued through this MEM-AP.
        DEVICE_EN: bool = 6, 1;
        TR_IN_PROG: bool = 7, 1;
        MODE: u8 = 8, 4;
        ACCESS_TYPE: u8 = 12, 4;
        SPID_EN: bool = 23, 1;
        /// Bus access protection, the meaning depends on the bus.
        PROT: u8 = 24, 7;
        DBG_SW_ENABLE: bool = 31, 1;
    }
}

impl ApRegister for Csw {
    const ADDRESS: u8 = 0x00;
}

impl Csw {
    /// The decoded access size.
    pub fn data_size(&self) -> Result<DataSize, ConfigurationError> {
        DataSize::try_from(self.size())
    }

    /// The decoded auto-increment mode, `None` for the reserved encoding.
    pub fn address_increment(&self) -> Option<AddressIncrement> {
        match self.addr_inc() {
            0b00 => Some(AddressIncrement::Off),
            0b01 => Some(AddressIncrement::Single),
            0b10 => Some(AddressIncrement::Packed),
            _ => None,
        }
    }
}

define_register! {
    /// CFG, Configuration register.
    Cfg {
        /// Big-endian memory system.
        BE: bool = 0, 1;
        /// Large address, 64 bit TAR and BASE.
        LA: bool = 1, 1;
        /// Large data, accesses wider than 32 bit.
        LD: bool = 2, 1;
    }
}

impl ApRegister for Cfg {
    const ADDRESS: u8 = 0xF4;
}

define_register! {
    /// BASE, Debug Base Address register.
    ///
    /// Holds the address of the first ROM table together with two flag bits, so the raw
    /// value is not a usable address. Use [`Base::baseaddr`] or [`Base::address`].
    Base {
        /// Set if a debug entry is present.
        PRESENT: bool = 0, 1;
        /// Set for the ADIv5 format, clear for the legacy format.
        FORMAT: bool = 1, 1;
        /// Bits \[31:12\] of the ROM table address.
        BASEADDR: u32 = 12, 20;
    }
}

impl ApRegister for Base {
    const ADDRESS: u8 = 0xF8;
}

impl Base {
    /// The ROM table address with the flag bits removed.
    pub fn address(&self) -> u32 {
        self.baseaddr() << 12
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architecture::arm::BitRegister;
    use test_case::test_case;

    #[test_case(DataSize::U8 => (8, 1); "byte")]
    #[test_case(DataSize::U16 => (16, 2); "halfword")]
    #[test_case(DataSize::U32 => (32, 4); "word")]
    #[test_case(DataSize::U256 => (256, 32); "u256")]
    fn data_size_widths(size: DataSize) -> (u32, usize) {
        (size.bits(), size.bytes())
    }

    #[test]
    fn reserved_size_codes_are_rejected() {
        assert_eq!(
            DataSize::try_from(0b110),
            Err(ConfigurationError::InvalidDataSize(0b110))
        );
        assert_eq!(DataSize::try_from(0b001), Ok(DataSize::U16));
    }

    #[test]
    fn csw_fields() {
        let csw = Csw::from(0xA300_0052);

        assert_eq!(csw.data_size(), Ok(DataSize::U32));
        assert_eq!(csw.address_increment(), Some(AddressIncrement::Single));
        assert!(csw.device_en());
        assert!(!csw.tr_in_prog());
        assert_eq!(csw.prot(), 0x23);
        assert!(csw.dbg_sw_enable());
    }

    #[test]
    fn base_is_not_masked() {
        let base = Base::from(0xE00F_F003);

        assert_eq!(base.raw(), 0xE00F_F003);
        assert!(base.present());
        assert!(base.format());
        assert_eq!(base.address(), 0xE00F_F000);
    }
}
