//! Access ports.

pub mod memory_ap;

pub use memory_ap::{AddressIncrement, Base, Cfg, Csw, DataSize, MemoryAp};

use jep106::JEP106Code;

use super::dp::DebugPort;
use super::{ArmError, BitRegister};
use crate::probe::SwdTransport;

/// A register of an access port.
pub trait ApRegister: BitRegister {
    /// Byte address of the register inside the AP register space.
    const ADDRESS: u8;
}

define_register! {
    /// IDR, Identification Register. Present in every access port.
    Idr {
        AP_TYPE: u8 = 0, 4;
        VARIANT: u8 = 4, 4;
        CLASS: u8 = 13, 4;
        /// JEP106 continuation code in bits \[10:7\], identity code in bits \[6:0\].
        DESIGNER: u16 = 17, 11;
        REVISION: u8 = 28, 4;
    }
}

impl ApRegister for Idr {
    const ADDRESS: u8 = 0xFC;
}

/// The class of an access port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApClass {
    /// No class defined, e.g. a JTAG-AP.
    Undefined,
    /// A COM-AP.
    ComAp,
    /// A MEM-AP.
    MemAp,
    Unknown(u8),
}

impl From<u8> for ApClass {
    fn from(value: u8) -> Self {
        match value {
            0x0 => ApClass::Undefined,
            0x1 => ApClass::ComAp,
            0x8 => ApClass::MemAp,
            other => ApClass::Unknown(other),
        }
    }
}

/// The bus a MEM-AP connects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApType {
    /// A JTAG-AP, or a COM-AP.
    JtagComAp,
    AmbaAhb3,
    AmbaApb2Apb3,
    AmbaAxi3Axi4,
    AmbaAhb5,
    AmbaApb4Apb5,
    AmbaAxi5,
    AmbaAhb5Hprot,
    Unknown(u8),
}

impl From<u8> for ApType {
    fn from(value: u8) -> Self {
        match value {
            0x0 => ApType::JtagComAp,
            0x1 => ApType::AmbaAhb3,
            0x2 => ApType::AmbaApb2Apb3,
            0x4 => ApType::AmbaAxi3Axi4,
            0x5 => ApType::AmbaAhb5,
            0x6 => ApType::AmbaApb4Apb5,
            0x7 => ApType::AmbaAxi5,
            0x8 => ApType::AmbaAhb5Hprot,
            other => ApType::Unknown(other),
        }
    }
}

/// The decoded contents of [`Idr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApIdr {
    pub designer: JEP106Code,
    pub class: ApClass,
    pub ap_type: ApType,
    pub variant: u8,
    pub revision: u8,
}

impl From<Idr> for ApIdr {
    fn from(idr: Idr) -> Self {
        let designer = idr.designer();

        ApIdr {
            designer: JEP106Code::new((designer >> 7) as u8, (designer & 0x7F) as u8),
            class: idr.class().into(),
            ap_type: idr.ap_type().into(),
            variant: idr.variant(),
            revision: idr.revision(),
        }
    }
}

/// An access port behind a [`DebugPort`], addressed by its APSEL index.
pub struct AccessPort<'dp, P: SwdTransport> {
    dp: &'dp DebugPort<P>,
    apsel: u8,
}

impl<P: SwdTransport> Clone for AccessPort<'_, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P: SwdTransport> Copy for AccessPort<'_, P> {}

impl<P: SwdTransport> std::fmt::Debug for AccessPort<'_, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessPort")
            .field("apsel", &self.apsel)
            .finish()
    }
}

impl<'dp, P: SwdTransport> AccessPort<'dp, P> {
    pub fn new(dp: &'dp DebugPort<P>, apsel: u8) -> Self {
        Self { dp, apsel }
    }

    pub fn apsel(&self) -> u8 {
        self.apsel
    }

    /// The debug port this access port is reached through.
    pub fn debug_port(&self) -> &'dp DebugPort<P> {
        self.dp
    }

    /// Reads the register at `address`, see [`DebugPort::ap_read`].
    pub fn read_register(&self, address: u8, pipelined: bool) -> Result<u32, ArmError> {
        self.dp.ap_read(self.apsel, address, pipelined)
    }

    pub fn write_register(&self, address: u8, value: u32) -> Result<(), ArmError> {
        self.dp.ap_write(self.apsel, address, value)
    }

    /// Reads a typed register without pipelining.
    pub fn read<R: ApRegister>(&self) -> Result<R, ArmError> {
        self.read_register(R::ADDRESS, false).map(R::from_raw)
    }

    pub fn write<R: ApRegister>(&self, register: R) -> Result<(), ArmError> {
        self.write_register(R::ADDRESS, register.raw())
    }

    /// Reads and decodes the identification register.
    pub fn read_idr(&self) -> Result<ApIdr, ArmError> {
        let idr = ApIdr::from(self.read::<Idr>()?);

        tracing::debug!("AP {}: {:?}", self.apsel, idr);

        Ok(idr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::fake_probe::{FakeTarget, Transfer};
    use test_case::test_case;

    #[test]
    fn decode_ahb_ap_idr() {
        let idr = ApIdr::from(Idr::from(0x2477_0011));

        assert_eq!(
            idr,
            ApIdr {
                designer: JEP106Code::new(4, 0x3B),
                class: ApClass::MemAp,
                ap_type: ApType::AmbaAhb3,
                variant: 1,
                revision: 2,
            }
        );
    }

    #[test_case(0x0 => ApClass::Undefined; "undefined")]
    #[test_case(0x1 => ApClass::ComAp; "com ap")]
    #[test_case(0x8 => ApClass::MemAp; "mem ap")]
    #[test_case(0x3 => ApClass::Unknown(3); "reserved")]
    fn ap_class(raw: u8) -> ApClass {
        ApClass::from(raw)
    }

    #[test_case(0x2 => ApType::AmbaApb2Apb3; "apb2")]
    #[test_case(0x6 => ApType::AmbaApb4Apb5; "apb4")]
    #[test_case(0x8 => ApType::AmbaAhb5Hprot; "ahb5 hprot")]
    #[test_case(0x3 => ApType::Unknown(3); "reserved")]
    fn ap_type(raw: u8) -> ApType {
        ApType::from(raw)
    }

    #[test]
    fn read_idr_through_the_debug_port() {
        let mut fake = FakeTarget::new();
        let dp = DebugPort::new(&mut fake);
        let ap = AccessPort::new(&dp, 0);

        let idr = ap.read_idr().unwrap();

        assert_eq!(idr.class, ApClass::MemAp);
        assert_eq!(fake.count(|t| matches!(t, Transfer::ApRead(0xFC))), 1);
    }

    #[test]
    fn access_ports_share_the_select_cache() {
        let mut fake = FakeTarget::new().with_access_port(1, 0x1477_0015, 0);
        let dp = DebugPort::new(&mut fake);
        let first = AccessPort::new(&dp, 0);
        let second = AccessPort::new(&dp, 1);

        first.read_idr().unwrap();
        second.read_idr().unwrap();
        first.read_idr().unwrap();

        assert_eq!(fake.count(|t| matches!(t, Transfer::DpWrite(2, _))), 3);
        assert_eq!(fake.select(), 0x0000_00F0);
    }
}
