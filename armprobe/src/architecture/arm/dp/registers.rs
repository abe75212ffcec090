//! Debug port registers, ADIv5.2 chapter B2.2.

use jep106::JEP106Code;

use crate::architecture::arm::BitRegister;

/// A register of the SW-DP.
pub trait DpRegister: BitRegister {
    /// Register index A\[3:2\].
    const ADDRESS: u8;
}

/// Register index of RDBUFF, which has no fields.
pub(crate) const RDBUFF_ADDRESS: u8 = 3;

define_register! {
    /// DPIDR, Debug Port Identification register.
    Dpidr {
        /// Reads as one.
        PRESENT: bool = 0, 1;
        /// JEP106 continuation code in bits \[10:7\], identity code in bits \[6:0\].
        DESIGNER: u16 = 1, 11;
        VERSION: u8 = 12, 4;
        /// Set if the minimal debug port architecture is implemented.
        MIN: bool = 16, 1;
        PARTNO: u8 = 20, 8;
        REVISION: u8 = 28, 4;
    }
}

impl DpRegister for Dpidr {
    const ADDRESS: u8 = 0;
}

define_register! {
    /// ABORT, Abort register. Write-only, shares its address with [`Dpidr`].
    Abort {
        /// Aborts the current AP transaction.
        DAPABORT: bool = 0, 1;
        /// Clears CTRL/STAT.STICKYCMP.
        STKCMPCLR: bool = 1, 1;
        /// Clears CTRL/STAT.STICKYERR.
        STKERRCLR: bool = 2, 1;
        /// Clears CTRL/STAT.WDATAERR.
        WDERRCLR: bool = 3, 1;
        /// Clears CTRL/STAT.STICKYORUN.
        ORUNERRCLR: bool = 4, 1;
    }
}

impl DpRegister for Abort {
    const ADDRESS: u8 = 0;
}

define_register! {
    /// CTRL/STAT, Control/Status register. Only present in DP bank 0.
    CtrlStat {
        ORUN_DETECT: bool = 0, 1;
        STICKY_ORUN: bool = 1, 1;
        TRN_MODE: u8 = 2, 2;
        STICKY_CMP: bool = 4, 1;
        STICKY_ERR: bool = 5, 1;
        /// Set if the last AP read or RDBUFF read was successful.
        READ_OK: bool = 6, 1;
        WDATA_ERR: bool = 7, 1;
        MASK_LANE: u8 = 8, 4;
        TRN_CNT: u16 = 12, 12;
        CDBG_RST_REQ: bool = 26, 1;
        CDBG_RST_ACK: bool = 27, 1;
        CDBG_PWRUP_REQ: bool = 28, 1;
        CDBG_PWRUP_ACK: bool = 29, 1;
        CSYS_PWRUP_REQ: bool = 30, 1;
        CSYS_PWRUP_ACK: bool = 31, 1;
    }
}

impl DpRegister for CtrlStat {
    const ADDRESS: u8 = 1;
}

define_register! {
    /// SELECT, AP Select register.
    Select {
        /// Bank of the DP registers at index 1.
        DP_BANK_SEL: u8 = 0, 4;
        /// Bank of the selected AP, bits \[7:4\] of the AP register address.
        AP_BANK_SEL: u8 = 4, 4;
        AP_SEL: u8 = 24, 8;
    }
}

impl DpRegister for Select {
    const ADDRESS: u8 = 2;
}

/// The decoded contents of [`Dpidr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugPortId {
    pub revision: u8,
    pub part_no: u8,
    pub version: DebugPortVersion,
    pub min_dp_support: MinDpSupport,
    pub designer: JEP106Code,
}

impl From<Dpidr> for DebugPortId {
    fn from(dpidr: Dpidr) -> DebugPortId {
        let designer = dpidr.designer();

        DebugPortId {
            revision: dpidr.revision(),
            part_no: dpidr.partno(),
            version: dpidr.version().into(),
            min_dp_support: dpidr.min().into(),
            designer: JEP106Code::new((designer >> 7) as u8, (designer & 0x7F) as u8),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinDpSupport {
    NotImplemented,
    Implemented,
}

impl From<bool> for MinDpSupport {
    fn from(bit_set: bool) -> Self {
        if bit_set {
            MinDpSupport::Implemented
        } else {
            MinDpSupport::NotImplemented
        }
    }
}

/// The debug port architecture version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugPortVersion {
    DPv0,
    DPv1,
    DPv2,
    DPv3,
    Unsupported(u8),
}

impl From<u8> for DebugPortVersion {
    fn from(value: u8) -> Self {
        match value {
            0 => DebugPortVersion::DPv0,
            1 => DebugPortVersion::DPv1,
            2 => DebugPortVersion::DPv2,
            3 => DebugPortVersion::DPv3,
            other => DebugPortVersion::Unsupported(other),
        }
    }
}

impl std::fmt::Display for DebugPortVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DebugPortVersion::DPv0 => write!(f, "DPv0"),
            DebugPortVersion::DPv1 => write!(f, "DPv1"),
            DebugPortVersion::DPv2 => write!(f, "DPv2"),
            DebugPortVersion::DPv3 => write!(f, "DPv3"),
            DebugPortVersion::Unsupported(version) => write!(f, "<unsupported DP version {version}>"),
        }
    }
}
