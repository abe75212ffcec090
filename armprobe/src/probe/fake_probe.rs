//! A simulated SWD target, used to exercise the ADIv5 layers without hardware.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use super::{SwdAck, SwdTransport, TransferError};
use crate::architecture::arm::dp::{Abort, CtrlStat, Select};
use crate::architecture::arm::BitRegister;

/// A single transfer as seen by the target.
///
/// AP transfers carry the full AP register address, made up from the bank in SELECT
/// and the register index of the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    DpRead(u8),
    DpWrite(u8, u32),
    ApRead(u8),
    ApWrite(u8, u32),
}

/// TAR auto-increment only carries within a 1 KiB block.
const AUTO_INCREMENT_BLOCK: u32 = 0x400;

#[derive(Debug, Clone)]
struct FakeMemoryAp {
    idr: u32,
    csw: u32,
    tar: u32,
    cfg: u32,
    base: u32,
}

/// A target with an SW-DP and any number of MEM-APs sharing one memory bus.
///
/// Memory is word addressed and sparse, unwritten words read as zero. Accesses to an
/// address in one of the fault ranges set STICKYERR, after which every AP transfer is
/// answered with FAULT until STICKYERR is cleared through ABORT.
#[derive(Debug, Clone)]
pub struct FakeTarget {
    dpidr: u32,
    ctrl_stat: CtrlStat,
    select: Select,
    /// Result of the last AP read, returned by the next AP read and by RDBUFF.
    latch: u32,
    power_ack: bool,
    access_ports: BTreeMap<u8, FakeMemoryAp>,
    memory: HashMap<u32, u32>,
    faults: Vec<Range<u32>>,
    pending_ack: Option<SwdAck>,
    transfers: Vec<Transfer>,
}

impl Default for FakeTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeTarget {
    /// DPIDR of a Cortex-M3 SW-DP.
    pub const DPIDR: u32 = 0x2BA0_1477;

    /// IDR of an ARM AHB-AP.
    pub const MEM_AP_IDR: u32 = 0x2477_0011;

    /// BASE of the Cortex-M3 ROM table, with the present and format bits set.
    pub const MEM_AP_BASE: u32 = 0xE00F_F003;

    /// Creates a target with a single MEM-AP at index 0.
    pub fn new() -> Self {
        Self {
            dpidr: Self::DPIDR,
            ctrl_stat: CtrlStat::default(),
            select: Select::default(),
            latch: 0,
            power_ack: true,
            access_ports: BTreeMap::new(),
            memory: HashMap::new(),
            faults: Vec::new(),
            pending_ack: None,
            transfers: Vec::new(),
        }
        .with_access_port(0, Self::MEM_AP_IDR, Self::MEM_AP_BASE)
    }

    pub fn with_dpidr(mut self, dpidr: u32) -> Self {
        self.dpidr = dpidr;
        self
    }

    /// Adds or replaces the MEM-AP at `apsel`.
    pub fn with_access_port(mut self, apsel: u8, idr: u32, base: u32) -> Self {
        self.access_ports.insert(
            apsel,
            FakeMemoryAp {
                idr,
                // DeviceEn, 32 bit accesses without auto-increment.
                csw: 0x0000_0042,
                tar: 0,
                cfg: 0,
                base,
            },
        );
        self
    }

    /// Makes every access to `range` fail with a bus error.
    pub fn with_fault_range(mut self, range: Range<u32>) -> Self {
        self.faults.push(range);
        self
    }

    /// Never acknowledges power-up requests.
    pub fn without_power_ack(mut self) -> Self {
        self.power_ack = false;
        self
    }

    pub fn write_word(&mut self, address: u32, value: u32) {
        self.memory.insert(address & !0x3, value);
    }

    /// Stores consecutive words starting at `address`.
    pub fn load(&mut self, address: u32, words: &[u32]) {
        for (i, word) in words.iter().enumerate() {
            self.write_word(address.wrapping_add(4 * i as u32), *word);
        }
    }

    pub fn read_word(&self, address: u32) -> u32 {
        self.memory.get(&(address & !0x3)).copied().unwrap_or(0)
    }

    /// Answers the next transfer with `ack` instead of carrying it out.
    pub fn inject_ack(&mut self, ack: SwdAck) {
        self.pending_ack = Some(ack);
    }

    /// All transfers so far, including those rejected with an injected ack.
    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    pub fn clear_transfers(&mut self) {
        self.transfers.clear();
    }

    /// Counts the transfers matching `filter`.
    pub fn count(&self, filter: impl Fn(&Transfer) -> bool) -> usize {
        self.transfers.iter().filter(|t| filter(t)).count()
    }

    /// The SELECT value as held by the target.
    pub fn select(&self) -> u32 {
        self.select.raw()
    }

    pub fn ctrl_stat(&self) -> CtrlStat {
        self.ctrl_stat
    }

    /// The CSW value of the access port `apsel`, if it exists.
    pub fn csw(&self, apsel: u8) -> Option<u32> {
        self.access_ports.get(&apsel).map(|ap| ap.csw)
    }

    fn log(&mut self, transfer: Transfer) -> Result<(), TransferError> {
        self.transfers.push(transfer);

        match self.pending_ack.take() {
            Some(ack) => Err(TransferError::Ack(ack)),
            None => Ok(()),
        }
    }

    fn ap_address(&self, register: u8) -> u8 {
        (self.select.ap_bank_sel() << 4) | ((register & 0x3) << 2)
    }

    fn is_fault(&self, address: u32) -> bool {
        self.faults.iter().any(|range| range.contains(&address))
    }

    fn bus_error(&mut self) {
        self.ctrl_stat = self.ctrl_stat.with_sticky_err(true).with_read_ok(false);
    }

    fn check_sticky(&self) -> Result<(), TransferError> {
        if self.ctrl_stat.sticky_err() {
            Err(TransferError::Ack(SwdAck::Fault))
        } else {
            Ok(())
        }
    }

    /// Bytes the TAR advances by after a DRW access, `None` if it stays.
    fn increment(csw: u32) -> Option<u32> {
        match (csw >> 4) & 0x3 {
            1 => Some(1 << (csw & 0x7).min(2)),
            2 => Some(4),
            _ => None,
        }
    }

    fn advance_tar(ap: &mut FakeMemoryAp) {
        if let Some(step) = Self::increment(ap.csw) {
            let block = ap.tar & !(AUTO_INCREMENT_BLOCK - 1);
            let offset = (ap.tar.wrapping_add(step)) & (AUTO_INCREMENT_BLOCK - 1);
            ap.tar = block | offset;
        }
    }

    fn read_drw(&mut self, apsel: u8) -> Option<u32> {
        let tar = self.access_ports.get(&apsel)?.tar;
        if self.is_fault(tar) {
            return None;
        }

        let value = self.read_word(tar);
        if let Some(ap) = self.access_ports.get_mut(&apsel) {
            Self::advance_tar(ap);
        }
        Some(value)
    }

    fn write_drw(&mut self, apsel: u8, value: u32) -> bool {
        let Some(ap) = self.access_ports.get(&apsel) else {
            return true;
        };
        let (tar, csw) = (ap.tar, ap.csw);
        if self.is_fault(tar) {
            return false;
        }

        let strobe = match csw & 0x7 {
            0 => 0xFF << ((tar & 0x3) * 8),
            1 => 0xFFFF << ((tar & 0x2) * 8),
            _ => u32::MAX,
        };
        let word = self.read_word(tar);
        self.write_word(tar, (word & !strobe) | (value & strobe));

        if let Some(ap) = self.access_ports.get_mut(&apsel) {
            Self::advance_tar(ap);
        }
        true
    }
}

impl SwdTransport for FakeTarget {
    fn dp_read(&mut self, register: u8) -> Result<u32, TransferError> {
        self.log(Transfer::DpRead(register))?;

        Ok(match register & 0x3 {
            0 => self.dpidr,
            1 if self.select.dp_bank_sel() == 0 => self.ctrl_stat.raw(),
            1 => 0,
            _ => self.latch,
        })
    }

    fn dp_write(&mut self, register: u8, value: u32) -> Result<(), TransferError> {
        self.log(Transfer::DpWrite(register, value))?;

        match register & 0x3 {
            0 => {
                let abort = Abort::from(value);
                let ctrl = self.ctrl_stat;
                self.ctrl_stat = ctrl
                    .with_sticky_cmp(ctrl.sticky_cmp() && !abort.stkcmpclr())
                    .with_sticky_err(ctrl.sticky_err() && !abort.stkerrclr())
                    .with_wdata_err(ctrl.wdata_err() && !abort.wderrclr())
                    .with_sticky_orun(ctrl.sticky_orun() && !abort.orunerrclr());
            }
            1 if self.select.dp_bank_sel() == 0 => {
                let request = CtrlStat::from(value);
                let debug = request.cdbg_pwrup_req();
                let system = request.csys_pwrup_req();
                self.ctrl_stat = self
                    .ctrl_stat
                    .with_orun_detect(request.orun_detect())
                    .with_trn_mode(request.trn_mode())
                    .with_mask_lane(request.mask_lane())
                    .with_trn_cnt(request.trn_cnt())
                    .with_cdbg_rst_req(request.cdbg_rst_req())
                    .with_cdbg_pwrup_req(debug)
                    .with_csys_pwrup_req(system)
                    .with_cdbg_pwrup_ack(debug && self.power_ack)
                    .with_csys_pwrup_ack(system && self.power_ack);
            }
            2 => self.select = Select::from(value),
            _ => {}
        }

        Ok(())
    }

    fn ap_read(&mut self, register: u8) -> Result<u32, TransferError> {
        let address = self.ap_address(register);
        self.log(Transfer::ApRead(address))?;
        self.check_sticky()?;

        let apsel = self.select.ap_sel();
        let value = if address == 0x0C && self.access_ports.contains_key(&apsel) {
            self.read_drw(apsel)
        } else {
            let ap = self.access_ports.get(&apsel);
            Some(ap.map_or(0, |ap| match address {
                0x00 => ap.csw,
                0x04 => ap.tar,
                0xF4 => ap.cfg,
                0xF8 => ap.base,
                0xFC => ap.idr,
                _ => 0,
            }))
        };

        match value {
            Some(value) => {
                self.ctrl_stat = self.ctrl_stat.with_read_ok(true);
                Ok(std::mem::replace(&mut self.latch, value))
            }
            None => {
                self.bus_error();
                Ok(self.latch)
            }
        }
    }

    fn ap_write(&mut self, register: u8, value: u32) -> Result<(), TransferError> {
        let address = self.ap_address(register);
        self.log(Transfer::ApWrite(address, value))?;
        self.check_sticky()?;

        let apsel = self.select.ap_sel();
        if address == 0x0C {
            if !self.write_drw(apsel, value) {
                self.bus_error();
            }
            return Ok(());
        }

        if let Some(ap) = self.access_ports.get_mut(&apsel) {
            match address {
                // DeviceEn is read-only and always set, TrInProg always reads as zero.
                0x00 => ap.csw = (value | 0x40) & !0x80,
                0x04 => ap.tar = value,
                _ => {}
            }
        }

        Ok(())
    }
}
