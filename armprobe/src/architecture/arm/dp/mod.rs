//! The SW-DP.
//!
//! All access ports of a target are reached through the debug port, which owns the
//! probe and the cached SELECT register.

mod registers;

pub use registers::{
    Abort, CtrlStat, DebugPortId, DebugPortVersion, DpRegister, Dpidr, MinDpSupport, Select,
};

use std::cell::{Cell, RefCell};
use std::time::{Duration, Instant};

use super::{ArmError, BitRegister, Field};
use crate::probe::SwdTransport;
use registers::RDBUFF_ADDRESS;

/// The debug port of a single SWD connection.
///
/// Access ports borrow the debug port immutably, so several of them can share one
/// connection. The state behind that shared borrow lives in a [`RefCell`] and a
/// [`Cell`], which makes `DebugPort` `!Sync`: a debug port cannot be driven from two
/// threads at once.
pub struct DebugPort<P: SwdTransport> {
    probe: RefCell<P>,
    /// The value last written to SELECT, `None` while it is unknown.
    select: Cell<Option<Select>>,
}

impl<P: SwdTransport> DebugPort<P> {
    /// Takes over a probe with an established SWD link.
    ///
    /// The SELECT cache starts out unknown, so the first banked access always writes
    /// SELECT.
    pub fn new(probe: P) -> Self {
        Self {
            probe: RefCell::new(probe),
            select: Cell::new(None),
        }
    }

    /// Gives back the probe.
    pub fn into_inner(self) -> P {
        self.probe.into_inner()
    }

    /// Runs `f` with exclusive access to the probe, e.g. to drive the reset line.
    ///
    /// If `f` writes SELECT, the cache must be invalidated afterwards.
    ///
    /// # Panics
    ///
    /// The probe stays borrowed while `f` runs, so `f` must not call back into this
    /// debug port or any access port on it.
    pub fn with_probe<T>(&self, f: impl FnOnce(&mut P) -> T) -> T {
        let mut probe = self.probe.borrow_mut();
        f(&mut *probe)
    }

    /// Forgets the cached SELECT value.
    ///
    /// Must be called whenever SELECT may have changed behind our back, e.g. after the
    /// SWD line was reset or the connection was re-established.
    pub fn invalidate_cache(&self) {
        tracing::debug!("Invalidating the SELECT cache");
        self.select.set(None);
    }

    fn read_dp(&self, register: u8) -> Result<u32, ArmError> {
        let value = self.probe.borrow_mut().dp_read(register)?;

        tracing::trace!("DP read  {:#x} = {:#010x}", register, value);

        Ok(value)
    }

    fn write_dp(&self, register: u8, value: u32) -> Result<(), ArmError> {
        tracing::trace!("DP write {:#x} = {:#010x}", register, value);

        self.probe.borrow_mut().dp_write(register, value)?;
        Ok(())
    }

    fn read_register<R: DpRegister>(&self) -> Result<R, ArmError> {
        self.read_dp(R::ADDRESS).map(R::from_raw)
    }

    fn write_register<R: DpRegister>(&self, register: R) -> Result<(), ArmError> {
        self.write_dp(R::ADDRESS, register.raw())
    }

    /// Reads and decodes DPIDR.
    #[tracing::instrument(skip(self))]
    pub fn read_idr(&self) -> Result<DebugPortId, ArmError> {
        let idr: Dpidr = self.read_register()?;
        let id = DebugPortId::from(idr);

        tracing::debug!(
            "Debug port {} by {:?}, part {:#04x} revision {}",
            id.version,
            id.designer,
            id.part_no,
            id.revision
        );

        Ok(id)
    }

    /// Writes ABORT. The register is write-only and never cached.
    pub fn write_abort(&self, abort: Abort) -> Result<(), ArmError> {
        self.write_register(abort)
    }

    /// Clears all sticky error and compare flags in CTRL/STAT.
    pub fn clear_sticky_errors(&self) -> Result<(), ArmError> {
        tracing::debug!("Clearing sticky flags");

        self.write_abort(
            Abort::default()
                .with_stkcmpclr(true)
                .with_stkerrclr(true)
                .with_wderrclr(true)
                .with_orunerrclr(true),
        )
    }

    /// Reads CTRL/STAT, switching SELECT to DP bank 0 first if needed.
    pub fn read_ctrl_stat(&self) -> Result<CtrlStat, ArmError> {
        self.select(&[(Select::DP_BANK_SEL, 0)])?;
        self.read_register()
    }

    /// Writes CTRL/STAT, switching SELECT to DP bank 0 first if needed.
    pub fn write_ctrl_stat(&self, ctrl: CtrlStat) -> Result<(), ArmError> {
        self.select(&[(Select::DP_BANK_SEL, 0)])?;
        self.write_register(ctrl)
    }

    /// Updates SELECT with the given fields.
    ///
    /// The new value is derived from the cached one (or from zero while the cache is
    /// unknown) and only written if it differs from the cache. A failed write leaves
    /// the cache unknown.
    pub fn select(&self, fields: &[(Field<Select>, u32)]) -> Result<(), ArmError> {
        let cached = self.select.get();
        let select = Select::derive(cached.unwrap_or_default(), fields);

        if cached == Some(select) {
            return Ok(());
        }

        tracing::trace!("Changing SELECT from {:?} to {:?}", cached, select);

        self.select.set(None);
        self.write_register(select)?;
        self.select.set(Some(select));

        Ok(())
    }

    /// Reads RDBUFF, the result of the last posted AP read.
    ///
    /// This does not start a new AP transaction.
    pub fn read_rdbuff(&self) -> Result<u32, ArmError> {
        self.read_dp(RDBUFF_ADDRESS)
    }

    /// Reads the register at `address` of the access port `apsel`.
    ///
    /// AP reads are posted: the transfer returns the result of the previous AP read. With
    /// `pipelined` set, that stale value is returned as is and no error checking takes
    /// place. Otherwise READOK is checked in CTRL/STAT and the actual result is fetched
    /// from RDBUFF.
    pub fn ap_read(&self, apsel: u8, address: u8, pipelined: bool) -> Result<u32, ArmError> {
        let register = address >> 2;
        self.select(&[
            (Select::AP_SEL, apsel.into()),
            (Select::AP_BANK_SEL, (register >> 2).into()),
        ])?;

        let posted = self.probe.borrow_mut().ap_read(register & 0x3)?;

        tracing::trace!(
            "AP {} read  {:#04x} posted, previous = {:#010x}",
            apsel,
            address,
            posted
        );

        if pipelined {
            return Ok(posted);
        }

        let ctrl = self.read_ctrl_stat()?;
        if !ctrl.read_ok() {
            tracing::warn!(
                "Read of AP {} register {:#04x} did not complete: {:?}",
                apsel,
                address,
                ctrl
            );
            return Err(ArmError::ReadNotValid);
        }

        self.read_rdbuff()
    }

    /// Writes the register at `address` of the access port `apsel`.
    ///
    /// Errors of the AP write itself only surface as sticky flags in CTRL/STAT, which
    /// are not checked here.
    pub fn ap_write(&self, apsel: u8, address: u8, value: u32) -> Result<(), ArmError> {
        let register = address >> 2;
        self.select(&[
            (Select::AP_SEL, apsel.into()),
            (Select::AP_BANK_SEL, (register >> 2).into()),
        ])?;

        tracing::trace!("AP {} write {:#04x} = {:#010x}", apsel, address, value);

        self.probe.borrow_mut().ap_write(register & 0x3, value)?;
        Ok(())
    }

    /// Powers up the debug and system domains.
    ///
    /// Polls CTRL/STAT until both power-up requests are acknowledged, then enables all
    /// byte lanes in normal transfer mode.
    #[tracing::instrument(skip(self))]
    pub fn power_up(&self, timeout: Duration) -> Result<(), ArmError> {
        let request = CtrlStat::default()
            .with_cdbg_pwrup_req(true)
            .with_csys_pwrup_req(true);
        self.write_ctrl_stat(request)?;

        let start = Instant::now();
        loop {
            let ctrl = self.read_ctrl_stat()?;
            if ctrl.cdbg_pwrup_ack() && ctrl.csys_pwrup_ack() {
                break;
            }

            if start.elapsed() >= timeout {
                tracing::warn!("Power-up request not acknowledged: {:?}", ctrl);
                return Err(ArmError::Timeout);
            }
        }

        tracing::debug!("Debug and system power domains are up");

        self.write_ctrl_stat(request.with_mask_lane(0b1111))
    }
}
