//! Memory access port

mod registers;

pub use registers::{AddressIncrement, Base, Cfg, Csw, DataSize};

use registers::{DRW_ADDRESS, TAR_ADDRESS};

use super::AccessPort;
use crate::architecture::arm::dp::DebugPort;
use crate::architecture::arm::{ArmError, BitRegister, ConfigurationError, Field};
use crate::memory::MemoryInterface;
use crate::probe::SwdTransport;

/// Returns the lane shift and mask of a `size` access to `address`.
fn byte_lane(address: u32, size: DataSize) -> Result<(u32, u32), ArmError> {
    let mask = match size {
        DataSize::U8 => 0xFF,
        DataSize::U16 => 0xFFFF,
        DataSize::U32 => 0xFFFF_FFFF,
        other => return Err(ConfigurationError::UnsupportedDataSize(other).into()),
    };

    let alignment = size.bytes();
    if address % alignment as u32 != 0 {
        return Err(ArmError::alignment_error(address, alignment));
    }

    Ok(((address & 0x3) * 8, mask))
}

/// A MEM-AP, giving access to a memory bus of the target.
///
/// Keeps a cache of the CSW register, so repeated accesses of the same size do not
/// rewrite it.
pub struct MemoryAp<'dp, P: SwdTransport> {
    ap: AccessPort<'dp, P>,
    /// `None` until CSW has been read, and after a failed CSW write.
    csw: Option<Csw>,
}

impl<'dp, P: SwdTransport> From<AccessPort<'dp, P>> for MemoryAp<'dp, P> {
    fn from(ap: AccessPort<'dp, P>) -> Self {
        Self { ap, csw: None }
    }
}

impl<'dp, P: SwdTransport> MemoryAp<'dp, P> {
    pub fn new(dp: &'dp DebugPort<P>, apsel: u8) -> Self {
        AccessPort::new(dp, apsel).into()
    }

    pub fn access_port(&self) -> &AccessPort<'dp, P> {
        &self.ap
    }

    pub fn debug_port(&self) -> &'dp DebugPort<P> {
        self.ap.debug_port()
    }

    /// Reads CSW and refreshes the cache with the result.
    pub fn read_csw(&mut self) -> Result<Csw, ArmError> {
        let csw: Csw = self.ap.read()?;
        self.csw = Some(csw);
        Ok(csw)
    }

    /// Updates CSW with the given fields.
    ///
    /// CSW is read first if the cache is empty. The write is skipped if the derived
    /// value equals the cached one.
    pub fn write_csw(&mut self, fields: &[(Field<Csw>, u32)]) -> Result<(), ArmError> {
        let current = match self.csw {
            Some(csw) => csw,
            None => self.read_csw()?,
        };

        let csw = Csw::derive(current, fields);
        if csw == current {
            return Ok(());
        }

        tracing::trace!("AP {}: changing CSW to {:?}", self.ap.apsel(), csw);

        self.csw = None;
        self.ap.write(csw)?;
        self.csw = Some(csw);

        Ok(())
    }

    pub fn read_tar(&self) -> Result<u32, ArmError> {
        self.ap.read_register(TAR_ADDRESS, false)
    }

    pub fn write_tar(&self, address: u32) -> Result<(), ArmError> {
        self.ap.write_register(TAR_ADDRESS, address)
    }

    /// Reads DRW, see [`DebugPort::ap_read`] for the meaning of `pipelined`.
    pub fn read_drw(&self, pipelined: bool) -> Result<u32, ArmError> {
        self.ap.read_register(DRW_ADDRESS, pipelined)
    }

    pub fn write_drw(&self, value: u32) -> Result<(), ArmError> {
        self.ap.write_register(DRW_ADDRESS, value)
    }

    pub fn read_cfg(&self) -> Result<Cfg, ArmError> {
        self.ap.read()
    }

    /// Reads BASE. The flag bits are left in place.
    pub fn read_base(&self) -> Result<Base, ArmError> {
        self.ap.read()
    }

    /// Reads a single byte, halfword or word, right aligned.
    pub fn read_single(&mut self, address: u32, size: DataSize) -> Result<u32, ArmError> {
        let (shift, mask) = byte_lane(address, size)?;

        self.write_tar(address)?;
        self.write_csw(&[(Csw::SIZE, size as u32)])?;
        let raw = self.read_drw(false)?;

        Ok((raw >> shift) & mask)
    }

    /// Writes a single byte, halfword or word.
    ///
    /// `value` is truncated to `size` and moved to its byte lane; the target only
    /// updates the bytes selected by CSW.SIZE and the address.
    pub fn write_single(
        &mut self,
        address: u32,
        value: u32,
        size: DataSize,
    ) -> Result<(), ArmError> {
        let (shift, mask) = byte_lane(address, size)?;

        self.write_tar(address)?;
        self.write_csw(&[(Csw::SIZE, size as u32)])?;
        self.write_drw((value & mask) << shift)
    }

    /// Reads `count` consecutive elements of `size`, starting at `address`.
    ///
    /// Uses TAR auto-increment and pipelined DRW reads: every DRW read returns the
    /// element requested by the one before it, so the first result is dropped and the
    /// last element is fetched from RDBUFF. The TAR only increments inside a 1 KiB
    /// block, so callers must not cross such a boundary.
    pub fn read_multiple(
        &mut self,
        address: u32,
        count: usize,
        size: DataSize,
    ) -> Result<Vec<u32>, ArmError> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let (_, mask) = byte_lane(address, size)?;
        let stride = size.bytes() as u32;

        self.write_tar(address)?;
        self.write_csw(&[
            (Csw::ADDR_INC, AddressIncrement::Single as u32),
            (Csw::SIZE, size as u32),
        ])?;

        // Posted data of whatever was read before.
        self.read_drw(true)?;

        let mut values = Vec::with_capacity(count);
        let mut element = address;
        for _ in 1..count {
            let raw = self.read_drw(true)?;
            values.push((raw >> ((element & 0x3) * 8)) & mask);
            element = element.wrapping_add(stride);
        }

        let raw = self.debug_port().read_rdbuff()?;
        values.push((raw >> ((element & 0x3) * 8)) & mask);

        tracing::trace!(
            "AP {}: read {} x {:?} from {:#010x}",
            self.ap.apsel(),
            count,
            size,
            address
        );

        Ok(values)
    }
}

impl<P: SwdTransport> MemoryInterface for MemoryAp<'_, P> {
    fn read_word(&mut self, address: u32) -> Result<u32, ArmError> {
        self.read_single(address, DataSize::U32)
    }

    fn read_halfword(&mut self, address: u32) -> Result<u32, ArmError> {
        self.read_single(address, DataSize::U16)
    }

    fn read_byte(&mut self, address: u32) -> Result<u32, ArmError> {
        self.read_single(address, DataSize::U8)
    }

    fn write_word(&mut self, address: u32, value: u32) -> Result<(), ArmError> {
        self.write_single(address, value, DataSize::U32)
    }

    fn write_halfword(&mut self, address: u32, value: u32) -> Result<(), ArmError> {
        self.write_single(address, value, DataSize::U16)
    }

    fn write_byte(&mut self, address: u32, value: u32) -> Result<(), ArmError> {
        self.write_single(address, value, DataSize::U8)
    }

    fn read_words(&mut self, address: u32, count: usize) -> Result<Vec<u32>, ArmError> {
        self.read_multiple(address, count, DataSize::U32)
    }

    fn read_halfwords(&mut self, address: u32, count: usize) -> Result<Vec<u32>, ArmError> {
        self.read_multiple(address, count, DataSize::U16)
    }

    fn read_bytes(&mut self, address: u32, count: usize) -> Result<Vec<u32>, ArmError> {
        self.read_multiple(address, count, DataSize::U8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::fake_probe::{FakeTarget, Transfer};
    use crate::probe::SwdAck;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn csw_writes(fake: &FakeTarget) -> usize {
        fake.count(|t| matches!(t, Transfer::ApWrite(0x00, _)))
    }

    #[test]
    fn first_csw_write_reads_csw() {
        let mut fake = FakeTarget::new();
        let dp = DebugPort::new(&mut fake);
        let mut ap = MemoryAp::new(&dp, 0);

        ap.write_csw(&[(Csw::SIZE, DataSize::U8 as u32)]).unwrap();

        assert_eq!(fake.count(|t| matches!(t, Transfer::ApRead(0x00))), 1);
        assert_eq!(fake.csw(0), Some(0x0000_0040));
    }

    #[test]
    fn unchanged_csw_is_not_written() {
        let mut fake = FakeTarget::new();
        let dp = DebugPort::new(&mut fake);
        let mut ap = MemoryAp::new(&dp, 0);

        ap.write_csw(&[(Csw::SIZE, DataSize::U8 as u32)]).unwrap();
        ap.write_csw(&[(Csw::SIZE, DataSize::U8 as u32)]).unwrap();
        ap.write_csw(&[(Csw::SIZE, DataSize::U16 as u32)]).unwrap();

        assert_eq!(csw_writes(&fake), 2);
        assert_eq!(fake.count(|t| matches!(t, Transfer::ApRead(0x00))), 1);
    }

    #[test]
    fn csw_write_matching_the_target_is_skipped() {
        let mut fake = FakeTarget::new();
        let dp = DebugPort::new(&mut fake);
        let mut ap = MemoryAp::new(&dp, 0);

        ap.write_csw(&[(Csw::SIZE, DataSize::U32 as u32)]).unwrap();

        assert_eq!(csw_writes(&fake), 0);
    }

    #[test]
    fn failed_csw_write_empties_the_cache() {
        let mut fake = FakeTarget::new();
        let dp = DebugPort::new(&mut fake);
        let mut ap = MemoryAp::new(&dp, 0);
        ap.read_csw().unwrap();

        dp.with_probe(|probe| probe.inject_ack(SwdAck::Wait));
        let error = ap.write_csw(&[(Csw::SIZE, DataSize::U8 as u32)]).unwrap_err();

        assert_eq!(error.ack(), Some(SwdAck::Wait));
        assert_eq!(ap.csw, None);

        ap.write_csw(&[(Csw::SIZE, DataSize::U8 as u32)]).unwrap();

        assert_eq!(fake.count(|t| matches!(t, Transfer::ApRead(0x00))), 2);
        assert_eq!(fake.csw(0), Some(0x0000_0040));
    }

    #[test_case(0x2000_0000, 0xDEAD_BEEF, DataSize::U32; "word")]
    #[test_case(0x2000_0002, 0xBEEF, DataSize::U16; "upper halfword")]
    #[test_case(0x2000_0000, 0x1234_BEEF, DataSize::U16; "lower halfword, truncated")]
    #[test_case(0x2000_0001, 0xA5, DataSize::U8; "byte 1")]
    #[test_case(0x2000_0003, 0x1FF, DataSize::U8; "byte 3, truncated")]
    fn byte_lane_round_trip(address: u32, value: u32, size: DataSize) {
        let mut fake = FakeTarget::new();
        fake.write_word(0x2000_0000, 0x5555_5555);
        let dp = DebugPort::new(&mut fake);
        let mut ap = MemoryAp::new(&dp, 0);

        ap.write_single(address, value, size).unwrap();
        let read = ap.read_single(address, size).unwrap();

        let mask = if size == DataSize::U32 {
            u32::MAX
        } else {
            (1 << size.bits()) - 1
        };
        assert_eq!(read, value & mask);
    }

    #[test]
    fn byte_write_keeps_the_other_lanes() {
        let mut fake = FakeTarget::new();
        fake.write_word(0x2000_0000, 0x1122_3344);
        let dp = DebugPort::new(&mut fake);
        let mut ap = MemoryAp::new(&dp, 0);

        ap.write_byte(0x2000_0002, 0xAB).unwrap();

        assert_eq!(fake.read_word(0x2000_0000), 0x11AB_3344);
    }

    #[test]
    fn unaligned_access_is_rejected_before_any_transfer() {
        let mut fake = FakeTarget::new();
        let dp = DebugPort::new(&mut fake);
        let mut ap = MemoryAp::new(&dp, 0);

        let error = ap.read_word(0x2000_0002).unwrap_err();

        assert!(matches!(
            error,
            ArmError::MemoryNotAligned {
                address: 0x2000_0002,
                alignment: 4
            }
        ));
        assert!(fake.transfers().is_empty());
    }

    #[test]
    fn odd_halfword_is_rejected_before_any_transfer() {
        let mut fake = FakeTarget::new();
        let dp = DebugPort::new(&mut fake);
        let mut ap = MemoryAp::new(&dp, 0);

        let error = ap.read_halfword(0x2000_0001).unwrap_err();

        assert!(matches!(
            error,
            ArmError::MemoryNotAligned {
                address: 0x2000_0001,
                alignment: 2
            }
        ));
        assert!(fake.transfers().is_empty());
    }

    #[test]
    fn wide_accesses_are_a_configuration_error() {
        let mut fake = FakeTarget::new();
        let dp = DebugPort::new(&mut fake);
        let mut ap = MemoryAp::new(&dp, 0);

        let error = ap.read_single(0x2000_0000, DataSize::U64).unwrap_err();

        assert!(matches!(
            error,
            ArmError::Configuration(ConfigurationError::UnsupportedDataSize(DataSize::U64))
        ));
    }

    #[test]
    fn read_multiple_pipelines_drw_reads() {
        let mut fake = FakeTarget::new();
        fake.load(0x2000_0000, &[10, 11, 12, 13, 14]);
        // Something for the first, stale result to be.
        fake.write_word(0x2000_0100, 0xFFFF_FFFF);
        let dp = DebugPort::new(&mut fake);
        let mut ap = MemoryAp::new(&dp, 0);
        ap.read_word(0x2000_0100).unwrap();

        let values = ap.read_words(0x2000_0000, 5).unwrap();

        assert_eq!(values, vec![10, 11, 12, 13, 14]);
    }

    #[test]
    fn read_multiple_transfer_count() {
        let mut fake = FakeTarget::new();
        fake.load(0x2000_0000, &[1, 2, 3, 4, 5]);
        let dp = DebugPort::new(&mut fake);
        let mut ap = MemoryAp::new(&dp, 0);
        ap.write_csw(&[
            (Csw::ADDR_INC, AddressIncrement::Single as u32),
            (Csw::SIZE, DataSize::U32 as u32),
        ])
        .unwrap();
        dp.with_probe(|probe| probe.clear_transfers());

        let values = ap.read_words(0x2000_0000, 5).unwrap();

        assert_eq!(values, vec![1, 2, 3, 4, 5]);
        assert_eq!(
            fake.transfers(),
            &[
                Transfer::ApWrite(0x04, 0x2000_0000),
                Transfer::ApRead(0x0C),
                Transfer::ApRead(0x0C),
                Transfer::ApRead(0x0C),
                Transfer::ApRead(0x0C),
                Transfer::ApRead(0x0C),
                Transfer::DpRead(3),
            ]
        );
    }

    #[test]
    fn read_multiple_of_nothing_does_nothing() {
        let mut fake = FakeTarget::new();
        let dp = DebugPort::new(&mut fake);
        let mut ap = MemoryAp::new(&dp, 0);

        assert_eq!(ap.read_words(0x2000_0001, 0).unwrap(), Vec::<u32>::new());
        assert!(fake.transfers().is_empty());
    }

    #[test]
    fn read_bytes_are_laned_per_element() {
        let mut fake = FakeTarget::new();
        fake.write_word(0x2000_0000, 0x4433_2211);
        fake.write_word(0x2000_0004, 0x8877_6655);
        let dp = DebugPort::new(&mut fake);
        let mut ap = MemoryAp::new(&dp, 0);

        let bytes = ap.read_bytes(0x2000_0002, 4).unwrap();

        assert_eq!(bytes, vec![0x33, 0x44, 0x55, 0x66]);
    }

    #[test]
    fn read_halfwords() {
        let mut fake = FakeTarget::new();
        fake.write_word(0x2000_0000, 0x4433_2211);
        fake.write_word(0x2000_0004, 0x8877_6655);
        let dp = DebugPort::new(&mut fake);
        let mut ap = MemoryAp::new(&dp, 0);

        let halfwords = ap.read_halfwords(0x2000_0002, 2).unwrap();

        assert_eq!(halfwords, vec![0x4433, 0x6655]);
    }

    #[test]
    fn base_and_cfg() {
        let mut fake = FakeTarget::new();
        let dp = DebugPort::new(&mut fake);
        let ap = MemoryAp::new(&dp, 0);

        assert_eq!(ap.read_base().unwrap().raw(), FakeTarget::MEM_AP_BASE);
        assert!(!ap.read_cfg().unwrap().be());
    }

    #[test]
    fn tar_round_trip() {
        let mut fake = FakeTarget::new();
        let dp = DebugPort::new(&mut fake);
        let ap = MemoryAp::new(&dp, 0);

        ap.write_tar(0x2000_1234).unwrap();

        assert_eq!(ap.read_tar().unwrap(), 0x2000_1234);
        assert_eq!(
            fake.transfers(),
            &[
                Transfer::DpWrite(2, 0x0000_0000),
                Transfer::ApWrite(0x04, 0x2000_1234),
                Transfer::ApRead(0x04),
                Transfer::DpRead(1),
                Transfer::DpRead(3),
            ]
        );
    }
}
