use armprobe::architecture::arm::ap::{ApClass, ApType, MemoryAp};
use armprobe::architecture::arm::dp::{DebugPort, DebugPortVersion, MinDpSupport};
use armprobe::architecture::arm::memory::{ComponentClass, RomTable};
use armprobe::architecture::arm::{AccessPort, ArmError};
use armprobe::config::MemoryMapConfig;
use armprobe::probe::fake_probe::{FakeTarget, Transfer};
use armprobe::probe::SwdAck;
use armprobe::tools::{build_memory_map, dump_memory};
use armprobe::MemoryInterface;
use jep106::JEP106Code;
use pretty_assertions::assert_eq;
use std::time::Duration;

const ROM_TABLE: u32 = 0xE00F_F000;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Stores the CIDR and PIDR registers of a component at `base`.
fn load_component(fake: &mut FakeTarget, base: u32, cid: u32, pid: u64) {
    let byte = |value: u64, i: u64| ((value >> (8 * i)) & 0xFF) as u32;

    for i in 0..4u32 {
        fake.write_word(base + 0xFF0 + 4 * i, byte(cid.into(), i.into()));
        fake.write_word(base + 0xFE0 + 4 * i, byte(pid, i.into()));
        fake.write_word(base + 0xFD0 + 4 * i, byte(pid, u64::from(i) + 4));
    }
}

/// A Cortex-M3 like target: a ROM table listing SCS, DWT, FPB, ITM and an absent TPIU.
fn cortex_m3() -> FakeTarget {
    let mut fake = FakeTarget::new()
        .with_access_port(1, 0x0476_0000, 0x0000_0000)
        .with_fault_range(0x4000_0000..0x6000_0000);

    fake.load(
        ROM_TABLE,
        &[
            0xFFF0_F003,
            0xFFF0_2003,
            0xFFF0_3003,
            0xFFF0_1003,
            0xFFF4_1002,
            0x0000_0000,
        ],
    );
    load_component(&mut fake, ROM_TABLE, 0xB105_100D, 0x0000_0004_000B_B4C3);
    load_component(&mut fake, 0xE000_E000, 0xB105_E00D, 0x0000_0004_000B_B000);
    load_component(&mut fake, 0xE000_1000, 0xB105_E00D, 0x0000_0004_003B_B002);
    load_component(&mut fake, 0xE000_2000, 0xB105_E00D, 0x0000_0004_002B_B003);
    load_component(&mut fake, 0xE000_0000, 0xB105_E00D, 0x0000_0004_003B_B001);

    fake
}

#[test]
fn identify_debug_port() {
    init_logging();

    let dp = DebugPort::new(cortex_m3());
    dp.power_up(Duration::from_millis(100)).unwrap();

    let id = dp.read_idr().unwrap();
    assert_eq!(id.designer, JEP106Code::new(4, 0x3B));
    assert_eq!(id.version, DebugPortVersion::DPv1);
    assert_eq!(id.min_dp_support, MinDpSupport::NotImplemented);
    assert_eq!(id.part_no, 0xBA);
    assert_eq!(id.revision, 0x2);

    let ctrl = dp.read_ctrl_stat().unwrap();
    assert!(ctrl.cdbg_pwrup_ack());
    assert!(ctrl.csys_pwrup_ack());
}

#[test]
fn power_up_times_out_without_acknowledge() {
    let dp = DebugPort::new(FakeTarget::new().without_power_ack());

    let result = dp.power_up(Duration::from_millis(5));

    assert!(matches!(result, Err(ArmError::Timeout)));
}

#[test]
fn walk_rom_table() {
    init_logging();

    let dp = DebugPort::new(cortex_m3());
    dp.power_up(Duration::from_millis(100)).unwrap();

    let mut ap = MemoryAp::new(&dp, 0);

    let idr = ap.access_port().read_idr().unwrap();
    assert_eq!(idr.class, ApClass::MemAp);
    assert_eq!(idr.ap_type, ApType::AmbaAhb3);

    let base = ap.read_base().unwrap();
    assert_eq!(u32::from(base), FakeTarget::MEM_AP_BASE);
    assert_eq!(base.address(), ROM_TABLE);

    let table = RomTable::parse(&mut ap, base.address()).unwrap();

    assert!(table.component_id.is_valid());
    assert_eq!(table.component_id.class(), ComponentClass::RomTable);
    assert_eq!(table.peripheral_id.part(), 0x4C3);

    let addresses: Vec<u32> = table.entries.iter().map(|entry| entry.address).collect();
    assert_eq!(
        addresses,
        vec![0xE000_E000, 0xE000_1000, 0xE000_2000, 0xE000_0000, 0xE004_0000]
    );

    let parts: Vec<u16> = table
        .entries
        .iter()
        .map(|entry| entry.peripheral_id.part())
        .collect();
    assert_eq!(parts, vec![0x000, 0x002, 0x003, 0x001, 0x000]);

    let tpiu = &table.entries[4];
    assert!(!tpiu.raw.entry_present());
    assert!(!tpiu.component_id.is_valid());
}

#[test]
fn access_ports_share_the_debug_port() {
    let mut fake = cortex_m3();
    fake.write_word(0x2000_0000, 0xCAFE_F00D);
    let dp = DebugPort::new(fake);

    let mut mem = MemoryAp::new(&dp, 0);
    let other = AccessPort::new(&dp, 1);

    assert_eq!(mem.read_word(0x2000_0000).unwrap(), 0xCAFE_F00D);
    assert_eq!(other.read_idr().unwrap().class, ApClass::Undefined);
    assert_eq!(mem.read_halfword(0x2000_0002).unwrap(), 0xCAFE);

    mem.write_byte(0x2000_0001, 0x42).unwrap();
    assert_eq!(mem.read_word(0x2000_0000).unwrap(), 0xCAFE_420D);

    let fake = dp.into_inner();
    assert_eq!(fake.read_word(0x2000_0000), 0xCAFE_420D);
    assert_eq!(fake.select(), 0x0000_0000);
}

#[test]
fn memory_interface_through_a_reference() {
    fn checksum<M: MemoryInterface>(mut memory: M, address: u32) -> u32 {
        memory
            .read_words(address, 4)
            .unwrap()
            .into_iter()
            .fold(0, u32::wrapping_add)
    }

    let mut fake = cortex_m3();
    fake.load(0x0800_0000, &[1, 2, 3, 4]);
    let dp = DebugPort::new(fake);
    let mut ap = MemoryAp::new(&dp, 0);

    assert_eq!(checksum(&mut ap, 0x0800_0000), 10);
    assert_eq!(ap.read_bytes(0x0800_0000, 5).unwrap(), vec![1, 0, 0, 0, 2]);
}

#[test]
fn bus_fault_recovery() {
    let dp = DebugPort::new(cortex_m3());
    let mut ap = MemoryAp::new(&dp, 0);

    let error = ap.read_word(0x4000_0000).unwrap_err();
    assert!(matches!(error, ArmError::ReadNotValid));

    // STICKYERR blocks every AP transfer until it is cleared.
    let error = ap.read_word(0x2000_0000).unwrap_err();
    assert_eq!(error.ack(), Some(SwdAck::Fault));

    dp.clear_sticky_errors().unwrap();
    assert_eq!(ap.read_word(0x2000_0000).unwrap(), 0);
}

#[test]
fn memory_map_and_dump() {
    init_logging();

    let mut fake = cortex_m3();
    fake.load(0x3FFF_FFF8, &[0x0302_0100, 0x0706_0504]);
    let dp = DebugPort::new(fake);
    let mut ap = MemoryAp::new(&dp, 0);

    let config = MemoryMapConfig {
        start: 0x3FFF_F000,
        end: 0x4000_1000,
        step: 0x800,
        pages_per_line: 2,
    };
    let map = build_memory_map(&mut ap, &config).unwrap();

    assert_eq!(map.to_string(), "3FFFF000 ++\n40000000 ..\n");

    let mut out = Vec::new();
    dump_memory(&mut ap, 0x3FFF_FFF8, 8, &mut out).unwrap();
    assert_eq!(out, vec![0, 1, 2, 3, 4, 5, 6, 7]);

    let fake = dp.into_inner();
    assert!(!fake.ctrl_stat().sticky_err());
    assert!(fake
        .transfers()
        .iter()
        .any(|transfer| *transfer == Transfer::DpRead(3)));
}
