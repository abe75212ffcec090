//! # Host side ADIv5 debug access over SWD
//!
//! `armprobe` turns the raw SWD transfers a debug probe exposes into register level
//! access to an ARM target's Debug Port, its Memory Access Ports and the memory bus
//! behind them.
//!
//! # Examples
//!
//! ## Reading memory through the first MEM-AP
//!
//! ```no_run
//! # use armprobe::Error;
//! use armprobe::architecture::arm::{ap::MemoryAp, dp::DebugPort};
//! use armprobe::probe::bluepill::BluePill;
//! use armprobe::{MemoryInterface, ProbeConfig};
//!
//! let config = ProbeConfig::default();
//!
//! let mut probe = BluePill::open(&config.usb)?;
//! probe.connect_swd()?;
//!
//! let dp = DebugPort::new(probe);
//! dp.power_up(config.power_up_timeout())?;
//!
//! let mut ap = MemoryAp::new(&dp, 0);
//! let cpuid = ap.read_word(0xE000_ED00)?;
//! let vectors = ap.read_words(0x0800_0000, 4)?;
//! # let _ = (cpuid, vectors);
//! # Ok::<(), Error>(())
//! ```
//!
//! The crate is built around the [`DebugPort`](architecture::arm::dp::DebugPort), which
//! owns the probe and the SELECT cache, and the
//! [`MemoryAp`](architecture::arm::ap::MemoryAp), which borrows the debug port and
//! implements [`MemoryInterface`].

/// All the interface bits for the different architectures.
pub mod architecture;
pub mod config;
mod error;
mod memory;
pub mod probe;
pub mod tools;

pub use crate::config::ProbeConfig;
pub use crate::error::Error;
pub use crate::memory::MemoryInterface;
