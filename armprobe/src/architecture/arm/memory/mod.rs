pub mod romtable;

pub use romtable::{
    ComponentClass, ComponentId, PeripheralId, RomTable, RomTableEntry, RomTableEntryRaw,
};
