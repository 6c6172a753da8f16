mod harness;
mod host;
mod memory;

pub use harness::{Harness, HarnessBuilder};
pub use host::{ManualClock, ManualHost, RecordingTarget};
pub use memory::{Event, EventLog, MemorySlotContainer, TestSlot};
