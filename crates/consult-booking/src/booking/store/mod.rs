pub mod codec;
mod file;
mod memory;

pub use codec::{CodecError, FlatRecord};
pub use file::FlatFileStore;
pub use memory::MemoryStore;
