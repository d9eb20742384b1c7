//! Shared primitives used across the interpreter, syscall proxy, and
//! simulator back ends.
//!
//! - [`error`]: fatal and recoverable error taxonomy.
//! - [`regfile`]: the strand's architectural register file.

/// Fatal and recoverable error taxonomy for the interpreter.
pub mod error;

/// The flat, `mmap`ed guest address space.
pub mod memory;

/// Architectural integer/floating-point register file.
pub mod regfile;

pub use error::{GuestError, HostError};
pub use memory::FlatMemory;
pub use regfile::RegisterFile;
