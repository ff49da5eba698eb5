//! Command Registry
//!
//! This module specifies the abstract contract between the interpreter and
//! non-builtin commands (`ls`, `cat`, `grep`, `awk`, ...). Concrete coreutil
//! implementations are external collaborators and are not part of this core;
//! only the trait, the context passed to implementations, and the registry
//! that the interpreter consults during command resolution live here.

pub mod registry;
pub mod types;

pub use registry::CommandRegistry;
pub use types::{Command, CommandContext, CommandResult};
