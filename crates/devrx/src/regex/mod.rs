// Regex program compilation
//
// pattern --parser--> syntax tree --compiler--> instruction list
//
// The instruction list, class table and group count form the opaque
// `ProgramImpl`; callers only see the `RegexProgram` facade.

mod class;
mod compiler;
mod flags;
mod instruction;
mod parser;
mod program;

pub mod limits;

pub use flags::{CaptureGroups, RegexFlags};
pub use program::{ExecutionTier, ProgramInfo, RegexProgram, WorkingMemoryLayout};

/// Compiled-form types read by execution engines and introspection tools.
#[doc(hidden)]
pub mod detail {
    pub use super::class::{CharClass, CharSet, SetItem};
    pub use super::instruction::{Instruction, OpCode};
    pub use super::program::ProgramImpl;
}
