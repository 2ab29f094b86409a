// devrx
// Regex programs for massively parallel string matching, and classification
// of device-runtime failures into recoverable and context-fatal.

#[cfg(test)]
mod test;

pub mod device;
pub mod error;
pub mod regex;

pub use device::{CheckOption, Classification, DeviceContext, DeviceRuntime, DeviceStatus, StreamHandle};
pub use error::{DevrxResult, Failure, PreconditionKind, SourceLocation};
pub use regex::{CaptureGroups, ExecutionTier, RegexFlags, RegexProgram};
