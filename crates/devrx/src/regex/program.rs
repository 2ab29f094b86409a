use std::ops::Range;

use smol_str::SmolStr;

use super::class::CharSet;
use super::compiler::compile;
use super::flags::{CaptureGroups, RegexFlags};
use super::instruction::Instruction;
use super::limits::{
    GROUP_SLOT_BYTES, INSTRUCTION_ID_BYTES, MEDIUM_TIER_INSTRUCTIONS, RANGE_BYTES, SMALL_TIER_INSTRUCTIONS,
    THREAD_LISTS, WORKING_MEMORY_BASE,
};
use crate::error::{DevrxResult, PreconditionError, PreconditionKind, SourceLocation, check_condition_at};

/// Per-thread memory tier an execution engine should be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExecutionTier {
    Small,
    Medium,
    Large,
}

impl ExecutionTier {
    pub fn for_instructions(count: usize) -> Self {
        if count <= SMALL_TIER_INSTRUCTIONS {
            ExecutionTier::Small
        } else if count <= MEDIUM_TIER_INSTRUCTIONS {
            ExecutionTier::Medium
        } else {
            ExecutionTier::Large
        }
    }
}

/// Compiled form of a regex program.
///
/// Not part of the stable API: only execution engines read it, through
/// [`RegexProgram::get_impl`].
#[derive(Debug)]
pub struct ProgramImpl {
    code: Vec<Instruction>,
    classes: Vec<CharSet>,
    groups: usize,
    flags: RegexFlags,
    capture: CaptureGroups,
}

impl ProgramImpl {
    pub(crate) fn new(
        code: Vec<Instruction>,
        classes: Vec<CharSet>,
        groups: usize,
        flags: RegexFlags,
        capture: CaptureGroups,
    ) -> Self {
        Self {
            code,
            classes,
            groups,
            flags,
            capture,
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.code
    }

    pub fn classes(&self) -> &[CharSet] {
        &self.classes
    }

    /// Entry point of the program.
    pub fn start_pc(&self) -> usize {
        0
    }

    pub fn instructions_count(&self) -> usize {
        self.code.len()
    }

    pub fn groups_count(&self) -> usize {
        self.groups
    }

    pub fn flags(&self) -> RegexFlags {
        self.flags
    }

    pub fn capture(&self) -> CaptureGroups {
        self.capture
    }

    /// Bytes of scratch state one concurrent execution needs.
    ///
    /// Two thread lists, each holding per instruction an instruction id and a
    /// match range, plus a visited bitmask. Under `Extract` every list entry
    /// also keeps a begin/end slot per group. Saturates at `usize::MAX`.
    pub fn thread_state_size(&self) -> usize {
        let insts = self.instructions_count();
        let group_bytes = match self.capture {
            CaptureGroups::Extract => self.groups.saturating_mul(GROUP_SLOT_BYTES),
            CaptureGroups::NonCapture => 0,
        };
        let entry = group_bytes.saturating_add(INSTRUCTION_ID_BYTES + RANGE_BYTES);
        insts
            .saturating_mul(entry)
            .saturating_add(insts.div_ceil(8))
            .saturating_mul(THREAD_LISTS)
    }
}

/// Placement of per-thread scratch slices in a caller-allocated buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingMemoryLayout {
    pub base: usize,
    pub per_thread: usize,
    pub num_threads: usize,
}

impl WorkingMemoryLayout {
    /// Total bytes to allocate; saturates instead of overflowing.
    pub fn total(&self) -> usize {
        self.per_thread
            .saturating_mul(self.num_threads)
            .saturating_add(self.base)
    }

    /// Byte range owned exclusively by thread `index`.
    pub fn thread_slice(&self, index: usize) -> Option<Range<usize>> {
        if index >= self.num_threads {
            return None;
        }
        let start = self.per_thread.checked_mul(index)?.checked_add(self.base)?;
        let end = start.checked_add(self.per_thread)?;
        Some(start..end)
    }
}

/// Snapshot of a program's metadata for introspection tooling.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProgramInfo {
    pub pattern: String,
    pub flags: RegexFlags,
    pub capture: CaptureGroups,
    pub instructions_count: usize,
    pub groups_count: usize,
    pub tier: ExecutionTier,
    pub thread_state_size: usize,
}

/// A compiled regex program.
///
/// Create one with [`RegexProgram::create`] and reuse it for any number of
/// matches. The program is immutable, so `&RegexProgram` can be shared across
/// threads freely. It cannot be cloned; ownership moves, or is taken with
/// [`RegexProgram::take`].
///
/// A program whose compiled form was taken is *empty*: `pattern()` is `""`,
/// `flags()` is `DEFAULT`, `capture()` is `Extract`, both counts are 0, the
/// working memory for any thread count is 0 and `get_impl()` is `None`.
#[derive(Debug)]
pub struct RegexProgram {
    pattern: SmolStr,
    flags: RegexFlags,
    capture: CaptureGroups,
    inner: Option<Box<ProgramImpl>>,
}

impl RegexProgram {
    /// Compile `pattern` with the default flags, extracting capture groups.
    #[track_caller]
    pub fn new(pattern: &str) -> DevrxResult<Self> {
        Self::create_at(pattern, RegexFlags::DEFAULT, CaptureGroups::Extract, SourceLocation::caller())
    }

    /// Compile `pattern`. Failures report the caller's location and quote the
    /// offending part of the pattern.
    #[track_caller]
    pub fn create(pattern: &str, flags: RegexFlags, capture: CaptureGroups) -> DevrxResult<Self> {
        Self::create_at(pattern, flags, capture, SourceLocation::caller())
    }

    fn create_at(
        pattern: &str,
        flags: RegexFlags,
        capture: CaptureGroups,
        location: SourceLocation,
    ) -> DevrxResult<Self> {
        check_condition_at(
            flags.unrecognized_bits() == 0,
            PreconditionKind::InvalidArgument,
            &format!("unrecognized regex flag bits {:#x}", flags.unrecognized_bits()),
            location,
        )?;
        check_condition_at(!pattern.is_empty(), PreconditionKind::InvalidArgument, "empty regex pattern", location)?;

        let inner = compile(pattern, flags, capture).map_err(|e| {
            PreconditionError::new(e.kind, format!("invalid regex pattern '{}': {}", pattern, e.message), location)
        })?;

        tracing::debug!(
            pattern,
            %flags,
            %capture,
            instructions = inner.instructions_count(),
            groups = inner.groups_count(),
            "compiled regex program"
        );

        Ok(Self {
            pattern: SmolStr::new(pattern),
            flags,
            capture,
            inner: Some(Box::new(inner)),
        })
    }

    /// Moves the compiled program out, leaving `self` empty.
    pub fn take(&mut self) -> RegexProgram {
        RegexProgram {
            pattern: std::mem::take(&mut self.pattern),
            flags: std::mem::take(&mut self.flags),
            capture: std::mem::take(&mut self.capture),
            inner: self.inner.take(),
        }
    }

    /// True once the compiled form has been taken.
    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn flags(&self) -> RegexFlags {
        self.flags
    }

    pub fn capture(&self) -> CaptureGroups {
        self.capture
    }

    pub fn instructions_count(&self) -> usize {
        self.inner.as_ref().map_or(0, |p| p.instructions_count())
    }

    pub fn groups_count(&self) -> usize {
        self.inner.as_ref().map_or(0, |p| p.groups_count())
    }

    pub fn execution_tier(&self) -> ExecutionTier {
        ExecutionTier::for_instructions(self.instructions_count())
    }

    /// Scratch bytes needed to run `num_threads` concurrent executions.
    ///
    /// Equals `WORKING_MEMORY_BASE + num_threads * per_thread`, so zero
    /// threads always need 0 bytes. Pure and allocation free.
    pub fn compute_working_memory_size(&self, num_threads: usize) -> usize {
        self.working_memory_layout(num_threads).total()
    }

    pub fn working_memory_layout(&self, num_threads: usize) -> WorkingMemoryLayout {
        WorkingMemoryLayout {
            base: WORKING_MEMORY_BASE,
            per_thread: self.inner.as_ref().map_or(0, |p| p.thread_state_size()),
            num_threads,
        }
    }

    pub fn info(&self) -> ProgramInfo {
        ProgramInfo {
            pattern: self.pattern.to_string(),
            flags: self.flags,
            capture: self.capture,
            instructions_count: self.instructions_count(),
            groups_count: self.groups_count(),
            tier: self.execution_tier(),
            thread_state_size: self.working_memory_layout(1).per_thread,
        }
    }

    /// Compiled form for execution engines. Not part of the stable API.
    #[doc(hidden)]
    pub fn get_impl(&self) -> Option<&ProgramImpl> {
        self.inner.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regex::detail::OpCode;

    #[test]
    fn test_thread_state_size() {
        // "(a)(b)" -> LBRA CHAR RBRA LBRA CHAR RBRA END
        let extract = RegexProgram::create("(a)(b)", RegexFlags::DEFAULT, CaptureGroups::Extract).unwrap();
        assert_eq!(extract.instructions_count(), 7);
        assert_eq!(extract.get_impl().unwrap().thread_state_size(), 2 * (7 * (2 + 8 + 16) + 1));

        // "a+" -> CHAR OR END
        let plus = RegexProgram::new("a+").unwrap();
        assert_eq!(plus.get_impl().unwrap().thread_state_size(), 2 * (3 * 10 + 1));
    }

    #[test]
    fn test_thread_state_size_saturates() {
        let end = Instruction::create_ab(OpCode::End, 0, 0);
        let huge = ProgramImpl::new(vec![end; 4], Vec::new(), usize::MAX / 4, RegexFlags::DEFAULT, CaptureGroups::Extract);
        assert_eq!(huge.thread_state_size(), usize::MAX);

        let fewer = ProgramImpl::new(vec![end; 4], Vec::new(), usize::MAX / 64, RegexFlags::DEFAULT, CaptureGroups::Extract);
        assert!(fewer.thread_state_size() <= huge.thread_state_size());

        let literal = ProgramImpl::new(vec![end; 4], Vec::new(), usize::MAX / 4, RegexFlags::DEFAULT, CaptureGroups::NonCapture);
        assert_eq!(literal.thread_state_size(), 2 * (4 * 10 + 1));
    }

    #[test]
    fn test_layout_slices() {
        let program = RegexProgram::new("abc").unwrap();
        let layout = program.working_memory_layout(3);
        let per = layout.per_thread;
        assert!(per > 0);
        assert_eq!(layout.thread_slice(0), Some(0..per));
        assert_eq!(layout.thread_slice(2), Some(2 * per..3 * per));
        assert_eq!(layout.thread_slice(3), None);
        assert_eq!(layout.total(), 3 * per);
    }

    #[test]
    fn test_layout_saturates() {
        let program = RegexProgram::new("abc").unwrap();
        assert_eq!(program.compute_working_memory_size(usize::MAX), usize::MAX);
    }

    #[test]
    fn test_tiers() {
        assert_eq!(ExecutionTier::for_instructions(10), ExecutionTier::Small);
        assert_eq!(ExecutionTier::for_instructions(11), ExecutionTier::Medium);
        assert_eq!(ExecutionTier::for_instructions(100), ExecutionTier::Medium);
        assert_eq!(ExecutionTier::for_instructions(101), ExecutionTier::Large);
        assert_eq!(RegexProgram::new("a").unwrap().execution_tier(), ExecutionTier::Small);
        assert_eq!(RegexProgram::new("a{50}").unwrap().execution_tier(), ExecutionTier::Medium);
        assert_eq!(RegexProgram::new("a{200}").unwrap().execution_tier(), ExecutionTier::Large);
    }

    #[test]
    fn test_info() {
        let program = RegexProgram::create("(x)y", RegexFlags::MULTILINE, CaptureGroups::Extract).unwrap();
        let info = program.info();
        assert_eq!(info.pattern, "(x)y");
        assert_eq!(info.flags, RegexFlags::MULTILINE);
        assert_eq!(info.groups_count, 1);
        assert_eq!(info.instructions_count, 5);
        assert_eq!(info.thread_state_size, program.compute_working_memory_size(1));
    }
}
