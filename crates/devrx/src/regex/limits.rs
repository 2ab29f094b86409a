//! Engine limits and working-memory sizing constants.
//!
//! The execution engine is a stack-free Pike VM: each device thread keeps two
//! thread lists (current and next) with one entry per instruction. Sizes here
//! must agree with the engine the programs are paired with.

// ===== Compiler =====

/// Maximum number of instructions in one program.
/// Instruction ids are stored as `i16` in the thread lists.
pub const MAX_INSTRUCTIONS: usize = i16::MAX as usize;

/// Largest count accepted in a `{n,m}` quantifier.
pub const MAX_REPEAT: u32 = 1000;

/// Maximum group nesting depth (prevents parser stack overflow).
pub const MAX_NESTING: usize = 200;

// ===== Execution tiers =====

/// Programs up to this many instructions fit the small per-thread tier.
pub const SMALL_TIER_INSTRUCTIONS: usize = 10;

/// Programs up to this many instructions fit the medium per-thread tier.
pub const MEDIUM_TIER_INSTRUCTIONS: usize = 100;

// ===== Working memory =====

/// Shared header preceding the per-thread slices. Returned for zero threads.
pub const WORKING_MEMORY_BASE: usize = 0;

/// Thread lists per execution (current and next).
pub const THREAD_LISTS: usize = 2;

/// Bytes for one instruction id in a thread list.
pub const INSTRUCTION_ID_BYTES: usize = 2;

/// Bytes for one match range (begin, end as `i32`).
pub const RANGE_BYTES: usize = 8;

/// Bytes for one capture group slot (begin, end as `i32`).
pub const GROUP_SLOT_BYTES: usize = 8;
