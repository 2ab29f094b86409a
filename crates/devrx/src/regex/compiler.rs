// Regex program compiler
// Lowers the parsed syntax tree to a linear Thompson-NFA instruction list
// for a stack-free, single-pass VM. Each device thread walks the list with
// one instruction pointer per NFA state, so repetition is expanded inline
// and every branch is an explicit SPLIT/JMP.

use std::collections::HashMap;

use ahash::RandomState;

use super::class::{CharSet, SetItem};
use super::flags::{CaptureGroups, RegexFlags};
use super::instruction::{Instruction, OpCode};
use super::limits::MAX_INSTRUCTIONS;
use super::parser::{AssertKind, Node, PatternError, parse_pattern};
use super::program::ProgramImpl;
use crate::error::PreconditionKind;

/// Compile `pattern` into a fresh program. Holds no state between calls.
pub fn compile(pattern: &str, flags: RegexFlags, capture: CaptureGroups) -> Result<ProgramImpl, PatternError> {
    let parsed = parse_pattern(pattern, capture)?;

    let mut compiler = Compiler::new(flags);
    compiler.compile_node(&parsed.root)?;
    compiler.code_ab(OpCode::End, 0, 0)?;

    Ok(ProgramImpl::new(
        compiler.code,
        compiler.classes,
        parsed.groups,
        flags,
        capture,
    ))
}

struct Compiler {
    code: Vec<Instruction>,
    classes: Vec<CharSet>,
    // class -> index in `classes`, so repeated sets share one entry
    class_ids: HashMap<CharSet, u32, RandomState>,
    flags: RegexFlags,
}

impl Compiler {
    fn new(flags: RegexFlags) -> Self {
        Self {
            code: Vec::new(),
            classes: Vec::new(),
            class_ids: HashMap::with_hasher(RandomState::new()),
            flags,
        }
    }

    /// Current position, i.e. the pc of the next emitted instruction.
    #[inline]
    fn here(&self) -> u32 {
        self.code.len() as u32
    }

    fn code_ab(&mut self, op: OpCode, a: u32, b: u32) -> Result<usize, PatternError> {
        if self.code.len() >= MAX_INSTRUCTIONS {
            return Err(too_many_instructions());
        }
        let pc = self.code.len();
        self.code.push(Instruction::create_ab(op, a, b));
        Ok(pc)
    }

    fn patch_a(&mut self, pc: usize, target: u32) {
        self.code[pc].set_a(target);
    }

    fn patch_b(&mut self, pc: usize, target: u32) {
        self.code[pc].set_b(target);
    }

    /// Point a SPLIT at its two continuations, preferring `first`.
    fn patch_split(&mut self, pc: usize, first: u32, second: u32) {
        self.patch_a(pc, first);
        self.patch_b(pc, second);
    }

    fn compile_node(&mut self, node: &Node) -> Result<(), PatternError> {
        match node {
            Node::Empty => Ok(()),
            Node::Char(c) => self.compile_char(*c),
            Node::Dot => {
                let op = if self.flags.is_dotall() {
                    OpCode::AnyNl
                } else {
                    OpCode::Any
                };
                self.code_ab(op, 0, self.flags.is_ext_newline() as u32)?;
                Ok(())
            }
            Node::Set { items, negated } => {
                let items = self.fold_items(items);
                let index = self.intern_class(CharSet::new(items, self.flags.is_ascii()));
                let op = if *negated { OpCode::NClass } else { OpCode::Class };
                self.code_ab(op, index, 0)?;
                Ok(())
            }
            Node::Assert(kind) => self.compile_assert(*kind),
            Node::Group { index, node } => match index {
                Some(group) => {
                    self.code_ab(OpCode::Lbra, *group as u32, 0)?;
                    self.compile_node(node)?;
                    self.code_ab(OpCode::Rbra, *group as u32, 0)?;
                    Ok(())
                }
                None => self.compile_node(node),
            },
            Node::Concat(nodes) => {
                for node in nodes {
                    self.compile_node(node)?;
                }
                Ok(())
            }
            Node::Alternate(branches) => self.compile_alternate(branches),
            Node::Repeat {
                node,
                min,
                max,
                greedy,
            } => self.compile_repeat(node, *min, *max, *greedy),
        }
    }

    fn compile_char(&mut self, c: char) -> Result<(), PatternError> {
        if self.flags.is_ignorecase() {
            let variants = case_variants(c);
            if variants.len() > 1 {
                let items = variants.into_iter().map(SetItem::Char).collect();
                let index = self.intern_class(CharSet::new(items, self.flags.is_ascii()));
                self.code_ab(OpCode::Class, index, 0)?;
                return Ok(());
            }
        }
        self.code_ab(OpCode::Char, 0, c as u32)?;
        Ok(())
    }

    fn compile_assert(&mut self, kind: AssertKind) -> Result<(), PatternError> {
        let multiline = self.flags.is_multiline();
        let ext = self.flags.is_ext_newline() as u32;
        let ascii = self.flags.is_ascii() as u32;
        let (op, b) = match kind {
            AssertKind::Caret if multiline => (OpCode::LineStart, ext),
            AssertKind::Dollar if multiline => (OpCode::LineEnd, ext),
            AssertKind::Caret | AssertKind::TextStart => (OpCode::TextStart, 0),
            AssertKind::Dollar | AssertKind::TextEnd => (OpCode::TextEnd, 0),
            AssertKind::WordBoundary => (OpCode::WordBoundary, ascii),
            AssertKind::NotWordBoundary => (OpCode::NotWordBoundary, ascii),
        };
        self.code_ab(op, 0, b)?;
        Ok(())
    }

    //     SPLIT L1, L2
    // L1: branch 0
    //     JMP end
    // L2: SPLIT L3, L4
    //     ...
    // Ln: last branch
    // end:
    fn compile_alternate(&mut self, branches: &[Node]) -> Result<(), PatternError> {
        let mut exits = Vec::with_capacity(branches.len());
        let last = branches.len().saturating_sub(1);
        for (i, branch) in branches.iter().enumerate() {
            if i == last {
                self.compile_node(branch)?;
                break;
            }
            let split = self.code_ab(OpCode::Split, 0, 0)?;
            self.compile_node(branch)?;
            exits.push(self.code_ab(OpCode::Jmp, 0, 0)?);
            let next = self.here();
            self.patch_split(split, split as u32 + 1, next);
        }
        let end = self.here();
        for jmp in exits {
            self.patch_a(jmp, end);
        }
        Ok(())
    }

    fn compile_repeat(&mut self, node: &Node, min: u32, max: Option<u32>, greedy: bool) -> Result<(), PatternError> {
        let body_len = emitted_len(node);
        if body_len == 0 {
            // repeating a zero-width body matches the same as the body alone
            return Ok(());
        }
        if self.code.len().saturating_add(repeat_len(body_len, min, max)) > MAX_INSTRUCTIONS {
            return Err(too_many_instructions());
        }

        match max {
            // x*:  L: SPLIT body, out ; body: x ; JMP L ; out:
            None if min == 0 => {
                let split = self.code_ab(OpCode::Split, 0, 0)?;
                self.compile_node(node)?;
                self.code_ab(OpCode::Jmp, split as u32, 0)?;
                let out = self.here();
                self.prefer(split, split as u32 + 1, out, greedy);
            }
            // x{n,}:  x repeated n-1 times ; L: x ; SPLIT L, out ; out:
            None => {
                for _ in 1..min {
                    self.compile_node(node)?;
                }
                let body = self.here();
                self.compile_node(node)?;
                let split = self.code_ab(OpCode::Split, 0, 0)?;
                self.prefer(split, body, split as u32 + 1, greedy);
            }
            // x{n,m}:  x repeated n times, then m-n optional copies that
            // all exit to the same place
            Some(max) => {
                for _ in 0..min {
                    self.compile_node(node)?;
                }
                let mut splits = Vec::new();
                for _ in min..max {
                    splits.push(self.code_ab(OpCode::Split, 0, 0)?);
                    self.compile_node(node)?;
                }
                let out = self.here();
                for split in splits {
                    self.prefer(split, split as u32 + 1, out, greedy);
                }
            }
        }
        Ok(())
    }

    /// Patch a SPLIT whose `body` continuation is preferred when greedy.
    fn prefer(&mut self, split: usize, body: u32, out: u32, greedy: bool) {
        if greedy {
            self.patch_split(split, body, out);
        } else {
            self.patch_split(split, out, body);
        }
    }

    fn intern_class(&mut self, set: CharSet) -> u32 {
        if let Some(&index) = self.class_ids.get(&set) {
            return index;
        }
        let index = self.classes.len() as u32;
        self.classes.push(set.clone());
        self.class_ids.insert(set, index);
        index
    }

    /// Add case counterparts to set items when IGNORECASE is on.
    /// Ranges fold over ASCII letters only.
    fn fold_items(&self, items: &[SetItem]) -> Vec<SetItem> {
        if !self.flags.is_ignorecase() {
            return items.to_vec();
        }
        let mut folded = Vec::with_capacity(items.len() * 2);
        for item in items {
            folded.push(*item);
            match *item {
                SetItem::Char(c) => {
                    folded.extend(case_variants(c).into_iter().filter(|&v| v != c).map(SetItem::Char));
                }
                SetItem::Range(lo, hi) => {
                    if let Some((l, h)) = overlap(lo, hi, 'a', 'z') {
                        folded.push(SetItem::Range(l.to_ascii_uppercase(), h.to_ascii_uppercase()));
                    }
                    if let Some((l, h)) = overlap(lo, hi, 'A', 'Z') {
                        folded.push(SetItem::Range(l.to_ascii_lowercase(), h.to_ascii_lowercase()));
                    }
                }
                SetItem::Class(_) | SetItem::InvertedClass(_) => {}
            }
        }
        folded
    }
}

fn too_many_instructions() -> PatternError {
    PatternError::new(
        PreconditionKind::OutOfRange,
        format!("pattern compiles to more than {} instructions", MAX_INSTRUCTIONS),
    )
}

/// Number of instructions `compile_node` emits for `node`, saturating.
/// Must mirror the lowering above.
fn emitted_len(node: &Node) -> usize {
    match node {
        Node::Empty => 0,
        Node::Char(_) | Node::Dot | Node::Set { .. } | Node::Assert(_) => 1,
        Node::Group { index: Some(_), node } => emitted_len(node).saturating_add(2),
        Node::Group { index: None, node } => emitted_len(node),
        Node::Concat(nodes) => nodes.iter().fold(0, |n, node| n.saturating_add(emitted_len(node))),
        // SPLIT and JMP around every branch but the last
        Node::Alternate(branches) => branches
            .iter()
            .fold(branches.len().saturating_sub(1).saturating_mul(2), |n, branch| {
                n.saturating_add(emitted_len(branch))
            }),
        Node::Repeat { node, min, max, .. } => repeat_len(emitted_len(node), *min, *max),
    }
}

fn repeat_len(body_len: usize, min: u32, max: Option<u32>) -> usize {
    if body_len == 0 {
        return 0;
    }
    let min = min as usize;
    match max {
        None if min == 0 => body_len.saturating_add(2),
        None => body_len.saturating_mul(min).saturating_add(1),
        Some(max) => {
            let optional = (max as usize).saturating_sub(min);
            body_len
                .saturating_mul(min)
                .saturating_add(optional.saturating_mul(body_len.saturating_add(1)))
        }
    }
}

/// `c` followed by its single-character case counterparts.
fn case_variants(c: char) -> Vec<char> {
    let mut variants = vec![c];
    let mut lower = c.to_lowercase();
    if let (Some(l), None) = (lower.next(), lower.next())
        && !variants.contains(&l)
    {
        variants.push(l);
    }
    let mut upper = c.to_uppercase();
    if let (Some(u), None) = (upper.next(), upper.next())
        && !variants.contains(&u)
    {
        variants.push(u);
    }
    variants
}

fn overlap(lo: char, hi: char, min: char, max: char) -> Option<(char, char)> {
    let l = lo.max(min);
    let h = hi.min(max);
    (l <= h).then_some((l, h))
}
