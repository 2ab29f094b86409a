/*----------------------------------------------------------------------
  Regex program instruction format (64-bit):

        6               3 3                     0 0               0
        3               2 1                     8 7               0
  iAB  |        B(32)      |         A(24)        |     Op(8)      |

  CHAR     B = code point
  ANY      B = 1 when extended newlines apply
  CLASS    A = class index
  LBRA     A = group number (1-based)
  SPLIT    A = preferred target, B = alternate target
  JMP      A = target
----------------------------------------------------------------------*/

use std::fmt;

/// Regex VM operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Char = 0,        // match code point B
    Any,             // any char except a line terminator
    AnyNl,           // any char
    Class,           // char in class A
    NClass,          // char not in class A
    TextStart,       // start of text
    TextEnd,         // end of text
    LineStart,       // start of text or after a line terminator
    LineEnd,         // end of text or before a line terminator
    WordBoundary,    // \b
    NotWordBoundary, // \B
    Lbra,            // open group A
    Rbra,            // close group A
    Split,           // fork to A (preferred) and B
    Jmp,             // goto A
    End,             // match found
}

impl OpCode {
    const ALL: [OpCode; 16] = [
        OpCode::Char,
        OpCode::Any,
        OpCode::AnyNl,
        OpCode::Class,
        OpCode::NClass,
        OpCode::TextStart,
        OpCode::TextEnd,
        OpCode::LineStart,
        OpCode::LineEnd,
        OpCode::WordBoundary,
        OpCode::NotWordBoundary,
        OpCode::Lbra,
        OpCode::Rbra,
        OpCode::Split,
        OpCode::Jmp,
        OpCode::End,
    ];

    pub fn from_u8(byte: u8) -> Option<OpCode> {
        Self::ALL.get(byte as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            OpCode::Char => "CHAR",
            OpCode::Any => "ANY",
            OpCode::AnyNl => "ANYNL",
            OpCode::Class => "CCLASS",
            OpCode::NClass => "NCCLASS",
            OpCode::TextStart => "BOT",
            OpCode::TextEnd => "EOT",
            OpCode::LineStart => "BOL",
            OpCode::LineEnd => "EOL",
            OpCode::WordBoundary => "BOW",
            OpCode::NotWordBoundary => "NBOW",
            OpCode::Lbra => "LBRA",
            OpCode::Rbra => "RBRA",
            OpCode::Split => "OR",
            OpCode::Jmp => "JMP",
            OpCode::End => "END",
        }
    }

    /// True for operations that jump instead of falling through.
    pub fn is_branch(self) -> bool {
        matches!(self, OpCode::Split | OpCode::Jmp)
    }
}

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction(u64);

impl Instruction {
    // Size of each field
    pub const SIZE_OP: u32 = 8;
    pub const SIZE_A: u32 = 24;
    pub const SIZE_B: u32 = 32;

    // Position of each field
    pub const POS_OP: u32 = 0;
    pub const POS_A: u32 = Self::POS_OP + Self::SIZE_OP;
    pub const POS_B: u32 = Self::POS_A + Self::SIZE_A;

    // Maximum values
    pub const MAX_A: u32 = (1 << Self::SIZE_A) - 1;
    pub const MAX_B: u32 = u32::MAX;

    #[inline(always)]
    fn mask1(n: u32, p: u32) -> u64 {
        (!((!0u64) << n)) << p
    }

    #[inline(always)]
    fn mask0(n: u32, p: u32) -> u64 {
        !Self::mask1(n, p)
    }

    #[inline(always)]
    fn get_arg(self, pos: u32, size: u32) -> u32 {
        ((self.0 >> pos) & Self::mask1(size, 0)) as u32
    }

    #[inline(always)]
    fn set_arg(&mut self, v: u32, pos: u32, size: u32) {
        self.0 = (self.0 & Self::mask0(size, pos)) | (((v as u64) << pos) & Self::mask1(size, pos));
    }

    pub fn create_ab(op: OpCode, a: u32, b: u32) -> Self {
        let mut instr = Instruction((op as u64) << Self::POS_OP);
        instr.set_a(a);
        instr.set_b(b);
        instr
    }

    #[inline(always)]
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    #[inline(always)]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// `None` only for words that were not produced by the compiler.
    #[inline(always)]
    pub fn get_opcode(self) -> Option<OpCode> {
        OpCode::from_u8(self.get_arg(Self::POS_OP, Self::SIZE_OP) as u8)
    }

    #[inline(always)]
    pub fn get_a(self) -> u32 {
        self.get_arg(Self::POS_A, Self::SIZE_A)
    }

    #[inline(always)]
    pub fn set_a(&mut self, v: u32) {
        self.set_arg(v, Self::POS_A, Self::SIZE_A);
    }

    #[inline(always)]
    pub fn get_b(self) -> u32 {
        self.get_arg(Self::POS_B, Self::SIZE_B)
    }

    #[inline(always)]
    pub fn set_b(&mut self, v: u32) {
        self.set_arg(v, Self::POS_B, Self::SIZE_B);
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(op) = self.get_opcode() else {
            return write!(f, "INVALID {:#018x}", self.0);
        };
        let (a, b) = (self.get_a(), self.get_b());
        match op {
            OpCode::Char => match char::from_u32(b) {
                Some(c) => write!(f, "{} '{}'", op.name(), c.escape_debug()),
                None => write!(f, "{} {:#x}", op.name(), b),
            },
            OpCode::Class | OpCode::NClass | OpCode::Lbra | OpCode::Rbra | OpCode::Jmp => {
                write!(f, "{} {}", op.name(), a)
            }
            OpCode::Split => write!(f, "{} {} {}", op.name(), a, b),
            OpCode::Any | OpCode::AnyNl | OpCode::LineStart | OpCode::LineEnd if b != 0 => {
                write!(f, "{} ext", op.name())
            }
            OpCode::WordBoundary | OpCode::NotWordBoundary if b != 0 => write!(f, "{} ascii", op.name()),
            _ => f.write_str(op.name()),
        }
    }
}
