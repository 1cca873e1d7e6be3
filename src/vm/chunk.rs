use crate::value::Value;
use super::CompileError;

// ── Instruction layout (32-bit packed) ──────────────────────────────
//
// ABC mode:  [B:9 | C:9 | A:8 | OP:6]
// ABx mode:  [   Bx:18  | A:8 | OP:6]
//
// sBx is Bx minus a fixed bias, so the same 18 bits carry a signed
// displacement. Only the unconditional jump reads its operand as sBx.

pub const SIZE_OP: u32 = 6;
pub const SIZE_A: u32 = 8;
pub const SIZE_B: u32 = 9;
pub const SIZE_C: u32 = 9;
pub const SIZE_BX: u32 = SIZE_B + SIZE_C;

pub const POS_OP: u32 = 0;
pub const POS_A: u32 = POS_OP + SIZE_OP;
pub const POS_C: u32 = POS_A + SIZE_A;
pub const POS_B: u32 = POS_C + SIZE_C;
pub const POS_BX: u32 = POS_C;

pub const MAX_A: u32 = (1 << SIZE_A) - 1;
pub const MAX_B: u32 = (1 << SIZE_B) - 1;
pub const MAX_C: u32 = (1 << SIZE_C) - 1;
pub const MAX_BX: u32 = (1 << SIZE_BX) - 1;
/// Bias between the stored Bx and the signed sBx it represents.
pub const MAX_SBX: i32 = (MAX_BX >> 1) as i32;

const MASK_OP: u32 = (1 << SIZE_OP) - 1;

/// Every register operand must fit the A field, which bounds the register file.
pub const MAX_REGISTERS: usize = MAX_A as usize + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// R(A) = K(Bx)
    LoadK = 0,
    /// R(A) = (B != 0)
    LoadBool,
    /// R(A) = nil
    LoadNil,
    /// R(A) = R(B)
    Move,
    Add,
    Sub,
    Mul,
    /// R(A) = R(B) / R(C), always float division
    Div,
    Mod,
    /// R(A) = -R(B)
    Neg,
    /// R(A) = R(B) == R(C)
    Eq,
    /// R(A) = R(B) < R(C)
    Lt,
    /// R(A) = !truthy(R(B))
    Not,
    /// pc += sBx
    Jmp,
    /// if !truthy(R(A)) then pc += Bx
    JmpF,
    /// R(A) = []
    NewArray,
    /// R(A).push(R(B))
    Append,
    /// R(A) = R(B)[R(C)]
    GetElem,
    /// R(A)[R(B)] = R(C)
    SetElem,
    /// R(A) = range(0, R(B), 1)
    Range,
    /// R(A) = len(R(B))
    Len,
    /// R(A) = globals[K(Bx)]
    GetGlobal,
    /// globals[K(Bx)] = R(A)
    SetGlobal,
    /// print R(A)
    Print,
    Halt,
}

const OPCODES: [OpCode; 25] = [
    OpCode::LoadK,
    OpCode::LoadBool,
    OpCode::LoadNil,
    OpCode::Move,
    OpCode::Add,
    OpCode::Sub,
    OpCode::Mul,
    OpCode::Div,
    OpCode::Mod,
    OpCode::Neg,
    OpCode::Eq,
    OpCode::Lt,
    OpCode::Not,
    OpCode::Jmp,
    OpCode::JmpF,
    OpCode::NewArray,
    OpCode::Append,
    OpCode::GetElem,
    OpCode::SetElem,
    OpCode::Range,
    OpCode::Len,
    OpCode::GetGlobal,
    OpCode::SetGlobal,
    OpCode::Print,
    OpCode::Halt,
];

/// How an opcode's operand bits are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Abc,
    Abx,
    AsBx,
}

impl OpCode {
    pub fn from_u8(byte: u8) -> Option<OpCode> {
        OPCODES.get(byte as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            OpCode::LoadK => "LOADK",
            OpCode::LoadBool => "LOADBOOL",
            OpCode::LoadNil => "LOADNIL",
            OpCode::Move => "MOVE",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::Mod => "MOD",
            OpCode::Neg => "NEG",
            OpCode::Eq => "EQ",
            OpCode::Lt => "LT",
            OpCode::Not => "NOT",
            OpCode::Jmp => "JMP",
            OpCode::JmpF => "JMPF",
            OpCode::NewArray => "NEWARRAY",
            OpCode::Append => "APPEND",
            OpCode::GetElem => "GETELEM",
            OpCode::SetElem => "SETELEM",
            OpCode::Range => "RANGE",
            OpCode::Len => "LEN",
            OpCode::GetGlobal => "GETGLOBAL",
            OpCode::SetGlobal => "SETGLOBAL",
            OpCode::Print => "PRINT",
            OpCode::Halt => "HALT",
        }
    }

    pub fn layout(self) -> Layout {
        match self {
            OpCode::LoadK | OpCode::JmpF | OpCode::GetGlobal | OpCode::SetGlobal => Layout::Abx,
            OpCode::Jmp => Layout::AsBx,
            _ => Layout::Abc,
        }
    }
}

// ── Instruction encoding ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction(pub u32);

impl Instruction {
    #[inline(always)]
    pub fn abc(op: OpCode, a: u8, b: u16, c: u16) -> Self {
        debug_assert!((b as u32) <= MAX_B && (c as u32) <= MAX_C);
        Instruction(
            (op as u32) << POS_OP
                | (a as u32) << POS_A
                | (b as u32 & MAX_B) << POS_B
                | (c as u32 & MAX_C) << POS_C,
        )
    }

    #[inline(always)]
    pub fn abx(op: OpCode, a: u8, bx: u32) -> Self {
        debug_assert!(bx <= MAX_BX);
        Instruction((op as u32) << POS_OP | (a as u32) << POS_A | (bx & MAX_BX) << POS_BX)
    }

    /// Encodes a signed displacement, or `None` when it does not fit sBx.
    pub fn asbx(op: OpCode, a: u8, sbx: i64) -> Option<Self> {
        encode_sbx(sbx).map(|bx| Instruction::abx(op, a, bx))
    }

    #[inline(always)]
    pub fn raw_op(self) -> u8 {
        ((self.0 >> POS_OP) & MASK_OP) as u8
    }

    pub fn op(self) -> Option<OpCode> {
        OpCode::from_u8(self.raw_op())
    }

    #[inline(always)]
    pub fn a(self) -> usize {
        ((self.0 >> POS_A) & MAX_A) as usize
    }

    #[inline(always)]
    pub fn b(self) -> usize {
        ((self.0 >> POS_B) & MAX_B) as usize
    }

    #[inline(always)]
    pub fn c(self) -> usize {
        ((self.0 >> POS_C) & MAX_C) as usize
    }

    #[inline(always)]
    pub fn bx(self) -> usize {
        ((self.0 >> POS_BX) & MAX_BX) as usize
    }

    #[inline(always)]
    pub fn sbx(self) -> i32 {
        self.bx() as i32 - MAX_SBX
    }

    fn with_bx(self, bx: u32) -> Self {
        Instruction((self.0 & !(MAX_BX << POS_BX)) | (bx & MAX_BX) << POS_BX)
    }
}

/// Adds the bias in signed arithmetic, so a negative displacement can never
/// wrap into a huge forward one.
pub fn encode_sbx(sbx: i64) -> Option<u32> {
    let biased = sbx.checked_add(MAX_SBX as i64)?;
    if (0..=MAX_BX as i64).contains(&biased) {
        Some(biased as u32)
    } else {
        None
    }
}

/// Displacement stored in a jump at `from` so execution resumes at `to`.
/// The program counter has already moved past the jump when it is applied.
pub fn jump_displacement(from: usize, to: usize) -> i64 {
    to as i64 - (from as i64 + 1)
}

// ── Chunk ────────────────────────────────────────────────────────────

/// A compiled program: constant pool, code buffer and the number of
/// registers the code touches.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub code: Vec<Instruction>,
    pub constants: Vec<Value>,
    pub reg_count: usize,
}

impl Chunk {
    pub fn new() -> Self {
        Chunk::default()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Returns the pool index of `val`, reusing an existing entry of the same
    /// variant and value. Floats match by bit pattern, so `-0.0` stays
    /// distinct from `0.0`.
    pub fn add_constant(&mut self, val: Value) -> Result<u32, CompileError> {
        for (i, c) in self.constants.iter().enumerate() {
            let same = match (c, &val) {
                (Value::Int(a), Value::Int(b)) => a == b,
                (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
                (Value::Str(a), Value::Str(b)) => a == b,
                _ => false,
            };
            if same {
                return Ok(i as u32);
            }
        }
        let idx = self.constants.len();
        if idx > MAX_BX as usize {
            return Err(CompileError::TooManyConstants { limit: MAX_BX as usize + 1 });
        }
        self.constants.push(val);
        Ok(idx as u32)
    }

    pub fn emit(&mut self, inst: Instruction) -> usize {
        let idx = self.code.len();
        self.code.push(inst);
        idx
    }

    /// Points the conditional jump at `jump_pos` to the next instruction to be
    /// emitted. The forward skip is unsigned and must fit Bx.
    pub fn patch_jump_if_falsy(&mut self, jump_pos: usize) -> Result<(), CompileError> {
        let skip = jump_displacement(jump_pos, self.code.len());
        if skip < 0 || skip > MAX_BX as i64 {
            return Err(CompileError::JumpTooFar { distance: skip, limit: MAX_BX as i64 });
        }
        self.code[jump_pos] = self.code[jump_pos].with_bx(skip as u32);
        Ok(())
    }

    /// Points the unconditional jump at `jump_pos` to the next instruction to
    /// be emitted.
    pub fn patch_jump(&mut self, jump_pos: usize) -> Result<(), CompileError> {
        let disp = jump_displacement(jump_pos, self.code.len());
        let bx = encode_sbx(disp).ok_or(CompileError::JumpTooFar {
            distance: disp,
            limit: MAX_SBX as i64,
        })?;
        self.code[jump_pos] = self.code[jump_pos].with_bx(bx);
        Ok(())
    }
}
