use std::io::{self, Write};
use std::rc::Rc;

use log::trace;

use crate::ast::{BinOp, Node};
use crate::value::{Value, values_equal};

pub mod chunk;
pub mod compile;
pub mod disasm;
pub mod globals;

pub use chunk::{Chunk, Instruction, OpCode};
pub use compile::{CompileOptions, compile, compile_with, compile_with_warnings};
pub use disasm::disassemble;
pub use globals::GlobalTable;

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("unknown built-in: {name}")]
    UnknownBuiltin { name: String },
    #[error("built-in '{name}' takes {expected} argument(s), got {found}")]
    BuiltinArity { name: String, expected: usize, found: usize },
    #[error("program needs more than {limit} registers")]
    RegisterOverflow { limit: usize },
    #[error("jump of {distance} instructions does not fit its operand (limit {limit})")]
    JumpTooFar { distance: i64, limit: i64 },
    #[error("constant pool is full ({limit} entries)")]
    TooManyConstants { limit: usize },
}

impl CompileError {
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::UnknownBuiltin { .. } => "NVM-C001",
            CompileError::BuiltinArity { .. } => "NVM-C002",
            CompileError::RegisterOverflow { .. } => "NVM-C003",
            CompileError::JumpTooFar { .. } => "NVM-C004",
            CompileError::TooManyConstants { .. } => "NVM-C005",
        }
    }
}

/// Non-fatal findings collected while compiling.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileWarning {
    #[error("operator {op:?} has no opcode, compiled as ADD")]
    OperatorFallback { op: BinOp },
}

impl CompileWarning {
    pub fn code(&self) -> &'static str {
        match self {
            CompileWarning::OperatorFallback { .. } => "NVM-W001",
        }
    }
}

/// Execution faults. Compiled code never raises these; they guard against
/// hand-assembled or corrupted chunks.
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error("unknown opcode {op} at pc {pc}")]
    UnknownOpcode { op: u8, pc: usize },
    #[error("constant K{index} at pc {pc} is missing or has the wrong type")]
    BadConstant { index: usize, pc: usize },
    #[error("register R{index} at pc {pc} is outside the register file")]
    BadRegister { index: usize, pc: usize },
    #[error("jump at pc {pc} targets {target}")]
    BadJump { target: i64, pc: usize },
    #[error("writing program output: {0}")]
    Io(#[from] io::Error),
}

impl VmError {
    pub fn code(&self) -> &'static str {
        match self {
            VmError::UnknownOpcode { .. } => "NVM-R001",
            VmError::BadConstant { .. } => "NVM-R002",
            VmError::BadRegister { .. } => "NVM-R003",
            VmError::BadJump { .. } => "NVM-R004",
            VmError::Io(_) => "NVM-R005",
        }
    }
}

pub type VmResult<T> = Result<T, VmError>;

// ── Virtual machine ──────────────────────────────────────────────────

/// Single-frame register machine over one compiled chunk. Program output
/// from PRINT goes to `W`.
pub struct Vm<'a, W: Write = io::Stdout> {
    chunk: &'a Chunk,
    regs: Vec<Value>,
    pc: usize,
    globals: GlobalTable,
    out: W,
}

impl<'a> Vm<'a, io::Stdout> {
    pub fn new(chunk: &'a Chunk) -> Self {
        Vm::with_output(chunk, io::stdout())
    }
}

impl<'a, W: Write> Vm<'a, W> {
    pub fn with_output(chunk: &'a Chunk, out: W) -> Self {
        Vm {
            chunk,
            regs: vec![Value::Nil; chunk.reg_count],
            pc: 0,
            globals: GlobalTable::new(),
            out,
        }
    }

    pub fn globals(&self) -> &GlobalTable {
        &self.globals
    }

    pub fn register(&self, index: usize) -> Option<&Value> {
        self.regs.get(index)
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Runs until HALT or until the program counter leaves the code.
    pub fn run(&mut self) -> VmResult<()> {
        let chunk = self.chunk;

        while let Some(&inst) = chunk.code.get(self.pc) {
            let pc = self.pc;
            self.pc += 1;
            let op = inst.op().ok_or(VmError::UnknownOpcode { op: inst.raw_op(), pc })?;
            trace!("{:04} {:<9} a={} b={} c={} bx={}", pc, op.name(), inst.a(), inst.b(), inst.c(), inst.bx());

            macro_rules! reg {
                ($idx:expr) => {{
                    let idx = $idx;
                    self.regs.get(idx).ok_or(VmError::BadRegister { index: idx, pc })?
                }};
            }
            macro_rules! reg_set {
                ($idx:expr, $val:expr) => {{
                    let idx = $idx;
                    let val = $val;
                    match self.regs.get_mut(idx) {
                        Some(slot) => *slot = val,
                        None => return Err(VmError::BadRegister { index: idx, pc }),
                    }
                }};
            }

            let a = inst.a();
            match op {
                OpCode::LoadK => {
                    let v = chunk.constants.get(inst.bx())
                        .ok_or(VmError::BadConstant { index: inst.bx(), pc })?
                        .clone();
                    reg_set!(a, v);
                }
                OpCode::LoadBool => reg_set!(a, Value::Bool(inst.b() != 0)),
                OpCode::LoadNil => reg_set!(a, Value::Nil),
                OpCode::Move => {
                    let v = reg!(inst.b()).clone();
                    reg_set!(a, v);
                }
                OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Mod => {
                    let v = arith(op, reg!(inst.b()), reg!(inst.c()));
                    reg_set!(a, v);
                }
                OpCode::Div => {
                    let v = divide(reg!(inst.b()), reg!(inst.c()));
                    reg_set!(a, v);
                }
                OpCode::Neg => {
                    let v = negate(reg!(inst.b()));
                    reg_set!(a, v);
                }
                OpCode::Eq => {
                    let v = values_equal(reg!(inst.b()), reg!(inst.c()));
                    reg_set!(a, Value::Bool(v));
                }
                OpCode::Lt => {
                    let v = less_than(reg!(inst.b()), reg!(inst.c()));
                    reg_set!(a, Value::Bool(v));
                }
                OpCode::Not => {
                    let v = !reg!(inst.b()).is_truthy();
                    reg_set!(a, Value::Bool(v));
                }
                OpCode::Jmp => {
                    let target = self.pc as i64 + inst.sbx() as i64;
                    self.pc = usize::try_from(target)
                        .ok()
                        .filter(|t| *t <= chunk.code.len())
                        .ok_or(VmError::BadJump { target, pc })?;
                }
                OpCode::JmpF => {
                    if !reg!(a).is_truthy() {
                        self.pc += inst.bx();
                    }
                }
                OpCode::NewArray => reg_set!(a, Value::empty_array()),
                OpCode::Append => {
                    let v = reg!(inst.b()).clone();
                    // Appending to a non-array is a no-op
                    if let Value::Array(items) = reg!(a) {
                        items.borrow_mut().push(v);
                    }
                }
                OpCode::GetElem => {
                    let v = reg!(inst.b()).element(reg!(inst.c()));
                    reg_set!(a, v);
                }
                OpCode::SetElem => {
                    let v = reg!(inst.c()).clone();
                    if let (Value::Array(items), Value::Int(i)) = (reg!(a), reg!(inst.b())) {
                        items.borrow_mut().set(*i, v);
                    }
                }
                OpCode::Range => {
                    let end = match reg!(inst.b()) {
                        Value::Int(n) => *n,
                        _ => 0,
                    };
                    reg_set!(a, Value::range(0, end, 1));
                }
                OpCode::Len => {
                    let n = reg!(inst.b()).length();
                    reg_set!(a, Value::Int(n));
                }
                OpCode::GetGlobal => {
                    let name = global_name(chunk, inst.bx(), pc)?;
                    let v = self.globals.get(&name);
                    reg_set!(a, v);
                }
                OpCode::SetGlobal => {
                    let name = global_name(chunk, inst.bx(), pc)?;
                    let v = reg!(a).clone();
                    self.globals.set(&name, v);
                }
                OpCode::Print => {
                    let v = reg!(a);
                    writeln!(self.out, "{}", v)?;
                }
                OpCode::Halt => break,
            }
        }

        self.out.flush()?;
        Ok(())
    }
}

fn global_name(chunk: &Chunk, index: usize, pc: usize) -> VmResult<Rc<str>> {
    match chunk.constants.get(index) {
        Some(Value::Str(name)) => Ok(Rc::clone(name)),
        _ => Err(VmError::BadConstant { index, pc }),
    }
}

/// Int op Int stays Int (wrapping); any Float operand promotes both sides.
/// Non-numeric operands give Nil, as does integer modulo by zero.
fn arith(op: OpCode, x: &Value, y: &Value) -> Value {
    if let (Value::Int(a), Value::Int(b)) = (x, y) {
        return match op {
            OpCode::Add => Value::Int(a.wrapping_add(*b)),
            OpCode::Sub => Value::Int(a.wrapping_sub(*b)),
            OpCode::Mul => Value::Int(a.wrapping_mul(*b)),
            OpCode::Mod if *b == 0 => Value::Nil,
            OpCode::Mod => Value::Int(a.wrapping_rem(*b)),
            _ => Value::Nil,
        };
    }
    let (Some(a), Some(b)) = (x.to_number(), y.to_number()) else {
        return Value::Nil;
    };
    match op {
        OpCode::Add => Value::Float(a + b),
        OpCode::Sub => Value::Float(a - b),
        OpCode::Mul => Value::Float(a * b),
        OpCode::Mod => Value::Float(a % b),
        _ => Value::Nil,
    }
}

/// Always float division; a zero divisor follows IEEE-754.
fn divide(x: &Value, y: &Value) -> Value {
    match (x.to_number(), y.to_number()) {
        (Some(a), Some(b)) => Value::Float(a / b),
        _ => Value::Nil,
    }
}

fn negate(x: &Value) -> Value {
    match x {
        Value::Int(n) => Value::Int(n.wrapping_neg()),
        Value::Float(f) => Value::Float(-f),
        _ => Value::Nil,
    }
}

/// Both sides go through f64, integers included, so integers beyond 2^53
/// compare at float precision.
fn less_than(x: &Value, y: &Value) -> bool {
    match (x.to_number(), y.to_number()) {
        (Some(a), Some(b)) => a < b,
        _ => false,
    }
}

// ── Public API ──────────────────────────────────────────────────────

/// Runs a chunk with program output on stdout.
pub fn run(chunk: &Chunk) -> VmResult<GlobalTable> {
    let mut vm = Vm::new(chunk);
    vm.run()?;
    Ok(vm.globals)
}

/// Compiles and runs `root`, writing program output to `out`. Returns the
/// writer along with the final globals.
pub fn compile_and_run<W: Write>(root: &Node, out: W) -> Result<(W, GlobalTable), crate::Error> {
    let chunk = compile(root)?;
    let mut vm = Vm::with_output(&chunk, out);
    vm.run()?;
    let Vm { out, globals, .. } = vm;
    Ok((out, globals))
}
