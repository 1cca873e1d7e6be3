use log::debug;

use crate::ast::{BinOp, Node, UnaryOp};
use crate::value::Value;
use super::chunk::{Chunk, Instruction, OpCode, MAX_REGISTERS, MAX_SBX, jump_displacement};
use super::{CompileError, CompileWarning};

pub const BUILTIN_PRINT: &str = "print";
pub const BUILTIN_RANGE: &str = "range";
pub const BUILTIN_LEN: &str = "len";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Register ceiling checked while compiling. Values above the encodable
    /// maximum are capped to it.
    pub max_registers: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions { max_registers: MAX_REGISTERS }
    }
}

pub fn compile(root: &Node) -> Result<Chunk, CompileError> {
    compile_with(root, &CompileOptions::default())
}

pub fn compile_with(root: &Node, options: &CompileOptions) -> Result<Chunk, CompileError> {
    compile_with_warnings(root, options).map(|(chunk, _)| chunk)
}

/// Like [`compile_with`], also returning the warnings raised along the way.
pub fn compile_with_warnings(
    root: &Node,
    options: &CompileOptions,
) -> Result<(Chunk, Vec<CompileWarning>), CompileError> {
    RegCompiler::new(options).compile_program(root)
}

// ── Register Compiler ────────────────────────────────────────────────
//
// Registers are handed out from a counter that only grows. Nothing is ever
// freed: the program has a single frame, so the high-water mark is simply the
// final counter value.

struct RegCompiler {
    chunk: Chunk,
    next_reg: usize,
    max_registers: usize,
    warnings: Vec<CompileWarning>,
}

impl RegCompiler {
    fn new(options: &CompileOptions) -> Self {
        RegCompiler {
            chunk: Chunk::new(),
            next_reg: 0,
            max_registers: options.max_registers.min(MAX_REGISTERS),
            warnings: Vec::new(),
        }
    }

    fn alloc_reg(&mut self) -> Result<u8, CompileError> {
        let r = self.next_reg;
        if r >= self.max_registers {
            return Err(CompileError::RegisterOverflow { limit: self.max_registers });
        }
        self.next_reg += 1;
        Ok(r as u8)
    }

    fn emit_abc(&mut self, op: OpCode, a: u8, b: u8, c: u8) -> usize {
        self.chunk.emit(Instruction::abc(op, a, b as u16, c as u16))
    }

    fn emit_abx(&mut self, op: OpCode, a: u8, bx: u32) -> usize {
        self.chunk.emit(Instruction::abx(op, a, bx))
    }

    fn emit_jmpf(&mut self, reg: u8) -> usize {
        self.emit_abx(OpCode::JmpF, reg, 0)
    }

    fn emit_jmp_placeholder(&mut self) -> usize {
        // sBx 0 until patched
        self.emit_abx(OpCode::Jmp, 0, MAX_SBX as u32)
    }

    fn emit_jump_to(&mut self, target: usize) -> Result<usize, CompileError> {
        let pos = self.chunk.len();
        let disp = jump_displacement(pos, target);
        let inst = Instruction::asbx(OpCode::Jmp, 0, disp)
            .ok_or(CompileError::JumpTooFar { distance: disp, limit: MAX_SBX as i64 })?;
        Ok(self.chunk.emit(inst))
    }

    fn load_constant(&mut self, val: Value) -> Result<u8, CompileError> {
        let reg = self.alloc_reg()?;
        let ki = self.chunk.add_constant(val)?;
        self.emit_abx(OpCode::LoadK, reg, ki);
        Ok(reg)
    }

    fn name_constant(&mut self, name: &str) -> Result<u32, CompileError> {
        self.chunk.add_constant(Value::string(name))
    }

    fn compile_program(mut self, root: &Node) -> Result<(Chunk, Vec<CompileWarning>), CompileError> {
        self.compile_node(root)?;
        self.emit_abc(OpCode::Halt, 0, 0, 0);
        self.chunk.reg_count = self.next_reg;
        debug!(
            "compiled {} instructions, {} constants, {} registers",
            self.chunk.len(),
            self.chunk.constants.len(),
            self.chunk.reg_count
        );
        Ok((self.chunk, self.warnings))
    }

    fn compile_node(&mut self, node: &Node) -> Result<u8, CompileError> {
        match node {
            Node::Int(n) => self.load_constant(Value::Int(*n)),
            Node::Float(f) => self.load_constant(Value::Float(*f)),
            Node::Str(s) => self.load_constant(Value::string(s)),

            Node::Bool(b) => {
                let reg = self.alloc_reg()?;
                self.emit_abc(OpCode::LoadBool, reg, *b as u8, 0);
                Ok(reg)
            }

            Node::Nil => {
                let reg = self.alloc_reg()?;
                self.emit_abc(OpCode::LoadNil, reg, 0, 0);
                Ok(reg)
            }

            Node::Array(items) => {
                let arr = self.alloc_reg()?;
                self.emit_abc(OpCode::NewArray, arr, 0, 0);
                for item in items {
                    let r = self.compile_node(item)?;
                    self.emit_abc(OpCode::Append, arr, r, 0);
                }
                Ok(arr)
            }

            Node::Ident(name) => {
                let reg = self.alloc_reg()?;
                let ki = self.name_constant(name)?;
                self.emit_abx(OpCode::GetGlobal, reg, ki);
                Ok(reg)
            }

            Node::Binary { op, left, right } => self.compile_binary(*op, left, right),

            Node::Unary { op, operand } => {
                let rb = self.compile_node(operand)?;
                let ra = self.alloc_reg()?;
                let opcode = match op {
                    UnaryOp::Neg => OpCode::Neg,
                    UnaryOp::Not => OpCode::Not,
                };
                self.emit_abc(opcode, ra, rb, 0);
                Ok(ra)
            }

            Node::Index { object, index } => {
                let obj = self.compile_node(object)?;
                let idx = self.compile_node(index)?;
                let res = self.alloc_reg()?;
                self.emit_abc(OpCode::GetElem, res, obj, idx);
                Ok(res)
            }

            Node::SetIndex { object, index, value } => {
                let obj = self.compile_node(object)?;
                let idx = self.compile_node(index)?;
                let val = self.compile_node(value)?;
                self.emit_abc(OpCode::SetElem, obj, idx, val);
                Ok(val)
            }

            Node::Call { callee, args } => self.compile_call(callee, args),

            Node::Assign { name, value } => {
                let reg = self.compile_node(value)?;
                let ki = self.name_constant(name)?;
                self.emit_abx(OpCode::SetGlobal, reg, ki);
                Ok(reg)
            }

            Node::Block(stmts) => {
                let Some((last, init)) = stmts.split_last() else {
                    return self.compile_node(&Node::Nil);
                };
                for stmt in init {
                    self.compile_node(stmt)?;
                }
                self.compile_node(last)
            }

            Node::If { cond, then_branch, else_branch } => {
                let cond_reg = self.compile_node(cond)?;
                let skip_then = self.emit_jmpf(cond_reg);
                self.compile_node(then_branch)?;
                match else_branch {
                    Some(else_branch) => {
                        let skip_else = self.emit_jmp_placeholder();
                        self.chunk.patch_jump_if_falsy(skip_then)?;
                        self.compile_node(else_branch)?;
                        self.chunk.patch_jump(skip_else)?;
                    }
                    None => self.chunk.patch_jump_if_falsy(skip_then)?,
                }
                Ok(cond_reg)
            }

            Node::While { cond, body } => {
                let loop_start = self.chunk.len();
                let cond_reg = self.compile_node(cond)?;
                let exit = self.emit_jmpf(cond_reg);
                self.compile_node(body)?;
                self.emit_jump_to(loop_start)?;
                self.chunk.patch_jump_if_falsy(exit)?;
                Ok(cond_reg)
            }

            Node::For { var, iterable, body } => self.compile_for(var, iterable, body),
        }
    }

    fn compile_binary(&mut self, op: BinOp, left: &Node, right: &Node) -> Result<u8, CompileError> {
        let rb = self.compile_node(left)?;
        let rc = self.compile_node(right)?;

        // (opcode, swap operands, negate result)
        let (opcode, swap, negate) = match op {
            BinOp::Add => (OpCode::Add, false, false),
            BinOp::Sub => (OpCode::Sub, false, false),
            BinOp::Mul => (OpCode::Mul, false, false),
            BinOp::Div => (OpCode::Div, false, false),
            BinOp::Mod => (OpCode::Mod, false, false),
            BinOp::Eq => (OpCode::Eq, false, false),
            BinOp::Lt => (OpCode::Lt, false, false),
            BinOp::NotEq => (OpCode::Eq, false, true),
            BinOp::Gt => (OpCode::Lt, true, false),
            BinOp::LtEq => (OpCode::Lt, true, true),
            BinOp::GtEq => (OpCode::Lt, false, true),
            BinOp::And | BinOp::Or => {
                debug!("operator {:?} has no opcode, compiling it as ADD", op);
                self.warnings.push(CompileWarning::OperatorFallback { op });
                (OpCode::Add, false, false)
            }
        };

        let (b, c) = if swap { (rc, rb) } else { (rb, rc) };
        let ra = self.alloc_reg()?;
        self.emit_abc(opcode, ra, b, c);
        if !negate {
            return Ok(ra);
        }
        let rn = self.alloc_reg()?;
        self.emit_abc(OpCode::Not, rn, ra, 0);
        Ok(rn)
    }

    fn compile_call(&mut self, callee: &str, args: &[Node]) -> Result<u8, CompileError> {
        let opcode = match callee {
            BUILTIN_PRINT => OpCode::Print,
            BUILTIN_RANGE => OpCode::Range,
            BUILTIN_LEN => OpCode::Len,
            _ => return Err(CompileError::UnknownBuiltin { name: callee.to_string() }),
        };
        let [arg] = args else {
            return Err(CompileError::BuiltinArity {
                name: callee.to_string(),
                expected: 1,
                found: args.len(),
            });
        };

        let arg_reg = self.compile_node(arg)?;
        if opcode == OpCode::Print {
            // print evaluates to its argument
            self.emit_abc(OpCode::Print, arg_reg, 0, 0);
            return Ok(arg_reg);
        }
        let res = self.alloc_reg()?;
        self.emit_abc(opcode, res, arg_reg, 0);
        Ok(res)
    }

    /// Index-driven loop. The loop variable is written to the global table on
    /// every iteration, so it shadows nothing: it overwrites any global of the
    /// same name and keeps its last value after the loop.
    fn compile_for(&mut self, var: &str, iterable: &Node, body: &Node) -> Result<u8, CompileError> {
        let iter_reg = self.compile_node(iterable)?;
        let idx_reg = self.alloc_reg()?;
        let limit_reg = self.alloc_reg()?;
        let step_reg = self.alloc_reg()?;
        let elem_reg = self.alloc_reg()?;
        let test_reg = self.alloc_reg()?;

        let zero_ki = self.chunk.add_constant(Value::Int(0))?;
        self.emit_abx(OpCode::LoadK, idx_reg, zero_ki);
        self.emit_abc(OpCode::Len, limit_reg, iter_reg, 0);
        let one_ki = self.chunk.add_constant(Value::Int(1))?;
        self.emit_abx(OpCode::LoadK, step_reg, one_ki);

        // Loop top: leave once idx >= limit
        let loop_start = self.chunk.len();
        self.emit_abc(OpCode::Lt, test_reg, idx_reg, limit_reg);
        let exit = self.emit_jmpf(test_reg);

        self.emit_abc(OpCode::GetElem, elem_reg, iter_reg, idx_reg);
        let var_ki = self.name_constant(var)?;
        self.emit_abx(OpCode::SetGlobal, elem_reg, var_ki);

        self.compile_node(body)?;

        self.emit_abc(OpCode::Add, idx_reg, idx_reg, step_reg);
        self.emit_jump_to(loop_start)?;
        self.chunk.patch_jump_if_falsy(exit)?;

        Ok(elem_reg)
    }
}
