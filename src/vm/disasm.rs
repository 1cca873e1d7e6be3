use crate::value::Value;
use super::chunk::{Chunk, Instruction, Layout, OpCode};

/// Listing of a chunk: a header, the constant pool, then one line per
/// instruction with jump targets resolved to absolute positions.
pub fn disassemble(chunk: &Chunk) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "; {} instructions, {} constants, {} registers\n",
        chunk.len(),
        chunk.constants.len(),
        chunk.reg_count
    ));
    for (i, k) in chunk.constants.iter().enumerate() {
        out.push_str(&format!("K{:<5} {}\n", i, constant_repr(k)));
    }
    for (pc, inst) in chunk.code.iter().enumerate() {
        out.push_str(&instruction_line(chunk, pc, *inst));
        out.push('\n');
    }
    out
}

fn constant_repr(k: &Value) -> String {
    match k {
        Value::Str(s) => format!("{:?}", &**s),
        other => other.to_string(),
    }
}

fn instruction_line(chunk: &Chunk, pc: usize, inst: Instruction) -> String {
    let Some(op) = inst.op() else {
        return format!("{:04}  ??? {:#010x}", pc, inst.0);
    };

    let (operands, note) = match (op, op.layout()) {
        (OpCode::Jmp, _) => {
            let target = pc as i64 + 1 + inst.sbx() as i64;
            (format!("{:+}", inst.sbx()), Some(format!("-> {:04}", target)))
        }
        (OpCode::JmpF, _) => (
            format!("R{} +{}", inst.a(), inst.bx()),
            Some(format!("-> {:04}", pc + 1 + inst.bx())),
        ),
        (_, Layout::Abx) => (
            format!("R{} K{}", inst.a(), inst.bx()),
            chunk.constants.get(inst.bx()).map(constant_repr),
        ),
        (OpCode::LoadBool, _) => (format!("R{} {}", inst.a(), inst.b()), None),
        (OpCode::LoadNil | OpCode::NewArray | OpCode::Print, _) => (format!("R{}", inst.a()), None),
        (OpCode::Halt, _) => (String::new(), None),
        (
            OpCode::Move | OpCode::Neg | OpCode::Not | OpCode::Append | OpCode::Range | OpCode::Len,
            _,
        ) => (format!("R{} R{}", inst.a(), inst.b()), None),
        _ => (format!("R{} R{} R{}", inst.a(), inst.b(), inst.c()), None),
    };

    let line = format!("{:04}  {:<10} {}", pc, op.name(), operands);
    match note {
        Some(n) => format!("{:<34}; {}", line, n),
        None => line.trim_end().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Node;
    use crate::vm::compile;

    #[test]
    fn lists_constants_and_code() {
        let prog = Node::Block(vec![
            Node::assign("x", Node::int(5)),
            Node::print(Node::ident("x")),
        ]);
        let text = disassemble(&compile(&prog).unwrap());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "; 5 instructions, 2 constants, 2 registers");
        assert_eq!(lines[1], "K0     5");
        assert_eq!(lines[2], "K1     \"x\"");
        assert!(lines[3].starts_with("0000  LOADK      R0 K0"), "{}", lines[3]);
        assert!(lines[4].contains("SETGLOBAL") && lines[4].ends_with("; \"x\""), "{}", lines[4]);
        assert_eq!(lines[6], "0003  PRINT      R1");
        assert_eq!(lines[7], "0004  HALT");
    }

    #[test]
    fn jumps_show_absolute_targets() {
        let prog = Node::while_loop(Node::ident("go"), Node::Nil);
        let text = disassemble(&compile(&prog).unwrap());
        // 0 GETGLOBAL, 1 JMPF, 2 LOADNIL, 3 JMP, 4 HALT
        let jmpf = text.lines().find(|l| l.contains("JMPF")).unwrap();
        assert!(jmpf.ends_with("-> 0004"), "{jmpf}");
        let jmp = text.lines().find(|l| l.contains(" JMP ")).unwrap();
        assert!(jmp.contains("-4") && jmp.ends_with("-> 0000"), "{jmp}");
    }

    #[test]
    fn unknown_opcode_is_marked() {
        let mut chunk = Chunk::new();
        chunk.code.push(Instruction(0x3f));
        assert!(disassemble(&chunk).contains("0000  ???"));
    }
}
