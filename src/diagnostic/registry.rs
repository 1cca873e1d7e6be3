/// An entry in the error code registry.
pub struct ErrorEntry {
    pub code: &'static str,
    pub short: &'static str,  // brief description for listings
    pub long: &'static str,   // full explanation for --explain
}

/// All stable error codes.
pub static REGISTRY: &[ErrorEntry] = &[
    // ── Loading ──────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "NVM-L001",
        short: "program file could not be read",
        long: r#"## NVM-L001: program file could not be read

The path given on the command line does not exist, is a directory, or is
not readable by the current user.
"#,
    },
    ErrorEntry {
        code: "NVM-L002",
        short: "program is not a valid AST document",
        long: r#"## NVM-L002: program is not a valid AST document

Programs are JSON documents holding one externally tagged node. Each node
kind is an object with a single key:

    {"Block": [
      {"Assign": {"name": "x", "value": {"Int": 5}}},
      {"Call": {"callee": "print", "args": [{"Ident": "x"}]}}
    ]}

`Nil` is written as the bare string `"Nil"`. Binary operators are one of
Add, Sub, Mul, Div, Mod, Eq, NotEq, Lt, LtEq, Gt, GtEq, And, Or; unary
operators are Neg and Not.

Node kinds outside this set are rejected here rather than skipped.
"#,
    },

    // ── Compiler ─────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "NVM-C001",
        short: "unknown built-in",
        long: r#"## NVM-C001: unknown built-in

`Call` nodes may only name one of the three built-ins:

- `print(x)`: writes `x` and a newline, evaluates to `x`
- `range(n)`: the integers `0, 1, ..., n-1`
- `len(x)`: length of an array, string or range

There are no user-defined functions.
"#,
    },
    ErrorEntry {
        code: "NVM-C002",
        short: "wrong number of arguments to a built-in",
        long: r#"## NVM-C002: wrong number of arguments to a built-in

Every built-in takes exactly one argument.

**Example that triggers this:**

    {"Call": {"callee": "range", "args": [{"Int": 1}, {"Int": 5}]}}

`range` only accepts an end bound; the start is always 0 and the step 1.
"#,
    },
    ErrorEntry {
        code: "NVM-C003",
        short: "register file exhausted",
        long: r#"## NVM-C003: register file exhausted

Every literal, identifier read and intermediate result claims a new
register, and registers are never reused. A program therefore needs about
as many registers as it has expressions, up to a hard ceiling of 256.

The ceiling can be lowered with `--max-registers`, never raised past 256.
Long straight-line programs should be split.
"#,
    },
    ErrorEntry {
        code: "NVM-C004",
        short: "jump distance too large",
        long: r#"## NVM-C004: jump distance too large

Branch displacements are stored in an 18-bit instruction field. A forward
conditional skip may span up to 262143 instructions; an unconditional jump
may move up to 131071 instructions backward or 131072 forward.

A loop body or branch this large cannot be encoded.
"#,
    },
    ErrorEntry {
        code: "NVM-C005",
        short: "constant pool full",
        long: r#"## NVM-C005: constant pool full

Constants are addressed by an 18-bit index, so a chunk holds at most
262144 distinct literals and global names. Repeated literals share one
entry.
"#,
    },

    // ── Compiler warnings ────────────────────────────────────────────────────
    ErrorEntry {
        code: "NVM-W001",
        short: "logical operator compiled as addition",
        long: r#"## NVM-W001: logical operator compiled as addition

The instruction set has no short-circuit `And`/`Or`. Both operators are
compiled as `Add`, so `1 And 2` evaluates to `3` and both sides are always
evaluated. The program still runs.

**Fix:** spell the condition with nested `If` nodes:

    {"If": {"cond": {"Ident": "a"},
            "then_branch": {"Ident": "b"},
            "else_branch": {"Bool": false}}}
"#,
    },

    // ── Runtime ──────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "NVM-R001",
        short: "unknown opcode",
        long: r#"## NVM-R001: unknown opcode

The instruction's opcode bits do not name any operation. Only chunks that
were assembled by hand or modified after compilation can contain one.
"#,
    },
    ErrorEntry {
        code: "NVM-R002",
        short: "bad constant reference",
        long: r#"## NVM-R002: bad constant reference

An instruction named a constant index past the end of the pool, or a global
access named a constant that is not a string.
"#,
    },
    ErrorEntry {
        code: "NVM-R003",
        short: "register outside the register file",
        long: r#"## NVM-R003: register outside the register file

The register file is sized from the chunk's recorded register count. An
instruction referenced a register at or beyond that count.
"#,
    },
    ErrorEntry {
        code: "NVM-R004",
        short: "jump outside the code",
        long: r#"## NVM-R004: jump outside the code

An unconditional jump moved the program counter before the first
instruction or past the end of the code.
"#,
    },
    ErrorEntry {
        code: "NVM-R005",
        short: "output could not be written",
        long: r#"## NVM-R005: output could not be written

`print` failed to write to standard output, for example because the reading
end of a pipe was closed.
"#,
    },
];

pub fn lookup(code: &str) -> Option<&'static ErrorEntry> {
    REGISTRY.iter().find(|e| e.code == code)
}

/// One `CODE  short description` line per entry.
pub fn listing() -> String {
    let mut out = String::new();
    for entry in REGISTRY {
        out.push_str(&format!("{:<10}{}\n", entry.code, entry.short));
    }
    out
}
