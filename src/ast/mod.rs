use serde::{Deserialize, Serialize};

// ---- Core AST types ----

/// One node of a parsed program. Expressions and statements share a single
/// enum: assignments, blocks and loops all produce a register when compiled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Nil,

    /// Array literal: `[a, b, c]`
    Array(Vec<Node>),

    /// Global variable reference
    Ident(String),

    Binary {
        op: BinOp,
        left: Box<Node>,
        right: Box<Node>,
    },

    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },

    /// `object[index]`
    Index {
        object: Box<Node>,
        index: Box<Node>,
    },

    /// `object[index] = value`
    SetIndex {
        object: Box<Node>,
        index: Box<Node>,
        value: Box<Node>,
    },

    /// Built-in call: `print(x)`, `range(n)`, `len(x)`
    Call {
        callee: String,
        args: Vec<Node>,
    },

    /// `name = value`, always targets the global table
    Assign {
        name: String,
        value: Box<Node>,
    },

    Block(Vec<Node>),

    If {
        cond: Box<Node>,
        then_branch: Box<Node>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        else_branch: Option<Box<Node>>,
    },

    While {
        cond: Box<Node>,
        body: Box<Node>,
    },

    /// `for var in iterable { body }`, iterating by index up to `len(iterable)`
    For {
        var: String,
        iterable: Box<Node>,
        body: Box<Node>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

// ---- Builders ----
//
// Terse constructors so hand-built programs (tests, embedders) read close to
// the source they stand for.

impl Node {
    pub fn int(n: i64) -> Node {
        Node::Int(n)
    }

    pub fn float(f: f64) -> Node {
        Node::Float(f)
    }

    pub fn str(s: impl Into<String>) -> Node {
        Node::Str(s.into())
    }

    pub fn ident(name: impl Into<String>) -> Node {
        Node::Ident(name.into())
    }

    pub fn binary(op: BinOp, left: Node, right: Node) -> Node {
        Node::Binary { op, left: Box::new(left), right: Box::new(right) }
    }

    pub fn unary(op: UnaryOp, operand: Node) -> Node {
        Node::Unary { op, operand: Box::new(operand) }
    }

    pub fn index(object: Node, index: Node) -> Node {
        Node::Index { object: Box::new(object), index: Box::new(index) }
    }

    pub fn set_index(object: Node, index: Node, value: Node) -> Node {
        Node::SetIndex { object: Box::new(object), index: Box::new(index), value: Box::new(value) }
    }

    pub fn call(callee: impl Into<String>, args: Vec<Node>) -> Node {
        Node::Call { callee: callee.into(), args }
    }

    pub fn assign(name: impl Into<String>, value: Node) -> Node {
        Node::Assign { name: name.into(), value: Box::new(value) }
    }

    pub fn if_else(cond: Node, then_branch: Node, else_branch: Option<Node>) -> Node {
        Node::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        }
    }

    pub fn while_loop(cond: Node, body: Node) -> Node {
        Node::While { cond: Box::new(cond), body: Box::new(body) }
    }

    pub fn for_loop(var: impl Into<String>, iterable: Node, body: Node) -> Node {
        Node::For { var: var.into(), iterable: Box::new(iterable), body: Box::new(body) }
    }

    /// `print(arg)`
    pub fn print(arg: Node) -> Node {
        Node::call("print", vec![arg])
    }
}
