pub mod ast;
pub mod diagnostic;
pub mod value;
pub mod vm;

use std::path::{Path, PathBuf};

pub use ast::Node;
pub use value::Value;
pub use vm::{
    Chunk, CompileError, CompileOptions, CompileWarning, GlobalTable, Vm, VmError, compile, compile_with,
};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid program: {0}")]
    Parse(#[from] serde_json::Error),
}

impl LoadError {
    pub fn code(&self) -> &'static str {
        match self {
            LoadError::Read { .. } => "NVM-L001",
            LoadError::Parse(_) => "NVM-L002",
        }
    }
}

/// Any failure between reading a program and the end of its execution.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Vm(#[from] VmError),
}

/// Parses a program from its JSON AST text.
pub fn parse_program(json: &str) -> Result<Node, LoadError> {
    Ok(serde_json::from_str(json)?)
}

pub fn load_program(path: &Path) -> Result<Node, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_program(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_program_accepts_block() {
        let json = r#"{"Block":[{"Assign":{"name":"x","value":{"Int":5}}},"Nil"]}"#;
        let node = parse_program(json).unwrap();
        assert_eq!(node, Node::Block(vec![Node::assign("x", Node::int(5)), Node::Nil]));
    }

    #[test]
    fn parse_program_rejects_garbage() {
        let err = parse_program("[1, 2").unwrap_err();
        assert!(matches!(err, LoadError::Parse(_)));
        assert_eq!(err.code(), "NVM-L002");
    }

    #[test]
    fn load_program_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"Call":{{"callee":"print","args":[{{"Int":1}}]}}}}"#).unwrap();
        let node = load_program(file.path()).unwrap();
        assert_eq!(node, Node::print(Node::int(1)));
    }

    #[test]
    fn load_program_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_program(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, LoadError::Read { .. }));
        assert!(err.to_string().contains("absent.json"));
    }

    #[test]
    fn error_wraps_each_layer() {
        let err: Error = CompileError::RegisterOverflow { limit: 2 }.into();
        assert_eq!(err.to_string(), "program needs more than 2 registers");
        let d = diagnostic::Diagnostic::from(&err);
        assert_eq!(d.code, Some("NVM-C003"));
    }
}
