pub mod ansi;
pub mod json;
pub mod registry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Option<&'static str>,
    pub message: String,
    pub notes: Vec<String>,
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            code: None,
            message: message.into(),
            notes: Vec::new(),
            suggestion: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic { severity: Severity::Warning, ..Diagnostic::error(message) }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

// ---- From impls for error types ----

impl From<&crate::vm::CompileError> for Diagnostic {
    fn from(e: &crate::vm::CompileError) -> Self {
        use crate::vm::CompileError;

        let d = Diagnostic::error(e.to_string()).with_code(e.code());
        match e {
            CompileError::UnknownBuiltin { .. } => {
                d.with_suggestion("the built-ins are print, range and len")
            }
            CompileError::BuiltinArity { .. } => d.with_suggestion("pass exactly one argument"),
            CompileError::RegisterOverflow { .. } => d
                .with_note("every expression claims a fresh register and none are reused")
                .with_suggestion("split the program or raise --max-registers (at most 256)"),
            CompileError::JumpTooFar { .. } => {
                d.with_note("a branch body is too large to jump over")
            }
            CompileError::TooManyConstants { .. } => d,
        }
    }
}

impl From<&crate::vm::CompileWarning> for Diagnostic {
    fn from(w: &crate::vm::CompileWarning) -> Self {
        use crate::vm::CompileWarning;

        let d = Diagnostic::warning(w.to_string()).with_code(w.code());
        match w {
            CompileWarning::OperatorFallback { .. } => {
                d.with_suggestion("express the condition with nested If nodes")
            }
        }
    }
}

impl From<&crate::vm::VmError> for Diagnostic {
    fn from(e: &crate::vm::VmError) -> Self {
        use crate::vm::VmError;

        let d = Diagnostic::error(e.to_string()).with_code(e.code());
        match e {
            VmError::Io(_) => d,
            _ => d.with_note("the chunk was not produced by the compiler or has been corrupted"),
        }
    }
}

impl From<&crate::LoadError> for Diagnostic {
    fn from(e: &crate::LoadError) -> Self {
        use crate::LoadError;

        let d = Diagnostic::error(e.to_string()).with_code(e.code());
        match e {
            LoadError::Read { .. } => d,
            LoadError::Parse(_) => {
                d.with_suggestion("run `nirvana --explain NVM-L002` for the expected JSON layout")
            }
        }
    }
}

impl From<&crate::Error> for Diagnostic {
    fn from(e: &crate::Error) -> Self {
        match e {
            crate::Error::Load(e) => Diagnostic::from(e),
            crate::Error::Compile(e) => Diagnostic::from(e),
            crate::Error::Vm(e) => Diagnostic::from(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinOp;
    use crate::vm::{CompileError, CompileWarning, VmError};

    #[test]
    fn diagnostic_error_builder() {
        let d = Diagnostic::error("something went wrong");
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.message, "something went wrong");
        assert!(d.code.is_none());
        assert!(d.notes.is_empty());
        assert!(d.suggestion.is_none());
    }

    #[test]
    fn diagnostic_with_note_and_suggestion() {
        let d = Diagnostic::warning("operator fallback")
            .with_note("And compiles as ADD")
            .with_suggestion("use an if expression");
        assert_eq!(d.severity, Severity::Warning);
        assert_eq!(d.notes, vec!["And compiles as ADD"]);
        assert_eq!(d.suggestion.as_deref(), Some("use an if expression"));
    }

    #[test]
    fn from_compile_error_carries_code() {
        let e = CompileError::UnknownBuiltin { name: "input".to_string() };
        let d = Diagnostic::from(&e);
        assert!(d.message.contains("input"));
        assert_eq!(d.code, Some("NVM-C001"));
        assert!(d.suggestion.is_some());
    }

    #[test]
    fn from_register_overflow() {
        let d = Diagnostic::from(&CompileError::RegisterOverflow { limit: 8 });
        assert!(d.message.contains('8'));
        assert_eq!(d.code, Some("NVM-C003"));
        assert_eq!(d.notes.len(), 1);
    }

    #[test]
    fn from_compile_warning_is_a_warning() {
        let d = Diagnostic::from(&CompileWarning::OperatorFallback { op: BinOp::Or });
        assert_eq!(d.severity, Severity::Warning);
        assert_eq!(d.code, Some("NVM-W001"));
        assert!(d.message.contains("Or"), "{}", d.message);
    }

    #[test]
    fn from_vm_error() {
        let d = Diagnostic::from(&VmError::UnknownOpcode { op: 60, pc: 4 });
        assert!(d.message.contains("60"));
        assert_eq!(d.code, Some("NVM-R001"));
    }

    #[test]
    fn from_load_error() {
        let parse = serde_json::from_str::<crate::ast::Node>("{").unwrap_err();
        let d = Diagnostic::from(&crate::LoadError::Parse(parse));
        assert_eq!(d.code, Some("NVM-L002"));
    }

    #[test]
    fn every_code_is_registered() {
        let codes = [
            Diagnostic::from(&CompileError::UnknownBuiltin { name: String::new() }),
            Diagnostic::from(&CompileError::BuiltinArity { name: String::new(), expected: 1, found: 0 }),
            Diagnostic::from(&CompileError::RegisterOverflow { limit: 1 }),
            Diagnostic::from(&CompileError::JumpTooFar { distance: 1, limit: 1 }),
            Diagnostic::from(&CompileError::TooManyConstants { limit: 1 }),
            Diagnostic::from(&VmError::UnknownOpcode { op: 0, pc: 0 }),
            Diagnostic::from(&VmError::BadConstant { index: 0, pc: 0 }),
            Diagnostic::from(&VmError::BadRegister { index: 0, pc: 0 }),
            Diagnostic::from(&VmError::BadJump { target: 0, pc: 0 }),
            Diagnostic::from(&VmError::Io(std::io::Error::other("x"))),
            Diagnostic::from(&CompileWarning::OperatorFallback { op: BinOp::And }),
        ];
        for d in codes {
            let code = d.code.unwrap();
            assert!(registry::lookup(code).is_some(), "{code} missing from registry");
        }
    }
}
