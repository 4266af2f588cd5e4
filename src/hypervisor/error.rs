//! Error types for the hypervisor adapter.

/// Malformed hypervisor stats or node-info output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFormatError {
    pub message: String,
}

impl InputFormatError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for InputFormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed hypervisor output: {}", self.message)
    }
}

impl std::error::Error for InputFormatError {}

/// A hypervisor subprocess exited non-zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandError {
    pub command: String,
    pub stderr: String,
}

impl CommandError {
    pub fn new(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            stderr: stderr.into(),
        }
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "command `{}` failed: {}", self.command, self.stderr.trim())
    }
}

impl std::error::Error for CommandError {}

impl From<std::io::Error> for CommandError {
    fn from(e: std::io::Error) -> Self {
        CommandError::new("<spawn>", e.to_string())
    }
}

/// Programmer misuse: a precondition the caller was responsible for
/// checking (e.g. a memory target outside the valid range) was violated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "validation error: {}", self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Union of failures the adapter's higher-level operations can return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HypervisorError {
    InputFormat(InputFormatError),
    Command(CommandError),
    Validation(ValidationError),
}

impl std::fmt::Display for HypervisorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HypervisorError::InputFormat(e) => e.fmt(f),
            HypervisorError::Command(e) => e.fmt(f),
            HypervisorError::Validation(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for HypervisorError {}

impl From<InputFormatError> for HypervisorError {
    fn from(e: InputFormatError) -> Self {
        HypervisorError::InputFormat(e)
    }
}

impl From<CommandError> for HypervisorError {
    fn from(e: CommandError) -> Self {
        HypervisorError::Command(e)
    }
}

impl From<ValidationError> for HypervisorError {
    fn from(e: ValidationError) -> Self {
        HypervisorError::Validation(e)
    }
}
