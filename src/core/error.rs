use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Malformed descriptor{}: {message}", location(.path))]
    MalformedDescriptor {
        path: Option<PathBuf>,
        message: String,
    },

    #[error("Invalid descriptor: {}", .0.join("; "))]
    InvalidDescriptor(Vec<String>),

    #[error("No descriptor found under {0}")]
    DescriptorNotFound(PathBuf),

    #[error("Descriptor changed since the environment was created (recorded {recorded}, found {found}); recreate the environment")]
    DescriptorChanged { recorded: String, found: String },

    #[error("Failed to retrieve image {image}: {reason}")]
    ImagePull { image: String, reason: String },

    #[error("Provisioning step {} failed ({}): {statement}", .index + 1, exit_status(.exit_code))]
    StepFailed {
        index: usize,
        statement: String,
        exit_code: Option<i32>,
    },

    #[error("Environment is partially provisioned ({completed}/{total} steps); fix it manually or recreate it")]
    PartiallyProvisioned { completed: usize, total: usize },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

fn location(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" at {}", p.display()))
        .unwrap_or_default()
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated without exit code".to_string(),
    }
}

impl ProvisionError {
    pub fn malformed(message: impl Into<String>) -> Self {
        ProvisionError::MalformedDescriptor {
            path: None,
            message: message.into(),
        }
    }

    /// Attaches the descriptor path to a malformed-descriptor error.
    pub fn at_path(self, path: impl Into<PathBuf>) -> Self {
        match self {
            ProvisionError::MalformedDescriptor { path: None, message } => {
                ProvisionError::MalformedDescriptor {
                    path: Some(path.into()),
                    message,
                }
            }
            other => other,
        }
    }
}

pub type ProvisionResult<T> = Result<T, ProvisionError>;
