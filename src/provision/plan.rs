use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::DevContainerConfig;
use crate::core::{ProvisionError, ProvisionResult};

const PACKAGE_MANAGERS: &[&str] = &["pip", "pip3", "poetry", "npm", "yarn", "pnpm"];
const PYTHON_LAUNCHERS: &[&str] = &["python", "python3"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    PackageInstall { user_scoped: bool },
    HookInstall,
    Other,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::PackageInstall { user_scoped: true } => write!(f, "package install (user)"),
            StepKind::PackageInstall { user_scoped: false } => write!(f, "package install"),
            StepKind::HookInstall => write!(f, "hook install"),
            StepKind::Other => write!(f, "command"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub index: usize,
    pub text: String,
    pub kind: StepKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningPlan {
    statements: Vec<Statement>,
}

impl ProvisioningPlan {
    /// Splits a post-create command line on `&&`, `;` and newlines that sit outside quotes.
    pub fn from_command(command: &str) -> ProvisionResult<Self> {
        let statements = split_statements(command)?
            .into_iter()
            .enumerate()
            .map(|(index, text)| {
                let kind = classify(&text);
                Statement { index, text, kind }
            })
            .collect();

        Ok(Self { statements })
    }

    pub fn from_descriptor(config: &DevContainerConfig) -> ProvisionResult<Self> {
        match config.post_create_command.as_deref() {
            Some(command) => Self::from_command(command),
            None => Ok(Self::default()),
        }
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Accepts exactly a package installation followed by hook registration.
    pub fn check_install_then_hooks(&self) -> ProvisionResult<()> {
        let kinds: Vec<&StepKind> = self.statements.iter().map(|s| &s.kind).collect();
        match kinds.as_slice() {
            [StepKind::PackageInstall { .. }, StepKind::HookInstall] => Ok(()),
            _ => Err(ProvisionError::InvalidDescriptor(vec![format!(
                "postCreateCommand must install packages and then register hooks, found [{}]",
                kinds
                    .iter()
                    .map(|k| k.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )])),
        }
    }
}

fn split_statements(command: &str) -> ProvisionResult<Vec<String>> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = command.chars().peekable();
    let mut in_single = false;
    let mut in_double = false;

    while let Some(c) = chars.next() {
        match c {
            '\\' if !in_single => {
                current.push(c);
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '\'' if !in_double => {
                in_single = !in_single;
                current.push(c);
            }
            '"' if !in_single => {
                in_double = !in_double;
                current.push(c);
            }
            '&' if !in_single && !in_double && chars.peek() == Some(&'&') => {
                chars.next();
                statements.push(std::mem::take(&mut current));
            }
            ';' | '\n' if !in_single && !in_double => {
                statements.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }

    if in_single || in_double {
        return Err(ProvisionError::malformed(
            "postCreateCommand has an unterminated quote",
        ));
    }
    statements.push(current);

    Ok(statements
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Splits a statement into words, dropping quotes. Only used for classification.
fn words(statement: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = statement.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '\'') | (None, '"') => {
                quote = Some(c);
                in_word = true;
            }
            (None, '\\') => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

fn is_assignment(word: &str) -> bool {
    match word.split_once('=') {
        Some((name, _)) => {
            !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}

fn classify(statement: &str) -> StepKind {
    let words = words(statement);
    let mut rest: Vec<&str> = words
        .iter()
        .map(String::as_str)
        .skip_while(|w| is_assignment(w))
        .collect();

    let Some(first) = rest.first().copied() else {
        return StepKind::Other;
    };
    let mut program = first.rsplit('/').next().unwrap_or(first).to_string();
    rest.remove(0);

    if PYTHON_LAUNCHERS.contains(&program.as_str()) && rest.first() == Some(&"-m") && rest.len() > 1 {
        program = rest[1].replace('_', "-");
        rest.drain(..2);
    } else if program == "uv" && rest.first() == Some(&"pip") {
        program = "pip".to_string();
        rest.remove(0);
    }

    let subcommand = rest.iter().find(|w| !w.starts_with('-')).copied();

    if subcommand != Some("install") {
        return StepKind::Other;
    }

    if PACKAGE_MANAGERS.contains(&program.as_str()) {
        StepKind::PackageInstall {
            user_scoped: rest.contains(&"--user"),
        }
    } else if program == "pre-commit" {
        StepKind::HookInstall
    } else {
        StepKind::Other
    }
}
