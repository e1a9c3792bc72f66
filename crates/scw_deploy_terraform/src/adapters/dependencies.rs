use std::path::Path;
use std::process::Command;

use tracing::info;

use crate::error::{GenerateError, Result};

/// Installs third-party libraries into the project tree before packaging.
pub trait DependencyMaterializer {
    fn materialize(&self, project_root: &Path) -> Result<()>;
}

impl<F> DependencyMaterializer for F
where
    F: Fn(&Path) -> Result<()>,
{
    fn materialize(&self, project_root: &Path) -> Result<()> {
        self(project_root)
    }
}

/// Package the tree as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct SkipDependencies;

impl DependencyMaterializer for SkipDependencies {
    fn materialize(&self, _project_root: &Path) -> Result<()> {
        Ok(())
    }
}

/// Runs an install command (for example `pip install -r requirements.txt
/// --target package`) with the project root as working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMaterializer {
    program: String,
    args: Vec<String>,
}

impl CommandMaterializer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a whitespace-separated command line. `None` when blank.
    pub fn from_command_line(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, parts.map(str::to_string).collect()))
    }

    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl DependencyMaterializer for CommandMaterializer {
    fn materialize(&self, project_root: &Path) -> Result<()> {
        info!(command = %self.display(), "materializing dependencies");
        let status = Command::new(&self.program)
            .args(&self.args)
            .current_dir(project_root)
            .status()
            .map_err(|error| {
                GenerateError::Dependencies(format!(
                    "failed to run `{}`: {error}",
                    self.display()
                ))
            })?;

        if !status.success() {
            return Err(GenerateError::Dependencies(format!(
                "`{}` exited with {status}",
                self.display()
            )));
        }
        Ok(())
    }
}
