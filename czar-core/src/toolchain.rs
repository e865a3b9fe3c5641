//! Synchronous invocation of the external transpiler, compiler and linker.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tracing::debug;

use crate::config::BuildConfig;
use crate::error::{CzarError, Stage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub cc: String,
    pub cflags: Vec<String>,
    pub ldflags: Vec<String>,
}

impl Toolchain {
    pub fn from_config(config: &BuildConfig) -> Self {
        Self {
            cc: config.cc.clone(),
            cflags: config.cflags.clone(),
            ldflags: config.ldflags.clone(),
        }
    }

    /// Compile one C file to an object.
    ///
    /// Returns the compiler's diagnostics when it succeeded but printed
    /// something, which callers report as warnings.
    pub fn compile(&self, unit: &Path, c_path: &Path, object: &Path) -> Result<Option<String>, CzarError> {
        let mut command = Command::new(&self.cc);
        command.args(&self.cflags).arg("-c").arg(c_path).arg("-o").arg(object);
        let output = run(&self.cc, Stage::Compile, &mut command)?;
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(CzarError::CompileFailed {
                unit: unit.to_path_buf(),
                status: output.status,
                stderr,
            });
        }
        Ok((!stderr.trim().is_empty()).then_some(stderr))
    }

    /// Link every object into `output`.
    pub fn link(&self, objects: &[PathBuf], output: &Path) -> Result<(), CzarError> {
        let mut command = Command::new(&self.cc);
        command.args(objects).args(&self.ldflags).arg("-o").arg(output);
        let result = run(&self.cc, Stage::Link, &mut command)?;
        if !result.status.success() {
            return Err(CzarError::LinkFailed {
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
            });
        }
        Ok(())
    }
}

/// Run the external transpiler with the staged, directive-stripped text on
/// its stdin and return the C it printed on stdout.
pub fn run_transpiler(transpiler: &Path, unit: &Path, staged: &Path) -> Result<Vec<u8>, CzarError> {
    let input = File::open(staged).map_err(|err| CzarError::io(Stage::Transpile, unit, staged, err))?;
    let tool = transpiler.display().to_string();
    let mut command = Command::new(transpiler);
    command.stdin(Stdio::from(input));
    let output = run(&tool, Stage::Transpile, &mut command)?;
    if !output.status.success() {
        return Err(CzarError::TranspilerFailed {
            unit: unit.to_path_buf(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(output.stdout)
}

fn run(tool: &str, stage: Stage, command: &mut Command) -> Result<Output, CzarError> {
    debug!(?command, "running {stage} tool");
    command.output().map_err(|source| CzarError::ToolSpawn {
        tool: tool.to_string(),
        stage,
        source,
    })
}
