use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discover,
    Strip,
    Transpile,
    Header,
    Import,
    Include,
    Compile,
    Link,
    Clean,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Discover => "discover",
            Stage::Strip => "strip",
            Stage::Transpile => "transpile",
            Stage::Header => "header",
            Stage::Import => "import",
            Stage::Include => "include",
            Stage::Compile => "compile",
            Stage::Link => "link",
            Stage::Clean => "clean",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum CzarError {
    #[error("no .cz source units found under {}", root.display())]
    NoSourceUnits { root: PathBuf },
    #[error("{stage} stage failed for {}: {}", unit.display(), path.display())]
    Io {
        stage: Stage,
        unit: PathBuf,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to scan {}", root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("transpiler failed for {} ({status}):\n{stderr}", unit.display())]
    TranspilerFailed {
        unit: PathBuf,
        status: ExitStatus,
        stderr: String,
    },
    #[error("compile failed for {} ({status}):\n{stderr}", unit.display())]
    CompileFailed {
        unit: PathBuf,
        status: ExitStatus,
        stderr: String,
    },
    #[error("link failed ({status}):\n{stderr}")]
    LinkFailed { status: ExitStatus, stderr: String },
    #[error("failed to run {tool} during {stage} stage")]
    ToolSpawn {
        tool: String,
        stage: Stage,
        #[source]
        source: std::io::Error,
    },
}

impl CzarError {
    pub fn io(stage: Stage, unit: impl Into<PathBuf>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CzarError::Io {
            stage,
            unit: unit.into(),
            path: path.into(),
            source,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            CzarError::NoSourceUnits { .. } | CzarError::Walk { .. } => Stage::Discover,
            CzarError::Io { stage, .. } | CzarError::ToolSpawn { stage, .. } => *stage,
            CzarError::TranspilerFailed { .. } => Stage::Transpile,
            CzarError::CompileFailed { .. } => Stage::Compile,
            CzarError::LinkFailed { .. } => Stage::Link,
        }
    }

    /// Process exit code a calling script can tell apart.
    pub fn exit_code(&self) -> i32 {
        if let CzarError::NoSourceUnits { .. } = self {
            return exit_code::NO_SOURCE_UNITS;
        }
        match self.stage() {
            Stage::Compile => exit_code::COMPILE_FAILURE,
            Stage::Link => exit_code::LINK_FAILURE,
            Stage::Discover | Stage::Clean => exit_code::OTHER,
            _ => exit_code::TRANSPILE_FAILURE,
        }
    }
}

pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const OTHER: i32 = 1;
    pub const NO_SOURCE_UNITS: i32 = 3;
    pub const TRANSPILE_FAILURE: i32 = 4;
    pub const COMPILE_FAILURE: i32 = 5;
    pub const LINK_FAILURE: i32 = 6;
}
