use std::path::PathBuf;

pub const DEFAULT_CC: &str = "cc";
pub const DEFAULT_CFLAGS: &str = "-std=c11 -Wall -Wextra";
pub const DEFAULT_OUTPUT: &str = "a.out";

pub const ENV_TRANSPILER: &str = "CZAR_TRANSPILER";
pub const ENV_CC: &str = "CC";
pub const ENV_CFLAGS: &str = "CFLAGS";
pub const ENV_LDFLAGS: &str = "LDFLAGS";

/// Everything a build needs to know besides the sources themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub root: PathBuf,
    pub output: PathBuf,
    /// External transpiler run on each directive-stripped unit.
    pub transpiler: Option<PathBuf>,
    pub cc: String,
    pub cflags: Vec<String>,
    pub ldflags: Vec<String>,
}

impl BuildConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            transpiler: None,
            cc: DEFAULT_CC.to_string(),
            cflags: split_flags(DEFAULT_CFLAGS),
            ldflags: Vec::new(),
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    /// Defaults overridden by the process environment.
    pub fn from_env(root: impl Into<PathBuf>, output: Option<PathBuf>) -> Self {
        Self::from_lookup(root, output, |key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(root: impl Into<PathBuf>, output: Option<PathBuf>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(root);
        if let Some(output) = output {
            config.output = output;
        }
        if let Some(transpiler) = lookup(ENV_TRANSPILER).filter(|v| !v.trim().is_empty()) {
            config.transpiler = Some(PathBuf::from(transpiler.trim()));
        }
        if let Some(cc) = lookup(ENV_CC).filter(|v| !v.trim().is_empty()) {
            config.cc = cc.trim().to_string();
        }
        if let Some(cflags) = lookup(ENV_CFLAGS) {
            config.cflags = split_flags(&cflags);
        }
        if let Some(ldflags) = lookup(ENV_LDFLAGS) {
            config.ldflags = split_flags(&ldflags);
        }
        config
    }
}

fn split_flags(flags: &str) -> Vec<String> {
    flags.split_whitespace().map(str::to_string).collect()
}
