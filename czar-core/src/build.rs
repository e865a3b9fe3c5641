//! Build orchestration: discovery, per-unit stages, compile and link.
//!
//! Every stage runs sequentially over the sorted unit list. Import
//! resolution and sibling injection start only after every unit has a
//! header on disk. Nothing is cached between runs.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::artifact::{remove_artifact, write_artifact};
use crate::config::BuildConfig;
use crate::directive::strip_reader;
use crate::error::{CzarError, Stage};
use crate::extract::extract_declarations;
use crate::header::synthesize_header;
use crate::import::expand_imports;
use crate::sibling::{inject_siblings, sibling_headers};
use crate::toolchain::{Toolchain, run_transpiler};
use crate::unit::{TranslationUnit, discover_units};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    /// Transpile, compile and link.
    #[default]
    Full,
    /// Stop once every unit's C file is finalized.
    TranspileOnly,
}

/// The sorted unit list and the single link target.
#[derive(Debug, Clone)]
pub struct BuildGraph {
    pub units: Vec<TranslationUnit>,
    pub target: PathBuf,
}

impl BuildGraph {
    pub fn discover(config: &BuildConfig) -> Result<Self, CzarError> {
        Ok(Self {
            units: discover_units(&config.root)?,
            target: config.output.clone(),
        })
    }

    pub fn objects(&self) -> Vec<PathBuf> {
        self.units.iter().map(|unit| unit.object_path.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerWarning {
    pub unit: PathBuf,
    pub message: String,
}

/// Summary of a finished build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// Unit sources relative to the build root, in build order.
    pub units: Vec<PathBuf>,
    pub headers: Vec<PathBuf>,
    pub objects: Vec<PathBuf>,
    pub warnings: Vec<CompilerWarning>,
    /// `(unit, module)` for every import that matched no headers.
    pub unresolved_imports: Vec<(PathBuf, String)>,
    /// Linked binary; `None` in transpile-only mode.
    pub output: Option<PathBuf>,
}

pub struct Builder {
    config: BuildConfig,
    toolchain: Toolchain,
}

impl Builder {
    pub fn new(config: BuildConfig) -> Self {
        let toolchain = Toolchain::from_config(&config);
        Self { config, toolchain }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn run(&self, mode: BuildMode) -> Result<BuildReport, CzarError> {
        let mut graph = BuildGraph::discover(&self.config)?;
        info!(units = graph.units.len(), root = %self.config.root.display(), "discovered units");

        self.transpile(&mut graph)?;

        let mut report = BuildReport {
            units: graph.units.iter().map(|u| u.relative.clone()).collect(),
            headers: graph.units.iter().map(|u| u.header_path.clone()).collect(),
            objects: Vec::new(),
            warnings: Vec::new(),
            unresolved_imports: graph
                .units
                .iter()
                .flat_map(|unit| {
                    unit.imports
                        .iter()
                        .filter(|import| !import.is_resolved())
                        .map(|import| (unit.relative.clone(), import.module.clone()))
                })
                .collect(),
            output: None,
        };

        if mode == BuildMode::TranspileOnly {
            return Ok(report);
        }

        report.warnings = self.compile(&graph)?;
        report.objects = graph.objects();
        self.link(&graph)?;
        report.output = Some(graph.target.clone());
        Ok(report)
    }

    /// Run every text stage for every unit.
    pub fn transpile(&self, graph: &mut BuildGraph) -> Result<(), CzarError> {
        for unit in &mut graph.units {
            if let Err(err) = self.transpile_unit(unit) {
                discard_partial(unit);
                return Err(err);
            }
        }
        for index in 0..graph.units.len() {
            resolve_unit(&mut graph.units, index)?;
        }
        Ok(())
    }

    /// Strip, transpile, extract and synthesize one unit.
    fn transpile_unit(&self, unit: &mut TranslationUnit) -> Result<(), CzarError> {
        debug!(unit = %unit.relative.display(), "transpiling");
        let source = unit.source.clone();

        let bytes = fs::read(&source).map_err(|err| CzarError::io(Stage::Strip, &source, &source, err))?;
        let mut stripped = Vec::with_capacity(bytes.len());
        strip_reader(bytes.as_slice(), &mut stripped)
            .map_err(|err| CzarError::io(Stage::Strip, &source, &source, err))?;
        unit.raw = bytes;
        unit.transpiled = stripped;
        write_artifact(&unit.c_path, &unit.transpiled)
            .map_err(|err| CzarError::io(Stage::Strip, &source, &unit.c_path, err))?;

        if let Some(transpiler) = &self.config.transpiler {
            unit.transpiled = run_transpiler(transpiler, &source, &unit.c_path)?;
            write_artifact(&unit.c_path, &unit.transpiled)
                .map_err(|err| CzarError::io(Stage::Transpile, &source, &unit.c_path, err))?;
        }

        // Offsets may shift under lossy decoding; line numbers do not.
        unit.declarations = extract_declarations(&String::from_utf8_lossy(&unit.transpiled));
        let header = synthesize_header(&unit.guard_name(), &unit.declarations);
        write_artifact(&unit.header_path, &header)
            .map_err(|err| CzarError::io(Stage::Header, &source, &unit.header_path, err))?;
        info!(
            unit = %unit.relative.display(),
            declarations = unit.declarations.len(),
            "synthesized header"
        );
        Ok(())
    }

    /// Compile every unit; the first failure stops the build.
    pub fn compile(&self, graph: &BuildGraph) -> Result<Vec<CompilerWarning>, CzarError> {
        let mut warnings = Vec::new();
        for unit in &graph.units {
            debug!(unit = %unit.relative.display(), "compiling");
            if let Some(message) = self.toolchain.compile(&unit.source, &unit.c_path, &unit.object_path)? {
                warn!(unit = %unit.relative.display(), "compiler reported warnings:\n{message}");
                warnings.push(CompilerWarning {
                    unit: unit.relative.clone(),
                    message,
                });
            }
        }
        Ok(warnings)
    }

    pub fn link(&self, graph: &BuildGraph) -> Result<(), CzarError> {
        if let Some(parent) = graph.target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|err| CzarError::io(Stage::Link, &graph.target, parent, err))?;
        }
        self.toolchain.link(&graph.objects(), &graph.target)?;
        info!(output = %graph.target.display(), "linked");
        Ok(())
    }
}

/// Expand imports and inject sibling includes for `units[index]`, then
/// rewrite its C file.
pub fn resolve_unit(units: &mut [TranslationUnit], index: usize) -> Result<(), CzarError> {
    let siblings = sibling_headers(units, index);
    let unit = &mut units[index];
    let own_header = unit.header_file_name();

    if !unit.imports_expanded {
        let (text, imports) = expand_imports(&unit.transpiled, unit.directory(), &own_header)
            .map_err(|err| CzarError::io(Stage::Import, &unit.source, unit.directory(), err))?;
        unit.transpiled = text;
        unit.imports = imports;
        unit.imports_expanded = true;
    }

    if !unit.siblings_injected {
        unit.transpiled = inject_siblings(&unit.transpiled, &own_header, &siblings);
        unit.siblings = siblings;
        unit.siblings_injected = true;
    }

    write_artifact(&unit.c_path, &unit.transpiled)
        .map_err(|err| CzarError::io(Stage::Include, &unit.source, &unit.c_path, err))
}

/// Full pipeline with the given configuration.
pub fn build(config: BuildConfig, mode: BuildMode) -> Result<BuildReport, CzarError> {
    Builder::new(config).run(mode)
}

/// Delete every generated artifact and the linked binary.
pub fn clean(config: &BuildConfig) -> Result<Vec<PathBuf>, CzarError> {
    let units = match discover_units(&config.root) {
        Ok(units) => units,
        Err(CzarError::NoSourceUnits { .. }) => Vec::new(),
        Err(err) => return Err(err),
    };

    let mut removed = Vec::new();
    let artifacts = units
        .iter()
        .flat_map(|u| [u.c_path.clone(), u.header_path.clone(), u.object_path.clone()])
        .chain(std::iter::once(config.output.clone()));
    for path in artifacts {
        if remove_artifact(&path).map_err(|err| CzarError::io(Stage::Clean, &path, &path, err))? {
            debug!(path = %path.display(), "removed");
            removed.push(path);
        }
    }
    info!(count = removed.len(), "cleaned artifacts");
    Ok(removed)
}

fn discard_partial(unit: &TranslationUnit) {
    for path in [&unit.c_path, &unit.header_path] {
        if let Err(err) = remove_artifact(path) {
            warn!(path = %path.display(), "could not remove partial artifact: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::{TempDir, tempdir};

    fn project(files: &[(&str, &str)]) -> TempDir {
        let dir = tempdir().expect("tempdir");
        for (name, contents) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("mkdir");
            }
            fs::write(path, contents).expect("write");
        }
        dir
    }

    fn config(dir: &TempDir) -> BuildConfig {
        BuildConfig::new(dir.path()).with_output(dir.path().join("app"))
    }

    fn read(dir: &TempDir, name: &str) -> String {
        fs::read_to_string(dir.path().join(name)).expect("read artifact")
    }

    fn cc_available() -> bool {
        Command::new("cc")
            .arg("--version")
            .output()
            .is_ok_and(|output| output.status.success())
    }

    #[cfg(unix)]
    fn script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        let mut permissions = fs::metadata(&path).expect("metadata").permissions();
        permissions.set_mode(0o755);
        fs::set_permissions(&path, permissions).expect("chmod");
        path
    }

    const ADD: &str = "#pragma czar unit math\nint add(int a, int b) {\n    return a + b;\n}\n";
    const MAIN: &str = "#include <stdio.h>\n\nint main(void) {\n    printf(\"%d\\n\", add(2, 3));\n    return 0;\n}\n";

    #[test]
    fn transpile_only_generates_headers_and_sibling_includes() {
        let dir = project(&[("a.cz", ADD), ("b.cz", MAIN)]);
        let report = build(config(&dir), BuildMode::TranspileOnly).expect("transpile");

        assert_eq!(report.units, vec![PathBuf::from("a.cz"), PathBuf::from("b.cz")]);
        assert!(report.output.is_none());

        let header = read(&dir, "a.h");
        assert!(header.contains("#ifndef CZAR_A_H"));
        assert!(header.contains("int add(int a, int b);"));

        let a_c = read(&dir, "a.c");
        assert!(!a_c.contains("#pragma czar"));
        assert!(a_c.contains("#include \"b.h\""));

        let b_c = read(&dir, "b.c");
        assert!(b_c.contains("#include <stdio.h>\n\n#include \"a.h\"\nint main(void)"));
        assert!(!b_c.contains("#include \"b.h\""));
    }

    #[test]
    fn cross_directory_imports_are_expanded() {
        let dir = project(&[
            ("util/math.cz", ADD),
            ("app/main.cz", "// @import \"../util\"\nint main(void) { return add(1, -1); }\n"),
        ]);
        let report = build(config(&dir), BuildMode::TranspileOnly).expect("transpile");
        assert!(report.unresolved_imports.is_empty());
        assert!(read(&dir, "app/main.c").starts_with("#include \"../util/math.h\"\n"));
    }

    #[test]
    fn unresolved_import_is_soft_during_transpile() {
        let dir = project(&[(
            "main.cz",
            "// @import \"nowhere\"\nint main(void) { return add(1, 2); }\n",
        )]);
        let report = build(config(&dir), BuildMode::TranspileOnly).expect("transpile");
        assert_eq!(
            report.unresolved_imports,
            vec![(PathBuf::from("main.cz"), "nowhere".to_string())]
        );
        assert!(read(&dir, "main.c").contains("/* czar: import \"nowhere\" matched no generated headers */"));
    }

    #[test]
    fn repeated_runs_are_byte_identical() {
        let dir = project(&[("a.cz", ADD), ("b.cz", MAIN), ("lib/x.cz", "void x(void) {}\n")]);
        let first = build(config(&dir), BuildMode::TranspileOnly).expect("first");
        let headers: Vec<String> = ["a.h", "b.h", "lib/x.h"].iter().map(|h| read(&dir, h)).collect();
        let sources: Vec<String> = ["a.c", "b.c", "lib/x.c"].iter().map(|c| read(&dir, c)).collect();

        let second = build(config(&dir), BuildMode::TranspileOnly).expect("second");
        assert_eq!(first, second);
        for (name, before) in ["a.h", "b.h", "lib/x.h"].iter().zip(&headers) {
            assert_eq!(&read(&dir, name), before);
        }
        for (name, before) in ["a.c", "b.c", "lib/x.c"].iter().zip(&sources) {
            assert_eq!(&read(&dir, name), before);
        }
    }

    #[test]
    fn resolving_a_unit_twice_changes_nothing() {
        let dir = project(&[("a.cz", ADD), ("b.cz", MAIN)]);
        let builder = Builder::new(config(&dir));
        let mut graph = BuildGraph::discover(builder.config()).expect("discover");
        builder.transpile(&mut graph).expect("transpile");
        let before = graph.units[1].transpiled.clone();

        graph.units[1].imports_expanded = false;
        graph.units[1].siblings_injected = false;
        resolve_unit(&mut graph.units, 1).expect("resolve again");
        assert_eq!(graph.units[1].transpiled, before);
    }

    #[test]
    fn empty_tree_fails_before_any_stage() {
        let dir = project(&[("notes.txt", "")]);
        let err = build(config(&dir), BuildMode::Full).unwrap_err();
        assert!(matches!(err, CzarError::NoSourceUnits { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn external_transpiler_output_is_used() {
        let dir = project(&[("a.cz", ADD)]);
        let mut config = config(&dir);
        config.transpiler = Some(PathBuf::from("cat"));
        build(config, BuildMode::TranspileOnly).expect("transpile");
        assert!(read(&dir, "a.h").contains("int add(int a, int b);"));
    }

    #[cfg(unix)]
    #[test]
    fn external_transpiler_filters_stdin() {
        let dir = project(&[(
            "a.cz",
            "#pragma czar unit math\nint czar_add(int a, int b) {\n    return a + b;\n}\n",
        )]);
        let mut config = config(&dir);
        config.transpiler = Some(script(
            &dir,
            "rename.sh",
            "[ \"$#\" -eq 0 ] || exit 9\nsed 's/czar_add/add/g'",
        ));
        build(config, BuildMode::TranspileOnly).expect("transpile");

        let c = read(&dir, "a.c");
        assert!(c.contains("int add(int a, int b)"));
        assert!(!c.contains("#pragma czar"));
        assert!(read(&dir, "a.h").contains("int add(int a, int b);"));
    }

    #[test]
    fn non_utf8_bytes_survive_into_the_c_file() {
        let dir = project(&[("a.cz", ADD)]);
        fs::write(
            dir.path().join("main.cz"),
            b"/* caf\xe9 */\nint main(void) { return add(1, -1); }\n",
        )
        .expect("write latin-1 source");

        let report = build(config(&dir), BuildMode::TranspileOnly).expect("transpile");
        assert_eq!(report.units.len(), 2);
        let c = fs::read(dir.path().join("main.c")).expect("read main.c");
        assert!(c.starts_with(b"/* caf\xe9 */\n#include \"a.h\"\n"));
        assert!(read(&dir, "main.h").contains("int main(void);"));

        if cc_available() {
            build(config(&dir), BuildMode::Full).expect("cc accepts the unit");
        }
    }

    #[cfg(unix)]
    #[test]
    fn compiler_warnings_are_reported_without_stopping_the_link() {
        let dir = project(&[("a.cz", ADD), ("b.cz", MAIN)]);
        let mut config = config(&dir);
        config.cc = script(
            &dir,
            "cc.sh",
            "for last; do :; done\ncase \" $* \" in\n  *\" -c \"*) echo 'warning: stub diagnostic' >&2 ;;\n  *) : > \"$last\" ;;\nesac",
        )
        .display()
        .to_string();

        let report = build(config, BuildMode::Full).expect("warnings are not fatal");
        let units: Vec<PathBuf> = report.warnings.iter().map(|w| w.unit.clone()).collect();
        assert_eq!(units, vec![PathBuf::from("a.cz"), PathBuf::from("b.cz")]);
        assert!(report.warnings.iter().all(|w| w.message.contains("stub diagnostic")));
        assert_eq!(report.output, Some(dir.path().join("app")));
        assert!(dir.path().join("app").exists());
    }

    #[test]
    fn real_compiler_warning_is_collected() {
        if !cc_available() {
            eprintln!("skipping: no C compiler");
            return;
        }
        let dir = project(&[("main.cz", "int main(void) {\n    int unused;\n    return 0;\n}\n")]);
        let report = build(config(&dir), BuildMode::Full).expect("build");
        assert!(report.warnings.iter().any(|w| w.unit == PathBuf::from("main.cz")));
        assert!(dir.path().join("app").exists());
    }

    #[cfg(unix)]
    #[test]
    fn failing_transpiler_leaves_no_partial_artifacts() {
        let dir = project(&[("a.cz", ADD)]);
        let mut config = config(&dir);
        config.transpiler = Some(PathBuf::from("false"));
        let err = build(config, BuildMode::TranspileOnly).unwrap_err();
        assert!(matches!(err, CzarError::TranspilerFailed { .. }));
        assert_eq!(err.exit_code(), crate::error::exit_code::TRANSPILE_FAILURE);
        assert!(!dir.path().join("a.c").exists());
        assert!(!dir.path().join("a.h").exists());
    }

    #[cfg(unix)]
    #[test]
    fn compile_failure_stops_before_link() {
        let dir = project(&[("a.cz", ADD), ("b.cz", MAIN)]);
        let mut config = config(&dir);
        config.cc = "false".to_string();
        let err = build(config, BuildMode::Full).unwrap_err();
        assert!(matches!(err, CzarError::CompileFailed { ref unit, .. } if unit.ends_with("a.cz")));
        assert!(!dir.path().join("app").exists());
        assert!(dir.path().join("b.h").exists(), "completed artifacts are kept");
    }

    #[cfg(unix)]
    #[test]
    fn orchestrates_compile_and_link_in_unit_order() {
        let dir = project(&[("b.cz", MAIN), ("a.cz", ADD)]);
        let mut config = config(&dir);
        config.cc = "true".to_string();
        let report = build(config, BuildMode::Full).expect("build");
        assert_eq!(
            report.objects,
            vec![dir.path().join("a.o"), dir.path().join("b.o")]
        );
        assert_eq!(report.output, Some(dir.path().join("app")));
    }

    #[test]
    fn same_directory_units_build_and_run() {
        if !cc_available() {
            eprintln!("skipping: no C compiler");
            return;
        }
        let dir = project(&[("a.cz", ADD), ("b.cz", MAIN)]);
        let report = build(config(&dir), BuildMode::Full).expect("build");
        let binary = report.output.expect("linked binary");
        let output = Command::new(&binary).output().expect("run binary");
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout), "5\n");
    }

    #[test]
    fn missing_symbol_fails_only_at_compile_or_link() {
        if !cc_available() {
            eprintln!("skipping: no C compiler");
            return;
        }
        let dir = project(&[
            ("empty/notes.txt", ""),
            ("main.cz", "// @import \"empty\"\nint main(void) { return add(1, 2); }\n"),
        ]);
        build(config(&dir), BuildMode::TranspileOnly).expect("transpile succeeds");
        let err = build(config(&dir), BuildMode::Full).unwrap_err();
        assert!(matches!(
            err,
            CzarError::CompileFailed { .. } | CzarError::LinkFailed { .. }
        ));
    }

    #[test]
    fn clean_removes_generated_artifacts_only() {
        let dir = project(&[("a.cz", ADD), ("b.cz", MAIN)]);
        build(config(&dir), BuildMode::TranspileOnly).expect("transpile");
        let removed = clean(&config(&dir)).expect("clean");
        assert_eq!(removed.len(), 4);
        assert!(dir.path().join("a.cz").exists());
        assert!(!dir.path().join("a.c").exists());
        assert!(!dir.path().join("b.h").exists());
    }
}
