//! Purpose: Annotate fragments with their call site for readable query logs.
//! Exports: `SourceRoot`, `Expr::debug`, `Expr::debug_at`, and the `debug_sql!` macro.
//! Role: Debug-only sibling of `Expr::build`; output binds exactly like the plain build.
//! Invariants: Annotation never changes argument order or the marker count.
//! Invariants: The process-wide root is computed at most once; first initialization wins.

use std::env;
use std::ffi::OsString;
use std::panic::Location;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use serde::Deserialize;

use crate::core::expr::{Arg, Expr};

/// Overrides project-root discovery when set to a non-empty path.
pub const SOURCE_ROOT_ENV: &str = "SQLH_SOURCE_ROOT";

static GLOBAL_ROOT: OnceLock<SourceRoot> = OnceLock::new();

/// Directory that annotated call sites are reported relative to.
///
/// A root of `none` disables annotation: `Expr::debug_at` falls back to the
/// plain build.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SourceRoot {
    path: Option<PathBuf>,
}

impl SourceRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn none() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Resolves the project root from the environment, cargo's workspace
    /// manifest, or the nearest ancestor of the working directory holding a
    /// `Cargo.toml`, in that order.
    pub fn discover() -> Self {
        Self::discover_with(|key| env::var_os(key), locate_workspace)
    }

    fn discover_with(
        var: impl Fn(&str) -> Option<OsString>,
        workspace: impl FnOnce() -> Option<PathBuf>,
    ) -> Self {
        if let Some(path) = var(SOURCE_ROOT_ENV).filter(|path| !path.is_empty()) {
            tracing::trace!(root = ?path, "source root from environment");
            return Self::new(path);
        }
        if let Some(path) = workspace() {
            tracing::trace!(root = %path.display(), "source root from cargo workspace");
            return Self::new(path);
        }
        if let Some(path) = env::current_dir()
            .ok()
            .and_then(|dir| find_manifest_dir(&dir))
        {
            tracing::trace!(root = %path.display(), "source root from manifest search");
            return Self::new(path);
        }
        tracing::trace!("source root not found; annotations disabled");
        Self::none()
    }

    /// The process-wide root, discovered on first use.
    pub fn global() -> &'static SourceRoot {
        GLOBAL_ROOT.get_or_init(Self::discover)
    }

    /// Sets the process-wide root. Fails, handing the root back, once the
    /// global has been initialized by an earlier `install` or `global` call.
    pub fn install(root: SourceRoot) -> Result<(), SourceRoot> {
        GLOBAL_ROOT.set(root)
    }

    /// Path of `file` relative to this root.
    ///
    /// Relative paths, as reported by `Location` for the crate being built,
    /// are already workspace-relative and are returned unchanged. Absolute
    /// paths outside the root climb out of it with `..` components.
    pub fn relative(&self, file: &Path) -> Option<PathBuf> {
        let root = self.path.as_deref()?;
        if file.as_os_str().is_empty() {
            return None;
        }
        if file.is_relative() {
            return Some(file.to_path_buf());
        }
        relative_to(file, root)
    }
}

fn relative_to(file: &Path, root: &Path) -> Option<PathBuf> {
    let mut file_parts = file.components().peekable();
    let mut root_parts = root.components().peekable();
    loop {
        match (file_parts.peek(), root_parts.peek()) {
            (Some(a), Some(b)) if a == b => {}
            _ => break,
        }
        file_parts.next();
        root_parts.next();
    }

    // A different drive or a relative root cannot be bridged with `..`.
    if root_parts
        .clone()
        .any(|part| matches!(part, Component::Prefix(_) | Component::RootDir))
        || file_parts
            .clone()
            .any(|part| matches!(part, Component::Prefix(_) | Component::RootDir))
    {
        return None;
    }

    let mut relative = PathBuf::new();
    for _ in root_parts {
        relative.push("..");
    }
    relative.extend(file_parts);
    if relative.as_os_str().is_empty() {
        return None;
    }
    Some(relative)
}

#[derive(Deserialize)]
struct LocatedProject {
    root: PathBuf,
}

fn locate_workspace() -> Option<PathBuf> {
    let cargo = env::var_os("CARGO").unwrap_or_else(|| "cargo".into());
    let output = Command::new(cargo)
        .args(["locate-project", "--workspace", "--message-format", "json"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    parse_located_project(&output.stdout)
}

fn parse_located_project(stdout: &[u8]) -> Option<PathBuf> {
    let located: LocatedProject = serde_json::from_slice(stdout).ok()?;
    located.root.parent().map(Path::to_path_buf)
}

fn find_manifest_dir(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join("Cargo.toml").is_file())
        .map(Path::to_path_buf)
}

fn indent(text: &str) -> String {
    if !text.contains('\n') {
        return text.to_string();
    }
    let lines: Vec<&str> = text.trim().split('\n').collect();
    format!("\n\t{}\n", lines.join("\n\t"))
}

impl Expr {
    /// Like [`Expr::build`], prefixed with a `/* file:line */` comment naming
    /// the caller and with multi-line fragments reindented.
    #[track_caller]
    pub fn debug(template: &str, args: Vec<Arg>) -> Expr {
        let location = Location::caller();
        Expr::debug_at(
            SourceRoot::global(),
            location.file(),
            location.line(),
            template,
            args,
        )
    }

    pub fn debug_at(
        root: &SourceRoot,
        file: &str,
        line: u32,
        template: &str,
        args: Vec<Arg>,
    ) -> Expr {
        let args: Vec<Arg> = args
            .into_iter()
            .map(|arg| match arg {
                Arg::Fragment(sub) => {
                    let text = indent(sub.text());
                    let (_, values) = sub.into_parts();
                    Arg::Fragment(Expr::from_parts(text, values))
                }
                literal => literal,
            })
            .collect();

        let expr = Expr::build(template, args);
        match root.relative(Path::new(file)) {
            Some(path) => {
                let (text, values) = expr.into_parts();
                let text = format!("\n/* {}:{} */ {}", path.display(), line, text);
                Expr::from_parts(text, values)
            }
            None => expr,
        }
    }
}

/// Debug variant of [`sql!`](crate::sql) that records the invocation site.
#[macro_export]
macro_rules! debug_sql {
    ($template:expr $(,)?) => {
        $crate::Expr::debug($template, ::std::vec::Vec::new())
    };
    ($template:expr, $($arg:expr),+ $(,)?) => {
        $crate::Expr::debug($template, ::std::vec![$($crate::Arg::from($arg)),+])
    };
}
