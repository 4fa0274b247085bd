//! Advisory static scan of plugin sources.
//!
//! The plugin is parsed into a Lua syntax tree and every function call is
//! checked against two data tables: namespace prefixes that reach the file
//! system, processes, the network or native code, and method-name substrings
//! that destroy, execute or download things. Matches are reported verbatim.
//!
//! This is a lexical heuristic, not a taint analysis. A matching substring in
//! an unrelated name is a false positive; aliasing a function to a local,
//! indexing `_G` with a computed string or calling through `load` hides a call
//! from it. It is not a security boundary.

use full_moon::ast::{Call, FunctionCall, Suffix};
use full_moon::node::Node;
use full_moon::visitors::Visitor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// What counts as a sensitive call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRules {
    /// Callee prefixes for file, process, network, reflection and native APIs
    #[serde(default = "default_type_prefixes")]
    pub type_prefixes: Vec<String>,
    /// Substrings of destructive or executing method names
    #[serde(default = "default_method_names")]
    pub method_names: Vec<String>,
}

fn default_type_prefixes() -> Vec<String> {
    [
        "io.",
        "os.execute",
        "os.remove",
        "os.rename",
        "os.exit",
        "os.getenv",
        "os.tmpname",
        "debug.",
        "package.loadlib",
        "package.cpath",
        "ffi.",
        "jit.",
        "socket",
        "http.",
        "luajava",
        "require",
        "dofile",
        "loadfile",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

fn default_method_names() -> Vec<String> {
    [
        "remove", "delete", "unlink", "rmdir", "kill", "execute", "exec", "spawn", "popen",
        "shutdown", "write", "download", "invoke", "loadlib", "loadstring",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

impl Default for ScanRules {
    fn default() -> Self {
        Self {
            type_prefixes: default_type_prefixes(),
            method_names: default_method_names(),
        }
    }
}

impl ScanRules {
    fn matches(&self, callee: &str) -> bool {
        self.type_prefixes
            .iter()
            .any(|prefix| callee.starts_with(prefix.as_str()))
            || self
                .method_names
                .iter()
                .any(|name| callee.contains(name.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FindingKind {
    Call,
    /// `Type.new(...)` / `Type:new(...)`
    Construction,
}

/// One flagged call, as written in the source
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScanFinding {
    pub fragment: String,
    pub kind: FindingKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub path: PathBuf,
    /// Deduplicated, sorted
    pub findings: Vec<ScanFinding>,
}

impl ScanReport {
    #[must_use]
    pub fn issue_count(&self) -> usize {
        self.findings.len()
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

pub struct SecurityScanner {
    rules: ScanRules,
}

impl SecurityScanner {
    pub fn new(rules: ScanRules) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn rules(&self) -> &ScanRules {
        &self.rules
    }

    /// Scan the plugin at `path`
    ///
    /// # Errors
    /// [`Error::NotFound`] if the file does not exist, [`Error::ScanParse`]
    /// if it is not valid Lua
    pub fn scan(&self, path: &Path) -> Result<ScanReport> {
        let source = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
            _ => Error::Io(e),
        })?;
        self.scan_source(path, &source)
    }

    /// Scan source text that was already read
    ///
    /// # Errors
    /// [`Error::ScanParse`] if `source` is not valid Lua
    pub fn scan_source(&self, path: &Path, source: &str) -> Result<ScanReport> {
        let ast = full_moon::parse(source).map_err(|errors| Error::ScanParse {
            path: path.to_path_buf(),
            message: errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        })?;

        let mut collector = CallCollector {
            rules: &self.rules,
            findings: BTreeSet::new(),
        };
        collector.visit_ast(&ast);

        Ok(ScanReport {
            path: path.to_path_buf(),
            findings: collector.findings.into_iter().collect(),
        })
    }
}

struct CallCollector<'r> {
    rules: &'r ScanRules,
    findings: BTreeSet<ScanFinding>,
}

impl Visitor for CallCollector<'_> {
    fn visit_function_call(&mut self, call: &FunctionCall) {
        let callee = callee_of(call);
        if !self.rules.matches(&callee) {
            return;
        }

        let kind = if callee == "new" || callee.ends_with(".new") || callee.ends_with(":new") {
            FindingKind::Construction
        } else {
            FindingKind::Call
        };
        self.findings.insert(ScanFinding {
            fragment: fragment_of(call),
            kind,
        });
    }
}

/// The call as written, without the comments and blank lines around it
fn fragment_of(call: &FunctionCall) -> String {
    let text = call.to_string();
    let (leading, trailing) = call.surrounding_trivia();
    let leading: String = leading.iter().map(ToString::to_string).collect();
    let trailing: String = trailing.iter().map(ToString::to_string).collect();

    let inner = text.strip_prefix(leading.as_str()).unwrap_or(&text);
    let inner = inner.strip_suffix(trailing.as_str()).unwrap_or(inner);
    inner.trim().to_string()
}

/// Token text of `node` with all trivia dropped
fn compact(node: &impl Node) -> String {
    node.tokens().map(|token| token.token().to_string()).collect()
}

/// The call without its final argument list:
/// `os.remove("x")` -> `os.remove`, `f:write(s)` -> `f:write`
fn callee_of(call: &FunctionCall) -> String {
    let suffixes: Vec<&Suffix> = call.suffixes().collect();
    let mut callee = compact(call.prefix());

    if let Some((last, rest)) = suffixes.split_last() {
        for suffix in rest {
            callee.push_str(&compact(*suffix));
        }
        match last {
            Suffix::Call(Call::MethodCall(method)) => {
                callee.push_str(&compact(method.colon_token()));
                callee.push_str(&compact(method.name()));
            }
            Suffix::Call(_) => {}
            other => callee.push_str(&compact(*other)),
        }
    }
    callee
}
