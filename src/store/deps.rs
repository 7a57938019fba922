// src/store/deps.rs

//! Dependency analysis from the `why-depends` report
//!
//! The daemon prints the dependency tree in a human-oriented form with
//! unicode tree-drawing glyphs and, depending on the terminal, ANSI color
//! escapes. The parser strips escapes, locates the first store path on each
//! line, and derives the node's depth from the glyph column the path starts
//! at. Walking the flattened preorder with a stack of ancestors yields the
//! affected set: every path on the stack whenever the target is reached.
//!
//! The parent map keeps one parent per node (last writer wins); it is only
//! used to print a single human-readable chain. Topological ordering is the
//! engine's job and uses real reference queries instead.

use crate::error::{Error, Result};
use crate::store::Store;
use std::collections::{BTreeSet, HashMap};

/// Width of one tree-drawing cell in the report ("├───" and friends)
const TREE_CELL_WIDTH: usize = 4;

/// One node of the flattened preorder dependency tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportNode {
    pub path: String,
    pub depth: usize,
}

/// Structured form of a `why-depends` report
#[derive(Debug, Clone, Default)]
pub struct DependencyReport {
    /// Preorder traversal; the root is the first node at depth 0
    pub nodes: Vec<ReportNode>,
}

/// Result of analyzing a report against a target path
#[derive(Debug, Clone)]
pub struct DependencyAnalysis {
    /// Paths that must be rewritten: the target plus every ancestor of it
    pub affected: BTreeSet<String>,
    /// One chosen parent per non-root node, for diagnostics
    pub parents: HashMap<String, String>,
    /// A single chain root -> ... -> target
    pub chain: Vec<String>,
}

/// Run `why-depends` through the adapter and analyze the report.
pub fn analyze(store: &dyn Store, root: &str, target: &str) -> Result<DependencyAnalysis> {
    let report = store.why_depends(root, target)?;
    analyze_report(&report, root, target)
}

/// Compute the affected set, parent map, and diagnostic chain.
pub fn analyze_report(
    report: &DependencyReport,
    root: &str,
    target: &str,
) -> Result<DependencyAnalysis> {
    let mut affected = BTreeSet::new();
    let mut parents: HashMap<String, String> = HashMap::new();
    let mut stack: Vec<String> = Vec::new();

    for node in &report.nodes {
        stack.truncate(node.depth);
        if let Some(parent) = stack.last() {
            if parent != &node.path {
                parents.insert(node.path.clone(), parent.clone());
            }
        }
        stack.push(node.path.clone());

        if node.path == target {
            for ancestor in &stack {
                affected.insert(ancestor.clone());
            }
        }
    }

    if !affected.contains(target) {
        return Err(Error::NotInClosure {
            root: root.to_string(),
            target: target.to_string(),
        });
    }

    let chain = path_to_root(&parents, target);
    Ok(DependencyAnalysis {
        affected,
        parents,
        chain,
    })
}

/// Follow the parent map from `path` up to the root; returns root first.
fn path_to_root(parents: &HashMap<String, String>, path: &str) -> Vec<String> {
    let mut chain = vec![path.to_string()];
    let mut current = path;
    // The parent map came from a tree walk, but guard against a malformed
    // report looping forever.
    while let Some(parent) = parents.get(current) {
        if chain.contains(parent) {
            break;
        }
        chain.push(parent.clone());
        current = parent;
    }
    chain.reverse();
    chain
}

/// Parse the raw report text into a structured tree.
///
/// Lines without a store path (headers, blank lines) are skipped.
pub fn parse_report(output: &str, store_dir: &str) -> DependencyReport {
    let mut nodes = Vec::new();
    for line in output.lines() {
        let stripped = strip_ansi(line);
        if let Some((column, path)) = extract_store_path(&stripped, store_dir) {
            nodes.push(ReportNode {
                path,
                depth: column / TREE_CELL_WIDTH,
            });
        }
    }
    DependencyReport { nodes }
}

/// Remove ANSI CSI and OSC escape sequences.
pub(crate) fn strip_ansi(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            // CSI: ESC [ ... final byte in @..~
            Some('[') => {
                chars.next();
                for c in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&c) {
                        break;
                    }
                }
            }
            // OSC: ESC ] ... BEL or ESC \
            Some(']') => {
                chars.next();
                while let Some(c) = chars.next() {
                    if c == '\x07' {
                        break;
                    }
                    if c == '\x1b' {
                        chars.next();
                        break;
                    }
                }
            }
            // Two-character escape
            Some(_) => {
                chars.next();
            }
            None => {}
        }
    }
    out
}

/// Find the first store path on a line.
///
/// Returns the glyph column the path starts at (for depth derivation) and
/// the path itself, read up to the first whitespace.
pub(crate) fn extract_store_path(line: &str, store_dir: &str) -> Option<(usize, String)> {
    let prefix = format!("{}/", store_dir);
    let byte_pos = line.find(&prefix)?;
    let column = line[..byte_pos].chars().count();

    let rest = &line[byte_pos..];
    let end = rest
        .find(|c: char| c.is_whitespace())
        .unwrap_or(rest.len());
    Some((column, rest[..end].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORE: &str = "/nix/store";

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("plain text"), "plain text");
        assert_eq!(strip_ansi("\x1b[31mred text\x1b[0m"), "red text");
        assert_eq!(
            strip_ansi("\x1b[1;32mbold green\x1b[0m normal"),
            "bold green normal"
        );
        assert_eq!(
            strip_ansi("before \x1b[33;44myellow on blue\x1b[0m after"),
            "before yellow on blue after"
        );
    }

    #[test]
    fn test_extract_store_path() {
        assert_eq!(
            extract_store_path("├───/nix/store/abc123-package", STORE),
            Some((4, "/nix/store/abc123-package".to_string()))
        );
        assert_eq!(
            extract_store_path("    /custom/store/def456-bin with extra", "/custom/store"),
            Some((4, "/custom/store/def456-bin".to_string()))
        );
        assert_eq!(extract_store_path("no store path here", STORE), None);
        assert_eq!(
            extract_store_path("/nix/store/path-with-tab\there", STORE),
            Some((0, "/nix/store/path-with-tab".to_string()))
        );
    }

    #[test]
    fn test_parse_report_depths() {
        let output = "\
/nix/store/abc123-system
├───/nix/store/def456-etc
│   ├───/nix/store/target-path
│   └───/nix/store/ghi789-bin
└───/nix/store/jkl012-lib
    └───/nix/store/target-path";

        let report = parse_report(output, STORE);
        let depths: Vec<usize> = report.nodes.iter().map(|n| n.depth).collect();
        assert_eq!(depths, [0, 1, 2, 2, 1, 2]);
    }

    #[test]
    fn test_analyze_marks_all_chains() {
        let output = "\
/nix/store/abc123-system
├───/nix/store/def456-etc
│   ├───/nix/store/target-path
│   └───/nix/store/ghi789-bin
└───/nix/store/jkl012-lib
    └───/nix/store/target-path";

        let report = parse_report(output, STORE);
        let analysis =
            analyze_report(&report, "/nix/store/abc123-system", "/nix/store/target-path").unwrap();

        let expected: BTreeSet<String> = [
            "/nix/store/abc123-system",
            "/nix/store/def456-etc",
            "/nix/store/jkl012-lib",
            "/nix/store/target-path",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(analysis.affected, expected);

        // ghi789-bin sits next to the target but never above it
        assert!(!analysis.affected.contains("/nix/store/ghi789-bin"));
    }

    #[test]
    fn test_analyze_chain_reaches_root() {
        let output = "\
/nix/store/aaa-root
└───/nix/store/bbb-mid
    └───/nix/store/ccc-leaf";

        let report = parse_report(output, STORE);
        let analysis =
            analyze_report(&report, "/nix/store/aaa-root", "/nix/store/ccc-leaf").unwrap();
        assert_eq!(
            analysis.chain,
            ["/nix/store/aaa-root", "/nix/store/bbb-mid", "/nix/store/ccc-leaf"]
        );
    }

    #[test]
    fn test_analyze_missing_target_is_not_in_closure() {
        let output = "\
/nix/store/aaa-root
└───/nix/store/bbb-other";

        let report = parse_report(output, STORE);
        let result = analyze_report(&report, "/nix/store/aaa-root", "/nix/store/ccc-leaf");
        assert!(matches!(result, Err(Error::NotInClosure { .. })));
    }

    #[test]
    fn test_analyze_target_is_root() {
        let output = "/nix/store/aaa-root";
        let report = parse_report(output, STORE);
        let analysis =
            analyze_report(&report, "/nix/store/aaa-root", "/nix/store/aaa-root").unwrap();
        assert_eq!(analysis.affected.len(), 1);
        assert_eq!(analysis.chain, ["/nix/store/aaa-root"]);
    }

    #[test]
    fn test_parse_report_with_ansi_noise() {
        let output = "\x1b[1m/nix/store/aaa-root\x1b[0m\n└───\x1b[32m/nix/store/bbb-leaf\x1b[0m";
        let report = parse_report(output, STORE);
        assert_eq!(report.nodes.len(), 2);
        assert_eq!(report.nodes[0].path, "/nix/store/aaa-root");
        assert_eq!(report.nodes[0].depth, 0);
        assert_eq!(report.nodes[1].path, "/nix/store/bbb-leaf");
        assert_eq!(report.nodes[1].depth, 1);
    }
}
