//! Source files, their `@import` graph and the staleness oracle.
//!
//! A [`SourceTree`] is loaded fresh for every pass. It reads the root file and
//! everything it imports, directly or transitively, into an arena of
//! [`SourceFile`] nodes. Import references are resolved relative to the
//! importing file's directory first and then against the configured include
//! paths. A file reached through several references is loaded once and shared.
//!
//! The tree answers one question for the build: the newest modification time
//! across the root and its imports. Cycles are allowed; a node already on the
//! current path contributes only its own timestamp.

use crate::error::{BuildError, BuildResult};
use indexmap::IndexMap;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

/// Default suffix of source files.
pub const DEFAULT_SOURCE_SUFFIX: &str = ".less";

/// Index of a node inside a [`SourceTree`].
pub type NodeId = usize;

/// One `@import` directive found in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDirective {
    /// Byte range of the whole directive, including the trailing `;`
    pub span: Range<usize>,
    /// Referenced path exactly as written
    pub reference: String,
    /// Import options, e.g. `reference` or `css` in `@import (css) "x";`
    pub options: Vec<String>,
}

impl ImportDirective {
    /// Whether the directive pulls in another source file the build must track.
    ///
    /// Plain CSS imports and remote URLs are passed through to the output
    /// untouched and are not dependencies.
    pub fn is_source_import(&self) -> bool {
        let has = |name: &str| self.options.iter().any(|o| o == name);
        if has("css") {
            return false;
        }
        if has("less") {
            return true;
        }
        let reference = self.reference.as_str();
        !(reference.starts_with("http://")
            || reference.starts_with("https://")
            || reference.starts_with("//")
            || reference.ends_with(".css"))
    }
}

fn directive_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"@import\s*(?:\(\s*([\w\s,-]*)\)\s*)?(?:url\(\s*)?(?:"([^"]*)"|'([^']*)')\s*\)?[^;]*;"#,
        )
        .expect("valid import regex")
    })
}

fn comment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)/\*.*?\*/|(?m)^[ \t]*//[^\n]*").expect("valid comment regex")
    })
}

/// Find the `@import` directives of `content`, skipping commented-out ones.
pub fn parse_import_directives(content: &str) -> Vec<ImportDirective> {
    let comments: Vec<Range<usize>> =
        comment_pattern().find_iter(content).map(|m| m.range()).collect();
    let in_comment = |offset: usize| comments.iter().any(|c| c.contains(&offset));

    directive_pattern()
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if in_comment(whole.start()) {
                return None;
            }
            let reference = caps.get(2).or_else(|| caps.get(3))?.as_str().trim().to_string();
            if reference.is_empty() {
                return None;
            }
            let options = caps
                .get(1)
                .map(|m| {
                    m.as_str()
                        .split(',')
                        .map(|o| o.trim().to_ascii_lowercase())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            Some(ImportDirective { span: whole.range(), reference, options })
        })
        .collect()
}

/// Resolves import references to files on disk.
#[derive(Debug, Clone)]
pub struct ImportResolver {
    source_suffix: String,
    include_paths: Vec<PathBuf>,
}

impl Default for ImportResolver {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE_SUFFIX)
    }
}

impl ImportResolver {
    /// Create a resolver appending `source_suffix` to extension-less references.
    pub fn new(source_suffix: impl Into<String>) -> Self {
        Self { source_suffix: source_suffix.into(), include_paths: Vec::new() }
    }

    /// Directories searched, in order, after the importing file's directory.
    pub fn with_include_paths(mut self, include_paths: Vec<PathBuf>) -> Self {
        self.include_paths = include_paths;
        self
    }

    /// Resolve `reference` written in a file located in `importing_dir`.
    pub fn resolve(&self, importing_dir: &Path, reference: &str) -> BuildResult<PathBuf> {
        let mut relative = PathBuf::from(reference);
        if relative.extension().is_none() {
            relative = PathBuf::from(format!("{}{}", reference, self.source_suffix));
        }

        let first = importing_dir.join(&relative);
        std::iter::once(first.clone())
            .chain(self.include_paths.iter().map(|dir| dir.join(&relative)))
            .find(|candidate| candidate.is_file())
            .ok_or(BuildError::NotFound { path: first })
    }
}

/// A loaded source file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
    content: String,
    last_modified: SystemTime,
    imports: IndexMap<String, NodeId>,
    directives: Vec<ImportDirective>,
}

impl SourceFile {
    /// Path the file was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw content.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Modification time of this file alone.
    pub fn last_modified(&self) -> SystemTime {
        self.last_modified
    }

    /// Resolved imports, keyed by reference string, in first-seen order.
    pub fn imports(&self) -> &IndexMap<String, NodeId> {
        &self.imports
    }
}

/// Modification time of `path`.
pub fn modified_time(path: &Path) -> BuildResult<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).map_err(|e| BuildError::io(path, e))
}

/// Decide whether `output` must be regenerated.
///
/// A missing output is always stale, whatever its platform-reported mtime.
pub fn output_is_stale(output: &Path, sources_modified: SystemTime, force: bool) -> bool {
    if force {
        return true;
    }
    match fs::metadata(output).and_then(|m| m.modified()) {
        Ok(output_modified) => output_modified < sources_modified,
        Err(_) => true,
    }
}

/// A root source file and everything it imports.
#[derive(Debug, Clone)]
pub struct SourceTree {
    nodes: Vec<SourceFile>,
}

impl SourceTree {
    /// The id of the root node.
    pub const ROOT: NodeId = 0;

    /// Load `root` and all of its transitive imports.
    pub fn load(root: &Path, resolver: &ImportResolver) -> BuildResult<Self> {
        let mut nodes = vec![read_source(root)?];
        let mut index: HashMap<PathBuf, NodeId> = HashMap::new();
        index.insert(identity(root), Self::ROOT);

        let mut next = 0;
        while next < nodes.len() {
            let dir = nodes[next].path.parent().map(Path::to_path_buf).unwrap_or_default();
            let references: Vec<String> = nodes[next]
                .directives
                .iter()
                .filter(|d| d.is_source_import())
                .map(|d| d.reference.clone())
                .collect();

            for reference in references {
                if nodes[next].imports.contains_key(&reference) {
                    continue;
                }
                let resolved = resolver.resolve(&dir, &reference)?;
                let key = identity(&resolved);
                let id = match index.get(&key) {
                    Some(&id) => id,
                    None => {
                        nodes.push(read_source(&resolved)?);
                        let id = nodes.len() - 1;
                        index.insert(key, id);
                        id
                    }
                };
                nodes[next].imports.insert(reference, id);
            }
            next += 1;
        }

        Ok(Self { nodes })
    }

    /// The root file.
    pub fn root(&self) -> &SourceFile {
        &self.nodes[Self::ROOT]
    }

    /// A node by id.
    pub fn node(&self, id: NodeId) -> &SourceFile {
        &self.nodes[id]
    }

    /// Number of distinct files in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false; a tree holds at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Newest modification time across the root and its transitive imports.
    pub fn last_modified_including_imports(&self) -> SystemTime {
        self.last_modified_including_imports_of(Self::ROOT)
    }

    /// Newest modification time across `id` and its transitive imports.
    pub fn last_modified_including_imports_of(&self, id: NodeId) -> SystemTime {
        let mut on_path = vec![false; self.nodes.len()];
        let mut finished = vec![None; self.nodes.len()];
        self.newest(id, &mut on_path, &mut finished)
    }

    /// Depth-first max with a finished-node cache; nodes on the current path
    /// contribute only their own time.
    fn newest(
        &self,
        id: NodeId,
        on_path: &mut [bool],
        finished: &mut [Option<SystemTime>],
    ) -> SystemTime {
        let node = &self.nodes[id];
        let mut latest = node.last_modified;
        on_path[id] = true;
        for &child in node.imports.values() {
            let child_time = match finished[child] {
                Some(time) => time,
                None if on_path[child] => self.nodes[child].last_modified,
                None => self.newest(child, on_path, finished),
            };
            latest = latest.max(child_time);
        }
        on_path[id] = false;
        finished[id] = Some(latest);
        latest
    }

    /// Root content with every source import replaced by the imported content.
    ///
    /// Each file is inlined at most once, so repeated and circular imports
    /// collapse to nothing after their first occurrence. Non-source imports
    /// stay verbatim.
    pub fn normalized_content(&self) -> String {
        let mut inlined = vec![false; self.nodes.len()];
        inlined[Self::ROOT] = true;
        self.inline(Self::ROOT, &mut inlined)
    }

    fn inline(&self, id: NodeId, inlined: &mut [bool]) -> String {
        let node = &self.nodes[id];
        let mut out = String::with_capacity(node.content.len());
        let mut cursor = 0;
        for directive in &node.directives {
            let Some(&child) = node.imports.get(&directive.reference) else {
                continue;
            };
            if !directive.is_source_import() {
                continue;
            }
            out.push_str(&node.content[cursor..directive.span.start]);
            if !inlined[child] {
                inlined[child] = true;
                out.push_str(&self.inline(child, inlined));
            }
            cursor = directive.span.end;
        }
        out.push_str(&node.content[cursor..]);
        out
    }

    /// Depth-first walk over the import tree, root first.
    pub fn walk(&self) -> TreeWalk<'_> {
        TreeWalk {
            tree: self,
            stack: vec![Pending { depth: 0, is_last: true, reference: None, id: Self::ROOT }],
            path: Vec::new(),
        }
    }
}

/// Identity of a file for deduplication.
fn identity(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn read_source(path: &Path) -> BuildResult<SourceFile> {
    let content = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
    let last_modified = modified_time(path)?;
    let directives = parse_import_directives(&content);
    Ok(SourceFile {
        path: path.to_path_buf(),
        content,
        last_modified,
        imports: IndexMap::new(),
        directives,
    })
}

/// One step of a [`TreeWalk`].
#[derive(Debug, Clone, Copy)]
pub struct TreeEntry<'a> {
    /// Distance from the root (root is 0)
    pub depth: usize,
    /// Whether this is the last import of its parent
    pub is_last: bool,
    /// Reference string used by the parent; `None` for the root
    pub reference: Option<&'a str>,
    /// The node itself
    pub node: &'a SourceFile,
    /// The node is already on the current path and is not descended into
    pub cyclic: bool,
}

#[derive(Debug, Clone, Copy)]
struct Pending<'a> {
    depth: usize,
    is_last: bool,
    reference: Option<&'a str>,
    id: NodeId,
}

/// Lazy depth-first iterator over a [`SourceTree`].
#[derive(Debug)]
pub struct TreeWalk<'a> {
    tree: &'a SourceTree,
    stack: Vec<Pending<'a>>,
    path: Vec<(usize, NodeId)>,
}

impl<'a> Iterator for TreeWalk<'a> {
    type Item = TreeEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let pending = self.stack.pop()?;
        while self.path.last().is_some_and(|&(depth, _)| depth >= pending.depth) {
            self.path.pop();
        }

        let cyclic = self.path.iter().any(|&(_, id)| id == pending.id);
        let node = self.tree.node(pending.id);
        if !cyclic {
            let count = node.imports.len();
            for (i, (reference, &child)) in node.imports.iter().enumerate().rev() {
                self.stack.push(Pending {
                    depth: pending.depth + 1,
                    is_last: i + 1 == count,
                    reference: Some(reference.as_str()),
                    id: child,
                });
            }
            self.path.push((pending.depth, pending.id));
        }

        Some(TreeEntry {
            depth: pending.depth,
            is_last: pending.is_last,
            reference: pending.reference,
            node,
            cyclic,
        })
    }
}

/// Render a tree listing, one line per entry, labelling the root with `root_label`.
pub fn render_tree(tree: &SourceTree, root_label: &str) -> Vec<String> {
    tree.walk()
        .map(|entry| {
            let mut line = String::new();
            for level in 1..=entry.depth {
                line.push_str(match (level == entry.depth, entry.is_last) {
                    (true, true) => "`-- ",
                    (true, false) => "|-- ",
                    (false, _) => "|   ",
                });
            }
            line.push_str(entry.reference.unwrap_or(root_label));
            if entry.cyclic {
                line.push_str(" (circular)");
            }
            line
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options().write(true).open(path).unwrap().set_modified(time).unwrap();
    }

    fn ago(secs: u64) -> SystemTime {
        SystemTime::now() - Duration::from_secs(secs)
    }

    #[test]
    fn test_parse_import_directives_variants() {
        let content = r#"@import "a";
@import 'b.less';
@import url("c.less");
@import (reference) "d";
@import (css) "e.less";
@import "print.css";
@import url("http://fonts.example.com/x");
"#;
        let directives = parse_import_directives(content);
        let refs: Vec<_> = directives.iter().map(|d| d.reference.as_str()).collect();
        assert_eq!(
            refs,
            vec!["a", "b.less", "c.less", "d", "e.less", "print.css", "http://fonts.example.com/x"]
        );
        let tracked: Vec<_> =
            directives.iter().filter(|d| d.is_source_import()).map(|d| d.reference.as_str()).collect();
        assert_eq!(tracked, vec!["a", "b.less", "c.less", "d"]);
        assert_eq!(directives[3].options, vec!["reference".to_string()]);
    }

    #[test]
    fn test_parse_import_directives_skips_comments() {
        let content = "// @import \"a\";\n/* @import \"b\"; */\n@import \"c\";\n";
        let directives = parse_import_directives(content);
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].reference, "c");
    }

    #[test]
    fn test_less_option_overrides_css_suffix() {
        let directives = parse_import_directives("@import (less) \"legacy.css\";");
        assert!(directives[0].is_source_import());
    }

    #[test]
    fn test_load_without_imports() {
        let temp = TempDir::new().unwrap();
        let root = write(temp.path(), "main.less", "a { color: red; }");

        let tree = SourceTree::load(&root, &ImportResolver::default()).unwrap();
        assert_eq!(tree.len(), 1);
        assert!(tree.root().imports().is_empty());
        assert_eq!(tree.last_modified_including_imports(), tree.root().last_modified());
    }

    #[test]
    fn test_missing_root_is_not_found() {
        let temp = TempDir::new().unwrap();
        let err = SourceTree::load(&temp.path().join("nope.less"), &ImportResolver::default())
            .unwrap_err();
        assert!(matches!(err, BuildError::NotFound { .. }));
    }

    #[test]
    fn test_missing_import_is_not_found() {
        let temp = TempDir::new().unwrap();
        let root = write(temp.path(), "main.less", "@import \"missing\";");
        let err = SourceTree::load(&root, &ImportResolver::default()).unwrap_err();
        match err {
            BuildError::NotFound { path } => assert!(path.ends_with("missing.less")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_imports_resolve_relative_to_importing_file() {
        let temp = TempDir::new().unwrap();
        let root = write(temp.path(), "main.less", "@import \"parts/a\";");
        write(temp.path(), "parts/a.less", "@import \"b\";");
        write(temp.path(), "parts/b.less", ".b {}");

        let tree = SourceTree::load(&root, &ImportResolver::default()).unwrap();
        assert_eq!(tree.len(), 3);
        let a = tree.root().imports()["parts/a"];
        let b = tree.node(a).imports()["b"];
        assert!(tree.node(b).path().ends_with("parts/b.less"));
    }

    #[test]
    fn test_include_paths_are_searched_in_order() {
        let temp = TempDir::new().unwrap();
        let root = write(temp.path(), "src/main.less", "@import \"mixins\";");
        write(temp.path(), "vendor1/mixins.less", ".one {}");
        write(temp.path(), "vendor2/mixins.less", ".two {}");

        let resolver = ImportResolver::default().with_include_paths(vec![
            temp.path().join("vendor1"),
            temp.path().join("vendor2"),
        ]);
        let tree = SourceTree::load(&root, &resolver).unwrap();
        let id = tree.root().imports()["mixins"];
        assert_eq!(tree.node(id).content(), ".one {}");
    }

    #[test]
    fn test_import_order_is_preserved_and_shared_nodes_deduplicated() {
        let temp = TempDir::new().unwrap();
        let root = write(temp.path(), "main.less", "@import \"z\";\n@import \"a\";\n@import \"./z.less\";");
        write(temp.path(), "z.less", "");
        write(temp.path(), "a.less", "");

        let tree = SourceTree::load(&root, &ImportResolver::default()).unwrap();
        let keys: Vec<_> = tree.root().imports().keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a", "./z.less"]);
        assert_eq!(tree.root().imports()["z"], tree.root().imports()["./z.less"]);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_last_modified_is_max_over_transitive_imports() {
        let temp = TempDir::new().unwrap();
        let root = write(temp.path(), "main.less", "@import \"a\";");
        let a = write(temp.path(), "a.less", "@import \"b\";");
        let b = write(temp.path(), "b.less", "");
        set_mtime(&root, ago(300));
        set_mtime(&a, ago(200));
        set_mtime(&b, ago(100));

        let tree = SourceTree::load(&root, &ImportResolver::default()).unwrap();
        assert_eq!(tree.last_modified_including_imports(), modified_time(&b).unwrap());
        let a_id = tree.root().imports()["a"];
        assert_eq!(tree.last_modified_including_imports_of(a_id), modified_time(&b).unwrap());
    }

    #[test]
    fn test_cyclic_imports_terminate() {
        let temp = TempDir::new().unwrap();
        let a = write(temp.path(), "a.less", "@import \"b\";\n.a {}");
        let b = write(temp.path(), "b.less", "@import \"a\";\n.b {}");
        set_mtime(&a, ago(100));
        set_mtime(&b, ago(50));

        let tree = SourceTree::load(&a, &ImportResolver::default()).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.last_modified_including_imports(), modified_time(&b).unwrap());
        assert_eq!(tree.normalized_content(), "\n.b {}\n.a {}");
        assert_eq!(tree.walk().count(), 3);
    }

    #[test]
    fn test_touching_an_import_raises_staleness_value() {
        let temp = TempDir::new().unwrap();
        let root = write(temp.path(), "main.less", "@import \"a\";");
        let a = write(temp.path(), "a.less", "");
        set_mtime(&root, ago(100));
        set_mtime(&a, ago(100));
        let before = SourceTree::load(&root, &ImportResolver::default())
            .unwrap()
            .last_modified_including_imports();

        set_mtime(&a, ago(1));
        let after = SourceTree::load(&root, &ImportResolver::default())
            .unwrap()
            .last_modified_including_imports();
        assert!(after > before);
    }

    #[test]
    fn test_shared_imports_are_evaluated_once() {
        let temp = TempDir::new().unwrap();
        let layers = 40;
        for layer in 0..layers {
            let body = if layer + 1 == layers {
                String::new()
            } else {
                format!("@import \"l{0}a\";\n@import \"l{0}b\";\n", layer + 1)
            };
            let a = write(temp.path(), &format!("l{}a.less", layer), &body);
            let b = write(temp.path(), &format!("l{}b.less", layer), &body);
            set_mtime(&a, ago(100));
            set_mtime(&b, ago(100));
        }
        let deepest = temp.path().join(format!("l{}b.less", layers - 1));
        set_mtime(&deepest, ago(5));

        let tree = SourceTree::load(&temp.path().join("l0a.less"), &ImportResolver::default()).unwrap();
        assert_eq!(tree.len(), 2 * layers - 1);
        assert_eq!(tree.last_modified_including_imports(), modified_time(&deepest).unwrap());
    }

    #[test]
    fn test_normalized_content_inlines_each_file_once() {
        let temp = TempDir::new().unwrap();
        let root = write(
            temp.path(),
            "main.less",
            "@import \"vars\";\n@import \"print.css\";\n@import \"vars\";\n.main {}",
        );
        write(temp.path(), "vars.less", "@c: red;");

        let tree = SourceTree::load(&root, &ImportResolver::default()).unwrap();
        assert_eq!(tree.normalized_content(), "@c: red;\n@import \"print.css\";\n\n.main {}");
    }

    #[test]
    fn test_output_is_stale() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("out.css");
        assert!(output_is_stale(&output, ago(10), false));

        fs::write(&output, "x").unwrap();
        set_mtime(&output, ago(5));
        assert!(!output_is_stale(&output, ago(10), false));
        assert!(output_is_stale(&output, ago(1), false));
        assert!(output_is_stale(&output, ago(10), true));
    }

    #[test]
    fn test_walk_and_render_tree() {
        let temp = TempDir::new().unwrap();
        let root = write(temp.path(), "main.less", "@import \"a\";\n@import \"b\";");
        write(temp.path(), "a.less", "@import \"c\";");
        write(temp.path(), "b.less", "");
        write(temp.path(), "c.less", "");

        let tree = SourceTree::load(&root, &ImportResolver::default()).unwrap();
        let entries: Vec<_> =
            tree.walk().map(|e| (e.depth, e.is_last, e.reference.unwrap_or("<root>"))).collect();
        assert_eq!(
            entries,
            vec![(0, true, "<root>"), (1, false, "a"), (2, true, "c"), (1, true, "b")]
        );

        assert_eq!(
            render_tree(&tree, "main.less"),
            vec!["main.less", "|-- a", "|   `-- c", "`-- b"]
        );
    }
}
