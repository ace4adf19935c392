use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, warn};
use phylotree::tree::{NewickFormat, Tree as PhyloTree};

use crate::tree::Tree;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeFileFormat {
    Newick,
    Nexus,
}

/// Every tree read from one file.
#[derive(Debug, Clone)]
pub struct TreeBundle {
    pub format: TreeFileFormat,
    pub trees: Vec<Tree>,
}

impl TreeBundle {
    pub fn tree(&self, index: usize) -> Option<&Tree> {
        self.trees.get(index)
    }
}

pub fn load_trees(path: &Path) -> Result<TreeBundle> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read tree file: {}", path.display()))?;
    parse_trees(&raw).with_context(|| format!("failed to load trees from {}", path.display()))
}

pub fn parse_trees(raw: &str) -> Result<TreeBundle> {
    let format = detect_format(raw);
    let trees = match format {
        TreeFileFormat::Newick => parse_newick(raw)?,
        TreeFileFormat::Nexus => parse_nexus(raw)?,
    };
    if trees.is_empty() {
        bail!("tree file did not contain any trees");
    }
    debug!("Parsed {} {:?} tree(s)", trees.len(), format);
    Ok(TreeBundle { format, trees })
}

fn detect_format(raw: &str) -> TreeFileFormat {
    let first = strip_comments(raw)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_ascii_uppercase);
    match first {
        Some(line) if line.starts_with("#NEXUS") || line.starts_with("BEGIN ") => TreeFileFormat::Nexus,
        _ => TreeFileFormat::Newick,
    }
}

fn parse_newick(raw: &str) -> Result<Vec<Tree>> {
    let cleaned = strip_comments(raw);
    let mut trees = Vec::new();
    for statement in split_statements(&cleaned) {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        trees.push(build_tree(trees.len(), None, statement)?);
    }
    Ok(trees)
}

/// Reads the TREES block of a Nexus file. Malformed tree statements are
/// skipped with a warning so one bad sample does not lose the rest.
fn parse_nexus(raw: &str) -> Result<Vec<Tree>> {
    let cleaned = strip_comments(raw);
    let mut trees = Vec::new();
    let mut in_trees_block = false;
    let mut translate: HashMap<String, String> = HashMap::new();

    for statement in split_statements(&cleaned) {
        let mut words: Vec<&str> = statement.split_whitespace().collect();
        // The header carries no terminator and lands in front of the first block.
        if words.first().is_some_and(|word| word.eq_ignore_ascii_case("#NEXUS")) {
            words.remove(0);
        }
        let statement = words.join(" ");
        if statement.is_empty() {
            continue;
        }
        let upper = statement.to_ascii_uppercase();

        if upper.starts_with("BEGIN TREES") {
            in_trees_block = true;
            translate.clear();
            continue;
        }
        if upper == "END" || upper == "ENDBLOCK" {
            in_trees_block = false;
            continue;
        }
        if !in_trees_block {
            continue;
        }

        if upper.starts_with("TRANSLATE ") {
            translate = parse_translate(&statement["TRANSLATE ".len()..]);
        } else if upper.starts_with("TREE ") || upper.starts_with("UTREE ") {
            let result = split_tree_statement(&statement)
                .and_then(|(label, newick)| build_tree(trees.len(), label, &newick));
            match result {
                Ok(mut tree) => {
                    apply_translation(&mut tree, &translate);
                    trees.push(tree);
                }
                Err(err) => warn!("Skipping nexus tree statement: {err:#}"),
            }
        }
    }

    Ok(trees)
}

fn build_tree(index: usize, label: Option<String>, newick: &str) -> Result<Tree> {
    let newick = format!("{};", newick.trim().trim_end_matches(';').trim());
    let phylo = PhyloTree::from_newick(&newick)
        .map_err(|err| anyhow!("failed to parse newick tree: {err}"))?;
    let canonical = phylo
        .to_formatted_newick(NewickFormat::NoComments)
        .unwrap_or(newick);
    Ok(Tree::new(index, label, canonical, &phylo))
}

/// `TREE name = (...)` into its label and Newick body.
fn split_tree_statement(statement: &str) -> Result<(Option<String>, String)> {
    let (_, rest) = statement
        .split_once(' ')
        .ok_or_else(|| anyhow!("empty tree statement"))?;
    let (label, body) = rest
        .split_once('=')
        .ok_or_else(|| anyhow!("missing '=' in tree statement: {statement}"))?;

    let label = label
        .trim()
        .trim_start_matches('*')
        .trim()
        .trim_matches(|c| c == '\'' || c == '"');
    let label = (!label.is_empty()).then(|| label.to_string());

    let body = body.trim();
    if body.is_empty() {
        bail!("missing tree definition in statement: {statement}");
    }
    Ok((label, body.to_string()))
}

fn parse_translate(body: &str) -> HashMap<String, String> {
    body.split(',')
        .filter_map(|pair| {
            let mut parts = pair.split_whitespace();
            let key = parts.next()?;
            let value = parts.collect::<Vec<_>>().join(" ");
            let value = value.trim_matches(|c| c == '\'' || c == '"');
            (!value.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

fn apply_translation(tree: &mut Tree, translate: &HashMap<String, String>) {
    if translate.is_empty() {
        return;
    }
    for node in tree.nodes.iter_mut().filter(|node| node.is_leaf()) {
        if let Some(full) = node.name.as_ref().and_then(|name| translate.get(name)) {
            node.name = Some(full.clone());
        }
    }
}

/// Split on `;` terminators that are not inside a quoted label.
fn split_statements(text: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (idx, ch) in text.char_indices() {
        match ch {
            '\'' => quoted = !quoted,
            ';' if !quoted => {
                statements.push(&text[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    statements.push(&text[start..]);
    statements
}

/// Drop `[...]` comments, including annotations and comments spanning lines.
fn strip_comments(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut depth = 0usize;
    let mut quoted = false;
    for ch in raw.chars() {
        match ch {
            '\'' if depth == 0 => {
                quoted = !quoted;
                out.push(ch);
            }
            '[' if !quoted => depth += 1,
            ']' if !quoted && depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_format() {
        assert_eq!(detect_format("#NEXUS\nBEGIN TREES;"), TreeFileFormat::Nexus);
        assert_eq!(detect_format("   #nexus   \n"), TreeFileFormat::Nexus);
        assert_eq!(detect_format("(A:0.1,B:0.2);"), TreeFileFormat::Newick);
        assert_eq!(detect_format("[comment]\n(A,B);"), TreeFileFormat::Newick);
    }

    #[test]
    fn parses_multiple_newick_trees() {
        let bundle = parse_trees("(A:0.1,B:0.2);\n(C:0.3,(D:0.4,E:0.1));\n").unwrap();
        assert_eq!(bundle.format, TreeFileFormat::Newick);
        assert_eq!(bundle.trees.len(), 2);
        assert_eq!(bundle.trees[0].leaf_count(), 2);
        assert_eq!(bundle.trees[1].leaf_count(), 3);
        assert_eq!(bundle.tree(1).map(|t| t.id), Some(1));
    }

    #[test]
    fn parses_nexus_with_annotations_and_comments() {
        let input = "#NEXUS
[file comment
 spanning lines]
BEGIN TREES;
    TREE tree1 = [&R] ((A[&rate=0.5]:0.1,B:0.2)[&posterior=0.99]:0.3,C:0.4);
    [between trees]
    UTREE 'second tree' =
        (D:0.1,
         E:0.2);
END;";
        let bundle = parse_trees(input).unwrap();
        assert_eq!(bundle.format, TreeFileFormat::Nexus);
        assert_eq!(bundle.trees.len(), 2);
        assert_eq!(bundle.trees[0].label.as_deref(), Some("tree1"));
        assert!(!bundle.trees[0].newick.contains("[&"));
        assert_eq!(bundle.trees[0].leaf_count(), 3);
        assert_eq!(bundle.trees[1].label.as_deref(), Some("second tree"));
    }

    #[test]
    fn applies_translate_table() {
        let input = "#NEXUS
BEGIN TREES;
    TRANSLATE
        1 Homo_sapiens,
        2 'Pan troglodytes',
        3 Gorilla;
    TREE t = ((1,2),3);
END;";
        let bundle = parse_trees(input).unwrap();
        let tree = &bundle.trees[0];
        let mut names: Vec<&str> = tree
            .leaves_in_order()
            .into_iter()
            .filter_map(|id| tree.nodes[id].name.as_deref())
            .collect();
        names.sort_unstable();
        assert_eq!(names, vec!["Gorilla", "Homo_sapiens", "Pan troglodytes"]);
    }

    #[test]
    fn quoted_semicolons_do_not_end_statements() {
        let statements = split_statements("('a;b',C);\n(D,E);");
        assert_eq!(statements, vec!["('a;b',C)", "\n(D,E)", ""]);

        let input = "#NEXUS
BEGIN TREES;
    TRANSLATE 1 'Homo; sapiens', 2 Pan;
    TREE t = (1,2);
END;";
        let bundle = parse_trees(input).unwrap();
        assert_eq!(bundle.trees.len(), 1);
        let tree = &bundle.trees[0];
        assert!(tree
            .nodes
            .iter()
            .any(|node| node.name.as_deref() == Some("Homo; sapiens")));
    }

    #[test]
    fn header_on_same_line_as_first_block() {
        let bundle = parse_trees("#NEXUS begin trees; tree one = (A,B); end;").unwrap();
        assert_eq!(bundle.format, TreeFileFormat::Nexus);
        assert_eq!(bundle.trees[0].label.as_deref(), Some("one"));
    }

    #[test]
    fn skips_broken_nexus_statement() {
        let input = "#NEXUS
BEGIN TREES;
    TREE broken;
    TREE ok = (A,B);
END;";
        let bundle = parse_trees(input).unwrap();
        assert_eq!(bundle.trees.len(), 1);
        assert_eq!(bundle.trees[0].label.as_deref(), Some("ok"));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(parse_trees("").is_err());
        assert!(parse_trees("#NEXUS\nBEGIN TAXA;\nEND;").is_err());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_trees(Path::new("/nonexistent/tree.nwk")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/tree.nwk"));
    }
}
