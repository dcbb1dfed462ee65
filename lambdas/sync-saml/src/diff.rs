use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::metadata::{Element, Node};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Edit {
    InsertNode { parent: String, position: usize },
    DeleteNode { path: String },
    RenameNode { path: String, name: String },
    InsertAttribute { path: String, name: String, value: String },
    DeleteAttribute { path: String, name: String },
    UpdateAttribute { path: String, name: String, value: String },
    UpdateText { path: String, text: String },
    MoveNode { path: String, position: usize },
}

impl Edit {
    pub fn is_move(&self) -> bool {
        matches!(self, Self::MoveNode { .. })
    }
}

impl fmt::Display for Edit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsertNode { parent, position } => write!(f, "insert node at {parent}[{position}]"),
            Self::DeleteNode { path } => write!(f, "delete {path}"),
            Self::RenameNode { path, name } => write!(f, "rename {path} to {name}"),
            Self::InsertAttribute { path, name, value } => {
                write!(f, "insert {path}/@{name}={value:?}")
            }
            Self::DeleteAttribute { path, name } => write!(f, "delete {path}/@{name}"),
            Self::UpdateAttribute { path, name, value } => {
                write!(f, "update {path}/@{name} to {value:?}")
            }
            Self::UpdateText { path, text } => write!(f, "update {path} to {text:?}"),
            Self::MoveNode { path, position } => write!(f, "move {path} to position {position}"),
        }
    }
}

/// Edits that turn `source` into `destination`.
pub fn diff(source: &Element, destination: &Element) -> Vec<Edit> {
    let mut edits = Vec::new();
    diff_element(source, destination, &format!("/{}", source.name), &mut edits);
    edits
}

fn diff_element(source: &Element, destination: &Element, path: &str, edits: &mut Vec<Edit>) {
    if source.name != destination.name {
        edits.push(Edit::RenameNode {
            path: path.to_owned(),
            name: destination.name.to_string(),
        });
    }

    for (name, value) in &source.attributes {
        match destination.attributes.get(name) {
            None => edits.push(Edit::DeleteAttribute {
                path: path.to_owned(),
                name: name.to_string(),
            }),
            Some(other) if other != value => edits.push(Edit::UpdateAttribute {
                path: path.to_owned(),
                name: name.to_string(),
                value: other.clone(),
            }),
            Some(_) => {}
        }
    }
    for (name, value) in &destination.attributes {
        if !source.attributes.contains_key(name) {
            edits.push(Edit::InsertAttribute {
                path: path.to_owned(),
                name: name.to_string(),
                value: value.clone(),
            });
        }
    }

    diff_children(&source.children, &destination.children, path, edits);
}

fn diff_children(source: &[Node], destination: &[Node], path: &str, edits: &mut Vec<Edit>) {
    let source_hashes: Vec<u64> = source.iter().map(subtree_hash).collect();
    let destination_hashes: Vec<u64> = destination.iter().map(subtree_hash).collect();
    let same = |s: usize, d: usize| {
        source_hashes[s] == destination_hashes[d] && source[s] == destination[d]
    };

    let (mut unmatched_source, mut unmatched_destination) =
        unaligned(source.len(), destination.len(), &same);

    // Identical subtrees that only changed position.
    unmatched_source.retain(|&s| {
        let found = unmatched_destination.iter().position(|&d| same(s, d));
        match found {
            Some(i) => {
                let d = unmatched_destination.remove(i);
                edits.push(Edit::MoveNode {
                    path: child_path(path, source, s),
                    position: d,
                });
                false
            }
            None => true,
        }
    });

    // Same kind of node, changed contents.
    unmatched_source.retain(|&s| {
        let found = unmatched_destination
            .iter()
            .position(|&d| same_kind(&source[s], &destination[d]));
        let Some(i) = found else {
            return true;
        };
        let d = unmatched_destination.remove(i);
        let child = child_path(path, source, s);
        match (&source[s], &destination[d]) {
            (Node::Element(a), Node::Element(b)) => diff_element(a, b, &child, edits),
            (_, Node::Text(text)) => edits.push(Edit::UpdateText {
                path: child,
                text: text.clone(),
            }),
            _ => unreachable!("same_kind pairs elements with elements"),
        }
        false
    });

    for s in unmatched_source {
        edits.push(Edit::DeleteNode {
            path: child_path(path, source, s),
        });
    }
    for d in unmatched_destination {
        edits.push(Edit::InsertNode {
            parent: path.to_owned(),
            position: d,
        });
    }
}

// Above this many table cells the middle is left unaligned; reorders there
// still pair up as moves.
const MAX_TABLE_CELLS: usize = 1 << 22;

/// Indices on each side left over after aligning by longest common
/// subsequence.
fn unaligned(
    source_len: usize,
    destination_len: usize,
    same: impl Fn(usize, usize) -> bool,
) -> (Vec<usize>, Vec<usize>) {
    let prefix = (0..source_len.min(destination_len))
        .take_while(|&i| same(i, i))
        .count();
    let suffix = (0..source_len.min(destination_len) - prefix)
        .take_while(|&i| same(source_len - 1 - i, destination_len - 1 - i))
        .count();
    let (source_end, destination_end) = (source_len - suffix, destination_len - suffix);
    let rows = source_end - prefix;
    let cols = destination_end - prefix;

    if rows.saturating_mul(cols) > MAX_TABLE_CELLS {
        return (
            (prefix..source_end).collect(),
            (prefix..destination_end).collect(),
        );
    }

    let mut lengths = vec![vec![0usize; cols + 1]; rows + 1];
    for r in (0..rows).rev() {
        for c in (0..cols).rev() {
            lengths[r][c] = if same(prefix + r, prefix + c) {
                lengths[r + 1][c + 1] + 1
            } else {
                lengths[r + 1][c].max(lengths[r][c + 1])
            };
        }
    }

    let mut unmatched_source = Vec::new();
    let mut unmatched_destination = Vec::new();
    let (mut r, mut c) = (0, 0);
    while r < rows && c < cols {
        if same(prefix + r, prefix + c) {
            r += 1;
            c += 1;
        } else if lengths[r + 1][c] >= lengths[r][c + 1] {
            unmatched_source.push(prefix + r);
            r += 1;
        } else {
            unmatched_destination.push(prefix + c);
            c += 1;
        }
    }
    unmatched_source.extend(prefix + r..source_end);
    unmatched_destination.extend(prefix + c..destination_end);

    (unmatched_source, unmatched_destination)
}

fn same_kind(a: &Node, b: &Node) -> bool {
    match (a, b) {
        (Node::Element(a), Node::Element(b)) => a.name == b.name,
        (Node::Text(_), Node::Text(_)) => true,
        _ => false,
    }
}

fn child_path(parent: &str, siblings: &[Node], index: usize) -> String {
    match &siblings[index] {
        Node::Element(element) => format!("{parent}/{}[{}]", element.name, index + 1),
        Node::Text(_) => format!("{parent}/text()[{}]", index + 1),
    }
}

fn subtree_hash(node: &Node) -> u64 {
    let mut hasher = DefaultHasher::new();
    node.hash(&mut hasher);
    hasher.finish()
}
