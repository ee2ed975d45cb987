use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use hoard_types::{DFile, Hash, Hour};
use serde::{Deserialize, Serialize};

/// Deepest manifest tree kept inside an archive. Deeper provenance is
/// folded into the node at this level.
pub const MAX_MANIFEST_DEPTH: usize = 32;

/// Provenance record embedded in every archive.
///
/// Manifests form a tree: a freshly packed archive is a leaf listing the
/// downloads it incorporated, and each merge adds a node whose children are
/// the manifests of the archives it consumed. The DFile set described by a
/// node is
///
/// ```text
/// (union of children's sets) + source_downloads - missing_downloads
/// ```
///
/// All traversals are iterative.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Manifest {
    pub hash: Hash,
    pub hour: Hour,
    pub assembler: String,
    pub assembly_time: DateTime<Utc>,
    #[serde(default)]
    pub source_archives: Vec<Manifest>,
    #[serde(default)]
    pub source_downloads: Vec<DFile>,
    #[serde(default)]
    pub missing_downloads: Vec<DFile>,
}

enum Visit<'a> {
    Enter(&'a Manifest),
    Exit(&'a Manifest),
}

impl Manifest {
    /// Every DFile this manifest accounts for.
    pub fn dfiles(&self) -> BTreeSet<DFile> {
        let mut stack = vec![Visit::Enter(self)];
        // Completed child sets; a node's children sit on top when it exits.
        let mut done: Vec<BTreeSet<DFile>> = Vec::new();
        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Enter(node) => {
                    stack.push(Visit::Exit(node));
                    stack.extend(node.source_archives.iter().rev().map(Visit::Enter));
                }
                Visit::Exit(node) => {
                    let split = done.len().saturating_sub(node.source_archives.len());
                    let mut set = BTreeSet::new();
                    for child in done.drain(split..) {
                        set.extend(child);
                    }
                    set.extend(node.source_downloads.iter().cloned());
                    for missing in &node.missing_downloads {
                        set.remove(missing);
                    }
                    done.push(set);
                }
            }
        }
        done.pop().unwrap_or_default()
    }

    /// Number of levels in the tree; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1)];
        while let Some((node, level)) = stack.pop() {
            deepest = deepest.max(level);
            stack.extend(node.source_archives.iter().map(|child| (child, level + 1)));
        }
        deepest
    }

    /// Total number of manifests in the tree.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.source_archives.iter());
        }
        count
    }

    /// Fold every subtree below `max_depth` into its parent so that the tree
    /// is at most `max_depth` levels deep. The DFile set is unchanged.
    pub fn collapse_to_depth(&mut self, max_depth: usize) {
        let max_depth = max_depth.max(1);
        let mut stack = vec![(self, 1)];
        while let Some((node, level)) = stack.pop() {
            if level >= max_depth && !node.source_archives.is_empty() {
                let all = node.dfiles();
                node.source_archives.clear();
                node.source_downloads = all.into_iter().collect();
                continue;
            }
            let Manifest {
                source_archives, ..
            } = node;
            stack.extend(source_archives.iter_mut().map(|child| (child, level + 1)));
        }
    }
}
