//! Candidate forest for folder path matching
//!
//! The forest is an arena: nodes live in a `Vec`, refer to their parent by
//! index and list their children as indices. Node 0 is a synthetic root
//! with no folder. A forest is built for one resolution and then dropped.

use ahash::AHashMap;
use smallvec::SmallVec;
use vc_core::{FolderRecord, ManagedRef};

/// Index of the synthetic root node
pub const ROOT: usize = 0;

/// One placed candidate folder
#[derive(Debug, Clone)]
pub struct CandidateNode<'a> {
    /// Inventory record, `None` for the synthetic root
    pub record: Option<&'a FolderRecord>,
    pub parent: Option<usize>,
    pub children: SmallVec<[usize; 4]>,
    /// Distance from the root (the root is 0)
    pub depth: usize,
}

impl<'a> CandidateNode<'a> {
    pub fn name(&self) -> Option<&'a str> {
        self.record.map(|r| r.name.as_str())
    }
}

/// Arena of candidate chains aligned to a folder path
#[derive(Debug)]
pub struct CandidateForest<'a> {
    nodes: Vec<CandidateNode<'a>>,
}

impl<'a> CandidateForest<'a> {
    /// Place inventory records level by level
    ///
    /// Level `i` holds every record named `segments[i]`, wherever it sits in
    /// the real hierarchy. Level 0 hangs off the root. A record on a deeper
    /// level is attached to the first node of the previous level whose
    /// folder lists it as a child; records with no such parent are dropped.
    pub fn build(segments: &[String], inventory: &'a [FolderRecord]) -> Self {
        let mut forest = Self {
            nodes: vec![CandidateNode {
                record: None,
                parent: None,
                children: SmallVec::new(),
                depth: 0,
            }],
        };

        let mut previous_level: Vec<usize> = vec![ROOT];
        for (level, segment) in segments.iter().enumerate() {
            // child ref -> placed node that contains it
            let mut owners: AHashMap<&ManagedRef, usize> = AHashMap::new();
            if level > 0 {
                for &index in &previous_level {
                    if let Some(record) = forest.nodes[index].record {
                        for child in &record.children {
                            owners.entry(child).or_insert(index);
                        }
                    }
                }
            }

            let mut placed = Vec::new();
            for record in inventory.iter().filter(|r| &r.name == segment) {
                let parent = if level == 0 {
                    Some(ROOT)
                } else {
                    owners.get(&record.folder).copied()
                };
                if let Some(parent) = parent {
                    placed.push(forest.attach(parent, record));
                }
            }

            if placed.is_empty() {
                break;
            }
            previous_level = placed;
        }

        forest
    }

    fn attach(&mut self, parent: usize, record: &'a FolderRecord) -> usize {
        let index = self.nodes.len();
        let depth = self.nodes[parent].depth + 1;
        self.nodes.push(CandidateNode {
            record: Some(record),
            parent: Some(parent),
            children: SmallVec::new(),
            depth,
        });
        self.nodes[parent].children.push(index);
        index
    }

    pub fn node(&self, index: usize) -> &CandidateNode<'a> {
        &self.nodes[index]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Nodes at the greatest depth, in discovery order
    ///
    /// A forest holding only the root has no deepest candidates.
    pub fn deepest(&self) -> Vec<usize> {
        let mut best_depth = 0;
        let mut best = Vec::new();
        let mut stack = vec![ROOT];

        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if index != ROOT {
                if node.depth > best_depth {
                    best_depth = node.depth;
                    best.clear();
                }
                if node.depth == best_depth {
                    best.push(index);
                }
            }
            // Reverse so children are visited in attach order
            stack.extend(node.children.iter().rev().copied());
        }

        best
    }

    /// Display names from the root down to `index`
    pub fn chain(&self, index: usize) -> Vec<&'a str> {
        let mut names = Vec::new();
        let mut cursor = Some(index);
        while let Some(current) = cursor {
            let node = &self.nodes[current];
            if let Some(name) = node.name() {
                names.push(name);
            }
            cursor = node.parent;
        }
        names.reverse();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, name: &str, children: &[&str]) -> FolderRecord {
        FolderRecord {
            folder: ManagedRef::folder(id),
            name: name.to_string(),
            children: children.iter().map(|c| ManagedRef::folder(*c)).collect(),
            parent: None,
        }
    }

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_levels_attach_to_containing_parent() {
        let inventory = vec![
            record("f1", "prod", &["f2"]),
            record("f2", "web", &[]),
            record("f3", "web", &[]),
        ];
        let segments = path(&["prod", "web"]);
        let forest = CandidateForest::build(&segments, &inventory);

        // root, prod, and the web that prod contains
        assert_eq!(forest.len(), 3);
        let deepest = forest.deepest();
        assert_eq!(deepest.len(), 1);
        assert_eq!(forest.chain(deepest[0]), vec!["prod", "web"]);
        assert_eq!(forest.node(deepest[0]).record.unwrap().folder, ManagedRef::folder("f2"));
    }

    #[test]
    fn test_ties_are_kept() {
        let inventory = vec![
            record("a1", "prod", &["b1"]),
            record("a2", "prod", &["b2"]),
            record("b1", "web", &[]),
            record("b2", "web", &[]),
        ];
        let segments = path(&["prod", "web"]);
        let forest = CandidateForest::build(&segments, &inventory);

        assert_eq!(forest.deepest().len(), 2);
    }

    #[test]
    fn test_root_only_has_no_deepest() {
        let inventory = vec![record("f1", "other", &[])];
        let segments = path(&["prod"]);
        let forest = CandidateForest::build(&segments, &inventory);

        assert!(forest.is_empty());
        assert!(forest.deepest().is_empty());
    }

    #[test]
    fn test_partial_chain_stops_at_last_matched_level() {
        let inventory = vec![record("f1", "prod", &[]), record("f2", "db", &[])];
        let segments = path(&["prod", "web", "db"]);
        let forest = CandidateForest::build(&segments, &inventory);

        let deepest = forest.deepest();
        assert_eq!(deepest.len(), 1);
        assert_eq!(forest.chain(deepest[0]), vec!["prod"]);
    }
}
