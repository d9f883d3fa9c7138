//! Topological ordering of the modpack graph
//!
//! Modpacks reference sub-modpacks by uid. The linearizer produces an order in
//! which every modpack comes after all the modpacks it contains, so a reader
//! can rebuild the graph in a single forward pass. A modpack that contains
//! itself, directly or through others, rejects the whole graph.

use crate::core::{PackageError, Result};
use std::collections::HashMap;

/// A node of the modpack containment graph
pub trait GraphNode {
    fn uid(&self) -> u32;
    fn name(&self) -> &str;
    /// Uids of the directly contained modpacks
    fn children(&self) -> &[u32];
}

impl<T: GraphNode + ?Sized> GraphNode for &T {
    fn uid(&self) -> u32 {
        (**self).uid()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn children(&self) -> &[u32] {
        (**self).children()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Map each uid to its position, rejecting duplicates
pub fn index_by_uid<T: GraphNode>(nodes: &[T]) -> Result<HashMap<u32, usize>> {
    let mut index = HashMap::with_capacity(nodes.len());
    for (position, node) in nodes.iter().enumerate() {
        if let Some(previous) = index.insert(node.uid(), position) {
            return Err(PackageError::DuplicateModpackUid {
                uid: node.uid(),
                first: nodes[previous].name().to_string(),
                second: node.name().to_string(),
            });
        }
    }
    Ok(index)
}

/// Order `nodes` so that children precede parents
///
/// Returns positions into `nodes`. Nodes are visited in input order, so
/// unrelated modpacks keep their relative order.
pub fn linearize<T: GraphNode>(nodes: &[T]) -> Result<Vec<usize>> {
    Linearizer::new(nodes)?.run()
}

/// Traversal state for one linearization call
struct Linearizer<'a, T> {
    nodes: &'a [T],
    index: HashMap<u32, usize>,
    marks: Vec<Mark>,
    order: Vec<usize>,
}

impl<'a, T: GraphNode> Linearizer<'a, T> {
    fn new(nodes: &'a [T]) -> Result<Self> {
        Ok(Self {
            nodes,
            index: index_by_uid(nodes)?,
            marks: vec![Mark::Unvisited; nodes.len()],
            order: Vec::with_capacity(nodes.len()),
        })
    }

    fn run(mut self) -> Result<Vec<usize>> {
        for root in 0..self.nodes.len() {
            self.visit(root)?;
        }
        Ok(self.order)
    }

    /// Depth-first post-order walk from `root` with an explicit stack
    fn visit(&mut self, root: usize) -> Result<()> {
        if self.marks[root] != Mark::Unvisited {
            return Ok(());
        }

        let nodes = self.nodes;
        self.marks[root] = Mark::InProgress;
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];

        while let Some(frame) = stack.last_mut() {
            let (current, cursor) = *frame;
            let children = nodes[current].children();

            if cursor == children.len() {
                stack.pop();
                self.marks[current] = Mark::Done;
                self.order.push(current);
                continue;
            }

            frame.1 += 1;
            let child = self.position_of(children[cursor], current)?;
            match self.marks[child] {
                Mark::Done => {}
                Mark::InProgress => {
                    return Err(PackageError::ModpackCycle {
                        uid: nodes[child].uid(),
                        name: nodes[child].name().to_string(),
                    });
                }
                Mark::Unvisited => {
                    self.marks[child] = Mark::InProgress;
                    stack.push((child, 0));
                }
            }
        }

        Ok(())
    }

    fn position_of(&self, uid: u32, referenced_by: usize) -> Result<usize> {
        self.index
            .get(&uid)
            .copied()
            .ok_or_else(|| PackageError::UnknownModpack {
                uid,
                referenced_by: self.nodes[referenced_by].name().to_string(),
            })
    }
}
