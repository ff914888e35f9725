//! In-memory bookmark tree shared by every codec.
//!
//! The tree is stored as an arena: [`BookmarkTree`] owns all nodes and hands out
//! [`NodeId`] handles.  Each node owns the ordered list of its children's ids and
//! keeps a non-owning parent id, which is only used for detaching and
//! reparenting.  The synthetic root sits at level 0; every attached node has
//! `level == parent.level + 1`.

use std::fmt;
use std::ops::Index;

/// Title carried by the synthetic root node.
pub const ROOT_TITLE: &str = "Root";

/// Handle to a node stored in a [`BookmarkTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// A titled entry of the table of contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookmarkNode {
    title: String,
    page_num: Option<u32>,
    level: u32,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl BookmarkNode {
    fn new(title: impl Into<String>, page_num: Option<u32>, level: u32) -> Self {
        Self {
            title: title.into(),
            page_num,
            level,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Returns the bookmark title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the one-based target page, if the bookmark has a destination.
    pub fn page_num(&self) -> Option<u32> {
        self.page_num
    }

    /// Returns the nesting level (1 = top-level, 0 = root).
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Returns the parent node, or `None` for the root and detached nodes.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Returns the children in display order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Errors reported by structural tree edits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeError {
    /// The operation is not allowed on the root node.
    RootNode,
    /// The node is already attached somewhere else.
    AlreadyAttached(NodeId),
    /// The child level does not equal `parent.level + 1`.
    LevelMismatch {
        /// Level of the prospective parent.
        parent_level: u32,
        /// Level carried by the child.
        child_level: u32,
    },
    /// Reparenting would make a node its own ancestor.
    Cycle(NodeId),
    /// The node has no parent, so it has no siblings and nothing to detach from.
    Detached(NodeId),
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootNode => write!(f, "the root bookmark cannot be moved or removed"),
            Self::AlreadyAttached(id) => write!(f, "bookmark {:?} already has a parent", id),
            Self::LevelMismatch {
                parent_level,
                child_level,
            } => write!(
                f,
                "a level {} bookmark cannot be a child of a level {} bookmark",
                child_level, parent_level
            ),
            Self::Cycle(id) => write!(
                f,
                "bookmark {:?} cannot be moved below one of its own descendants",
                id
            ),
            Self::Detached(id) => write!(f, "bookmark {:?} is not attached to the tree", id),
        }
    }
}

impl std::error::Error for TreeError {}

/// Ordered tree of bookmarks with a synthetic level-0 root.
#[derive(Clone, Debug)]
pub struct BookmarkTree {
    nodes: Vec<BookmarkNode>,
}

impl Default for BookmarkTree {
    fn default() -> Self {
        Self::new()
    }
}

impl BookmarkTree {
    /// Creates a tree holding only the root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![BookmarkNode::new(ROOT_TITLE, None, 0)],
        }
    }

    /// Returns the id of the root node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Returns the node behind `id`, if it belongs to this tree.
    pub fn get(&self, id: NodeId) -> Option<&BookmarkNode> {
        self.nodes.get(id.0)
    }

    /// Returns the children of `id` in display order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self[id].children
    }

    /// Returns the parent of `id`.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self[id].parent
    }

    /// Creates a detached node.  Attach it with [`BookmarkTree::add_child`].
    pub fn create_node(
        &mut self,
        title: impl Into<String>,
        page_num: Option<u32>,
        level: u32,
    ) -> NodeId {
        self.nodes.push(BookmarkNode::new(title, page_num, level));
        NodeId(self.nodes.len() - 1)
    }

    /// Creates a node one level below `parent` and appends it to its children.
    pub fn append(
        &mut self,
        parent: NodeId,
        title: impl Into<String>,
        page_num: Option<u32>,
    ) -> NodeId {
        let level = self[parent].level + 1;
        let child = self.create_node(title, page_num, level);
        self.attach(parent, child);
        child
    }

    /// Appends the detached node `child` to the children of `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        if child == self.root() {
            return Err(TreeError::RootNode);
        }
        if self[child].parent.is_some() {
            return Err(TreeError::AlreadyAttached(child));
        }
        let parent_level = self[parent].level;
        let child_level = self[child].level;
        if child_level != parent_level + 1 {
            return Err(TreeError::LevelMismatch {
                parent_level,
                child_level,
            });
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(TreeError::Cycle(child));
        }
        self.attach(parent, child);
        Ok(())
    }

    /// Moves `node` (with its subtree) to the end of `new_parent`'s children.
    ///
    /// Levels of the moved subtree are recomputed from the new position.
    pub fn set_parent(&mut self, node: NodeId, new_parent: NodeId) -> Result<(), TreeError> {
        if node == self.root() {
            return Err(TreeError::RootNode);
        }
        if self.is_ancestor_or_self(node, new_parent) {
            return Err(TreeError::Cycle(node));
        }
        self.detach(node);
        self.attach(new_parent, node);
        self.relevel(node, self[new_parent].level + 1);
        Ok(())
    }

    /// Moves `node` to position `index` among its siblings.
    ///
    /// Indices past the end place the node last.
    pub fn move_to(&mut self, node: NodeId, index: usize) -> Result<(), TreeError> {
        let parent = self.attached_parent(node)?;
        let siblings = &mut self.nodes[parent.0].children;
        if let Some(position) = siblings.iter().position(|&id| id == node) {
            siblings.remove(position);
        }
        let index = index.min(siblings.len());
        siblings.insert(index, node);
        Ok(())
    }

    /// Detaches `node` and its subtree from the tree.
    ///
    /// The node stays in the arena, so its id remains valid.
    pub fn remove(&mut self, node: NodeId) -> Result<(), TreeError> {
        self.attached_parent(node)?;
        self.detach(node);
        Ok(())
    }

    /// Iterates over the attached nodes in pre-order, skipping the root.
    pub fn iter(&self) -> PreOrder<'_> {
        let mut stack: Vec<NodeId> = self.children(self.root()).to_vec();
        stack.reverse();
        PreOrder { tree: self, stack }
    }

    /// Number of attached nodes, not counting the root.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Returns `true` when the root has no children.
    pub fn is_empty(&self) -> bool {
        self.children(self.root()).is_empty()
    }

    fn attached_parent(&self, node: NodeId) -> Result<NodeId, TreeError> {
        match self[node].parent {
            Some(parent) => Ok(parent),
            None if node == self.root() => Err(TreeError::RootNode),
            None => Err(TreeError::Detached(node)),
        }
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|&id| id != node);
        }
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self[id].parent;
        }
        false
    }

    fn relevel(&mut self, node: NodeId, level: u32) {
        let mut pending = vec![(node, level)];
        while let Some((id, level)) = pending.pop() {
            self.nodes[id.0].level = level;
            pending.extend(self.nodes[id.0].children.iter().map(|&child| (child, level + 1)));
        }
    }
}

impl Index<NodeId> for BookmarkTree {
    type Output = BookmarkNode;

    fn index(&self, id: NodeId) -> &BookmarkNode {
        &self.nodes[id.0]
    }
}

/// Pre-order walk over the attached nodes of a [`BookmarkTree`].
pub struct PreOrder<'a> {
    tree: &'a BookmarkTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack.extend(self.tree.children(id).iter().rev().copied());
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (BookmarkTree, NodeId, NodeId, NodeId) {
        let mut tree = BookmarkTree::new();
        let root = tree.root();
        let first = tree.append(root, "First", Some(1));
        let second = tree.append(root, "Second", Some(5));
        let nested = tree.append(first, "Nested", Some(2));
        (tree, first, second, nested)
    }

    fn titles(tree: &BookmarkTree) -> Vec<&str> {
        tree.iter().map(|id| tree[id].title()).collect()
    }

    #[test]
    fn append_assigns_levels_and_parent() {
        let (tree, first, _, nested) = sample();
        assert_eq!(tree[first].level(), 1);
        assert_eq!(tree[nested].level(), 2);
        assert_eq!(tree.parent(nested), Some(first));
        assert_eq!(titles(&tree), vec!["First", "Nested", "Second"]);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn add_child_rejects_level_mismatch() {
        let mut tree = BookmarkTree::new();
        let orphan = tree.create_node("Deep", None, 3);
        let err = tree.add_child(tree.root(), orphan).unwrap_err();
        assert_eq!(
            err,
            TreeError::LevelMismatch {
                parent_level: 0,
                child_level: 3
            }
        );
        assert!(tree.is_empty());
    }

    #[test]
    fn move_to_reorders_without_touching_subtree() {
        let (mut tree, first, second, nested) = sample();
        tree.move_to(first, 1).expect("move succeeds");

        assert_eq!(tree.children(tree.root()), &[second, first]);
        assert_eq!(tree[first].level(), 1);
        assert_eq!(tree.children(first), &[nested]);
    }

    #[test]
    fn move_to_clamps_large_index() {
        let (mut tree, first, second, _) = sample();
        tree.move_to(first, 99).expect("move succeeds");
        assert_eq!(tree.children(tree.root()), &[second, first]);
    }

    #[test]
    fn root_cannot_be_moved_or_removed() {
        let (mut tree, ..) = sample();
        let root = tree.root();
        assert_eq!(tree.move_to(root, 0), Err(TreeError::RootNode));
        assert_eq!(tree.remove(root), Err(TreeError::RootNode));
        assert_eq!(tree.set_parent(root, root), Err(TreeError::RootNode));
    }

    #[test]
    fn remove_detaches_subtree() {
        let (mut tree, first, second, _) = sample();
        tree.remove(first).expect("remove succeeds");
        assert_eq!(titles(&tree), vec!["Second"]);
        assert_eq!(tree.parent(first), None);
        assert_eq!(tree.children(tree.root()), &[second]);
    }

    #[test]
    fn detached_nodes_cannot_be_moved_or_removed_again() {
        let (mut tree, first, _, nested) = sample();
        tree.remove(first).expect("remove succeeds");

        assert_eq!(tree.remove(first), Err(TreeError::Detached(first)));
        assert_eq!(tree.move_to(first, 0), Err(TreeError::Detached(first)));
        assert_eq!(
            TreeError::Detached(first).to_string(),
            format!("bookmark {:?} is not attached to the tree", first)
        );
        tree.remove(nested).expect("subtree stays intact");
        assert!(tree.children(first).is_empty());
    }

    #[test]
    fn set_parent_moves_and_relevels() {
        let (mut tree, first, second, nested) = sample();
        tree.set_parent(first, second).expect("reparent succeeds");

        assert_eq!(tree.children(tree.root()), &[second]);
        assert_eq!(tree.children(second), &[first]);
        assert_eq!(tree[first].level(), 2);
        assert_eq!(tree[nested].level(), 3);
    }

    #[test]
    fn set_parent_rejects_cycles() {
        let (mut tree, first, _, nested) = sample();
        assert_eq!(tree.set_parent(first, nested), Err(TreeError::Cycle(first)));
        assert_eq!(tree.set_parent(first, first), Err(TreeError::Cycle(first)));
        assert_eq!(tree.parent(first), Some(tree.root()));
    }
}
