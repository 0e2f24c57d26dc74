use crate::arena::{Entry, TypedArena};
use crate::error::{Error, Result};
use crate::red_black_tree::node::{Color, Link, Node, Side};
use log::{debug, trace};
use std::cmp::Ordering;
use std::ops::Index;

const DEFAULT_CHUNK_SIZE: usize = 256;

/// A handle to a node of a `RedBlackTree<T>`.
///
/// Handles stay valid until the node they name is erased or the tree is cleared. A handle to an
/// erased node is rejected by every method that accepts one, even if its slot has been reused.
///
/// A handle is only meaningful for the tree that issued it. A handle from another tree is not
/// detected: if it happens to match a live slot it names an unrelated node of this tree.
pub type Handle = Entry;

/// An ordered container implemented using a red black tree with parent links.
///
/// A red black tree is a self-balancing binary search tree where every node is colored red or
/// black. The root is black, no red node has a red child, and every path from a node down to a
/// leaf passes through the same number of black nodes, so the height of the tree stays
/// logarithmic in its size.
///
/// Nodes are stored in a `TypedArena` and refer to each other by `Handle`. Duplicate keys are
/// allowed and are placed after equal keys.
///
/// # Examples
///
/// ```
/// use red_black_tree::red_black_tree::RedBlackTree;
///
/// let mut tree = RedBlackTree::new();
/// for key in &[5, 3, 8, 1, 4] {
///     tree.insert(*key).unwrap();
/// }
///
/// let min = tree.min().unwrap();
/// assert_eq!(tree[min], 1);
///
/// let handle = tree.find(&3).unwrap();
/// assert_eq!(tree.erase(handle), Some(3));
/// assert_eq!(tree.erase(handle), None);
///
/// let mut buffer = [0; 8];
/// assert_eq!(tree.to_array(&mut buffer), 4);
/// assert_eq!(&buffer[..4], &[1, 4, 5, 8]);
/// ```
pub struct RedBlackTree<T> {
    arena: TypedArena<Node<T>>,
    root: Link,
    len: usize,
    cmp: fn(&T, &T) -> Ordering,
}

impl<T> RedBlackTree<T> {
    /// Constructs a new, empty `RedBlackTree<T>` ordered by `T`'s `Ord` implementation.
    ///
    /// # Examples
    ///
    /// ```
    /// use red_black_tree::red_black_tree::RedBlackTree;
    ///
    /// let tree: RedBlackTree<u32> = RedBlackTree::new();
    /// assert!(tree.is_empty());
    /// ```
    pub fn new() -> Self
    where
        T: Ord,
    {
        Self::with_chunk_size_and_comparator(DEFAULT_CHUNK_SIZE, <T as Ord>::cmp)
    }

    /// Constructs a new, empty `RedBlackTree<T>` that allocates `chunk_size` nodes at a time.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    pub fn with_chunk_size(chunk_size: usize) -> Self
    where
        T: Ord,
    {
        Self::with_chunk_size_and_comparator(chunk_size, <T as Ord>::cmp)
    }

    /// Constructs a new, empty `RedBlackTree<T>` ordered by a caller-supplied comparator.
    ///
    /// # Examples
    ///
    /// ```
    /// use red_black_tree::red_black_tree::RedBlackTree;
    ///
    /// let mut tree = RedBlackTree::with_comparator(|a: &i32, b: &i32| b.cmp(a));
    /// tree.insert(1).unwrap();
    /// tree.insert(2).unwrap();
    /// assert_eq!(tree.to_vec(), vec![2, 1]);
    /// ```
    pub fn with_comparator(cmp: fn(&T, &T) -> Ordering) -> Self {
        Self::with_chunk_size_and_comparator(DEFAULT_CHUNK_SIZE, cmp)
    }

    /// Constructs a new, empty `RedBlackTree<T>` with both a chunk size and a comparator.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    pub fn with_chunk_size_and_comparator(chunk_size: usize, cmp: fn(&T, &T) -> Ordering) -> Self {
        RedBlackTree {
            arena: TypedArena::new(chunk_size),
            root: None,
            len: 0,
            cmp,
        }
    }

    fn is_red(&self, link: Link) -> bool {
        link.map_or(false, |entry| self.arena[entry].is_red())
    }

    fn set_color(&mut self, link: Link, color: Color) {
        if let Some(entry) = link {
            self.arena[entry].color = color;
        }
    }

    fn side_of(&self, child: Link, parent: Entry) -> Side {
        if self.arena[parent].left == child {
            Side::Left
        } else {
            Side::Right
        }
    }

    fn replace_child(&mut self, parent: Link, old_child: Entry, new_child: Link) {
        match parent {
            None => self.root = new_child,
            Some(parent) => {
                let side = self.side_of(Some(old_child), parent);
                self.arena[parent].set_child(side, new_child);
            },
        }
    }

    fn subtree_min(&self, mut entry: Entry) -> Entry {
        while let Some(left) = self.arena[entry].left {
            entry = left;
        }
        entry
    }

    fn subtree_max(&self, mut entry: Entry) -> Entry {
        while let Some(right) = self.arena[entry].right {
            entry = right;
        }
        entry
    }

    fn rotate_left(&mut self, x: Entry) {
        let y = self.arena[x]
            .right
            .expect("Expected right child node to be `Some`.");
        let middle = self.arena[y].left;
        self.arena[x].right = middle;
        if let Some(middle) = middle {
            self.arena[middle].parent = Some(x);
        }

        let parent = self.arena[x].parent;
        self.arena[y].parent = parent;
        self.replace_child(parent, x, Some(y));

        self.arena[y].left = Some(x);
        self.arena[x].parent = Some(y);
    }

    fn rotate_right(&mut self, x: Entry) {
        let y = self.arena[x]
            .left
            .expect("Expected left child node to be `Some`.");
        let middle = self.arena[y].right;
        self.arena[x].left = middle;
        if let Some(middle) = middle {
            self.arena[middle].parent = Some(x);
        }

        let parent = self.arena[x].parent;
        self.arena[y].parent = parent;
        self.replace_child(parent, x, Some(y));

        self.arena[y].right = Some(x);
        self.arena[x].parent = Some(y);
    }

    // Rotates `x` down towards `side`.
    fn rotate(&mut self, x: Entry, side: Side) {
        trace!("Rotating {:?} {:?}.", x, side);
        match side {
            Side::Left => self.rotate_left(x),
            Side::Right => self.rotate_right(x),
        }
    }

    fn red_parent(&self, entry: Entry) -> Link {
        self.arena[entry]
            .parent
            .filter(|parent| self.arena[*parent].is_red())
    }

    fn insert_fixup(&mut self, mut z: Entry) {
        while let Some(mut parent) = self.red_parent(z) {
            // a red node is never the root
            let grandparent = self.arena[parent]
                .parent
                .expect("Expected red node to have a parent.");
            let side = self.side_of(Some(parent), grandparent);
            let uncle = self.arena[grandparent].child(side.opposite());

            if self.is_red(uncle) {
                trace!("Insert fixup: recoloring around red uncle.");
                self.set_color(Some(parent), Color::Black);
                self.set_color(uncle, Color::Black);
                self.set_color(Some(grandparent), Color::Red);
                z = grandparent;
            } else {
                if self.arena[parent].child(side.opposite()) == Some(z) {
                    trace!("Insert fixup: straightening inner child.");
                    self.rotate(parent, side);
                    z = parent;
                    parent = self.arena[z]
                        .parent
                        .expect("Expected rotated node to have a parent.");
                }
                trace!("Insert fixup: rotating grandparent.");
                self.set_color(Some(parent), Color::Black);
                self.set_color(Some(grandparent), Color::Red);
                self.rotate(grandparent, side.opposite());
            }
        }
        self.set_color(self.root, Color::Black);
    }

    /// Inserts a key into the tree and returns a handle to its node. Keys equal to an existing
    /// key are placed after it in order.
    ///
    /// Returns `Error::OutOfMemory` if a node could not be allocated, in which case the tree is
    /// left unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use red_black_tree::red_black_tree::RedBlackTree;
    ///
    /// let mut tree = RedBlackTree::new();
    /// let handle = tree.insert(1).unwrap();
    /// assert_eq!(tree.get(handle), Some(&1));
    /// ```
    pub fn insert(&mut self, key: T) -> Result<Handle> {
        let mut parent = None;
        let mut side = Side::Left;
        let mut curr = self.root;
        while let Some(entry) = curr {
            parent = curr;
            side = match (self.cmp)(&key, &self.arena[entry].key) {
                Ordering::Less => Side::Left,
                _ => Side::Right,
            };
            curr = self.arena[entry].child(side);
        }

        let z = self.arena.allocate(Node::new(key, parent))?;
        match parent {
            None => self.root = Some(z),
            Some(parent) => self.arena[parent].set_child(side, Some(z)),
        }
        self.len += 1;

        self.insert_fixup(z);
        Ok(z)
    }

    // Replaces the subtree rooted at `u` with the subtree rooted at `v`. The children of `u` are
    // left untouched.
    fn transplant(&mut self, u: Entry, v: Link) {
        let parent = self.arena[u].parent;
        self.replace_child(parent, u, v);
        if let Some(v) = v {
            self.arena[v].parent = parent;
        }
    }

    // `x` carries one extra black. `parent` is tracked separately because `x` may be nil.
    fn erase_fixup(&mut self, mut x: Link, mut parent: Link) {
        while x != self.root && !self.is_red(x) {
            let p = parent.expect("Expected a non-root node to have a parent.");
            let side = self.side_of(x, p);
            let mut sibling = self.arena[p]
                .child(side.opposite())
                .expect("Expected a doubly black node to have a sibling.");

            if self.arena[sibling].is_red() {
                trace!("Erase fixup: rotating red sibling.");
                self.set_color(Some(sibling), Color::Black);
                self.set_color(Some(p), Color::Red);
                self.rotate(p, side);
                sibling = self.arena[p]
                    .child(side.opposite())
                    .expect("Expected a doubly black node to have a sibling.");
            }

            let near = self.arena[sibling].child(side);
            let far = self.arena[sibling].child(side.opposite());
            if !self.is_red(near) && !self.is_red(far) {
                trace!("Erase fixup: pushing extra black up.");
                self.set_color(Some(sibling), Color::Red);
                x = Some(p);
                parent = self.arena[p].parent;
            } else {
                if !self.is_red(far) {
                    trace!("Erase fixup: rotating red near nephew outwards.");
                    self.set_color(near, Color::Black);
                    self.set_color(Some(sibling), Color::Red);
                    self.rotate(sibling, side.opposite());
                    sibling = self.arena[p]
                        .child(side.opposite())
                        .expect("Expected a doubly black node to have a sibling.");
                }
                trace!("Erase fixup: rotating parent towards doubly black node.");
                let parent_color = self.arena[p].color;
                self.set_color(Some(sibling), parent_color);
                self.set_color(Some(p), Color::Black);
                let far = self.arena[sibling].child(side.opposite());
                self.set_color(far, Color::Black);
                self.rotate(p, side);
                x = self.root;
                parent = None;
            }
        }
        self.set_color(x, Color::Black);
    }

    /// Removes the node named by `handle` from the tree and returns its key. Returns `None` and
    /// leaves the tree untouched if the handle does not name a live node.
    ///
    /// Every other handle into the tree stays valid. `handle` must have been issued by this tree;
    /// a handle from another tree that matches a live slot here erases whatever node occupies it.
    ///
    /// # Examples
    ///
    /// ```
    /// use red_black_tree::red_black_tree::RedBlackTree;
    ///
    /// let mut tree = RedBlackTree::new();
    /// let handle = tree.insert(1).unwrap();
    /// assert_eq!(tree.erase(handle), Some(1));
    /// assert_eq!(tree.erase(handle), None);
    /// ```
    pub fn erase(&mut self, handle: Handle) -> Option<T> {
        let (left, right, color, node_parent) = match self.arena.get(&handle) {
            Some(node) => (node.left, node.right, node.color, node.parent),
            None => {
                debug!("Ignoring erase of unknown handle {:?}.", handle);
                return None;
            },
        };

        let mut removed_color = color;
        let x;
        let x_parent;
        match (left, right) {
            (None, _) => {
                x = right;
                x_parent = node_parent;
                self.transplant(handle, right);
            },
            (_, None) => {
                x = left;
                x_parent = node_parent;
                self.transplant(handle, left);
            },
            (Some(left), Some(right)) => {
                // the successor takes the place of the erased node, its own slot is closed up
                let successor = self.subtree_min(right);
                removed_color = self.arena[successor].color;
                x = self.arena[successor].right;
                if successor == right {
                    x_parent = Some(successor);
                } else {
                    x_parent = self.arena[successor].parent;
                    self.transplant(successor, x);
                    self.arena[successor].right = Some(right);
                    self.arena[right].parent = Some(successor);
                }
                self.transplant(handle, Some(successor));
                self.arena[successor].left = Some(left);
                self.arena[left].parent = Some(successor);
                self.arena[successor].color = color;
            },
        }

        if removed_color == Color::Black {
            self.erase_fixup(x, x_parent);
        }
        self.len -= 1;
        Some(self.arena.free(&handle).key)
    }

    /// Returns a handle to a node whose key equals `key`, or `None` if there is no such node. If
    /// the tree holds duplicates of `key`, the first one met on the way down from the root is
    /// returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use red_black_tree::red_black_tree::RedBlackTree;
    ///
    /// let mut tree = RedBlackTree::new();
    /// tree.insert(1).unwrap();
    /// assert!(tree.find(&1).is_some());
    /// assert!(tree.find(&2).is_none());
    /// ```
    pub fn find(&self, key: &T) -> Option<Handle> {
        let mut curr = self.root;
        while let Some(entry) = curr {
            let node = &self.arena[entry];
            curr = match (self.cmp)(key, &node.key) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return Some(entry),
            };
        }
        None
    }

    /// Removes a node whose key equals `key` and returns its key. Returns `None` if there is no
    /// such node.
    pub fn remove(&mut self, key: &T) -> Option<T> {
        self.find(key).and_then(|handle| self.erase(handle))
    }

    /// Checks if a key exists in the tree.
    pub fn contains(&self, key: &T) -> bool {
        self.find(key).is_some()
    }

    /// Returns the key stored in the node named by `handle`, or `None` if the handle does not name
    /// a live node.
    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.arena.get(&handle).map(|node| &node.key)
    }

    /// Returns a handle to the node with the minimum key, or `None` if the tree is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use red_black_tree::red_black_tree::RedBlackTree;
    ///
    /// let mut tree = RedBlackTree::new();
    /// assert_eq!(tree.min(), None);
    /// tree.insert(3).unwrap();
    /// tree.insert(1).unwrap();
    /// assert_eq!(tree.min().and_then(|handle| tree.get(handle)), Some(&1));
    /// ```
    pub fn min(&self) -> Option<Handle> {
        self.root.map(|root| self.subtree_min(root))
    }

    /// Returns a handle to the node with the maximum key, or `None` if the tree is empty.
    pub fn max(&self) -> Option<Handle> {
        self.root.map(|root| self.subtree_max(root))
    }

    /// Returns the minimum key of the tree, or `None` if the tree is empty.
    pub fn min_key(&self) -> Option<&T> {
        self.min().map(|handle| &self.arena[handle].key)
    }

    /// Returns the maximum key of the tree, or `None` if the tree is empty.
    pub fn max_key(&self) -> Option<&T> {
        self.max().map(|handle| &self.arena[handle].key)
    }

    /// Returns the number of keys in the tree.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Removes every key from the tree. Children are released before their parents. All
    /// outstanding handles become invalid.
    ///
    /// # Examples
    ///
    /// ```
    /// use red_black_tree::red_black_tree::RedBlackTree;
    ///
    /// let mut tree = RedBlackTree::new();
    /// let handle = tree.insert(1).unwrap();
    /// tree.insert(2).unwrap();
    /// tree.clear();
    /// assert!(tree.is_empty());
    /// assert_eq!(tree.get(handle), None);
    /// ```
    pub fn clear(&mut self) {
        let mut released = 0;
        let mut stack: Vec<(Entry, bool)> = Vec::new();
        if let Some(root) = self.root.take() {
            stack.push((root, false));
        }
        while let Some((entry, expanded)) = stack.pop() {
            if expanded {
                self.arena.free(&entry);
                released += 1;
                continue;
            }
            stack.push((entry, true));
            let node = &self.arena[entry];
            if let Some(right) = node.right {
                stack.push((right, false));
            }
            if let Some(left) = node.left {
                stack.push((left, false));
            }
        }
        self.len = 0;
        debug!("Released {} nodes.", released);
    }

    // Visits at most `limit` keys in order and returns the number of keys visited.
    fn walk_in_order<'a, F>(&'a self, limit: usize, mut f: F) -> usize
    where
        F: FnMut(&'a T),
    {
        let mut visited = 0;
        let mut stack = Vec::new();
        let mut curr = self.root;
        while visited < limit {
            while let Some(entry) = curr {
                stack.push(entry);
                curr = self.arena[entry].left;
            }
            let entry = match stack.pop() {
                Some(entry) => entry,
                None => break,
            };
            f(&self.arena[entry].key);
            visited += 1;
            curr = self.arena[entry].right;
        }
        visited
    }

    /// Writes the keys of the tree in order into `buffer` and returns the number of keys written.
    /// If the buffer is shorter than the tree, only the smallest `buffer.len()` keys are written.
    ///
    /// # Examples
    ///
    /// ```
    /// use red_black_tree::red_black_tree::RedBlackTree;
    ///
    /// let mut tree = RedBlackTree::new();
    /// for key in &[3, 1, 2] {
    ///     tree.insert(*key).unwrap();
    /// }
    ///
    /// let mut buffer = [0; 2];
    /// assert_eq!(tree.to_array(&mut buffer), 2);
    /// assert_eq!(buffer, [1, 2]);
    /// ```
    pub fn to_array(&self, buffer: &mut [T]) -> usize
    where
        T: Clone,
    {
        let mut index = 0;
        self.walk_in_order(buffer.len(), |key| {
            buffer[index] = key.clone();
            index += 1;
        })
    }

    /// Returns every key of the tree in order.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        let mut ret = Vec::with_capacity(self.len);
        self.walk_in_order(self.len, |key| ret.push(key.clone()));
        ret
    }

    fn validate_subtree(&self, link: Link, parent: Link, count: &mut usize) -> Result<usize> {
        let entry = match link {
            Some(entry) => entry,
            None => return Ok(0),
        };
        let node = &self.arena[entry];
        if node.parent != parent {
            return Err(Error::BrokenLink);
        }
        if node.is_red() && (self.is_red(node.left) || self.is_red(node.right)) {
            return Err(Error::DoubleRed);
        }

        let left = self.validate_subtree(node.left, link, count)?;
        let right = self.validate_subtree(node.right, link, count)?;
        if left != right {
            return Err(Error::BlackHeightMismatch { left, right });
        }
        *count += 1;
        Ok(if node.is_red() { left } else { left + 1 })
    }

    /// Checks every structural invariant of the tree and returns the black height of the root.
    ///
    /// # Examples
    ///
    /// ```
    /// use red_black_tree::red_black_tree::RedBlackTree;
    ///
    /// let mut tree = RedBlackTree::new();
    /// assert_eq!(tree.validate(), Ok(0));
    /// tree.insert(1).unwrap();
    /// assert_eq!(tree.validate(), Ok(1));
    /// ```
    pub fn validate(&self) -> Result<usize> {
        if self.is_red(self.root) {
            return Err(Error::RedRoot);
        }

        let mut count = 0;
        let black_height = self.validate_subtree(self.root, None, &mut count)?;
        if count != self.len {
            return Err(Error::LengthMismatch {
                expected: self.len,
                actual: count,
            });
        }
        // nodes allocated but unreachable from the root
        if self.arena.len() != self.len {
            return Err(Error::LengthMismatch {
                expected: self.len,
                actual: self.arena.len(),
            });
        }

        let mut prev: Option<&T> = None;
        let mut in_order = true;
        self.walk_in_order(self.len, |key| {
            if let Some(prev) = prev {
                in_order &= (self.cmp)(prev, key) != Ordering::Greater;
            }
            prev = Some(key);
        });
        if !in_order {
            return Err(Error::OutOfOrder);
        }

        Ok(black_height)
    }
}

impl<T> Drop for RedBlackTree<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T> Default for RedBlackTree<T>
where
    T: Ord,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<Handle> for RedBlackTree<T> {
    type Output = T;

    fn index(&self, handle: Handle) -> &Self::Output {
        self.get(handle).expect("Error: handle does not name a live node.")
    }
}
