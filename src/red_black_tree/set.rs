use crate::error::Result;
use crate::red_black_tree::tree::RedBlackTree;

/// An ordered set of unique keys implemented using a red black tree.
///
/// # Examples
///
/// ```
/// use red_black_tree::red_black_tree::RedBlackSet;
///
/// let mut set = RedBlackSet::new();
/// set.insert(0).unwrap();
/// set.insert(3).unwrap();
///
/// assert_eq!(set.len(), 2);
/// assert_eq!(set.min(), Some(&0));
///
/// assert_eq!(set.remove(&0), Some(0));
/// assert_eq!(set.remove(&1), None);
/// ```
pub struct RedBlackSet<T> {
    tree: RedBlackTree<T>,
}

impl<T> RedBlackSet<T>
where
    T: Ord,
{
    /// Constructs a new, empty `RedBlackSet<T>`.
    ///
    /// # Examples
    ///
    /// ```
    /// use red_black_tree::red_black_tree::RedBlackSet;
    ///
    /// let set: RedBlackSet<u32> = RedBlackSet::new();
    /// ```
    pub fn new() -> Self {
        RedBlackSet {
            tree: RedBlackTree::new(),
        }
    }

    /// Inserts a key into the set. Returns `Ok(false)` and drops the key if an equal key is
    /// already present.
    ///
    /// # Examples
    ///
    /// ```
    /// use red_black_tree::red_black_tree::RedBlackSet;
    ///
    /// let mut set = RedBlackSet::new();
    /// assert_eq!(set.insert(1), Ok(true));
    /// assert_eq!(set.insert(1), Ok(false));
    /// assert_eq!(set.len(), 1);
    /// ```
    pub fn insert(&mut self, key: T) -> Result<bool> {
        if self.tree.contains(&key) {
            return Ok(false);
        }
        self.tree.insert(key)?;
        Ok(true)
    }

    /// Removes a key from the set. If the key exists in the set, it will return the removed key.
    /// Otherwise it will return `None`.
    pub fn remove(&mut self, key: &T) -> Option<T> {
        self.tree.remove(key)
    }

    /// Checks if a key exists in the set.
    ///
    /// # Examples
    ///
    /// ```
    /// use red_black_tree::red_black_tree::RedBlackSet;
    ///
    /// let mut set = RedBlackSet::new();
    /// set.insert(1).unwrap();
    /// assert!(!set.contains(&0));
    /// assert!(set.contains(&1));
    /// ```
    pub fn contains(&self, key: &T) -> bool {
        self.tree.contains(key)
    }

    /// Returns the number of elements in the set.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns `true` if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Clears the set, removing all values.
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Returns the minimum key of the set. Returns `None` if the set is empty.
    pub fn min(&self) -> Option<&T> {
        self.tree.min_key()
    }

    /// Returns the maximum key of the set. Returns `None` if the set is empty.
    pub fn max(&self) -> Option<&T> {
        self.tree.max_key()
    }

    /// Returns every key of the set in order.
    ///
    /// # Examples
    ///
    /// ```
    /// use red_black_tree::red_black_tree::RedBlackSet;
    ///
    /// let mut set = RedBlackSet::new();
    /// set.insert(3).unwrap();
    /// set.insert(1).unwrap();
    /// assert_eq!(set.to_vec(), vec![1, 3]);
    /// ```
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.tree.to_vec()
    }
}

impl<T> Default for RedBlackSet<T>
where
    T: Ord,
{
    fn default() -> Self {
        Self::new()
    }
}
