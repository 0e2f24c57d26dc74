//! Chunked node storage with generation-checked handles.

use crate::error::Result;
use log::debug;
use std::mem;
use std::ops::{Index, IndexMut};
use std::vec::Vec;

/// A handle to an object stored in a `TypedArena<T>`.
///
/// Every slot carries a generation that is bumped when its object is freed, so an `Entry` to a
/// freed object never resolves to a later object that reuses the same slot.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Entry {
    chunk_index: usize,
    block_index: usize,
    generation: u32,
}

enum Block<T> {
    Occupied { value: T, generation: u32 },
    Vacant { next: Option<Entry>, generation: u32 },
}

/// An allocator for a single type of object.
///
/// Objects are stored in fixed-size chunks, so existing objects never move when the arena grows.
/// Freed slots are kept on a free list and reused by later allocations. Growing the arena is
/// fallible: if a new chunk cannot be reserved, `allocate` returns `Error::OutOfMemory` and the
/// arena is left unchanged.
///
/// # Examples
///
/// ```
/// use red_black_tree::arena::TypedArena;
///
/// let mut arena = TypedArena::new(1024);
///
/// let x = arena.allocate(1).unwrap();
/// assert_eq!(arena[x], 1);
///
/// arena[x] += 1;
/// assert_eq!(arena[x], 2);
///
/// assert_eq!(arena.free(&x), 2);
/// assert_eq!(arena.get(&x), None);
/// ```
pub struct TypedArena<T> {
    head: Option<Entry>,
    chunks: Vec<Vec<Block<T>>>,
    chunk_size: usize,
    size: usize,
    capacity: usize,
}

impl<T> TypedArena<T> {
    fn block(&self, entry: &Entry) -> Option<&Block<T>> {
        self.chunks
            .get(entry.chunk_index)
            .and_then(|chunk| chunk.get(entry.block_index))
    }

    fn grow(&mut self) -> Result<()> {
        let mut chunk = Vec::new();
        chunk.try_reserve_exact(self.chunk_size)?;
        self.chunks.try_reserve(1)?;
        self.chunks.push(chunk);
        self.capacity += self.chunk_size;
        debug!(
            "Arena grew to {} chunks with capacity {}.",
            self.chunks.len(),
            self.capacity,
        );
        Ok(())
    }

    /// Constructs a new, empty `TypedArena<T>` with a specific number of objects per chunk.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use red_black_tree::arena::TypedArena;
    ///
    /// // creates a new TypedArena<T> that contains a maximum of 1024 u32's per chunk
    /// let arena: TypedArena<u32> = TypedArena::new(1024);
    /// ```
    pub fn new(chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "Error: chunk size must be positive.");
        TypedArena {
            head: None,
            chunks: Vec::new(),
            chunk_size,
            size: 0,
            capacity: 0,
        }
    }

    /// Allocates an object in the typed arena and returns an `Entry` that can later be used to
    /// retrieve and deallocate the object. Returns `Error::OutOfMemory` if the arena needs a new
    /// chunk and the allocation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use red_black_tree::arena::TypedArena;
    ///
    /// let mut arena = TypedArena::new(1024);
    /// let x = arena.allocate(0).unwrap();
    /// ```
    pub fn allocate(&mut self, value: T) -> Result<Entry> {
        if self.size == self.capacity {
            self.grow()?;
        }
        self.size += 1;

        match self.head.take() {
            None => {
                let chunk_count = self.chunks.len();
                let last_chunk = &mut self.chunks[chunk_count - 1];
                last_chunk.push(Block::Occupied {
                    value,
                    generation: 0,
                });
                Ok(Entry {
                    chunk_index: chunk_count - 1,
                    block_index: last_chunk.len() - 1,
                    generation: 0,
                })
            },
            Some(entry) => {
                let slot = &mut self.chunks[entry.chunk_index][entry.block_index];
                let vacant_block = mem::replace(
                    slot,
                    Block::Occupied {
                        value,
                        generation: entry.generation,
                    },
                );

                match vacant_block {
                    Block::Vacant { next, generation } => {
                        debug_assert_eq!(generation, entry.generation);
                        self.head = next;
                        Ok(entry)
                    },
                    Block::Occupied { .. } => panic!("Error: free list points to an occupied block."),
                }
            },
        }
    }

    /// Deallocates an object in the typed arena and returns the object.
    ///
    /// # Panics
    ///
    /// Panics if entry corresponds to an invalid, vacant, or previously freed value.
    ///
    /// # Examples
    ///
    /// ```
    /// use red_black_tree::arena::TypedArena;
    ///
    /// let mut arena = TypedArena::new(1024);
    /// let x = arena.allocate(0).unwrap();
    /// assert_eq!(arena.free(&x), 0);
    /// ```
    pub fn free(&mut self, entry: &Entry) -> T {
        if self.get(entry).is_none() {
            panic!("Error: attempting to free invalid block.");
        }
        let next_generation = entry.generation.wrapping_add(1);
        let old_block = mem::replace(
            &mut self.chunks[entry.chunk_index][entry.block_index],
            Block::Vacant {
                next: self.head.take(),
                generation: next_generation,
            },
        );
        match old_block {
            Block::Vacant { .. } => panic!("Error: attempting to free vacant block."),
            Block::Occupied { value, .. } => {
                self.size -= 1;
                self.head = Some(Entry {
                    chunk_index: entry.chunk_index,
                    block_index: entry.block_index,
                    generation: next_generation,
                });
                value
            },
        }
    }

    /// Returns an immutable reference to an object in the typed arena. Returns `None` if the entry
    /// does not correspond to a live object.
    ///
    /// # Examples
    ///
    /// ```
    /// use red_black_tree::arena::TypedArena;
    ///
    /// let mut arena = TypedArena::new(1024);
    /// let x = arena.allocate(0).unwrap();
    /// assert_eq!(arena.get(&x), Some(&0));
    /// ```
    pub fn get(&self, entry: &Entry) -> Option<&T> {
        match self.block(entry) {
            Some(Block::Occupied { value, generation }) if *generation == entry.generation => {
                Some(value)
            },
            _ => None,
        }
    }

    /// Returns a mutable reference to an object in the typed arena. Returns `None` if the entry
    /// does not correspond to a live object.
    ///
    /// # Examples
    ///
    /// ```
    /// use red_black_tree::arena::TypedArena;
    ///
    /// let mut arena = TypedArena::new(1024);
    /// let x = arena.allocate(0).unwrap();
    /// assert_eq!(arena.get_mut(&x), Some(&mut 0));
    /// ```
    pub fn get_mut(&mut self, entry: &Entry) -> Option<&mut T> {
        let block = self
            .chunks
            .get_mut(entry.chunk_index)
            .and_then(|chunk| chunk.get_mut(entry.block_index));
        match block {
            Some(Block::Occupied { value, generation }) if *generation == entry.generation => {
                Some(value)
            },
            _ => None,
        }
    }

    /// Returns the number of live objects in the arena.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if the arena holds no live objects.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

impl<T> Index<Entry> for TypedArena<T> {
    type Output = T;

    fn index(&self, entry: Entry) -> &Self::Output {
        self.get(&entry).expect("Error: entry out of bounds.")
    }
}

impl<T> IndexMut<Entry> for TypedArena<T> {
    fn index_mut(&mut self, entry: Entry) -> &mut Self::Output {
        self.get_mut(&entry).expect("Error: entry out of bounds.")
    }
}

#[cfg(test)]
mod tests {
    use super::Entry;
    use super::TypedArena;

    #[test]
    #[should_panic]
    fn test_new_zero_chunk_size() {
        let _arena: TypedArena<u32> = TypedArena::new(0);
    }

    #[test]
    #[should_panic]
    fn test_free_invalid_block() {
        let mut arena: TypedArena<u32> = TypedArena::new(1024);
        arena.free(&Entry {
            chunk_index: 0,
            block_index: 0,
            generation: 0,
        });
    }

    #[test]
    #[should_panic]
    fn test_free_twice() {
        let mut arena = TypedArena::new(1024);
        let entry = arena.allocate(0).unwrap();
        arena.free(&entry);
        arena.free(&entry);
    }

    #[test]
    fn test_allocate() {
        let mut arena = TypedArena::new(1024);
        assert_eq!(
            arena.allocate(0).unwrap(),
            Entry {
                chunk_index: 0,
                block_index: 0,
                generation: 0,
            },
        );
        assert_eq!(
            arena.allocate(0).unwrap(),
            Entry {
                chunk_index: 0,
                block_index: 1,
                generation: 0,
            },
        );
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_allocate_multiple_chunks() {
        let mut arena = TypedArena::new(2);
        arena.allocate(0).unwrap();
        arena.allocate(0).unwrap();
        assert_eq!(
            arena.allocate(0).unwrap(),
            Entry {
                chunk_index: 1,
                block_index: 0,
                generation: 0,
            },
        );
    }

    #[test]
    fn test_free_reuses_slot_with_new_generation() {
        let mut arena = TypedArena::new(1024);
        let entry = arena.allocate(0).unwrap();
        assert_eq!(arena.free(&entry), 0);
        assert!(arena.is_empty());

        let reused = arena.allocate(1).unwrap();
        assert_eq!(
            reused,
            Entry {
                chunk_index: 0,
                block_index: 0,
                generation: 1,
            },
        );
        assert_eq!(arena.get(&entry), None);
        assert_eq!(arena.get(&reused), Some(&1));
    }

    #[test]
    fn test_free_list_order() {
        let mut arena = TypedArena::new(4);
        let a = arena.allocate('a').unwrap();
        let b = arena.allocate('b').unwrap();
        arena.free(&a);
        arena.free(&b);

        let c = arena.allocate('c').unwrap();
        let d = arena.allocate('d').unwrap();
        assert_eq!(c.block_index, b.block_index);
        assert_eq!(d.block_index, a.block_index);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_get_invalid_block() {
        let arena: TypedArena<u32> = TypedArena::new(1024);
        assert_eq!(
            arena.get(&Entry {
                chunk_index: 0,
                block_index: 0,
                generation: 0,
            }),
            None,
        );
    }

    #[test]
    fn test_get_mut() {
        let mut arena = TypedArena::new(1024);
        let entry = arena.allocate(0).unwrap();
        *arena.get_mut(&entry).unwrap() = 1;
        assert_eq!(arena.get(&entry), Some(&1));
    }

    #[test]
    fn test_get_mut_stale_entry() {
        let mut arena = TypedArena::new(1024);
        let entry = arena.allocate(0).unwrap();
        arena.free(&entry);
        arena.allocate(5).unwrap();
        assert_eq!(arena.get_mut(&entry), None);
    }
}
