use crate::arena::Entry;

/// A link to another node in the tree. `None` stands in for the black nil leaf.
pub type Link = Option<Entry>;

/// An enum representing the color of a node in a red black tree.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Color {
    Red,
    Black,
}

/// An enum representing which child of its parent a node is.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// A struct representing an internal node of a red black tree.
pub struct Node<T> {
    pub key: T,
    pub color: Color,
    pub parent: Link,
    pub left: Link,
    pub right: Link,
}

impl<T> Node<T> {
    pub fn new(key: T, parent: Link) -> Self {
        Node {
            key,
            color: Color::Red,
            parent,
            left: None,
            right: None,
        }
    }

    pub fn is_red(&self) -> bool {
        self.color == Color::Red
    }

    pub fn child(&self, side: Side) -> Link {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub fn set_child(&mut self, side: Side, child: Link) {
        match side {
            Side::Left => self.left = child,
            Side::Right => self.right = child,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Color, Node, Side};

    #[test]
    fn test_new_node_is_red_leaf() {
        let node = Node::new(1, None);
        assert_eq!(node.color, Color::Red);
        assert!(node.is_red());
        assert_eq!(node.child(Side::Left), None);
        assert_eq!(node.child(Side::Right), None);
    }

    #[test]
    fn test_opposite() {
        assert_eq!(Side::Left.opposite(), Side::Right);
        assert_eq!(Side::Right.opposite(), Side::Left);
    }
}
