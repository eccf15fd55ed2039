//! CSR (compressed-sparse-row) adjacency lists.
//
// `offsets[i] .. offsets[i+1]` indexes the links of node `i` in `array`.
// Used for the dual graph (xadj/adjncy) and for entity connectivity.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjacencyList<T> {
    array: Vec<T>,
    offsets: Vec<usize>,
}

impl<T> AdjacencyList<T> {
    /// Build from a flat array and offsets (`offsets.len() == num_nodes + 1`).
    ///
    /// # Panics
    /// Panics if the offsets do not describe `array`.
    pub fn new(array: Vec<T>, offsets: Vec<usize>) -> Self {
        assert!(!offsets.is_empty(), "offsets must hold at least one entry");
        assert_eq!(*offsets.last().unwrap_or(&0), array.len());
        Self { array, offsets }
    }

    /// Every node has exactly `degree` links.
    pub fn regular(array: Vec<T>, degree: usize) -> Self {
        let n = if degree == 0 { 0 } else { array.len() / degree };
        let offsets = (0..=n).map(|i| i * degree).collect();
        Self { array, offsets }
    }

    pub fn from_lists<I, L>(lists: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: IntoIterator<Item = T>,
    {
        let mut array = Vec::new();
        let mut offsets = vec![0];
        for list in lists {
            array.extend(list);
            offsets.push(array.len());
        }
        Self { array, offsets }
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.offsets.len() - 1
    }

    #[inline]
    pub fn links(&self, node: usize) -> &[T] {
        &self.array[self.offsets[node]..self.offsets[node + 1]]
    }

    #[inline]
    pub fn num_links(&self, node: usize) -> usize {
        self.offsets[node + 1] - self.offsets[node]
    }

    pub fn array(&self) -> &[T] {
        &self.array
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn iter(&self) -> impl Iterator<Item = &[T]> + '_ {
        (0..self.num_nodes()).map(move |i| self.links(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_and_lists_agree() {
        let a = AdjacencyList::regular(vec![0, 1, 2, 1, 2, 3], 3);
        let b = AdjacencyList::from_lists(vec![vec![0, 1, 2], vec![1, 2, 3]]);
        assert_eq!(a, b);
        assert_eq!(a.num_nodes(), 2);
        assert_eq!(a.links(1), &[1, 2, 3]);
    }

    #[test]
    fn empty_list_has_no_nodes() {
        let a: AdjacencyList<i32> = AdjacencyList::from_lists(Vec::<Vec<i32>>::new());
        assert_eq!(a.num_nodes(), 0);
        assert_eq!(AdjacencyList::<i32>::regular(vec![], 3).num_nodes(), 0);
    }
}
