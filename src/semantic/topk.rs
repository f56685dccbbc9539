//! Bounded top-k selection and merging of partial top-k lists.
//!
//! Ranking is by similarity descending, ties broken by ascending id, so the
//! result of a search is fully determined by the store contents and query.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Search result from the similarity engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult {
    /// Vector id in the store
    pub id: usize,
    /// Cosine similarity score (-1.0 to 1.0)
    pub similarity: f32,
}

impl SearchResult {
    /// Ranking order: `Less` means `self` ranks ahead of `other`.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .similarity
            .total_cmp(&self.similarity)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Heap entry whose greatest element is the worst-ranked result,
/// so `peek()` is the eviction candidate.
#[derive(Debug, Clone, Copy)]
struct Ranked(SearchResult);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.rank_cmp(&other.0)
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Collects the `k` best results seen so far in O(log k) per push.
#[derive(Debug)]
pub struct TopK {
    k: usize,
    heap: BinaryHeap<Ranked>,
}

impl TopK {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(1024)),
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Offer a candidate; it is kept only if it ranks among the best `k`.
    pub fn push(&mut self, candidate: SearchResult) {
        if self.k == 0 {
            return;
        }

        if self.heap.len() < self.k {
            self.heap.push(Ranked(candidate));
            return;
        }

        if let Some(worst) = self.heap.peek() {
            if candidate.rank_cmp(&worst.0) == Ordering::Less {
                self.heap.pop();
                self.heap.push(Ranked(candidate));
            }
        }
    }

    /// Consume the collector, returning results best first.
    pub fn into_sorted_vec(self) -> Vec<SearchResult> {
        // ascending `Ranked` order is best first
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|r| r.0)
            .collect()
    }
}

/// Head of one partial list during a k-way merge.
#[derive(Debug)]
struct Cursor {
    head: SearchResult,
    list: usize,
    pos: usize,
}

impl PartialEq for Cursor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cursor {}

impl Ord for Cursor {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed so the max-heap pops the best-ranked head first
        other.head.rank_cmp(&self.head)
    }
}

impl PartialOrd for Cursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Merge lists that are each sorted best first into the global top `k`.
///
/// Costs O(k log p) for p lists; only list heads are ever compared.
pub fn merge_sorted(lists: &[Vec<SearchResult>], k: usize) -> Vec<SearchResult> {
    let mut heap: BinaryHeap<Cursor> = lists
        .iter()
        .enumerate()
        .filter_map(|(list, items)| {
            items.first().map(|head| Cursor {
                head: *head,
                list,
                pos: 0,
            })
        })
        .collect();

    let total: usize = lists.iter().map(Vec::len).sum();
    let mut merged = Vec::with_capacity(k.min(total));

    while merged.len() < k {
        let Some(cursor) = heap.pop() else {
            break;
        };
        merged.push(cursor.head);

        let pos = cursor.pos + 1;
        if let Some(next) = lists[cursor.list].get(pos) {
            heap.push(Cursor {
                head: *next,
                list: cursor.list,
                pos,
            });
        }
    }

    merged
}
