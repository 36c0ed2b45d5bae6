use std::collections::HashMap;

use rand::Rng;

/// Ordering key of a single queue entry: score first, member id as tie-breaker.
type Entry = (u64, u64);

type Link = Option<Box<Node>>;

struct Node {
    entry: Entry,
    priority: u32,
    size: usize,
    left: Link,
    right: Link,
}

impl Node {
    fn new(entry: Entry, priority: u32) -> Box<Self> {
        Box::new(Node { entry, priority, size: 1, left: None, right: None })
    }

    fn refresh(&mut self) {
        self.size = 1 + size(&self.left) + size(&self.right);
    }
}

fn size(link: &Link) -> usize {
    link.as_ref().map_or(0, |n| n.size)
}

/// Splits a treap into (entries where `goes_left` holds, the rest).
/// `goes_left` must be monotone over the in-order sequence.
fn split<F>(link: Link, goes_left: &F) -> (Link, Link)
where
    F: Fn(&Entry) -> bool,
{
    match link {
        None => (None, None),
        Some(mut node) => {
            if goes_left(&node.entry) {
                let (mid, right) = split(node.right.take(), goes_left);
                node.right = mid;
                node.refresh();
                (Some(node), right)
            } else {
                let (left, mid) = split(node.left.take(), goes_left);
                node.left = mid;
                node.refresh();
                (left, Some(node))
            }
        }
    }
}

/// Joins two treaps where every entry of `a` orders before every entry of `b`.
fn merge(a: Link, b: Link) -> Link {
    match (a, b) {
        (None, b) => b,
        (a, None) => a,
        (Some(mut a), Some(mut b)) => {
            if a.priority >= b.priority {
                a.right = merge(a.right.take(), Some(b));
                a.refresh();
                Some(a)
            } else {
                b.left = merge(Some(a), b.left.take());
                b.refresh();
                Some(b)
            }
        }
    }
}

fn collect_in_order(link: &Link, out: &mut Vec<u64>) {
    if let Some(node) = link {
        collect_in_order(&node.left, out);
        out.push(node.entry.1);
        collect_in_order(&node.right, out);
    }
}

/// Ordered set of appointment ids with O(log n) expected insert, remove and rank.
///
/// Members are unique. Re-inserting a member moves it to its new score, which
/// mirrors sorted-set upsert semantics.
#[derive(Default)]
pub struct RankedSet {
    root: Link,
    scores: HashMap<u64, u64>,
}

impl RankedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the member was not present before.
    pub fn insert(&mut self, member: u64, score: u64) -> bool {
        let newly_added = match self.scores.get(&member) {
            Some(&old) if old == score => return false,
            Some(&old) => {
                self.detach((old, member));
                false
            }
            None => true,
        };

        let entry = (score, member);
        let priority = rand::thread_rng().gen::<u32>();
        let (left, right) = split(self.root.take(), &|e: &Entry| *e < entry);
        self.root = merge(merge(left, Some(Node::new(entry, priority))), right);
        self.scores.insert(member, score);
        newly_added
    }

    /// Returns true when the member was present.
    pub fn remove(&mut self, member: u64) -> bool {
        match self.scores.remove(&member) {
            Some(score) => {
                self.detach((score, member));
                true
            }
            None => false,
        }
    }

    fn detach(&mut self, entry: Entry) {
        let (left, rest) = split(self.root.take(), &|e: &Entry| *e < entry);
        let (_dropped, right) = split(rest, &|e: &Entry| *e <= entry);
        self.root = merge(left, right);
    }

    /// Zero-based position of `member` in ascending score order.
    pub fn rank(&self, member: u64) -> Option<usize> {
        let score = *self.scores.get(&member)?;
        let target = (score, member);

        let mut rank = 0;
        let mut cursor = &self.root;
        while let Some(node) = cursor {
            if target < node.entry {
                cursor = &node.left;
            } else if target > node.entry {
                rank += size(&node.left) + 1;
                cursor = &node.right;
            } else {
                return Some(rank + size(&node.left));
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        size(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// All members in ascending score order.
    pub fn members(&self) -> Vec<u64> {
        let mut out = Vec::with_capacity(self.len());
        collect_in_order(&self.root, &mut out);
        out
    }
}
