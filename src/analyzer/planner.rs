use crate::model::KeywordGroup;

/// One upstream request worth of groups. The anchor is always first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    index: usize,
    groups: Vec<KeywordGroup>,
}

impl Batch {
    /// Zero-based position in planner order.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn groups(&self) -> &[KeywordGroup] {
        &self.groups
    }

    pub fn anchor(&self) -> &KeywordGroup {
        &self.groups[0]
    }

    pub fn others(&self) -> &[KeywordGroup] {
        &self.groups[1..]
    }

    /// Human-readable member list for logs and progress.
    pub fn label(&self) -> String {
        let names: Vec<&str> = self.groups.iter().map(|g| g.name()).collect();
        names.join(", ")
    }
}

/// Splits the non-anchor groups into fixed-size slices, each sent together with the anchor.
#[derive(Debug, Clone)]
pub struct BatchPlanner {
    anchor: KeywordGroup,
    others: Vec<KeywordGroup>,
    max_per_batch: usize,
}

impl BatchPlanner {
    /// `max_per_batch` counts non-anchor groups only; values below one are treated as one.
    pub fn new(anchor: KeywordGroup, others: Vec<KeywordGroup>, max_per_batch: usize) -> Self {
        Self {
            anchor,
            others,
            max_per_batch: max_per_batch.max(1),
        }
    }

    /// Uses the first group as the anchor. `None` when `groups` is empty.
    pub fn from_groups(mut groups: Vec<KeywordGroup>, max_per_batch: usize) -> Option<Self> {
        if groups.is_empty() {
            return None;
        }
        let anchor = groups.remove(0);
        Some(Self::new(anchor, groups, max_per_batch))
    }

    pub fn anchor(&self) -> &KeywordGroup {
        &self.anchor
    }

    pub fn total_batches(&self) -> usize {
        if self.others.is_empty() {
            1
        } else {
            self.others.len().div_ceil(self.max_per_batch)
        }
    }

    /// Lazily yields batches in input order. Each call starts over from the first batch.
    pub fn batches(&self) -> Batches<'_> {
        Batches {
            planner: self,
            next: 0,
        }
    }
}

pub struct Batches<'a> {
    planner: &'a BatchPlanner,
    next: usize,
}

impl Iterator for Batches<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let planner = self.planner;
        if self.next >= planner.total_batches() {
            return None;
        }

        let start = self.next * planner.max_per_batch;
        let end = (start + planner.max_per_batch).min(planner.others.len());
        let mut groups = Vec::with_capacity(end - start + 1);
        groups.push(planner.anchor.clone());
        groups.extend_from_slice(&planner.others[start..end]);

        let batch = Batch {
            index: self.next,
            groups,
        };
        self.next += 1;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.planner.total_batches() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Batches<'_> {}
