//! The red-black tree of runnable tasks (component C2).
//!
//! Tasks live in a fixed-capacity arena (`tasks`); the tree's
//! parent/left/right/color links are a side table (`links`) keyed by
//! arena slot index rather than pointers embedded in `Task` itself. The
//! run queue is only ever touched while its caller holds the single
//! global scheduler lock (see `sync`), so this is ordinary owned data,
//! not a graph of raw pointers - no unsafe code is needed for the tree
//! bookkeeping.

use alloc::sync::Arc;
use alloc::vec::Vec;
use log::{debug, trace, warn};

use crate::config::{LATENCY, MIN_GRANULARITY, NPROC};
use crate::task::{Task, TaskState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

#[derive(Clone, Copy)]
struct Link {
    parent: Option<usize>,
    left: Option<usize>,
    right: Option<usize>,
    color: Color,
}

impl Link {
    const EMPTY: Link = Link {
        parent: None,
        left: None,
        right: None,
        color: Color::Black,
    };
}

/// A reason `RunQueue::debug_validate` rejected the tree's current shape.
/// Exposed for the property-test suite; not consulted on the scheduling
/// hot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantViolation {
    OrderViolated,
    RootNotBlack,
    RedRedViolation,
    BlackHeightMismatch,
    CountMismatch,
    WeightMismatch,
    MinCacheMismatch,
}

/// The single global run queue: a red-black tree of `RUNNABLE` tasks
/// ordered by virtual runtime, plus the aggregates the rest of the
/// scheduler core needs (count, total weight, current epoch period, and
/// a cache of the leftmost node).
pub struct RunQueue {
    tasks: Vec<Option<Arc<Task>>>,
    links: Vec<Link>,
    free: Vec<usize>,
    root: Option<usize>,
    min_cached: Option<usize>,
    count: usize,
    total_weight: u64,
    period: u64,
}

impl Default for RunQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RunQueue {
    pub fn new() -> Self {
        let mut tasks = Vec::with_capacity(NPROC);
        let mut links = Vec::with_capacity(NPROC);
        let mut free = Vec::with_capacity(NPROC);
        for i in (0..NPROC).rev() {
            tasks.push(None);
            links.push(Link::EMPTY);
            free.push(i);
        }
        RunQueue {
            tasks,
            links,
            free,
            root: None,
            min_cached: None,
            count: 0,
            total_weight: 0,
            period: LATENCY,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == NPROC
    }

    pub fn aggregate_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn period(&self) -> u64 {
        self.period
    }

    /// The task currently cached as the tree's minimum, if any.
    pub fn peek_min(&self) -> Option<&Arc<Task>> {
        self.min_cached.map(|i| self.tasks[i].as_ref().expect("min_cached must reference a live slot"))
    }

    /// Insert a `RUNNABLE` task into the tree. Returns `false` without
    /// modifying the tree if it is already at capacity; the caller must
    /// check `len`/`is_full` itself if that matters.
    pub fn insert(&mut self, task: Arc<Task>) -> bool {
        debug_assert_eq!(task.state(), TaskState::Runnable, "insert requires a RUNNABLE task");
        let newly_queued = task.mark_queued();
        debug_assert!(
            newly_queued,
            "task is already queued in a RunQueue - double-insert would corrupt the tree"
        );
        if self.count == NPROC {
            warn!("run queue insert refused: already at capacity {}", NPROC);
            task.mark_dequeued();
            return false;
        }

        let idx = self.free.pop().expect("free list must have a slot whenever count < NPROC");
        let vr = task.vruntime();
        let w = task.weight() as u64;
        self.tasks[idx] = Some(task);
        self.links[idx] = Link {
            parent: None,
            left: None,
            right: None,
            color: Color::Red,
        };

        match self.root {
            None => {
                self.root = Some(idx);
                self.links[idx].color = Color::Black;
            }
            Some(root) => {
                let mut cur = root;
                loop {
                    let cur_vr = self.tasks[cur].as_ref().unwrap().vruntime();
                    if vr < cur_vr {
                        match self.links[cur].left {
                            Some(l) => cur = l,
                            None => {
                                self.links[cur].left = Some(idx);
                                self.links[idx].parent = Some(cur);
                                break;
                            }
                        }
                    } else {
                        match self.links[cur].right {
                            Some(r) => cur = r,
                            None => {
                                self.links[cur].right = Some(idx);
                                self.links[idx].parent = Some(cur);
                                break;
                            }
                        }
                    }
                }
                self.fix_after_insert(idx);
            }
        }

        self.count += 1;
        self.total_weight += w;
        self.recompute_min_cached();
        self.recompute_period();
        debug!("inserted slot {} (vruntime={}), count now {}", idx, vr, self.count);
        true
    }

    /// Remove and return the task with smallest `vruntime`, stamping its
    /// `max_exec_time` for the upcoming scheduling burst. Returns `None`
    /// if the tree is empty, or if the cached minimum has raced out of
    /// the `RUNNABLE` state (left as-is, per the run queue's documented
    /// "no work right now" handling rather than removed).
    pub fn extract_min(&mut self) -> Option<Arc<Task>> {
        let idx = self.min_cached?;
        {
            let candidate = self.tasks[idx].as_ref().expect("min_cached must reference a live slot");
            if candidate.state() != TaskState::Runnable {
                warn!("stale min_cached slot {} observed with state {}", idx, candidate.state());
                return None;
            }
        }

        self.remove_node(idx);
        let task = self.tasks[idx].take().expect("slot must still hold its task before being freed");
        task.mark_dequeued();
        self.free.push(idx);
        self.count -= 1;
        self.total_weight -= task.weight() as u64;
        self.recompute_min_cached();
        self.recompute_period();

        let denom = self.total_weight.max(task.weight() as u64).max(1);
        let slice = self.period.saturating_mul(task.weight() as u64) / denom;
        task.set_max_exec_time(slice);
        debug!("extracted slot {} (vruntime={}), slice={}", idx, task.vruntime(), slice);
        Some(task)
    }

    fn recompute_min_cached(&mut self) {
        self.min_cached = self.leftmost(self.root);
    }

    fn recompute_period(&mut self) {
        self.period = LATENCY.max(self.count as u64 * MIN_GRANULARITY);
    }

    fn leftmost(&self, mut node: Option<usize>) -> Option<usize> {
        let mut result = node;
        while let Some(idx) = node {
            result = Some(idx);
            node = self.links[idx].left;
        }
        result
    }

    fn color(&self, node: Option<usize>) -> Color {
        match node {
            Some(i) => self.links[i].color,
            None => Color::Black,
        }
    }

    fn set_color(&mut self, idx: usize, c: Color) {
        self.links[idx].color = c;
    }

    fn rotate_left(&mut self, x: usize) {
        let y = self.links[x].right.expect("rotate_left requires a right child");
        trace!("rotate_left around slot {} (new subtree root slot {})", x, y);
        let y_left = self.links[y].left;
        self.links[x].right = y_left;
        if let Some(yl) = y_left {
            self.links[yl].parent = Some(x);
        }
        self.links[y].parent = self.links[x].parent;
        match self.links[x].parent {
            None => self.root = Some(y),
            Some(p) => {
                if self.links[p].left == Some(x) {
                    self.links[p].left = Some(y);
                } else {
                    self.links[p].right = Some(y);
                }
            }
        }
        self.links[y].left = Some(x);
        self.links[x].parent = Some(y);
    }

    fn rotate_right(&mut self, x: usize) {
        let y = self.links[x].left.expect("rotate_right requires a left child");
        trace!("rotate_right around slot {} (new subtree root slot {})", x, y);
        let y_right = self.links[y].right;
        self.links[x].left = y_right;
        if let Some(yr) = y_right {
            self.links[yr].parent = Some(x);
        }
        self.links[y].parent = self.links[x].parent;
        match self.links[x].parent {
            None => self.root = Some(y),
            Some(p) => {
                if self.links[p].left == Some(x) {
                    self.links[p].left = Some(y);
                } else {
                    self.links[p].right = Some(y);
                }
            }
        }
        self.links[y].right = Some(x);
        self.links[x].parent = Some(y);
    }

    /// Cases 1-5 of the standard red-black insertion fixup.
    fn fix_after_insert(&mut self, mut z: usize) {
        trace!("fix_after_insert starting at slot {}", z);
        loop {
            let p = match self.links[z].parent {
                Some(p) => p,
                None => break,
            };
            if self.links[p].color == Color::Black {
                break;
            }
            let gp = self.links[p]
                .parent
                .expect("a red node's parent is never the root, so it always has a grandparent");
            if Some(p) == self.links[gp].left {
                let uncle = self.links[gp].right;
                if self.color(uncle) == Color::Red {
                    // Case 3: parent and uncle both red.
                    trace!("fix_after_insert case 3 (recolor) at parent slot {}", p);
                    self.set_color(p, Color::Black);
                    if let Some(u) = uncle {
                        self.set_color(u, Color::Black);
                    }
                    self.set_color(gp, Color::Red);
                    z = gp;
                } else {
                    if Some(z) == self.links[p].right {
                        // Case 4: inner grandchild, rotate to outer.
                        trace!("fix_after_insert case 4 (inner grandchild) at slot {}", z);
                        z = p;
                        self.rotate_left(z);
                    }
                    // Case 5: outer grandchild.
                    trace!("fix_after_insert case 5 (outer grandchild) at slot {}", z);
                    let p2 = self.links[z].parent.expect("case 4 leaves z with a parent");
                    let gp2 = self.links[p2].parent.expect("case 4 preserves the original grandparent");
                    self.set_color(p2, Color::Black);
                    self.set_color(gp2, Color::Red);
                    self.rotate_right(gp2);
                    break;
                }
            } else {
                let uncle = self.links[gp].left;
                if self.color(uncle) == Color::Red {
                    trace!("fix_after_insert case 3 (recolor, mirrored) at parent slot {}", p);
                    self.set_color(p, Color::Black);
                    if let Some(u) = uncle {
                        self.set_color(u, Color::Black);
                    }
                    self.set_color(gp, Color::Red);
                    z = gp;
                } else {
                    if Some(z) == self.links[p].left {
                        trace!("fix_after_insert case 4 (inner grandchild, mirrored) at slot {}", z);
                        z = p;
                        self.rotate_right(z);
                    }
                    trace!("fix_after_insert case 5 (outer grandchild, mirrored) at slot {}", z);
                    let p2 = self.links[z].parent.expect("case 4 leaves z with a parent");
                    let gp2 = self.links[p2].parent.expect("case 4 preserves the original grandparent");
                    self.set_color(p2, Color::Black);
                    self.set_color(gp2, Color::Red);
                    self.rotate_left(gp2);
                    break;
                }
            }
        }
        if let Some(r) = self.root {
            self.links[r].color = Color::Black;
        }
    }

    /// Structural delete of `idx`, which is always the tree's leftmost
    /// node (and therefore has no left child), followed by the
    /// double-black rebalance if a black node was removed.
    fn remove_node(&mut self, idx: usize) {
        debug_assert!(
            self.links[idx].left.is_none(),
            "extract_min always removes the leftmost node, which has no left child"
        );
        let child = self.links[idx].right;
        let parent = self.links[idx].parent;
        let original_color = self.links[idx].color;

        if let Some(c) = child {
            self.links[c].parent = parent;
        }
        match parent {
            None => self.root = child,
            Some(p) => {
                if self.links[p].left == Some(idx) {
                    self.links[p].left = child;
                } else {
                    self.links[p].right = child;
                }
            }
        }
        if parent.is_none() {
            if let Some(c) = child {
                self.set_color(c, Color::Black);
            }
        }

        if original_color == Color::Black {
            match child {
                Some(c) if self.links[c].color == Color::Red => self.set_color(c, Color::Black),
                Some(c) => self.fix_after_delete(Some(c), parent),
                None => self.fix_after_delete(None, parent),
            }
        }

        self.links[idx] = Link::EMPTY;
    }

    /// Double-black rebalance after removing a black node with no red
    /// replacement child. `x` is the node now carrying an extra black
    /// (possibly a nil leaf, tracked only via `parent`).
    fn fix_after_delete(&mut self, mut x: Option<usize>, mut parent: Option<usize>) {
        trace!("fix_after_delete starting at {:?} (parent {:?})", x, parent);
        while x != self.root && self.color(x) == Color::Black {
            let p = match parent {
                Some(p) => p,
                None => break,
            };
            if self.links[p].left == x {
                let mut w = self.links[p].right.expect("sibling must exist to preserve black-height");
                if self.links[w].color == Color::Red {
                    trace!("fix_after_delete case 1 (red sibling) at parent slot {}", p);
                    self.set_color(w, Color::Black);
                    self.set_color(p, Color::Red);
                    self.rotate_left(p);
                    w = self.links[p].right.expect("sibling must exist after rotation");
                }
                if self.color(self.links[w].left) == Color::Black && self.color(self.links[w].right) == Color::Black {
                    trace!("fix_after_delete case 2 (recolor sibling) at sibling slot {}", w);
                    self.set_color(w, Color::Red);
                    x = Some(p);
                    parent = self.links[p].parent;
                } else {
                    if self.color(self.links[w].right) == Color::Black {
                        trace!("fix_after_delete case 3 (sibling inner red child) at sibling slot {}", w);
                        if let Some(wl) = self.links[w].left {
                            self.set_color(wl, Color::Black);
                        }
                        self.set_color(w, Color::Red);
                        self.rotate_right(w);
                        w = self.links[p].right.expect("sibling must exist after rotation");
                    }
                    trace!("fix_after_delete case 4 (sibling outer red child) at parent slot {}", p);
                    self.set_color(w, self.links[p].color);
                    self.set_color(p, Color::Black);
                    if let Some(wr) = self.links[w].right {
                        self.set_color(wr, Color::Black);
                    }
                    self.rotate_left(p);
                    x = self.root;
                    parent = None;
                    break;
                }
            } else {
                let mut w = self.links[p].left.expect("sibling must exist to preserve black-height");
                if self.links[w].color == Color::Red {
                    trace!("fix_after_delete case 1 (red sibling, mirrored) at parent slot {}", p);
                    self.set_color(w, Color::Black);
                    self.set_color(p, Color::Red);
                    self.rotate_right(p);
                    w = self.links[p].left.expect("sibling must exist after rotation");
                }
                if self.color(self.links[w].right) == Color::Black && self.color(self.links[w].left) == Color::Black {
                    trace!("fix_after_delete case 2 (recolor sibling, mirrored) at sibling slot {}", w);
                    self.set_color(w, Color::Red);
                    x = Some(p);
                    parent = self.links[p].parent;
                } else {
                    if self.color(self.links[w].left) == Color::Black {
                        trace!("fix_after_delete case 3 (sibling inner red child, mirrored) at sibling slot {}", w);
                        if let Some(wr) = self.links[w].right {
                            self.set_color(wr, Color::Black);
                        }
                        self.set_color(w, Color::Red);
                        self.rotate_left(w);
                        w = self.links[p].left.expect("sibling must exist after rotation");
                    }
                    trace!("fix_after_delete case 4 (sibling outer red child, mirrored) at parent slot {}", p);
                    self.set_color(w, self.links[p].color);
                    self.set_color(p, Color::Black);
                    if let Some(wl) = self.links[w].left {
                        self.set_color(wl, Color::Black);
                    }
                    self.rotate_right(p);
                    x = self.root;
                    parent = None;
                    break;
                }
            }
        }
        if let Some(xi) = x {
            self.set_color(xi, Color::Black);
        }
    }

    /// In-order vruntime sequence, for tests.
    pub fn in_order_vruntimes(&self) -> Vec<u64> {
        let mut out = Vec::with_capacity(self.count);
        self.walk_in_order(self.root, &mut out);
        out
    }

    fn walk_in_order(&self, node: Option<usize>, out: &mut Vec<u64>) {
        if let Some(idx) = node {
            self.walk_in_order(self.links[idx].left, out);
            out.push(self.tasks[idx].as_ref().unwrap().vruntime());
            self.walk_in_order(self.links[idx].right, out);
        }
    }

    /// Checks all four run-queue invariants from the data model. Intended
    /// for the test suite, not the scheduling hot path.
    pub fn debug_validate(&self) -> Result<(), InvariantViolation> {
        let order = self.in_order_vruntimes();
        if order.windows(2).any(|w| w[0] > w[1]) {
            return Err(InvariantViolation::OrderViolated);
        }

        if let Some(r) = self.root {
            if self.links[r].color != Color::Black {
                return Err(InvariantViolation::RootNotBlack);
            }
        }

        let mut counted = 0usize;
        let mut weight_sum: u64 = 0;
        self.count_and_weight(self.root, &mut counted, &mut weight_sum);
        if counted != self.count {
            return Err(InvariantViolation::CountMismatch);
        }
        if weight_sum != self.total_weight {
            return Err(InvariantViolation::WeightMismatch);
        }

        if self.no_red_red_violation(self.root).is_err() {
            return Err(InvariantViolation::RedRedViolation);
        }

        if self.black_height(self.root).is_none() {
            return Err(InvariantViolation::BlackHeightMismatch);
        }

        let expected_min = self.leftmost(self.root);
        if expected_min != self.min_cached {
            return Err(InvariantViolation::MinCacheMismatch);
        }

        Ok(())
    }

    fn count_and_weight(&self, node: Option<usize>, count: &mut usize, weight: &mut u64) {
        if let Some(idx) = node {
            *count += 1;
            *weight += self.tasks[idx].as_ref().unwrap().weight() as u64;
            self.count_and_weight(self.links[idx].left, count, weight);
            self.count_and_weight(self.links[idx].right, count, weight);
        }
    }

    fn no_red_red_violation(&self, node: Option<usize>) -> Result<(), ()> {
        if let Some(idx) = node {
            if self.links[idx].color == Color::Red {
                if self.color(self.links[idx].left) == Color::Red || self.color(self.links[idx].right) == Color::Red
                {
                    return Err(());
                }
            }
            self.no_red_red_violation(self.links[idx].left)?;
            self.no_red_red_violation(self.links[idx].right)?;
        }
        Ok(())
    }

    /// Returns `Some(black_height)` if every root-to-leaf path under
    /// `node` has the same black height, `None` otherwise.
    fn black_height(&self, node: Option<usize>) -> Option<u32> {
        match node {
            None => Some(1),
            Some(idx) => {
                let left = self.black_height(self.links[idx].left)?;
                let right = self.black_height(self.links[idx].right)?;
                if left != right {
                    return None;
                }
                let add = if self.links[idx].color == Color::Black { 1 } else { 0 };
                Some(left + add)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Task, TaskId};

    fn runnable(id: usize, nice: i32, vruntime: u64) -> Arc<Task> {
        let t = Arc::new(Task::new(TaskId(id), nice).unwrap());
        t.set_state(TaskState::Runnable);
        t.set_vruntime(vruntime);
        t
    }

    #[test]
    fn single_task_scenario() {
        let mut rq = RunQueue::new();
        rq.insert(runnable(0, 0, 0));
        assert_eq!(rq.period(), LATENCY);
        let t = rq.extract_min().unwrap();
        assert_eq!(t.weight(), 1024);
        assert_eq!(t.max_exec_time(), LATENCY);
    }

    #[test]
    fn two_equal_tasks_scenario() {
        let mut rq = RunQueue::new();
        let a = runnable(0, 0, 0);
        let b = runnable(1, 0, 0);
        rq.insert(a.clone());
        rq.insert(b.clone());
        let first = rq.extract_min().unwrap();
        assert_eq!(first.id(), a.id());
        assert_eq!(first.max_exec_time(), LATENCY);
        first.set_vruntime(1);
        first.set_state(TaskState::Runnable);
        rq.insert(first);
        let second = rq.extract_min().unwrap();
        assert_eq!(second.id(), b.id());
    }

    #[test]
    fn full_tree_refuses_extra_insert() {
        let mut rq = RunQueue::new();
        for i in 0..NPROC {
            assert!(rq.insert(runnable(i, 0, i as u64)));
        }
        assert!(rq.is_full());
        assert!(!rq.insert(runnable(NPROC, 0, 9999)));
        assert_eq!(rq.len(), NPROC);
    }

    #[test]
    fn order_and_balance_hold_after_many_ops() {
        let mut rq = RunQueue::new();
        let mut next_id = 0usize;
        for round in 0..20 {
            for i in 0..5 {
                next_id += 1;
                rq.insert(runnable(next_id, 0, ((round * 7 + i * 13) % 97) as u64));
            }
            rq.debug_validate().expect("invariants must hold after inserts");
            if let Some(t) = rq.extract_min() {
                rq.debug_validate().expect("invariants must hold after extract");
                drop(t);
            }
        }
        let order = rq.in_order_vruntimes();
        assert!(order.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn drain_to_empty_keeps_invariants() {
        let mut rq = RunQueue::new();
        for i in 0..30 {
            rq.insert(runnable(i, (i % 10) as i32, (30 - i) as u64));
        }
        while let Some(_t) = rq.extract_min() {
            rq.debug_validate().expect("invariants must hold mid-drain");
        }
        assert!(rq.is_empty());
        assert!(rq.peek_min().is_none());
    }
}
