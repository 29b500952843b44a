//! The free-region index: a red-black tree of currently-FREE blocks,
//! keyed by `(size, address)` so ties never compare equal.
//!
//! Nodes are the blocks themselves (`*mut Header`) — the tree owns no
//! memory of its own, it only threads `left`/`right`/`parent` pointers
//! through headers that already live in the managed heap region. The
//! insert path (`less`, `bst_insert`, the two rotations, and
//! `insert_fixup`) is a direct port of the case analysis in
//! `rb_insert_fixup` from the C program this allocator is descended
//! from; `remove`/`delete_fixup` follow the standard CLRS delete with
//! an explicit `x_parent` threaded alongside `x` so the fixup can
//! reason about a null child without a sentinel node.

use crate::block::{Color, Header};
use log::trace;
use std::ptr;

/// The free-region index. `root` is process-wide state in the sense
/// that one `FreeTree` instance is the allocator's single index; it
/// is not itself global mutable state, `Allocator` owns it.
pub struct FreeTree {
    root: *mut Header,
}

impl FreeTree {
    pub const fn new() -> Self {
        Self { root: ptr::null_mut() }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_null()
    }

    /// Inserts `node` into the index. `node` must not already be a
    /// member; its `left`/`right`/`parent` are reset and it is
    /// recolored RED before the standard BST insertion + fixup.
    ///
    /// # Safety
    /// `node` must be a valid, exclusively-owned header not currently
    /// reachable from this tree.
    pub unsafe fn insert(&mut self, node: *mut Header) {
        unsafe {
            (*node).left = ptr::null_mut();
            (*node).right = ptr::null_mut();
            (*node).parent = ptr::null_mut();
            (*node).color = Color::Red;

            if self.root.is_null() {
                (*node).color = Color::Black;
                self.root = node;
                trace!("tree: {node:p} inserted as root");
                return;
            }

            let mut parent: *mut Header = ptr::null_mut();
            let mut curr = self.root;
            while !curr.is_null() {
                parent = curr;
                curr = if less(node, curr) { (*curr).left } else { (*curr).right };
            }
            (*node).parent = parent;
            if less(node, parent) {
                (*parent).left = node;
            } else {
                (*parent).right = node;
            }
            trace!("tree: {node:p} inserted under {parent:p}");
            self.insert_fixup(node);
        }
    }

    /// Smallest free block whose size is at least `need`, or `None` if
    /// the tree holds no such block. Does not remove it.
    ///
    /// # Safety
    /// The tree must be well-formed (no dangling `left`/`right`).
    pub unsafe fn best_fit(&self, need: usize) -> Option<*mut Header> {
        unsafe {
            let mut curr = self.root;
            let mut best: *mut Header = ptr::null_mut();
            while !curr.is_null() {
                if (*curr).size >= need {
                    best = curr;
                    curr = (*curr).left;
                } else {
                    curr = (*curr).right;
                }
            }
            if best.is_null() { None } else { Some(best) }
        }
    }

    /// Removes `node` from the tree via standard red-black delete.
    ///
    /// # Safety
    /// `node` must currently be a member of this tree.
    pub unsafe fn remove(&mut self, node: *mut Header) {
        unsafe {
            let mut y = node;
            let mut y_original_color = color_of(y);
            let x: *mut Header;
            let x_parent: *mut Header;

            if (*node).left.is_null() {
                x = (*node).right;
                x_parent = (*node).parent;
                self.transplant(node, (*node).right);
            } else if (*node).right.is_null() {
                x = (*node).left;
                x_parent = (*node).parent;
                self.transplant(node, (*node).left);
            } else {
                y = self.minimum((*node).right);
                y_original_color = color_of(y);
                x = (*y).right;
                let x_parent_inner;
                if (*y).parent == node {
                    x_parent_inner = y;
                } else {
                    x_parent_inner = (*y).parent;
                    self.transplant(y, (*y).right);
                    (*y).right = (*node).right;
                    (*(*y).right).parent = y;
                }
                self.transplant(node, y);
                (*y).left = (*node).left;
                (*(*y).left).parent = y;
                (*y).color = (*node).color;
                x_parent = x_parent_inner;
            }

            trace!("tree: removed {node:p}, fixup color={y_original_color:?}");
            if y_original_color == Color::Black {
                self.delete_fixup(x, x_parent);
            }
        }
    }

    /// Walks the in-order traversal, innermost first, for debug
    /// printing and invariant checks.
    ///
    /// # Safety
    /// The tree must be well-formed.
    unsafe fn in_order(&self, node: *mut Header, out: &mut Vec<*mut Header>) {
        unsafe {
            if node.is_null() {
                return;
            }
            self.in_order((*node).left, out);
            out.push(node);
            self.in_order((*node).right, out);
        }
    }

    /// Checks all of the structural invariants a red-black tree must
    /// satisfy: root is BLACK (or the tree is empty), no RED node has
    /// a RED parent, every root-to-null path has the same black
    /// height, parent/child links agree, and in-order traversal is
    /// non-decreasing by `(size, address)`.
    ///
    /// Intended for tests and debug assertions, not the allocation
    /// hot path.
    ///
    /// # Safety
    /// The tree must be well-formed enough to walk without crashing;
    /// this is precisely what it's checking, so call it on a tree you
    /// suspect, not one you trust.
    pub unsafe fn check_invariants(&self) -> Result<(), String> {
        unsafe {
            if self.root.is_null() {
                return Ok(());
            }
            if color_of(self.root) != Color::Black {
                return Err("root is not BLACK".into());
            }
            if !(*self.root).parent.is_null() {
                return Err("root has a non-null parent".into());
            }

            let mut nodes = Vec::new();
            self.in_order(self.root, &mut nodes);

            for w in nodes.windows(2) {
                if !less(w[0], w[1]) {
                    return Err(format!("in-order traversal out of order at {:p}, {:p}", w[0], w[1]));
                }
            }

            for &n in &nodes {
                if color_of(n) == Color::Red {
                    let p = (*n).parent;
                    if !p.is_null() && color_of(p) == Color::Red {
                        return Err(format!("RED node {n:p} has RED parent {p:p}"));
                    }
                }
                if !(*n).left.is_null() && (*(*n).left).parent != n {
                    return Err(format!("{n:p}.left does not point back"));
                }
                if !(*n).right.is_null() && (*(*n).right).parent != n {
                    return Err(format!("{n:p}.right does not point back"));
                }
            }

            self.black_height(self.root)?;
            Ok(())
        }
    }

    unsafe fn black_height(&self, node: *mut Header) -> Result<usize, String> {
        unsafe {
            if node.is_null() {
                return Ok(1);
            }
            let left = self.black_height((*node).left)?;
            let right = self.black_height((*node).right)?;
            if left != right {
                return Err(format!(
                    "unequal black-height under {node:p}: left={left}, right={right}"
                ));
            }
            Ok(left + if color_of(node) == Color::Black { 1 } else { 0 })
        }
    }

    unsafe fn minimum(&self, mut node: *mut Header) -> *mut Header {
        unsafe {
            while !(*node).left.is_null() {
                node = (*node).left;
            }
            node
        }
    }

    /// Replaces the subtree rooted at `u` with the subtree rooted at
    /// `v` in `u`'s parent. Does not touch `u`'s own children.
    unsafe fn transplant(&mut self, u: *mut Header, v: *mut Header) {
        unsafe {
            let p = (*u).parent;
            if p.is_null() {
                self.root = v;
            } else if u == (*p).left {
                (*p).left = v;
            } else {
                (*p).right = v;
            }
            if !v.is_null() {
                (*v).parent = p;
            }
        }
    }

    fn rotate_left(&mut self, x: *mut Header) {
        unsafe {
            let y = (*x).right;
            debug_assert!(!y.is_null(), "rotate_left requires a non-null right child");

            (*x).right = (*y).left;
            if !(*y).left.is_null() {
                (*(*y).left).parent = x;
            }

            (*y).parent = (*x).parent;
            if (*x).parent.is_null() {
                self.root = y;
            } else if x == (*(*x).parent).left {
                (*(*x).parent).left = y;
            } else {
                (*(*x).parent).right = y;
            }

            (*y).left = x;
            (*x).parent = y;
        }
    }

    fn rotate_right(&mut self, y: *mut Header) {
        unsafe {
            let x = (*y).left;
            debug_assert!(!x.is_null(), "rotate_right requires a non-null left child");

            (*y).left = (*x).right;
            if !(*x).right.is_null() {
                (*(*x).right).parent = y;
            }

            (*x).parent = (*y).parent;
            if (*y).parent.is_null() {
                self.root = x;
            } else if y == (*(*y).parent).left {
                (*(*y).parent).left = x;
            } else {
                (*(*y).parent).right = x;
            }

            (*x).right = y;
            (*y).parent = x;
        }
    }

    fn insert_fixup(&mut self, mut z: *mut Header) {
        unsafe {
            while !(*z).parent.is_null() && color_of((*z).parent) == Color::Red {
                let mut p = (*z).parent;
                let mut g = (*p).parent;
                if g.is_null() {
                    break;
                }

                if p == (*g).left {
                    let y = (*g).right;
                    if color_of(y) == Color::Red {
                        trace!("insert_fixup: case 1 (left) at {p:p}");
                        (*p).color = Color::Black;
                        (*y).color = Color::Black;
                        (*g).color = Color::Red;
                        z = g;
                    } else {
                        if z == (*p).right {
                            trace!("insert_fixup: case 2 (left) at {p:p}");
                            z = p;
                            self.rotate_left(z);
                            p = (*z).parent;
                            g = (*p).parent;
                        }
                        trace!("insert_fixup: case 3 (left) at {g:p}");
                        (*p).color = Color::Black;
                        (*g).color = Color::Red;
                        self.rotate_right(g);
                    }
                } else {
                    let y = (*g).left;
                    if color_of(y) == Color::Red {
                        trace!("insert_fixup: case 1 (right) at {p:p}");
                        (*p).color = Color::Black;
                        (*y).color = Color::Black;
                        (*g).color = Color::Red;
                        z = g;
                    } else {
                        if z == (*p).left {
                            trace!("insert_fixup: case 2 (right) at {p:p}");
                            z = p;
                            self.rotate_right(z);
                            p = (*z).parent;
                            g = (*p).parent;
                        }
                        trace!("insert_fixup: case 3 (right) at {g:p}");
                        (*p).color = Color::Black;
                        (*g).color = Color::Red;
                        self.rotate_left(g);
                    }
                }
            }
            if !self.root.is_null() {
                (*self.root).color = Color::Black;
            }
        }
    }

    fn delete_fixup(&mut self, mut x: *mut Header, mut x_parent: *mut Header) {
        unsafe {
            while x != self.root && color_of(x) == Color::Black && !x_parent.is_null() {
                if x == (*x_parent).left {
                    let mut w = (*x_parent).right;
                    if color_of(w) == Color::Red {
                        trace!("delete_fixup: case 1 (left) at {x_parent:p}");
                        (*w).color = Color::Black;
                        (*x_parent).color = Color::Red;
                        self.rotate_left(x_parent);
                        w = (*x_parent).right;
                    }
                    if color_of((*w).left) == Color::Black && color_of((*w).right) == Color::Black {
                        trace!("delete_fixup: case 2 (left) at {w:p}");
                        (*w).color = Color::Red;
                        x = x_parent;
                        x_parent = (*x).parent;
                    } else {
                        if color_of((*w).right) == Color::Black {
                            trace!("delete_fixup: case 3 (left) at {w:p}");
                            if !(*w).left.is_null() {
                                (*(*w).left).color = Color::Black;
                            }
                            (*w).color = Color::Red;
                            self.rotate_right(w);
                            w = (*x_parent).right;
                        }
                        trace!("delete_fixup: case 4 (left) at {w:p}");
                        (*w).color = color_of(x_parent);
                        (*x_parent).color = Color::Black;
                        if !(*w).right.is_null() {
                            (*(*w).right).color = Color::Black;
                        }
                        self.rotate_left(x_parent);
                        x = self.root;
                        x_parent = ptr::null_mut();
                    }
                } else {
                    let mut w = (*x_parent).left;
                    if color_of(w) == Color::Red {
                        trace!("delete_fixup: case 1 (right) at {x_parent:p}");
                        (*w).color = Color::Black;
                        (*x_parent).color = Color::Red;
                        self.rotate_right(x_parent);
                        w = (*x_parent).left;
                    }
                    if color_of((*w).right) == Color::Black && color_of((*w).left) == Color::Black {
                        trace!("delete_fixup: case 2 (right) at {w:p}");
                        (*w).color = Color::Red;
                        x = x_parent;
                        x_parent = (*x).parent;
                    } else {
                        if color_of((*w).left) == Color::Black {
                            trace!("delete_fixup: case 3 (right) at {w:p}");
                            if !(*w).right.is_null() {
                                (*(*w).right).color = Color::Black;
                            }
                            (*w).color = Color::Red;
                            self.rotate_left(w);
                            w = (*x_parent).left;
                        }
                        trace!("delete_fixup: case 4 (right) at {w:p}");
                        (*w).color = color_of(x_parent);
                        (*x_parent).color = Color::Black;
                        if !(*w).left.is_null() {
                            (*(*w).left).color = Color::Black;
                        }
                        self.rotate_right(x_parent);
                        x = self.root;
                        x_parent = ptr::null_mut();
                    }
                }
            }
            if !x.is_null() {
                (*x).color = Color::Black;
            }
        }
    }
}

impl Default for FreeTree {
    fn default() -> Self {
        Self::new()
    }
}

/// `a < b` iff `a.size < b.size`, ties broken by address. This total
/// order is why the tree behaves as an ordered *set*: two distinct
/// blocks never compare equal.
fn less(a: *mut Header, b: *mut Header) -> bool {
    unsafe {
        let (sa, sb) = ((*a).size, (*b).size);
        if sa != sb {
            sa < sb
        } else {
            (a as usize) < (b as usize)
        }
    }
}

unsafe fn color_of(n: *mut Header) -> Color {
    if n.is_null() { Color::Black } else { unsafe { (*n).color } }
}

impl std::fmt::Debug for FreeTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        unsafe fn write_node(
            f: &mut std::fmt::Formatter<'_>,
            node: *mut Header,
            depth: usize,
        ) -> std::fmt::Result {
            if node.is_null() {
                return Ok(());
            }
            unsafe {
                write_node(f, (*node).left, depth + 1)?;
                writeln!(
                    f,
                    "{}[{} {}]",
                    "    ".repeat(depth),
                    (*node).size,
                    if (*node).color == Color::Red { "R" } else { "B" }
                )?;
                write_node(f, (*node).right, depth + 1)
            }
        }
        unsafe { write_node(f, self.root, 0) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Header as Hdr, State};

    unsafe fn leaked(size: usize) -> *mut Header {
        let b: Box<Hdr> = Box::new(Hdr {
            size,
            left: ptr::null_mut(),
            right: ptr::null_mut(),
            parent: ptr::null_mut(),
            color: Color::Red,
            state: State::Free,
        });
        Box::into_raw(b)
    }

    #[test]
    fn insert_many_keeps_invariants() {
        let mut tree = FreeTree::new();
        let sizes = [8, 32, 64, 16, 128, 8, 32, 256, 4, 96, 16, 48];
        let mut nodes = Vec::new();
        unsafe {
            for &s in &sizes {
                let n = leaked(s);
                nodes.push(n);
                tree.insert(n);
                tree.check_invariants().expect("invariants hold after insert");
            }
        }
    }

    #[test]
    fn best_fit_picks_smallest_fitting() {
        let mut tree = FreeTree::new();
        unsafe {
            for s in [8usize, 16, 32, 64, 128] {
                tree.insert(leaked(s));
            }
            let hit = tree.best_fit(20).unwrap();
            assert_eq!((*hit).size, 32);

            let hit = tree.best_fit(128).unwrap();
            assert_eq!((*hit).size, 128);

            assert!(tree.best_fit(256).is_none());
        }
    }

    #[test]
    fn remove_then_reinsert_preserves_invariants() {
        let mut tree = FreeTree::new();
        let mut nodes = Vec::new();
        unsafe {
            for s in [8usize, 16, 24, 32, 40, 48, 56, 64, 72, 80, 88, 96] {
                let n = leaked(s);
                nodes.push(n);
                tree.insert(n);
            }
            tree.check_invariants().unwrap();

            for &n in nodes.iter().step_by(2) {
                tree.remove(n);
                tree.check_invariants().expect("invariants hold after remove");
            }

            for &n in nodes.iter().step_by(2) {
                tree.insert(n);
                tree.check_invariants().expect("invariants hold after reinsert");
            }
        }
    }
}
