// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Damage summary types returned from [`Tree::take_dirty_areas`](crate::Tree::take_dirty_areas).

use alloc::vec::Vec;

use kurbo::{Affine, Rect};

use crate::geom::transform_rect_bbox;

/// A batched set of repaint regions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Damage {
    /// Rectangles that should be repainted, in the space above the tree root.
    pub dirty_rects: Vec<Rect>,
}

impl Damage {
    /// Returns the union of all damage rects.
    pub fn union_rect(&self) -> Option<Rect> {
        let mut it = self.dirty_rects.iter().copied();
        let first = it.next()?;
        Some(it.fold(first, |acc, r| acc.union(r)))
    }

    /// Whether there is nothing to repaint.
    pub fn is_empty(&self) -> bool {
        self.dirty_rects.is_empty()
    }

    /// Add a rectangle; zero-area rectangles are dropped.
    pub fn push(&mut self, rect: Rect) {
        if !rect.is_zero_area() {
            self.dirty_rects.push(rect);
        }
    }

    /// Bounding boxes of every rect mapped through `transform`.
    pub fn transformed(&self, transform: Affine) -> Self {
        Self {
            dirty_rects: self
                .dirty_rects
                .iter()
                .map(|r| transform_rect_bbox(transform, *r))
                .collect(),
        }
    }

    /// Greedily merge rectangles whose union is no more expensive to repaint
    /// than the pieces.
    ///
    /// Repainting a rect of width `w` and height `h` is modelled as costing
    /// `overhead + h * line_overhead + w * h`.
    pub fn merge(&mut self, overhead: f64, line_overhead: f64) {
        let cost = |r: &Rect| overhead + r.height() * line_overhead + r.width() * r.height();
        let rects = &mut self.dirty_rects;
        rects.sort_by(|a, b| a.x0.total_cmp(&b.x0));
        let mut i = 0;
        while i < rects.len() {
            let mut j = i + 1;
            while j < rects.len() {
                let union = rects[i].union(rects[j]);
                if cost(&union) <= cost(&rects[i]) + cost(&rects[j]) {
                    rects[i] = union;
                    rects.remove(j);
                    // The grown rect may now absorb earlier rejects.
                    j = i + 1;
                } else {
                    j += 1;
                }
            }
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearby_rects_merge() {
        let mut damage = Damage::default();
        damage.push(Rect::new(0.0, 0.0, 10.0, 10.0));
        damage.push(Rect::new(11.0, 0.0, 20.0, 10.0));
        damage.merge(100.0, 10.0);
        assert_eq!(damage.dirty_rects, [Rect::new(0.0, 0.0, 20.0, 10.0)]);
    }

    #[test]
    fn distant_rects_stay_apart() {
        let mut damage = Damage::default();
        damage.push(Rect::new(0.0, 0.0, 10.0, 10.0));
        damage.push(Rect::new(500.0, 500.0, 510.0, 510.0));
        damage.merge(100.0, 10.0);
        assert_eq!(damage.dirty_rects.len(), 2, "union would repaint a huge area");
        assert_eq!(
            damage.union_rect(),
            Some(Rect::new(0.0, 0.0, 510.0, 510.0))
        );
    }

    #[test]
    fn contained_rects_are_absorbed() {
        let mut damage = Damage::default();
        damage.push(Rect::new(2.0, 2.0, 4.0, 4.0));
        damage.push(Rect::new(0.0, 0.0, 50.0, 50.0));
        damage.push(Rect::new(5.0, 5.0, 5.0, 9.0));
        assert_eq!(damage.dirty_rects.len(), 2, "zero-area rect dropped");
        damage.merge(0.0, 0.0);
        assert_eq!(damage.dirty_rects, [Rect::new(0.0, 0.0, 50.0, 50.0)]);
    }
}
