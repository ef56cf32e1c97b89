// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rectangle and transform helpers shared by the bounds machinery.
//!
//! All functions here are pure. The epsilon used by [`normalize_rect`] is an
//! explicit argument; trees carry theirs in [`TreeConfig`](crate::TreeConfig).

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::{Affine, Rect, Vec2};

/// Default epsilon used to widen degenerate bounds.
pub const DEFAULT_EPSILON: f64 = 1e-6;

/// Transform an axis-aligned `Rect` by an `Affine` and return the exact
/// axis-aligned bounding box of the transformed corners.
pub fn transform_rect_bbox(affine: Affine, rect: Rect) -> Rect {
    let [a, b, c, d, e, f] = affine.as_coeffs();
    let min_x = (a * rect.x0).min(a * rect.x1) + (c * rect.y0).min(c * rect.y1);
    let max_x = (a * rect.x0).max(a * rect.x1) + (c * rect.y0).max(c * rect.y1);
    let min_y = (b * rect.x0).min(b * rect.x1) + (d * rect.y0).min(d * rect.y1);
    let max_y = (b * rect.x0).max(b * rect.x1) + (d * rect.y0).max(d * rect.y1);
    Rect::new(min_x + e, min_y + f, max_x + e, max_y + f)
}

/// Transform a rectangle by the scale and translation parts of `affine` only.
///
/// Callers must ensure the transform carries no shear or rotation (see
/// [`has_shear`]); the off-diagonal coefficients are ignored. Negative scales
/// flip the rectangle so the result is always well formed.
pub fn transform_rect_scale_only(affine: Affine, rect: Rect) -> Rect {
    let [a, _, _, d, e, f] = affine.as_coeffs();
    Rect::new(a * rect.x0, d * rect.y0, a * rect.x1, d * rect.y1).abs() + Vec2::new(e, f)
}

/// Returns true when the transform has a rotation or shear component.
pub fn has_shear(affine: Affine) -> bool {
    let [_, b, c, _, _, _] = affine.as_coeffs();
    b != 0.0 || c != 0.0
}

/// Transform a rectangle, taking the scale-only fast path when possible.
pub fn transformed_rect(affine: Affine, rect: Rect) -> Rect {
    if has_shear(affine) {
        transform_rect_bbox(affine, rect)
    } else {
        transform_rect_scale_only(affine, rect)
    }
}

/// Inverse of `affine`, or `affine` itself when it is not invertible.
///
/// Degenerate transforms show up transiently during animation; they are not an
/// error and the forward transform stands in for the missing inverse.
pub fn inverse_or_self(affine: Affine) -> Affine {
    let det = affine.determinant();
    if det == 0.0 || !det.is_finite() {
        affine
    } else {
        affine.inverse()
    }
}

/// Widen a degenerate rectangle so that it always has a positive area.
///
/// The minimum extent is `epsilon` scaled into the local space described by
/// `global` (the node-to-root transform), so a widened rectangle is roughly
/// `epsilon` wide in root space. When only one dimension is thin it grows to
/// at least `other * epsilon`. The origin of the rectangle is kept.
pub fn normalize_rect(rect: Rect, global: Affine, epsilon: f64) -> Rect {
    let w = rect.width();
    let h = rect.height();
    if w >= epsilon && h >= epsilon {
        return rect;
    }
    let det = global.determinant().abs();
    let min_extent = if det > 0.0 && det.is_finite() {
        epsilon / det.sqrt()
    } else {
        epsilon
    };
    let (w, h) = if w < epsilon && h < epsilon {
        (min_extent, min_extent)
    } else if w < epsilon {
        (w.max(h * epsilon).max(min_extent), h)
    } else {
        (w, h.max(w * epsilon).max(min_extent))
    };
    Rect::new(rect.x0, rect.y0, rect.x0 + w, rect.y0 + h)
}

/// Intersection of two rectangles, or `None` when they do not touch.
///
/// Edges are inclusive, so a zero-height rectangle lying inside `b` still
/// yields a (zero-height) result.
pub fn overlap(a: Rect, b: Rect) -> Option<Rect> {
    if a.x0 > b.x1 || b.x0 > a.x1 || a.y0 > b.y1 || b.y0 > a.y1 {
        return None;
    }
    Some(Rect::new(
        a.x0.max(b.x0),
        a.y0.max(b.y0),
        a.x1.min(b.x1),
        a.y1.min(b.y1),
    ))
}

/// Union two optional rectangles; `None` contributes nothing.
pub fn union_opt(a: Option<Rect>, b: Option<Rect>) -> Option<Rect> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.union(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::FRAC_PI_2;

    #[test]
    fn scale_only_matches_full_path() {
        let r = Rect::new(1.0, 2.0, 5.0, 7.0);
        let t = Affine::new([-2.0, 0.0, 0.0, 3.0, 10.0, -4.0]);
        assert_eq!(
            transform_rect_scale_only(t, r),
            transform_rect_bbox(t, r),
            "negative scale must flip the rectangle"
        );
        assert!(!has_shear(t), "pure scale has no shear");
    }

    #[test]
    fn rotation_takes_full_path() {
        let r = Rect::new(0.0, 0.0, 10.0, 4.0);
        let t = Affine::rotate(FRAC_PI_2);
        assert!(has_shear(t), "rotation counts as shear");
        let out = transformed_rect(t, r);
        assert!((out.width() - 4.0).abs() < 1e-9, "rotated width: {out:?}");
        assert!((out.height() - 10.0).abs() < 1e-9, "rotated height: {out:?}");
    }

    #[test]
    fn singular_inverse_is_forward() {
        let t = Affine::scale_non_uniform(0.0, 2.0);
        assert_eq!(inverse_or_self(t), t);
        let t = Affine::translate((3.0, 4.0));
        assert_eq!(inverse_or_self(t), Affine::translate((-3.0, -4.0)));
    }

    #[test]
    fn thin_width_is_widened() {
        let r = Rect::new(2.0, 0.0, 2.0, 5.0);
        let n = normalize_rect(r, Affine::IDENTITY, DEFAULT_EPSILON);
        assert!(n.width() > 0.0, "width must become positive");
        assert!(n.width() >= DEFAULT_EPSILON, "width must reach epsilon");
        assert_eq!(n.height(), 5.0, "height unchanged");
        assert_eq!(n.origin(), r.origin(), "origin kept");
    }

    #[test]
    fn both_thin_scale_with_global_transform() {
        let r = Rect::new(1.0, 1.0, 1.0, 1.0);
        let n = normalize_rect(r, Affine::scale(4.0), DEFAULT_EPSILON);
        let expected = DEFAULT_EPSILON / 4.0;
        assert!((n.width() - expected).abs() < 1e-18, "width: {}", n.width());
        assert!((n.height() - expected).abs() < 1e-18, "height: {}", n.height());
    }

    #[test]
    fn regular_rect_untouched() {
        let r = Rect::new(0.0, 0.0, 3.0, 3.0);
        assert_eq!(normalize_rect(r, Affine::IDENTITY, DEFAULT_EPSILON), r);
    }

    #[test]
    fn overlap_is_edge_inclusive() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(
            overlap(a, Rect::new(10.0, 0.0, 20.0, 10.0)),
            Some(Rect::new(10.0, 0.0, 10.0, 10.0))
        );
        assert_eq!(overlap(a, Rect::new(11.0, 0.0, 20.0, 10.0)), None);
        let line = Rect::new(2.0, 5.0, 8.0, 5.0);
        assert_eq!(overlap(line, a), Some(line), "degenerate rect kept");
    }

    #[test]
    fn union_skips_none() {
        let a = Rect::new(0.0, 0.0, 1.0, 1.0);
        let b = Rect::new(2.0, 2.0, 3.0, 3.0);
        assert_eq!(union_opt(Some(a), None), Some(a));
        assert_eq!(union_opt(None, Some(b)), Some(b));
        assert_eq!(union_opt(Some(a), Some(b)), Some(Rect::new(0.0, 0.0, 3.0, 3.0)));
        assert_eq!(union_opt(None, None), None);
    }
}
