// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public value types: node identifiers, compositing, hints, and pointer sensitivity.

use peniko::{BlendMode, Compose, Mix};
use smallvec::SmallVec;

/// Identifier for a node in the tree (generational).
///
/// Ids are never reused with the same generation, so holding an id is a weak
/// association: once the slot is freed, lookups report the node as gone.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// How a node's output is blended into what is already on the canvas.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Composite {
    /// Blend and Porter-Duff mode.
    pub blend: BlendMode,
    /// Group opacity in `0.0..=1.0`.
    pub alpha: f32,
}

impl Composite {
    /// Plain source-over at full opacity.
    pub const SRC_OVER: Self = Self {
        blend: BlendMode::new(Mix::Normal, Compose::SrcOver),
        alpha: 1.0,
    };

    /// Source-over at the given opacity.
    pub const fn alpha(alpha: f32) -> Self {
        Self {
            blend: Self::SRC_OVER.blend,
            alpha,
        }
    }

    /// True when this is a normal source-over blend (any alpha).
    pub fn is_simple_alpha(&self) -> bool {
        self.blend.mix == Mix::Normal && self.blend.compose == Compose::SrcOver
    }

    /// True when drawing with this composite needs no intermediate layer.
    pub fn is_src_over(&self) -> bool {
        self.is_simple_alpha() && self.alpha >= 1.0
    }
}

impl Default for Composite {
    fn default() -> Self {
        Self::SRC_OVER
    }
}

/// Rendering hint keys understood by the tree.
///
/// Canvases may ignore any of these; the tree itself only reads
/// [`HintKey::Transcoding`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum HintKey {
    /// Geometry antialiasing.
    Antialiasing,
    /// Overall speed/quality trade-off.
    Rendering,
    /// Color conversion quality.
    ColorRendering,
    /// Image resampling quality.
    Interpolation,
    /// Whether strokes may be normalized to pixel centers.
    StrokeControl,
    /// What kind of output the canvas ultimately produces.
    Transcoding,
}

/// Values for [`HintKey`]s.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum HintValue {
    /// Let the canvas decide.
    Default,
    /// Favor speed.
    Speed,
    /// Favor quality.
    Quality,
    /// Enable the hinted behavior.
    On,
    /// Disable the hinted behavior.
    Off,
    /// Output is a printer.
    Printing,
    /// Output is a vector format; rasterization tricks are pointless.
    Vector,
}

/// A small keyed map of rendering hints.
///
/// Later inserts replace earlier values for the same key.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderingHints {
    entries: SmallVec<[(HintKey, HintValue); 4]>,
}

impl RenderingHints {
    /// Create an empty hint set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: HintKey, value: HintValue) -> Self {
        self.insert(key, value);
        self
    }

    /// Set `key` to `value`, returning the previous value.
    pub fn insert(&mut self, key: HintKey, value: HintValue) -> Option<HintValue> {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            return Some(core::mem::replace(&mut entry.1, value));
        }
        self.entries.push((key, value));
        None
    }

    /// Look up a hint.
    pub fn get(&self, key: HintKey) -> Option<HintValue> {
        self.entries
            .iter()
            .find_map(|(k, v)| (*k == key).then_some(*v))
    }

    /// Remove a hint, returning its value.
    pub fn remove(&mut self, key: HintKey) -> Option<HintValue> {
        let pos = self.entries.iter().position(|(k, _)| *k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Copy every entry of `other` over this set.
    pub fn merge(&mut self, other: &Self) {
        for &(k, v) in &other.entries {
            self.insert(k, v);
        }
    }

    /// True when no hints are set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (HintKey, HintValue)> + '_ {
        self.entries.iter().copied()
    }

    /// True when the output is a printer or vector format.
    pub(crate) fn is_vector_output(&self) -> bool {
        matches!(
            self.get(HintKey::Transcoding),
            Some(HintValue::Printing | HintValue::Vector)
        )
    }
}

/// Which parts of a node respond to pointer events.
///
/// Mirrors the SVG `pointer-events` property.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum PointerEvents {
    /// Painted fill or stroke, only while visible.
    #[default]
    VisiblePainted,
    /// Fill area, only while visible.
    VisibleFill,
    /// Stroke area, only while visible.
    VisibleStroke,
    /// Fill or stroke area, only while visible.
    Visible,
    /// Painted fill or stroke, regardless of visibility.
    Painted,
    /// Fill area, regardless of visibility.
    Fill,
    /// Stroke area, regardless of visibility.
    Stroke,
    /// Fill or stroke area, regardless of visibility.
    All,
    /// Never a hit target.
    None,
}

bitflags::bitflags! {
    /// Decomposed form of [`PointerEvents`] used by hit testing.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Sensitivity: u8 {
        /// Node must be visible.
        const VISIBLE = 0b0000_0001;
        /// Only areas that actually receive paint count.
        const PAINTED = 0b0000_0010;
        /// Fill area counts.
        const FILL    = 0b0000_0100;
        /// Stroke area counts.
        const STROKE  = 0b0000_1000;
    }
}

impl PointerEvents {
    /// Flags describing what this mode accepts.
    pub fn sensitivity(self) -> Sensitivity {
        use Sensitivity as S;
        match self {
            Self::VisiblePainted => S::VISIBLE | S::PAINTED | S::FILL | S::STROKE,
            Self::VisibleFill => S::VISIBLE | S::FILL,
            Self::VisibleStroke => S::VISIBLE | S::STROKE,
            Self::Visible => S::VISIBLE | S::FILL | S::STROKE,
            Self::Painted => S::PAINTED | S::FILL | S::STROKE,
            Self::Fill => S::FILL,
            Self::Stroke => S::STROKE,
            Self::All => S::FILL | S::STROKE,
            Self::None => S::empty(),
        }
    }

    /// Whether a node with the given visibility can be hit at all.
    pub fn accepts_visibility(self, visible: bool) -> bool {
        let s = self.sensitivity();
        !s.is_empty() && (visible || !s.contains(Sensitivity::VISIBLE))
    }
}

/// Pixel color space a canvas renders in.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum ColorModel {
    /// Gamma-encoded sRGB.
    #[default]
    Srgb,
    /// Linear-light sRGB primaries.
    LinearSrgb,
}
