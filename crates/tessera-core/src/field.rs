//! Field descriptors and the [`FieldSet`] bitset.

use crate::id::FieldId;

/// Per-cell data type of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    /// One `f32` per cell.
    Scalar,
    /// A fixed-length vector of `f32` per cell, stored interleaved.
    Vector {
        /// Number of components per cell.
        dims: u32,
    },
    /// A discrete label per cell, stored as an `f32` index.
    Categorical {
        /// Number of categories.
        n_values: u32,
    },
}

impl FieldType {
    /// Number of `f32` slots a single cell occupies.
    pub fn components(&self) -> usize {
        match self {
            Self::Scalar | Self::Categorical { .. } => 1,
            Self::Vector { dims } => *dims as usize,
        }
    }
}

/// What happens to a field value that leaves its declared bounds.
///
/// This is value-level behavior and has nothing to do with the topology's
/// edge handling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundaryBehavior {
    /// Clamp to the nearest bound.
    Clamp,
    /// Reflect off the bound.
    Reflect,
    /// Set to the bound that was crossed.
    Absorb,
    /// Wrap around to the opposite bound.
    Wrap,
}

impl BoundaryBehavior {
    /// Map `value` back into `[lo, hi]`.
    pub fn apply(self, value: f32, lo: f32, hi: f32) -> f32 {
        if value >= lo && value <= hi {
            return value;
        }
        let span = hi - lo;
        match self {
            Self::Clamp | Self::Absorb => value.clamp(lo, hi),
            Self::Wrap if span > 0.0 => lo + (value - lo).rem_euclid(span),
            Self::Reflect if span > 0.0 => {
                let period = 2.0 * span;
                let t = (value - lo).rem_euclid(period);
                if t <= span {
                    lo + t
                } else {
                    hi - (t - span)
                }
            }
            Self::Wrap | Self::Reflect => lo,
        }
    }
}

/// Lifetime class of a field buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldMutability {
    /// Written once at construction and never by propagators or commands.
    Static,
    /// Rewritten in full every tick by its propagator.
    PerTick,
    /// Persists across ticks until something writes it.
    Sparse,
}

/// Declaration of a field registered on a world.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    /// Human-readable name, used in logs and error messages.
    pub name: String,
    /// Per-cell data type.
    pub field_type: FieldType,
    /// Lifetime class.
    pub mutability: FieldMutability,
    /// Optional unit annotation such as `"mol/m^3"`.
    pub units: Option<String>,
    /// Optional `(min, max)` value bounds.
    pub bounds: Option<(f32, f32)>,
    /// Applied to committed values when `bounds` is set.
    pub boundary_behavior: BoundaryBehavior,
}

impl FieldDef {
    /// A scalar field with no bounds or units.
    pub fn scalar(name: impl Into<String>, mutability: FieldMutability) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Scalar,
            mutability,
            units: None,
            bounds: None,
            boundary_behavior: BoundaryBehavior::Clamp,
        }
    }

    /// Buffer length for this field over `cell_count` cells.
    pub fn buffer_len(&self, cell_count: usize) -> usize {
        cell_count * self.field_type.components()
    }
}

/// A set of field IDs stored as a growable bitset.
///
/// Propagators declare their read and write sets with this type so the
/// pipeline validator can reason about them with cheap set algebra.
#[derive(Clone, Debug, Default)]
pub struct FieldSet {
    words: Vec<u64>,
}

const WORD_BITS: usize = 64;

fn split(field: FieldId) -> (usize, u64) {
    let i = field.0 as usize;
    (i / WORD_BITS, 1u64 << (i % WORD_BITS))
}

impl FieldSet {
    /// The empty set.
    pub fn empty() -> Self {
        Self { words: Vec::new() }
    }

    /// Add `field` to the set.
    pub fn insert(&mut self, field: FieldId) {
        let (word, mask) = split(field);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= mask;
    }

    /// Remove `field` from the set.
    pub fn remove(&mut self, field: FieldId) {
        let (word, mask) = split(field);
        if let Some(w) = self.words.get_mut(word) {
            *w &= !mask;
        }
        self.trim();
    }

    /// Whether `field` is in the set.
    pub fn contains(&self, field: FieldId) -> bool {
        let (word, mask) = split(field);
        self.words.get(word).is_some_and(|w| w & mask != 0)
    }

    fn word(&self, i: usize) -> u64 {
        self.words.get(i).copied().unwrap_or(0)
    }

    fn trim(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
    }

    fn zip_with(&self, other: &Self, len: usize, op: impl Fn(u64, u64) -> u64) -> Self {
        let mut out = Self {
            words: (0..len).map(|i| op(self.word(i), other.word(i))).collect(),
        };
        out.trim();
        out
    }

    /// `self ∪ other`.
    pub fn union(&self, other: &Self) -> Self {
        self.zip_with(other, self.words.len().max(other.words.len()), |a, b| a | b)
    }

    /// `self ∩ other`.
    pub fn intersection(&self, other: &Self) -> Self {
        self.zip_with(other, self.words.len().min(other.words.len()), |a, b| a & b)
    }

    /// `self \ other`.
    pub fn difference(&self, other: &Self) -> Self {
        self.zip_with(other, self.words.len(), |a, b| a & !b)
    }

    /// Whether every member of `self` is also in `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        self.words
            .iter()
            .enumerate()
            .all(|(i, &w)| w & !other.word(i) == 0)
    }

    /// Whether the set has no members.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Members in ascending order.
    pub fn iter(&self) -> FieldSetIter<'_> {
        FieldSetIter {
            words: &self.words,
            word: 0,
            pending: self.words.first().copied().unwrap_or(0),
        }
    }
}

impl PartialEq for FieldSet {
    fn eq(&self, other: &Self) -> bool {
        let len = self.words.len().max(other.words.len());
        (0..len).all(|i| self.word(i) == other.word(i))
    }
}

impl Eq for FieldSet {}

impl FromIterator<FieldId> for FieldSet {
    fn from_iter<I: IntoIterator<Item = FieldId>>(iter: I) -> Self {
        let mut set = Self::empty();
        for field in iter {
            set.insert(field);
        }
        set
    }
}

impl<'a> IntoIterator for &'a FieldSet {
    type Item = FieldId;
    type IntoIter = FieldSetIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Ascending iterator over a [`FieldSet`].
pub struct FieldSetIter<'a> {
    words: &'a [u64],
    word: usize,
    pending: u64,
}

impl Iterator for FieldSetIter<'_> {
    type Item = FieldId;

    fn next(&mut self) -> Option<FieldId> {
        loop {
            if self.pending != 0 {
                let bit = self.pending.trailing_zeros() as usize;
                self.pending &= self.pending - 1;
                return Some(FieldId((self.word * WORD_BITS + bit) as u32));
            }
            self.word += 1;
            if self.word >= self.words.len() {
                return None;
            }
            self.pending = self.words[self.word];
        }
    }
}
