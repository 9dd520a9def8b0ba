use rand::distr::uniform::SampleUniform;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A closed interval `[min, max]` that a transform samples one parameter
/// from per invocation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransformRange<T> {
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd + Copy> TransformRange<T> {
    /// Creates a range, swapping the bounds if they are given in reverse.
    pub fn new(a: T, b: T) -> Self {
        if b < a {
            Self { min: b, max: a }
        } else {
            Self { min: a, max: b }
        }
    }

    /// A range that always yields `value`.
    pub fn fixed(value: T) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    pub fn contains(&self, value: T) -> bool {
        self.min <= value && value <= self.max
    }
}

impl<T: SampleUniform + PartialOrd + Copy> TransformRange<T> {
    /// Draws one value uniformly from the closed range.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> T {
        let ordered = Self::new(self.min, self.max);
        rng.random_range(ordered.min..=ordered.max)
    }
}

impl TransformRange<f64> {
    pub(crate) fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }
}
