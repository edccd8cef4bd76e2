//! Fixed-point math utilities.
//!
//! World positions, slopes, durations and construction progress are all
//! fixed-point so that validation and construction give identical answers on
//! every platform. Floats only appear at the serialization boundary, where
//! hand-written RON content is read.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all engine math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Fixed-point 2D vector used for world-space positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Create a vector from integer coordinates.
    #[must_use]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Multiply both components by a scalar.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Component-wise addition, clamping at the representable range.
    #[must_use]
    pub fn saturating_add(self, rhs: Self) -> Self {
        Self::new(self.x.saturating_add(rhs.x), self.y.saturating_add(rhs.y))
    }

    /// Component-wise subtraction, clamping at the representable range.
    #[must_use]
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self::new(self.x.saturating_sub(rhs.x), self.y.saturating_sub(rhs.y))
    }
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

/// `numerator / denominator` clamped to `[0, 1]`.
///
/// A non-positive denominator counts as already finished and yields one.
#[must_use]
pub fn ratio_clamped(numerator: Fixed, denominator: Fixed) -> Fixed {
    if denominator <= Fixed::ZERO {
        return Fixed::ONE;
    }
    if numerator <= Fixed::ZERO {
        return Fixed::ZERO;
    }
    if numerator >= denominator {
        return Fixed::ONE;
    }
    (numerator / denominator).clamp(Fixed::ZERO, Fixed::ONE)
}

/// Serde support for fixed-point numbers as plain decimals.
///
/// Content files are authored by hand, so values are written as `2.5` rather
/// than as raw bit patterns.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as a decimal.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_num::<f64>().serialize(serializer)
    }

    /// Deserialize a fixed-point number from a decimal.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = f64::deserialize(deserializer)?;
        Fixed::checked_from_num(raw)
            .ok_or_else(|| serde::de::Error::custom(format!("{raw} is out of fixed-point range")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_add_sub() {
        let a = Vec2Fixed::from_ints(3, 4);
        let b = Vec2Fixed::from_ints(1, 2);
        assert_eq!(a + b, Vec2Fixed::from_ints(4, 6));
        assert_eq!(a - b, Vec2Fixed::from_ints(2, 2));
    }

    #[test]
    fn test_vec2_saturating_ops_clamp() {
        let far = Vec2Fixed::new(Fixed::MAX, Fixed::MIN);
        let one = Vec2Fixed::from_ints(1, 1);
        assert_eq!(far.saturating_add(one), Vec2Fixed::new(Fixed::MAX, Fixed::MIN + Fixed::ONE));
        assert_eq!(far.saturating_sub(one), Vec2Fixed::new(Fixed::MAX - Fixed::ONE, Fixed::MIN));
    }

    #[test]
    fn test_vec2_scale() {
        let v = Vec2Fixed::from_ints(2, -3).scale(Fixed::from_num(0.5));
        assert_eq!(v, Vec2Fixed::new(Fixed::from_num(1), Fixed::from_num(-1.5)));
    }

    #[test]
    fn test_ratio_clamped() {
        let ten = Fixed::from_num(10);
        assert_eq!(ratio_clamped(Fixed::from_num(5), ten), Fixed::from_num(0.5));
        assert_eq!(ratio_clamped(Fixed::from_num(15), ten), Fixed::ONE);
        assert_eq!(ratio_clamped(Fixed::from_num(-1), ten), Fixed::ZERO);
        assert_eq!(ratio_clamped(Fixed::from_num(3), Fixed::ZERO), Fixed::ONE);
    }

    #[test]
    fn test_fixed_serde_decimal_round_trip() {
        let v = Vec2Fixed::new(Fixed::from_num(2.5), Fixed::from_num(-0.25));
        let text = ron::to_string(&v).unwrap();
        assert!(text.contains("2.5"));
        let back: Vec2Fixed = ron::from_str(&text).unwrap();
        assert_eq!(back, v);
    }
}
