//! Validated primitive types shared by the ledger crates.

/// Errors that can occur when creating validated types.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    /// A numeric value was outside its permitted range
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
}

/// A string type that guarantees non-empty content.
///
/// The input is trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// Returns `Err(TextError::Empty)` if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Therapy units attended on one calendar day.
///
/// Units are a non-negative real number stored with two decimal places, so the largest
/// representable value is `99.99`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Units(f64);

impl Units {
    pub const MAX: f64 = 99.99;

    pub fn new(value: f64) -> Result<Self, TextError> {
        if !value.is_finite() || !(0.0..=Self::MAX).contains(&value) {
            return Err(TextError::OutOfRange {
                field: "unitsAttended",
                min: 0.0,
                max: Self::MAX,
                value,
            });
        }
        Ok(Self((value * 100.0).round() / 100.0))
    }

    pub fn zero() -> Self {
        Self(0.0)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Units {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_f64(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Units {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let v = f64::deserialize(deserializer)?;
        Units::new(v).map_err(serde::de::Error::custom)
    }
}

/// A whole-number percentage in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Percentage(u8);

impl Percentage {
    pub fn new(value: i64) -> Result<Self, TextError> {
        if !(0..=100).contains(&value) {
            return Err(TextError::OutOfRange {
                field: "percentageComplete",
                min: 0.0,
                max: 100.0,
                value: value as f64,
            });
        }
        Ok(Self(value as u8))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl serde::Serialize for Percentage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Percentage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let v = i64::deserialize(deserializer)?;
        Percentage::new(v).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_text_trims_input() {
        let text = NonEmptyText::new("  Dr. Rivera ").unwrap();
        assert_eq!(text.as_str(), "Dr. Rivera");
    }

    #[test]
    fn test_non_empty_text_rejects_whitespace() {
        assert_eq!(NonEmptyText::new("   ").unwrap_err(), TextError::Empty);
    }

    #[test]
    fn test_units_rejects_negative_and_non_finite() {
        assert!(Units::new(-0.5).is_err());
        assert!(Units::new(f64::NAN).is_err());
        assert!(Units::new(f64::INFINITY).is_err());
        assert!(Units::new(100.0).is_err());
    }

    #[test]
    fn test_units_rounds_to_two_decimals() {
        assert_eq!(Units::new(3.456).unwrap().value(), 3.46);
        assert_eq!(Units::new(0.0).unwrap(), Units::zero());
    }

    #[test]
    fn test_percentage_bounds() {
        assert_eq!(Percentage::new(0).unwrap().value(), 0);
        assert_eq!(Percentage::new(100).unwrap().value(), 100);
        assert!(Percentage::new(101).is_err());
        assert!(Percentage::new(-1).is_err());
    }

    #[test]
    fn test_units_deserialize_validates() {
        let ok: Units = serde_json::from_str("4").unwrap();
        assert_eq!(ok.value(), 4.0);
        assert!(serde_json::from_str::<Units>("-1").is_err());
    }
}
