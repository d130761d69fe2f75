//! Product code type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`ProductCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProductCodeError {
    /// The input string is empty or whitespace.
    #[error("product code cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("product code must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains characters outside `[A-Za-z0-9_-]`.
    #[error("product code contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// A fuel product code (e.g. `GAS_C`, `DIESEL_S10`).
///
/// Product codes are normalized to uppercase with surrounding whitespace
/// removed, so `" gas_c "` and `"GAS_C"` name the same product.
///
/// ## Constraints
///
/// - Length: 1-32 characters after trimming
/// - Characters: ASCII letters, digits, `_` and `-`
///
/// ## Examples
///
/// ```
/// use fuelcost_core::ProductCode;
///
/// assert_eq!(ProductCode::parse(" diesel_s10 ").unwrap().as_str(), "DIESEL_S10");
/// assert!(ProductCode::parse("").is_err());
/// assert!(ProductCode::parse("GAS C").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct ProductCode(String);

impl ProductCode {
    /// Maximum length of a product code.
    pub const MAX_LENGTH: usize = 32;

    /// Parse a `ProductCode` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty, longer than
    /// [`Self::MAX_LENGTH`], or contains characters other than ASCII
    /// alphanumerics, `_` and `-`.
    pub fn parse(s: &str) -> Result<Self, ProductCodeError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ProductCodeError::Empty);
        }

        if trimmed.len() > Self::MAX_LENGTH {
            return Err(ProductCodeError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if let Some(bad) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(ProductCodeError::InvalidCharacter(bad));
        }

        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Returns the product code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `ProductCode` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ProductCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ProductCode {
    type Err = ProductCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ProductCode {
    type Error = ProductCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProductCode> for String {
    fn from(code: ProductCode) -> Self {
        code.0
    }
}

impl AsRef<str> for ProductCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for ProductCode {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ProductCode {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Database values are assumed normalized
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for ProductCode {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
