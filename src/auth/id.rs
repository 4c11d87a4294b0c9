//! Strongly typed identifiers for tenants, connectors, and provider types.
//!
//! Tenant and connector identifiers are opaque keys minted by the hosting platform, so only
//! emptiness, length, and invisible characters are rejected. Provider type tags are part of
//! the registry contract and must be lowercase slugs such as `oidc` or `google-workspace`.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $rule:expr, $doc:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			const RULE: IdRule = $rule;

			/// Validates `value` and wraps it.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let value = value.as_ref();

				Self::RULE.check(value)?;

				Ok(Self(value.to_owned()))
			}

			/// Wraps a compile-time identifier.
			///
			/// Debug builds panic when `value` breaks the identifier rules.
			pub fn from_static(value: &'static str) -> Self {
				debug_assert!(Self::RULE.check(value).is_ok(), "Static identifier must be valid.");

				Self(value.to_owned())
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &str {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				Self::RULE.check(&value)?;

				Ok(Self(value))
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, "{}({})", Self::RULE.kind, self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
	};
}

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Identifier kind, such as `Connector`.
		kind: &'static str,
	},
	/// The identifier exceeded the allowed length.
	#[error("{kind} identifier exceeds {max} bytes.")]
	TooLong {
		/// Identifier kind, such as `Connector`.
		kind: &'static str,
		/// Maximum permitted byte length.
		max: usize,
	},
	/// The identifier contains a character its kind does not allow.
	#[error("{kind} identifier contains the disallowed character {found:?}.")]
	InvalidCharacter {
		/// Identifier kind, such as `Connector`.
		kind: &'static str,
		/// First offending character.
		found: char,
	},
}

/// Validation rule attached to each identifier type.
#[derive(Clone, Copy, Debug)]
struct IdRule {
	kind: &'static str,
	max_len: usize,
	slug: bool,
}
impl IdRule {
	const OPAQUE: usize = 128;
	const SLUG: usize = 64;

	fn check(self, value: &str) -> Result<(), IdentifierError> {
		let kind = self.kind;

		if value.is_empty() {
			return Err(IdentifierError::Empty { kind });
		}
		if value.len() > self.max_len {
			return Err(IdentifierError::TooLong { kind, max: self.max_len });
		}

		let offending = if self.slug {
			value.char_indices().find(|&(i, c)| !is_slug_char(i, c))
		} else {
			value.char_indices().find(|&(_, c)| c.is_whitespace() || c.is_control())
		};

		match offending {
			Some((_, found)) => Err(IdentifierError::InvalidCharacter { kind, found }),
			None => Ok(()),
		}
	}
}

def_id! {
	TenantId,
	IdRule { kind: "Tenant", max_len: IdRule::OPAQUE, slug: false },
	"Identifier of the tenant that owns a connector."
}
def_id! {
	ConnectorId,
	IdRule { kind: "Connector", max_len: IdRule::OPAQUE, slug: false },
	"Identifier of a stored connector record."
}
def_id! {
	ProviderTypeId,
	IdRule { kind: "ProviderType", max_len: IdRule::SLUG, slug: true },
	"Provider type tag (for example `oidc`) used to select a factory."
}

// Slugs start with a letter and continue with lowercase letters, digits, `-` or `_`.
fn is_slug_char(index: usize, c: char) -> bool {
	match c {
		'a'..='z' => true,
		'0'..='9' | '-' | '_' => index > 0,
		_ => false,
	}
}
