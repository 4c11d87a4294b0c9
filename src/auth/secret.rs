//! Redacting wrappers for client secrets and issued tokens.

// self
use crate::_prelude::*;

const REDACTED: &str = "<redacted>";

/// Redacted secret wrapper keeping sensitive material out of logs and error detail.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);
impl Secret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for Secret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Secret").field(&REDACTED).finish()
	}
}
impl Display for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(REDACTED)
	}
}

/// Returns a copy of a raw connector config with every secret-bearing value replaced.
///
/// Any object key whose lowercase form contains `secret` or `password` is redacted, at any
/// depth, so nested provider configs are covered too.
pub fn redact_config(config: &serde_json::Value) -> serde_json::Value {
	match config {
		serde_json::Value::Object(map) => serde_json::Value::Object(
			map.iter()
				.map(|(key, value)| {
					let value = if is_secret_key(key) {
						serde_json::Value::String(REDACTED.into())
					} else {
						redact_config(value)
					};

					(key.clone(), value)
				})
				.collect(),
		),
		serde_json::Value::Array(items) =>
			serde_json::Value::Array(items.iter().map(redact_config).collect()),
		other => other.clone(),
	}
}

pub(crate) fn is_secret_key(key: &str) -> bool {
	let key = key.to_ascii_lowercase();

	key.contains("secret") || key.contains("password")
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn secret_formatters_redact() {
		let secret = Secret::new("super-secret");

		assert_eq!(format!("{secret:?}"), "Secret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
	}

	#[test]
	fn config_redaction_covers_nested_keys() {
		let raw = serde_json::json!({
			"issuer": "https://idp.example",
			"clientSecret": "hunter2",
			"nested": [{ "client_secret": "hunter3", "keep": 1 }],
		});
		let redacted = redact_config(&raw);
		let rendered = redacted.to_string();

		assert!(!rendered.contains("hunter2"));
		assert!(!rendered.contains("hunter3"));
		assert_eq!(redacted["issuer"], "https://idp.example");
		assert_eq!(redacted["nested"][0]["keep"], 1);
		assert_eq!(redacted["clientSecret"], REDACTED);
	}
}
