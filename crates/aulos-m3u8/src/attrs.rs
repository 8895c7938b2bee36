//! Attribute-list grammar shared by the tag parsers.
//!
//! Comma-separated `KEY=VALUE` pairs where a value is either a double-quoted
//! string or an unquoted run. Keys are case-sensitive; order is arbitrary.

use crate::ParseError;

/// One parsed attribute value, with quoting preserved for client attributes.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AttrValue {
    pub value: String,
    pub quoted: bool,
}

/// Attribute list of a single tag, in manifest order.
#[derive(Debug, Default)]
pub(crate) struct AttrList {
    entries: Vec<(String, AttrValue)>,
}

impl AttrList {
    /// Split `KEY=VALUE,...` respecting double quotes.
    pub fn parse(input: &str, line: usize) -> Result<Self, ParseError> {
        let mut entries = Vec::new();
        let mut rest = input;

        while !rest.is_empty() {
            let eq = rest.find('=').ok_or_else(|| {
                ParseError::at(line, format!("attribute without '=': {rest:?}"))
            })?;
            let key = rest[..eq].trim().to_string();
            rest = &rest[eq + 1..];

            let (value, quoted, consumed) = if let Some(stripped) = rest.strip_prefix('"') {
                let close = stripped.find('"').ok_or_else(|| {
                    ParseError::at(line, format!("unterminated quoted value for {key}"))
                })?;
                (stripped[..close].to_string(), true, close + 2)
            } else {
                let end = rest.find(',').unwrap_or(rest.len());
                (rest[..end].trim().to_string(), false, end)
            };

            rest = &rest[consumed..];
            rest = rest.strip_prefix(',').unwrap_or(rest);

            entries.push((key, AttrValue { value, quoted }));
        }

        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.value.clone())
    }

    /// Mandatory attribute lookup; absence is a parse failure.
    pub fn require(&self, key: &str, tag: &str, line: usize) -> Result<String, ParseError> {
        self.get_str(key)
            .ok_or_else(|| ParseError::at(line, format!("{tag} is missing {key}")))
    }

    pub fn get_u64(&self, key: &str, line: usize) -> Result<Option<u64>, ParseError> {
        self.get(key)
            .map(|v| {
                v.value
                    .parse::<u64>()
                    .map_err(|_| ParseError::at(line, format!("{key} is not an integer: {:?}", v.value)))
            })
            .transpose()
    }

    pub fn get_f64(&self, key: &str, line: usize) -> Result<Option<f64>, ParseError> {
        self.get(key)
            .map(|v| {
                v.value
                    .parse::<f64>()
                    .map_err(|_| ParseError::at(line, format!("{key} is not a number: {:?}", v.value)))
            })
            .transpose()
    }

    /// `YES`/`NO` flags; absence means `NO`.
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| v.value == "YES")
    }

    /// All entries, for `X-*` client-attribute collection.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_quoted_and_unquoted() {
        let attrs = AttrList::parse(
            r#"BANDWIDTH=1280000,CODECS="avc1.42c01e,mp4a.40.2",RESOLUTION=854x480"#,
            1,
        )
        .unwrap();

        assert_eq!(attrs.get_str("BANDWIDTH").as_deref(), Some("1280000"));
        assert_eq!(
            attrs.get_str("CODECS").as_deref(),
            Some("avc1.42c01e,mp4a.40.2")
        );
        assert!(attrs.get("CODECS").unwrap().quoted);
        assert_eq!(attrs.get_str("RESOLUTION").as_deref(), Some("854x480"));
        assert!(!attrs.get("RESOLUTION").unwrap().quoted);
    }

    #[test]
    fn arbitrary_order_and_missing_keys() {
        let attrs = AttrList::parse(r#"NAME="English",TYPE=AUDIO,GROUP-ID="aud""#, 1).unwrap();
        assert_eq!(attrs.get_str("TYPE").as_deref(), Some("AUDIO"));
        assert!(attrs.get("LANGUAGE").is_none());
        assert!(attrs.require("URI", "EXT-X-MEDIA", 1).is_err());
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        let err = AttrList::parse(r#"URI="init.mp4"#, 7).unwrap_err();
        assert_eq!(err.line, Some(7));
    }
}
