use std::collections::BTreeMap;
use std::fmt;

/// Builds the dimension prefix shared by every metric of a process.
///
/// Each of `service` and `env` contributes a `key=value,` fragment when it is non-empty after
/// trimming.
pub fn root_dimensions(service: &str, env: &str) -> String {
    let mut root = String::new();

    for (key, value) in [("service", service), ("env", env)] {
        let value = value.trim();
        if !value.is_empty() {
            root.push_str(key);
            root.push('=');
            root.push_str(value);
            root.push(',');
        }
    }

    root
}

/// Appends a raw dimension string to a base, terminating it with a comma.
pub fn extend_dimensions(base: &str, extra: &str) -> String {
    format!("{base}{extra},")
}

/// A set of dimension key-value pairs in canonical form.
///
/// Keys are trimmed and lowercased, values are trimmed. Pairs with an empty key or value are
/// dropped, and a key that appears multiple times keeps its last value. The [`Display`] output
/// is the wire form: pairs sorted by key, each rendered as `d.<key>=<value>` and joined by commas.
///
/// Two sets are equivalent exactly when their wire forms are equal. Values remain case-sensitive.
///
/// [`Display`]: fmt::Display
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct DimensionSet(BTreeMap<String, String>);

impl DimensionSet {
    /// Parses a raw, comma separated dimension string.
    ///
    /// Fragments that do not consist of exactly one key and one value separated by `=` are
    /// skipped.
    pub fn parse(raw: &str) -> Self {
        let mut pairs = BTreeMap::new();

        for fragment in raw.split(',') {
            let mut parts = fragment.split('=');
            let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
                continue;
            };

            let key = key.trim().to_lowercase();
            let value = value.trim();
            if key.is_empty() || value.is_empty() {
                continue;
            }

            pairs.insert(key, value.to_owned());
        }

        Self(pairs)
    }

    /// Returns the canonical wire form of a raw dimension string.
    pub fn canonicalize(raw: &str) -> String {
        Self::parse(raw).to_string()
    }

    /// Returns `true` if no valid pair survived parsing.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of pairs.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Iterates over all pairs sorted by key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Renders the set as a raw dimension string without the `d.` prefixes.
    ///
    /// Parsing the result yields an equal set.
    pub fn to_raw(&self) -> String {
        let mut raw = String::new();
        for (key, value) in self.iter() {
            if !raw.is_empty() {
                raw.push(',');
            }
            raw.push_str(key);
            raw.push('=');
            raw.push_str(value);
        }
        raw
    }
}

impl fmt::Display for DimensionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (key, value)) in self.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "d.{key}={value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn test_order_and_whitespace_insensitive() {
        assert_eq!(DimensionSet::canonicalize("b=2, a=1"), "d.a=1,d.b=2");
        assert_eq!(DimensionSet::canonicalize(" A = 1 , B = 2 "), "d.a=1,d.b=2");
    }

    #[test]
    fn test_canonicalization_idempotent() {
        for raw in [
            "service=GoGo,env=Test,api=PublishMetric,",
            " Location = Dublin ,api=x=y, ,=,A=b,a=c",
            "",
        ] {
            let set = DimensionSet::parse(raw);
            let reparsed = DimensionSet::parse(&set.to_raw());
            assert_eq!(reparsed, set);
            assert_eq!(reparsed.to_string(), set.to_string());
        }
    }

    #[test]
    fn test_drops_malformed_fragments() {
        let set = DimensionSet::parse("api=x=y,noequals,=value,key=,  ,location=Dublin");
        assert_eq!(set.to_string(), "d.location=Dublin");
    }

    #[test]
    fn test_last_write_wins() {
        let set = DimensionSet::parse("api=first,API=second");
        assert_eq!(set.get("api"), Some("second"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_values_case_sensitive() {
        assert_ne!(
            DimensionSet::canonicalize("location=Dublin"),
            DimensionSet::canonicalize("location=dublin")
        );
    }

    #[test]
    fn test_empty() {
        assert!(DimensionSet::parse("").is_empty());
        assert!(DimensionSet::parse(",,,").is_empty());
        assert_eq!(DimensionSet::canonicalize("a=,=b"), "");
    }

    #[test]
    fn test_root_dimensions() {
        assert_eq!(root_dimensions(" GoGo ", "Test"), "service=GoGo,env=Test,");
        assert_eq!(root_dimensions("GoGo", "  "), "service=GoGo,");
        assert_eq!(root_dimensions("", ""), "");
    }

    #[test]
    fn test_extend_dimensions() {
        let root = root_dimensions("GoGo", "");
        let extended = extend_dimensions(&root, "api=PublishMetric,location=Dublin");
        assert_eq!(extended, "service=GoGo,api=PublishMetric,location=Dublin,");
        assert_eq!(
            DimensionSet::canonicalize(&extended),
            "d.api=PublishMetric,d.location=Dublin,d.service=GoGo"
        );
    }
}
