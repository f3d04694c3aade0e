use derive_more::Deref;
use perf_dashboard_config::TimeRange;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    Name(&'static str),
    Id(u64),
    Ids(Vec<u64>),
    Range(TimeRange),
    /// A target that is not known yet.
    Null,
}

impl From<&'static str> for KeyPart {
    fn from(name: &'static str) -> Self {
        KeyPart::Name(name)
    }
}

impl From<u64> for KeyPart {
    fn from(id: u64) -> Self {
        KeyPart::Id(id)
    }
}

impl From<Option<u64>> for KeyPart {
    fn from(id: Option<u64>) -> Self {
        id.map(KeyPart::Id).unwrap_or(KeyPart::Null)
    }
}

impl From<&[u64]> for KeyPart {
    fn from(ids: &[u64]) -> Self {
        KeyPart::Ids(ids.to_vec())
    }
}

impl From<TimeRange> for KeyPart {
    fn from(range: TimeRange) -> Self {
        KeyPart::Range(range)
    }
}

impl std::fmt::Display for KeyPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyPart::Name(name) => write!(f, "{name:?}"),
            KeyPart::Id(id) => write!(f, "{id}"),
            KeyPart::Ids(ids) => write!(f, "{ids:?}"),
            KeyPart::Range(range) => write!(f, "\"{range}\""),
            KeyPart::Null => f.write_str("null"),
        }
    }
}

/// Hierarchical address of a cached query: a resource family followed by ever narrower qualifiers.
///
/// Two keys built from the same parameters are equal. A key addresses itself and every key it is a prefix of.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deref)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    pub fn root(name: &'static str) -> Self {
        Self(vec![KeyPart::Name(name)])
    }

    pub fn from_parts(parts: Vec<KeyPart>) -> Self {
        Self(parts)
    }

    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{part}")?;
        }
        f.write_str("]")
    }
}

/// Builds a [`QueryKey`] from anything convertible into a [`KeyPart`].
#[macro_export]
macro_rules! query_key {
    ($($part:expr),* $(,)?) => {
        $crate::cache::QueryKey::from_parts(vec![$($crate::cache::KeyPart::from($part)),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn identical_parameters_give_equal_keys() {
        let a = query_key!["collectors", "detail", 3u64, "metrics", "cpu", TimeRange::Day];
        let b = QueryKey::root("collectors")
            .with("detail")
            .with(3u64)
            .with("metrics")
            .with("cpu")
            .with(TimeRange::Day);
        assert_eq!(a, b);
        assert_ne!(a, query_key!["collectors", "detail", 3u64, "metrics", "cpu", TimeRange::Week]);
    }

    #[test]
    fn prefixes_address_descendants() {
        let detail = query_key!["collectors", "detail", 3u64];
        assert!(query_key!["collectors", "detail", 3u64, "metrics", "cpu", TimeRange::Day].starts_with(&detail));
        assert!(detail.starts_with(&detail));
        assert!(!query_key!["collectors", "detail", 30u64].starts_with(&detail));
        assert!(!query_key!["collectors", "list"].starts_with(&detail));
    }

    #[test]
    fn displays_like_a_json_array() {
        let key = query_key!["collectors", "compare", &[1u64, 2][..], TimeRange::SixHours];
        assert_eq!(key.to_string(), r#"["collectors","compare",[1, 2],"6h"]"#);
        assert_eq!(query_key!["collectors", "detail", None::<u64>].to_string(), r#"["collectors","detail",null]"#);
    }
}
