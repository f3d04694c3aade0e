//! Canonical query strings for API requests and dashboard locations.

use perf_dashboard_config::TimeRange;
use url::form_urlencoded;

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Never encoded.
    Absent,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Encoded as one comma separated value.
    List(Vec<String>),
}

impl ParamValue {
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: ToString,
    {
        ParamValue::List(items.into_iter().map(|item| item.to_string()).collect())
    }

    /// `None` for values that are left out of the query string.
    fn encoded(&self) -> Option<String> {
        match self {
            ParamValue::Absent => None,
            ParamValue::Text(text) if text.is_empty() => None,
            ParamValue::Text(text) => Some(text.clone()),
            ParamValue::Number(number) if number.is_infinite() => {
                Some(if *number > 0.0 { "Infinity" } else { "-Infinity" }.to_string())
            }
            ParamValue::Number(number) => Some(number.to_string()),
            ParamValue::Bool(value) => Some(value.to_string()),
            ParamValue::List(items) => Some(items.join(",")),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<TimeRange> for ParamValue {
    fn from(value: TimeRange) -> Self {
        ParamValue::Text(value.to_string())
    }
}

macro_rules! number_param {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(value: $ty) -> Self {
                    ParamValue::Number(value as f64)
                }
            }
        )*
    };
}

number_param!(u32, u64, i32, i64, f64);

impl From<Vec<u64>> for ParamValue {
    fn from(value: Vec<u64>) -> Self {
        ParamValue::list(value)
    }
}

impl From<&[u64]> for ParamValue {
    fn from(value: &[u64]) -> Self {
        ParamValue::list(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(value: Vec<String>) -> Self {
        ParamValue::List(value)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ParamValue::Absent)
    }
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

/// Ordered name/value pairs. Setting a name twice replaces the first value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    params: Vec<(String, ParamValue)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self.params.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => *existing = value,
            None => self.params.push((name, value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    /// The textual value of `name`, if it would be encoded.
    pub fn text(&self, name: &str) -> Option<String> {
        self.get(name).and_then(ParamValue::encoded)
    }

    pub fn is_empty(&self) -> bool {
        self.params.iter().all(|(_, value)| value.encoded().is_none())
    }

    /// `?`-prefixed, form encoded query string, or `""` if nothing is left to encode.
    pub fn encode(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (name, value) in &self.params {
            if let Some(value) = value.encoded() {
                serializer.append_pair(name, &value);
            }
        }
        let query = serializer.finish();
        if query.is_empty() {
            query
        } else {
            format!("?{query}")
        }
    }

    /// Parses a query string with or without its leading `?`. Every value comes back as text.
    pub fn decode(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut params = Self::new();
        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            params.set(name.into_owned(), value.into_owned());
        }
        params
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.params.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl std::fmt::Display for QueryParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Hour count for a symbolic range label. `all` and every unrecognized label yield `None`.
pub fn time_range_to_hours(label: &str) -> Option<u32> {
    label.parse::<TimeRange>().ok().and_then(|range| range.hours())
}

/// The `hours` parameter shared by every series endpoint.
pub(crate) fn hours_param(range: TimeRange) -> QueryParams {
    QueryParams::new().with("hours", range.hours())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn omits_absent_and_empty_values() {
        let params = QueryParams::new()
            .with("hours", None::<u32>)
            .with("name", "")
            .with("collector", 3u64)
            .with("live", true);
        assert_eq!(params.encode(), "?collector=3&live=true");
        assert_eq!(QueryParams::new().with("hours", None::<u32>).encode(), "");
        assert_eq!(QueryParams::new().encode(), "");
    }

    #[test]
    fn joins_lists_with_a_single_comma() {
        let params = QueryParams::new()
            .with("collectors", vec![1u64, 2, 3])
            .with("hours", 24u32);
        assert_eq!(params.encode(), "?collectors=1%2C2%2C3&hours=24");
    }

    #[test]
    fn keeps_empty_lists() {
        let params = QueryParams::new().with("collectors", Vec::<u64>::new());
        assert_eq!(params.encode(), "?collectors=");
    }

    #[test]
    fn decode_yields_only_defined_entries() {
        let params = QueryParams::new()
            .with("collectors", vec![4u64, 9])
            .with("range", TimeRange::Week)
            .with("skip", ParamValue::Absent)
            .with("empty", "")
            .with("ratio", 0.5)
            .with("q", "cpu & memory");

        let decoded = QueryParams::decode(&params.encode());
        let decoded = decoded
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect::<Vec<_>>();
        assert_eq!(
            decoded,
            vec![
                ("collectors".to_string(), ParamValue::Text("4,9".to_string())),
                ("range".to_string(), ParamValue::Text("7d".to_string())),
                ("ratio".to_string(), ParamValue::Text("0.5".to_string())),
                ("q".to_string(), ParamValue::Text("cpu & memory".to_string())),
            ]
        );
    }

    #[test]
    fn set_replaces_in_place() {
        let mut params = QueryParams::decode("collector=1&range=24h");
        params.set("collector", 2u64);
        assert_eq!(params.encode(), "?collector=2&range=24h");
        assert_eq!(params.text("collector").as_deref(), Some("2"));
    }

    #[test]
    fn range_labels_to_hours() {
        assert_eq!(time_range_to_hours("1h"), Some(1));
        assert_eq!(time_range_to_hours("6h"), Some(6));
        assert_eq!(time_range_to_hours("24h"), Some(24));
        assert_eq!(time_range_to_hours("7d"), Some(168));
        assert_eq!(time_range_to_hours("30d"), Some(720));
        assert_eq!(time_range_to_hours("all"), None);
        assert_eq!(time_range_to_hours("custom"), None);
        assert_eq!(time_range_to_hours("90m"), None);
        assert_eq!(time_range_to_hours(""), None);
    }

    #[test]
    fn unbounded_range_omits_hours() {
        assert_eq!(hours_param(TimeRange::Month).encode(), "?hours=720");
        assert_eq!(hours_param(TimeRange::All).encode(), "");
    }
}
