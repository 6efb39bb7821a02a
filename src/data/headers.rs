use uncased::UncasedStr;

/// An insertion-ordered header map with case-insensitive lookup.
///
/// Lookup ignores ASCII case, while iteration yields names with the casing
/// they were inserted with:
///
/// ```
/// use wayback::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Content-Type", "text/html");
/// assert_eq!(headers.get("content-type"), Some("text/html"));
/// assert_eq!(headers.iter().next(), Some(("Content-Type", "text/html")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, replacing any existing value under the same
    /// case-insensitive name. The new name's casing wins.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self.entry_mut(&name) {
            *entry = (name, value);
        } else {
            self.entries.push((name, value));
        }
    }

    /// Look up a header value, ignoring name casing.
    pub fn get(&self, name: &str) -> Option<&str> {
        let wanted = UncasedStr::new(name);
        self.entries
            .iter()
            .find(|(key, _)| UncasedStr::new(key) == wanted)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate entries in insertion order with their original casing.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry_mut(&mut self, name: &str) -> Option<&mut (String, String)> {
        let wanted = UncasedStr::new(name);
        self.entries
            .iter_mut()
            .find(|(key, _)| UncasedStr::new(key) == wanted)
    }
}

impl FromIterator<(String, String)> for Headers {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Headers {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_lookup() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "text/html");
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/html"));
        assert_eq!(headers.get("content-type"), Some("text/html"));
        assert!(headers.contains("Content-type"));
        assert!(!headers.contains("Content-Length"));
    }

    #[test]
    fn test_iteration_preserves_casing_and_order() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "text/html");
        headers.insert("X-Custom", "1");
        let names: Vec<&str> = headers.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Content-Type", "X-Custom"]);
    }

    #[test]
    fn test_insert_replaces_case_insensitively() {
        let mut headers = Headers::new();
        headers.insert("content-type", "text/plain");
        headers.insert("Content-Type", "text/html");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("content-type"), Some("text/html"));
        assert_eq!(headers.iter().next().unwrap().0, "Content-Type");
    }
}
