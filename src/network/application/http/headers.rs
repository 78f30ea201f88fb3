use std::collections::BTreeMap;

/// Request headers in insertion order.
///
/// Names compare case-insensitively; setting an existing name replaces its
/// value (and spelling) in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders {
    entries: Vec<(String, String)>,
}

impl RequestHeaders {
    /// An empty header list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.entries.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some(entry) => *entry = (name.to_owned(), value.to_owned()),
            None => self.entries.push((name.to_owned(), value.to_owned())),
        }
    }

    /// The value for `name`, if set.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether `name` is set.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Removes `name`, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.entries.iter().position(|(n, _)| n.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(idx).1)
    }

    /// `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no headers are set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every header.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Response headers: lowercase name to every value received, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    map: BTreeMap<String, Vec<String>>,
}

impl ResponseHeaders {
    pub(crate) fn append(&mut self, name: &str, value: &str) {
        self.map
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.to_owned());
    }

    /// The last value received for `name`, matched case-insensitively.
    pub fn last(&self, name: &str) -> Option<&str> {
        self.all(name).last().map(String::as_str)
    }

    /// Every value received for `name`, matched case-insensitively.
    pub fn all(&self, name: &str) -> &[String] {
        self.map
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// `(lowercase name, values)` pairs, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Whether no headers were received.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_headers_last_write_wins() {
        let mut h = RequestHeaders::new();
        h.set("X-Token", "a");
        h.set("Accept", "*/*");
        h.set("x-token", "b");
        assert_eq!(h.len(), 2);
        assert_eq!(h.get("X-TOKEN"), Some("b"));
        let names: Vec<&str> = h.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["x-token", "Accept"]);
        assert_eq!(h.remove("accept").as_deref(), Some("*/*"));
        assert!(!h.contains("Accept"));
    }

    #[test]
    fn test_response_headers_multi_value() {
        let mut h = ResponseHeaders::default();
        h.append("Set-Cookie", "a=1");
        h.append("set-cookie", "b=2");
        h.append("Content-Type", "text/plain");
        assert_eq!(h.all("SET-COOKIE"), ["a=1", "b=2"]);
        assert_eq!(h.last("Set-Cookie"), Some("b=2"));
        assert_eq!(h.last("content-type"), h.last("Content-Type"));
        assert_eq!(h.last("missing"), None);
    }
}
