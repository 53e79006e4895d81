//! Ordered header list with case-insensitive lookup.

/// Header fields in the order they were added.
///
/// Names keep the case they were given with; comparisons ignore ASCII case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replace every existing value for `name` with a single one.
    ///
    /// The field keeps the position of its first occurrence.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter().position(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            Some(first) => {
                self.fields[first].1 = value;
                let mut idx = 0;
                self.fields.retain(|(k, _)| {
                    let keep = idx <= first || !k.eq_ignore_ascii_case(&name);
                    idx += 1;
                    keep
                });
            }
            None => self.fields.push((name, value)),
        }
    }

    /// Add a value without touching existing ones.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    pub fn remove(&mut self, name: &str) {
        self.fields.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let mut headers = Headers::new();
        headers.append("Content-Type", "text/html");
        assert_eq!(headers.get("content-type"), Some("text/html"));
        assert!(headers.contains("CONTENT-TYPE"));
    }

    #[test]
    fn set_replaces_in_place_and_drops_duplicates() {
        let mut headers = Headers::new();
        headers.append("Server", "a");
        headers.append("Set-Cookie", "x=1");
        headers.append("Set-Cookie", "y=2");
        headers.append("Connection", "close");

        headers.set("set-cookie", "z=3");

        let fields: Vec<_> = headers.iter().collect();
        assert_eq!(
            fields,
            vec![("Server", "a"), ("Set-Cookie", "z=3"), ("Connection", "close")]
        );
    }

    #[test]
    fn get_all_keeps_order() {
        let mut headers = Headers::new();
        headers.append("Cookie", "a=1");
        headers.append("Accept", "*/*");
        headers.append("cookie", "b=2");
        let cookies: Vec<_> = headers.get_all("Cookie").collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
    }
}
