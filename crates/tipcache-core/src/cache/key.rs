use std::fmt;

/// Deterministic cache key: a resource name plus sorted, escaped parameters.
///
/// `CacheKey::new("fixtures").param("date", "2024-05-01")` renders as
/// `fixtures?date=2024-05-01`. Parameter order does not matter, and escaping
/// `&`, `=` and `?` inside values keeps distinct requests from colliding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    resource: String,
    params: Vec<(String, String)>,
}

impl CacheKey {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        let name = name.into();
        let value = value.to_string();
        match self.params.binary_search_by(|(existing, _)| existing.as_str().cmp(&name)) {
            Ok(index) => self.params[index].1 = value,
            Err(index) => self.params.insert(index, (name, value)),
        }
        self
    }
}

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '%' | '&' | '=' | '?' | ' ' => escaped.push_str(&format!("%{:02X}", c as u32)),
            _ => escaped.push(c),
        }
    }
    escaped
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", escape(&self.resource))?;
        for (i, (name, value)) in self.params.iter().enumerate() {
            let separator = if i == 0 { '?' } else { '&' };
            write!(f, "{}{}={}", separator, escape(name), escape(value))?;
        }
        Ok(())
    }
}

impl From<&str> for CacheKey {
    fn from(resource: &str) -> Self {
        Self::new(resource)
    }
}
