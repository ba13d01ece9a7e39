use std::fmt;

/// Index of a node in its owning [`Document`](crate::Document) arena.
///
/// Ids are only meaningful for the document that minted them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    /// Lowercase tag name.
    pub name: String,
    /// Attributes in source order.
    pub attrs: Vec<(String, String)>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            attrs: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let pos = self.attrs.iter().position(|(k, _)| k == name)?;
        Some(self.attrs.remove(pos).1)
    }

    /// Whitespace-separated token test, as used by `typeof`, `rel` and `class`.
    pub fn has_token(&self, attr: &str, token: &str) -> bool {
        self.attr(attr)
            .is_some_and(|v| v.split_ascii_whitespace().any(|t| t == token))
    }

    pub fn add_token(&mut self, attr: &str, token: &str) {
        if self.has_token(attr, token) {
            return;
        }
        let value = match self.attr(attr) {
            Some(v) if !v.trim().is_empty() => format!("{} {token}", v.trim_end()),
            _ => token.to_string(),
        };
        self.set_attr(attr, value);
    }
}
