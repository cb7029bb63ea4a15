//! Template-aware YAML document tree.
//!
//! A [`Node`] is a scalar, a list, or an ordered [`Mapping`]. Every node can
//! carry a comment (emitted above it) and one or more template blocks
//! (conditional directives wrapping it). The tree is strictly owned: a node
//! is moved into its parent, so it can never be reachable from two places.

use std::collections::HashMap;

use crate::helm::DocumentError;

/// The shape of a document node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    /// Final scalar text, already quoted for YAML when needed.
    Scalar(String),
    /// Ordered sequence.
    List(Vec<Node>),
    /// Ordered name/value pairs.
    Mapping(Mapping),
}

/// A document node with its annotations.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    value: NodeValue,
    comment: Option<String>,
    blocks: Vec<String>,
}

impl Node {
    fn new(value: NodeValue) -> Self {
        Self {
            value,
            comment: None,
            blocks: Vec::new(),
        }
    }

    /// A scalar emitted verbatim. Use for template expressions and for text
    /// that has already been quoted.
    pub fn scalar(text: impl Into<String>) -> Self {
        Self::new(NodeValue::Scalar(text.into()))
    }

    /// A string scalar, quoted when YAML would otherwise read it as something
    /// else. Strings containing template expressions stay unquoted.
    pub fn string(text: impl AsRef<str>) -> Self {
        Self::scalar(quote_string(text.as_ref()))
    }

    /// A string scalar holding literal data, such as values read from a
    /// manifest or a defaults file. Template braces are quoted like any other
    /// indicator, so the text reads back unchanged from output no template
    /// engine expands.
    pub fn literal(text: impl AsRef<str>) -> Self {
        Self::scalar(quote_literal(text.as_ref()))
    }

    /// The YAML null marker.
    pub fn null() -> Self {
        Self::scalar("~")
    }

    /// An ordered list.
    pub fn list(items: Vec<Node>) -> Self {
        Self::new(NodeValue::List(items))
    }

    /// An ordered mapping.
    pub fn mapping(mapping: Mapping) -> Self {
        Self::new(NodeValue::Mapping(mapping))
    }

    /// Attach a comment, replacing any previous one.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.set_comment(comment);
        self
    }

    /// Add a template block. The first block added is the outermost.
    pub fn with_block(mut self, block: impl Into<String>) -> Self {
        self.blocks.push(block.into());
        self
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        let comment = comment.into();
        self.comment = if comment.is_empty() { None } else { Some(comment) };
    }

    /// Replace all blocks with a single one.
    pub fn set_block(&mut self, block: impl Into<String>) {
        self.blocks = vec![block.into()];
    }

    /// Wrap the node in a new outermost block.
    pub fn wrap_block(&mut self, block: impl Into<String>) {
        self.blocks.insert(0, block.into());
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// The outermost block, if any.
    pub fn block(&self) -> Option<&str> {
        self.blocks.first().map(String::as_str)
    }

    /// All blocks, outermost first.
    pub fn blocks(&self) -> &[String] {
        &self.blocks
    }

    pub fn value(&self) -> &NodeValue {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut NodeValue {
        &mut self.value
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match &self.value {
            NodeValue::Scalar(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match &self.value {
            NodeValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Node>> {
        match &mut self.value {
            NodeValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match &self.value {
            NodeValue::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match &mut self.value {
            NodeValue::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    /// Walk nested mappings by name.
    pub fn get(&self, path: &[&str]) -> Option<&Node> {
        match path.split_first() {
            None => Some(self),
            Some(_) => self.as_mapping()?.get(path),
        }
    }

    pub fn get_mut(&mut self, path: &[&str]) -> Option<&mut Node> {
        match path.split_first() {
            None => Some(self),
            Some(_) => self.as_mapping_mut()?.get_mut(path),
        }
    }

    /// Append to a list node.
    pub fn add_item(&mut self, item: Node) -> Result<(), DocumentError> {
        match &mut self.value {
            NodeValue::List(items) => {
                items.push(item);
                Ok(())
            }
            _ => Err(DocumentError::NotAList),
        }
    }

    /// Convert a parsed YAML value into a template-free tree.
    pub fn from_yaml(value: &serde_yaml::Value) -> Self {
        use serde_yaml::Value;

        match value {
            Value::Null => Self::null(),
            Value::Bool(b) => Self::from(*b),
            Value::Number(n) => Self::scalar(n.to_string()),
            Value::String(s) => Self::literal(s),
            Value::Sequence(items) => Self::list(items.iter().map(Self::from_yaml).collect()),
            Value::Mapping(map) => {
                let mut mapping = Mapping::new();
                for (key, value) in map {
                    let name = match key {
                        Value::String(s) => s.clone(),
                        other => serde_yaml::to_string(other)
                            .map(|s| s.trim_end().to_string())
                            .unwrap_or_default(),
                    };
                    // Later duplicates win, matching YAML loaders.
                    mapping.replace(name, Self::from_yaml(value));
                }
                Self::mapping(mapping)
            }
            Value::Tagged(tagged) => Self::from_yaml(&tagged.value),
        }
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::string(text)
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Node::string(text)
    }
}

impl From<&String> for Node {
    fn from(text: &String) -> Self {
        Node::string(text)
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Node::scalar(if value { "true" } else { "false" })
    }
}

macro_rules! int_nodes {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Node {
                fn from(value: $ty) -> Self {
                    Node::scalar(value.to_string())
                }
            }
        )*
    };
}

int_nodes!(u16, u32, u64, i32, i64, usize);

impl From<Mapping> for Node {
    fn from(mapping: Mapping) -> Self {
        Node::mapping(mapping)
    }
}

impl From<Vec<Node>> for Node {
    fn from(items: Vec<Node>) -> Self {
        Node::list(items)
    }
}

/// An ordered mapping with unique names.
#[derive(Debug, Clone, Default)]
pub struct Mapping {
    entries: Vec<(String, Node)>,
    index: HashMap<String, usize>,
}

impl PartialEq for Mapping {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry at the end.
    ///
    /// # Panics
    ///
    /// Panics if `name` already exists. Builders only add names they own, so
    /// a duplicate is a defect in the builder, not in its input.
    pub fn add(&mut self, name: impl Into<String>, node: impl Into<Node>) -> &mut Self {
        let name = name.into();
        if let Err(err) = self.try_add(name, node) {
            panic!("{err}");
        }
        self
    }

    /// Add an entry at the end, failing on a duplicate name.
    pub fn try_add(&mut self, name: impl Into<String>, node: impl Into<Node>) -> Result<(), DocumentError> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(DocumentError::DuplicateKey(name));
        }
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push((name, node.into()));
        Ok(())
    }

    /// Chaining form of [`Mapping::add`] for literal construction.
    pub fn with(mut self, name: impl Into<String>, node: impl Into<Node>) -> Self {
        self.add(name, node);
        self
    }

    /// Insert or replace an entry. Replacement keeps the original position.
    pub fn replace(&mut self, name: impl Into<String>, node: impl Into<Node>) -> Option<Node> {
        let name = name.into();
        match self.index.get(&name) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos].1, node.into())),
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, node.into()));
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Node> {
        let pos = self.index.remove(name)?;
        let (_, node) = self.entries.remove(pos);
        self.reindex();
        Some(node)
    }

    /// Walk nested mappings by name.
    pub fn get(&self, path: &[&str]) -> Option<&Node> {
        let (first, rest) = path.split_first()?;
        let node = &self.entries[*self.index.get(*first)?].1;
        if rest.is_empty() {
            Some(node)
        } else {
            node.as_mapping()?.get(rest)
        }
    }

    pub fn get_mut(&mut self, path: &[&str]) -> Option<&mut Node> {
        let (first, rest) = path.split_first()?;
        let pos = *self.index.get(*first)?;
        let node = &mut self.entries[pos].1;
        if rest.is_empty() {
            Some(node)
        } else {
            node.as_mapping_mut()?.get_mut(rest)
        }
    }

    /// Like [`Mapping::get`], but a missing path is an error.
    pub fn require(&self, path: &[&str]) -> Result<&Node, DocumentError> {
        self.get(path)
            .ok_or_else(|| DocumentError::MissingPath(path.join(".")))
    }

    /// Replace the value at a nested path. Every mapping along the path
    /// must exist.
    pub fn set_path(&mut self, path: &[&str], node: Node) -> Result<(), DocumentError> {
        let missing = || DocumentError::MissingPath(path.join("."));
        let (last, parents) = path.split_last().ok_or_else(missing)?;
        let target = if parents.is_empty() {
            self
        } else {
            self.get_mut(parents)
                .and_then(Node::as_mapping_mut)
                .ok_or_else(missing)?
        };
        target.replace(*last, node);
        Ok(())
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Reorder entries by name.
    pub fn sort(&mut self) {
        self.entries.sort_by(|a, b| a.0.cmp(&b.0));
        self.reindex();
    }

    /// Copy every entry of `other` into `self`. Colliding names are replaced
    /// in place; new names are appended in `other`'s order.
    pub fn merge(&mut self, other: Mapping) {
        for (name, node) in other.entries {
            self.replace(name, node);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(name, node)| (name.as_str(), node))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    fn reindex(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, (name, _))| (name.clone(), pos))
            .collect();
    }
}

/// Quote `text` for use as a YAML scalar if a plain scalar would change its
/// meaning. Template expressions are left alone so the engine sees them.
pub fn quote_string(text: &str) -> String {
    if is_templated(text) && !text.contains('\n') {
        return text.to_string();
    }
    if needs_quotes(text) {
        double_quote(text)
    } else {
        text.to_string()
    }
}

/// Quote `text` for use as a YAML scalar holding literal data.
pub fn quote_literal(text: &str) -> String {
    if needs_quotes(text) || is_templated(text) {
        double_quote(text)
    } else {
        text.to_string()
    }
}

pub fn is_templated(text: &str) -> bool {
    text.contains("{{")
}

fn needs_quotes(text: &str) -> bool {
    let Some(first) = text.chars().next() else {
        return true;
    };
    if text != text.trim() {
        return true;
    }
    if "-?:,[]{}#&*!|>'\"%@`".contains(first) {
        return true;
    }
    if text.contains(": ") || text.contains(" #") || text.ends_with(':') {
        return true;
    }
    if text.chars().any(|c| c.is_control()) {
        return true;
    }
    is_reserved_word(text) || looks_numeric(text)
}

fn is_reserved_word(text: &str) -> bool {
    matches!(
        text.to_ascii_lowercase().as_str(),
        "y" | "n"
            | "yes"
            | "no"
            | "true"
            | "false"
            | "on"
            | "off"
            | "null"
            | "~"
            | ".inf"
            | "-.inf"
            | "+.inf"
            | ".nan"
    )
}

fn looks_numeric(text: &str) -> bool {
    let body = text.trim_start_matches(['+', '-']);
    if body.is_empty() {
        return false;
    }
    if text.parse::<f64>().is_ok() {
        return true;
    }
    // Hex, octal, sexagesimal and underscored forms from YAML 1.1.
    let first = body.chars().next().unwrap_or(' ');
    (first.is_ascii_digit() || first == '.')
        && body
            .chars()
            .all(|c| c.is_ascii_hexdigit() || matches!(c, '_' | '.' | ':' | 'x' | 'o' | 'e' | 'E' | '+' | '-'))
}

/// Double-quote with YAML escapes.
pub fn double_quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Mapping {
        Mapping::new()
            .with("b", 1u32)
            .with("a", Mapping::new().with("inner", "value"))
            .with("c", Node::list(vec![Node::from("x")]))
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mapping = sample();
        let names: Vec<_> = mapping.names().collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_sort() {
        let mut mapping = sample();
        mapping.sort();
        let names: Vec<_> = mapping.names().collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(mapping.get(&["a", "inner"]).and_then(Node::as_scalar), Some("value"));
    }

    #[test]
    fn test_get_path() {
        let mapping = sample();
        assert!(mapping.get(&["a", "inner"]).is_some());
        assert!(mapping.get(&["a", "missing"]).is_none());
        assert!(mapping.get(&["b", "inner"]).is_none());
        assert!(mapping.get(&[]).is_none());
    }

    #[test]
    fn test_try_add_duplicate() {
        let mut mapping = sample();
        let err = mapping.try_add("b", 2u32).unwrap_err();
        assert!(matches!(err, DocumentError::DuplicateKey(ref name) if name == "b"));
    }

    #[test]
    #[should_panic(expected = "duplicate key")]
    fn test_add_duplicate_panics() {
        let mut mapping = sample();
        mapping.add("a", 1u32);
    }

    #[test]
    fn test_merge_replaces_and_appends() {
        let mut mapping = sample();
        mapping.merge(Mapping::new().with("a", 7u32).with("d", 8u32));
        let names: Vec<_> = mapping.names().collect();
        assert_eq!(names, vec!["b", "a", "c", "d"]);
        assert_eq!(mapping.get(&["a"]).and_then(Node::as_scalar), Some("7"));
    }

    #[test]
    fn test_remove_reindexes() {
        let mut mapping = sample();
        assert!(mapping.remove("b").is_some());
        assert_eq!(mapping.get(&["c"]).and_then(|n| n.as_list()).map(|l| l.len()), Some(1));
        assert!(mapping.remove("b").is_none());
    }

    #[test]
    fn test_set_path() {
        let mut mapping = sample();
        mapping.set_path(&["a", "inner"], Node::from("other")).unwrap();
        assert_eq!(mapping.get(&["a", "inner"]).and_then(Node::as_scalar), Some("other"));
        assert!(matches!(
            mapping.set_path(&["x", "y"], Node::null()),
            Err(DocumentError::MissingPath(_))
        ));
    }

    #[test]
    fn test_blocks_nest_outermost_first() {
        let mut node = Node::from("x").with_block("if .Values.inner");
        node.wrap_block("if .Values.outer");
        assert_eq!(node.block(), Some("if .Values.outer"));
        assert_eq!(node.blocks().len(), 2);
    }

    #[test]
    fn test_quote_string() {
        assert_eq!(quote_string("plain"), "plain");
        assert_eq!(quote_string("apps/v1"), "apps/v1");
        assert_eq!(quote_string("80"), "\"80\"");
        assert_eq!(quote_string("true"), "\"true\"");
        assert_eq!(quote_string("No"), "\"No\"");
        assert_eq!(quote_string(""), "\"\"");
        assert_eq!(quote_string("a: b"), "\"a: b\"");
        assert_eq!(quote_string("-v"), "\"-v\"");
        assert_eq!(quote_string("say \"hi\"\n"), "\"say \\\"hi\\\"\\n\"");
        assert_eq!(quote_string("{{ .Values.x }}"), "{{ .Values.x }}");
        assert_eq!(quote_string("1.2.3"), "\"1.2.3\"");
        assert_eq!(quote_string("v1.2.3"), "v1.2.3");
    }

    #[test]
    fn test_from_yaml() {
        let value: serde_yaml::Value = serde_yaml::from_str("a: [1, 'two', true, null]\nb: {c: d}").unwrap();
        let node = Node::from_yaml(&value);
        let list = node.get(&["a"]).and_then(Node::as_list).unwrap();
        let scalars: Vec<_> = list.iter().filter_map(Node::as_scalar).collect();
        assert_eq!(scalars, vec!["1", "two", "true", "~"]);
        assert_eq!(node.get(&["b", "c"]).and_then(Node::as_scalar), Some("d"));
    }

    #[test]
    fn test_literal_quotes_template_braces() {
        assert_eq!(quote_literal("plain"), "plain");
        assert_eq!(quote_literal("{{ name }}"), "\"{{ name }}\"");
        assert_eq!(quote_literal("hello {{ name }}"), "\"hello {{ name }}\"");
        assert_eq!(quote_literal("8080"), "\"8080\"");

        let value: serde_yaml::Value = serde_yaml::from_str("greeting: '{{ name }}'").unwrap();
        let node = Node::from_yaml(&value);
        let yaml = crate::helm::to_yaml_string(&node);
        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed["greeting"].as_str(), Some("{{ name }}"));
    }
}
