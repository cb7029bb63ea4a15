//! YAML emitter for document trees.
//!
//! Output rules:
//! - every document starts with `---`
//! - comments are emitted above their node, one `#` line per source line
//! - blocks wrap the node (and its comment) in `{{- <block> }}` / `{{- end }}`
//! - scalars are written as stored; template expressions spanning several
//!   lines are single-quoted and then collapsed onto one line

use std::io::{self, Write};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::helm::node::{Mapping, Node, NodeValue, double_quote, is_templated, quote_string};

/// A single-quoted template expression whose text wraps over several lines.
static SPLIT_TEMPLATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)'\{\{.*?\}\}'").expect("valid template regex"));

static LINE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]*\n[ \t]*").expect("valid break regex"));

const DEFAULT_INDENT: usize = 2;

/// Serializes document trees to a byte sink.
pub struct Encoder<W: Write> {
    writer: W,
    indent: usize,
}

impl<W: Write> Encoder<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            indent: DEFAULT_INDENT,
        }
    }

    /// Indentation width for nested mappings and lists (minimum 2).
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent.max(2);
        self
    }

    /// Write one document. Write errors are returned unchanged.
    pub fn encode(&mut self, node: &Node) -> io::Result<()> {
        let text = render(node, self.indent);
        self.writer.write_all(text.as_bytes())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Render a single document to a string.
pub fn to_yaml_string(node: &Node) -> String {
    render(node, DEFAULT_INDENT)
}

/// Render several documents into one stream.
pub fn render_documents(nodes: &[Node]) -> String {
    nodes.iter().map(to_yaml_string).collect()
}

fn render(node: &Node, indent: usize) -> String {
    let mut renderer = Renderer {
        out: String::new(),
        indent,
    };
    renderer.document(node);
    collapse_split_templates(&renderer.out)
}

/// Join wrapped `'{{ ... }}'` expressions back onto a single line.
fn collapse_split_templates(text: &str) -> String {
    SPLIT_TEMPLATE
        .replace_all(text, |caps: &Captures| LINE_BREAK.replace_all(&caps[0], " ").into_owned())
        .into_owned()
}

struct Renderer {
    out: String,
    indent: usize,
}

impl Renderer {
    fn document(&mut self, node: &Node) {
        self.out.push_str("---\n");
        self.open_blocks(node, 0);
        self.comment(node, 0);
        match node.value() {
            NodeValue::Scalar(text) => {
                let text = self.scalar(text, 0);
                self.line(0, &text);
            }
            NodeValue::List(items) if items.is_empty() => self.line(0, "[]"),
            NodeValue::Mapping(mapping) if mapping.is_empty() => self.line(0, "{}"),
            NodeValue::List(items) => self.list(items, 0),
            NodeValue::Mapping(mapping) => self.mapping(mapping, 0),
        }
        self.close_blocks(node, 0);
    }

    fn mapping(&mut self, mapping: &Mapping, indent: usize) {
        for (name, child) in mapping.iter() {
            self.open_blocks(child, indent);
            self.comment(child, indent);
            let key = quote_key(name);
            match child.value() {
                NodeValue::Scalar(text) => {
                    let text = self.scalar(text, indent + self.indent);
                    self.line(indent, &format!("{key}: {text}"));
                }
                NodeValue::List(items) if items.is_empty() => self.line(indent, &format!("{key}: []")),
                NodeValue::Mapping(inner) if inner.is_empty() => {
                    self.line(indent, &format!("{key}: {{}}"))
                }
                NodeValue::List(items) => {
                    self.line(indent, &format!("{key}:"));
                    self.list(items, indent + self.indent);
                }
                NodeValue::Mapping(inner) => {
                    self.line(indent, &format!("{key}:"));
                    self.mapping(inner, indent + self.indent);
                }
            }
            self.close_blocks(child, indent);
        }
    }

    fn list(&mut self, items: &[Node], indent: usize) {
        for item in items {
            self.open_blocks(item, indent);
            self.comment(item, indent);
            match item.value() {
                NodeValue::Scalar(text) => {
                    let text = self.scalar(text, indent + 2);
                    self.line(indent, &format!("- {text}"));
                }
                NodeValue::List(inner) if inner.is_empty() => self.line(indent, "- []"),
                NodeValue::Mapping(inner) if inner.is_empty() => self.line(indent, "- {}"),
                NodeValue::List(inner) => {
                    self.line(indent, "-");
                    self.list(inner, indent + self.indent);
                }
                NodeValue::Mapping(inner) => self.list_mapping(inner, indent),
            }
            self.close_blocks(item, indent);
        }
    }

    /// A mapping inside a list starts on the `- ` line unless its first
    /// entry needs lines of its own for a comment or block.
    fn list_mapping(&mut self, mapping: &Mapping, indent: usize) {
        let mut nested = Renderer {
            out: String::new(),
            indent: self.indent,
        };
        nested.mapping(mapping, indent + 2);

        let first_is_plain = mapping
            .iter()
            .next()
            .is_some_and(|(_, node)| node.comment().is_none() && node.blocks().is_empty());

        if first_is_plain {
            self.out.push_str(&" ".repeat(indent));
            self.out.push_str("- ");
            self.out.push_str(&nested.out[indent + 2..]);
        } else {
            self.line(indent, "-");
            self.out.push_str(&nested.out);
        }
    }

    fn scalar(&self, text: &str, continuation: usize) -> String {
        if !text.contains('\n') {
            return text.to_string();
        }
        if is_templated(text) {
            let pad = format!("\n{}", " ".repeat(continuation));
            format!("'{}'", text.replace('\'', "''").replace('\n', &pad))
        } else {
            double_quote(text)
        }
    }

    fn comment(&mut self, node: &Node, indent: usize) {
        let Some(comment) = node.comment() else {
            return;
        };
        for line in comment.lines() {
            if line.is_empty() {
                self.line(indent, "#");
            } else {
                self.line(indent, &format!("# {line}"));
            }
        }
    }

    fn open_blocks(&mut self, node: &Node, indent: usize) {
        for block in node.blocks() {
            self.line(indent, &format!("{{{{- {block} }}}}"));
        }
    }

    fn close_blocks(&mut self, node: &Node, indent: usize) {
        for _ in node.blocks() {
            self.line(indent, "{{- end }}");
        }
    }

    fn line(&mut self, indent: usize, text: &str) {
        for _ in 0..indent {
            self.out.push(' ');
        }
        self.out.push_str(text);
        self.out.push('\n');
    }
}

fn quote_key(name: &str) -> String {
    if is_templated(name) {
        name.to_string()
    } else {
        quote_string(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container() -> Node {
        Node::mapping(
            Mapping::new()
                .with("name", "api")
                .with("image", "docker.io/acme/api:1.0")
                .with(
                    "ports",
                    Node::list(vec![Node::mapping(
                        Mapping::new()
                            .with("containerPort", 8080u16)
                            .with("name", "http")
                            .with("protocol", "TCP"),
                    )]),
                ),
        )
    }

    #[test]
    fn test_nested_document() {
        let doc = Mapping::new()
            .with("kind", "Pod")
            .with("spec", Mapping::new().with("containers", Node::list(vec![container()])));

        let expected = "\
---
kind: Pod
spec:
  containers:
    - name: api
      image: docker.io/acme/api:1.0
      ports:
        - containerPort: 8080
          name: http
          protocol: TCP
";
        assert_eq!(to_yaml_string(&Node::mapping(doc)), expected);
    }

    #[test]
    fn test_comments_and_blocks() {
        let mut doc = Mapping::new();
        doc.add(
            "HA",
            Node::from(false)
                .with_comment("Run in high availability mode.\n\nDoubles the replicas.")
                .with_block("if .Values.enabled"),
        );
        doc.add("list", Node::list(vec![Node::from("a").with_block("range .Values.items")]));

        let expected = "\
---
{{- if .Values.enabled }}
# Run in high availability mode.
#
# Doubles the replicas.
HA: false
{{- end }}
list:
  {{- range .Values.items }}
  - a
  {{- end }}
";
        assert_eq!(to_yaml_string(&Node::mapping(doc)), expected);
    }

    #[test]
    fn test_root_block_follows_document_marker() {
        let node = Node::mapping(Mapping::new().with("kind", "Service")).with_block("if gt (int .Values.n) 0");
        assert_eq!(
            to_yaml_string(&node),
            "---\n{{- if gt (int .Values.n) 0 }}\nkind: Service\n{{- end }}\n"
        );
    }

    #[test]
    fn test_empty_collections() {
        let doc = Mapping::new()
            .with("items", Node::list(Vec::new()))
            .with("labels", Mapping::new());
        assert_eq!(to_yaml_string(&Node::mapping(doc)), "---\nitems: []\nlabels: {}\n");
        assert_eq!(to_yaml_string(&Node::mapping(Mapping::new())), "---\n{}\n");
    }

    #[test]
    fn test_list_mapping_with_leading_block() {
        let item = Mapping::new()
            .with("guarded", Node::from("x").with_block("if .Values.y"))
            .with("plain", "z");
        let doc = Mapping::new().with("items", Node::list(vec![Node::mapping(item)]));
        let yaml = to_yaml_string(&Node::mapping(doc));
        assert_eq!(
            yaml,
            "---\nitems:\n  -\n    {{- if .Values.y }}\n    guarded: x\n    {{- end }}\n    plain: z\n"
        );
    }

    #[test]
    fn test_multiline_template_is_collapsed() {
        let doc = Mapping::new().with(
            "replicas",
            Node::scalar("{{ if .Values.config.HA -}}\n3\n{{- else -}}\n1\n{{- end }}"),
        );
        let yaml = to_yaml_string(&Node::mapping(doc));
        assert_eq!(
            yaml,
            "---\nreplicas: '{{ if .Values.config.HA -}} 3 {{- else -}} 1 {{- end }}'\n"
        );
    }

    #[test]
    fn test_multiline_text_is_escaped() {
        let doc = Mapping::new().with("script", Node::scalar("echo a\necho b"));
        assert_eq!(to_yaml_string(&Node::mapping(doc)), "---\nscript: \"echo a\\necho b\"\n");
    }

    #[test]
    fn test_keys_are_quoted_when_needed() {
        let doc = Mapping::new().with("80", "http").with(".dockercfg", "");
        assert_eq!(to_yaml_string(&Node::mapping(doc)), "---\n\"80\": http\n.dockercfg: \"\"\n");
    }

    #[test]
    fn test_encoder_writes_to_sink() {
        let mut encoder = Encoder::new(Vec::new()).with_indent(4);
        let doc = Mapping::new().with("a", Mapping::new().with("b", 1u32));
        encoder.encode(&Node::mapping(doc)).unwrap();
        let text = String::from_utf8(encoder.into_inner()).unwrap();
        assert_eq!(text, "---\na:\n    b: 1\n");
    }

    #[test]
    fn test_plain_output_parses() {
        let doc = Mapping::new()
            .with("kind", "Pod")
            .with("spec", Mapping::new().with("containers", Node::list(vec![container()])));
        let yaml = to_yaml_string(&Node::mapping(doc));
        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(
            parsed["spec"]["containers"][0]["ports"][0]["containerPort"],
            serde_yaml::Value::from(8080)
        );
    }

    #[test]
    fn test_output_is_deterministic() {
        let doc = Node::mapping(Mapping::new().with("a", container()).with("b", container()));
        assert_eq!(to_yaml_string(&doc), to_yaml_string(&doc.clone()));
    }
}
