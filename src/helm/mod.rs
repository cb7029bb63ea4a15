//! Template-aware YAML documents.
//!
//! Builders assemble [`Node`] trees whose scalars may hold template
//! expressions and whose nodes may be gated by template blocks. The
//! [`Encoder`] serializes a tree into YAML that stays well-formed once a
//! Go-template engine has expanded it.
//!
//! # Example
//!
//! ```rust
//! use chartsmith::helm::{Mapping, Node, to_yaml_string};
//!
//! let mut doc = Mapping::new();
//! doc.add("replicas", Node::scalar("{{ .Values.sizing.api.count }}"));
//! doc.add(
//!     "_maxReplicas",
//!     Node::scalar(r#"{{ fail "api cannot have more than 3 instances" }}"#)
//!         .with_block("if gt (int .Values.sizing.api.count) 3"),
//! );
//!
//! let yaml = to_yaml_string(&Node::mapping(doc));
//! assert!(yaml.starts_with("---\n"));
//! assert!(yaml.contains("{{- if gt (int .Values.sizing.api.count) 3 }}"));
//! ```

pub mod encoder;
pub mod node;

pub use encoder::{Encoder, render_documents, to_yaml_string};
pub use node::{Mapping, Node, NodeValue, quote_literal, quote_string};

/// Structural errors in a document tree. These point at a defect in the
/// code assembling the tree rather than at its input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    /// A name was added twice to the same mapping.
    #[error("duplicate key in mapping: {0}")]
    DuplicateKey(String),

    /// A key path does not resolve to a node.
    #[error("no node at path: {0}")]
    MissingPath(String),

    /// A list operation was applied to a scalar or mapping.
    #[error("node is not a list")]
    NotAList,
}
