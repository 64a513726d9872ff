use std::sync::Arc;

use anyhow::{Context, Result};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use super::text::decode_utf8;
use super::{PendingLoad, Resources};
use crate::error::ResourceError;

/// Owned XML element tree. `roxmltree` documents borrow their source text,
/// so parsed documents are copied into this form before caching.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct XmlNode {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn parse(source: &str) -> Result<Self> {
        let document = Document::parse(source).context("invalid XML")?;
        Ok(Self::from_node(document.root_element()))
    }

    fn from_node(node: Node<'_, '_>) -> Self {
        let text = node
            .children()
            .filter(|child| child.is_text())
            .filter_map(|child| child.text())
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>();
        Self {
            name: node.tag_name().name().to_string(),
            attributes: node
                .attributes()
                .map(|attr| (attr.name().to_string(), attr.value().to_string()))
                .collect(),
            text: if text.is_empty() {
                None
            } else {
                Some(text.join(" "))
            },
            children: node
                .children()
                .filter(|child| child.is_element())
                .map(Self::from_node)
                .collect(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First direct child with the given tag name.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Trimmed text of the first child with the given tag name.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(|child| child.text.as_deref())
    }
}

fn parse_document(source: String) -> Result<XmlNode> {
    XmlNode::parse(&source)
}

impl Resources {
    pub fn load_xml(&self, key: &str) -> Option<PendingLoad> {
        self.load_decode_parse(&self.xml, key, decode_utf8, parse_document)
    }

    pub fn get_xml(&self, key: &str) -> Result<Arc<XmlNode>, ResourceError> {
        self.xml.get_resource(key)
    }

    pub fn unload_xml(&self, key: &str) -> Result<bool, ResourceError> {
        self.xml.unload_resource(key)
    }
}
