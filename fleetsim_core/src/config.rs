//! Owned configuration tree.
//!
//! World and sensor descriptions arrive as XML. The text is parsed once
//! into [`ConfigNode`]s so that loaders and sensor constructors can walk
//! the tree without holding on to the source string.

use crate::error::SimError;
use std::collections::BTreeMap;

/// One element of a configuration document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigNode {
    tag: String,
    attributes: BTreeMap<String, String>,
    children: Vec<ConfigNode>,
    text: String,
}

impl ConfigNode {
    /// Creates an empty node with the given tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }
    
    /// Adds (or replaces) an attribute.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
    
    /// Appends a child element.
    pub fn with_child(mut self, child: ConfigNode) -> Self {
        self.children.push(child);
        self
    }
    
    /// Sets the element text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }
    
    /// Shorthand for a `<key>value</key>` parameter child.
    pub fn with_param(self, key: &str, value: impl Into<String>) -> Self {
        self.with_child(ConfigNode::new(key).with_text(value))
    }
    
    /// Parses an XML document and returns its root element.
    pub fn parse_xml(text: &str) -> Result<Self, SimError> {
        let doc = roxmltree::Document::parse(text).map_err(|e| SimError::Xml(e.to_string()))?;
        Ok(Self::from_xml(doc.root_element()))
    }
    
    fn from_xml(node: roxmltree::Node<'_, '_>) -> Self {
        let attributes = node
            .attributes()
            .map(|a| (a.name().to_string(), a.value().to_string()))
            .collect();
        
        let children = node
            .children()
            .filter(|c| c.is_element())
            .map(Self::from_xml)
            .collect();
        
        let text: String = node
            .children()
            .filter(|c| c.is_text())
            .filter_map(|c| c.text())
            .collect();
        
        Self {
            tag: node.tag_name().name().to_string(),
            attributes,
            children,
            text: text.trim().to_string(),
        }
    }
    
    /// Returns the element tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }
    
    /// Returns an attribute value.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
    
    /// Returns all attributes.
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }
    
    /// Returns the first child with the given tag.
    pub fn child(&self, tag: &str) -> Option<&ConfigNode> {
        self.children.iter().find(|c| c.tag == tag)
    }
    
    /// Iterates over all children with the given tag, in document order.
    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a ConfigNode> + 'a {
        self.children.iter().filter(move |c| c.tag == tag)
    }
    
    /// Returns all children in document order.
    pub fn children(&self) -> &[ConfigNode] {
        &self.children
    }
    
    /// Returns the trimmed element text.
    pub fn text(&self) -> &str {
        &self.text
    }
}
