use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub namespace: Option<String>,
    pub local: String,
}

impl QName {
    fn new(namespace: Option<&str>, local: &str) -> Self {
        Self {
            namespace: namespace.map(str::to_owned),
            local: local.to_owned(),
        }
    }

    fn is_unqualified(&self, local: &str) -> bool {
        self.namespace.is_none() && self.local == local
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.local)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Element {
    pub name: QName,
    pub attributes: BTreeMap<QName, String>,
    pub children: Vec<Node>,
}

impl Element {
    fn from_node(node: roxmltree::Node<'_, '_>) -> Self {
        let tag = node.tag_name();
        let attributes = node
            .attributes()
            .map(|attr| (QName::new(attr.namespace(), attr.name()), attr.value().to_owned()))
            .collect();
        let children = node
            .children()
            .filter_map(|child| {
                if child.is_element() {
                    return Some(Node::Element(Self::from_node(child)));
                }
                let text = child.text()?.trim();
                (child.is_text() && !text.is_empty()).then(|| Node::Text(text.to_owned()))
            })
            .collect();

        Self {
            name: QName::new(tag.namespace(), tag.name()),
            attributes,
            children,
        }
    }

    fn children_named_mut<'a>(
        &'a mut self,
        local: &'a str,
    ) -> impl Iterator<Item = &'a mut Element> + 'a {
        self.children.iter_mut().filter_map(move |child| match child {
            Node::Element(element) if element.name.local == local => Some(element),
            _ => None,
        })
    }

    fn remove_attribute(&mut self, local: &str) {
        self.attributes.retain(|name, _| !name.is_unqualified(local));
    }

    fn clear_text(&mut self) {
        self.children.retain(|child| !matches!(child, Node::Text(_)));
    }
}

pub fn parse(text: &str) -> Result<Element, roxmltree::Error> {
    let document = roxmltree::Document::parse(text)?;
    Ok(Element::from_node(document.root_element()))
}

/// Strips the values an IdP regenerates each time it signs the document:
/// the descriptor `ID`, the reference `URI`, the digest and the signature.
pub fn normalize(root: &mut Element) {
    if root.name.local == "EntityDescriptor" {
        root.remove_attribute("ID");
    }

    for signature in root.children_named_mut("Signature") {
        for signed_info in signature.children_named_mut("SignedInfo") {
            for reference in signed_info.children_named_mut("Reference") {
                reference.remove_attribute("URI");
                for digest in reference.children_named_mut("DigestValue") {
                    digest.clear_text();
                }
            }
        }
        for value in signature.children_named_mut("SignatureValue") {
            value.clear_text();
        }
    }
}

pub fn parse_normalized(text: &str) -> Result<Element, roxmltree::Error> {
    let mut root = parse(text)?;
    normalize(&mut root);
    Ok(root)
}
