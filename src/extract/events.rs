// src/extract/events.rs

use ego_tree::iter::Edge;
use scraper::{Html, Node};

/// One markup event, as the table extractor consumes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupEvent {
    Open {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Close {
        name: String,
    },
    Text(String),
}

impl MarkupEvent {
    pub fn open(name: &str) -> Self {
        Self::Open {
            name: name.to_string(),
            attrs: Vec::new(),
        }
    }

    pub fn open_with(name: &str, attrs: &[(&str, &str)]) -> Self {
        Self::Open {
            name: name.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn close(name: &str) -> Self {
        Self::Close {
            name: name.to_string(),
        }
    }

    pub fn text(content: &str) -> Self {
        Self::Text(content.to_string())
    }
}

/// Parse `body` as an HTML document and flatten it into open/close/text
/// events in document order. Comments, doctypes and processing
/// instructions are dropped.
pub fn events_from_html(body: &str) -> Vec<MarkupEvent> {
    let document = Html::parse_document(body);
    let mut events = Vec::new();

    for edge in document.tree.root().traverse() {
        match edge {
            Edge::Open(node) => match node.value() {
                Node::Element(el) => events.push(MarkupEvent::Open {
                    name: el.name().to_string(),
                    attrs: el
                        .attrs()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                }),
                Node::Text(text) => {
                    let content: &str = text;
                    events.push(MarkupEvent::Text(content.to_string()));
                }
                _ => {}
            },
            Edge::Close(node) => {
                if let Node::Element(el) = node.value() {
                    events.push(MarkupEvent::Close {
                        name: el.name().to_string(),
                    });
                }
            }
        }
    }

    events
}
