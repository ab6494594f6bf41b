//! A minimal, top-down-only XML tree: no parent back-pointers (spec.md §9
//! "Cyclic / back references" — extraction never needs to walk upward), and
//! every tag name is lowercased exactly once while the tree is built
//! (spec.md §4.3 step 3: "lowercase every tag name once, memoized on the
//! node").
use crate::error::{IngestError, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element { tag: String, children: Vec<Node> },
    Text(String),
}

impl Node {
    pub fn tag_name(&self) -> &str {
        match self {
            Node::Element { tag, .. } => tag,
            Node::Text(_) => "",
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Element { children, .. } => children,
            Node::Text(_) => &[],
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Node::Text(s) => s,
            Node::Element { .. } => "",
        }
    }
}

/// Parses `text` (already encoding/syntax-repaired) into a single root
/// element whose tag names are all lowercase. Fails on malformed XML,
/// surfaced to the caller as a per-file transient error (spec.md §7).
pub fn parse(text: &str) -> Result<Node> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut stack: Vec<(String, Vec<Node>)> = Vec::new();
    let mut root: Option<Node> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref())
                    .to_ascii_lowercase();
                stack.push((tag, Vec::new()));
            }
            Ok(Event::Empty(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref())
                    .to_ascii_lowercase();
                let node = Node::Element { tag, children: Vec::new() };
                push_node(&mut stack, &mut root, node);
            }
            Ok(Event::End(_)) => {
                let (tag, children) = stack
                    .pop()
                    .ok_or_else(|| IngestError::XmlSyntax("unmatched closing tag".to_string()))?;
                let node = Node::Element { tag, children };
                push_node(&mut stack, &mut root, node);
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| IngestError::XmlSyntax(err.to_string()))?
                    .into_owned();
                if !text.is_empty() {
                    push_node(&mut stack, &mut root, Node::Text(text));
                }
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                push_node(&mut stack, &mut root, Node::Text(text));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(IngestError::XmlSyntax(err.to_string())),
        }
        buf.clear();
    }

    root.ok_or_else(|| IngestError::XmlSyntax("empty document".to_string()))
}

fn push_node(stack: &mut [(String, Vec<Node>)], root: &mut Option<Node>, node: Node) {
    match stack.last_mut() {
        Some((_, children)) => children.push(node),
        None => *root = Some(node),
    }
}
