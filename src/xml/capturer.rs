//! A capturer owns a column name and an ordered list of candidate lowercase
//! tag names; it looks up values in a DOM subtree (spec.md §4.3 step 4,
//! GLOSSARY "Capturer").
use super::dom::Node;

#[derive(Debug, Clone)]
pub struct Capturer {
    pub column: String,
    pub tags: Vec<String>,
}

impl Capturer {
    pub fn new(column: &str, tags: &[&str]) -> Self {
        Capturer {
            column: column.to_ascii_lowercase(),
            tags: tags.iter().map(|t| t.to_ascii_lowercase()).collect(),
        }
    }

    fn matches(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Returns the text content of the first descendant (including `node`
    /// itself) whose tag matches one of this capturer's candidate tags.
    pub fn find_value(&self, node: &Node) -> Option<String> {
        if self.matches(node.tag_name()) {
            return Some(first_child_text(node));
        }
        for child in node.children() {
            if let Some(v) = self.find_value(child) {
                return Some(v);
            }
        }
        None
    }

    /// Returns the text content of every descendant (including `node`
    /// itself) whose tag matches, in document order.
    pub fn find_values(&self, node: &Node) -> Vec<String> {
        let mut out = Vec::new();
        self.find_values_rec(node, &mut out);
        out
    }

    fn find_values_rec(&self, node: &Node, out: &mut Vec<String>) {
        if self.matches(node.tag_name()) {
            out.push(first_child_text(node));
            return;
        }
        for child in node.children() {
            self.find_values_rec(child, out);
        }
    }

    /// Returns every node (anywhere in the subtree) whose tag matches one
    /// of this capturer's candidate tags; used by the `divider` capturer to
    /// split a file into records.
    pub fn find_nodes<'a>(&self, node: &'a Node) -> Vec<&'a Node> {
        let mut out = Vec::new();
        self.find_nodes_rec(node, &mut out);
        out
    }

    fn find_nodes_rec<'a>(&self, node: &'a Node, out: &mut Vec<&'a Node>) {
        if self.matches(node.tag_name()) {
            out.push(node);
        }
        for child in node.children() {
            self.find_nodes_rec(child, out);
        }
    }
}

fn first_child_text(node: &Node) -> String {
    node.children()
        .first()
        .map(|c| c.text().to_string())
        .unwrap_or_default()
}

/// Builds a list of capturers from an interleaved `":column", "tag", "tag",
/// ":column2", "tag"...` argument list, mirroring the reference's
/// `newCapturers` helper.
pub fn capturers(cols_tags: &[&str]) -> Vec<Capturer> {
    assert!(!cols_tags.is_empty(), "capturers() requires at least one column");
    assert!(
        cols_tags[0].starts_with(':'),
        "first element must be a column name (begin with ':')"
    );

    let mut result = Vec::new();
    let mut last_column = 0usize;
    for (i, s) in cols_tags.iter().enumerate() {
        if s.starts_with(':') && i > 0 {
            result.push(Capturer::new(
                &cols_tags[last_column][1..],
                &cols_tags[last_column + 1..i],
            ));
            last_column = i;
        }
    }
    result.push(Capturer::new(
        &cols_tags[last_column][1..],
        &cols_tags[last_column + 1..],
    ));
    result
}

/// The declarative shape of a single publication type's extraction rules
/// (spec.md §4.3 step 4): a divider to split the file into records, global
/// fields found once per file, and per-record mandatory/optional/repeated
/// fields.
pub struct ParserSpec {
    pub divider: Capturer,
    pub global: Vec<Capturer>,
    pub mandatory: Vec<Capturer>,
    pub optional: Vec<Capturer>,
    pub repeated: Vec<Capturer>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::dom;

    #[test]
    fn finds_first_matching_value() {
        let root = dom::parse("<Root><Item><Code>100</Code></Item></Root>").unwrap();
        let c = Capturer::new("item_code", &["code"]);
        assert_eq!(c.find_value(&root).as_deref(), Some("100"));
    }

    #[test]
    fn finds_all_matching_values_in_order() {
        let root = dom::parse("<Root><Code>1</Code><Code>2</Code></Root>").unwrap();
        let c = Capturer::new("code", &["code"]);
        assert_eq!(c.find_values(&root), vec!["1", "2"]);
    }

    #[test]
    fn capturers_builder_groups_by_column() {
        let cs = capturers(&[":a", "Tag1", "Tag2", ":b", "Tag3"]);
        assert_eq!(cs.len(), 2);
        assert_eq!(cs[0].column, "a");
        assert_eq!(cs[0].tags, vec!["tag1", "tag2"]);
        assert_eq!(cs[1].column, "b");
        assert_eq!(cs[1].tags, vec!["tag3"]);
    }
}
