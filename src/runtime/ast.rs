//! Default parse-tree representation, used by rule methods the grammar
//! author left without a custom return-type annotation (spec §3, Rule's
//! "optional return-type annotation"). Grounded on the teacher's
//! `ASTNode<TNode>`/`Lex<TToken>` pair, generalized to a string-labelled
//! tree instead of a user-supplied `NodeImpl` enum, since a text grammar has
//! no compile-time node-value type to plug in for the default case.

use std::fmt::{self, Debug, Formatter};

/// One element of the lexical token stream produced by the Tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lex<Tok> {
    pub token: Tok,
    pub start: usize,
    pub end: usize,
}

impl<Tok> Lex<Tok> {
    pub fn new(token: Tok, start: usize, end: usize) -> Self {
        Self { token, start, end }
    }
}

/// Parse tree produced by a rule with no custom action: the default action
/// is "the list of item values in source order" (spec §4.6), realized here
/// as a tree whose children are exactly that list.
#[derive(Clone, PartialEq, Eq, serde::Serialize)]
pub struct AstNode {
    /// The rule or token name this node was produced from.
    pub label: &'static str,
    pub start: usize,
    pub end: usize,
    pub children: Vec<AstNode>,
}

impl AstNode {
    pub fn leaf(label: &'static str, start: usize, end: usize) -> Self {
        Self { label, start, end, children: Vec::new() }
    }

    pub fn tree(label: &'static str, start: usize, end: usize, children: Vec<AstNode>) -> Self {
        Self { label, start, end, children }
    }

    /// An empty, zero-width node representing a matched `Opt`/nullable
    /// construct that consumed nothing, or the target of a null production.
    pub fn empty(label: &'static str, at: usize) -> Self {
        Self::leaf(label, at, at)
    }
}

impl Debug for AstNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("AstNode");
        s.field("label", &self.label).field("span", &(self.start, self.end));
        if !self.children.is_empty() {
            s.field("children", &self.children);
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_node_has_zero_width_span() {
        let n = AstNode::empty("opt", 7);
        assert_eq!(n.start, 7);
        assert_eq!(n.end, 7);
        assert!(n.children.is_empty());
    }
}
