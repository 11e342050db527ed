//! A depth-first grammar visitor (spec §4.2), grounded on pegen's
//! `GrammarVisitor.generic_visit`, which dispatches by the Python node's
//! `__class__.__name__` and otherwise recurses into whatever the node
//! iterates over. A tagged `enum` has no such dynamic dispatch, so this
//! trait's default methods recurse with a plain `match` instead — the
//! exhaustiveness check on `Item` is the Rust-idiomatic replacement for
//! pegen's `isinstance` chain (spec §9 "Name every concrete Item variant").

use super::{Alt, ExternDecl, Grammar, Item, Rhs, Rule, TopLevelItem};

/// Implement only the `visit_*` methods you need; the rest fall back to
/// `generic_visit`'s structural recursion.
pub trait GrammarVisitor {
    fn visit_grammar(&mut self, grammar: &Grammar) {
        for rule in grammar.rules() {
            self.visit_rule(rule);
        }
        for decl in grammar.extern_decls() {
            self.visit_extern_decl(decl);
        }
    }

    fn visit_rule(&mut self, rule: &Rule) {
        self.visit_rhs(&rule.rhs);
    }

    fn visit_extern_decl(&mut self, _decl: &ExternDecl) {}

    fn visit_rhs(&mut self, rhs: &Rhs) {
        for alt in &rhs.alts {
            self.visit_alt(alt);
        }
    }

    fn visit_alt(&mut self, alt: &Alt) {
        for item in &alt.items {
            self.visit_top_level_item(item);
        }
    }

    fn visit_top_level_item(&mut self, item: &TopLevelItem) {
        self.visit_item(&item.item);
    }

    fn visit_item(&mut self, item: &Item) {
        match item {
            Item::Name(_) | Item::String(_) | Item::Cut => {}
            Item::Group(rhs) => self.visit_rhs(rhs),
            Item::Opt(inner)
            | Item::Repeat0(inner)
            | Item::Repeat1(inner)
            | Item::Forced(inner)
            | Item::PositiveLookahead(inner)
            | Item::NegativeLookahead(inner) => self.visit_item(inner),
            Item::Gather { separator, node } => {
                self.visit_item(separator);
                self.visit_item(node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    struct NameCollector(Vec<String>);
    impl GrammarVisitor for NameCollector {
        fn visit_item(&mut self, item: &Item) {
            if let Item::Name(n) = item {
                self.0.push(n.clone());
            }
            // still recurse into compound items via the default behavior
            match item {
                Item::Group(rhs) => self.visit_rhs(rhs),
                Item::Opt(inner)
                | Item::Repeat0(inner)
                | Item::Repeat1(inner)
                | Item::Forced(inner)
                | Item::PositiveLookahead(inner)
                | Item::NegativeLookahead(inner) => self.visit_item(inner),
                Item::Gather { separator, node } => {
                    self.visit_item(separator);
                    self.visit_item(node);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn collects_every_name_leaf_in_a_grammar() {
        let rhs = Rhs::new(vec![Alt::new(
            vec![
                TopLevelItem::new(None, Item::Name("a".into()), None),
                TopLevelItem::new(None, Item::Repeat0(Box::new(Item::Name("b".into()))), None),
            ],
            None,
        )]);
        let rule = Rule::new("r".into(), None, rhs, false);
        let grammar = Grammar::new(vec![rule], Vec::new(), BTreeMap::new());

        let mut collector = NameCollector(Vec::new());
        collector.visit_grammar(&grammar);
        assert_eq!(collector.0, vec!["a".to_string(), "b".to_string()]);
    }
}
