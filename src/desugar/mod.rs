//! The Desugarer (spec §4.5): rewrites every construct other than
//! `NameLeaf`/`StringLeaf` into a concrete auxiliary rule, so the
//! CodeEmitter only ever has to emit code for named-rule calls, string
//! matches, and the handful of wrapper forms (`Opt`, `Forced`, lookaheads,
//! `Cut`) it handles inline.
//!
//! Grounded on pegen's `ParserGenerator.callmakervisitor`, which performs
//! the same group/repeat/gather rule-synthesis during code generation;
//! here it runs as its own pass so the Analyzer's left-recursion/
//! nullability results (computed on the pre-desugared tree) aren't
//! invalidated by rules appearing mid-pass.

use crate::grammar::{Alt, ExternDecl, Grammar, Item, Rhs, Rule, TopLevelItem};

pub struct Desugarer {
    counter: u32,
    synthesized: Vec<Rule>,
}

impl Desugarer {
    pub fn new() -> Self {
        Self { counter: 0, synthesized: Vec::new() }
    }

    /// Desugars every rule in `grammar` and appends the synthesised
    /// auxiliary rules, consuming `grammar` and returning the rewritten
    /// one. Externs and metas pass through untouched.
    pub fn run(mut self, grammar: Grammar) -> Grammar {
        let rules: Vec<Rule> = grammar
            .rules()
            .iter()
            .map(|rule| {
                let rhs = self.desugar_rhs(rule.rhs.clone());
                let desugared = Rule::new(rule.name.clone(), rule.ty.clone(), rhs, rule.memo);
                desugared.nullable.set(rule.nullable.get());
                desugared.left_recursive.set(rule.left_recursive.get());
                desugared.leader.set(rule.leader.get());
                desugared
            })
            .collect();

        let extern_decls: Vec<ExternDecl> =
            grammar.extern_decls().iter().map(|e| ExternDecl { name: e.name.clone(), ty: e.ty.clone() }).collect();

        let mut all_rules = rules;
        all_rules.extend(self.synthesized);
        Grammar::new(all_rules, extern_decls, grammar.metas().clone())
    }

    fn fresh_name(&mut self, prefix: &str) -> String {
        let n = self.counter;
        self.counter += 1;
        format!("{prefix}_{n}")
    }

    fn desugar_rhs(&mut self, rhs: Rhs) -> Rhs {
        Rhs::new(rhs.alts.into_iter().map(|alt| self.desugar_alt(alt)).collect())
    }

    fn desugar_alt(&mut self, alt: Alt) -> Alt {
        let action = alt.action.clone();
        let items = alt.items.into_iter().map(|item| self.desugar_top_level_item(item)).collect();
        Alt::new(items, action)
    }

    fn desugar_top_level_item(&mut self, top: TopLevelItem) -> TopLevelItem {
        let nullable = top.nullable.get();
        let item = self.desugar_item(top.item);
        let result = TopLevelItem::new(top.name, item, top.ty);
        result.nullable.set(nullable);
        result
    }

    /// `Opt` is kept inline (spec: "it does not spawn a rule"); every other
    /// compound form becomes a `NameLeaf` referencing a synthesised rule.
    fn desugar_item(&mut self, item: Item) -> Item {
        match item {
            Item::Name(_) | Item::String(_) | Item::Cut => item,
            Item::Group(rhs) => {
                let rhs = self.desugar_rhs(rhs);
                let name = self.fresh_name("_tmp");
                self.push_synthesized(name.clone(), rhs);
                Item::Name(name)
            }
            Item::Opt(inner) => Item::Opt(Box::new(self.desugar_item(*inner))),
            Item::Repeat0(inner) => {
                let inner = self.desugar_item(*inner);
                let name = self.fresh_name("_loop0");
                let rhs = Rhs::new(vec![Alt::new(vec![TopLevelItem::new(None, inner, None)], None)]);
                self.push_synthesized(name.clone(), rhs);
                Item::Name(name)
            }
            Item::Repeat1(inner) => {
                let inner = self.desugar_item(*inner);
                let name = self.fresh_name("_loop1");
                let rhs = Rhs::new(vec![Alt::new(vec![TopLevelItem::new(None, inner, None)], None)]);
                self.push_synthesized(name.clone(), rhs);
                Item::Name(name)
            }
            Item::Gather { separator, node } => {
                let separator = self.desugar_item(*separator);
                let node = self.desugar_item(*node);
                let loop_name = self.fresh_name("_loop0");
                let loop_rhs = Rhs::new(vec![Alt::new(
                    vec![
                        TopLevelItem::new(None, separator, None),
                        TopLevelItem::new(Some("elem".to_string()), node.clone(), None),
                    ],
                    Some("elem".to_string()),
                )]);
                self.push_synthesized(loop_name.clone(), loop_rhs);

                let gather_name = self.fresh_name("_gather");
                let gather_rhs = Rhs::new(vec![Alt::new(
                    vec![
                        TopLevelItem::new(Some("elem".to_string()), node, None),
                        TopLevelItem::new(Some("rest".to_string()), Item::Repeat0(Box::new(Item::Name(loop_name))), None),
                    ],
                    None,
                )]);
                self.push_synthesized(gather_name.clone(), gather_rhs);
                Item::Name(gather_name)
            }
            Item::Forced(inner) => Item::Forced(Box::new(self.desugar_item(*inner))),
            Item::PositiveLookahead(inner) => Item::PositiveLookahead(Box::new(self.desugar_item(*inner))),
            Item::NegativeLookahead(inner) => Item::NegativeLookahead(Box::new(self.desugar_item(*inner))),
        }
    }

    fn push_synthesized(&mut self, name: String, rhs: Rhs) {
        self.synthesized.push(Rule::new(name, None, rhs, false));
    }
}

impl Default for Desugarer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn name_item(n: &str) -> TopLevelItem {
        TopLevelItem::new(None, Item::Name(n.to_string()), None)
    }

    #[test]
    fn group_is_replaced_by_a_synthesized_tmp_rule() {
        let inner_rhs = Rhs::new(vec![Alt::new(vec![name_item("a"), name_item("b")], None)]);
        let rhs = Rhs::new(vec![Alt::new(vec![TopLevelItem::new(None, Item::Group(inner_rhs), None)], None)]);
        let rule = Rule::new("start".into(), None, rhs, false);
        let grammar = Grammar::new(vec![rule], Vec::new(), BTreeMap::new());

        let desugared = Desugarer::new().run(grammar);
        let start = desugared.rule("start").unwrap();
        assert!(matches!(&start.rhs.alts[0].items[0].item, Item::Name(n) if n == "_tmp_0"));
        assert!(desugared.rule("_tmp_0").is_some());
    }

    #[test]
    fn repeat0_is_replaced_by_a_synthesized_loop0_rule() {
        let rhs = Rhs::new(vec![Alt::new(vec![TopLevelItem::new(None, Item::Repeat0(Box::new(Item::Name("a".into()))), None)], None)]);
        let rule = Rule::new("start".into(), None, rhs, false);
        let grammar = Grammar::new(vec![rule], Vec::new(), BTreeMap::new());

        let desugared = Desugarer::new().run(grammar);
        assert!(matches!(&desugared.rule("start").unwrap().rhs.alts[0].items[0].item, Item::Name(n) if n == "_loop0_0"));
    }

    #[test]
    fn opt_is_kept_inline_and_spawns_no_rule() {
        let rhs = Rhs::new(vec![Alt::new(vec![TopLevelItem::new(None, Item::Opt(Box::new(Item::Name("a".into()))), None)], None)]);
        let rule = Rule::new("start".into(), None, rhs, false);
        let before_names: Vec<_> = Grammar::new(vec![rule.clone()], Vec::new(), BTreeMap::new()).rules().iter().map(|r| r.name.clone()).collect();
        let grammar = Grammar::new(vec![rule], Vec::new(), BTreeMap::new());

        let desugared = Desugarer::new().run(grammar);
        assert!(matches!(&desugared.rule("start").unwrap().rhs.alts[0].items[0].item, Item::Opt(_)));
        assert_eq!(desugared.rules().len(), before_names.len());
    }

    #[test]
    fn gather_spawns_a_loop_and_a_gather_rule() {
        let item = TopLevelItem::new(
            None,
            Item::Gather { separator: Box::new(Item::String("','".into())), node: Box::new(Item::Name("a".into())) },
            None,
        );
        let rhs = Rhs::new(vec![Alt::new(vec![item], None)]);
        let rule = Rule::new("start".into(), None, rhs, false);
        let grammar = Grammar::new(vec![rule], Vec::new(), BTreeMap::new());

        let desugared = Desugarer::new().run(grammar);
        assert!(desugared.rules().iter().any(|r| r.is_loop()));
        assert!(desugared.rules().iter().any(|r| r.is_gather()));
    }
}
