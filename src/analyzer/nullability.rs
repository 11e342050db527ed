//! Nullability fixed-point (spec §4.4 "Nullability"), grounded on pegen's
//! `GrammarAnalyzer.compute_nullables`, adapted from its repeated-whole-
//! grammar-walk loop into one shared worklist since our `Item` enum lets
//! a single recursive function decide nullability for every node kind
//! without an `isinstance` chain.

use std::collections::HashMap;

use crate::grammar::{Alt, Grammar, Item, Rhs};

/// Runs to a fixed point and writes `nullable` onto every `Rule` and
/// `TopLevelItem` in `grammar` (their `Cell<bool>` fields), then returns a
/// name → nullable lookup for convenience callers that don't want to walk
/// `grammar.rules()` again.
pub fn compute(grammar: &Grammar) -> HashMap<String, bool> {
    let mut nullable: HashMap<String, bool> = grammar.rules().iter().map(|r| (r.name.clone(), false)).collect();

    loop {
        let mut changed = false;
        for rule in grammar.rules() {
            let was = nullable[&rule.name];
            let now = rhs_nullable(&rule.rhs, grammar, &nullable);
            if now != was {
                nullable.insert(rule.name.clone(), now);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    for rule in grammar.rules() {
        rule.nullable.set(nullable[&rule.name]);
        for alt in &rule.rhs.alts {
            mark_items(alt, grammar, &nullable);
        }
    }

    nullable
}

fn mark_items(alt: &Alt, grammar: &Grammar, nullable: &HashMap<String, bool>) {
    for top in &alt.items {
        top.nullable.set(item_nullable(&top.item, grammar, nullable));
        if let Item::Group(rhs) = &top.item {
            for inner in &rhs.alts {
                mark_items(inner, grammar, nullable);
            }
        }
    }
}

fn rhs_nullable(rhs: &Rhs, grammar: &Grammar, nullable: &HashMap<String, bool>) -> bool {
    rhs.alts.iter().any(|alt| alt_nullable(alt, grammar, nullable))
}

fn alt_nullable(alt: &Alt, grammar: &Grammar, nullable: &HashMap<String, bool>) -> bool {
    alt.items.iter().all(|item| item_nullable(&item.item, grammar, nullable))
}

fn item_nullable(item: &Item, grammar: &Grammar, nullable: &HashMap<String, bool>) -> bool {
    match item {
        Item::Name(name) => {
            if let Some(&n) = nullable.get(name) {
                n
            } else if grammar.extern_decl(name).is_some() {
                true
            } else {
                false
            }
        }
        Item::String(s) => s == "\"\"" || s == "''",
        Item::Group(rhs) => rhs_nullable(rhs, grammar, nullable),
        Item::Opt(_) | Item::PositiveLookahead(_) | Item::NegativeLookahead(_) | Item::Forced(_) | Item::Cut => true,
        Item::Repeat0(_) => true,
        Item::Repeat1(_) | Item::Gather { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Rule, TopLevelItem};
    use std::collections::BTreeMap;

    fn name_item(n: &str) -> TopLevelItem {
        TopLevelItem::new(None, Item::Name(n.to_string()), None)
    }

    #[test]
    fn opt_and_repeat0_are_always_nullable() {
        let rhs = Rhs::new(vec![Alt::new(vec![TopLevelItem::new(None, Item::Repeat0(Box::new(Item::Name("a".into()))), None)], None)]);
        let rule_a = Rule::new("a".into(), None, Rhs::new(vec![Alt::new(vec![name_item("b")], None)]), false);
        let rule_b = Rule::new("b".into(), None, Rhs::new(vec![Alt::new(vec![TopLevelItem::new(None, Item::String("'x'".into()), None)], None)]), false);
        let rule_r = Rule::new("r".into(), None, rhs, false);
        let grammar = Grammar::new(vec![rule_r, rule_a, rule_b], Vec::new(), BTreeMap::new());
        let result = compute(&grammar);
        assert!(result["r"]);
    }

    #[test]
    fn rule_nullable_propagates_through_chain() {
        // start -> mid -> end, end is nullable (empty alt), so all are.
        let end = Rule::new("end".into(), None, Rhs::new(vec![Alt::new(vec![TopLevelItem::new(None, Item::Opt(Box::new(Item::Name("end".into()))), None)], None)]), false);
        let mid = Rule::new("mid".into(), None, Rhs::new(vec![Alt::new(vec![name_item("end")], None)]), false);
        let start = Rule::new("start".into(), None, Rhs::new(vec![Alt::new(vec![name_item("mid")], None)]), false);
        let grammar = Grammar::new(vec![start, mid, end], Vec::new(), BTreeMap::new());
        let result = compute(&grammar);
        assert!(result["start"] && result["mid"] && result["end"]);
    }

    #[test]
    fn non_nullable_required_item_blocks_alt_nullability() {
        let rhs = Rhs::new(vec![Alt::new(vec![name_item("a"), TopLevelItem::new(None, Item::Repeat1(Box::new(Item::Name("a".into()))), None)], None)]);
        let rule_a = Rule::new("a".into(), None, Rhs::new(vec![Alt::new(vec![TopLevelItem::new(None, Item::String("'x'".into()), None)], None)]), false);
        let rule_r = Rule::new("r".into(), None, rhs, false);
        let grammar = Grammar::new(vec![rule_r, rule_a], Vec::new(), BTreeMap::new());
        let result = compute(&grammar);
        assert!(!result["r"]);
    }
}
