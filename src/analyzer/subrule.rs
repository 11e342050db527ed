//! Subrule/shadowed-alternative validator (spec §4.4): catches an
//! alternative that can never be reached because an earlier alternative
//! in the same `Rhs` is a literal prefix of it. Grounded on pegen's own
//! grammar-validator pass, which visits every `Rhs` in the grammar,
//! including ones nested inside a parenthesized `Group` rather than sitting
//! directly on a rule, and performs the equivalent check over the
//! alternatives' string forms before generation.

use crate::error::ValidationError;
use crate::grammar::{Grammar, Item, Rhs};

pub fn check(grammar: &Grammar) -> Result<(), ValidationError> {
    for rule in grammar.rules() {
        check_rhs(&rule.name, &rule.rhs)?;
    }
    Ok(())
}

fn check_rhs(rule_name: &str, rhs: &Rhs) -> Result<(), ValidationError> {
    let forms: Vec<String> = rhs.alts.iter().map(|alt| alt.to_string()).collect();
    for later in 1..forms.len() {
        for earlier in 0..later {
            if forms[later].starts_with(&forms[earlier]) {
                return Err(ValidationError::ShadowedAlternative {
                    rule: rule_name.to_string(),
                    earlier: forms[earlier].clone(),
                    later: forms[later].clone(),
                });
            }
        }
    }
    for alt in &rhs.alts {
        for top in &alt.items {
            check_item(rule_name, &top.item)?;
        }
    }
    Ok(())
}

fn check_item(rule_name: &str, item: &Item) -> Result<(), ValidationError> {
    match item {
        Item::Group(rhs) => check_rhs(rule_name, rhs),
        Item::Opt(inner)
        | Item::Repeat0(inner)
        | Item::Repeat1(inner)
        | Item::Forced(inner)
        | Item::PositiveLookahead(inner)
        | Item::NegativeLookahead(inner) => check_item(rule_name, inner),
        Item::Gather { separator, node } => {
            check_item(rule_name, separator)?;
            check_item(rule_name, node)
        }
        Item::Name(_) | Item::String(_) | Item::Cut => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Alt, Item, Rhs, Rule, TopLevelItem};
    use std::collections::BTreeMap;

    fn item(n: &str) -> TopLevelItem {
        TopLevelItem::new(None, Item::Name(n.to_string()), None)
    }

    #[test]
    fn prefix_alternative_is_rejected() {
        let rhs = Rhs::new(vec![
            Alt::new(vec![item("a")], None),
            Alt::new(vec![item("a"), item("b")], None),
        ]);
        let rule = Rule::new("r".into(), None, rhs, false);
        let grammar = Grammar::new(vec![rule], Vec::new(), BTreeMap::new());
        assert!(check(&grammar).is_err());
    }

    #[test]
    fn shadowing_nested_inside_a_group_is_still_caught() {
        let inner = Rhs::new(vec![
            Alt::new(vec![item("a")], None),
            Alt::new(vec![item("a"), item("b")], None),
        ]);
        let rhs = Rhs::new(vec![Alt::new(vec![TopLevelItem::new(None, Item::Group(inner), None)], None)]);
        let rule = Rule::new("r".into(), None, rhs, false);
        let grammar = Grammar::new(vec![rule], Vec::new(), BTreeMap::new());
        assert!(check(&grammar).is_err());
    }

    #[test]
    fn distinct_alternatives_are_accepted() {
        let rhs = Rhs::new(vec![Alt::new(vec![item("a")], None), Alt::new(vec![item("b")], None)]);
        let rule = Rule::new("r".into(), None, rhs, false);
        let grammar = Grammar::new(vec![rule], Vec::new(), BTreeMap::new());
        assert!(check(&grammar).is_ok());
    }
}
