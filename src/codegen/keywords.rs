//! Keyword classification (spec §4.6 "Keyword classification"), run once
//! per grammar during emission over every distinct string literal that
//! looks like an identifier.
//!
//! The standard pegen quote convention carries the classification: a
//! single-quoted literal (`'if'`) is a hard keyword, rejected by the `NAME`
//! terminal everywhere; a double-quoted literal (`"match"`) is a soft
//! keyword, still allowed to match `NAME` outside the alternative that
//! spells it out literally. Each table is its quote class's identifier-
//! shaped literals, sorted. Grounded on pegen's own `validate_rule_names`/
//! keyword gathering, which is a single pass over every `StringLeaf` in the
//! grammar, partitioned the same way by the leaf's original quote
//! character.

use std::collections::BTreeSet;

use crate::grammar::{Grammar, Item};

fn is_identifier_literal(text: &str) -> bool {
    let inner = text.trim_matches(|c| c == '"' || c == '\'');
    if inner.is_empty() || inner.len() + 2 != text.len() {
        return false;
    }
    let mut chars = inner.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_alphanumeric())
}

#[derive(Default)]
struct QuotedLiterals {
    single_quoted: BTreeSet<String>,
    double_quoted: BTreeSet<String>,
}

fn collect_string_literals(grammar: &Grammar) -> QuotedLiterals {
    let mut literals = QuotedLiterals::default();
    for rule in grammar.rules() {
        collect_from_rhs(&rule.rhs, &mut literals);
    }
    literals
}

fn collect_from_rhs(rhs: &crate::grammar::Rhs, out: &mut QuotedLiterals) {
    for alt in &rhs.alts {
        for top in &alt.items {
            collect_from_item(&top.item, out);
        }
    }
}

fn collect_from_item(item: &Item, out: &mut QuotedLiterals) {
    match item {
        Item::String(s) => {
            if is_identifier_literal(s) {
                let inner = s.trim_matches(|c| c == '"' || c == '\'').to_string();
                if s.starts_with('\'') {
                    out.single_quoted.insert(inner);
                } else if s.starts_with('"') {
                    out.double_quoted.insert(inner);
                }
            }
        }
        Item::Group(rhs) => collect_from_rhs(rhs, out),
        Item::Opt(inner)
        | Item::Repeat0(inner)
        | Item::Repeat1(inner)
        | Item::Forced(inner)
        | Item::PositiveLookahead(inner)
        | Item::NegativeLookahead(inner) => collect_from_item(inner, out),
        Item::Gather { separator, node } => {
            collect_from_item(separator, out);
            collect_from_item(node, out);
        }
        Item::Name(_) | Item::Cut => {}
    }
}

/// The two emitted tables: `KEYWORDS` (reserved words the `NAME` terminal
/// must reject) and `SOFT_KEYWORDS` (identifier-shaped literals that are
/// allowed to still match `NAME` elsewhere).
pub struct KeywordTables {
    pub keywords: Vec<String>,
    pub soft_keywords: Vec<String>,
}

pub fn classify(grammar: &Grammar) -> KeywordTables {
    let literals = collect_string_literals(grammar);
    KeywordTables {
        keywords: literals.single_quoted.into_iter().collect(),
        soft_keywords: literals.double_quoted.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Alt, Rhs, Rule, TopLevelItem};
    use std::collections::BTreeMap;

    #[test]
    fn single_quoted_literals_are_keywords_double_quoted_are_soft() {
        let items: Vec<TopLevelItem> = ["'if'", "'else'", "\"match\"", "'+'"]
            .iter()
            .map(|s| TopLevelItem::new(None, Item::String(s.to_string()), None))
            .collect();
        let rhs = Rhs::new(vec![Alt::new(items, None)]);
        let rule = Rule::new("start".into(), None, rhs, false);
        let grammar = Grammar::new(vec![rule], Vec::new(), BTreeMap::new());

        let tables = classify(&grammar);
        // '+' is not identifier-shaped, so only the quoted words qualify.
        assert_eq!(tables.keywords, vec!["else", "if"]);
        assert_eq!(tables.soft_keywords, vec!["match"]);
    }

    #[test]
    fn non_identifier_literals_are_never_classified() {
        let items = vec![TopLevelItem::new(None, Item::String("'=='".into()), None)];
        let rhs = Rhs::new(vec![Alt::new(items, None)]);
        let rule = Rule::new("start".into(), None, rhs, false);
        let grammar = Grammar::new(vec![rule], Vec::new(), BTreeMap::new());

        let tables = classify(&grammar);
        assert!(tables.keywords.is_empty() && tables.soft_keywords.is_empty());
    }

    /// Single-quoted `one`..`five` are keywords, double-quoted `six`..`ten`
    /// are soft keywords, each sorted.
    #[test]
    fn reproduces_the_documented_ten_word_split() {
        let items: Vec<TopLevelItem> = [
            "'one'", "'two'", "'three'", "'four'", "'five'", "\"six\"", "\"seven\"", "\"eight\"", "\"nine\"", "\"ten\"",
        ]
        .iter()
        .map(|s| TopLevelItem::new(None, Item::String(s.to_string()), None))
        .collect();
        let rhs = Rhs::new(vec![Alt::new(items, None)]);
        let rule = Rule::new("start".into(), None, rhs, false);
        let grammar = Grammar::new(vec![rule], Vec::new(), BTreeMap::new());

        let tables = classify(&grammar);
        assert_eq!(tables.keywords, vec!["five", "four", "one", "three", "two"]);
        assert_eq!(tables.soft_keywords, vec!["eight", "nine", "seven", "six", "ten"]);
    }
}
