//! The Analyzer (spec §4.4): name validation, nullability, the
//! first-invocation graph / SCC decomposition, and the subrule validator,
//! run in that order and failing fast on the first violation — grounded on
//! pegen's own `GrammarAnalyzer`, which runs the equivalent passes before
//! `parser_generator.py` ever touches the grammar for code generation.

mod nullability;
mod scc;
mod subrule;

use crate::error::ValidationError;
use crate::grammar::visitor::GrammarVisitor;
use crate::grammar::{Grammar, Item};

/// Runs every Analyzer pass over `grammar`, mutating its `Rule`/
/// `TopLevelItem` analysis flags in place. Returns the first violation
/// encountered; later passes do not run once an earlier one has failed,
/// since they assume a well-formed grammar as their precondition (e.g.
/// nullability assumes every name resolves).
pub fn analyze(grammar: &Grammar) -> Result<(), ValidationError> {
    grammar.validate_unique_names()?;
    validate_names(grammar)?;
    validate_reserved_prefix(grammar)?;
    validate_start_or_trailer(grammar)?;
    nullability::compute(grammar);
    scc::analyze(grammar)?;
    subrule::check(grammar)?;
    Ok(())
}

struct NameValidator<'g> {
    grammar: &'g Grammar,
    current_rule: String,
    error: Option<ValidationError>,
}

impl<'g> GrammarVisitor for NameValidator<'g> {
    fn visit_rule(&mut self, rule: &crate::grammar::Rule) {
        self.current_rule = rule.name.clone();
        self.visit_rhs(&rule.rhs);
    }

    fn visit_item(&mut self, item: &Item) {
        if self.error.is_some() {
            return;
        }
        if let Item::Name(name) = item {
            if !self.grammar.resolves(name) {
                self.error = Some(ValidationError::UnknownName {
                    rule: self.current_rule.clone(),
                    name: name.clone(),
                });
                return;
            }
        }
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

fn validate_names(grammar: &Grammar) -> Result<(), ValidationError> {
    let mut validator = NameValidator { grammar, current_rule: String::new(), error: None };
    validator.visit_grammar(grammar);
    match validator.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Names beginning with `_` are reserved for the Desugarer's synthesised
/// auxiliaries (spec §3 "Rule", §4.5); a grammar author using that prefix
/// directly is rejected rather than silently risking a collision.
fn validate_reserved_prefix(grammar: &Grammar) -> Result<(), ValidationError> {
    for name in grammar.rules().iter().map(|r| &r.name).chain(grammar.extern_decls().iter().map(|e| &e.name)) {
        if name.starts_with('_') {
            return Err(ValidationError::ReservedPrefix(name.clone()));
        }
    }
    Ok(())
}

fn validate_start_or_trailer(grammar: &Grammar) -> Result<(), ValidationError> {
    if grammar.rule("start").is_some() || grammar.metas().contains_key("trailer") {
        Ok(())
    } else {
        Err(ValidationError::NoStartOrTrailer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Alt, Rhs, Rule, TopLevelItem};
    use std::collections::BTreeMap;

    fn grammar_with_start(items: Vec<TopLevelItem>) -> Grammar {
        let rhs = Rhs::new(vec![Alt::new(items, None)]);
        let rule = Rule::new("start".into(), None, rhs, false);
        Grammar::new(vec![rule], Vec::new(), BTreeMap::new())
    }

    #[test]
    fn unknown_name_fails_fast() {
        let g = grammar_with_start(vec![TopLevelItem::new(None, Item::Name("nope".into()), None)]);
        assert!(matches!(analyze(&g), Err(ValidationError::UnknownName { .. })));
    }

    #[test]
    fn well_known_terminal_resolves() {
        let g = grammar_with_start(vec![TopLevelItem::new(None, Item::Name("NAME".into()), None)]);
        assert!(analyze(&g).is_ok());
    }

    #[test]
    fn missing_start_and_trailer_fails() {
        let rhs = Rhs::new(vec![Alt::new(vec![TopLevelItem::new(None, Item::Name("NAME".into()), None)], None)]);
        let rule = Rule::new("other".into(), None, rhs, false);
        let g = Grammar::new(vec![rule], Vec::new(), BTreeMap::new());
        assert!(matches!(analyze(&g), Err(ValidationError::NoStartOrTrailer)));
    }

    #[test]
    fn reserved_prefix_on_user_rule_is_rejected() {
        let rhs = Rhs::new(vec![Alt::new(vec![TopLevelItem::new(None, Item::Name("NAME".into()), None)], None)]);
        let rule = Rule::new("_bad".into(), None, rhs, false);
        let g = Grammar::new(vec![rule], Vec::new(), BTreeMap::new());
        assert!(matches!(analyze(&g), Err(ValidationError::ReservedPrefix(_))));
    }
}
