//! Recursive-descent parser over the token list `lexer::lex` produces,
//! directly implementing spec §4.3's EBNF. Grounded on pegen's own
//! hand-written grammar parser methods (`parse_rule`, `parse_alt`,
//! `parse_named_item`) translated from its packrat-over-itself style into
//! plain index-based lookahead, since this bootstrap layer exists
//! precisely so nothing downstream of it needs a working parser yet.

use std::collections::BTreeMap;

use super::lexer::{lex, MetaToken, MetaTokenKind};
use crate::error::GrammarParseError;
use crate::grammar::{Alt, ExternDecl, Grammar, Item, Rhs, Rule, TopLevelItem};
use crate::position::{Position, Source};

pub struct MetaGrammarParser<'a> {
    tokens: Vec<MetaToken>,
    pos: usize,
    source: &'a Source<'a>,
}

impl<'a> MetaGrammarParser<'a> {
    pub fn new(source: &'a Source<'a>) -> Result<Self, GrammarParseError> {
        let tokens = lex(source)?;
        Ok(Self { tokens, pos: 0, source })
    }

    pub fn parse(mut self) -> Result<Grammar, GrammarParseError> {
        let mut rules = Vec::new();
        let mut extern_decls = Vec::new();
        let mut metas = BTreeMap::new();

        while self.peek().kind != MetaTokenKind::Eof {
            match self.peek().kind {
                MetaTokenKind::At => {
                    let (name, value) = self.parse_meta()?;
                    metas.insert(name, value);
                }
                MetaTokenKind::KwExtern => extern_decls.push(self.parse_extern()?),
                _ => rules.push(self.parse_rule()?),
            }
        }

        Ok(Grammar::new(rules, extern_decls, metas))
    }

    fn peek(&self) -> &MetaToken {
        &self.tokens[self.pos]
    }

    fn peek_at(&self, offset: usize) -> &MetaToken {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> MetaToken {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn position(&self) -> Position {
        self.source.position_at(self.peek().start)
    }

    fn error(&self, message: impl Into<String>) -> GrammarParseError {
        GrammarParseError { file: None, position: self.position(), message: message.into() }
    }

    fn expect(&mut self, kind: MetaTokenKind, what: &str) -> Result<MetaToken, GrammarParseError> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            Err(self.error(format!("expected {what}, found {:?} {:?}", self.peek().kind, self.peek().text)))
        }
    }

    fn eat(&mut self, kind: MetaTokenKind) -> bool {
        if self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    /// `'@' NAME (STRING | NAME | <braced action>)?`
    fn parse_meta(&mut self) -> Result<(String, Option<String>), GrammarParseError> {
        self.expect(MetaTokenKind::At, "'@'")?;
        let name = self.expect(MetaTokenKind::Name, "meta name")?.text;
        let value = match self.peek().kind {
            MetaTokenKind::String => Some(unquote(&self.advance().text)),
            MetaTokenKind::Name => Some(self.advance().text),
            MetaTokenKind::Action => Some(self.advance().text),
            _ => None,
        };
        Ok((name, value))
    }

    /// `'extern' NAME ('[' type ']')?`
    fn parse_extern(&mut self) -> Result<ExternDecl, GrammarParseError> {
        self.expect(MetaTokenKind::KwExtern, "'extern'")?;
        let name = self.expect(MetaTokenKind::Name, "extern name")?.text;
        let ty = self.parse_optional_bracket_type()?;
        Ok(ExternDecl { name, ty })
    }

    /// `NAME ('[' type ']')? ':' rhs`
    fn parse_rule(&mut self) -> Result<Rule, GrammarParseError> {
        let name = self.expect(MetaTokenKind::Name, "rule name")?.text;
        let ty = self.parse_optional_bracket_type()?;
        self.expect(MetaTokenKind::Colon, "':'")?;
        let rhs = self.parse_rhs()?;
        Ok(Rule::new(name, ty, rhs, false))
    }

    /// `alt ('|' alt)*`, a leading `|` permitted before the first alt.
    fn parse_rhs(&mut self) -> Result<Rhs, GrammarParseError> {
        self.eat(MetaTokenKind::Bar);
        let mut alts = vec![self.parse_alt()?];
        while self.eat(MetaTokenKind::Bar) {
            alts.push(self.parse_alt()?);
        }
        Ok(Rhs::new(alts))
    }

    /// `item+ ('{' action '}')?` — the action, if present, was already
    /// scanned by the lexer into a single `Action` token.
    fn parse_alt(&mut self) -> Result<Alt, GrammarParseError> {
        let mut items = Vec::new();
        while self.starts_item() {
            items.push(self.parse_item()?);
        }
        if items.is_empty() {
            return Err(self.error("alternative must have at least one item"));
        }
        let action = if self.peek().kind == MetaTokenKind::Action { Some(self.advance().text) } else { None };
        Ok(Alt::new(items, action))
    }

    fn starts_item(&self) -> bool {
        matches!(
            self.peek().kind,
            MetaTokenKind::Name
                | MetaTokenKind::String
                | MetaTokenKind::LParen
                | MetaTokenKind::LBracket
                | MetaTokenKind::AmpAmp
                | MetaTokenKind::Amp
                | MetaTokenKind::Bang
                | MetaTokenKind::Tilde
                | MetaTokenKind::Dollar
        )
    }

    /// `[NAME '='] element ('[' type ']')?`
    fn parse_item(&mut self) -> Result<TopLevelItem, GrammarParseError> {
        let name = if self.peek().kind == MetaTokenKind::Name && self.peek_at(1).kind == MetaTokenKind::Equals {
            let n = self.advance().text;
            self.advance(); // '='
            Some(n)
        } else {
            None
        };
        let item = self.parse_element()?;
        let ty = self.parse_optional_bracket_type()?;
        Ok(TopLevelItem::new(name, item, ty))
    }

    /// `'&&' atom | '&' atom | '!' atom | atom`
    fn parse_element(&mut self) -> Result<Item, GrammarParseError> {
        match self.peek().kind {
            MetaTokenKind::AmpAmp => {
                self.advance();
                Ok(Item::Forced(Box::new(self.parse_atom()?)))
            }
            MetaTokenKind::Amp => {
                self.advance();
                Ok(Item::PositiveLookahead(Box::new(self.parse_atom()?)))
            }
            MetaTokenKind::Bang => {
                self.advance();
                Ok(Item::NegativeLookahead(Box::new(self.parse_atom()?)))
            }
            _ => self.parse_atom(),
        }
    }

    /// `atom := NAME | STRING | '(' rhs ')' | '[' rhs ']' | '~' | '$'`,
    /// then any of the postfix forms `atom ('?'|'*'|'+') | atom '.' atom '+'`.
    fn parse_atom(&mut self) -> Result<Item, GrammarParseError> {
        let primary = self.parse_primary()?;
        if self.eat(MetaTokenKind::Dot) {
            let node = self.parse_primary()?;
            self.expect(MetaTokenKind::Plus, "'+' to close a gather (separator.node+)")?;
            return Ok(Item::Gather { separator: Box::new(primary), node: Box::new(node) });
        }
        if self.eat(MetaTokenKind::Question) {
            return Ok(Item::Opt(Box::new(primary)));
        }
        if self.eat(MetaTokenKind::Star) {
            return Ok(Item::Repeat0(Box::new(primary)));
        }
        if self.eat(MetaTokenKind::Plus) {
            return Ok(Item::Repeat1(Box::new(primary)));
        }
        Ok(primary)
    }

    fn parse_primary(&mut self) -> Result<Item, GrammarParseError> {
        match self.peek().kind {
            MetaTokenKind::Name => Ok(Item::Name(self.advance().text)),
            MetaTokenKind::String => Ok(Item::String(self.advance().text)),
            MetaTokenKind::Dollar => {
                self.advance();
                Ok(Item::Name("ENDMARKER".to_string()))
            }
            MetaTokenKind::Tilde => {
                self.advance();
                Ok(Item::Cut)
            }
            MetaTokenKind::LParen => {
                self.advance();
                let rhs = self.parse_rhs()?;
                self.expect(MetaTokenKind::RParen, "')'")?;
                Ok(Item::Group(rhs))
            }
            MetaTokenKind::LBracket => {
                self.advance();
                let rhs = self.parse_rhs()?;
                self.expect(MetaTokenKind::RBracket, "']'")?;
                Ok(Item::Opt(Box::new(Item::Group(rhs))))
            }
            _ => Err(self.error(format!("expected an atom, found {:?} {:?}", self.peek().kind, self.peek().text))),
        }
    }

    /// A trailing `'[' type ']'` on a rule/extern/item is only consumed
    /// when the bracket's sole content is a single `NAME`; any richer
    /// content is a `[rhs]` optional-group atom instead, since both
    /// productions share the leading `[` token.
    fn parse_optional_bracket_type(&mut self) -> Result<Option<String>, GrammarParseError> {
        if self.peek().kind == MetaTokenKind::LBracket
            && self.peek_at(1).kind == MetaTokenKind::Name
            && self.peek_at(2).kind == MetaTokenKind::RBracket
        {
            self.advance();
            let ty = self.advance().text;
            self.advance();
            Ok(Some(ty))
        } else {
            Ok(None)
        }
    }
}

/// Strips the surrounding quotes from a lexed `STRING` token, leaving
/// escape sequences untouched — `StringLeaf`'s value keeps the quotes in
/// pegen (`grammar.py`'s `StringLeaf.__str__` returns `self.value` as-is),
/// so only meta-level directive values (`@meta "value"`) need unquoting.
fn unquote(raw: &str) -> String {
    raw[1..raw.len() - 1].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Grammar {
        let source = Source::new(src);
        MetaGrammarParser::new(&source).unwrap().parse().unwrap()
    }

    #[test]
    fn parses_a_simple_two_alternative_rule() {
        let g = parse("start: NAME '+' NAME | NAME");
        let rule = g.rule("start").unwrap();
        assert_eq!(rule.rhs.alts.len(), 2);
    }

    #[test]
    fn parses_named_items_and_action() {
        let g = parse("sum: a=NAME '+' b=NAME { a + b }");
        let rule = g.rule("sum").unwrap();
        let alt = &rule.rhs.alts[0];
        assert_eq!(alt.items[0].name.as_deref(), Some("a"));
        assert_eq!(alt.action.as_deref(), Some(" a + b "));
    }

    #[test]
    fn parses_extern_and_meta_directives() {
        let g = parse("@subheader 'use foo;'\nextern FOO[Bar]\nstart: FOO");
        assert_eq!(g.metas().get("subheader"), Some(&Some("use foo;".to_string())));
        assert!(g.extern_decl("FOO").is_some());
    }

    #[test]
    fn parses_repetition_and_gather_and_cut() {
        let g = parse("r: a.b+ c* d+ ~ e?");
        let rule = g.rule("r").unwrap();
        let items = &rule.rhs.alts[0].items;
        assert!(matches!(items[0].item, Item::Gather { .. }));
        assert!(matches!(items[1].item, Item::Repeat0(_)));
        assert!(matches!(items[2].item, Item::Repeat1(_)));
        assert!(matches!(items[3].item, Item::Cut));
        assert!(matches!(items[4].item, Item::Opt(_)));
    }

    #[test]
    fn leading_bar_on_rhs_is_permitted() {
        let g = parse("r:\n  | NAME\n  | NUMBER\n");
        assert_eq!(g.rule("r").unwrap().rhs.alts.len(), 2);
    }

    #[test]
    fn dollar_desugars_to_endmarker_name() {
        let g = parse("r: NAME $");
        let items = &g.rule("r").unwrap().rhs.alts[0].items;
        assert!(matches!(&items[1].item, Item::Name(n) if n == "ENDMARKER"));
    }

    #[test]
    fn rejects_unknown_name_only_at_analysis_not_parse_time() {
        // Parsing never checks name resolution; that's the Analyzer's job.
        let g = parse("r: totally_unknown_name");
        assert!(g.rule("r").is_some());
    }

    #[test]
    fn unterminated_action_is_a_parse_error() {
        let source = Source::new("r: NAME { unterminated");
        let err = MetaGrammarParser::new(&source).unwrap_err();
        assert!(err.message.contains("unterminated"));
    }
}
