//! The grammar data model (spec §3): a `Grammar` of `Rule`s and
//! `ExternDecl`s, each `Rule` a right-hand side tree of `Alt`s made of
//! `TopLevelItem`s wrapping an `Item`.
//!
//! Grounded on `examples/original_source/src/stde/pegen/grammar.py`'s
//! `Grammar`/`Rule`/`ExternDecl`/`Rhs`/`Alt`/`TopLevelItem`/`Leaf`/`Opt`/
//! `Repeat`/`Gather`/`Group`/`Forced`/`Lookahead`/`Cut` class hierarchy, with
//! one deliberate departure: pegen's `Item` is a `Union` of unrelated
//! classes reached by runtime `isinstance` dispatch (natural in Python,
//! where `GrammarVisitor.visit` dispatches on `__class__.__name__`); here
//! it is a single tagged `enum` matched exhaustively, since this tree is
//! inert data walked by the Analyzer/Desugarer/CodeEmitter rather than
//! something that executes itself the way the teacher's `Rc<dyn
//! IProduction>` productions do.

pub mod visitor;

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

pub use visitor::GrammarVisitor;

/// A full grammar: the rule and extern-declaration tables plus any
/// `@meta` directives (spec §3 "Metas"), insertion-ordered so `Display`
/// and code emission reproduce the source's declaration order.
#[derive(Debug, Clone)]
pub struct Grammar {
    rules: Vec<Rule>,
    extern_decls: Vec<ExternDecl>,
    metas: BTreeMap<String, Option<String>>,
}

impl Grammar {
    pub fn new(rules: Vec<Rule>, extern_decls: Vec<ExternDecl>, metas: BTreeMap<String, Option<String>>) -> Self {
        Self { rules, extern_decls, metas }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rules_mut(&mut self) -> &mut [Rule] {
        &mut self.rules
    }

    pub fn extern_decls(&self) -> &[ExternDecl] {
        &self.extern_decls
    }

    pub fn metas(&self) -> &BTreeMap<String, Option<String>> {
        &self.metas
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn rule_mut(&mut self, name: &str) -> Option<&mut Rule> {
        self.rules.iter_mut().find(|r| r.name == name)
    }

    pub fn extern_decl(&self, name: &str) -> Option<&ExternDecl> {
        self.extern_decls.iter().find(|e| e.name == name)
    }

    /// Whether `name` resolves to anything at all: a declared rule, an
    /// extern, or a well-known tokenizer terminal (spec §4.4 "Name
    /// validation").
    pub fn resolves(&self, name: &str) -> bool {
        self.rule(name).is_some()
            || self.extern_decl(name).is_some()
            || crate::runtime::tokenizer::TokenKind::from_name(name).is_some()
    }

    pub fn push_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Duplicate rule/extern names fail fast (spec §4.3): a single
    /// namespace spans both tables, exactly as `stde.pegen.grammar.Grammar`
    /// checks before building its `items` map.
    pub fn validate_unique_names(&self) -> Result<(), crate::error::ValidationError> {
        let mut seen = std::collections::HashSet::new();
        for name in self.rules.iter().map(|r| &r.name).chain(self.extern_decls.iter().map(|e| &e.name)) {
            if !seen.insert(name.clone()) {
                return Err(crate::error::ValidationError::DuplicateName(name.clone()));
            }
        }
        Ok(())
    }
}

impl Display for Grammar {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for rule in &self.rules {
            if !first {
                writeln!(f)?;
            }
            first = false;
            writeln!(f, "{rule}")?;
        }
        for decl in &self.extern_decls {
            writeln!(f, "{decl}")?;
        }
        Ok(())
    }
}

/// A single grammar rule: `name[type]: rhs`. The three `Cell<bool>` flags
/// are write-once-per-pass outputs of the Analyzer (spec §4.4), not part
/// of the grammar as parsed; a `Cell` lets the Analyzer set them through a
/// shared `&Grammar` without threading `&mut` through the whole SCC walk.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub ty: Option<String>,
    pub rhs: Rhs,
    pub memo: bool,
    pub nullable: Cell<bool>,
    pub left_recursive: Cell<bool>,
    pub leader: Cell<bool>,
}

impl Rule {
    pub fn new(name: String, ty: Option<String>, rhs: Rhs, memo: bool) -> Self {
        Self {
            name,
            ty,
            rhs,
            memo,
            nullable: Cell::new(false),
            left_recursive: Cell::new(false),
            leader: Cell::new(false),
        }
    }

    pub fn is_loop(&self) -> bool {
        self.name.starts_with("_loop")
    }

    pub fn is_gather(&self) -> bool {
        self.name.starts_with("_gather")
    }

    pub fn initial_names(&self) -> Vec<String> {
        self.rhs.initial_names()
    }

    /// A rule whose body is a single alternative holding a single
    /// parenthesized group is the same rule as its group's contents
    /// (spec §4.5 "Group flattening").
    pub fn flatten(&self) -> &Rhs {
        if !self.is_loop() {
            if let [alt] = self.rhs.alts.as_slice() {
                if let [item] = alt.items.as_slice() {
                    if let Item::Group(inner) = &item.item {
                        return inner;
                    }
                }
            }
        }
        &self.rhs
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.ty {
            Some(ty) => write!(f, "{}[{}]: {}", self.name, ty, self.rhs),
            None => write!(f, "{}: {}", self.name, self.rhs),
        }
    }
}

/// An `extern` terminal declaration (spec §3 "ExternDecl"): a name whose
/// match semantics are supplied outside the grammar file, only its
/// optional return type recorded here.
#[derive(Debug, Clone)]
pub struct ExternDecl {
    pub name: String,
    pub ty: Option<String>,
}

impl Display for ExternDecl {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "extern {}", self.name)?;
        if let Some(ty) = &self.ty {
            write!(f, "[{ty}]")?;
        }
        Ok(())
    }
}

/// The right-hand side of a rule: an ordered list of alternatives tried in
/// priority order (spec §1 "Prioritized choice").
#[derive(Debug, Clone)]
pub struct Rhs {
    pub alts: Vec<Alt>,
}

impl Rhs {
    pub fn new(alts: Vec<Alt>) -> Self {
        Self { alts }
    }

    pub fn initial_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for alt in &self.alts {
            for n in alt.initial_names() {
                if !names.contains(&n) {
                    names.push(n);
                }
            }
        }
        names
    }
}

impl Display for Rhs {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.alts.iter().map(|a| a.to_string()).collect();
        write!(f, "{}", parts.join(" | "))
    }
}

/// One alternative: a sequence of items, an optional cut position, and an
/// optional action. `cut` replaces pegen's dead `icut` field (never
/// actually set by its own grammar) with a plain index of the `~` item, if
/// any, within `items`.
#[derive(Debug, Clone)]
pub struct Alt {
    pub items: Vec<TopLevelItem>,
    pub cut: Option<usize>,
    pub action: Option<String>,
}

impl Alt {
    pub fn new(items: Vec<TopLevelItem>, action: Option<String>) -> Self {
        let cut = items.iter().position(|item| matches!(item.item, Item::Cut));
        Self { items, cut, action }
    }

    pub fn initial_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for item in &self.items {
            for n in item.initial_names() {
                if !names.contains(&n) {
                    names.push(n);
                }
            }
            if !item.nullable.get() {
                break;
            }
        }
        names
    }
}

impl Display for Alt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.items.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", parts.join(" "))
    }
}

/// An item as it appears directly under an `Alt`: an `Item`, an optional
/// binding name, and an optional per-item type annotation. `nullable` is
/// an Analyzer output (spec §4.4 "Nullability"), mirroring `Rule`'s flags.
#[derive(Debug, Clone)]
pub struct TopLevelItem {
    pub name: Option<String>,
    pub item: Item,
    pub ty: Option<String>,
    pub nullable: Cell<bool>,
}

impl TopLevelItem {
    pub fn new(name: Option<String>, item: Item, ty: Option<String>) -> Self {
        Self { name, item, ty, nullable: Cell::new(false) }
    }

    pub fn initial_names(&self) -> Vec<String> {
        self.item.initial_names()
    }
}

impl Display for TopLevelItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.item)
    }
}

/// The body of a `TopLevelItem`: exactly the node kinds spec §3 lists
/// under "Item" — name/string leaves, a parenthesized group, the three
/// repetition forms, `Opt`, `Forced`, the two lookaheads, and `Cut`.
#[derive(Debug, Clone)]
pub enum Item {
    Name(String),
    String(String),
    Group(Rhs),
    Opt(Box<Item>),
    Repeat0(Box<Item>),
    Repeat1(Box<Item>),
    Gather { separator: Box<Item>, node: Box<Item> },
    Forced(Box<Item>),
    PositiveLookahead(Box<Item>),
    NegativeLookahead(Box<Item>),
    Cut,
}

impl Item {
    pub fn initial_names(&self) -> Vec<String> {
        match self {
            Item::Name(n) => vec![n.clone()],
            Item::String(_) => Vec::new(),
            Item::Group(rhs) => rhs.initial_names(),
            Item::Opt(inner) => inner.initial_names(),
            Item::Repeat0(inner) | Item::Repeat1(inner) => inner.initial_names(),
            Item::Gather { node, .. } => node.initial_names(),
            Item::Forced(_) | Item::PositiveLookahead(_) | Item::NegativeLookahead(_) | Item::Cut => Vec::new(),
        }
    }
}

impl Display for Item {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Item::Name(n) if n == "ENDMARKER" => write!(f, "$"),
            Item::Name(n) => write!(f, "{n}"),
            Item::String(s) => write!(f, "{s}"),
            Item::Group(rhs) => write!(f, "({rhs})"),
            Item::Opt(inner) => {
                let s = inner.to_string();
                if s.contains(' ') {
                    write!(f, "[{s}]")
                } else {
                    write!(f, "{s}?")
                }
            }
            Item::Repeat0(inner) => {
                let s = inner.to_string();
                if s.contains(' ') {
                    write!(f, "({s})*")
                } else {
                    write!(f, "{s}*")
                }
            }
            Item::Repeat1(inner) => {
                let s = inner.to_string();
                if s.contains(' ') {
                    write!(f, "({s})+")
                } else {
                    write!(f, "{s}+")
                }
            }
            Item::Gather { separator, node } => write!(f, "{separator}.{node}+"),
            Item::Forced(inner) => write!(f, "&&{inner}"),
            Item::PositiveLookahead(inner) => write!(f, "&{inner}"),
            Item::NegativeLookahead(inner) => write!(f, "!{inner}"),
            Item::Cut => write!(f, "~"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> TopLevelItem {
        TopLevelItem::new(None, Item::Name(n.to_string()), None)
    }

    #[test]
    fn flatten_unwraps_single_group_alternative() {
        let inner = Rhs::new(vec![Alt::new(vec![name("a"), name("b")], None)]);
        let rhs = Rhs::new(vec![Alt::new(vec![TopLevelItem::new(None, Item::Group(inner.clone()), None)], None)]);
        let rule = Rule::new("r".into(), None, rhs, false);
        assert_eq!(rule.flatten().to_string(), inner.to_string());
    }

    #[test]
    fn loop_rule_is_never_flattened() {
        let inner = Rhs::new(vec![Alt::new(vec![name("a")], None)]);
        let rhs = Rhs::new(vec![Alt::new(vec![TopLevelItem::new(None, Item::Group(inner), None)], None)]);
        let rule = Rule::new("_loop0_1".into(), None, rhs.clone(), false);
        assert_eq!(rule.flatten().to_string(), rhs.to_string());
    }

    #[test]
    fn alt_initial_names_stops_at_first_non_nullable_item() {
        let a = name("a");
        let b = name("b");
        let alt = Alt::new(vec![a, b], None);
        assert_eq!(alt.initial_names(), vec!["a".to_string()]);
    }

    #[test]
    fn endmarker_name_displays_as_dollar() {
        let item = Item::Name("ENDMARKER".into());
        assert_eq!(item.to_string(), "$");
    }

    #[test]
    fn grammar_resolves_well_known_terminal_names() {
        let g = Grammar::new(Vec::new(), Vec::new(), BTreeMap::new());
        assert!(g.resolves("NAME"));
        assert!(!g.resolves("not_a_rule"));
    }
}
