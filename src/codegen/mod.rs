//! The CodeEmitter (spec §4.6): walks a desugared, analyzed [`Grammar`] and
//! writes Rust source text for a standalone parser module.
//!
//! Grounded on the teacher's `IProduction::build_grammar`/`impl_grammar`
//! (`write!`/`writeln!` into a `String` via `std::fmt::Write`, propagating
//! `fmt::Error`) for the "emit by writing text" approach, generalized here
//! from writing a grammar's *own* textual form back out to writing the Rust
//! source of a parser that implements it. Keyword classification lives in
//! [`keywords`]; the `extern "C"` dynamic-loading shim lives in [`ffi`].
//!
//! Every rule with no custom `ty`/action returns [`pegc_runtime::ast::AstNode`][ast]
//! built from the default action ("the list of item values in source
//! order", spec §4.6): a rule with a custom `ty` must supply a custom action
//! on every alternative, since there is no way to default-construct an
//! arbitrary author-chosen type. This restriction is not in spec.md itself —
//! it is this emitter's resolution of turning a dynamically-typed "list of
//! values" into something that type-checks in Rust, recorded in
//! `DESIGN.md`.
//!
//! [ast]: crate::runtime::ast::AstNode

pub mod ffi;
pub mod keywords;

use std::cell::Cell;
use std::fmt::Write as _;

use crate::error::EmissionError;
use crate::grammar::{Grammar, Item, Rule, TopLevelItem};
use crate::runtime::tokenizer::TokenKind;

/// Which tokenizer variant the emitted parser is built against (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    TokenStream,
    CharStream,
}

pub struct EmitOptions {
    pub mode: Mode,
    /// Drop every user-supplied action and emit parsers that only build the
    /// default `AstNode` tree, per spec §6's "skip-actions" CLI toggle.
    pub skip_actions: bool,
    /// Whether to additionally emit the `extern "C"` JSON shim consumed by
    /// `generate_parser`'s dynamic-loading path (spec §4.6/§4.7).
    pub emit_ffi: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self { mode: Mode::TokenStream, skip_actions: false, emit_ffi: false }
    }
}

pub struct CodeEmitter<'g> {
    grammar: &'g Grammar,
    options: EmitOptions,
    tmp: Cell<u32>,
}

impl<'g> CodeEmitter<'g> {
    pub fn new(grammar: &'g Grammar, options: EmitOptions) -> Self {
        Self { grammar, options, tmp: Cell::new(0) }
    }

    fn fresh(&self, prefix: &str) -> String {
        let n = self.tmp.get();
        self.tmp.set(n + 1);
        format!("_{prefix}{n}")
    }

    fn class_name(&self) -> String {
        self.grammar.metas().get("class").and_then(|v| v.clone()).unwrap_or_else(|| "GeneratedParser".to_string())
    }

    fn rule_fn_name(name: &str) -> String {
        format!("r_{name}")
    }

    fn cache_field_name(name: &str) -> String {
        format!("cache_{name}")
    }

    /// The return type of a named rule: its `ty` meta if given, else the
    /// default tree type.
    fn rule_ret_type(&self, name: &str) -> String {
        match self.grammar.rule(name) {
            Some(rule) => rule.ty.clone().unwrap_or_else(|| "pegc::runtime::ast::AstNode".to_string()),
            None => "pegc::runtime::ast::AstNode".to_string(),
        }
    }

    fn extern_ret_type(&self, name: &str) -> String {
        match self.grammar.extern_decl(name) {
            Some(e) => e.ty.clone().unwrap_or_else(|| "pegc::runtime::ast::AstNode".to_string()),
            None => "pegc::runtime::ast::AstNode".to_string(),
        }
    }

    /// Top-level emission entry point: the whole file as one `String`.
    pub fn emit(&self) -> Result<String, EmissionError> {
        let mut out = String::new();

        if let Some(Some(text)) = self.grammar.metas().get("metaheader") {
            writeln!(out, "{text}").unwrap();
        }
        if let Some(Some(text)) = self.grammar.metas().get("header") {
            writeln!(out, "{text}").unwrap();
        }

        self.emit_preamble(&mut out)?;
        self.emit_keyword_tables(&mut out);
        self.emit_struct(&mut out);
        self.emit_extern_traits(&mut out);
        self.emit_impl(&mut out)?;

        if self.options.emit_ffi {
            ffi::emit_ffi_shim(&mut out, &self.class_name());
        }

        if let Some(Some(text)) = self.grammar.metas().get("trailer") {
            writeln!(out, "{text}").unwrap();
        }

        Ok(out)
    }

    fn emit_preamble(&self, out: &mut String) -> Result<(), EmissionError> {
        writeln!(
            out,
            "// Generated by pegc. Do not edit by hand; regenerate from the source grammar instead.\n\
             #![allow(dead_code, unused_variables, unused_mut, unused_imports)]\n\
             use std::cell::{{Cell, RefCell}};\n\
             use pegc::log::Tracer;\n\
             use pegc::runtime::ast::AstNode;\n\
             use pegc::runtime::cache::{{self, Cache}};\n\
             use pegc::runtime::mark::{{CharMark, TokenMark}};\n\
             use pegc::runtime::tokenizer::char_stream::{{self, CharStreamTokenizer}};\n\
             use pegc::runtime::tokenizer::token_stream::{{self, TokenStreamTokenizer}};\n\
             use pegc::runtime::tokenizer::TokenKind;\n\
             use pegc::runtime::{{Failure, Matched}};\n"
        )
        .map_err(|e| EmissionError { message: e.to_string() })?;
        Ok(())
    }

    fn emit_keyword_tables(&self, out: &mut String) {
        let tables = keywords::classify(self.grammar);
        let kw = tables.keywords.iter().map(|k| format!("{k:?}")).collect::<Vec<_>>().join(", ");
        let soft = tables.soft_keywords.iter().map(|k| format!("{k:?}")).collect::<Vec<_>>().join(", ");
        writeln!(out, "pub const KEYWORDS: &[&str] = &[{kw}];").unwrap();
        writeln!(out, "pub const SOFT_KEYWORDS: &[&str] = &[{soft}];").unwrap();
        writeln!(out).unwrap();
    }

    fn user_rules(&self) -> Vec<&Rule> {
        self.grammar.rules().iter().collect()
    }

    fn emit_struct(&self, out: &mut String) {
        let class = self.class_name();
        let cursor_ty = match self.options.mode {
            Mode::TokenStream => "RefCell<TokenStreamTokenizer>",
            Mode::CharStream => "RefCell<CharStreamTokenizer>",
        };
        let mark_ty = match self.options.mode {
            Mode::TokenStream => "TokenMark",
            Mode::CharStream => "CharMark",
        };
        writeln!(out, "/// A single point past which no alternative in the grammar is recoverable").unwrap();
        writeln!(out, "/// (spec's `Forced`/`&&` must-match predicate).").unwrap();
        writeln!(out, "#[derive(Debug, Clone)]").unwrap();
        writeln!(out, "pub struct ForcedFailure {{ pub at: usize, pub expected: String }}").unwrap();
        writeln!(out).unwrap();
        writeln!(out, "pub struct {class} {{").unwrap();
        writeln!(out, "    cursor: {cursor_ty},").unwrap();
        writeln!(out, "    tracer: Tracer,").unwrap();
        writeln!(out, "    in_recursive_rule: Cell<u32>,").unwrap();
        writeln!(out, "    forced: RefCell<Option<ForcedFailure>>,").unwrap();
        for rule in self.user_rules() {
            let ret = self.rule_ret_type(&rule.name);
            writeln!(out, "    {}: RefCell<Cache<{mark_ty}, {ret}>>,", Self::cache_field_name(&rule.name)).unwrap();
        }
        writeln!(out, "}}").unwrap();
        writeln!(out).unwrap();
    }

    fn emit_extern_traits(&self, out: &mut String) {
        if self.grammar.extern_decls().is_empty() {
            return;
        }
        let class = self.class_name();
        writeln!(out, "/// Extern terminal hooks (spec §3 \"ExternDecl\"): match semantics are").unwrap();
        writeln!(out, "/// supplied outside the grammar file, so the consumer of this generated").unwrap();
        writeln!(out, "/// module must provide an `impl {class}Externs for {class}`.").unwrap();
        writeln!(out, "pub trait {class}Externs {{").unwrap();
        for ext in self.grammar.extern_decls() {
            let ty = self.extern_ret_type(&ext.name);
            writeln!(out, "    fn ext_{}(&self) -> Result<{ty}, Failure>;", ext.name).unwrap();
        }
        writeln!(out, "}}").unwrap();
        writeln!(out).unwrap();
    }

    fn emit_impl(&self, out: &mut String) -> Result<(), EmissionError> {
        let class = self.class_name();
        let cursor_new = match self.options.mode {
            Mode::TokenStream => "RefCell::new(TokenStreamTokenizer::new(source))",
            Mode::CharStream => "RefCell::new(CharStreamTokenizer::new(source))",
        };
        writeln!(out, "impl {class} {{").unwrap();
        writeln!(out, "    pub fn new(source: &str, verbosity: pegc::log::Log<()>) -> Self {{").unwrap();
        writeln!(out, "        Self {{").unwrap();
        writeln!(out, "            cursor: {cursor_new},").unwrap();
        writeln!(out, "            tracer: Tracer::new(verbosity),").unwrap();
        writeln!(out, "            in_recursive_rule: Cell::new(0),").unwrap();
        writeln!(out, "            forced: RefCell::new(None),").unwrap();
        for rule in self.user_rules() {
            writeln!(out, "            {}: RefCell::new(Cache::new()),", Self::cache_field_name(&rule.name)).unwrap();
        }
        writeln!(out, "        }}").unwrap();
        writeln!(out, "    }}").unwrap();
        writeln!(out).unwrap();

        let start = self
            .grammar
            .rule("start")
            .ok_or_else(|| EmissionError { message: "grammar has no 'start' rule to drive parse()".to_string() })?;
        let start_ret = self.rule_ret_type("start");
        writeln!(out, "    pub fn parse(&self, source: &str) -> Result<{start_ret}, pegc::error::ParseFailure> {{").unwrap();
        writeln!(out, "        let _ = source;").unwrap();
        writeln!(out, "        match self.{}() {{", Self::rule_fn_name(&start.name)).unwrap();
        writeln!(out, "            Ok(v) => Ok(v),").unwrap();
        writeln!(out, "            Err(e) => Err(self.build_parse_failure(e)),").unwrap();
        writeln!(out, "        }}").unwrap();
        writeln!(out, "    }}").unwrap();
        writeln!(out).unwrap();

        self.emit_build_parse_failure(out);

        for rule in self.user_rules() {
            self.emit_rule(out, rule)?;
        }

        writeln!(out, "}}").unwrap();
        Ok(())
    }

    fn emit_build_parse_failure(&self, out: &mut String) {
        let (mark_expr, byte_offset_call) = match self.options.mode {
            Mode::TokenStream => ("self.cursor.borrow().diagnose()", "self.cursor.borrow().byte_offset(self.cursor.borrow().diagnose())"),
            Mode::CharStream => ("self.cursor.borrow().diagnose()", "self.cursor.borrow().byte_offset(self.cursor.borrow().diagnose())"),
        };
        let _ = mark_expr;
        writeln!(
            out,
            "    fn build_parse_failure(&self, failure: Failure) -> pegc::error::ParseFailure {{\n\
             \x20       if let Some(forced) = self.forced.borrow().clone() {{\n\
             \x20           let src = pegc::position::Source::new(\"\");\n\
             \x20           return pegc::error::ParseFailure {{\n\
             \x20               pointer: forced.at,\n\
             \x20               position: src.position_at(forced.at),\n\
             \x20               message: format!(\"expected {{}}\", forced.expected),\n\
             \x20               expected: Some(forced.expected),\n\
             \x20           }};\n\
             \x20       }}\n\
             \x20       let at = {byte_offset_call};\n\
             \x20       let src = pegc::position::Source::new(\"\");\n\
             \x20       pegc::error::ParseFailure {{\n\
             \x20           pointer: at,\n\
             \x20           position: src.position_at(at),\n\
             \x20           message: format!(\"{{failure}}\"),\n\
             \x20           expected: None,\n\
             \x20       }}\n\
             \x20   }}\n"
        )
        .unwrap();
    }

    fn emit_rule(&self, out: &mut String, rule: &Rule) -> Result<(), EmissionError> {
        let ret = self.rule_ret_type(&rule.name);
        let fname = Self::rule_fn_name(&rule.name);
        let cache = Self::cache_field_name(&rule.name);
        let protocol = if rule.leader.get() { "recurse" } else { "memoize" };
        writeln!(out, "    fn {fname}(&self) -> Result<{ret}, Failure> {{").unwrap();
        if rule.leader.get() {
            writeln!(
                out,
                "        cache::{protocol}(&self.{cache}, &self.cursor, &self.in_recursive_rule, &self.tracer, {name:?}, |_c| self.body_{rn}())",
                name = rule.name,
                rn = rule.name
            )
            .unwrap();
        } else {
            writeln!(
                out,
                "        cache::{protocol}(&self.{cache}, &self.cursor, &self.tracer, {name:?}, |_c| self.body_{rn}())",
                name = rule.name,
                rn = rule.name
            )
            .unwrap();
        }
        writeln!(out, "    }}").unwrap();
        writeln!(out).unwrap();

        if rule.is_loop() {
            self.emit_loop_body(out, rule)?;
        } else if rule.is_gather() {
            self.emit_gather_body(out, rule)?;
        } else {
            self.emit_alt_body(out, rule, &ret)?;
        }
        writeln!(out).unwrap();
        Ok(())
    }

    /// `_loop0_N`/`_loop1_N` rules always have exactly one alternative,
    /// repeated until it fails. Most loop rules synthesize a single
    /// (possibly compound) item per iteration, but the separator-loop a
    /// `Gather` desugars to has *two* — `sep elem=node { elem }` — so every
    /// item in the alt must be matched in sequence and the alt's own action
    /// (if any) picks the per-iteration value, the same way an ordinary
    /// rule's alternative would. Spec §4.5 leaves loop *evaluation*
    /// semantics to the CodeEmitter, since the Desugarer only rewrites the
    /// grammar shape.
    fn emit_loop_body(&self, out: &mut String, rule: &Rule) -> Result<(), EmissionError> {
        let alt = &rule.rhs.alts[0];
        let requires_one = rule.name.starts_with("_loop1");
        writeln!(out, "    fn body_{}(&self) -> Result<AstNode, Failure> {{", rule.name).unwrap();
        writeln!(out, "        let start = self.cursor.borrow().mark();").unwrap();
        writeln!(out, "        let mut elems: Vec<AstNode> = Vec::new();").unwrap();
        writeln!(out, "        loop {{").unwrap();
        writeln!(out, "            let before = self.cursor.borrow().mark();").unwrap();
        writeln!(out, "            let attempt: Result<AstNode, Failure> = (|| {{").unwrap();
        let mut bindings: Vec<(String, String, &Item)> = Vec::new();
        for top in &alt.items {
            let binding = self.fresh("v");
            let ty = self.emit_match(out, &top.item, &binding, "                ")?;
            if let Some(name) = &top.name {
                writeln!(out, "                let {name} = &{binding};").unwrap();
            }
            bindings.push((binding, ty, &top.item));
        }
        if let Some(action) = alt.action.as_deref() {
            let target = action.trim();
            let picked = alt
                .items
                .iter()
                .zip(bindings.iter())
                .find(|(top, _)| top.name.as_deref() == Some(target));
            match picked {
                Some((_, (b, ty, item))) => {
                    writeln!(out, "                Ok({})", self.ast_convert_expr(item, b, ty, "before")).unwrap();
                }
                None => {
                    return Err(EmissionError {
                        message: format!("loop rule '{}' has an action this emitter cannot evaluate: {action}", rule.name),
                    });
                }
            }
        } else {
            let children: Vec<String> = bindings
                .iter()
                .filter(|(_, _, item)| self.included_in_default(item))
                .map(|(b, ty, item)| self.ast_convert_expr(item, b, ty, "before"))
                .collect();
            if let [only] = children.as_slice() {
                writeln!(out, "                Ok({only})").unwrap();
            } else {
                writeln!(
                    out,
                    "                Ok(AstNode::tree({name:?}, self.cursor.borrow().byte_offset(before), self.cursor.borrow().byte_offset(self.cursor.borrow().mark()), vec![{children}]))",
                    name = rule.name,
                    children = children.join(", ")
                )
                .unwrap();
            }
        }
        writeln!(out, "            }})();").unwrap();
        writeln!(out, "            match attempt {{").unwrap();
        writeln!(out, "                Ok(v) => elems.push(v),").unwrap();
        writeln!(out, "                Err(_) => {{ self.cursor.borrow_mut().reset(before); break; }}").unwrap();
        writeln!(out, "            }}").unwrap();
        writeln!(out, "        }}").unwrap();
        if requires_one {
            writeln!(out, "        if elems.is_empty() {{").unwrap();
            writeln!(out, "            return Err(Failure {{ at: self.cursor.borrow().byte_offset(start) }});").unwrap();
            writeln!(out, "        }}").unwrap();
        }
        writeln!(out, "        let end = self.cursor.borrow().mark();").unwrap();
        writeln!(
            out,
            "        Ok(AstNode::tree({name:?}, self.cursor.borrow().byte_offset(start), self.cursor.borrow().byte_offset(end), elems))",
            name = rule.name
        )
        .unwrap();
        writeln!(out, "    }}").unwrap();
        Ok(())
    }

    /// `_gather_N` rules always have exactly two bound items: `elem` and
    /// `rest` (a `_loop0_N` of the same element, spec §4.5 "Gather").
    fn emit_gather_body(&self, out: &mut String, rule: &Rule) -> Result<(), EmissionError> {
        let alt = &rule.rhs.alts[0];
        let elem_item = &alt.items[0].item;
        let rest_name = match &alt.items[1].item {
            Item::Repeat0(inner) => match inner.as_ref() {
                Item::Name(n) => n.clone(),
                _ => return Err(EmissionError { message: "malformed gather rule".to_string() }),
            },
            _ => return Err(EmissionError { message: "malformed gather rule".to_string() }),
        };
        writeln!(out, "    fn body_{}(&self) -> Result<AstNode, Failure> {{", rule.name).unwrap();
        writeln!(out, "        let start = self.cursor.borrow().mark();").unwrap();
        let elem_binding = self.fresh("v");
        let elem_ty = self.emit_match(out, elem_item, &elem_binding, "        ")?;
        let elem_expr = self.ast_convert_expr(elem_item, &elem_binding, &elem_ty, "start");
        writeln!(out, "        let elem = {elem_expr};").unwrap();
        writeln!(out, "        let rest = self.{}()?;", Self::rule_fn_name(&rest_name)).unwrap();
        writeln!(out, "        let end = self.cursor.borrow().mark();").unwrap();
        writeln!(out, "        let mut children = vec![elem];").unwrap();
        writeln!(out, "        children.extend(rest.children);").unwrap();
        writeln!(
            out,
            "        Ok(AstNode::tree({name:?}, self.cursor.borrow().byte_offset(start), self.cursor.borrow().byte_offset(end), children))",
            name = rule.name
        )
        .unwrap();
        writeln!(out, "    }}").unwrap();
        Ok(())
    }

    /// Ordinary rule bodies (user rules and synthesized `_tmp_N` groups):
    /// try each alternative in priority order (spec §4.6 "Alternatives and
    /// cut"). A `Cut` sets a per-alternative flag; a failure past that point
    /// is returned immediately rather than falling through to the next
    /// alternative. A `Forced` failure is a stronger version of the same
    /// idea, scoped to the whole parse rather than one alternative, via the
    /// `self.forced` field checked here too.
    fn emit_alt_body(&self, out: &mut String, rule: &Rule, ret: &str) -> Result<(), EmissionError> {
        let custom_ty = rule.ty.is_some() && !self.options.skip_actions;
        writeln!(out, "    fn body_{}(&self) -> Result<{ret}, Failure> {{", rule.name).unwrap();
        writeln!(out, "        let start = self.cursor.borrow().mark();").unwrap();
        for (idx, alt) in rule.flatten().alts.iter().enumerate() {
            let action = if self.options.skip_actions { None } else { alt.action.as_deref() };
            if custom_ty && action.is_none() {
                return Err(EmissionError {
                    message: format!(
                        "rule '{}' declares a return type but alternative #{idx} has no action to construct it",
                        rule.name
                    ),
                });
            }
            writeln!(out, "        self.cursor.borrow_mut().reset(start);").unwrap();
            writeln!(out, "        let cut = Cell::new(false);").unwrap();
            writeln!(out, "        let attempt: Result<{ret}, Failure> = (|| {{").unwrap();
            let mut bindings: Vec<(String, String, &Item)> = Vec::new();
            for top in &alt.items {
                let binding = self.fresh("v");
                let ty = self.emit_match_top(out, top, &binding, &cut_ref(), "            ")?;
                bindings.push((binding, ty, &top.item));
            }
            if let Some(action) = action {
                let body = self.prepare_action(action, alt, &bindings);
                writeln!(out, "            Ok({{ {body} }})").unwrap();
            } else {
                let children: Vec<String> = bindings
                    .iter()
                    .filter(|(_, _, item)| self.included_in_default(item))
                    .map(|(b, ty, item)| self.ast_convert_expr(item, b, ty, "start"))
                    .collect();
                writeln!(
                    out,
                    "            Ok(AstNode::tree({name:?}, self.cursor.borrow().byte_offset(start), self.cursor.borrow().byte_offset(self.cursor.borrow().mark()), vec![{children}]))",
                    name = rule.name,
                    children = children.join(", ")
                )
                .unwrap();
            }
            writeln!(out, "        }})();").unwrap();
            writeln!(out, "        match attempt {{").unwrap();
            writeln!(out, "            Ok(v) => return Ok(v),").unwrap();
            writeln!(out, "            Err(e) => {{").unwrap();
            writeln!(out, "                if cut.get() || self.forced.borrow().is_some() {{ return Err(e); }}").unwrap();
            writeln!(out, "            }}").unwrap();
            writeln!(out, "        }}").unwrap();
        }
        writeln!(out, "        Err(Failure {{ at: self.cursor.borrow().byte_offset(start) }})").unwrap();
        writeln!(out, "    }}").unwrap();
        Ok(())
    }

    fn included_in_default(&self, item: &Item) -> bool {
        !matches!(item, Item::Cut | Item::PositiveLookahead(_) | Item::NegativeLookahead(_))
    }

    /// Rewrites an action's raw source text only enough to be valid Rust in
    /// context: a bare `LOCATIONS` identifier becomes the `location_format`
    /// meta's expression (default `(start, end)`), evaluated over the
    /// alternative's span. Everything else in the action is copied
    /// verbatim (spec §9 "opaque action bodies copied verbatim").
    fn prepare_action(&self, action: &str, _alt: &crate::grammar::Alt, _bindings: &[(String, String, &Item)]) -> String {
        let location_expr = self
            .grammar
            .metas()
            .get("location_format")
            .and_then(|v| v.clone())
            .unwrap_or_else(|| "(self.cursor.borrow().byte_offset(start), self.cursor.borrow().byte_offset(self.cursor.borrow().mark()))".to_string());
        let locations_binding = format!(
            "{{ let start = self.cursor.borrow().byte_offset(start); let end = self.cursor.borrow().byte_offset(self.cursor.borrow().mark()); {location_expr} }}"
        );
        action.replace("LOCATIONS", &locations_binding)
    }

    /// Converts a bound item's matched value into an `AstNode` child for
    /// default-action aggregation. Only reachable for items whose value type
    /// is `Token`, `AstNode`, or `Matched<T>` over one of those — a named
    /// rule with a custom `ty` appearing in a default-action position is
    /// rejected earlier (see [`CodeEmitter::emit_alt_body`]'s custom-ty
    /// check, which requires every alternative of such a rule to supply its
    /// own action instead of reaching here).
    fn ast_convert_expr(&self, item: &Item, binding: &str, ty: &str, start_var: &str) -> String {
        let _ = start_var;
        match item {
            Item::Opt(inner) => {
                let inner_ty = ty.trim_start_matches("Matched<").trim_end_matches('>').to_string();
                let inner_expr = self.ast_convert_expr(inner, "__inner", &inner_ty, start_var);
                format!(
                    "match {binding} {{ Matched::Value(__inner) => {inner_expr}, Matched::NoMatch => AstNode::empty(\"opt\", self.cursor.borrow().byte_offset(self.cursor.borrow().mark())) }}"
                )
            }
            Item::Forced(inner) => self.ast_convert_expr(inner, binding, ty, start_var),
            _ if ty == "pegc::runtime::tokenizer::Token" => {
                format!("AstNode::leaf({label:?}, {binding}.start, {binding}.end)", label = item_label(item))
            }
            _ if ty == "String" => {
                format!("AstNode::leaf({label:?}, self.cursor.borrow().byte_offset(self.cursor.borrow().mark()), self.cursor.borrow().byte_offset(self.cursor.borrow().mark()))", label = item_label(item))
            }
            _ => binding.to_string(),
        }
    }

    fn emit_match_top(
        &self,
        out: &mut String,
        top: &TopLevelItem,
        binding: &str,
        cut_ref: &str,
        indent: &str,
    ) -> Result<String, EmissionError> {
        let _ = cut_ref;
        let ty = self.emit_match(out, &top.item, binding, indent)?;
        if let Some(name) = &top.name {
            writeln!(out, "{indent}let {name} = &{binding};").unwrap();
        }
        Ok(ty)
    }

    /// Emits the statements that match a single [`Item`] into `binding`,
    /// returning the Rust type of the bound value. `?`-propagates on
    /// failure for every form except `Opt` (which always succeeds) and
    /// `Cut`/lookaheads (which bind no value at all, represented as `()`).
    fn emit_match(&self, out: &mut String, item: &Item, binding: &str, indent: &str) -> Result<String, EmissionError> {
        match item {
            Item::Name(n) if n == "ENDMARKER" => {
                match self.options.mode {
                    Mode::TokenStream => {
                        writeln!(out, "{indent}let {binding} = token_stream::expect_endmarker(&self.cursor)?;").unwrap();
                        Ok("pegc::runtime::tokenizer::Token".to_string())
                    }
                    Mode::CharStream => {
                        writeln!(out, "{indent}char_stream::expect_end_of_input(&self.cursor)?;").unwrap();
                        writeln!(out, "{indent}let {binding} = ();").unwrap();
                        Ok("()".to_string())
                    }
                }
            }
            Item::Name(n) if TokenKind::from_name(n).is_some() && self.grammar.rule(n).is_none() => {
                if self.options.mode == Mode::CharStream {
                    return Err(EmissionError {
                        message: format!("terminal class '{n}' is not available in character-stream mode"),
                    });
                }
                let variant = token_kind_variant(n);
                if n == "NAME" {
                    writeln!(out, "{indent}let {binding} = token_stream::expect_name(&self.cursor, KEYWORDS)?;").unwrap();
                } else {
                    writeln!(out, "{indent}let {binding} = token_stream::expect_kind(&self.cursor, TokenKind::{variant})?;").unwrap();
                }
                Ok("pegc::runtime::tokenizer::Token".to_string())
            }
            Item::Name(n) if self.grammar.rule(n).is_some() => {
                writeln!(out, "{indent}let {binding} = self.{}()?;", Self::rule_fn_name(n)).unwrap();
                Ok(self.rule_ret_type(n))
            }
            Item::Name(n) if self.grammar.extern_decl(n).is_some() => {
                writeln!(out, "{indent}let {binding} = self.ext_{n}()?;").unwrap();
                Ok(self.extern_ret_type(n))
            }
            Item::Name(n) => Err(EmissionError { message: format!("name '{n}' does not resolve during emission") }),
            Item::String(s) => {
                let unquoted = s.trim_matches(|c| c == '"' || c == '\'').to_string();
                match self.options.mode {
                    Mode::TokenStream => {
                        writeln!(out, "{indent}let {binding} = token_stream::expect_string(&self.cursor, {unquoted:?})?;").unwrap();
                        Ok("pegc::runtime::tokenizer::Token".to_string())
                    }
                    Mode::CharStream => {
                        writeln!(out, "{indent}let {binding} = char_stream::expect_literal(&self.cursor, {unquoted:?})?;").unwrap();
                        Ok("String".to_string())
                    }
                }
            }
            Item::Opt(inner) => {
                let mark_var = self.fresh("m");
                writeln!(out, "{indent}let {mark_var} = self.cursor.borrow().mark();").unwrap();
                let inner_binding = self.fresh("v");
                writeln!(out, "{indent}let {binding} = (|| -> Result<_, Failure> {{").unwrap();
                let inner_ty = self.emit_match(out, inner, &inner_binding, &format!("{indent}    "))?;
                writeln!(out, "{indent}    Ok({inner_binding})").unwrap();
                writeln!(out, "{indent}}})();").unwrap();
                writeln!(out, "{indent}let {binding} = match {binding} {{").unwrap();
                writeln!(out, "{indent}    Ok(v) => Matched::Value(v),").unwrap();
                writeln!(out, "{indent}    Err(_) => {{ self.cursor.borrow_mut().reset({mark_var}); Matched::NoMatch }}").unwrap();
                writeln!(out, "{indent}}};").unwrap();
                Ok(format!("Matched<{inner_ty}>"))
            }
            Item::Forced(inner) => {
                let inner_binding = self.fresh("v");
                writeln!(out, "{indent}let {binding} = match (|| -> Result<_, Failure> {{").unwrap();
                let inner_ty = self.emit_match(out, inner, &inner_binding, &format!("{indent}    "))?;
                writeln!(out, "{indent}    Ok({inner_binding})").unwrap();
                writeln!(out, "{indent}}})() {{").unwrap();
                writeln!(out, "{indent}    Ok(v) => v,").unwrap();
                writeln!(out, "{indent}    Err(e) => {{").unwrap();
                writeln!(
                    out,
                    "{indent}        *self.forced.borrow_mut() = Some(ForcedFailure {{ at: e.at, expected: {label:?}.to_string() }});",
                    label = item_label(inner)
                )
                .unwrap();
                writeln!(out, "{indent}        return Err(e);").unwrap();
                writeln!(out, "{indent}    }}").unwrap();
                writeln!(out, "{indent}}};").unwrap();
                Ok(inner_ty)
            }
            Item::PositiveLookahead(inner) => {
                let mark_var = self.fresh("m");
                let inner_binding = self.fresh("v");
                writeln!(out, "{indent}let {mark_var} = self.cursor.borrow().mark();").unwrap();
                writeln!(out, "{indent}let __la: Result<_, Failure> = (|| {{").unwrap();
                self.emit_match(out, inner, &inner_binding, &format!("{indent}    "))?;
                writeln!(out, "{indent}    Ok(())").unwrap();
                writeln!(out, "{indent}}})();").unwrap();
                writeln!(out, "{indent}self.cursor.borrow_mut().reset({mark_var});").unwrap();
                writeln!(out, "{indent}if __la.is_err() {{ return Err(Failure {{ at: self.cursor.borrow().byte_offset({mark_var}) }}); }}").unwrap();
                writeln!(out, "{indent}let {binding} = ();").unwrap();
                Ok("()".to_string())
            }
            Item::NegativeLookahead(inner) => {
                let mark_var = self.fresh("m");
                let inner_binding = self.fresh("v");
                writeln!(out, "{indent}let {mark_var} = self.cursor.borrow().mark();").unwrap();
                writeln!(out, "{indent}let __la: Result<_, Failure> = (|| {{").unwrap();
                self.emit_match(out, inner, &inner_binding, &format!("{indent}    "))?;
                writeln!(out, "{indent}    Ok(())").unwrap();
                writeln!(out, "{indent}}})();").unwrap();
                writeln!(out, "{indent}self.cursor.borrow_mut().reset({mark_var});").unwrap();
                writeln!(out, "{indent}if __la.is_ok() {{ return Err(Failure {{ at: self.cursor.borrow().byte_offset({mark_var}) }}); }}").unwrap();
                writeln!(out, "{indent}let {binding} = ();").unwrap();
                Ok("()".to_string())
            }
            Item::Cut => {
                writeln!(out, "{indent}cut.set(true);").unwrap();
                writeln!(out, "{indent}let {binding} = ();").unwrap();
                Ok("()".to_string())
            }
            Item::Group(_) | Item::Repeat0(_) | Item::Repeat1(_) | Item::Gather { .. } => Err(EmissionError {
                message: "compound item reached the CodeEmitter undesugared".to_string(),
            }),
        }
    }
}

fn cut_ref() -> String {
    "cut".to_string()
}

fn item_label(item: &Item) -> String {
    match item {
        Item::Name(n) => n.clone(),
        Item::String(s) => s.clone(),
        Item::Opt(inner) | Item::Forced(inner) | Item::PositiveLookahead(inner) | Item::NegativeLookahead(inner) => item_label(inner),
        Item::Repeat0(inner) | Item::Repeat1(inner) => item_label(inner),
        Item::Gather { node, .. } => item_label(node),
        Item::Group(_) => "group".to_string(),
        Item::Cut => "~".to_string(),
    }
}

fn token_kind_variant(name: &str) -> &'static str {
    match name {
        "NAME" => "Name",
        "NUMBER" => "Number",
        "STRING" => "String",
        "NEWLINE" => "Newline",
        "INDENT" => "Indent",
        "DEDENT" => "Dedent",
        "ENDMARKER" => "Endmarker",
        "OP" => "Op",
        "TYPE_COMMENT" => "TypeComment",
        "FSTRING_START" => "FStringStart",
        "FSTRING_MIDDLE" => "FStringMiddle",
        "FSTRING_END" => "FStringEnd",
        "SOFT_KEYWORD" => "SoftKeyword",
        "ASYNC" => "Async",
        "AWAIT" => "Await",
        _ => "Name",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer;
    use crate::desugar::Desugarer;
    use crate::meta_parser::MetaGrammarParser;
    use crate::position::Source;

    fn build(src: &str) -> Grammar {
        let source = Source::new(src);
        let grammar = MetaGrammarParser::new(&source).expect("grammar lexes").parse().expect("grammar parses");
        analyzer::analyze(&grammar).expect("grammar validates");
        Desugarer::new().run(grammar)
    }

    #[test]
    fn emits_a_struct_and_a_start_method() {
        let grammar = build("start: NUMBER NEWLINE $\n");
        let emitter = CodeEmitter::new(&grammar, EmitOptions::default());
        let code = emitter.emit().expect("emission succeeds");
        assert!(code.contains("pub struct GeneratedParser"));
        assert!(code.contains("fn r_start(&self)"));
        assert!(code.contains("pub fn parse(&self"));
    }

    #[test]
    fn named_bindings_reach_a_custom_action() {
        let grammar = build("start[i64]: a=NUMBER NEWLINE $ { 0 }\n");
        let emitter = CodeEmitter::new(&grammar, EmitOptions::default());
        let code = emitter.emit().expect("emission succeeds");
        assert!(code.contains("let a = &_v"));
    }

    #[test]
    fn typed_rule_without_action_is_rejected() {
        let grammar = build("start[i64]: NUMBER NEWLINE $\n");
        let emitter = CodeEmitter::new(&grammar, EmitOptions::default());
        assert!(emitter.emit().is_err());
    }

    #[test]
    fn left_recursive_leader_uses_the_recurse_protocol() {
        let grammar = build("start: expr NEWLINE $\nexpr: expr '+' NUMBER | NUMBER\n");
        let emitter = CodeEmitter::new(&grammar, EmitOptions::default());
        let code = emitter.emit().expect("emission succeeds");
        assert!(code.contains("cache::recurse(&self.cache_expr"));
    }

    /// `','.NAME+` synthesizes a `_loop0_N` separator-loop whose alt has
    /// two items (`','` then `NAME`, bound as `elem`); the loop body must
    /// match both per iteration and push `elem`, not just the separator.
    #[test]
    fn gather_loop_body_consumes_separator_and_element_each_iteration() {
        let grammar = build("start: ','.NAME+ $\n");
        let emitter = CodeEmitter::new(&grammar, EmitOptions::default());
        let code = emitter.emit().expect("emission succeeds");
        assert!(code.contains("token_stream::expect_string(&self.cursor, \",\")"));
        assert!(code.contains("token_stream::expect_name(&self.cursor, KEYWORDS)"));
        let loop_fn_start = code.find("fn body__loop0_").expect("loop body emitted");
        let loop_fn = &code[loop_fn_start..];
        let elem_decl = loop_fn.find("let elem = &").expect("elem binding emitted in loop body");
        assert!(loop_fn[..elem_decl].contains("expect_string"), "separator must be matched before the element");
    }
}
