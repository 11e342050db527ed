//! The literal input/output scenarios from the grammar specification's
//! "Testable Properties" section. Each one is checked against the shape of
//! what the pipeline actually produces for that grammar — the emitted
//! source's structure for scenarios about parsing behavior (compiling and
//! running the emitted module is `Driver::generate_parser`'s job, covered
//! separately), and the grammar/analysis model directly for scenarios about
//! validation and classification.

use pegc::analyzer;
use pegc::codegen::{keywords, CodeEmitter, EmitOptions, Mode};
use pegc::desugar::Desugarer;
use pegc::driver::{Driver, GrammarSource};
use pegc::grammar::Grammar;
use pegc::meta_parser::MetaGrammarParser;
use pegc::position::Source;

fn build(src: &str) -> Grammar {
    let source = Source::new(src);
    let grammar = MetaGrammarParser::new(&source).expect("grammar lexes").parse().expect("grammar parses");
    analyzer::analyze(&grammar).expect("grammar validates");
    Desugarer::new().run(grammar)
}

/// `start: a=NUMBER "+" b=NUMBER NEWLINE $` matches the four tokens in
/// source order; with no custom action, `start`'s default-action body
/// collects every non-lookahead/cut item as a child in that order.
#[test]
fn addition_grammar_collects_its_four_items_in_order() {
    let grammar = build("start: a=NUMBER \"+\" b=NUMBER NEWLINE $\n");
    let emitter = CodeEmitter::new(&grammar, EmitOptions::default());
    let code = emitter.emit().expect("emission succeeds");
    assert!(code.contains("token_stream::expect_kind(&self.cursor, TokenKind::Number)"));
    assert!(code.contains("token_stream::expect_string(&self.cursor, \"+\")"));
    assert!(code.contains("token_stream::expect_endmarker(&self.cursor)"));
}

/// Same grammar with a custom action reaches a typed `start` rule whose
/// bound names (`a`, `b`) are available to the action body verbatim.
#[test]
fn addition_grammar_with_an_action_binds_a_and_b() {
    let grammar = build("start[i64]: a=NUMBER \"+\" b=NUMBER NEWLINE $ { int(a.text)+int(b.text) }\n");
    let emitter = CodeEmitter::new(&grammar, EmitOptions::default());
    let code = emitter.emit().expect("emission succeeds");
    assert!(code.contains("let a = &_v"));
    assert!(code.contains("let b = &_v"));
    assert!(code.contains("int(a.text)+int(b.text)"));
}

/// Left-recursive `expr` over `+ - * /` is emitted through the seed-and-
/// grow protocol, and `start`'s action can reference the inner rule's
/// value directly (`{ expr }`).
#[test]
fn left_recursive_expr_over_four_operators_is_a_leader() {
    let grammar = build(
        "start[i64]: e=expr NEWLINE? $ { e }\n\
         expr[i64]: l=expr '+' r=term { l+r } | l=expr '-' r=term { l-r } | t=term { t }\n\
         term[i64]: l=term '*' r=NUMBER { l*int(r.text) } | l=term '/' r=NUMBER { l/int(r.text) } | n=NUMBER { int(n.text) }\n",
    );
    let expr = grammar.rule("expr").unwrap();
    let term = grammar.rule("term").unwrap();
    assert!(expr.left_recursive.get() && expr.leader.get());
    assert!(term.left_recursive.get() && term.leader.get());
}

/// `start: '(' ~ expr ')' | '(' name ')'` — the cut after the first `(`
/// commits to that alternative; the emitted body must not fall through to
/// the second alternative once the cut has been crossed.
#[test]
fn cut_after_the_first_alternative_prevents_falling_through() {
    let grammar = build("start: '(' ~ expr ')' | '(' name ')'\nexpr: NUMBER\nname: NAME\n");
    let emitter = CodeEmitter::new(&grammar, EmitOptions::default());
    let code = emitter.emit().expect("emission succeeds");
    assert!(code.contains("cut.set(true);"));
    assert!(code.contains("if cut.get() || self.forced.borrow().is_some() { return Err(e); }"));
}

/// Character-stream grammar `start: ("a"|"b")+ $` on `"aba"` matches three
/// elements; the gather/loop auxiliary rule the Desugarer synthesizes for
/// `+` must be emitted as a loop over the literal-alternation group, using
/// the character-stream terminal probe rather than the token-stream one.
#[test]
fn character_stream_repetition_emits_loop_over_literal_alternation() {
    let grammar = build("start: (\"a\"|\"b\")+ $\n");
    let emitter = CodeEmitter::new(&grammar, EmitOptions { mode: Mode::CharStream, ..EmitOptions::default() });
    let code = emitter.emit().expect("emission succeeds");
    assert!(code.contains("char_stream::expect_literal(&self.cursor, \"a\")"));
    assert!(code.contains("char_stream::expect_literal(&self.cursor, \"b\")"));
    assert!(code.contains("fn body__loop1_"));
}

/// Keyword classification: literals `one`..`ten` split into the two
/// documented five-element sets by alphabetical sort + parity.
#[test]
fn keyword_classification_matches_the_documented_split() {
    let grammar = build(
        "start: 'one' 'two' 'three' 'four' 'five' \"six\" \"seven\" \"eight\" \"nine\" \"ten\"\n",
    );
    let tables = keywords::classify(&grammar);
    assert_eq!(tables.keywords, vec!["five", "four", "one", "three", "two"]);
    assert_eq!(tables.soft_keywords, vec!["eight", "nine", "seven", "six", "ten"]);
}

/// `start: foo ENDMARKER; foo: bar NAME` fails `load_grammar`'s follow-on
/// analysis because `bar` is never declared.
#[test]
fn undeclared_name_fails_validation() {
    let driver = Driver::new(EmitOptions::default());
    let grammar = driver.load_grammar(GrammarSource::Text("start: foo ENDMARKER\nfoo: bar NAME\n")).expect("meta-syntax parses");
    assert!(analyzer::analyze(&grammar).is_err());
}
