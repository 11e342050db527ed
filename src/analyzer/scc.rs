//! First-invocation graph and SCC decomposition (spec §4.4), grounded on
//! pegen's `GrammarAnalyzer` (the part of `parser_generator.py` that marks
//! `rule.left_recursive`/`rule.leader` before code generation), using an
//! iterative path-based variant of Tarjan's algorithm — spec §4.4
//! explicitly allows "any algorithm that yields SCCs in reverse
//! topological order", noting this is how the original was historically
//! implemented, and an explicit stack avoids recursion depth tied to
//! grammar size.

use std::cmp::min;
use std::collections::{HashMap, HashSet};

use crate::error::ValidationError;
use crate::grammar::Grammar;

/// Builds the first-invocation graph restricted to rule-to-rule edges
/// (extern decls and well-known terminals have no outgoing edges and
/// never participate in a cycle).
fn build_graph(grammar: &Grammar) -> HashMap<String, Vec<String>> {
    grammar
        .rules()
        .iter()
        .map(|rule| {
            let targets =
                rule.initial_names().into_iter().filter(|name| grammar.rule(name).is_some()).collect();
            (rule.name.clone(), targets)
        })
        .collect()
}

/// Iterative Tarjan's algorithm. Returns SCCs in reverse topological order
/// (each SCC's dependencies appear strictly before it, matching the order
/// pegen's analyzer visits them in).
fn tarjan(graph: &HashMap<String, Vec<String>>) -> Vec<Vec<String>> {
    let mut index_counter = 0usize;
    let mut indices: HashMap<String, usize> = HashMap::new();
    let mut lowlink: HashMap<String, usize> = HashMap::new();
    let mut on_stack: HashSet<String> = HashSet::new();
    let mut tarjan_stack: Vec<String> = Vec::new();
    let mut result: Vec<Vec<String>> = Vec::new();

    let mut names: Vec<&String> = graph.keys().collect();
    names.sort();

    for &start in &names {
        if indices.contains_key(start) {
            continue;
        }
        // (node, index into its neighbor list already visited)
        let mut work: Vec<(String, usize)> = vec![(start.clone(), 0)];
        indices.insert(start.clone(), index_counter);
        lowlink.insert(start.clone(), index_counter);
        index_counter += 1;
        tarjan_stack.push(start.clone());
        on_stack.insert(start.clone());

        while let Some(&mut (ref node, ref mut pi)) = work.last_mut() {
            let node = node.clone();
            let neighbors = &graph[&node];
            if *pi < neighbors.len() {
                let succ = neighbors[*pi].clone();
                *pi += 1;
                if !indices.contains_key(&succ) {
                    indices.insert(succ.clone(), index_counter);
                    lowlink.insert(succ.clone(), index_counter);
                    index_counter += 1;
                    tarjan_stack.push(succ.clone());
                    on_stack.insert(succ.clone());
                    work.push((succ, 0));
                } else if on_stack.contains(&succ) {
                    let succ_index = indices[&succ];
                    let node_low = lowlink[&node];
                    lowlink.insert(node.clone(), min(node_low, succ_index));
                }
            } else {
                work.pop();
                let node_low = lowlink[&node];
                if let Some(&mut (ref parent, _)) = work.last_mut() {
                    let parent_low = lowlink[parent];
                    lowlink.insert(parent.clone(), min(parent_low, node_low));
                }
                if lowlink[&node] == indices[&node] {
                    let mut scc = Vec::new();
                    loop {
                        let w = tarjan_stack.pop().unwrap();
                        on_stack.remove(&w);
                        let done = w == node;
                        scc.push(w);
                        if done {
                            break;
                        }
                    }
                    result.push(scc);
                }
            }
        }
    }

    result
}

/// Every elementary cycle within the induced subgraph on `nodes`,
/// represented as its node set. A simple recursive path search, bounded
/// to the SCC at hand (spec §9's "bounded per-SCC cycle-intersection DFS,
/// not full cycle enumeration" — cycles are collected as sets, so distinct
/// rotations of the same cycle contribute redundant, harmless duplicates).
fn elementary_cycles(nodes: &[String], graph: &HashMap<String, Vec<String>>) -> Vec<HashSet<String>> {
    let node_set: HashSet<&String> = nodes.iter().collect();
    let mut cycles = Vec::new();

    for start in nodes {
        let mut path = vec![start.clone()];
        let mut on_path: HashSet<String> = std::iter::once(start.clone()).collect();
        walk(start, start, graph, &node_set, &mut path, &mut on_path, &mut cycles);
    }
    cycles
}

fn walk(
    start: &str,
    current: &str,
    graph: &HashMap<String, Vec<String>>,
    node_set: &HashSet<&String>,
    path: &mut Vec<String>,
    on_path: &mut HashSet<String>,
    cycles: &mut Vec<HashSet<String>>,
) {
    for succ in graph.get(current).map(|v| v.as_slice()).unwrap_or(&[]) {
        if !node_set.contains(succ) {
            continue;
        }
        if succ == start && path.len() > 1 {
            cycles.push(path.iter().cloned().collect());
            continue;
        }
        if on_path.contains(succ) {
            continue;
        }
        path.push(succ.clone());
        on_path.insert(succ.clone());
        walk(start, succ, graph, node_set, path, on_path, cycles);
        path.pop();
        on_path.remove(succ);
    }
}

/// The leader of a multi-rule SCC: the rule present in every elementary
/// cycle, lexicographically smallest if more than one qualifies (spec
/// §4.4 "Leader selection").
fn select_leader(scc: &[String], graph: &HashMap<String, Vec<String>>) -> Result<String, ValidationError> {
    let cycles = elementary_cycles(scc, graph);
    let mut candidates: Option<HashSet<String>> = None;
    for cycle in cycles {
        candidates = Some(match candidates {
            None => cycle,
            Some(acc) => acc.intersection(&cycle).cloned().collect(),
        });
    }
    match candidates {
        Some(set) if !set.is_empty() => Ok(set.into_iter().min().unwrap()),
        _ => Err(ValidationError::NoLeaderCandidate { scc: scc.to_vec() }),
    }
}

/// Runs SCC decomposition and writes `left_recursive`/`leader` onto every
/// affected `Rule` in `grammar`.
pub fn analyze(grammar: &Grammar) -> Result<(), ValidationError> {
    let graph = build_graph(grammar);
    let sccs = tarjan(&graph);

    for scc in &sccs {
        if scc.len() == 1 {
            let name = &scc[0];
            if graph[name].iter().any(|succ| succ == name) {
                let rule = grammar.rule(name).expect("scc member must be a declared rule");
                rule.left_recursive.set(true);
                rule.leader.set(true);
            }
        } else {
            for name in scc {
                grammar.rule(name).expect("scc member must be a declared rule").left_recursive.set(true);
            }
            let leader = select_leader(scc, &graph)?;
            grammar.rule(&leader).unwrap().leader.set(true);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Alt, Item, Rhs, Rule, TopLevelItem};
    use std::collections::BTreeMap;

    fn rule_referencing(name: &str, targets: &[&str]) -> Rule {
        let items = targets
            .iter()
            .map(|t| TopLevelItem::new(None, Item::Name(t.to_string()), None))
            .collect();
        Rule::new(name.to_string(), None, Rhs::new(vec![Alt::new(items, None)]), false)
    }

    #[test]
    fn direct_self_recursion_marks_singleton_scc_as_its_own_leader() {
        let expr = rule_referencing("expr", &["expr", "NUMBER"]);
        let grammar = Grammar::new(vec![expr], Vec::new(), BTreeMap::new());
        analyze(&grammar).unwrap();
        let rule = grammar.rule("expr").unwrap();
        assert!(rule.left_recursive.get());
        assert!(rule.leader.get());
    }

    #[test]
    fn acyclic_rules_are_never_marked_left_recursive() {
        let a = rule_referencing("a", &["b"]);
        let b = rule_referencing("b", &["NUMBER"]);
        let grammar = Grammar::new(vec![a, b], Vec::new(), BTreeMap::new());
        analyze(&grammar).unwrap();
        assert!(!grammar.rule("a").unwrap().left_recursive.get());
        assert!(!grammar.rule("b").unwrap().left_recursive.get());
    }

    #[test]
    fn mutual_left_recursion_picks_lexicographically_smallest_leader() {
        // zeta -> alpha -> zeta: a 2-cycle, "alpha" sorts before "zeta".
        let zeta = rule_referencing("zeta", &["alpha"]);
        let alpha = rule_referencing("alpha", &["zeta", "NUMBER"]);
        let grammar = Grammar::new(vec![zeta, alpha], Vec::new(), BTreeMap::new());
        analyze(&grammar).unwrap();
        assert!(grammar.rule("alpha").unwrap().left_recursive.get());
        assert!(grammar.rule("zeta").unwrap().left_recursive.get());
        assert!(grammar.rule("alpha").unwrap().leader.get());
        assert!(!grammar.rule("zeta").unwrap().leader.get());
    }
}
