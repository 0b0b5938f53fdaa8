//! Folder closure: granted folders plus every descendant.
//!
//! Stores that can recurse compute the closure themselves (see
//! [`crate::predicate::sql::folder_closure_cte`] for the relational form);
//! [`fixed_point`] is the shared in-process iteration.

use ahash::AHashSet;

/// Outcome of a delegated closure request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderClosureResult {
    /// Seeds plus all descendants within the org.
    Resolved(AHashSet<String>),
    /// The backend cannot run recursive queries. Callers fall back to the
    /// flat (directly granted) folder set.
    Unsupported,
}

/// Expand `seeds` until an iteration adds nothing.
///
/// `children` returns the direct children of one folder. Iterations are capped
/// at `max_rounds` (pass the org's folder count: no acyclic chain is longer),
/// so cyclic parent data cannot loop forever.
pub fn fixed_point<F, I>(seeds: &[String], max_rounds: usize, mut children: F) -> AHashSet<String>
where
    F: FnMut(&str) -> I,
    I: IntoIterator<Item = String>,
{
    let mut closure: AHashSet<String> = seeds.iter().cloned().collect();
    let mut frontier: Vec<String> = closure.iter().cloned().collect();
    let mut rounds = 0;

    while !frontier.is_empty() {
        if rounds >= max_rounds {
            tracing::warn!(
                rounds,
                pending = frontier.len(),
                "folder closure hit its iteration cap; folder parents may be cyclic"
            );
            break;
        }
        rounds += 1;

        let mut next = Vec::new();
        for uid in &frontier {
            for child in children(uid) {
                if closure.insert(child.clone()) {
                    next.push(child);
                }
            }
        }
        frontier = next;
    }

    tracing::debug!(seeds = seeds.len(), folders = closure.len(), rounds, "folder closure resolved");
    closure
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashMap;

    fn tree(edges: &[(&str, &str)]) -> AHashMap<String, Vec<String>> {
        let mut m: AHashMap<String, Vec<String>> = AHashMap::new();
        for (parent, child) in edges {
            m.entry(parent.to_string()).or_default().push(child.to_string());
        }
        m
    }

    fn run(edges: &AHashMap<String, Vec<String>>, seeds: &[&str], cap: usize) -> AHashSet<String> {
        let seeds: Vec<String> = seeds.iter().map(|s| s.to_string()).collect();
        fixed_point(&seeds, cap, |uid| edges.get(uid).cloned().unwrap_or_default())
    }

    fn set(v: &[&str]) -> AHashSet<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn collects_all_descendants() {
        let edges = tree(&[("a", "b"), ("b", "c"), ("c", "d"), ("x", "y")]);
        assert_eq!(run(&edges, &["a"], 10), set(&["a", "b", "c", "d"]));
        assert_eq!(run(&edges, &["c", "x"], 10), set(&["c", "d", "x", "y"]));
    }

    #[test]
    fn empty_seeds_give_empty_closure() {
        let edges = tree(&[("a", "b")]);
        assert!(run(&edges, &[], 10).is_empty());
    }

    #[test]
    fn closure_is_idempotent() {
        let edges = tree(&[("a", "b"), ("b", "c"), ("a", "e")]);
        let once = run(&edges, &["a"], 10);
        let seeds: Vec<&str> = once.iter().map(String::as_str).collect();
        assert_eq!(run(&edges, &seeds, 10), once);
    }

    #[test]
    fn cycles_terminate() {
        let edges = tree(&[("a", "b"), ("b", "a")]);
        assert_eq!(run(&edges, &["a"], 10), set(&["a", "b"]));
    }

    #[test]
    fn iteration_cap_bounds_depth() {
        let edges = tree(&[("a", "b"), ("b", "c"), ("c", "d")]);
        assert_eq!(run(&edges, &["a"], 1), set(&["a", "b"]));
    }
}
