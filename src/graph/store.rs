//! Mutable triple store and its indexed snapshots.

use super::{Object, Triple, TYPE_OF};
use rustc_hash::{FxHashMap, FxHashSet};

/// Mutable set of triples.
#[derive(Debug, Clone, Default)]
pub struct Store {
    triples: FxHashSet<Triple>,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    /// Returns false when the triple was already present.
    pub fn add(&mut self, triple: Triple) -> bool {
        self.triples.insert(triple)
    }

    pub fn remove(&mut self, triple: &Triple) -> bool {
        self.triples.remove(triple)
    }

    /// Add every triple of a snapshot.
    pub fn merge(&mut self, graph: &Graph) {
        self.triples.extend(graph.triples().iter().cloned());
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Immutable view of the current contents.
    pub fn snapshot(&self) -> Graph {
        Graph::from_triples(self.triples.iter().cloned())
    }
}

type Index = FxHashMap<String, Vec<usize>>;
type PairIndex = FxHashMap<(String, String), Vec<usize>>;

/// Index key for an object; resources and literals never collide.
fn object_key(object: &Object) -> String {
    match object {
        Object::Resource(id) => format!("<{}>", id),
        Object::Literal(l) => format!("\"{}\"^^{}", l.lexical(), l.datatype()),
    }
}

/// Immutable snapshot. Triples are kept sorted, so every query returns
/// triples in sorted order.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    triples: Vec<Triple>,
    by_subject: Index,
    by_predicate: Index,
    by_object: Index,
    by_subject_predicate: PairIndex,
    by_predicate_object: PairIndex,
    by_subject_object: PairIndex,
}

impl Graph {
    pub fn from_triples<I>(triples: I) -> Self
    where
        I: IntoIterator<Item = Triple>,
    {
        let mut sorted: Vec<Triple> = triples.into_iter().collect();
        sorted.sort();
        sorted.dedup();

        let mut g = Graph::default();
        for (i, t) in sorted.iter().enumerate() {
            let obj = object_key(&t.object);
            g.by_subject.entry(t.subject.clone()).or_default().push(i);
            g.by_predicate.entry(t.predicate.clone()).or_default().push(i);
            g.by_object.entry(obj.clone()).or_default().push(i);
            g.by_subject_predicate
                .entry((t.subject.clone(), t.predicate.clone()))
                .or_default()
                .push(i);
            g.by_predicate_object
                .entry((t.predicate.clone(), obj.clone()))
                .or_default()
                .push(i);
            g.by_subject_object
                .entry((t.subject.clone(), obj))
                .or_default()
                .push(i);
        }
        g.triples = sorted;
        g
    }

    pub fn triples(&self) -> &[Triple] {
        &self.triples
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Content hash of the sorted binary encoding. Returns `"blake3:{hex}"`.
    pub fn fingerprint(&self) -> String {
        let bytes = super::codec::encode_binary(&self.triples);
        format!("blake3:{}", blake3::hash(&bytes).to_hex())
    }

    pub fn has_triple(&self, triple: &Triple) -> bool {
        self.triples.binary_search(triple).is_ok()
    }

    fn select(&self, hits: Option<&Vec<usize>>) -> Vec<&Triple> {
        hits.map(|ix| ix.iter().map(|&i| &self.triples[i]).collect())
            .unwrap_or_default()
    }

    pub fn by_subject(&self, subject: &str) -> Vec<&Triple> {
        self.select(self.by_subject.get(subject))
    }

    pub fn by_predicate(&self, predicate: &str) -> Vec<&Triple> {
        self.select(self.by_predicate.get(predicate))
    }

    pub fn by_object(&self, object: &Object) -> Vec<&Triple> {
        self.select(self.by_object.get(&object_key(object)))
    }

    pub fn by_subject_predicate(&self, subject: &str, predicate: &str) -> Vec<&Triple> {
        self.select(
            self.by_subject_predicate
                .get(&(subject.to_string(), predicate.to_string())),
        )
    }

    pub fn by_predicate_object(&self, predicate: &str, object: &Object) -> Vec<&Triple> {
        self.select(
            self.by_predicate_object
                .get(&(predicate.to_string(), object_key(object))),
        )
    }

    pub fn by_subject_object(&self, subject: &str, object: &Object) -> Vec<&Triple> {
        self.select(
            self.by_subject_object
                .get(&(subject.to_string(), object_key(object))),
        )
    }

    /// Resources `node` points at through `predicate`.
    pub fn list_attached_to(&self, node: &str, predicate: &str) -> Vec<&str> {
        self.by_subject_predicate(node, predicate)
            .into_iter()
            .filter_map(|t| t.object.as_resource())
            .collect()
    }

    /// Resources pointing at `node` through `predicate`.
    pub fn list_attached_from(&self, node: &str, predicate: &str) -> Vec<&str> {
        self.by_predicate_object(predicate, &Object::resource(node))
            .into_iter()
            .map(|t| t.subject.as_str())
            .collect()
    }

    fn type_of(&self, node: &str) -> Option<&Object> {
        self.by_subject_predicate(node, TYPE_OF)
            .first()
            .map(|t| &t.object)
    }

    /// Depth-first from `root` down `predicate` edges, children sorted.
    /// `each` receives the node and its distance from `root`. A node
    /// reachable twice is visited once.
    pub fn visit_top_down<F, E>(&self, root: &str, predicate: &str, mut each: F) -> Result<(), E>
    where
        F: FnMut(&str, usize) -> Result<(), E>,
    {
        let mut seen = FxHashSet::default();
        self.walk(root, 0, &mut seen, &mut |n| self.list_attached_to(n, predicate), &mut each)
    }

    /// Like [`Graph::visit_top_down`], following edges backwards to parents.
    pub fn visit_bottom_up<F, E>(&self, start: &str, predicate: &str, mut each: F) -> Result<(), E>
    where
        F: FnMut(&str, usize) -> Result<(), E>,
    {
        let mut seen = FxHashSet::default();
        self.walk(start, 0, &mut seen, &mut |n| self.list_attached_from(n, predicate), &mut each)
    }

    fn walk<'g, N, F, E>(
        &'g self,
        node: &str,
        depth: usize,
        seen: &mut FxHashSet<String>,
        next: &mut N,
        each: &mut F,
    ) -> Result<(), E>
    where
        N: FnMut(&str) -> Vec<&'g str>,
        F: FnMut(&str, usize) -> Result<(), E>,
    {
        if !seen.insert(node.to_string()) {
            return Ok(());
        }
        each(node, depth)?;
        let mut children = next(node);
        children.sort_unstable();
        for child in children {
            self.walk(child, depth + 1, seen, next, each)?;
        }
        Ok(())
    }

    /// Visit the children of `start`'s parents that share its type,
    /// `start` included. A node without parents is its only sibling.
    pub fn visit_siblings<F, E>(&self, start: &str, predicate: &str, mut each: F) -> Result<(), E>
    where
        F: FnMut(&str) -> Result<(), E>,
    {
        let mut parents = self.list_attached_from(start, predicate);
        if parents.is_empty() {
            return each(start);
        }
        parents.sort_unstable();
        let kind = self.type_of(start);
        for parent in parents {
            let mut children = self.list_attached_to(parent, predicate);
            children.sort_unstable();
            for child in children {
                if self.type_of(child) == kind {
                    each(child)?;
                }
            }
        }
        Ok(())
    }
}
