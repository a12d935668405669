//! Substructures and the value-ordered lists that hold them.
//!
//! A substructure is a candidate pattern graph together with every
//! occurrence of it found in the positive (and negative) host graph.
//! [`SubList`] keeps substructures in decreasing value order and doubles as
//! the beam between generations and as the final output ranking.

use std::fmt::Write as _;

use crate::graph::Graph;
use crate::instance::InstanceList;
use crate::label::LabelList;
use crate::matcher::Matcher;

/// A candidate pattern graph plus its occurrences.
#[derive(Debug, Default)]
pub struct Substructure {
    /// Pattern graph definition.
    pub definition: Graph,
    /// Occurrences in the positive graph.
    pub instances: InstanceList,
    pub num_instances: usize,
    /// Positive examples containing at least one occurrence.
    pub num_examples: usize,
    /// Occurrences in the negative graph.
    pub neg_instances: InstanceList,
    pub num_neg_instances: usize,
    pub num_neg_examples: usize,
    /// Score under the configured evaluation method.
    pub value: f64,
    pub recursive: bool,
    /// Label of the recursive self-edge, when `recursive` is set.
    pub recursive_edge_label: Option<usize>,
}

impl Substructure {
    pub fn new(definition: Graph) -> Substructure {
        Substructure {
            definition,
            value: -1.0,
            ..Substructure::default()
        }
    }

    /// Render the substructure the way the iteration output prints it. At
    /// output level 3 and above, instance and example counts are broken out
    /// on their own lines.
    pub fn render(&self, labels: &LabelList, output_level: u32) -> String {
        let mut out = String::new();
        write!(out, "Substructure: value = {}", self.value).unwrap();
        if output_level > 2 {
            write!(
                out,
                "\n                  pos instances = {}, pos examples = {}",
                self.num_instances, self.num_examples
            )
            .unwrap();
            write!(
                out,
                "\n                  neg instances = {}, neg examples = {}\n",
                self.num_neg_instances, self.num_neg_examples
            )
            .unwrap();
        } else {
            writeln!(
                out,
                ", pos instances = {}, neg instances = {}",
                self.num_instances, self.num_neg_instances
            )
            .unwrap();
        }
        write!(out, "{}", self.definition.display(labels)).unwrap();
        if let Some(label) = self.recursive_edge_label.filter(|_| self.recursive) {
            writeln!(out, "    re {}", labels.label_at(label)).unwrap();
        }
        out
    }
}

/// A list of substructures kept in decreasing value order, ties broken by
/// insertion order. Serves as the beam and as the output ranking.
#[derive(Debug, Default)]
pub struct SubList {
    subs: Vec<Substructure>,
}

impl SubList {
    pub fn new() -> SubList {
        SubList { subs: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.subs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Substructure> {
        self.subs.iter()
    }

    pub fn first(&self) -> Option<&Substructure> {
        self.subs.first()
    }

    /// Consume the list in decreasing value order.
    pub fn into_vec(self) -> Vec<Substructure> {
        self.subs
    }

    /// Insert `sub`, keeping the list sorted by decreasing value.
    ///
    /// An exact duplicate of an equal-valued entry (decided by a full graph
    /// match at threshold zero) is dropped. With `max` nonzero the list is
    /// trimmed after insertion: `value_based` bounds the number of distinct
    /// values retained, otherwise `max` bounds the number of entries.
    pub fn insert(
        &mut self,
        sub: Substructure,
        max: usize,
        value_based: bool,
        matcher: &Matcher,
    ) {
        if self.subs.is_empty() {
            self.subs.push(sub);
            return;
        }

        // duplicates can only hide among entries of equal value, which all
        // sit in the prefix of entries valued >= sub
        for existing in self.subs.iter().take_while(|s| s.value >= sub.value) {
            if existing.value == sub.value
                && matcher
                    .graph_match(&existing.definition, &sub.definition, 0.0)
                    .is_some()
            {
                return;
            }
        }

        let position = self
            .subs
            .iter()
            .position(|s| s.value < sub.value)
            .unwrap_or(self.subs.len());
        self.subs.insert(position, sub);

        if max > 0 {
            if value_based {
                let mut distinct = 0;
                let mut previous = None;
                let mut cut = self.subs.len();
                for (i, s) in self.subs.iter().enumerate() {
                    if previous != Some(s.value) {
                        distinct += 1;
                        previous = Some(s.value);
                    }
                    if distinct > max {
                        cut = i;
                        break;
                    }
                }
                self.subs.truncate(cut);
            } else {
                self.subs.truncate(max);
            }
        }
    }

    /// True if a substructure with a definition exactly matching `sub`'s is
    /// already on the list.
    pub fn contains(&self, sub: &Substructure, matcher: &Matcher) -> bool {
        self.subs
            .iter()
            .any(|s| matcher.graph_match(&sub.definition, &s.definition, 0.0).is_some())
    }
}

impl<'a> IntoIterator for &'a SubList {
    type Item = &'a Substructure;
    type IntoIter = std::slice::Iter<'a, Substructure>;

    fn into_iter(self) -> Self::IntoIter {
        self.subs.iter()
    }
}

impl IntoIterator for SubList {
    type Item = Substructure;
    type IntoIter = std::vec::IntoIter<Substructure>;

    fn into_iter(self) -> Self::IntoIter {
        self.subs.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{Label, LabelList};

    fn one_vertex_sub(labels: &mut LabelList, name: &str, value: f64) -> Substructure {
        let label = labels.store(Label::from(name));
        let mut g = Graph::new();
        g.add_vertex(label);
        let mut sub = Substructure::new(g);
        sub.value = value;
        sub
    }

    #[test]
    fn insert_keeps_decreasing_value_order() {
        let mut labels = LabelList::new();
        let a = one_vertex_sub(&mut labels, "a", 1.0);
        let b = one_vertex_sub(&mut labels, "b", 3.0);
        let c = one_vertex_sub(&mut labels, "c", 2.0);
        let matcher = Matcher::new();
        let mut list = SubList::new();
        list.insert(a, 0, false, &matcher);
        list.insert(b, 0, false, &matcher);
        list.insert(c, 0, false, &matcher);
        let values: Vec<f64> = list.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn equal_valued_duplicates_are_rejected() {
        let mut labels = LabelList::new();
        let a1 = one_vertex_sub(&mut labels, "a", 2.0);
        let a2 = one_vertex_sub(&mut labels, "a", 2.0);
        let b = one_vertex_sub(&mut labels, "b", 2.0);
        let matcher = Matcher::new();
        let mut list = SubList::new();
        list.insert(a1, 0, false, &matcher);
        list.insert(a2, 0, false, &matcher);
        list.insert(b, 0, false, &matcher);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn max_bounds_entries_unless_value_based() {
        let mut labels = LabelList::new();
        let matcher = Matcher::new();
        let mut list = SubList::new();
        for (i, name) in ["a", "b", "c", "d"].iter().enumerate() {
            let sub = one_vertex_sub(&mut labels, name, i as f64);
            list.insert(sub, 2, false, &matcher);
        }
        assert_eq!(list.len(), 2);
        let values: Vec<f64> = list.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![3.0, 2.0]);
    }

    #[test]
    fn value_based_max_bounds_distinct_values() {
        let mut labels = LabelList::new();
        let matcher = Matcher::new();
        let mut list = SubList::new();
        for (name, value) in [("a", 2.0), ("b", 2.0), ("c", 1.0), ("d", 0.5)] {
            let sub = one_vertex_sub(&mut labels, name, value);
            list.insert(sub, 2, true, &matcher);
        }
        // two distinct values retained: {2.0 x2, 1.0}
        let values: Vec<f64> = list.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![2.0, 2.0, 1.0]);
    }
}
