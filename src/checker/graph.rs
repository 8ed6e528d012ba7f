/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A small directed graph, used to order the operations of a history.

use std::collections::{BTreeMap, BTreeSet};

/// A directed graph without self-edges. Vertices are kept in their `Ord` order, so every traversal is
/// deterministic.
#[derive(Clone, Debug)]
pub struct Graph<V: Copy + Ord> {
    from: BTreeMap<V, BTreeSet<V>>,
    to: BTreeMap<V, BTreeSet<V>>,
}

impl<V: Copy + Ord> Default for Graph<V> {
    fn default() -> Self {
        Self {
            from: BTreeMap::new(),
            to: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

impl<V: Copy + Ord> Graph<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.from.len()
    }

    pub fn is_empty(&self) -> bool {
        self.from.is_empty()
    }

    pub fn has(&self, v: V) -> bool {
        self.from.contains_key(&v)
    }

    pub fn add(&mut self, v: V) {
        self.from.entry(v).or_default();
        self.to.entry(v).or_default();
    }

    /// Remove `v` and every edge that touches it.
    pub fn remove(&mut self, v: V) {
        if let Some(successors) = self.from.remove(&v) {
            for successor in successors {
                if let Some(predecessors) = self.to.get_mut(&successor) {
                    predecessors.remove(&v);
                }
            }
        }
        if let Some(predecessors) = self.to.remove(&v) {
            for predecessor in predecessors {
                if let Some(successors) = self.from.get_mut(&predecessor) {
                    successors.remove(&v);
                }
            }
        }
    }

    /// Add the edge `from -> to`, adding either vertex if missing. Self-edges are ignored.
    pub fn add_edge(&mut self, from: V, to: V) {
        if from == to {
            return;
        }
        self.add(from);
        self.add(to);
        self.from.entry(from).or_default().insert(to);
        self.to.entry(to).or_default().insert(from);
    }

    pub fn remove_edge(&mut self, from: V, to: V) {
        if let Some(successors) = self.from.get_mut(&from) {
            successors.remove(&to);
        }
        if let Some(predecessors) = self.to.get_mut(&to) {
            predecessors.remove(&from);
        }
    }

    pub fn has_edge(&self, from: V, to: V) -> bool {
        self.from
            .get(&from)
            .map_or(false, |successors| successors.contains(&to))
    }

    pub fn vertices(&self) -> impl Iterator<Item = V> + '_ {
        self.from.keys().copied()
    }

    /// Vertices reachable from `v` through one edge.
    pub fn from(&self, v: V) -> Vec<V> {
        self.from
            .get(&v)
            .map(|successors| successors.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Vertices that reach `v` through one edge.
    pub fn to(&self, v: V) -> Vec<V> {
        self.to
            .get(&v)
            .map(|predecessors| predecessors.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Find a cycle with a depth-first search. Returns the vertices on the search path at the moment
    /// the search ran into a vertex already on it, which include every vertex of the cycle found.
    pub fn cycle(&self) -> Option<Vec<V>> {
        let mut colors: BTreeMap<V, Color> = self.vertices().map(|v| (v, Color::White)).collect();

        for root in self.vertices() {
            if colors.get(&root) != Some(&Color::White) {
                continue;
            }

            // Each frame is a vertex on the path and the successors it has yet to visit.
            colors.insert(root, Color::Gray);
            let mut path: Vec<(V, Vec<V>)> = vec![(root, self.from(root))];

            while let Some((v, pending)) = path.last_mut() {
                let v = *v;
                match pending.pop() {
                    Some(u) => match colors.get(&u).copied().unwrap_or(Color::White) {
                        Color::Gray => {
                            return Some(path.iter().map(|(vertex, _)| *vertex).collect());
                        }
                        Color::White => {
                            colors.insert(u, Color::Gray);
                            path.push((u, self.from(u)));
                        }
                        Color::Black => (),
                    },
                    None => {
                        colors.insert(v, Color::Black);
                        path.pop();
                    }
                }
            }
        }

        None
    }
}
