//! Index-addressed species arena with bounded ancestry queries.
//!
//! Every species holds an optional parent [`SpeciesId`]. A parent must
//! already exist when its child is pushed, so parent indices are strictly
//! smaller than child indices and ancestor chains can never loop.

use smallvec::SmallVec;

use crate::error::RepositoryError;
use crate::id::{SpeciesId, TurnId};
use crate::species::{Species, SpeciesStatus};

/// Ancestor chain, nearest ancestor first.
pub type AncestorChain = SmallVec<[SpeciesId; 8]>;

/// Append-only arena of species records.
#[derive(Clone, Debug, Default)]
pub struct SpeciesArena {
    species: Vec<Species>,
}

impl SpeciesArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a species, assigning its id and parent.
    ///
    /// Fails if `parent` is not already in the arena.
    pub fn push(
        &mut self,
        mut species: Species,
        parent: Option<SpeciesId>,
    ) -> Result<SpeciesId, RepositoryError> {
        if let Some(p) = parent {
            if p.index() >= self.species.len() {
                return Err(RepositoryError::UnknownSpecies { id: p });
            }
        }
        let id = SpeciesId(u32::try_from(self.species.len()).map_err(|_| {
            RepositoryError::Backend {
                reason: "species arena is full".into(),
            }
        })?);
        species.id = id;
        species.parent = parent;
        self.species.push(species);
        Ok(id)
    }

    /// Push a descendant of `parent` created at `turn`, stamping the
    /// parent's `last_offspring_turn`.
    pub fn push_offspring(
        &mut self,
        mut species: Species,
        parent: SpeciesId,
        turn: TurnId,
    ) -> Result<SpeciesId, RepositoryError> {
        species.created_turn = turn;
        let id = self.push(species, Some(parent))?;
        if let Some(p) = self.species.get_mut(parent.index()) {
            p.last_offspring_turn = Some(turn);
        }
        Ok(id)
    }

    /// Replace the record stored under `species.id`.
    ///
    /// The parent link is immutable and an extinct record never changes
    /// status again.
    pub fn replace(&mut self, species: Species) -> Result<(), RepositoryError> {
        let id = species.id;
        let slot = self
            .species
            .get_mut(id.index())
            .ok_or(RepositoryError::UnknownSpecies { id })?;
        if slot.status == SpeciesStatus::Extinct && species.status != SpeciesStatus::Extinct {
            return Err(RepositoryError::ResurrectionRejected { id });
        }
        let parent = slot.parent;
        *slot = species;
        slot.parent = parent;
        Ok(())
    }

    /// Number of species ever pushed (living or not).
    pub fn len(&self) -> usize {
        self.species.len()
    }

    /// Whether the arena holds no species.
    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    /// Look up a species.
    pub fn get(&self, id: SpeciesId) -> Option<&Species> {
        self.species.get(id.index())
    }

    /// Mutable lookup.
    pub fn get_mut(&mut self, id: SpeciesId) -> Option<&mut Species> {
        self.species.get_mut(id.index())
    }

    /// All species in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Species> {
        self.species.iter()
    }

    /// Species that take part in population dynamics this turn.
    pub fn alive(&self) -> impl Iterator<Item = &Species> {
        self.species.iter().filter(|s| s.is_alive())
    }

    /// Find a species by its display code.
    pub fn find_by_code(&self, code: &str) -> Option<SpeciesId> {
        self.species
            .iter()
            .find(|s| s.code.as_str() == code)
            .map(|s| s.id)
    }

    /// Direct descendants of `id`.
    pub fn children(&self, id: SpeciesId) -> impl Iterator<Item = &Species> + '_ {
        self.species.iter().filter(move |s| s.parent == Some(id))
    }

    /// Up to `max_depth` ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: SpeciesId, max_depth: u32) -> AncestorChain {
        let mut chain = AncestorChain::new();
        let mut current = self.get(id).and_then(|s| s.parent);
        while let Some(p) = current {
            if chain.len() as u32 >= max_depth {
                break;
            }
            chain.push(p);
            current = self.get(p).and_then(|s| s.parent);
        }
        chain
    }

    /// Whether `ancestor` appears within `max_depth` generations above
    /// `descendant`.
    pub fn is_ancestor(&self, ancestor: SpeciesId, descendant: SpeciesId, max_depth: u32) -> bool {
        self.ancestors(descendant, max_depth).contains(&ancestor)
    }

    /// Whether `descendant` descends from `ancestor` within `max_depth`
    /// generations.
    pub fn is_descendant(&self, descendant: SpeciesId, ancestor: SpeciesId, max_depth: u32) -> bool {
        self.is_ancestor(ancestor, descendant, max_depth)
    }

    /// Generations separating `a` and `b` through their nearest common
    /// ancestor (`depth_a + depth_b`).
    ///
    /// Parent/child is 1, siblings are 2, first cousins 4. Each side walks
    /// at most `max_depth` generations; `None` means no shared ancestor
    /// within that bound (maximally distant).
    pub fn kinship_distance(&self, a: SpeciesId, b: SpeciesId, max_depth: u32) -> Option<u32> {
        if self.get(a).is_none() || self.get(b).is_none() {
            return None;
        }
        if a == b {
            return Some(0);
        }
        let mut chain_a = AncestorChain::new();
        chain_a.push(a);
        chain_a.extend(self.ancestors(a, max_depth));
        let mut chain_b = AncestorChain::new();
        chain_b.push(b);
        chain_b.extend(self.ancestors(b, max_depth));

        let mut best: Option<u32> = None;
        for (i, x) in chain_a.iter().enumerate() {
            if let Some(j) = chain_b.iter().position(|y| y == x) {
                let d = (i + j) as u32;
                best = Some(best.map_or(d, |cur| cur.min(d)));
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::species::{Habitat, Traits};

    fn sp(code: &str) -> Species {
        Species::new(code, 1.0, 1000, Traits::default(), Habitat::Marine)
    }

    /// root ── a ── a1
    ///      └─ b ── b1 ── b11
    /// lone
    fn family() -> (SpeciesArena, [SpeciesId; 7]) {
        let mut arena = SpeciesArena::new();
        let root = arena.push(sp("R"), None).unwrap();
        let a = arena.push(sp("Ra"), Some(root)).unwrap();
        let b = arena.push(sp("Rb"), Some(root)).unwrap();
        let a1 = arena.push(sp("Ra1"), Some(a)).unwrap();
        let b1 = arena.push(sp("Rb1"), Some(b)).unwrap();
        let b11 = arena.push(sp("Rb11"), Some(b1)).unwrap();
        let lone = arena.push(sp("L"), None).unwrap();
        (arena, [root, a, b, a1, b1, b11, lone])
    }

    #[test]
    fn push_rejects_unknown_parent() {
        let mut arena = SpeciesArena::new();
        let err = arena.push(sp("X"), Some(SpeciesId(5))).unwrap_err();
        assert_eq!(err, RepositoryError::UnknownSpecies { id: SpeciesId(5) });
    }

    #[test]
    fn ancestors_nearest_first_and_bounded() {
        let (arena, [root, _, b, _, b1, b11, _]) = family();
        assert_eq!(arena.ancestors(b11, 10).as_slice(), &[b1, b, root]);
        assert_eq!(arena.ancestors(b11, 2).as_slice(), &[b1, b]);
        assert!(arena.ancestors(root, 10).is_empty());
        assert!(arena.is_ancestor(root, b11, 3));
        assert!(!arena.is_ancestor(root, b11, 2));
        assert!(arena.is_descendant(b11, b, 5));
        assert!(!arena.is_descendant(b, b11, 5));
    }

    #[test]
    fn kinship_distances() {
        let (arena, [root, a, b, a1, b1, b11, lone]) = family();
        assert_eq!(arena.kinship_distance(a, a, 5), Some(0));
        assert_eq!(arena.kinship_distance(root, a, 5), Some(1));
        assert_eq!(arena.kinship_distance(a, b, 5), Some(2));
        assert_eq!(arena.kinship_distance(a1, b1, 5), Some(4));
        assert_eq!(arena.kinship_distance(a1, b11, 5), Some(5));
        assert_eq!(arena.kinship_distance(b11, a1, 5), Some(5));
        assert_eq!(arena.kinship_distance(a, lone, 5), None);
        // Bound cuts off the shared root.
        assert_eq!(arena.kinship_distance(a1, b11, 2), None);
    }

    #[test]
    fn offspring_stamps_parent() {
        let mut arena = SpeciesArena::new();
        let p = arena.push(sp("P"), None).unwrap();
        let c = arena.push_offspring(sp("P1"), p, TurnId(7)).unwrap();
        assert_eq!(arena.get(p).unwrap().last_offspring_turn, Some(TurnId(7)));
        assert_eq!(arena.get(c).unwrap().created_turn, TurnId(7));
        assert_eq!(arena.children(p).count(), 1);
    }

    #[test]
    fn replace_keeps_parent_and_blocks_resurrection() {
        let (mut arena, [root, a, ..]) = family();
        let mut rec = arena.get(a).unwrap().clone();
        rec.parent = None;
        rec.status = SpeciesStatus::Extinct;
        arena.replace(rec.clone()).unwrap();
        assert_eq!(arena.get(a).unwrap().parent, Some(root));

        rec.status = SpeciesStatus::Alive;
        assert_eq!(
            arena.replace(rec),
            Err(RepositoryError::ResurrectionRejected { id: a })
        );
        assert_eq!(arena.alive().count(), 6);
        assert_eq!(arena.find_by_code("Rb1"), Some(SpeciesId(4)));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        /// Arena where species `i` descends from `parents[i] % i`, or is a
        /// root when the entry is `None`.
        fn tree(parents: &[Option<u32>]) -> SpeciesArena {
            let mut arena = SpeciesArena::new();
            for (i, p) in parents.iter().enumerate() {
                let parent = match (i, p) {
                    (0, _) | (_, None) => None,
                    (i, Some(p)) => Some(SpeciesId(p % i as u32)),
                };
                arena.push(sp(&format!("S{i}")), parent).unwrap();
            }
            arena
        }

        proptest! {
            #[test]
            fn kinship_is_symmetric(
                parents in prop::collection::vec(prop::option::of(0u32..64), 1..24),
                a in 0u32..24,
                b in 0u32..24,
                depth in 0u32..6,
            ) {
                let arena = tree(&parents);
                let n = arena.len() as u32;
                let (a, b) = (SpeciesId(a % n), SpeciesId(b % n));
                prop_assert_eq!(
                    arena.kinship_distance(a, b, depth),
                    arena.kinship_distance(b, a, depth)
                );
            }

            #[test]
            fn parent_link_is_distance_one(
                parents in prop::collection::vec(prop::option::of(0u32..64), 2..24),
            ) {
                let arena = tree(&parents);
                for sp in arena.iter() {
                    if let Some(p) = sp.parent {
                        prop_assert_eq!(arena.kinship_distance(sp.id, p, 1), Some(1));
                        prop_assert!(arena.is_descendant(sp.id, p, 1));
                    }
                }
            }
        }
    }
}
