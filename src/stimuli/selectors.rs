use rand::seq::SliceRandom;
use rand::Rng;

use crate::stimuli::catalog::{
    Distr, StimulusCatalog, StimulusObject, SUBSET_ATYPICAL, SUBSET_PARENT_CLASS_1,
    SUBSET_PARENT_CLASS_2,
};

/// A rule for picking one distractor relative to an already chosen target.
pub trait DistractorSelector {
    /// Candidates this selector draws from.
    fn pool<'c>(&self, catalog: &'c StimulusCatalog) -> Vec<&'c StimulusObject>;

    /// Whether `candidate` may accompany `target`.
    fn accepts(&self, target: &StimulusObject, candidate: &StimulusObject) -> bool;

    /// Uniformly pick one accepted candidate, or `None` if the filtered pool is empty.
    fn select<'c, R: Rng + ?Sized>(
        &self,
        target: &StimulusObject,
        catalog: &'c StimulusCatalog,
        rng: &mut R,
    ) -> Option<&'c StimulusObject> {
        let eligible: Vec<&StimulusObject> = self
            .pool(catalog)
            .into_iter()
            .filter(|candidate| self.accepts(target, candidate))
            .collect();
        eligible.choose(rng).copied()
    }
}

// ── Selectors ──────────────────────────────────────────────────────

/// Non-parent item sharing the class dimension the target is a parent in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtypicalSelector;

impl DistractorSelector for AtypicalSelector {
    fn pool<'c>(&self, catalog: &'c StimulusCatalog) -> Vec<&'c StimulusObject> {
        catalog.subset(SUBSET_ATYPICAL)
    }

    fn accepts(&self, target: &StimulusObject, candidate: &StimulusObject) -> bool {
        if candidate.is_parent {
            return false;
        }
        match target.distr {
            Distr::ParentClass1 => target.class_1 == candidate.class_1,
            Distr::ParentClass2 => target.class_2 == candidate.class_2,
            Distr::Atypical => false,
        }
    }
}

/// Parent item whose own class dimension matches the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentSelector {
    pub subset: u8,
}

impl DistractorSelector for ParentSelector {
    fn pool<'c>(&self, catalog: &'c StimulusCatalog) -> Vec<&'c StimulusObject> {
        catalog.subset(self.subset)
    }

    fn accepts(&self, target: &StimulusObject, candidate: &StimulusObject) -> bool {
        if !candidate.is_parent {
            return false;
        }
        match candidate.distr {
            Distr::ParentClass1 => target.class_1 == candidate.class_1,
            Distr::ParentClass2 => target.class_2 == candidate.class_2,
            Distr::Atypical => false,
        }
    }
}

/// Parent item from either class that is unrelated to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifferentClassSelector;

impl DistractorSelector for DifferentClassSelector {
    fn pool<'c>(&self, catalog: &'c StimulusCatalog) -> Vec<&'c StimulusObject> {
        let mut pool = catalog.subset(SUBSET_PARENT_CLASS_1);
        pool.extend(catalog.subset(SUBSET_PARENT_CLASS_2));
        pool
    }

    fn accepts(&self, target: &StimulusObject, candidate: &StimulusObject) -> bool {
        match (target.distr, candidate.distr) {
            (Distr::ParentClass1, Distr::ParentClass1) => candidate.class_1 != target.class_1,
            (Distr::ParentClass1, Distr::ParentClass2) => !candidate.shares_parent_with(target),
            (Distr::ParentClass2, Distr::ParentClass1) => !candidate.shares_parent_with(target),
            (Distr::ParentClass2, Distr::ParentClass2) => candidate.class_2 != target.class_2,
            (Distr::Atypical, Distr::ParentClass1) => candidate.class_1 != target.class_1,
            (Distr::Atypical, Distr::ParentClass2) => candidate.class_2 != target.class_2,
            (_, Distr::Atypical) => false,
        }
    }
}

/// Anything in the catalog except the target itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSelector;

impl DistractorSelector for UniformSelector {
    fn pool<'c>(&self, catalog: &'c StimulusCatalog) -> Vec<&'c StimulusObject> {
        catalog.all().iter().collect()
    }

    fn accepts(&self, target: &StimulusObject, candidate: &StimulusObject) -> bool {
        candidate.name != target.name
    }
}

// ── Strategy table ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStrategy {
    Atypical(AtypicalSelector),
    Parent(ParentSelector),
    DifferentClass(DifferentClassSelector),
    Uniform(UniformSelector),
}

/// Maps the digit codes used in condition labels to strategies.
pub const STRATEGY_TABLE: [(char, SelectionStrategy); 5] = [
    ('1', SelectionStrategy::Atypical(AtypicalSelector)),
    (
        '2',
        SelectionStrategy::Parent(ParentSelector {
            subset: SUBSET_PARENT_CLASS_1,
        }),
    ),
    (
        '3',
        SelectionStrategy::Parent(ParentSelector {
            subset: SUBSET_PARENT_CLASS_2,
        }),
    ),
    ('4', SelectionStrategy::DifferentClass(DifferentClassSelector)),
    ('5', SelectionStrategy::Uniform(UniformSelector)),
];

pub fn strategy_for_code(code: char) -> Option<SelectionStrategy> {
    STRATEGY_TABLE
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, strategy)| *strategy)
}

impl DistractorSelector for SelectionStrategy {
    fn pool<'c>(&self, catalog: &'c StimulusCatalog) -> Vec<&'c StimulusObject> {
        match self {
            SelectionStrategy::Atypical(s) => s.pool(catalog),
            SelectionStrategy::Parent(s) => s.pool(catalog),
            SelectionStrategy::DifferentClass(s) => s.pool(catalog),
            SelectionStrategy::Uniform(s) => s.pool(catalog),
        }
    }

    fn accepts(&self, target: &StimulusObject, candidate: &StimulusObject) -> bool {
        match self {
            SelectionStrategy::Atypical(s) => s.accepts(target, candidate),
            SelectionStrategy::Parent(s) => s.accepts(target, candidate),
            SelectionStrategy::DifferentClass(s) => s.accepts(target, candidate),
            SelectionStrategy::Uniform(s) => s.accepts(target, candidate),
        }
    }
}
