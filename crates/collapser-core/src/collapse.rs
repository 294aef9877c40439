//! Key-based collapsing of ordered sequences.
//!
//! Every record whose collapse key was already seen is folded into the first
//! record that carried that key (the survivor). Survivors keep the order in
//! which their key first appeared, so a sequence without duplicate keys comes
//! back untouched.

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::hash::Hash;

/// A record that can be grouped by key and absorb other records of its group.
pub trait Collapsible: Sized {
    type Key: Eq + Hash;

    /// Grouping key. Must depend only on fields that merging never changes.
    fn collapse_key(&self) -> Self::Key;

    /// Absorb `other` into `self`.
    ///
    /// The return value reports whether the record accepted the merge. The
    /// engine records it in [`CollapseReport::rejected`] but absorbs `other`
    /// either way.
    fn collapse_with(&mut self, other: Self) -> bool;
}

/// Fallible counterpart of [`Collapsible`].
pub trait TryCollapsible: Sized {
    type Key: Eq + Hash;
    type Error;

    fn try_collapse_key(&self) -> Result<Self::Key, Self::Error>;

    fn try_collapse_with(&mut self, other: Self) -> Result<bool, Self::Error>;
}

/// Counts gathered during one collapse pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollapseReport {
    /// Length of the sequence before the pass.
    pub input_len: usize,
    /// Length of the sequence after the pass (one entry per distinct key).
    pub output_len: usize,
    /// Records absorbed into a survivor.
    pub merged: usize,
    /// Absorbed records whose merge reported `false`.
    pub rejected: usize,
}

impl CollapseReport {
    fn untouched(len: usize) -> Self {
        Self {
            input_len: len,
            output_len: len,
            ..Default::default()
        }
    }

    /// True when at least one record was folded away.
    pub fn collapsed(&self) -> bool {
        self.output_len < self.input_len
    }
}

impl fmt::Display for CollapseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} records ({} merged, {} rejected)",
            self.input_len, self.output_len, self.merged, self.rejected
        )
    }
}

/// Collapsing engine whose scratch buffers are reused between calls.
///
/// Each call behaves exactly like the free functions in this module; keeping a
/// `Collapser` around only saves the allocation of the key map.
#[derive(Debug)]
pub struct Collapser<K> {
    /// Key -> group number, numbered in first-seen order.
    groups: HashMap<K, usize>,
    /// Group number of each input position.
    assignment: Vec<usize>,
}

impl<K: Eq + Hash> Default for Collapser<K> {
    fn default() -> Self {
        Self {
            groups: HashMap::new(),
            assignment: Vec::new(),
        }
    }
}

impl<K: Eq + Hash> Collapser<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collapse<T>(&mut self, list: &mut Vec<T>) -> CollapseReport
    where
        T: Collapsible<Key = K>,
    {
        self.collapse_by(list, T::collapse_key, T::collapse_with)
    }

    pub fn try_collapse<T>(&mut self, list: &mut Vec<T>) -> Result<CollapseReport, T::Error>
    where
        T: TryCollapsible<Key = K>,
    {
        self.try_collapse_by(list, T::try_collapse_key, T::try_collapse_with)
    }

    /// Collapse with caller-supplied key and merge functions.
    pub fn collapse_by<T, F, M>(
        &mut self,
        list: &mut Vec<T>,
        mut key: F,
        mut merge: M,
    ) -> CollapseReport
    where
        F: FnMut(&T) -> K,
        M: FnMut(&mut T, T) -> bool,
    {
        let outcome = self.try_collapse_by(
            list,
            |record| Ok::<_, Infallible>(key(record)),
            |survivor, other| Ok(merge(survivor, other)),
        );
        match outcome {
            Ok(report) => report,
            Err(never) => match never {},
        }
    }

    /// Collapse with fallible key and merge functions.
    ///
    /// Keys are derived for the whole sequence before anything moves, so a key
    /// failure leaves `list` untouched. A merge failure leaves the survivors
    /// built so far followed by the records not yet visited; the record handed
    /// to the failing merge is gone.
    pub fn try_collapse_by<T, E, F, M>(
        &mut self,
        list: &mut Vec<T>,
        mut key: F,
        mut merge: M,
    ) -> Result<CollapseReport, E>
    where
        F: FnMut(&T) -> Result<K, E>,
        M: FnMut(&mut T, T) -> Result<bool, E>,
    {
        let input_len = list.len();
        if input_len < 2 {
            return Ok(logged(CollapseReport::untouched(input_len)));
        }

        self.reset();
        for record in list.iter() {
            let next = self.groups.len();
            let group = match key(record) {
                Ok(k) => *self.groups.entry(k).or_insert(next),
                Err(err) => {
                    self.reset();
                    return Err(err);
                }
            };
            self.assignment.push(group);
        }

        let distinct = self.groups.len();
        if distinct == input_len {
            self.reset();
            return Ok(logged(CollapseReport::untouched(input_len)));
        }

        let mut report = CollapseReport::untouched(input_len);
        let mut failure = None;
        let mut pending = std::mem::replace(list, Vec::with_capacity(distinct)).into_iter();
        for (index, &group) in self.assignment.iter().enumerate() {
            let Some(record) = pending.next() else { break };
            // Groups are numbered in first-seen order, so a group's first
            // record always arrives when it is next in line.
            if group == list.len() {
                list.push(record);
                continue;
            }
            match merge(&mut list[group], record) {
                Ok(accepted) => {
                    report.merged += 1;
                    if !accepted {
                        report.rejected += 1;
                        log::trace!("record {index} rejected merge into group {group}, absorbed");
                    }
                }
                Err(err) => {
                    list.extend(pending.by_ref());
                    failure = Some(err);
                    break;
                }
            }
        }
        self.reset();
        if let Some(err) = failure {
            return Err(err);
        }

        report.output_len = list.len();
        Ok(logged(report))
    }

    fn reset(&mut self) {
        self.groups.clear();
        self.assignment.clear();
    }
}

fn logged(report: CollapseReport) -> CollapseReport {
    log::debug!("collapse: {report}");
    report
}

/// Fold records sharing a key into the first record with that key.
pub fn collapse<T: Collapsible>(list: &mut Vec<T>) -> CollapseReport {
    Collapser::new().collapse(list)
}

/// Fallible [`collapse`]; the first error is returned unchanged.
pub fn try_collapse<T: TryCollapsible>(list: &mut Vec<T>) -> Result<CollapseReport, T::Error> {
    Collapser::new().try_collapse(list)
}

/// [`collapse`] driven by closures instead of the [`Collapsible`] trait.
pub fn collapse_by<T, K, F, M>(list: &mut Vec<T>, key: F, merge: M) -> CollapseReport
where
    K: Eq + Hash,
    F: FnMut(&T) -> K,
    M: FnMut(&mut T, T) -> bool,
{
    Collapser::new().collapse_by(list, key, merge)
}

/// [`try_collapse`] driven by closures.
pub fn try_collapse_by<T, K, E, F, M>(
    list: &mut Vec<T>,
    key: F,
    merge: M,
) -> Result<CollapseReport, E>
where
    K: Eq + Hash,
    F: FnMut(&T) -> Result<K, E>,
    M: FnMut(&mut T, T) -> Result<bool, E>,
{
    Collapser::new().try_collapse_by(list, key, merge)
}
