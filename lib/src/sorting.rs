//! Stable sorting by computed keys.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use crate::natural::natural_case_compare;
use crate::types::SortMode;

/// A sort key: either a single value or an ordered tuple of keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey<S> {
    Scalar(S),
    Tuple(Vec<SortKey<S>>),
}

impl<S> SortKey<S> {
    /// Builds a flat tuple key out of scalars.
    pub fn tuple(parts: impl IntoIterator<Item = S>) -> Self {
        SortKey::Tuple(parts.into_iter().map(SortKey::Scalar).collect())
    }
}

impl<S> From<S> for SortKey<S> {
    fn from(value: S) -> Self {
        SortKey::Scalar(value)
    }
}

/// Compares two keys, walking tuples element-wise with `cmp` and ordering a
/// matching prefix by length. A scalar against a tuple compares like a
/// one-element tuple.
pub fn compare_keys<S, C>(a: &SortKey<S>, b: &SortKey<S>, cmp: &mut C) -> Ordering
where
    C: FnMut(&S, &S) -> Ordering,
{
    match (a, b) {
        (SortKey::Scalar(x), SortKey::Scalar(y)) => cmp(x, y),
        (SortKey::Tuple(xs), SortKey::Tuple(ys)) => compare_slices(xs, ys, cmp),
        (SortKey::Scalar(_), SortKey::Tuple(ys)) => compare_slices(std::slice::from_ref(a), ys, cmp),
        (SortKey::Tuple(xs), SortKey::Scalar(_)) => compare_slices(xs, std::slice::from_ref(b), cmp),
    }
}

fn compare_slices<S, C>(xs: &[SortKey<S>], ys: &[SortKey<S>], cmp: &mut C) -> Ordering
where
    C: FnMut(&S, &S) -> Ordering,
{
    for (x, y) in xs.iter().zip(ys) {
        match compare_keys(x, y, cmp) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    xs.len().cmp(&ys.len())
}

/// Sorts `items` by `key`, using the natural ordering of the key scalars.
pub fn sorted<T, S, K>(items: impl IntoIterator<Item = T>, key: K) -> Vec<T>
where
    S: Ord,
    K: FnMut(&T) -> SortKey<S>,
{
    sorted_by(items, key, |a: &S, b: &S| a.cmp(b))
}

/// Sorts `items` by `key`, comparing key scalars with `cmp`.
///
/// Each key is computed exactly once. Items whose keys compare equal keep
/// their original relative order.
pub fn sorted_by<T, S, K, C>(items: impl IntoIterator<Item = T>, mut key: K, mut cmp: C) -> Vec<T>
where
    K: FnMut(&T) -> SortKey<S>,
    C: FnMut(&S, &S) -> Ordering,
{
    let mut keyed: Vec<(usize, SortKey<S>, T)> = items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| (idx, key(&item), item))
        .collect();
    keyed.sort_by(|(ia, ka, _), (ib, kb, _)| compare_keys(ka, kb, &mut cmp).then(ia.cmp(ib)));
    keyed.into_iter().map(|(_, _, item)| item).collect()
}

fn path_key(path: &Path, mode: SortMode) -> std::io::Result<SortKey<String>> {
    let base = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = path
        .parent()
        .map(|dir| dir.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(match mode {
        SortMode::Filename | SortMode::None => SortKey::tuple([base, dir]),
        SortMode::Path => SortKey::tuple([dir, base]),
        SortMode::Size => {
            let size = std::fs::metadata(path)?.len();
            SortKey::tuple([size.to_string(), base, dir])
        }
    })
}

/// Orders upload paths by `mode`, comparing key parts in case-insensitive
/// natural order. [`SortMode::None`] keeps the given order.
///
/// Size keys read file metadata, so missing files are an error there.
pub fn sort_paths(paths: Vec<PathBuf>, mode: SortMode) -> std::io::Result<Vec<PathBuf>> {
    if mode == SortMode::None {
        return Ok(paths);
    }
    let mut keyed = paths
        .into_iter()
        .enumerate()
        .map(|(idx, path)| path_key(&path, mode).map(|key| (idx, key, path)))
        .collect::<std::io::Result<Vec<_>>>()?;
    let mut cmp = |a: &String, b: &String| natural_case_compare(a, b);
    keyed.sort_by(|(ia, ka, _), (ib, kb, _)| compare_keys(ka, kb, &mut cmp).then(ia.cmp(ib)));
    Ok(keyed.into_iter().map(|(_, _, path)| path).collect())
}
