//! Sparse site relations in compressed-row form.
//!
//! All relations are indexed by site and store only their nonzero entries. Rows are sorted by
//! column, which keeps membership tests logarithmic and makes iteration order deterministic.

/// Symmetric pairwise distances, truncated at a maximum distance, diagonal excluded.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    num_sites: usize,
    offsets: Vec<usize>,
    columns: Vec<usize>,
    distances: Vec<f64>,
}

impl DistanceMatrix {
    /// Builds the matrix from `(i, j, d)` entries with `i < j`; the mirrored entries are added.
    pub fn from_upper_entries(num_sites: usize, entries: Vec<(usize, usize, f64)>) -> Self {
        let mut full = Vec::with_capacity(entries.len() * 2);
        for (i, j, d) in entries {
            full.push((i, j, d));
            full.push((j, i, d));
        }
        full.sort_unstable_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        full.dedup_by(|next, kept| next.0 == kept.0 && next.1 == kept.1);

        let mut offsets = vec![0; num_sites + 1];
        for &(i, _, _) in &full {
            offsets[i + 1] += 1;
        }
        for i in 0..num_sites {
            offsets[i + 1] += offsets[i];
        }
        let (columns, distances) = full.into_iter().map(|(_, j, d)| (j, d)).unzip();

        Self {
            num_sites,
            offsets,
            columns,
            distances,
        }
    }

    pub fn empty(num_sites: usize) -> Self {
        Self::from_upper_entries(num_sites, Vec::new())
    }

    pub fn num_sites(&self) -> usize {
        self.num_sites
    }

    /// Number of stored entries, counting both `(i, j)` and `(j, i)`.
    pub fn nnz(&self) -> usize {
        self.columns.len()
    }

    pub fn row(&self, site: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.offsets[site]..self.offsets[site + 1];
        self.columns[range.clone()]
            .iter()
            .copied()
            .zip(self.distances[range].iter().copied())
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        let range = self.offsets[i]..self.offsets[i + 1];
        self.columns[range.clone()]
            .binary_search(&j)
            .ok()
            .map(|k| self.distances[range.start + k])
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.num_sites).flat_map(move |i| self.row(i).map(move |(j, d)| (i, j, d)))
    }

    pub fn distances(&self) -> &[f64] {
        &self.distances
    }
}

/// Boolean N x N relation between sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairRelation {
    num_sites: usize,
    offsets: Vec<usize>,
    columns: Vec<usize>,
}

impl PairRelation {
    pub fn from_pairs<I>(num_sites: usize, pairs: I) -> Self
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let mut pairs: Vec<(usize, usize)> = pairs.into_iter().collect();
        pairs.sort_unstable();
        pairs.dedup();

        let mut offsets = vec![0; num_sites + 1];
        for &(i, _) in &pairs {
            offsets[i + 1] += 1;
        }
        for i in 0..num_sites {
            offsets[i + 1] += offsets[i];
        }
        let columns = pairs.into_iter().map(|(_, j)| j).collect();

        Self {
            num_sites,
            offsets,
            columns,
        }
    }

    pub fn num_sites(&self) -> usize {
        self.num_sites
    }

    pub fn nnz(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn neighbors(&self, site: usize) -> &[usize] {
        &self.columns[self.offsets[site]..self.offsets[site + 1]]
    }

    pub fn degree(&self, site: usize) -> usize {
        self.offsets[site + 1] - self.offsets[site]
    }

    #[inline]
    pub fn contains(&self, i: usize, j: usize) -> bool {
        self.neighbors(i).binary_search(&j).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.num_sites).flat_map(move |i| self.neighbors(i).iter().map(move |&j| (i, j)))
    }

    pub fn is_symmetric(&self) -> bool {
        self.iter().all(|(i, j)| self.contains(j, i))
    }

    /// Whether any `(i, j)` is present in both relations. Relations over different site
    /// counts never intersect.
    pub fn intersects(&self, other: &PairRelation) -> bool {
        if self.num_sites != other.num_sites {
            return false;
        }
        self.iter().any(|(i, j)| other.contains(i, j))
    }
}

/// Integer-weighted N x N x N relation between site triples, grouped by first vertex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripletRelation {
    num_sites: usize,
    offsets: Vec<usize>,
    tails: Vec<(usize, usize)>,
    weights: Vec<u32>,
}

impl TripletRelation {
    /// Builds the relation from `([i, j, k], weight)` entries, summing repeated triples.
    pub fn from_entries(num_sites: usize, mut entries: Vec<([usize; 3], u32)>) -> Self {
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let mut merged: Vec<([usize; 3], u32)> = Vec::with_capacity(entries.len());
        for (triple, weight) in entries {
            match merged.last_mut() {
                Some((last, total)) if *last == triple => *total += weight,
                _ => merged.push((triple, weight)),
            }
        }
        merged.retain(|&(_, weight)| weight > 0);

        let mut offsets = vec![0; num_sites + 1];
        for &([i, _, _], _) in &merged {
            offsets[i + 1] += 1;
        }
        for i in 0..num_sites {
            offsets[i + 1] += offsets[i];
        }
        let (tails, weights) = merged
            .into_iter()
            .map(|([_, j, k], weight)| ((j, k), weight))
            .unzip();

        Self {
            num_sites,
            offsets,
            tails,
            weights,
        }
    }

    pub fn num_sites(&self) -> usize {
        self.num_sites
    }

    pub fn nnz(&self) -> usize {
        self.tails.len()
    }

    /// Entries `(j, k, weight)` whose first vertex is `site`.
    #[inline]
    pub fn row(&self, site: usize) -> impl Iterator<Item = (usize, usize, u32)> + '_ {
        let range = self.offsets[site]..self.offsets[site + 1];
        self.tails[range.clone()]
            .iter()
            .zip(self.weights[range].iter())
            .map(|(&(j, k), &weight)| (j, k, weight))
    }

    pub fn iter(&self) -> impl Iterator<Item = ([usize; 3], u32)> + '_ {
        (0..self.num_sites).flat_map(move |i| self.row(i).map(move |(j, k, w)| ([i, j, k], w)))
    }

    pub fn weight(&self, i: usize, j: usize, k: usize) -> u32 {
        let range = self.offsets[i]..self.offsets[i + 1];
        self.tails[range.clone()]
            .binary_search(&(j, k))
            .map_or(0, |position| self.weights[range.start + position])
    }

    pub fn total_weight(&self) -> u64 {
        self.weights.iter().map(|&w| u64::from(w)).sum()
    }

    pub fn row_weight(&self, site: usize) -> u64 {
        self.row(site).map(|(_, _, w)| u64::from(w)).sum()
    }
}
