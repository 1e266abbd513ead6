// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One-dimensional density clustering.
//!
//! With a minimum cluster size of one every value belongs to a cluster, and
//! two values share a cluster iff a chain of neighbours at most `eps` apart
//! links them. On a line this reduces to sorting and splitting wherever the
//! gap between consecutive values exceeds `eps`.

use strucnorm_core::angle::{median, normalize_angle};

/// Index clusters over `values`, ordered by ascending value.
///
/// Indices inside a cluster follow value order; equal values keep their
/// input order. Non-finite values are ignored.
pub fn cluster_indices(values: &[f64], eps: f64) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..values.len()).filter(|&i| values[i].is_finite()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut clusters: Vec<Vec<usize>> = Vec::new();
    let mut previous: Option<f64> = None;
    for i in order {
        let v = values[i];
        match (previous, clusters.last_mut()) {
            (Some(p), Some(current)) if v - p <= eps => current.push(i),
            _ => clusters.push(vec![i]),
        }
        previous = Some(v);
    }
    clusters
}

/// Clusters of values, ascending.
pub fn cluster_1d(values: &[f64], eps: f64) -> Vec<Vec<f64>> {
    cluster_indices(values, eps)
        .into_iter()
        .map(|c| c.into_iter().map(|i| values[i]).collect())
        .collect()
}

/// Median of every cluster, ascending.
pub fn cluster_medians(values: &[f64], eps: f64) -> Vec<f64> {
    cluster_1d(values, eps)
        .iter()
        .filter_map(|c| median(c))
        .collect()
}

/// A group of orientations and its representative.
#[derive(Debug, Clone, PartialEq)]
pub struct AngleCluster {
    /// Indices into the clustered slice.
    pub members: Vec<usize>,
    /// Median orientation, in `[0, 180)`.
    pub median: f64,
}

/// Clusters orientations in degrees, treating 0° and 180° as neighbours.
///
/// A cluster straddling the wrap is unwrapped below zero before taking its
/// median, so `{179.5, 0.5}` has median 0 rather than 90. Clusters are
/// returned by ascending median.
pub fn cluster_angles(angles: &[f64], eps: f64) -> Vec<AngleCluster> {
    let normalized: Vec<f64> = angles.iter().map(|&a| normalize_angle(a)).collect();
    let mut clusters = cluster_indices(&normalized, eps);

    let mut wrapped: Vec<usize> = Vec::new();
    if clusters.len() >= 2 {
        let first = normalized[clusters[0][0]];
        let last = clusters
            .last()
            .and_then(|c| c.last())
            .map_or(first, |&i| normalized[i]);
        if first + 180.0 - last <= eps {
            wrapped = clusters.pop().unwrap_or_default();
        }
    }

    let mut result: Vec<AngleCluster> = clusters
        .into_iter()
        .enumerate()
        .filter_map(|(n, mut members)| {
            let mut values: Vec<f64> = members.iter().map(|&i| normalized[i]).collect();
            if n == 0 && !wrapped.is_empty() {
                values.extend(wrapped.iter().map(|&i| normalized[i] - 180.0));
                let mut joined = wrapped.clone();
                joined.append(&mut members);
                members = joined;
            }
            let median = normalize_angle(median(&values)?);
            Some(AngleCluster { members, median })
        })
        .collect();

    result.sort_by(|a, b| a.median.total_cmp(&b.median));
    result
}
