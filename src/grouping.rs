//! Neighbour grouping of raw cascade hits.
//!
//! A sliding-window cascade fires many times around a real face. Hits that
//! are close in position and size are clustered, clusters with too few
//! members are dropped and each surviving cluster is averaged into a single
//! box. Weak clusters nested inside stronger ones are suppressed.

use crate::bbox::BoundingBox;

/// Relative tolerance used to decide that two hits describe the same object
pub const GROUP_EPS: f32 = 0.2;

fn is_similar(a: &BoundingBox, b: &BoundingBox, eps: f32) -> bool {
    let delta = eps * (a.width.min(b.width) + a.height.min(b.height)) as f32 * 0.5;
    let close = |p: u32, q: u32| (p as f32 - q as f32).abs() <= delta;

    close(a.x, b.x) && close(a.y, b.y) && close(a.right(), b.right()) && close(a.bottom(), b.bottom())
}

fn find_root(parents: &mut [usize], mut i: usize) -> usize {
    while parents[i] != i {
        parents[i] = parents[parents[i]];
        i = parents[i];
    }
    i
}

/// Labels every hit with a cluster id, ids assigned in order of first appearance
fn partition(hits: &[BoundingBox], eps: f32) -> (Vec<usize>, usize) {
    let mut parents: Vec<usize> = (0..hits.len()).collect();

    for i in 0..hits.len() {
        for j in (i + 1)..hits.len() {
            if is_similar(&hits[i], &hits[j], eps) {
                let ri = find_root(&mut parents, i);
                let rj = find_root(&mut parents, j);
                if ri != rj {
                    parents[rj.max(ri)] = rj.min(ri);
                }
            }
        }
    }

    let mut label_of_root = vec![usize::MAX; hits.len()];
    let mut labels = Vec::with_capacity(hits.len());
    let mut next_label = 0;
    for i in 0..hits.len() {
        let root = find_root(&mut parents, i);
        if label_of_root[root] == usize::MAX {
            label_of_root[root] = next_label;
            next_label += 1;
        }
        labels.push(label_of_root[root]);
    }
    (labels, next_label)
}

/// Groups raw hits into face boxes
///
/// # Arguments
/// * `hits` - Raw window hits in scan order
/// * `min_neighbors` - A cluster must have more than this many members to survive.
///   Zero disables grouping and returns the hits unchanged.
/// * `eps` - Similarity tolerance relative to box size
pub fn group_rectangles(hits: &[BoundingBox], min_neighbors: u32, eps: f32) -> Vec<BoundingBox> {
    if min_neighbors == 0 || hits.is_empty() {
        return hits.to_vec();
    }

    let (labels, cluster_count) = partition(hits, eps);

    let mut sums = vec![[0u64; 4]; cluster_count];
    let mut counts = vec![0u32; cluster_count];
    for (hit, &label) in hits.iter().zip(labels.iter()) {
        let sum = &mut sums[label];
        sum[0] += hit.x as u64;
        sum[1] += hit.y as u64;
        sum[2] += hit.width as u64;
        sum[3] += hit.height as u64;
        counts[label] += 1;
    }

    let averaged: Vec<BoundingBox> = sums
        .iter()
        .zip(counts.iter())
        .map(|(sum, &count)| {
            let mean = |v: u64| (v as f64 / count as f64).round() as u32;
            BoundingBox::new(mean(sum[0]), mean(sum[1]), mean(sum[2]), mean(sum[3]))
        })
        .collect();

    let mut grouped = Vec::new();
    for (i, r1) in averaged.iter().enumerate() {
        let n1 = counts[i];
        if n1 <= min_neighbors {
            continue;
        }

        let nested = averaged.iter().enumerate().any(|(j, r2)| {
            let n2 = counts[j];
            if j == i || n2 <= min_neighbors {
                return false;
            }
            let dx = (r2.width as f32 * eps) as i64;
            let dy = (r2.height as f32 * eps) as i64;
            let inside = r1.x as i64 >= r2.x as i64 - dx
                && r1.y as i64 >= r2.y as i64 - dy
                && r1.right() as i64 <= r2.right() as i64 + dx
                && r1.bottom() as i64 <= r2.bottom() as i64 + dy;
            inside && (n2 > n1.max(3) || n1 < 3)
        });

        if !nested {
            grouped.push(*r1);
        }
    }
    grouped
}
