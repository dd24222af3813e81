use crate::model::GenericElement;

/// Computes a reverse Cuthill-McKee ordering of a DOF adjacency graph
///
/// The adjacency lists every neighbor of each DOF (DOFs touched by the same
/// element are neighbors). Works on disconnected graphs: each component is
/// rooted at its lowest-degree unvisited DOF. Returns the permutation with
/// `perm[original] = reordered`; the result is always a bijection on `[0, n)`.
pub fn rcm_ordering(adjacency: &[Vec<usize>]) -> Vec<usize> {
    let n = adjacency.len();
    let degree: Vec<usize> = adjacency.iter().map(|a| a.len()).collect();
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n); // order[k] = original index visited k-th
    let mut queue = std::collections::VecDeque::new();
    let mut scratch = Vec::new();
    while order.len() < n {
        // root: lowest-degree unvisited DOF of the next component
        let root = (0..n)
            .filter(|&i| !visited[i])
            .min_by_key(|&i| degree[i])
            .unwrap();
        visited[root] = true;
        queue.push_back(root);
        while let Some(i) = queue.pop_front() {
            order.push(i);
            scratch.clear();
            for &j in &adjacency[i] {
                if !visited[j] {
                    visited[j] = true;
                    scratch.push(j);
                }
            }
            scratch.sort_by_key(|&j| degree[j]);
            for &j in &scratch {
                queue.push_back(j);
            }
        }
    }
    order.reverse();
    let mut perm = vec![0; n];
    for (new, &original) in order.iter().enumerate() {
        perm[original] = new;
    }
    perm
}

/// Computes the (lower, upper) semi-bandwidths from the element DOF encodings
///
/// Scans every pair of DOFs coupled by an active element and takes the maximum
/// downward/upward offset. An empty model yields (0, 0).
pub fn semi_bandwidths(elements: &[GenericElement]) -> (usize, usize) {
    let mut low = 0;
    let mut up = 0;
    for element in elements.iter().filter(|e| e.active) {
        for &i in &element.local_to_global {
            for &j in &element.local_to_global {
                if i > j {
                    low = usize::max(low, i - j);
                } else {
                    up = usize::max(up, j - i);
                }
            }
        }
    }
    (low, up)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{rcm_ordering, semi_bandwidths};
    use crate::model::{GenericElement, Node, SpringElement};

    fn bandwidth_of(adjacency: &[Vec<usize>], perm: Option<&[usize]>) -> usize {
        let mut band = 0;
        for (i, neighbors) in adjacency.iter().enumerate() {
            for &j in neighbors {
                let (a, b) = match perm {
                    Some(p) => (p[i], p[j]),
                    None => (i, j),
                };
                band = usize::max(band, a.max(b) - a.min(b));
            }
        }
        band
    }

    #[test]
    fn rcm_ordering_is_a_bijection() {
        // star graph plus an isolated pair (disconnected)
        let adjacency = vec![
            vec![1, 2, 3],
            vec![0],
            vec![0],
            vec![0],
            vec![5],
            vec![4],
        ];
        let perm = rcm_ordering(&adjacency);
        let mut sorted = perm.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, &[0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn rcm_ordering_reduces_bandwidth() {
        // path graph 0-4-1-5-2-6-3 numbered to give a large natural bandwidth
        let adjacency = vec![
            vec![4],
            vec![4, 5],
            vec![5, 6],
            vec![6],
            vec![0, 1],
            vec![1, 2],
            vec![2, 3],
        ];
        let natural = bandwidth_of(&adjacency, None);
        let perm = rcm_ordering(&adjacency);
        let reordered = bandwidth_of(&adjacency, Some(&perm));
        assert!(reordered <= natural);
        assert_eq!(reordered, 1); // a path graph reorders to tridiagonal
    }

    // small deterministic generator for the random-graph checks
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self, modulo: usize) -> usize {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((self.0 >> 33) as usize) % modulo
        }
    }

    #[test]
    fn rcm_ordering_handles_random_sparse_graphs() {
        let mut rng = Lcg(123456789);
        let samples = 50;
        let mut reduced = 0;
        for _ in 0..samples {
            let n = 20 + rng.next(40);
            let mut adjacency = vec![Vec::new(); n];
            // sparse symmetric graph with about 2n distinct edges
            for _ in 0..(2 * n) {
                let i = rng.next(n);
                let j = rng.next(n);
                if i != j && !adjacency[i].contains(&j) {
                    adjacency[i].push(j);
                    adjacency[j].push(i);
                }
            }
            let perm = rcm_ordering(&adjacency);
            let mut sorted = perm.clone();
            sorted.sort_unstable();
            let identity: Vec<usize> = (0..n).collect();
            assert_eq!(sorted, identity); // bijection on every sample
            let natural = bandwidth_of(&adjacency, None);
            let reordered = bandwidth_of(&adjacency, Some(&perm));
            if reordered <= natural {
                reduced += 1;
            }
        }
        // the reordering must not worsen the bandwidth on at least 90% of samples
        assert!(reduced * 10 >= samples * 9);
    }

    #[test]
    fn semi_bandwidths_works() {
        let mut nodes = vec![Node::new(0, 1), Node::new(1, 1), Node::new(2, 1)];
        for (k, node) in nodes.iter_mut().enumerate() {
            node.number(k);
        }
        let mut elements = vec![
            GenericElement::new(Box::new(SpringElement::new([0, 2], 1.0))),
            GenericElement::new(Box::new(SpringElement::new([1, 2], 1.0))),
        ];
        for element in &mut elements {
            element.compute_local_to_global(&nodes).unwrap();
        }
        assert_eq!(semi_bandwidths(&elements), (2, 2));
        elements[0].active = false;
        assert_eq!(semi_bandwidths(&elements), (1, 1));
    }
}
