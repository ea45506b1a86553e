//! Data association: the per-frame bond graph, trivial 1-to-1 resolution
//! and extraction of ambiguous subnetworks.
//!
//! # Algorithm pipeline
//! 1. [`crate::gating`] fills forward (track → particle) bond lists; the
//!    backward (particle → track) lists are derived from them.
//! 2. Bonds that are the only candidate on both ends are committed
//!    directly ([`BondGraph::resolve_trivial`]).
//! 3. Remaining bonds are split into maximal connected subnetworks by
//!    alternating expansion ([`BondGraph::extract_subnetworks`]). They are
//!    disjoint, so [`crate::subnetwork`] can solve them in parallel.
//!
//! Nothing in here outlives one frame transition.

// ---------------------------------------------------------------------------
// Bond graph
// ---------------------------------------------------------------------------

/// A candidate link between an active track slot and a particle slot of
/// the current frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bond {
    pub track: usize,
    pub particle: usize,
    /// Squared distance until [`BondGraph::resolve_trivial`] runs,
    /// Euclidean distance afterwards
    pub cost: f64,
}

/// A committed track → particle link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Link {
    pub track: usize,
    pub particle: usize,
}

/// Sparse bipartite graph between track slots and particle slots.
#[derive(Clone, Debug, Default)]
pub struct BondGraph {
    /// Per track slot, bonds sorted ascending by cost
    pub forward: Vec<Vec<Bond>>,
    /// Per particle slot, the track slots bonding to it (ascending)
    pub backward: Vec<Vec<usize>>,
}

/// One maximal connected set of competing tracks and particles.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Subnetwork {
    /// Track slots in discovery order; the optimizer searches in this order
    pub heads: Vec<usize>,
    /// Particle slots in discovery order
    pub tails: Vec<usize>,
}

impl Subnetwork {
    /// Number of nodes (tracks + particles).
    pub fn size(&self) -> usize {
        self.heads.len() + self.tails.len()
    }
}

impl BondGraph {
    /// Derive the backward lists from per-track forward lists.
    pub fn from_forward(forward: Vec<Vec<Bond>>, n_particles: usize) -> Self {
        let mut backward = vec![Vec::new(); n_particles];
        for bonds in &forward {
            for b in bonds {
                backward[b.particle].push(b.track);
            }
        }
        Self { forward, backward }
    }

    pub fn n_tracks(&self) -> usize {
        self.forward.len()
    }

    pub fn n_particles(&self) -> usize {
        self.backward.len()
    }

    /// Total number of live bonds.
    pub fn bond_count(&self) -> usize {
        self.forward.iter().map(Vec::len).sum()
    }

    /// True if no bonds remain.
    pub fn is_empty(&self) -> bool {
        self.forward.iter().all(Vec::is_empty)
    }

    /// Commit every bond that is the only candidate of its track and of its
    /// particle, consuming both ends. Surviving bond costs are then turned
    /// from squared distance into distance.
    ///
    /// Returns the committed links in track-slot order.
    pub fn resolve_trivial(&mut self) -> Vec<Link> {
        let mut links = Vec::new();
        for track in 0..self.forward.len() {
            let [bond] = self.forward[track].as_slice() else {
                continue;
            };
            let particle = bond.particle;
            if self.backward[particle].len() != 1 {
                continue;
            }
            links.push(Link { track, particle });
            self.forward[track].clear();
            self.backward[particle].clear();
        }

        for bonds in &mut self.forward {
            for b in bonds.iter_mut() {
                b.cost = b.cost.sqrt();
            }
        }
        links
    }

    /// Split the remaining bonds into disjoint subnetworks.
    ///
    /// Starting from each unvisited track with at least one bond, heads are
    /// expanded through their forward bonds into tails and tails through
    /// their backward bonds into further heads until neither list grows.
    pub fn extract_subnetworks(&self) -> Vec<Subnetwork> {
        let mut head_seen = vec![false; self.n_tracks()];
        let mut tail_seen = vec![false; self.n_particles()];
        let mut subnetworks = Vec::new();

        for start in 0..self.n_tracks() {
            if head_seen[start] || self.forward[start].is_empty() {
                continue;
            }
            head_seen[start] = true;
            let mut net = Subnetwork {
                heads: vec![start],
                tails: Vec::new(),
            };
            let (mut next_head, mut next_tail) = (0, 0);

            while next_head < net.heads.len() || next_tail < net.tails.len() {
                while next_head < net.heads.len() {
                    for b in &self.forward[net.heads[next_head]] {
                        if !tail_seen[b.particle] {
                            tail_seen[b.particle] = true;
                            net.tails.push(b.particle);
                        }
                    }
                    next_head += 1;
                }
                while next_tail < net.tails.len() {
                    for &track in &self.backward[net.tails[next_tail]] {
                        if !head_seen[track] {
                            head_seen[track] = true;
                            net.heads.push(track);
                        }
                    }
                    next_tail += 1;
                }
            }
            subnetworks.push(net);
        }
        subnetworks
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(usize, usize, f64)], n_tracks: usize, n_particles: usize) -> BondGraph {
        let mut forward = vec![Vec::new(); n_tracks];
        for &(track, particle, cost) in edges {
            forward[track].push(Bond {
                track,
                particle,
                cost,
            });
        }
        for bonds in &mut forward {
            bonds.sort_by(|a: &Bond, b: &Bond| a.cost.total_cmp(&b.cost));
        }
        BondGraph::from_forward(forward, n_particles)
    }

    #[test]
    fn one_to_one_bonds_are_trivial() {
        let mut g = graph(&[(0, 1, 4.0), (1, 0, 9.0)], 2, 2);
        let links = g.resolve_trivial();
        assert_eq!(
            links,
            vec![
                Link {
                    track: 0,
                    particle: 1
                },
                Link {
                    track: 1,
                    particle: 0
                }
            ]
        );
        assert!(g.is_empty());
        assert!(g.extract_subnetworks().is_empty());
    }

    #[test]
    fn shared_particle_is_not_trivial() {
        // Track 0 and 1 both reach particle 0; track 2 is alone with particle 1.
        let mut g = graph(&[(0, 0, 49.0), (1, 0, 49.0), (2, 1, 1.0)], 3, 2);
        let links = g.resolve_trivial();
        assert_eq!(
            links,
            vec![Link {
                track: 2,
                particle: 1
            }]
        );
        assert_eq!(g.bond_count(), 2);
        // costs now hold distances
        assert_eq!(g.forward[0][0].cost, 7.0);
    }

    #[test]
    fn track_with_two_options_is_not_trivial() {
        let mut g = graph(&[(0, 0, 1.0), (0, 1, 4.0)], 1, 2);
        assert!(g.resolve_trivial().is_empty());
        assert_eq!(g.forward[0][1].cost, 2.0);
    }

    #[test]
    fn alternating_chain_forms_one_subnetwork() {
        // t0-p0-t1-p1-t2 chain, plus an unrelated t3-p2/p3 fan.
        let g = graph(
            &[
                (0, 0, 1.0),
                (1, 0, 1.0),
                (1, 1, 2.0),
                (2, 1, 1.0),
                (3, 2, 1.0),
                (3, 3, 2.0),
            ],
            4,
            4,
        );
        let nets = g.extract_subnetworks();
        assert_eq!(nets.len(), 2);
        assert_eq!(nets[0].heads, vec![0, 1, 2]);
        assert_eq!(nets[0].tails, vec![0, 1]);
        assert_eq!(nets[0].size(), 5);
        assert_eq!(nets[1].heads, vec![3]);
        assert_eq!(nets[1].tails, vec![2, 3]);
    }

    #[test]
    fn subnetworks_are_disjoint() {
        let g = graph(
            &[(0, 0, 1.0), (0, 1, 1.0), (1, 1, 1.0), (2, 2, 1.0), (3, 2, 1.0)],
            4,
            3,
        );
        let nets = g.extract_subnetworks();
        let mut heads: Vec<usize> = nets.iter().flat_map(|n| n.heads.clone()).collect();
        let mut tails: Vec<usize> = nets.iter().flat_map(|n| n.tails.clone()).collect();
        heads.sort_unstable();
        tails.sort_unstable();
        assert_eq!(heads, vec![0, 1, 2, 3]);
        assert_eq!(tails, vec![0, 1, 2]);
    }
}
