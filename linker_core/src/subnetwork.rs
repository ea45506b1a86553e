//! Exact minimum-cost assignment inside one subnetwork.
//!
//! Every head (track) takes one of its candidate particles or the "no
//! link" option, priced at the gate radius. No particle may be taken twice.
//! The total cost over all heads is minimized by depth-first branch and
//! bound over the fixed head order:
//!
//! - options of a head are visited cheapest first, "no link" last;
//! - a branch is cut when `partial + cost ≥ best`, or when adding the
//!   cheapest possible cost of every remaining head (`min_extra`) cannot
//!   beat `best` either;
//! - only strict improvements replace `best`, so among equal-cost
//!   assignments the first one reached wins.
//!
//! The search keeps its own `Vec` stack; cluster size never touches the
//! call stack.

use crate::association::{BondGraph, Link, Subnetwork};
use std::collections::HashMap;

/// Result of optimizing one subnetwork.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubnetworkSolution {
    /// Links to commit, in head order
    pub links: Vec<Link>,
    /// Track slots that took the "no link" option
    pub unlinked: Vec<usize>,
    /// Objective value of the chosen assignment
    pub cost: f64,
    /// Options evaluated during the search
    pub explored: u64,
}

/// One level of the search stack.
struct SearchFrame {
    /// Next option index to try for this head
    cursor: usize,
    /// Local tail held while the search is below this level
    claimed: Option<usize>,
    /// Cost of the heads above this level
    partial: f64,
}

/// Find the minimum-cost assignment for `net`.
///
/// Bond costs in `graph` must already be distances (see
/// [`BondGraph::resolve_trivial`]) and sorted ascending per track.
pub fn solve(net: &Subnetwork, graph: &BondGraph, no_link_cost: f64) -> SubnetworkSolution {
    let n = net.heads.len();
    if n == 0 {
        return SubnetworkSolution::default();
    }

    let local: HashMap<usize, usize> = net
        .tails
        .iter()
        .enumerate()
        .map(|(j, &p)| (p, j))
        .collect();

    // (local tail, cost); capped at the no-link price so it always sorts last
    let options: Vec<Vec<(usize, f64)>> = net
        .heads
        .iter()
        .map(|&h| {
            graph.forward[h]
                .iter()
                .filter_map(|b| local.get(&b.particle).map(|&j| (j, b.cost.min(no_link_cost))))
                .collect()
        })
        .collect();

    // min_extra[i]: lower bound on the cost of heads i..n
    let mut min_extra = vec![0.0; n + 1];
    for i in (0..n).rev() {
        let cheapest = options[i].first().map_or(no_link_cost, |&(_, c)| c);
        min_extra[i] = min_extra[i + 1] + cheapest;
    }

    let mut taken = vec![false; net.tails.len()];
    let mut choice: Vec<Option<usize>> = vec![None; n];
    let mut best_choice: Vec<Option<usize>> = vec![None; n];
    let mut best = f64::INFINITY;
    let mut explored = 0u64;

    let mut stack = vec![SearchFrame {
        cursor: 0,
        claimed: None,
        partial: 0.0,
    }];

    loop {
        let depth = match stack.len() {
            0 => break,
            len => len - 1,
        };
        let frame = &mut stack[depth];
        if let Some(tail) = frame.claimed.take() {
            taken[tail] = false;
        }

        let opts = &options[depth];
        let mut descend = None;
        while frame.cursor <= opts.len() {
            let k = frame.cursor;
            frame.cursor += 1;
            let (tail, cost) = match opts.get(k) {
                Some(&(tail, _)) if taken[tail] => continue,
                Some(&(tail, cost)) => (Some(tail), cost),
                None => (None, no_link_cost),
            };
            explored += 1;

            let sum = frame.partial + cost;
            if sum >= best || sum + min_extra[depth + 1] >= best {
                // later options at this level are never cheaper
                frame.cursor = opts.len() + 1;
                break;
            }

            choice[depth] = tail;
            if depth + 1 == n {
                best = sum;
                best_choice.copy_from_slice(&choice);
                continue;
            }
            if let Some(t) = tail {
                taken[t] = true;
                frame.claimed = Some(t);
            }
            descend = Some(sum);
            break;
        }

        match descend {
            Some(partial) => stack.push(SearchFrame {
                cursor: 0,
                claimed: None,
                partial,
            }),
            None => {
                stack.pop();
            }
        }
    }

    let mut links = Vec::new();
    let mut unlinked = Vec::new();
    for (&track, picked) in net.heads.iter().zip(&best_choice) {
        match picked {
            Some(j) => links.push(Link {
                track,
                particle: net.tails[*j],
            }),
            None => unlinked.push(track),
        }
    }

    SubnetworkSolution {
        links,
        unlinked,
        cost: best,
        explored,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
