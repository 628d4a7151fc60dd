//! Dependent counting and rank ordering.
//!
//! Projects are ranked by a fixed lexicographic key and then assembled with a
//! greedy ready-set walk: repeatedly take the best-ranked project whose gating
//! dependencies are already placed. A pass that places nothing means a cycle;
//! the remaining projects are then flushed in rank order.

use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};

use crate::graph::{PortfolioGraph, ProjectId};
use crate::groups::ResourceRole;
use crate::models::{BlockCounts, RowNumber};
use crate::{log_checks, log_debug, log_warning};

/// Count, for every node, how many projects list it as a dependency.
///
/// Edges into a pool count against the pool parent. Edges that stay inside a
/// single pool are not counted; they only matter to the pool's own packing.
pub fn compute_dependent_counts(graph: &PortfolioGraph) -> Vec<BlockCounts> {
    let mut counts = vec![BlockCounts::default(); graph.len()];
    for (id, edges) in graph.deps.iter().enumerate() {
        let source = graph.node(id as ProjectId).owner;
        for &(target, kind) in edges {
            let target = graph.node(target).owner;
            if target != source {
                counts[target as usize].add(kind);
            }
        }
    }
    counts
}

/// Dependent counts keyed by row number.
pub fn dependents_by_row(
    graph: &PortfolioGraph,
    counts: &[BlockCounts],
) -> HashMap<RowNumber, BlockCounts> {
    counts
        .iter()
        .enumerate()
        .map(|(id, c)| (graph.row(id as ProjectId), *c))
        .collect()
}

/// Lexicographic rank of a project. Lower sorts first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankKey {
    pub in_progress: bool,
    pub tier: u8,
    pub counts: BlockCounts,
    pub duration_months: u32,
    pub row_number: RowNumber,
}

impl Ord for RankKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .in_progress
            .cmp(&self.in_progress)
            .then(self.tier.cmp(&other.tier))
            .then(other.counts.total().cmp(&self.counts.total()))
            .then(other.counts.dev_blocker.cmp(&self.counts.dev_blocker))
            .then(other.counts.rel_blocker.cmp(&self.counts.rel_blocker))
            .then(other.counts.plain.cmp(&self.counts.plain))
            .then(other.duration_months.cmp(&self.duration_months))
            .then(self.row_number.cmp(&other.row_number))
    }
}

impl PartialOrd for RankKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Duration used for ranking. A pool parent stands for the whole pool, so its
/// budget counts when that is longer than its own share.
fn rank_duration(graph: &PortfolioGraph, id: ProjectId, capacity_pct: f64) -> u32 {
    let node = graph.node(id);
    let own = node.estimate.placement_months();
    match &node.role {
        ResourceRole::PoolParent { pool, .. } => own.max(pool.budget_months(capacity_pct)),
        _ => own,
    }
}

pub fn rank_key(
    graph: &PortfolioGraph,
    counts: &[BlockCounts],
    id: ProjectId,
    capacity_pct: f64,
) -> RankKey {
    let node = graph.node(id);
    RankKey {
        in_progress: node.in_progress,
        tier: node.tier,
        counts: counts[id as usize],
        duration_months: rank_duration(graph, id, capacity_pct),
        row_number: graph.row(id),
    }
}

/// Outcome of the ready-set walk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankOrder {
    /// Every node once; pool children directly after their parent.
    pub order: Vec<ProjectId>,
    /// Nodes placed by the escape hatch with unmet dependencies.
    pub flushed: Vec<ProjectId>,
    /// Internal order of every pool, keyed by parent.
    pub pools: FxHashMap<ProjectId, PoolOrder>,
}

/// Placement order inside one pool (parent included).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolOrder {
    pub order: Vec<ProjectId>,
    pub flushed: Vec<ProjectId>,
    /// Member -> members it depends on.
    pub internal: FxHashMap<ProjectId, Vec<ProjectId>>,
}

/// Greedy ready-set walk over `candidates` (already in rank order).
///
/// Returns the placement order and the ids that had to be flushed.
fn ready_set_walk<F>(candidates: &[ProjectId], deps_of: F) -> (Vec<ProjectId>, Vec<ProjectId>)
where
    F: Fn(ProjectId) -> Vec<ProjectId>,
{
    let position: FxHashMap<ProjectId, usize> = candidates
        .iter()
        .enumerate()
        .map(|(pos, &id)| (id, pos))
        .collect();
    let gating: Vec<Vec<usize>> = candidates
        .iter()
        .map(|&id| {
            deps_of(id)
                .into_iter()
                .filter_map(|d| position.get(&d).copied())
                .collect()
        })
        .collect();

    let mut placed = vec![false; candidates.len()];
    let mut order = Vec::with_capacity(candidates.len());
    let mut flushed = Vec::new();

    while order.len() < candidates.len() {
        let ready = (0..candidates.len())
            .find(|&pos| !placed[pos] && gating[pos].iter().all(|&d| placed[d]));
        match ready {
            Some(pos) => {
                placed[pos] = true;
                order.push(candidates[pos]);
            }
            None => {
                for pos in 0..candidates.len() {
                    if !placed[pos] {
                        placed[pos] = true;
                        order.push(candidates[pos]);
                        flushed.push(candidates[pos]);
                    }
                }
            }
        }
    }

    (order, flushed)
}

/// Number of pool members that depend on each member.
fn pool_sibling_counts(
    internal: &FxHashMap<ProjectId, Vec<ProjectId>>,
) -> FxHashMap<ProjectId, u32> {
    let mut counts: FxHashMap<ProjectId, u32> = internal.keys().map(|&m| (m, 0)).collect();
    for targets in internal.values() {
        for t in targets {
            *counts.entry(*t).or_default() += 1;
        }
    }
    counts
}

/// Duration of a member's own work inside its pool. A parent without its own
/// sizing contributes nothing; other members take at least a month.
pub fn pool_member_months(graph: &PortfolioGraph, id: ProjectId) -> u32 {
    let node = graph.node(id);
    if node.role.is_pool_parent() {
        node.estimate.months
    } else {
        node.estimate.placement_months()
    }
}

/// Order the members of a pool (parent included) for internal placement.
///
/// Rank: siblings blocked (desc), own duration (desc), row number (asc).
pub fn pool_member_order(graph: &PortfolioGraph, parent: ProjectId) -> PoolOrder {
    let internal = graph.intra_pool_deps(parent);
    let blocked = pool_sibling_counts(&internal);

    let mut members = graph.pool_members(parent);
    members.sort_by(|&a, &b| {
        let blocked_a = blocked.get(&a).copied().unwrap_or(0);
        let blocked_b = blocked.get(&b).copied().unwrap_or(0);
        blocked_b
            .cmp(&blocked_a)
            .then(pool_member_months(graph, b).cmp(&pool_member_months(graph, a)))
            .then(graph.row(a).cmp(&graph.row(b)))
    });

    let (order, flushed) = ready_set_walk(&members, |id| {
        internal.get(&id).cloned().unwrap_or_default()
    });
    PoolOrder {
        order,
        flushed,
        internal,
    }
}

/// Total ordering of the portfolio for packing.
///
/// Every project follows its gating dependencies unless it had to be flushed
/// out of a cycle. Pool children follow their parent in pool order.
pub fn order_by_rank(
    graph: &PortfolioGraph,
    counts: &[BlockCounts],
    capacity_pct: f64,
    verbosity: u8,
) -> RankOrder {
    let mut keyed: Vec<(RankKey, ProjectId)> = graph
        .outer_ids()
        .into_iter()
        .map(|id| (rank_key(graph, counts, id, capacity_pct), id))
        .collect();
    keyed.sort();
    for (key, id) in &keyed {
        log_debug!(verbosity, "  Rank row {}: {:?}", graph.row(*id), key);
    }
    let ranked: Vec<ProjectId> = keyed.into_iter().map(|(_, id)| id).collect();

    let (outer, mut flushed) = ready_set_walk(&ranked, |id| graph.gating_deps(id));
    if !flushed.is_empty() {
        let rows: Vec<RowNumber> = flushed.iter().map(|&id| graph.row(id)).collect();
        log_warning!(
            verbosity,
            "dependency cycle: flushing rows {:?} in rank order",
            rows
        );
    }

    let mut order = Vec::with_capacity(graph.len());
    let mut pools = FxHashMap::default();
    for id in outer {
        order.push(id);
        if graph.node(id).role.is_pool_parent() {
            let pool = pool_member_order(graph, id);
            log_checks!(
                verbosity,
                "  Pool row {} member order: {:?}",
                graph.row(id),
                pool.order.iter().map(|&m| graph.row(m)).collect::<Vec<_>>()
            );
            order.extend(pool.order.iter().copied().filter(|&m| m != id));
            flushed.extend(pool.flushed.iter().copied().filter(|&m| m != id));
            pools.insert(id, pool);
        }
    }

    RankOrder {
        order,
        flushed,
        pools,
    }
}

/// Outer nodes that no topological order can reach (Kahn's algorithm over the
/// gating edges). Includes cycle members and everything stuck behind them.
pub fn find_unorderable(graph: &PortfolioGraph) -> Vec<ProjectId> {
    let outer = graph.outer_ids();
    let mut remaining: FxHashMap<ProjectId, usize> = FxHashMap::default();
    let mut dependents: FxHashMap<ProjectId, Vec<ProjectId>> = FxHashMap::default();
    for &id in &outer {
        let deps = graph.gating_deps(id);
        remaining.insert(id, deps.len());
        for d in deps {
            dependents.entry(d).or_default().push(id);
        }
    }

    let mut queue: VecDeque<ProjectId> = outer
        .iter()
        .copied()
        .filter(|id| remaining[id] == 0)
        .collect();
    let mut ordered = 0;
    while let Some(id) = queue.pop_front() {
        ordered += 1;
        for &dependent in dependents.get(&id).map(|v| v.as_slice()).unwrap_or(&[]) {
            if let Some(degree) = remaining.get_mut(&dependent) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(dependent);
                }
            }
        }
    }

    if ordered == outer.len() {
        return Vec::new();
    }
    let mut stuck: Vec<ProjectId> = outer
        .into_iter()
        .filter(|id| remaining[id] > 0)
        .collect();
    stuck.sort_by_key(|&id| graph.row(id));
    stuck
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Project;

    fn make_project(row: RowNumber, months: f64, deps: Vec<RowNumber>) -> Project {
        Project {
            dev_resources: 1.0,
            total_person_months: Some(months),
            dependency_rows: deps,
            ..Project::new(row, format!("p{}", row))
        }
    }

    fn rows(graph: &PortfolioGraph, ids: &[ProjectId]) -> Vec<RowNumber> {
        ids.iter().map(|&id| graph.row(id)).collect()
    }

    fn ranked_rows(projects: &[Project]) -> (Vec<RowNumber>, Vec<RowNumber>) {
        let graph = PortfolioGraph::from_projects(projects, 100.0);
        let counts = compute_dependent_counts(&graph);
        let order = order_by_rank(&graph, &counts, 100.0, 0);
        (rows(&graph, &order.order), rows(&graph, &order.flushed))
    }

    #[test]
    fn test_dependent_counts_by_kind() {
        let mut projects = vec![
            make_project(1, 2.0, vec![]),
            make_project(2, 2.0, vec![1]),
            make_project(3, 2.0, vec![1]),
            make_project(4, 2.0, vec![1]),
        ];
        projects[1].dev_blocker_rows = vec![1];
        projects[2].rel_blocker_rows = vec![1];
        let graph = PortfolioGraph::from_projects(&projects, 100.0);
        let counts = compute_dependent_counts(&graph);
        let by_row = dependents_by_row(&graph, &counts);

        assert_eq!(
            by_row[&1],
            BlockCounts {
                dev_blocker: 1,
                rel_blocker: 1,
                plain: 1
            }
        );
        assert_eq!(by_row[&2].total(), 0);
    }

    #[test]
    fn test_counts_redirect_into_pool_parent() {
        let mut projects = vec![
            make_project(1, 2.0, vec![]),
            Project {
                bucket: None,
                ..Project::new(2, "child")
            },
            make_project(3, 2.0, vec![2]),
        ];
        projects[0].bucket = Some("pool".to_string());
        projects[2].bucket = Some("solo".to_string());
        let graph = PortfolioGraph::from_projects(&projects, 100.0);
        let counts = compute_dependent_counts(&graph);
        assert_eq!(counts[0].plain, 1);
        assert_eq!(counts[1].total(), 0);
    }

    #[test]
    fn test_dependencies_come_first() {
        let projects = vec![
            make_project(1, 2.0, vec![2]),
            make_project(2, 1.0, vec![3]),
            make_project(3, 1.0, vec![]),
        ];
        let (order, flushed) = ranked_rows(&projects);
        assert_eq!(order, vec![3, 2, 1]);
        assert!(flushed.is_empty());
    }

    #[test]
    fn test_rank_comparator_order() {
        let mut projects = vec![
            make_project(1, 1.0, vec![]),
            make_project(2, 6.0, vec![]),
            make_project(3, 1.0, vec![]),
            make_project(4, 1.0, vec![]),
            make_project(5, 1.0, vec![]),
        ];
        projects[0].priority = "P2".to_string(); // tier 2
        projects[3].status = "In progress".to_string(); // first regardless
        // Row 5 blocks nothing but is tier 1 and short; row 2 longer.
        let (order, _) = ranked_rows(&projects);
        assert_eq!(order, vec![4, 2, 3, 5, 1]);
    }

    #[test]
    fn test_blocked_counts_outrank_duration() {
        let projects = vec![
            make_project(1, 9.0, vec![]),
            make_project(2, 1.0, vec![]),
            make_project(3, 1.0, vec![2]),
        ];
        let (order, _) = ranked_rows(&projects);
        assert_eq!(order, vec![2, 1, 3]);
    }

    #[test]
    fn test_dev_blocker_outranks_plain() {
        let mut projects = vec![
            make_project(1, 1.0, vec![]),
            make_project(2, 1.0, vec![]),
            make_project(3, 1.0, vec![1]),
            make_project(4, 1.0, vec![2]),
        ];
        projects[3].dev_blocker_rows = vec![2];
        let (order, _) = ranked_rows(&projects);
        assert_eq!(order[0], 2);
    }

    #[test]
    fn test_rank_monotonic_within_tier() {
        let projects = vec![
            make_project(1, 1.0, vec![]),
            make_project(2, 1.0, vec![]),
            make_project(3, 1.0, vec![]),
            make_project(10, 1.0, vec![1, 2, 3]),
            make_project(11, 1.0, vec![2, 3]),
            make_project(12, 1.0, vec![3]),
        ];
        let graph = PortfolioGraph::from_projects(&projects, 100.0);
        let counts = compute_dependent_counts(&graph);
        let mut keys: Vec<RankKey> = graph
            .outer_ids()
            .into_iter()
            .map(|id| rank_key(&graph, &counts, id, 100.0))
            .collect();
        keys.sort();
        for pair in keys.windows(2) {
            if pair[0].tier == pair[1].tier && pair[0].in_progress == pair[1].in_progress {
                assert!(pair[0].counts.total() >= pair[1].counts.total());
            }
        }
        assert_eq!(keys[0].row_number, 3);
    }

    #[test]
    fn test_in_progress_not_stalled_by_unstarted_dependency() {
        let mut projects = vec![make_project(1, 1.0, vec![]), make_project(2, 1.0, vec![1])];
        projects[1].status = "In Progress".to_string();
        projects[0].priority = "P1".to_string();
        let (order, flushed) = ranked_rows(&projects);
        assert_eq!(order, vec![2, 1]);
        assert!(flushed.is_empty());
    }

    #[test]
    fn test_cycle_is_flushed_in_rank_order() {
        let projects = vec![
            make_project(1, 1.0, vec![2]),
            make_project(2, 3.0, vec![1]),
            make_project(3, 1.0, vec![]),
        ];
        let (order, flushed) = ranked_rows(&projects);
        // Row 3 is ready; rows 1 and 2 form a cycle and flush by rank.
        assert_eq!(order, vec![3, 2, 1]);
        assert_eq!(flushed, vec![2, 1]);
    }

    #[test]
    fn test_find_unorderable() {
        let projects = vec![
            make_project(1, 1.0, vec![2]),
            make_project(2, 1.0, vec![1]),
            make_project(3, 1.0, vec![1]),
            make_project(4, 1.0, vec![]),
        ];
        let graph = PortfolioGraph::from_projects(&projects, 100.0);
        assert_eq!(rows(&graph, &find_unorderable(&graph)), vec![1, 2, 3]);

        let acyclic = vec![make_project(1, 1.0, vec![]), make_project(2, 1.0, vec![1])];
        let graph = PortfolioGraph::from_projects(&acyclic, 100.0);
        assert!(find_unorderable(&graph).is_empty());
    }

    #[test]
    fn test_pool_children_follow_parent() {
        let mut projects = vec![
            make_project(1, 6.0, vec![]),
            Project {
                sizing_label: Some("small".to_string()),
                ..Project::new(2, "child a")
            },
            Project {
                sizing_label: Some("large".to_string()),
                dependency_rows: vec![2],
                ..Project::new(3, "child b")
            },
            make_project(4, 1.0, vec![]),
        ];
        projects[0].dev_resources = 2.0;
        projects[0].bucket = Some("pool".to_string());
        projects[3].bucket = Some("solo".to_string());
        let (order, flushed) = ranked_rows(&projects);
        // Pool budget 3 months outranks row 4; child 2 blocks child 3.
        assert_eq!(order, vec![1, 2, 3, 4]);
        assert!(flushed.is_empty());
    }

    #[test]
    fn test_pool_order_kept_for_packing() {
        let mut projects = vec![
            make_project(1, 6.0, vec![]),
            Project {
                sizing_label: Some("small".to_string()),
                ..Project::new(2, "child a")
            },
            Project {
                sizing_label: Some("large".to_string()),
                dependency_rows: vec![2],
                ..Project::new(3, "child b")
            },
        ];
        projects[0].dev_resources = 2.0;
        projects[0].bucket = Some("pool".to_string());
        let graph = PortfolioGraph::from_projects(&projects, 100.0);
        let counts = compute_dependent_counts(&graph);
        let rank = order_by_rank(&graph, &counts, 100.0, 0);

        assert_eq!(rank.pools.len(), 1);
        let pool = &rank.pools[&0];
        assert_eq!(pool, &pool_member_order(&graph, 0));
        assert_eq!(rows(&graph, &pool.order), vec![2, 3, 1]);
        assert_eq!(pool.internal[&2], vec![1]);
    }
}
