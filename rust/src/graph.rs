//! Project arena and dependency edges.
//!
//! Row numbers are mapped to dense integer ids once, and every stage after
//! classification works on ids. Redirection of edges that point into a pool
//! (child -> parent) happens here and nowhere else.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::groups::{classify, ClassifiedProject, ResourceRole};
use crate::models::{EdgeKind, Project, RowNumber};
use crate::sizing::{individual_duration, remaining_duration, DurationEstimate};

/// Dense project id (index into the arena).
pub type ProjectId = u32;

/// Bidirectional row number <-> id mapping.
#[derive(Debug, Clone, Default)]
pub struct RowIndex {
    to_id: FxHashMap<RowNumber, ProjectId>,
    rows: Vec<RowNumber>,
}

impl RowIndex {
    /// Ids follow iteration order. With duplicate row numbers the first one is
    /// the one dependency lookups resolve to.
    pub fn new(rows: impl Iterator<Item = RowNumber>) -> Self {
        let mut index = Self::default();
        for row in rows {
            let id = index.rows.len() as ProjectId;
            index.rows.push(row);
            index.to_id.entry(row).or_insert(id);
        }
        index
    }

    #[inline]
    pub fn get(&self, row: RowNumber) -> Option<ProjectId> {
        self.to_id.get(&row).copied()
    }

    #[inline]
    pub fn row(&self, id: ProjectId) -> RowNumber {
        self.rows[id as usize]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One project in the arena, with everything later stages need precomputed.
#[derive(Debug, Clone)]
pub struct ProjectNode {
    /// Effective project (pool parents are demoted).
    pub project: Project,
    pub role: ResourceRole,
    pub estimate: DurationEstimate,
    /// Priority tier; pool children carry their parent's.
    pub tier: u8,
    pub in_progress: bool,
    /// Node that is scheduled on this node's behalf: the pool parent for a
    /// pool child, the node itself otherwise.
    pub owner: ProjectId,
}

#[derive(Debug, Clone)]
pub struct PortfolioGraph {
    pub index: RowIndex,
    pub nodes: Vec<ProjectNode>,
    /// Raw edges, dependent -> targets, with both ends present in the list.
    pub deps: Vec<Vec<(ProjectId, EdgeKind)>>,
    /// Edges between schedulable owners: redirected, deduplicated, no self loops.
    pub outer_deps: Vec<Vec<ProjectId>>,
    /// Pool parent -> children, in the parent's child order.
    pub pool_children: FxHashMap<ProjectId, Vec<ProjectId>>,
    /// (source_row, missing_row) references that were dropped.
    pub dangling: Vec<(RowNumber, RowNumber)>,
}

impl PortfolioGraph {
    /// Classify a raw project list and build the arena.
    pub fn from_projects(projects: &[Project], capacity_pct: f64) -> Self {
        Self::build(&classify(projects), capacity_pct)
    }

    pub fn build(classified: &[ClassifiedProject], capacity_pct: f64) -> Self {
        let index = RowIndex::new(classified.iter().map(|c| c.project.row_number));
        let n = index.len();

        let mut nodes: Vec<ProjectNode> = classified
            .iter()
            .enumerate()
            .map(|(id, c)| {
                let estimate = if c.role.is_pool_parent() {
                    // Headcount moved to the pool; the parent's own share is
                    // whatever its individual sizing says.
                    match individual_duration(&c.project) {
                        Some(months) => DurationEstimate {
                            months,
                            missing_data: false,
                        },
                        None => DurationEstimate {
                            months: 0,
                            missing_data: false,
                        },
                    }
                } else {
                    remaining_duration(&c.project, capacity_pct)
                };
                ProjectNode {
                    project: c.project.clone(),
                    role: c.role.clone(),
                    estimate,
                    tier: c.project.priority_tier(),
                    in_progress: c.project.is_in_progress(),
                    owner: id as ProjectId,
                }
            })
            .collect();

        // Attach children to parents that really are pool parents.
        let mut pool_children: FxHashMap<ProjectId, Vec<ProjectId>> = FxHashMap::default();
        for id in 0..n {
            let ResourceRole::PoolChild { parent_row } = nodes[id].role else {
                continue;
            };
            let Some(parent) = index.get(parent_row) else {
                continue;
            };
            if !nodes[parent as usize].role.is_pool_parent() {
                continue;
            }
            nodes[id].owner = parent;
            nodes[id].tier = nodes[parent as usize].tier;
            pool_children.entry(parent).or_default().push(id as ProjectId);
        }
        for (&parent, children) in pool_children.iter_mut() {
            if let ResourceRole::PoolParent { child_rows, .. } = &nodes[parent as usize].role {
                children.sort_by_key(|&c| {
                    child_rows
                        .iter()
                        .position(|&r| r == index.row(c))
                        .unwrap_or(usize::MAX)
                });
            }
        }

        let mut deps: Vec<Vec<(ProjectId, EdgeKind)>> = vec![Vec::new(); n];
        let mut dangling: Vec<(RowNumber, RowNumber)> = Vec::new();
        for (id, node) in nodes.iter().enumerate() {
            for (row, kind) in node.project.dependencies() {
                match index.get(row) {
                    Some(target) if target as usize != id => deps[id].push((target, kind)),
                    Some(_) => {}
                    None => dangling.push((node.project.row_number, row)),
                }
            }
        }

        let mut outer_deps: Vec<Vec<ProjectId>> = vec![Vec::new(); n];
        let mut seen: Vec<FxHashSet<ProjectId>> = vec![FxHashSet::default(); n];
        for (id, edges) in deps.iter().enumerate() {
            let source = nodes[id].owner;
            for &(target, _) in edges {
                let target = nodes[target as usize].owner;
                if target != source && seen[source as usize].insert(target) {
                    outer_deps[source as usize].push(target);
                }
            }
        }

        Self {
            index,
            nodes,
            deps,
            outer_deps,
            pool_children,
            dangling,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn node(&self, id: ProjectId) -> &ProjectNode {
        &self.nodes[id as usize]
    }

    #[inline]
    pub fn row(&self, id: ProjectId) -> RowNumber {
        self.index.row(id)
    }

    /// Whether the node is placed as a member of some pool rather than on its own.
    pub fn is_attached_child(&self, id: ProjectId) -> bool {
        self.node(id).owner != id
    }

    /// Ids that get their own slot in the outer schedule, in input order.
    pub fn outer_ids(&self) -> Vec<ProjectId> {
        (0..self.len() as ProjectId)
            .filter(|&id| !self.is_attached_child(id))
            .collect()
    }

    pub fn children_of(&self, parent: ProjectId) -> &[ProjectId] {
        self.pool_children
            .get(&parent)
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }

    /// Outer dependencies that actually gate this node.
    ///
    /// In-progress work is only held back by other in-progress work, so active
    /// projects are never stalled behind prerequisites that have not started.
    pub fn gating_deps(&self, id: ProjectId) -> Vec<ProjectId> {
        let deps = &self.outer_deps[id as usize];
        if self.node(id).in_progress {
            deps.iter()
                .copied()
                .filter(|&d| self.node(d).in_progress)
                .collect()
        } else {
            deps.clone()
        }
    }

    /// Pool members (parent first, then children).
    pub fn pool_members(&self, parent: ProjectId) -> Vec<ProjectId> {
        let mut members = vec![parent];
        members.extend_from_slice(self.children_of(parent));
        members
    }

    /// Raw edges between members of the same pool, member -> member targets.
    pub fn intra_pool_deps(&self, parent: ProjectId) -> FxHashMap<ProjectId, Vec<ProjectId>> {
        let members: FxHashSet<ProjectId> = self.pool_members(parent).into_iter().collect();
        members
            .iter()
            .map(|&m| {
                let targets = self.deps[m as usize]
                    .iter()
                    .map(|&(t, _)| t)
                    .filter(|t| members.contains(t))
                    .collect();
                (m, targets)
            })
            .collect()
    }
}
