//! Resource-group classification.
//!
//! Rows sharing a bucket tag either schedule independently as peers or share a
//! single pool of people. Classification is a pure function: the input list is
//! never touched, and every demoted field is kept in an [`OriginalEffort`] side
//! table so a classified list can be restored and classified again.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::models::{Project, RowNumber};
use crate::sizing::pool_budget_months;

/// Headcount and effort archived from a pool parent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub total_resources: f64,
    pub total_person_months: f64,
}

impl Pool {
    pub fn budget_months(&self, capacity_pct: f64) -> u32 {
        pool_budget_months(self.total_person_months, self.total_resources, capacity_pct)
    }

    /// Headcount the pool reserves against organisational capacity.
    pub fn reserved_headcount(&self) -> u32 {
        self.total_resources.max(0.0).ceil() as u32
    }

    /// Members that can run concurrently inside the pool.
    pub fn slots(&self) -> u32 {
        (self.total_resources.max(0.0).floor() as u32).max(1)
    }
}

/// Role a project plays in resource grouping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ResourceRole {
    Standalone,
    Peer {
        group_id: String,
        group_name: String,
    },
    PoolParent {
        pool: Pool,
        child_rows: Vec<RowNumber>,
    },
    PoolChild {
        parent_row: RowNumber,
    },
}

impl ResourceRole {
    pub fn is_pool_child(&self) -> bool {
        matches!(self, Self::PoolChild { .. })
    }

    pub fn is_pool_parent(&self) -> bool {
        matches!(self, Self::PoolParent { .. })
    }
}

/// Pre-demotion values of a pool parent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OriginalEffort {
    pub dev_resources: f64,
    pub total_person_months: Option<f64>,
}

/// A project together with its resource role.
///
/// `project` holds the effective values used for scheduling; for a pool parent
/// that means its own headcount and effort have moved into the [`Pool`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedProject {
    pub project: Project,
    pub role: ResourceRole,
    pub original: Option<OriginalEffort>,
}

impl ClassifiedProject {
    fn standalone(project: &Project) -> Self {
        Self {
            project: project.clone(),
            role: ResourceRole::Standalone,
            original: None,
        }
    }

    /// The project as it was before classification.
    pub fn restored(&self) -> Project {
        let mut project = self.project.clone();
        if let Some(original) = &self.original {
            project.dev_resources = original.dev_resources;
            project.total_person_months = original.total_person_months;
        }
        project
    }
}

/// Resolve each row's bucket key. A blank tag continues the run started by the
/// nearest tagged row above it; rows before the first tag have no bucket.
fn bucket_keys(projects: &[Project]) -> Vec<Option<String>> {
    let mut current: Option<String> = None;
    projects
        .iter()
        .map(|project| {
            if let Some(tag) = project.bucket.as_deref().map(str::trim) {
                if !tag.is_empty() {
                    current = Some(tag.to_string());
                }
            }
            current.clone()
        })
        .collect()
}

/// Group row indices by bucket key, in order of first appearance.
fn bucket_groups(projects: &[Project]) -> Vec<(String, Vec<usize>)> {
    let mut positions: FxHashMap<String, usize> = FxHashMap::default();
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for (idx, key) in bucket_keys(projects).into_iter().enumerate() {
        let Some(key) = key else {
            continue;
        };
        match positions.get(&key) {
            Some(&pos) => groups[pos].1.push(idx),
            None => {
                positions.insert(key.clone(), groups.len());
                groups.push((key, vec![idx]));
            }
        }
    }
    groups
}

fn tag_peers(result: &mut [ClassifiedProject], members: &[usize], key: &str, group_id: &str) {
    for &idx in members {
        result[idx].role = ResourceRole::Peer {
            group_id: group_id.to_string(),
            group_name: key.to_string(),
        };
    }
}

/// Classify a flat project list into standalone rows, peers and pools.
///
/// Per bucket: if every row has headcount (or none does) the rows are peers.
/// Otherwise the row with the most headcount becomes the pool parent, every
/// row without headcount becomes its child, and any remaining resourced rows
/// stay independent peers. Output order matches input order.
pub fn classify(projects: &[Project]) -> Vec<ClassifiedProject> {
    let mut result: Vec<ClassifiedProject> =
        projects.iter().map(ClassifiedProject::standalone).collect();

    for (key, members) in bucket_groups(projects) {
        if members.len() < 2 {
            continue;
        }
        let group_id = format!("peer-{}", projects[members[0]].row_number);

        let (resourced, unresourced): (Vec<usize>, Vec<usize>) = members
            .iter()
            .copied()
            .partition(|&idx| projects[idx].has_resources());

        if resourced.is_empty() || unresourced.is_empty() {
            tag_peers(&mut result, &members, &key, &group_id);
            continue;
        }

        // Highest headcount wins; the earliest row wins ties.
        let mut parent_idx = resourced[0];
        for &idx in &resourced[1..] {
            if projects[idx].clamped_resources() > projects[parent_idx].clamped_resources() {
                parent_idx = idx;
            }
        }

        let parent = &projects[parent_idx];
        let pool = Pool {
            total_resources: parent.clamped_resources(),
            total_person_months: parent
                .total_person_months
                .filter(|pm| pm.is_finite() && *pm > 0.0)
                .unwrap_or(0.0),
        };
        let child_rows: Vec<RowNumber> = unresourced
            .iter()
            .map(|&idx| projects[idx].row_number)
            .collect();

        let mut demoted = parent.clone();
        demoted.dev_resources = 0.0;
        demoted.total_person_months = None;
        result[parent_idx] = ClassifiedProject {
            project: demoted,
            role: ResourceRole::PoolParent { pool, child_rows },
            original: Some(OriginalEffort {
                dev_resources: parent.dev_resources,
                total_person_months: parent.total_person_months,
            }),
        };

        for &idx in &unresourced {
            result[idx].role = ResourceRole::PoolChild {
                parent_row: parent.row_number,
            };
        }

        let peers: Vec<usize> = resourced
            .into_iter()
            .filter(|&idx| idx != parent_idx)
            .collect();
        tag_peers(&mut result, &peers, &key, &group_id);
    }

    result
}

/// Undo classification, recovering the pre-classification project list.
pub fn restore_originals(classified: &[ClassifiedProject]) -> Vec<Project> {
    classified.iter().map(ClassifiedProject::restored).collect()
}

/// Re-derive tags for an already classified list (e.g. after a storage round-trip).
pub fn reclassify(classified: &[ClassifiedProject]) -> Vec<ClassifiedProject> {
    classify(&restore_originals(classified))
}
