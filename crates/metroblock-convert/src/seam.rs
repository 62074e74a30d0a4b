//! Pure overlap and chunk-seam rules. Every decision here depends only on
//! feature classes and ids, never on processing order.

use crate::feature::RoadClaim;
use metroblock_world::{FeatureClass, FeatureInstance};

/// Rank of each feature class; lower ranks win.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Priority {
    ranks: [usize; 4],
}

fn slot(class: FeatureClass) -> usize {
    match class {
        FeatureClass::Road => 0,
        FeatureClass::Building => 1,
        FeatureClass::Vegetation => 2,
        FeatureClass::Water => 3,
    }
}

impl Priority {
    /// `order` lists classes from highest to lowest priority. Classes left
    /// out rank below all listed ones.
    pub fn new(order: &[FeatureClass]) -> Self {
        let mut ranks = [order.len(); 4];
        for (rank, class) in order.iter().enumerate().rev() {
            ranks[slot(*class)] = rank;
        }
        Priority { ranks }
    }

    pub fn rank(&self, class: FeatureClass) -> usize {
        self.ranks[slot(class)]
    }

    /// Sort key: the smallest key wins a column.
    pub fn key(&self, feature: &FeatureInstance) -> (usize, u64) {
        (self.rank(feature.class()), feature.id)
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::new(&[
            FeatureClass::Road,
            FeatureClass::Building,
            FeatureClass::Vegetation,
            FeatureClass::Water,
        ])
    }
}

/// The feature that owns a column both cover.
pub fn winner<'a>(
    a: &'a FeatureInstance,
    b: &'a FeatureInstance,
    priority: &Priority,
) -> &'a FeatureInstance {
    if priority.key(b) < priority.key(a) {
        b
    } else {
        a
    }
}

/// Surface an edge road column should show, given the road claims of its
/// neighbours across chunk boundaries. Returns the neighbour claim to adopt,
/// which is the lowest-id neighbour road when it beats the column's own road.
pub fn road_edge(own: Option<&RoadClaim>, neighbors: &[Option<RoadClaim>]) -> Option<RoadClaim> {
    let own = own?;
    neighbors
        .iter()
        .flatten()
        .filter(|claim| claim.feature < own.feature)
        .min_by_key(|claim| claim.feature)
        .copied()
}
