use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Partition ("location") identifier. Exactly one per communicator endpoint.
pub type LocationId = usize;

/// Index of a cell inside its owning [`LocalMesh`](crate::mesh::LocalMesh).
pub type CellIndex = usize;

/// Order in which the scheduler advances angle sets.
///
/// - `Fifo`: plain round-robin over angle set groups.
/// - `DepthOfGraph`: angle sets ranked by how much downstream work depends on
///   this location, deepest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingPolicy {
    Fifo,
    DepthOfGraph,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        SchedulingPolicy::Fifo
    }
}

impl FromStr for SchedulingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "fifo" => Ok(SchedulingPolicy::Fifo),
            "depth_of_graph" | "dog" => Ok(SchedulingPolicy::DepthOfGraph),
            other => Err(format!(
                "invalid scheduling policy: {other} (expected \"fifo\" or \"depth_of_graph\")"
            )),
        }
    }
}

impl fmt::Display for SchedulingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulingPolicy::Fifo => f.write_str("fifo"),
            SchedulingPolicy::DepthOfGraph => f.write_str("depth_of_graph"),
        }
    }
}

/// Execution state of an angle set (and of an angle set group).
///
/// Transitions are monotonic within one sweep: once `Finished`, only
/// `reset_sweep` brings it back to `NotFinished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleSetStatus {
    NotFinished,
    Finished,
}

impl AngleSetStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, AngleSetStatus::Finished)
    }
}

/// Geometry class of a mesh; selects the sweep kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryKind {
    Slab,
    Polygon,
    Polyhedron,
}

impl GeometryKind {
    /// Number of spatial dimensions swept for this geometry.
    pub fn dimension(self) -> usize {
        match self {
            GeometryKind::Slab => 1,
            GeometryKind::Polygon => 2,
            GeometryKind::Polyhedron => 3,
        }
    }
}

impl Default for GeometryKind {
    fn default() -> Self {
        GeometryKind::Slab
    }
}

impl FromStr for GeometryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "slab" => Ok(GeometryKind::Slab),
            "polygon" => Ok(GeometryKind::Polygon),
            "polyhedron" => Ok(GeometryKind::Polyhedron),
            other => Err(format!(
                "invalid geometry: {other} (expected \"slab\", \"polygon\" or \"polyhedron\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parses_aliases() {
        assert_eq!("FIFO".parse::<SchedulingPolicy>(), Ok(SchedulingPolicy::Fifo));
        assert_eq!(
            "depth-of-graph".parse::<SchedulingPolicy>(),
            Ok(SchedulingPolicy::DepthOfGraph)
        );
        assert!("lifo".parse::<SchedulingPolicy>().is_err());
    }

    #[test]
    fn geometry_dimension() {
        assert_eq!(GeometryKind::Slab.dimension(), 1);
        assert_eq!("polyhedron".parse::<GeometryKind>().map(|g| g.dimension()), Ok(3));
    }
}
