#![allow(dead_code)]

use std::collections::BTreeMap;

use sweepdag::config::{
    BoundaryConfig, ConfigSection, MaterialSection, MeshSection, ProblemConfig,
    QuadratureSection, RawProblemConfig, SolverSection,
};
use sweepdag::errors::Result;
use sweepdag::mesh::{CellView, FaceConnection, FaceNeighbor, FaceView, LocalMesh};
use sweepdag::types::{GeometryKind, LocationId, SchedulingPolicy};

/// Builder for `ProblemConfig` to simplify test setup.
pub struct ProblemConfigBuilder {
    config: RawProblemConfig,
}

impl ProblemConfigBuilder {
    fn with_mesh(mesh: MeshSection) -> Self {
        Self {
            config: RawProblemConfig {
                config: ConfigSection::default(),
                mesh,
                quadrature: QuadratureSection::default(),
                material: MaterialSection::default(),
                boundary: BTreeMap::new(),
                solver: SolverSection::default(),
            },
        }
    }

    /// Unit-length slab of `cells` cells split into `partitions` blocks.
    pub fn slab(cells: usize, partitions: usize) -> Self {
        Self::with_mesh(MeshSection {
            geometry: GeometryKind::Slab,
            cells: vec![cells],
            extent: Vec::new(),
            partitions: vec![partitions],
        })
    }

    /// Unit square of `cells` cells split into `partitions` blocks.
    pub fn rectangle(cells: [usize; 2], partitions: [usize; 2]) -> Self {
        Self::with_mesh(MeshSection {
            geometry: GeometryKind::Polygon,
            cells: cells.to_vec(),
            extent: Vec::new(),
            partitions: partitions.to_vec(),
        })
    }

    pub fn with_policy(mut self, policy: SchedulingPolicy) -> Self {
        self.config.config.policy = policy;
        self
    }

    pub fn with_quadrature(mut self, polar: usize, azimuthal: usize) -> Self {
        self.config.quadrature.polar = polar;
        self.config.quadrature.azimuthal = azimuthal;
        self
    }

    pub fn with_angles_per_set(mut self, n: usize) -> Self {
        self.config.quadrature.angles_per_set = n;
        self
    }

    pub fn with_material(mut self, sigma_t: f64, sigma_s: f64, source: f64) -> Self {
        self.config.material.sigma_t = sigma_t;
        self.config.material.sigma_s = sigma_s;
        self.config.material.source = source;
        self
    }

    pub fn with_groups(mut self, groups: usize) -> Self {
        self.config.material.groups = groups;
        self
    }

    pub fn with_boundary(mut self, name: &str, boundary: BoundaryConfig) -> Self {
        self.config.boundary.insert(name.to_string(), boundary);
        self
    }

    pub fn with_solver(mut self, max_iterations: usize, tolerance: f64) -> Self {
        self.config.solver.max_iterations = max_iterations;
        self.config.solver.tolerance = tolerance;
        self
    }

    pub fn with_message_face_limit(mut self, n: usize) -> Self {
        self.config.config.message_face_limit = n;
        self
    }

    pub fn with_channel_capacity(mut self, n: usize) -> Self {
        self.config.config.channel_capacity = n;
        self
    }

    pub fn with_max_idle_polls(mut self, n: usize) -> Self {
        self.config.config.max_idle_polls = n;
        self
    }

    pub fn raw(self) -> RawProblemConfig {
        self.config
    }

    pub fn build(self) -> ProblemConfig {
        ProblemConfig::try_from(self.config).expect("Failed to build valid problem from builder")
    }
}

enum Target {
    Boundary(usize),
    Cell { global: usize, back_face: usize },
}

struct PendingFace {
    normal: [f64; 3],
    target: Target,
}

/// Hand-made connectivity for meshes the grid generator cannot express.
///
/// Every cell has unit volume and every face unit area. Local ids follow
/// the order cells were added to their location.
pub struct MeshBuilder {
    geometry: GeometryKind,
    num_locations: usize,
    owners: Vec<LocationId>,
    faces: Vec<Vec<PendingFace>>,
}

impl MeshBuilder {
    pub fn new(geometry: GeometryKind, num_locations: usize) -> Self {
        Self {
            geometry,
            num_locations,
            owners: Vec::new(),
            faces: Vec::new(),
        }
    }

    /// Periodic chain `0 -> 1 -> ... -> n-1 -> 0` along +x, blocked over
    /// `num_locations` partitions.
    pub fn ring(num_cells: usize, num_locations: usize) -> Self {
        assert!(num_cells >= 2, "a ring needs at least two cells");
        let mut builder = Self::new(GeometryKind::Slab, num_locations);
        for i in 0..num_cells {
            builder.add_cell(i * num_locations / num_cells);
        }
        for i in 0..num_cells {
            builder.connect(i, (i + 1) % num_cells, [1.0, 0.0, 0.0]);
        }
        builder
    }

    /// Add a cell owned by `location`; returns its global id.
    pub fn add_cell(&mut self, location: LocationId) -> usize {
        self.owners.push(location);
        self.faces.push(Vec::new());
        self.owners.len() - 1
    }

    /// Add a face on `a` with outward `normal` facing `b`, and its mirror on `b`.
    pub fn connect(&mut self, a: usize, b: usize, normal: [f64; 3]) -> &mut Self {
        let face_a = self.faces[a].len();
        let face_b = self.faces[b].len() + usize::from(a == b);
        self.faces[a].push(PendingFace {
            normal,
            target: Target::Cell {
                global: b,
                back_face: face_b,
            },
        });
        self.faces[b].push(PendingFace {
            normal: normal.map(|c| -c),
            target: Target::Cell {
                global: a,
                back_face: face_a,
            },
        });
        self
    }

    pub fn boundary(&mut self, cell: usize, normal: [f64; 3], boundary_id: usize) -> &mut Self {
        self.faces[cell].push(PendingFace {
            normal,
            target: Target::Boundary(boundary_id),
        });
        self
    }

    pub fn build(&self) -> Result<Vec<LocalMesh>> {
        let mut next_local = vec![0usize; self.num_locations];
        let local_ids: Vec<usize> = self
            .owners
            .iter()
            .map(|&loc| {
                next_local[loc] += 1;
                next_local[loc] - 1
            })
            .collect();

        (0..self.num_locations)
            .map(|location| {
                let cells = (0..self.owners.len())
                    .filter(|&g| self.owners[g] == location)
                    .map(|g| CellView {
                        local_id: local_ids[g],
                        global_id: g,
                        volume: 1.0,
                        faces: self.faces[g]
                            .iter()
                            .map(|f| FaceView {
                                normal: f.normal,
                                area: 1.0,
                                connection: match f.target {
                                    Target::Boundary(boundary_id) => {
                                        FaceConnection::Boundary { boundary_id }
                                    }
                                    Target::Cell { global, back_face } => {
                                        FaceConnection::Interior(FaceNeighbor {
                                            local_id: local_ids[global],
                                            global_id: global,
                                            location: self.owners[global],
                                            associated_face: back_face,
                                        })
                                    }
                                },
                            })
                            .collect(),
                    })
                    .collect();
                LocalMesh::new(location, self.num_locations, self.geometry, cells)
            })
            .collect()
    }
}
