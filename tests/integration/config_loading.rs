// tests/integration/config_loading.rs

use std::io::Write;

use tempfile::NamedTempFile;

use sweepdag::cli::{CliArgs, PolicyArg};
use sweepdag::config::{BoundaryConfig, load_and_validate, load_from_path};
use sweepdag::errors::SweepError;
use sweepdag::sweep::BoundaryKind;
use sweepdag::types::{GeometryKind, SchedulingPolicy};

fn write_problem(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn full_problem_file_round_trips_into_a_problem() {
    let file = write_problem(
        r#"
[config]
policy = "depth_of_graph"
message_face_limit = 32
channel_capacity = 8

[mesh]
geometry = "polygon"
cells = [8, 4]
extent = [2.0, 1.0]
partitions = [2, 2]

[quadrature]
polar = 2
azimuthal = 8
angles_per_set = 2

[material]
sigma_t = 1.5
sigma_s = 0.5
source = 2.0
groups = 3

[boundary.xmin]
type = "reflecting"

[boundary.ymax]
type = "isotropic"
value = 0.25

[solver]
max_iterations = 20
tolerance = 1e-6
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.config.policy, SchedulingPolicy::DepthOfGraph);
    assert_eq!(cfg.grid.geometry, GeometryKind::Polygon);
    assert_eq!(cfg.grid.cells, [8, 4, 1]);
    assert_eq!(cfg.grid.extent, [2.0, 1.0, 1.0]);
    assert_eq!(cfg.num_locations(), 4);
    assert_eq!(cfg.build_quadrature().unwrap().len(), 16);
    assert_eq!(cfg.aggregation_options().angles_per_set, 2);
    assert_eq!(cfg.aggregation_options().num_groups, 3);
    assert_eq!(cfg.source_iteration().max_iterations, 20);

    let kinds = cfg.boundary_kinds();
    assert_eq!(kinds[0], BoundaryKind::Reflecting);
    assert_eq!(kinds[1], BoundaryKind::Vacuum);
    assert_eq!(kinds[3], BoundaryKind::Isotropic { value: 0.25 });
}

#[test]
fn scattering_at_or_above_total_is_rejected() {
    let file = write_problem(
        r#"
[mesh]
cells = [4]

[material]
sigma_t = 1.0
sigma_s = 1.0
"#,
    );

    match load_and_validate(file.path()) {
        Err(SweepError::ConfigError(msg)) => assert!(msg.contains("sigma_s")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn unknown_boundary_name_is_rejected() {
    let file = write_problem(
        r#"
[mesh]
geometry = "polygon"
cells = [2, 2]

[boundary.left]
type = "vacuum"
"#,
    );

    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, SweepError::ConfigError(_)));
    assert!(err.to_string().contains("left"));
}

#[test]
fn too_many_partitions_surface_as_config_error() {
    let file = write_problem(
        r#"
[mesh]
cells = [3]
partitions = [4]
"#,
    );

    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, SweepError::ConfigError(_)), "{err}");
}

#[test]
fn unknown_policy_and_fields_are_toml_errors() {
    let bad_policy = write_problem("[config]\npolicy = \"random\"\n[mesh]\ncells = [2]\n");
    assert!(matches!(load_from_path(bad_policy.path()), Err(SweepError::TomlError(_))));

    let bad_field = write_problem("[mesh]\ncells = [2]\n[lattice]\npitch = 1.0\n");
    assert!(matches!(load_from_path(bad_field.path()), Err(SweepError::TomlError(_))));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_and_validate(dir.path().join("Sweep.toml")).unwrap_err();
    assert!(matches!(err, SweepError::IoError(_)));
}

#[test]
fn raw_boundary_sections_parse_by_type() {
    let file = write_problem(
        r#"
[mesh]
cells = [2]

[boundary.xmax]
type = "isotropic"
value = 1.5
"#,
    );
    let raw = load_from_path(file.path()).unwrap();
    assert_eq!(
        raw.boundary.get("xmax"),
        Some(&BoundaryConfig::Isotropic { value: 1.5 })
    );
}

#[tokio::test]
async fn dry_run_validates_without_sweeping() {
    let file = write_problem("[mesh]\ncells = [4]\npartitions = [2]\n");
    let args = CliArgs {
        config: file.path().display().to_string(),
        policy: Some(PolicyArg::DepthOfGraph),
        sweeps: None,
        log_level: None,
        dry_run: true,
    };
    sweepdag::run(args).await.unwrap();
}

#[tokio::test]
async fn cli_run_sweeps_the_problem() {
    let file = write_problem(
        r#"
[mesh]
cells = [6]
partitions = [3]

[quadrature]
polar = 2

[material]
sigma_t = 1.0
sigma_s = 0.2
"#,
    );
    let args = CliArgs {
        config: file.path().display().to_string(),
        policy: None,
        sweeps: Some(3),
        log_level: None,
        dry_run: false,
    };
    sweepdag::run(args).await.unwrap();
}
