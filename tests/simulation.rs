use gasflow::{
    faer_add::{load_vector, mean, min_max, to_vec},
    mesh::Side,
    BoundaryPolicy, CaseConfig, Driver, Float, Mobility, Phase, PhysicalParameters, Problem,
    RectangularMesh, Recorder, Resolution, SimError, Simulation, SnapshotWriter, SparseError,
};

const WIDTH: Float = 0.01;

fn no_gravity() -> PhysicalParameters {
    PhysicalParameters {
        gravity: 0.0,
        ..Default::default()
    }
}

fn reference(rows: usize, cols: usize) -> Problem<'static> {
    Problem::new("reference", RectangularMesh::new(WIDTH, WIDTH, rows, cols))
        .with_physics(no_gravity())
        .with_dirichlet(|x, _| 1e5 + 1e3 * x / WIDTH)
}

#[test]
fn rest_state_is_preserved() {
    let problem = Problem::new("rest", RectangularMesh::new(WIDTH, WIDTH, 3, 5))
        .with_physics(no_gravity());
    let mut recorder = Recorder::default();
    let mut driver = Driver::new(Simulation::new(problem).with_final_time(0.3))
        .with_observer(&mut recorder);
    driver.run().unwrap();

    let state = driver.into_state();
    for p in to_vec(&state.pressure).into_iter().chain(to_vec(&state.trace)) {
        assert!((p - 1e5).abs() < 1e-4, "{p}");
    }
    assert_eq!(recorder.snapshots.len(), 4);
}

#[test]
fn pressure_stays_bounded_and_approaches_boundary_value() {
    let mut recorder = Recorder::default();
    let sim = Simulation::new(reference(4, 4)).with_final_time(0.3);
    Driver::new(sim).with_observer(&mut recorder).run().unwrap();

    let mut previous = 1e5;
    for (_, pressure) in &recorder.snapshots {
        let (lo, hi) = min_max(pressure);
        assert!(lo >= 1e5 - 1e-6 && hi <= 1e5 + 1e3 + 1e-6, "[{lo}, {hi}]");
        assert!(mean(pressure) >= previous - 1e-6);
        previous = mean(pressure);
    }

    // the boundary data is antisymmetric about its mean, so is the steady state
    let (_, last) = recorder.snapshots.last().unwrap();
    assert!((mean(last) - (1e5 + 500.0)).abs() < 1.0, "{}", mean(last));
    // cells under the high end of the boundary end up higher
    assert!(last[3] > last[0]);
}

#[test]
fn upwind_mobility_stays_bounded() {
    let mut recorder = Recorder::default();
    let sim = Simulation::new(reference(3, 6))
        .with_mobility(Mobility::Upwind)
        .with_final_time(0.2)
        .with_snapshot_period(Resolution::Steps(1));
    let mut driver = Driver::new(sim).with_observer(&mut recorder);
    driver.run().unwrap();
    assert_eq!(driver.phase(), Phase::Completed);
    drop(driver);

    assert_eq!(recorder.snapshots.len(), 3);
    for (_, pressure) in &recorder.snapshots {
        let (lo, hi) = min_max(pressure);
        assert!(lo >= 1e5 - 1e-6 && hi <= 1e5 + 1e3 + 1e-6);
    }
}

#[test]
fn closed_box_settles_to_hydrostatic_profile() {
    let rows = 4;
    let mesh = RectangularMesh::new(WIDTH, WIDTH, rows, 3)
        .with_boundary(BoundaryPolicy::all_neumann());
    let problem = Problem::new("column", mesh.clone());
    let physics = *problem.physics();

    let mut driver = Driver::new(Simulation::new(problem).with_final_time(0.5));
    driver.run().unwrap();
    let p = &driver.state().pressure;

    // no boundary flux: mass is conserved
    assert!((mean(p) - 1e5).abs() < 1e-3);

    let row_mean = |row: usize| (0..3).map(|col| p[row * 3 + col]).sum::<Float>() / 3.0;
    let difference = row_mean(0) - row_mean(rows - 1);
    let expected = physics.density(1e5) * -physics.gravity * (WIDTH - mesh.dy());
    assert!(
        (difference - expected).abs() < 1e-2 * expected,
        "{difference} vs {expected}"
    );
}

#[test]
fn snapshot_files_are_named_and_counted() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("pressure_");
    let prefix = prefix.to_str().unwrap();

    let sim = Simulation::new(reference(2, 3))
        .with_final_time(0.25)
        .with_snapshot_period(Resolution::Delta(0.1));
    Driver::new(sim)
        .with_observer(SnapshotWriter::new(prefix))
        .run()
        .unwrap();

    // t = 0, 0.1, 0.2 and the final time 0.25
    for index in 0..4 {
        assert!(dir.path().join(format!("pressure_{index:05}.dat")).exists());
    }
    assert!(!dir.path().join("pressure_00004.dat").exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 4);

    let text = std::fs::read_to_string(dir.path().join("pressure_00000.dat")).unwrap();
    assert!(text.starts_with("# saved vector:\n"));
    let mut initial = faer::Col::zeros(6);
    load_vector(&mut initial, dir.path().join("pressure_00000.dat")).unwrap();
    assert_eq!(to_vec(&initial), vec![1e5; 6]);
}

#[test]
fn failed_solve_keeps_earlier_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("p");
    let problem = Problem::new("broken", RectangularMesh::new(WIDTH, WIDTH, 2, 2))
        .with_dirichlet(|_, _| Float::NAN);

    let mut driver = Driver::new(Simulation::new(problem))
        .with_observer(SnapshotWriter::new(prefix.to_str().unwrap()));
    let err = driver.run().unwrap_err();

    assert!(matches!(
        err,
        SimError::Solve {
            step: 1,
            source: SparseError::Singular,
            ..
        }
    ));
    assert_eq!(driver.phase(), Phase::Failed);
    assert_eq!(driver.state().step, 0);
    assert!(dir.path().join("p00000.dat").exists());
    assert!(!dir.path().join("p00001.dat").exists());
}

#[test]
fn impermeable_medium_fails_to_factorize() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("p");
    // no edge couples to any other, so every Neumann row of the system is empty
    let problem = Problem::new("sealed", RectangularMesh::new(WIDTH, WIDTH, 2, 3))
        .with_physics(PhysicalParameters {
            permeability: 0.0,
            ..no_gravity()
        });

    let mut driver = Driver::new(Simulation::new(problem))
        .with_observer(SnapshotWriter::new(prefix.to_str().unwrap()));
    let err = driver.run().unwrap_err();

    assert!(
        matches!(
            err,
            SimError::Solve {
                step: 1,
                source: SparseError::Factorization(_),
                ..
            }
        ),
        "{err:?}"
    );
    assert_eq!(driver.phase(), Phase::Failed);
    assert!(dir.path().join("p00000.dat").exists());
    assert!(!dir.path().join("p00001.dat").exists());
}

#[test]
fn configured_case_runs() {
    let config = CaseConfig::from_json_str(
        r#"{ "physics": { "gravity": 0.0 }, "time": { "final_time": 0.2 } }"#,
    )
    .unwrap();
    let mut recorder = Recorder::default();
    let sim = config.build(3, 3).unwrap();
    let top = sim.problem().mesh().edge_for_cell(8, Side::Top);

    let mut driver = Driver::new(sim).with_observer(&mut recorder);
    driver.run().unwrap();
    let state = driver.into_state();

    assert!((state.trace[top] - (1e5 + 1e3 * 5.0 / 6.0)).abs() < 1e-6);
    assert_eq!(recorder.snapshots.len(), 3);
}
