//! Cancellation safety, isolated in its own binary because the interrupt
//! flag is process-wide. Kept to a single #[test] so parallel test threads
//! cannot race on the flag.

mod common;

use std::fs;

use common::{fixture, path, register_mesh, write_file};
use kiln_core::{CookOptions, CookOutcome, PackageOutcome};
use kiln_spec::NullProgress;

#[test]
fn test_interrupt_leaves_outputs_complete_or_absent() {
    let fx = fixture(|r| { register_mesh(r); }, &["mesh"]);
    // Sorted cook order: a, b, c. Cooking `b` raises the interrupt flag,
    // which is polled between objects.
    write_file(fx.dir.path(), "models/a.mesh", "alpha\n");
    write_file(fx.dir.path(), "models/b.mesh", "INTERRUPT\n");
    write_file(fx.dir.path(), "models/c.mesh", "gamma\n");

    let options = CookOptions {
        recursive: true,
        ..CookOptions::default()
    };
    let outcome = fx
        .project
        .cook_all_passes(&path("models"), &NullProgress, &options, None)
        .unwrap();
    assert!(matches!(outcome, CookOutcome::Interrupted(s) if s.cooked == 2));

    let cooked_root = fx.dir.path().join(".kiln/cooked/mesh/models");
    // The object that raised the flag still finished; the next one was
    // never started.
    assert_eq!(
        fs::read_to_string(cooked_root.join("a.mesh")).unwrap(),
        "COOKED:alpha\n"
    );
    assert_eq!(
        fs::read_to_string(cooked_root.join("b.mesh")).unwrap(),
        "COOKED:INTERRUPT\n"
    );
    assert!(!cooked_root.join("c.mesh").exists());

    // No staging leftovers.
    for entry in fs::read_dir(&cooked_root).unwrap() {
        let name = entry.unwrap().file_name();
        assert!(!name.to_string_lossy().ends_with(".cooktmp"));
    }

    // A fresh run (which re-arms the flag) picks up where the interrupted
    // one left off, once the operator stops re-triggering the cancel.
    write_file(fx.dir.path(), "models/b.mesh", "beta\n");
    let outcome = fx
        .project
        .cook_all_passes(&path("models"), &NullProgress, &options, None)
        .unwrap();
    assert!(matches!(outcome, CookOutcome::Completed(s) if s.cooked == 3));
    assert!(cooked_root.join("c.mesh").is_file());

    // Packaging honors a pending interrupt the same way.
    kiln_core::request_interrupt();
    let outcome = fx
        .project
        .package_path(&path("models"), &NullProgress, false, None, None)
        .unwrap();
    assert!(matches!(outcome, PackageOutcome::Interrupted));
    kiln_core::reset_interrupt();
}
