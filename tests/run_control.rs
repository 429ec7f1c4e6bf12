//! Run control, stream recovery and persisted response files.

mod common;

use std::fs;

use common::*;
use compton_response::{ResponseConfig, ResponseSet, StorageError};

fn duals(ids: impl IntoIterator<Item = u64>) -> (Vec<compton_response::SimulatedEvent>, Vec<compton_response::RawEventList>) {
    ids.into_iter()
        .map(|id| (compton_then_photo(id), dual_reconstruction(id, 400.0)))
        .unzip()
}

#[test]
fn test_single_stepping_and_interrupt() {
    let dir = tempfile::tempdir().unwrap();
    let (sim, rec) = duals(1..=10);
    let mut builder = builder(config_in(&dir), sim, rec);

    assert!(builder.analyze_next_event().unwrap());
    assert!(builder.analyze_next_event().unwrap());
    let handle = builder.interrupt_handle();
    handle.interrupt();
    assert!(!builder.analyze_next_event().unwrap());

    let summary = builder.finalize().unwrap();
    assert!(summary.interrupted);
    assert_eq!(summary.stats.matched, 2);
    assert_eq!(builder.responses().dual.good.entries(), 2);
}

#[test]
fn test_max_events_limits_matched_events() {
    let dir = tempfile::tempdir().unwrap();
    let (sim, rec) = duals(1..=10);
    let config = ResponseConfig {
        max_events: Some(4),
        ..config_in(&dir)
    };
    let summary = builder(config, sim, rec).run().unwrap();
    assert_eq!(summary.stats.matched, 4);
    assert!(!summary.interrupted);
}

#[test]
fn test_desynchronized_streams_recover() {
    let dir = tempfile::tempdir().unwrap();
    let (mut sim, rec) = duals([1, 2, 3, 4, 5, 6]);
    // no interaction information for event 2, extra hits ignored in event 4
    sim[1].interactions.truncate(1);
    sim[3].ignored_hits = 1;
    sim.remove(4);

    let summary = builder(config_in(&dir), sim, rec).run().unwrap();
    assert_eq!(summary.stats.matched, 3);
    assert_eq!(summary.stats.sanity_failures, 1);
    assert_eq!(summary.stats.good_sequences, 3);
}

#[test]
fn test_checkpoints_are_loadable() {
    let dir = tempfile::tempdir().unwrap();
    let (sim, rec) = duals(1..=3);
    let config = ResponseConfig {
        save_after: 2,
        ..config_in(&dir)
    };
    let mut builder = builder(config.clone(), sim, rec);
    while builder.stats().matched < 2 {
        assert!(builder.analyze_next_event().unwrap());
    }
    assert_eq!(builder.stats().checkpoints_written, 1);

    let checkpoint = ResponseSet::load(&config.output_prefix, &config).unwrap();
    assert_eq!(checkpoint.dual.good.entries(), 2);

    let summary = builder.run().unwrap();
    assert_eq!(summary.stats.matched, 3);
    let last = ResponseSet::load(&config.output_prefix, &config).unwrap();
    assert_eq!(last.dual.good.entries(), 3);
}

#[test]
fn test_files_from_other_configuration_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (sim, rec) = duals(1..=2);
    let config = config_in(&dir);
    builder(config.clone(), sim, rec).run().unwrap();

    let other = ResponseConfig {
        energy_max: 5000.0,
        ..config.clone()
    };
    assert!(matches!(
        ResponseSet::load(&config.output_prefix, &other),
        Err(StorageError::LayoutMismatch { .. })
    ));
}

#[test]
fn test_corrupted_file_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let (sim, rec) = duals(1..=2);
    let config = config_in(&dir);
    builder(config.clone(), sim, rec).run().unwrap();

    let path = ResponseSet::file_path(&config.output_prefix, "dual.good");
    let mut bytes = fs::read(&path).unwrap();
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0xFF;
    fs::write(&path, bytes).unwrap();

    assert!(ResponseSet::load(&config.output_prefix, &config).is_err());
}

#[test]
fn test_merged_runs_add_up() {
    let dir = tempfile::tempdir().unwrap();
    let first = config_in(&dir);
    let second = ResponseConfig {
        output_prefix: dir.path().join("second"),
        ..first.clone()
    };
    let (sim, rec) = duals(1..=3);
    builder(first.clone(), sim, rec).run().unwrap();
    let (sim, rec) = duals(1..=2);
    builder(second.clone(), sim, rec).run().unwrap();

    let mut merged = ResponseSet::load(&first.output_prefix, &first).unwrap();
    merged.merge(&ResponseSet::load(&second.output_prefix, &second).unwrap()).unwrap();
    assert_eq!(merged.dual.good.entries(), 5);
    assert_eq!(merged.good_bad.entries(), 5);
}

#[test]
fn test_unwritable_output_fails_finalize() {
    let dir = tempfile::tempdir().unwrap();
    let (sim, rec) = duals(1..=2);
    let config = ResponseConfig {
        output_prefix: dir.path().join("missing").join("run"),
        save_after: 1,
        ..ResponseConfig::default()
    };
    let mut builder = builder(config, sim, rec);
    while builder.analyze_next_event().unwrap() {}
    assert_eq!(builder.stats().checkpoint_failures, 2);
    assert!(builder.finalize().is_err());
}
