//! End-to-end response learning through the public builder API.
//!
//! Every test feeds hand-built simulated events and reconstructions through
//! a `ResponseBuilder` and inspects the matrices it accumulated.

mod common;

use common::*;
use compton_response::response::{create_log_dist, DistOptions};
use compton_response::{Position, RawEvent, RawEventList, ResponseConfig, SiteFactory, Verdict};

/// Two hits whose energies match the simulation exactly land in the good
/// dual matrix.
#[test]
fn test_matching_dual_is_good() {
    let dir = tempfile::tempdir().unwrap();
    let mut builder = builder(config_in(&dir), vec![compton_then_photo(1)], vec![dual_reconstruction(1, 400.0)]);
    let summary = builder.run().unwrap();

    let responses = builder.responses();
    assert_eq!(responses.dual.good.entries(), 1);
    assert_eq!(responses.dual.bad.entries(), 0);
    assert_eq!(responses.good_bad.value_at(&[Verdict::Good.coordinate(), 2.0]), 1.0);
    assert_eq!(summary.stats.good_sequences, 1);
    assert_eq!(summary.stats.bad_sequences, 0);
}

/// A stop site 50 keV short of the photo-absorbed energy exceeds the
/// 3 * 5 + 2 keV tolerance.
#[test]
fn test_short_absorption_is_bad_dual() {
    let dir = tempfile::tempdir().unwrap();
    let mut builder = builder(config_in(&dir), vec![compton_then_photo(1)], vec![dual_reconstruction(1, 350.0)]);
    let summary = builder.run().unwrap();

    let responses = builder.responses();
    assert_eq!(responses.dual.good.entries(), 0);
    assert_eq!(responses.dual.bad.entries(), 1);
    assert_eq!(responses.good_bad.value_at(&[Verdict::Bad.coordinate(), 2.0]), 1.0);
    assert_eq!(summary.stats.bad_sequences, 1);
}

/// Skipping the second scatter leaves a gap in the interaction chain.
#[test]
fn test_gap_in_sequence_is_bad() {
    let dir = tempfile::tempdir().unwrap();
    let event = triple_compton(3);
    let mut f = SiteFactory::new();
    let mut sites = leaves(&mut f, &event, 2.0);
    // origins {2}, {4}, {5}; interaction 3 exists but is not proposed
    sites.remove(1);
    let raw = RawEvent::ordered(3, 850.0, 4.0, sites);

    let mut builder = builder(config_in(&dir), vec![event], vec![RawEventList::new(vec![raw])]);
    let summary = builder.run().unwrap();

    let responses = builder.responses();
    assert_eq!(summary.stats.raw_events_analyzed, 1);
    assert_eq!(summary.stats.bad_sequences, 1);
    assert_eq!(responses.compton.bad.entries(), 1);
    assert_eq!(responses.compton.good.entries(), 0);
    assert_eq!(responses.good_bad.value_at(&[Verdict::Bad.coordinate(), 3.0]), 1.0);
}

/// The correct order of a four-site event only fills good matrices.
#[test]
fn test_true_order_of_long_sequence_is_good() {
    let dir = tempfile::tempdir().unwrap();
    let event = triple_compton(4);
    let mut f = SiteFactory::new();
    let raw = RawEvent::ordered(4, 1000.0, 4.0, leaves(&mut f, &event, 2.0));

    let mut builder = builder(config_in(&dir), vec![event], vec![RawEventList::new(vec![raw])]);
    let summary = builder.run().unwrap();

    let responses = builder.responses();
    assert_eq!(summary.stats.good_sequences, 1);
    assert_eq!(responses.start.good.entries(), 1);
    assert_eq!(responses.compton.good.entries(), 2);
    assert_eq!(responses.compton_distance.good.entries(), 2);
    assert_eq!(responses.photo_distance.good.entries(), 1);
    for (name, matrix) in responses.matrices() {
        if name.ends_with(".bad") {
            assert_eq!(matrix.entries(), 0, "unexpected entry in {name}");
        }
    }
}

/// A start site merging two Compton scatters of the same photon is never a
/// valid start.
#[test]
fn test_two_comptons_in_start_site_are_bad() {
    let dir = tempfile::tempdir().unwrap();
    let event = photon_history(
        5,
        &[200.0, 150.0, 650.0],
        &[
            Position::new(0.0, 0.0, 0.0),
            Position::new(0.0, 0.0, 0.5),
            Position::new(0.0, 0.0, 6.0),
        ],
    );
    let mut f = SiteFactory::new();
    let mut sites = leaves(&mut f, &event, 2.0);
    let stop = sites.pop().unwrap();
    let start = f.cluster(sites);
    let raw = RawEvent::ordered(5, 1000.0, 4.0, vec![start, stop]);

    let mut builder = builder(config_in(&dir), vec![event], vec![RawEventList::new(vec![raw])]);
    builder.run().unwrap();

    let responses = builder.responses();
    assert_eq!(responses.dual.bad.entries(), 1);
    assert_eq!(responses.dual.good.entries(), 0);
}

/// The start energy axis: 18 log bins from 100 to 5000 keV plus outer
/// edges at 1 keV and 20 MeV.
#[test]
fn test_start_energy_axis_edges() {
    let edges = create_log_dist(100.0, 5000.0, 18, DistOptions::bounded(1.0, 20_000.0));
    assert_eq!(edges.len(), 21);
    assert_eq!(edges[0], 1.0);
    assert_eq!(edges[20], 20_000.0);
    assert!((edges[1] - 100.0).abs() < 1e-9);
    assert!((edges[19] - 5000.0).abs() < 1e-6);
    assert!(edges.windows(2).all(|w| w[0] < w[1]));
    let ratio = edges[2] / edges[1];
    for w in edges[1..20].windows(2) {
        assert!((w[1] / w[0] - ratio).abs() < 1e-9);
    }
}

/// Raw events of one list are analyzed independently.
#[test]
fn test_every_hypothesis_is_analyzed() {
    let dir = tempfile::tempdir().unwrap();
    let event = compton_then_photo(1);
    // site IDs are unique over the whole list
    let mut f = SiteFactory::new();
    let ordered = RawEvent::ordered(1, 500.0, 5.0, leaves(&mut f, &event, 3.0));
    let mut swapped = RawEvent::ordered(1, 500.0, 5.0, leaves(&mut f, &event, 3.0));
    swapped.sequence = vec![1, 0];
    let mut single = RawEvent::ordered(1, 500.0, 5.0, leaves(&mut f, &event, 3.0));
    single.sites.truncate(1);
    single.sequence = vec![0];
    let list = RawEventList::new(vec![ordered, swapped, single]);

    let mut builder = builder(config_in(&dir), vec![event], vec![list]);
    let summary = builder.run().unwrap();

    assert_eq!(summary.stats.raw_events_analyzed, 2);
    assert_eq!(summary.stats.raw_events_skipped, 1);
    assert_eq!(builder.responses().dual.good.entries(), 1);
    assert_eq!(builder.responses().dual.bad.entries(), 1);
}

/// Sites beyond the configured maximum skip the raw event.
#[test]
fn test_long_sequences_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let config = ResponseConfig {
        max_interactions: 3,
        ..config_in(&dir)
    };
    let event = triple_compton(2);
    let mut f = SiteFactory::new();
    let raw = RawEvent::ordered(2, 1000.0, 4.0, leaves(&mut f, &event, 2.0));

    let mut builder = builder(config, vec![event], vec![RawEventList::new(vec![raw])]);
    let summary = builder.run().unwrap();

    assert_eq!(summary.stats.matched, 1);
    assert_eq!(summary.stats.raw_events_skipped, 1);
    assert_eq!(builder.responses().total_entries(), 0);
}
