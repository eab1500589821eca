//! Whole-trace properties over randomly generated refinement traces.

use lodsum_core::{BlockRef, SINGLETON_BUCKET};
use lodsum_trace::config::TraceConfig;
use lodsum_trace::delta::decode_singleton_migrations;
use lodsum_trace::generator::{generate_trace, SyntheticParams};
use lodsum_trace::identifiers::{IdentifierMap, MapFormat};
use lodsum_trace::snapshot::decode_snapshot;
use lodsum_trace::store::{MemoryStore, TraceFile, TraceStore};
use lodsum_trace::Trace;
use proptest::prelude::*;

fn arb_params() -> impl Strategy<Value = SyntheticParams> {
    (
        0u64..80,
        1u16..6,
        0usize..40,
        any::<u64>(),
        any::<bool>(),
        0.2f64..0.9,
        prop_oneof![Just(MapFormat::Current), Just(MapFormat::Legacy)],
    )
        .prop_map(|(vertices, depth, edges, seed, typed_start, split_probability, map_format)| {
            SyntheticParams { vertices, depth, edges, seed, map_format, typed_start, split_probability }
        })
}

fn open(params: &SyntheticParams) -> Trace<MemoryStore> {
    let store = generate_trace(params).unwrap();
    let config = TraceConfig {
        typed_start: params.typed_start,
        map_format: params.map_format,
        ..TraceConfig::default()
    };
    Trace::open(store, config).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 48,
        .. ProptestConfig::default()
    })]

    // Property: every level partitions the universe exactly, and block 0 plus
    // the real blocks account for every live block.
    #[test]
    fn every_level_is_an_exact_partition(params in arb_params()) {
        let trace = open(&params);
        let mut r = trace.reconstructor();
        for k in trace.first_level()..=trace.depth() {
            let p = r.reconstruct(k).unwrap();
            p.verify().unwrap();
            prop_assert_eq!(p.entity_to_block.len() as u64, params.vertices);
            let covered: u64 = p.blocks.values().map(|s| s.len() as u64).sum();
            prop_assert_eq!(covered, params.vertices);
            let real = p.blocks.keys().filter(|&&id| id != SINGLETON_BUCKET).count() as u64;
            prop_assert_eq!(p.singleton_count() + real, p.block_count());
            if let Some(stats) = trace.level_stats(k).unwrap() {
                prop_assert_eq!(stats.block_count, p.block_count());
            }
        }
    }

    // Property: the header-only histogram agrees with full reconstruction.
    #[test]
    fn histogram_agrees_with_reconstruction(params in arb_params()) {
        let trace = open(&params);
        let levels = trace.size_histogram().unwrap();
        prop_assert_eq!(levels.len(), usize::from(trace.depth() - trace.first_level()) + 1);
        let mut r = trace.reconstructor();
        for sizes in &levels {
            let p = r.reconstruct(sizes.level).unwrap();
            prop_assert_eq!(&sizes.sizes, &p.size_distribution());
        }
        let created: u64 = levels.last().unwrap().accumulated.values().sum();
        let last = trace.level_stats(trace.depth()).unwrap().unwrap();
        prop_assert_eq!(created, last.accumulated_block_count);
    }

    // Property: reconstruction is a pure function of the trace and the level.
    #[test]
    fn reconstruction_is_idempotent(params in arb_params(), pick in any::<prop::sample::Index>()) {
        let trace = open(&params);
        let span = usize::from(trace.depth() - trace.first_level()) + 1;
        let k = trace.first_level() + pick.index(span) as u16;

        let fresh = trace.reconstruct(k).unwrap();
        prop_assert_eq!(&trace.reconstruct(k).unwrap(), &fresh);

        // Walking to the end first, then back, must not leave residue.
        let mut r = trace.reconstructor();
        r.reconstruct(trace.depth()).unwrap();
        prop_assert_eq!(&r.reconstruct(k).unwrap(), &fresh);
        prop_assert_eq!(&r.reconstruct(k).unwrap(), &fresh);
    }

    // Property: the first level replayed equals its outcome file read directly.
    #[test]
    fn first_level_round_trips(params in arb_params()) {
        let trace = open(&params);
        let first = trace.first_level();
        let direct = decode_snapshot(trace.store().open_required(&TraceFile::Outcome(first)).unwrap()).unwrap();
        let p = trace.reconstruct(first).unwrap();
        let replayed: std::collections::BTreeMap<_, _> =
            p.real_blocks().map(|(id, s)| (id, s.clone())).collect();
        prop_assert_eq!(replayed, direct);
    }

    // Property: both map sub-formats describe the same identifier table.
    #[test]
    fn map_formats_are_equivalent(params in arb_params()) {
        let current = generate_trace(&SyntheticParams { map_format: MapFormat::Current, ..params }).unwrap();
        let legacy = generate_trace(&SyntheticParams { map_format: MapFormat::Legacy, ..params }).unwrap();
        let decode = |store: &MemoryStore, format| {
            IdentifierMap::decode(store.open_required(&TraceFile::LocalGlobalMap).unwrap(), format, true).unwrap()
        };
        prop_assert_eq!(decode(&current, MapFormat::Current), decode(&legacy, MapFormat::Legacy));
    }

    // Property: migrated entities leave their parent and land in the singleton
    // bucket at the next level.
    #[test]
    fn migrations_move_exactly_the_listed_entities(params in arb_params()) {
        let trace = open(&params);
        let mut r = trace.reconstructor();
        for to in trace.first_level() + 1..=trace.depth() {
            let from = to - 1;
            let before = r.reconstruct(from).unwrap();
            let after = r.reconstruct(to).unwrap();
            let migs = decode_singleton_migrations(
                trace.store().open(&TraceFile::SingletonMapping { from }).unwrap(),
            ).unwrap();
            let Some(migs) = migs else { continue };
            let mut migrated = 0u64;
            for m in migs {
                for e in m.entities {
                    prop_assert_eq!(before.block_of(e), Some(BlockRef::Real(m.parent)));
                    prop_assert_eq!(after.block_of(e), Some(BlockRef::Singleton(e)));
                    migrated += 1;
                }
            }
            prop_assert_eq!(after.singleton_count(), before.singleton_count() + migrated);
        }
        prop_assert_eq!(r.reclaimed_singletons(), 0);
    }

    // Property: every generated summary edge has a valid interval and every
    // live block resolves to a global id.
    #[test]
    fn global_views_resolve(params in arb_params()) {
        let trace = open(&params);
        let edges = trace.edge_intervals().unwrap();
        prop_assert_eq!(edges.len() as u64, trace.stats().edge_count);
        let ids = trace.identifiers(false).unwrap();
        let fixed = trace.reconstruct_fixed().unwrap();
        let globals = fixed.global_ids(&ids).unwrap();
        prop_assert_eq!(globals.len() as u64, fixed.block_count());
        let nodes = trace.intervals().unwrap();
        for g in globals.values() {
            let iv = nodes[g];
            prop_assert_eq!(iv.end(), trace.depth());
        }
        let lineage = trace.lineage(&ids).unwrap();
        for e in &lineage {
            prop_assert!(nodes[&e.parent].end() + 1 == e.level);
            prop_assert_eq!(nodes[&e.child].start(), e.level);
        }
    }
}
