//! Property tests: the tree must answer every query exactly like a linear
//! scan, whatever the sequence of insertions and removals.

use gnat::{DistanceMetric, Gnat, GnatConfig, LinearIndex, NearestNeighbors, Point, PointId};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Add(Vec<f64>),
    Remove(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => prop::collection::vec(-50.0..50.0f64, 2).prop_map(Op::Add),
        1 => (0usize..1000).prop_map(Op::Remove),
    ]
}

fn config_strategy() -> impl Strategy<Value = GnatConfig> {
    (2usize..5, 1usize..6, 0usize..10, any::<bool>(), any::<u64>()).prop_map(
        |(degree, leaf, cache, rebalancing, seed)| {
            GnatConfig::new(degree, 2, degree + 2, leaf, cache, rebalancing).with_seed(seed)
        },
    )
}

fn apply(ops: &[Op], tree: &mut Gnat, linear: &mut LinearIndex, cache: usize) -> Vec<PointId> {
    let mut ids = Vec::new();
    for op in ops {
        match op {
            Op::Add(coords) => {
                let a = tree.add(Point::new(coords.clone())).unwrap();
                let b = linear.add(Point::new(coords.clone())).unwrap();
                assert_eq!(a, b);
                ids.push(a);
            }
            Op::Remove(pick) if !ids.is_empty() => {
                let id = ids[pick % ids.len()];
                assert_eq!(tree.remove(id).unwrap(), linear.remove(id).unwrap());
            }
            Op::Remove(_) => {}
        }
        if cache == 0 {
            assert_eq!(tree.tombstones(), 0);
        } else {
            assert!(tree.tombstones() < cache);
        }
    }
    ids
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_queries_match_linear_scan(
        config in config_strategy(),
        ops in prop::collection::vec(op_strategy(), 1..150),
        query in prop::collection::vec(-60.0..60.0f64, 2),
        k in 0usize..12,
        radius in 0.0..40.0f64,
    ) {
        let cache = config.removed_cache_size;
        let mut tree = Gnat::with_metric(config.clone(), DistanceMetric::Euclidean).unwrap();
        let mut linear = LinearIndex::new(DistanceMetric::Euclidean);
        apply(&ops, &mut tree, &mut linear, cache);

        prop_assert_eq!(tree.size(), linear.len());
        prop_assert_eq!(tree.list(), linear.list());

        let query = Point::new(query);
        let got: Vec<PointId> = tree.nearest_k(&query, k).unwrap().iter().map(|r| r.id).collect();
        let want: Vec<PointId> = linear.nearest_k(&query, k).unwrap().iter().map(|r| r.id).collect();
        prop_assert_eq!(got, want);

        let got: Vec<PointId> = tree.nearest_r(&query, radius).unwrap().iter().map(|r| r.id).collect();
        let want: Vec<PointId> = linear.nearest_r(&query, radius).unwrap().iter().map(|r| r.id).collect();
        prop_assert_eq!(got, want);

        if !linear.is_empty() {
            prop_assert_eq!(tree.nearest(&query).unwrap().id, linear.nearest(&query).unwrap().id);
        }
    }

    #[test]
    fn prop_degree_bounds_hold(
        config in config_strategy(),
        ops in prop::collection::vec(op_strategy(), 1..200),
    ) {
        let cache = config.removed_cache_size;
        let (min_degree, max_degree) = (config.min_degree, config.max_degree);
        let mut tree = Gnat::with_metric(config, DistanceMetric::Chebyshev).unwrap();
        let mut linear = LinearIndex::new(DistanceMetric::Chebyshev);
        apply(&ops, &mut tree, &mut linear, cache);

        let stats = tree.stats();
        prop_assert_eq!(stats.live, linear.len());
        if stats.internal_nodes > 0 {
            prop_assert!(stats.min_children >= min_degree);
            prop_assert!(stats.max_children <= max_degree);
        }
    }

    #[test]
    fn prop_ids_survive_rebuild_and_compaction(
        points in prop::collection::vec(prop::collection::vec(-10.0..10.0f64, 3), 1..80),
        seed in any::<u64>(),
    ) {
        let config = GnatConfig::new(3, 2, 5, 3, 1000, true).with_seed(seed);
        let mut tree = Gnat::with_metric(config, DistanceMetric::Euclidean).unwrap();
        let ids = tree.add_list(points.iter().cloned().map(Point::new).collect()).unwrap();
        for &id in ids.iter().skip(1).step_by(2) {
            tree.remove(id).unwrap();
        }
        tree.compact();
        prop_assert_eq!(tree.tombstones(), 0);
        tree.rebuild().unwrap();

        for (i, &id) in ids.iter().enumerate() {
            if i % 2 == 1 {
                prop_assert!(tree.get(id).is_none());
            } else {
                let expected = Point::new(points[i].clone());
                prop_assert_eq!(tree.get(id), Some(&expected));
            }
        }
    }
}
