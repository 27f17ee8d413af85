//! Integration tests for the GNAT index

use gnat::{
    DistanceMetric, Gnat, GnatConfig, GnatError, LinearIndex, NearestNeighbors, Point, PointId,
};
use tempfile::TempDir;

fn p(coords: &[f64]) -> Point {
    Point::new(coords.to_vec())
}

fn scenario() -> Gnat {
    let config = GnatConfig::new(2, 2, 3, 2, 4, false);
    let mut index = Gnat::with_metric(config, DistanceMetric::Euclidean).unwrap();
    for coords in [[0.0, 0.0], [10.0, 0.0], [0.0, 10.0], [5.0, 5.0]] {
        index.add(p(&coords)).unwrap();
    }
    index
}

#[test]
fn test_scenario_queries() {
    let index = scenario();

    assert_eq!(index.nearest(&p(&[1.0, 1.0])).unwrap().point, p(&[0.0, 0.0]));

    let knn: Vec<Point> = index
        .nearest_k(&p(&[1.0, 1.0]), 2)
        .unwrap()
        .into_iter()
        .map(|r| r.point)
        .collect();
    assert_eq!(knn, vec![p(&[0.0, 0.0]), p(&[5.0, 5.0])]);

    let within = index.nearest_r(&p(&[5.0, 5.0]), 7.2).unwrap();
    assert_eq!(within.len(), 4);
    assert_eq!(within[0].point, p(&[5.0, 5.0]));
}

#[test]
fn test_basic_workflow() {
    let mut index = Gnat::default();

    // Insert points
    let a = index.add(p(&[1.0, 0.0, 0.0])).unwrap();
    let b = index.add(p(&[0.0, 1.0, 0.0])).unwrap();
    index.add(p(&[0.0, 0.0, 1.0])).unwrap();
    assert_eq!(index.size(), 3);
    assert!(index.contains(b));

    // Search
    let results = index.nearest_k(&p(&[1.0, 0.1, 0.0]), 2).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, a);

    // Remove
    assert!(index.remove(b).unwrap());
    assert_eq!(index.size(), 2);
    assert!(!index.contains(b));
    assert_eq!(index.list(), vec![p(&[1.0, 0.0, 0.0]), p(&[0.0, 0.0, 1.0])]);
}

#[test]
fn test_readding_equal_point_gets_new_id() {
    let mut index = scenario();
    let first = index.nearest(&p(&[5.0, 5.0])).unwrap().id;
    index.remove(first).unwrap();

    let again = index.add(p(&[5.0, 5.0])).unwrap();
    assert_ne!(again, first);
    assert_eq!(again, PointId::new(4));
    assert_eq!(index.nearest(&p(&[5.0, 5.0])).unwrap().id, again);
}

#[test]
fn test_different_metrics() {
    for metric in [
        DistanceMetric::Euclidean,
        DistanceMetric::Manhattan,
        DistanceMetric::Chebyshev,
    ] {
        let mut index = Gnat::with_metric(GnatConfig::default(), metric).unwrap();
        index.add(p(&[1.0, 2.0, 3.0])).unwrap();
        index.add(p(&[4.0, 4.0, 4.0])).unwrap();

        let result = index.nearest(&p(&[1.0, 2.0, 3.0])).unwrap();
        assert_eq!(result.id.index(), 0);
        assert_eq!(result.distance, 0.0);
    }
}

#[test]
fn test_custom_distance_function() {
    let mut index = Gnat::new(GnatConfig::new(2, 2, 3, 2, 10, false)).unwrap();
    // distance on the first coordinate only
    index
        .set_distance_function(|a, b| (a.as_slice()[0] - b.as_slice()[0]).abs())
        .unwrap();
    for i in 0..20 {
        index.add(p(&[i as f64, (100 - i) as f64])).unwrap();
    }
    let hit = index.nearest(&p(&[7.2, 0.0])).unwrap();
    assert_eq!(hit.point, p(&[7.0, 93.0]));
}

#[test]
fn test_save_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("points.txt");

    let mut index = Gnat::with_metric(
        GnatConfig::new(3, 2, 4, 4, 20, true),
        DistanceMetric::Euclidean,
    )
    .unwrap();
    let ids: Vec<PointId> = (0..50)
        .map(|i| index.add(p(&[i as f64 * 0.1, (i % 7) as f64 / 3.0])).unwrap())
        .collect();
    for &id in ids.iter().step_by(5) {
        index.remove(id).unwrap();
    }
    assert_eq!(index.save(&path).unwrap(), 40);

    let mut restored = Gnat::default();
    assert_eq!(restored.load(&path).unwrap(), 40);
    assert_eq!(restored.list(), index.list());

    let query = p(&[2.0, 1.0]);
    let want: Vec<Point> = index.nearest_k(&query, 5).unwrap().into_iter().map(|r| r.point).collect();
    let got: Vec<Point> = restored.nearest_k(&query, 5).unwrap().into_iter().map(|r| r.point).collect();
    assert_eq!(got, want);
}

#[test]
fn test_failed_load_keeps_contents() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.txt");
    std::fs::write(&path, "1 2\n3 4\n5 oops\n").unwrap();

    let mut index = scenario();
    let err = index.load(&path).unwrap_err();
    assert!(matches!(err, GnatError::Parse { line: 3, .. }));
    assert_eq!(index.size(), 4);

    assert!(matches!(
        index.load(dir.path().join("missing.txt")),
        Err(GnatError::Io(_))
    ));
    assert_eq!(index.size(), 4);
}

#[test]
fn test_error_cases() {
    let mut index = scenario();
    assert!(matches!(
        index.add(p(&[1.0])),
        Err(GnatError::InvalidInput { .. })
    ));
    assert!(matches!(
        index.nearest_r(&p(&[0.0, 0.0]), -1.0),
        Err(GnatError::InvalidInput { .. })
    ));
    assert!(!index.remove(PointId::new(42)).unwrap());
    assert!(matches!(
        index.set_metric(DistanceMetric::Manhattan),
        Err(GnatError::InvalidState(_))
    ));

    index.clear();
    assert!(matches!(
        index.nearest(&p(&[0.0, 0.0])),
        Err(GnatError::NotFound(_))
    ));
}

#[test]
fn test_config_from_json_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gnat.json");
    std::fs::write(&path, r#"{ "degree": 4, "min_degree": 2, "max_degree": 6, "seed": 7 }"#).unwrap();

    let config = GnatConfig::from_json_file(&path).unwrap();
    assert_eq!(config.degree, 4);
    assert_eq!(config.max_num_pts_per_leaf, 50);
    assert!(Gnat::new(config).is_ok());
}

/// Drive both implementations through the shared trait.
fn exercise<I: NearestNeighbors>(index: &mut I) -> Vec<PointId> {
    let ids = index
        .add_list((0..120).map(|i| p(&[(i % 11) as f64, (i / 11) as f64])).collect())
        .unwrap();
    for &id in ids.iter().step_by(3) {
        assert!(index.remove(id).unwrap());
    }
    index
        .nearest_k(&p(&[4.2, 5.1]), 10)
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect()
}

#[test]
fn test_gnat_agrees_with_linear_index() {
    let mut tree = Gnat::with_metric(
        GnatConfig::new(4, 2, 6, 5, 8, false),
        DistanceMetric::Manhattan,
    )
    .unwrap();
    let mut linear = LinearIndex::new(DistanceMetric::Manhattan);

    assert_eq!(exercise(&mut tree), exercise(&mut linear));
    assert_eq!(NearestNeighbors::len(&tree), linear.len());
    assert_eq!(tree.list(), linear.list());
}
