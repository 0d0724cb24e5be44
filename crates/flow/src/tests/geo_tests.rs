use super::*;

fn close(actual: f64, expected: f64, tolerance: f64) -> bool {
    (actual - expected).abs() <= tolerance
}

#[test]
fn same_point_is_zero_meters() {
    assert_eq!(distance_meters(14.5995, 120.9842, 14.5995, 120.9842), 0.0);
}

#[test]
fn one_degree_of_latitude_is_about_111_km() {
    let d = distance_meters(0.0, 0.0, 1.0, 0.0);
    assert!(close(d, 111_195.08, 1.0), "{d}");
}

#[test]
fn manila_to_cebu_matches_known_distance() {
    // Rizal Park to Fuente Osmeña, about 570.6 km great-circle.
    let d = distance_meters(14.5831, 120.9794, 10.3111, 123.8914);
    assert!(close(d, 570_600.0, 1_000.0), "{d}");
}

#[test]
fn distance_is_symmetric() {
    let a = Coordinates::new(14.5547, 121.0244);
    let b = Coordinates::new(14.6507, 121.1029);
    assert_eq!(a.distance_to(&b), b.distance_to(&a));
}

#[test]
fn nearest_picks_the_closest_candidate() {
    let origin = Coordinates::new(14.5547, 121.0244);
    let properties = vec![
        ("quezon-city", Coordinates::new(14.6760, 121.0437)),
        ("bgc", Coordinates::new(14.5509, 121.0503)),
        ("cebu", Coordinates::new(10.3157, 123.8854)),
    ];

    let (closest, meters) = nearest(origin, &properties, |(_, at)| *at).expect("nearest");
    assert_eq!(closest.0, "bgc");
    assert!(meters < 5_000.0, "{meters}");
}

#[test]
fn nearest_skips_unusable_coordinates() {
    let origin = Coordinates::new(0.0, 0.0);
    let candidates = vec![Coordinates::new(f64::NAN, 0.0)];
    assert!(nearest(origin, &candidates, |at| *at).is_none());
    assert!(nearest(origin, &Vec::<Coordinates>::new(), |at| *at).is_none());
}
