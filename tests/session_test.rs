use agileview::series::Region;
use agileview::session::{GraphKind, SessionContext};
use agileview::sync::Direction;

#[test]
fn snapshot_serializes_for_the_browser() {
    let mut s = SessionContext::new(Region::C);
    s.set_graph(GraphKind::Cost);
    s.step(Direction::Left).unwrap();

    let json = serde_json::to_value(s.snapshot()).unwrap();
    assert_eq!(json["region"], "C");
    assert_eq!(json["region_name"], "London");
    assert_eq!(json["offset"], -1);
    assert_eq!(json["graph"], "cost");
    assert_eq!(json["can_step_right"], true);
}

#[test]
fn graph_switch_returns_to_today() {
    let mut s = SessionContext::new(Region::A);
    s.step(Direction::Left).unwrap();
    s.step(Direction::Left).unwrap();
    assert_eq!(s.offset(), -2);
    assert!(s.take_initial());

    s.set_graph(GraphKind::Consumption);
    assert_eq!(s.offset(), 0);
    assert!(s.take_initial());

    s.set_graph(GraphKind::Consumption);
    assert!(!s.take_initial());
}

#[test]
fn region_switch_forgets_tomorrow() {
    let mut s = SessionContext::new(Region::A);
    s.set_next_available(true);
    s.step(Direction::Right).unwrap();
    s.set_region(Region::B);
    assert_eq!(s.offset(), 0);
    assert!(!s.next_available());
    assert!(s.step(Direction::Right).is_err());
}
