use test_case::test_case;

use crate::{AffineExpr, Error, OffsetMap, RtVarBounds};

#[test_case(0, &[0, 0]; "first tile")]
#[test_case(1, &[0, 32]; "second column")]
#[test_case(4, &[16, 0]; "wraps to next row")]
#[test_case(7, &[16, 96]; "last tile")]
fn tile_grid_decomposes_pid(pid: i64, expected: &[i64]) {
    // [32, 128] tiled [16, 32]: 2 x 4 tiles.
    let map = OffsetMap::tile_grid(&[32, 128], &[16, 32]);
    assert_eq!(map.evaluate(pid, &[]).unwrap().as_slice(), expected);
}

#[test]
fn runtime_values_are_clamped() {
    let map = OffsetMap::new([AffineExpr::rt(0) * 4, AffineExpr::pid() * 8 + AffineExpr::rt(1)])
        .with_rt_vars([RtVarBounds::new(0, 3), RtVarBounds::new(-2, 2)]);

    assert_eq!(map.evaluate(1, &[10, -7]).unwrap().as_slice(), &[12, 6]);
    assert_eq!(map.evaluate(0, &[2, 1]).unwrap().as_slice(), &[8, 1]);
}

#[test]
fn runtime_value_count_is_checked() {
    let map = OffsetMap::new([AffineExpr::rt(0)]).with_rt_vars([RtVarBounds::new(0, 3)]);
    let err = map.evaluate(0, &[]).unwrap_err();
    assert_eq!(err, Error::RuntimeValueCount { expected: 1, actual: 0 });
}

#[test]
fn unresolved_symbols_are_rejected() {
    let map = OffsetMap::new([AffineExpr::pid() * 16, AffineExpr::sym(2) * 4]);
    assert_eq!(map.check_resolved().unwrap_err(), Error::UnresolvedSymbol { symbol: 2 });
    assert!(map.evaluate(0, &[]).is_err());
}

#[test]
fn zero_divisor_is_rejected() {
    let map = OffsetMap::new([AffineExpr::pid().floor_div(0)]);
    assert!(matches!(map.check_resolved(), Err(Error::NonPositive { .. })));
}

#[test]
fn display_is_readable() {
    let map = OffsetMap::new([AffineExpr::pid().floor_div(4) * 16]).with_rt_vars([RtVarBounds::new(0, 7)]);
    assert_eq!(map.to_string(), "(pid, rt0) -> (((pid) floordiv 4) * 16), rt0 in [0, 7]");
}
