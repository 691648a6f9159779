//! Property tests for offset functions.

use proptest::prelude::*;

use crate::{AffineExpr, OffsetMap, RtVarBounds};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Every program id in the grid maps to a distinct, in-bounds, tile-aligned origin.
    #[test]
    fn tile_grid_covers_shape_once(
        dims in proptest::collection::vec(1i64..40, 1..4),
        tiles_seed in proptest::collection::vec(1i64..16, 4),
    ) {
        let tiles: Vec<i64> = dims.iter().zip(&tiles_seed).map(|(&d, &t)| t.min(d)).collect();
        let map = OffsetMap::tile_grid(&dims, &tiles);
        let count: i64 = dims.iter().zip(&tiles).map(|(&d, &t)| (d + t - 1) / t).product();

        let mut seen = std::collections::HashSet::new();
        for pid in 0..count {
            let offsets = map.evaluate(pid, &[]).unwrap();
            for ((&o, &d), &t) in offsets.iter().zip(&dims).zip(&tiles) {
                prop_assert!(o >= 0 && o < d);
                prop_assert_eq!(o % t, 0);
            }
            prop_assert!(seen.insert(offsets.to_vec()));
        }
    }

    /// Clamped runtime values never escape their declared bounds.
    #[test]
    fn clamping_respects_bounds(lower in -10i64..10, width in 0i64..10, v in -100i64..100) {
        let upper = lower + width;
        let map = OffsetMap::new([AffineExpr::rt(0)]).with_rt_vars([RtVarBounds::new(lower, upper)]);
        let offset = map.evaluate(0, &[v]).unwrap()[0];
        prop_assert!(offset >= lower && offset <= upper);
    }
}
