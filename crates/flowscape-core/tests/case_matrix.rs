use flowscape_core::case::build;
use flowscape_core::{CaseType, ParameterSet, RunFolder};
use flowscape_grid::{partition, RegionTile, TileMatrix};
use proptest::prelude::*;
use std::collections::HashSet;
use std::path::Path;

fn params() -> ParameterSet {
    ParameterSet {
        city_group: "town".into(),
        expand_distance: 250,
        pixel_size: 60,
        conductance_edge_buffer: 0,
        population_edge_buffer: 3,
        population_edge_buffer_value: 0.5,
        threads: 1,
        radius: 20,
        block_size: 3,
    }
}

proptest! {
    #[test]
    fn matrix_is_two_plus_distinct_tiles(
        h in 1usize..8,
        w in 1usize..8,
        picks in proptest::collection::vec(any::<prop::sample::Index>(), 0..20),
    ) {
        let matrix = TileMatrix::new(h, w).unwrap();
        let border = partition(h, w).unwrap();
        let candidates: Vec<RegionTile> =
            picks.iter().map(|i| border[i.index(border.len())]).collect();
        let distinct: HashSet<RegionTile> = candidates.iter().copied().collect();
        let folder = RunFolder::at(Path::new("/runs"), &params(), &chrono::Local::now());

        let cases = build(&params(), matrix, &candidates, &folder).unwrap();

        prop_assert_eq!(cases.len(), 2 + distinct.len());
        let identities: HashSet<(CaseType, Option<RegionTile>)> =
            cases.iter().map(|c| (c.case_type(), c.region())).collect();
        prop_assert_eq!(identities.len(), cases.len());
        let folders: HashSet<&Path> = cases.iter().map(|c| c.output_location()).collect();
        prop_assert_eq!(folders.len(), cases.len());
        for case in &cases {
            prop_assert_eq!(case.region().is_some(), case.case_type() == CaseType::EdgeRegion);
            prop_assert!(case.output_location().starts_with(folder.path()));
        }
    }
}
