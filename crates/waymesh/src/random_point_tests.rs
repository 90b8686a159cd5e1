//! Tests for area-weighted random point sampling

#[cfg(test)]
mod tests {
    use crate::test_mesh_helpers::{grid_mesh, multi_area_strip_mesh, single_square_data};
    use crate::{MeshQuery, MeshStore, PolyFlags, QueryFilter, SampleRng};
    use waymesh_common::{Error, Result};

    #[test]
    fn test_sampled_point_lies_on_its_polygon() -> Result<()> {
        let store = grid_mesh(3)?;
        let mut query = MeshQuery::new(&store);
        let filter = QueryFilter::default();
        let mut rng = SampleRng::from_seed(1234);

        for _ in 0..100 {
            let (poly_ref, point) = query.find_random_point(&filter, &mut rng)?;

            let (_, poly) = store.poly_at(poly_ref)?;
            assert!(filter.passes(poly));

            // The sample projects onto its own polygon unchanged
            let (projected, over) = store.closest_point_on_poly(poly_ref, &point)?;
            assert!(over, "sample must fall inside the polygon footprint");
            assert!((projected[0] - point[0]).abs() < 1e-4);
            assert!((projected[2] - point[2]).abs() < 1e-4);
        }
        Ok(())
    }

    #[test]
    fn test_identical_seeds_reproduce_sequences() -> Result<()> {
        let store = grid_mesh(3)?;
        let filter = QueryFilter::default();

        let mut run = |seed: u32| -> Result<Vec<(u32, [f32; 3])>> {
            let mut query = MeshQuery::new(&store);
            let mut rng = SampleRng::from_seed(seed);
            (0..20)
                .map(|_| {
                    query
                        .find_random_point(&filter, &mut rng)
                        .map(|(poly_ref, point)| (poly_ref.id(), point))
                })
                .collect()
        };

        assert_eq!(run(7)?, run(7)?);
        assert_ne!(run(7)?, run(8)?);
        Ok(())
    }

    #[test]
    fn test_filter_limits_sampled_polygons() -> Result<()> {
        let store = multi_area_strip_mesh()?;
        let mut query = MeshQuery::new(&store);
        let filter = QueryFilter::new(PolyFlags::all(), PolyFlags::SWIM);
        let mut rng = SampleRng::from_seed(99);

        for _ in 0..50 {
            let (poly_ref, _) = query.find_random_point(&filter, &mut rng)?;
            let (_, poly) = store.poly_at(poly_ref)?;
            assert!(!poly.flags.contains(PolyFlags::SWIM));
        }
        Ok(())
    }

    #[test]
    fn test_no_polygon_satisfies_filter() -> Result<()> {
        let store = grid_mesh(2)?;
        let mut query = MeshQuery::new(&store);
        let mut rng = SampleRng::from_seed(1);

        let filter = QueryFilter::new(PolyFlags::DOOR, PolyFlags::empty());
        let result = query.find_random_point(&filter, &mut rng);
        assert!(matches!(result, Err(Error::NoRandomPoint)));
        Ok(())
    }

    #[test]
    fn test_sampling_is_area_weighted() -> Result<()> {
        // One 1x1 patch and one 30x30 patch: the big one carries ~99.9%
        // of the area and should dominate the samples.
        let mut data = single_square_data();
        {
            let tile = &mut data.tiles[0];
            tile.verts = vec![
                0.0, 0.0, 0.0, //
                1.0, 0.0, 0.0, //
                1.0, 0.0, 1.0, //
                0.0, 0.0, 1.0, //
                50.0, 0.0, 0.0, //
                80.0, 0.0, 0.0, //
                80.0, 0.0, 30.0, //
                50.0, 0.0, 30.0,
            ];
            let small = tile.polys[0].clone();
            let mut big = small.clone();
            big.verts = vec![4, 5, 6, 7];
            tile.polys.push(big);
            tile.bmax = [80.0, 0.0, 30.0];
        }
        let store = MeshStore::load(&data.to_bytes()?)?;

        let mut query = MeshQuery::new(&store);
        let filter = QueryFilter::default();
        let mut rng = SampleRng::from_seed(3);

        let refs: Vec<_> = store.poly_refs().collect();
        let mut big_hits = 0;
        for _ in 0..200 {
            let (poly_ref, _) = query.find_random_point(&filter, &mut rng)?;
            if poly_ref == refs[1] {
                big_hits += 1;
            }
        }

        assert!(big_hits > 180, "big polygon drew only {big_hits}/200 samples");
        Ok(())
    }

    #[test]
    fn test_cache_survives_filter_switches() -> Result<()> {
        let store = multi_area_strip_mesh()?;
        let mut query = MeshQuery::new(&store);

        let open = QueryFilter::default();
        let no_swim = QueryFilter::new(PolyFlags::all(), PolyFlags::SWIM);

        let mut rng = SampleRng::from_seed(5);
        for i in 0..12 {
            let filter = if i % 2 == 0 { &open } else { &no_swim };
            let (poly_ref, _) = query.find_random_point(filter, &mut rng)?;
            let (_, poly) = store.poly_at(poly_ref)?;
            assert!(filter.passes(poly));
        }
        Ok(())
    }
}
