//! Tests for the polygon corridor search

#[cfg(test)]
mod tests {
    use crate::test_mesh_helpers::{
        grid_data, grid_mesh, multi_area_strip_mesh, offmesh_link_mesh, two_component_mesh,
        two_tile_mesh,
    };
    use crate::{MeshQuery, MeshStore, PathResult, PolyFlags, PolyRef, QueryFilter};
    use waymesh_common::{vdist, Error, Result};

    /// Every consecutive pair in a corridor must share a traversable link
    fn assert_corridor_connected(store: &MeshStore, corridor: &[PolyRef]) {
        for pair in corridor.windows(2) {
            let (tile, poly) = store.poly_at(pair[0]).unwrap();
            let link = tile
                .links_of(poly)
                .iter()
                .find(|link| link.target == pair[1])
                .expect("consecutive corridor polygons share a link");
            assert!(!link.is_empty_span());
        }
    }

    #[test]
    fn test_path_across_grid() -> Result<()> {
        let store = grid_mesh(4)?;
        let mut query = MeshQuery::new(&store);
        let filter = QueryFilter::default();

        let start = [5.0, 0.0, 5.0];
        let end = [35.0, 0.0, 35.0];
        let (start_ref, _) = query.find_nearest_poly(&start, &[1.0, 1.0, 1.0], &filter)?;
        let (end_ref, _) = query.find_nearest_poly(&end, &[1.0, 1.0, 1.0], &filter)?;

        let result = query.find_path(start_ref, end_ref, &start, &end, &filter, 128)?;

        assert!(!result.is_partial());
        let corridor = result.corridor();
        assert_eq!(corridor.first(), Some(&start_ref));
        assert_eq!(corridor.last(), Some(&end_ref));
        assert_corridor_connected(&store, corridor);
        Ok(())
    }

    #[test]
    fn test_same_start_and_end() -> Result<()> {
        let store = grid_mesh(2)?;
        let mut query = MeshQuery::new(&store);
        let filter = QueryFilter::default();

        let (poly_ref, point) = query.find_nearest_poly(&[5.0, 0.0, 5.0], &[1.0, 1.0, 1.0], &filter)?;
        let result = query.find_path(poly_ref, poly_ref, &point, &point, &filter, 16)?;

        assert_eq!(result, PathResult::Complete(vec![poly_ref]));
        Ok(())
    }

    #[test]
    fn test_stale_reference_is_rejected() -> Result<()> {
        let store = grid_mesh(2)?;
        let mut query = MeshQuery::new(&store);
        let filter = QueryFilter::default();

        let bogus = PolyRef::new(0xFFFF_FFFF);
        let good = store.poly_refs().next().unwrap();

        let result = query.find_path(bogus, good, &[0.0; 3], &[5.0, 0.0, 5.0], &filter, 16);
        assert!(matches!(result, Err(Error::InvalidPolyRef)));
        Ok(())
    }

    #[test]
    fn test_disjoint_components_find_no_path() -> Result<()> {
        let store = two_component_mesh()?;
        let mut query = MeshQuery::new(&store);
        let filter = QueryFilter::default();

        let (start_ref, start) =
            query.find_nearest_poly(&[5.0, 0.0, 5.0], &[1.0, 1.0, 1.0], &filter)?;
        let (end_ref, end) =
            query.find_nearest_poly(&[105.0, 0.0, 105.0], &[1.0, 1.0, 1.0], &filter)?;

        // Budget generous enough to drain the whole start component
        let result = query.find_path(start_ref, end_ref, &start, &end, &filter, 1000);
        assert!(matches!(result, Err(Error::NoPathFound)));
        Ok(())
    }

    #[test]
    fn test_budget_exhaustion_yields_partial_progress() -> Result<()> {
        let store = two_component_mesh()?;
        let mut query = MeshQuery::new(&store);
        let filter = QueryFilter::default();

        let (start_ref, start) =
            query.find_nearest_poly(&[5.0, 0.0, 5.0], &[1.0, 1.0, 1.0], &filter)?;
        let (end_ref, end) =
            query.find_nearest_poly(&[105.0, 0.0, 105.0], &[1.0, 1.0, 1.0], &filter)?;

        let result = query.find_path(start_ref, end_ref, &start, &end, &filter, 4)?;

        assert!(result.is_partial());
        let corridor = result.corridor();
        assert_eq!(corridor.first(), Some(&start_ref));
        assert_corridor_connected(&store, corridor);

        // The search made monotonic progress: the reached polygon is no
        // farther from the goal than where it started.
        let last_center = store.poly_center(*corridor.last().unwrap())?;
        let start_center = store.poly_center(start_ref)?;
        assert!(vdist(&last_center, &end) <= vdist(&start_center, &end));
        Ok(())
    }

    #[test]
    fn test_arena_exhaustion_yields_partial_progress() -> Result<()> {
        let store = grid_mesh(5)?;
        let mut query = MeshQuery::with_max_nodes(&store, 4);
        let filter = QueryFilter::default();

        let start = [5.0, 0.0, 5.0];
        let end = [45.0, 0.0, 45.0];
        let (start_ref, _) = query.find_nearest_poly(&start, &[1.0, 1.0, 1.0], &filter)?;
        let (end_ref, _) = query.find_nearest_poly(&end, &[1.0, 1.0, 1.0], &filter)?;

        let result = query.find_path(start_ref, end_ref, &start, &end, &filter, 1000)?;
        assert!(result.is_partial());
        assert_eq!(result.corridor().first(), Some(&start_ref));
        Ok(())
    }

    #[test]
    fn test_flag_exclusion_blocks_the_only_corridor() -> Result<()> {
        let store = multi_area_strip_mesh()?;
        let mut query = MeshQuery::new(&store);

        let refs: Vec<PolyRef> = store.poly_refs().collect();
        let start = [5.0, 0.0, 5.0];
        let end = [25.0, 0.0, 5.0];

        // Passable by default
        let open = query.find_path(refs[0], refs[2], &start, &end, &QueryFilter::default(), 64)?;
        assert_eq!(open.corridor(), &[refs[0], refs[1], refs[2]]);

        // The middle polygon is the only route and carries SWIM
        let filter = QueryFilter::new(PolyFlags::all(), PolyFlags::SWIM);
        let blocked = query.find_path(refs[0], refs[2], &start, &end, &filter, 64);
        assert!(matches!(blocked, Err(Error::NoPathFound)));
        Ok(())
    }

    #[test]
    fn test_area_cost_steers_route() -> Result<()> {
        // 3x3 grid with an expensive center cell: going around beats
        // cutting through.
        let mut data = grid_data(3);
        data.tiles[0].polys[4].area = 1;
        let store = MeshStore::load(&data.to_bytes()?)?;

        let mut query = MeshQuery::new(&store);
        let refs: Vec<PolyRef> = store.poly_refs().collect();

        let start = [5.0, 0.0, 15.0]; // cell (0,1)
        let end = [25.0, 0.0, 15.0]; // cell (2,1)

        let mut filter = QueryFilter::default();
        filter.set_area_cost(1, 10.0);

        let result = query.find_path(refs[3], refs[5], &start, &end, &filter, 64)?;
        assert!(!result.is_partial());
        assert!(!result.corridor().contains(&refs[4]));

        // With uniform costs the direct corridor wins
        let direct = query.find_path(refs[3], refs[5], &start, &end, &QueryFilter::default(), 64)?;
        assert_eq!(direct.corridor(), &[refs[3], refs[4], refs[5]]);
        Ok(())
    }

    #[test]
    fn test_path_crosses_tile_boundary() -> Result<()> {
        let store = two_tile_mesh()?;
        let mut query = MeshQuery::new(&store);
        let filter = QueryFilter::default();

        let refs: Vec<PolyRef> = store.poly_refs().collect();
        let result = query.find_path(
            refs[0],
            refs[1],
            &[5.0, 0.0, 5.0],
            &[15.0, 0.0, 5.0],
            &filter,
            16,
        )?;

        assert_eq!(result.corridor(), &refs[..]);
        assert_corridor_connected(&store, result.corridor());
        Ok(())
    }

    #[test]
    fn test_path_through_offmesh_connection() -> Result<()> {
        let store = offmesh_link_mesh()?;
        let mut query = MeshQuery::new(&store);
        let filter = QueryFilter::default();

        let refs: Vec<PolyRef> = store.poly_refs().collect();
        let result = query.find_path(
            refs[0],
            refs[1],
            &[2.0, 0.0, 5.0],
            &[28.0, 0.0, 5.0],
            &filter,
            32,
        )?;

        assert_eq!(result.corridor(), &[refs[0], refs[2], refs[1]]);
        Ok(())
    }

    #[test]
    fn test_search_is_deterministic() -> Result<()> {
        let store = grid_mesh(5)?;
        let filter = QueryFilter::default();
        let refs: Vec<PolyRef> = store.poly_refs().collect();

        let run = || -> Result<Vec<PolyRef>> {
            let mut query = MeshQuery::new(&store);
            Ok(query
                .find_path(
                    refs[0],
                    refs[24],
                    &[5.0, 0.0, 5.0],
                    &[45.0, 0.0, 45.0],
                    &filter,
                    256,
                )?
                .into_corridor())
        };

        assert_eq!(run()?, run()?);
        Ok(())
    }
}
