//! Tests for mesh blob parsing and load validation
//!
//! Loading must be all-or-nothing: a malformed blob never yields a
//! partially usable store.

#[cfg(test)]
mod tests {
    use byteorder::{LittleEndian, WriteBytesExt};

    use crate::binary_format::{LinkData, MeshData, MESH_MAGIC, MESH_VERSION};
    use crate::test_mesh_helpers::{grid_data, single_square_data};
    use crate::MeshStore;
    use waymesh_common::Error;

    #[test]
    fn test_round_trip_well_formed_blob() {
        let bytes = grid_data(3).to_bytes().unwrap();
        let store = MeshStore::load(&bytes).unwrap();

        assert!(store.tile_count() > 0);
        assert!(store.poly_count() > 0);
        assert_eq!(store.poly_count(), 9);
    }

    #[test]
    fn test_parsed_data_matches_written_data() {
        let data = grid_data(2);
        let bytes = data.to_bytes().unwrap();
        let parsed = MeshData::from_bytes(&bytes).unwrap();

        assert_eq!(parsed, data);
    }

    #[test]
    fn test_bad_magic_is_rejected() {
        let mut bytes = single_square_data().to_bytes().unwrap();
        bytes[0] ^= 0xFF;

        assert!(matches!(
            MeshStore::load(&bytes),
            Err(Error::InvalidMesh(_))
        ));
    }

    #[test]
    fn test_version_mismatch_is_rejected() {
        let mut bytes = Vec::new();
        bytes.write_u32::<LittleEndian>(MESH_MAGIC).unwrap();
        bytes.write_u32::<LittleEndian>(MESH_VERSION + 1).unwrap();
        bytes.write_u32::<LittleEndian>(1).unwrap();

        assert!(matches!(
            MeshStore::load(&bytes),
            Err(Error::InvalidMesh(_))
        ));
    }

    #[test]
    fn test_truncation_at_every_prefix_is_rejected() {
        let bytes = single_square_data().to_bytes().unwrap();

        for len in 0..bytes.len() {
            assert!(
                matches!(MeshStore::load(&bytes[..len]), Err(Error::InvalidMesh(_))),
                "prefix of {len} bytes must not load"
            );
        }
    }

    #[test]
    fn test_zero_tiles_is_rejected() {
        let mut bytes = Vec::new();
        bytes.write_u32::<LittleEndian>(MESH_MAGIC).unwrap();
        bytes.write_u32::<LittleEndian>(MESH_VERSION).unwrap();
        bytes.write_u32::<LittleEndian>(0).unwrap();

        assert!(matches!(
            MeshStore::load(&bytes),
            Err(Error::InvalidMesh(_))
        ));
    }

    #[test]
    fn test_vertex_index_out_of_range_is_rejected() {
        let mut data = single_square_data();
        data.tiles[0].polys[0].verts[2] = 99;

        let bytes = data.to_bytes();
        // The writer itself may not police indices; the loader must.
        if let Ok(bytes) = bytes {
            assert!(matches!(
                MeshStore::load(&bytes),
                Err(Error::InvalidMesh(_))
            ));
        }
    }

    #[test]
    fn test_link_to_missing_poly_is_rejected() {
        let mut data = single_square_data();
        data.tiles[0].polys[0].links.push(LinkData {
            edge: 0,
            target_tile: 0,
            target_poly: 7,
            span_min: 0,
            span_max: 255,
        });

        let bytes = data.to_bytes().unwrap();
        assert!(matches!(
            MeshStore::load(&bytes),
            Err(Error::InvalidMesh(_))
        ));
    }

    #[test]
    fn test_one_way_link_is_rejected() {
        let mut data = grid_data(2);
        // Sever poly 1's link back to poly 0, leaving a one-way edge
        data.tiles[0].polys[1].links.retain(|l| l.target_poly != 0);

        let bytes = data.to_bytes().unwrap();
        assert!(matches!(
            MeshStore::load(&bytes),
            Err(Error::InvalidMesh(_))
        ));
    }

    #[test]
    fn test_degenerate_ground_poly_is_rejected() {
        let mut data = single_square_data();
        data.tiles[0].polys[0].verts.truncate(2);

        // Rejected by the writer, and by the loader if written raw
        assert!(data.to_bytes().is_err());
    }
}
