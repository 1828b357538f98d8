use nalgebra_sparse as nas;

use itertools::{izip, Itertools};

use super::{EntityCollection, Mesh, MeshError};
use crate::adjacency::{Adjacency, Orientation};
use crate::simplex::{down_template, sub_entity_count, EntityDim};

/// Construct a mesh from raw element vertices.
///
/// The vertices are given as a flat array,
/// where every `dim + 1` ids correspond to one `dim`-simplex.
pub fn build_mesh(dim: usize, elements: Vec<usize>) -> Result<Mesh, MeshError> {
    let dim = EntityDim::try_from(dim)?;
    if dim == EntityDim::Vert {
        return Err(MeshError::InvalidDimension(0));
    }
    let simplex_size = dim.vert_count();
    if elements.len() % simplex_size != 0 {
        return Err(MeshError::IndexCountMismatch {
            len: elements.len(),
            simplex_size,
        });
    }
    if elements.is_empty() {
        return Err(MeshError::NoElements);
    }
    if let Some(element) = elements
        .chunks_exact(simplex_size)
        .position(|verts| !verts.iter().all_unique())
    {
        return Err(MeshError::DegenerateElement { element });
    }

    let max_vert = elements.iter().copied().max().unwrap_or(0);
    let vert_count = max_vert
        .checked_add(1)
        .ok_or(MeshError::VertexIdOutOfRange { id: max_vert })?;

    // collection for every dimension of entity, including 0
    // (even though those are just the vertices),
    // for unified storage and iteration
    let mut entities: Vec<EntityCollection> = EntityDim::ALL[..=dim.index()]
        .iter()
        .map(|d| EntityCollection {
            simplex_size: d.vert_count(),
            down: vec![Adjacency::default(); d.index()],
            up: vec![Adjacency::default(); dim.index() + 1],
            ..Default::default()
        })
        .collect();

    // the collection of 0-simplices is just the vertices in order
    entities[0].verts = (0..vert_count).collect();
    // highest dimension entities are the elements as given
    entities[dim.index()].verts = elements;

    //
    // compute intermediate entities
    //

    // every sub-entity of every element is an entity of the mesh.
    // they're collected with their vertices sorted
    // so that the copies seen from different elements compare equal,
    // then sorted lexicographically to remove the duplicates
    for sub in &EntityDim::ALL[1..dim.index()] {
        let sub_size = sub.vert_count();
        let sub_count = sub_entity_count(dim, *sub);
        let element_count = entities[dim.index()].len();

        let mut sub_verts: Vec<usize> = Vec::with_capacity(element_count * sub_count * sub_size);
        for element in entities[dim.index()].verts.chunks_exact(simplex_size) {
            for which in 0..sub_count {
                let start = sub_verts.len();
                sub_verts.extend(
                    down_template(dim, *sub, which)
                        .iter()
                        .map(|&local| element[local as usize]),
                );
                sub_verts[start..].sort_unstable();
            }
        }

        let unique_verts = sub_verts
            .chunks_exact(sub_size)
            .sorted_unstable()
            .dedup()
            .flatten()
            .copied()
            .collect_vec();
        log::trace!(
            "derived {} {sub} entities from {element_count} elements",
            unique_verts.len() / sub_size
        );
        entities[sub.index()].verts = unique_verts;
    }

    // lookup tables from sorted vertices to entity index,
    // needed to connect the entities of different dimensions
    for collection in &mut entities {
        collection.index_map = collection
            .verts
            .chunks_exact(collection.simplex_size)
            .enumerate()
            .map(|(idx, verts)| (verts.iter().copied().sorted_unstable().collect_vec(), idx))
            .collect();
    }

    //
    // compute adjacencies
    //

    for high in &EntityDim::ALL[1..=dim.index()] {
        for low in &EntityDim::ALL[..high.index()] {
            let (lower, upper) = entities.split_at_mut(high.index());
            connect(&mut upper[0], &mut lower[low.index()], *high, *low);
        }
    }

    //
    // identify mesh boundary
    //

    // resize the boundary sets to fit all entities
    for collection in &mut entities {
        let len = collection.len();
        collection.mesh_boundary.grow(len);
    }

    // if a side (codimension 1 entity) is only in one element,
    // then it is on the boundary of the mesh
    let side = dim
        .lower()
        .expect("mesh dimension was checked to be at least 1");
    let side_elements = &entities[side.index()].up[dim.index()];
    let boundary_sides = (0..side_elements.row_count())
        .filter(|&s| side_elements.degree(s) == 1)
        .collect_vec();
    for &s in &boundary_sides {
        entities[side.index()].mesh_boundary.insert(s);
    }
    // sub-entities of boundary sides are also on the boundary
    for low in &EntityDim::ALL[..side.index()] {
        let sides_down = &entities[side.index()].down[low.index()];
        let marked = boundary_sides
            .iter()
            .flat_map(|&s| sides_down.targets_of(s).iter().copied())
            .collect_vec();
        for idx in marked {
            entities[low.index()].mesh_boundary.insert(idx);
        }
    }

    let counts = entities.iter().map(EntityCollection::len).collect_vec();
    log::debug!("built {dim} mesh with entity counts {counts:?} by dimension");

    Ok(Mesh { dim, entities })
}

/// Build the down adjacency from `high` entities to their `low` sub-entities
/// and the up adjacency in the other direction.
fn connect(
    high_entities: &mut EntityCollection,
    low_entities: &mut EntityCollection,
    high: EntityDim,
    low: EntityDim,
) {
    let sub_count = sub_entity_count(high, low);
    let arc_count = high_entities.len() * sub_count;
    let mut targets: Vec<usize> = Vec::with_capacity(arc_count);
    let mut codes: Vec<Orientation> = Vec::with_capacity(arc_count);

    // buffers for the sub-entity currently being processed
    let mut local: Vec<usize> = Vec::with_capacity(low.vert_count());
    let mut key: Vec<usize> = Vec::with_capacity(low.vert_count());
    for verts in high_entities.verts.chunks_exact(high.vert_count()) {
        for which in 0..sub_count {
            local.clear();
            local.extend(
                down_template(high, low, which)
                    .iter()
                    .map(|&l| verts[l as usize]),
            );
            key.clear();
            key.extend_from_slice(&local);
            key.sort_unstable();

            let target = *low_entities
                .index_map
                .get(&key)
                .expect("Sub-entity missing from its collection. This is a bug in simplex-refine");
            // lower-dimensional entities are stored in ascending vertex order,
            // so the rotation is the position of the smallest vertex
            let rotation = local.iter().position_min().unwrap_or(0);

            targets.push(target);
            codes.push(Orientation::new(which as u8, rotation as u8));
        }
    }

    // the up adjacency is the transpose of the down adjacency.
    // sparse matrix rows must have their columns in ascending order,
    // so sort each row for the matrix while keeping the local order for the down adjacency
    let mut sorted_targets = Vec::with_capacity(arc_count);
    let mut sorted_codes = Vec::with_capacity(arc_count);
    for (row_targets, row_codes) in izip!(
        targets.chunks_exact(sub_count),
        codes.chunks_exact(sub_count)
    ) {
        for (target, code) in izip!(row_targets, row_codes).sorted_unstable_by_key(|(t, _)| **t) {
            sorted_targets.push(*target);
            sorted_codes.push(*code);
        }
    }
    let row_offsets = (0..=high_entities.len()).map(|row| row * sub_count).collect();
    let down_matrix = nas::CsrMatrix::try_from_csr_data(
        high_entities.len(),
        low_entities.len(),
        row_offsets,
        sorted_targets,
        sorted_codes,
    )
    .expect("Error in down adjacency construction. This is a bug in simplex-refine");

    low_entities.up[high.index()] = Adjacency::from(&down_matrix.transpose());
    high_entities.down[low.index()] = Adjacency::with_degree(sub_count, targets, codes);
}

//
// tests
//

/// A small hexagon-shaped 2D mesh for testing basic functionality.
/// Shaped somewhat like this:
///    ____
///   /\  /\
///  /__\/__\
///  \  /\  /
///   \/__\/
///
/// with vertices and triangles ordered left to right, top to bottom.
/// Vertex 3 in the middle is the only interior vertex.
#[doc(hidden)]
pub fn tiny_mesh_2d() -> Mesh {
    #[rustfmt::skip]
    let elements = vec![
        0, 2, 3,
        0, 1, 3,
        1, 3, 4,
        2, 3, 5,
        3, 5, 6,
        3, 4, 6,
    ];
    Mesh::new(2, elements).expect("tiny 2d mesh is valid")
}

/// A small 3D mesh for testing basic functionality.
/// Four tetrahedra arranged into a diamond shape,
/// split like this down the x,y plane:
///
///    /\
///   /__\
///   \  /
///    \/
///
/// and with a single point both up and down the z-axis.
/// Edge (1, 2) in the middle is the only interior edge.
#[doc(hidden)]
pub fn tiny_mesh_3d() -> Mesh {
    #[rustfmt::skip]
    let elements = vec![
        0, 1, 2, 4,
        0, 1, 2, 5,
        1, 2, 3, 4,
        1, 2, 3, 5,
    ];
    Mesh::new(3, elements).expect("tiny 3d mesh is valid")
}
