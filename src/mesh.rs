//! Read-only simplicial mesh topology.

/// Low-level mesh construction and corresponding tests.
mod mesh_construction;
/// re-export the testing meshes for use in other modules' tests
#[doc(hidden)]
pub use mesh_construction::{tiny_mesh_2d, tiny_mesh_3d};

//

use fixedbitset as fb;
use std::collections::HashMap;

use crate::adjacency::Adjacency;
use crate::simplex::EntityDim;

/// Error in constructing a mesh from raw element data.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    /// The requested dimension isn't one of edge, face or region.
    #[error("Invalid mesh dimension {0}, expected 1, 2 or 3")]
    InvalidDimension(usize),
    /// The element vertex list doesn't split evenly into elements.
    #[error("Element index count {len} is not a multiple of the simplex size {simplex_size}")]
    IndexCountMismatch {
        /// Length of the given index list.
        len: usize,
        /// Number of vertices in one element.
        simplex_size: usize,
    },
    /// An element refers to the same vertex more than once.
    #[error("Element {element} has a repeated vertex")]
    DegenerateElement {
        /// Index of the offending element.
        element: usize,
    },
    /// No elements were given.
    #[error("Mesh has no elements")]
    NoElements,
    /// A vertex id is too large to count the vertices up to it.
    #[error("Vertex id {id} is out of range")]
    VertexIdOutOfRange {
        /// The offending vertex id.
        id: usize,
    },
}

/// Topology of a conforming simplicial mesh:
/// the entities of every dimension up to the mesh dimension
/// and the compressed adjacency between each pair of dimensions.
///
/// Entities of the top dimension keep the vertex order they were given in.
/// Lower-dimensional entities are derived from them
/// and stored with their vertices in ascending order,
/// with entities sorted lexicographically by those vertices.
#[derive(Clone, Debug)]
pub struct Mesh {
    dim: EntityDim,
    /// storage for every dimension of entity, including vertices
    entities: Vec<EntityCollection>,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct EntityCollection {
    /// vertices per entity in the storage Vec
    simplex_size: usize,
    /// vertex ids stored in a flat Vec to avoid generics for dimension
    verts: Vec<usize>,
    /// map from the sorted vertex ids of an entity to its index in this collection
    index_map: HashMap<Vec<usize>, usize>,
    /// adjacency to sub-entities, indexed by their dimension
    down: Vec<Adjacency>,
    /// adjacency to entities containing these, indexed by their dimension.
    /// entries up to and including this dimension are empty
    up: Vec<Adjacency>,
    /// entities on the boundary of the mesh
    mesh_boundary: fb::FixedBitSet,
}

impl EntityCollection {
    /// Get the number of entities in the collection.
    #[inline]
    fn len(&self) -> usize {
        self.verts.len() / self.simplex_size
    }

    /// Get the slice of vertex ids corresponding to a single entity.
    fn entity_verts(&self, idx: usize) -> &[usize] {
        let start_idx = idx * self.simplex_size;
        &self.verts[start_idx..start_idx + self.simplex_size]
    }
}

impl Mesh {
    /// Construct a mesh from a flat list of element vertices,
    /// where every `dim + 1` ids make up one `dim`-simplex.
    ///
    /// Vertex ids are expected to be `0..n` for some `n`;
    /// the vertex count is taken to be one more than the highest id.
    pub fn new(dim: usize, elements: Vec<usize>) -> Result<Self, MeshError> {
        mesh_construction::build_mesh(dim, elements)
    }

    /// Dimension of the top-level elements.
    #[inline]
    pub fn dim(&self) -> EntityDim {
        self.dim
    }

    /// Number of entities of the given dimension.
    #[inline]
    pub fn nents(&self, dim: EntityDim) -> usize {
        self.collection(dim).len()
    }

    /// Number of vertices.
    #[inline]
    pub fn nverts(&self) -> usize {
        self.nents(EntityDim::Vert)
    }

    /// Number of edges.
    #[inline]
    pub fn nedges(&self) -> usize {
        self.nents(EntityDim::Edge)
    }

    /// Entity-to-vertex table of a dimension,
    /// with `dim + 1` consecutive vertex ids per entity.
    #[inline]
    pub fn verts_of(&self, dim: EntityDim) -> &[usize] {
        &self.collection(dim).verts
    }

    /// Vertex ids of a single entity.
    #[inline]
    pub fn entity_verts(&self, dim: EntityDim, idx: usize) -> &[usize] {
        self.collection(dim).entity_verts(idx)
    }

    /// Adjacency from each `high`-dimensional entity to its `low`-dimensional sub-entities,
    /// in the local order given by [`down_template`][crate::simplex::down_template].
    ///
    /// # Panics
    ///
    /// If `low` is not lower than `high` or `high` exceeds the mesh dimension.
    pub fn down(&self, high: EntityDim, low: EntityDim) -> &Adjacency {
        assert!(
            low < high && high <= self.dim,
            "no {high} to {low} adjacency in a {} mesh",
            self.dim
        );
        &self.collection(high).down[low.index()]
    }

    /// Adjacency from each `low`-dimensional entity
    /// to the `high`-dimensional entities containing it,
    /// in ascending order of the `high` entities.
    ///
    /// The orientation of each arc describes how the `low` entity
    /// sits inside the `high` one.
    ///
    /// # Panics
    ///
    /// If `low` is not lower than `high` or `high` exceeds the mesh dimension.
    pub fn up(&self, low: EntityDim, high: EntityDim) -> &Adjacency {
        assert!(
            low < high && high <= self.dim,
            "no {low} to {high} adjacency in a {} mesh",
            self.dim
        );
        &self.collection(low).up[high.index()]
    }

    /// Find the index of an entity by its vertices, given in any order.
    pub fn find_entity(&self, dim: EntityDim, verts: &[usize]) -> Option<usize> {
        if dim > self.dim || verts.len() != dim.vert_count() {
            return None;
        }
        let mut key = verts.to_vec();
        key.sort_unstable();
        self.collection(dim).index_map.get(&key).copied()
    }

    /// Entities of a dimension lying on the boundary of the mesh.
    ///
    /// Iterate over the indices with `boundary(dim).ones()`.
    #[inline]
    pub fn boundary(&self, dim: EntityDim) -> &fb::FixedBitSet {
        &self.collection(dim).mesh_boundary
    }

    /// Whether an entity lies on the boundary of the mesh.
    #[inline]
    pub fn is_on_boundary(&self, dim: EntityDim, idx: usize) -> bool {
        self.boundary(dim).contains(idx)
    }

    #[inline]
    fn collection(&self, dim: EntityDim) -> &EntityCollection {
        assert!(
            dim <= self.dim,
            "no {dim} entities in a {} mesh",
            self.dim
        );
        &self.entities[dim.index()]
    }
}
