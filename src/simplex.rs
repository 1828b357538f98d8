//! Combinatorial tables describing the sub-entities of low-dimensional simplices.
//!
//! Every simplex has a canonical local vertex numbering `0..=dim`,
//! and its sub-entities of each dimension are numbered in a fixed order
//! given by the "down-templates" here.
//! The refinement kernels never branch on the simplex type themselves;
//! all of the dimension-specific knowledge lives in these tables.
//!
//! The conventions are:
//!
//! ```text
//! triangle edges:     [0,1] [1,2] [2,0]
//! tetrahedron edges:  [0,1] [1,2] [2,0] [0,3] [1,3] [2,3]
//! tetrahedron faces:  [0,2,1] [0,1,3] [1,2,3] [2,0,3]
//! ```
//!
//! so that e.g. local vertex `i` of a triangle is opposite edge `(i + 1) % 3`.

use std::fmt;

use crate::mesh::MeshError;

/// Dimension of a mesh entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EntityDim {
    /// 0-dimensional entities, the mesh vertices.
    Vert = 0,
    /// 1-dimensional entities, line segments.
    Edge = 1,
    /// 2-dimensional entities, triangles.
    Face = 2,
    /// 3-dimensional entities, tetrahedra.
    Region = 3,
}

impl EntityDim {
    /// All dimensions in ascending order.
    pub const ALL: [EntityDim; 4] = [Self::Vert, Self::Edge, Self::Face, Self::Region];

    /// The dimension as an integer, for indexing and arithmetic.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Number of vertices in a simplex of this dimension.
    #[inline]
    pub const fn vert_count(self) -> usize {
        self as usize + 1
    }

    /// The dimension one lower than this one, if there is one.
    #[inline]
    pub const fn lower(self) -> Option<Self> {
        match self {
            Self::Vert => None,
            Self::Edge => Some(Self::Vert),
            Self::Face => Some(Self::Edge),
            Self::Region => Some(Self::Face),
        }
    }
}

impl TryFrom<usize> for EntityDim {
    type Error = MeshError;

    fn try_from(dim: usize) -> Result<Self, Self::Error> {
        Self::ALL
            .get(dim)
            .copied()
            .ok_or(MeshError::InvalidDimension(dim))
    }
}

impl fmt::Display for EntityDim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Vert => "vertex",
            Self::Edge => "edge",
            Self::Face => "face",
            Self::Region => "region",
        };
        f.write_str(name)
    }
}

//
// tables
//

/// Local vertex lists of every simplex dimension viewed as a whole.
/// Also doubles as the down-template to vertices:
/// vertex `i` of any simplex is the slice `[i]`.
static SIMPLEX_VERTS: [u8; 4] = [0, 1, 2, 3];

static TRI_EDGES: [[u8; 2]; 3] = [[0, 1], [1, 2], [2, 0]];

static TET_EDGES: [[u8; 2]; 6] = [[0, 1], [1, 2], [2, 0], [0, 3], [1, 3], [2, 3]];

static TET_FACES: [[u8; 3]; 4] = [[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];

// opposites, indexed by the local index of the sub-entity
static EDGE_VERT_OPPOSITES: [u8; 2] = [1, 0];
static TRI_VERT_OPPOSITES: [u8; 3] = [1, 2, 0];
static TRI_EDGE_OPPOSITES: [u8; 3] = [2, 0, 1];
static TET_VERT_OPPOSITES: [u8; 4] = [2, 3, 1, 0];
static TET_EDGE_OPPOSITES: [u8; 6] = [5, 3, 4, 1, 2, 0];
static TET_FACE_OPPOSITES: [u8; 4] = [3, 2, 0, 1];

/// Number of `sub`-dimensional entities on the boundary of a `simplex`-dimensional simplex
/// (counting the simplex itself when the dimensions are equal).
pub const fn sub_entity_count(simplex: EntityDim, sub: EntityDim) -> usize {
    // binomial coefficient (simplex + 1) choose (sub + 1)
    let n = simplex.vert_count();
    let k = sub.vert_count();
    if k > n {
        return 0;
    }
    let mut count = 1;
    let mut i = 0;
    while i < k {
        count = count * (n - i) / (i + 1);
        i += 1;
    }
    count
}

/// Local vertices of sub-entity `index` of dimension `sub` within a `simplex`,
/// in the sub-entity's canonical order.
///
/// # Panics
///
/// If `sub` is higher than `simplex` or `index` is out of range.
pub fn down_template(simplex: EntityDim, sub: EntityDim, index: usize) -> &'static [u8] {
    use EntityDim::*;
    match (simplex, sub) {
        (_, Vert) => {
            assert!(index <= simplex.index(), "no vertex {index} in a {simplex}");
            &SIMPLEX_VERTS[index..index + 1]
        }
        (s, t) if s == t => {
            assert_eq!(index, 0, "a {simplex} has only itself as a {sub}");
            &SIMPLEX_VERTS[..s.vert_count()]
        }
        (Face, Edge) => &TRI_EDGES[index],
        (Region, Edge) => &TET_EDGES[index],
        (Region, Face) => &TET_FACES[index],
        _ => panic!("a {simplex} has no {sub} sub-entities"),
    }
}

/// Local index of the sub-entity of dimension `simplex - sub - 1`
/// sharing no vertices with sub-entity `index` of dimension `sub`.
///
/// # Panics
///
/// If no such sub-entity exists (i.e. `sub` is not lower than `simplex`)
/// or `index` is out of range.
pub fn opposite_template(simplex: EntityDim, sub: EntityDim, index: usize) -> u8 {
    use EntityDim::*;
    let table: &[u8] = match (simplex, sub) {
        (Edge, Vert) => &EDGE_VERT_OPPOSITES,
        (Face, Vert) => &TRI_VERT_OPPOSITES,
        (Face, Edge) => &TRI_EDGE_OPPOSITES,
        (Region, Vert) => &TET_VERT_OPPOSITES,
        (Region, Edge) => &TET_EDGE_OPPOSITES,
        (Region, Face) => &TET_FACE_OPPOSITES,
        _ => panic!("a {sub} has no opposite in a {simplex}"),
    };
    table[index]
}
