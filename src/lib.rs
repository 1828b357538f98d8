//! Topology kernel for refining triangle and tetrahedron meshes by edge bisection.
//!
//! Given a [`Mesh`] and a set of "key" edges to bisect,
//! [`refine_domain_interiors`] computes the vertices of every new entity
//! produced by splitting the elements around those edges,
//! as flat arrays grouped by key.
//! Inserting these into a new mesh is left to the caller.
//!
//! ```
//! # use simplex_refine::{refine_domain_interiors, EntityDim, Mesh};
//! # use std::sync::Arc;
//! // two triangles sharing the edge (0, 1)
//! let mesh = Mesh::new(2, vec![0, 1, 2, 1, 0, 3])?;
//! let key = mesh.find_entity(EntityDim::Edge, &[0, 1]).unwrap();
//! // vertex 4 goes in the middle of the edge, old vertices keep their ids
//! let midverts: Arc<[usize]> = Arc::from(vec![4]);
//! let renumber: Vec<usize> = (0..mesh.nverts()).collect();
//!
//! let products = refine_domain_interiors(&mesh, EntityDim::Face, &[key], &midverts, &renumber);
//! assert_eq!(products.npairs(), 4);
//! assert_eq!(products.ncuts(), 2);
//! # Ok::<(), simplex_refine::MeshError>(())
//! ```
//!
//! The per-key work runs in parallel with `rayon`
//! unless the default `rayon` feature is disabled.

#![warn(missing_docs)]

pub mod adjacency;
#[doc(inline)]
pub use adjacency::{Adjacency, Orientation};

pub mod mesh;
#[doc(inline)]
pub use mesh::{Mesh, MeshError};

pub mod refine;
#[doc(inline)]
pub use refine::{refine_domain_interiors, refine_edge_interiors, RefinedProducts};

pub mod scan;

pub mod simplex;
#[doc(inline)]
pub use simplex::EntityDim;
