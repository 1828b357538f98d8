//! Construction of the new entities produced by bisecting key edges.
//!
//! The "domains" (doms for short) of a refinement are the `dim`-dimensional
//! entities adjacent to a key edge.
//! Each one of them is split into two "pair" entities
//! and a "cut" entity running down the middle between them.
//! Pairs and cuts together are the "product" entities of the split.
//!
//! When `dim` is 1 the domains are the key edges themselves
//! and the cuts degenerate to the midpoint vertices,
//! which gets its own simpler code path.

use itertools::{izip, Itertools};
use std::{slice::ChunksExact, sync::Arc};

use crate::{
    mesh::Mesh,
    scan::{gather, get_degrees, multiply_each_by, offset_scan, parallel_for, split_by_offsets},
    simplex::{down_template, opposite_template, EntityDim},
};

/// The new entities produced by a refinement pass,
/// grouped by the key edge they came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefinedProducts {
    /// Dimension of the refined domains, which is also the dimension of the pairs.
    pub dim: EntityDim,
    /// Offsets of each key's cuts in `cut_verts2verts`, one more than the number of keys.
    pub keys2cuts: Vec<usize>,
    /// Offsets of each key's pairs in `pair_verts2verts`, one more than the number of keys.
    pub keys2pairs: Vec<usize>,
    /// Vertices of the cuts, `dim` per cut with the midpoint vertex last.
    ///
    /// When `dim` is 1 every cut is a single midpoint vertex
    /// and this shares storage with the midpoint vertices given to the refiner.
    pub cut_verts2verts: Arc<[usize]>,
    /// Vertices of the pairs, `dim + 1` per pair with the midpoint vertex last
    /// (or, for the second pair of a split edge, first).
    pub pair_verts2verts: Vec<usize>,
}

impl RefinedProducts {
    /// Number of key edges the products were made for.
    #[inline]
    pub fn nkeys(&self) -> usize {
        self.keys2cuts.len() - 1
    }

    /// Total number of cut entities.
    #[inline]
    pub fn ncuts(&self) -> usize {
        self.keys2cuts[self.nkeys()]
    }

    /// Total number of pair entities.
    #[inline]
    pub fn npairs(&self) -> usize {
        self.keys2pairs[self.nkeys()]
    }

    /// Vertices of each cut produced for a key.
    pub fn cuts_of(&self, key: usize) -> ChunksExact<'_, usize> {
        let arity = self.dim.index();
        let range = self.keys2cuts[key] * arity..self.keys2cuts[key + 1] * arity;
        self.cut_verts2verts[range].chunks_exact(arity)
    }

    /// Vertices of each pair produced for a key.
    pub fn pairs_of(&self, key: usize) -> ChunksExact<'_, usize> {
        let arity = self.dim.vert_count();
        let range = self.keys2pairs[key] * arity..self.keys2pairs[key + 1] * arity;
        self.pair_verts2verts[range].chunks_exact(arity)
    }
}

/// Split every `dim`-dimensional entity of the mesh adjacent to a key edge.
///
/// `keys2edges` lists the key edges and `keys2midverts` the new vertex
/// inserted on each of them.
/// Vertices of the old mesh are renumbered through `old_verts2new_verts`,
/// which must cover every vertex of every split domain.
/// Violating these preconditions is a bug in the caller
/// and is only checked in debug builds.
pub fn refine_domain_interiors(
    mesh: &Mesh,
    dim: EntityDim,
    keys2edges: &[usize],
    keys2midverts: &Arc<[usize]>,
    old_verts2new_verts: &[usize],
) -> RefinedProducts {
    debug_assert!(
        dim >= EntityDim::Edge && dim <= mesh.dim(),
        "can't refine {dim} domains in a {} mesh",
        mesh.dim()
    );
    debug_assert_eq!(keys2edges.len(), keys2midverts.len());
    debug_assert!(
        keys2edges.iter().all(|&edge| edge < mesh.nedges()),
        "key edge out of range"
    );
    let (Some(side_dim), Some(tip_dim)) = (dim.lower(), dim.lower().and_then(EntityDim::lower))
    else {
        // dimension 1 is the only one that fails this
        return refine_edge_interiors(mesh, keys2edges, keys2midverts, old_verts2new_verts);
    };

    let nkeys = keys2edges.len();
    let dim_size = dim.vert_count();
    let dom_verts2verts = mesh.verts_of(dim);
    let edges2doms = mesh.up(EntityDim::Edge, dim);
    debug_assert!(
        keys2edges
            .iter()
            .flat_map(move |&edge| edges2doms.targets_of(edge))
            .flat_map(move |&dom| &dom_verts2verts[dom * dim_size..(dom + 1) * dim_size])
            .all(|&vert| vert < old_verts2new_verts.len()),
        "vertex renumbering doesn't cover the split domains"
    );

    // count the domains around each key to size the outputs.
    // every domain yields one cut and two pairs
    let edge_dom_degrees = get_degrees(edges2doms.offsets());
    let key_dom_degrees = gather(keys2edges, &edge_dom_degrees);
    let keys2key_doms = offset_scan(&key_dom_degrees);
    let ndoms = keys2key_doms[nkeys];
    let keys2cuts = keys2key_doms;
    let keys2pairs = multiply_each_by(2, &keys2cuts);
    log::debug!("refining {nkeys} key edges splitting {ndoms} {dim} domains");

    let mut cut_verts2verts = vec![0; ndoms * dim.index()];
    let mut pair_verts2verts = vec![0; 2 * ndoms * dim_size];

    // each key writes into its own slices of the outputs,
    // split off here according to the offsets
    let key_work = izip!(
        split_by_offsets(&mut cut_verts2verts, &keys2cuts, dim.index()),
        split_by_offsets(&mut pair_verts2verts, &keys2pairs, dim_size),
    )
    .collect_vec();

    parallel_for(key_work, |key, (key_cuts, key_pairs)| {
        let edge = keys2edges[key];
        let midvert = keys2midverts[key];
        // every domain gets one cut and a consecutive couple of pairs
        let dom_slots = izip!(
            key_cuts.chunks_exact_mut(dim.index()),
            key_pairs.chunks_exact_mut(2 * dim_size),
        );
        for ((dom, code), (ccv2v, dom_pairs)) in izip!(edges2doms.arcs_of(edge), dom_slots) {
            let ddv2v = &dom_verts2verts[dom * dim_size..(dom + 1) * dim_size];
            let dde = code.which_down();
            let rot = code.rotation();

            // a pair is formed by finding the side of the domain
            // opposite to one of the edge endpoints
            // and connecting it to the midpoint
            for (eev, ppv2v) in dom_pairs.chunks_exact_mut(dim_size).enumerate() {
                let dev = eev ^ rot;
                let ddv = down_template(dim, EntityDim::Edge, dde)[dev] as usize;
                let dds = opposite_template(dim, EntityDim::Vert, ddv) as usize;
                let side_verts = down_template(dim, side_dim, dds);
                for (nv, &ddv2) in izip!(ppv2v.iter_mut(), side_verts) {
                    *nv = old_verts2new_verts[ddv2v[ddv2 as usize]];
                }
                ppv2v[dim.index()] = midvert;
            }

            // the cut connects the "tip" of the domain opposite the key edge to the midpoint.
            // for triangles the tip is the vertex not on the key edge,
            // for tets it's the edge not touching the key edge
            let ddt = opposite_template(dim, EntityDim::Edge, dde) as usize;
            let tip_verts = down_template(dim, tip_dim, ddt);
            for (nv, &ddv2) in izip!(ccv2v.iter_mut(), tip_verts) {
                *nv = old_verts2new_verts[ddv2v[ddv2 as usize]];
            }
            ccv2v[side_dim.index()] = midvert;
        }
    });

    RefinedProducts {
        dim,
        keys2cuts,
        keys2pairs,
        cut_verts2verts: Arc::from(cut_verts2verts),
        pair_verts2verts,
    }
}

/// Split the key edges themselves.
///
/// Every key has exactly one domain, its own edge,
/// so the offsets are fixed strides and no counting is needed.
/// The cuts are the midpoint vertices,
/// returned by sharing `keys2midverts` rather than copying it.
pub fn refine_edge_interiors(
    mesh: &Mesh,
    keys2edges: &[usize],
    keys2midverts: &Arc<[usize]>,
    old_verts2new_verts: &[usize],
) -> RefinedProducts {
    debug_assert_eq!(keys2edges.len(), keys2midverts.len());
    debug_assert!(
        keys2edges.iter().all(|&edge| edge < mesh.nedges()),
        "key edge out of range"
    );
    let nkeys = keys2edges.len();
    let edge_verts2verts = mesh.verts_of(EntityDim::Edge);
    debug_assert!(
        keys2edges
            .iter()
            .flat_map(move |&edge| &edge_verts2verts[edge * 2..edge * 2 + 2])
            .all(|&vert| vert < old_verts2new_verts.len()),
        "vertex renumbering doesn't cover the split edges"
    );
    log::debug!("refining {nkeys} key edges in place");

    // two pairs of two vertices each per key
    let mut pair_verts2verts = vec![0; nkeys * 4];
    let key_pairs = pair_verts2verts.chunks_exact_mut(4).collect_vec();
    parallel_for(key_pairs, |key, ppv2v| {
        let edge = keys2edges[key];
        let midvert = keys2midverts[key];
        ppv2v[0] = old_verts2new_verts[edge_verts2verts[edge * 2]];
        ppv2v[1] = midvert;
        ppv2v[2] = midvert;
        ppv2v[3] = old_verts2new_verts[edge_verts2verts[edge * 2 + 1]];
    });

    RefinedProducts {
        dim: EntityDim::Edge,
        keys2cuts: (0..=nkeys).collect(),
        keys2pairs: (0..=nkeys).map(|key| key * 2).collect(),
        cut_verts2verts: Arc::clone(keys2midverts),
        pair_verts2verts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{tiny_mesh_2d, tiny_mesh_3d};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn identity(count: usize) -> Vec<usize> {
        (0..count).collect()
    }

    fn as_sets<'a>(entities: impl Iterator<Item = &'a [usize]>) -> Vec<BTreeSet<usize>> {
        entities.map(|e| e.iter().copied().collect()).collect()
    }

    fn set(verts: &[usize]) -> BTreeSet<usize> {
        verts.iter().copied().collect()
    }

    /// Check the structural guarantees that hold for any refinement.
    fn check_products(
        mesh: &Mesh,
        keys2edges: &[usize],
        keys2midverts: &[usize],
        old_verts2new_verts: &[usize],
        products: &RefinedProducts,
    ) {
        let dim = products.dim;
        assert_eq!(products.nkeys(), keys2edges.len());
        assert_eq!(products.cut_verts2verts.len(), products.ncuts() * dim.index());
        assert_eq!(products.pair_verts2verts.len(), products.npairs() * dim.vert_count());
        assert_eq!(products.keys2cuts[0], 0);
        assert_eq!(products.keys2pairs[0], 0);

        for (key, (&edge, &midvert)) in izip!(keys2edges, keys2midverts).enumerate() {
            let doms = if dim == EntityDim::Edge {
                vec![edge]
            } else {
                mesh.up(EntityDim::Edge, dim).targets_of(edge).to_vec()
            };
            assert_eq!(products.cuts_of(key).len(), doms.len());
            assert_eq!(products.pairs_of(key).len(), 2 * doms.len());

            for entity in products.cuts_of(key).chain(products.pairs_of(key)) {
                let mid_count = entity.iter().filter(|&&v| v == midvert).count();
                assert_eq!(mid_count, 1, "{entity:?} should contain midvertex {midvert} once");
            }

            // everything but the midvertex is a renumbered vertex of the split domain
            let dom_pairs = products.pairs_of(key).chunks(2);
            for (&dom, cut, pairs) in izip!(&doms, products.cuts_of(key), &dom_pairs) {
                let new_dom_verts = mesh
                    .entity_verts(dim, dom)
                    .iter()
                    .map(|&v| old_verts2new_verts[v])
                    .collect::<BTreeSet<_>>();
                for entity in pairs.chain([cut]) {
                    for v in entity.iter().filter(|&&v| v != midvert) {
                        assert!(
                            new_dom_verts.contains(v),
                            "{v} in {entity:?} isn't a renumbered vertex of {dim} {dom}"
                        );
                    }
                }
            }
        }
    }

    /// A single edge splits into two halves around its midpoint.
    #[test]
    fn split_single_edge() {
        let mesh = Mesh::new(1, vec![0, 1]).unwrap();
        let midverts: Arc<[usize]> = Arc::from(vec![2]);
        let products =
            refine_domain_interiors(&mesh, EntityDim::Edge, &[0], &midverts, &identity(3));

        assert_eq!(products.pair_verts2verts, vec![0, 2, 2, 1]);
        assert_eq!(&*products.cut_verts2verts, &[2]);
        assert!(
            Arc::ptr_eq(&products.cut_verts2verts, &midverts),
            "cuts should share storage with the midpoint vertices"
        );
        assert_eq!(products.keys2cuts, vec![0, 1]);
        assert_eq!(products.keys2pairs, vec![0, 2]);
        check_products(&mesh, &[0], &midverts, &identity(3), &products);
    }

    /// Edge splits go through the vertex renumbering,
    /// keeping the stored order of the edge.
    #[test]
    fn split_edges_renumbered() {
        let mesh = tiny_mesh_2d();
        let keys = [
            mesh.find_entity(EntityDim::Edge, &[3, 0]).unwrap(),
            mesh.find_entity(EntityDim::Edge, &[5, 6]).unwrap(),
        ];
        let midverts: Arc<[usize]> = Arc::from(vec![7, 8]);
        // shift old vertices up by 10 to tell them apart from the new ones
        let renumber = (10..17usize).collect_vec();
        let products =
            refine_domain_interiors(&mesh, EntityDim::Edge, &keys, &midverts, &renumber);

        assert_eq!(
            products.pair_verts2verts,
            vec![10, 7, 7, 13, 15, 8, 8, 16]
        );
        assert_eq!(products.keys2pairs, vec![0, 2, 4]);
        check_products(&mesh, &keys, &midverts, &renumber, &products);
    }

    /// Two triangles sharing the key edge,
    /// one running along the edge and the other against it.
    #[test]
    fn split_two_triangles() {
        let mesh = Mesh::new(2, vec![0, 1, 2, 1, 0, 3]).unwrap();
        let key = mesh.find_entity(EntityDim::Edge, &[0, 1]).unwrap();
        let midverts: Arc<[usize]> = Arc::from(vec![4]);
        let products =
            refine_domain_interiors(&mesh, EntityDim::Face, &[key], &midverts, &identity(5));

        assert_eq!(products.npairs(), 4);
        assert_eq!(products.ncuts(), 2);
        assert_eq!(products.keys2cuts, vec![0, 2]);
        assert_eq!(products.keys2pairs, vec![0, 4]);

        // domains come in ascending order, triangle [0, 1, 2] first
        let pairs = as_sets(products.pairs_of(0));
        let expected_pairs = [
            set(&[4, 1, 2]),
            set(&[0, 4, 2]),
            set(&[1, 4, 3]),
            set(&[4, 0, 3]),
        ];
        assert_eq!(pairs, expected_pairs);

        let cuts = as_sets(products.cuts_of(0));
        assert_eq!(cuts, [set(&[2, 4]), set(&[3, 4])]);

        // midpoint always comes last in a cut
        assert!(products.cuts_of(0).all(|cut| cut[1] == 4));
        check_products(&mesh, &[key], &midverts, &identity(5), &products);
    }

    /// A key on the mesh boundary has one domain and an interior key two,
    /// and the outputs are laid out accordingly.
    #[test]
    fn boundary_and_interior_keys() {
        let mesh = tiny_mesh_2d();
        let boundary_edge = mesh.find_entity(EntityDim::Edge, &[0, 1]).unwrap();
        let interior_edge = mesh.find_entity(EntityDim::Edge, &[0, 3]).unwrap();
        assert!(mesh.is_on_boundary(EntityDim::Edge, boundary_edge));
        assert!(!mesh.is_on_boundary(EntityDim::Edge, interior_edge));

        let keys = [boundary_edge, interior_edge];
        let midverts: Arc<[usize]> = Arc::from(vec![7, 8]);
        let products =
            refine_domain_interiors(&mesh, EntityDim::Face, &keys, &midverts, &identity(9));

        assert_eq!(products.keys2cuts, vec![0, 1, 3]);
        assert_eq!(products.keys2pairs, vec![0, 2, 6]);
        assert_eq!(products.cut_verts2verts.len(), 3 * 2);
        assert_eq!(products.pair_verts2verts.len(), 6 * 3);

        // the boundary edge (0, 1) only touches triangle [0, 1, 3]
        assert_eq!(
            as_sets(products.pairs_of(0)),
            [set(&[1, 3, 7]), set(&[0, 3, 7])]
        );
        assert_eq!(as_sets(products.cuts_of(0)), [set(&[3, 7])]);

        // the interior edge (0, 3) touches [0, 2, 3] and [0, 1, 3]
        assert_eq!(
            as_sets(products.cuts_of(1)),
            [set(&[2, 8]), set(&[1, 8])]
        );
        check_products(&mesh, &keys, &midverts, &identity(9), &products);
    }

    /// A lone tetrahedron splits into two tets sharing the triangle cut.
    #[test]
    fn split_single_tet() {
        let mesh = Mesh::new(3, vec![0, 1, 2, 3]).unwrap();
        let key = mesh.find_entity(EntityDim::Edge, &[0, 1]).unwrap();
        let midverts: Arc<[usize]> = Arc::from(vec![4]);
        let products =
            refine_domain_interiors(&mesh, EntityDim::Region, &[key], &midverts, &identity(5));

        itertools::assert_equal(
            products.pairs_of(0),
            [&[1usize, 2, 3, 4][..], &[2, 0, 3, 4][..]],
        );
        itertools::assert_equal(products.cuts_of(0), [&[2usize, 3, 4][..]]);
        check_products(&mesh, &[key], &midverts, &identity(5), &products);
    }

    /// Triangle splits renumber the old vertices
    /// and follow each triangle's own orientation.
    #[test]
    fn split_two_triangles_renumbered() {
        let mesh = Mesh::new(2, vec![0, 1, 2, 1, 0, 3]).unwrap();
        let key = mesh.find_entity(EntityDim::Edge, &[0, 1]).unwrap();
        let midverts: Arc<[usize]> = Arc::from(vec![4]);
        let renumber = vec![10, 11, 12, 13];
        let products =
            refine_domain_interiors(&mesh, EntityDim::Face, &[key], &midverts, &renumber);

        itertools::assert_equal(
            products.pairs_of(0),
            [
                &[11usize, 12, 4][..],
                &[12, 10, 4][..],
                &[13, 11, 4][..],
                &[10, 13, 4][..],
            ],
        );
        itertools::assert_equal(products.cuts_of(0), [&[12usize, 4][..], &[13, 4][..]]);
        check_products(&mesh, &[key], &midverts, &renumber, &products);
    }

    /// A tet whose vertex order runs against the key edge
    /// still produces correctly oriented, renumbered products.
    #[test]
    fn split_reversed_tet_renumbered() {
        let mesh = Mesh::new(3, vec![1, 0, 2, 3]).unwrap();
        let key = mesh.find_entity(EntityDim::Edge, &[0, 1]).unwrap();
        let edges2tets = mesh.up(EntityDim::Edge, EntityDim::Region);
        assert_eq!(edges2tets.arcs_of(key).next().unwrap().1.rotation(), 1);

        let midverts: Arc<[usize]> = Arc::from(vec![4]);
        let renumber = vec![10, 11, 12, 13];
        let products =
            refine_domain_interiors(&mesh, EntityDim::Region, &[key], &midverts, &renumber);

        itertools::assert_equal(
            products.pairs_of(0),
            [&[12usize, 11, 13, 4][..], &[10, 12, 13, 4][..]],
        );
        itertools::assert_equal(products.cuts_of(0), [&[12usize, 13, 4][..]]);
        check_products(&mesh, &[key], &midverts, &renumber, &products);
    }

    /// Splitting the central edge of the diamond touches all four tets,
    /// and each pair is made of the tet's vertices minus one endpoint of the edge.
    #[test]
    fn split_tets_around_interior_edge() {
        let mesh = tiny_mesh_3d();
        let key = mesh.find_entity(EntityDim::Edge, &[1, 2]).unwrap();
        let midverts: Arc<[usize]> = Arc::from(vec![6]);
        let products =
            refine_domain_interiors(&mesh, EntityDim::Region, &[key], &midverts, &identity(7));

        assert_eq!(products.keys2pairs, vec![0, 8]);
        assert_eq!(products.keys2cuts, vec![0, 4]);

        let doms = mesh.up(EntityDim::Edge, EntityDim::Region).targets_of(key);
        let pairs = products.pairs_of(0).collect_vec();
        let cuts = products.cuts_of(0).collect_vec();
        for (i, &dom) in doms.iter().enumerate() {
            let dom_verts = set(mesh.entity_verts(EntityDim::Region, dom));
            let without = |v: usize| {
                let mut verts = dom_verts.clone();
                verts.remove(&v);
                verts.insert(6);
                verts
            };
            let dom_pairs = [set(pairs[2 * i]), set(pairs[2 * i + 1])];
            assert!(
                dom_pairs.contains(&without(1)) && dom_pairs.contains(&without(2)),
                "pairs of tet {dom} were {dom_pairs:?}"
            );

            let mut tip = dom_verts.clone();
            tip.remove(&1);
            tip.remove(&2);
            tip.insert(6);
            assert_eq!(set(cuts[i]), tip);
        }
        check_products(&mesh, &[key], &midverts, &identity(7), &products);
    }

    #[test]
    fn no_keys() {
        let mesh = tiny_mesh_3d();
        let midverts: Arc<[usize]> = Arc::from(Vec::new());
        for dim in [EntityDim::Edge, EntityDim::Face, EntityDim::Region] {
            let products = refine_domain_interiors(&mesh, dim, &[], &midverts, &[]);
            assert_eq!(products.nkeys(), 0);
            assert_eq!(products.ncuts(), 0);
            assert_eq!(products.npairs(), 0);
            assert!(products.pair_verts2verts.is_empty());
        }
    }

    /// A strip of `count` triangles, each sharing an edge with the next.
    fn triangle_strip(count: usize) -> Mesh {
        let elements = (0..count).flat_map(|i| [i, i + 1, i + 2]).collect_vec();
        Mesh::new(2, elements).unwrap()
    }

    proptest! {
        /// Any set of keys gets disjoint, gap-free output ranges
        /// sized by the number of adjacent domains.
        #[test]
        fn strip_products_partition_outputs(
            count in 1usize..12,
            picks in prop::collection::vec(any::<prop::sample::Index>(), 0..10),
        ) {
            let mesh = triangle_strip(count);
            let keys = picks
                .iter()
                .map(|pick| pick.index(mesh.nedges()))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect_vec();
            let nverts = mesh.nverts();
            let midverts: Arc<[usize]> = Arc::from((nverts..nverts + keys.len()).collect_vec());
            // old vertices move past the new ones
            let renumber = (0..nverts).map(|v| v + 100).collect_vec();

            let products =
                refine_domain_interiors(&mesh, EntityDim::Face, &keys, &midverts, &renumber);
            check_products(&mesh, &keys, &midverts, &renumber, &products);

            let edges2doms = mesh.up(EntityDim::Edge, EntityDim::Face);
            let expected_doms: usize = keys.iter().map(|&k| edges2doms.degree(k)).sum();
            prop_assert_eq!(products.ncuts(), expected_doms);
            prop_assert_eq!(products.npairs(), 2 * expected_doms);
            prop_assert_eq!(
                products.keys2pairs.clone(),
                multiply_each_by(2, &products.keys2cuts)
            );
            prop_assert!(products.keys2cuts.windows(2).all(|w| w[0] <= w[1]));

            // every product's old vertices come from the domain it replaced
            for (key, &edge) in keys.iter().enumerate() {
                for (dom, cut) in izip!(edges2doms.targets_of(edge), products.cuts_of(key)) {
                    let dom_verts = mesh.entity_verts(EntityDim::Face, *dom);
                    prop_assert!(dom_verts.contains(&(cut[0] - 100)));
                    let edge_verts = mesh.entity_verts(EntityDim::Edge, edge);
                    prop_assert!(!edge_verts.contains(&(cut[0] - 100)));
                }
            }
        }
    }
}
