//! Tree construction from a triangle soup.
//!
//! Construction works through an explicit stack of pending nodes, so deep
//! trees never recurse. Straddling triangles are replaced by their
//! fragments in a growing pool; once all nodes are settled, the pool is
//! compacted to the triangles that ended up in a node, keeping input order.

use log::{debug, trace};

use crate::cuttable::split_triangle;
use crate::error::{Error, Result};
use crate::{Plane3D, Side, WorldTriangle};

use super::config::BuildConfig;
use super::node::BspNode;
use super::selector::PlaneSelector;

/// Result of construction: the node tree and the triangles it indexes.
#[derive(Debug)]
pub(crate) struct Built {
    pub root: BspNode,
    pub triangles: Vec<WorldTriangle>,
}

#[derive(Default)]
struct Slot {
    plane: Option<Plane3D>,
    triangles: Vec<u32>,
    front: Option<usize>,
    back: Option<usize>,
}

struct Pending {
    slot: usize,
    triangles: Vec<u32>,
}

pub(crate) fn construct<S: PlaneSelector + ?Sized>(
    triangles: Vec<WorldTriangle>,
    config: &BuildConfig,
    selector: &S,
) -> Result<Built> {
    if let Some(index) = triangles.iter().position(WorldTriangle::is_degenerate) {
        return Err(Error::DegenerateTriangle { index });
    }

    let input_len = triangles.len();
    let mut pool = triangles;
    let mut live = pool.len();
    let mut slots = vec![Slot::default()];
    let mut stack = vec![Pending {
        slot: 0,
        triangles: (0..pool.len() as u32).collect(),
    }];
    let mut limited = 0usize;

    while let Some(Pending { slot, triangles }) = stack.pop() {
        if triangles.len() <= config.max_leaf_size {
            slots[slot].triangles = triangles;
            continue;
        }

        let Some(plane) = selector.select(&pool, &triangles) else {
            slots[slot].triangles = triangles;
            continue;
        };

        let partition = partition(&pool, &triangles, &plane);

        let new_live = live - partition.split + partition.fragments.len();
        let grows = new_live > live;
        let children =
            usize::from(partition.has_front()) + usize::from(partition.has_back());

        if (grows && new_live > config.max_triangles)
            || slots.len() + children > config.max_nodes
        {
            trace!(
                "keeping {} triangles unsplit: limit reached ({} triangles, {} nodes)",
                triangles.len(),
                new_live,
                slots.len() + children
            );
            limited += 1;
            slots[slot].triangles = triangles;
            continue;
        }

        live = new_live;

        let Partition {
            on,
            mut front,
            mut back,
            fragments,
            ..
        } = partition;

        for (fragment, in_front) in fragments {
            let index = pool.len() as u32;
            pool.push(fragment);
            if in_front {
                front.push(index);
            } else {
                back.push(index);
            }
        }

        slots[slot].plane = Some(plane);
        slots[slot].triangles = on;

        if !back.is_empty() {
            let child = slots.len();
            slots.push(Slot::default());
            slots[slot].back = Some(child);
            stack.push(Pending {
                slot: child,
                triangles: back,
            });
        }

        if !front.is_empty() {
            let child = slots.len();
            slots.push(Slot::default());
            slots[slot].front = Some(child);
            stack.push(Pending {
                slot: child,
                triangles: front,
            });
        }
    }

    let triangles = compact(pool, &mut slots);

    debug!(
        "built BSP: {} nodes, {} triangles from {} input ({} nodes kept unsplit by limits)",
        slots.len(),
        triangles.len(),
        input_len,
        limited
    );

    Ok(Built {
        root: assemble(slots),
        triangles,
    })
}

struct Partition {
    on: Vec<u32>,
    front: Vec<u32>,
    back: Vec<u32>,
    /// Number of straddling triangles replaced by fragments.
    split: usize,
    fragments: Vec<(WorldTriangle, bool)>,
}

impl Partition {
    fn has_front(&self) -> bool {
        !self.front.is_empty() || self.fragments.iter().any(|(_, f)| *f)
    }

    fn has_back(&self) -> bool {
        !self.back.is_empty() || self.fragments.iter().any(|(_, f)| !*f)
    }
}

fn partition(pool: &[WorldTriangle], triangles: &[u32], plane: &Plane3D) -> Partition {
    let mut result = Partition {
        on: Vec::new(),
        front: Vec::new(),
        back: Vec::new(),
        split: 0,
        fragments: Vec::new(),
    };

    for &index in triangles {
        let triangle = &pool[index as usize];
        let span = plane.span(triangle.vertices().iter().copied());

        match span.side() {
            Side::On => result.on.push(index),
            Side::Front => result.front.push(index),
            Side::Back => result.back.push(index),
            Side::Both => {
                let pieces = split_triangle(triangle, plane);
                if pieces.is_empty() {
                    // Only slivers on either side: keep the triangle whole
                    // on the side it reaches furthest into.
                    if span.max >= -span.min {
                        result.front.push(index);
                    } else {
                        result.back.push(index);
                    }
                    continue;
                }
                result.split += 1;
                result
                    .fragments
                    .extend(pieces.front.into_iter().map(|t| (t, true)));
                result
                    .fragments
                    .extend(pieces.back.into_iter().map(|t| (t, false)));
            }
        }
    }

    result
}

/// Drops pool entries no node refers to and renumbers node indices,
/// preserving pool order.
fn compact(pool: Vec<WorldTriangle>, slots: &mut [Slot]) -> Vec<WorldTriangle> {
    let mut remap = vec![u32::MAX; pool.len()];
    for slot in slots.iter() {
        for &i in &slot.triangles {
            remap[i as usize] = 0;
        }
    }

    let mut triangles = Vec::with_capacity(pool.len());
    for (i, triangle) in pool.into_iter().enumerate() {
        if remap[i] != u32::MAX {
            remap[i] = triangles.len() as u32;
            triangles.push(triangle);
        }
    }

    for slot in slots.iter_mut() {
        for i in slot.triangles.iter_mut() {
            *i = remap[*i as usize];
        }
    }

    triangles
}

/// Converts slots into boxed nodes. Children always have larger slot
/// indices than their parents, so walking backwards finds them finished.
fn assemble(slots: Vec<Slot>) -> BspNode {
    let mut nodes: Vec<Option<BspNode>> = Vec::with_capacity(slots.len());
    nodes.resize_with(slots.len(), || None);

    for (i, slot) in slots.into_iter().enumerate().rev() {
        let mut node = match slot.plane {
            Some(plane) => BspNode::partitioned(plane, slot.triangles),
            None => BspNode::leaf(slot.triangles),
        };
        node.set_front(slot.front.and_then(|c| nodes[c].take()));
        node.set_back(slot.back.and_then(|c| nodes[c].take()));
        nodes[i] = Some(node);
    }

    nodes
        .into_iter()
        .next()
        .flatten()
        .unwrap_or_else(|| BspNode::leaf(Vec::new()))
}
