//! Binary tree format.
//!
//! Everything is little-endian:
//!
//! ```text
//! header    magic u32 (0x505342 | version << 24)
//!           triangle count i32, node count i32, largest node i32
//! triangles count x { v0 v1 v2 as f32 x 9, flags u32 }
//! nodes     prefix order (node, front subtree, back subtree), each
//!           flags u8, normal f32 x 3, d f32, count u16, count x u16 index
//! user data until the end: key u32, size i32, size bytes
//! ```
//!
//! The top five bits of every node flag byte are `10100`.

use std::collections::BTreeMap;
use std::io::Write;

use log::debug;
use nalgebra::{Point3, Vector3};

use crate::bsp::{NodeArena, NodeId, NodeView, Prefix};
use crate::error::{Error, Result};
use crate::{Plane3D, TriangleFlags, UserDataKey, WorldTriangle};

pub const FILE_MAGIC: u32 = 0x0050_5342;
pub const FILE_VERSION: u8 = 0;
pub const FILE_TOKEN: u32 = FILE_MAGIC | ((FILE_VERSION as u32) << 24);

const NODE_PARTITIONED: u8 = 0x01;
const NODE_HAS_FRONT: u8 = 0x02;
const NODE_HAS_BACK: u8 = 0x04;
const NODE_MAGIC: u8 = 0xa0;
const NODE_MAGIC_MASK: u8 = 0xf8;

const HEADER_SIZE: usize = 16;
const TRIANGLE_SIZE: usize = 40;

/// Largest triangle count (tree-wide and per node) the u16 indices allow.
pub const MAX_TRIANGLES: usize = 0xffff;

/// Cursor over a byte slice that reports truncation instead of panicking.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(Error::Truncated {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        self.array().map(u16::from_le_bytes)
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.array().map(u32::from_le_bytes)
    }

    pub fn i32(&mut self) -> Result<i32> {
        self.array().map(i32::from_le_bytes)
    }

    pub fn u64(&mut self) -> Result<u64> {
        self.array().map(u64::from_le_bytes)
    }

    pub fn f32(&mut self) -> Result<f32> {
        self.array().map(f32::from_le_bytes)
    }

    pub fn vec3(&mut self) -> Result<Vector3<f32>> {
        Ok(Vector3::new(self.f32()?, self.f32()?, self.f32()?))
    }

    pub fn point3(&mut self) -> Result<Point3<f32>> {
        self.vec3().map(Point3::from)
    }
}

/// A tree decoded from its binary form.
pub(crate) struct Decoded {
    pub triangles: Vec<WorldTriangle>,
    pub nodes: NodeArena,
    pub root: NodeId,
    pub user_data: BTreeMap<UserDataKey, Vec<u8>>,
}

fn count(value: i32, what: &'static str) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::NegativeCount(what))
}

pub(crate) fn read_tree(data: &[u8]) -> Result<Decoded> {
    let mut reader = ByteReader::new(data);

    let magic = reader.u32()?;
    if magic != FILE_TOKEN {
        return Err(if magic & 0x00ff_ffff == FILE_MAGIC {
            Error::BadVersion((magic >> 24) as u8)
        } else {
            Error::BadMagic(magic)
        });
    }

    let num_triangles = count(reader.i32()?, "triangle count")?;
    let num_nodes = count(reader.i32()?, "node count")?;
    let max_node_triangles = count(reader.i32()?, "node triangle limit")?;

    let triangle_bytes = num_triangles
        .checked_mul(TRIANGLE_SIZE)
        .ok_or(Error::Truncated {
            needed: usize::MAX,
            remaining: reader.remaining(),
        })?;
    let mut triangle_reader = ByteReader::new(reader.take(triangle_bytes)?);
    let mut triangles = Vec::with_capacity(num_triangles);
    for _ in 0..num_triangles {
        let a = triangle_reader.point3()?;
        let b = triangle_reader.point3()?;
        let c = triangle_reader.point3()?;
        let flags = TriangleFlags::from_bits(triangle_reader.u32()?);
        triangles.push(WorldTriangle::with_flags(a, b, c, flags));
    }

    let (nodes, root) = read_nodes(&mut reader, num_nodes, num_triangles, max_node_triangles)?;

    let mut user_data = BTreeMap::new();
    while reader.remaining() > 0 {
        if reader.remaining() < 8 {
            return Err(Error::Truncated {
                needed: 8,
                remaining: reader.remaining(),
            });
        }
        let key = UserDataKey(reader.u32()?);
        let size = count(reader.i32()?, "user data size")?;
        let data = reader.take(size)?;
        user_data.entry(key).or_insert_with(|| data.to_vec());
    }

    debug!(
        "decoded BSP: {} triangles, {} nodes, {} user data entries ({} bytes)",
        triangles.len(),
        nodes.len(),
        user_data.len(),
        data.len()
    );

    Ok(Decoded {
        triangles,
        nodes,
        root,
        user_data,
    })
}

#[derive(Clone, Copy)]
enum Link {
    Front,
    Back,
}

fn read_nodes(
    reader: &mut ByteReader<'_>,
    num_nodes: usize,
    num_triangles: usize,
    max_node_triangles: usize,
) -> Result<(NodeArena, NodeId)> {
    let mut root = None;
    let mut arena = NodeArena::with_capacity(num_nodes.min(reader.remaining() / 19 + 1), 0);
    let mut indices = Vec::new();
    let mut pending = vec![None];

    while let Some(link) = pending.pop() {
        if arena.len() >= num_nodes {
            return Err(Error::NodeCountExceeded(num_nodes));
        }

        let flags = reader.u8()?;
        if flags & NODE_MAGIC_MASK != NODE_MAGIC {
            return Err(Error::BadNodeFlags(flags));
        }
        let partitioned = flags & NODE_PARTITIONED != 0;

        let normal = reader.vec3()?;
        let offset = reader.f32()?;
        let plane = Plane3D::from_raw(normal, offset);

        let count = reader.u16()? as usize;
        if count > max_node_triangles {
            return Err(Error::TooManyNodeTriangles {
                count,
                max: max_node_triangles,
            });
        }

        indices.clear();
        for _ in 0..count {
            let index = reader.u16()? as usize;
            if index >= num_triangles {
                return Err(Error::TriangleIndexOutOfRange {
                    index,
                    count: num_triangles,
                });
            }
            indices.push(index as u32);
        }

        if partitioned && !plane.is_valid() {
            return Err(Error::InvalidPlane {
                normal_length: normal.norm(),
                offset,
            });
        }

        let id = arena.push(plane, partitioned, &indices);
        match link {
            Some((parent, Link::Front)) => arena.set_front(parent, id),
            Some((parent, Link::Back)) => arena.set_back(parent, id),
            None => root = Some(id),
        }

        if flags & NODE_HAS_BACK != 0 {
            pending.push(Some((id, Link::Back)));
        }
        if flags & NODE_HAS_FRONT != 0 {
            pending.push(Some((id, Link::Front)));
        }
    }

    let root = root.ok_or(Error::NodeCountExceeded(num_nodes))?;
    Ok((arena, root))
}

/// Writes a tree in the binary format.
///
/// Every limit of the format is checked before the first byte is written.
pub(crate) fn write_tree<'a, N, W>(
    out: &mut W,
    root: N,
    triangles: &[WorldTriangle],
    user_data: &BTreeMap<UserDataKey, Vec<u8>>,
) -> Result<()>
where
    N: NodeView<'a>,
    W: Write + ?Sized,
{
    if triangles.len() > MAX_TRIANGLES {
        return Err(Error::TooManyTriangles(triangles.len()));
    }

    let mut num_nodes = 0usize;
    let mut max_node_triangles = 0usize;
    for (node, _) in Prefix::new(root) {
        let plane = node.plane();
        if !plane.is_valid() {
            return Err(Error::InvalidPlane {
                normal_length: plane.normal().norm(),
                offset: plane.offset(),
            });
        }
        let count = node.triangle_indices().len();
        if count > MAX_TRIANGLES {
            return Err(Error::TooManyNodeTriangles {
                count,
                max: MAX_TRIANGLES,
            });
        }
        num_nodes += 1;
        max_node_triangles = max_node_triangles.max(count);
    }

    let mut buf = Vec::with_capacity(
        HEADER_SIZE + triangles.len() * TRIANGLE_SIZE + num_nodes * 20 + triangles.len() * 2,
    );

    buf.extend_from_slice(&FILE_TOKEN.to_le_bytes());
    buf.extend_from_slice(&(triangles.len() as i32).to_le_bytes());
    buf.extend_from_slice(&(num_nodes as i32).to_le_bytes());
    buf.extend_from_slice(&(max_node_triangles as i32).to_le_bytes());

    for triangle in triangles {
        for v in triangle.vertices() {
            put_vec3(&mut buf, &v.coords);
        }
        buf.extend_from_slice(&triangle.flags().bits().to_le_bytes());
    }

    for (node, _) in Prefix::new(root) {
        let mut flags = NODE_MAGIC;
        if node.is_partitioned() {
            flags |= NODE_PARTITIONED;
        }
        if node.front().is_some() {
            flags |= NODE_HAS_FRONT;
        }
        if node.back().is_some() {
            flags |= NODE_HAS_BACK;
        }
        buf.push(flags);

        let plane = node.plane();
        put_vec3(&mut buf, &plane.normal());
        buf.extend_from_slice(&plane.offset().to_le_bytes());

        let indices = node.triangle_indices();
        buf.extend_from_slice(&(indices.len() as u16).to_le_bytes());
        for &index in indices {
            buf.extend_from_slice(&(index as u16).to_le_bytes());
        }
    }

    for (key, data) in user_data {
        buf.extend_from_slice(&key.0.to_le_bytes());
        buf.extend_from_slice(&(data.len() as i32).to_le_bytes());
        buf.extend_from_slice(data);
    }

    out.write_all(&buf)?;
    Ok(())
}

fn put_vec3(buf: &mut Vec<u8>, v: &Vector3<f32>) {
    for c in v.iter() {
        buf.extend_from_slice(&c.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsp::BspNode;

    fn make_triangle(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> WorldTriangle {
        WorldTriangle::new(
            Point3::new(a[0], a[1], a[2]),
            Point3::new(b[0], b[1], b[2]),
            Point3::new(c[0], c[1], c[2]),
        )
    }

    fn encode(root: &BspNode, triangles: &[WorldTriangle]) -> Vec<u8> {
        let mut out = Vec::new();
        write_tree(&mut out, root, triangles, &BTreeMap::new()).unwrap();
        out
    }

    fn two_node_tree() -> (BspNode, Vec<WorldTriangle>) {
        let triangles = vec![
            make_triangle([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
            make_triangle([0.0, 2.0, 0.0], [0.0, 2.0, 1.0], [1.0, 2.0, 0.0]),
        ];
        let mut root = BspNode::partitioned(Plane3D::new(Vector3::y(), 0.0), vec![0]);
        root.set_front(Some(BspNode::leaf(vec![1])));
        (root, triangles)
    }

    #[test]
    fn header_layout() {
        let (root, triangles) = two_node_tree();
        let bytes = encode(&root, &triangles);

        assert_eq!(&bytes[0..4], &[0x42, 0x53, 0x50, 0x00]);
        assert_eq!(i32::from_le_bytes(bytes[4..8].try_into().unwrap()), 2);
        assert_eq!(i32::from_le_bytes(bytes[8..12].try_into().unwrap()), 2);
        assert_eq!(i32::from_le_bytes(bytes[12..16].try_into().unwrap()), 1);
        // Root node flags: magic, partitioned, front child.
        assert_eq!(bytes[HEADER_SIZE + 2 * TRIANGLE_SIZE], 0xa3);
        assert_eq!(bytes.len(), HEADER_SIZE + 2 * TRIANGLE_SIZE + 2 * (1 + 16 + 2 + 2));
    }

    #[test]
    fn decode_rebuilds_structure() {
        let (root, triangles) = two_node_tree();
        let decoded = read_tree(&encode(&root, &triangles)).unwrap();

        assert_eq!(decoded.triangles, triangles);
        let r = decoded.nodes.root().unwrap();
        assert!(r.is_partitioned());
        assert_eq!(r.triangle_indices(), &[0]);
        let front = r.front().unwrap();
        assert!(!front.is_partitioned());
        assert_eq!(front.triangle_indices(), &[1]);
        assert!(r.back().is_none());
    }

    #[test]
    fn bad_magic_and_version() {
        let (root, triangles) = two_node_tree();
        let mut bytes = encode(&root, &triangles);
        bytes[3] = 7;
        assert!(matches!(read_tree(&bytes), Err(Error::BadVersion(7))));
        bytes[0] = 0;
        assert!(matches!(read_tree(&bytes), Err(Error::BadMagic(_))));
    }

    #[test]
    fn bad_node_flags() {
        let (root, triangles) = two_node_tree();
        let mut bytes = encode(&root, &triangles);
        bytes[HEADER_SIZE + 2 * TRIANGLE_SIZE] = 0x13;
        assert!(matches!(read_tree(&bytes), Err(Error::BadNodeFlags(0x13))));
    }

    #[test]
    fn index_out_of_range() {
        let (root, triangles) = two_node_tree();
        let mut bytes = encode(&root, &triangles);
        let index_at = HEADER_SIZE + 2 * TRIANGLE_SIZE + 1 + 16 + 2;
        bytes[index_at] = 9;
        assert!(matches!(
            read_tree(&bytes),
            Err(Error::TriangleIndexOutOfRange { index: 9, count: 2 })
        ));
    }

    #[test]
    fn invalid_partition_plane() {
        let (root, triangles) = two_node_tree();
        let mut bytes = encode(&root, &triangles);
        // Scale the root normal's y component to 3.
        let normal_y = HEADER_SIZE + 2 * TRIANGLE_SIZE + 1 + 4;
        bytes[normal_y..normal_y + 4].copy_from_slice(&3.0f32.to_le_bytes());
        assert!(matches!(read_tree(&bytes), Err(Error::InvalidPlane { .. })));
    }

    #[test]
    fn node_count_is_enforced() {
        let (root, triangles) = two_node_tree();
        let mut bytes = encode(&root, &triangles);
        bytes[8..12].copy_from_slice(&1i32.to_le_bytes());
        assert!(matches!(read_tree(&bytes), Err(Error::NodeCountExceeded(1))));
    }

    #[test]
    fn negative_counts_are_rejected() {
        let (root, triangles) = two_node_tree();
        let mut bytes = encode(&root, &triangles);
        bytes[4..8].copy_from_slice(&(-1i32).to_le_bytes());
        assert!(matches!(read_tree(&bytes), Err(Error::NegativeCount(_))));
    }

    #[test]
    fn every_truncation_fails() {
        let (root, triangles) = two_node_tree();
        let mut user_data = BTreeMap::new();
        user_data.insert(UserDataKey::TIME_STAMP, b"12345".to_vec());
        let mut bytes = Vec::new();
        write_tree(&mut bytes, &root, &triangles, &user_data).unwrap();

        // Cutting exactly before the user data leaves a valid tree.
        let nodes_end = bytes.len() - (8 + 5);
        for len in (0..bytes.len()).filter(|&len| len != nodes_end) {
            assert!(read_tree(&bytes[..len]).is_err(), "prefix of {len} bytes decoded");
        }
        assert!(read_tree(&bytes[..nodes_end]).unwrap().user_data.is_empty());
        let decoded = read_tree(&bytes).unwrap();
        assert_eq!(decoded.user_data[&UserDataKey::TIME_STAMP], b"12345");
    }

    #[test]
    fn duplicate_user_data_keeps_first() {
        let (root, triangles) = two_node_tree();
        let mut user_data = BTreeMap::new();
        user_data.insert(UserDataKey::TIME_STAMP, b"100".to_vec());
        let mut bytes = Vec::new();
        write_tree(&mut bytes, &root, &triangles, &user_data).unwrap();

        bytes.extend_from_slice(&UserDataKey::TIME_STAMP.0.to_le_bytes());
        bytes.extend_from_slice(&3i32.to_le_bytes());
        bytes.extend_from_slice(b"200");

        let decoded = read_tree(&bytes).unwrap();
        assert_eq!(decoded.user_data.len(), 1);
        assert_eq!(decoded.user_data[&UserDataKey::TIME_STAMP], b"100");
    }

    #[test]
    fn writer_rejects_invalid_plane() {
        let triangles = vec![make_triangle([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0])];
        let root = BspNode::partitioned(Plane3D::from_raw(Vector3::new(0.0, 2.0, 0.0), 0.0), vec![0]);
        let mut out = Vec::new();
        let err = write_tree(&mut out, &root, &triangles, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidPlane { .. }));
        assert!(out.is_empty());
    }

    #[test]
    fn reader_reports_truncation() {
        let mut reader = ByteReader::new(&[1, 0, 0]);
        assert!(matches!(
            reader.u32(),
            Err(Error::Truncated { needed: 4, remaining: 3 })
        ));
        assert_eq!(reader.u16().unwrap(), 1);
        assert_eq!(reader.remaining(), 1);
    }
}
