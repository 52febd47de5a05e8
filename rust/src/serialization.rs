//! Binary dump and restore of a whole tree.
//!
//! ## Image Layout
//!
//! ```text
//! +--------------------+
//! | DumpHeader (31 B)  |  signature, version, type sizes, capacities,
//! +--------------------+  duplicate flag, item count
//! | node record 0      |  root
//! | node record 1      |  first child of the root, then its subtree, ...
//! | ...                |
//! +--------------------+
//! ```
//!
//! Records appear in pre-order. Each starts with a [`NodeHeader`]; level 0
//! marks a leaf. A leaf body holds `prev`/`next` as ordinals in the leaf
//! chain, then `leaf_capacity` key slots and `leaf_capacity` value slots. An
//! inner body holds `inner_capacity` key slots and `inner_capacity + 1`
//! child slots, each the index of the child's record in the image. Unused
//! slots are zero and all integers are little endian.
//!
//! Only types with a fixed, pointer-free layout can be written, which the
//! zerocopy bounds enforce at compile time.

use std::io::{Read, Write};
use std::mem::size_of;

use zerocopy::little_endian::{U16, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::allocator::NodeAllocator;
use crate::compact_arena::CompactArena;
use crate::error::{BPlusTreeError, BTreeResult};
use crate::tracing_helpers::{debug_log, warn_log};
use crate::types::{BPlusTreeMap, InnerNode, LeafNode, NodeId, NodeRef, TreeStats, NULL_NODE};

pub const DUMP_SIGNATURE: &[u8; 12] = b"pbtree-dump\0";
pub const DUMP_VERSION: u16 = 1;

/// Deepest tree a restore will rebuild.
pub const MAX_RESTORE_HEIGHT: u16 = 64;

const NULL_ORDINAL: u32 = u32::MAX;

/// Fixed header at the start of every image.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct DumpHeader {
    signature: [u8; 12],
    version: U16,
    key_size: U16,
    value_size: U16,
    leaf_capacity: U16,
    inner_capacity: U16,
    duplicates: u8,
    item_count: U64,
}

const _: () = assert!(size_of::<DumpHeader>() == 31);

impl DumpHeader {
    pub fn version(&self) -> u16 {
        self.version.get()
    }

    pub fn item_count(&self) -> u64 {
        self.item_count.get()
    }
}

/// Header shared by leaf and inner records.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct NodeHeader {
    level: U16,
    slot_count: U16,
}

/// A decoded record, classified by its header before the body is read.
enum NodeRecord<K, V> {
    Leaf {
        prev: u32,
        next: u32,
        keys: Vec<K>,
        values: Vec<V>,
    },
    Inner {
        level: u16,
        keys: Vec<K>,
        children: Vec<u32>,
    },
}

/// Bookkeeping while records are decoded in pre-order.
struct RestoreCursor {
    next_record: u32,
    leaves: u32,
    last_leaf: NodeId,
    last_next: u32,
    items: u64,
}

/// Everything a tree owns apart from its configuration and adapter.
struct TreeContent<K, V> {
    root: Option<NodeRef>,
    head_leaf: NodeId,
    tail_leaf: NodeId,
    stats: TreeStats,
    leaf_arena: CompactArena<LeafNode<K, V>>,
    inner_arena: CompactArena<InnerNode<K>>,
}

fn type_size<T>(what: &str) -> BTreeResult<U16> {
    u16::try_from(size_of::<T>())
        .map(U16::new)
        .map_err(|_| BPlusTreeError::invalid_state("dump", &format!("{} type exceeds 65535 bytes", what)))
}

fn decode_slots<T: FromBytes>(body: &[u8], count: usize, record: &str) -> BTreeResult<Vec<T>> {
    let size = size_of::<T>();
    (0..count)
        .map(|slot| {
            T::read_from_bytes(&body[slot * size..(slot + 1) * size])
                .map_err(|_| BPlusTreeError::corrupted_image(record, "slot has the wrong size"))
        })
        .collect()
}

fn write_padding<W: Write>(writer: &mut W, bytes: usize) -> BTreeResult<()> {
    const ZEROS: [u8; 64] = [0; 64];
    let mut remaining = bytes;
    while remaining > 0 {
        let chunk = remaining.min(ZEROS.len());
        writer.write_all(&ZEROS[..chunk])?;
        remaining -= chunk;
    }
    Ok(())
}

impl<K, V, A> BPlusTreeMap<K, V, A>
where
    K: Ord + FromBytes + IntoBytes + Immutable,
    V: FromBytes + IntoBytes + Immutable,
    A: NodeAllocator,
{
    // ============================================================================
    // DUMP
    // ============================================================================

    /// Header describing this tree's configuration and size.
    pub fn dump_header(&self) -> BTreeResult<DumpHeader> {
        Ok(DumpHeader {
            signature: *DUMP_SIGNATURE,
            version: U16::new(DUMP_VERSION),
            key_size: type_size::<K>("key")?,
            value_size: type_size::<V>("value")?,
            leaf_capacity: U16::new(self.config.leaf_capacity as u16),
            inner_capacity: U16::new(self.config.inner_capacity as u16),
            duplicates: u8::from(self.config.duplicates),
            item_count: U64::new(self.stats.item_count as u64),
        })
    }

    /// Write the header and every node in pre-order.
    ///
    /// # Examples
    ///
    /// ```
    /// use pbtree::BPlusTreeMap;
    ///
    /// let mut tree = BPlusTreeMap::new(4).unwrap();
    /// for i in 0..20u32 {
    ///     tree.insert(i, i as u64 * 3);
    /// }
    /// let mut image = Vec::new();
    /// tree.dump(&mut image).unwrap();
    ///
    /// let mut copy = BPlusTreeMap::<u32, u64>::new(4).unwrap();
    /// copy.restore(image.as_slice()).unwrap();
    /// assert_eq!(copy, tree);
    /// ```
    pub fn dump<W: Write>(&self, mut writer: W) -> BTreeResult<()> {
        writer.write_all(self.dump_header()?.as_bytes())?;

        let mut next_record = 0;
        let mut leaf_ordinal = 0;
        if let Some(root) = self.root {
            self.dump_node(&mut writer, root, &mut next_record, &mut leaf_ordinal)?;
        }
        writer.flush()?;
        debug_log!(records = next_record, items = self.len(), "tree dumped");
        Ok(())
    }

    fn dump_node<W: Write>(
        &self,
        writer: &mut W,
        node: NodeRef,
        next_record: &mut u32,
        leaf_ordinal: &mut u32,
    ) -> BTreeResult<()> {
        *next_record += 1;
        match node {
            NodeRef::Leaf(id) => {
                let leaf = self.leaf(id);
                let ordinal = *leaf_ordinal;
                *leaf_ordinal += 1;
                let prev = if leaf.prev == NULL_NODE { NULL_ORDINAL } else { ordinal - 1 };
                let next = if leaf.next == NULL_NODE { NULL_ORDINAL } else { ordinal + 1 };
                let unused = leaf.capacity - leaf.len();

                let header = NodeHeader {
                    level: U16::new(0),
                    slot_count: U16::new(leaf.len() as u16),
                };
                writer.write_all(header.as_bytes())?;
                writer.write_all(U32::new(prev).as_bytes())?;
                writer.write_all(U32::new(next).as_bytes())?;
                for key in &leaf.keys {
                    writer.write_all(key.as_bytes())?;
                }
                write_padding(writer, unused * size_of::<K>())?;
                for value in &leaf.values {
                    writer.write_all(value.as_bytes())?;
                }
                write_padding(writer, unused * size_of::<V>())?;
            }
            NodeRef::Inner(id) => {
                let inner = self.inner(id);
                let header = NodeHeader {
                    level: U16::new(inner.level),
                    slot_count: U16::new(inner.len() as u16),
                };
                writer.write_all(header.as_bytes())?;
                for key in &inner.keys {
                    writer.write_all(key.as_bytes())?;
                }
                write_padding(writer, (inner.capacity - inner.len()) * size_of::<K>())?;

                let mut child_record = *next_record;
                for &child in &inner.children {
                    writer.write_all(U32::new(child_record).as_bytes())?;
                    child_record += self.subtree_nodes(child) as u32;
                }
                write_padding(writer, (inner.capacity - inner.len()) * size_of::<u32>())?;

                for &child in &inner.children {
                    self.dump_node(writer, child, next_record, leaf_ordinal)?;
                }
            }
        }
        Ok(())
    }

    fn subtree_nodes(&self, node: NodeRef) -> usize {
        match node {
            NodeRef::Leaf(_) => 1,
            NodeRef::Inner(id) => {
                1 + self
                    .inner(id)
                    .children
                    .iter()
                    .map(|&child| self.subtree_nodes(child))
                    .sum::<usize>()
            }
        }
    }

    // ============================================================================
    // RESTORE
    // ============================================================================

    /// Replace the tree's content with the image read from `reader`.
    ///
    /// The header must match this tree's key and value sizes, capacities and
    /// duplicate setting. The image is decoded and verified before it is
    /// adopted: on any error the tree keeps its previous content.
    pub fn restore<R: Read>(&mut self, mut reader: R) -> BTreeResult<()> {
        let mut buf = [0u8; size_of::<DumpHeader>()];
        reader.read_exact(&mut buf)?;
        let header = DumpHeader::read_from_bytes(&buf)
            .map_err(|_| BPlusTreeError::truncated("dump header"))?;
        self.check_header(&header)?;

        let saved = self.take_content();
        match self.decode_image(&mut reader, header.item_count()) {
            Ok(()) => {
                let restored = self.take_content();
                self.put_content(saved);
                self.release_all_nodes();
                self.put_content(restored);
                debug_log!(items = self.len(), height = self.height(), "tree restored");
                Ok(())
            }
            Err(err) => {
                self.release_all_nodes();
                self.put_content(saved);
                warn_log!(error = %err, "restore failed, tree left unchanged");
                Err(err)
            }
        }
    }

    fn check_header(&self, header: &DumpHeader) -> BTreeResult<()> {
        let expected = self.dump_header()?;
        if header.signature != expected.signature {
            warn_log!("restore rejected: bad signature");
            return Err(BPlusTreeError::HeaderMismatch("signature".to_string()));
        }
        let fields = [
            ("version", expected.version.get(), header.version.get()),
            ("key_size", expected.key_size.get(), header.key_size.get()),
            ("value_size", expected.value_size.get(), header.value_size.get()),
            ("leaf_capacity", expected.leaf_capacity.get(), header.leaf_capacity.get()),
            ("inner_capacity", expected.inner_capacity.get(), header.inner_capacity.get()),
            ("duplicates", u16::from(expected.duplicates), u16::from(header.duplicates)),
        ];
        for (field, want, found) in fields {
            if want != found {
                warn_log!(field, want, found, "restore rejected: header mismatch");
                return Err(BPlusTreeError::header_mismatch(field, u64::from(want), u64::from(found)));
            }
        }
        Ok(())
    }

    /// Decode the node stream into the (empty) tree and verify it.
    fn decode_image<R: Read>(&mut self, reader: &mut R, item_count: u64) -> BTreeResult<()> {
        if item_count == 0 {
            return Ok(());
        }

        let mut cursor = RestoreCursor {
            next_record: 0,
            leaves: 0,
            last_leaf: NULL_NODE,
            last_next: NULL_ORDINAL,
            items: 0,
        };
        let root = self.decode_node(reader, None, &mut cursor)?;
        self.root = Some(root);
        self.tail_leaf = cursor.last_leaf;
        self.stats.item_count = cursor.items as usize;

        if cursor.last_next != NULL_ORDINAL {
            return Err(BPlusTreeError::corrupted_image("leaf chain", "last leaf has a successor"));
        }
        if cursor.items != item_count {
            return Err(BPlusTreeError::corrupted_image(
                "item count",
                &format!("header says {} but leaves hold {}", item_count, cursor.items),
            ));
        }
        self.check_invariants_detailed()
            .map_err(|violation| BPlusTreeError::corrupted_image("tree", &violation))
    }

    fn decode_node<R: Read>(
        &mut self,
        reader: &mut R,
        expected_level: Option<u16>,
        cursor: &mut RestoreCursor,
    ) -> BTreeResult<NodeRef> {
        let record = self.read_record(reader, expected_level)?;
        cursor.next_record += 1;

        match record {
            NodeRecord::Leaf {
                prev,
                next,
                keys,
                values,
            } => {
                let ordinal = cursor.leaves;
                let expected_prev = ordinal.checked_sub(1).unwrap_or(NULL_ORDINAL);
                if prev != expected_prev || (ordinal > 0 && cursor.last_next != ordinal) {
                    return Err(BPlusTreeError::corrupted_image(
                        "leaf chain",
                        &format!("leaf {} is linked out of order", ordinal),
                    ));
                }

                cursor.items += keys.len() as u64;
                let id = self.allocate_leaf();
                let leaf = self.leaf_mut(id);
                leaf.keys = keys;
                leaf.values = values;
                leaf.prev = cursor.last_leaf;
                if cursor.last_leaf == NULL_NODE {
                    self.head_leaf = id;
                } else {
                    self.leaf_mut(cursor.last_leaf).next = id;
                }
                cursor.last_leaf = id;
                cursor.last_next = next;
                cursor.leaves += 1;
                Ok(NodeRef::Leaf(id))
            }
            NodeRecord::Inner {
                level,
                keys,
                children,
            } => {
                let id = self.allocate_inner(level);
                self.inner_mut(id).keys = keys;
                for record_index in children {
                    let child = if record_index == cursor.next_record {
                        self.decode_node(reader, Some(level - 1), cursor)
                    } else {
                        Err(BPlusTreeError::corrupted_image(
                            "inner record",
                            &format!("child record {} expected at {}", record_index, cursor.next_record),
                        ))
                    };
                    match child {
                        Ok(child) => self.inner_mut(id).children.push(child),
                        Err(err) => {
                            self.free_subtree(NodeRef::Inner(id));
                            return Err(err);
                        }
                    }
                }
                Ok(NodeRef::Inner(id))
            }
        }
    }

    /// Read one record, classifying it by its header.
    fn read_record<R: Read>(&self, reader: &mut R, expected_level: Option<u16>) -> BTreeResult<NodeRecord<K, V>> {
        let mut buf = [0u8; size_of::<NodeHeader>()];
        reader.read_exact(&mut buf)?;
        let header = NodeHeader::read_from_bytes(&buf)
            .map_err(|_| BPlusTreeError::truncated("node header"))?;
        let level = header.level.get();
        let slot_count = usize::from(header.slot_count.get());

        if let Some(expected) = expected_level {
            if level != expected {
                return Err(BPlusTreeError::corrupted_image(
                    "node header",
                    &format!("level {} where {} was expected", level, expected),
                ));
            }
        } else if level >= MAX_RESTORE_HEIGHT {
            return Err(BPlusTreeError::corrupted_image(
                "node header",
                &format!("root level {} exceeds the maximum height", level),
            ));
        }

        let key_size = size_of::<K>();
        if level == 0 {
            let capacity = self.config.leaf_capacity;
            if slot_count == 0 || slot_count > capacity {
                return Err(BPlusTreeError::corrupted_image(
                    "leaf record",
                    &format!("{} slots used of {}", slot_count, capacity),
                ));
            }
            let mut body = vec![0u8; LeafNode::<K, V>::byte_size(capacity) - size_of::<NodeHeader>()];
            reader.read_exact(&mut body)?;

            let links = 2 * size_of::<u32>();
            let keys_end = links + capacity * key_size;
            let prev = U32::read_from_bytes(&body[..4]).map_or(NULL_ORDINAL, |v| v.get());
            let next = U32::read_from_bytes(&body[4..links]).map_or(NULL_ORDINAL, |v| v.get());
            Ok(NodeRecord::Leaf {
                prev,
                next,
                keys: decode_slots(&body[links..keys_end], slot_count, "leaf record")?,
                values: decode_slots(&body[keys_end..], slot_count, "leaf record")?,
            })
        } else {
            let capacity = self.config.inner_capacity;
            if slot_count == 0 || slot_count > capacity {
                return Err(BPlusTreeError::corrupted_image(
                    "inner record",
                    &format!("{} slots used of {}", slot_count, capacity),
                ));
            }
            let mut body = vec![0u8; InnerNode::<K>::byte_size(capacity) - size_of::<NodeHeader>()];
            reader.read_exact(&mut body)?;

            let keys_end = capacity * key_size;
            let children: Vec<U32> = decode_slots(&body[keys_end..], slot_count + 1, "inner record")?;
            Ok(NodeRecord::Inner {
                level,
                keys: decode_slots(&body[..keys_end], slot_count, "inner record")?,
                children: children.into_iter().map(|child| child.get()).collect(),
            })
        }
    }

    fn take_content(&mut self) -> TreeContent<K, V> {
        TreeContent {
            root: self.root.take(),
            head_leaf: std::mem::replace(&mut self.head_leaf, NULL_NODE),
            tail_leaf: std::mem::replace(&mut self.tail_leaf, NULL_NODE),
            stats: std::mem::take(&mut self.stats),
            leaf_arena: std::mem::take(&mut self.leaf_arena),
            inner_arena: std::mem::take(&mut self.inner_arena),
        }
    }

    fn put_content(&mut self, content: TreeContent<K, V>) {
        self.root = content.root;
        self.head_leaf = content.head_leaf;
        self.tail_leaf = content.tail_leaf;
        self.stats = content.stats;
        self.leaf_arena = content.leaf_arena;
        self.inner_arena = content.inner_arena;
    }
}
