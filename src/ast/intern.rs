use std::cell::RefCell;
use std::hash::{BuildHasherDefault, Hash, Hasher};
use std::marker::PhantomData;
use std::mem;

use hashbrown::hash_map::{HashMap, RawEntryMut};
use typed_arena::Arena;

use super::{Node, NodeBase, NodeType};

pub struct Interner {
    // Lookups go through the raw entry api: the hash is calculated from the NodeType
    // being interned, and candidates are compared against `InternHashNode.node`'s type.
    interned_nodes: RefCell<HashMap<InternHashNode, (), BuildHasherDefault<DummyHasher>>>,
    // Using static lifetime as cannot refer to 'self.
    arena: Arena<NodeBase<'static>>,
}

impl Interner {
    pub fn new() -> Interner {
        Interner {
            interned_nodes: RefCell::new(HashMap::with_capacity_and_hasher(256, Default::default())),
            arena: Arena::new(),
        }
    }

    pub fn intern<'e>(&'e self, ty: NodeType<'e>) -> Node<'e> {
        let hash = node_type_hash(&ty);
        let mut map = self.interned_nodes.borrow_mut();
        let entry = map.raw_entry_mut().from_hash(hash as u64, |x| unsafe {
            let node = x.transmute_node_lifetime();
            x.hash == hash && *node.ty() == ty
        });
        unsafe {
            match entry {
                RawEntryMut::Occupied(e) => e.key().transmute_node_lifetime(),
                RawEntryMut::Vacant(e) => {
                    let base = NodeBase {
                        bits: ty.calculate_bits(),
                        symbolized: ty.calculate_symbolized(),
                        ty: mem::transmute::<NodeType<'e>, NodeType<'static>>(ty),
                    };
                    let node: Node<'static> =
                        Node(mem::transmute(self.arena.alloc(base)), PhantomData);
                    e.insert(InternHashNode {
                        hash,
                        node,
                    }, ());
                    mem::transmute::<Node<'static>, Node<'e>>(node)
                }
            }
        }
    }

    pub fn interned_count(&self) -> usize {
        self.interned_nodes.borrow().len()
    }
}

/// Children hash by their address, which is fine as they're interned already.
fn node_type_hash(ty: &NodeType<'_>) -> usize {
    let mut hasher = fxhash::FxHasher::default();
    ty.hash(&mut hasher);
    hasher.finish() as usize
}

// Precalculates its hash and uses it to keep rehashing cache friendly.
struct InternHashNode {
    hash: usize,
    node: Node<'static>,
}

impl InternHashNode {
    unsafe fn transmute_node_lifetime<'e>(&self) -> Node<'e> {
        mem::transmute::<Node<'static>, Node<'e>>(self.node)
    }
}

impl Hash for InternHashNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.hash as u64).hash(state)
    }
}

/// Passes through the precalculated hash of `InternHashNode`.
#[derive(Default)]
struct DummyHasher {
    value: u64,
}

impl Hasher for DummyHasher {
    fn finish(&self) -> u64 {
        self.value
    }

    fn write(&mut self, data: &[u8]) {
        for &x in data.iter().take(8) {
            self.value = (self.value << 8) | u64::from(x);
        }
    }

    fn write_u64(&mut self, value: u64) {
        self.value = value;
    }
}
