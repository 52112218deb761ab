//! Boolean taint tracking over root registers and memory bytes.
//!
//! The propagation functions return the destination's taint after propagation, so
//! the caller can stamp it on the expression it just created.

use fxhash::FxHashSet;

use crate::arch::{MemoryAccess, Operand, Register, RegisterId};
use crate::modes::{Mode, SharedModes};

pub struct TaintState {
    modes: SharedModes,
    registers: FxHashSet<RegisterId>,
    memory: FxHashSet<u64>,
}

impl TaintState {
    pub fn new(modes: SharedModes) -> TaintState {
        TaintState {
            modes,
            registers: FxHashSet::default(),
            memory: FxHashSet::default(),
        }
    }

    /// Sub-registers share the taint of their root register.
    pub fn is_register_tainted(&self, reg: &Register) -> bool {
        self.registers.contains(&reg.parent())
    }

    pub fn taint_register(&mut self, reg: &Register) -> bool {
        self.registers.insert(reg.parent());
        true
    }

    pub fn untaint_register(&mut self, reg: &Register) -> bool {
        self.registers.remove(&reg.parent());
        false
    }

    pub fn is_address_tainted(&self, address: u64) -> bool {
        self.memory.contains(&address)
    }

    pub fn taint_address(&mut self, address: u64) -> bool {
        self.memory.insert(address);
        true
    }

    pub fn untaint_address(&mut self, address: u64) -> bool {
        self.memory.remove(&address);
        false
    }

    /// True if any byte of the access is tainted. With TAINT_THROUGH_POINTERS a
    /// tainted base or index register also taints the access.
    pub fn is_memory_tainted(&self, access: &MemoryAccess) -> bool {
        if access.byte_addresses().any(|x| self.memory.contains(&x)) {
            return true;
        }
        if self.modes.is_enabled(Mode::TaintThroughPointers) {
            let base = access.base().map(|r| self.is_register_tainted(&r)).unwrap_or(false);
            let index = access.index().map(|r| self.is_register_tainted(&r)).unwrap_or(false);
            return base || index;
        }
        false
    }

    pub fn taint_memory(&mut self, access: &MemoryAccess) -> bool {
        self.memory.extend(access.byte_addresses());
        true
    }

    pub fn untaint_memory(&mut self, access: &MemoryAccess) -> bool {
        for address in access.byte_addresses() {
            self.memory.remove(&address);
        }
        false
    }

    /// Immediates are never tainted.
    pub fn is_operand_tainted(&self, op: &Operand) -> bool {
        match *op {
            Operand::Immediate(..) => false,
            Operand::Memory(ref mem) => self.is_memory_tainted(mem),
            Operand::Register(ref reg) => self.is_register_tainted(reg),
        }
    }

    /// Sets the taint of `dst`; immediates can't hold taint and stay untainted.
    pub fn set_taint(&mut self, dst: &Operand, tainted: bool) -> bool {
        match (*dst, tainted) {
            (Operand::Immediate(..), _) => false,
            (Operand::Memory(ref mem), true) => self.taint_memory(mem),
            (Operand::Memory(ref mem), false) => self.untaint_memory(mem),
            (Operand::Register(ref reg), true) => self.taint_register(reg),
            (Operand::Register(ref reg), false) => self.untaint_register(reg),
        }
    }

    pub fn taint_operand(&mut self, op: &Operand) -> bool {
        self.set_taint(op, true)
    }

    pub fn untaint_operand(&mut self, op: &Operand) -> bool {
        self.set_taint(op, false)
    }

    /// `dst = src`
    pub fn taint_assignment(&mut self, dst: &Operand, src: &Operand) -> bool {
        let tainted = self.is_operand_tainted(src);
        self.set_taint(dst, tainted)
    }

    /// `dst = src1 op src2`
    pub fn taint_union(&mut self, dst: &Operand, src1: &Operand, src2: &Operand) -> bool {
        let tainted = self.is_operand_tainted(src1) || self.is_operand_tainted(src2);
        self.set_taint(dst, tainted)
    }

    /// Root registers currently tainted, sorted.
    pub fn tainted_registers(&self) -> Vec<RegisterId> {
        let mut result: Vec<_> = self.registers.iter().copied().collect();
        result.sort();
        result
    }

    /// Tainted byte addresses, sorted.
    pub fn tainted_memory(&self) -> Vec<u64> {
        let mut result: Vec<_> = self.memory.iter().copied().collect();
        result.sort();
        result
    }

    pub fn clear(&mut self) {
        self.registers.clear();
        self.memory.clear();
    }
}
