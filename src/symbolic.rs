//! Symbolic expressions and the bindings of registers and memory to them.

use std::fmt;

use fxhash::FxHashMap;

use crate::arch::{Architecture, ConcreteState, MemoryAccess, Register, RegisterId};
use crate::ast::{AstCtx, Node, NodeType};
use crate::modes::{Mode, SharedModes};
use crate::Error;

/// Index of a symbolic expression. Ids are allocated sequentially from 0 and never reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExprId(pub u32);

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ref!{}", self.0)
    }
}

/// What a symbolic expression was assigned to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Origin {
    /// Always the root register; sub-register writes are merged into it.
    Register(Register),
    Memory(MemoryAccess),
    /// Intermediate value not stored anywhere, such as the result of `cmp`.
    Volatile,
}

#[derive(Clone, Debug)]
pub struct SymbolicExpression<'e> {
    id: ExprId,
    node: Node<'e>,
    origin: Origin,
    tainted: bool,
    comment: String,
    disassembly: String,
    address: Option<u64>,
}

impl<'e> SymbolicExpression<'e> {
    pub fn id(&self) -> ExprId {
        self.id
    }

    pub fn node(&self) -> Node<'e> {
        self.node
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn is_tainted(&self) -> bool {
        self.tainted
    }

    pub fn is_symbolized(&self) -> bool {
        self.node.is_symbolized()
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Text of the instruction which created this expression, empty if the decoder
    /// didn't provide one.
    pub fn disassembly(&self) -> &str {
        &self.disassembly
    }

    /// Address of the instruction which created this expression.
    pub fn address(&self) -> Option<u64> {
        self.address
    }
}

impl<'e> fmt::Display for SymbolicExpression<'e> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(define-fun {} () (_ BitVec {}) {})", self.id, self.node.bits(), self.node)?;
        if !self.comment.is_empty() {
            write!(f, " ; {}", self.comment)?;
            if !self.disassembly.is_empty() {
                write!(f, ": {}", self.disassembly)?;
            }
        }
        Ok(())
    }
}

/// One possible outcome of a branch.
#[derive(Clone, Debug)]
pub struct Branch<'e> {
    pub taken: bool,
    pub source: u64,
    pub target: u64,
    /// 1-bit formula which is 1 when this outcome happens.
    pub constraint: Node<'e>,
}

#[derive(Clone, Debug)]
pub struct PathConstraint<'e> {
    branches: Vec<Branch<'e>>,
}

impl<'e> PathConstraint<'e> {
    pub fn branches(&self) -> &[Branch<'e>] {
        &self.branches
    }

    pub fn is_multiple_branches(&self) -> bool {
        self.branches.len() > 1
    }

    pub fn taken(&self) -> Option<&Branch<'e>> {
        self.branches.iter().find(|x| x.taken)
    }

    pub fn taken_predicate(&self) -> Option<Node<'e>> {
        self.taken().map(|x| x.constraint)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct MemoryCell {
    expr: ExprId,
    /// Which byte of the expression's value is stored in the cell.
    byte: u8,
}

pub struct SymbolicState<'e> {
    ctx: AstCtx<'e>,
    arch: Architecture,
    modes: SharedModes,
    expressions: Vec<SymbolicExpression<'e>>,
    registers: FxHashMap<RegisterId, ExprId>,
    memory: FxHashMap<u64, MemoryCell>,
    /// (address, bytes) => expression, only kept with ALIGNED_MEMORY.
    aligned: FxHashMap<(u64, u32), ExprId>,
    /// Current memory formula with MEMORY_ARRAY; created on first use.
    memory_array: Option<Node<'e>>,
    path_constraints: Vec<PathConstraint<'e>>,
}

const ALIGNED_SIZES: [u32; 5] = [1, 2, 4, 8, 16];

impl<'e> SymbolicState<'e> {
    pub fn new(ctx: AstCtx<'e>, arch: Architecture) -> SymbolicState<'e> {
        SymbolicState {
            ctx,
            arch,
            modes: ctx.modes().clone(),
            expressions: Vec::new(),
            registers: FxHashMap::default(),
            memory: FxHashMap::default(),
            aligned: FxHashMap::default(),
            memory_array: None,
            path_constraints: Vec::new(),
        }
    }

    pub fn ctx(&self) -> AstCtx<'e> {
        self.ctx
    }

    pub fn arch(&self) -> Architecture {
        self.arch
    }

    /// Creates a new expression and binds it to `origin`.
    ///
    /// Register origins must be root registers with a node of the same width; memory
    /// origins need a node as wide as the access.
    pub fn create(
        &mut self,
        node: Node<'e>,
        origin: Origin,
        comment: &str,
        address: Option<u64>,
    ) -> Result<ExprId, Error> {
        match origin {
            Origin::Register(reg) => {
                if !reg.is_root() || node.bits() != reg.bits() {
                    return Err(Error::InvalidWidth(
                        "register expression",
                        format!("{}-bit node for {}", node.bits(), reg),
                    ));
                }
            }
            Origin::Memory(ref access) => {
                if node.bits() != access.bits() || access.bits() % 8 != 0 {
                    return Err(Error::InvalidWidth(
                        "memory expression",
                        format!("{}-bit node for {}-bit access", node.bits(), access.bits()),
                    ));
                }
            }
            Origin::Volatile => (),
        }
        let id = ExprId(self.expressions.len() as u32);
        self.expressions.push(SymbolicExpression {
            id,
            node,
            origin,
            tainted: false,
            comment: comment.into(),
            disassembly: String::new(),
            address,
        });
        match origin {
            Origin::Register(reg) => {
                self.registers.insert(reg.id(), id);
            }
            Origin::Memory(ref access) => self.bind_memory(access, id),
            Origin::Volatile => (),
        }
        trace!("{}", self.expressions[id.0 as usize]);
        Ok(id)
    }

    fn bind_memory(&mut self, access: &MemoryAccess, id: ExprId) {
        self.remove_aligned(access.address(), access.bytes());
        for (i, address) in access.byte_addresses().enumerate() {
            self.memory.insert(address, MemoryCell {
                expr: id,
                byte: i as u8,
            });
        }
        if self.modes.is_enabled(Mode::AlignedMemory) {
            self.aligned.insert((access.address(), access.bytes()), id);
        }
    }

    /// Removes cached aligned entries overlapping with the bytes.
    fn remove_aligned(&mut self, address: u64, bytes: u32) {
        if self.aligned.is_empty() {
            return;
        }
        for &size in ALIGNED_SIZES.iter() {
            let first = address.wrapping_sub(u64::from(size) - 1);
            for i in 0..(u64::from(size) + u64::from(bytes) - 1) {
                self.aligned.remove(&(first.wrapping_add(i), size));
            }
        }
    }

    pub fn expression(&self, id: ExprId) -> Result<&SymbolicExpression<'e>, Error> {
        self.expressions.get(id.0 as usize).ok_or(Error::UnknownExpression(id))
    }

    pub fn expressions(&self) -> &[SymbolicExpression<'e>] {
        &self.expressions
    }

    pub fn expression_count(&self) -> usize {
        self.expressions.len()
    }

    pub fn set_expression_tainted(&mut self, id: ExprId, tainted: bool) -> Result<(), Error> {
        let expr = self.expressions.get_mut(id.0 as usize).ok_or(Error::UnknownExpression(id))?;
        expr.tainted = tainted;
        Ok(())
    }

    pub fn set_expression_disassembly(&mut self, id: ExprId, text: &str) -> Result<(), Error> {
        let expr = self.expressions.get_mut(id.0 as usize).ok_or(Error::UnknownExpression(id))?;
        expr.disassembly = text.into();
        Ok(())
    }

    /// Expression currently bound to the register's root.
    pub fn read_register(&self, reg: &Register) -> Option<&SymbolicExpression<'e>> {
        let id = *self.registers.get(&reg.parent())?;
        self.expressions.get(id.0 as usize)
    }

    /// Expression currently holding the byte at `address`.
    pub fn read_memory(&self, address: u64) -> Option<&SymbolicExpression<'e>> {
        let cell = self.memory.get(&address)?;
        self.expressions.get(cell.expr.0 as usize)
    }

    /// Root registers with a symbolic binding, sorted by id.
    pub fn bound_registers(&self) -> Vec<(RegisterId, ExprId)> {
        let mut result: Vec<_> = self.registers.iter().map(|(&r, &e)| (r, e)).collect();
        result.sort();
        result
    }

    /// Bytes with a symbolic binding, sorted by address.
    pub fn bound_memory(&self) -> Vec<(u64, ExprId)> {
        let mut result: Vec<_> = self.memory.iter().map(|(&a, c)| (a, c.expr)).collect();
        result.sort();
        result
    }

    /// Formula for the current value of `reg`. Unbound registers are constants taken
    /// from the concrete state.
    pub fn register_ast(
        &self,
        reg: &Register,
        concrete: &ConcreteState,
    ) -> Result<Node<'e>, Error> {
        let ctx = self.ctx;
        match self.read_register(reg) {
            Some(expr) => {
                if reg.is_root() {
                    Ok(expr.node)
                } else {
                    ctx.extract(reg.high(), reg.low(), expr.node)
                }
            }
            None => Ok(ctx.constant(concrete.register_value(reg), reg.bits())),
        }
    }

    /// Full root register value after writing `value` to `reg`, following the
    /// register's merge rule.
    pub fn merge_register(
        &self,
        reg: &Register,
        value: Node<'e>,
        concrete: &ConcreteState,
    ) -> Result<Node<'e>, Error> {
        let ctx = self.ctx;
        if value.bits() != reg.bits() {
            return Err(Error::InvalidWidth(
                "register write",
                format!("{}-bit node for {}", value.bits(), reg),
            ));
        }
        if reg.is_root() {
            return Ok(value);
        }
        match reg.merge() {
            crate::arch::MergeRule::ZeroExtend => ctx.zero_extend(value, reg.parent_bits()),
            crate::arch::MergeRule::Preserve => {
                let parent = self.arch.register(reg.parent())?;
                let old = self.register_ast(&parent, concrete)?;
                let mut result = value;
                if reg.low() != 0 {
                    result = ctx.concat(result, ctx.extract(reg.low() - 1, 0, old)?)?;
                }
                if reg.high() + 1 < reg.parent_bits() {
                    let high = ctx.extract(reg.parent_bits() - 1, reg.high() + 1, old)?;
                    result = ctx.concat(high, result)?;
                }
                Ok(result)
            }
        }
    }

    /// Formula for the current value of memory covered by `access`, built from
    /// per-byte bindings. Unbound bytes are constants from the concrete state.
    pub fn memory_ast(
        &self,
        access: &MemoryAccess,
        concrete: &ConcreteState,
    ) -> Result<Node<'e>, Error> {
        let ctx = self.ctx;
        let address = access.address();
        let bytes = access.bytes();
        if bytes == 0 {
            return Err(Error::InvalidWidth("memory read", format!("{} bits", access.bits())));
        }
        if self.modes.is_enabled(Mode::AlignedMemory) {
            if let Some(&id) = self.aligned.get(&(address, bytes)) {
                return Ok(self.expression(id)?.node);
            }
        }
        let mut parts = Vec::with_capacity(bytes as usize);
        for i in (0..u64::from(bytes)).rev() {
            let byte_address = address.wrapping_add(i);
            let node = match self.memory.get(&byte_address) {
                Some(cell) => {
                    let expr = self.expression(cell.expr)?;
                    let low = u32::from(cell.byte) * 8;
                    ctx.extract(low + 7, low, expr.node)?
                }
                None => ctx.constant(u128::from(concrete.memory_byte(byte_address)), 8),
            };
            parts.push(node);
        }
        ctx.concat_many(parts)
    }

    /// Memory array formula; starts as the initial array.
    pub fn memory_array(&mut self) -> Node<'e> {
        let ctx = self.ctx;
        let bits = self.arch.gpr_bits();
        *self.memory_array.get_or_insert_with(|| ctx.memory_array(bits))
    }

    /// Reads `bytes` bytes from the memory array at `index`, little-endian.
    pub fn memory_array_load(&mut self, index: Node<'e>, bytes: u32) -> Result<Node<'e>, Error> {
        let ctx = self.ctx;
        let array = self.memory_array();
        let mut parts = Vec::with_capacity(bytes as usize);
        for i in (0..bytes).rev() {
            let address = ctx.add(index, ctx.constant(u128::from(i), index.bits()))?;
            parts.push(ctx.select(array, address)?);
        }
        ctx.concat_many(parts)
    }

    /// Stores `value` little-endian into the memory array at `index`.
    pub fn memory_array_store(&mut self, index: Node<'e>, value: Node<'e>) -> Result<(), Error> {
        let ctx = self.ctx;
        let mut array = self.memory_array();
        for i in 0..(value.bits() / 8) {
            let address = ctx.add(index, ctx.constant(u128::from(i), index.bits()))?;
            let byte = ctx.extract(i * 8 + 7, i * 8, value)?;
            array = ctx.store(array, address, byte)?;
        }
        self.memory_array = Some(array);
        Ok(())
    }

    /// Removes the register's root binding; its value comes from the concrete
    /// state afterwards.
    pub fn concretize_register(&mut self, reg: &Register) {
        self.registers.remove(&reg.parent());
    }

    pub fn concretize_memory(&mut self, address: u64) {
        self.memory.remove(&address);
        self.remove_aligned(address, 1);
    }

    pub fn concretize_memory_access(&mut self, access: &MemoryAccess) {
        for address in access.byte_addresses() {
            self.memory.remove(&address);
        }
        self.remove_aligned(access.address(), access.bytes());
    }

    pub fn concretize_all_registers(&mut self) {
        self.registers.clear();
    }

    pub fn concretize_all_memory(&mut self) {
        self.memory.clear();
        self.aligned.clear();
        self.memory_array = None;
    }

    /// Drops every register and memory binding. Expressions stay accessible by id.
    pub fn concretize_all(&mut self) {
        self.concretize_all_registers();
        self.concretize_all_memory();
    }

    /// Drops the bindings that still point to `id`. Other bindings of the same
    /// location, created after `id`, are kept.
    pub(crate) fn unbind_expression(&mut self, id: ExprId) -> Result<(), Error> {
        let origin = *self.expression(id)?.origin();
        match origin {
            Origin::Register(reg) => {
                if self.registers.get(&reg.id()) == Some(&id) {
                    self.registers.remove(&reg.id());
                }
            }
            Origin::Memory(access) => {
                for address in access.byte_addresses() {
                    if self.memory.get(&address).map(|x| x.expr) == Some(id) {
                        self.memory.remove(&address);
                    }
                }
                if self.aligned.get(&(access.address(), access.bytes())) == Some(&id) {
                    self.aligned.remove(&(access.address(), access.bytes()));
                }
            }
            Origin::Volatile => (),
        }
        Ok(())
    }

    /// Replaces the register's value with a fresh variable. The variable gets the
    /// current concrete value so that evaluation keeps matching the concrete state.
    pub fn symbolize_register(
        &mut self,
        reg: &Register,
        concrete: &ConcreteState,
    ) -> Result<ExprId, Error> {
        let ctx = self.ctx;
        let value = concrete.register_value(reg);
        let var = ctx.new_variable(reg.bits(), Some(reg.name()), value)?;
        let node = self.merge_register(reg, var, concrete)?;
        let parent = self.arch.register(reg.parent())?;
        let id = self.create(node, Origin::Register(parent), "Register symbolization", None)?;
        debug!("Symbolized register {} as {}", reg, var);
        Ok(id)
    }

    pub fn symbolize_memory(
        &mut self,
        access: &MemoryAccess,
        concrete: &ConcreteState,
    ) -> Result<ExprId, Error> {
        let ctx = self.ctx;
        let value = concrete.memory_access_value(access);
        let var = ctx.new_variable(access.bits(), None, value)?;
        let id = self.create(var, Origin::Memory(*access), "Memory symbolization", None)?;
        if self.modes.is_enabled(Mode::MemoryArray) {
            let index = ctx.constant(u128::from(access.address()), self.arch.gpr_bits());
            self.memory_array_store(index, var)?;
        }
        debug!("Symbolized memory {:x}:{} as {}", access.address(), access.bytes(), var);
        Ok(id)
    }

    /// Records the constraint of a control-flow decision. `pc` is the formula assigned
    /// to the program counter and `target` its concrete value.
    ///
    /// With PC_TRACKING_SYMBOLIC, concrete `pc` formulas are not recorded.
    pub fn push_path_constraint(
        &mut self,
        pc: Node<'e>,
        source: u64,
        target: u64,
    ) -> Result<(), Error> {
        if self.modes.is_enabled(Mode::PcTrackingSymbolic) && !pc.is_symbolized() {
            return Ok(());
        }
        let ctx = self.ctx;
        let bits = pc.bits();
        let mut branches = Vec::with_capacity(2);
        match *pc.ty() {
            // A jump to the fall-through address has a single outcome.
            NodeType::Ite(_, a, b) if a.if_constant().is_some() &&
                b.if_constant().is_some() && a.if_constant() != b.if_constant() =>
            {
                for &dest in &[a, b] {
                    let addr = dest.if_constant().unwrap_or(0);
                    branches.push(Branch {
                        taken: addr == u128::from(target),
                        source,
                        target: addr as u64,
                        constraint: ctx.eq(pc, dest)?,
                    });
                }
            }
            _ => {
                branches.push(Branch {
                    taken: true,
                    source,
                    target,
                    constraint: ctx.eq(pc, ctx.constant(u128::from(target), bits))?,
                });
            }
        }
        debug!("Path constraint at {:x}: {} branch(es)", source, branches.len());
        self.path_constraints.push(PathConstraint {
            branches,
        });
        Ok(())
    }

    pub fn path_constraints(&self) -> &[PathConstraint<'e>] {
        &self.path_constraints
    }

    /// Conjunction of the taken branch constraints; constant 1 when nothing has
    /// been recorded.
    pub fn path_predicate(&self) -> Result<Node<'e>, Error> {
        let ctx = self.ctx;
        let mut result = ctx.bool_const(true);
        for pc in &self.path_constraints {
            if let Some(constraint) = pc.taken_predicate() {
                result = ctx.and(result, constraint)?;
            }
        }
        Ok(result)
    }

    pub fn clear_path_constraints(&mut self) {
        self.path_constraints.clear();
    }

    /// Constraint which is satisfied by inputs making the last recorded multi-way
    /// branch go the other way, combined with every earlier taken constraint.
    pub fn flip_last_branch(&self) -> Result<Option<Node<'e>>, Error> {
        let ctx = self.ctx;
        let last = match self.path_constraints.iter().rposition(|x| x.is_multiple_branches()) {
            Some(s) => s,
            None => return Ok(None),
        };
        let mut result = ctx.bool_const(true);
        for pc in &self.path_constraints[..last] {
            if let Some(constraint) = pc.taken_predicate() {
                result = ctx.and(result, constraint)?;
            }
        }
        let not_taken = self.path_constraints[last].branches.iter().find(|x| !x.taken);
        match not_taken {
            Some(branch) => Ok(Some(ctx.and(result, branch.constraint)?)),
            None => Ok(None),
        }
    }
}
