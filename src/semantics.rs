//! Instruction semantics.
//!
//! Each supported opcode has a builder function which reads its operands as formulas,
//! records the results as symbolic expressions, keeps the concrete state in sync and
//! propagates taint. Builders are looked up from a dense table indexed by opcode.

use crate::arch::{
    aarch64 as regs_aarch64, Architecture, ConcreteState, Fault, Instruction, MemoryAccess,
    Operand, Register, RegisterId,
};
use crate::ast::{AstCtx, Node};
use crate::modes::{Mode, Modes};
use crate::symbolic::{ExprId, Origin, SymbolicState};
use crate::taint::TaintState;
use crate::Error;

/// Declares opcode numbers for an architecture. Ids start at 1; 0 is never a valid opcode.
macro_rules! opcodes {
    ($($name:ident,)*) => {
        #[allow(non_camel_case_types, dead_code)]
        #[repr(u32)]
        enum Ids {
            Invalid,
            $($name,)*
            Count,
        }

        $(pub const $name: u32 = Ids::$name as u32;)*

        /// One past the highest opcode number.
        pub const COUNT: u32 = Ids::Count as u32;
    }
}

pub mod aarch64;
pub mod x86;

pub type Builder = for<'a, 'e> fn(&mut Step<'a, 'e>) -> Result<Fault, Error>;

pub struct Semantics {
    arch: Architecture,
    table: Vec<Option<Builder>>,
}

impl Semantics {
    pub fn new(arch: Architecture) -> Semantics {
        let table = match arch {
            Architecture::X86 | Architecture::X86_64 => x86::builders(),
            Architecture::AArch64 => aarch64::builders(),
        };
        Semantics {
            arch,
            table,
        }
    }

    pub fn arch(&self) -> Architecture {
        self.arch
    }

    pub fn is_supported(&self, opcode: u32) -> bool {
        self.builder(opcode).is_some()
    }

    fn builder(&self, opcode: u32) -> Option<Builder> {
        self.table.get(opcode as usize).and_then(|&x| x)
    }

    /// Runs the builder of the step's instruction. Opcodes without semantics fault
    /// with `InvalidOpcode` and leave the state untouched.
    pub fn build_semantics<'e>(&self, step: &mut Step<'_, 'e>) -> Result<Fault, Error> {
        let opcode = step.inst.opcode();
        let builder = match self.builder(opcode) {
            Some(s) => s,
            None => {
                debug!("{:x}: no semantics for opcode {}", step.inst.address(), opcode);
                return Ok(Fault::InvalidOpcode);
            }
        };
        step.resolve_memory_operands()?;
        builder(step)
    }
}

/// State available to a builder while processing one instruction.
pub struct Step<'a, 'e> {
    pub(crate) ctx: AstCtx<'e>,
    pub(crate) arch: Architecture,
    pub(crate) modes: &'a Modes,
    pub(crate) symbolic: &'a mut SymbolicState<'e>,
    pub(crate) taint: &'a mut TaintState,
    pub(crate) concrete: &'a mut ConcreteState,
    pub(crate) inst: &'a mut Instruction,
}

impl<'a, 'e> Step<'a, 'e> {
    pub(crate) fn new(
        ctx: AstCtx<'e>,
        modes: &'a Modes,
        symbolic: &'a mut SymbolicState<'e>,
        taint: &'a mut TaintState,
        concrete: &'a mut ConcreteState,
        inst: &'a mut Instruction,
    ) -> Step<'a, 'e> {
        Step {
            ctx,
            arch: symbolic.arch(),
            modes,
            symbolic,
            taint,
            concrete,
            inst,
        }
    }

    pub fn instruction(&self) -> &Instruction {
        &*self.inst
    }

    fn invalid_operand(&self, detail: &'static str) -> Error {
        Error::InvalidOperand(self.inst.opcode(), detail)
    }

    pub fn operand_count(&self) -> usize {
        self.inst.operands().len()
    }

    pub fn operand(&self, i: usize) -> Result<Operand, Error> {
        self.inst.operands().get(i).copied().ok_or_else(|| self.invalid_operand("missing operand"))
    }

    pub fn register(&self, id: RegisterId) -> Result<Register, Error> {
        self.arch.register(id)
    }

    pub fn register_operand(&self, id: RegisterId) -> Result<Operand, Error> {
        self.register(id).map(Operand::Register)
    }

    /// Address of the instruction following this one.
    pub fn next_address(&self) -> u64 {
        self.inst.address().wrapping_add(u64::from(self.inst.length()))
    }

    fn is_zero_register(&self, reg: &Register) -> bool {
        self.arch == Architecture::AArch64 && regs_aarch64::is_zero_register(reg.id())
    }

    fn is_program_counter(&self, reg: &Register) -> bool {
        reg.parent() == self.arch.program_counter().parent()
    }

    /// Formula of `base + index * scale + displacement` in address width.
    pub fn effective_address(&self, access: &MemoryAccess) -> Result<Node<'e>, Error> {
        let ctx = self.ctx;
        let bits = self.arch.gpr_bits();
        let mut result = ctx.constant(access.displacement() as u128, bits);
        if let Some(base) = access.base() {
            let base = ctx.resize(self.read_register(&base)?, bits)?;
            result = ctx.add(base, result)?;
        }
        if let Some(index) = access.index() {
            let index = ctx.resize(self.read_register(&index)?, bits)?;
            let scaled = match access.scale() {
                0 | 1 => index,
                scale => ctx.mul(index, ctx.constant(u128::from(scale), bits))?,
            };
            result = ctx.add(result, scaled)?;
        }
        Ok(result)
    }

    /// Computes concrete addresses of the memory operands from the state before the
    /// instruction runs.
    fn resolve_memory_operands(&mut self) -> Result<(), Error> {
        for i in 0..self.operand_count() {
            if let Operand::Memory(access) = self.operand(i)? {
                if access.base().is_none() && access.index().is_none() {
                    continue;
                }
                if access.bits() == 0 || access.bits() % 8 != 0 {
                    return Err(self.invalid_operand("memory access width"));
                }
                let address = self.ctx.evaluate_with_memory(
                    self.effective_address(&access)?,
                    &*self.concrete,
                );
                if let Operand::Memory(ref mut access) = self.inst.operands_mut()[i] {
                    access.set_address(address as u64);
                }
            }
        }
        Ok(())
    }

    /// Current formula of a register. The program counter reads as the address
    /// it has while this instruction executes.
    pub fn read_register(&self, reg: &Register) -> Result<Node<'e>, Error> {
        let ctx = self.ctx;
        if self.is_zero_register(reg) {
            return Ok(ctx.zero(reg.bits()));
        }
        if self.is_program_counter(reg) {
            let pc = match self.arch {
                Architecture::AArch64 => self.inst.address(),
                _ => self.next_address(),
            };
            return Ok(ctx.constant(u128::from(pc), reg.bits()));
        }
        self.symbolic.register_ast(reg, &*self.concrete)
    }

    pub fn read_register_id(&self, id: RegisterId) -> Result<Node<'e>, Error> {
        let reg = self.register(id)?;
        self.read_register(&reg)
    }

    fn array_index(&self, access: &MemoryAccess, symbolic: bool) -> Result<Node<'e>, Error> {
        if symbolic {
            self.effective_address(access)
        } else {
            Ok(self.ctx.constant(u128::from(access.address()), self.arch.gpr_bits()))
        }
    }

    pub fn load(&mut self, access: &MemoryAccess) -> Result<Node<'e>, Error> {
        if self.modes.is_enabled(Mode::MemoryArray) {
            let index = self.array_index(access, self.modes.is_enabled(Mode::SymbolizeLoad))?;
            self.symbolic.memory_array_load(index, access.bytes())
        } else {
            self.symbolic.memory_ast(access, &*self.concrete)
        }
    }

    /// Formula of an operand in its own width.
    pub fn read(&mut self, op: &Operand) -> Result<Node<'e>, Error> {
        match *op {
            Operand::Immediate(imm) => {
                Ok(self.ctx.constant(u128::from(imm.value()), imm.bits()))
            }
            Operand::Register(ref reg) => self.read_register(reg),
            Operand::Memory(ref access) => self.load(access),
        }
    }

    /// Formula of an operand which must be `bits` wide. Immediates are sign-extended
    /// or truncated to fit.
    pub fn read_sized(&mut self, op: &Operand, bits: u32) -> Result<Node<'e>, Error> {
        match *op {
            Operand::Immediate(imm) => Ok(self.ctx.constant(imm.sized_value(bits), bits)),
            _ => {
                if op.bits() != bits {
                    return Err(self.invalid_operand("operand width mismatch"));
                }
                self.read(op)
            }
        }
    }

    /// Records `node` as the new value of `dst` and updates the concrete state.
    /// Writes to zero registers are discarded and return `None`.
    pub fn write(
        &mut self,
        dst: &Operand,
        node: Node<'e>,
        comment: &str,
    ) -> Result<Option<ExprId>, Error> {
        let ctx = self.ctx;
        let address = Some(self.inst.address());
        match *dst {
            Operand::Immediate(..) => Err(self.invalid_operand("immediate destination")),
            Operand::Register(ref reg) => {
                if self.is_zero_register(reg) {
                    return Ok(None);
                }
                let merged = self.symbolic.merge_register(reg, node, &*self.concrete)?;
                let parent = self.register(reg.parent())?;
                let id = self.symbolic.create(merged, Origin::Register(parent), comment, address)?;
                let value = ctx.evaluate_with_memory(merged, &*self.concrete);
                self.concrete.set_register_value(&parent, value);
                self.record(id)?;
                Ok(Some(id))
            }
            Operand::Memory(ref access) => {
                if node.bits() != access.bits() {
                    return Err(self.invalid_operand("memory write width"));
                }
                let id = self.symbolic.create(node, Origin::Memory(*access), comment, address)?;
                let value = ctx.evaluate_with_memory(node, &*self.concrete);
                self.concrete.set_memory_value(access.address(), access.bytes(), value);
                if self.modes.is_enabled(Mode::MemoryArray) {
                    let symbolic = self.modes.is_enabled(Mode::SymbolizeStore);
                    let index = self.array_index(access, symbolic)?;
                    self.symbolic.memory_array_store(index, node)?;
                }
                self.record(id)?;
                Ok(Some(id))
            }
        }
    }

    /// Records an intermediate value which isn't stored anywhere.
    pub fn volatile(&mut self, node: Node<'e>, comment: &str) -> Result<ExprId, Error> {
        let address = Some(self.inst.address());
        let id = self.symbolic.create(node, Origin::Volatile, comment, address)?;
        self.record(id)?;
        Ok(id)
    }

    /// Adds an expression to the instruction, tagging it with the instruction's text.
    fn record(&mut self, id: ExprId) -> Result<(), Error> {
        if !self.inst.disassembly().is_empty() {
            self.symbolic.set_expression_disassembly(id, self.inst.disassembly())?;
        }
        self.inst.expressions_mut().push(id);
        Ok(())
    }

    /// Sets the taint flag of an expression created by this step.
    pub fn stamp(&mut self, id: Option<ExprId>, tainted: bool) -> Result<(), Error> {
        match id {
            Some(id) => self.symbolic.set_expression_tainted(id, tainted),
            None => Ok(()),
        }
    }

    /// Writes a register and sets its taint to `tainted`. Used for flags and other
    /// registers whose taint derives from an already computed result.
    pub fn write_register(
        &mut self,
        id: RegisterId,
        node: Node<'e>,
        comment: &str,
        tainted: bool,
    ) -> Result<(), Error> {
        let dst = self.register_operand(id)?;
        let expr = self.write(&dst, node, comment)?;
        let tainted = self.taint.set_taint(&dst, tainted);
        self.stamp(expr, tainted)
    }

    pub fn is_tainted(&self, op: &Operand) -> bool {
        self.taint.is_operand_tainted(op)
    }

    pub fn is_register_tainted(&self, id: RegisterId) -> Result<bool, Error> {
        Ok(self.taint.is_register_tainted(&self.register(id)?))
    }

    /// Register left architecturally undefined by the instruction. With
    /// CONCRETIZE_UNDEFINED_REGISTERS it gets a fresh unconstrained variable and
    /// loses its taint; otherwise the previous binding stays.
    pub fn undefined(&mut self, id: RegisterId) -> Result<(), Error> {
        if !self.modes.is_enabled(Mode::ConcretizeUndefinedRegisters) {
            return Ok(());
        }
        let reg = self.register(id)?;
        let value = self.concrete.register_value(&reg);
        let var = self.ctx.new_variable(reg.bits(), Some("undefined"), value)?;
        self.write_register(id, var, "Undefined", false)
    }

    /// `undefined` applied only where the 1-bit `keep` is false; where it holds
    /// the register keeps its value and taint.
    pub fn undefined_unless(&mut self, id: RegisterId, keep: Node<'e>) -> Result<(), Error> {
        if !self.modes.is_enabled(Mode::ConcretizeUndefinedRegisters) {
            return Ok(());
        }
        let ctx = self.ctx;
        let reg = self.register(id)?;
        let old = self.read_register(&reg)?;
        let value = self.concrete.register_value(&reg);
        let var = ctx.new_variable(reg.bits(), Some("undefined"), value)?;
        let node = ctx.ite(keep, old, var)?;
        let tainted = self.evaluate(keep) != 0 && self.taint.is_register_tainted(&reg);
        self.write_register(id, node, "Undefined", tainted)
    }

    /// Advances the program counter past the instruction.
    pub fn control_flow(&mut self) -> Result<(), Error> {
        let pc = self.arch.program_counter();
        let next = self.next_address();
        let node = self.ctx.constant(u128::from(next), pc.bits());
        self.write_register(pc.id(), node, "Program Counter", false)?;
        self.inst.set_control_flow(false, false, next);
        Ok(())
    }

    /// Assigns a branch target formula to the program counter and records the path
    /// constraint. A conditional branch counts as taken when the concrete target is
    /// not the fall-through address.
    pub fn branch(&mut self, target: Node<'e>, tainted: bool, conditional: bool) -> Result<(), Error> {
        let pc = self.arch.program_counter();
        let target = self.ctx.resize(target, pc.bits())?;
        self.write_register(pc.id(), target, "Program Counter", tainted)?;
        let next = self.ctx.evaluate_with_memory(target, &*self.concrete) as u64;
        let taken = !conditional || next != self.next_address();
        self.inst.set_control_flow(true, taken, next);
        self.symbolic.push_path_constraint(target, self.inst.address(), next)
    }

    pub fn evaluate(&self, node: Node<'e>) -> u128 {
        self.ctx.evaluate_with_memory(node, &*self.concrete)
    }
}
