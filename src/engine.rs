//! Processing of instructions against one symbolic, taint and concrete state.

use crate::arch::{
    Architecture, ConcreteState, Fault, Instruction, MemoryAccess, Register, RegisterId,
};
use crate::ast::{AstCtx, Node};
use crate::modes::{Mode, SharedModes};
use crate::semantics::{Semantics, Step};
use crate::symbolic::{ExprId, SymbolicState};
use crate::taint::TaintState;
use crate::Error;

/// Owns the per-analysis state. Nodes are allocated from the `AstContext` the engine
/// was created with, and the engine shares that context's modes.
pub struct Engine<'e> {
    ctx: AstCtx<'e>,
    modes: SharedModes,
    semantics: Semantics,
    symbolic: SymbolicState<'e>,
    taint: TaintState,
    concrete: ConcreteState,
}

impl<'e> Engine<'e> {
    pub fn new(ctx: AstCtx<'e>, arch: Architecture) -> Engine<'e> {
        let modes = ctx.modes().clone();
        Engine {
            ctx,
            semantics: Semantics::new(arch),
            symbolic: SymbolicState::new(ctx, arch),
            taint: TaintState::new(modes.clone()),
            concrete: ConcreteState::new(),
            modes,
        }
    }

    pub fn ctx(&self) -> AstCtx<'e> {
        self.ctx
    }

    pub fn arch(&self) -> Architecture {
        self.semantics.arch()
    }

    pub fn modes(&self) -> &SharedModes {
        &self.modes
    }

    pub fn semantics(&self) -> &Semantics {
        &self.semantics
    }

    pub fn symbolic(&self) -> &SymbolicState<'e> {
        &self.symbolic
    }

    pub fn symbolic_mut(&mut self) -> &mut SymbolicState<'e> {
        &mut self.symbolic
    }

    pub fn taint(&self) -> &TaintState {
        &self.taint
    }

    pub fn taint_mut(&mut self) -> &mut TaintState {
        &mut self.taint
    }

    pub fn concrete(&self) -> &ConcreteState {
        &self.concrete
    }

    pub fn concrete_mut(&mut self) -> &mut ConcreteState {
        &mut self.concrete
    }

    /// Builds the semantics of `inst` and applies them to the state.
    ///
    /// The instruction's previous results are cleared first, so an instruction can be
    /// processed again. Architectural faults are returned as `Ok`; side effects
    /// applied before the fault stay in place.
    pub fn process(&mut self, inst: &mut Instruction) -> Result<Fault, Error> {
        inst.reset();
        let fault = {
            let mut step = Step::new(
                self.ctx,
                &self.modes,
                &mut self.symbolic,
                &mut self.taint,
                &mut self.concrete,
                inst,
            );
            self.semantics.build_semantics(&mut step)?
        };
        inst.set_fault(fault);
        if fault != Fault::NoFault {
            debug!("{:x}: {:?}", inst.address(), fault);
        }
        self.prune(inst)?;
        let mut tainted = false;
        for &id in inst.expressions() {
            tainted |= self.symbolic.expression(id)?.is_tainted();
        }
        inst.set_tainted(tainted);
        Ok(fault)
    }

    /// Drops the instruction's expressions which ONLY_ON_SYMBOLIZED or ONLY_ON_TAINTED
    /// exclude. They stay in the expression table, but registers and memory they
    /// were bound to fall back to the concrete state.
    fn prune(&mut self, inst: &mut Instruction) -> Result<(), Error> {
        let only_symbolized = self.modes.is_enabled(Mode::OnlyOnSymbolized);
        let only_tainted = self.modes.is_enabled(Mode::OnlyOnTainted);
        if !only_symbolized && !only_tainted {
            return Ok(());
        }
        let mut dropped = Vec::new();
        for &id in inst.expressions() {
            let expr = self.symbolic.expression(id)?;
            let keep = (!only_symbolized || expr.is_symbolized()) &&
                (!only_tainted || expr.is_tainted());
            if !keep {
                dropped.push(id);
            }
        }
        for &id in &dropped {
            self.symbolic.unbind_expression(id)?;
        }
        if !dropped.is_empty() {
            trace!("{:x}: pruned {} expression(s)", inst.address(), dropped.len());
            inst.expressions_mut().retain(|x| !dropped.contains(x));
        }
        Ok(())
    }

    pub fn register(&self, id: RegisterId) -> Result<Register, Error> {
        self.arch().register(id)
    }

    /// Current formula of a register.
    pub fn register_ast(&self, id: RegisterId) -> Result<Node<'e>, Error> {
        let reg = self.register(id)?;
        self.symbolic.register_ast(&reg, &self.concrete)
    }

    /// Current formula of memory, built from the byte bindings.
    pub fn memory_ast(&self, access: &MemoryAccess) -> Result<Node<'e>, Error> {
        self.symbolic.memory_ast(access, &self.concrete)
    }

    /// Replaces the register's value with a new variable.
    pub fn symbolize_register(&mut self, id: RegisterId) -> Result<ExprId, Error> {
        let reg = self.register(id)?;
        self.symbolic.symbolize_register(&reg, &self.concrete)
    }

    pub fn symbolize_memory(&mut self, access: &MemoryAccess) -> Result<ExprId, Error> {
        self.symbolic.symbolize_memory(access, &self.concrete)
    }

    /// Sets a concrete register value. Any symbolic binding of the register is
    /// dropped, so the new value is also what later instructions read.
    pub fn set_concrete_register_value(&mut self, id: RegisterId, value: u128) -> Result<(), Error> {
        let reg = self.register(id)?;
        self.concrete.set_register_value(&reg, value);
        self.symbolic.concretize_register(&reg);
        Ok(())
    }

    pub fn concrete_register_value(&self, id: RegisterId) -> Result<u128, Error> {
        let reg = self.register(id)?;
        Ok(self.concrete.register_value(&reg))
    }

    /// Writes concrete bytes and drops their symbolic bindings.
    pub fn set_concrete_memory(&mut self, address: u64, data: &[u8]) {
        self.concrete.set_memory_bytes(address, data);
        for i in 0..data.len() as u64 {
            self.symbolic.concretize_memory(address.wrapping_add(i));
        }
    }

    pub fn concrete_memory_value(&self, access: &MemoryAccess) -> u128 {
        self.concrete.memory_access_value(access)
    }

    /// Evaluates a node with the current variable values, reading unbound memory
    /// from the concrete state.
    pub fn evaluate(&self, node: Node<'e>) -> u128 {
        self.ctx.evaluate_with_memory(node, &self.concrete)
    }

    pub fn is_register_tainted(&self, id: RegisterId) -> Result<bool, Error> {
        let reg = self.register(id)?;
        Ok(self.taint.is_register_tainted(&reg))
    }

    pub fn taint_register(&mut self, id: RegisterId) -> Result<bool, Error> {
        let reg = self.register(id)?;
        Ok(self.taint.taint_register(&reg))
    }

    pub fn untaint_register(&mut self, id: RegisterId) -> Result<bool, Error> {
        let reg = self.register(id)?;
        Ok(self.taint.untaint_register(&reg))
    }
}
