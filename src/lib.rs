#![allow(clippy::style, clippy::bool_comparison, clippy::needless_lifetimes)]

#[macro_use] extern crate log;

pub mod arch;
pub mod ast;
mod bit_misc;
pub mod engine;
pub mod modes;
pub mod semantics;
pub mod symbolic;
pub mod taint;

pub use crate::arch::{
    Architecture, ConcreteState, Fault, Immediate, Instruction, MemoryAccess, MergeRule,
    Operand, Register, RegisterId,
};
pub use crate::ast::{
    ArithOpType, AstContext, AstCtx, CompareOpType, Node, NodeType, SymbolicVariable,
    UnaryOpType, VariableId,
};
pub use crate::engine::Engine;
pub use crate::modes::{Mode, Modes, SharedModes};
pub use crate::semantics::{Semantics, Step};
pub use crate::symbolic::{
    Branch, ExprId, Origin, PathConstraint, SymbolicExpression, SymbolicState,
};
pub use crate::taint::TaintState;

use quick_error::quick_error;

quick_error! {
    #[derive(Debug, Clone, Eq, PartialEq)]
    pub enum Error {
        InvalidWidth(op: &'static str, detail: String) {
            description("Invalid bit-vector width")
            display("Invalid widths for {}: {}", op, detail)
        }
        UnknownExpression(id: ExprId) {
            description("Unknown symbolic expression")
            display("Unknown symbolic expression {}", id)
        }
        UnknownVariable(id: VariableId) {
            description("Unknown symbolic variable")
            display("Unknown symbolic variable {}", id)
        }
        InvalidRegister(id: RegisterId, arch: Architecture) {
            description("Invalid register")
            display("Register {} is not available on {:?}", id.0, arch)
        }
        UnknownRegister(name: String, arch: Architecture) {
            description("Unknown register name")
            display("No register named {:?} on {:?}", name, arch)
        }
        InvalidOperand(opcode: u32, detail: &'static str) {
            description("Invalid instruction operand")
            display("Invalid operand for opcode {}: {}", opcode, detail)
        }
        UnknownMode(name: String) {
            description("Unknown mode")
            display("Unknown mode {:?}", name)
        }
    }
}
