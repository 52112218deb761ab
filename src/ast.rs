//! Hash-consed bit-vector formulas.
//!
//! Every node is created through an `AstContext` and lives as long as the context.
//! Structurally equal nodes are interned to the same allocation, so comparing
//! `Node`s is a pointer comparison.

mod eval;
mod intern;
pub(crate) mod simplify;
#[cfg(test)] mod simplify_tests;

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use smallvec::SmallVec;

use crate::bit_misc::mask;
use crate::modes::{Mode, SharedModes};
use crate::Error;

pub use self::eval::MemoryReader;

pub type AstCtx<'e> = &'e AstContext;

#[derive(Copy, Clone)]
pub struct Node<'e>(&'e NodeBase<'e>, PhantomData<&'e ()>);

pub struct NodeBase<'e> {
    ty: NodeType<'e>,
    bits: u32,
    symbolized: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum NodeType<'e> {
    /// Value and width.
    Constant(u128, u32),
    /// Variable id and width.
    Variable(VariableId, u32),
    Arithmetic(ArithNode<'e>),
    /// 1-bit result.
    Compare(CompareNode<'e>),
    Unary(UnaryOpType, Node<'e>),
    /// Node, high bit, low bit (both inclusive).
    Extract(Node<'e>, u32, u32),
    /// High part, low part.
    Concat(Node<'e>, Node<'e>),
    /// Node, resulting width.
    ZeroExtend(Node<'e>, u32),
    SignExtend(Node<'e>, u32),
    /// 1-bit condition, value if 1, value if 0.
    Ite(Node<'e>, Node<'e>, Node<'e>),
    /// Initial memory, indexed by addresses of the given width, containing bytes.
    MemoryArray(u32),
    /// Array, index. Always 8 bits.
    Select(Node<'e>, Node<'e>),
    /// Array, index, 8-bit value.
    Store(Node<'e>, Node<'e>, Node<'e>),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ArithNode<'e> {
    pub ty: ArithOpType,
    pub left: Node<'e>,
    pub right: Node<'e>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct CompareNode<'e> {
    pub ty: CompareOpType,
    pub left: Node<'e>,
    pub right: Node<'e>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArithOpType {
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
    Rol,
    Ror,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CompareOpType {
    Equal,
    NotEqual,
    ULt,
    ULe,
    UGt,
    UGe,
    SLt,
    SLe,
    SGt,
    SGe,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnaryOpType {
    Not,
    Neg,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VariableId(pub u32);

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SymVar_{}", self.0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SymbolicVariable {
    pub id: VariableId,
    pub bits: u32,
    pub alias: Option<String>,
    pub comment: String,
    /// Value used when evaluating formulas containing this variable.
    pub value: u128,
}

impl SymbolicVariable {
    pub fn name(&self) -> String {
        self.id.to_string()
    }
}

impl ArithOpType {
    fn smt_name(self) -> &'static str {
        match self {
            ArithOpType::Add => "bvadd",
            ArithOpType::Sub => "bvsub",
            ArithOpType::Mul => "bvmul",
            ArithOpType::UDiv => "bvudiv",
            ArithOpType::SDiv => "bvsdiv",
            ArithOpType::URem => "bvurem",
            ArithOpType::SRem => "bvsrem",
            ArithOpType::And => "bvand",
            ArithOpType::Or => "bvor",
            ArithOpType::Xor => "bvxor",
            ArithOpType::Shl => "bvshl",
            ArithOpType::LShr => "bvlshr",
            ArithOpType::AShr => "bvashr",
            ArithOpType::Rol => "rotate_left",
            ArithOpType::Ror => "rotate_right",
        }
    }

    pub fn is_commutative(self) -> bool {
        match self {
            ArithOpType::Add | ArithOpType::Mul | ArithOpType::And | ArithOpType::Or |
                ArithOpType::Xor => true,
            _ => false,
        }
    }
}

impl CompareOpType {
    fn smt_name(self) -> &'static str {
        match self {
            CompareOpType::Equal => "=",
            CompareOpType::NotEqual => "distinct",
            CompareOpType::ULt => "bvult",
            CompareOpType::ULe => "bvule",
            CompareOpType::UGt => "bvugt",
            CompareOpType::UGe => "bvuge",
            CompareOpType::SLt => "bvslt",
            CompareOpType::SLe => "bvsle",
            CompareOpType::SGt => "bvsgt",
            CompareOpType::SGe => "bvsge",
        }
    }
}

impl<'e> NodeType<'e> {
    fn calculate_bits(&self) -> u32 {
        match *self {
            NodeType::Constant(_, bits) | NodeType::Variable(_, bits) => bits,
            NodeType::Arithmetic(ref arith) => arith.left.bits(),
            NodeType::Compare(..) => 1,
            NodeType::Unary(_, node) => node.bits(),
            NodeType::Extract(_, high, low) => high - low + 1,
            NodeType::Concat(high, low) => high.bits() + low.bits(),
            NodeType::ZeroExtend(_, bits) | NodeType::SignExtend(_, bits) => bits,
            NodeType::Ite(_, a, _) => a.bits(),
            NodeType::MemoryArray(address_bits) => address_bits,
            NodeType::Select(..) => 8,
            NodeType::Store(array, _, _) => array.bits(),
        }
    }

    fn calculate_symbolized(&self) -> bool {
        match *self {
            NodeType::Variable(..) => true,
            NodeType::Constant(..) | NodeType::MemoryArray(..) => false,
            _ => self.children().iter().any(|x| x.is_symbolized()),
        }
    }

    pub fn children(&self) -> SmallVec<[Node<'e>; 3]> {
        let mut result = SmallVec::new();
        match *self {
            NodeType::Constant(..) | NodeType::Variable(..) | NodeType::MemoryArray(..) => (),
            NodeType::Arithmetic(ref arith) => {
                result.push(arith.left);
                result.push(arith.right);
            }
            NodeType::Compare(ref cmp) => {
                result.push(cmp.left);
                result.push(cmp.right);
            }
            NodeType::Unary(_, node) | NodeType::Extract(node, _, _) |
                NodeType::ZeroExtend(node, _) | NodeType::SignExtend(node, _) =>
            {
                result.push(node);
            }
            NodeType::Concat(a, b) | NodeType::Select(a, b) => {
                result.push(a);
                result.push(b);
            }
            NodeType::Ite(a, b, c) | NodeType::Store(a, b, c) => {
                result.push(a);
                result.push(b);
                result.push(c);
            }
        }
        result
    }
}

impl<'e> Node<'e> {
    #[inline]
    pub fn ty(self) -> &'e NodeType<'e> {
        &self.0.ty
    }

    /// Width of the bit-vector. For array nodes this is the width of the index.
    #[inline]
    pub fn bits(self) -> u32 {
        self.0.bits
    }

    /// True if a symbolic variable appears anywhere in the node.
    #[inline]
    pub fn is_symbolized(self) -> bool {
        self.0.symbolized
    }

    pub fn is_array(self) -> bool {
        match *self.ty() {
            NodeType::MemoryArray(..) | NodeType::Store(..) => true,
            _ => false,
        }
    }

    pub fn if_constant(self) -> Option<u128> {
        match *self.ty() {
            NodeType::Constant(c, _) => Some(c),
            _ => None,
        }
    }

    pub fn if_variable(self) -> Option<VariableId> {
        match *self.ty() {
            NodeType::Variable(id, _) => Some(id),
            _ => None,
        }
    }

    pub fn if_arithmetic(self, ty: ArithOpType) -> Option<(Node<'e>, Node<'e>)> {
        match *self.ty() {
            NodeType::Arithmetic(ref arith) if arith.ty == ty => Some((arith.left, arith.right)),
            _ => None,
        }
    }

    pub fn children(self) -> SmallVec<[Node<'e>; 3]> {
        self.ty().children()
    }

    /// Collects every variable contained in the node, each once, in order of first
    /// appearance.
    pub fn variables(self) -> Vec<VariableId> {
        let mut result = Vec::new();
        if !self.is_symbolized() {
            return result;
        }
        let mut seen = fxhash::FxHashSet::default();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if !node.is_symbolized() || !seen.insert(node) {
                continue;
            }
            if let Some(id) = node.if_variable() {
                result.push(id);
            }
            stack.extend(node.children().into_iter().rev());
        }
        result
    }
}

impl<'e> PartialEq for Node<'e> {
    #[inline]
    fn eq(&self, other: &Node<'e>) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl<'e> Eq for Node<'e> {}

impl<'e> Hash for Node<'e> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.0 as *const NodeBase<'e> as usize).hash(state)
    }
}

impl<'e> fmt::Debug for Node<'e> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl<'e> fmt::Display for Node<'e> {
    /// SMT-LIB2 rendering. 1-bit compare results and conditions are bit-vectors, so
    /// they are wrapped in `ite`s to convert from SMT booleans.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self.ty() {
            NodeType::Constant(c, bits) => write!(f, "(_ bv{} {})", c, bits),
            NodeType::Variable(id, _) => write!(f, "{}", id),
            NodeType::Arithmetic(ref arith) => match arith.ty {
                ArithOpType::Rol | ArithOpType::Ror => {
                    match arith.right.if_constant() {
                        Some(amount) => {
                            let amount = amount % u128::from(self.bits());
                            write!(f, "((_ {} {}) {})", arith.ty.smt_name(), amount, arith.left)
                        }
                        None => {
                            let bits = self.bits();
                            let (first, second) = match arith.ty {
                                ArithOpType::Rol => ("bvshl", "bvlshr"),
                                _ => ("bvlshr", "bvshl"),
                            };
                            write!(
                                f,
                                "(bvor ({} {x} (bvurem {n} (_ bv{b} {b}))) \
                                ({} {x} (bvsub (_ bv{b} {b}) (bvurem {n} (_ bv{b} {b})))))",
                                first, second, x = arith.left, n = arith.right, b = bits,
                            )
                        }
                    }
                }
                ty => write!(f, "({} {} {})", ty.smt_name(), arith.left, arith.right),
            },
            NodeType::Compare(ref cmp) => {
                write!(f, "(ite ({} {} {}) #b1 #b0)", cmp.ty.smt_name(), cmp.left, cmp.right)
            }
            NodeType::Unary(UnaryOpType::Not, node) => write!(f, "(bvnot {})", node),
            NodeType::Unary(UnaryOpType::Neg, node) => write!(f, "(bvneg {})", node),
            NodeType::Extract(node, high, low) => {
                write!(f, "((_ extract {} {}) {})", high, low, node)
            }
            NodeType::Concat(high, low) => write!(f, "(concat {} {})", high, low),
            NodeType::ZeroExtend(node, bits) => {
                write!(f, "((_ zero_extend {}) {})", bits - node.bits(), node)
            }
            NodeType::SignExtend(node, bits) => {
                write!(f, "((_ sign_extend {}) {})", bits - node.bits(), node)
            }
            NodeType::Ite(cond, a, b) => write!(f, "(ite (= {} #b1) {} {})", cond, a, b),
            NodeType::MemoryArray(_) => write!(f, "memory"),
            NodeType::Select(array, index) => write!(f, "(select {} {})", array, index),
            NodeType::Store(array, index, value) => {
                write!(f, "(store {} {} {})", array, index, value)
            }
        }
    }
}

pub struct AstContext {
    interner: intern::Interner,
    modes: SharedModes,
    variables: RefCell<Vec<SymbolicVariable>>,
}

impl AstContext {
    pub fn new(modes: SharedModes) -> AstContext {
        AstContext {
            interner: intern::Interner::new(),
            modes,
            variables: RefCell::new(Vec::new()),
        }
    }

    pub fn modes(&self) -> &SharedModes {
        &self.modes
    }

    /// Amount of distinct nodes allocated so far.
    pub fn interned_count(&self) -> usize {
        self.interner.interned_count()
    }

    fn intern<'e>(&'e self, ty: NodeType<'e>) -> Node<'e> {
        self.interner.intern(ty)
    }

    fn folding(&self) -> bool {
        self.modes.is_enabled(Mode::ConstantFolding)
    }

    fn optimizing(&self) -> bool {
        self.modes.is_enabled(Mode::AstOptimizations)
    }

    /// Creates a constant, truncating `value` to `bits`.
    ///
    /// Panics if `bits` is not in `1..=128`.
    pub fn constant<'e>(&'e self, value: u128, bits: u32) -> Node<'e> {
        assert!(bits >= 1 && bits <= 128, "Invalid constant width {}", bits);
        self.intern(NodeType::Constant(value & mask(bits), bits))
    }

    pub fn bool_const<'e>(&'e self, value: bool) -> Node<'e> {
        self.constant(value as u128, 1)
    }

    pub fn zero<'e>(&'e self, bits: u32) -> Node<'e> {
        self.constant(0, bits)
    }

    pub fn ones<'e>(&'e self, bits: u32) -> Node<'e> {
        self.constant(u128::max_value(), bits)
    }

    /// Allocates a new variable. Ids are allocated sequentially starting from 0.
    pub fn new_variable<'e>(
        &'e self,
        bits: u32,
        alias: Option<&str>,
        value: u128,
    ) -> Result<Node<'e>, Error> {
        if bits == 0 || bits > 128 {
            return Err(Error::InvalidWidth("variable", format!("{} bits", bits)));
        }
        let id = {
            let mut variables = self.variables.borrow_mut();
            let id = VariableId(variables.len() as u32);
            variables.push(SymbolicVariable {
                id,
                bits,
                alias: alias.map(|x| x.into()),
                comment: String::new(),
                value: value & mask(bits),
            });
            id
        };
        trace!("New variable {} ({} bits)", id, bits);
        Ok(self.intern(NodeType::Variable(id, bits)))
    }

    pub fn variable_node<'e>(&'e self, id: VariableId) -> Result<Node<'e>, Error> {
        let bits = self.variable(id)?.bits;
        Ok(self.intern(NodeType::Variable(id, bits)))
    }

    pub fn variable(&self, id: VariableId) -> Result<SymbolicVariable, Error> {
        self.variables.borrow().get(id.0 as usize).cloned().ok_or(Error::UnknownVariable(id))
    }

    pub fn variables(&self) -> Vec<SymbolicVariable> {
        self.variables.borrow().clone()
    }

    pub fn variable_count(&self) -> usize {
        self.variables.borrow().len()
    }

    pub fn set_variable_value(&self, id: VariableId, value: u128) -> Result<(), Error> {
        let mut variables = self.variables.borrow_mut();
        let var = variables.get_mut(id.0 as usize).ok_or(Error::UnknownVariable(id))?;
        var.value = value & mask(var.bits);
        Ok(())
    }

    pub fn set_variable_comment(&self, id: VariableId, comment: &str) -> Result<(), Error> {
        let mut variables = self.variables.borrow_mut();
        let var = variables.get_mut(id.0 as usize).ok_or(Error::UnknownVariable(id))?;
        var.comment = comment.into();
        Ok(())
    }

    pub(crate) fn variable_value(&self, id: VariableId) -> u128 {
        self.variables.borrow().get(id.0 as usize).map(|x| x.value).unwrap_or(0)
    }

    pub fn arithmetic<'e>(
        &'e self,
        ty: ArithOpType,
        left: Node<'e>,
        right: Node<'e>,
    ) -> Result<Node<'e>, Error> {
        if left.bits() != right.bits() || left.is_array() || right.is_array() {
            return Err(Error::InvalidWidth(
                ty.smt_name(),
                format!("{} and {} bits", left.bits(), right.bits()),
            ));
        }
        let bits = left.bits();
        if self.folding() {
            if let (Some(a), Some(b)) = (left.if_constant(), right.if_constant()) {
                return Ok(self.constant(eval::arith(ty, a, b, bits), bits));
            }
        }
        if self.optimizing() {
            if let Some(node) = simplify::simplify_arith(self, ty, left, right)? {
                return Ok(node);
            }
        }
        Ok(self.intern(NodeType::Arithmetic(ArithNode {
            ty,
            left,
            right,
        })))
    }

    pub fn add<'e>(&'e self, left: Node<'e>, right: Node<'e>) -> Result<Node<'e>, Error> {
        self.arithmetic(ArithOpType::Add, left, right)
    }

    pub fn sub<'e>(&'e self, left: Node<'e>, right: Node<'e>) -> Result<Node<'e>, Error> {
        self.arithmetic(ArithOpType::Sub, left, right)
    }

    pub fn mul<'e>(&'e self, left: Node<'e>, right: Node<'e>) -> Result<Node<'e>, Error> {
        self.arithmetic(ArithOpType::Mul, left, right)
    }

    pub fn udiv<'e>(&'e self, left: Node<'e>, right: Node<'e>) -> Result<Node<'e>, Error> {
        self.arithmetic(ArithOpType::UDiv, left, right)
    }

    pub fn sdiv<'e>(&'e self, left: Node<'e>, right: Node<'e>) -> Result<Node<'e>, Error> {
        self.arithmetic(ArithOpType::SDiv, left, right)
    }

    pub fn urem<'e>(&'e self, left: Node<'e>, right: Node<'e>) -> Result<Node<'e>, Error> {
        self.arithmetic(ArithOpType::URem, left, right)
    }

    pub fn srem<'e>(&'e self, left: Node<'e>, right: Node<'e>) -> Result<Node<'e>, Error> {
        self.arithmetic(ArithOpType::SRem, left, right)
    }

    pub fn and<'e>(&'e self, left: Node<'e>, right: Node<'e>) -> Result<Node<'e>, Error> {
        self.arithmetic(ArithOpType::And, left, right)
    }

    pub fn or<'e>(&'e self, left: Node<'e>, right: Node<'e>) -> Result<Node<'e>, Error> {
        self.arithmetic(ArithOpType::Or, left, right)
    }

    pub fn xor<'e>(&'e self, left: Node<'e>, right: Node<'e>) -> Result<Node<'e>, Error> {
        self.arithmetic(ArithOpType::Xor, left, right)
    }

    pub fn shl<'e>(&'e self, left: Node<'e>, right: Node<'e>) -> Result<Node<'e>, Error> {
        self.arithmetic(ArithOpType::Shl, left, right)
    }

    pub fn lshr<'e>(&'e self, left: Node<'e>, right: Node<'e>) -> Result<Node<'e>, Error> {
        self.arithmetic(ArithOpType::LShr, left, right)
    }

    pub fn ashr<'e>(&'e self, left: Node<'e>, right: Node<'e>) -> Result<Node<'e>, Error> {
        self.arithmetic(ArithOpType::AShr, left, right)
    }

    pub fn rol<'e>(&'e self, left: Node<'e>, right: Node<'e>) -> Result<Node<'e>, Error> {
        self.arithmetic(ArithOpType::Rol, left, right)
    }

    pub fn ror<'e>(&'e self, left: Node<'e>, right: Node<'e>) -> Result<Node<'e>, Error> {
        self.arithmetic(ArithOpType::Ror, left, right)
    }

    pub fn unary<'e>(&'e self, ty: UnaryOpType, node: Node<'e>) -> Result<Node<'e>, Error> {
        if node.is_array() {
            return Err(Error::InvalidWidth("unary", "array operand".into()));
        }
        let bits = node.bits();
        if self.folding() {
            if let Some(c) = node.if_constant() {
                return Ok(self.constant(eval::unary(ty, c, bits), bits));
            }
        }
        if self.optimizing() {
            if let Some(node) = simplify::simplify_unary(ty, node) {
                return Ok(node);
            }
        }
        Ok(self.intern(NodeType::Unary(ty, node)))
    }

    pub fn not<'e>(&'e self, node: Node<'e>) -> Result<Node<'e>, Error> {
        self.unary(UnaryOpType::Not, node)
    }

    pub fn neg<'e>(&'e self, node: Node<'e>) -> Result<Node<'e>, Error> {
        self.unary(UnaryOpType::Neg, node)
    }

    pub fn compare<'e>(
        &'e self,
        ty: CompareOpType,
        left: Node<'e>,
        right: Node<'e>,
    ) -> Result<Node<'e>, Error> {
        if left.bits() != right.bits() || left.is_array() || right.is_array() {
            return Err(Error::InvalidWidth(
                ty.smt_name(),
                format!("{} and {} bits", left.bits(), right.bits()),
            ));
        }
        if self.folding() {
            if let (Some(a), Some(b)) = (left.if_constant(), right.if_constant()) {
                return Ok(self.bool_const(eval::compare(ty, a, b, left.bits())));
            }
        }
        if self.optimizing() {
            if let Some(node) = simplify::simplify_compare(self, ty, left, right)? {
                return Ok(node);
            }
        }
        Ok(self.intern(NodeType::Compare(CompareNode {
            ty,
            left,
            right,
        })))
    }

    pub fn eq<'e>(&'e self, left: Node<'e>, right: Node<'e>) -> Result<Node<'e>, Error> {
        self.compare(CompareOpType::Equal, left, right)
    }

    pub fn ne<'e>(&'e self, left: Node<'e>, right: Node<'e>) -> Result<Node<'e>, Error> {
        self.compare(CompareOpType::NotEqual, left, right)
    }

    pub fn ult<'e>(&'e self, left: Node<'e>, right: Node<'e>) -> Result<Node<'e>, Error> {
        self.compare(CompareOpType::ULt, left, right)
    }

    pub fn ule<'e>(&'e self, left: Node<'e>, right: Node<'e>) -> Result<Node<'e>, Error> {
        self.compare(CompareOpType::ULe, left, right)
    }

    pub fn ugt<'e>(&'e self, left: Node<'e>, right: Node<'e>) -> Result<Node<'e>, Error> {
        self.compare(CompareOpType::UGt, left, right)
    }

    pub fn uge<'e>(&'e self, left: Node<'e>, right: Node<'e>) -> Result<Node<'e>, Error> {
        self.compare(CompareOpType::UGe, left, right)
    }

    pub fn slt<'e>(&'e self, left: Node<'e>, right: Node<'e>) -> Result<Node<'e>, Error> {
        self.compare(CompareOpType::SLt, left, right)
    }

    pub fn sle<'e>(&'e self, left: Node<'e>, right: Node<'e>) -> Result<Node<'e>, Error> {
        self.compare(CompareOpType::SLe, left, right)
    }

    pub fn sgt<'e>(&'e self, left: Node<'e>, right: Node<'e>) -> Result<Node<'e>, Error> {
        self.compare(CompareOpType::SGt, left, right)
    }

    pub fn sge<'e>(&'e self, left: Node<'e>, right: Node<'e>) -> Result<Node<'e>, Error> {
        self.compare(CompareOpType::SGe, left, right)
    }

    /// Bits `low..=high` of `node`.
    pub fn extract<'e>(&'e self, high: u32, low: u32, node: Node<'e>) -> Result<Node<'e>, Error> {
        if high < low || high >= node.bits() || node.is_array() {
            return Err(Error::InvalidWidth(
                "extract",
                format!("bits {}..={} of {}-bit node", low, high, node.bits()),
            ));
        }
        if self.folding() {
            if let Some(c) = node.if_constant() {
                return Ok(self.constant(c >> low, high - low + 1));
            }
        }
        if self.optimizing() {
            if let Some(node) = simplify::simplify_extract(self, high, low, node)? {
                return Ok(node);
            }
        }
        Ok(self.intern(NodeType::Extract(node, high, low)))
    }

    /// Low `bits` of `node`.
    pub fn truncate<'e>(&'e self, node: Node<'e>, bits: u32) -> Result<Node<'e>, Error> {
        self.extract(bits.wrapping_sub(1), 0, node)
    }

    pub fn concat<'e>(&'e self, high: Node<'e>, low: Node<'e>) -> Result<Node<'e>, Error> {
        if high.bits() + low.bits() > 128 || high.is_array() || low.is_array() {
            return Err(Error::InvalidWidth(
                "concat",
                format!("{} and {} bits", high.bits(), low.bits()),
            ));
        }
        if self.folding() {
            if let (Some(a), Some(b)) = (high.if_constant(), low.if_constant()) {
                return Ok(self.constant((a << low.bits()) | b, high.bits() + low.bits()));
            }
        }
        if self.optimizing() {
            if let Some(node) = simplify::simplify_concat(self, high, low)? {
                return Ok(node);
            }
        }
        Ok(self.intern(NodeType::Concat(high, low)))
    }

    /// Concatenates nodes given from the most significant one to the least significant one.
    pub fn concat_many<'e, I>(&'e self, nodes: I) -> Result<Node<'e>, Error>
    where I: IntoIterator<Item = Node<'e>>,
    {
        let mut result: Option<Node<'e>> = None;
        for node in nodes {
            result = Some(match result {
                Some(high) => self.concat(high, node)?,
                None => node,
            });
        }
        result.ok_or_else(|| Error::InvalidWidth("concat", "no operands".into()))
    }

    fn check_extend(&self, name: &'static str, node: Node<'_>, bits: u32) -> Result<(), Error> {
        if bits < node.bits() || bits > 128 || node.is_array() {
            Err(Error::InvalidWidth(name, format!("{} bits to {} bits", node.bits(), bits)))
        } else {
            Ok(())
        }
    }

    /// Zero-extends `node` to `bits` wide.
    pub fn zero_extend<'e>(&'e self, node: Node<'e>, bits: u32) -> Result<Node<'e>, Error> {
        self.check_extend("zero_extend", node, bits)?;
        if self.folding() {
            if let Some(c) = node.if_constant() {
                return Ok(self.constant(c, bits));
            }
        }
        if self.optimizing() {
            if let Some(node) = simplify::simplify_zero_extend(self, node, bits)? {
                return Ok(node);
            }
        }
        Ok(self.intern(NodeType::ZeroExtend(node, bits)))
    }

    /// Sign-extends `node` to `bits` wide.
    pub fn sign_extend<'e>(&'e self, node: Node<'e>, bits: u32) -> Result<Node<'e>, Error> {
        self.check_extend("sign_extend", node, bits)?;
        if self.folding() {
            if let Some(c) = node.if_constant() {
                let value = crate::bit_misc::sign_extend(c, node.bits(), bits);
                return Ok(self.constant(value, bits));
            }
        }
        if self.optimizing() {
            if let Some(node) = simplify::simplify_sign_extend(self, node, bits)? {
                return Ok(node);
            }
        }
        Ok(self.intern(NodeType::SignExtend(node, bits)))
    }

    /// Zero-extends or truncates `node` to be `bits` wide.
    pub fn resize<'e>(&'e self, node: Node<'e>, bits: u32) -> Result<Node<'e>, Error> {
        if node.bits() < bits {
            self.zero_extend(node, bits)
        } else if node.bits() > bits {
            self.truncate(node, bits)
        } else {
            Ok(node)
        }
    }

    pub fn ite<'e>(
        &'e self,
        cond: Node<'e>,
        if_true: Node<'e>,
        if_false: Node<'e>,
    ) -> Result<Node<'e>, Error> {
        if cond.bits() != 1 || cond.is_array() || if_true.bits() != if_false.bits() ||
            if_true.is_array() != if_false.is_array()
        {
            return Err(Error::InvalidWidth(
                "ite",
                format!(
                    "condition {} bits, values {} and {} bits",
                    cond.bits(), if_true.bits(), if_false.bits(),
                ),
            ));
        }
        if self.folding() {
            if let (Some(c), Some(_), Some(_)) =
                (cond.if_constant(), if_true.if_constant(), if_false.if_constant())
            {
                return Ok(if c != 0 { if_true } else { if_false });
            }
        }
        if self.optimizing() {
            if let Some(node) = simplify::simplify_ite(cond, if_true, if_false) {
                return Ok(node);
            }
        }
        Ok(self.intern(NodeType::Ite(cond, if_true, if_false)))
    }

    /// The initial memory array, indexed with `address_bits` wide addresses.
    pub fn memory_array<'e>(&'e self, address_bits: u32) -> Node<'e> {
        self.intern(NodeType::MemoryArray(address_bits))
    }

    pub fn select<'e>(&'e self, array: Node<'e>, index: Node<'e>) -> Result<Node<'e>, Error> {
        if !array.is_array() || index.is_array() || index.bits() != array.bits() {
            return Err(Error::InvalidWidth(
                "select",
                format!("index {} bits, array index {} bits", index.bits(), array.bits()),
            ));
        }
        if self.optimizing() {
            if let Some(node) = simplify::simplify_select(self, array, index) {
                return Ok(node);
            }
        }
        Ok(self.intern(NodeType::Select(array, index)))
    }

    pub fn store<'e>(
        &'e self,
        array: Node<'e>,
        index: Node<'e>,
        value: Node<'e>,
    ) -> Result<Node<'e>, Error> {
        if !array.is_array() || index.is_array() || index.bits() != array.bits() ||
            value.bits() != 8 || value.is_array()
        {
            return Err(Error::InvalidWidth(
                "store",
                format!(
                    "index {} bits, value {} bits, array index {} bits",
                    index.bits(), value.bits(), array.bits(),
                ),
            ));
        }
        Ok(self.intern(NodeType::Store(array, index, value)))
    }

    /// Rebuilds `node` bottom-up through the node constructors, applying whichever of
    /// constant folding and AST optimizations are currently enabled.
    pub fn simplify<'e>(&'e self, node: Node<'e>) -> Result<Node<'e>, Error> {
        simplify::rebuild(self, node)
    }

    /// Evaluates `node` using the current values of the variables. Array selects
    /// from untouched memory read zero.
    pub fn evaluate<'e>(&'e self, node: Node<'e>) -> u128 {
        eval::evaluate(self, node, &eval::ZeroMemory)
    }

    /// Evaluates `node`, reading bytes of the initial memory array from `memory`.
    pub fn evaluate_with_memory<'e>(&'e self, node: Node<'e>, memory: &dyn MemoryReader) -> u128 {
        eval::evaluate(self, node, memory)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::modes::Modes;
    use std::rc::Rc;

    fn context(modes: &[Mode]) -> AstContext {
        let m = Modes::empty();
        for &mode in modes {
            m.enable(mode);
        }
        AstContext::new(Rc::new(m))
    }

    #[test]
    fn interning() {
        let ctx = &context(&[]);
        let x = ctx.new_variable(32, None, 0).unwrap();
        let a = ctx.add(x, ctx.constant(4, 32)).unwrap();
        let b = ctx.add(x, ctx.constant(4, 32)).unwrap();
        assert_eq!(a, b);
        assert!(std::ptr::eq(a.0, b.0));
        // Same value, different width
        assert_ne!(ctx.constant(4, 32), ctx.constant(4, 64));
        let count = ctx.interned_count();
        ctx.add(x, ctx.constant(4, 32)).unwrap();
        assert_eq!(ctx.interned_count(), count);
    }

    #[test]
    fn constant_truncated() {
        let ctx = &context(&[]);
        assert_eq!(ctx.constant(0x1234, 8).if_constant(), Some(0x34));
        assert_eq!(ctx.constant(u128::max_value(), 128).if_constant(), Some(u128::max_value()));
    }

    #[test]
    fn width_checks() {
        let ctx = &context(&[]);
        let a = ctx.constant(1, 32);
        let b = ctx.constant(1, 64);
        assert!(ctx.add(a, b).is_err());
        assert!(ctx.eq(a, b).is_err());
        assert!(ctx.extract(32, 0, a).is_err());
        assert!(ctx.extract(3, 4, a).is_err());
        assert!(ctx.concat(ctx.constant(0, 64), ctx.constant(0, 65)).is_err());
        assert!(ctx.zero_extend(b, 32).is_err());
        assert!(ctx.ite(a, a, a).is_err());
        assert!(ctx.ite(ctx.bool_const(true), a, b).is_err());
        let mem = ctx.memory_array(32);
        assert!(ctx.select(mem, b).is_err());
        assert!(ctx.store(mem, a, a).is_err());
        assert!(ctx.add(mem, a).is_err());
        assert!(ctx.new_variable(0, None, 0).is_err());
    }

    #[test]
    fn widths() {
        let ctx = &context(&[]);
        let x = ctx.new_variable(32, None, 0).unwrap();
        assert_eq!(ctx.extract(15, 8, x).unwrap().bits(), 8);
        assert_eq!(ctx.concat(x, x).unwrap().bits(), 64);
        assert_eq!(ctx.zero_extend(x, 128).unwrap().bits(), 128);
        assert_eq!(ctx.ult(x, x).unwrap().bits(), 1);
        let mem = ctx.memory_array(64);
        let idx = ctx.constant(0x1000, 64);
        assert_eq!(ctx.select(mem, idx).unwrap().bits(), 8);
        let stored = ctx.store(mem, idx, ctx.constant(5, 8)).unwrap();
        assert!(stored.is_array());
    }

    #[test]
    fn symbolized_flag() {
        let ctx = &context(&[]);
        let x = ctx.new_variable(8, Some("input"), 0).unwrap();
        let c = ctx.constant(1, 8);
        assert!(!c.is_symbolized());
        assert!(x.is_symbolized());
        let sum = ctx.add(c, x).unwrap();
        assert!(sum.is_symbolized());
        let ext = ctx.zero_extend(sum, 32).unwrap();
        assert!(ext.is_symbolized());
        assert!(!ctx.add(c, c).unwrap().is_symbolized());
        assert_eq!(ext.variables(), vec![x.if_variable().unwrap()]);
        assert_eq!(ctx.variable(VariableId(0)).unwrap().alias.as_deref(), Some("input"));
    }

    #[test]
    fn display_smt() {
        let ctx = &context(&[]);
        let x = ctx.new_variable(32, None, 0).unwrap();
        let sum = ctx.add(x, ctx.constant(7, 32)).unwrap();
        assert_eq!(sum.to_string(), "(bvadd SymVar_0 (_ bv7 32))");
        let ext = ctx.extract(7, 0, sum).unwrap();
        assert_eq!(ext.to_string(), "((_ extract 7 0) (bvadd SymVar_0 (_ bv7 32)))");
        let cmp = ctx.eq(x, ctx.zero(32)).unwrap();
        assert_eq!(cmp.to_string(), "(ite (= SymVar_0 (_ bv0 32)) #b1 #b0)");
        let rol = ctx.rol(x, ctx.constant(33, 32)).unwrap();
        assert_eq!(rol.to_string(), "((_ rotate_left 1) SymVar_0)");
        let zext = ctx.zero_extend(x, 64).unwrap();
        assert_eq!(zext.to_string(), "((_ zero_extend 32) SymVar_0)");
    }
}
