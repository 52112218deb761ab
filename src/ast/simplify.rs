//! Algebraic identities applied while building nodes when `AST_OPTIMIZATIONS` is
//! enabled. Every function returns `None` when no rule applies, in which case the
//! caller interns the node as-is.

use fxhash::FxHashMap;

use crate::bit_misc::mask;
use crate::Error;

use super::{
    eval, ArithNode, ArithOpType, AstContext, CompareOpType, Node, NodeType, UnaryOpType,
};

pub fn simplify_arith<'e>(
    ctx: &'e AstContext,
    ty: ArithOpType,
    left: Node<'e>,
    right: Node<'e>,
) -> Result<Option<Node<'e>>, Error> {
    let bits = left.bits();
    // Canonicalize constants to the right.
    let swapped = ty.is_commutative() &&
        left.if_constant().is_some() && right.if_constant().is_none();
    let (left, right) = match swapped {
        true => (right, left),
        false => (left, right),
    };
    let c = right.if_constant();
    let all_ones = mask(bits);
    let result = match ty {
        ArithOpType::Add | ArithOpType::Or | ArithOpType::Xor | ArithOpType::Sub
            if c == Some(0) => Some(left),
        ArithOpType::Sub | ArithOpType::Xor if left == right => Some(ctx.zero(bits)),
        ArithOpType::And | ArithOpType::Mul if c == Some(0) => Some(ctx.zero(bits)),
        ArithOpType::And if c == Some(all_ones) => Some(left),
        ArithOpType::And | ArithOpType::Or if left == right => Some(left),
        ArithOpType::Or if c == Some(all_ones) => Some(ctx.ones(bits)),
        ArithOpType::Mul | ArithOpType::UDiv | ArithOpType::SDiv if c == Some(1) => Some(left),
        ArithOpType::URem | ArithOpType::SRem if c == Some(1) => Some(ctx.zero(bits)),
        ArithOpType::Shl | ArithOpType::LShr | ArithOpType::AShr | ArithOpType::Rol |
            ArithOpType::Ror if c == Some(0) => Some(left),
        ArithOpType::Shl | ArithOpType::LShr
            if c.map(|c| c >= u128::from(bits)).unwrap_or(false) => Some(ctx.zero(bits)),
        ArithOpType::Rol | ArithOpType::Ror
            if c.map(|c| c % u128::from(bits) == 0).unwrap_or(false) => Some(left),
        _ => None,
    };
    if result.is_some() {
        return Ok(result);
    }
    // (x op c1) op c2 => x op (c1 op c2) for associative ops
    match ty {
        ArithOpType::Add | ArithOpType::Mul | ArithOpType::And | ArithOpType::Or |
            ArithOpType::Xor =>
        {
            if let Some(c2) = c {
                if let Some((inner, c1)) = left.if_arithmetic(ty) {
                    if let Some(c1) = c1.if_constant() {
                        let merged = ctx.constant(eval::arith(ty, c1, c2, bits), bits);
                        return ctx.arithmetic(ty, inner, merged).map(Some);
                    }
                }
            }
        }
        _ => (),
    }
    if swapped {
        return Ok(Some(ctx.intern(NodeType::Arithmetic(ArithNode {
            ty,
            left,
            right,
        }))));
    }
    Ok(None)
}

pub fn simplify_unary<'e>(ty: UnaryOpType, node: Node<'e>) -> Option<Node<'e>> {
    match *node.ty() {
        NodeType::Unary(inner_ty, inner) if inner_ty == ty => Some(inner),
        _ => None,
    }
}

pub fn simplify_compare<'e>(
    ctx: &'e AstContext,
    ty: CompareOpType,
    left: Node<'e>,
    right: Node<'e>,
) -> Result<Option<Node<'e>>, Error> {
    if left == right {
        let value = match ty {
            CompareOpType::Equal | CompareOpType::ULe | CompareOpType::UGe |
                CompareOpType::SLe | CompareOpType::SGe => true,
            _ => false,
        };
        return Ok(Some(ctx.bool_const(value)));
    }
    let (left, right) = match ty {
        CompareOpType::Equal | CompareOpType::NotEqual
            if left.if_constant().is_some() && right.if_constant().is_none() => (right, left),
        _ => (left, right),
    };
    let c = right.if_constant();
    match (ty, c) {
        // 1-bit conditions compared against constants are the condition or its inverse.
        (CompareOpType::Equal, Some(1)) | (CompareOpType::NotEqual, Some(0))
            if left.bits() == 1 => Ok(Some(left)),
        (CompareOpType::Equal, Some(0)) | (CompareOpType::NotEqual, Some(1))
            if left.bits() == 1 => ctx.not(left).map(Some),
        (CompareOpType::ULt, Some(0)) => Ok(Some(ctx.bool_const(false))),
        (CompareOpType::UGe, Some(0)) => Ok(Some(ctx.bool_const(true))),
        _ => Ok(None),
    }
}

pub fn simplify_extract<'e>(
    ctx: &'e AstContext,
    high: u32,
    low: u32,
    node: Node<'e>,
) -> Result<Option<Node<'e>>, Error> {
    if low == 0 && high == node.bits() - 1 {
        return Ok(Some(node));
    }
    match *node.ty() {
        NodeType::Extract(inner, _, inner_low) => {
            ctx.extract(inner_low + high, inner_low + low, inner).map(Some)
        }
        NodeType::Concat(high_part, low_part) => {
            let low_bits = low_part.bits();
            if high < low_bits {
                ctx.extract(high, low, low_part).map(Some)
            } else if low >= low_bits {
                ctx.extract(high - low_bits, low - low_bits, high_part).map(Some)
            } else {
                Ok(None)
            }
        }
        NodeType::ZeroExtend(inner, _) => {
            if high < inner.bits() {
                ctx.extract(high, low, inner).map(Some)
            } else if low >= inner.bits() {
                Ok(Some(ctx.zero(high - low + 1)))
            } else {
                Ok(None)
            }
        }
        NodeType::SignExtend(inner, _) if high < inner.bits() => {
            ctx.extract(high, low, inner).map(Some)
        }
        _ => Ok(None),
    }
}

pub fn simplify_concat<'e>(
    ctx: &'e AstContext,
    high: Node<'e>,
    low: Node<'e>,
) -> Result<Option<Node<'e>>, Error> {
    if high.if_constant() == Some(0) {
        return ctx.zero_extend(low, high.bits() + low.bits()).map(Some);
    }
    match (*high.ty(), *low.ty()) {
        (NodeType::Extract(a, a_high, a_low), NodeType::Extract(b, b_high, b_low))
            if a == b && a_low == b_high + 1 =>
        {
            ctx.extract(a_high, b_low, a).map(Some)
        }
        _ => Ok(None),
    }
}

pub fn simplify_zero_extend<'e>(
    ctx: &'e AstContext,
    node: Node<'e>,
    bits: u32,
) -> Result<Option<Node<'e>>, Error> {
    if node.bits() == bits {
        return Ok(Some(node));
    }
    match *node.ty() {
        NodeType::ZeroExtend(inner, _) => ctx.zero_extend(inner, bits).map(Some),
        _ => Ok(None),
    }
}

pub fn simplify_sign_extend<'e>(
    ctx: &'e AstContext,
    node: Node<'e>,
    bits: u32,
) -> Result<Option<Node<'e>>, Error> {
    if node.bits() == bits {
        return Ok(Some(node));
    }
    match *node.ty() {
        NodeType::SignExtend(inner, _) => ctx.sign_extend(inner, bits).map(Some),
        _ => Ok(None),
    }
}

pub fn simplify_ite<'e>(cond: Node<'e>, if_true: Node<'e>, if_false: Node<'e>) -> Option<Node<'e>> {
    if let Some(c) = cond.if_constant() {
        return Some(if c != 0 { if_true } else { if_false });
    }
    if if_true == if_false {
        return Some(if_true);
    }
    if if_true.bits() == 1 && if_true.if_constant() == Some(1) &&
        if_false.if_constant() == Some(0)
    {
        return Some(cond);
    }
    None
}

/// Skips stores whose constant index differs from a constant `index`, and resolves
/// selects of an index that was just stored to.
pub fn simplify_select<'e>(
    ctx: &'e AstContext,
    array: Node<'e>,
    index: Node<'e>,
) -> Option<Node<'e>> {
    let mut current = array;
    while let NodeType::Store(inner, store_index, value) = *current.ty() {
        if store_index == index {
            return Some(value);
        }
        match (store_index.if_constant(), index.if_constant()) {
            (Some(a), Some(b)) if a != b => current = inner,
            _ => break,
        }
    }
    if current != array {
        Some(ctx.intern(NodeType::Select(current, index)))
    } else {
        None
    }
}

pub fn rebuild<'e>(ctx: &'e AstContext, node: Node<'e>) -> Result<Node<'e>, Error> {
    let mut cache = FxHashMap::default();
    rebuild_recurse(ctx, node, &mut cache)
}

fn rebuild_recurse<'e>(
    ctx: &'e AstContext,
    node: Node<'e>,
    cache: &mut FxHashMap<Node<'e>, Node<'e>>,
) -> Result<Node<'e>, Error> {
    if let Some(&result) = cache.get(&node) {
        return Ok(result);
    }
    let mut r = |x: Node<'e>| rebuild_recurse(ctx, x, cache);
    let result = match *node.ty() {
        NodeType::Constant(..) | NodeType::Variable(..) | NodeType::MemoryArray(..) => node,
        NodeType::Arithmetic(ref arith) => {
            let left = r(arith.left)?;
            let right = r(arith.right)?;
            ctx.arithmetic(arith.ty, left, right)?
        }
        NodeType::Compare(ref cmp) => {
            let left = r(cmp.left)?;
            let right = r(cmp.right)?;
            ctx.compare(cmp.ty, left, right)?
        }
        NodeType::Unary(ty, inner) => ctx.unary(ty, r(inner)?)?,
        NodeType::Extract(inner, high, low) => ctx.extract(high, low, r(inner)?)?,
        NodeType::Concat(high, low) => {
            let high = r(high)?;
            let low = r(low)?;
            ctx.concat(high, low)?
        }
        NodeType::ZeroExtend(inner, bits) => ctx.zero_extend(r(inner)?, bits)?,
        NodeType::SignExtend(inner, bits) => ctx.sign_extend(r(inner)?, bits)?,
        NodeType::Ite(cond, a, b) => {
            let cond = r(cond)?;
            let a = r(a)?;
            let b = r(b)?;
            ctx.ite(cond, a, b)?
        }
        NodeType::Select(array, index) => {
            let array = r(array)?;
            let index = r(index)?;
            ctx.select(array, index)?
        }
        NodeType::Store(array, index, value) => {
            let array = r(array)?;
            let index = r(index)?;
            let value = r(value)?;
            ctx.store(array, index, value)?
        }
    };
    cache.insert(node, result);
    Ok(result)
}
