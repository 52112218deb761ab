use fxhash::FxHashMap;

use crate::bit_misc::{mask, msb, to_signed};

use super::{
    ArithOpType, AstContext, CompareOpType, Node, NodeType, UnaryOpType, VariableId,
};

/// Source of the initial memory contents for `select` nodes which reach the
/// base memory array.
pub trait MemoryReader {
    fn read_byte(&self, address: u64) -> u8;
}

pub struct ZeroMemory;

impl MemoryReader for ZeroMemory {
    fn read_byte(&self, _address: u64) -> u8 {
        0
    }
}

pub fn arith(ty: ArithOpType, a: u128, b: u128, bits: u32) -> u128 {
    let m = mask(bits);
    let result = match ty {
        ArithOpType::Add => a.wrapping_add(b),
        ArithOpType::Sub => a.wrapping_sub(b),
        ArithOpType::Mul => a.wrapping_mul(b),
        ArithOpType::UDiv => match b {
            0 => m,
            _ => a / b,
        },
        ArithOpType::URem => match b {
            0 => a,
            _ => a % b,
        },
        ArithOpType::SDiv => {
            let (a, b) = (to_signed(a, bits), to_signed(b, bits));
            match b {
                0 => if a < 0 { 1 } else { m },
                _ => a.wrapping_div(b) as u128,
            }
        }
        ArithOpType::SRem => {
            let (sa, sb) = (to_signed(a, bits), to_signed(b, bits));
            match sb {
                0 => a,
                _ => sa.wrapping_rem(sb) as u128,
            }
        }
        ArithOpType::And => a & b,
        ArithOpType::Or => a | b,
        ArithOpType::Xor => a ^ b,
        ArithOpType::Shl => match b >= u128::from(bits) {
            true => 0,
            false => a << b,
        },
        ArithOpType::LShr => match b >= u128::from(bits) {
            true => 0,
            false => a >> b,
        },
        ArithOpType::AShr => match b >= u128::from(bits) {
            true => if msb(a, bits) { m } else { 0 },
            false => (to_signed(a, bits) >> b) as u128,
        },
        ArithOpType::Rol | ArithOpType::Ror => {
            let amount = (b % u128::from(bits)) as u32;
            let amount = match ty {
                ArithOpType::Rol => amount,
                _ => (bits - amount) % bits,
            };
            if amount == 0 {
                a
            } else {
                (a << amount) | (a >> (bits - amount))
            }
        }
    };
    result & m
}

pub fn unary(ty: UnaryOpType, a: u128, bits: u32) -> u128 {
    match ty {
        UnaryOpType::Not => !a & mask(bits),
        UnaryOpType::Neg => a.wrapping_neg() & mask(bits),
    }
}

pub fn compare(ty: CompareOpType, a: u128, b: u128, bits: u32) -> bool {
    match ty {
        CompareOpType::Equal => a == b,
        CompareOpType::NotEqual => a != b,
        CompareOpType::ULt => a < b,
        CompareOpType::ULe => a <= b,
        CompareOpType::UGt => a > b,
        CompareOpType::UGe => a >= b,
        CompareOpType::SLt => to_signed(a, bits) < to_signed(b, bits),
        CompareOpType::SLe => to_signed(a, bits) <= to_signed(b, bits),
        CompareOpType::SGt => to_signed(a, bits) > to_signed(b, bits),
        CompareOpType::SGe => to_signed(a, bits) >= to_signed(b, bits),
    }
}

/// Evaluates without recursion, as formulas built from long traces can get deep.
/// Values are memoized per call, keeping shared subtrees linear.
pub fn evaluate<'e>(ctx: &'e AstContext, node: Node<'e>, memory: &dyn MemoryReader) -> u128 {
    let mut values: FxHashMap<Node<'e>, u128> = FxHashMap::default();
    let mut stack = vec![(node, false)];
    while let Some((current, children_done)) = stack.pop() {
        if values.contains_key(&current) {
            continue;
        }
        if !children_done {
            stack.push((current, true));
            for child in current.children() {
                if !values.contains_key(&child) {
                    stack.push((child, false));
                }
            }
            continue;
        }
        let value = evaluate_single(ctx, current, &values, memory);
        values.insert(current, value);
    }
    values.get(&node).copied().unwrap_or(0)
}

fn evaluate_single<'e>(
    ctx: &'e AstContext,
    node: Node<'e>,
    values: &FxHashMap<Node<'e>, u128>,
    memory: &dyn MemoryReader,
) -> u128 {
    let value = |x: Node<'e>| values.get(&x).copied().unwrap_or(0);
    let bits = node.bits();
    match *node.ty() {
        NodeType::Constant(c, _) => c,
        NodeType::Variable(id, _) => variable_value(ctx, id),
        NodeType::Arithmetic(ref arith) => {
            self::arith(arith.ty, value(arith.left), value(arith.right), bits)
        }
        NodeType::Compare(ref cmp) => {
            compare(cmp.ty, value(cmp.left), value(cmp.right), cmp.left.bits()) as u128
        }
        NodeType::Unary(ty, inner) => unary(ty, value(inner), bits),
        NodeType::Extract(inner, _, low) => (value(inner) >> low) & mask(bits),
        NodeType::Concat(high, low) => (value(high) << low.bits()) | value(low),
        NodeType::ZeroExtend(inner, _) => value(inner),
        NodeType::SignExtend(inner, _) => {
            crate::bit_misc::sign_extend(value(inner), inner.bits(), bits)
        }
        NodeType::Ite(cond, a, b) => match value(cond) {
            0 => value(b),
            _ => value(a),
        },
        // Arrays have no scalar value; selects walk the store chain instead.
        NodeType::MemoryArray(..) | NodeType::Store(..) => 0,
        NodeType::Select(array, index) => {
            let address = value(index);
            let mut array = array;
            loop {
                match *array.ty() {
                    NodeType::Store(inner, store_index, stored) => {
                        if value(store_index) == address {
                            break value(stored);
                        }
                        array = inner;
                    }
                    _ => break u128::from(memory.read_byte(address as u64)),
                }
            }
        }
    }
}

fn variable_value(ctx: &AstContext, id: VariableId) -> u128 {
    ctx.variable_value(id)
}
