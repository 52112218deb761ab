use super::*;

use std::rc::Rc;

use crate::modes::Modes;

fn ctx_with(modes: &[Mode]) -> AstContext {
    let m = Modes::empty();
    for &mode in modes {
        m.enable(mode);
    }
    AstContext::new(Rc::new(m))
}

fn optimizing() -> AstContext {
    ctx_with(&[Mode::ConstantFolding, Mode::AstOptimizations])
}

#[test]
fn constant_folding_toggle() {
    let ctx = &ctx_with(&[]);
    let sum = ctx.add(ctx.constant(3, 32), ctx.constant(4, 32)).unwrap();
    assert!(sum.if_constant().is_none());
    assert_eq!(ctx.evaluate(sum), 7);

    ctx.modes().enable(Mode::ConstantFolding);
    let sum = ctx.add(ctx.constant(3, 32), ctx.constant(4, 32)).unwrap();
    assert_eq!(sum, ctx.constant(7, 32));
}

#[test]
fn folding_all_kinds() {
    let ctx = &ctx_with(&[Mode::ConstantFolding]);
    let a = ctx.constant(0xf0, 8);
    let b = ctx.constant(0x0f, 8);
    assert_eq!(ctx.concat(a, b).unwrap(), ctx.constant(0xf00f, 16));
    assert_eq!(ctx.extract(7, 4, a).unwrap(), ctx.constant(0xf, 4));
    assert_eq!(ctx.sign_extend(a, 16).unwrap(), ctx.constant(0xfff0, 16));
    assert_eq!(ctx.zero_extend(a, 16).unwrap(), ctx.constant(0xf0, 16));
    assert_eq!(ctx.not(a).unwrap(), b);
    assert_eq!(ctx.neg(ctx.constant(1, 8)).unwrap(), ctx.constant(0xff, 8));
    assert_eq!(ctx.slt(a, b).unwrap(), ctx.bool_const(true));
    assert_eq!(ctx.ult(a, b).unwrap(), ctx.bool_const(false));
    let ite = ctx.ite(ctx.bool_const(false), a, b).unwrap();
    assert_eq!(ite, b);
}

#[test]
fn folding_leaves_symbolic() {
    let ctx = &ctx_with(&[Mode::ConstantFolding]);
    let x = ctx.new_variable(32, None, 0).unwrap();
    let sum = ctx.add(x, ctx.constant(0, 32)).unwrap();
    // Identities are not folding
    assert_ne!(sum, x);
}

#[test]
fn identities() {
    let ctx = &ctx_with(&[Mode::AstOptimizations]);
    let x = ctx.new_variable(32, None, 0).unwrap();
    let zero = ctx.zero(32);
    let ones = ctx.ones(32);
    assert_eq!(ctx.add(x, zero).unwrap(), x);
    assert_eq!(ctx.add(zero, x).unwrap(), x);
    assert_eq!(ctx.sub(x, zero).unwrap(), x);
    assert_eq!(ctx.xor(x, x).unwrap(), zero);
    assert_eq!(ctx.sub(x, x).unwrap(), zero);
    assert_eq!(ctx.and(x, zero).unwrap(), zero);
    assert_eq!(ctx.and(x, ones).unwrap(), x);
    assert_eq!(ctx.or(x, x).unwrap(), x);
    assert_eq!(ctx.or(ones, x).unwrap(), ones);
    assert_eq!(ctx.mul(x, ctx.constant(1, 32)).unwrap(), x);
    assert_eq!(ctx.shl(x, ctx.constant(32, 32)).unwrap(), zero);
    assert_eq!(ctx.rol(x, ctx.constant(64, 32)).unwrap(), x);
    assert_eq!(ctx.not(ctx.not(x).unwrap()).unwrap(), x);
    assert_eq!(ctx.eq(x, x).unwrap(), ctx.bool_const(true));
    assert_eq!(ctx.ult(x, x).unwrap(), ctx.bool_const(false));
}

#[test]
fn commutative_canonical() {
    let ctx = &optimizing();
    let x = ctx.new_variable(32, None, 0).unwrap();
    let c = ctx.constant(5, 32);
    assert_eq!(ctx.add(c, x).unwrap(), ctx.add(x, c).unwrap());
    assert_eq!(ctx.and(c, x).unwrap(), ctx.and(x, c).unwrap());
    // Not commutative
    assert_ne!(ctx.sub(c, x).unwrap(), ctx.sub(x, c).unwrap());
}

#[test]
fn reassociate_constants() {
    let ctx = &optimizing();
    let x = ctx.new_variable(32, None, 0).unwrap();
    let op1 = ctx.add(ctx.add(x, ctx.constant(1, 32)).unwrap(), ctx.constant(2, 32)).unwrap();
    assert_eq!(op1, ctx.add(x, ctx.constant(3, 32)).unwrap());
    let op1 = ctx.add(
        ctx.add(x, ctx.constant(0xffff_ffff, 32)).unwrap(),
        ctx.constant(1, 32),
    ).unwrap();
    assert_eq!(op1, x);
    let op1 = ctx.and(ctx.and(x, ctx.constant(0xff00, 32)).unwrap(), ctx.constant(0xf0f0, 32))
        .unwrap();
    assert_eq!(op1, ctx.and(x, ctx.constant(0xf000, 32)).unwrap());
}

#[test]
fn extract_concat() {
    let ctx = &optimizing();
    let x = ctx.new_variable(32, None, 0).unwrap();
    let bytes = (0..4).rev()
        .map(|i| ctx.extract(i * 8 + 7, i * 8, x).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(ctx.concat_many(bytes).unwrap(), x);

    let y = ctx.new_variable(16, None, 0).unwrap();
    let joined = ctx.concat(x, y).unwrap();
    assert_eq!(ctx.extract(15, 0, joined).unwrap(), y);
    assert_eq!(ctx.extract(47, 16, joined).unwrap(), x);
    assert_eq!(ctx.extract(23, 16, joined).unwrap(), ctx.extract(7, 0, x).unwrap());

    let nested = ctx.extract(15, 8, ctx.extract(23, 0, x).unwrap()).unwrap();
    assert_eq!(nested, ctx.extract(15, 8, x).unwrap());
    assert_eq!(ctx.extract(31, 0, x).unwrap(), x);
}

#[test]
fn extend_rules() {
    let ctx = &optimizing();
    let x = ctx.new_variable(8, None, 0).unwrap();
    let zext = ctx.zero_extend(x, 32).unwrap();
    assert_eq!(ctx.extract(7, 0, zext).unwrap(), x);
    assert_eq!(ctx.extract(31, 8, zext).unwrap(), ctx.zero(24));
    assert_eq!(ctx.zero_extend(zext, 64).unwrap(), ctx.zero_extend(x, 64).unwrap());
    assert_eq!(ctx.zero_extend(x, 8).unwrap(), x);
    assert_eq!(ctx.concat(ctx.zero(24), x).unwrap(), zext);
    let sext = ctx.sign_extend(x, 32).unwrap();
    assert_eq!(ctx.extract(7, 0, sext).unwrap(), x);
}

#[test]
fn ite_rules() {
    let ctx = &optimizing();
    let x = ctx.new_variable(32, None, 0).unwrap();
    let y = ctx.new_variable(32, None, 0).unwrap();
    let cond = ctx.eq(x, y).unwrap();
    assert_eq!(ctx.ite(cond, x, x).unwrap(), x);
    let bit = ctx.ite(cond, ctx.bool_const(true), ctx.bool_const(false)).unwrap();
    assert_eq!(bit, cond);
    assert_eq!(ctx.eq(cond, ctx.bool_const(true)).unwrap(), cond);
    assert_eq!(ctx.eq(cond, ctx.bool_const(false)).unwrap(), ctx.not(cond).unwrap());
}

#[test]
fn select_store_rules() {
    let ctx = &optimizing();
    let mem = ctx.memory_array(32);
    let x = ctx.new_variable(8, None, 0).unwrap();
    let addr = ctx.constant(0x100, 32);
    let other = ctx.constant(0x200, 32);
    let stored = ctx.store(mem, addr, x).unwrap();
    assert_eq!(ctx.select(stored, addr).unwrap(), x);
    assert_eq!(ctx.select(stored, other).unwrap(), ctx.select(mem, other).unwrap());
    let sym = ctx.new_variable(32, None, 0).unwrap();
    let unknown = ctx.select(stored, sym).unwrap();
    assert!(matches!(*unknown.ty(), NodeType::Select(array, _) if array == stored));
}

#[test]
fn rebuild_after_enabling() {
    let ctx = &ctx_with(&[]);
    let x = ctx.new_variable(32, None, 0).unwrap();
    let node = ctx.add(
        ctx.add(x, ctx.zero(32)).unwrap(),
        ctx.mul(ctx.constant(2, 32), ctx.constant(3, 32)).unwrap(),
    ).unwrap();
    ctx.modes().enable(Mode::ConstantFolding);
    ctx.modes().enable(Mode::AstOptimizations);
    let simplified = ctx.simplify(node).unwrap();
    assert_eq!(simplified, ctx.add(x, ctx.constant(6, 32)).unwrap());
    assert_eq!(ctx.evaluate(simplified), ctx.evaluate(node));
}

#[test]
fn sharing_identical() {
    let ctx = &optimizing();
    let x = ctx.new_variable(64, None, 0).unwrap();
    let a = ctx.xor(ctx.shl(x, ctx.constant(3, 64)).unwrap(), x).unwrap();
    let b = ctx.xor(ctx.shl(x, ctx.constant(3, 64)).unwrap(), x).unwrap();
    assert_eq!(a, b);
}
