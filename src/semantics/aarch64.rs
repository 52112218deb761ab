//! AArch64 instruction semantics.
//!
//! Shifted and extended register operands are expected to be resolved by the
//! decoder; operands here are plain registers, immediates and memory accesses.

use crate::arch::aarch64 as regs;
use crate::arch::{Fault, Operand, RegisterId};
use crate::ast::{AstCtx, Node};
use crate::Error;

use super::{Builder, Step};

pub mod opcode {
    opcodes! {
        ADD, ADDS, AND, ANDS, B,
        B_EQ, B_NE, B_HS, B_LO, B_MI, B_PL, B_VS, B_VC,
        B_HI, B_LS, B_GE, B_LT, B_GT, B_LE,
        BL, BR, CBNZ, CBZ, CMP, EOR, LDR, MOV, MOVZ, MVN, NEG, ORR, RET, STR,
        SUB, SUBS,
    }
}

type BuildResult = Result<Fault, Error>;

fn msb<'e>(ctx: AstCtx<'e>, node: Node<'e>) -> Result<Node<'e>, Error> {
    let bit = node.bits() - 1;
    ctx.extract(bit, bit, node)
}

#[derive(Copy, Clone, Eq, PartialEq)]
enum FlagKind {
    Add,
    Sub,
    Logic,
}

/// Sets N, Z, C and V. For subtraction C is the inverse of the borrow.
fn nzcv<'e>(
    s: &mut Step<'_, 'e>,
    kind: FlagKind,
    result: Node<'e>,
    op1: Node<'e>,
    op2: Node<'e>,
    tainted: bool,
) -> Result<(), Error> {
    let ctx = s.ctx;
    let negative = msb(ctx, result)?;
    let zero = ctx.eq(result, ctx.zero(result.bits()))?;
    s.write_register(regs::N, negative, "Negative flag", tainted)?;
    s.write_register(regs::Z, zero, "Zero flag", tainted)?;
    let a_xor_b = ctx.xor(op1, op2)?;
    let (carry, overflow) = match kind {
        FlagKind::Add => {
            let carry = ctx.xor(
                ctx.and(op1, op2)?,
                ctx.and(ctx.xor(a_xor_b, result)?, a_xor_b)?,
            )?;
            let overflow = ctx.and(ctx.xor(op1, ctx.not(op2)?)?, ctx.xor(op1, result)?)?;
            (msb(ctx, carry)?, msb(ctx, overflow)?)
        }
        FlagKind::Sub => {
            let borrow = ctx.xor(
                ctx.xor(a_xor_b, result)?,
                ctx.and(ctx.xor(op1, result)?, a_xor_b)?,
            )?;
            let overflow = ctx.and(a_xor_b, ctx.xor(op1, result)?)?;
            (ctx.not(msb(ctx, borrow)?)?, msb(ctx, overflow)?)
        }
        FlagKind::Logic => {
            s.write_register(regs::C, ctx.bool_const(false), "Carry flag", false)?;
            s.write_register(regs::V, ctx.bool_const(false), "Overflow flag", false)?;
            return Ok(());
        }
    };
    s.write_register(regs::C, carry, "Carry flag", tainted)?;
    s.write_register(regs::V, overflow, "Overflow flag", tainted)
}

/// `dst, src1, src2` with both sources read in the destination width.
fn three_operands<'e>(s: &mut Step<'_, 'e>)
    -> Result<(Operand, Operand, Operand, Node<'e>, Node<'e>), Error>
{
    let dst = s.operand(0)?;
    let src1 = s.operand(1)?;
    let src2 = s.operand(2)?;
    let bits = dst.bits();
    let op1 = s.read_sized(&src1, bits)?;
    let op2 = s.read_sized(&src2, bits)?;
    Ok((dst, src1, src2, op1, op2))
}

#[derive(Copy, Clone, Eq, PartialEq)]
enum Binary {
    Add,
    Sub,
    And,
    Or,
    Xor,
}

fn binary(s: &mut Step, op: Binary, set_flags: bool) -> BuildResult {
    let ctx = s.ctx;
    let (dst, src1, src2, op1, op2) = three_operands(s)?;
    let (result, comment, kind) = match op {
        Binary::Add => (ctx.add(op1, op2)?, "ADD operation", FlagKind::Add),
        Binary::Sub => (ctx.sub(op1, op2)?, "SUB operation", FlagKind::Sub),
        Binary::And => (ctx.and(op1, op2)?, "AND operation", FlagKind::Logic),
        Binary::Or => (ctx.or(op1, op2)?, "ORR operation", FlagKind::Logic),
        Binary::Xor => (ctx.xor(op1, op2)?, "EOR operation", FlagKind::Logic),
    };
    let expr = s.write(&dst, result, comment)?;
    let tainted = s.taint.taint_union(&dst, &src1, &src2);
    s.stamp(expr, tainted)?;
    if set_flags {
        nzcv(s, kind, result, op1, op2, tainted)?;
    }
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn add(s: &mut Step) -> BuildResult {
    binary(s, Binary::Add, false)
}

fn adds(s: &mut Step) -> BuildResult {
    binary(s, Binary::Add, true)
}

fn sub(s: &mut Step) -> BuildResult {
    binary(s, Binary::Sub, false)
}

fn subs(s: &mut Step) -> BuildResult {
    binary(s, Binary::Sub, true)
}

fn and(s: &mut Step) -> BuildResult {
    binary(s, Binary::And, false)
}

fn ands(s: &mut Step) -> BuildResult {
    binary(s, Binary::And, true)
}

fn orr(s: &mut Step) -> BuildResult {
    binary(s, Binary::Or, false)
}

fn eor(s: &mut Step) -> BuildResult {
    binary(s, Binary::Xor, false)
}

fn cmp(s: &mut Step) -> BuildResult {
    let ctx = s.ctx;
    let src1 = s.operand(0)?;
    let src2 = s.operand(1)?;
    let op1 = s.read(&src1)?;
    let op2 = s.read_sized(&src2, src1.bits())?;
    let result = ctx.sub(op1, op2)?;
    let tainted = s.is_tainted(&src1) || s.is_tainted(&src2);
    let expr = s.volatile(result, "CMP operation")?;
    s.stamp(Some(expr), tainted)?;
    nzcv(s, FlagKind::Sub, result, op1, op2, tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn mov(s: &mut Step) -> BuildResult {
    let dst = s.operand(0)?;
    let src = s.operand(1)?;
    let node = s.read_sized(&src, dst.bits())?;
    let expr = s.write(&dst, node, "MOV operation")?;
    let tainted = s.taint.taint_assignment(&dst, &src);
    s.stamp(expr, tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

/// `MOVZ Rd, #imm{, #shift}`
fn movz(s: &mut Step) -> BuildResult {
    let ctx = s.ctx;
    let dst = s.operand(0)?;
    let imm = s.operand(1)?.if_immediate()
        .ok_or_else(|| Error::InvalidOperand(s.inst.opcode(), "MOVZ needs an immediate"))?;
    let shift = match s.operand(2) {
        Ok(Operand::Immediate(shift)) => shift.value() as u32,
        _ => 0,
    };
    let value = u128::from(imm.value() & 0xffff) << shift;
    let node = ctx.constant(value, dst.bits());
    let expr = s.write(&dst, node, "MOVZ operation")?;
    let tainted = s.taint.set_taint(&dst, false);
    s.stamp(expr, tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn unary(s: &mut Step, negate: bool) -> BuildResult {
    let ctx = s.ctx;
    let dst = s.operand(0)?;
    let src = s.operand(1)?;
    let value = s.read_sized(&src, dst.bits())?;
    let (node, comment) = match negate {
        true => (ctx.neg(value)?, "NEG operation"),
        false => (ctx.not(value)?, "MVN operation"),
    };
    let expr = s.write(&dst, node, comment)?;
    let tainted = s.taint.taint_assignment(&dst, &src);
    s.stamp(expr, tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn mvn(s: &mut Step) -> BuildResult {
    unary(s, false)
}

fn neg(s: &mut Step) -> BuildResult {
    unary(s, true)
}

fn load(s: &mut Step) -> BuildResult {
    let ctx = s.ctx;
    let dst = s.operand(0)?;
    let src = s.operand(1)?;
    let value = s.read(&src)?;
    let node = ctx.resize(value, dst.bits())?;
    let expr = s.write(&dst, node, "LDR operation")?;
    let tainted = s.taint.taint_assignment(&dst, &src);
    s.stamp(expr, tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn store(s: &mut Step) -> BuildResult {
    let ctx = s.ctx;
    let src = s.operand(0)?;
    let dst = s.operand(1)?;
    let value = ctx.resize(s.read(&src)?, dst.bits())?;
    let expr = s.write(&dst, value, "STR operation")?;
    let tainted = s.taint.taint_assignment(&dst, &src);
    s.stamp(expr, tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn b(s: &mut Step) -> BuildResult {
    let target_op = s.operand(0)?;
    let target = s.read_sized(&target_op, 64)?;
    s.branch(target, false, false)?;
    Ok(Fault::NoFault)
}

fn bl(s: &mut Step) -> BuildResult {
    let ctx = s.ctx;
    let target_op = s.operand(0)?;
    let target = s.read_sized(&target_op, 64)?;
    let link = ctx.constant(u128::from(s.next_address()), 64);
    s.write_register(regs::X30, link, "Link register", false)?;
    s.branch(target, false, false)?;
    Ok(Fault::NoFault)
}

fn br(s: &mut Step) -> BuildResult {
    let target_op = s.operand(0)?;
    let target = s.read_sized(&target_op, 64)?;
    let tainted = s.is_tainted(&target_op);
    s.branch(target, tainted, false)?;
    Ok(Fault::NoFault)
}

/// `RET {Xn}`, returning through X30 by default.
fn ret(s: &mut Step) -> BuildResult {
    let target_op = match s.operand(0) {
        Ok(op) => op,
        Err(_) => s.register_operand(regs::X30)?,
    };
    let target = s.read_sized(&target_op, 64)?;
    let tainted = s.is_tainted(&target_op);
    s.branch(target, tainted, false)?;
    Ok(Fault::NoFault)
}

fn compare_branch(s: &mut Step, non_zero: bool) -> BuildResult {
    let ctx = s.ctx;
    let src = s.operand(0)?;
    let value = s.read(&src)?;
    let target_op = s.operand(1)?;
    let target = s.read_sized(&target_op, 64)?;
    let next = ctx.constant(u128::from(s.next_address()), 64);
    let zero = ctx.zero(value.bits());
    let cond = match non_zero {
        true => ctx.ne(value, zero)?,
        false => ctx.eq(value, zero)?,
    };
    let pc = ctx.ite(cond, target, next)?;
    let tainted = s.is_tainted(&src);
    s.branch(pc, tainted, true)?;
    Ok(Fault::NoFault)
}

fn cbz(s: &mut Step) -> BuildResult {
    compare_branch(s, false)
}

fn cbnz(s: &mut Step) -> BuildResult {
    compare_branch(s, true)
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Condition {
    Eq,
    Ne,
    Hs,
    Lo,
    Mi,
    Pl,
    Vs,
    Vc,
    Hi,
    Ls,
    Ge,
    Lt,
    Gt,
    Le,
}

impl Condition {
    fn flags(self) -> &'static [RegisterId] {
        use self::Condition::*;
        match self {
            Eq | Ne => &[regs::Z],
            Hs | Lo => &[regs::C],
            Mi | Pl => &[regs::N],
            Vs | Vc => &[regs::V],
            Hi | Ls => &[regs::C, regs::Z],
            Ge | Lt => &[regs::N, regs::V],
            Gt | Le => &[regs::N, regs::Z, regs::V],
        }
    }
}

fn condition<'e>(s: &mut Step<'_, 'e>, cc: Condition) -> Result<(Node<'e>, bool), Error> {
    use self::Condition::*;
    let ctx = s.ctx;
    let n = s.read_register_id(regs::N)?;
    let z = s.read_register_id(regs::Z)?;
    let c = s.read_register_id(regs::C)?;
    let v = s.read_register_id(regs::V)?;
    let node = match cc {
        Eq => z,
        Ne => ctx.not(z)?,
        Hs => c,
        Lo => ctx.not(c)?,
        Mi => n,
        Pl => ctx.not(n)?,
        Vs => v,
        Vc => ctx.not(v)?,
        Hi => ctx.and(c, ctx.not(z)?)?,
        Ls => ctx.or(ctx.not(c)?, z)?,
        Ge => ctx.eq(n, v)?,
        Lt => ctx.ne(n, v)?,
        Gt => ctx.and(ctx.not(z)?, ctx.eq(n, v)?)?,
        Le => ctx.or(z, ctx.ne(n, v)?)?,
    };
    let mut tainted = false;
    for &id in cc.flags() {
        tainted |= s.is_register_tainted(id)?;
    }
    Ok((node, tainted))
}

fn b_cond(s: &mut Step, cc: Condition) -> BuildResult {
    let ctx = s.ctx;
    let (cond, tainted) = condition(s, cc)?;
    let target_op = s.operand(0)?;
    let target = s.read_sized(&target_op, 64)?;
    let next = ctx.constant(u128::from(s.next_address()), 64);
    let pc = ctx.ite(cond, target, next)?;
    s.branch(pc, tainted, true)?;
    Ok(Fault::NoFault)
}

macro_rules! condition_builders {
    ($($cc:ident => $op:ident $func:ident;)*) => {
        $(
            fn $func(s: &mut Step) -> BuildResult {
                b_cond(s, Condition::$cc)
            }
        )*

        fn add_condition_builders(table: &mut [Option<Builder>]) {
            $(table[opcode::$op as usize] = Some($func as Builder);)*
        }
    }
}

condition_builders! {
    Eq => B_EQ b_eq;
    Ne => B_NE b_ne;
    Hs => B_HS b_hs;
    Lo => B_LO b_lo;
    Mi => B_MI b_mi;
    Pl => B_PL b_pl;
    Vs => B_VS b_vs;
    Vc => B_VC b_vc;
    Hi => B_HI b_hi;
    Ls => B_LS b_ls;
    Ge => B_GE b_ge;
    Lt => B_LT b_lt;
    Gt => B_GT b_gt;
    Le => B_LE b_le;
}

pub(crate) fn builders() -> Vec<Option<Builder>> {
    let mut table: Vec<Option<Builder>> = vec![None; opcode::COUNT as usize];
    macro_rules! builders {
        ($($op:ident => $func:ident,)*) => {
            $(table[opcode::$op as usize] = Some($func as Builder);)*
        }
    }
    builders! {
        ADD => add,
        ADDS => adds,
        AND => and,
        ANDS => ands,
        B => b,
        BL => bl,
        BR => br,
        CBNZ => cbnz,
        CBZ => cbz,
        CMP => cmp,
        EOR => eor,
        LDR => load,
        MOV => mov,
        MOVZ => movz,
        MVN => mvn,
        NEG => neg,
        ORR => orr,
        RET => ret,
        STR => store,
        SUB => sub,
        SUBS => subs,
    }
    add_condition_builders(&mut table);
    table
}
