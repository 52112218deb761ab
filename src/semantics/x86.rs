//! x86 and x86-64 instruction semantics.
//!
//! Flags are always written in the order AF, CF, OF, PF, SF, ZF, after the
//! destination operand.

use crate::arch::x86 as regs;
use crate::arch::{Fault, MemoryAccess, Operand, RegisterId};
use crate::ast::{AstCtx, Node};
use crate::bit_misc::{mask, to_signed};
use crate::modes::Mode;
use crate::Error;

use super::{Builder, Step};

pub mod opcode {
    opcodes! {
        ADC, ADD, AND, BSWAP, CALL, CBW, CDQ, CDQE, CLC, CLD, CLI, CMC,
        CMOVA, CMOVAE, CMOVB, CMOVBE, CMOVE, CMOVG, CMOVGE, CMOVL,
        CMOVLE, CMOVNE, CMOVNO, CMOVNP, CMOVNS, CMOVO, CMOVP, CMOVS,
        CMP, CPUID, CQO, CWD, CWDE, DEC, DIV, HLT, IDIV, IMUL, INC, INT3,
        JA, JAE, JB, JBE, JE, JG, JGE, JL, JLE, JMP, JNE, JNO, JNP, JNS, JO, JP, JS,
        LEA, MOV, MOVSX, MOVSXD, MOVZX, MUL, NEG, NOP, NOT, OR, POP, PUSH,
        RDTSC, RET, ROL, ROR, SAR, SBB,
        SETA, SETAE, SETB, SETBE, SETE, SETG, SETGE, SETL, SETLE, SETNE,
        SETNO, SETNP, SETNS, SETO, SETP, SETS,
        SHL, SHR, STC, STD, STI, SUB, SYSCALL, TEST, XCHG, XOR,
    }
}

type BuildResult = Result<Fault, Error>;

fn msb<'e>(ctx: AstCtx<'e>, node: Node<'e>) -> Result<Node<'e>, Error> {
    let bit = node.bits() - 1;
    ctx.extract(bit, bit, node)
}

/// 1 if the low byte of `result` has an even number of set bits.
fn parity<'e>(ctx: AstCtx<'e>, result: Node<'e>) -> Result<Node<'e>, Error> {
    let mut node = ctx.bool_const(true);
    for i in 0..8 {
        node = ctx.xor(node, ctx.extract(i, i, result)?)?;
    }
    Ok(node)
}

fn adjust<'e>(ctx: AstCtx<'e>, value: Node<'e>) -> Result<Node<'e>, Error> {
    let bit = ctx.constant(0x10, value.bits());
    ctx.eq(ctx.and(value, bit)?, bit)
}

fn af<'e>(s: &mut Step<'_, 'e>, result: Node<'e>, op1: Node<'e>, op2: Node<'e>, tainted: bool)
    -> Result<(), Error>
{
    let ctx = s.ctx;
    let node = adjust(ctx, ctx.xor(ctx.xor(op1, op2)?, result)?)?;
    s.write_register(regs::AF, node, "Adjust flag", tainted)
}

fn cf_add<'e>(s: &mut Step<'_, 'e>, result: Node<'e>, op1: Node<'e>, op2: Node<'e>, tainted: bool)
    -> Result<(), Error>
{
    let ctx = s.ctx;
    let a_xor_b = ctx.xor(op1, op2)?;
    let node = ctx.xor(
        ctx.and(op1, op2)?,
        ctx.and(ctx.xor(a_xor_b, result)?, a_xor_b)?,
    )?;
    let node = msb(ctx, node)?;
    s.write_register(regs::CF, node, "Carry flag", tainted)
}

fn cf_sub<'e>(s: &mut Step<'_, 'e>, result: Node<'e>, op1: Node<'e>, op2: Node<'e>, tainted: bool)
    -> Result<(), Error>
{
    let ctx = s.ctx;
    let a_xor_b = ctx.xor(op1, op2)?;
    let node = ctx.xor(
        ctx.xor(a_xor_b, result)?,
        ctx.and(ctx.xor(op1, result)?, a_xor_b)?,
    )?;
    let node = msb(ctx, node)?;
    s.write_register(regs::CF, node, "Carry flag", tainted)
}

fn of_add<'e>(s: &mut Step<'_, 'e>, result: Node<'e>, op1: Node<'e>, op2: Node<'e>, tainted: bool)
    -> Result<(), Error>
{
    let ctx = s.ctx;
    let node = ctx.and(ctx.xor(op1, ctx.not(op2)?)?, ctx.xor(op1, result)?)?;
    let node = msb(ctx, node)?;
    s.write_register(regs::OF, node, "Overflow flag", tainted)
}

fn of_sub<'e>(s: &mut Step<'_, 'e>, result: Node<'e>, op1: Node<'e>, op2: Node<'e>, tainted: bool)
    -> Result<(), Error>
{
    let ctx = s.ctx;
    let node = ctx.and(ctx.xor(op1, op2)?, ctx.xor(op1, result)?)?;
    let node = msb(ctx, node)?;
    s.write_register(regs::OF, node, "Overflow flag", tainted)
}

/// PF, SF and ZF, which depend only on the result.
fn result_flags<'e>(s: &mut Step<'_, 'e>, result: Node<'e>, tainted: bool) -> Result<(), Error> {
    let ctx = s.ctx;
    s.write_register(regs::PF, parity(ctx, result)?, "Parity flag", tainted)?;
    s.write_register(regs::SF, msb(ctx, result)?, "Sign flag", tainted)?;
    let zero = ctx.eq(result, ctx.zero(result.bits()))?;
    s.write_register(regs::ZF, zero, "Zero flag", tainted)
}

fn add_flags<'e>(s: &mut Step<'_, 'e>, result: Node<'e>, op1: Node<'e>, op2: Node<'e>, tainted: bool)
    -> Result<(), Error>
{
    af(s, result, op1, op2, tainted)?;
    cf_add(s, result, op1, op2, tainted)?;
    of_add(s, result, op1, op2, tainted)?;
    result_flags(s, result, tainted)
}

fn sub_flags<'e>(s: &mut Step<'_, 'e>, result: Node<'e>, op1: Node<'e>, op2: Node<'e>, tainted: bool)
    -> Result<(), Error>
{
    af(s, result, op1, op2, tainted)?;
    cf_sub(s, result, op1, op2, tainted)?;
    of_sub(s, result, op1, op2, tainted)?;
    result_flags(s, result, tainted)
}

/// AND/OR/XOR/TEST: CF and OF cleared, AF undefined.
fn logic_flags<'e>(s: &mut Step<'_, 'e>, result: Node<'e>, tainted: bool) -> Result<(), Error> {
    let ctx = s.ctx;
    s.undefined(regs::AF)?;
    s.write_register(regs::CF, ctx.bool_const(false), "Clears carry flag", false)?;
    s.write_register(regs::OF, ctx.bool_const(false), "Clears overflow flag", false)?;
    result_flags(s, result, tainted)
}

fn undefined_flags(s: &mut Step, flags: &[RegisterId]) -> Result<(), Error> {
    for &flag in flags {
        s.undefined(flag)?;
    }
    Ok(())
}

const ALL_FLAGS: &[RegisterId] = &[regs::AF, regs::CF, regs::OF, regs::PF, regs::SF, regs::ZF];

/// Destination and source of a two-operand instruction, with the source read in
/// the destination's width.
fn binary_operands<'e>(s: &mut Step<'_, 'e>)
    -> Result<(Operand, Operand, Node<'e>, Node<'e>), Error>
{
    let dst = s.operand(0)?;
    let src = s.operand(1)?;
    let op1 = s.read(&dst)?;
    let op2 = s.read_sized(&src, dst.bits())?;
    Ok((dst, src, op1, op2))
}

fn add(s: &mut Step) -> BuildResult {
    let ctx = s.ctx;
    let (dst, src, op1, op2) = binary_operands(s)?;
    let result = ctx.add(op1, op2)?;
    let expr = s.write(&dst, result, "ADD operation")?;
    let tainted = s.taint.taint_union(&dst, &dst, &src);
    s.stamp(expr, tainted)?;
    add_flags(s, result, op1, op2, tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn adc(s: &mut Step) -> BuildResult {
    let ctx = s.ctx;
    let (dst, src, op1, op2) = binary_operands(s)?;
    let carry = ctx.zero_extend(s.read_register_id(regs::CF)?, dst.bits())?;
    let result = ctx.add(ctx.add(op1, op2)?, carry)?;
    let tainted = s.is_tainted(&dst) || s.is_tainted(&src) ||
        s.is_register_tainted(regs::CF)?;
    let expr = s.write(&dst, result, "ADC operation")?;
    let tainted = s.taint.set_taint(&dst, tainted);
    s.stamp(expr, tainted)?;
    add_flags(s, result, op1, op2, tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn sub(s: &mut Step) -> BuildResult {
    let ctx = s.ctx;
    let (dst, src, op1, op2) = binary_operands(s)?;
    let result = ctx.sub(op1, op2)?;
    let expr = s.write(&dst, result, "SUB operation")?;
    let tainted = s.taint.taint_union(&dst, &dst, &src);
    s.stamp(expr, tainted)?;
    sub_flags(s, result, op1, op2, tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn sbb(s: &mut Step) -> BuildResult {
    let ctx = s.ctx;
    let (dst, src, op1, op2) = binary_operands(s)?;
    let borrow = ctx.zero_extend(s.read_register_id(regs::CF)?, dst.bits())?;
    let result = ctx.sub(op1, ctx.add(op2, borrow)?)?;
    let tainted = s.is_tainted(&dst) || s.is_tainted(&src) ||
        s.is_register_tainted(regs::CF)?;
    let expr = s.write(&dst, result, "SBB operation")?;
    let tainted = s.taint.set_taint(&dst, tainted);
    s.stamp(expr, tainted)?;
    sub_flags(s, result, op1, op2, tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn cmp(s: &mut Step) -> BuildResult {
    let ctx = s.ctx;
    let (dst, src, op1, op2) = binary_operands(s)?;
    let result = ctx.sub(op1, op2)?;
    let tainted = s.is_tainted(&dst) || s.is_tainted(&src);
    let expr = s.volatile(result, "CMP operation")?;
    s.stamp(Some(expr), tainted)?;
    sub_flags(s, result, op1, op2, tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

#[derive(Copy, Clone)]
enum Logic {
    And,
    Or,
    Xor,
}

fn logic(s: &mut Step, kind: Logic) -> BuildResult {
    let ctx = s.ctx;
    let (dst, src, op1, op2) = binary_operands(s)?;
    let (result, comment) = match kind {
        Logic::And => (ctx.and(op1, op2)?, "AND operation"),
        Logic::Or => (ctx.or(op1, op2)?, "OR operation"),
        Logic::Xor => (ctx.xor(op1, op2)?, "XOR operation"),
    };
    let expr = s.write(&dst, result, comment)?;
    let same_register = match (dst, src) {
        (Operand::Register(a), Operand::Register(b)) => a.id() == b.id(),
        _ => false,
    };
    // `xor r, r` clears the register regardless of its contents
    let tainted = match kind {
        Logic::Xor if same_register => s.taint.set_taint(&dst, false),
        _ => s.taint.taint_union(&dst, &dst, &src),
    };
    s.stamp(expr, tainted)?;
    logic_flags(s, result, tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn and(s: &mut Step) -> BuildResult {
    logic(s, Logic::And)
}

fn or(s: &mut Step) -> BuildResult {
    logic(s, Logic::Or)
}

fn xor(s: &mut Step) -> BuildResult {
    logic(s, Logic::Xor)
}

fn test(s: &mut Step) -> BuildResult {
    let ctx = s.ctx;
    let (dst, src, op1, op2) = binary_operands(s)?;
    let result = ctx.and(op1, op2)?;
    let tainted = s.is_tainted(&dst) || s.is_tainted(&src);
    let expr = s.volatile(result, "TEST operation")?;
    s.stamp(Some(expr), tainted)?;
    logic_flags(s, result, tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

/// INC and DEC leave CF untouched.
fn inc_dec(s: &mut Step, increment: bool) -> BuildResult {
    let ctx = s.ctx;
    let dst = s.operand(0)?;
    let op1 = s.read(&dst)?;
    let op2 = ctx.constant(1, dst.bits());
    let result = match increment {
        true => ctx.add(op1, op2)?,
        false => ctx.sub(op1, op2)?,
    };
    let comment = if increment { "INC operation" } else { "DEC operation" };
    let expr = s.write(&dst, result, comment)?;
    let tainted = s.is_tainted(&dst);
    s.stamp(expr, tainted)?;
    af(s, result, op1, op2, tainted)?;
    match increment {
        true => of_add(s, result, op1, op2, tainted)?,
        false => of_sub(s, result, op1, op2, tainted)?,
    }
    result_flags(s, result, tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn inc(s: &mut Step) -> BuildResult {
    inc_dec(s, true)
}

fn dec(s: &mut Step) -> BuildResult {
    inc_dec(s, false)
}

fn neg(s: &mut Step) -> BuildResult {
    let ctx = s.ctx;
    let dst = s.operand(0)?;
    let op1 = s.read(&dst)?;
    let result = ctx.neg(op1)?;
    let expr = s.write(&dst, result, "NEG operation")?;
    let tainted = s.is_tainted(&dst);
    s.stamp(expr, tainted)?;
    let adjust = adjust(ctx, ctx.xor(op1, result)?)?;
    s.write_register(regs::AF, adjust, "Adjust flag", tainted)?;
    let carry = ctx.ne(op1, ctx.zero(op1.bits()))?;
    s.write_register(regs::CF, carry, "Carry flag", tainted)?;
    let overflow = msb(ctx, ctx.and(result, op1)?)?;
    s.write_register(regs::OF, overflow, "Overflow flag", tainted)?;
    result_flags(s, result, tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn not(s: &mut Step) -> BuildResult {
    let ctx = s.ctx;
    let dst = s.operand(0)?;
    let result = ctx.not(s.read(&dst)?)?;
    let expr = s.write(&dst, result, "NOT operation")?;
    let tainted = s.is_tainted(&dst);
    s.stamp(expr, tainted)?;
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

fn extend_move(s: &mut Step, signed: bool) -> BuildResult {
    let ctx = s.ctx;
    let dst = s.operand(0)?;
    let src = s.operand(1)?;
    let value = s.read(&src)?;
    let (node, comment) = match signed {
        true => (ctx.sign_extend(value, dst.bits())?, "MOVSX operation"),
        false => (ctx.zero_extend(value, dst.bits())?, "MOVZX operation"),
    };
    let expr = s.write(&dst, node, comment)?;
    let tainted = s.taint.taint_assignment(&dst, &src);
    s.stamp(expr, tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn movzx(s: &mut Step) -> BuildResult {
    extend_move(s, false)
}

fn movsx(s: &mut Step) -> BuildResult {
    extend_move(s, true)
}

fn lea(s: &mut Step) -> BuildResult {
    let ctx = s.ctx;
    let dst = s.operand(0)?;
    let access = match s.operand(1)? {
        Operand::Memory(access) => access,
        _ => return Err(Error::InvalidOperand(s.inst.opcode(), "LEA source must be memory")),
    };
    let address = ctx.resize(s.effective_address(&access)?, dst.bits())?;
    let expr = s.write(&dst, address, "LEA operation")?;
    let base = access.base().map(|r| s.taint.is_register_tainted(&r)).unwrap_or(false);
    let index = access.index().map(|r| s.taint.is_register_tainted(&r)).unwrap_or(false);
    let tainted = s.taint.set_taint(&dst, base || index);
    s.stamp(expr, tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn xchg(s: &mut Step) -> BuildResult {
    let dst = s.operand(0)?;
    let src = s.operand(1)?;
    let op1 = s.read(&dst)?;
    let op2 = s.read_sized(&src, dst.bits())?;
    let dst_tainted = s.is_tainted(&dst);
    let src_tainted = s.is_tainted(&src);
    let expr1 = s.write(&dst, op2, "XCHG operation")?;
    let expr2 = s.write(&src, op1, "XCHG operation")?;
    let tainted1 = s.taint.set_taint(&dst, src_tainted);
    let tainted2 = s.taint.set_taint(&src, dst_tainted);
    s.stamp(expr1, tainted1)?;
    s.stamp(expr2, tainted2)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn bswap(s: &mut Step) -> BuildResult {
    let ctx = s.ctx;
    let dst = s.operand(0)?;
    let value = s.read(&dst)?;
    let bytes = dst.bits() / 8;
    let swapped = ctx.concat_many(
        (0..bytes)
            .map(|i| ctx.extract(i * 8 + 7, i * 8, value))
            .collect::<Result<Vec<_>, _>>()?
    )?;
    let expr = s.write(&dst, swapped, "BSWAP operation")?;
    let tainted = s.is_tainted(&dst);
    s.stamp(expr, tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

/// Moves the stack pointer by `delta` bytes, which may be negative.
fn adjust_stack<'e>(s: &mut Step<'_, 'e>, delta: i64) -> Result<Node<'e>, Error> {
    let ctx = s.ctx;
    let sp = s.arch.stack_pointer();
    let old = s.read_register(&sp)?;
    let new = ctx.add(old, ctx.constant(delta as u128 & mask(sp.bits()), sp.bits()))?;
    let tainted = s.taint.is_register_tainted(&sp);
    s.write_register(sp.id(), new, "Stack alignment", tainted)?;
    Ok(new)
}

/// Memory operand at the concrete address of `sp_value`.
fn stack_slot<'e>(s: &Step<'_, 'e>, sp_value: Node<'e>, bits: u32) -> Operand {
    let sp = s.arch.stack_pointer();
    let address = s.evaluate(sp_value) as u64;
    Operand::Memory(MemoryAccess::at(address, bits).with_base(sp))
}

fn push(s: &mut Step) -> BuildResult {
    let src = s.operand(0)?;
    let bits = match src {
        Operand::Immediate(..) => s.arch.gpr_bits(),
        _ => src.bits(),
    };
    let value = s.read_sized(&src, bits)?;
    let sp = adjust_stack(s, -i64::from(bits / 8))?;
    let dst = stack_slot(s, sp, bits);
    let expr = s.write(&dst, value, "PUSH operation")?;
    let tainted = s.taint.taint_assignment(&dst, &src);
    s.stamp(expr, tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn pop(s: &mut Step) -> BuildResult {
    let dst = s.operand(0)?;
    let bits = dst.bits();
    let stack_pointer = s.arch.stack_pointer();
    let sp = s.read_register(&stack_pointer)?;
    let src = stack_slot(s, sp, bits);
    let value = s.read(&src)?;
    let expr = s.write(&dst, value, "POP operation")?;
    let tainted = s.taint.taint_assignment(&dst, &src);
    s.stamp(expr, tainted)?;
    let pops_sp = dst.if_register().map(|r| r.parent() == stack_pointer.parent()).unwrap_or(false);
    if !pops_sp {
        adjust_stack(s, i64::from(bits / 8))?;
    }
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn call(s: &mut Step) -> BuildResult {
    let ctx = s.ctx;
    let bits = s.arch.gpr_bits();
    let target_op = s.operand(0)?;
    let target = s.read_sized(&target_op, bits)?;
    let target_tainted = s.is_tainted(&target_op);
    let sp = adjust_stack(s, -i64::from(bits / 8))?;
    let slot = stack_slot(s, sp, bits);
    let ret = ctx.constant(u128::from(s.next_address()), bits);
    let expr = s.write(&slot, ret, "Saved Program Counter")?;
    let tainted = s.taint.set_taint(&slot, false);
    s.stamp(expr, tainted)?;
    s.branch(target, target_tainted, false)?;
    Ok(Fault::NoFault)
}

fn ret(s: &mut Step) -> BuildResult {
    let bits = s.arch.gpr_bits();
    let stack_pointer = s.arch.stack_pointer();
    let sp = s.read_register(&stack_pointer)?;
    let slot = stack_slot(s, sp, bits);
    let target = s.read(&slot)?;
    let tainted = s.is_tainted(&slot);
    let extra = match s.operand(0) {
        Ok(Operand::Immediate(imm)) => imm.value() as i64,
        _ => 0,
    };
    adjust_stack(s, i64::from(bits / 8) + extra)?;
    s.branch(target, tainted, false)?;
    Ok(Fault::NoFault)
}

fn jmp(s: &mut Step) -> BuildResult {
    let target_op = s.operand(0)?;
    let target = s.read_sized(&target_op, s.arch.gpr_bits())?;
    let tainted = s.is_tainted(&target_op);
    s.branch(target, tainted, false)?;
    Ok(Fault::NoFault)
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Condition {
    Overflow,
    NotOverflow,
    Below,
    AboveOrEqual,
    Equal,
    NotEqual,
    BelowOrEqual,
    Above,
    Sign,
    NotSign,
    Parity,
    NotParity,
    Less,
    GreaterOrEqual,
    LessOrEqual,
    Greater,
}

impl Condition {
    fn flags(self) -> &'static [RegisterId] {
        use self::Condition::*;
        match self {
            Overflow | NotOverflow => &[regs::OF],
            Below | AboveOrEqual => &[regs::CF],
            Equal | NotEqual => &[regs::ZF],
            BelowOrEqual | Above => &[regs::CF, regs::ZF],
            Sign | NotSign => &[regs::SF],
            Parity | NotParity => &[regs::PF],
            Less | GreaterOrEqual => &[regs::SF, regs::OF],
            LessOrEqual | Greater => &[regs::ZF, regs::SF, regs::OF],
        }
    }
}

/// 1-bit formula of the condition and whether any flag it reads is tainted.
fn condition<'e>(s: &mut Step<'_, 'e>, cc: Condition) -> Result<(Node<'e>, bool), Error> {
    use self::Condition::*;
    let ctx = s.ctx;
    let flag = |id| s.read_register_id(id);
    let node = match cc {
        Overflow => flag(regs::OF)?,
        NotOverflow => ctx.not(flag(regs::OF)?)?,
        Below => flag(regs::CF)?,
        AboveOrEqual => ctx.not(flag(regs::CF)?)?,
        Equal => flag(regs::ZF)?,
        NotEqual => ctx.not(flag(regs::ZF)?)?,
        BelowOrEqual => ctx.or(flag(regs::CF)?, flag(regs::ZF)?)?,
        Above => ctx.not(ctx.or(flag(regs::CF)?, flag(regs::ZF)?)?)?,
        Sign => flag(regs::SF)?,
        NotSign => ctx.not(flag(regs::SF)?)?,
        Parity => flag(regs::PF)?,
        NotParity => ctx.not(flag(regs::PF)?)?,
        Less => ctx.xor(flag(regs::SF)?, flag(regs::OF)?)?,
        GreaterOrEqual => ctx.not(ctx.xor(flag(regs::SF)?, flag(regs::OF)?)?)?,
        LessOrEqual => {
            let less = ctx.xor(flag(regs::SF)?, flag(regs::OF)?)?;
            ctx.or(flag(regs::ZF)?, less)?
        }
        Greater => {
            let less = ctx.xor(flag(regs::SF)?, flag(regs::OF)?)?;
            ctx.not(ctx.or(flag(regs::ZF)?, less)?)?
        }
    };
    let mut tainted = false;
    for &id in cc.flags() {
        tainted |= s.is_register_tainted(id)?;
    }
    Ok((node, tainted))
}

fn jcc(s: &mut Step, cc: Condition) -> BuildResult {
    let ctx = s.ctx;
    let bits = s.arch.gpr_bits();
    let (cond, cond_tainted) = condition(s, cc)?;
    let target_op = s.operand(0)?;
    let target = s.read_sized(&target_op, bits)?;
    let next = ctx.constant(u128::from(s.next_address()), bits);
    let pc = ctx.ite(cond, target, next)?;
    let tainted = cond_tainted || s.is_tainted(&target_op);
    s.branch(pc, tainted, true)?;
    Ok(Fault::NoFault)
}

fn setcc(s: &mut Step, cc: Condition) -> BuildResult {
    let ctx = s.ctx;
    let (cond, cond_tainted) = condition(s, cc)?;
    let dst = s.operand(0)?;
    let node = ctx.zero_extend(cond, dst.bits())?;
    let expr = s.write(&dst, node, "SETcc operation")?;
    let tainted = s.taint.set_taint(&dst, cond_tainted);
    s.stamp(expr, tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn cmovcc(s: &mut Step, cc: Condition) -> BuildResult {
    let ctx = s.ctx;
    let (cond, cond_tainted) = condition(s, cc)?;
    let (dst, src, op1, op2) = binary_operands(s)?;
    let node = ctx.ite(cond, op2, op1)?;
    let taken = s.evaluate(cond) != 0;
    let tainted = cond_tainted || s.is_tainted(&dst) || (taken && s.is_tainted(&src));
    let expr = s.write(&dst, node, "CMOVcc operation")?;
    let tainted = s.taint.set_taint(&dst, tainted);
    s.stamp(expr, tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

macro_rules! condition_builders {
    ($($cc:ident => $j:ident $jf:ident, $set:ident $setf:ident, $cmov:ident $cmovf:ident;)*) => {
        $(
            fn $jf(s: &mut Step) -> BuildResult {
                jcc(s, Condition::$cc)
            }

            fn $setf(s: &mut Step) -> BuildResult {
                setcc(s, Condition::$cc)
            }

            fn $cmovf(s: &mut Step) -> BuildResult {
                cmovcc(s, Condition::$cc)
            }
        )*

        fn add_condition_builders(table: &mut [Option<Builder>]) {
            $(
                table[opcode::$j as usize] = Some($jf as Builder);
                table[opcode::$set as usize] = Some($setf as Builder);
                table[opcode::$cmov as usize] = Some($cmovf as Builder);
            )*
        }
    }
}

condition_builders! {
    Overflow => JO jo, SETO seto, CMOVO cmovo;
    NotOverflow => JNO jno, SETNO setno, CMOVNO cmovno;
    Below => JB jb, SETB setb, CMOVB cmovb;
    AboveOrEqual => JAE jae, SETAE setae, CMOVAE cmovae;
    Equal => JE je, SETE sete, CMOVE cmove;
    NotEqual => JNE jne, SETNE setne, CMOVNE cmovne;
    BelowOrEqual => JBE jbe, SETBE setbe, CMOVBE cmovbe;
    Above => JA ja, SETA seta, CMOVA cmova;
    Sign => JS js, SETS sets, CMOVS cmovs;
    NotSign => JNS jns, SETNS setns, CMOVNS cmovns;
    Parity => JP jp, SETP setp, CMOVP cmovp;
    NotParity => JNP jnp, SETNP setnp, CMOVNP cmovnp;
    Less => JL jl, SETL setl, CMOVL cmovl;
    GreaterOrEqual => JGE jge, SETGE setge, CMOVGE cmovge;
    LessOrEqual => JLE jle, SETLE setle, CMOVLE cmovle;
    Greater => JG jg, SETG setg, CMOVG cmovg;
}

/// Shift or rotate count in the operand's width, masked the way the cpu masks it.
/// A missing count operand means 1.
fn shift_count<'e>(s: &mut Step<'_, 'e>, bits: u32) -> Result<(Node<'e>, bool), Error> {
    let ctx = s.ctx;
    let count_mask = if bits == 64 { 0x3f } else { 0x1f };
    if s.operand_count() < 2 {
        return Ok((ctx.constant(1, bits), false));
    }
    let src = s.operand(1)?;
    let node = match src {
        Operand::Immediate(imm) => ctx.constant(u128::from(imm.value() & count_mask), bits),
        _ => {
            let count = ctx.resize(s.read(&src)?, bits)?;
            ctx.and(count, ctx.constant(u128::from(count_mask), bits))?
        }
    };
    Ok((node, s.is_tainted(&src)))
}

#[derive(Copy, Clone, Eq, PartialEq)]
enum Shift {
    Shl,
    Shr,
    Sar,
}

fn shift(s: &mut Step, kind: Shift) -> BuildResult {
    let ctx = s.ctx;
    let dst = s.operand(0)?;
    let bits = dst.bits();
    let op1 = s.read(&dst)?;
    let (count, count_tainted) = shift_count(s, bits)?;
    let (result, comment) = match kind {
        Shift::Shl => (ctx.shl(op1, count)?, "SHL operation"),
        Shift::Shr => (ctx.lshr(op1, count)?, "SHR operation"),
        Shift::Sar => (ctx.ashr(op1, count)?, "SAR operation"),
    };
    let old_cf = s.read_register_id(regs::CF)?;
    let old_of = s.read_register_id(regs::OF)?;
    let old_pf = s.read_register_id(regs::PF)?;
    let old_sf = s.read_register_id(regs::SF)?;
    let old_zf = s.read_register_id(regs::ZF)?;
    let expr = s.write(&dst, result, comment)?;
    let tainted = s.is_tainted(&dst) || count_tainted;
    let tainted = s.taint.set_taint(&dst, tainted);
    s.stamp(expr, tainted)?;

    let one = ctx.constant(1, bits);
    let is_zero = ctx.eq(count, ctx.zero(bits))?;
    let is_one = ctx.eq(count, one)?;
    let last_out = match kind {
        Shift::Shl => ctx.lshr(op1, ctx.sub(ctx.constant(u128::from(bits), bits), count)?)?,
        Shift::Shr => ctx.lshr(op1, ctx.sub(count, one)?)?,
        Shift::Sar => ctx.ashr(op1, ctx.sub(count, one)?)?,
    };
    let carry = ctx.ite(is_zero, old_cf, ctx.extract(0, 0, last_out)?)?;
    let overflow = match kind {
        Shift::Shl => ctx.xor(msb(ctx, op1)?, ctx.extract(bits - 2, bits - 2, op1)?)?,
        Shift::Shr => msb(ctx, op1)?,
        Shift::Sar => ctx.bool_const(false),
    };
    let overflow = ctx.ite(is_one, overflow, old_of)?;
    let pf = ctx.ite(is_zero, old_pf, parity(ctx, result)?)?;
    let sf = ctx.ite(is_zero, old_sf, msb(ctx, result)?)?;
    let zf = ctx.ite(is_zero, old_zf, ctx.eq(result, ctx.zero(bits))?)?;
    s.undefined_unless(regs::AF, is_zero)?;
    s.write_register(regs::CF, carry, "Carry flag", tainted)?;
    s.write_register(regs::OF, overflow, "Overflow flag", tainted)?;
    s.write_register(regs::PF, pf, "Parity flag", tainted)?;
    s.write_register(regs::SF, sf, "Sign flag", tainted)?;
    s.write_register(regs::ZF, zf, "Zero flag", tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn shl(s: &mut Step) -> BuildResult {
    shift(s, Shift::Shl)
}

fn shr(s: &mut Step) -> BuildResult {
    shift(s, Shift::Shr)
}

fn sar(s: &mut Step) -> BuildResult {
    shift(s, Shift::Sar)
}

/// ROL/ROR only change CF and OF.
fn rotate(s: &mut Step, left: bool) -> BuildResult {
    let ctx = s.ctx;
    let dst = s.operand(0)?;
    let bits = dst.bits();
    let op1 = s.read(&dst)?;
    let (mut count, count_tainted) = shift_count(s, bits)?;
    if !s.modes.is_enabled(Mode::SymbolizeIndexRotation) {
        count = ctx.constant(s.evaluate(count), bits);
    }
    let (result, comment) = match left {
        true => (ctx.rol(op1, count)?, "ROL operation"),
        false => (ctx.ror(op1, count)?, "ROR operation"),
    };
    let old_cf = s.read_register_id(regs::CF)?;
    let old_of = s.read_register_id(regs::OF)?;
    let expr = s.write(&dst, result, comment)?;
    let tainted = s.is_tainted(&dst) || count_tainted;
    let tainted = s.taint.set_taint(&dst, tainted);
    s.stamp(expr, tainted)?;

    let is_zero = ctx.eq(count, ctx.zero(bits))?;
    let is_one = ctx.eq(count, ctx.constant(1, bits))?;
    let (carry, overflow) = match left {
        true => {
            let carry = ctx.extract(0, 0, result)?;
            (carry, ctx.xor(msb(ctx, result)?, carry)?)
        }
        false => {
            let high = msb(ctx, result)?;
            (high, ctx.xor(high, ctx.extract(bits - 2, bits - 2, result)?)?)
        }
    };
    let carry = ctx.ite(is_zero, old_cf, carry)?;
    let overflow = ctx.ite(is_one, overflow, old_of)?;
    s.write_register(regs::CF, carry, "Carry flag", tainted)?;
    s.write_register(regs::OF, overflow, "Overflow flag", tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn rol(s: &mut Step) -> BuildResult {
    rotate(s, true)
}

fn ror(s: &mut Step) -> BuildResult {
    rotate(s, false)
}

/// Implicit accumulator and high half registers of one-operand MUL/DIV.
fn accumulator(bits: u32) -> Option<(RegisterId, RegisterId)> {
    match bits {
        8 => Some((regs::AL, regs::AH)),
        16 => Some((regs::AX, regs::DX)),
        32 => Some((regs::EAX, regs::EDX)),
        64 => Some((regs::RAX, regs::RDX)),
        _ => None,
    }
}

fn accumulator_for(s: &Step, bits: u32) -> Result<(RegisterId, RegisterId), Error> {
    accumulator(bits)
        .ok_or_else(|| Error::InvalidOperand(s.inst.opcode(), "accumulator width"))
}

/// Writes a double-width product into AX or DX:AX style register pairs.
fn write_wide<'e>(
    s: &mut Step<'_, 'e>,
    bits: u32,
    full: Node<'e>,
    comment: &str,
    tainted: bool,
) -> Result<(), Error> {
    let ctx = s.ctx;
    let (low_reg, high_reg) = accumulator_for(s, bits)?;
    if bits == 8 {
        s.write_register(regs::AX, full, comment, tainted)
    } else {
        let low = ctx.extract(bits - 1, 0, full)?;
        let high = ctx.extract(bits * 2 - 1, bits, full)?;
        s.write_register(low_reg, low, comment, tainted)?;
        s.write_register(high_reg, high, comment, tainted)
    }
}

/// CF and OF are set if the product didn't fit; the rest is undefined.
fn multiply_flags<'e>(s: &mut Step<'_, 'e>, overflow: Node<'e>, tainted: bool)
    -> Result<(), Error>
{
    s.undefined(regs::AF)?;
    s.write_register(regs::CF, overflow, "Carry flag", tainted)?;
    s.write_register(regs::OF, overflow, "Overflow flag", tainted)?;
    undefined_flags(s, &[regs::PF, regs::SF, regs::ZF])
}

fn mul(s: &mut Step) -> BuildResult {
    let ctx = s.ctx;
    let src = s.operand(0)?;
    let bits = src.bits();
    let (acc, _) = accumulator_for(s, bits)?;
    let a = s.read_register_id(acc)?;
    let b = s.read(&src)?;
    let full = ctx.mul(ctx.zero_extend(a, bits * 2)?, ctx.zero_extend(b, bits * 2)?)?;
    let tainted = s.is_register_tainted(acc)? || s.is_tainted(&src);
    write_wide(s, bits, full, "MUL operation", tainted)?;
    let high = ctx.extract(bits * 2 - 1, bits, full)?;
    let overflow = ctx.ne(high, ctx.zero(bits))?;
    multiply_flags(s, overflow, tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn imul(s: &mut Step) -> BuildResult {
    let ctx = s.ctx;
    let (bits, full, tainted) = match s.operand_count() {
        1 => {
            let src = s.operand(0)?;
            let bits = src.bits();
            let (acc, _) = accumulator_for(s, bits)?;
            let a = s.read_register_id(acc)?;
            let b = s.read(&src)?;
            let full = ctx.mul(ctx.sign_extend(a, bits * 2)?, ctx.sign_extend(b, bits * 2)?)?;
            let tainted = s.is_register_tainted(acc)? || s.is_tainted(&src);
            write_wide(s, bits, full, "IMUL operation", tainted)?;
            (bits, full, tainted)
        }
        count => {
            let dst = s.operand(0)?;
            let bits = dst.bits();
            let (a, b, tainted) = if count == 2 {
                let (dst, src, a, b) = binary_operands(s)?;
                (a, b, s.is_tainted(&dst) || s.is_tainted(&src))
            } else {
                let src = s.operand(1)?;
                let imm = s.operand(2)?;
                let a = s.read_sized(&src, bits)?;
                let b = s.read_sized(&imm, bits)?;
                (a, b, s.is_tainted(&src))
            };
            let full = ctx.mul(ctx.sign_extend(a, bits * 2)?, ctx.sign_extend(b, bits * 2)?)?;
            let low = ctx.extract(bits - 1, 0, full)?;
            let expr = s.write(&dst, low, "IMUL operation")?;
            let tainted = s.taint.set_taint(&dst, tainted);
            s.stamp(expr, tainted)?;
            (bits, full, tainted)
        }
    };
    let low = ctx.extract(bits - 1, 0, full)?;
    let overflow = ctx.ne(ctx.sign_extend(low, bits * 2)?, full)?;
    multiply_flags(s, overflow, tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

/// DIV and IDIV. Faults with #DE before writing anything when the divisor is zero
/// or the quotient doesn't fit the destination.
fn divide(s: &mut Step, signed: bool) -> BuildResult {
    let ctx = s.ctx;
    let src = s.operand(0)?;
    let bits = src.bits();
    let (acc, high_reg) = accumulator_for(s, bits)?;
    let divisor = s.read(&src)?;
    if s.evaluate(divisor) == 0 {
        debug!("{:x}: divide by zero", s.inst.address());
        return Ok(Fault::DivideError);
    }
    let dividend = match bits {
        8 => s.read_register_id(regs::AX)?,
        _ => ctx.concat(s.read_register_id(high_reg)?, s.read_register_id(acc)?)?,
    };
    let wide = bits * 2;
    let (quotient, remainder) = match signed {
        true => {
            let divisor = ctx.sign_extend(divisor, wide)?;
            (ctx.sdiv(dividend, divisor)?, ctx.srem(dividend, divisor)?)
        }
        false => {
            let divisor = ctx.zero_extend(divisor, wide)?;
            (ctx.udiv(dividend, divisor)?, ctx.urem(dividend, divisor)?)
        }
    };
    let value = s.evaluate(quotient);
    let fits = match signed {
        true => {
            let value = to_signed(value, wide);
            let limit = 1i128 << (bits - 1);
            value >= -limit && value < limit
        }
        false => value <= mask(bits),
    };
    if !fits {
        warn!("{:x}: quotient overflow", s.inst.address());
        return Ok(Fault::DivideError);
    }
    let tainted = s.is_register_tainted(acc)? || s.is_register_tainted(high_reg)? ||
        s.is_tainted(&src);
    let comment = if signed { "IDIV operation" } else { "DIV operation" };
    let quotient = ctx.extract(bits - 1, 0, quotient)?;
    let remainder = ctx.extract(bits - 1, 0, remainder)?;
    s.write_register(acc, quotient, comment, tainted)?;
    s.write_register(high_reg, remainder, comment, tainted)?;
    undefined_flags(s, ALL_FLAGS)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn div(s: &mut Step) -> BuildResult {
    divide(s, false)
}

fn idiv(s: &mut Step) -> BuildResult {
    divide(s, true)
}

/// CBW/CWDE/CDQE: sign-extends the low half of the accumulator in place.
fn extend_accumulator(s: &mut Step, src: RegisterId, dst: RegisterId) -> BuildResult {
    let ctx = s.ctx;
    let dst_reg = s.register(dst)?;
    let node = ctx.sign_extend(s.read_register_id(src)?, dst_reg.bits())?;
    let tainted = s.is_register_tainted(src)?;
    s.write_register(dst, node, "Sign extend accumulator", tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn cbw(s: &mut Step) -> BuildResult {
    extend_accumulator(s, regs::AL, regs::AX)
}

fn cwde(s: &mut Step) -> BuildResult {
    extend_accumulator(s, regs::AX, regs::EAX)
}

fn cdqe(s: &mut Step) -> BuildResult {
    extend_accumulator(s, regs::EAX, regs::RAX)
}

/// CWD/CDQ/CQO: fills the data register with the accumulator's sign.
fn sign_into_data(s: &mut Step, src: RegisterId, dst: RegisterId) -> BuildResult {
    let ctx = s.ctx;
    let value = s.read_register_id(src)?;
    let bits = value.bits();
    let high = ctx.extract(bits * 2 - 1, bits, ctx.sign_extend(value, bits * 2)?)?;
    let tainted = s.is_register_tainted(src)?;
    s.write_register(dst, high, "Sign extend accumulator", tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn cwd(s: &mut Step) -> BuildResult {
    sign_into_data(s, regs::AX, regs::DX)
}

fn cdq(s: &mut Step) -> BuildResult {
    sign_into_data(s, regs::EAX, regs::EDX)
}

fn cqo(s: &mut Step) -> BuildResult {
    sign_into_data(s, regs::RAX, regs::RDX)
}

fn set_flag(s: &mut Step, flag: RegisterId, value: bool, comment: &str) -> BuildResult {
    let node = s.ctx.bool_const(value);
    s.write_register(flag, node, comment, false)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn clear_carry(s: &mut Step) -> BuildResult {
    set_flag(s, regs::CF, false, "Clears carry flag")
}

fn set_carry(s: &mut Step) -> BuildResult {
    set_flag(s, regs::CF, true, "Sets carry flag")
}

fn clear_direction(s: &mut Step) -> BuildResult {
    set_flag(s, regs::DF, false, "Clears direction flag")
}

fn set_direction(s: &mut Step) -> BuildResult {
    set_flag(s, regs::DF, true, "Sets direction flag")
}

fn clear_interrupt(s: &mut Step) -> BuildResult {
    set_flag(s, regs::IF, false, "Clears interrupt flag")
}

fn set_interrupt(s: &mut Step) -> BuildResult {
    set_flag(s, regs::IF, true, "Sets interrupt flag")
}

fn complement_carry(s: &mut Step) -> BuildResult {
    let ctx = s.ctx;
    let node = ctx.not(s.read_register_id(regs::CF)?)?;
    let tainted = s.is_register_tainted(regs::CF)?;
    s.write_register(regs::CF, node, "Complements carry flag", tainted)?;
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn nop(s: &mut Step) -> BuildResult {
    s.control_flow()?;
    Ok(Fault::NoFault)
}

fn int3(_s: &mut Step) -> BuildResult {
    Ok(Fault::Breakpoint)
}

fn hlt(_s: &mut Step) -> BuildResult {
    Ok(Fault::GeneralProtection)
}

pub(crate) fn builders() -> Vec<Option<Builder>> {
    let mut table: Vec<Option<Builder>> = vec![None; opcode::COUNT as usize];
    macro_rules! builders {
        ($($op:ident => $func:ident,)*) => {
            $(table[opcode::$op as usize] = Some($func as Builder);)*
        }
    }
    builders! {
        ADC => adc,
        ADD => add,
        AND => and,
        BSWAP => bswap,
        CALL => call,
        CBW => cbw,
        CDQ => cdq,
        CDQE => cdqe,
        CLC => clear_carry,
        CLD => clear_direction,
        CLI => clear_interrupt,
        CMC => complement_carry,
        CMP => cmp,
        CQO => cqo,
        CWD => cwd,
        CWDE => cwde,
        DEC => dec,
        DIV => div,
        HLT => hlt,
        IDIV => idiv,
        IMUL => imul,
        INC => inc,
        INT3 => int3,
        JMP => jmp,
        LEA => lea,
        MOV => mov,
        MOVSX => movsx,
        MOVSXD => movsx,
        MOVZX => movzx,
        MUL => mul,
        NEG => neg,
        NOP => nop,
        NOT => not,
        OR => or,
        POP => pop,
        PUSH => push,
        RET => ret,
        ROL => rol,
        ROR => ror,
        SAR => sar,
        SBB => sbb,
        SHL => shl,
        SHR => shr,
        STC => set_carry,
        STD => set_direction,
        STI => set_interrupt,
        SUB => sub,
        TEST => test,
        XCHG => xchg,
        XOR => xor,
    }
    add_condition_builders(&mut table);
    table
}

#[cfg(test)]
mod test {
    use super::*;

    use std::rc::Rc;

    use crate::arch::{Architecture, ConcreteState, Instruction};
    use crate::ast::AstContext;
    use crate::modes::Modes;
    use crate::symbolic::SymbolicState;
    use crate::taint::TaintState;

    #[test]
    fn opcode_numbering() {
        assert_eq!(opcode::ADC, 1);
        assert!(opcode::XOR < opcode::COUNT);
        let table = builders();
        assert_eq!(table.len(), opcode::COUNT as usize);
        assert!(table[0].is_none());
        assert!(table[opcode::JG as usize].is_some());
        assert!(table[opcode::CMOVNP as usize].is_some());
        assert!(table[opcode::CPUID as usize].is_none());
    }

    #[test]
    fn condition_flags() {
        assert_eq!(Condition::Greater.flags(), &[regs::ZF, regs::SF, regs::OF]);
        assert_eq!(Condition::NotEqual.flags(), &[regs::ZF]);
    }

    fn eval_condition(flags: &[(RegisterId, bool)], cc: Condition) -> bool {
        let modes = Rc::new(Modes::new());
        let ctx = &AstContext::new(modes.clone());
        let arch = Architecture::X86_64;
        let mut symbolic = SymbolicState::new(ctx, arch);
        let mut taint = TaintState::new(modes.clone());
        let mut concrete = ConcreteState::new();
        for &(id, value) in flags {
            concrete.set_register_value(&arch.register(id).unwrap(), value as u128);
        }
        let mut inst = Instruction::new(0x1000, 2, opcode::JG);
        let mut step = Step::new(ctx, &modes, &mut symbolic, &mut taint, &mut concrete, &mut inst);
        let (node, tainted) = condition(&mut step, cc).unwrap();
        assert!(!tainted);
        assert_eq!(node.bits(), 1);
        step.evaluate(node) != 0
    }

    #[test]
    fn signed_conditions() {
        let sf_of = [(regs::SF, true), (regs::OF, false), (regs::ZF, false)];
        assert!(eval_condition(&sf_of, Condition::Less));
        assert!(!eval_condition(&sf_of, Condition::Greater));
        let equal = [(regs::SF, false), (regs::OF, false), (regs::ZF, true)];
        assert!(eval_condition(&equal, Condition::LessOrEqual));
        assert!(eval_condition(&equal, Condition::GreaterOrEqual));
        assert!(!eval_condition(&equal, Condition::Greater));
    }

    #[test]
    fn unsigned_conditions() {
        let below = [(regs::CF, true), (regs::ZF, false)];
        assert!(eval_condition(&below, Condition::Below));
        assert!(eval_condition(&below, Condition::BelowOrEqual));
        assert!(!eval_condition(&below, Condition::Above));
        assert!(!eval_condition(&below, Condition::AboveOrEqual));
        let above = [(regs::CF, false), (regs::ZF, false)];
        assert!(eval_condition(&above, Condition::Above));
    }

    #[test]
    fn parity_of_low_byte() {
        let ctx = &AstContext::new(Rc::new(Modes::empty()));
        let even = parity(ctx, ctx.constant(0x1_03, 16)).unwrap();
        let odd = parity(ctx, ctx.constant(0x07, 16)).unwrap();
        assert_eq!(ctx.evaluate(even), 1);
        assert_eq!(ctx.evaluate(odd), 0);
    }
}
