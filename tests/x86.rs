#[allow(dead_code)] mod helpers;

use symsem::arch::x86::*;
use symsem::semantics::x86::opcode as op;
use symsem::{Architecture, Engine, Fault, Instruction, MemoryAccess, Mode, Operand, Origin};

use helpers::{check_registers, context, imm, mem, reg, run, test_inline, Program};

const X64: Architecture = Architecture::X86_64;
const X86: Architecture = Architecture::X86;

fn r(id: symsem::RegisterId) -> Operand {
    reg(X64, id)
}

#[test]
fn add_overflow() {
    test_inline(X64, Program::new(0x1000)
        .add(5, op::MOV, &[r(EAX), imm(0x7fff_ffff, 32)]) // mov eax, 7fffffff
        .add(3, op::ADD, &[r(EAX), imm(1, 8)]), // add eax, 1
    &[
        (RAX, 0x8000_0000),
        (OF, 1),
        (SF, 1),
        (CF, 0),
        (ZF, 0),
        (AF, 1),
        (PF, 1),
    ]);
}

#[test]
fn add_carry() {
    test_inline(X64, Program::new(0x1000)
        .add(5, op::MOV, &[r(EAX), imm(0xffff_ffff, 32)]) // mov eax, ffffffff
        .add(3, op::ADD, &[r(EAX), imm(1, 8)]), // add eax, 1
    &[
        (RAX, 0),
        (CF, 1),
        (ZF, 1),
        (OF, 0),
        (SF, 0),
    ]);
}

#[test]
fn sub_borrow() {
    test_inline(X64, Program::new(0x1000)
        .add(5, op::MOV, &[r(EAX), imm(1, 32)]) // mov eax, 1
        .add(3, op::SUB, &[r(EAX), imm(2, 8)]), // sub eax, 2
    &[
        (RAX, 0xffff_ffff),
        (CF, 1),
        (SF, 1),
        (OF, 0),
        (ZF, 0),
        (AF, 1),
    ]);
}

#[test]
fn adc_sbb() {
    test_inline(X64, Program::new(0x1000)
        .add(1, op::STC, &[]) // stc
        .add(5, op::MOV, &[r(EAX), imm(1, 32)]) // mov eax, 1
        .add(3, op::ADC, &[r(EAX), imm(1, 8)]) // adc eax, 1
        .add(1, op::STC, &[]) // stc
        .add(5, op::MOV, &[r(EBX), imm(5, 32)]) // mov ebx, 5
        .add(3, op::SBB, &[r(EBX), imm(1, 8)]), // sbb ebx, 1
    &[
        (RAX, 3),
        (RBX, 3),
        (CF, 0),
    ]);
}

#[test]
fn cmp_is_volatile() {
    let ctx = &context(&[]);
    let mut engine = Engine::new(ctx, X64);
    let insts = run(&mut engine, Program::new(0x1000)
        .add(5, op::MOV, &[r(EAX), imm(5, 32)]) // mov eax, 5
        .add(3, op::CMP, &[r(EAX), imm(5, 8)])); // cmp eax, 5
    check_registers(&engine, &[(RAX, 5), (ZF, 1), (CF, 0)]);
    let first = insts[1].expressions()[0];
    let expr = engine.symbolic().expression(first).unwrap();
    assert_eq!(*expr.origin(), Origin::Volatile);
    assert_eq!(expr.comment(), "CMP operation");
}

#[test]
fn logic_flags() {
    test_inline(X64, Program::new(0x1000)
        .add(7, op::MOV, &[r(RAX), imm(0x1234, 32)]) // mov rax, 1234
        .add(1, op::STC, &[]) // stc
        .add(6, op::AND, &[r(EAX), imm(0xff00, 32)]) // and eax, ff00
        .add(6, op::MOV, &[r(RCX), imm(0xf0, 32)]) // mov rcx, f0
        .add(2, op::OR, &[r(CL), imm(0x0f, 8)]) // or cl, f
        .add(2, op::XOR, &[r(EDX), r(EDX)]), // xor edx, edx
    &[
        (RAX, 0x1200),
        (RCX, 0xff),
        (RDX, 0),
        (CF, 0),
        (OF, 0),
        (ZF, 1),
        (PF, 1),
    ]);
}

#[test]
fn test_sets_flags_only() {
    test_inline(X64, Program::new(0x1000)
        .add(5, op::MOV, &[r(EAX), imm(0x80, 32)]) // mov eax, 80
        .add(2, op::TEST, &[r(AL), imm(0x80, 8)]), // test al, 80
    &[
        (RAX, 0x80),
        (SF, 1),
        (ZF, 0),
    ]);
}

#[test]
fn inc_dec_keep_carry() {
    test_inline(X64, Program::new(0x1000)
        .add(1, op::STC, &[]) // stc
        .add(2, op::MOV, &[r(AL), imm(0xff, 8)]) // mov al, ff
        .add(2, op::INC, &[r(AL)]), // inc al
    &[
        (RAX, 0),
        (ZF, 1),
        (CF, 1),
        (AF, 1),
        (OF, 0),
    ]);
    test_inline(X64, Program::new(0x1000)
        .add(2, op::MOV, &[r(AL), imm(0x80, 8)]) // mov al, 80
        .add(2, op::DEC, &[r(AL)]), // dec al
    &[
        (RAX, 0x7f),
        (OF, 1),
        (CF, 0),
        (SF, 0),
    ]);
}

#[test]
fn neg_not() {
    test_inline(X64, Program::new(0x1000)
        .add(5, op::MOV, &[r(EAX), imm(5, 32)]) // mov eax, 5
        .add(2, op::NEG, &[r(EAX)]) // neg eax
        .add(2, op::NOT, &[r(BX)]), // not bx
    &[
        (RAX, 0xffff_fffb),
        (RBX, 0xffff),
        (CF, 1),
        (SF, 1),
    ]);
    test_inline(X64, Program::new(0x1000)
        .add(2, op::NEG, &[r(ECX)]), // neg ecx
    &[
        (RCX, 0),
        (CF, 0),
        (ZF, 1),
    ]);
}

#[test]
fn sub_register_merge_64() {
    let ctx = &context(&[]);
    let mut engine = Engine::new(ctx, X64);
    run(&mut engine, Program::new(0x1000)
        .add(10, op::MOV, &[r(RAX), imm(0x1122_3344_5566_7788, 64)]) // mov rax, 1122334455667788
        .add(2, op::MOV, &[r(AL), imm(0xff, 8)])); // mov al, ff
    check_registers(&engine, &[(RAX, 0x1122_3344_5566_77ff)]);
    run(&mut engine, Program::new(0x2000)
        .add(2, op::MOV, &[r(AH), imm(0, 8)]) // mov ah, 0
        .add(4, op::MOV, &[r(AX), imm(0xabcd, 16)])); // mov ax, abcd
    check_registers(&engine, &[(RAX, 0x1122_3344_5566_abcd), (AH, 0xab)]);
    run(&mut engine, Program::new(0x3000)
        .add(5, op::MOV, &[r(EAX), imm(1, 32)])); // mov eax, 1
    check_registers(&engine, &[(RAX, 1)]);
}

#[test]
fn sub_register_merge_32() {
    test_inline(X86, Program::new(0x1000)
        .add(5, op::MOV, &[reg(X86, EAX), imm(0x1122_3344, 32)]) // mov eax, 11223344
        .add(4, op::MOV, &[reg(X86, AX), imm(0xffff, 16)]) // mov ax, ffff
        .add(2, op::MOV, &[reg(X86, AH), imm(0, 8)]), // mov ah, 0
    &[
        (EAX, 0x1122_00ff),
        (AL, 0xff),
    ]);
}

#[test]
fn register_not_on_32bit() {
    let ctx = &context(&[]);
    let mut engine = Engine::new(ctx, X86);
    assert!(engine.register(RAX).is_err());
    assert!(engine.register(R8D).is_err());
    let mut inst = Instruction::new(0x1000, 2, op::CDQE);
    assert!(engine.process(&mut inst).is_err());
}

#[test]
fn shifts() {
    test_inline(X64, Program::new(0x1000)
        .add(5, op::MOV, &[r(EAX), imm(0x8000_0001, 32)]) // mov eax, 80000001
        .add(2, op::SHL, &[r(EAX), imm(1, 8)]), // shl eax, 1
    &[
        (RAX, 2),
        (CF, 1),
        (OF, 1),
        (ZF, 0),
    ]);
    test_inline(X64, Program::new(0x1000)
        .add(5, op::MOV, &[r(EAX), imm(3, 32)]) // mov eax, 3
        .add(2, op::SHR, &[r(EAX)]), // shr eax, 1
    &[
        (RAX, 1),
        (CF, 1),
        (OF, 0),
    ]);
    test_inline(X64, Program::new(0x1000)
        .add(5, op::MOV, &[r(EAX), imm(0x8000_0000, 32)]) // mov eax, 80000000
        .add(3, op::SAR, &[r(EAX), imm(4, 8)]), // sar eax, 4
    &[
        (RAX, 0xf800_0000),
        (CF, 0),
        (SF, 1),
    ]);
}

#[test]
fn shift_by_zero_keeps_flags() {
    test_inline(X64, Program::new(0x1000)
        .add(1, op::STC, &[]) // stc
        .add(5, op::MOV, &[r(EAX), imm(5, 32)]) // mov eax, 5
        .add(5, op::MOV, &[r(ECX), imm(0x20, 32)]) // mov ecx, 20
        .add(2, op::SHL, &[r(EAX), r(CL)]), // shl eax, cl
    &[
        (RAX, 5),
        (CF, 1),
        (ZF, 0),
    ]);
}

#[test]
fn shift_by_zero_keeps_adjust_flag() {
    let ctx = &context(&[Mode::ConcretizeUndefinedRegisters]);
    let mut engine = Engine::new(ctx, X64);
    engine.set_concrete_register_value(AF, 1).unwrap();
    engine.taint_register(AF).unwrap();
    run(&mut engine, Program::new(0x1000)
        .add(5, op::MOV, &[r(ECX), imm(0x20, 32)]) // mov ecx, 20
        .add(2, op::SHL, &[r(EAX), r(CL)])); // shl eax, cl
    let af = engine.register_ast(AF).unwrap();
    assert_eq!(engine.evaluate(af), 1);
    assert!(engine.is_register_tainted(AF).unwrap());

    run(&mut engine, Program::new(0x1007)
        .add(2, op::SHL, &[r(EAX), imm(1, 8)])); // shl eax, 1
    let af = engine.register_ast(AF).unwrap();
    assert!(!engine.is_register_tainted(AF).unwrap());
    let vars = af.variables();
    assert!(!vars.is_empty());
    let alias = ctx.variable(vars[vars.len() - 1]).unwrap().alias;
    assert_eq!(alias.as_ref().map(|x| &**x), Some("undefined"));
}

#[test]
fn rotates() {
    test_inline(X64, Program::new(0x1000)
        .add(2, op::MOV, &[r(AL), imm(0x81, 8)]) // mov al, 81
        .add(2, op::ROL, &[r(AL), imm(1, 8)]), // rol al, 1
    &[
        (RAX, 0x03),
        (CF, 1),
        (OF, 1),
    ]);
    test_inline(X64, Program::new(0x1000)
        .add(2, op::MOV, &[r(AL), imm(0x01, 8)]) // mov al, 1
        .add(2, op::ROR, &[r(AL), imm(1, 8)]), // ror al, 1
    &[
        (RAX, 0x80),
        (CF, 1),
        (OF, 1),
    ]);
}

#[test]
fn rotation_index_concretized() {
    let ctx = &context(&[]);
    let mut engine = Engine::new(ctx, X64);
    engine.set_concrete_register_value(RCX, 4).unwrap();
    engine.symbolize_register(RCX).unwrap();
    run(&mut engine, Program::new(0x1000)
        .add(5, op::MOV, &[r(EAX), imm(0x1234_5678, 32)]) // mov eax, 12345678
        .add(2, op::ROL, &[r(EAX), r(CL)])); // rol eax, cl
    check_registers(&engine, &[(RAX, 0x2345_6781)]);
    assert!(!engine.register_ast(RAX).unwrap().is_symbolized());

    ctx.modes().enable(Mode::SymbolizeIndexRotation);
    run(&mut engine, Program::new(0x2000)
        .add(2, op::ROL, &[r(EAX), r(CL)])); // rol eax, cl
    check_registers(&engine, &[(RAX, 0x3456_7812)]);
    assert!(engine.register_ast(RAX).unwrap().is_symbolized());
}

#[test]
fn mul_div() {
    test_inline(X64, Program::new(0x1000)
        .add(5, op::MOV, &[r(EAX), imm(0x8000_0000, 32)]) // mov eax, 80000000
        .add(5, op::MOV, &[r(ECX), imm(4, 32)]) // mov ecx, 4
        .add(2, op::MUL, &[r(ECX)]), // mul ecx
    &[
        (RAX, 0),
        (RDX, 2),
        (CF, 1),
        (OF, 1),
    ]);
    test_inline(X64, Program::new(0x1000)
        .add(2, op::MOV, &[r(AL), imm(0x10, 8)]) // mov al, 10
        .add(2, op::MOV, &[r(CL), imm(0x10, 8)]) // mov cl, 10
        .add(2, op::MUL, &[r(CL)]), // mul cl
    &[
        (AX, 0x100),
        (CF, 1),
    ]);
    test_inline(X64, Program::new(0x1000)
        .add(5, op::MOV, &[r(EAX), imm(100, 32)]) // mov eax, 64
        .add(5, op::MOV, &[r(ECX), imm(7, 32)]) // mov ecx, 7
        .add(2, op::DIV, &[r(ECX)]), // div ecx
    &[
        (RAX, 14),
        (RDX, 2),
    ]);
}

#[test]
fn imul_forms() {
    test_inline(X64, Program::new(0x1000)
        .add(5, op::MOV, &[r(ECX), imm(3, 32)]) // mov ecx, 3
        .add(3, op::IMUL, &[r(EAX), r(ECX), imm(0xfe, 8)]), // imul eax, ecx, -2
    &[
        (RAX, 0xffff_fffa),
        (CF, 0),
        (OF, 0),
    ]);
    test_inline(X64, Program::new(0x1000)
        .add(5, op::MOV, &[r(EAX), imm(0x4000_0000, 32)]) // mov eax, 40000000
        .add(5, op::MOV, &[r(ECX), imm(4, 32)]) // mov ecx, 4
        .add(3, op::IMUL, &[r(EAX), r(ECX)]), // imul eax, ecx
    &[
        (RAX, 0),
        (CF, 1),
        (OF, 1),
    ]);
    test_inline(X64, Program::new(0x1000)
        .add(5, op::MOV, &[r(EAX), imm(0xffff_fffe, 32)]) // mov eax, -2
        .add(5, op::MOV, &[r(ECX), imm(3, 32)]) // mov ecx, 3
        .add(2, op::IMUL, &[r(ECX)]), // imul ecx
    &[
        (RAX, 0xffff_fffa),
        (RDX, 0xffff_ffff),
        (CF, 0),
    ]);
}

#[test]
fn idiv_signed() {
    test_inline(X64, Program::new(0x1000)
        .add(5, op::MOV, &[r(EDX), imm(0xffff_ffff, 32)]) // mov edx, ffffffff
        .add(5, op::MOV, &[r(EAX), imm(0xffff_fff9, 32)]) // mov eax, -7
        .add(5, op::MOV, &[r(ECX), imm(2, 32)]) // mov ecx, 2
        .add(2, op::IDIV, &[r(ECX)]), // idiv ecx
    &[
        (RAX, 0xffff_fffd),
        (RDX, 0xffff_ffff),
    ]);
}

#[test]
fn divide_error() {
    let ctx = &context(&[]);
    let mut engine = Engine::new(ctx, X64);
    run(&mut engine, Program::new(0x1000)
        .add(5, op::MOV, &[r(EAX), imm(5, 32)]) // mov eax, 5
        .add(5, op::MOV, &[r(ECX), imm(0, 32)])); // mov ecx, 0
    let count = engine.symbolic().expression_count();
    let mut inst = Instruction::new(0x100a, 2, op::DIV).with_operand(r(ECX));
    assert_eq!(engine.process(&mut inst).unwrap(), Fault::DivideError);
    assert_eq!(inst.fault(), Fault::DivideError);
    assert!(inst.expressions().is_empty());
    assert_eq!(engine.symbolic().expression_count(), count);
    check_registers(&engine, &[(RAX, 5)]);

    // -2**31 / -1 doesn't fit in 32 bits
    run(&mut engine, Program::new(0x2000)
        .add(5, op::MOV, &[r(EDX), imm(0xffff_ffff, 32)]) // mov edx, ffffffff
        .add(5, op::MOV, &[r(EAX), imm(0x8000_0000, 32)]) // mov eax, 80000000
        .add(5, op::MOV, &[r(ECX), imm(0xffff_ffff, 32)])); // mov ecx, ffffffff
    let mut inst = Instruction::new(0x200f, 2, op::IDIV).with_operand(r(ECX));
    assert_eq!(engine.process(&mut inst).unwrap(), Fault::DivideError);
    check_registers(&engine, &[(RAX, 0x8000_0000)]);
}

#[test]
fn unsupported_opcode() {
    let ctx = &context(&[]);
    let mut engine = Engine::new(ctx, X64);
    for &opcode in &[op::CPUID, op::SYSCALL, 0xffff] {
        let mut inst = Instruction::new(0x1000, 2, opcode);
        assert_eq!(engine.process(&mut inst).unwrap(), Fault::InvalidOpcode);
        assert!(inst.expressions().is_empty());
        assert!(!engine.semantics().is_supported(opcode));
    }
    assert_eq!(engine.symbolic().expression_count(), 0);
}

#[test]
fn malformed_operands() {
    let ctx = &context(&[]);
    let mut engine = Engine::new(ctx, X64);
    let mut inst = Instruction::new(0x1000, 3, op::ADD).with_operand(r(EAX));
    assert!(engine.process(&mut inst).is_err());
    let mut inst = Instruction::new(0x1000, 3, op::ADD)
        .with_operand(r(EAX))
        .with_operand(r(BX));
    assert!(engine.process(&mut inst).is_err());
    let mut inst = Instruction::new(0x1000, 3, op::LEA)
        .with_operand(r(EAX))
        .with_operand(r(EBX));
    assert!(engine.process(&mut inst).is_err());
}

#[test]
fn faults() {
    let ctx = &context(&[]);
    let mut engine = Engine::new(ctx, X64);
    let mut inst = Instruction::new(0x1000, 1, op::INT3);
    assert_eq!(engine.process(&mut inst).unwrap(), Fault::Breakpoint);
    let mut inst = Instruction::new(0x1000, 1, op::HLT);
    assert_eq!(engine.process(&mut inst).unwrap(), Fault::GeneralProtection);
}

#[test]
fn push_pop() {
    let ctx = &context(&[]);
    let mut engine = Engine::new(ctx, X64);
    engine.set_concrete_register_value(RSP, 0x8000).unwrap();
    run(&mut engine, Program::new(0x1000)
        .add(7, op::MOV, &[r(RAX), imm(0x1234, 32)]) // mov rax, 1234
        .add(1, op::PUSH, &[r(RAX)]) // push rax
        .add(2, op::PUSH, &[imm(0x10, 8)]) // push 10
        .add(1, op::POP, &[r(RCX)]) // pop rcx
        .add(1, op::POP, &[r(RBX)])); // pop rbx
    check_registers(&engine, &[(RBX, 0x1234), (RCX, 0x10), (RSP, 0x8000)]);
    assert_eq!(engine.concrete_memory_value(&MemoryAccess::at(0x7ff8, 64)), 0x1234);
    assert_eq!(engine.concrete_memory_value(&MemoryAccess::at(0x7ff0, 64)), 0x10);
}

#[test]
fn call_ret() {
    let ctx = &context(&[]);
    let mut engine = Engine::new(ctx, X64);
    engine.set_concrete_register_value(RSP, 0x8000).unwrap();
    let insts = run(&mut engine, Program::new(0x1000)
        .add(5, op::CALL, &[imm(0x2000, 32)])); // call 2000
    assert!(insts[0].is_branch());
    assert_eq!(insts[0].next_address(), 0x2000);
    check_registers(&engine, &[(RIP, 0x2000), (RSP, 0x7ff8)]);
    assert_eq!(engine.concrete_memory_value(&MemoryAccess::at(0x7ff8, 64)), 0x1005);

    let insts = run(&mut engine, Program::new(0x2000)
        .add(1, op::RET, &[])); // ret
    assert_eq!(insts[0].next_address(), 0x1005);
    check_registers(&engine, &[(RIP, 0x1005), (RSP, 0x8000)]);
}

#[test]
fn conditional_branch_constraint() {
    let ctx = &context(&[]);
    let mut engine = Engine::new(ctx, X64);
    engine.symbolize_register(RAX).unwrap();
    let var = engine.register_ast(RAX).unwrap().if_variable().unwrap();
    let insts = run(&mut engine, Program::new(0x1000)
        .add(4, op::CMP, &[r(RAX), imm(5, 8)]) // cmp rax, 5
        .add(2, op::JE, &[imm(0x2000, 32)])); // je 2000
    let je = &insts[1];
    assert!(je.is_branch());
    assert!(!je.is_condition_taken());
    assert_eq!(je.next_address(), 0x1006);

    let constraints = engine.symbolic().path_constraints();
    assert_eq!(constraints.len(), 1);
    let pc = &constraints[0];
    assert!(pc.is_multiple_branches());
    assert_eq!(pc.taken().unwrap().target, 0x1006);
    assert_eq!(pc.taken().unwrap().source, 0x1004);

    let flipped = engine.symbolic().flip_last_branch().unwrap().unwrap();
    assert_eq!(engine.evaluate(flipped), 0);
    ctx.set_variable_value(var, 5).unwrap();
    assert_eq!(engine.evaluate(flipped), 1);
    let predicate = engine.symbolic().path_predicate().unwrap();
    assert_eq!(engine.evaluate(predicate), 0);
}

#[test]
fn concrete_branch_tracking() {
    let ctx = &context(&[]);
    let mut engine = Engine::new(ctx, X64);
    let insts = run(&mut engine, Program::new(0x1000)
        .add(5, op::MOV, &[r(EAX), imm(1, 32)]) // mov eax, 1
        .add(3, op::CMP, &[r(EAX), imm(1, 8)]) // cmp eax, 1
        .add(2, op::JE, &[imm(0x2000, 32)])); // je 2000
    assert!(insts[2].is_condition_taken());
    check_registers(&engine, &[(RIP, 0x2000)]);
    assert!(engine.symbolic().path_constraints().is_empty());

    ctx.modes().disable(Mode::PcTrackingSymbolic);
    run(&mut engine, Program::new(0x2000)
        .add(2, op::JMP, &[imm(0x3000, 32)])); // jmp 3000
    let constraints = engine.symbolic().path_constraints();
    assert_eq!(constraints.len(), 1);
    assert!(!constraints[0].is_multiple_branches());
    assert_eq!(constraints[0].taken().unwrap().target, 0x3000);
}

#[test]
fn setcc_cmovcc() {
    test_inline(X64, Program::new(0x1000)
        .add(5, op::MOV, &[r(EAX), imm(1, 32)]) // mov eax, 1
        .add(3, op::CMP, &[r(EAX), imm(2, 8)]) // cmp eax, 2
        .add(3, op::SETB, &[r(CL)]) // setb cl
        .add(3, op::SETG, &[r(BL)]) // setg bl
        .add(3, op::CMOVB, &[r(EDX), r(EAX)]) // cmovb edx, eax
        .add(3, op::CMOVA, &[r(ESI), r(EAX)]), // cmova esi, eax
    &[
        (RCX, 1),
        (RBX, 0),
        (RDX, 1),
        (RSI, 0),
    ]);
}

#[test]
fn lea_and_memory() {
    let base = X64.register(RBX).unwrap();
    let index = X64.register(RCX).unwrap();
    let address = MemoryAccess::at(0, 64)
        .with_base(base)
        .with_index(index, 8)
        .with_displacement(0x10);
    test_inline(X64, Program::new(0x1000)
        .add(7, op::MOV, &[r(RBX), imm(0x1000, 32)]) // mov rbx, 1000
        .add(7, op::MOV, &[r(RCX), imm(2, 32)]) // mov rcx, 2
        .add(5, op::LEA, &[r(RAX), address.into()]) // lea rax, [rbx + rcx * 8 + 10]
        .add(11, op::MOV, &[mem(0x3000, 32), imm(0x1122_3344, 32)]) // mov dword [3000], 11223344
        .add(7, op::MOV, &[r(DL), mem(0x3001, 8)]) // mov dl, byte [3001]
        .add(4, op::MOV, &[address.into(), r(RBX)]) // mov [rbx + rcx * 8 + 10], rbx
        .add(4, op::MOV, &[r(RSI), mem(0x1020, 64)]), // mov rsi, [1020]
    &[
        (RAX, 0x1020),
        (RDX, 0x33),
        (RSI, 0x1000),
    ]);
}

#[test]
fn extends_and_swaps() {
    test_inline(X64, Program::new(0x1000)
        .add(2, op::MOV, &[r(CL), imm(0x80, 8)]) // mov cl, 80
        .add(3, op::MOVZX, &[r(EAX), r(CL)]) // movzx eax, cl
        .add(3, op::MOVSX, &[r(EBX), r(CL)]) // movsx ebx, cl
        .add(3, op::MOVSXD, &[r(RDX), r(EBX)]) // movsxd rdx, ebx
        .add(5, op::MOV, &[r(ESI), imm(0x1122_3344, 32)]) // mov esi, 11223344
        .add(2, op::BSWAP, &[r(ESI)]) // bswap esi
        .add(4, op::MOV, &[r(DI), imm(0x1234, 16)]) // mov di, 1234
        .add(2, op::XCHG, &[r(DIL), r(SIL)]), // xchg dil, sil
    &[
        (RAX, 0x80),
        (RBX, 0xffff_ff80),
        (RDX, 0xffff_ffff_ffff_ff80),
        (RSI, 0x4433_2234),
        (RDI, 0x1211),
    ]);
}

#[test]
fn accumulator_extension() {
    test_inline(X64, Program::new(0x1000)
        .add(5, op::MOV, &[r(EAX), imm(0x8000_0000, 32)]) // mov eax, 80000000
        .add(1, op::CDQ, &[]) // cdq
        .add(2, op::CDQE, &[]), // cdqe
    &[
        (RDX, 0xffff_ffff),
        (RAX, 0xffff_ffff_8000_0000),
    ]);
    test_inline(X64, Program::new(0x1000)
        .add(2, op::MOV, &[r(AL), imm(0x80, 8)]) // mov al, 80
        .add(2, op::CBW, &[]) // cbw
        .add(1, op::CWDE, &[]) // cwde
        .add(2, op::CWD, &[]), // cwd
    &[
        (RAX, 0xffff_ff80),
        (RDX, 0xffff),
    ]);
}

#[test]
fn flag_instructions() {
    test_inline(X64, Program::new(0x1000)
        .add(1, op::STC, &[]) // stc
        .add(1, op::CMC, &[]) // cmc
        .add(1, op::STD, &[]) // std
        .add(1, op::STI, &[]) // sti
        .add(1, op::CLI, &[]) // cli
        .add(1, op::NOP, &[]), // nop
    &[
        (CF, 0),
        (DF, 1),
        (IF, 0),
        (RIP, 0x1006),
    ]);
    test_inline(X64, Program::new(0x1000)
        .add(1, op::STC, &[]) // stc
        .add(1, op::STD, &[]) // std
        .add(1, op::CLC, &[]) // clc
        .add(1, op::CLD, &[]) // cld
        .add(1, op::STI, &[]), // sti
    &[
        (CF, 0),
        (DF, 0),
        (IF, 1),
        (RIP, 0x1005),
    ]);
}

#[test]
fn flag_order() {
    let ctx = &context(&[]);
    let mut engine = Engine::new(ctx, X64);
    engine.symbolize_register(RBX).unwrap();
    let insts = run(&mut engine, Program::new(0x1000)
        .add(3, op::ADD, &[r(RAX), r(RBX)])); // add rax, rbx
    let comments = insts[0].expressions().iter()
        .map(|&id| engine.symbolic().expression(id).unwrap().comment().to_string())
        .collect::<Vec<_>>();
    assert_eq!(comments, vec![
        "ADD operation", "Adjust flag", "Carry flag", "Overflow flag", "Parity flag",
        "Sign flag", "Zero flag", "Program Counter",
    ]);
    let text = engine.symbolic().expression(insts[0].expressions()[0]).unwrap().to_string();
    assert!(text.starts_with("(define-fun ref!"), "{}", text);
    assert!(text.contains("(_ BitVec 64)"), "{}", text);
    assert!(text.contains("bvadd"), "{}", text);
    assert!(text.ends_with("; ADD operation"), "{}", text);
}

#[test]
fn disassembly_in_comments() {
    let ctx = &context(&[]);
    let mut engine = Engine::new(ctx, X64);
    let mut inst = Instruction::new(0x1000, 3, op::SUB)
        .with_operand(r(RAX))
        .with_operand(r(RBX))
        .with_disassembly("sub rax, rbx");
    engine.process(&mut inst).unwrap();
    assert_eq!(inst.expressions().len(), 8);
    for &id in inst.expressions() {
        assert_eq!(engine.symbolic().expression(id).unwrap().disassembly(), "sub rax, rbx");
    }
    let text = engine.symbolic().expression(inst.expressions()[0]).unwrap().to_string();
    assert!(text.ends_with("; SUB operation: sub rax, rbx"), "{}", text);

    let mut cmp = Instruction::new(0x1003, 3, op::CMP)
        .with_operand(r(RAX))
        .with_operand(r(RBX));
    engine.process(&mut cmp).unwrap();
    let volatile = engine.symbolic().expression(cmp.expressions()[0]).unwrap();
    assert_eq!(volatile.disassembly(), "");
    assert!(volatile.to_string().ends_with("; CMP operation"));
}

#[test]
fn only_on_symbolized() {
    let ctx = &context(&[Mode::OnlyOnSymbolized]);
    let mut engine = Engine::new(ctx, X64);
    let insts = run(&mut engine, Program::new(0x1000)
        .add(5, op::MOV, &[r(EAX), imm(1, 32)])); // mov eax, 1
    assert!(insts[0].expressions().is_empty());
    assert!(engine.symbolic().read_register(&X64.register(RAX).unwrap()).is_none());
    check_registers(&engine, &[(RAX, 1), (RIP, 0x1005)]);

    engine.symbolize_register(RBX).unwrap();
    let insts = run(&mut engine, Program::new(0x2000)
        .add(3, op::ADD, &[r(RAX), r(RBX)])); // add rax, rbx
    assert!(!insts[0].expressions().is_empty());
    for &id in insts[0].expressions() {
        assert!(engine.symbolic().expression(id).unwrap().is_symbolized());
    }
    assert!(engine.register_ast(RAX).unwrap().is_symbolized());
    assert!(!engine.register_ast(RIP).unwrap().is_symbolized());
}

#[test]
fn concretize_undefined_registers() {
    let ctx = &context(&[]);
    let mut engine = Engine::new(ctx, X64);
    run(&mut engine, Program::new(0x1000)
        .add(3, op::AND, &[r(EAX), imm(1, 8)])); // and eax, 1
    assert!(engine.register_ast(AF).unwrap().if_constant().is_some());

    ctx.modes().enable(Mode::ConcretizeUndefinedRegisters);
    engine.taint_register(AF).unwrap();
    run(&mut engine, Program::new(0x2000)
        .add(3, op::AND, &[r(EAX), imm(1, 8)])); // and eax, 1
    let var = engine.register_ast(AF).unwrap().if_variable().unwrap();
    assert_eq!(ctx.variable(var).unwrap().alias.as_ref().map(|x| &**x), Some("undefined"));
    assert!(!engine.is_register_tainted(AF).unwrap());
}

#[test]
fn memory_array() {
    let ctx = &context(&[Mode::MemoryArray]);
    let mut engine = Engine::new(ctx, X64);
    engine.set_concrete_register_value(RAX, 0x42).unwrap();
    engine.symbolize_register(RAX).unwrap();
    let var = engine.register_ast(RAX).unwrap().if_variable().unwrap();
    run(&mut engine, Program::new(0x1000)
        .add(8, op::MOV, &[mem(0x4000, 64), r(RAX)]) // mov [4000], rax
        .add(8, op::MOV, &[r(RBX), mem(0x4000, 64)]) // mov rbx, [4000]
        .add(8, op::MOV, &[r(ECX), mem(0x4004, 32)])); // mov ecx, [4004]
    check_registers(&engine, &[(RBX, 0x42), (RCX, 0)]);
    let rbx = engine.register_ast(RBX).unwrap();
    assert!(rbx.is_symbolized());
    ctx.set_variable_value(var, 0x1122_3344_5566_7788).unwrap();
    assert_eq!(engine.evaluate(rbx), 0x1122_3344_5566_7788);
    assert_eq!(engine.evaluate(engine.register_ast(RCX).unwrap()), 0x1122_3344);
}

#[test]
fn aligned_memory() {
    let ctx = &context(&[Mode::AlignedMemory]);
    let mut engine = Engine::new(ctx, X64);
    engine.symbolize_register(RAX).unwrap();
    run(&mut engine, Program::new(0x1000)
        .add(8, op::MOV, &[mem(0x5000, 64), r(RAX)]) // mov [5000], rax
        .add(8, op::MOV, &[r(RBX), mem(0x5000, 64)])); // mov rbx, [5000]
    assert_eq!(engine.register_ast(RBX).unwrap(), engine.register_ast(RAX).unwrap());

    run(&mut engine, Program::new(0x2000)
        .add(8, op::MOV, &[mem(0x5002, 8), imm(0, 8)]) // mov byte [5002], 0
        .add(8, op::MOV, &[r(RCX), mem(0x5000, 64)])); // mov rcx, [5000]
    assert_ne!(engine.register_ast(RCX).unwrap(), engine.register_ast(RAX).unwrap());
    check_registers(&engine, &[(RCX, 0)]);
}

#[test]
fn reads_from_concrete_state() {
    let ctx = &context(&[]);
    let mut engine = Engine::new(ctx, X86);
    engine.set_concrete_memory(0x6000, &[0x78, 0x56, 0x34, 0x12]);
    engine.set_concrete_register_value(ESI, 0x6000).unwrap();
    test_memory_base(&mut engine);
    check_registers(&engine, &[(EAX, 0x1234_5679)]);
}

fn test_memory_base(engine: &mut Engine<'_>) {
    let source = helpers::mem_base(X86, ESI, 0, 32);
    run(engine, Program::new(0x1000)
        .add(2, op::MOV, &[reg(X86, EAX), source]) // mov eax, [esi]
        .add(1, op::INC, &[reg(X86, EAX)])); // inc eax
}
