use std::rc::Rc;

use symsem::{
    Architecture, AstContext, Engine, Immediate, Instruction, MemoryAccess, Mode, Modes,
    Operand, RegisterId,
};

pub fn reg(arch: Architecture, id: RegisterId) -> Operand {
    Operand::Register(arch.register(id).unwrap())
}

pub fn imm(value: u64, bits: u32) -> Operand {
    Operand::Immediate(Immediate::new(value, bits))
}

/// Memory at a fixed address.
pub fn mem(address: u64, bits: u32) -> Operand {
    Operand::Memory(MemoryAccess::at(address, bits))
}

/// `[base + displacement]`
pub fn mem_base(arch: Architecture, base: RegisterId, displacement: i64, bits: u32) -> Operand {
    let base = arch.register(base).unwrap();
    Operand::Memory(MemoryAccess::at(0, bits).with_base(base).with_displacement(displacement))
}

pub fn context(modes: &[Mode]) -> AstContext {
    let m = Modes::new();
    for &mode in modes {
        m.enable(mode);
    }
    AstContext::new(Rc::new(m))
}

/// Instructions laid out one after another starting from `address`.
pub struct Program {
    address: u64,
    instructions: Vec<Instruction>,
}

impl Program {
    pub fn new(address: u64) -> Program {
        Program {
            address,
            instructions: Vec::new(),
        }
    }

    pub fn add(mut self, length: u32, opcode: u32, operands: &[Operand]) -> Program {
        let mut inst = Instruction::new(self.address, length, opcode);
        for &op in operands {
            inst = inst.with_operand(op);
        }
        self.address += u64::from(length);
        self.instructions.push(inst);
        self
    }

    pub fn instructions(self) -> Vec<Instruction> {
        self.instructions
    }
}

/// Processes every instruction, asserting that none of them faults.
pub fn run(engine: &mut Engine<'_>, program: Program) -> Vec<Instruction> {
    let mut result = program.instructions();
    for inst in &mut result {
        let fault = engine.process(inst).unwrap();
        assert_eq!(fault, symsem::Fault::NoFault, "Fault at {:x}", inst.address());
    }
    result
}

/// Checks both the concrete value and the evaluated formula of each register.
pub fn check_registers(engine: &Engine<'_>, changes: &[(RegisterId, u128)]) {
    for &(id, expected) in changes {
        let reg = engine.register(id).unwrap();
        assert_eq!(
            engine.concrete_register_value(id).unwrap(), expected,
            "Concrete value of {}", reg,
        );
        let node = engine.register_ast(id).unwrap();
        assert_eq!(engine.evaluate(node), expected, "Formula of {}: {}", reg, node);
    }
}

pub fn test_inline(arch: Architecture, program: Program, changes: &[(RegisterId, u128)]) {
    let ctx = &context(&[]);
    let mut engine = Engine::new(ctx, arch);
    run(&mut engine, program);
    check_registers(&engine, changes);
}
