//! Architecture descriptions: register tables, instruction operands and the concrete
//! machine state which the symbolic state is kept in sync with.

use std::fmt;

use arrayvec::ArrayVec;
use byteorder::{ByteOrder, LittleEndian};
use fxhash::FxHashMap;

use crate::ast::MemoryReader;
use crate::bit_misc::{mask, sign_extend};
use crate::symbolic::ExprId;
use crate::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Architecture {
    X86,
    X86_64,
    AArch64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegisterId(pub u16);

pub const INVALID: RegisterId = RegisterId(0);

const X86_BASE: u16 = 0x1;
const AARCH64_BASE: u16 = 0x100;

/// How a write to a sub-register affects the rest of its parent.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum MergeRule {
    /// Bits outside the sub-register keep their value.
    Preserve,
    /// The written value is zero-extended to the whole parent.
    ZeroExtend,
}

/// One row of a register table.
pub struct RegisterInfo {
    pub name: &'static str,
    pub bits: u8,
    pub low: u8,
    /// Parent on 64-bit architectures.
    pub parent: RegisterId,
    /// Parent on 32-bit x86, `INVALID` if the register doesn't exist there.
    pub parent32: RegisterId,
    /// Merge rule on 64-bit architectures. 32-bit x86 always preserves.
    pub merge: MergeRule,
}

macro_rules! register_table {
    ($table:ident, $base:expr;
        $($id:ident = $name:expr, $bits:expr, $low:expr, $parent:ident, $parent32:ident,
            $merge:ident;)*
    ) => {
        #[allow(non_camel_case_types, dead_code)]
        #[repr(u16)]
        enum Index {
            $($id,)*
        }

        $(pub const $id: RegisterId = RegisterId($base + Index::$id as u16);)*

        pub(crate) static $table: &[crate::arch::RegisterInfo] = &[
            $(crate::arch::RegisterInfo {
                name: $name,
                bits: $bits,
                low: $low,
                parent: $parent,
                parent32: $parent32,
                merge: crate::arch::MergeRule::$merge,
            },)*
        ];
    }
}

pub mod aarch64;
pub mod x86;

/// A register resolved for a specific architecture.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Register {
    id: RegisterId,
    parent: RegisterId,
    bits: u8,
    low: u8,
    parent_bits: u8,
    merge: MergeRule,
}

impl Register {
    pub fn id(&self) -> RegisterId {
        self.id
    }

    /// The widest register containing this one; equal to `id()` for root registers.
    pub fn parent(&self) -> RegisterId {
        self.parent
    }

    pub fn bits(&self) -> u32 {
        u32::from(self.bits)
    }

    pub fn low(&self) -> u32 {
        u32::from(self.low)
    }

    pub fn high(&self) -> u32 {
        u32::from(self.low) + u32::from(self.bits) - 1
    }

    pub fn parent_bits(&self) -> u32 {
        u32::from(self.parent_bits)
    }

    pub fn merge(&self) -> MergeRule {
        self.merge
    }

    pub fn is_root(&self) -> bool {
        self.id == self.parent
    }

    pub fn name(&self) -> &'static str {
        register_info(self.id).map(|x| x.name).unwrap_or("?")
    }

    /// Combines `value` written to this register with the old value of the parent.
    pub fn merge_value(&self, parent_value: u128, value: u128) -> u128 {
        let value = value & mask(self.bits());
        match self.merge {
            _ if self.is_root() => value,
            MergeRule::ZeroExtend => value,
            MergeRule::Preserve => {
                let field = mask(self.bits()) << self.low;
                (parent_value & !field) | (value << self.low)
            }
        }
    }

    /// Extracts this register's value from the parent value.
    pub fn extract_value(&self, parent_value: u128) -> u128 {
        (parent_value >> self.low) & mask(self.bits())
    }
}

impl fmt::Debug for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Register({})", self.name())
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn register_info(id: RegisterId) -> Option<&'static RegisterInfo> {
    if id.0 >= AARCH64_BASE {
        aarch64::REGISTERS.get(usize::from(id.0 - AARCH64_BASE))
    } else if id.0 >= X86_BASE {
        x86::REGISTERS.get(usize::from(id.0 - X86_BASE))
    } else {
        None
    }
}

impl Architecture {
    pub fn is_x86(self) -> bool {
        match self {
            Architecture::X86 | Architecture::X86_64 => true,
            Architecture::AArch64 => false,
        }
    }

    /// Width of general purpose registers and addresses.
    pub fn gpr_bits(self) -> u32 {
        match self {
            Architecture::X86 => 32,
            Architecture::X86_64 | Architecture::AArch64 => 64,
        }
    }

    fn table(self) -> (&'static [RegisterInfo], u16) {
        match self {
            Architecture::X86 | Architecture::X86_64 => (x86::REGISTERS, X86_BASE),
            Architecture::AArch64 => (aarch64::REGISTERS, AARCH64_BASE),
        }
    }

    pub fn register(self, id: RegisterId) -> Result<Register, Error> {
        let (table, base) = self.table();
        let info = id.0.checked_sub(base)
            .and_then(|idx| table.get(usize::from(idx)))
            .ok_or(Error::InvalidRegister(id, self))?;
        let (parent, merge) = match self {
            Architecture::X86 => (info.parent32, MergeRule::Preserve),
            _ => (info.parent, info.merge),
        };
        if parent == INVALID {
            return Err(Error::InvalidRegister(id, self));
        }
        let parent_bits = table_bits(parent).ok_or(Error::InvalidRegister(id, self))?;
        Ok(Register {
            id,
            parent,
            bits: info.bits,
            low: info.low,
            parent_bits,
            merge,
        })
    }

    pub fn register_by_name(self, name: &str) -> Result<Register, Error> {
        let (table, base) = self.table();
        let idx = table.iter()
            .position(|x| x.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::UnknownRegister(name.into(), self))?;
        self.register(RegisterId(base + idx as u16))
    }

    /// Every register usable on this architecture, roots and sub-registers.
    pub fn registers(self) -> Vec<Register> {
        let (table, base) = self.table();
        (0..table.len())
            .filter_map(|i| self.register(RegisterId(base + i as u16)).ok())
            .collect()
    }

    pub fn program_counter(self) -> Register {
        let id = match self {
            Architecture::X86 => x86::EIP,
            Architecture::X86_64 => x86::RIP,
            Architecture::AArch64 => aarch64::PC,
        };
        self.fixed_register(id)
    }

    pub fn stack_pointer(self) -> Register {
        let id = match self {
            Architecture::X86 => x86::ESP,
            Architecture::X86_64 => x86::RSP,
            Architecture::AArch64 => aarch64::SP,
        };
        self.fixed_register(id)
    }

    /// For registers known to exist in the table.
    pub(crate) fn fixed_register(self, id: RegisterId) -> Register {
        match self.register(id) {
            Ok(o) => o,
            Err(_) => panic!("Register {:?} missing from {:?} table", id, self),
        }
    }
}

fn table_bits(id: RegisterId) -> Option<u8> {
    register_info(id).map(|x| x.bits)
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Immediate {
    value: u64,
    bits: u32,
}

impl Immediate {
    pub fn new(value: u64, bits: u32) -> Immediate {
        Immediate {
            value: (u128::from(value) & mask(bits)) as u64,
            bits,
        }
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Value sign-extended or truncated to `bits`.
    pub fn sized_value(&self, bits: u32) -> u128 {
        sign_extend(u128::from(self.value), self.bits, bits)
    }
}

/// A memory operand. The effective address is `base + index * scale + displacement`;
/// `address()` holds its concrete value once the instruction has been processed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemoryAccess {
    address: u64,
    bits: u32,
    base: Option<Register>,
    index: Option<Register>,
    scale: u32,
    displacement: i64,
}

impl MemoryAccess {
    /// Access to a fixed address.
    pub fn at(address: u64, bits: u32) -> MemoryAccess {
        MemoryAccess {
            address,
            bits,
            base: None,
            index: None,
            scale: 1,
            displacement: address as i64,
        }
    }

    pub fn with_base(mut self, base: Register) -> MemoryAccess {
        if self.base.is_none() && self.index.is_none() {
            self.displacement = 0;
        }
        self.base = Some(base);
        self
    }

    pub fn with_index(mut self, index: Register, scale: u32) -> MemoryAccess {
        if self.base.is_none() && self.index.is_none() {
            self.displacement = 0;
        }
        self.index = Some(index);
        self.scale = scale;
        self
    }

    pub fn with_displacement(mut self, displacement: i64) -> MemoryAccess {
        self.displacement = displacement;
        self
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub(crate) fn set_address(&mut self, address: u64) {
        self.address = address;
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn bytes(&self) -> u32 {
        self.bits / 8
    }

    pub fn base(&self) -> Option<Register> {
        self.base
    }

    pub fn index(&self) -> Option<Register> {
        self.index
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn displacement(&self) -> i64 {
        self.displacement
    }

    /// Byte addresses covered by the access.
    pub fn byte_addresses(&self) -> impl Iterator<Item = u64> {
        let address = self.address;
        (0..u64::from(self.bytes())).map(move |i| address.wrapping_add(i))
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Operand {
    Immediate(Immediate),
    Memory(MemoryAccess),
    Register(Register),
}

impl Operand {
    pub fn bits(&self) -> u32 {
        match *self {
            Operand::Immediate(ref imm) => imm.bits(),
            Operand::Memory(ref mem) => mem.bits(),
            Operand::Register(ref reg) => reg.bits(),
        }
    }

    pub fn if_register(&self) -> Option<Register> {
        match *self {
            Operand::Register(reg) => Some(reg),
            _ => None,
        }
    }

    pub fn if_memory(&self) -> Option<&MemoryAccess> {
        match *self {
            Operand::Memory(ref mem) => Some(mem),
            _ => None,
        }
    }

    pub fn if_immediate(&self) -> Option<Immediate> {
        match *self {
            Operand::Immediate(imm) => Some(imm),
            _ => None,
        }
    }
}

impl From<Register> for Operand {
    fn from(reg: Register) -> Operand {
        Operand::Register(reg)
    }
}

impl From<MemoryAccess> for Operand {
    fn from(mem: MemoryAccess) -> Operand {
        Operand::Memory(mem)
    }
}

impl From<Immediate> for Operand {
    fn from(imm: Immediate) -> Operand {
        Operand::Immediate(imm)
    }
}

/// Exception raised by an instruction instead of completing normally.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Fault {
    NoFault,
    /// #DE
    DivideError,
    /// #BP
    Breakpoint,
    /// #UD, also used for opcodes without semantics.
    InvalidOpcode,
    /// #GP
    GeneralProtection,
}

impl Default for Fault {
    fn default() -> Fault {
        Fault::NoFault
    }
}

/// A decoded instruction. Decoding itself happens outside of this crate; the caller
/// fills in the opcode and operands, and processing fills in the results.
#[derive(Clone, Debug)]
pub struct Instruction {
    address: u64,
    length: u32,
    opcode: u32,
    operands: ArrayVec<[Operand; 4]>,
    disassembly: String,
    expressions: Vec<ExprId>,
    tainted: bool,
    branch: bool,
    condition_taken: bool,
    next_address: u64,
    fault: Fault,
}

impl Instruction {
    pub fn new(address: u64, length: u32, opcode: u32) -> Instruction {
        Instruction {
            address,
            length,
            opcode,
            operands: ArrayVec::new(),
            disassembly: String::new(),
            expressions: Vec::new(),
            tainted: false,
            branch: false,
            condition_taken: false,
            next_address: address.wrapping_add(u64::from(length)),
            fault: Fault::NoFault,
        }
    }

    /// Appends an operand. Instructions have at most 4 operands; more is a decoder bug.
    pub fn with_operand<O: Into<Operand>>(mut self, operand: O) -> Instruction {
        let ok = self.operands.try_push(operand.into()).is_ok();
        debug_assert!(ok, "Too many operands");
        self
    }

    pub fn with_disassembly(mut self, text: &str) -> Instruction {
        self.disassembly = text.into();
        self
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn opcode(&self) -> u32 {
        self.opcode
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    pub(crate) fn operands_mut(&mut self) -> &mut [Operand] {
        &mut self.operands
    }

    pub fn disassembly(&self) -> &str {
        &self.disassembly
    }

    /// Expressions created by the last `process` of this instruction, in creation order.
    pub fn expressions(&self) -> &[ExprId] {
        &self.expressions
    }

    pub(crate) fn expressions_mut(&mut self) -> &mut Vec<ExprId> {
        &mut self.expressions
    }

    pub fn is_tainted(&self) -> bool {
        self.tainted
    }

    pub(crate) fn set_tainted(&mut self, tainted: bool) {
        self.tainted = tainted;
    }

    pub fn is_branch(&self) -> bool {
        self.branch
    }

    pub fn is_condition_taken(&self) -> bool {
        self.condition_taken
    }

    /// Address executed after this instruction, as decided by the concrete state.
    pub fn next_address(&self) -> u64 {
        self.next_address
    }

    pub(crate) fn set_control_flow(&mut self, branch: bool, taken: bool, next_address: u64) {
        self.branch = branch;
        self.condition_taken = taken;
        self.next_address = next_address;
    }

    pub fn fault(&self) -> Fault {
        self.fault
    }

    pub(crate) fn reset(&mut self) {
        self.expressions.clear();
        self.tainted = false;
        self.branch = false;
        self.condition_taken = false;
        self.next_address = self.address.wrapping_add(u64::from(self.length));
        self.fault = Fault::NoFault;
    }

    pub(crate) fn set_fault(&mut self, fault: Fault) {
        self.fault = fault;
    }
}

/// Concrete register and memory values. Registers are stored by their root register;
/// memory is sparse and unset bytes read as zero.
#[derive(Clone, Debug, Default)]
pub struct ConcreteState {
    registers: FxHashMap<RegisterId, u128>,
    memory: FxHashMap<u64, u8>,
}

impl ConcreteState {
    pub fn new() -> ConcreteState {
        ConcreteState::default()
    }

    pub fn register_value(&self, reg: &Register) -> u128 {
        let parent = self.registers.get(&reg.parent()).copied().unwrap_or(0);
        reg.extract_value(parent)
    }

    pub fn set_register_value(&mut self, reg: &Register, value: u128) {
        let entry = self.registers.entry(reg.parent()).or_insert(0);
        *entry = reg.merge_value(*entry, value);
    }

    pub fn memory_byte(&self, address: u64) -> u8 {
        self.memory.get(&address).copied().unwrap_or(0)
    }

    pub fn set_memory_byte(&mut self, address: u64, value: u8) {
        self.memory.insert(address, value);
    }

    /// Little-endian read of `bytes` bytes (at most 16).
    pub fn memory_value(&self, address: u64, bytes: u32) -> u128 {
        let mut buf = [0u8; 16];
        let bytes = bytes.min(16) as usize;
        if bytes == 0 {
            return 0;
        }
        for (i, out) in buf.iter_mut().take(bytes).enumerate() {
            *out = self.memory_byte(address.wrapping_add(i as u64));
        }
        LittleEndian::read_uint128(&buf[..bytes], bytes)
    }

    pub fn set_memory_value(&mut self, address: u64, bytes: u32, value: u128) {
        let mut buf = [0u8; 16];
        let bytes = bytes.min(16) as usize;
        if bytes == 0 {
            return;
        }
        LittleEndian::write_uint128(&mut buf[..bytes], value & mask(bytes as u32 * 8), bytes);
        for (i, &byte) in buf.iter().take(bytes).enumerate() {
            self.set_memory_byte(address.wrapping_add(i as u64), byte);
        }
    }

    pub fn set_memory_bytes(&mut self, address: u64, data: &[u8]) {
        for (i, &byte) in data.iter().enumerate() {
            self.set_memory_byte(address.wrapping_add(i as u64), byte);
        }
    }

    pub fn memory_access_value(&self, access: &MemoryAccess) -> u128 {
        self.memory_value(access.address(), access.bytes())
    }
}

impl MemoryReader for ConcreteState {
    fn read_byte(&self, address: u64) -> u8 {
        self.memory_byte(address)
    }
}
