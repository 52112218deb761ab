//! x86 and x86-64 registers.
//!
//! Both architectures share one table: the `parent` column is used on x86-64 and
//! `parent32` on 32-bit x86. On x86-64, writing a 32-bit register zeroes the upper half
//! of the 64-bit register; 8- and 16-bit writes keep the other bits.

use super::{RegisterId, INVALID};

register_table! {
    REGISTERS, super::X86_BASE;
    RAX  = "rax",  64, 0, RAX, INVALID, Preserve;
    EAX  = "eax",  32, 0, RAX, EAX, ZeroExtend;
    AX   = "ax",   16, 0, RAX, EAX, Preserve;
    AH   = "ah",    8, 8, RAX, EAX, Preserve;
    AL   = "al",    8, 0, RAX, EAX, Preserve;
    RBX  = "rbx",  64, 0, RBX, INVALID, Preserve;
    EBX  = "ebx",  32, 0, RBX, EBX, ZeroExtend;
    BX   = "bx",   16, 0, RBX, EBX, Preserve;
    BH   = "bh",    8, 8, RBX, EBX, Preserve;
    BL   = "bl",    8, 0, RBX, EBX, Preserve;
    RCX  = "rcx",  64, 0, RCX, INVALID, Preserve;
    ECX  = "ecx",  32, 0, RCX, ECX, ZeroExtend;
    CX   = "cx",   16, 0, RCX, ECX, Preserve;
    CH   = "ch",    8, 8, RCX, ECX, Preserve;
    CL   = "cl",    8, 0, RCX, ECX, Preserve;
    RDX  = "rdx",  64, 0, RDX, INVALID, Preserve;
    EDX  = "edx",  32, 0, RDX, EDX, ZeroExtend;
    DX   = "dx",   16, 0, RDX, EDX, Preserve;
    DH   = "dh",    8, 8, RDX, EDX, Preserve;
    DL   = "dl",    8, 0, RDX, EDX, Preserve;
    RDI  = "rdi",  64, 0, RDI, INVALID, Preserve;
    EDI  = "edi",  32, 0, RDI, EDI, ZeroExtend;
    DI   = "di",   16, 0, RDI, EDI, Preserve;
    DIL  = "dil",   8, 0, RDI, INVALID, Preserve;
    RSI  = "rsi",  64, 0, RSI, INVALID, Preserve;
    ESI  = "esi",  32, 0, RSI, ESI, ZeroExtend;
    SI   = "si",   16, 0, RSI, ESI, Preserve;
    SIL  = "sil",   8, 0, RSI, INVALID, Preserve;
    RBP  = "rbp",  64, 0, RBP, INVALID, Preserve;
    EBP  = "ebp",  32, 0, RBP, EBP, ZeroExtend;
    BP   = "bp",   16, 0, RBP, EBP, Preserve;
    BPL  = "bpl",   8, 0, RBP, INVALID, Preserve;
    RSP  = "rsp",  64, 0, RSP, INVALID, Preserve;
    ESP  = "esp",  32, 0, RSP, ESP, ZeroExtend;
    SP   = "sp",   16, 0, RSP, ESP, Preserve;
    SPL  = "spl",   8, 0, RSP, INVALID, Preserve;
    R8   = "r8",   64, 0, R8, INVALID, Preserve;
    R8D  = "r8d",  32, 0, R8, INVALID, ZeroExtend;
    R8W  = "r8w",  16, 0, R8, INVALID, Preserve;
    R8B  = "r8b",   8, 0, R8, INVALID, Preserve;
    R9   = "r9",   64, 0, R9, INVALID, Preserve;
    R9D  = "r9d",  32, 0, R9, INVALID, ZeroExtend;
    R9W  = "r9w",  16, 0, R9, INVALID, Preserve;
    R9B  = "r9b",   8, 0, R9, INVALID, Preserve;
    R10  = "r10",  64, 0, R10, INVALID, Preserve;
    R10D = "r10d", 32, 0, R10, INVALID, ZeroExtend;
    R10W = "r10w", 16, 0, R10, INVALID, Preserve;
    R10B = "r10b",  8, 0, R10, INVALID, Preserve;
    R11  = "r11",  64, 0, R11, INVALID, Preserve;
    R11D = "r11d", 32, 0, R11, INVALID, ZeroExtend;
    R11W = "r11w", 16, 0, R11, INVALID, Preserve;
    R11B = "r11b",  8, 0, R11, INVALID, Preserve;
    R12  = "r12",  64, 0, R12, INVALID, Preserve;
    R12D = "r12d", 32, 0, R12, INVALID, ZeroExtend;
    R12W = "r12w", 16, 0, R12, INVALID, Preserve;
    R12B = "r12b",  8, 0, R12, INVALID, Preserve;
    R13  = "r13",  64, 0, R13, INVALID, Preserve;
    R13D = "r13d", 32, 0, R13, INVALID, ZeroExtend;
    R13W = "r13w", 16, 0, R13, INVALID, Preserve;
    R13B = "r13b",  8, 0, R13, INVALID, Preserve;
    R14  = "r14",  64, 0, R14, INVALID, Preserve;
    R14D = "r14d", 32, 0, R14, INVALID, ZeroExtend;
    R14W = "r14w", 16, 0, R14, INVALID, Preserve;
    R14B = "r14b",  8, 0, R14, INVALID, Preserve;
    R15  = "r15",  64, 0, R15, INVALID, Preserve;
    R15D = "r15d", 32, 0, R15, INVALID, ZeroExtend;
    R15W = "r15w", 16, 0, R15, INVALID, Preserve;
    R15B = "r15b",  8, 0, R15, INVALID, Preserve;
    RIP  = "rip",  64, 0, RIP, INVALID, Preserve;
    EIP  = "eip",  32, 0, RIP, EIP, ZeroExtend;
    IP   = "ip",   16, 0, RIP, EIP, Preserve;
    AF   = "af",    1, 0, AF, AF, Preserve;
    CF   = "cf",    1, 0, CF, CF, Preserve;
    DF   = "df",    1, 0, DF, DF, Preserve;
    IF   = "if",    1, 0, IF, IF, Preserve;
    OF   = "of",    1, 0, OF, OF, Preserve;
    PF   = "pf",    1, 0, PF, PF, Preserve;
    SF   = "sf",    1, 0, SF, SF, Preserve;
    TF   = "tf",    1, 0, TF, TF, Preserve;
    ZF   = "zf",    1, 0, ZF, ZF, Preserve;
}
