//! AArch64 registers. W registers are the low halves of X registers and writes to them
//! zero the upper half. XZR and WZR read as zero and discard writes.

use super::{RegisterId, INVALID};

register_table! {
    REGISTERS, super::AARCH64_BASE;
    X0  = "x0",  64, 0, X0, INVALID, Preserve;
    X1  = "x1",  64, 0, X1, INVALID, Preserve;
    X2  = "x2",  64, 0, X2, INVALID, Preserve;
    X3  = "x3",  64, 0, X3, INVALID, Preserve;
    X4  = "x4",  64, 0, X4, INVALID, Preserve;
    X5  = "x5",  64, 0, X5, INVALID, Preserve;
    X6  = "x6",  64, 0, X6, INVALID, Preserve;
    X7  = "x7",  64, 0, X7, INVALID, Preserve;
    X8  = "x8",  64, 0, X8, INVALID, Preserve;
    X9  = "x9",  64, 0, X9, INVALID, Preserve;
    X10 = "x10", 64, 0, X10, INVALID, Preserve;
    X11 = "x11", 64, 0, X11, INVALID, Preserve;
    X12 = "x12", 64, 0, X12, INVALID, Preserve;
    X13 = "x13", 64, 0, X13, INVALID, Preserve;
    X14 = "x14", 64, 0, X14, INVALID, Preserve;
    X15 = "x15", 64, 0, X15, INVALID, Preserve;
    X16 = "x16", 64, 0, X16, INVALID, Preserve;
    X17 = "x17", 64, 0, X17, INVALID, Preserve;
    X18 = "x18", 64, 0, X18, INVALID, Preserve;
    X19 = "x19", 64, 0, X19, INVALID, Preserve;
    X20 = "x20", 64, 0, X20, INVALID, Preserve;
    X21 = "x21", 64, 0, X21, INVALID, Preserve;
    X22 = "x22", 64, 0, X22, INVALID, Preserve;
    X23 = "x23", 64, 0, X23, INVALID, Preserve;
    X24 = "x24", 64, 0, X24, INVALID, Preserve;
    X25 = "x25", 64, 0, X25, INVALID, Preserve;
    X26 = "x26", 64, 0, X26, INVALID, Preserve;
    X27 = "x27", 64, 0, X27, INVALID, Preserve;
    X28 = "x28", 64, 0, X28, INVALID, Preserve;
    X29 = "x29", 64, 0, X29, INVALID, Preserve;
    X30 = "x30", 64, 0, X30, INVALID, Preserve;
    W0  = "w0",  32, 0, X0, INVALID, ZeroExtend;
    W1  = "w1",  32, 0, X1, INVALID, ZeroExtend;
    W2  = "w2",  32, 0, X2, INVALID, ZeroExtend;
    W3  = "w3",  32, 0, X3, INVALID, ZeroExtend;
    W4  = "w4",  32, 0, X4, INVALID, ZeroExtend;
    W5  = "w5",  32, 0, X5, INVALID, ZeroExtend;
    W6  = "w6",  32, 0, X6, INVALID, ZeroExtend;
    W7  = "w7",  32, 0, X7, INVALID, ZeroExtend;
    W8  = "w8",  32, 0, X8, INVALID, ZeroExtend;
    W9  = "w9",  32, 0, X9, INVALID, ZeroExtend;
    W10 = "w10", 32, 0, X10, INVALID, ZeroExtend;
    W11 = "w11", 32, 0, X11, INVALID, ZeroExtend;
    W12 = "w12", 32, 0, X12, INVALID, ZeroExtend;
    W13 = "w13", 32, 0, X13, INVALID, ZeroExtend;
    W14 = "w14", 32, 0, X14, INVALID, ZeroExtend;
    W15 = "w15", 32, 0, X15, INVALID, ZeroExtend;
    W16 = "w16", 32, 0, X16, INVALID, ZeroExtend;
    W17 = "w17", 32, 0, X17, INVALID, ZeroExtend;
    W18 = "w18", 32, 0, X18, INVALID, ZeroExtend;
    W19 = "w19", 32, 0, X19, INVALID, ZeroExtend;
    W20 = "w20", 32, 0, X20, INVALID, ZeroExtend;
    W21 = "w21", 32, 0, X21, INVALID, ZeroExtend;
    W22 = "w22", 32, 0, X22, INVALID, ZeroExtend;
    W23 = "w23", 32, 0, X23, INVALID, ZeroExtend;
    W24 = "w24", 32, 0, X24, INVALID, ZeroExtend;
    W25 = "w25", 32, 0, X25, INVALID, ZeroExtend;
    W26 = "w26", 32, 0, X26, INVALID, ZeroExtend;
    W27 = "w27", 32, 0, X27, INVALID, ZeroExtend;
    W28 = "w28", 32, 0, X28, INVALID, ZeroExtend;
    W29 = "w29", 32, 0, X29, INVALID, ZeroExtend;
    W30 = "w30", 32, 0, X30, INVALID, ZeroExtend;
    SP  = "sp",  64, 0, SP, INVALID, Preserve;
    WSP = "wsp", 32, 0, SP, INVALID, ZeroExtend;
    XZR = "xzr", 64, 0, XZR, INVALID, Preserve;
    WZR = "wzr", 32, 0, XZR, INVALID, ZeroExtend;
    PC  = "pc",  64, 0, PC, INVALID, Preserve;
    N   = "n",    1, 0, N, INVALID, Preserve;
    Z   = "z",    1, 0, Z, INVALID, Preserve;
    C   = "c",    1, 0, C, INVALID, Preserve;
    V   = "v",    1, 0, V, INVALID, Preserve;
}

/// Registers which read as zero and ignore writes.
pub fn is_zero_register(id: RegisterId) -> bool {
    id == XZR || id == WZR
}
