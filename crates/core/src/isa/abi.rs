//! RISC-V ABI register names and the descriptor sentinels built on top of
//! them.
//!
//! Defines the standard calling-convention register indices plus the two
//! out-of-band register encodings the strand interpreter and translation
//! cache rely on: `ZERO`, hardwired to the constant `0`, and `NOREG`, which
//! marks an operand slot an instruction does not use.

/// Register x0 (zero register, always reads as zero).
pub const REG_ZERO: u8 = 0;
/// Register x1 (return address, `ra`).
pub const REG_RA: u8 = 1;
/// Register x2 (stack pointer, `sp`).
pub const REG_SP: u8 = 2;
/// Register x3 (global pointer, `gp`).
pub const REG_GP: u8 = 3;
/// Register x4 (thread pointer, `tp`).
pub const REG_TP: u8 = 4;
/// Register x10 (first argument/return value, `a0`).
pub const REG_A0: u8 = 10;
/// Register x11 (second argument, `a1`).
pub const REG_A1: u8 = 11;
/// Register x12 (third argument, `a2`).
pub const REG_A2: u8 = 12;
/// Register x13 (fourth argument, `a3`).
pub const REG_A3: u8 = 13;
/// Register x14 (fifth argument, `a4`).
pub const REG_A4: u8 = 14;
/// Register x15 (sixth argument, `a5`).
pub const REG_A5: u8 = 15;
/// Register x17 (system call number, `a7`).
pub const REG_A7: u8 = 17;

/// Marks an operand slot a descriptor does not use. Reading it from the
/// register file is equivalent to reading `x0`; the interpreter never
/// writes to it.
pub const NOREG: u8 = 255;
