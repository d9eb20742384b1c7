//! Expands a 16-bit compressed (RVC) parcel into its 32-bit equivalent.
//!
//! Every compressed instruction is defined by the base ISA as exactly
//! equivalent to some 32-bit instruction; this function builds that 32-bit
//! encoding so the rest of the pipeline — [`super::decode::decode`] and
//! everything downstream — never needs to know compression happened. `0` is
//! returned for a handful of hole encodings (e.g. `C.ADDI4SPN` with an
//! all-zero immediate) which are reserved and always illegal.

use super::constants::{q0, q1, q2, QUADRANT_0, QUADRANT_1, QUADRANT_2};

const OP_IMM: u32 = 0x13;
const OP_IMM_32: u32 = 0x1b;
const OP_LOAD: u32 = 0x03;
const OP_LOAD_FP: u32 = 0x07;
const OP_STORE: u32 = 0x23;
const OP_STORE_FP: u32 = 0x27;
const OP_REG: u32 = 0x33;
const OP_REG_32: u32 = 0x3b;
const OP_JAL: u32 = 0x6f;
const OP_JALR: u32 = 0x67;
const OP_LUI: u32 = 0x37;
const OP_BRANCH: u32 = 0x63;

const F3_ADD_SUB: u32 = 0b000;
const F3_SLL: u32 = 0b001;
const F3_SRL_SRA: u32 = 0b101;
const F3_XOR: u32 = 0b100;
const F3_OR: u32 = 0b110;
const F3_AND: u32 = 0b111;
const F3_LW: u32 = 0b010;
const F3_LD: u32 = 0b011;
const F3_SW: u32 = 0b010;
const F3_SD: u32 = 0b011;
const F3_BEQ: u32 = 0b000;
const F3_BNE: u32 = 0b001;

const F7_SUB: u32 = 0b0100000;
const F7_SRA: u32 = 0b0100000;

/// `ebreak`: `imm=1, rs1=0, funct3=0, rd=0, opcode=SYSTEM`.
const EBREAK: u32 = (1 << 20) | 0x73;

/// Expands a 16-bit RVC parcel into its 32-bit equivalent, or `0` (an
/// encoding that can never be produced by a legal expansion) for reserved
/// immediate-zero holes.
#[must_use]
pub fn expand(inst: u16) -> u32 {
    let op = inst & 0x3;
    let funct3 = (inst >> 13) & 0x7;

    match op {
        QUADRANT_0 => expand_q0(inst, funct3),
        QUADRANT_1 => expand_q1(inst, funct3),
        QUADRANT_2 => expand_q2(inst, funct3),
        _ => 0,
    }
}

fn expand_q0(inst: u16, funct3: u16) -> u32 {
    match funct3 {
        q0::C_ADDI4SPN => {
            let imm = ((inst >> 6) & 1) << 2
                | ((inst >> 5) & 1) << 3
                | ((inst >> 11) & 0x3) << 4
                | ((inst >> 7) & 0xF) << 6;
            if imm == 0 {
                return 0;
            }
            let rd = 8 + ((inst >> 2) & 0x7) as u32;
            (u32::from(imm) << 20) | (2 << 15) | (F3_ADD_SUB << 12) | (rd << 7) | OP_IMM
        }
        q0::C_FLD => {
            let imm = ((inst >> 10) & 0x7) << 3 | ((inst >> 5) & 0x3) << 6;
            let rs1 = 8 + ((inst >> 7) & 0x7) as u32;
            let rd = 8 + ((inst >> 2) & 0x7) as u32;
            (u32::from(imm) << 20) | (rs1 << 15) | (F3_LD << 12) | (rd << 7) | OP_LOAD_FP
        }
        q0::C_LW => {
            let imm = ((inst >> 6) & 1) << 2 | ((inst >> 10) & 0x7) << 3 | ((inst >> 5) & 1) << 6;
            let rs1 = 8 + ((inst >> 7) & 0x7) as u32;
            let rd = 8 + ((inst >> 2) & 0x7) as u32;
            (u32::from(imm) << 20) | (rs1 << 15) | (F3_LW << 12) | (rd << 7) | OP_LOAD
        }
        q0::C_LD => {
            let imm = ((inst >> 10) & 0x7) << 3 | ((inst >> 5) & 0x3) << 6;
            let rs1 = 8 + ((inst >> 7) & 0x7) as u32;
            let rd = 8 + ((inst >> 2) & 0x7) as u32;
            (u32::from(imm) << 20) | (rs1 << 15) | (F3_LD << 12) | (rd << 7) | OP_LOAD
        }
        q0::C_FSD => {
            let imm = ((inst >> 10) & 0x7) << 3 | ((inst >> 5) & 0x3) << 6;
            let rs1 = 8 + ((inst >> 7) & 0x7) as u32;
            let rs2 = 8 + ((inst >> 2) & 0x7) as u32;
            store_encoding(imm, rs1, rs2, F3_SD, OP_STORE_FP)
        }
        q0::C_SW => {
            let imm = ((inst >> 6) & 1) << 2 | ((inst >> 10) & 0x7) << 3 | ((inst >> 5) & 1) << 6;
            let rs1 = 8 + ((inst >> 7) & 0x7) as u32;
            let rs2 = 8 + ((inst >> 2) & 0x7) as u32;
            store_encoding(imm, rs1, rs2, F3_SW, OP_STORE)
        }
        q0::C_SD => {
            let imm = ((inst >> 10) & 0x7) << 3 | ((inst >> 5) & 0x3) << 6;
            let rs1 = 8 + ((inst >> 7) & 0x7) as u32;
            let rs2 = 8 + ((inst >> 2) & 0x7) as u32;
            store_encoding(imm, rs1, rs2, F3_SD, OP_STORE)
        }
        _ => 0,
    }
}

fn store_encoding(imm: u16, rs1: u32, rs2: u32, funct3: u32, opcode: u32) -> u32 {
    let imm_low = u32::from(imm) & 0x1F;
    let imm_high = u32::from(imm) >> 5;
    (imm_high << 25) | (rs2 << 20) | (rs1 << 15) | (funct3 << 12) | (imm_low << 7) | opcode
}

fn expand_q1(inst: u16, funct3: u16) -> u32 {
    match funct3 {
        q1::C_ADDI => {
            let imm = sign_extend6(inst);
            let rd = u32::from((inst >> 7) & 0x1F);
            ((imm & 0xFFF) << 20) | (rd << 15) | (F3_ADD_SUB << 12) | (rd << 7) | OP_IMM
        }
        q1::C_ADDIW => {
            let imm = sign_extend6(inst);
            let rd = u32::from((inst >> 7) & 0x1F);
            if rd == 0 {
                return 0;
            }
            ((imm & 0xFFF) << 20) | (rd << 15) | (F3_ADD_SUB << 12) | (rd << 7) | OP_IMM_32
        }
        q1::C_LI => {
            let imm = sign_extend6(inst);
            let rd = u32::from((inst >> 7) & 0x1F);
            ((imm & 0xFFF) << 20) | (F3_ADD_SUB << 12) | (rd << 7) | OP_IMM
        }
        q1::C_LUI_ADDI16SP => expand_lui_addi16sp(inst),
        q1::C_MISC_ALU => expand_misc_alu_q1(inst),
        q1::C_J => {
            let offset = sign_extend(c_j_offset(inst), 12);
            jal_encoding(offset, 0)
        }
        q1::C_BEQZ => branch_encoding(inst, F3_BEQ),
        q1::C_BNEZ => branch_encoding(inst, F3_BNE),
        _ => 0,
    }
}

fn sign_extend6(inst: u16) -> u32 {
    sign_extend(u32::from(((inst >> 2) & 0x1F) | (((inst >> 12) & 1) << 5)), 6)
}

fn c_j_offset(inst: u16) -> u32 {
    u32::from(
        ((inst >> 3) & 0x7) << 1
            | ((inst >> 11) & 1) << 4
            | ((inst >> 2) & 1) << 5
            | ((inst >> 7) & 1) << 6
            | ((inst >> 6) & 1) << 7
            | ((inst >> 9) & 3) << 8
            | ((inst >> 8) & 1) << 10
            | ((inst >> 12) & 1) << 11,
    )
}

fn jal_encoding(offset: u32, rd: u32) -> u32 {
    let imm20 = (offset >> 20) & 1;
    let imm10_1 = (offset >> 1) & 0x3FF;
    let imm11 = (offset >> 11) & 1;
    let imm19_12 = (offset >> 12) & 0xFF;
    (imm20 << 31) | (imm19_12 << 12) | (imm11 << 20) | (imm10_1 << 21) | (rd << 7) | OP_JAL
}

fn branch_offset(inst: u16) -> u32 {
    u32::from(
        ((inst >> 3) & 0x3) << 1
            | ((inst >> 10) & 0x3) << 3
            | ((inst >> 2) & 1) << 5
            | ((inst >> 5) & 0x3) << 6
            | ((inst >> 12) & 1) << 8,
    )
}

fn branch_encoding(inst: u16, funct3: u32) -> u32 {
    let offset = sign_extend(branch_offset(inst), 9);
    let rs1 = 8 + u32::from((inst >> 7) & 0x7);
    let imm12 = (offset >> 12) & 1;
    let imm10_5 = (offset >> 5) & 0x3F;
    let imm4_1 = (offset >> 1) & 0xF;
    let imm11 = (offset >> 11) & 1;
    (imm12 << 31)
        | (imm10_5 << 25)
        | (rs1 << 15)
        | (funct3 << 12)
        | (imm4_1 << 8)
        | (imm11 << 7)
        | OP_BRANCH
}

fn expand_lui_addi16sp(inst: u16) -> u32 {
    let rd = u32::from((inst >> 7) & 0x1F);
    if rd == 2 {
        let imm = sign_extend(
            u32::from(
                ((inst >> 6) & 1) << 4
                    | ((inst >> 2) & 1) << 5
                    | ((inst >> 5) & 1) << 6
                    | ((inst >> 3) & 3) << 7
                    | ((inst >> 12) & 1) << 9,
            ),
            10,
        );
        if imm == 0 {
            return 0;
        }
        ((imm & 0xFFF) << 20) | (2 << 15) | (F3_ADD_SUB << 12) | (2 << 7) | OP_IMM
    } else {
        let imm = sign_extend6(inst);
        if imm == 0 {
            return 0;
        }
        (imm << 12) | (rd << 7) | OP_LUI
    }
}

fn expand_misc_alu_q1(inst: u16) -> u32 {
    let bit12 = u32::from((inst >> 12) & 1);
    let funct2 = (inst >> 10) & 0x3;
    let rd = 8 + u32::from((inst >> 7) & 0x7);
    let imm = sign_extend6(inst);

    match funct2 {
        0 => ((imm & 0x3F) << 20) | (rd << 15) | (F3_SRL_SRA << 12) | (rd << 7) | OP_IMM,
        1 => {
            (F7_SRA << 25) | ((imm & 0x3F) << 20) | (rd << 15) | (F3_SRL_SRA << 12) | (rd << 7) | OP_IMM
        }
        2 => ((imm & 0xFFF) << 20) | (rd << 15) | (F3_AND << 12) | (rd << 7) | OP_IMM,
        _ => {
            let sub_op = (inst >> 5) & 0x3;
            let rs2 = 8 + u32::from((inst >> 2) & 0x7);
            match (bit12, sub_op) {
                (0, 0) => (F7_SUB << 25) | (rs2 << 20) | (rd << 15) | (F3_ADD_SUB << 12) | (rd << 7) | OP_REG,
                (0, 1) => (rs2 << 20) | (rd << 15) | (F3_XOR << 12) | (rd << 7) | OP_REG,
                (0, 2) => (rs2 << 20) | (rd << 15) | (F3_OR << 12) | (rd << 7) | OP_REG,
                (0, 3) => (rs2 << 20) | (rd << 15) | (F3_AND << 12) | (rd << 7) | OP_REG,
                (1, 0) => {
                    (F7_SUB << 25) | (rs2 << 20) | (rd << 15) | (F3_ADD_SUB << 12) | (rd << 7) | OP_REG_32
                }
                (1, 1) => (rs2 << 20) | (rd << 15) | (F3_ADD_SUB << 12) | (rd << 7) | OP_REG_32,
                _ => 0,
            }
        }
    }
}

fn expand_q2(inst: u16, funct3: u16) -> u32 {
    match funct3 {
        q2::C_SLLI => {
            let imm = u32::from(((inst >> 2) & 0x1F) | (((inst >> 12) & 1) << 5));
            let rd = u32::from((inst >> 7) & 0x1F);
            if rd == 0 {
                return 0;
            }
            (imm << 20) | (rd << 15) | (F3_SLL << 12) | (rd << 7) | OP_IMM
        }
        q2::C_FLDSP => {
            let imm = u32::from(
                ((inst >> 12) & 1) << 5 | ((inst >> 5) & 0x3) << 3 | ((inst >> 2) & 0x7) << 6,
            );
            let rd = u32::from((inst >> 7) & 0x1F);
            (imm << 20) | (2 << 15) | (F3_LD << 12) | (rd << 7) | OP_LOAD_FP
        }
        q2::C_LWSP => {
            let imm = u32::from(
                ((inst >> 12) & 1) << 5 | ((inst >> 4) & 0x7) << 2 | ((inst >> 2) & 0x3) << 6,
            );
            let rd = u32::from((inst >> 7) & 0x1F);
            if rd == 0 {
                return 0;
            }
            (imm << 20) | (2 << 15) | (F3_LW << 12) | (rd << 7) | OP_LOAD
        }
        q2::C_LDSP => {
            let imm = u32::from(
                ((inst >> 12) & 1) << 5 | ((inst >> 5) & 0x3) << 3 | ((inst >> 2) & 0x7) << 6,
            );
            let rd = u32::from((inst >> 7) & 0x1F);
            if rd == 0 {
                return 0;
            }
            (imm << 20) | (2 << 15) | (F3_LD << 12) | (rd << 7) | OP_LOAD
        }
        q2::C_MISC_ALU => expand_misc_alu_q2(inst),
        q2::C_FSDSP => {
            let imm = ((inst >> 10) & 0x7) << 3 | ((inst >> 7) & 0x7) << 6;
            let rs2 = u32::from((inst >> 2) & 0x1F);
            store_encoding(imm, 2, rs2, F3_SD, OP_STORE_FP)
        }
        q2::C_SWSP => {
            let imm = ((inst >> 9) & 0xF) << 2 | ((inst >> 7) & 0x3) << 6;
            let rs2 = u32::from((inst >> 2) & 0x1F);
            store_encoding(imm, 2, rs2, F3_SW, OP_STORE)
        }
        q2::C_SDSP => {
            let imm = ((inst >> 10) & 0x7) << 3 | ((inst >> 7) & 0x7) << 6;
            let rs2 = u32::from((inst >> 2) & 0x1F);
            store_encoding(imm, 2, rs2, F3_SD, OP_STORE)
        }
        _ => 0,
    }
}

fn expand_misc_alu_q2(inst: u16) -> u32 {
    let bit12 = (inst >> 12) & 1;
    let rs2 = u32::from((inst >> 2) & 0x1F);
    let rs1 = u32::from((inst >> 7) & 0x1F);
    if bit12 == 0 {
        if rs2 == 0 {
            if rs1 == 0 {
                return 0;
            }
            (rs1 << 15) | (F3_ADD_SUB << 12) | OP_JALR
        } else {
            (rs2 << 20) | (F3_ADD_SUB << 12) | (rs1 << 7) | OP_REG
        }
    } else if rs2 == 0 {
        if rs1 == 0 {
            EBREAK
        } else {
            (rs1 << 15) | (F3_ADD_SUB << 12) | (1 << 7) | OP_JALR
        }
    } else {
        (rs2 << 20) | (rs1 << 15) | (F3_ADD_SUB << 12) | (rs1 << 7) | OP_REG
    }
}

/// Sign-extends a value of `bits` width to 32 bits.
fn sign_extend(val: u32, bits: u32) -> u32 {
    let shift = 32 - bits;
    ((val << shift) as i32 >> shift) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c_nop_expands_to_addi_x0_x0_0() {
        // c.nop = c.addi x0, 0 -> 0x0001
        let raw = expand(0x0001);
        assert_eq!(raw, OP_IMM);
    }

    #[test]
    fn c_li_expands_with_sign_extended_immediate() {
        // c.li x1, -1 : funct3=010, imm bits all set, rd=1
        let inst: u16 = (0b010 << 13) | (1 << 12) | (0x1F << 2) | (1 << 7) | 0b01;
        let raw = expand(inst);
        assert_eq!(raw & 0x7f, OP_IMM);
        let imm = (raw as i32) >> 20;
        assert_eq!(imm, -1);
    }

    #[test]
    fn c_ebreak_expands_exactly() {
        // c.ebreak: funct3=100, bit12=1, rs1=0, rs2=0, quadrant 2
        let inst: u16 = (0b100 << 13) | (1 << 12) | 0b10;
        assert_eq!(expand(inst), EBREAK);
    }

    #[test]
    fn reserved_addi4spn_zero_immediate_is_a_hole() {
        let inst: u16 = 0b00; // quadrant 0, funct3 0, all immediate bits 0
        assert_eq!(expand(inst), 0);
    }
}
