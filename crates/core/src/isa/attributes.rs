//! Static, per-operation metadata the decoder, block discoverer, and
//! interpreter all consult instead of re-deriving the same facts from the
//! raw encoding at every use site.

use super::opcodes::Op;

/// Which half of a descriptor's payload an operation reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// `rs2`/`rs3` plus a 16-bit immediate (register-register forms, AMOs,
    /// branches, stores, R-type ALU ops).
    RegReg,
    /// A single sign-extended 32-bit immediate (`lui`, `auipc`, `jal`,
    /// I-type ALU ops, loads, `jalr`).
    Imm32,
}

/// Whether, and how, an operation ends a basic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockEnd {
    /// Falls through to the next descriptor.
    None,
    /// Conditional branch: block ends here, both successors are reachable.
    Conditional,
    /// Unconditional control transfer (`jal`, `jalr`, `ecall`, `ebreak`):
    /// block ends here, only one successor (if any) is statically known.
    Unconditional,
}

/// Static facts about one [`Op`], looked up once per descriptor.
#[derive(Debug, Clone, Copy)]
pub struct Attributes {
    /// Payload interpretation.
    pub payload: PayloadShape,
    /// Basic-block-ending behavior.
    pub block_end: BlockEnd,
    /// `true` if this operation reads or writes guest memory.
    pub is_memory: bool,
    /// `true` for `ecall`/`ebreak`, which must serialize in the timing
    /// simulators and hand control to the syscall proxy in the interpreter.
    pub is_system: bool,
    /// `true` for the `amo*`/`lr`/`sc`/`cas` family.
    pub is_atomic: bool,
}

const REG_REG: Attributes = Attributes {
    payload: PayloadShape::RegReg,
    block_end: BlockEnd::None,
    is_memory: false,
    is_system: false,
    is_atomic: false,
};

const IMM32: Attributes = Attributes {
    payload: PayloadShape::Imm32,
    ..REG_REG
};

/// Looks up the static attributes for `op`.
#[must_use]
pub fn attributes(op: Op) -> Attributes {
    // The catch-all arm does most of the work; only operations that diverge
    // from "register-register payload, falls through, not memory, not
    // system, not atomic" are listed explicitly.
    match op {
        Op::Zero | Op::Illegal | Op::Unknown => REG_REG,

        Op::Lui | Op::Auipc => IMM32,
        Op::Jal => Attributes {
            payload: PayloadShape::Imm32,
            block_end: BlockEnd::Unconditional,
            ..REG_REG
        },
        Op::Jalr => Attributes {
            payload: PayloadShape::Imm32,
            block_end: BlockEnd::Unconditional,
            ..REG_REG
        },
        Op::Beq | Op::Bne | Op::Blt | Op::Bge | Op::Bltu | Op::Bgeu => Attributes {
            block_end: BlockEnd::Conditional,
            ..REG_REG
        },
        Op::Lb | Op::Lh | Op::Lw | Op::Lbu | Op::Lhu | Op::Lwu | Op::Ld | Op::Flw | Op::Fld => {
            Attributes {
                payload: PayloadShape::Imm32,
                is_memory: true,
                ..REG_REG
            }
        }
        Op::Sb | Op::Sh | Op::Sw | Op::Sd | Op::Fsw | Op::Fsd => Attributes {
            is_memory: true,
            ..REG_REG
        },
        Op::Addi
        | Op::Slti
        | Op::Sltiu
        | Op::Xori
        | Op::Ori
        | Op::Andi
        | Op::Slli
        | Op::Srli
        | Op::Srai
        | Op::Addiw
        | Op::Slliw
        | Op::Srliw
        | Op::Sraiw
        | Op::Csrrw
        | Op::Csrrs
        | Op::Csrrc
        | Op::Csrrwi
        | Op::Csrrsi
        | Op::Csrrci => IMM32,
        Op::Ecall | Op::Ebreak => Attributes {
            block_end: BlockEnd::Unconditional,
            is_system: true,
            ..REG_REG
        },
        Op::LrW | Op::LrD => Attributes {
            payload: PayloadShape::Imm32,
            is_memory: true,
            is_atomic: true,
            ..REG_REG
        },
        Op::ScW
        | Op::ScD
        | Op::AmoswapW
        | Op::AmoaddW
        | Op::AmoxorW
        | Op::AmoandW
        | Op::AmoorW
        | Op::AmominW
        | Op::AmomaxW
        | Op::AmominuW
        | Op::AmomaxuW
        | Op::AmoswapD
        | Op::AmoaddD
        | Op::AmoxorD
        | Op::AmoandD
        | Op::AmoorD
        | Op::AmominD
        | Op::AmomaxD
        | Op::AmominuD
        | Op::AmomaxuD
        | Op::CasW
        | Op::CasD => Attributes {
            is_memory: true,
            is_atomic: true,
            ..REG_REG
        },
        _ => REG_REG,
    }
}
