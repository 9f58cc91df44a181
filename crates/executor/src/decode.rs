//! RV32IM instruction decoding.

use serde::{Deserialize, Serialize};

/// Opcode constants for RV32I.
pub mod opcode {
    pub const LUI: u8 = 0b0110111;
    pub const AUIPC: u8 = 0b0010111;
    pub const JAL: u8 = 0b1101111;
    pub const JALR: u8 = 0b1100111;
    pub const BRANCH: u8 = 0b1100011;
    pub const LOAD: u8 = 0b0000011;
    pub const STORE: u8 = 0b0100011;
    pub const OP_IMM: u8 = 0b0010011;
    pub const OP: u8 = 0b0110011;
    pub const SYSTEM: u8 = 0b1110011;
    pub const MISC_MEM: u8 = 0b0001111;
}

pub mod branch_funct3 {
    pub const BEQ: u8 = 0b000;
    pub const BNE: u8 = 0b001;
    pub const BLT: u8 = 0b100;
    pub const BGE: u8 = 0b101;
    pub const BLTU: u8 = 0b110;
    pub const BGEU: u8 = 0b111;
}

pub mod load_funct3 {
    pub const LB: u8 = 0b000;
    pub const LH: u8 = 0b001;
    pub const LW: u8 = 0b010;
    pub const LBU: u8 = 0b100;
    pub const LHU: u8 = 0b101;
}

pub mod store_funct3 {
    pub const SB: u8 = 0b000;
    pub const SH: u8 = 0b001;
    pub const SW: u8 = 0b010;
}

pub mod op_funct3 {
    pub const ADD_SUB: u8 = 0b000;
    pub const SLL: u8 = 0b001;
    pub const SLT: u8 = 0b010;
    pub const SLTU: u8 = 0b011;
    pub const XOR: u8 = 0b100;
    pub const SRL_SRA: u8 = 0b101;
    pub const OR: u8 = 0b110;
    pub const AND: u8 = 0b111;
}

pub mod mul_funct3 {
    pub const MUL: u8 = 0b000;
    pub const MULH: u8 = 0b001;
    pub const MULHSU: u8 = 0b010;
    pub const MULHU: u8 = 0b011;
    pub const DIV: u8 = 0b100;
    pub const DIVU: u8 = 0b101;
    pub const REM: u8 = 0b110;
    pub const REMU: u8 = 0b111;
}

/// A decoded RISC-V instruction with its sign-extended immediate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedInstr {
    pub bits: u32,
    pub opcode: u8,
    pub rd: u8,
    pub funct3: u8,
    pub rs1: u8,
    pub rs2: u8,
    pub funct7: u8,
    pub imm: i32,
}

impl DecodedInstr {
    /// Decode a 32-bit instruction word. The immediate is extracted and
    /// sign-extended according to the opcode's format; opcodes without an
    /// immediate decode it as zero.
    pub fn decode(bits: u32) -> Self {
        let opcode = (bits & 0x7f) as u8;
        let rd = ((bits >> 7) & 0x1f) as u8;
        let funct3 = ((bits >> 12) & 0x7) as u8;
        let rs1 = ((bits >> 15) & 0x1f) as u8;
        let rs2 = ((bits >> 20) & 0x1f) as u8;
        let funct7 = ((bits >> 25) & 0x7f) as u8;

        let imm = match opcode {
            // U-type: imm[31:12]
            opcode::LUI | opcode::AUIPC => (bits & 0xffff_f000) as i32,
            // J-type: imm[20|10:1|11|19:12], sign-extended from bit 20
            opcode::JAL => {
                let imm = (((bits >> 31) & 1) << 20)
                    | (((bits >> 12) & 0xff) << 12)
                    | (((bits >> 20) & 1) << 11)
                    | (((bits >> 21) & 0x3ff) << 1);
                ((imm as i32) << 11) >> 11
            }
            // I-type: imm[11:0]
            opcode::JALR | opcode::LOAD | opcode::OP_IMM | opcode::SYSTEM => (bits as i32) >> 20,
            // B-type: imm[12|10:5|4:1|11], sign-extended from bit 12
            opcode::BRANCH => {
                let imm = (((bits >> 31) & 1) << 12)
                    | (((bits >> 7) & 1) << 11)
                    | (((bits >> 25) & 0x3f) << 5)
                    | (((bits >> 8) & 0xf) << 1);
                ((imm as i32) << 19) >> 19
            }
            // S-type: imm[11:5|4:0], sign-extended from bit 11
            opcode::STORE => {
                let imm = (((bits >> 25) & 0x7f) << 5) | ((bits >> 7) & 0x1f);
                ((imm as i32) << 20) >> 20
            }
            _ => 0,
        };

        Self { bits, opcode, rd, funct3, rs1, rs2, funct7, imm }
    }

    /// Shift amount for immediate shifts (imm[4:0]).
    #[inline]
    pub fn shamt(&self) -> u32 {
        (self.imm as u32) & 0x1f
    }

    /// True for M-extension multiply/divide instructions.
    #[inline]
    pub fn is_m_extension(&self) -> bool {
        self.opcode == opcode::OP && self.funct7 == 0x01
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_add() {
        // add x1, x2, x3
        let instr = DecodedInstr::decode(0x003100b3);
        assert_eq!(instr.opcode, opcode::OP);
        assert_eq!(instr.rd, 1);
        assert_eq!(instr.rs1, 2);
        assert_eq!(instr.rs2, 3);
        assert_eq!(instr.funct3, 0);
        assert_eq!(instr.funct7, 0);
    }

    #[test]
    fn test_decode_addi() {
        // addi x1, x2, 100
        let instr = DecodedInstr::decode(0x06410093);
        assert_eq!(instr.opcode, opcode::OP_IMM);
        assert_eq!(instr.imm, 100);
    }

    #[test]
    fn test_decode_negative_imm() {
        // addi x1, x0, -1
        let instr = DecodedInstr::decode(0xfff00093);
        assert_eq!(instr.imm, -1);
    }

    #[test]
    fn test_decode_lui() {
        // lui x1, 0x12345
        let instr = DecodedInstr::decode(0x123450b7);
        assert_eq!(instr.opcode, opcode::LUI);
        assert_eq!(instr.imm, 0x12345000u32 as i32);
    }

    #[test]
    fn test_decode_jal_negative_offset() {
        // jal x0, -8
        let instr = DecodedInstr::decode(0xff9ff06f);
        assert_eq!(instr.opcode, opcode::JAL);
        assert_eq!(instr.imm, -8);
    }

    #[test]
    fn test_decode_branch_offset() {
        // beq x1, x2, +8
        let instr = DecodedInstr::decode(0x00208463);
        assert_eq!(instr.opcode, opcode::BRANCH);
        assert_eq!(instr.funct3, branch_funct3::BEQ);
        assert_eq!(instr.imm, 8);
    }

    #[test]
    fn test_decode_store_offset() {
        // sw x2, -4(x1)
        let instr = DecodedInstr::decode(0xfe20ae23);
        assert_eq!(instr.opcode, opcode::STORE);
        assert_eq!(instr.funct3, store_funct3::SW);
        assert_eq!(instr.imm, -4);
    }

    #[test]
    fn test_m_extension_detection() {
        // mul x1, x2, x3
        let instr = DecodedInstr::decode(0x023100b3);
        assert!(instr.is_m_extension());
        assert_eq!(instr.funct3, mul_funct3::MUL);
    }
}
