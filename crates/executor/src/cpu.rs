//! RV32IM CPU: single-instruction stepping against sparse memory.
//!
//! The CPU implements the full RV32I base plus the M extension, machine
//! mode only: no CSRs, no interrupts, no MMU. x0 is hardwired to zero,
//! alignment is strict, and every step reports the one data-memory access
//! it performed (if any) so the engine can account for it in the trace.
//!
//! ECALL and EBREAK halt the machine; guests normally stop through the
//! HALT GPIO port instead, but both paths are clean halts.

use serde::{Deserialize, Serialize};

use crate::decode::{
    branch_funct3, load_funct3, mul_funct3, op_funct3, opcode, store_funct3, DecodedInstr,
};
use crate::error::ExecutorError;
use crate::memory::MemoryState;

/// Broad instruction class; decides how many trace rows a step occupies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstrClass {
    /// Arithmetic, logic, jumps, branches, fences: one row.
    Compute,
    /// Loads and stores: an extra row for the data access.
    Load,
    Store,
    /// M-extension: an extra multiply/divide row.
    Multiply,
    Divide,
    /// ECALL / EBREAK: halts the machine.
    System,
}

/// The single word-granular data access an instruction performed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemAccess {
    /// 4-aligned byte address of the word carrying the access.
    pub addr: u32,
    /// The word value after the access.
    pub value: u32,
    pub is_write: bool,
}

/// Everything the engine needs to know about one executed instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepEffect {
    /// Address the instruction was fetched from.
    pub pc: u32,
    /// The raw instruction word.
    pub bits: u32,
    pub next_pc: u32,
    pub instr: DecodedInstr,
    pub class: InstrClass,
    /// The data access, if the instruction touched memory.
    pub access: Option<MemAccess>,
}

/// CPU register state.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// General-purpose registers x0..x31; x0 stays zero.
    pub regs: [u32; 32],
    pub pc: u32,
}

impl Cpu {
    pub fn new(pc: u32) -> Self {
        Self { regs: [0; 32], pc }
    }

    #[inline]
    fn set_reg(&mut self, rd: u8, val: u32) {
        if rd != 0 {
            self.regs[rd as usize] = val;
        }
    }

    #[inline]
    fn reg(&self, rs: u8) -> u32 {
        self.regs[rs as usize]
    }

    /// Fetch, decode, and execute one instruction.
    pub fn step(&mut self, mem: &mut MemoryState) -> Result<StepEffect, ExecutorError> {
        let pc = self.pc;
        let bits = mem.load(pc)?;
        let instr = DecodedInstr::decode(bits);

        let mut next_pc = pc.wrapping_add(4);
        let mut class = InstrClass::Compute;
        let mut access = None;

        match instr.opcode {
            opcode::LUI => {
                self.set_reg(instr.rd, instr.imm as u32);
            }
            opcode::AUIPC => {
                self.set_reg(instr.rd, pc.wrapping_add(instr.imm as u32));
            }
            opcode::JAL => {
                self.set_reg(instr.rd, pc.wrapping_add(4));
                next_pc = pc.wrapping_add(instr.imm as u32);
            }
            opcode::JALR => {
                let base = self.reg(instr.rs1);
                self.set_reg(instr.rd, pc.wrapping_add(4));
                next_pc = base.wrapping_add(instr.imm as u32) & !1;
            }
            opcode::BRANCH => {
                let lhs = self.reg(instr.rs1);
                let rhs = self.reg(instr.rs2);
                let taken = match instr.funct3 {
                    branch_funct3::BEQ => lhs == rhs,
                    branch_funct3::BNE => lhs != rhs,
                    branch_funct3::BLT => (lhs as i32) < (rhs as i32),
                    branch_funct3::BGE => (lhs as i32) >= (rhs as i32),
                    branch_funct3::BLTU => lhs < rhs,
                    branch_funct3::BGEU => lhs >= rhs,
                    _ => return Err(ExecutorError::InvalidInstruction { pc, bits }),
                };
                if taken {
                    next_pc = pc.wrapping_add(instr.imm as u32);
                }
            }
            opcode::LOAD => {
                class = InstrClass::Load;
                let addr = self.reg(instr.rs1).wrapping_add(instr.imm as u32);
                let val = match instr.funct3 {
                    load_funct3::LB => mem.load_u8(addr)? as i8 as i32 as u32,
                    load_funct3::LBU => mem.load_u8(addr)? as u32,
                    load_funct3::LH => mem.load_u16(addr)? as i16 as i32 as u32,
                    load_funct3::LHU => mem.load_u16(addr)? as u32,
                    load_funct3::LW => mem.load(addr)?,
                    _ => return Err(ExecutorError::InvalidInstruction { pc, bits }),
                };
                self.set_reg(instr.rd, val);
                access = Some(MemAccess {
                    addr: addr & !3,
                    value: mem.load(addr & !3)?,
                    is_write: false,
                });
            }
            opcode::STORE => {
                class = InstrClass::Store;
                let addr = self.reg(instr.rs1).wrapping_add(instr.imm as u32);
                let val = self.reg(instr.rs2);
                let word = match instr.funct3 {
                    store_funct3::SB => mem.store_u8(addr, val as u8)?,
                    store_funct3::SH => mem.store_u16(addr, val as u16)?,
                    store_funct3::SW => {
                        mem.store(addr, val)?;
                        val
                    }
                    _ => return Err(ExecutorError::InvalidInstruction { pc, bits }),
                };
                access = Some(MemAccess { addr: addr & !3, value: word, is_write: true });
            }
            opcode::OP_IMM => {
                let lhs = self.reg(instr.rs1);
                let imm = instr.imm as u32;
                let val = match instr.funct3 {
                    op_funct3::ADD_SUB => lhs.wrapping_add(imm),
                    op_funct3::SLT => ((lhs as i32) < instr.imm) as u32,
                    op_funct3::SLTU => (lhs < imm) as u32,
                    op_funct3::XOR => lhs ^ imm,
                    op_funct3::OR => lhs | imm,
                    op_funct3::AND => lhs & imm,
                    op_funct3::SLL => lhs << instr.shamt(),
                    op_funct3::SRL_SRA => {
                        if instr.funct7 & 0x20 != 0 {
                            ((lhs as i32) >> instr.shamt()) as u32
                        } else {
                            lhs >> instr.shamt()
                        }
                    }
                    _ => return Err(ExecutorError::InvalidInstruction { pc, bits }),
                };
                self.set_reg(instr.rd, val);
            }
            opcode::OP if instr.is_m_extension() => {
                let lhs = self.reg(instr.rs1);
                let rhs = self.reg(instr.rs2);
                let val = match instr.funct3 {
                    mul_funct3::MUL => {
                        class = InstrClass::Multiply;
                        lhs.wrapping_mul(rhs)
                    }
                    mul_funct3::MULH => {
                        class = InstrClass::Multiply;
                        ((lhs as i32 as i64).wrapping_mul(rhs as i32 as i64) >> 32) as u32
                    }
                    mul_funct3::MULHSU => {
                        class = InstrClass::Multiply;
                        // signed rs1 * unsigned rs2
                        ((lhs as i32 as i64).wrapping_mul(rhs as i64) >> 32) as u32
                    }
                    mul_funct3::MULHU => {
                        class = InstrClass::Multiply;
                        ((lhs as u64 * rhs as u64) >> 32) as u32
                    }
                    mul_funct3::DIV => {
                        class = InstrClass::Divide;
                        if rhs == 0 {
                            u32::MAX
                        } else if lhs == i32::MIN as u32 && rhs == u32::MAX {
                            lhs
                        } else {
                            ((lhs as i32) / (rhs as i32)) as u32
                        }
                    }
                    mul_funct3::DIVU => {
                        class = InstrClass::Divide;
                        if rhs == 0 {
                            u32::MAX
                        } else {
                            lhs / rhs
                        }
                    }
                    mul_funct3::REM => {
                        class = InstrClass::Divide;
                        if rhs == 0 {
                            lhs
                        } else if lhs == i32::MIN as u32 && rhs == u32::MAX {
                            0
                        } else {
                            ((lhs as i32) % (rhs as i32)) as u32
                        }
                    }
                    mul_funct3::REMU => {
                        class = InstrClass::Divide;
                        if rhs == 0 {
                            lhs
                        } else {
                            lhs % rhs
                        }
                    }
                    _ => return Err(ExecutorError::InvalidInstruction { pc, bits }),
                };
                self.set_reg(instr.rd, val);
            }
            opcode::OP => {
                let lhs = self.reg(instr.rs1);
                let rhs = self.reg(instr.rs2);
                let val = match instr.funct3 {
                    op_funct3::ADD_SUB => {
                        if instr.funct7 & 0x20 != 0 {
                            lhs.wrapping_sub(rhs)
                        } else {
                            lhs.wrapping_add(rhs)
                        }
                    }
                    op_funct3::SLL => lhs << (rhs & 0x1f),
                    op_funct3::SLT => ((lhs as i32) < (rhs as i32)) as u32,
                    op_funct3::SLTU => (lhs < rhs) as u32,
                    op_funct3::XOR => lhs ^ rhs,
                    op_funct3::SRL_SRA => {
                        if instr.funct7 & 0x20 != 0 {
                            ((lhs as i32) >> (rhs & 0x1f)) as u32
                        } else {
                            lhs >> (rhs & 0x1f)
                        }
                    }
                    op_funct3::OR => lhs | rhs,
                    op_funct3::AND => lhs & rhs,
                    _ => return Err(ExecutorError::InvalidInstruction { pc, bits }),
                };
                self.set_reg(instr.rd, val);
            }
            opcode::MISC_MEM => {
                // FENCE / FENCE.I: no-op on a single-threaded machine.
            }
            opcode::SYSTEM => {
                class = InstrClass::System;
            }
            _ => return Err(ExecutorError::InvalidInstruction { pc, bits }),
        }

        self.pc = next_pc;
        Ok(StepEffect { pc, bits, next_pc, instr, class, access })
    }
}
