//! Circuit geometry and column assignments.
//!
//! Everything in this module is ABI: the method id hashes the code bank laid
//! out exactly this way, and the evaluator addresses witness columns by these
//! indices. Renumbering anything changes every program identity.

/// Columns in the code (ROM) bank.
pub const CODE_SIZE: usize = 16;

/// Columns in the data (witness) bank.
pub const DATA_SIZE: usize = 162;

/// Columns in the accumulation bank.
pub const ACCUM_SIZE: usize = 10;

/// Smallest supported trace length.
pub const MIN_CYCLES: usize = 512;

/// log2 of the largest supported trace length.
pub const MAX_CYCLES_PO2: usize = 24;

/// Largest supported trace length.
pub const MAX_CYCLES: usize = 1 << MAX_CYCLES_PO2;

/// Rows at the tail of every trace reserved for blinding. Equals the query
/// count of the outer proof system.
pub const ZK_CYCLES: usize = 50;

/// Bookkeeping rows every execution needs besides the image load:
/// one init, one reset, one fini.
pub const SETUP_CYCLES: usize = 3;

/// Digests in a method id: one per power-of-two cycle count from
/// [`MIN_CYCLES`] up to [`MAX_CYCLES`] inclusive.
pub const CODE_DIGEST_COUNT: usize = MAX_CYCLES_PO2 - MIN_CYCLES_PO2 + 1;

/// log2 of [`MIN_CYCLES`].
pub const MIN_CYCLES_PO2: usize = 9;

/// Arg-bank indices as seen by the evaluator.
pub mod bank {
    pub const CODE: usize = 0;
    pub const ACCUM: usize = 1;
    pub const DATA: usize = 2;
}

/// Cycle types scheduled in the code bank.
///
/// `selector_col` maps a type to its one-hot column; all selectors are zero
/// on the trailing [`ZK_CYCLES`](super::ZK_CYCLES) rows, which is what gates
/// the evaluator off there.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodeCycleType {
    Normal = 0,
    Final,
    Init,
    MemWrite,
    Reset,
    Fini,
}

impl CodeCycleType {
    pub const fn selector_col(self) -> usize {
        code_col::SELECTOR_BASE + self as usize
    }
}

/// Cycle types recorded in the data bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataCycleType {
    Decode = 0,
    Compute0,
    Compute1,
    Compute2,
    Compute3,
    Multiply,
    Divide,
    Final,
    ShaSync,
    ShaControl,
    ShaData,
    Halt,
}

impl DataCycleType {
    pub const fn selector_col(self) -> usize {
        data_col::CYCLE_TYPE_BASE + self as usize
    }
}

/// Code bank columns.
pub mod code_col {
    /// The row's cycle index; doubles as the evaluator's row gate
    /// (row zero has no predecessor to check against).
    pub const CYCLE: usize = 0;
    /// First of six one-hot cycle-type selector columns.
    pub const SELECTOR_BASE: usize = 1;
    pub const SELECTOR_COUNT: usize = 6;
    /// Operand word address: image target for mem-write rows, entry point
    /// for the reset row.
    pub const OPERAND_ADDR: usize = 7;
    /// Operand value, low 16 bits.
    pub const OPERAND_LO: usize = 8;
    /// Operand value, high 16 bits.
    pub const OPERAND_HI: usize = 9;
}

/// Data bank columns.
pub mod data_col {
    /// Sixteen 2-bit limbs of the program counter.
    pub const PC_LIMB_BASE: usize = 0;
    pub const PC_LIMB_COUNT: usize = 16;
    /// Decoded instruction fields (opcode, rd, rs1, rs2, funct3, funct7,
    /// imm lo/hi).
    pub const INSTR_BASE: usize = 16;
    /// Registers x0..x31 as (lo, hi) 16-bit pairs.
    pub const REG_BASE: usize = 30;
    /// Per-cycle memory I/O registers.
    pub const MEMIO_ADDR: usize = 128;
    pub const MEMIO_LO: usize = 129;
    pub const MEMIO_HI: usize = 130;
    pub const MEMIO_IS_WRITE: usize = 131;
    /// First of twelve one-hot data cycle-type columns.
    pub const CYCLE_TYPE_BASE: usize = 132;

    // Memory-consistency holes, written by the evaluator.
    pub const MEMCHECK_ADDR: usize = 144;
    pub const MEMCHECK_VALUE_LO: usize = 145;
    pub const MEMCHECK_VALUE_HI: usize = 146;
    pub const MEMCHECK_IS_WRITE: usize = 147;
    pub const MEMCHECK_CYCLE: usize = 148;
    pub const MEMCHECK_SAME_ADDR: usize = 149;
    pub const MEMCHECK_LIMB_BASE: usize = 150;
    pub const MEMCHECK_LIMB_COUNT: usize = 12;
}
