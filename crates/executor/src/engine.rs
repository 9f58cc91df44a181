//! The execution engine: runs a guest to a power-of-two trace.
//!
//! The engine turns an ELF image plus a host I/O handler into the witness
//! banks the prover commits to. Every active trace row carries exactly one
//! memory event; the memory-consistency gate leans on that invariant, so
//! the row schedule is rigid:
//!
//! - row 0: init (clears word 0)
//! - one mem-write row per image word, ascending address
//! - a reset row (PC takes the entry point)
//! - decode/compute rows, one instruction at a time
//! - halt rows padding out to the fini row
//! - the fini row, followed by the blinding tail
//!
//! When the cursor nears the fini row the whole trace doubles in place,
//! up to the configured maximum.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use rvzk_air::code::{required_cycles, setup_code};
use rvzk_air::consts::{data_col, DataCycleType, DATA_SIZE, MIN_CYCLES, ZK_CYCLES};
use rvzk_air::MemEvent;
use rvzk_primitives::Fp;

use crate::cpu::{Cpu, InstrClass, MemAccess, StepEffect};
use crate::elf::load_elf;
use crate::error::ExecutorError;
use crate::memory::MemoryState;
use crate::platform::{
    COMMIT, GPIO_COMMIT, GPIO_HALT, GPIO_OUTPUT, MEM_SIZE, OUTPUT,
};
use crate::trace::{expand_columns, Trace};

/// Named keys the guest may ask the host for.
pub type KeyStore = HashMap<String, Vec<u8>>;

/// Host-side I/O: the engine calls out through this during a run.
pub trait IoHandler {
    /// Stage the input region before the first cycle.
    fn on_init(&mut self, mem: &mut MemoryState) -> Result<(), ExecutorError>;

    /// Absorb bytes the guest pushed through the output port.
    fn on_write(&mut self, bytes: &[u8]) -> Result<(), ExecutorError>;

    /// Absorb bytes the guest committed to the journal.
    fn on_commit(&mut self, bytes: &[u8]) -> Result<(), ExecutorError>;

    /// Keys for sealed-key operations inside the guest.
    fn key_store(&mut self) -> &mut KeyStore;
}

/// The finished run: banks sized to the final cycle count plus the raw
/// memory events for the consistency sweep.
#[derive(Debug)]
pub struct Execution {
    pub trace: Trace,
    pub events: Vec<MemEvent>,
    /// Instructions the guest actually executed.
    pub user_cycles: usize,
}

impl Execution {
    pub fn cycles(&self) -> usize {
        self.trace.cycles
    }

    pub fn po2(&self) -> usize {
        self.trace.po2()
    }
}

/// Execute an ELF under the given host handler.
///
/// `max_cycles` caps trace growth; [`ExecutorError::MaxCycles`] if the run
/// cannot fit.
pub fn execute_elf(
    elf: &[u8],
    io: &mut dyn IoHandler,
    max_cycles: usize,
) -> Result<Execution, ExecutorError> {
    let (entry, image) = load_elf(elf, MEM_SIZE)?;
    let cycles = required_cycles(image.len())
        .next_power_of_two()
        .max(MIN_CYCLES);
    if cycles > max_cycles {
        return Err(ExecutorError::MaxCycles { cycles });
    }
    debug!(image_words = image.len(), cycles, "engine init");

    let mut engine = Engine {
        io,
        entry,
        image,
        mem: MemoryState::new(),
        cpu: Cpu::new(0),
        cycles,
        max_cycles,
        cur: 0,
        data: vec![Fp::ZERO; DATA_SIZE * cycles],
        events: Vec::new(),
        output_cursor: 0,
        commit_cursor: 0,
        halted: false,
        user_cycles: 0,
    };
    engine.run()
}

struct Engine<'a> {
    io: &'a mut dyn IoHandler,
    entry: u32,
    image: BTreeMap<u32, u32>,
    mem: MemoryState,
    cpu: Cpu,
    cycles: usize,
    max_cycles: usize,
    cur: usize,
    data: Vec<Fp>,
    events: Vec<MemEvent>,
    output_cursor: u32,
    commit_cursor: u32,
    halted: bool,
    user_cycles: usize,
}

impl Engine<'_> {
    fn run(mut self) -> Result<Execution, ExecutorError> {
        self.io.on_init(&mut self.mem)?;

        // Init row: pin word zero so later bookkeeping reads have a writer.
        self.mem.store(0, 0)?;
        self.emit_row(None, 0, None, MemEvent {
            cycle: self.cur as u32,
            addr: 0,
            is_write: true,
            value: 0,
        });

        // The image lands one word per row, in address order, matching the
        // mem-write rows of the code bank.
        let image = std::mem::take(&mut self.image);
        for (&addr, &word) in &image {
            self.mem.store(addr, word)?;
            self.emit_row(None, 0, None, MemEvent {
                cycle: self.cur as u32,
                addr: addr / 4,
                is_write: true,
                value: word,
            });
        }
        self.image = image;

        // Reset row: control transfers to the guest.
        self.cpu = Cpu::new(self.entry);
        self.emit_row(None, self.entry, None, self.read_word_event(0)?);

        // Normal execution.
        while !self.halted {
            self.ensure_capacity()?;
            let effect = self.cpu.step(&mut self.mem)?;
            self.user_cycles += 1;

            self.emit_row(
                Some(DataCycleType::Decode),
                effect.pc,
                Some(&effect),
                MemEvent {
                    cycle: self.cur as u32,
                    addr: effect.pc / 4,
                    is_write: false,
                    value: effect.bits,
                },
            );

            match effect.class {
                InstrClass::Load | InstrClass::Store => {
                    let access = effect.access.ok_or_else(|| {
                        ExecutorError::InvalidInstruction { pc: effect.pc, bits: effect.bits }
                    })?;
                    self.emit_row(
                        Some(DataCycleType::Compute0),
                        effect.pc,
                        Some(&effect),
                        MemEvent {
                            cycle: self.cur as u32,
                            addr: access.addr / 4,
                            is_write: access.is_write,
                            value: access.value,
                        },
                    );
                    if access.is_write {
                        self.handle_gpio(&access)?;
                    }
                }
                InstrClass::Multiply => {
                    let event = self.reread_instr_event(&effect);
                    self.emit_row(Some(DataCycleType::Multiply), effect.pc, Some(&effect), event);
                }
                InstrClass::Divide => {
                    let event = self.reread_instr_event(&effect);
                    self.emit_row(Some(DataCycleType::Divide), effect.pc, Some(&effect), event);
                }
                InstrClass::System => {
                    debug!(pc = effect.pc, "guest ecall halt");
                    self.halted = true;
                }
                InstrClass::Compute => {}
            }
        }

        // Pad with halt rows, then the fini row closes the active region.
        let fini_row = self.cycles - ZK_CYCLES - 1;
        while self.cur < fini_row {
            let event = self.read_word_event(0)?;
            self.emit_row(Some(DataCycleType::Halt), self.cpu.pc, None, event);
        }
        let event = self.read_word_event(0)?;
        self.emit_row(None, self.cpu.pc, None, event);

        debug_assert_eq!(self.cur, self.cycles - ZK_CYCLES);
        debug_assert_eq!(self.events.len(), self.cycles - ZK_CYCLES);
        debug!(
            user_cycles = self.user_cycles,
            cycles = self.cycles,
            "execution complete"
        );

        let mut trace = Trace::new(self.cycles);
        setup_code(&mut trace.code, self.cycles, self.entry, &self.image);
        trace.data = self.data;
        Ok(Execution { trace, events: self.events, user_cycles: self.user_cycles })
    }

    /// A read event of the word at `addr` reflecting current memory.
    fn read_word_event(&self, addr: u32) -> Result<MemEvent, ExecutorError> {
        Ok(MemEvent {
            cycle: self.cur as u32,
            addr: addr / 4,
            is_write: false,
            value: self.mem.load(addr & !3)?,
        })
    }

    /// M-extension rows re-fetch their instruction word.
    fn reread_instr_event(&self, effect: &StepEffect) -> MemEvent {
        MemEvent {
            cycle: self.cur as u32,
            addr: effect.pc / 4,
            is_write: false,
            value: effect.bits,
        }
    }

    /// Double the trace when the cursor nears the fini row.
    fn ensure_capacity(&mut self) -> Result<(), ExecutorError> {
        while self.cur + 3 >= self.cycles - 1 - ZK_CYCLES {
            if self.cycles * 2 > self.max_cycles {
                return Err(ExecutorError::MaxCycles { cycles: self.cycles * 2 });
            }
            debug!(from = self.cycles, to = self.cycles * 2, "expanding trace");
            self.data = expand_columns(&self.data, self.cycles, self.cur);
            self.cycles *= 2;
        }
        Ok(())
    }

    /// Write one data-bank row at the cursor and record its memory event.
    fn emit_row(
        &mut self,
        ty: Option<DataCycleType>,
        pc: u32,
        effect: Option<&StepEffect>,
        event: MemEvent,
    ) {
        let cycles = self.cycles;
        let row = self.cur;
        let data = &mut self.data;
        let mut set = |col: usize, val: Fp| data[col * cycles + row] = val;

        // PC as sixteen 2-bit limbs.
        for limb in 0..data_col::PC_LIMB_COUNT {
            set(data_col::PC_LIMB_BASE + limb, Fp::new((pc >> (2 * limb)) & 3));
        }

        if let Some(effect) = effect {
            let instr = &effect.instr;
            let imm = instr.imm as u32;
            let fields = [
                instr.opcode as u32,
                instr.rd as u32,
                instr.rs1 as u32,
                instr.rs2 as u32,
                instr.funct3 as u32,
                instr.funct7 as u32,
                imm & 0xffff,
                imm >> 16,
            ];
            for (i, &field) in fields.iter().enumerate() {
                set(data_col::INSTR_BASE + i, Fp::new(field));
            }
        }

        // Post-instruction register file as 16-bit halves.
        for (i, &reg) in self.cpu.regs.iter().enumerate() {
            set(data_col::REG_BASE + 2 * i, Fp::new(reg & 0xffff));
            set(data_col::REG_BASE + 2 * i + 1, Fp::new(reg >> 16));
        }

        // Per-cycle memory I/O registers mirror the event.
        set(data_col::MEMIO_ADDR, Fp::new(event.addr));
        set(data_col::MEMIO_LO, Fp::new(event.value & 0xffff));
        set(data_col::MEMIO_HI, Fp::new(event.value >> 16));
        set(data_col::MEMIO_IS_WRITE, Fp::new(event.is_write as u32));

        if let Some(ty) = ty {
            set(ty.selector_col(), Fp::ONE);
        }

        self.events.push(event);
        self.cur += 1;
    }

    /// React to a store that landed on a GPIO port.
    fn handle_gpio(&mut self, access: &MemAccess) -> Result<(), ExecutorError> {
        match access.addr {
            GPIO_OUTPUT => {
                let len = access.value;
                let need = self.output_cursor as u64 + len as u64;
                if need > OUTPUT.len as u64 {
                    return Err(ExecutorError::SizeError {
                        region: "Output",
                        need: need as usize,
                        cap: OUTPUT.len as usize,
                    });
                }
                let bytes = self
                    .mem
                    .read_bytes(OUTPUT.start + self.output_cursor, len as usize)?;
                debug!(len, "output flush");
                self.io.on_write(&bytes)?;
                self.output_cursor += (len + 3) & !3;
            }
            GPIO_COMMIT => {
                let len = access.value;
                let need = self.commit_cursor as u64 + len as u64;
                if need > COMMIT.len as u64 {
                    return Err(ExecutorError::SizeError {
                        region: "Commit",
                        need: need as usize,
                        cap: COMMIT.len as usize,
                    });
                }
                let bytes = self
                    .mem
                    .read_bytes(COMMIT.start + self.commit_cursor, len as usize)?;
                debug!(len, "commit flush");
                self.io.on_commit(&bytes)?;
                self.commit_cursor += (len + 3) & !3;
            }
            GPIO_HALT => {
                debug!("guest halt");
                self.halted = true;
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elf::build_test_elf;
    use crate::platform::PROG;
    use rvzk_air::consts::MAX_CYCLES;

    /// Test handler capturing host-visible bytes.
    #[derive(Default)]
    pub struct RecordingIo {
        pub input: Vec<u32>,
        pub output: Vec<u8>,
        pub commit: Vec<u8>,
        pub keys: KeyStore,
    }

    impl IoHandler for RecordingIo {
        fn on_init(&mut self, mem: &mut MemoryState) -> Result<(), ExecutorError> {
            let mut addr = crate::platform::INPUT.start;
            for &word in &self.input {
                mem.store(addr, word)?;
                addr += 4;
            }
            Ok(())
        }

        fn on_write(&mut self, bytes: &[u8]) -> Result<(), ExecutorError> {
            self.output.extend_from_slice(bytes);
            Ok(())
        }

        fn on_commit(&mut self, bytes: &[u8]) -> Result<(), ExecutorError> {
            self.commit.extend_from_slice(bytes);
            Ok(())
        }

        fn key_store(&mut self) -> &mut KeyStore {
            &mut self.keys
        }
    }

    /// addi rd, rs1, imm
    fn addi(rd: u8, rs1: u8, imm: i32) -> u32 {
        0x13 | ((rd as u32) << 7) | ((rs1 as u32) << 15) | (((imm as u32) & 0xfff) << 20)
    }

    /// lui rd, imm20
    fn lui(rd: u8, imm20: u32) -> u32 {
        0x37 | ((rd as u32) << 7) | (imm20 << 12)
    }

    /// sw rs2, imm(rs1)
    fn sw(rs2: u8, rs1: u8, imm: i32) -> u32 {
        let imm = imm as u32 & 0xfff;
        0x23 | (0b010 << 12)
            | ((rs1 as u32) << 15)
            | ((rs2 as u32) << 20)
            | ((imm & 0x1f) << 7)
            | ((imm >> 5) << 25)
    }

    fn words_to_bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    /// A guest that stores x2 into the commit region, pushes 4 bytes
    /// through the commit port, and halts.
    fn commit_guest() -> Vec<u8> {
        let program = [
            lui(1, COMMIT.start >> 12), // x1 = commit base
            lui(3, crate::platform::GPIO.start >> 12), // x3 = gpio base
            addi(2, 0, 0x7b),           // x2 = 123
            sw(2, 1, 0),                // commit[0] = 123
            addi(4, 0, 4),              // x4 = 4 bytes
            sw(4, 3, 4),                // commit port
            sw(0, 3, 8),                // halt port
        ];
        words_to_bytes(&program)
    }

    #[test]
    fn test_minimal_run_shape() {
        let program = [addi(1, 0, 5), 0x0000_0073]; // addi; ecall
        let elf = build_test_elf(&words_to_bytes(&program), PROG.start, PROG.start);
        let mut io = RecordingIo::default();
        let exec = execute_elf(&elf, &mut io, MAX_CYCLES).unwrap();

        assert_eq!(exec.cycles(), MIN_CYCLES);
        assert_eq!(exec.user_cycles, 2);
        assert_eq!(exec.events.len(), MIN_CYCLES - ZK_CYCLES);
        // Row 0 is the init write of word zero.
        assert_eq!(exec.events[0], MemEvent { cycle: 0, addr: 0, is_write: true, value: 0 });
    }

    #[test]
    fn test_commit_guest_delivers_journal() {
        let elf = build_test_elf(&commit_guest(), PROG.start, PROG.start);
        let mut io = RecordingIo::default();
        let exec = execute_elf(&elf, &mut io, MAX_CYCLES).unwrap();
        assert_eq!(io.commit, vec![0x7b, 0, 0, 0]);
        assert!(io.output.is_empty());
        assert_eq!(exec.cycles(), MIN_CYCLES);
    }

    #[test]
    fn test_every_active_row_has_one_event() {
        let elf = build_test_elf(&commit_guest(), PROG.start, PROG.start);
        let mut io = RecordingIo::default();
        let exec = execute_elf(&elf, &mut io, MAX_CYCLES).unwrap();
        assert_eq!(exec.events.len(), exec.cycles() - ZK_CYCLES);
        for (row, event) in exec.events.iter().enumerate() {
            assert_eq!(event.cycle as usize, row);
        }
    }

    #[test]
    fn test_input_region_visible_to_guest() {
        // Guest: load input word 0, store it into the commit region,
        // commit 4 bytes, halt.
        let lw = |rd: u8, rs1: u8, imm: i32| -> u32 {
            0x03 | (0b010 << 12)
                | ((rd as u32) << 7)
                | ((rs1 as u32) << 15)
                | (((imm as u32) & 0xfff) << 20)
        };
        let program = [
            lui(1, crate::platform::INPUT.start >> 12),
            lw(2, 1, 0),
            lui(3, COMMIT.start >> 12),
            sw(2, 3, 0),
            lui(5, crate::platform::GPIO.start >> 12),
            addi(4, 0, 4),
            sw(4, 5, 4), // commit port
            sw(0, 5, 8), // halt port
        ];
        let elf = build_test_elf(&words_to_bytes(&program), PROG.start, PROG.start);
        let mut io = RecordingIo::default();
        io.input.push(0xcafe_f00d);
        execute_elf(&elf, &mut io, MAX_CYCLES).unwrap();
        assert_eq!(io.commit, 0xcafe_f00du32.to_le_bytes().to_vec());
    }

    #[test]
    fn test_max_cycles_exceeded() {
        // An infinite loop can never reach the fini row.
        let program = [0x0000_006f]; // jal x0, 0 (spin)
        let elf = build_test_elf(&words_to_bytes(&program), PROG.start, PROG.start);
        let mut io = RecordingIo::default();
        let err = execute_elf(&elf, &mut io, MIN_CYCLES).unwrap_err();
        assert!(matches!(err, ExecutorError::MaxCycles { .. }));
    }
}
