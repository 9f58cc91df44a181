//! Code bank ROM setup.
//!
//! The code bank is the deterministic part of the trace: it depends only on
//! the program image, the entry point, and the cycle count. The same
//! function feeds both the method id (hashed at every level) and the
//! engine's run, which is exactly what binds a receipt to a program.

use std::collections::BTreeMap;

use rvzk_primitives::Fp;

use crate::consts::{code_col, CodeCycleType, CODE_SIZE, SETUP_CYCLES, ZK_CYCLES};

/// Rows the program occupies at a given cycle count, bookkeeping and
/// blinding included. A level can host the program iff
/// `required_cycles(image) <= cycles`.
pub fn required_cycles(image_words: usize) -> usize {
    image_words + SETUP_CYCLES + ZK_CYCLES
}

/// Populate a `cycles x CODE_SIZE` column-major code matrix.
///
/// Schedule: row 0 init, one mem-write row per image word in ascending
/// address order, a reset row carrying the entry point, normal rows up to
/// the fini row at `cycles - ZK_CYCLES - 1`, and an all-selector-zero tail
/// of `ZK_CYCLES` rows.
pub fn setup_code(code: &mut [Fp], cycles: usize, entry: u32, image: &BTreeMap<u32, u32>) {
    assert!(cycles.is_power_of_two(), "cycle count must be a power of two");
    assert!(
        required_cycles(image.len()) <= cycles,
        "image does not fit in {cycles} cycles"
    );
    assert_eq!(code.len(), CODE_SIZE * cycles);

    code.fill(Fp::ZERO);

    // The cycle counter column covers every row, blinding tail included.
    for row in 0..cycles {
        code[code_col::CYCLE * cycles + row] = Fp::new(row as u32);
    }

    let idx = |col: usize, row: usize| col * cycles + row;

    code[idx(CodeCycleType::Init.selector_col(), 0)] = Fp::ONE;

    let mut row = 1;
    for (&addr, &word) in image {
        code[idx(CodeCycleType::MemWrite.selector_col(), row)] = Fp::ONE;
        code[idx(code_col::OPERAND_ADDR, row)] = Fp::new(addr / 4);
        code[idx(code_col::OPERAND_LO, row)] = Fp::new(word & 0xffff);
        code[idx(code_col::OPERAND_HI, row)] = Fp::new(word >> 16);
        row += 1;
    }

    code[idx(CodeCycleType::Reset.selector_col(), row)] = Fp::ONE;
    code[idx(code_col::OPERAND_ADDR, row)] = Fp::new(entry / 4);
    row += 1;

    let fini_row = cycles - ZK_CYCLES - 1;
    while row < fini_row {
        code[idx(CodeCycleType::Normal.selector_col(), row)] = Fp::ONE;
        row += 1;
    }
    code[idx(CodeCycleType::Fini.selector_col(), fini_row)] = Fp::ONE;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::code_col::SELECTOR_COUNT;
    use crate::consts::MIN_CYCLES;

    fn selector_sum(code: &[Fp], cycles: usize, row: usize) -> Fp {
        let mut sum = Fp::ZERO;
        for col in code_col::SELECTOR_BASE..code_col::SELECTOR_BASE + SELECTOR_COUNT {
            sum += code[col * cycles + row];
        }
        sum
    }

    fn test_image() -> BTreeMap<u32, u32> {
        let mut image = BTreeMap::new();
        image.insert(0x0200_0000, 0x1111_2222);
        image.insert(0x0200_0004, 0x3333_4444);
        image
    }

    #[test]
    fn test_schedule() {
        let cycles = MIN_CYCLES;
        let image = test_image();
        let mut code = vec![Fp::ZERO; CODE_SIZE * cycles];
        setup_code(&mut code, cycles, 0x0200_0000, &image);

        // Row 0: init, gated off for mem pairing by cycle = 0.
        assert_eq!(code[CodeCycleType::Init.selector_col() * cycles], Fp::ONE);
        assert_eq!(code[code_col::CYCLE * cycles], Fp::ZERO);

        // Rows 1..=2: image words in address order.
        assert_eq!(code[CodeCycleType::MemWrite.selector_col() * cycles + 1], Fp::ONE);
        assert_eq!(code[code_col::OPERAND_ADDR * cycles + 1].as_u32(), 0x0200_0000 / 4);
        assert_eq!(code[code_col::OPERAND_LO * cycles + 1].as_u32(), 0x2222);
        assert_eq!(code[code_col::OPERAND_HI * cycles + 1].as_u32(), 0x1111);

        // Row 3: reset with the entry word address.
        assert_eq!(code[CodeCycleType::Reset.selector_col() * cycles + 3], Fp::ONE);
        assert_eq!(code[code_col::OPERAND_ADDR * cycles + 3].as_u32(), 0x0200_0000 / 4);

        // Fini just before the blinding tail.
        let fini = cycles - ZK_CYCLES - 1;
        assert_eq!(code[CodeCycleType::Fini.selector_col() * cycles + fini], Fp::ONE);

        // Exactly one selector on every active row, none on the tail.
        for row in 0..cycles {
            let expect = if row <= fini { Fp::ONE } else { Fp::ZERO };
            assert_eq!(selector_sum(&code, cycles, row), expect, "row {row}");
        }
    }

    #[test]
    fn test_deterministic() {
        let cycles = MIN_CYCLES;
        let image = test_image();
        let mut a = vec![Fp::ZERO; CODE_SIZE * cycles];
        let mut b = vec![Fp::ZERO; CODE_SIZE * cycles];
        setup_code(&mut a, cycles, 0x0200_0000, &image);
        setup_code(&mut b, cycles, 0x0200_0000, &image);
        assert_eq!(a, b);
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn test_image_too_large() {
        let cycles = MIN_CYCLES;
        let mut image = BTreeMap::new();
        for i in 0..(cycles as u32) {
            image.insert(i * 4, i);
        }
        let mut code = vec![Fp::ZERO; CODE_SIZE * cycles];
        setup_code(&mut code, cycles, 0, &image);
    }
}
