#![allow(clippy::unusual_byte_groupings)]

/// RISCV breakpoint instruction
pub const EBREAK: u32 = 0b000000000001_00000_000_00000_1110011;

/// `zero` register
pub const ZERO: u8 = 0;
/// `s0` register
pub const S0: u8 = 8;
/// `s1` register
pub const S1: u8 = 9;

/// Assemble a `lw` instruction.
pub fn lw(offset: u16, base: u8, width: u8, destination: u8) -> u32 {
    let opcode = 0b000_0011;

    i_type_instruction(opcode, base, width, destination, offset)
}

/// Assemble a `sw` instruction.
pub const fn sw(offset: u32, base: u32, width: u32, source: u32) -> u32 {
    let opcode = 0b010_0011;

    let offset_lower = offset & 0b11111;
    let offset_upper = offset >> 5;

    offset_upper << 25 | source << 20 | base << 15 | width << 12 | offset_lower << 7 | opcode
}

/// Assemble a `xori` instruction. The immediate is sign extended by the core.
pub fn xori(source: u8, destination: u8, immediate: i16) -> u32 {
    assert!((-2048..=2047).contains(&immediate));

    let opcode = 0b001_0011;
    let function = 0b100;

    i_type_instruction(opcode, source, function, destination, immediate as u16 & 0xfff)
}

/// Assemble a `srli` instruction.
pub fn srli(source: u8, destination: u8, shift: u8) -> u32 {
    assert!(shift < 32);

    let opcode = 0b001_0011;
    let function = 0b101;

    i_type_instruction(opcode, source, function, destination, shift as u16)
}

/// Assemble a `jal` instruction.
///
/// `offset` is relative to the address of the instruction itself.
pub fn jal(destination: u8, offset: i32) -> u32 {
    assert!(destination <= 0x1f);
    assert!(offset % 2 == 0);
    assert!((-(1 << 20)..(1 << 20)).contains(&offset));

    let opcode = 0b110_1111;
    let imm = offset as u32;

    (imm >> 20 & 0x1) << 31
        | (imm >> 1 & 0x3ff) << 21
        | (imm >> 11 & 0x1) << 20
        | (imm >> 12 & 0xff) << 12
        | (destination as u32) << 7
        | opcode
}

// We need to perform the csrr instruction, which reads a CSR.
// This is a pseudo instruction, which actually is encoded as a
// csrrs instruction, with the rs1 register being x0,
// so no bits are changed in the CSR, but the CSR is read into rd, i.e. s0.
pub fn csrr(rd: u8, csr: u16) -> u32 {
    csrrs(rd, 0, csr)
}

/// Assemble a `csrrs` instruction
pub fn csrrs(rd: u8, rs1: u8, csr: u16) -> u32 {
    let opcode = 0b1110011;
    let funct3 = 0b010;
    i_type_instruction(opcode, rs1, funct3, rd, csr)
}

// We need to perform the csrw instruction, which writes a CSR.
// This is a pseudo instruction, which actually is encoded as a
// csrrw instruction, with the destination register being x0,
// so the read is ignored.
pub fn csrw(csr: u16, rs: u8) -> u32 {
    csrrw(0, rs, csr)
}

/// Assemble a `csrrw` instruction
pub fn csrrw(rd: u8, rs1: u8, csr: u16) -> u32 {
    let opcode = 0b1110011;
    let funct3 = 0b001;

    i_type_instruction(opcode, rs1, funct3, rd, csr)
}

/// Assemble a `csrsi` instruction, which sets the bits of `mask` in a CSR.
pub fn csrsi(csr: u16, mask: u8) -> u32 {
    let opcode = 0b1110011;
    let funct3 = 0b110;

    // The 5 bit immediate takes the place of rs1.
    i_type_instruction(opcode, mask, funct3, 0, csr)
}

/// Assemble a `csrci` instruction, which clears the bits of `mask` in a CSR.
pub fn csrci(csr: u16, mask: u8) -> u32 {
    let opcode = 0b1110011;
    let funct3 = 0b111;

    i_type_instruction(opcode, mask, funct3, 0, csr)
}

/// Assemble an I-type instruction, as specified in the RISCV ISA
///
/// This function panics if any of the values would have to be truncated.
fn i_type_instruction(opcode: u8, rs1: u8, funct3: u8, rd: u8, imm: u16) -> u32 {
    assert!(opcode <= 0x7f); // [06:00]
    assert!(rd <= 0x1f); // [11:07]
    assert!(funct3 <= 0x7); // [14:12]
    assert!(rs1 <= 0x1f); // [19:15]
    assert!(imm <= 0xfff); // [31:20]

    (imm as u32) << 20
        | (rs1 as u32) << 15
        | (funct3 as u32) << 12
        | (rd as u32) << 7
        | opcode as u32
}

#[cfg(test)]
mod test {
    use super::{csrci, csrr, csrsi, csrw, jal, lw, srli, sw, xori, S1, ZERO};
    use pretty_assertions::assert_eq;

    #[test]
    fn assemble_csrr() {
        // Assembly output of assembly 'csrr  s0, mie'
        //
        // mie address: 0x304
        // s0 index:    8
        let expected = 0x30402473;

        let assembled = csrr(8, 0x304);

        assert_eq!(assembled, expected);
    }

    #[test]
    fn assemble_csrw() {
        // Assembly output of assembly 'csrw  mstatus, s1'
        //
        // mstatus address: 0x300
        // s9 index:    9
        let expected = 0x30049073;

        let assembled = csrw(0x300, 9);

        assert_eq!(assembled, expected);
    }

    #[test]
    fn assemble_sw() {
        // Assembly output of assembly 'sw      x1, 4(x2)'
        //
        let expected = 0x00112223;

        let assembled = sw(4, 2, 2, 1);

        assert_eq!(assembled, expected);
    }

    #[test]
    fn assemble_sw_debug_ram() {
        // 'sw s1, 0x400(zero)'
        assert_eq!(sw(0x400, ZERO as u32, 2, S1 as u32), 0x40902023);
    }

    #[test]
    fn assemble_lw() {
        // Assembly output of assembly 'lw  x3, 8(x4)'
        let expected = 0x00822183;

        let assembled = lw(8, 4, 2, 3);

        assert_eq!(assembled, expected);
    }

    #[test]
    fn assemble_xori() {
        // 'xori s1, zero, -1'
        assert_eq!(xori(ZERO, S1, -1), 0xfff04493);
    }

    #[test]
    fn assemble_srli() {
        // 'srli s1, s1, 31'
        assert_eq!(srli(S1, S1, 31), 0x01f4d493);
    }

    #[test]
    fn assemble_jal() {
        // 'jal ra, 8'
        assert_eq!(jal(1, 8), 0x008000ef);
        // 'jal zero, 0'
        assert_eq!(jal(0, 0), 0x0000006f);
        // 'jal zero, 1008'
        assert_eq!(jal(0, 1008), 0x3f00006f);
        // 'jal zero, -4'
        assert_eq!(jal(0, -4), 0xffdff06f);
    }

    #[test]
    fn assemble_csrsi_csrci() {
        // 'csrsi dcsr, 8'
        assert_eq!(csrsi(0x7b0, 8), 0x7b046073);
        // 'csrci dcsr, 12'
        assert_eq!(csrci(0x7b0, 12), 0x7b067073);
    }
}
