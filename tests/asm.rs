use pretty_assertions::assert_eq;
use rv32_rs::asm::{AsmError, LineError};
use rv32_rs::codec::{self, EncodeError, Operand};
use rv32_rs::{assemble, Assembler};

#[test]
fn forward_and_backward_references() {
    let prog = assemble(
        "start:  addi x1, x0, 0      # 0x00
                 beq  x1, x0, fwd    # 0x04 -> 0x10
                 addi x1, x1, 1      # 0x08
                 jal  x0, start      # 0x0c -> 0x00
        fwd:     bne  x1, x0, start  # 0x10 -> 0x00
                 jal  ra, fwd        # 0x14 -> 0x10",
    )
    .unwrap();
    let ops = |i: usize| codec::decode(prog.words[i]).unwrap().operands;
    assert_eq!(ops(1), vec![Operand::Reg(1), Operand::Reg(0), Operand::Imm(12)]);
    assert_eq!(ops(3), vec![Operand::Reg(0), Operand::Imm(-12)]);
    assert_eq!(ops(4), vec![Operand::Reg(1), Operand::Reg(0), Operand::Imm(-16)]);
    assert_eq!(ops(5), vec![Operand::Reg(1), Operand::Imm(-4)]);
    assert_eq!(prog.symbols.get("FWD"), Some(0x10));
}

#[test]
fn line_map_points_at_source_lines() {
    let prog = assemble(
        "# header comment

loop:
    addi a0, a0, 1   // trailing comment
    bne a0, a1, loop
",
    )
    .unwrap();
    assert_eq!(prog.words.len(), 2);
    assert_eq!(prog.line_map, vec![4, 5]);
}

#[test]
fn bin_strings_match_words() {
    let prog = assemble("addi x1, x0, 10\nsw x1, -4(sp)\n").unwrap();
    assert_eq!(
        prog.to_bin_strings(),
        vec![
            "00000000101000000000000010010011".to_string(),
            "11111110000100010010111000100011".to_string(),
        ]
    );
    assert_eq!(prog.to_le_bytes()[..4], [0x93, 0x00, 0xA0, 0x00]);
}

#[test]
fn errors_accumulate_across_lines() {
    let errs = assemble(
        "addi x1, x0, 1
         frob x1, x2
         add  x1, x2, x99
         beq  x1, x2, nowhere
         lw   x1, x2
         addi x1, x0, 4096
         ok: addi x2, x0, 2
         ok: addi x3, x0, 3
         beq  x1, x2, 3",
    )
    .unwrap_err();
    assert_eq!(errs.lines().collect::<Vec<_>>(), vec![2, 3, 4, 5, 6, 8, 9]);
    let kinds: Vec<&AsmError> = errs.0.iter().map(|e| &e.error).collect();
    assert_eq!(kinds[0], &AsmError::UnknownMnemonic("frob".into()));
    assert_eq!(kinds[1], &AsmError::InvalidRegister("x99".into()));
    assert_eq!(kinds[2], &AsmError::UnresolvedLabel("nowhere".into()));
    assert!(matches!(kinds[3], AsmError::BadOperands { mnemonic: "lw", .. }));
    assert!(matches!(
        kinds[4],
        AsmError::Encode(EncodeError::ImmediateOutOfRange { value: 4096, .. })
    ));
    assert!(matches!(kinds[5], AsmError::DuplicateLabel { addr: 0x18, .. }));
    assert_eq!(kinds[6], &AsmError::Encode(EncodeError::MisalignedOffset(3)));
}

#[test]
fn error_display_names_the_line() {
    let errs = assemble("nop\n").unwrap_err();
    assert_eq!(
        errs.0,
        vec![LineError { line: 1, error: AsmError::UnknownMnemonic("nop".into()) }]
    );
    assert_eq!(errs.to_string(), "line 1: unknown mnemonic 'nop'");
}

#[test]
fn register_aliases_and_case() {
    let a = assemble("ADD S0, FP, x8\nlw a0, 0x10(sp)\nsw ra, (sp)\n").unwrap();
    let b = assemble("add x8, x8, x8\nlw x10, 16(x2)\nsw x1, 0(x2)\n").unwrap();
    assert_eq!(a.words, b.words);
}

#[test]
fn hex_and_negative_hex_immediates() {
    let a = assemble("addi t0, zero, -0x10\nlui t1, 0xfffff\n").unwrap();
    let b = assemble("addi t0, zero, -16\nlui t1, 1048575\n").unwrap();
    assert_eq!(a.words, b.words);
}

#[test]
fn jalr_accepts_both_forms() {
    let a = assemble("jalr ra, t0, 8\n").unwrap();
    let b = assemble("jalr ra, 8(t0)\n").unwrap();
    assert_eq!(a.words, b.words);
}

#[test]
fn origin_moves_symbols() {
    let prog = Assembler::with_origin(0x1000).assemble("a: addi x0, x0, 0\nb:\n").unwrap();
    assert_eq!(prog.symbols.sorted(), vec![("a", 0x1000), ("b", 0x1004)]);
}
