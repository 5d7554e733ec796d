use pretty_assertions::assert_eq;
use rv32_rs::asm::parse_imm;
use rv32_rs::codec::{self, Operand};
use rv32_rs::decoder::Decoder;
use rv32_rs::disasm::{disassemble, fmt_decoded};
use rv32_rs::instructions::{self, Format};
use rv32_rs::isa::rv32im::Rv32Decoder;
use rv32_rs::assemble;

#[test]
fn disasm_matches_source_modulo_abi_names() {
    let src = [
        ("add x3, x1, x2", "add gp, ra, sp"),
        ("sub s0, s1, a0", "sub s0, s1, a0"),
        ("addi a0, a0, -1", "addi a0, a0, -1"),
        ("slli t0, t1, 31", "slli t0, t1, 31"),
        ("srai t0, t1, 1", "srai t0, t1, 1"),
        ("lw a0, 8(sp)", "lw a0, 8(sp)"),
        ("lbu x5, -1(x6)", "lbu t0, -1(t1)"),
        ("sh a1, 2(a2)", "sh a1, 2(a2)"),
        ("lui t2, 0x12345", "lui t2, 74565"),
        ("auipc x1, 1", "auipc ra, 1"),
        ("jalr x0, 0(x1)", "jalr zero, 0(ra)"),
        ("remu x31, x30, x29", "remu t6, t5, t4"),
    ];
    for (asm, want) in src {
        let prog = assemble(asm).unwrap();
        assert_eq!(disassemble(prog.words[0]), want, "{asm}");
    }
}

#[test]
fn engine_decoder_and_codec_agree() {
    let dec = Rv32Decoder::new();
    for word in [0x0020_81B3u32, 0xFE11_2E23, 0xFE00_0CE3, 0xFF1F_F06F, 0x1234_50B7, 0x4033_5293] {
        let d = dec.decode(word).unwrap();
        assert_eq!(fmt_decoded(&d), disassemble(word));
    }
}

#[test]
fn round_trip_every_mnemonic_at_range_edges() {
    for desc in instructions::TABLE {
        let edges: &[i32] = match desc.format {
            Format::R => &[0],
            Format::I | Format::ILoad | Format::S => &[-2048, 0, 2047],
            Format::IShift => &[0, 31],
            Format::B => &[-4096, 2, 4094],
            Format::U => &[0, 0xF_FFFF],
            Format::J => &[-1_048_576, 2, 1_048_574],
        };
        for &v in edges {
            let ops = match desc.format {
                Format::R => vec![Operand::Reg(1), Operand::Reg(2), Operand::Reg(3)],
                Format::I | Format::IShift => vec![Operand::Reg(4), Operand::Reg(5), Operand::Imm(v)],
                Format::ILoad | Format::S => vec![Operand::Reg(6), Operand::Imm(v), Operand::Reg(7)],
                Format::B => vec![Operand::Reg(8), Operand::Reg(9), Operand::Imm(v)],
                Format::U | Format::J => vec![Operand::Reg(10), Operand::Imm(v)],
            };
            let word = codec::encode(desc.mnemonic, &ops).unwrap();
            let ins = codec::decode(word).unwrap();
            assert_eq!((ins.mnemonic(), ins.operands), (desc.mnemonic, ops));
        }
    }
}

#[test]
fn one_past_the_edge_is_rejected() {
    for (mn, ops) in [
        ("addi", vec![Operand::Reg(1), Operand::Reg(1), Operand::Imm(2048)]),
        ("sw", vec![Operand::Reg(1), Operand::Imm(-2049), Operand::Reg(1)]),
        ("srli", vec![Operand::Reg(1), Operand::Reg(1), Operand::Imm(-1)]),
        ("blt", vec![Operand::Reg(1), Operand::Reg(1), Operand::Imm(4096)]),
        ("jal", vec![Operand::Reg(1), Operand::Imm(1_048_576)]),
        ("auipc", vec![Operand::Reg(1), Operand::Imm(0x10_0000)]),
    ] {
        assert!(codec::encode(mn, &ops).is_err(), "{mn}");
    }
}

#[test]
fn unknown_words_never_fail() {
    for w in [0u32, 0xFFFF_FFFF, 0x0000_707F, 0x0000_2063, 0x0200_1013] {
        assert!(disassemble(w).starts_with("unknown instruction"), "{w:#x}");
    }
    assert_eq!(parse_imm("0x7ff"), Some(2047));
}
