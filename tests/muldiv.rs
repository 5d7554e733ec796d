use rv32_rs::{assemble, CpuConfig, RunExit, SimConfig, Simulator, Trap};

fn run_with(cfg: SimConfig, src: &str) -> Simulator {
    let prog = assemble(src).unwrap();
    let mut sim = Simulator::new(cfg);
    sim.load_program(&prog.words, prog.line_map).unwrap();
    sim.run(1_000);
    sim
}

fn run(src: &str) -> Simulator {
    let sim = run_with(SimConfig::default(), src);
    assert!(sim.fault().is_none(), "{:?}", sim.fault_message());
    sim
}

#[test]
fn multiply_family() {
    let sim = run(
        "addi t0, zero, -3
         addi t1, zero, 7
         mul    a0, t0, t1
         mulh   a1, t0, t1
         mulhu  a2, t0, t1
         mulhsu a3, t0, t1",
    );
    assert_eq!(sim.reg(10) as i32, -21);
    assert_eq!(sim.reg(11), 0xFFFF_FFFF);
    // 0xFFFFFFFD * 7 = 0x6_FFFF_FFEB
    assert_eq!(sim.reg(12), 6);
    assert_eq!(sim.reg(13), 0xFFFF_FFFF);
}

#[test]
fn division_by_zero() {
    let sim = run(
        "addi t0, zero, 42
         div  a0, t0, zero
         divu a1, t0, zero
         rem  a2, t0, zero
         remu a3, t0, zero",
    );
    assert_eq!(sim.reg(10), 0xFFFF_FFFF);
    assert_eq!(sim.reg(11), 0xFFFF_FFFF);
    assert_eq!(sim.reg(12), 42);
    assert_eq!(sim.reg(13), 42);
}

#[test]
fn signed_overflow() {
    let sim = run(
        "lui  t0, 0x80000        # INT32_MIN
         addi t1, zero, -1
         div  a0, t0, t1
         rem  a1, t0, t1
         divu a2, t0, t1
         remu a3, t0, t1",
    );
    assert_eq!(sim.reg(10), 0x8000_0000);
    assert_eq!(sim.reg(11), 0);
    assert_eq!(sim.reg(12), 0);
    assert_eq!(sim.reg(13), 0x8000_0000);
}

#[test]
fn negative_operands_truncate_toward_zero() {
    let sim = run(
        "addi t0, zero, -42
         addi t1, zero, 5
         div  a0, t0, t1
         rem  a1, t0, t1",
    );
    assert_eq!(sim.reg(10) as i32, -8);
    assert_eq!(sim.reg(11) as i32, -2);
}

#[test]
fn m_extension_can_be_disabled() {
    let cfg = SimConfig {
        cpu: CpuConfig { m_extension: false, ..CpuConfig::default() },
        ..SimConfig::default()
    };
    let mut sim = run_with(cfg, "addi x1, x0, 3\nmul x3, x1, x1\n");
    assert!(matches!(sim.fault(), Some(Trap::Unimplemented { pc: 4, .. })));
    assert_eq!(sim.reg(3), 0);
    assert_eq!(sim.run(5), RunExit::Faulted);
}
