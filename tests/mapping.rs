use rv32_rs::soc::{Region, GPIO_BASE, RAM_BASE, TIMER_BASE, UART_BASE};
use rv32_rs::{assemble, Bus, BusFault, RunExit, SimConfig, SocConfig, Simulator, Trap};

fn load(src: &str) -> Simulator {
    let prog = assemble(src).unwrap();
    let mut sim = Simulator::default();
    sim.load_program(&prog.words, prog.line_map).unwrap();
    sim
}

#[test]
fn every_region_resolves() {
    let sim = Simulator::default();
    let bus = sim.bus();
    assert_eq!(bus.decode(0).map(|r| r.0), Some(Region::Rom));
    assert_eq!(bus.decode(RAM_BASE + 0xFFFF).map(|r| r.0), Some(Region::Ram));
    assert_eq!(bus.decode(TIMER_BASE).map(|r| r.0), Some(Region::Timer));
    assert_eq!(bus.decode(UART_BASE + 0x10).map(|r| r.0), Some(Region::Uart));
    assert_eq!(bus.decode(GPIO_BASE + 7).map(|r| r.0), Some(Region::Gpio));
    assert_eq!(bus.decode(0x0800_0000), None);
    assert_eq!(bus.decode(UART_BASE + 0x14), None);
}

#[test]
fn load_between_devices_faults_without_side_effects() {
    // 0x08000000 lies between ROM and RAM
    let mut sim = load(
        "addi a0, zero, 7
         lui  t0, 0x8000
         lw   a0, 0(t0)
         addi a1, zero, 1",
    );
    assert!(sim.step());
    assert!(sim.step());
    let before = *sim.regs();
    assert!(!sim.step());
    assert!(sim.is_halted());
    assert_eq!(*sim.regs(), before);
    assert_eq!(sim.reg(10), 7);
    assert_eq!(sim.pc(), 8);
    assert_eq!(
        sim.fault(),
        Some(&Trap::Bus { pc: 8, addr: 0x0800_0000, source: BusFault::Unmapped { addr: 0x0800_0000 } })
    );
    assert_eq!(sim.line_for_pc(sim.pc()), Some(3));

    // sticky until reset
    assert!(!sim.step());
    assert_eq!(sim.pc(), 8);
    assert_eq!(sim.run(10), RunExit::Faulted);
    sim.reset();
    assert!(sim.fault().is_none());
    assert!(sim.step());
}

#[test]
fn store_between_devices_faults() {
    let mut sim = load(
        "lui t0, 0x30000
         addi t0, t0, 0x14     # one past the UART window
         sw  t0, 0(t0)",
    );
    assert_eq!(sim.run(10), RunExit::Faulted);
    assert_eq!(sim.pc(), 8);
    assert!(sim.fault_message().unwrap().contains("unmapped address 0x30000014"));
}

#[test]
fn word_straddling_device_edge_faults() {
    let mut sim = Simulator::default();
    let bus = sim.bus_mut();
    assert_eq!(bus.read_u32(0xFFFE), Err(BusFault::Straddle { addr: 0xFFFE, width: 4 }));
    assert_eq!(bus.read_u16(0xFFFE), Ok(0));
    assert_eq!(bus.read_u32(RAM_BASE + 0xFFFD), Err(BusFault::Straddle { addr: RAM_BASE + 0xFFFD, width: 4 }));
}

#[test]
fn peripheral_register_crossing_faults() {
    let mut sim = Simulator::default();
    let bus = sim.bus_mut();
    assert_eq!(bus.read_u32(UART_BASE + 2), Err(BusFault::Misaligned { addr: UART_BASE + 2, width: 4 }));
    assert_eq!(bus.write_u16(GPIO_BASE + 3, 0), Err(BusFault::Misaligned { addr: GPIO_BASE + 3, width: 2 }));
    assert!(bus.read_u16(GPIO_BASE + 2).is_ok());
    assert!(bus.drain_events().is_empty());
}

#[test]
fn fetch_from_unmapped_space_faults() {
    let mut sim = load("lui t0, 0x50000\njalr zero, 0(t0)\n");
    assert_eq!(sim.run(10), RunExit::Faulted);
    assert!(matches!(sim.fault(), Some(Trap::Fetch { pc: 0x5000_0000, .. })));
    assert_eq!(sim.pc(), 0x5000_0000);
}

#[test]
fn read_only_rom_rejects_stores() {
    let cfg = SimConfig {
        soc: SocConfig { rom_writable: false, ..SocConfig::default() },
        ..SimConfig::default()
    };
    let prog = assemble("addi x1, x0, 42\nsw x1, 0(x0)\n").unwrap();
    let mut sim = Simulator::new(cfg);
    sim.load_program(&prog.words, prog.line_map).unwrap();
    assert_eq!(sim.run(10), RunExit::Faulted);
    assert!(matches!(sim.fault(), Some(Trap::Bus { source: BusFault::ReadOnly { addr: 0 }, .. })));
}

#[test]
fn oversized_program_is_rejected() {
    let cfg = SimConfig {
        soc: SocConfig { rom_size: 8, ..SocConfig::default() },
        ..SimConfig::default()
    };
    let mut sim = Simulator::new(cfg);
    assert!(sim.load_program(&[0x13, 0x13, 0x13], Vec::new()).is_err());
}
