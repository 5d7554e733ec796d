use pretty_assertions::assert_eq;
use rv32_rs::devices::UartStatus;
use rv32_rs::soc::{EVENT_CAPACITY, TIMER_BASE, UART_BASE};
use rv32_rs::{assemble, Bus, BusEvent, BusFault, RunExit, Simulator};

fn load(src: &str) -> Simulator {
    let prog = assemble(src).unwrap();
    let mut sim = Simulator::default();
    sim.load_program(&prog.words, prog.line_map).unwrap();
    sim
}

#[test]
fn uart_transmit_emits_low_byte() {
    let mut sim = load(
        "lui  t0, 0x30000
         addi t1, zero, 0x141    # only 0x41 goes out
         sw   t1, 12(t0)
         addi t1, zero, 0x42
         sb   t1, 12(t0)
         addi t2, zero, 96
         sw   t2, 8(t0)          # baud just stores",
    );
    assert_eq!(sim.run(100), RunExit::Halted);
    assert_eq!(sim.drain_events(), vec![BusEvent::UartTx(0x41), BusEvent::UartTx(0x42)]);
    assert_eq!(sim.bus().uart.baud, 96);
    assert!(sim.drain_events().is_empty());
}

#[test]
fn uart_receive_and_clear() {
    let mut sim = load(
        "lui  t0, 0x30000
         lw   a0, 4(t0)          # status
         lw   a1, 16(t0)         # rx data
         sw   zero, 4(t0)        # acknowledge
         lw   a2, 4(t0)",
    );
    sim.bus_mut().uart.receive(0x1234);
    assert_eq!(sim.run(100), RunExit::Halted);
    assert_eq!(sim.reg(10), (UartStatus::TX_READY | UartStatus::RX_DONE).bits());
    assert_eq!(sim.reg(11), 0x1234);
    assert_eq!(sim.reg(12), UartStatus::TX_READY.bits());
}

#[test]
fn uart_rx_is_read_only() {
    let mut sim = Simulator::default();
    assert_eq!(
        sim.bus_mut().write_u32(UART_BASE + 0x10, 1),
        Err(BusFault::ReadOnly { addr: UART_BASE + 0x10 })
    );
}

#[test]
fn gpio_led_and_segments() {
    let mut sim = load(
        "lui  t0, 0x40000
         addi t1, zero, 0x55
         sb   t1, 0(t0)          # LED
         addi t1, zero, 0x3f
         sb   t1, 5(t0)          # segment 5
         lw   a0, 4(t0)",
    );
    assert_eq!(sim.run(100), RunExit::Halted);
    assert_eq!(
        sim.drain_events(),
        vec![BusEvent::Led(0x55), BusEvent::Segment { index: 5, value: 0x3f }]
    );
    assert_eq!(sim.reg(10), 0x3f00);
    assert_eq!(sim.bus().gpio.led(), 0x55);
}

#[test]
fn timer_is_host_driven_and_read_only() {
    let mut sim = load(
        "lui t0, 0x20000
         lw  a0, 0(t0)
         lbu a1, 1(t0)
         sw  a0, 0(t0)",
    );
    sim.bus_mut().timer.set(0x0000_AB00);
    sim.bus_mut().timer.advance(0x10);
    assert_eq!(sim.run(100), RunExit::Faulted);
    assert_eq!(sim.reg(10), 0xAB10);
    assert_eq!(sim.reg(11), 0xAB);
    assert!(matches!(
        sim.fault(),
        Some(rv32_rs::Trap::Bus { addr, source: BusFault::ReadOnly { .. }, .. }) if *addr == TIMER_BASE
    ));
}

#[test]
fn reset_clears_peripherals() {
    let mut sim = load("lui t0, 0x40000\naddi t1, zero, 1\nsb t1, 0(t0)\n");
    sim.bus_mut().timer.set(5);
    sim.run(100);
    sim.reset();
    assert_eq!(sim.bus().gpio.led(), 0);
    assert_eq!(sim.bus().timer.ticks(), 0);
    assert!(sim.drain_events().is_empty());
}

#[test]
fn events_render_deterministically() {
    assert_eq!(BusEvent::UartTx(b'A').to_string(), "UART TX: 0x41 'A'");
    assert_eq!(BusEvent::UartTx(0x0a).to_string(), "UART TX: 0x0a");
    assert_eq!(BusEvent::Led(0x05).to_string(), "LED: 0x05 (00000101)");
    assert_eq!(BusEvent::Segment { index: 2, value: 0x7f }.to_string(), "SEG2: 0x7f");
}

#[test]
fn endless_display_loop_keeps_event_queue_bounded() {
    let mut sim = load(
        "lui  t0, 0x40000
         loop:
         sb   t0, 0(t0)
         jal  zero, loop",
    );
    assert_eq!(sim.run(200_000), RunExit::StepLimit);
    assert_eq!(sim.bus().pending_events(), EVENT_CAPACITY);
    assert!(sim.bus().dropped_events() > 90_000);
    assert_eq!(sim.drain_events().len(), EVENT_CAPACITY);
    assert_eq!(sim.bus().pending_events(), 0);
}
