mod common;

use common::{ENTRY, machine, run_steps};
use sm83_core::Bus;
use sm83_core::registers::{FLAG_C, FLAG_H, FLAG_N, FLAG_Z};
use sm83_core::{Flag, RunState};

#[test]
fn load_immediate_then_register_copy() {
    // LD B,$42 ; LD C,B
    let (mut cpu, mut bus) = machine(&[0x06, 0x42, 0x48]);
    assert_eq!(cpu.step(&mut bus).unwrap(), 2);
    assert_eq!(cpu.registers().b, 0x42);
    assert_eq!(cpu.pc(), ENTRY + 2);

    assert_eq!(cpu.step(&mut bus).unwrap(), 1);
    assert_eq!(cpu.registers().c, 0x42);
    assert_eq!(cpu.pc(), ENTRY + 3);
}

#[test]
fn memory_through_hl() {
    // LD (HL),$99 ; LD A,(HL)
    let (mut cpu, mut bus) = machine(&[0x36, 0x99, 0x7E]);
    cpu.registers_mut().set_hl(0xC000);
    assert_eq!(cpu.step(&mut bus).unwrap(), 3);
    assert_eq!(bus.read(0xC000), 0x99);
    assert_eq!(cpu.step(&mut bus).unwrap(), 2);
    assert_eq!(cpu.registers().a, 0x99);
}

#[test]
fn hl_post_increment_and_decrement() {
    // LD (HL+),A ; LD A,(HL-)
    let (mut cpu, mut bus) = machine(&[0x22, 0x3A]);
    cpu.registers_mut().set_hl(0xC000);
    cpu.registers_mut().a = 0x5A;
    bus.write(0xC001, 0x77);

    assert_eq!(cpu.step(&mut bus).unwrap(), 2);
    assert_eq!(bus.read(0xC000), 0x5A);
    assert_eq!(cpu.registers().hl(), 0xC001);

    assert_eq!(cpu.step(&mut bus).unwrap(), 2);
    assert_eq!(cpu.registers().a, 0x77);
    assert_eq!(cpu.registers().hl(), 0xC000);
}

#[test]
fn high_page_loads() {
    // LDH ($80),A ; LD (C),A ; LDH A,($82)
    let (mut cpu, mut bus) = machine(&[0xE0, 0x80, 0xE2, 0xF0, 0x82]);
    cpu.registers_mut().a = 0x77;
    cpu.registers_mut().c = 0x81;
    bus.write(0xFF82, 0x3C);

    assert_eq!(cpu.step(&mut bus).unwrap(), 3);
    assert_eq!(bus.read(0xFF80), 0x77);
    assert_eq!(cpu.step(&mut bus).unwrap(), 2);
    assert_eq!(bus.read(0xFF81), 0x77);
    assert_eq!(cpu.step(&mut bus).unwrap(), 3);
    assert_eq!(cpu.registers().a, 0x3C);
}

#[test]
fn absolute_loads_and_store_sp() {
    // LD ($C010),A ; LD A,($C020) ; LD ($C000),SP
    let (mut cpu, mut bus) = machine(&[0xEA, 0x10, 0xC0, 0xFA, 0x20, 0xC0, 0x08, 0x00, 0xC0]);
    cpu.registers_mut().a = 0x12;
    bus.write(0xC020, 0x34);

    assert_eq!(cpu.step(&mut bus).unwrap(), 4);
    assert_eq!(bus.read(0xC010), 0x12);
    assert_eq!(cpu.step(&mut bus).unwrap(), 4);
    assert_eq!(cpu.registers().a, 0x34);
    assert_eq!(cpu.step(&mut bus).unwrap(), 5);
    assert_eq!(bus.read(0xC000), 0xFE);
    assert_eq!(bus.read(0xC001), 0xFF);
    assert_eq!(cpu.pc(), ENTRY + 9);
}

#[test]
fn sixteen_bit_immediates_are_little_endian() {
    // LD DE,$1234 ; LD SP,$D000
    let (mut cpu, mut bus) = machine(&[0x11, 0x34, 0x12, 0x31, 0x00, 0xD0]);
    assert_eq!(run_steps(&mut cpu, &mut bus, 2), 6);
    assert_eq!(cpu.registers().de(), 0x1234);
    assert_eq!(cpu.sp(), 0xD000);
}

#[test]
fn push_writes_high_byte_first_and_pop_restores() {
    // PUSH BC ; POP DE
    let (mut cpu, mut bus) = machine(&[0xC5, 0xD1]);
    cpu.registers_mut().set_bc(0x1234);

    assert_eq!(cpu.step(&mut bus).unwrap(), 4);
    assert_eq!(cpu.sp(), 0xFFFC);
    assert_eq!(bus.read(0xFFFD), 0x12);
    assert_eq!(bus.read(0xFFFC), 0x34);

    assert_eq!(cpu.step(&mut bus).unwrap(), 3);
    assert_eq!(cpu.registers().de(), 0x1234);
    assert_eq!(cpu.sp(), 0xFFFE);
}

#[test]
fn pop_af_drops_low_nibble() {
    let (mut cpu, mut bus) = machine(&[0xF1]);
    cpu.registers_mut().sp = 0xC000;
    bus.write(0xC000, 0xFF);
    bus.write(0xC001, 0x12);

    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.registers().a, 0x12);
    assert_eq!(cpu.registers().f(), 0xF0);
    assert_eq!(cpu.registers().af(), 0x12F0);
}

#[test]
fn register_and_immediate_alu() {
    // ADD A,B ; CP $40
    let (mut cpu, mut bus) = machine(&[0x80, 0xFE, 0x40]);
    cpu.registers_mut().a = 0x3A;
    cpu.registers_mut().b = 0xC6;

    assert_eq!(cpu.step(&mut bus).unwrap(), 1);
    assert_eq!(cpu.registers().a, 0x00);
    assert_eq!(cpu.registers().f(), FLAG_Z | FLAG_H | FLAG_C);

    cpu.registers_mut().a = 0x3C;
    assert_eq!(cpu.step(&mut bus).unwrap(), 2);
    assert_eq!(cpu.registers().a, 0x3C);
    assert_eq!(cpu.registers().f(), FLAG_N | FLAG_C);
}

#[test]
fn alu_on_hl_memory() {
    // SUB (HL) ; XOR A
    let (mut cpu, mut bus) = machine(&[0x96, 0xAF]);
    cpu.registers_mut().set_hl(0xC000);
    cpu.registers_mut().a = 0x3E;
    bus.write(0xC000, 0x3E);

    assert_eq!(cpu.step(&mut bus).unwrap(), 2);
    assert_eq!(cpu.registers().a, 0);
    assert_eq!(cpu.registers().f(), FLAG_Z | FLAG_N);

    cpu.registers_mut().a = 0x55;
    assert_eq!(cpu.step(&mut bus).unwrap(), 1);
    assert_eq!(cpu.registers().a, 0);
    assert_eq!(cpu.registers().f(), FLAG_Z);
}

#[test]
fn inc_memory_keeps_carry() {
    let (mut cpu, mut bus) = machine(&[0x34]);
    cpu.registers_mut().set_hl(0xC000);
    bus.write(0xC000, 0x0F);

    assert_eq!(cpu.step(&mut bus).unwrap(), 3);
    assert_eq!(bus.read(0xC000), 0x10);
    // Post-boot F has C set; INC leaves it alone.
    assert_eq!(cpu.registers().f(), FLAG_H | FLAG_C);
}

#[test]
fn sixteen_bit_inc_dec_touch_no_flags() {
    // INC BC ; DEC SP
    let (mut cpu, mut bus) = machine(&[0x03, 0x3B]);
    cpu.registers_mut().set_bc(0xFFFF);
    let flags = cpu.registers().f();

    assert_eq!(cpu.step(&mut bus).unwrap(), 2);
    assert_eq!(cpu.registers().bc(), 0x0000);
    assert_eq!(cpu.step(&mut bus).unwrap(), 2);
    assert_eq!(cpu.sp(), 0xFFFD);
    assert_eq!(cpu.registers().f(), flags);
}

#[test]
fn add_hl_hl() {
    let (mut cpu, mut bus) = machine(&[0x29]);
    cpu.registers_mut().set_hl(0x8A23);
    cpu.registers_mut().set_f(0);

    assert_eq!(cpu.step(&mut bus).unwrap(), 2);
    assert_eq!(cpu.registers().hl(), 0x1446);
    assert_eq!(cpu.registers().f(), FLAG_H | FLAG_C);
}

#[test]
fn stack_pointer_offsets() {
    // ADD SP,8 ; LD HL,SP-1
    let (mut cpu, mut bus) = machine(&[0xE8, 0x08, 0xF8, 0xFF]);
    cpu.registers_mut().sp = 0xFFF8;

    assert_eq!(cpu.step(&mut bus).unwrap(), 4);
    assert_eq!(cpu.sp(), 0x0000);
    assert_eq!(cpu.registers().f(), FLAG_H | FLAG_C);

    assert_eq!(cpu.step(&mut bus).unwrap(), 3);
    assert_eq!(cpu.registers().hl(), 0xFFFF);
    assert_eq!(cpu.registers().f(), 0);

    // LD SP,HL
    bus.write(cpu.pc(), 0xF9);
    assert_eq!(cpu.step(&mut bus).unwrap(), 2);
    assert_eq!(cpu.sp(), 0xFFFF);
}

#[test]
fn relative_jumps() {
    // JR NZ,+5 (not taken: Z set after boot) ; JR Z,-2 (taken)
    let (mut cpu, mut bus) = machine(&[0x20, 0x05, 0x28, 0xFE]);
    assert!(cpu.flag(Flag::Z));

    assert_eq!(cpu.step(&mut bus).unwrap(), 2);
    assert_eq!(cpu.pc(), ENTRY + 2);

    assert_eq!(cpu.step(&mut bus).unwrap(), 3);
    assert_eq!(cpu.pc(), ENTRY + 2);
}

#[test]
fn absolute_jumps() {
    // JP NC,$C000 (not taken) ; JP $C000
    let (mut cpu, mut bus) = machine(&[0xD2, 0x00, 0xC0, 0xC3, 0x00, 0xC0]);
    assert_eq!(cpu.step(&mut bus).unwrap(), 3);
    assert_eq!(cpu.pc(), ENTRY + 3);

    assert_eq!(cpu.step(&mut bus).unwrap(), 4);
    assert_eq!(cpu.pc(), 0xC000);

    // JP HL
    bus.write(0xC000, 0xE9);
    cpu.registers_mut().set_hl(0x1234);
    assert_eq!(cpu.step(&mut bus).unwrap(), 1);
    assert_eq!(cpu.pc(), 0x1234);
}

#[test]
fn call_and_return() {
    // CALL $0200 ; ... ; $0200: RET
    let (mut cpu, mut bus) = machine(&[0xCD, 0x00, 0x02]);
    bus.write(0x0200, 0xC9);

    assert_eq!(cpu.step(&mut bus).unwrap(), 6);
    assert_eq!(cpu.pc(), 0x0200);
    assert_eq!(cpu.sp(), 0xFFFC);
    assert_eq!(bus.read(0xFFFD), 0x01);
    assert_eq!(bus.read(0xFFFC), 0x03);

    assert_eq!(cpu.step(&mut bus).unwrap(), 4);
    assert_eq!(cpu.pc(), ENTRY + 3);
    assert_eq!(cpu.sp(), 0xFFFE);
}

#[test]
fn conditional_call_and_return_timing() {
    // CALL NZ,$0200 (not taken) ; RET NZ (not taken) ; RET Z (taken)
    let (mut cpu, mut bus) = machine(&[0xC4, 0x00, 0x02, 0xC0, 0xC8]);
    cpu.registers_mut().sp = 0xC000;
    bus.write(0xC000, 0x00);
    bus.write(0xC001, 0x03);

    assert_eq!(cpu.step(&mut bus).unwrap(), 3);
    assert_eq!(cpu.sp(), 0xC000);
    assert_eq!(cpu.step(&mut bus).unwrap(), 2);
    assert_eq!(cpu.pc(), ENTRY + 4);
    assert_eq!(cpu.step(&mut bus).unwrap(), 5);
    assert_eq!(cpu.pc(), 0x0300);
    assert_eq!(cpu.sp(), 0xC002);
}

#[test]
fn restart_vectors() {
    let (mut cpu, mut bus) = machine(&[0xFF]);
    assert_eq!(cpu.step(&mut bus).unwrap(), 4);
    assert_eq!(cpu.pc(), 0x0038);
    assert_eq!(bus.read(0xFFFD), 0x01);
    assert_eq!(bus.read(0xFFFC), 0x01);
}

#[test]
fn prefixed_instructions() {
    // SWAP A ; BIT 7,(HL) ; SET 0,(HL) ; RES 7,(HL)
    let (mut cpu, mut bus) = machine(&[0xCB, 0x37, 0xCB, 0x7E, 0xCB, 0xC6, 0xCB, 0xBE]);
    cpu.registers_mut().set_hl(0xC000);
    bus.write(0xC000, 0x80);

    assert_eq!(cpu.step(&mut bus).unwrap(), 2);
    assert_eq!(cpu.registers().a, 0x10);
    assert_eq!(cpu.registers().f(), 0);
    assert_eq!(cpu.pc(), ENTRY + 2);

    assert_eq!(cpu.step(&mut bus).unwrap(), 3);
    assert_eq!(cpu.registers().f(), FLAG_H);

    assert_eq!(cpu.step(&mut bus).unwrap(), 4);
    assert_eq!(bus.read(0xC000), 0x81);

    assert_eq!(cpu.step(&mut bus).unwrap(), 4);
    assert_eq!(bus.read(0xC000), 0x01);
    assert_eq!(cpu.pc(), ENTRY + 8);
}

#[test]
fn bcd_addition_with_daa() {
    // LD A,$45 ; ADD A,$38 ; DAA
    let (mut cpu, mut bus) = machine(&[0x3E, 0x45, 0xC6, 0x38, 0x27]);
    run_steps(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.registers().a, 0x83);
    assert_eq!(cpu.registers().f(), 0);
}

#[test]
fn accumulator_rotates_clear_zero() {
    // XOR A ; RLA (with carry in from SCF)
    let (mut cpu, mut bus) = machine(&[0xAF, 0x37, 0x17, 0x07]);
    run_steps(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.registers().a, 0x01);
    assert_eq!(cpu.registers().f(), 0);

    cpu.registers_mut().a = 0x80;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.registers().a, 0x01);
    assert_eq!(cpu.registers().f(), FLAG_C);
}

#[test]
fn flag_instructions() {
    // CPL ; CCF ; SCF
    let (mut cpu, mut bus) = machine(&[0x2F, 0x3F, 0x37]);
    cpu.registers_mut().a = 0x35;
    cpu.registers_mut().set_f(FLAG_Z | FLAG_C);

    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.registers().a, 0xCA);
    assert_eq!(cpu.registers().f(), FLAG_Z | FLAG_N | FLAG_H | FLAG_C);

    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.registers().f(), FLAG_Z);

    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.registers().f(), FLAG_Z | FLAG_C);
}

#[test]
fn hl_round_trips_through_h_and_l_loads() {
    // LD H,$BE ; LD L,$EF ; LD B,H ; LD C,L
    let (mut cpu, mut bus) = machine(&[0x26, 0xBE, 0x2E, 0xEF, 0x44, 0x4D]);
    run_steps(&mut cpu, &mut bus, 4);
    assert_eq!(cpu.registers().hl(), 0xBEEF);
    assert_eq!(cpu.registers().bc(), 0xBEEF);
}

#[test]
fn stop_consumes_padding_byte() {
    let (mut cpu, mut bus) = machine(&[0x10, 0x00, 0x04]);
    assert_eq!(cpu.step(&mut bus).unwrap(), 1);
    assert_eq!(cpu.state(), RunState::Stopped);
    assert_eq!(cpu.pc(), ENTRY + 2);

    // Stays put until something wakes it.
    assert_eq!(cpu.step(&mut bus).unwrap(), 1);
    assert_eq!(cpu.pc(), ENTRY + 2);

    cpu.wake();
    let b = cpu.registers().b;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.registers().b, b.wrapping_add(1));
}
