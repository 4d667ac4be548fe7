use marquee_core::core::{ConfigFile, Machine};
use marquee_machines::BankSwitchSystem;
use marquee_machines::bank_switch::{BANK_COUNT, CPU, bank_signature};

fn board() -> BankSwitchSystem {
    BankSwitchSystem::new(&ConfigFile::default()).unwrap()
}

#[test]
fn test_each_bank_routine_reached() {
    let mut sys = board();
    sys.run_frame().unwrap();
    sys.run_frame().unwrap();
    let ram = sys.ram();
    for b in 0..256 {
        assert_eq!(ram[b], bank_signature(b % BANK_COUNT), "RAM[{b:#04x}]");
    }
}

#[test]
fn test_kicked_watchdog_never_fires() {
    let mut sys = board();
    for _ in 0..5 {
        sys.run_frame().unwrap();
    }
    let emu = sys.emulator();
    let watchdog = emu.board().watchdog();
    assert_eq!(watchdog.remaining, Some(watchdog.period - 1));
    // No reset happened: cycles accumulated over every frame.
    assert!(sys.total_cycles(CPU) >= emu.cycles_per_frame(CPU) * 5);
}

#[test]
fn test_reset_selects_first_bank() {
    let mut sys = board();
    sys.run_frame().unwrap();
    sys.reset();
    assert_eq!(sys.current_bank(), 0);
    assert_eq!(sys.cpu(CPU).unwrap().pc(), 0);
    assert_eq!(sys.name(), "bankswitch");
}

#[test]
fn test_bank_survives_save_state() {
    let mut a = board();
    a.run_frame().unwrap();
    let bank = a.current_bank();
    let mut blob = Vec::new();
    a.save_state(&mut blob).unwrap();

    let mut b = board();
    b.load_state(&mut blob.as_slice()).unwrap();
    assert_eq!(b.current_bank(), bank);
    assert_eq!(b.ram(), a.ram());
}
