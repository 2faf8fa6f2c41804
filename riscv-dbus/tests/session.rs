use pretty_assertions::assert_eq;
use riscv_dbus::probe::fake_probe::FakeProbe;
use riscv_dbus::{
    BreakpointKind, Error, MemoryInterface, Probe, RegisterId, RiscvError, Session, SlotId,
    TargetRunState,
};
use riscv_dbus_target::csr;

fn attach(probe: &FakeProbe) -> Session {
    let _ = pretty_env_logger::try_init();

    Session::auto_attach(Probe::from_specific_probe(Box::new(probe.clone())), "esp32h2").unwrap()
}

#[test]
fn auto_attach_examines_target() {
    let probe = FakeProbe::new();
    let mut session = attach(&probe);

    assert!(session.core().is_examined());
    assert_eq!(session.chip().name, "esp32h2");
    assert_eq!(session.poll().unwrap(), TargetRunState::Running);
}

#[test]
fn unknown_chip_is_rejected() {
    let probe = FakeProbe::new();

    let result = Session::auto_attach(
        Probe::from_specific_probe(Box::new(probe.clone())),
        "esp32h7",
    );

    assert!(matches!(result, Err(Error::ChipNotFound(_))));
    assert_eq!(probe.dbus_scans(), 0);
}

#[test]
fn authentication_is_not_attempted() {
    let probe = FakeProbe::new();
    probe.set_authtype(1);

    let result = Session::auto_attach(
        Probe::from_specific_probe(Box::new(probe.clone())),
        "esp32h2",
    );

    assert!(matches!(
        result,
        Err(Error::Riscv(RiscvError::AuthenticationRequired { .. }))
    ));
    assert_eq!(probe.dbus_write_count(), 0);
}

#[test]
fn halt_step_resume() {
    let probe = FakeProbe::new();
    let mut session = attach(&probe);

    session.halt().unwrap();
    assert_eq!(session.poll().unwrap(), TargetRunState::Halted);

    let pc = session.read_register(RegisterId::Pc).unwrap();
    session.step().unwrap();
    assert_eq!(session.read_register(RegisterId::Pc).unwrap(), pc + 4);

    session.resume().unwrap();
    assert_eq!(session.poll().unwrap(), TargetRunState::Running);
    assert!(probe.is_running());
}

#[test]
fn registers_and_memory() {
    let probe = FakeProbe::new();
    probe.set_memory_word(0x4080_0000, 0xcafe_f00d);
    let mut session = attach(&probe);
    session.halt().unwrap();

    let sp: RegisterId = "sp".parse().unwrap();
    session.write_register(sp, 0x4084_fff0).unwrap();
    assert_eq!(session.read_register(sp).unwrap(), 0x4084_fff0);
    assert_eq!(probe.gpr(2), 0x4084_fff0);

    session
        .write_register(RegisterId::Csr(csr::MSCRATCH), 0x1234)
        .unwrap();
    assert_eq!(probe.csr(csr::MSCRATCH), 0x1234);

    assert_eq!(session.read_word_32(0x4080_0000).unwrap(), 0xcafe_f00d);

    session.write_32(0x4080_0100, &[1, 2, 3]).unwrap();
    let mut block = [0; 3];
    session.read_32(0x4080_0100, &mut block).unwrap();
    assert_eq!(block, [1, 2, 3]);
}

#[test]
fn registers_outside_the_chip_description_are_refused() {
    let probe = FakeProbe::new();
    let mut session = attach(&probe);
    session.halt().unwrap();

    let cycle = RegisterId::Csr(csr::CYCLE);
    assert!(matches!(
        session.read_register(cycle),
        Err(Error::RegisterNotAvailable(register)) if register == cycle
    ));

    let programs = probe.programs_run();
    assert!(session.write_register(cycle, 0).is_err());
    assert_eq!(probe.programs_run(), programs);
}

#[test]
fn misaligned_memory_access_is_refused() {
    let probe = FakeProbe::new();
    let mut session = attach(&probe);

    assert!(matches!(
        session.read_word_32(0x4080_0002),
        Err(Error::Riscv(RiscvError::MemoryNotAligned { address: 0x4080_0002, alignment: 4 }))
    ));
    assert!(matches!(
        session.write_word_32(0x1_0000_0000, 0),
        Err(Error::Riscv(RiscvError::AddressOutOfRange(_)))
    ));
}

#[test]
fn breakpoints_use_the_trigger_module() {
    let probe = FakeProbe::new();
    let mut session = attach(&probe);
    session.halt().unwrap();

    let slots: Vec<SlotId> = (0..4)
        .map(|n| session.add_breakpoint(0x4200_0000 + 4 * n).unwrap())
        .collect();
    assert_eq!(slots, vec![SlotId(0), SlotId(1), SlotId(2), SlotId(3)]);
    assert_eq!(probe.csr(csr::TDATA2), 0x4200_000c);

    assert!(matches!(
        session.add_breakpoint(0x4200_0010),
        Err(Error::BreakpointUnitsExceeded)
    ));

    let watchpoint = session
        .add_watchpoint(0x4080_0000, BreakpointKind::Store)
        .unwrap();
    assert_eq!(watchpoint, SlotId(4));
    assert_eq!(probe.csr(csr::TSELECT), 4);

    session.remove_breakpoint(SlotId(1)).unwrap();
    assert_eq!(probe.csr(csr::TSELECT), 1);
    assert_eq!(probe.csr(csr::TDATA1), 0);
    assert_eq!(session.add_breakpoint(0x4200_0020).unwrap(), SlotId(1));

    assert!(matches!(
        session.remove_breakpoint(SlotId(7)),
        Err(Error::InvalidTriggerSlot(SlotId(7)))
    ));
}

#[test]
fn detach_frees_all_triggers() {
    let probe = FakeProbe::new();
    let mut session = attach(&probe);
    session.halt().unwrap();

    session.add_breakpoint(0x4200_0000).unwrap();
    session
        .add_watchpoint(0x4080_0000, BreakpointKind::Access)
        .unwrap();

    session.detach().unwrap();
    assert_eq!(probe.csr(csr::TDATA1), 0);

    // Nothing is bound any more, so the next trigger is the first one again.
    assert_eq!(session.add_breakpoint(0x4200_0004).unwrap(), SlotId(0));
}

#[test]
fn semihosting_is_attached_for_espressif_chips() {
    let probe = FakeProbe::new();
    let mut session = attach(&probe);

    session.prepare_semihosting().unwrap();

    assert_eq!(probe.memory_writes().len(), 8);
}
