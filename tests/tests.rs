use std::fs;
use std::path::Path;

use em7tdmi::{assemble, Controller, ProgramSource, UserInput};

const STEP_BUDGET: u64 = 1_000_000;
const BATCH: u32 = 4096;

/// Runs a guest program to its halt and checks the `;!` expectation
/// directives embedded in its source.
fn run_program(path: &Path) {
    let name = path.display();
    let source = fs::read_to_string(path).unwrap_or_else(|e| panic!("{}: {}", name, e));
    let program = assemble(&source).unwrap_or_else(|errors| {
        panic!(
            "{}: assembly failed:\n{}",
            name,
            errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n")
        )
    });
    let controller = Controller::new();
    controller
        .load_program(ProgramSource::Contents { contents: source })
        .unwrap_or_else(|e| panic!("{}: load failed: {:?}", name, e));

    loop {
        let before = controller.processor_info().steps;
        controller.step_times(BATCH);
        let info = controller.processor_info();
        if info.state != Ok("Running") {
            break;
        }
        assert_ne!(info.steps, before, "{}: program is stuck waiting for input", name);
        assert!(info.steps < STEP_BUDGET, "{}: program did not halt", name);
    }

    let info = controller.processor_info();
    match program.expectations.halts {
        Some(2) | None => assert_eq!(info.state, Ok("Stopped"), "{}: expected a clean halt", name),
        Some(n) => assert_eq!(
            info.state,
            Err(format!("SWI {}", n)),
            "{}: expected a halt through SWI {}",
            name,
            n
        ),
    }
    if let Some(expected) = &program.expectations.output {
        assert_eq!(&info.output, expected, "{}: output mismatch", name);
    }
    let regs = controller.registers().regs;
    for (r, expected) in &program.expectations.registers {
        assert_eq!(
            regs[*r], *expected,
            "{}: r{} is {:#x}, expected {:#x}",
            name, r, regs[*r], expected
        );
    }
}

#[test]
fn guest_programs_meet_their_expectations() {
    let dir = Path::new("tests").join("programs");
    let mut paths: Vec<_> = fs::read_dir(&dir)
        .expect("tests/programs should exist")
        .map(|entry| entry.unwrap().path())
        .filter(|p| p.extension().map_or(false, |e| e == "s"))
        .collect();
    paths.sort();
    assert!(!paths.is_empty());
    for path in paths {
        run_program(&path);
    }
}

fn load(controller: &Controller, source: &str) {
    controller
        .load_program(ProgramSource::Contents { contents: source.to_string() })
        .expect("program should load");
}

#[test]
fn step_times_zero_changes_nothing() {
    let controller = Controller::new();
    load(&controller, "mov r0, #1\nswi 2\n");
    let info_before = serde_json::to_value(controller.processor_info()).unwrap();
    let regs_before = controller.registers().regs;
    assert_eq!(controller.step_times(0), None);
    assert_eq!(serde_json::to_value(controller.processor_info()).unwrap(), info_before);
    assert_eq!(controller.registers().regs, regs_before);
}

#[test]
fn resets_follow_the_lifecycle() {
    let controller = Controller::new();
    load(&controller, "mov r5, #9\nstr r5, [r6, #0x100]\nswi 2\n");
    controller.step_times(10);
    assert_eq!(controller.registers().regs[5], 9);

    // soft reset: state running, pc 0, registers and memory preserved
    controller.reset(false);
    let info = controller.processor_info();
    assert_eq!(info.state, Ok("Running"));
    assert_eq!(controller.registers().regs[15], 0);
    assert_eq!(controller.registers().regs[5], 9);
    assert_eq!(controller.line_at(0).value, 0xe3a0_5009);

    // hard reset: all 37 registers zero, memory reads zero
    controller.reset(true);
    let regs = controller.registers().regs;
    assert_eq!(regs.len(), 37);
    assert!(regs.iter().all(|&r| r == 0));
    assert_eq!(controller.line_at(0).value, 0);
    assert_eq!(controller.processor_info().state, Ok("Running"));
}

#[test]
fn breakpoints_stop_without_retiring() {
    let controller = Controller::new();
    load(&controller, "mov r0, #1\nmov r1, #2\nmov r2, #3\nswi 2\n");
    controller.breakpoint(8, true);
    controller.step_times(100);
    let info = controller.processor_info();
    assert_eq!(info.state, Ok("Stopped"));
    assert_eq!(info.steps, 2);
    // the instruction under the breakpoint has not executed
    assert_eq!(controller.registers().regs[2], 0);
    assert_eq!(controller.registers().regs[15], 8);

    // acknowledging resumes through the breakpoint exactly once
    controller.hit_breakpoint();
    assert_eq!(controller.processor_info().state, Ok("Running"));
    controller.step_times(100);
    let info = controller.processor_info();
    assert_eq!(info.state, Ok("Stopped"));
    assert_eq!(controller.registers().regs[2], 3);

    // after a soft reset the same breakpoint hits again
    controller.reset(false);
    controller.step_times(100);
    assert_eq!(controller.processor_info().steps, 2);
    assert_eq!(controller.registers().regs[15], 8);
}

#[test]
fn input_flows_through_the_command_surface() {
    let controller = Controller::new();
    // read a character, echo it, then read a number
    load(&controller, "swi 1\nmov r4, r0\nswi 0\nswi 3\nmov r5, r0\nswi 2\n");
    assert_eq!(controller.step_times(100), None);
    let info = controller.processor_info();
    assert_eq!(info.state, Ok("Running"));
    assert_eq!(info.steps, 0);

    controller.set_user_input(UserInput { user_input: String::from("Q") });
    controller.step_times(100);
    // the character was consumed, now waiting on the number
    assert_eq!(controller.registers().regs[4], 'Q' as u32);

    controller.set_user_input(UserInput { user_input: String::from("19\n") });
    let echo = controller.step_times(100);
    assert_eq!(echo, Some(String::new()));
    assert_eq!(controller.registers().regs[5], 19);
    assert_eq!(controller.processor_info().state, Ok("Stopped"));
    // swi 0 echoed the character read first
    assert_eq!(controller.processor_info().output, "Q");
}

#[test]
fn cpsr_sits_at_slot_31() {
    let controller = Controller::new();
    // set all four flags, then read the flat view
    load(&controller, "msr cpsr_flg, #0xf0000000\nswi 2\n");
    controller.step_times(10);
    let regs = controller.registers().regs;
    assert_eq!(regs[31] >> 28, 0xf);
}

#[test]
fn faults_stay_until_reset() {
    let controller = Controller::new();
    load(&controller, "dw 0xe7f000f0\n");
    controller.step_times(5);
    let info = controller.processor_info();
    assert_eq!(info.state, Err(String::from("undefined instruction")));
    // further stepping is a no-op
    controller.step_times(5);
    assert_eq!(controller.processor_info().steps, 0);
    controller.reset(false);
    assert_eq!(controller.processor_info().state, Ok("Running"));
}
