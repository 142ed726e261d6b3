// armdbg: an interactive terminal debugger on top of the em7tdmi core. The
// whole interface goes through the Controller command surface; this binary
// only draws panels and forwards commands.

use std::collections::HashSet;
use std::env;
use std::io;
use std::io::prelude::*;

use termion::{clear, color, cursor};

use em7tdmi::fields::Condition;
use em7tdmi::parser::parse_instruction;
use em7tdmi::{Controller, ProgramSource, UserInput};

const DISASSEMBLY_LINES: u32 = 12;
const RUN_BATCH: u32 = 1024;

struct Debugger {
    controller: Controller,
    breakpoints: HashSet<u32>,
    last_cmd: Command,
}

#[derive(PartialEq, Clone)]
enum Command {
    Quit,
    Step,
    Continue,
    SetBreakpoint(Option<String>),
    DeleteBreakpoint(Option<String>),
    Reset(bool),
    Load(Option<String>),
    Input(String),
    Nothing,
}

fn main() {
    env_logger::init();
    let mut debugger = Debugger {
        controller: Controller::new(),
        breakpoints: HashSet::new(),
        last_cmd: Command::Step,
    };
    if let Some(path) = env::args().nth(1) {
        debugger.load(&path);
    }
    debugger.run();
}

impl Debugger {
    fn run(&mut self) {
        loop {
            self.draw_user_interface();
            match self.get_command() {
                Command::Quit => break,
                Command::Step => {
                    self.resume_if_stopped_on_breakpoint();
                    self.controller.step_times(1);
                    self.last_cmd = Command::Step;
                }
                Command::Continue => {
                    self.resume_if_stopped_on_breakpoint();
                    self.continue_running();
                    self.last_cmd = Command::Continue;
                }
                Command::SetBreakpoint(addr) => self.set_breakpoint(&addr, true),
                Command::DeleteBreakpoint(addr) => self.set_breakpoint(&addr, false),
                Command::Reset(hard) => {
                    self.controller.reset(hard);
                }
                Command::Load(Some(path)) => self.load(&path),
                Command::Load(None) => println!("usage: l <file>"),
                Command::Input(text) => {
                    self.controller.set_user_input(UserInput { user_input: text });
                }
                Command::Nothing => {}
            }
        }
    }

    fn load(&mut self, path: &str) {
        match self.controller.load_program(ProgramSource::Path { path: path.to_string() }) {
            Ok(()) => {}
            Err(diagnostics) => {
                println!("{}{}Assembly failed:", clear::All, cursor::Goto(1, 1));
                for d in diagnostics {
                    println!("  line {}: {}", d.line_number, d.error);
                }
                pause();
            }
        }
    }

    /// The host-side play loop: keep stepping in batches until the core
    /// stops, faults or waits for terminal input.
    fn continue_running(&mut self) {
        loop {
            let before = self.controller.processor_info().steps;
            self.controller.step_times(RUN_BATCH);
            let info = self.controller.processor_info();
            if info.state != Ok("Running") {
                break;
            }
            if info.steps == before {
                // no progress while running: the program waits for input
                break;
            }
        }
    }

    fn resume_if_stopped_on_breakpoint(&mut self) {
        let info = self.controller.processor_info();
        if info.state == Ok("Stopped") && self.breakpoints.contains(&self.pc()) {
            self.controller.hit_breakpoint();
        }
    }

    fn set_breakpoint(&mut self, addr: &Option<String>, set: bool) {
        match addr.as_ref().and_then(|a| u32::from_str_radix(a.trim_start_matches("0x"), 16).ok()) {
            Some(addr) => {
                let addr = addr & !3;
                self.controller.breakpoint(addr, set);
                if set {
                    self.breakpoints.insert(addr);
                } else {
                    self.breakpoints.remove(&addr);
                }
            }
            None => {
                println!("Invalid address!");
                pause();
            }
        }
    }

    fn pc(&self) -> u32 {
        self.controller.registers().regs[15]
    }

    fn get_command(&mut self) -> Command {
        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            return Command::Quit;
        }
        let mut cmd = input.split_whitespace();
        match cmd.next() {
            Some("q") => Command::Quit,
            Some("s") | Some("n") => Command::Step,
            Some("c") => Command::Continue,
            Some("b") => Command::SetBreakpoint(cmd.next().map(String::from)),
            Some("d") => Command::DeleteBreakpoint(cmd.next().map(String::from)),
            Some("r") => Command::Reset(false),
            Some("R") => Command::Reset(true),
            Some("l") => Command::Load(cmd.next().map(String::from)),
            Some("i") => {
                let rest: Vec<&str> = cmd.collect();
                Command::Input(rest.join(" "))
            }
            Some(_) => Command::Nothing,
            None => self.last_cmd.clone(),
        }
    }

    fn draw_user_interface(&self) {
        let info = self.controller.processor_info();
        let regs = self.controller.registers().regs;
        print!("{}{}", clear::All, cursor::Goto(1, 1));
        println!("╔═════╤══════════╤═════╤══════════╗");
        for j in 0..8 {
            println!(
                "║ r{j:<2}│ {a:08x} │ r{k:<2}│ {b:08x} ║",
                j = j,
                a = regs[j],
                k = j + 8,
                b = regs[j + 8],
            );
        }
        let cpsr = regs[31];
        println!("╟─────┴─┬─┬─┬─┬──┴─────┴──────────╢");
        println!(
            "║ NZCV  │{}│{}│{}│{}│ mode {:05b}        ║",
            cpsr >> 31 & 1,
            cpsr >> 30 & 1,
            cpsr >> 29 & 1,
            cpsr >> 28 & 1,
            cpsr & 0x1f,
        );
        println!("╚═══════╧═╧═╧═╧═╧════════════════════╝");
        let state = match &info.state {
            Ok(name) => (*name).to_string(),
            Err(msg) => format!("Error: {}", msg),
        };
        println!(
            "{} │ steps {} │ ~{:.2} µs",
            state,
            info.steps,
            (2 * info.nonseq_cycles + info.seq_cycles + info.internal_cycles) as f64 / 100.0,
        );
        self.draw_disassembly(regs[15]);
        if !info.output.is_empty() {
            println!("─── output ───");
            println!("{}", info.output);
        }
        println!("\nn step, c continue, b/d <addr> breakpoints, i <text> input, r/R reset, l <file> load, q quit");
        print!("> ");
        io::stdout().flush().unwrap_or(());
    }

    fn draw_disassembly(&self, pc: u32) {
        let start = pc.saturating_sub(8);
        for i in 0..DISASSEMBLY_LINES {
            let addr = start + i * 4;
            let line = self.controller.line_at(addr);
            let text = match parse_instruction(line.value) {
                Some(instr) => instr.as_asm(Condition::from_bits(line.value >> 28), addr),
                None => String::from("dw"),
            };
            let marker = if self.breakpoints.contains(&addr) {
                format!("{}*{}", color::Fg(color::Red), color::Fg(color::Reset))
            } else {
                String::from(" ")
            };
            let arrow = if addr == pc {
                format!("{}>{}", color::Fg(color::Green), color::Fg(color::Reset))
            } else {
                String::from(" ")
            };
            let comment = match line.comment {
                Some(comment) => format!("  ; {}", comment),
                None => String::new(),
            };
            println!("{}{}{:08x} │ {:08x} │ {:<32}{}", marker, arrow, addr, line.value, text, comment);
        }
    }
}

fn pause() {
    let mut stdout = io::stdout();
    stdout.write_all(b"Press Enter to continue...").unwrap_or(());
    stdout.flush().unwrap_or(());
    let _ = io::stdin().read(&mut [0]);
}
