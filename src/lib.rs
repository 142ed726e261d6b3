//! An ARM7TDMI instruction-set emulator and debugger core: assembler,
//! ARM v4 decoder and executor, banked register file, sparse memory and a
//! software-interrupt terminal, all behind a small host command surface.
//!
//! The windowed debugger front-end is a separate concern; it talks to the
//! [`Controller`] exclusively through the commands below and observes
//! snapshots, never live references into the core.

use std::fs;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info};
use serde::{Deserialize, Serialize};

pub mod assembler;
pub mod disassembly;
pub mod fields;
pub mod instructions;
pub mod memory;
pub mod parser;
pub mod processor;
pub mod program;
pub mod registers;

pub use assembler::{assemble, AssembleError};
pub use processor::{State, CPU};
pub use program::Program;

use disassembly::PrettyInstr;
use fields::Condition;
use parser::parse_instruction;
use registers::REGISTER_COUNT;

/// One assembly diagnostic, as delivered to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub line_number: u32,
    pub error: String,
}

impl From<AssembleError> for Diagnostic {
    fn from(e: AssembleError) -> Self {
        Diagnostic { line_number: e.line_number, error: e.message }
    }
}

/// Input of `load_program`: a path to read, or the source text itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgramSource {
    Path { path: String },
    Contents { contents: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessorInfo {
    pub file: Option<String>,
    pub state: Result<&'static str, String>,
    pub previous_pc: u32,
    pub current_cond: &'static str,
    pub steps: u64,
    pub nonseq_cycles: u64,
    pub seq_cycles: u64,
    pub internal_cycles: u64,
    pub output: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterSnapshot {
    pub regs: Vec<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineInfo {
    pub value: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instr: Option<PrettyInstr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserInput {
    #[serde(rename = "userInput")]
    pub user_input: String,
}

struct Session {
    cpu: CPU,
    program: Option<Program>,
    file: Option<String>,
}

/// Owns the processor and serializes every command against it. All mutating
/// entry points run to completion under the one lock; queries take the same
/// lock and return consistent snapshots.
pub struct Controller {
    session: Mutex<Session>,
}

impl Controller {
    pub fn new() -> Self {
        Controller {
            session: Mutex::new(Session { cpu: CPU::new(), program: None, file: None }),
        }
    }

    fn session(&self) -> MutexGuard<Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Assembles and loads a program. On success the old program is gone,
    /// memory holds the new image and the processor is soft-reset; on any
    /// assembly error nothing is loaded and the full list comes back.
    pub fn load_program(&self, source: ProgramSource) -> Result<(), Vec<Diagnostic>> {
        let (text, file) = match source {
            ProgramSource::Path { path } => match fs::read_to_string(&path) {
                Ok(text) => (text, Some(path)),
                Err(e) => {
                    return Err(vec![Diagnostic { line_number: 0, error: format!("cannot read {}: {}", path, e) }])
                }
            },
            ProgramSource::Contents { contents } => (contents, None),
        };
        let program = assemble(&text).map_err(|errors| errors.into_iter().map(Diagnostic::from).collect::<Vec<_>>())?;
        info!(
            "loaded {} ({} bytes, {} symbols)",
            file.as_deref().unwrap_or("<memory>"),
            program.image.len(),
            program.symbols.len()
        );
        let mut session = self.session();
        session.cpu.mem.clear();
        session.cpu.mem.load_image(&program.image);
        session.cpu.reset(false);
        session.program = Some(program);
        session.file = file;
        Ok(())
    }

    /// Soft reset restarts execution at 0 with memory and general registers
    /// untouched; hard reset clears the processor and drops the program.
    pub fn reset(&self, hard: bool) {
        let mut session = self.session();
        session.cpu.reset(hard);
        if hard {
            session.program = None;
            session.file = None;
        }
        debug!("reset (hard: {})", hard);
    }

    /// Executes at most `steps` instructions; returns the remaining input
    /// buffer when the program consumed terminal input during the batch.
    pub fn step_times(&self, steps: u32) -> Option<String> {
        self.session().cpu.step_times(steps)
    }

    pub fn processor_info(&self) -> ProcessorInfo {
        let session = self.session();
        ProcessorInfo {
            file: session.file.clone(),
            state: session.cpu.state.as_result(),
            previous_pc: session.cpu.previous_pc,
            current_cond: session.cpu.current_cond.name(),
            steps: session.cpu.steps,
            nonseq_cycles: session.cpu.nonseq_cycles,
            seq_cycles: session.cpu.seq_cycles,
            internal_cycles: session.cpu.internal_cycles,
            output: session.cpu.output_text().to_string(),
        }
    }

    /// The flat 37-slot register view in the physical layout order.
    pub fn registers(&self) -> RegisterSnapshot {
        let snapshot = self.session().cpu.regs.snapshot();
        debug_assert_eq!(snapshot.len(), REGISTER_COUNT);
        RegisterSnapshot { regs: snapshot.to_vec() }
    }

    /// The memory word at `addr` with its disassembly and the source-line
    /// comment, if the address falls inside the loaded program.
    pub fn line_at(&self, addr: u32) -> LineInfo {
        let session = self.session();
        let value = session.cpu.mem.read_word(addr & !3);
        let instr = parse_instruction(value)
            .map(|i| disassembly::pretty(&i, Condition::from_bits(value >> 28), addr & !3));
        let comment = session
            .program
            .as_ref()
            .and_then(|p| p.line_at(addr))
            .and_then(|line| line.comment.as_ref())
            .map(|c| c.trim().to_string());
        LineInfo { value, instr, comment }
    }

    pub fn breakpoint(&self, addr: u32, set: bool) {
        self.session().cpu.set_breakpoint(addr, set);
    }

    /// Acknowledges a breakpoint stop so that resuming does not immediately
    /// re-stop on the same instruction.
    pub fn hit_breakpoint(&self) {
        self.session().cpu.acknowledge_breakpoint();
    }

    pub fn set_user_input(&self, input: UserInput) {
        self.session().cpu.set_user_input(&input.user_input);
    }

    /// JSON command dispatch, the shape the host transport speaks. Unknown
    /// commands and malformed payloads come back as `Err` values.
    pub fn dispatch(&self, command: &str, payload: serde_json::Value) -> serde_json::Value {
        use serde_json::{json, Value};
        fn field<T: serde::de::DeserializeOwned>(payload: &Value, name: &str) -> Result<T, Value> {
            serde_json::from_value(payload.get(name).cloned().unwrap_or(Value::Null))
                .map_err(|e| json!({ "Err": format!("bad `{}` field: {}", name, e) }))
        }
        let result = match command {
            "load_program" => match serde_json::from_value::<ProgramSource>(payload) {
                Ok(source) => match self.load_program(source) {
                    Ok(()) => Ok(json!("Ok")),
                    Err(diags) => Ok(json!({ "Err": diags })),
                },
                Err(e) => Err(json!({ "Err": format!("bad payload: {}", e) })),
            },
            "reset" => field::<bool>(&payload, "hard").map(|hard| {
                self.reset(hard);
                json!("Ok")
            }),
            "step_times" => field::<u32>(&payload, "steps").map(|steps| json!(self.step_times(steps))),
            "processor_info" => Ok(json!(self.processor_info())),
            "registers" => Ok(json!(self.registers())),
            "line_at" => field::<u32>(&payload, "addr").map(|addr| json!(self.line_at(addr))),
            "breakpoint" => field::<u32>(&payload, "addr").and_then(|addr| {
                field::<bool>(&payload, "set").map(|set| {
                    self.breakpoint(addr, set);
                    json!("Ok")
                })
            }),
            "hit_breakpoint" => {
                self.hit_breakpoint();
                Ok(json!("Ok"))
            }
            "set_user_input" => match serde_json::from_value::<UserInput>(payload) {
                Ok(input) => {
                    self.set_user_input(input);
                    Ok(json!("Ok"))
                }
                Err(e) => Err(json!({ "Err": format!("bad payload: {}", e) })),
            },
            _ => Err(json!({ "Err": format!("unknown command `{}`", command) })),
        };
        match result {
            Ok(value) | Err(value) => value,
        }
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}
