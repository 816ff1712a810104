use std::cell::RefCell;
use std::error::Error;
use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use clap_num::maybe_hex;
use itertools::Itertools;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use rv32mcu::decode::Instr;
use rv32mcu::elf_image::ElfImage;
use rv32mcu::microcontroller::{Microcontroller, MicrocontrollerConfig};
use rv32mcu::peripherals::Timer;

/// Emulate a 32-bit RISC-V microcontroller
///
/// The ELF executable is loaded into ROM (addresses below
/// 0x10000000) and RAM (0x10000000 upwards), and execution starts
/// at the reset vector 0x200. Numeric arguments accept decimal or
/// 0x-prefixed hexadecimal.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about)]
struct Args {
    /// Path to input executable file
    input: PathBuf,

    /// The number of clock cycles to be emulated
    #[arg(short, long, default_value_t = 1_000_000)]
    cycles: u64,

    /// Size of the program ROM in 1 KiB pages
    #[arg(long, default_value_t = 64, value_parser = maybe_hex::<u32>)]
    rom_pages: u32,

    /// Size of the data RAM in 1 KiB pages
    #[arg(long, default_value_t = 64, value_parser = maybe_hex::<u32>)]
    ram_pages: u32,

    /// Attach a timer at this address
    #[arg(long, value_parser = maybe_hex::<u32>)]
    timer: Option<u32>,

    /// Interrupt line for the timer
    #[arg(long, default_value_t = 0)]
    timer_line: usize,

    /// Number of cycles between timesteps
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    timestep_every: u64,

    /// Stop when the pc reaches this address
    #[arg(long, value_parser = maybe_hex::<u32>)]
    stop_at: Option<u32>,

    /// Single step through each instruction at an interactive prompt
    #[arg(short, long)]
    debug: bool,

    /// Log every executed instruction
    #[arg(short, long)]
    verbose: bool,
}

enum Command {
    Step,
    Continue,
    Quit,
}

fn print_registers(mcu: &Microcontroller) {
    let registers = mcu.hart().registers.as_slice();
    for row in &registers.iter().enumerate().chunks(4) {
        println!(
            "{}",
            row.map(|(n, value)| format!("x{n:<2} = 0x{value:08x}"))
                .join("    ")
        );
    }
}

fn print_state(mcu: &Microcontroller) {
    let hart = mcu.hart();
    println!("pc = 0x{:08x}", hart.pc());
    println!(
        "mcause = 0x{:08x}, mepc = 0x{:08x}",
        hart.csr.mcause(),
        hart.csr.mepc()
    );
    print_registers(mcu);
}

/// Show the next instruction and wait for a command. Register dumps
/// and unknown input stay at the prompt.
fn prompt(editor: &mut DefaultEditor, mcu: &mut Microcontroller) -> Result<Command, ReadlineError> {
    let pc = mcu.hart().pc();
    match mcu.hart_mut().bus.fetch_instruction(pc) {
        Ok(word) => println!("0x{pc:08x}: {word:08x}  {}", Instr::decode(word)),
        Err(trap) => println!("0x{pc:08x}: {trap}"),
    }
    loop {
        let line = match editor.readline("(s)tep, (c)ontinue, (r)egisters, (q)uit> ") {
            Ok(line) => line,
            Err(ReadlineError::Eof | ReadlineError::Interrupted) => return Ok(Command::Quit),
            Err(err) => return Err(err),
        };
        let command = line.trim();
        if !command.is_empty() {
            editor.add_history_entry(command)?;
        }
        match command {
            "" | "s" => return Ok(Command::Step),
            "c" => return Ok(Command::Continue),
            "q" => return Ok(Command::Quit),
            "r" => print_state(mcu),
            other => println!("unknown command '{other}'"),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let default_filter = if args.verbose { "trace" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let image = ElfImage::from_file(&args.input)?;
    let mut mcu = Microcontroller::new(MicrocontrollerConfig {
        rom_pages: args.rom_pages,
        ram_pages: args.ram_pages,
    })?;
    if let Some(base) = args.timer {
        let timer = Rc::new(RefCell::new(Timer::new()));
        mcu.attach_peripheral(timer.clone(), base)?;
        mcu.register_interrupt(timer, args.timer_line)?;
    }
    mcu.load_elf(&image)?;
    mcu.reset();

    let mut editor = if args.debug {
        Some(DefaultEditor::new()?)
    } else {
        None
    };

    println!("Beginning execution\n");
    for cycle in 1..=args.cycles {
        if args.stop_at == Some(mcu.hart().pc()) {
            log::info!("reached stop address after {} cycles", cycle - 1);
            break;
        }
        if let Some(prompt_editor) = editor.as_mut() {
            match prompt(prompt_editor, &mut mcu)? {
                Command::Step => {}
                Command::Continue => editor = None,
                Command::Quit => break,
            }
        }
        if let Err(trap) = mcu.cycle() {
            log::debug!("cycle {cycle}: {trap}");
        }
        if cycle % args.timestep_every == 0 {
            mcu.timestep();
        }
    }

    print_state(&mcu);
    Ok(())
}
