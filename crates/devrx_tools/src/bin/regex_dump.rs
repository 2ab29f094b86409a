use anyhow::{Context, Result};
use clap::Parser;
use devrx::regex::detail::ProgramImpl;
use devrx::{CaptureGroups, RegexFlags, RegexProgram};

/// Compile a regex pattern and dump the resulting program.
#[derive(Debug, Parser)]
#[command(name = "regex_dump", version)]
struct Args {
    /// Pattern to compile
    pattern: String,

    /// `^`/`$` match at line terminators
    #[arg(short, long)]
    multiline: bool,

    /// `.` matches line terminators
    #[arg(short, long)]
    dotall: bool,

    /// Case-insensitive matching
    #[arg(short, long)]
    ignorecase: bool,

    /// Restrict \d \w \s \b to ASCII
    #[arg(short, long)]
    ascii: bool,

    /// Treat \r, \r\n and U+0085/U+2028/U+2029 as line terminators
    #[arg(long)]
    ext_newline: bool,

    /// Drop capture groups from the compiled program
    #[arg(long)]
    non_capture: bool,

    /// Thread counts to size working memory for
    #[arg(short, long, value_delimiter = ',', default_values_t = [1usize, 32, 1024, 65536])]
    threads: Vec<usize>,

    /// Print the program metadata as JSON instead of a listing
    #[arg(long)]
    json: bool,
}

impl Args {
    fn flags(&self) -> RegexFlags {
        let mut flags = RegexFlags::DEFAULT;
        flags.set(RegexFlags::MULTILINE, self.multiline);
        flags.set(RegexFlags::DOTALL, self.dotall);
        flags.set(RegexFlags::IGNORECASE, self.ignorecase);
        flags.set(RegexFlags::ASCII, self.ascii);
        flags.set(RegexFlags::EXT_NEWLINE, self.ext_newline);
        flags
    }

    fn capture(&self) -> CaptureGroups {
        if self.non_capture {
            CaptureGroups::NonCapture
        } else {
            CaptureGroups::Extract
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::debug!(?args, "regex_dump starting");
    let program = RegexProgram::create(&args.pattern, args.flags(), args.capture())
        .with_context(|| format!("compiling '{}'", args.pattern))?;

    if args.json {
        let info = program.info();
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    dump_program(&program, &args.threads)
}

fn dump_program(program: &RegexProgram, threads: &[usize]) -> Result<()> {
    let info = program.info();
    println!("=== {} ===", info.pattern);
    println!(
        "flags: {}, capture: {}, instructions: {}, groups: {}, tier: {:?}",
        info.flags, info.capture, info.instructions_count, info.groups_count, info.tier
    );
    println!("thread state: {} bytes", info.thread_state_size);
    for &n in threads {
        println!("  {:>8} threads -> {} bytes", n, program.compute_working_memory_size(n));
    }
    println!();

    let compiled = program.get_impl().context("program has no compiled form")?;
    dump_classes(compiled);
    dump_code(compiled);
    Ok(())
}

fn dump_classes(compiled: &ProgramImpl) {
    if compiled.classes().is_empty() {
        return;
    }
    println!("classes:");
    for (i, class) in compiled.classes().iter().enumerate() {
        let ascii = if class.is_ascii() { " ascii" } else { "" };
        println!("  {:>4}  {}{}", i, class, ascii);
    }
    println!();
}

fn dump_code(compiled: &ProgramImpl) {
    println!("code:");
    for (pc, instr) in compiled.instructions().iter().enumerate() {
        let marker = if pc == compiled.start_pc() { ">" } else { " " };
        println!("{} {:>4}  {:#018x}  {}", marker, pc, instr.as_u64(), instr);
    }
}
