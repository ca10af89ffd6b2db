//! Command-line timed pattern matcher
//!
//! Matches a pattern — a timed regular expression (`-e`) or a timed
//! automaton in DOT form (`-f`) — against a timed word read from a file
//! or stdin, printing one answer zone per match.
//!
//! Exit codes: 0 on a normal run, 1 on conflicting options or an I/O
//! failure, 2 on a malformed expression, 10 on an empty pattern.

#![forbid(unsafe_code)]

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::process::exit;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use timegrep::{
    dot, match_word, tre, AcceptancePolicy, AnswerPrinter, LazyWord, MatchError, TimedAutomaton,
    WordFormat,
};

const USAGE: &str = "\
usage: timegrep [OPTIONS] PATTERN [FILE]
       timegrep [OPTIONS] -e PATTERN [FILE]
       timegrep [OPTIONS] -f FILE [FILE]

options:
  -h, --help       print this help
  -V, --version    print the version
  -q               do not print the answer zones, only count them
  -a               ASCII timed-word input (default)
  -b               binary timed-word input
  -E               event mode (default)
  -S               signal mode
  -D               dollar mode
  -i FILE          timed-word input file (default: stdin)
  -f FILE          pattern timed automaton (DOT)
  -e EXPR          pattern timed regular expression";

fn die(msg: &str, code: i32) -> ! {
    eprintln!("timegrep: {msg}");
    exit(code);
}

#[derive(Default)]
struct Options {
    quiet: bool,
    ascii: bool,
    binary: bool,
    event: bool,
    signal: bool,
    dollar: bool,
    word_file: Option<String>,
    automaton_file: Option<String>,
    expression: Option<String>,
}

fn parse_args(args: &[String]) -> Options {
    let mut opts = Options::default();
    let mut it = args.iter();
    while let Some(a) = it.next() {
        match a.as_str() {
            "-h" | "--help" => {
                println!("{USAGE}");
                exit(0);
            }
            "-V" | "--version" => {
                println!("timegrep {}", env!("CARGO_PKG_VERSION"));
                exit(0);
            }
            "-q" => opts.quiet = true,
            "-a" => opts.ascii = true,
            "-b" => opts.binary = true,
            "-E" => opts.event = true,
            "-S" => opts.signal = true,
            "-D" => opts.dollar = true,
            "-i" => opts.word_file = it.next().cloned(),
            "-f" => opts.automaton_file = it.next().cloned(),
            "-e" => opts.expression = it.next().cloned(),
            other if !other.starts_with('-') => {
                if opts.automaton_file.is_none() && opts.expression.is_none() {
                    opts.expression = Some(other.to_string());
                } else if opts.word_file.is_none() {
                    opts.word_file = Some(other.to_string());
                } else {
                    die(&format!("unexpected argument `{other}`"), 1);
                }
            }
            other => die(&format!("unknown option `{other}` (see --help)"), 1),
        }
    }
    opts
}

fn load_pattern(opts: &Options) -> anyhow::Result<TimedAutomaton> {
    if let Some(path) = &opts.automaton_file {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read pattern automaton {path}"))?;
        match dot::parse_dot(&text) {
            Ok(ta) => Ok(ta),
            Err(e) => die(&e.to_string(), 1),
        }
    } else {
        let expr = opts.expression.as_deref().unwrap_or_default();
        match tre::parse(expr) {
            Ok(tre) => Ok(tre.to_event_ta()),
            Err(e) => die(&e.to_string(), 2),
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let opts = parse_args(&args);

    if opts.automaton_file.is_none() && opts.expression.is_none() {
        println!("{USAGE}");
        exit(0);
    }
    if opts.ascii && opts.binary {
        die("conflicting input formats specified", 1);
    }
    if opts.event && opts.signal {
        die("conflicting matching modes specified", 1);
    }
    if opts.automaton_file.is_some() && opts.expression.is_some() {
        die("both a timed automaton and an expression are specified", 1);
    }
    if opts.signal {
        die("signal mode is not supported; use event mode", 1);
    }

    if let Err(e) = run(&opts) {
        eprintln!("timegrep: {e:#}");
        exit(1);
    }
}

fn run(opts: &Options) -> anyhow::Result<()> {
    let ta = load_pattern(opts)?;
    let format = if opts.binary { WordFormat::Binary } else { WordFormat::Ascii };
    let policy =
        if opts.dollar { AcceptancePolicy::Dollar } else { AcceptancePolicy::Event };

    let reader: Box<dyn BufRead> = match opts.word_file.as_deref() {
        Some(path) if path != "stdin" => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("open timed word {path}"))?,
        )),
        _ => Box::new(BufReader::new(io::stdin())),
    };
    let mut word = LazyWord::new(reader, format);
    let mut sink = AnswerPrinter::new(io::stdout().lock(), opts.quiet);

    match match_word(&mut word, &ta, policy, &mut sink) {
        Ok(()) => Ok(()),
        Err(MatchError::PatternEmpty(e)) => die(&e.to_string(), 10),
        Err(MatchError::Word(e)) => Err(e.into()),
    }
}
