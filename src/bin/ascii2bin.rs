//! Convert an ASCII timed word to the binary format
//!
//! Reads `<char> <decimal>` lines from stdin (or a file argument) and
//! writes the symbol byte plus the timestamp as a little-endian IEEE-754
//! double to stdout, with no framing.

#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};

use anyhow::Context;

use timegrep::{LazyWord, WordFormat, WordSource};

fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1);
    let reader: Box<dyn BufRead> = match path.as_deref() {
        Some(p) => Box::new(BufReader::new(
            File::open(p).with_context(|| format!("open timed word {p}"))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let mut word = LazyWord::new(reader, WordFormat::Ascii);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut n = 0usize;
    while word.fetch(n).context("read timed word")? {
        let (symbol, t) = word.get(n);
        out.write_all(&[symbol])?;
        out.write_all(&t.to_le_bytes())?;
        word.set_front(n);
        n += 1;
    }
    out.flush()?;
    Ok(())
}
