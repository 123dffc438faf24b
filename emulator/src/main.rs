mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use bridge_core::country::DEFAULT_COUNTRY;
use session::Session;

const USAGE: &str = "Usage: bridge-emulator [--country <index>] [--transcript <path>]";

struct Options {
    country: u8,
    transcript: Option<PathBuf>,
}

fn main() -> io::Result<()> {
    let options = parse_options().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(options.country, options.transcript.as_deref())?;
    let mut line = String::new();

    writeln!(
        writer,
        "POTS bridge emulator ready. Type `help` for commands or `exit` to quit."
    )?;
    for reply in session.start()?.lines {
        writeln!(writer, "{reply}")?;
    }

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let response = session.handle_command(&line)?;
        for reply in &response.lines {
            writeln!(writer, "{reply}")?;
        }
        if response.quit {
            break;
        }
    }

    Ok(())
}

fn parse_options() -> Result<Options, String> {
    let mut options = Options {
        country: DEFAULT_COUNTRY,
        transcript: None,
    };
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--country=") {
            options.country = parse_country(value)?;
        } else if arg == "--country" {
            let value = args.next().ok_or("Expected value after --country")?;
            options.country = parse_country(&value)?;
        } else if let Some(value) = arg.strip_prefix("--transcript=") {
            options.transcript = Some(PathBuf::from(value));
        } else if arg == "--transcript" {
            let value = args.next().ok_or("Expected value after --transcript")?;
            options.transcript = Some(PathBuf::from(value));
        } else {
            return Err(format!("Unknown argument `{arg}`"));
        }
    }
    Ok(options)
}

fn parse_country(value: &str) -> Result<u8, String> {
    value
        .parse()
        .map_err(|_| format!("Country index `{value}` is not a number"))
}
