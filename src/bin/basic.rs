#[macro_use]
extern crate clap;

use std::fs;
use std::process;

use basic::{Interp, StdioHost};
use clap::Arg;

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))
        .unwrap();

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let matches = app_from_crate!()
        .arg(
            Arg::with_name("size")
                .short("s")
                .long("size")
                .takes_value(true)
                .value_name("BYTES")
                .help("Arena size in bytes (program text, variables, and stack share this)"),
        )
        .arg(
            Arg::with_name("PROGRAM")
                .help("A program listing to load before entering the prompt")
                .required(false)
                .index(1),
        )
        .get_matches();

    init_logging();

    let arena_size: usize = match matches.value_of("size") {
        Some(s) => match s.parse() {
            Ok(n) => n,
            Err(_) => {
                eprintln!("Invalid --size value: {}", s);
                process::exit(1);
            }
        },
        None => 8192,
    };

    let mut interp = Interp::new(arena_size, StdioHost::new());

    if let Some(path) = matches.value_of("PROGRAM") {
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(err) => {
                eprintln!("Reading program \"{}\" failed: {}", path, err);
                process::exit(1);
            }
        };
        for line in text.lines() {
            interp.process_line(line);
        }
    }

    interp.interactive_prompt();
}
