use std::env;
use std::process::exit;

use lox::Error;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    match &args[..] {
        [_, file_path] => match lox::run_file(file_path) {
            Ok(()) => {}
            Err(Error::Runtime { .. }) => exit(70),
            Err(Error::Parse) => exit(65),
            Err(Error::Return { .. }) => unreachable!("a top-level return never escapes the interpreter"),
            Err(Error::Io(e)) => {
                eprintln!("{e}");
                exit(74)
            }
        },
        [_] => lox::run_prompt()?,
        _ => {
            eprintln!("Usage: lox-interpreter-rs [script]");
            exit(64)
        }
    }
    Ok(())
}
