use charm::{Environment, Object, evaluate, logging, parse_str};
use std::path::PathBuf;
use std::process::ExitCode;
use std::{env, fs, io};
use thiserror::Error;

#[derive(Error, Debug)]
enum RunError {
    #[error("could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0} syntax error(s)")]
    Parse(usize),
    #[error("ERROR: {0}")]
    Runtime(String),
}

fn run(path: PathBuf) -> Result<Object, RunError> {
    let input = fs::read_to_string(&path).map_err(|source| RunError::Io {
        path: path.clone(),
        source,
    })?;

    let (program, errors) = parse_str(&input);
    if !errors.is_empty() {
        let source_name = path.display().to_string();
        for error in &errors {
            if let Err(io_err) = error.report(&source_name, &input) {
                tracing::warn!(%io_err, "could not print diagnostic");
                eprintln!("{}: {}", source_name, error);
            }
        }
        return Err(RunError::Parse(errors.len()));
    }

    match evaluate(&program, &Environment::new()) {
        Object::Error(message) => Err(RunError::Runtime(message)),
        result => Ok(result),
    }
}

fn main() -> ExitCode {
    logging::init();

    let Some(path) = env::args_os().nth(1).map(PathBuf::from) else {
        eprintln!("usage: charm <file>");
        return ExitCode::from(2);
    };

    match run(path) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            if let RunError::Io { .. } = err {
                tracing::error!(error = %err, "failed to load script");
            }
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}
