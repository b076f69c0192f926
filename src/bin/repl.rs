use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use charm::config::ReplConfig;
use charm::{Environment, Object, TokenKind, builtins, evaluate, logging, parse_str, tokenize};
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, Completer, Context, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};
use rustyline::{Helper, Highlighter, Hinter, Validator};

const KEYWORDS: &[&str] = &["func", "if", "else", "return", "while", "true", "false"];

struct CharmCompleter {
    env: Rc<RefCell<Environment>>,
}

impl CharmCompleter {
    fn new(env: Rc<RefCell<Environment>>) -> Self {
        CharmCompleter { env }
    }

    fn candidates(&self) -> HashSet<String> {
        let mut candidates = self.env.borrow().get_identifiers();
        candidates.extend(KEYWORDS.iter().map(|k| k.to_string()));
        candidates.extend(builtins::names().map(str::to_string));
        candidates
    }
}

impl rustyline::completion::Completer for CharmCompleter {
    type Candidate = String;
    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let Ok(tokens) = tokenize(&line[..pos]) else {
            return Ok((pos, vec![]));
        };
        // The word being typed is the last real token, ending at the cursor
        let prefix = tokens.iter().rev().find_map(|token| match &token.kind {
            TokenKind::Ident(name) if token.span.end == pos => Some(name.clone()),
            _ => None,
        });
        let Some(prefix) = prefix else {
            return Ok((pos, vec![]));
        };

        let mut completions: Vec<String> = self
            .candidates()
            .into_iter()
            .filter(|id| id.starts_with(&prefix) && id.len() > prefix.len())
            .map(|id| id[prefix.len()..].to_string())
            .collect();
        completions.sort();
        Ok((pos, completions))
    }
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct InputValidator {
    #[rustyline(Validator)]
    validator: CharmValidator,
    #[rustyline(Highlighter)]
    highlighter: CharmHighlighter,
    #[rustyline(Completer)]
    completer: CharmCompleter,
}

fn closes(opening: char, closing: char) -> bool {
    matches!((opening, closing), ('(', ')') | ('[', ']') | ('{', '}'))
}

struct CharmValidator;

impl Validator for CharmValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let input = ctx.input();
        let mut stack = Vec::new();
        let mut in_string = false;
        let mut escape = false;
        let mut in_comment = false;
        let mut previous = None;

        for (i, c) in input.chars().enumerate() {
            if in_comment {
                in_comment = c != '\n';
                continue;
            }
            if in_string {
                if escape {
                    escape = false;
                } else if c == '\\' {
                    escape = true;
                } else if c == '"' {
                    in_string = false;
                }
                continue;
            }

            match c {
                '"' => in_string = true,
                '/' if previous == Some('/') => in_comment = true,
                '(' | '[' | '{' => stack.push(c),
                ')' | ']' | '}' => match stack.pop() {
                    Some(opening) if closes(opening, c) => {}
                    _ => {
                        return Ok(ValidationResult::Invalid(Some(format!(
                            "  - Unmatched '{}' at position {}",
                            c, i
                        ))));
                    }
                },
                _ => {}
            }
            previous = Some(c);
        }

        if in_string || !stack.is_empty() {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

struct CharmHighlighter;

impl Highlighter for CharmHighlighter {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        let mut stack: Vec<(char, usize, usize)> = Vec::new();
        let mut highlighted = String::new();
        let mut in_string = false;
        let mut escape = false;
        let near_cursor = |i: usize| i + 1 == pos || i == pos;

        for (i, c) in line.char_indices() {
            if in_string {
                if escape {
                    escape = false;
                } else if c == '\\' {
                    escape = true;
                } else if c == '"' {
                    in_string = false;
                }
                highlighted.push_str(&format!("\x1b[32m{}\x1b[0m", c)); // Green for strings
                continue;
            }

            match c {
                '"' => {
                    in_string = true;
                    highlighted.push_str(&format!("\x1b[32m{}\x1b[0m", c));
                }
                '(' | '[' | '{' => {
                    stack.push((c, i, highlighted.len()));
                    highlighted.push(c);
                }
                ')' | ']' | '}' => match stack.pop() {
                    Some((opening, source_pos, out_pos)) if closes(opening, c) => {
                        if near_cursor(source_pos) || near_cursor(i) {
                            // Blue for the bracket pair at the cursor
                            highlighted.push_str(&format!("\x1b[34m{}\x1b[0m", c));
                            highlighted.replace_range(
                                out_pos..out_pos + opening.len_utf8(),
                                &format!("\x1b[1;34m{}\x1b[0m", opening),
                            );
                        } else {
                            highlighted.push(c);
                        }
                    }
                    Some((opening, _, out_pos)) => {
                        highlighted.push_str(&format!("\x1b[31m{}\x1b[0m", c)); // Red for mismatches
                        highlighted.replace_range(
                            out_pos..out_pos + opening.len_utf8(),
                            &format!("\x1b[1;31m{}\x1b[0m", opening),
                        );
                    }
                    None => highlighted.push_str(&format!("\x1b[31m{}\x1b[0m", c)),
                },
                _ => highlighted.push(c),
            }
        }

        Cow::Owned(highlighted)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn main() -> rustyline::Result<()> {
    logging::init();
    let config = ReplConfig::from_env();

    println!("Charm REPL v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl-D to quit.");

    let global_env = Environment::new();
    let h = InputValidator {
        highlighter: CharmHighlighter,
        validator: CharmValidator,
        completer: CharmCompleter::new(global_env.clone()),
    };
    let editor_config = rustyline::config::Config::builder()
        .edit_mode(config.edit_mode)
        .build();
    let mut rl = Editor::with_config(editor_config)?;
    rl.set_helper(Some(h));
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('s'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    if rl.load_history(&config.history_file).is_err() {
        println!("No previous history.");
    }

    loop {
        match rl.readline("charm> ") {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if input.eq_ignore_ascii_case("exit") {
                    break;
                }

                let (program, errors) = parse_str(input);
                if !errors.is_empty() {
                    for error in &errors {
                        if error.report("REPL", input).is_err() {
                            eprintln!("Parse Error: {}", error);
                        }
                    }
                    continue;
                }

                match evaluate(&program, &global_env) {
                    result @ Object::Error(_) => eprintln!("{}", result),
                    result => println!("{}", result),
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C
                println!("Interrupted. Type 'exit' or Ctrl-D to quit.");
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D
                println!("\nExiting.");
                break;
            }
            Err(err) => {
                tracing::error!(error = ?err, "readline failed");
                break;
            }
        }
    }

    if let Err(err) = rl.save_history(&config.history_file) {
        tracing::error!(
            error = %err,
            path = %config.history_file.display(),
            "failed to save history"
        );
    }
    Ok(())
}
