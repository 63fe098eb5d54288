use std::io::{self, BufRead, Write};

use log::debug;
use thiserror::Error;

use crate::prompt::question::{Answers, Question, QuestionKind, Validate};

/// Typing this instead of an answer aborts the launch
pub static CANCEL: &str = ":q";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Launch cancelled by operator")]
    Cancelled,
    #[error("Can't talk to the terminal: {0}")]
    Io(#[from] io::Error),
}

/// Ask every question in order, re-asking until each answer is accepted
///
/// End of input or [CANCEL] on any question cancels the whole launch.
pub fn ask<R: BufRead, W: Write>(questions: &[Question],
                                 input: &mut R,
                                 output: &mut W) -> Result<Answers, PromptError> {
    let mut answers = Answers::default();
    for question in questions {
        let answer = match &question.kind {
            QuestionKind::Input { validator } => ask_input(question, *validator, input, output)?,
            QuestionKind::List { choices } => ask_list(question, choices, input, output)?,
        };
        debug!("Answer for {}: {}", question.name, answer);
        answers.values.insert(question.name.to_string(), answer);
    }
    Ok(answers)
}

fn ask_input<R: BufRead, W: Write>(question: &Question,
                                   validator: Option<&dyn Validate>,
                                   input: &mut R,
                                   output: &mut W) -> Result<String, PromptError> {
    loop {
        write!(output, "? {} ", question.message)?;
        output.flush()?;
        let candidate = read_answer(input)?;

        match validator {
            None => return Ok(candidate),
            Some(validator) => match validator.validate(&candidate)? {
                Ok(()) => return Ok(candidate),
                Err(message) => writeln!(output, ">> {message}")?,
            },
        }
    }
}

fn ask_list<R: BufRead, W: Write>(question: &Question,
                                  choices: &[String],
                                  input: &mut R,
                                  output: &mut W) -> Result<String, PromptError> {
    loop {
        writeln!(output, "? {}", question.message)?;
        for (i, choice) in choices.iter().enumerate() {
            writeln!(output, "  {}) {}", i + 1, choice)?;
        }
        write!(output, "Answer [1-{}]: ", choices.len())?;
        output.flush()?;
        let answer = read_answer(input)?;

        match answer.trim().parse::<usize>() {
            Ok(n) if n >= 1 && n <= choices.len() => return Ok(choices[n - 1].clone()),
            _ => writeln!(output, ">> Please enter a number between 1 and {}.", choices.len())?,
        }
    }
}

/// One line of input without its line ending
///
/// Other whitespace is part of the answer: free text is taken as typed.
fn read_answer<R: BufRead>(input: &mut R) -> Result<String, PromptError> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(PromptError::Cancelled);
    }
    let answer = line.strip_suffix('\n').unwrap_or(&line);
    let answer = answer.strip_suffix('\r').unwrap_or(answer);
    if answer.trim() == CANCEL {
        return Err(PromptError::Cancelled);
    }
    Ok(answer.to_string())
}
