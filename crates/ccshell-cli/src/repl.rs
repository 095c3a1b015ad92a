//! Line-oriented editing session.
//!
//! Plain lines are appended to the source buffer. Lines starting with `:` are
//! commands.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use ccshell_core::{ArtifactProbe, ProcessRunner, ShellError, ShellSession};

const HELP: &str = "\
commands:
  :open <path>   load a C source file into the buffer
  :compile       compile the buffer
  :show          print the buffer
  :clear         empty the buffer
  :save <png>    write the last AST image
  :help          show this help
  :exit, :quit   leave the shell";

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Open(&'a str),
    Compile,
    Show,
    Clear,
    Save(&'a str),
    Help,
    Exit,
    Unknown(&'a str),
    Line(&'a str),
}

fn parse(line: &str) -> Command<'_> {
    let Some(rest) = line.strip_prefix(':') else {
        return Command::Line(line);
    };
    let (name, arg) = match rest.trim().split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest.trim(), ""),
    };
    match (name, arg) {
        ("open", path) if !path.is_empty() => Command::Open(path),
        ("save", path) if !path.is_empty() => Command::Save(path),
        ("compile", _) => Command::Compile,
        ("show", _) => Command::Show,
        ("clear", _) => Command::Clear,
        ("help", _) => Command::Help,
        ("exit" | "quit", _) => Command::Exit,
        _ => Command::Unknown(rest),
    }
}

/// Drive `session` from `input` until `:exit` or end of input.
pub async fn run<R, P, In, Out>(
    session: &mut ShellSession<R, P>,
    input: In,
    mut out: Out,
) -> Result<()>
where
    R: ProcessRunner + 'static,
    P: ArtifactProbe + 'static,
    In: AsyncBufRead + Unpin,
    Out: Write,
{
    writeln!(out, "ccshell {} - type :help for commands", ccshell_core::VERSION)?;

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        match parse(&line) {
            Command::Line(text) => session.append_line(text),
            Command::Open(path) => {
                // Failures are reported through the log sink.
                let _ = session.open_file(Path::new(path)).await;
            }
            Command::Compile => match session.compile().await {
                Ok(report) => {
                    if let Some(image) = report.image() {
                        writeln!(out, "AST image ready ({}x{})", image.width, image.height)?;
                    }
                }
                Err(ShellError::Busy) => writeln!(out, "a compile is already running")?,
                Err(e) => writeln!(out, "compile failed: {e}")?,
            },
            Command::Show => write!(out, "{}", session.buffer())?,
            Command::Clear => session.clear_buffer(),
            Command::Save(path) => match session.save_image(Path::new(path)) {
                Ok(()) => writeln!(out, "saved {path}")?,
                Err(e) => writeln!(out, "save failed: {e}")?,
            },
            Command::Help => writeln!(out, "{HELP}")?,
            Command::Exit => break,
            Command::Unknown(cmd) => writeln!(out, "unknown command :{cmd} (try :help)")?,
        }
        out.flush()?;
    }
    Ok(())
}
