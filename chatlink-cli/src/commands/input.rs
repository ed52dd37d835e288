//! Parsing of interactive input lines

use std::path::PathBuf;

/// One line typed by the user.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Text(String),
    Image(PathBuf),
    File { path: PathBuf, file_type: String },
    Quit,
    Empty,
    /// A slash command used wrongly; carries the usage hint.
    Usage(&'static str),
}

pub fn parse(line: &str) -> Input {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Input::Empty;
    }

    let Some(command) = line.strip_prefix('/') else {
        return Input::Text(line.to_string());
    };

    let mut words = command.split_whitespace();
    match words.next() {
        Some("quit" | "exit") => Input::Quit,
        Some("image") => match words.next() {
            Some(path) => Input::Image(PathBuf::from(path)),
            None => Input::Usage("/image <path>"),
        },
        Some("file") => match (words.next(), words.next()) {
            (Some(path), Some(file_type)) => Input::File {
                path: PathBuf::from(path),
                file_type: file_type.to_string(),
            },
            _ => Input::Usage("/file <path> <type>"),
        },
        // Unknown commands are ordinary chat text.
        _ => Input::Text(line.to_string()),
    }
}
