//! Thin rendering layer. All user-facing output funnels through here; with
//! `--no-cli` every line is plain ASCII with no escape codes.

use std::io::Write;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy)]
pub struct Display {
    no_cli: bool,
}

impl Display {
    pub fn new(no_cli: bool) -> Self {
        Self { no_cli }
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.no_cli {
            text.to_string()
        } else {
            format!("{color}{text}{RESET}")
        }
    }

    pub fn success(&self, text: &str) {
        println!("{}", self.paint(GREEN, &format!("[OK] {text}")));
    }

    pub fn error(&self, text: &str) {
        eprintln!("{}", self.paint(RED, &format!("[ERROR] {text}")));
    }

    pub fn warning(&self, text: &str) {
        println!("{}", self.paint(YELLOW, &format!("[WARN] {text}")));
    }

    pub fn info(&self, text: &str) {
        println!("{}", self.paint(BLUE, &format!("[INFO] {text}")));
    }

    pub fn plain(&self, text: &str) {
        println!("{text}");
    }

    pub fn clear_screen(&self) {
        if !self.no_cli {
            print!("\x1b[2J\x1b[H");
            let _ = std::io::stdout().flush();
        }
    }

    pub fn logo(&self) {
        if self.no_cli {
            return;
        }
        println!("{}", self.paint(BOLD, "HPS CLI — Hsyst P2P Browser"));
        println!("{}", self.paint(DIM, "decentralized content and naming network"));
        println!();
    }

    /// REPL prompt: `hps://user@server » ` or `hps://disconnected » `.
    pub fn prompt(&self, user: Option<&str>, server: Option<&str>) -> String {
        match (user, server) {
            (Some(u), Some(s)) if !self.no_cli => format!(
                "{GREEN}hps://{u}{RESET}{DIM}@{RESET}{BLUE}{s}{RESET} {YELLOW}»{RESET} "
            ),
            (Some(u), Some(s)) => format!("hps://{u}@{s} > "),
            _ if !self.no_cli => format!("{DIM}hps://disconnected{RESET} {YELLOW}»{RESET} "),
            _ => "hps://disconnected > ".to_string(),
        }
    }
}

/// Print a prompt and read one trimmed line from stdin. Blocking; call from
/// a blocking context only. EOF surfaces as `UnexpectedEof`.
pub fn read_input(prompt: &str) -> std::io::Result<String> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    let n = std::io::stdin().read_line(&mut line)?;
    if n == 0 {
        return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "stdin closed"));
    }
    Ok(line.trim().to_string())
}

/// Align rows under headers with two-space gutters. Pure formatting; the
/// result goes into a `CommandOutput` message.
pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let mut out = String::new();
    for (i, h) in headers.iter().enumerate() {
        out.push_str(&format!("{:<width$}  ", h, width = widths[i]));
    }
    out.push('\n');
    for (i, _) in headers.iter().enumerate() {
        out.push_str(&"-".repeat(widths[i]));
        out.push_str("  ");
    }
    for row in rows {
        out.push('\n');
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                out.push_str(&format!("{:<width$}  ", cell, width = widths[i]));
            }
        }
    }
    out
}

/// Key-value lines with aligned keys.
pub fn format_kv(pairs: &[(&str, String)]) -> String {
    let width = pairs.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    pairs
        .iter()
        .map(|(k, v)| format!("{k:<width$}  {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_alignment() {
        let out = format_table(
            &["Hash", "Title"],
            &[
                vec!["abcd".into(), "first".into()],
                vec!["ef".into(), "a longer title".into()],
            ],
        );
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Hash"));
        assert!(lines[2].starts_with("abcd"));
    }

    #[test]
    fn kv_alignment() {
        let out = format_kv(&[("User", "alice".into()), ("Reputation", "100".into())]);
        assert!(out.contains("User        alice"));
    }

    #[test]
    fn no_cli_prompt_is_plain_ascii() {
        let d = Display::new(true);
        let p = d.prompt(Some("alice"), Some("http://srv"));
        assert!(p.is_ascii());
        assert!(!p.contains('\x1b'));
    }
}
