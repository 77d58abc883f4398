use anyhow::Result;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, Write};

use stepwise_compute::{ProgressSnapshot, ProgressTree};

use crate::cli::OutputFormat;
use crate::demo::DemoReport;

const BAR_WIDTH: usize = 20;

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const TASK: Color = Color::Cyan;
    const MESSAGE: Color = Color::White;
    const ABORTING: Color = Color::Yellow;
    const DONE: Color = Color::Green;
    const ERROR: Color = Color::Red;
    const DIM: Color = Color::DarkGrey;
    const HEADER: Color = Color::Magenta;
}

/// Writes progress snapshots and final outcomes in the chosen format.
#[derive(Debug, Clone, Copy)]
pub struct Terminal {
    format: OutputFormat,
}

/// One rendered node of a progress tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub depth: usize,
    pub task_name: String,
    pub detail: String,
    pub is_aborting: bool,
}

/// Flatten a snapshot into display lines, parents before children.
pub fn render_lines(root: &ProgressSnapshot) -> Vec<Line> {
    root.walk()
        .into_iter()
        .map(|(depth, node)| Line {
            depth,
            task_name: node.task_name.clone(),
            detail: describe(node),
            is_aborting: node.is_aborting,
        })
        .collect()
}

fn describe(node: &ProgressSnapshot) -> String {
    let mut out = String::new();
    if let Some(fraction) = node.fraction() {
        let filled = ((fraction * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
        out.push_str(&format!(
            "[{}{}] {:>3}% ",
            "#".repeat(filled),
            ".".repeat(BAR_WIDTH - filled),
            (fraction * 100.0).round() as u64
        ));
    }
    out.push_str(&node.message);
    out.push_str(&format!(" ({}ms)", node.elapsed_ms));
    out
}

impl Terminal {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print the startup banner. Silent in JSON mode.
    pub fn print_banner(&self, units: u64, scheduler: &str, interval_ms: u64) -> Result<()> {
        if self.format == OutputFormat::Json {
            return Ok(());
        }
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print("stepwise"),
            ResetColor,
            Print(" - cooperative task runtime demo\n"),
            SetForegroundColor(Colors::DIM),
            Print(format!(
                "Units: {} | Scheduler: {} | Update interval: {}ms\n",
                units, scheduler, interval_ms
            )),
            Print("Ctrl+C aborts the run.\n"),
            Print("---\n"),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Display one observer notification.
    pub fn display_tree(&self, tree: &ProgressTree) -> Result<()> {
        let mut stdout = io::stdout();
        match self.format {
            OutputFormat::Json => {
                let line = serde_json::to_string(tree)?;
                execute!(stdout, Print(line), Print("\n"))?;
            }
            OutputFormat::Text => {
                execute!(stdout, SetForegroundColor(Colors::DIM), Print("--\n"), ResetColor)?;
                for line in render_lines(&tree.root) {
                    let name_color = if line.is_aborting {
                        Colors::ABORTING
                    } else {
                        Colors::TASK
                    };
                    execute!(
                        stdout,
                        Print("  ".repeat(line.depth)),
                        SetForegroundColor(name_color),
                        Print(&line.task_name),
                        SetForegroundColor(Colors::MESSAGE),
                        Print(format!(" {}\n", line.detail)),
                        ResetColor,
                    )?;
                }
            }
        }
        stdout.flush()?;
        Ok(())
    }

    pub fn print_report(&self, report: &DemoReport) -> Result<()> {
        let mut stdout = io::stdout();
        match self.format {
            OutputFormat::Json => {
                let line = serde_json::json!({ "outcome": "completed", "report": report });
                execute!(stdout, Print(line.to_string()), Print("\n"))?;
            }
            OutputFormat::Text => {
                execute!(
                    stdout,
                    SetForegroundColor(Colors::DONE),
                    Print(format!(
                        "Done: {} units, checksum {} (verified by {} tasks)\n",
                        report.units, report.checksum, report.verified_by
                    )),
                    ResetColor,
                )?;
            }
        }
        stdout.flush()?;
        Ok(())
    }

    /// Report a user-initiated stop. Not an error.
    pub fn print_aborted(&self, reason: &str) -> Result<()> {
        let mut stdout = io::stdout();
        match self.format {
            OutputFormat::Json => {
                let line = serde_json::json!({ "outcome": "aborted", "reason": reason });
                execute!(stdout, Print(line.to_string()), Print("\n"))?;
            }
            OutputFormat::Text => {
                execute!(
                    stdout,
                    SetForegroundColor(Colors::ABORTING),
                    Print(format!("Aborted: {}\n", reason)),
                    ResetColor,
                )?;
            }
        }
        stdout.flush()?;
        Ok(())
    }

    /// Print an error message.
    pub fn print_error(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        match self.format {
            OutputFormat::Json => {
                let line = serde_json::json!({ "outcome": "failed", "error": msg });
                execute!(stdout, Print(line.to_string()), Print("\n"))?;
            }
            OutputFormat::Text => {
                execute!(
                    stdout,
                    SetForegroundColor(Colors::ERROR),
                    Print(format!("Error: {}\n", msg)),
                    ResetColor,
                )?;
            }
        }
        stdout.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use stepwise_compute::{ProgressObserver, Task, TaskContext, UpdateInfo};

    use super::*;

    async fn sample_tree() -> ProgressTree {
        let captured: Arc<Mutex<Option<ProgressTree>>> = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&captured);
        let observer: ProgressObserver = Arc::new(move |tree: &ProgressTree| {
            *sink.lock().unwrap() = Some(tree.clone());
        });

        let child = Task::create("child", |ctx: TaskContext| async move {
            ctx.update_now(UpdateInfo::progress("half", 5, 10)).await
        });
        let root = Task::create("root", move |ctx: TaskContext| {
            let child = child.clone();
            async move {
                ctx.update(UpdateInfo::message("waiting")).await?;
                ctx.run_child(&child, None).await
            }
        });
        root.run(Some(observer), Duration::from_secs(60)).await.unwrap();
        let tree = captured.lock().unwrap().clone();
        tree.unwrap()
    }

    #[tokio::test]
    async fn render_lines_indents_children() {
        let tree = sample_tree().await;
        let lines = render_lines(&tree.root);
        assert_eq!(lines.len(), 2);
        assert_eq!((lines[0].depth, lines[0].task_name.as_str()), (0, "root"));
        assert_eq!((lines[1].depth, lines[1].task_name.as_str()), (1, "child"));
        assert!(lines[0].detail.starts_with("waiting"));
        assert!(lines[1].detail.starts_with("[##########..........]  50% half"));
    }

    #[tokio::test]
    async fn json_snapshot_has_tree_fields() {
        let tree = sample_tree().await;
        let value = serde_json::to_value(&tree).unwrap();
        assert_eq!(value["root"]["task_name"], "root");
        assert_eq!(value["root"]["children"][0]["current"], 5);
        assert_eq!(value["abort_requested"], false);
    }
}
