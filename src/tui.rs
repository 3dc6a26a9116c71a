use crate::debug;
use crate::sync::SyncReport;
use crossterm::{
    cursor::MoveToPreviousLine,
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use std::io;

/// Line-oriented progress of a collection run: one line per vehicle, rewritten in place
/// while its pages come in. With debug output on, lines are appended instead so the
/// debug lines in between stay visible.
pub struct CollectionTUI {
    in_place: bool,
    total_vehicles: usize,
    current_index: usize,
    collected_count: usize,
    empty_count: usize,
    skipped_count: usize,
    listing_count: usize,
    current_label: Option<String>,
}

impl CollectionTUI {
    pub fn new(total_vehicles: usize) -> Self {
        Self {
            in_place: !debug::is_debug_enabled(),
            total_vehicles,
            current_index: 0,
            collected_count: 0,
            empty_count: 0,
            skipped_count: 0,
            listing_count: 0,
            current_label: None,
        }
    }

    pub fn start_run(&self) -> io::Result<()> {
        execute!(
            io::stdout(),
            SetForegroundColor(Color::White),
            Print(format!("🚗 Collecting listings for {} vehicles\n", self.total_vehicles)),
            ResetColor
        )
    }

    pub fn start_vehicle(&mut self, label: &str) -> io::Result<()> {
        self.current_index += 1;
        self.current_label = Some(label.to_string());
        execute!(
            io::stdout(),
            SetForegroundColor(Color::White),
            Print(format!("  🔄 [{}/{}] {}\n", self.current_index, self.total_vehicles, label)),
            ResetColor
        )
    }

    /// Rewrites the current vehicle line with page progress.
    pub fn update_pages(&self, page: u32, page_count: u32, listings: usize) -> io::Result<()> {
        let label = self.current_label.as_deref().unwrap_or_default();
        let spinner = match page % 4 {
            0 => "⠋",
            1 => "⠙",
            2 => "⠹",
            _ => "⠸",
        };

        self.rewrite_line(
            Color::White,
            spinner,
            &format!("{} - page {}/{}, {} listings", label, page, page_count, listings),
        )
    }

    pub fn complete_vehicle(&mut self, listings: usize) -> io::Result<()> {
        let label = self.current_label.take().unwrap_or_default();
        if listings == 0 {
            self.empty_count += 1;
            return self.rewrite_line(Color::DarkGrey, "∅", &format!("{} - no listings", label));
        }

        self.collected_count += 1;
        self.listing_count += listings;
        self.rewrite_line(Color::Green, "✅", &format!("{} - {} listings", label, listings))
    }

    pub fn skip_vehicle(&mut self, reason: &str) -> io::Result<()> {
        self.skipped_count += 1;
        let label = self.current_label.take().unwrap_or_default();
        self.rewrite_line(Color::Red, "❌", &label)?;
        execute!(
            io::stdout(),
            SetForegroundColor(Color::DarkGrey),
            Print(format!("     {}\n", reason)),
            ResetColor
        )
    }

    pub fn show_sync(&self, destination: &str, report: &SyncReport) -> io::Result<()> {
        execute!(
            io::stdout(),
            SetForegroundColor(Color::White),
            Print(format!(
                "📤 {}: {} operations ({} sheets added, {} reused, {} deleted, {} merges)\n",
                destination, report.operations, report.added, report.cleared, report.deleted, report.merged
            )),
            ResetColor
        )
    }

    pub fn show_final_summary(&self) -> io::Result<()> {
        execute!(
            io::stdout(),
            Print("─".repeat(80)),
            Print("\n"),
            SetForegroundColor(Color::Green),
            Print(format!(
                "✅ Collection completed: {} vehicles, {} listings",
                self.collected_count, self.listing_count
            )),
            ResetColor
        )?;

        if self.empty_count > 0 {
            execute!(
                io::stdout(),
                SetForegroundColor(Color::DarkGrey),
                Print(format!(", {} without listings", self.empty_count)),
                ResetColor
            )?;
        }

        if self.skipped_count > 0 {
            execute!(
                io::stdout(),
                SetForegroundColor(Color::Red),
                Print(format!(", {} skipped", self.skipped_count)),
                ResetColor
            )?;
        }

        execute!(io::stdout(), Print("\n"))
    }

    pub fn collected_count(&self) -> usize {
        self.collected_count
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped_count
    }

    pub fn rewrites_in_place(&self) -> bool {
        self.in_place
    }

    fn rewrite_line(&self, color: Color, icon: &str, text: &str) -> io::Result<()> {
        if self.in_place {
            execute!(io::stdout(), MoveToPreviousLine(1), Clear(ClearType::CurrentLine))?;
        }
        execute!(
            io::stdout(),
            SetForegroundColor(color),
            Print(format!("  {} [{}/{}] {}\n", icon, self.current_index, self.total_vehicles, text)),
            ResetColor
        )
    }
}
