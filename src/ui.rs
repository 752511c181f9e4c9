//! Terminal output: a progress bar for the processing pass and styled
//! summaries for both passes.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::error::ScribeError;
use crate::pipeline::{FetchReport, ProcessObserver, ProcessReport};
use crate::storage::PendingVacancy;

const BAR_TEMPLATE: &str = "{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}";

/// Progress bar tracking listings through the processing pass.
pub struct ProcessProgress {
    pb: ProgressBar,
    red: Style,
}

impl ProcessProgress {
    pub fn new() -> Self {
        let pb = ProgressBar::new(0);
        // The template is a constant; fall back to the default bar rather than fail.
        if let Ok(style) = ProgressStyle::default_bar().template(BAR_TEMPLATE) {
            pb.set_style(style.progress_chars("=> "));
        }
        Self {
            pb,
            red: Style::new().red(),
        }
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

impl ProcessObserver for ProcessProgress {
    fn started(&self, total: usize) {
        self.pb.set_length(total as u64);
        self.pb.set_message("drafting cover letters");
        self.pb.enable_steady_tick(Duration::from_millis(100));
    }

    fn finished(&self, listing: &PendingVacancy, result: Result<(), &ScribeError>) {
        if let Err(err) = result {
            self.pb.println(format!(
                "  {} {}: {err}",
                self.red.apply_to("✗"),
                listing.name
            ));
        }
        self.pb.set_message(listing.name.clone());
        self.pb.inc(1);
    }
}

pub fn print_fetch_report(report: &FetchReport) {
    let green = Style::new().green().bold();
    let yellow = Style::new().yellow();
    let dim = Style::new().dim();

    println!("{}", green.apply_to("─── Fetch ───"));
    println!(
        "  {} new listings stored, {} already known",
        green.apply_to(report.stored),
        report.already_stored
    );
    if report.requeued > 0 {
        println!("  {} stored listings queued again", report.requeued);
    }
    println!(
        "  {}",
        dim.apply_to(format!(
            "{} queries, {} pages, {} listings seen",
            report.queries, report.pages, report.listings
        ))
    );
    if report.failed_queries > 0 || report.failed_listings > 0 {
        println!(
            "  {} {} queries and {} listings failed (see log)",
            yellow.apply_to("!"),
            report.failed_queries,
            report.failed_listings
        );
    }
    if report.interrupted {
        println!("  {} interrupted", yellow.apply_to("!"));
    }
}

pub fn print_process_report(report: &ProcessReport) {
    let green = Style::new().green().bold();
    let red = Style::new().red().bold();
    let yellow = Style::new().yellow();

    println!("{}", green.apply_to("─── Process ───"));
    println!(
        "  {} {}/{} cover letters drafted",
        green.apply_to("✓"),
        report.enriched,
        report.pending
    );
    if report.failed > 0 {
        println!(
            "  {} {} listings left pending",
            red.apply_to("✗"),
            report.failed
        );
    }
    if report.cancelled {
        println!("  {} cancelled before finishing", yellow.apply_to("!"));
    }
}
