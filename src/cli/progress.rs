//! Terminal progress display for downloads.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

const MAIN_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";
const WORKER_TEMPLATE: &str = "  {prefix:.dim} {wide_msg}";

/// One overall bar plus a status line per worker.
pub struct DownloadProgress {
    multi: MultiProgress,
    main: ProgressBar,
    workers: Vec<ProgressBar>,
}

impl DownloadProgress {
    pub fn new(workers: usize, total: usize) -> Self {
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());

        let main = multi.add(ProgressBar::new(total as u64));
        main.set_style(
            ProgressStyle::with_template(MAIN_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );

        let worker_style = ProgressStyle::with_template(WORKER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let workers = (0..workers)
            .map(|id| {
                let bar = multi.add(ProgressBar::new_spinner());
                bar.set_style(worker_style.clone());
                bar.set_prefix(format!("#{:<2}", id));
                bar.set_message("idle");
                bar
            })
            .collect();

        Self {
            multi,
            main,
            workers,
        }
    }

    pub fn start_download(&self, worker_id: usize, label: &str) {
        if let Some(bar) = self.workers.get(worker_id) {
            bar.set_message(label.to_string());
        }
    }

    pub fn finish_download(&self, worker_id: usize) {
        if let Some(bar) = self.workers.get(worker_id) {
            bar.set_message("idle");
        }
        self.main.inc(1);
    }

    pub fn set_summary(&self, downloaded: usize, skipped: usize, failed: usize) {
        self.main.set_message(format!(
            "{} new, {} skipped, {} failed",
            downloaded, skipped, failed
        ));
    }

    pub fn finish(&self) {
        for bar in &self.workers {
            bar.finish_and_clear();
        }
        self.main.finish();
        let _ = self.multi.clear();
    }
}

/// Spinner shown while catalogs are being crawled.
pub fn discovery_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));
    spinner.set_message(message.to_string());
    spinner
}
