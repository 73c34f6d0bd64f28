use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use streamscout::{Job, JobStatus, Reporter, SearchSummary};

/// Prints a colored line per finished job above a progress bar
pub struct ConsoleReporter {
    progress: ProgressBar,
}

impl ConsoleReporter {
    pub fn new(job_count: u64, show_progress: bool) -> Self {
        let progress = if show_progress {
            let pb = ProgressBar::new(job_count);
            if let Ok(style) =
                ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} jobs")
            {
                pb.set_style(style);
            }
            pb
        } else {
            ProgressBar::hidden()
        };
        Self { progress }
    }
}

/// The job line with its status word colored
pub fn format_job(job: &Job) -> String {
    let line = job.to_string();
    let status = job.status.to_string();
    let colored = match job.status {
        JobStatus::Success => status.green(),
        JobStatus::Timeout => status.yellow(),
        JobStatus::Failure => status.red(),
        JobStatus::Pending => status.normal(),
    };
    match line.strip_suffix(status.as_str()) {
        Some(prefix) => format!("{}{}", prefix, colored),
        None => line,
    }
}

impl Reporter for ConsoleReporter {
    fn job_completed(&self, job: &Job) {
        let line = format_job(job);
        self.progress.suspend(|| println!("{}", line));
        self.progress.inc(1);
    }

    fn search_finished(&self, summary: &SearchSummary) {
        self.progress.finish_and_clear();
        println!("{}", summary.rate_line().bold());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_job_keeps_line_shape() {
        colored::control::set_override(false);

        let mut job = Job::new(12, 0, 99);
        job.fail_with(JobStatus::Failure);
        assert_eq!(format_job(&job), "job   12    FAILURE");

        let pending = Job::new(3, 0, 9);
        assert_eq!(format_job(&pending), pending.to_string());
    }
}
