use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;

/// Progress tracker for batch cropping
pub struct BatchProgressTracker {
    progress_bar: ProgressBar,
    start_time: Instant,
    total_images: u64,
    processed_images: u64,
}

impl BatchProgressTracker {
    /// Creates a new progress tracker for a known number of images
    pub fn new(total_images: u64, operation_name: &str) -> Self {
        let progress_bar = ProgressBar::new(total_images);

        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} images ({percent}%) | {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");

        progress_bar.set_style(style);
        progress_bar.set_message(format!("Processing {}", operation_name));

        Self {
            progress_bar,
            start_time: Instant::now(),
            total_images,
            processed_images: 0,
        }
    }

    /// Creates a tracker that draws nothing
    pub fn hidden(total_images: u64) -> Self {
        Self {
            progress_bar: ProgressBar::hidden(),
            start_time: Instant::now(),
            total_images,
            processed_images: 0,
        }
    }

    /// Updates the progress by one image
    pub fn update_image(&mut self, name: &str) {
        self.processed_images += 1;
        self.progress_bar.inc(1);

        let msg = format!("{} | {}", name, self.get_progress_message());
        self.progress_bar.set_message(msg);
    }

    fn get_progress_message(&self) -> String {
        if self.processed_images == 0 {
            return "Starting...".to_string();
        }

        let elapsed = self.start_time.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            self.processed_images as f64 / elapsed
        } else {
            0.0
        };
        let remaining = self.total_images.saturating_sub(self.processed_images);
        let eta = if rate > 0.0 {
            format_duration(remaining as f64 / rate)
        } else {
            "Calculating...".to_string()
        };

        format!("Speed: {:.1} img/s | ETA: {}", rate, eta)
    }

    /// Finishes the progress bar
    pub fn finish(&self) {
        let total_time = self.start_time.elapsed();
        let processing_time = format_duration(total_time.as_secs_f64());
        self.progress_bar.finish_with_message(format!(
            "Completed! {} images in {}",
            self.processed_images, processing_time
        ));
    }

    pub fn total_images(&self) -> u64 {
        self.total_images
    }

    pub fn processed_images(&self) -> u64 {
        self.processed_images
    }
}

/// Formats a duration in seconds to h:mm:ss format
fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}
