use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

const BAR_TEMPLATE: &str = "{prefix} [{bar:40}] {pos}/{len}";

pub fn create_multi_progress(quiet: bool) -> MultiProgress {
    if quiet {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    } else {
        MultiProgress::new()
    }
}

pub fn create_progress_bar(progress: &MultiProgress, folder: &str, len: u64) -> ProgressBar {
    let bar = progress.add(ProgressBar::new(len));
    if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.set_prefix(folder.to_string());
    bar
}

/// Runs `f` with a progress bar for `folder`. The bar is cleared afterwards,
/// also when `f` fails.
pub fn with_progress_bar<T, F>(progress: &MultiProgress, folder: &str, len: u64, f: F) -> Result<T>
where
    F: FnOnce(&ProgressBar) -> Result<T>,
{
    let bar = create_progress_bar(progress, folder, len);
    let result = f(&bar);
    bar.finish_and_clear();
    progress.remove(&bar);
    result
}
