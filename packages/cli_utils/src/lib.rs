#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal output for the coffee map CLI.
//!
//! A survey run spends most of its time walking grid points, so the CLI
//! shows a live grid-point bar (and a stage bar for `run`). [`init_logger`]
//! sends `log` records through the same [`MultiProgress`], which prints
//! them above the bars.

use std::sync::Arc;
use std::time::Duration;

use coffee_map_places::progress::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

/// Log filter used when `RUST_LOG` is unset: survey crates at `info`,
/// HTTP and TLS dependencies only when they warn.
pub const DEFAULT_LOG_FILTER: &str = "warn,coffee_map=info";

const WAITING_TEMPLATE: &str = "{spinner:.cyan} {msg}";
const GRID_TEMPLATE: &str = "  {wide_bar:.cyan/dim} {pos}/{len} grid points [{eta}] {msg}";
const STAGE_TEMPLATE: &str = "{msg} {wide_bar:.green/dim} stage {pos}/{len} [{elapsed_precise}]";

/// Progress bar for survey stages.
pub struct SurveyProgress {
    bar: ProgressBar,
    /// Applied by `set_total()`.
    counted_style: ProgressStyle,
}

impl SurveyProgress {
    /// Bar for the grid walk. Spins until the collector reports how many
    /// grid points there are; the message then tracks unique places.
    #[must_use]
    pub fn grid_points(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        Arc::new(Self::waiting(multi, message, GRID_TEMPLATE))
    }

    /// Bar over the `stages` steps of a full pipeline run.
    #[must_use]
    pub fn pipeline_stages(
        multi: &MultiProgress,
        message: &str,
        stages: u64,
    ) -> Arc<dyn ProgressCallback> {
        let counted_style = style(STAGE_TEMPLATE);
        let bar = multi.add(ProgressBar::new(stages));
        bar.set_style(counted_style.clone());
        bar.set_message(message.to_string());
        Arc::new(Self { bar, counted_style })
    }

    fn waiting(multi: &MultiProgress, message: &str, counted_template: &str) -> Self {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template(WAITING_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());

        Self {
            bar,
            counted_style: style(counted_template),
        }
    }
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

impl ProgressCallback for SurveyProgress {
    fn set_total(&self, total: u64) {
        self.bar.disable_steady_tick();
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.counted_style.clone());
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Installs `pretty_env_logger` behind `indicatif-log-bridge` and returns
/// the [`MultiProgress`] every survey bar must be added to.
///
/// `RUST_LOG` replaces [`DEFAULT_LOG_FILTER`] when set. Installing twice
/// keeps the first logger.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let filters = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
    let logger = pretty_env_logger::formatted_builder()
        .parse_filters(&filters)
        .build();
    let level = logger.filter();

    if indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .is_ok()
    {
        log::set_max_level(level);
    }

    multi
}

#[cfg(test)]
mod tests {
    use indicatif::ProgressDrawTarget;

    use super::*;

    fn hidden() -> MultiProgress {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    }

    #[test]
    fn templates_parse() {
        for template in [WAITING_TEMPLATE, GRID_TEMPLATE, STAGE_TEMPLATE] {
            assert!(ProgressStyle::with_template(template).is_ok(), "{template}");
        }
    }

    #[test]
    fn grid_bar_counts_points_once_total_is_known() {
        let progress = SurveyProgress::waiting(&hidden(), "Collecting places", GRID_TEMPLATE);
        assert_eq!(progress.bar.length(), None);

        progress.set_total(12);
        progress.inc(3);
        progress.set_message("7 unique places".to_string());

        assert_eq!(progress.bar.length(), Some(12));
        assert_eq!(progress.bar.position(), 3);
        assert_eq!(progress.bar.message(), "7 unique places");
    }

    #[test]
    fn finish_keeps_closing_message() {
        let progress = SurveyProgress::waiting(&hidden(), "Collecting places", GRID_TEMPLATE);
        progress.set_total(2);
        progress.finish("40 unique places from 2 grid points".to_string());

        assert!(progress.bar.is_finished());
        assert_eq!(progress.bar.message(), "40 unique places from 2 grid points");
    }
}
