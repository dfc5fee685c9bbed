mod fit;
mod shared;
mod utils;

use camino::Utf8Path;
use clap::Parser;
use simple_error::SimpleResult;

use self::fit::validate_and_fix_fit_settings;
pub use self::fit::FitSettings;
use self::shared::validate_and_fix_shared_settings;
pub use self::shared::SharedSettings;
pub use self::utils::check_novel_dirname;

/// Compute fractional copy numbers from the log2 ratios of multiple samples, and write them as
/// CNT-MD input
///
/// All samples are first jointly segmented, then each sample's ratios are rescaled under a grid
/// of tumor purity values, assuming the most common total copy number of tumor cells is known.
/// Whole-genome duplication is not detected automatically.
///
#[derive(Parser)]
#[command(
    version,
    about,
    long_about = None,
    help_template = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}"
)]
#[clap(rename_all = "kebab_case")]
pub struct Settings {
    #[command(flatten)]
    pub shared: SharedSettings,

    #[command(flatten)]
    pub fit: FitSettings,
}

impl Settings {
    pub fn get_output_dir(&self) -> Option<&Utf8Path> {
        self.fit.output_dir.as_deref()
    }
}

/// Validate settings and update parameters that can't be processed by clap
///
pub fn validate_and_fix_settings_impl(mut settings: Settings) -> SimpleResult<Settings> {
    settings.shared = validate_and_fix_shared_settings(settings.shared)?;
    settings.fit = validate_and_fix_fit_settings(settings.fit)?;
    Ok(settings)
}

/// Validate settings and update to parameters that can't be processed automatically by clap.
///
pub fn validate_and_fix_settings(settings: Settings) -> Settings {
    match validate_and_fix_settings_impl(settings) {
        Ok(x) => x,
        Err(msg) => {
            eprintln!("Invalid command-line setting: {}", msg);
            std::process::exit(exitcode::USAGE);
        }
    }
}

pub fn parse_settings() -> Settings {
    Settings::parse()
}
