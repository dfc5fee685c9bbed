use camino::Utf8PathBuf;
use clap::Args;
use simple_error::{SimpleResult, bail};

use super::utils::check_required_filename;
use crate::purity_fit::PurityFitSettings;

#[derive(Args)]
pub struct FitSettings {
    /// Input tab-separated segment file in the format 'SAMPLE CHR START END ... LOG2RATIO'
    ///
    /// The first line is treated as a header and skipped.
    ///
    #[arg(value_name = "INPUT")]
    pub input: Utf8PathBuf,

    /// Directory for all output (must not already exist). If not specified, the CNT-MD input is
    /// written to stdout
    ///
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<Utf8PathBuf>,

    /// Most common total copy number of tumor cells, e.g. 2 for diploid tumors and 4 for
    /// tetraploid tumors following a whole-genome duplication
    ///
    #[arg(short = 'c', long = "copynumber", default_value_t = 2)]
    pub baseline_ploidy: u32,

    /// Number of bins used to discretize the ratio distribution and find its highest peak
    ///
    /// Can be increased to improve accuracy when the distribution is dense.
    ///
    #[arg(short = 'b', long = "bins", default_value_t = 30)]
    pub bin_count: usize,

    /// Maximum copy number used to fit ratios
    #[arg(short = 'm', long = "maximumcn", default_value_t = 12)]
    pub max_copy_number: u32,

    /// Minimum tumor purity used to fit ratios
    #[arg(short = 'u', long = "minimumu", default_value_t = 0.3)]
    pub min_purity: f64,
}

impl FitSettings {
    pub fn purity_fit_settings(&self) -> PurityFitSettings {
        PurityFitSettings {
            baseline_ploidy: self.baseline_ploidy,
            bin_count: self.bin_count,
            max_copy_number: self.max_copy_number,
            min_purity: self.min_purity,
        }
    }
}

/// Validate settings and update to parameters that can't be processed automatically by clap.
///
/// Assumes that the logger is not setup
///
pub fn validate_and_fix_fit_settings(settings: FitSettings) -> SimpleResult<FitSettings> {
    check_required_filename(settings.input.as_str(), "input segment")?;

    if settings.baseline_ploidy == 0 {
        bail!("--copynumber must be greater than 0");
    }
    if settings.bin_count == 0 {
        bail!("--bins must be greater than 0");
    }
    if settings.max_copy_number < settings.baseline_ploidy {
        bail!(
            "--maximumcn ({}) must be at least equal to --copynumber ({})",
            settings.max_copy_number,
            settings.baseline_ploidy
        );
    }
    if !(0.0..=1.0).contains(&settings.min_purity) {
        bail!(
            "--minimumu ({}) must be within [0, 1]",
            settings.min_purity
        );
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_settings() -> FitSettings {
        FitSettings {
            input: Utf8PathBuf::from("Cargo.toml"),
            output_dir: None,
            baseline_ploidy: 2,
            bin_count: 30,
            max_copy_number: 12,
            min_purity: 0.3,
        }
    }

    #[test]
    fn test_validate_fit_settings() {
        assert!(validate_and_fix_fit_settings(get_test_settings()).is_ok());

        let mut settings = get_test_settings();
        settings.baseline_ploidy = 0;
        assert!(validate_and_fix_fit_settings(settings).is_err());

        let mut settings = get_test_settings();
        settings.bin_count = 0;
        assert!(validate_and_fix_fit_settings(settings).is_err());

        let mut settings = get_test_settings();
        settings.baseline_ploidy = 4;
        settings.max_copy_number = 3;
        assert!(validate_and_fix_fit_settings(settings).is_err());

        let mut settings = get_test_settings();
        settings.min_purity = 1.5;
        assert!(validate_and_fix_fit_settings(settings).is_err());

        let mut settings = get_test_settings();
        settings.min_purity = f64::NAN;
        assert!(validate_and_fix_fit_settings(settings).is_err());

        let mut settings = get_test_settings();
        settings.input = Utf8PathBuf::from("no_such_file.tsv");
        assert!(validate_and_fix_fit_settings(settings).is_err());
    }
}
