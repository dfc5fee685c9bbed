//! Track stats for the whole run
//!

use std::fs::File;

use camino::Utf8Path;
use log::info;
use serde::Serialize;
use unwrap::unwrap;

use crate::globals::PROGRAM_VERSION;
use crate::joint_segmentation::{JointSegmentTable, JointSegmentationStats};
use crate::purity_fit::{PurityFitSettings, SampleFitResult};

pub const RUN_STATS_FILENAME: &str = "run_stats.json";

#[derive(Serialize)]
pub struct FitParameters {
    pub baseline_ploidy: u32,
    pub bin_count: usize,
    pub max_copy_number: u32,
    pub min_purity: f64,
}

impl From<&PurityFitSettings> for FitParameters {
    fn from(settings: &PurityFitSettings) -> Self {
        Self {
            baseline_ploidy: settings.baseline_ploidy,
            bin_count: settings.bin_count,
            max_copy_number: settings.max_copy_number,
            min_purity: settings.min_purity,
        }
    }
}

#[derive(Serialize)]
pub struct RunStats {
    pub version: String,
    pub sample_count: usize,
    pub input_segment_count: usize,

    /// Chromosomes with at least one interval covered in all samples
    pub output_chrom_count: usize,
    pub output_segment_count: usize,

    pub fit_parameters: FitParameters,
    pub joint_segmentation: JointSegmentationStats,
    pub samples: Vec<SampleFitResult>,
}

impl RunStats {
    pub fn new(
        input_segment_count: usize,
        settings: &PurityFitSettings,
        fraction_table: &JointSegmentTable,
        joint_segmentation: JointSegmentationStats,
        samples: Vec<SampleFitResult>,
    ) -> Self {
        let output_chroms = fraction_table
            .chroms
            .iter()
            .filter(|x| !x.intervals.is_empty())
            .collect::<Vec<_>>();
        Self {
            version: PROGRAM_VERSION.to_string(),
            sample_count: fraction_table.sample_names.len(),
            input_segment_count,
            output_chrom_count: output_chroms.len(),
            output_segment_count: output_chroms.iter().map(|x| x.intervals.len()).sum(),
            fit_parameters: settings.into(),
            joint_segmentation,
            samples,
        }
    }
}

/// Write run_stats structure out in json format
pub fn write_run_stats(output_dir: &Utf8Path, run_stats: &RunStats) {
    let filename = output_dir.join(RUN_STATS_FILENAME);

    info!("Writing run statistics to file: '{filename}'");

    let f = unwrap!(
        File::create(&filename),
        "Unable to create run statistics json file: '{filename}'"
    );

    serde_json::to_writer_pretty(&f, &run_stats).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::int_range::IntRange;
    use crate::joint_segmentation::JointChromSegments;

    #[test]
    fn test_run_stats() {
        let fraction_table = JointSegmentTable {
            sample_names: vec!["A".to_string()],
            chroms: vec![
                JointChromSegments {
                    chrom_label: "chr1".to_string(),
                    intervals: vec![IntRange::from_pair(0, 10), IntRange::from_pair(10, 20)],
                    sample_values: vec![vec![2.0, 3.0]],
                },
                JointChromSegments {
                    chrom_label: "chr2".to_string(),
                    intervals: Vec::new(),
                    sample_values: vec![Vec::new()],
                },
            ],
        };
        let run_stats = RunStats::new(
            5,
            &PurityFitSettings::default(),
            &fraction_table,
            JointSegmentationStats::default(),
            Vec::new(),
        );
        assert_eq!(run_stats.sample_count, 1);
        assert_eq!(run_stats.output_chrom_count, 1);
        assert_eq!(run_stats.output_segment_count, 2);

        let json = serde_json::to_value(&run_stats).unwrap();
        assert_eq!(json["fit_parameters"]["bin_count"], 30);
        assert_eq!(json["input_segment_count"], 5);
    }
}
