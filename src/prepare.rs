use log::info;
use simple_error::SimpleResult;

use crate::cli::Settings;
use crate::cnt_output::{write_cnt_input_file, write_cnt_input_to_stdout};
use crate::joint_segmentation::{
    JointSegmentTable, JointSegmentationStats, joint_segment_samples,
};
use crate::purity_fit::{PurityFitSettings, SampleFitResult, fit_fractional_copy_numbers};
use crate::run_stats::{RunStats, write_run_stats};
use crate::segment_table::{SegmentTable, read_segment_table};

pub const CNT_INPUT_FILENAME: &str = "cnt_input.txt";

/// Output of the joint segmentation and purity/ploidy fit for all samples
pub struct FractionalCopyNumbers {
    pub fraction_table: JointSegmentTable,
    pub joint_segmentation_stats: JointSegmentationStats,
    pub fit_results: Vec<SampleFitResult>,
}

/// Run joint segmentation followed by the purity/ploidy fit
///
pub fn get_fractional_copy_numbers(
    fit_settings: &PurityFitSettings,
    thread_count: usize,
    segment_table: &SegmentTable,
) -> SimpleResult<FractionalCopyNumbers> {
    let (joint_table, joint_segmentation_stats) =
        joint_segment_samples(thread_count, segment_table)?;

    let (fraction_table, fit_results) =
        fit_fractional_copy_numbers(fit_settings, thread_count, &joint_table)?;

    Ok(FractionalCopyNumbers {
        fraction_table,
        joint_segmentation_stats,
        fit_results,
    })
}

pub fn run_prepare(settings: &Settings) -> SimpleResult<()> {
    let fit_settings = settings.fit.purity_fit_settings();

    let segment_table = read_segment_table(&settings.fit.input)?;
    info!("{} samples found", segment_table.sample_count());

    let result = get_fractional_copy_numbers(
        &fit_settings,
        settings.shared.thread_count,
        &segment_table,
    )?;

    match settings.get_output_dir() {
        Some(output_dir) => {
            write_cnt_input_file(&output_dir.join(CNT_INPUT_FILENAME), &result.fraction_table)?;

            let run_stats = RunStats::new(
                segment_table.segment_count(),
                &fit_settings,
                &result.fraction_table,
                result.joint_segmentation_stats,
                result.fit_results,
            );
            write_run_stats(output_dir, &run_stats);
        }
        None => {
            info!("Writing CNT-MD input to stdout");
            write_cnt_input_to_stdout(&result.fraction_table)?;
        }
    }

    Ok(())
}
