//! Purity/ploidy fit of jointly segmented ratios to fractional copy numbers
//!
//! Each sample's ratios are rescaled so that the most common ratio level maps to the baseline
//! ploidy, with the rescaling chosen over a grid of tumor purity values to minimize the distance of
//! all segments from integer copy number states.
//!

use std::sync::mpsc::channel;

use log::{debug, info};
use serde::Serialize;
use simple_error::{SimpleResult, bail, map_err_with};

use crate::joint_segmentation::{JointChromSegments, JointSegmentTable};

/// Fraction of sorted ratio values trimmed from each end of the distribution before binning
const RATIO_TRIM_FRACTION: f64 = 0.1;

/// A purity candidate must reduce total misfit by more than this amount to replace the incumbent
const MIN_MISFIT_IMPROVEMENT: f64 = 0.0001;

/// Copy number of the normal cells contaminating the tumor sample
const NORMAL_COPY_NUMBER: f64 = 2.0;

#[derive(Clone, Debug)]
pub struct PurityFitSettings {
    /// Most common total copy number in the tumor genome
    pub baseline_ploidy: u32,

    /// Number of bins used to find the dominant ratio level
    pub bin_count: usize,

    /// Highest integer copy number state used to fit ratios
    pub max_copy_number: u32,

    /// Purity search is restricted to values strictly above this level
    pub min_purity: f64,
}

impl Default for PurityFitSettings {
    fn default() -> Self {
        Self {
            baseline_ploidy: 2,
            bin_count: 30,
            max_copy_number: 12,
            min_purity: 0.3,
        }
    }
}

/// Summary of the purity/ploidy fit for one sample
#[derive(Clone, Debug, Serialize)]
pub struct SampleFitResult {
    pub sample_name: String,

    /// Center of the highest-mass ratio bin
    pub dominant_ratio: f64,

    pub purity: f64,

    /// Factor applied to every ratio of the sample
    pub scale: f64,

    /// Size-weighted relative distance of all scaled ratios from their nearest copy number state
    pub total_distance: f64,
}

/// Round to 2 decimal places, with halfway cases rounded away from zero
///
pub fn round_to_hundredths(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Expected scaled ratio of a sample with the tumor fraction at copy number `copy_number`
///
fn get_copy_number_center(purity: f64, copy_number: f64) -> f64 {
    NORMAL_COPY_NUMBER * (1.0 - purity) + copy_number * purity
}

/// Range of the ratio distribution after trimming the most extreme values
///
/// `round(n * 0.1)` values are removed from each end of the sorted distribution. A trim count of
/// zero leaves no values, so fewer than 5 ratios is an error.
///
fn get_trimmed_ratio_range(ratios: &[f64]) -> SimpleResult<(f64, f64)> {
    let mut ratios = ratios.to_vec();
    ratios.sort_by(|a, b| a.total_cmp(b));

    let trim_count = (ratios.len() as f64 * RATIO_TRIM_FRACTION).round() as usize;
    if trim_count == 0 || 2 * trim_count >= ratios.len() {
        bail!(
            "Ratio distribution of {} values is empty after trimming 10% from each end, at least 5 intervals covered in all samples are required",
            ratios.len()
        );
    }
    let trimmed = &ratios[trim_count..(ratios.len() - trim_count)];
    Ok((trimmed[0], trimmed[trimmed.len() - 1]))
}

/// Find the most common ratio level of one sample
///
/// The trimmed ratio range is split into `bin_count` equal-width bins. The mass of each bin is the
/// total size of all intervals with a ratio in the bin. Bins are half-open except the last, which
/// includes the maximum of the trimmed range. Ratios outside the trimmed range are not counted.
///
/// Returns the center of the highest-mass bin, with ties resolved to the lowest bin.
///
/// # Arguments
/// * `sized_ratios` - (ratio, interval size) for every interval of the sample
///
fn get_dominant_ratio(sized_ratios: &[(f64, f64)], bin_count: usize) -> SimpleResult<f64> {
    assert!(bin_count > 0);

    let ratios = sized_ratios.iter().map(|x| x.0).collect::<Vec<_>>();
    let (min_ratio, max_ratio) = get_trimmed_ratio_range(&ratios)?;
    let bin_width = (max_ratio - min_ratio) / bin_count as f64;

    let mut bin_mass = vec![0.0; bin_count];
    for &(ratio, size) in sized_ratios.iter() {
        if ratio < min_ratio || ratio > max_ratio {
            continue;
        }
        let bin_index = if bin_width > 0.0 {
            std::cmp::min(((ratio - min_ratio) / bin_width) as usize, bin_count - 1)
        } else {
            0
        };
        bin_mass[bin_index] += size;
    }

    let mut max_bin_index = 0;
    for bin_index in 1..bin_count {
        if bin_mass[bin_index] > bin_mass[max_bin_index] {
            max_bin_index = bin_index;
        }
    }

    let lower_bound = min_ratio + max_bin_index as f64 * bin_width;
    let upper_bound = min_ratio + (max_bin_index + 1) as f64 * bin_width;
    Ok((lower_bound + upper_bound) / 2.0)
}

/// Relative distance of a scaled ratio from the nearest copy number state in [0, max_copy_number]
///
fn get_copy_number_distance(scaled_ratio: f64, purity: f64, max_copy_number: u32) -> f64 {
    (0..=max_copy_number)
        .map(|copy_number| {
            (scaled_ratio - get_copy_number_center(purity, copy_number as f64)).abs() / scaled_ratio
        })
        .fold(f64::INFINITY, f64::min)
}

/// Size-weighted total copy number distance of a sample under one purity/scale hypothesis
///
fn get_total_copy_number_distance(
    sized_ratios: &[(f64, f64)],
    scale: f64,
    purity: f64,
    max_copy_number: u32,
) -> f64 {
    sized_ratios
        .iter()
        .map(|&(ratio, size)| {
            get_copy_number_distance(ratio * scale, purity, max_copy_number) * size
        })
        .sum()
}

/// Get the (purity, scale, total distance) hypothesis for one purity level
///
/// The scale maps the dominant ratio to the expected ratio of the baseline ploidy at this purity.
///
fn evaluate_purity(
    settings: &PurityFitSettings,
    sized_ratios: &[(f64, f64)],
    dominant_ratio: f64,
    purity_percent: u32,
) -> (f64, f64, f64) {
    let purity = purity_percent as f64 / 100.0;
    let baseline_center = get_copy_number_center(purity, settings.baseline_ploidy as f64);
    let scale = baseline_center / dominant_ratio;
    let total_distance =
        get_total_copy_number_distance(sized_ratios, scale, purity, settings.max_copy_number);
    debug!("Purity {purity:.2}: scale {scale} total distance {total_distance}");
    (purity, scale, total_distance)
}

/// True if the candidate distance beats the incumbent by more than the minimum improvement
///
fn is_improved_fit(candidate_distance: f64, incumbent_distance: f64) -> bool {
    candidate_distance < (incumbent_distance - MIN_MISFIT_IMPROVEMENT)
}

/// Search purity values from 1.0 down to just above the minimum purity for the scale that best fits
/// the sample's ratios to integer copy numbers
///
/// Returns the fit result, without the sample name filled in
///
fn fit_sample(
    settings: &PurityFitSettings,
    sized_ratios: &[(f64, f64)],
) -> SimpleResult<SampleFitResult> {
    let dominant_ratio = get_dominant_ratio(sized_ratios, settings.bin_count)?;
    if dominant_ratio <= 0.0 {
        bail!("Dominant ratio {dominant_ratio} is not positive");
    }

    // Purity 1.0 is always evaluated first as the initial incumbent
    let (mut best_purity, mut best_scale, mut best_distance) =
        evaluate_purity(settings, sized_ratios, dominant_ratio, 100);

    let min_purity_percent = (settings.min_purity * 100.0).round() as u32;
    for purity_percent in ((min_purity_percent + 1)..100).rev() {
        let (purity, scale, total_distance) =
            evaluate_purity(settings, sized_ratios, dominant_ratio, purity_percent);
        if is_improved_fit(total_distance, best_distance) {
            best_purity = purity;
            best_scale = scale;
            best_distance = total_distance;
        }
    }

    Ok(SampleFitResult {
        sample_name: String::new(),
        dominant_ratio,
        purity: best_purity,
        scale: best_scale,
        total_distance: best_distance,
    })
}

/// Fit every sample of the joint segment table in parallel
///
/// Returns a new table with each ratio replaced by its fractional copy number, rounded to 2
/// decimal places, together with the per-sample fit results
///
pub fn fit_fractional_copy_numbers(
    settings: &PurityFitSettings,
    thread_count: usize,
    joint_table: &JointSegmentTable,
) -> SimpleResult<(JointSegmentTable, Vec<SampleFitResult>)> {
    info!("Computing fractional copy numbers");

    let worker_pool = map_err_with!(
        rayon::ThreadPoolBuilder::new()
            .num_threads(thread_count)
            .build(),
        "Unable to create purity fit thread pool"
    )?;

    let sample_count = joint_table.sample_names.len();

    let (tx, rx) = channel();
    worker_pool.scope(move |scope| {
        for sample_index in 0..sample_count {
            let tx = tx.clone();
            scope.spawn(move |_| {
                let sized_ratios = joint_table.get_sample_sized_values(sample_index);
                let result = fit_sample(settings, &sized_ratios);
                tx.send((sample_index, result)).unwrap();
            });
        }
    });

    let mut sample_results = (0..sample_count).map(|_| None).collect::<Vec<_>>();
    for (sample_index, result) in rx {
        sample_results[sample_index] = Some(result);
    }

    let mut fit_results = Vec::with_capacity(sample_count);
    for (sample_name, result) in joint_table
        .sample_names
        .iter()
        .zip(sample_results.into_iter().flatten())
    {
        let mut fit_result = match result {
            Ok(x) => x,
            Err(e) => bail!("Unable to fit purity and ploidy for sample '{sample_name}': {e}"),
        };
        fit_result.sample_name = sample_name.clone();
        info!(
            "Sample '{}': dominant ratio {:.4}, purity {:.2}, scale {:.4}, total distance {:.4}",
            fit_result.sample_name,
            fit_result.dominant_ratio,
            fit_result.purity,
            fit_result.scale,
            fit_result.total_distance
        );
        fit_results.push(fit_result);
    }
    assert_eq!(fit_results.len(), sample_count);

    let chroms = joint_table
        .chroms
        .iter()
        .map(|chrom| JointChromSegments {
            chrom_label: chrom.chrom_label.clone(),
            intervals: chrom.intervals.clone(),
            sample_values: chrom
                .sample_values
                .iter()
                .zip(fit_results.iter())
                .map(|(values, fit_result)| {
                    values
                        .iter()
                        .map(|x| round_to_hundredths(x * fit_result.scale))
                        .collect()
                })
                .collect(),
        })
        .collect();

    let fraction_table = JointSegmentTable {
        sample_names: joint_table.sample_names.clone(),
        chroms,
    };

    Ok((fraction_table, fit_results))
}
