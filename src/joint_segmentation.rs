//! Joint segmentation of all samples
//!
//! Segment boundaries called independently in each sample are reconciled into the finest common
//! partition of each chromosome. Only the partition intervals covered by a segment in every sample
//! are retained, each sample contributing the ratio of the segment containing the interval.
//!

use std::sync::mpsc::channel;

use itertools::Itertools;
use log::{debug, info, warn};
use serde::Serialize;
use simple_error::{SimpleResult, bail, map_err_with};
use thousands::Separable;

use crate::chrom_order::sort_chrom_labels;
use crate::int_range::{IntRange, get_total_range_size};
use crate::segment_table::{Segment, SegmentTable};

/// Per-sample values over the intervals of one chromosome shared by all samples
pub struct JointChromSegments {
    pub chrom_label: String,
    pub intervals: Vec<IntRange>,

    /// Indexed on sample, then interval
    pub sample_values: Vec<Vec<f64>>,
}

/// Values for every sample over the jointly segmented genome
///
/// The same structure carries the linear ratios produced by joint segmentation, and the fractional
/// copy numbers produced from those ratios by the purity/ploidy fit.
///
pub struct JointSegmentTable {
    /// Sample names in table order, matching the first index of `JointChromSegments::sample_values`
    pub sample_names: Vec<String>,

    /// Chromosomes in chromosome label order
    pub chroms: Vec<JointChromSegments>,
}

impl JointSegmentTable {
    /// Get all (value, interval size) pairs for one sample, over all chromosomes
    ///
    pub fn get_sample_sized_values(&self, sample_index: usize) -> Vec<(f64, f64)> {
        let mut sized_values = Vec::new();
        for chrom in self.chroms.iter() {
            for (interval, value) in chrom
                .intervals
                .iter()
                .zip(chrom.sample_values[sample_index].iter())
            {
                sized_values.push((*value, interval.size() as f64));
            }
        }
        sized_values
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ChromCoverageStats {
    pub chrom_label: String,

    /// Total length of the fine partition
    pub total_fine_length: i64,

    /// Total length of the fine intervals covered in all samples
    pub retained_length: i64,
}

impl ChromCoverageStats {
    fn merge(&mut self, other: &Self) {
        self.total_fine_length += other.total_fine_length;
        self.retained_length += other.retained_length;
    }
}

#[derive(Debug, Default, Serialize)]
pub struct JointSegmentationStats {
    pub total_fine_length: i64,
    pub retained_length: i64,
    pub retained_percent: f64,
    pub chroms: Vec<ChromCoverageStats>,
}

/// Percentage of the fine partition retained in the joint segmentation
///
/// Returns 0 for an empty partition
///
fn get_retained_percent(retained_length: i64, total_fine_length: i64) -> f64 {
    if total_fine_length == 0 {
        0.0
    } else {
        retained_length as f64 / total_fine_length as f64 * 100.0
    }
}

/// A candidate common sub-segment between two consecutive breakpoints
#[derive(Debug)]
struct FineInterval {
    range: IntRange,

    /// Number of samples with a segment containing this interval
    coverage: usize,
}

/// Sorted, distinct set of segment endpoints from all samples on one chromosome
///
fn get_chrom_breakpoints(segment_table: &SegmentTable, chrom_label: &str) -> Vec<i64> {
    segment_table
        .samples
        .iter()
        .filter_map(|x| x.chroms.get(chrom_label))
        .flatten()
        .flat_map(|x| [x.range.start, x.range.end])
        .sorted()
        .dedup()
        .collect()
}

fn get_fine_intervals(breakpoints: &[i64]) -> Vec<FineInterval> {
    breakpoints
        .iter()
        .tuple_windows()
        .map(|(&left, &right)| FineInterval {
            range: IntRange::from_pair(left, right),
            coverage: 0,
        })
        .collect()
}

/// Walk one sample's segments over the chromosome breakpoints, updating fine interval coverage
///
/// The breakpoint cursor only moves forward. Fine interval `i` spans breakpoints `i` and `i+1`.
///
/// Returns the index of the source segment for each fine interval, if any.
///
/// # Arguments
/// * `sample_count` - Total sample count, fine interval coverage can't exceed this value
///
fn add_sample_coverage(
    breakpoints: &[i64],
    segments: &[Segment],
    sample_count: usize,
    fine_intervals: &mut [FineInterval],
) -> SimpleResult<Vec<Option<usize>>> {
    let mut source_segments = vec![None; fine_intervals.len()];
    let mut cursor = 0;
    let mut previous_segment: Option<&Segment> = None;

    for (segment_index, segment) in segments.iter().enumerate() {
        if let Some(previous_segment) = previous_segment {
            if previous_segment.range.intersect_range(&segment.range) {
                bail!(
                    "Overlapping segments {:?} and {:?}",
                    previous_segment.range,
                    segment.range
                );
            }
        }

        while breakpoints[cursor] != segment.range.end {
            cursor += 1;
            if cursor >= breakpoints.len() {
                bail!(
                    "Can't reach end of segment {:?} in the chromosome breakpoint set",
                    segment.range
                );
            }
            let fine_interval_index = cursor - 1;
            let fine_interval = &mut fine_intervals[fine_interval_index];
            if segment.range.contains_range(&fine_interval.range) {
                fine_interval.coverage += 1;
                if fine_interval.coverage > sample_count {
                    bail!(
                        "Coverage of interval {:?} exceeds the sample count ({sample_count})",
                        fine_interval.range
                    );
                }
                source_segments[fine_interval_index] = Some(segment_index);
            }
        }
        previous_segment = Some(segment);
    }

    Ok(source_segments)
}

/// Find the intervals of one chromosome covered in all samples, and each sample's ratio over them
///
fn joint_segment_chrom(
    segment_table: &SegmentTable,
    chrom_label: &str,
) -> SimpleResult<(JointChromSegments, ChromCoverageStats)> {
    let sample_count = segment_table.sample_count();
    let breakpoints = get_chrom_breakpoints(segment_table, chrom_label);
    let mut fine_intervals = get_fine_intervals(&breakpoints);

    let mut all_source_segments = Vec::with_capacity(sample_count);
    for sample in segment_table.samples.iter() {
        let source_segments = match sample.chroms.get(chrom_label) {
            Some(segments) => {
                match add_sample_coverage(&breakpoints, segments, sample_count, &mut fine_intervals)
                {
                    Ok(x) => x,
                    Err(e) => bail!(
                        "Inconsistent segments for sample '{}' on chromosome '{chrom_label}': {e}",
                        sample.sample_name
                    ),
                }
            }
            None => vec![None; fine_intervals.len()],
        };
        all_source_segments.push(source_segments);
    }

    let taken_indices = fine_intervals
        .iter()
        .enumerate()
        .filter(|(_, x)| x.coverage == sample_count)
        .map(|(i, _)| i)
        .collect::<Vec<_>>();

    let intervals = taken_indices
        .iter()
        .map(|&i| fine_intervals[i].range)
        .collect::<Vec<_>>();

    let mut sample_values = Vec::with_capacity(sample_count);
    for (sample, source_segments) in segment_table.samples.iter().zip(all_source_segments) {
        let mut values = Vec::with_capacity(taken_indices.len());
        for &i in taken_indices.iter() {
            let segment_index = match source_segments[i] {
                Some(x) => x,
                None => bail!(
                    "Interval {:?} on chromosome '{chrom_label}' is covered in all samples but has no source segment in sample '{}'",
                    fine_intervals[i].range,
                    sample.sample_name
                ),
            };
            values.push(sample.chroms[chrom_label][segment_index].ratio);
        }
        sample_values.push(values);
    }

    let coverage_stats = ChromCoverageStats {
        chrom_label: chrom_label.to_string(),
        total_fine_length: get_total_range_size(fine_intervals.iter().map(|x| &x.range)),
        retained_length: get_total_range_size(&intervals),
    };

    let chrom_segments = JointChromSegments {
        chrom_label: chrom_label.to_string(),
        intervals,
        sample_values,
    };

    Ok((chrom_segments, coverage_stats))
}

/// Warn about chromosomes which can't be retained because some samples have no segments on them
///
fn report_missing_chroms(segment_table: &SegmentTable, chrom_labels: &[String]) {
    for chrom_label in chrom_labels.iter() {
        let missing_sample_count = segment_table
            .samples
            .iter()
            .filter(|x| !x.chroms.contains_key(chrom_label))
            .count();
        if missing_sample_count > 0 {
            warn!(
                "Chromosome '{chrom_label}' is missing from {missing_sample_count} of {} samples and will be dropped from the joint segmentation",
                segment_table.sample_count()
            );
        }
    }
}

/// Jointly segment all samples, processing each chromosome on a separate task
///
pub fn joint_segment_samples(
    thread_count: usize,
    segment_table: &SegmentTable,
) -> SimpleResult<(JointSegmentTable, JointSegmentationStats)> {
    info!("Performing joint segmentation of all samples");

    let chrom_labels = sort_chrom_labels(segment_table.get_chrom_labels())?;
    report_missing_chroms(segment_table, &chrom_labels);

    let worker_pool = map_err_with!(
        rayon::ThreadPoolBuilder::new()
            .num_threads(thread_count)
            .build(),
        "Unable to create joint segmentation thread pool"
    )?;

    let (tx, rx) = channel();
    let chrom_labels_ref = &chrom_labels;
    worker_pool.scope(move |scope| {
        for (chrom_index, chrom_label) in chrom_labels_ref.iter().enumerate() {
            let tx = tx.clone();
            scope.spawn(move |_| {
                let result = joint_segment_chrom(segment_table, chrom_label);
                tx.send((chrom_index, result)).unwrap();
            });
        }
    });

    let chrom_count = chrom_labels.len();
    let mut chrom_results = (0..chrom_count).map(|_| None).collect::<Vec<_>>();
    for (chrom_index, result) in rx {
        chrom_results[chrom_index] = Some(result);
    }

    let mut chroms = Vec::with_capacity(chrom_count);
    let mut stats = JointSegmentationStats::default();
    let mut genome_stats = ChromCoverageStats::default();
    for result in chrom_results.into_iter().flatten() {
        let (chrom_segments, chrom_stats) = result?;
        debug!(
            "Chromosome '{}': {} of {} fine interval bases retained in joint segmentation ({} intervals)",
            chrom_stats.chrom_label,
            chrom_stats.retained_length.separate_with_commas(),
            chrom_stats.total_fine_length.separate_with_commas(),
            chrom_segments.intervals.len()
        );
        genome_stats.merge(&chrom_stats);
        stats.chroms.push(chrom_stats);
        chroms.push(chrom_segments);
    }
    assert_eq!(chroms.len(), chrom_count);

    stats.total_fine_length = genome_stats.total_fine_length;
    stats.retained_length = genome_stats.retained_length;
    stats.retained_percent =
        get_retained_percent(genome_stats.retained_length, genome_stats.total_fine_length);

    info!(
        "Proportion of joint covered genome from joint segmentation = {}% ({} of {} bases)",
        stats.retained_percent,
        stats.retained_length.separate_with_commas(),
        stats.total_fine_length.separate_with_commas()
    );

    let joint_table = JointSegmentTable {
        sample_names: segment_table
            .samples
            .iter()
            .map(|x| x.sample_name.clone())
            .collect(),
        chroms,
    };

    Ok((joint_table, stats))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::segment_table::SampleSegments;

    fn get_test_segments(segments: &[(i64, i64, f64)]) -> Vec<Segment> {
        segments
            .iter()
            .map(|&(start, end, ratio)| Segment {
                range: IntRange::from_pair(start, end),
                ratio,
            })
            .collect()
    }

    fn get_test_sample(sample_name: &str, chroms: Vec<(&str, Vec<Segment>)>) -> SampleSegments {
        SampleSegments {
            sample_name: sample_name.to_string(),
            chroms: chroms
                .into_iter()
                .map(|(chrom_label, segments)| (chrom_label.to_string(), segments))
                .collect(),
        }
    }

    fn get_two_sample_table() -> SegmentTable {
        SegmentTable {
            samples: vec![
                get_test_sample("A", vec![("chr1", get_test_segments(&[(0, 100, 1.0), (100, 200, 2.0)]))]),
                get_test_sample("B", vec![("chr1", get_test_segments(&[(0, 150, 1.0), (150, 200, 2.0)]))]),
            ],
        }
    }

    #[test]
    fn test_get_chrom_breakpoints() {
        let segment_table = get_two_sample_table();
        let breakpoints = get_chrom_breakpoints(&segment_table, "chr1");
        assert_eq!(breakpoints, vec![0, 100, 150, 200]);

        let fine_intervals = get_fine_intervals(&breakpoints);
        assert_eq!(fine_intervals.len(), 3);
        assert_eq!(fine_intervals[1].range, IntRange::from_pair(100, 150));

        // The fine partition spans the full breakpoint range
        let total = get_total_range_size(fine_intervals.iter().map(|x| &x.range));
        assert_eq!(total, 200);
    }

    #[test]
    fn test_joint_segment_two_samples() {
        let segment_table = get_two_sample_table();
        let (joint_table, stats) = joint_segment_samples(1, &segment_table).unwrap();

        assert_eq!(joint_table.sample_names, vec!["A", "B"]);
        assert_eq!(joint_table.chroms.len(), 1);

        let chrom = &joint_table.chroms[0];
        assert_eq!(
            chrom.intervals,
            vec![
                IntRange::from_pair(0, 100),
                IntRange::from_pair(100, 150),
                IntRange::from_pair(150, 200)
            ]
        );
        assert_eq!(chrom.sample_values[0], vec![1.0, 2.0, 2.0]);
        assert_eq!(chrom.sample_values[1], vec![1.0, 1.0, 2.0]);

        assert_eq!(stats.total_fine_length, 200);
        assert_eq!(stats.retained_length, 200);
        approx::assert_ulps_eq!(stats.retained_percent, 100.0, max_ulps = 4);
    }

    #[test]
    fn test_joint_segment_gap() {
        // Sample A has no segment over [100,200), so it is not retained
        let segment_table = SegmentTable {
            samples: vec![
                get_test_sample("A", vec![("chr1", get_test_segments(&[(0, 100, 1.0), (200, 300, 0.5)]))]),
                get_test_sample("B", vec![("chr1", get_test_segments(&[(0, 300, 1.5)]))]),
            ],
        };
        let (joint_table, stats) = joint_segment_samples(1, &segment_table).unwrap();

        let chrom = &joint_table.chroms[0];
        assert_eq!(
            chrom.intervals,
            vec![IntRange::from_pair(0, 100), IntRange::from_pair(200, 300)]
        );
        assert_eq!(chrom.sample_values[0], vec![1.0, 0.5]);
        assert_eq!(chrom.sample_values[1], vec![1.5, 1.5]);

        assert_eq!(stats.total_fine_length, 300);
        assert_eq!(stats.retained_length, 200);
    }

    #[test]
    fn test_chrom_missing_from_one_sample() {
        let segment_table = SegmentTable {
            samples: vec![
                get_test_sample(
                    "A",
                    vec![
                        ("chr1", get_test_segments(&[(0, 100, 1.0)])),
                        ("chr2", get_test_segments(&[(0, 100, 1.0)])),
                    ],
                ),
                get_test_sample("B", vec![("chr1", get_test_segments(&[(0, 100, 1.0)]))]),
            ],
        };
        let (joint_table, stats) = joint_segment_samples(2, &segment_table).unwrap();

        assert_eq!(joint_table.chroms.len(), 2);
        assert_eq!(joint_table.chroms[0].intervals.len(), 1);
        assert!(joint_table.chroms[1].intervals.is_empty());
        assert!(joint_table.chroms[1].sample_values.iter().all(|x| x.is_empty()));
        approx::assert_ulps_eq!(stats.retained_percent, 50.0, max_ulps = 4);
    }

    #[test]
    fn test_chrom_order() {
        let segment_table = SegmentTable {
            samples: vec![get_test_sample(
                "A",
                vec![
                    ("chr10", get_test_segments(&[(0, 100, 1.0)])),
                    ("chr2", get_test_segments(&[(0, 100, 1.0)])),
                    ("chr1", get_test_segments(&[(0, 100, 1.0)])),
                ],
            )],
        };
        let (joint_table, _) = joint_segment_samples(3, &segment_table).unwrap();
        let labels = joint_table
            .chroms
            .iter()
            .map(|x| x.chrom_label.as_str())
            .collect::<Vec<_>>();
        assert_eq!(labels, vec!["chr1", "chr2", "chr10"]);
    }

    #[test]
    fn test_overlapping_segments() {
        let segment_table = SegmentTable {
            samples: vec![
                get_test_sample("A", vec![("chr1", get_test_segments(&[(0, 100, 1.0), (50, 150, 2.0)]))]),
                get_test_sample("B", vec![("chr1", get_test_segments(&[(0, 150, 1.0)]))]),
            ],
        };
        assert!(joint_segment_samples(1, &segment_table).is_err());

        // Nested segment
        let segment_table = SegmentTable {
            samples: vec![get_test_sample(
                "A",
                vec![("chr1", get_test_segments(&[(0, 100, 1.0), (20, 50, 2.0)]))],
            )],
        };
        assert!(joint_segment_samples(1, &segment_table).is_err());
    }

    #[test]
    fn test_coverage_bound() {
        let breakpoints = vec![0, 100];
        let mut fine_intervals = get_fine_intervals(&breakpoints);
        let segments = vec![Segment {
            range: IntRange::from_pair(0, 100),
            ratio: 1.0,
        }];

        let sources = add_sample_coverage(&breakpoints, &segments, 1, &mut fine_intervals).unwrap();
        assert_eq!(sources, vec![Some(0)]);

        // A second pass would exceed the sample count of 1
        assert!(add_sample_coverage(&breakpoints, &segments, 1, &mut fine_intervals).is_err());
    }

    /// Random gapped segment sets for 1-4 samples on one chromosome
    ///
    fn get_random_segment_table(rng: &mut StdRng) -> SegmentTable {
        let sample_count = rng.gen_range(1..=4);
        let mut samples = Vec::new();
        for sample_index in 0..sample_count {
            let mut segments = Vec::new();
            let mut pos = rng.gen_range(0..20);
            while pos < 1000 {
                let end = pos + rng.gen_range(1..=100);
                if rng.gen_bool(0.75) {
                    segments.push(Segment {
                        range: IntRange::from_pair(pos, end),
                        ratio: rng.gen_range(0.1..4.0),
                    });
                }
                pos = end;
            }
            let mut chroms = BTreeMap::new();
            chroms.insert("chr1".to_string(), segments);
            samples.push(SampleSegments {
                sample_name: format!("S{sample_index}"),
                chroms,
            });
        }
        SegmentTable { samples }
    }

    #[test]
    fn test_random_partitions() {
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..50 {
            let segment_table = get_random_segment_table(&mut rng);

            let breakpoints = get_chrom_breakpoints(&segment_table, "chr1");
            if breakpoints.is_empty() {
                continue;
            }
            let (joint_table, stats) = joint_segment_samples(2, &segment_table).unwrap();

            // Partition completeness
            assert_eq!(
                stats.total_fine_length,
                breakpoints.last().unwrap() - breakpoints.first().unwrap()
            );
            assert!(stats.retained_length <= stats.total_fine_length);

            // Every retained interval is inside a segment from each sample, and takes its ratio
            let chrom = &joint_table.chroms[0];
            for (sample, values) in segment_table.samples.iter().zip(chrom.sample_values.iter()) {
                assert_eq!(values.len(), chrom.intervals.len());
                for (interval, value) in chrom.intervals.iter().zip(values.iter()) {
                    let segment = sample.chroms["chr1"]
                        .iter()
                        .find(|x| x.range.contains_range(interval))
                        .unwrap();
                    assert_eq!(segment.ratio, *value);
                }
            }
        }
    }

    #[test]
    fn test_random_overlapping_segments() {
        let mut rng = StdRng::seed_from_u64(7);

        let mut tested_count = 0;
        for _ in 0..50 {
            let mut segment_table = get_random_segment_table(&mut rng);

            // Add a segment starting inside an existing segment of one sample
            let sample_index = rng.gen_range(0..segment_table.samples.len());
            let segments = segment_table.samples[sample_index]
                .chroms
                .get_mut("chr1")
                .unwrap();
            let candidates = segments
                .iter()
                .filter(|x| x.range.size() > 1)
                .map(|x| x.range)
                .collect::<Vec<_>>();
            if candidates.is_empty() {
                continue;
            }
            let host = candidates[rng.gen_range(0..candidates.len())];
            let start = rng.gen_range((host.start + 1)..host.end);
            let end = start + rng.gen_range(1..=150);
            segments.push(Segment {
                range: IntRange::from_pair(start, end),
                ratio: 1.0,
            });
            segments.sort_by_key(|x| x.range);

            assert!(joint_segment_samples(2, &segment_table).is_err());
            tested_count += 1;
        }
        assert!(tested_count > 0);
    }
}
