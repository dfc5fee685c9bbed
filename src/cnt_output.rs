//! Write fractional copy numbers in the CNT-MD input format
//!

use std::io::Write;

use itertools::Itertools;
use log::{info, warn};
use simple_error::{SimpleResult, bail, map_err_with};

use crate::joint_segmentation::{JointChromSegments, JointSegmentTable};

/// Format a fractional copy number with at least one fractional digit, e.g. "2.0" or "1.35"
///
fn format_copy_number(x: f64) -> String {
    if x.fract() == 0.0 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

/// Write the CNT-MD input for all samples
///
/// Chromosomes without any interval are skipped, rather than written with a 0 segment count and an
/// empty interval list. It is an error for no chromosome to remain.
///
pub fn write_cnt_input<W: Write>(
    out: &mut W,
    fraction_table: &JointSegmentTable,
) -> SimpleResult<()> {
    let chroms = fraction_table
        .chroms
        .iter()
        .filter(|x| !x.intervals.is_empty())
        .collect::<Vec<_>>();

    for chrom in fraction_table.chroms.iter() {
        if chrom.intervals.is_empty() {
            warn!(
                "Chromosome '{}' has no intervals covered in all samples and is excluded from output",
                chrom.chrom_label
            );
        }
    }

    if chroms.is_empty() {
        bail!("No genomic interval is covered in all samples");
    }

    map_err_with!(
        write_cnt_input_lines(out, &fraction_table.sample_names, &chroms),
        "Failed to write CNT-MD input"
    )
}

fn write_cnt_input_lines<W: Write>(
    out: &mut W,
    sample_names: &[String],
    chroms: &[&JointChromSegments],
) -> std::io::Result<()> {
    writeln!(out, "#PARAMS")?;
    writeln!(out, "{} #number of chromosomes", chroms.len())?;
    writeln!(out, "{} #number of samples", sample_names.len())?;
    writeln!(
        out,
        "{} #number of segments for each chromosome",
        chroms.iter().map(|x| x.intervals.len()).join(" ")
    )?;

    let chrom_intervals = chroms
        .iter()
        .map(|chrom| {
            let intervals = chrom
                .intervals
                .iter()
                .map(|x| format!("{},{}", x.start, x.end))
                .join(" ");
            format!("{} : {}", chrom.chrom_label, intervals)
        })
        .join(" | ");
    writeln!(out, "#SAMPLES {chrom_intervals}")?;

    for (sample_index, sample_name) in sample_names.iter().enumerate() {
        let sample_values = chroms
            .iter()
            .map(|chrom| {
                chrom.sample_values[sample_index]
                    .iter()
                    .map(|&x| format_copy_number(x))
                    .join(" ")
            })
            .join(" | ");
        writeln!(
            out,
            "{}-{} : {}",
            sample_index,
            sample_name.replace(' ', "_"),
            sample_values
        )?;
    }
    Ok(())
}

/// Write the CNT-MD input to stdout
///
pub fn write_cnt_input_to_stdout(fraction_table: &JointSegmentTable) -> SimpleResult<()> {
    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    write_cnt_input(&mut out, fraction_table)?;
    map_err_with!(out.flush(), "Failed to write CNT-MD input to stdout")
}

/// Write the CNT-MD input to a new file
///
pub fn write_cnt_input_file(
    filename: &camino::Utf8Path,
    fraction_table: &JointSegmentTable,
) -> SimpleResult<()> {
    info!("Writing CNT-MD input to file: '{filename}'");

    let f = map_err_with!(
        std::fs::File::create(filename),
        format!("Unable to create CNT-MD input file: '{filename}'")
    )?;
    let mut out = std::io::BufWriter::new(f);
    write_cnt_input(&mut out, fraction_table)?;
    map_err_with!(
        out.flush(),
        format!("Failed to write CNT-MD input file: '{filename}'")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::int_range::IntRange;

    fn get_test_fraction_table() -> JointSegmentTable {
        JointSegmentTable {
            sample_names: vec!["A".to_string(), "tumor b".to_string()],
            chroms: vec![
                JointChromSegments {
                    chrom_label: "chr1".to_string(),
                    intervals: vec![IntRange::from_pair(0, 100), IntRange::from_pair(100, 150)],
                    sample_values: vec![vec![2.0, 3.5], vec![1.25, 2.0]],
                },
                JointChromSegments {
                    chrom_label: "chr2".to_string(),
                    intervals: Vec::new(),
                    sample_values: vec![Vec::new(), Vec::new()],
                },
                JointChromSegments {
                    chrom_label: "chr10".to_string(),
                    intervals: vec![IntRange::from_pair(5, 10)],
                    sample_values: vec![vec![0.0], vec![4.1]],
                },
            ],
        }
    }

    #[test]
    fn test_format_copy_number() {
        assert_eq!(format_copy_number(2.0), "2.0");
        assert_eq!(format_copy_number(0.0), "0.0");
        assert_eq!(format_copy_number(1.35), "1.35");
        assert_eq!(format_copy_number(12.1), "12.1");
    }

    #[test]
    fn test_write_cnt_input() {
        let fraction_table = get_test_fraction_table();
        let mut out = Vec::new();
        write_cnt_input(&mut out, &fraction_table).unwrap();

        let expected = "#PARAMS\n\
                        2 #number of chromosomes\n\
                        2 #number of samples\n\
                        2 1 #number of segments for each chromosome\n\
                        #SAMPLES chr1 : 0,100 100,150 | chr10 : 5,10\n\
                        0-A : 2.0 3.5 | 0.0\n\
                        1-tumor_b : 1.25 2.0 | 4.1\n";
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn test_write_cnt_input_no_intervals() {
        let fraction_table = JointSegmentTable {
            sample_names: vec!["A".to_string()],
            chroms: vec![JointChromSegments {
                chrom_label: "chr1".to_string(),
                intervals: Vec::new(),
                sample_values: vec![Vec::new()],
            }],
        };
        let mut out = Vec::new();
        assert!(write_cnt_input(&mut out, &fraction_table).is_err());
    }
}
