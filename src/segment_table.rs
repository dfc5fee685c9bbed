//! Input segment table: per-sample, per-chromosome log2 ratio segments
//!

use std::collections::BTreeMap;
use std::io::Read;

use camino::Utf8Path;
use csv::{ReaderBuilder, StringRecord, Trim};
use log::info;
use simple_error::{SimpleResult, bail, map_err_with};

use crate::int_range::IntRange;

/// Minimum field count for one input row: sample, chrom, start, end, log2 ratio
const MIN_FIELD_COUNT: usize = 5;

/// A single input segment with its ratio converted from log2 to linear scale
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub range: IntRange,
    pub ratio: f64,
}

pub struct SampleSegments {
    pub sample_name: String,

    /// Segments for each chromosome label, sorted by start position
    pub chroms: BTreeMap<String, Vec<Segment>>,
}

/// All input segments, with samples sorted by name
pub struct SegmentTable {
    pub samples: Vec<SampleSegments>,
}

impl SegmentTable {
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn segment_count(&self) -> usize {
        self.samples
            .iter()
            .flat_map(|x| x.chroms.values())
            .map(|x| x.len())
            .sum()
    }

    /// Get every chromosome label observed in any sample, without duplicates
    ///
    pub fn get_chrom_labels(&self) -> Vec<&str> {
        let mut labels = self
            .samples
            .iter()
            .flat_map(|x| x.chroms.keys())
            .map(|x| x.as_str())
            .collect::<Vec<_>>();
        labels.sort();
        labels.dedup();
        labels
    }
}

struct SegmentRecord {
    sample_name: String,
    chrom_label: String,
    range: IntRange,
    ratio: f64,
}

/// Parse one input row
///
/// # Arguments
/// * `line_number` - 1-indexed line number in the input file, only used for error messages
///
fn parse_segment_record(record: &StringRecord, line_number: usize) -> SimpleResult<SegmentRecord> {
    let field_count = record.len();
    if field_count < MIN_FIELD_COUNT {
        bail!(
            "Input line {line_number} has {field_count} fields, at least {MIN_FIELD_COUNT} are required (SAMPLE CHR START END ... LOG2RATIO)"
        );
    }

    let sample_name = record[0].to_string();
    let chrom_label = record[1].to_string();
    let start = map_err_with!(
        record[2].parse::<i64>(),
        format!("Can't parse start position '{}' on input line {line_number}", &record[2])
    )?;
    let end = map_err_with!(
        record[3].parse::<i64>(),
        format!("Can't parse end position '{}' on input line {line_number}", &record[3])
    )?;
    let log2_ratio_str = &record[field_count - 1];
    let log2_ratio = map_err_with!(
        log2_ratio_str.parse::<f64>(),
        format!("Can't parse log2 ratio '{log2_ratio_str}' on input line {line_number}")
    )?;

    if sample_name.is_empty() || chrom_label.is_empty() {
        bail!("Empty sample or chromosome name on input line {line_number}");
    }
    if start < 0 || start >= end {
        bail!("Invalid segment range [{start},{end}) on input line {line_number}");
    }

    let ratio = 2f64.powf(log2_ratio);
    if !ratio.is_finite() || ratio <= 0.0 {
        bail!(
            "Log2 ratio '{log2_ratio_str}' on input line {line_number} does not convert to a positive finite ratio"
        );
    }

    Ok(SegmentRecord {
        sample_name,
        chrom_label,
        range: IntRange::from_pair(start, end),
        ratio,
    })
}

/// Read tab-separated segment rows from any source
///
/// The first line is a header and is skipped. Fields are trimmed of surrounding whitespace.
///
pub fn get_segment_table_from_reader<R: Read>(reader: R) -> SimpleResult<SegmentTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .delimiter(b'\t')
        .from_reader(reader);

    type ChromSegmentMap = BTreeMap<IntRange, f64>;
    let mut segment_map: BTreeMap<String, BTreeMap<String, ChromSegmentMap>> = BTreeMap::new();

    for result in rdr.records() {
        let record = map_err_with!(result, "Failed to parse segment input record")?;

        // Header occupies line 1
        let line_number = match record.position() {
            Some(x) => x.line() as usize,
            None => 0,
        };
        let segment_record = parse_segment_record(&record, line_number)?;

        let chrom_segments = segment_map
            .entry(segment_record.sample_name)
            .or_default()
            .entry(segment_record.chrom_label)
            .or_default();
        if chrom_segments
            .insert(segment_record.range, segment_record.ratio)
            .is_some()
        {
            bail!(
                "Duplicate segment {:?} for the same sample and chromosome on input line {line_number}",
                segment_record.range
            );
        }
    }

    if segment_map.is_empty() {
        bail!("No segments found in input");
    }

    // BTreeMap iteration yields segments ordered by (start,end)
    let samples = segment_map
        .into_iter()
        .map(|(sample_name, chroms)| SampleSegments {
            sample_name,
            chroms: chroms
                .into_iter()
                .map(|(chrom_label, segments)| {
                    let segments = segments
                        .into_iter()
                        .map(|(range, ratio)| Segment { range, ratio })
                        .collect();
                    (chrom_label, segments)
                })
                .collect(),
        })
        .collect();

    Ok(SegmentTable { samples })
}

/// Read the tab-separated segment input file
///
pub fn read_segment_table(filename: &Utf8Path) -> SimpleResult<SegmentTable> {
    info!("Reading input log2 ratios from file: '{filename}'");

    let file = map_err_with!(
        std::fs::File::open(filename),
        format!("Unable to open segment input file: '{filename}'")
    )?;
    let segment_table = get_segment_table_from_reader(std::io::BufReader::new(file))?;

    info!(
        "Read {} segments from {} samples",
        segment_table.segment_count(),
        segment_table.sample_count()
    );
    Ok(segment_table)
}
